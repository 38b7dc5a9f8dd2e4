use tilecl_runtime::{
    ComputeError, ComputeResult, DeviceCatalog, DeviceInfo, Runtime,
};

use crate::{WgpuServer, adapters, device_info, instance};

/// Runtime that uses the [wgpu] crate.
#[derive(Debug)]
pub struct WgpuRuntime;

impl Runtime for WgpuRuntime {
    type Server = WgpuServer;

    fn name() -> &'static str {
        "wgpu"
    }

    fn catalog() -> ComputeResult<DeviceCatalog> {
        let instance = instance();
        let devices = adapters(&instance)
            .iter()
            .enumerate()
            .map(|(index, adapter)| device_info(index, adapter))
            .collect();

        Ok(DeviceCatalog::new(devices))
    }

    fn create_server(device: &DeviceInfo) -> ComputeResult<Self::Server> {
        let instance = instance();
        let adapter = adapters(&instance)
            .into_iter()
            .enumerate()
            .find(|(index, adapter)| device_info(*index, adapter) == *device)
            .map(|(_, adapter)| adapter)
            .ok_or_else(|| ComputeError::DeviceUnavailable {
                reason: format!("no adapter matches {device}"),
            })?;

        let (device, queue) = futures_lite::future::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("tilecl"),
                required_limits: adapter.limits(),
                ..Default::default()
            },
        ))
        .map_err(|err| ComputeError::DeviceUnavailable {
            reason: err.to_string(),
        })?;

        device.on_uncaptured_error(Box::new(|err| {
            log::error!("Uncaptured wgpu error: {err}");
        }));

        Ok(WgpuServer::new(device, queue))
    }
}
