use tilecl_runtime::{
    ComputeError, ComputeResult, DeviceCatalog, DeviceInfo, Runtime, config::GlobalConfig,
};

use crate::{compute::CpuServer, device};

/// The host-emulated device runtime.
#[derive(Debug)]
pub struct CpuRuntime;

impl Runtime for CpuRuntime {
    type Server = CpuServer;

    fn name() -> &'static str {
        "cpu"
    }

    fn catalog() -> ComputeResult<DeviceCatalog> {
        Ok(device::catalog(&GlobalConfig::get().cpu))
    }

    fn create_server(device: &DeviceInfo) -> ComputeResult<Self::Server> {
        let config = GlobalConfig::get();

        // Devices come from the configuration; a handle that no longer matches a profile
        // can't be opened.
        let profile = config
            .cpu
            .devices
            .iter()
            .find(|profile| profile.name == device.name && profile.properties() == device.properties)
            .ok_or_else(|| ComputeError::DeviceUnavailable {
                reason: format!("no host device profile named '{}'", device.name),
            })?;

        log::debug!(
            "Opening host device '{}' with {} worker(s)",
            profile.name,
            config.cpu.worker_count()
        );

        CpuServer::new(
            profile.properties(),
            config.cpu.worker_count(),
            config.cpu.fill_sentinel,
        )
    }
}
