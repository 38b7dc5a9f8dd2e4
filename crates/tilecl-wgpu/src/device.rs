use tilecl_runtime::{DeviceInfo, DeviceKind, DeviceProperties};

use crate::WgpuRuntime;
use tilecl_runtime::Runtime;

/// Create the instance used to enumerate and open adapters.
pub fn instance() -> wgpu::Instance {
    wgpu::Instance::new(&wgpu::InstanceDescriptor {
        backends: wgpu::Backends::all(),
        ..Default::default()
    })
}

/// Every adapter of the system, in enumeration order.
pub fn adapters(instance: &wgpu::Instance) -> Vec<wgpu::Adapter> {
    instance.enumerate_adapters(wgpu::Backends::all())
}

/// Describe an adapter.
pub fn device_info(index: usize, adapter: &wgpu::Adapter) -> DeviceInfo {
    let info = adapter.get_info();

    DeviceInfo {
        index,
        name: format!("{} ({:?})", info.name, info.backend),
        kind: device_kind(info.device_type),
        backend: WgpuRuntime::name(),
        properties: device_properties(&adapter.limits()),
    }
}

/// Device capabilities derived from the adapter limits.
///
/// wgpu doesn't report the device memory size; the largest buffer it can create is used as
/// the allocation capacity instead.
pub fn device_properties(limits: &wgpu::Limits) -> DeviceProperties {
    let local_memory_size = limits.max_compute_workgroup_storage_size as usize;

    DeviceProperties::new(
        limits
            .max_compute_invocations_per_workgroup
            .min(limits.max_compute_workgroup_size_x),
        local_memory_size,
        local_memory_size > 0,
        limits.max_buffer_size,
        limits.max_compute_workgroups_per_dimension,
    )
}

fn device_kind(device_type: wgpu::DeviceType) -> DeviceKind {
    match device_type {
        wgpu::DeviceType::DiscreteGpu => DeviceKind::DiscreteGpu,
        wgpu::DeviceType::IntegratedGpu => DeviceKind::IntegratedGpu,
        wgpu::DeviceType::VirtualGpu => DeviceKind::VirtualGpu,
        wgpu::DeviceType::Cpu => DeviceKind::Cpu,
        wgpu::DeviceType::Other => DeviceKind::Other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_limits() {
        let properties = device_properties(&wgpu::Limits::default());

        assert_eq!(properties.max_work_group_size, 256);
        assert_eq!(properties.local_memory_size, 16384);
        assert!(properties.supports_local_memory);
        assert_eq!(properties.max_groups_per_dimension, 65535);
    }

    #[test]
    fn downlevel_limits_have_no_local_memory() {
        let properties = device_properties(&wgpu::Limits::downlevel_webgl2_defaults());

        assert!(!properties.supports_local_memory);
        assert_eq!(properties.local_memory_size, 0);
    }
}
