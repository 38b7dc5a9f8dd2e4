use tilecl_runtime::{
    DeviceCatalog, DeviceInfo, DeviceKind, Runtime, config::cpu::CpuConfig,
};

use crate::CpuRuntime;

/// The host devices described by a configuration.
pub fn catalog(config: &CpuConfig) -> DeviceCatalog {
    DeviceCatalog::new(
        config
            .devices
            .iter()
            .map(|profile| DeviceInfo {
                index: 0,
                name: profile.name.clone(),
                kind: DeviceKind::Cpu,
                backend: CpuRuntime::name(),
                properties: profile.properties(),
            })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tilecl_runtime::config::cpu::CpuDeviceProfile;

    #[test]
    fn profiles_become_devices() {
        let config = CpuConfig {
            devices: vec![
                CpuDeviceProfile::default(),
                CpuDeviceProfile {
                    name: "no-local".into(),
                    local_memory_size: 0,
                    ..Default::default()
                },
            ],
            ..Default::default()
        };

        let catalog = catalog(&config);

        assert_eq!(catalog.len(), 2);
        let constrained = catalog.select(1).unwrap();
        assert_eq!(constrained.index, 1);
        assert_eq!(constrained.backend, "cpu");
        assert!(!constrained.properties.supports_local_memory);
    }

    #[test]
    fn no_profiles_no_devices() {
        let config = CpuConfig {
            devices: Vec::new(),
            ..Default::default()
        };

        assert!(catalog(&config).is_empty());
    }
}
