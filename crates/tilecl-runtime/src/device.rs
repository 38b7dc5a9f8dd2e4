use core::fmt::Display;

use crate::{ComputeError, ComputeResult};

/// The kind of hardware behind a device.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, derive_more::Display)]
pub enum DeviceKind {
    /// A discrete GPU.
    #[display("discrete GPU")]
    DiscreteGpu,
    /// A GPU integrated with the host processor.
    #[display("integrated GPU")]
    IntegratedGpu,
    /// A virtualised GPU.
    #[display("virtual GPU")]
    VirtualGpu,
    /// The host processor.
    #[display("CPU")]
    Cpu,
    /// Anything else.
    #[display("other")]
    Other,
}

/// Capabilities reported by a device. They constrain work partitions, local memory requests and
/// allocations.
#[derive(new, Clone, Debug, PartialEq, Eq, Hash)]
pub struct DeviceProperties {
    /// Maximum number of lanes in one work-group.
    pub max_work_group_size: u32,
    /// Local (shared) memory available to one work-group, in bytes.
    pub local_memory_size: usize,
    /// Whether the device has any work-group local memory.
    pub supports_local_memory: bool,
    /// Global memory the runtime may allocate, in bytes.
    pub max_memory_size: u64,
    /// Maximum number of work-groups along one grid dimension.
    pub max_groups_per_dimension: u32,
}

/// An enumerated device.
///
/// The catalog owns the enumerated devices; contexts keep their own copy of the one they bind
/// to.
#[derive(Clone, Debug, PartialEq)]
pub struct DeviceInfo {
    /// Position of the device in its catalog.
    pub index: usize,
    /// Human readable name.
    pub name: String,
    /// Hardware kind.
    pub kind: DeviceKind,
    /// Name of the runtime that enumerated the device.
    pub backend: &'static str,
    /// Device capabilities.
    pub properties: DeviceProperties,
}

impl Display for DeviceInfo {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "Device {}: {} ({}, {}) max work-group size {}, local memory {} bytes",
            self.index,
            self.name,
            self.kind,
            self.backend,
            self.properties.max_work_group_size,
            self.properties.local_memory_size,
        )
    }
}

/// The devices a runtime can open, in enumeration order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DeviceCatalog {
    devices: Vec<DeviceInfo>,
}

impl DeviceCatalog {
    /// Create a catalog, re-indexing the devices in the given order.
    pub fn new(devices: Vec<DeviceInfo>) -> Self {
        let devices = devices
            .into_iter()
            .enumerate()
            .map(|(index, mut device)| {
                device.index = index;
                device
            })
            .collect();

        Self { devices }
    }

    /// Number of devices.
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    /// Whether no device was found.
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Iterate over the devices.
    pub fn iter(&self) -> impl Iterator<Item = &DeviceInfo> {
        self.devices.iter()
    }

    /// Resolve a zero-based device index.
    pub fn select(&self, index: usize) -> ComputeResult<&DeviceInfo> {
        self.devices
            .get(index)
            .ok_or(ComputeError::DeviceIndexOutOfRange {
                index,
                count: self.devices.len(),
            })
    }
}

impl Display for DeviceCatalog {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        if self.devices.is_empty() {
            return f.write_str("No devices found");
        }

        writeln!(f, "Devices:")?;
        for device in self.devices.iter() {
            writeln!(f, "  {device}")?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device(name: &str) -> DeviceInfo {
        DeviceInfo {
            index: 42,
            name: name.into(),
            kind: DeviceKind::Cpu,
            backend: "test",
            properties: DeviceProperties::new(256, 32 * 1024, true, 1 << 30, 65535),
        }
    }

    #[test]
    fn catalog_reindexes_devices() {
        let catalog = DeviceCatalog::new(vec![device("first"), device("second")]);

        assert_eq!(catalog.select(0).unwrap().name, "first");
        assert_eq!(catalog.select(1).unwrap().index, 1);
    }

    #[test]
    fn select_out_of_range() {
        let catalog = DeviceCatalog::new(vec![device("only")]);

        assert_eq!(
            catalog.select(1),
            Err(ComputeError::DeviceIndexOutOfRange { index: 1, count: 1 })
        );
    }

    #[test]
    fn empty_catalog_rejects_index_zero() {
        let catalog = DeviceCatalog::default();

        assert!(catalog.is_empty());
        assert_eq!(
            catalog.select(0),
            Err(ComputeError::DeviceIndexOutOfRange { index: 0, count: 0 })
        );
    }
}
