use crate::DeviceProperties;

/// Settings of the host-emulated device backend.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct CpuConfig {
    /// Number of worker threads executing work-groups. Defaults to the available parallelism.
    #[serde(default)]
    pub workers: Option<usize>,

    /// Fill freshly allocated buffers with the sentinel value.
    #[serde(default = "default_fill_sentinel")]
    pub fill_sentinel: bool,

    /// Device profiles exposed by the host catalog, in enumeration order.
    #[serde(default = "default_devices")]
    pub devices: Vec<CpuDeviceProfile>,
}

impl Default for CpuConfig {
    fn default() -> Self {
        Self {
            workers: None,
            fill_sentinel: default_fill_sentinel(),
            devices: default_devices(),
        }
    }
}

impl CpuConfig {
    /// The number of worker threads to use.
    pub fn worker_count(&self) -> usize {
        match self.workers {
            Some(workers) => workers.max(1),
            None => std::thread::available_parallelism()
                .map(|count| count.get())
                .unwrap_or(1),
        }
    }
}

/// One emulated device.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CpuDeviceProfile {
    /// Device name shown in listings.
    pub name: String,
    /// Maximum lanes per work-group.
    #[serde(default = "default_max_work_group_size")]
    pub max_work_group_size: u32,
    /// Local scratch bytes per work-group. Zero means the device has no local memory.
    #[serde(default = "default_local_memory_size")]
    pub local_memory_size: usize,
    /// Global memory capacity in bytes.
    #[serde(default = "default_max_memory_size")]
    pub max_memory_size: u64,
    /// Maximum number of work-groups along one grid dimension.
    #[serde(default = "default_max_groups_per_dimension")]
    pub max_groups_per_dimension: u32,
}

impl CpuDeviceProfile {
    /// The device properties described by this profile.
    pub fn properties(&self) -> DeviceProperties {
        DeviceProperties::new(
            self.max_work_group_size,
            self.local_memory_size,
            self.local_memory_size > 0,
            self.max_memory_size,
            self.max_groups_per_dimension,
        )
    }
}

impl Default for CpuDeviceProfile {
    fn default() -> Self {
        Self {
            name: "host-cpu".into(),
            max_work_group_size: default_max_work_group_size(),
            local_memory_size: default_local_memory_size(),
            max_memory_size: default_max_memory_size(),
            max_groups_per_dimension: default_max_groups_per_dimension(),
        }
    }
}

fn default_fill_sentinel() -> bool {
    true
}

fn default_devices() -> Vec<CpuDeviceProfile> {
    vec![CpuDeviceProfile::default()]
}

fn default_max_work_group_size() -> u32 {
    256
}

fn default_local_memory_size() -> usize {
    32 * 1024
}

fn default_max_memory_size() -> u64 {
    1 << 30
}

fn default_max_groups_per_dimension() -> u32 {
    65535
}
