use crate::{ComputeResult, DeviceCatalog, DeviceInfo, server::ComputeServer};

/// A device backend.
pub trait Runtime: Send + Sync + Sized + core::fmt::Debug + 'static {
    /// The server executing commands on a device of this runtime.
    type Server: ComputeServer;

    /// Name of the runtime, recorded on every enumerated device.
    fn name() -> &'static str;

    /// Enumerate the devices of this runtime.
    fn catalog() -> ComputeResult<DeviceCatalog>;

    /// Open a device and create its server.
    fn create_server(device: &DeviceInfo) -> ComputeResult<Self::Server>;
}
