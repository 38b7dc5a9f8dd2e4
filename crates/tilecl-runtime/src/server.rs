use core::fmt::Debug;
use std::sync::Arc;

use crate::{
    BufferId, ComputeResult, KernelArg, KernelDefinition, LaunchGrid, ProgramId, program::Program,
};

/// Channel on which the result of a buffer read is delivered.
pub type ReadCallback = async_channel::Receiver<ComputeResult<Vec<u8>>>;

/// A kernel specialised for one launch configuration.
///
/// Backends compile one pipeline per key; the work-group size and the local tile length are
/// compile-time constants of the generated program.
#[derive(new, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct KernelKey {
    /// Program holding the entry point.
    pub program: ProgramId,
    /// Entry point name.
    pub entry: &'static str,
    /// Lanes per work-group.
    pub workgroup_size: u32,
    /// Number of `f32` slots of the local tile, at least one.
    pub tile_len: u32,
}

impl KernelKey {
    /// Local tile length for a scratch request of `bytes`.
    pub fn tile_len_for(bytes: Option<usize>) -> u32 {
        match bytes {
            Some(bytes) => bytes.div_ceil(size_of::<f32>()).max(1) as u32,
            None => 1,
        }
    }
}

/// One kernel execution, as received by a server.
#[derive(new, Clone, Debug)]
pub struct KernelLaunch {
    /// The specialised kernel.
    pub key: KernelKey,
    /// The launch grid.
    pub grid: LaunchGrid,
    /// Argument values by ordinal.
    pub args: Vec<KernelArg>,
}

/// The backend half of a context: owns the device resources and executes commands.
///
/// A server lives on the thread of its [command queue](crate::CommandQueue) and receives
/// commands in submission order. Argument kinds, buffer liveness and grid limits are
/// validated before a command reaches the server.
pub trait ComputeServer: Send + Debug + 'static {
    /// Compile a program for the device. On success, returns the build log.
    fn build(&mut self, program: Arc<Program>) -> ComputeResult<String>;

    /// Check that the backend's view of an entry point matches the host definition.
    fn check_kernel(
        &mut self,
        program: ProgramId,
        definition: &KernelDefinition,
    ) -> ComputeResult<()>;

    /// Compile the kernel for a launch configuration.
    ///
    /// Called by [execute](Self::execute) on the queue thread before every launch, so it must
    /// return early for a key it has already compiled.
    fn prepare(&mut self, key: KernelKey) -> ComputeResult<()>;

    /// Create a buffer initialized with `data`.
    fn create(&mut self, id: BufferId, data: Vec<u8>) -> ComputeResult<()>;

    /// Create an uninitialized buffer of `size` bytes.
    fn empty(&mut self, id: BufferId, size: u64) -> ComputeResult<()>;

    /// Read a buffer back to the host.
    fn read(&mut self, id: BufferId) -> ComputeResult<Vec<u8>>;

    /// Free a buffer.
    fn release(&mut self, id: BufferId);

    /// Execute a kernel.
    fn execute(&mut self, launch: KernelLaunch) -> ComputeResult<()>;

    /// Wait for every command to complete on the device.
    fn sync(&mut self) -> ComputeResult<()>;
}
