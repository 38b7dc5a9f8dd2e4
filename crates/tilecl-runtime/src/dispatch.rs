use std::sync::Arc;

use crate::{
    BufferManager, ComputeError, ComputeResult, ContextId, DeviceProperties, Kernel, KernelArg,
    LaunchGrid, QueueStats, Runtime, WorkPartition,
    queue::CommandQueue,
    server::{KernelKey, KernelLaunch},
};

/// Validates and submits kernel launches on the queue of one context.
///
/// Every check happens before anything is enqueued, so a rejected launch leaves the queue
/// untouched.
#[derive(Debug)]
pub struct KernelDispatcher<R: Runtime> {
    context: ContextId,
    properties: DeviceProperties,
    queue: Arc<CommandQueue<R::Server>>,
    buffers: BufferManager<R>,
}

impl<R: Runtime> Clone for KernelDispatcher<R> {
    fn clone(&self) -> Self {
        Self {
            context: self.context,
            properties: self.properties.clone(),
            queue: self.queue.clone(),
            buffers: self.buffers.clone(),
        }
    }
}

impl<R: Runtime> KernelDispatcher<R> {
    pub(crate) fn new(
        context: ContextId,
        properties: DeviceProperties,
        queue: Arc<CommandQueue<R::Server>>,
        buffers: BufferManager<R>,
    ) -> Self {
        Self {
            context,
            properties,
            queue,
            buffers,
        }
    }

    /// Device capabilities the launches are checked against.
    pub fn properties(&self) -> &DeviceProperties {
        &self.properties
    }

    /// Derive the partition of `n` work-items for the device.
    pub fn compute_work_partition(&self, n: u32) -> ComputeResult<WorkPartition> {
        WorkPartition::compute(n, &self.properties)
    }

    /// Validate a per-group local memory request and return the argument to bind.
    pub fn request_local_scratch(&self, size: usize) -> ComputeResult<KernelArg> {
        check_local_memory(size, &self.properties)?;
        Ok(KernelArg::LocalScratch(size))
    }

    /// Enqueue a kernel launch.
    ///
    /// Returns once the launch is enqueued, or with the error latched by an earlier failed
    /// command. Never waits for the device: the backend compiles each kernel specialisation
    /// on the queue thread the first time it runs, and a compile error poisons the queue.
    pub fn submit<G: Into<LaunchGrid>>(&self, kernel: &Kernel, grid: G) -> ComputeResult<()> {
        let grid = grid.into();

        if let Some(err) = self.queue.error() {
            return Err(err);
        }
        if kernel.context() != self.context {
            return Err(ComputeError::ArgumentMismatch {
                kernel: kernel.name().to_string(),
                ordinal: 0,
                reason: "the kernel belongs to another context".into(),
            });
        }

        let args = kernel.arguments()?;
        let mut scratch = None;

        for arg in args.iter() {
            match arg {
                KernelArg::Buffer(handle) => self.buffers.validate(handle)?,
                KernelArg::LocalScratch(size) => {
                    check_local_memory(*size, &self.properties)?;
                    scratch = Some(*size);
                }
                KernelArg::Int(_) => {}
            }
        }

        grid.validate(&self.properties)?;

        let key = KernelKey::new(
            kernel.program(),
            kernel.name(),
            grid.partition.local(),
            KernelKey::tile_len_for(scratch),
        );

        log::trace!(
            "Submitting {} on {}x{} groups of {}",
            kernel.name(),
            grid.partition.groups(),
            grid.rows,
            grid.partition.local()
        );
        self.queue.execute(KernelLaunch::new(key, grid, args))
    }

    /// Queue counters.
    pub fn stats(&self) -> QueueStats {
        self.queue.stats()
    }
}

fn check_local_memory(size: usize, properties: &DeviceProperties) -> ComputeResult<()> {
    let available = if properties.supports_local_memory {
        properties.local_memory_size
    } else {
        0
    };

    if size > available {
        return Err(ComputeError::InsufficientLocalMemory {
            requested: size,
            available,
        });
    }

    Ok(())
}
