use std::sync::Arc;

use crate::{
    BufferManager, BuildOptions, ComputeError, ComputeResult, ContextId, DeviceCatalog,
    DeviceInfo, Kernel, KernelDefinition, KernelDispatcher, Program, ProgramSource, QueueStats,
    Runtime, queue::CommandQueue,
};

#[derive(Debug)]
enum ProgramState {
    Unbuilt,
    Built(Arc<Program>),
    Failed(String),
}

/// Everything needed to run kernels on one device: the device, its command queue, the built
/// program and the buffers.
///
/// Dropping the context drains the queue, joins its thread and releases all device memory.
#[derive(Debug)]
pub struct ExecutionContext<R: Runtime> {
    id: ContextId,
    device: DeviceInfo,
    queue: Arc<CommandQueue<R::Server>>,
    buffers: BufferManager<R>,
    state: ProgramState,
}

impl<R: Runtime> ExecutionContext<R> {
    /// Create a context bound to `device`.
    pub fn create(device: &DeviceInfo) -> ComputeResult<Self> {
        if device.backend != R::name() {
            return Err(ComputeError::DeviceUnavailable {
                reason: format!(
                    "device {} belongs to the {} runtime, not {}",
                    device.index,
                    device.backend,
                    R::name()
                ),
            });
        }

        let server = R::create_server(device)?;
        let id = ContextId::new();
        let queue = Arc::new(CommandQueue::new(server, &id.value().to_string())?);
        let buffers = BufferManager::new(id, queue.clone(), device.properties.max_memory_size);

        log::info!("Created context {id} on {device}");

        Ok(Self {
            id,
            device: device.clone(),
            queue,
            buffers,
            state: ProgramState::Unbuilt,
        })
    }

    /// Create a context on the device at `index` of a catalog.
    ///
    /// The index is resolved first; nothing is created when it's out of range.
    pub fn from_catalog(catalog: &DeviceCatalog, index: usize) -> ComputeResult<Self> {
        let device = catalog.select(index)?;
        Self::create(device)
    }

    /// Create a context on the first device of the runtime.
    pub fn create_default() -> ComputeResult<Self> {
        let catalog = R::catalog()?;
        let device = catalog
            .iter()
            .next()
            .ok_or_else(|| ComputeError::DeviceUnavailable {
                reason: format!("no {} device found", R::name()),
            })?;

        Self::create(device)
    }

    /// The context id.
    pub fn id(&self) -> ContextId {
        self.id
    }

    /// The bound device.
    pub fn device(&self) -> &DeviceInfo {
        &self.device
    }

    /// Build a program for the device, replacing any previous one.
    ///
    /// On failure the context keeps the build log, and kernel lookups fail with it until a
    /// build succeeds.
    pub fn build(&mut self, source: ProgramSource, options: &str) -> ComputeResult<&Program> {
        let result = BuildOptions::parse(options)
            .and_then(|options| Program::new(source, options))
            .map(Arc::new)
            .and_then(|program| {
                let log = self.queue.build(program.clone())?;
                if !log.is_empty() {
                    log::debug!("Build log of {}:\n{log}", program.source().name());
                }
                Ok(program)
            });

        match result {
            Ok(program) => {
                log::info!(
                    "Built {} with entry points {:?}",
                    program.source().name(),
                    program.entry_points()
                );
                self.state = ProgramState::Built(program);
                self.program()
            }
            Err(err) => {
                let log = match &err {
                    ComputeError::BuildFailure { log } => log.clone(),
                    err => err.to_string(),
                };
                self.state = ProgramState::Failed(log);
                Err(err)
            }
        }
    }

    /// The built program.
    pub fn program(&self) -> ComputeResult<&Program> {
        match &self.state {
            ProgramState::Unbuilt => Err(ComputeError::ProgramNotBuilt),
            ProgramState::Built(program) => Ok(program.as_ref()),
            ProgramState::Failed(log) => Err(ComputeError::BuildFailure { log: log.clone() }),
        }
    }

    /// Create a kernel for an entry point of the built program.
    pub fn kernel(&self, definition: &KernelDefinition) -> ComputeResult<Kernel> {
        let program = self.program()?;
        self.queue.check_kernel(program.id(), *definition)?;

        Ok(Kernel::new(*definition, program.id(), self.id))
    }

    /// The command queue.
    pub fn queue(&self) -> &CommandQueue<R::Server> {
        &self.queue
    }

    /// The buffer manager.
    pub fn buffers(&self) -> &BufferManager<R> {
        &self.buffers
    }

    /// A dispatcher submitting on this context's queue.
    pub fn dispatcher(&self) -> KernelDispatcher<R> {
        KernelDispatcher::new(
            self.id,
            self.device.properties.clone(),
            self.queue.clone(),
            self.buffers.clone(),
        )
    }

    /// Block until every submitted command has completed.
    pub fn finish(&self) -> ComputeResult<()> {
        self.queue.finish()
    }

    /// Queue counters.
    pub fn stats(&self) -> QueueStats {
        self.queue.stats()
    }
}
