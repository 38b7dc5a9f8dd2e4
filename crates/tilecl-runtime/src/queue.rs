use core::sync::atomic::{AtomicU64, Ordering};
use std::{sync::Arc, thread::JoinHandle};

use web_time::Instant;

use crate::{
    BufferId, ComputeError, ComputeResult, DispatchCode, KernelDefinition, ProgramId,
    logging::{ProfileLevel, ServerLogger},
    program::Program,
    server::{ComputeServer, KernelLaunch, ReadCallback},
};

type Callback<Response> = async_channel::Sender<Response>;

enum Message {
    Build(Arc<Program>, Callback<ComputeResult<String>>),
    CheckKernel(ProgramId, KernelDefinition, Callback<ComputeResult<()>>),
    Create(BufferId, Vec<u8>),
    Empty(BufferId, u64),
    Read(BufferId, Callback<ComputeResult<Vec<u8>>>),
    Release(BufferId),
    Execute(KernelLaunch),
    Finish(Callback<ComputeResult<()>>),
}

/// Counters of a command queue.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct QueueStats {
    /// Kernel launches accepted by [CommandQueue::execute].
    pub submitted: u64,
    /// Kernel launches that completed on the server.
    pub executed: u64,
}

#[derive(Debug, Default)]
struct QueueState {
    submitted: AtomicU64,
    executed: AtomicU64,
    error: spin::Mutex<Option<ComputeError>>,
}

impl QueueState {
    fn error(&self) -> Option<ComputeError> {
        self.error.lock().clone()
    }

    fn check(&self) -> ComputeResult<()> {
        match self.error() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn poison(&self, err: ComputeError) {
        let mut state = self.error.lock();
        if state.is_none() {
            log::error!("Command queue poisoned: {err}");
            *state = Some(err);
        }
    }
}

/// An in-order command queue served by a dedicated thread owning the compute server.
///
/// Commands execute in submission order: a launch reading the output of an earlier launch on
/// the same queue needs no host wait in between, and a read observes every command submitted
/// before it. Launches and uploads return immediately; reads, builds, kernel checks and
/// [finish](Self::finish) wait for their reply.
///
/// The first failing command poisons the queue. Later launches are skipped, and the error is
/// returned by every following launch, read and finish.
pub struct CommandQueue<Server: ComputeServer> {
    sender: async_channel::Sender<Message>,
    state: Arc<QueueState>,
    handle: Option<JoinHandle<()>>,
    _server: core::marker::PhantomData<fn(Server)>,
}

impl<Server: ComputeServer> core::fmt::Debug for CommandQueue<Server> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CommandQueue")
            .field("stats", &self.stats())
            .field("error", &self.state.error())
            .finish()
    }
}

impl<Server: ComputeServer> CommandQueue<Server> {
    /// Spawn the queue thread and move the server onto it.
    pub fn new(server: Server, label: &str) -> ComputeResult<Self> {
        Self::with_logger(server, label, ServerLogger::default)
    }

    /// Spawn the queue thread with a custom logger factory, called on the queue thread.
    pub fn with_logger<F>(mut server: Server, label: &str, logger: F) -> ComputeResult<Self>
    where
        F: FnOnce() -> ServerLogger + Send + 'static,
    {
        let (sender, receiver) = async_channel::unbounded();
        let state = Arc::new(QueueState::default());
        let state_thread = state.clone();

        let handle = std::thread::Builder::new()
            .name(format!("tilecl-queue-{label}"))
            .spawn(move || {
                let mut logger = logger();

                while let Ok(message) = receiver.recv_blocking() {
                    handle_message(&mut server, &mut logger, &state_thread, message);
                }

                log::debug!("Command queue drained, shutting down");
            })
            .map_err(|err| {
                ComputeError::dispatch(
                    DispatchCode::OutOfResources,
                    format!("can't spawn the queue thread: {err}"),
                )
            })?;

        Ok(Self {
            sender,
            state,
            handle: Some(handle),
            _server: core::marker::PhantomData,
        })
    }

    /// Build a program and wait for the result.
    pub fn build(&self, program: Arc<Program>) -> ComputeResult<String> {
        self.request(|callback| Message::Build(program, callback))?
    }

    /// Check an entry point against its host definition.
    pub fn check_kernel(
        &self,
        program: ProgramId,
        definition: KernelDefinition,
    ) -> ComputeResult<()> {
        self.request(|callback| Message::CheckKernel(program, definition, callback))?
    }

    /// Enqueue the creation of an initialized buffer.
    pub fn create(&self, id: BufferId, data: Vec<u8>) -> ComputeResult<()> {
        self.send(Message::Create(id, data))
    }

    /// Enqueue the creation of an uninitialized buffer.
    pub fn empty(&self, id: BufferId, size: u64) -> ComputeResult<()> {
        self.send(Message::Empty(id, size))
    }

    /// Enqueue a buffer read. The result arrives on the returned channel.
    pub fn read(&self, id: BufferId) -> ComputeResult<ReadCallback> {
        let (callback, response) = async_channel::bounded(1);
        self.send(Message::Read(id, callback))?;
        Ok(response)
    }

    /// Enqueue a buffer release.
    pub fn release(&self, id: BufferId) -> ComputeResult<()> {
        self.send(Message::Release(id))
    }

    /// Enqueue a kernel launch, returning the latched error if the queue is poisoned.
    pub fn execute(&self, launch: KernelLaunch) -> ComputeResult<()> {
        self.state.check()?;
        self.send(Message::Execute(launch))?;
        self.state.submitted.fetch_add(1, Ordering::Relaxed);

        Ok(())
    }

    /// Block until every command submitted so far has completed.
    pub fn finish(&self) -> ComputeResult<()> {
        self.request(Message::Finish)?
    }

    /// The latched error, if any command failed.
    pub fn error(&self) -> Option<ComputeError> {
        self.state.error()
    }

    /// Submission counters.
    pub fn stats(&self) -> QueueStats {
        QueueStats {
            submitted: self.state.submitted.load(Ordering::Relaxed),
            executed: self.state.executed.load(Ordering::Relaxed),
        }
    }

    fn send(&self, message: Message) -> ComputeResult<()> {
        self.sender.send_blocking(message).map_err(|_| closed())
    }

    fn request<T, F>(&self, message: F) -> ComputeResult<T>
    where
        F: FnOnce(Callback<T>) -> Message,
    {
        let (callback, response) = async_channel::bounded(1);
        self.send(message(callback))?;
        response.recv_blocking().map_err(|_| closed())
    }
}

impl<Server: ComputeServer> Drop for CommandQueue<Server> {
    fn drop(&mut self) {
        // Pending messages are still delivered after close.
        self.sender.close();

        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("The command queue thread panicked");
            }
        }
    }
}

fn closed() -> ComputeError {
    ComputeError::dispatch(DispatchCode::InvalidQueue, "the command queue is closed")
}

fn handle_message<Server: ComputeServer>(
    server: &mut Server,
    logger: &mut ServerLogger,
    state: &QueueState,
    message: Message,
) {
    match message {
        Message::Build(program, callback) => {
            logger.log_compilation(&program);
            let result = server.build(program);
            match &result {
                Ok(log) if !log.is_empty() => {
                    logger.log_compilation(log);
                }
                Err(err) => {
                    logger.log_compilation(err);
                }
                _ => {}
            }
            callback.send_blocking(result).ok();
        }
        Message::CheckKernel(program, definition, callback) => {
            callback
                .send_blocking(server.check_kernel(program, &definition))
                .ok();
        }
        Message::Create(id, data) => {
            if let Err(err) = server.create(id, data) {
                state.poison(err);
            }
        }
        Message::Empty(id, size) => {
            if let Err(err) = server.empty(id, size) {
                state.poison(err);
            }
        }
        Message::Read(id, callback) => {
            let result = state.check().and_then(|_| server.read(id));
            callback.send_blocking(result).ok();
        }
        Message::Release(id) => server.release(id),
        Message::Execute(launch) => {
            if state.check().is_err() {
                log::debug!("Skipping {} on a poisoned queue", launch.key.entry);
                return;
            }
            if let Err(err) = execute(server, logger, launch) {
                state.poison(err);
                return;
            }
            state.executed.fetch_add(1, Ordering::Relaxed);
        }
        Message::Finish(callback) => {
            let result = state.check().and_then(|_| server.sync());
            if let Err(err) = &result {
                state.poison(err.clone());
            }
            logger.profile_summary();
            callback.send_blocking(result).ok();
        }
    }
}

fn execute<Server: ComputeServer>(
    server: &mut Server,
    logger: &mut ServerLogger,
    launch: KernelLaunch,
) -> ComputeResult<()> {
    let Some(level) = logger.profile_level() else {
        return server.execute(launch);
    };

    let name = launch.key.entry;
    let grid = launch.grid;
    let start = Instant::now();
    server.execute(launch)?;
    server.sync()?;
    let duration = start.elapsed();

    logger.register_profiled(name, duration, || match level {
        ProfileLevel::Full => format!(
            "{}x{} groups of {} lanes",
            grid.partition.groups(),
            grid.rows,
            grid.partition.local()
        ),
        _ => String::new(),
    });

    Ok(())
}
