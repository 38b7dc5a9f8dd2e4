use core::ops::Range;
use core::sync::atomic::{AtomicBool, Ordering};
use std::{
    any::Any,
    panic::{AssertUnwindSafe, catch_unwind},
    sync::{Arc, mpsc},
    thread::JoinHandle,
};

use crate::kernel::{GroupArg, KernelFault, LocalScratch, NativeKernel, WorkGroup};

/// A slice of the grid executed by one worker.
#[derive(Debug)]
pub(crate) struct GroupTask {
    pub kernel: Arc<dyn NativeKernel>,
    pub args: Arc<[GroupArg]>,
    pub groups: Range<u64>,
    pub count: [u32; 2],
    pub size: u32,
    pub tile_len: usize,
    pub abort: Arc<AtomicBool>,
}

/// Result of a task: the first fault with the group it happened in.
pub(crate) type TaskResult = Result<(), ([u32; 2], KernelFault)>;

enum Message {
    Task(GroupTask, mpsc::Sender<TaskResult>),
    Stop,
}

#[derive(Debug)]
pub(crate) struct Worker {
    sender: mpsc::Sender<Message>,
    handle: Option<JoinHandle<()>>,
}

impl Worker {
    pub fn spawn(index: usize) -> std::io::Result<Self> {
        let (sender, receiver) = mpsc::channel();
        let handle = std::thread::Builder::new()
            .name(format!("tilecl-cpu-worker-{index}"))
            .spawn(move || {
                while let Ok(Message::Task(task, done)) = receiver.recv() {
                    // The receiver may be gone if the launch was abandoned.
                    let _ = done.send(task.run());
                }
            })?;

        Ok(Self {
            sender,
            handle: Some(handle),
        })
    }

    pub fn send_task(&self, task: GroupTask, done: mpsc::Sender<TaskResult>) -> bool {
        self.sender.send(Message::Task(task, done)).is_ok()
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        let _ = self.sender.send(Message::Stop);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl GroupTask {
    fn run(self) -> TaskResult {
        let mut scratch = LocalScratch::new(self.tile_len);
        let width = self.count[0] as u64;

        for index in self.groups {
            if self.abort.load(Ordering::Relaxed) {
                break;
            }

            let id = [(index % width) as u32, (index / width) as u32];
            scratch.reset();

            let mut group = WorkGroup::new(id, self.count, self.size, &self.args, &mut scratch);
            let result = catch_unwind(AssertUnwindSafe(|| self.kernel.execute(&mut group)))
                .unwrap_or_else(|payload| Err(panicked(payload)));

            if let Err(fault) = result {
                self.abort.store(true, Ordering::Relaxed);
                return Err((id, fault));
            }
        }

        Ok(())
    }
}

fn panicked(payload: Box<dyn Any + Send>) -> KernelFault {
    let message = match payload.downcast::<String>() {
        Ok(message) => *message,
        Err(payload) => match payload.downcast::<&'static str>() {
            Ok(message) => message.to_string(),
            Err(_) => "non-string panic payload".to_string(),
        },
    };

    KernelFault::Panicked { message }
}
