use core::sync::atomic::AtomicBool;
use std::sync::{Arc, mpsc};

use tilecl_runtime::{ComputeError, ComputeResult, DispatchCode, LaunchGrid};

use super::worker::{GroupTask, TaskResult, Worker};
use crate::kernel::{GroupArg, NativeKernel};

/// Spreads the work-groups of a launch over a fixed pool of worker threads.
///
/// Groups are split into one contiguous chunk per worker. A launch returns once every chunk is
/// done; the first fault stops the remaining groups.
#[derive(Debug)]
pub struct Scheduler {
    workers: Vec<Worker>,
}

impl Scheduler {
    /// Start `workers` threads, at least one.
    pub fn new(workers: usize) -> ComputeResult<Self> {
        let workers = (0..workers.max(1))
            .map(Worker::spawn)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|err| {
                ComputeError::dispatch(
                    DispatchCode::OutOfResources,
                    format!("can't start host worker threads: {err}"),
                )
            })?;

        Ok(Self { workers })
    }

    /// Number of worker threads.
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Run every group of `grid`, blocking until they're done.
    pub fn execute(
        &self,
        kernel: Arc<dyn NativeKernel>,
        args: Vec<GroupArg>,
        grid: &LaunchGrid,
        tile_len: usize,
    ) -> ComputeResult<()> {
        let count = grid.group_count();
        let total = grid.total_groups();
        let chunk = total.div_ceil(self.workers.len() as u64).max(1);
        let args: Arc<[GroupArg]> = args.into();
        let abort = Arc::new(AtomicBool::new(false));

        let (send, receive) = mpsc::channel();
        let mut msg_count = 0;

        for (start, worker) in (0..total).step_by(chunk as usize).zip(self.workers.iter()) {
            let task = GroupTask {
                kernel: kernel.clone(),
                args: args.clone(),
                groups: start..(start + chunk).min(total),
                count,
                size: grid.partition.local(),
                tile_len,
                abort: abort.clone(),
            };

            if !worker.send_task(task, send.clone()) {
                return Err(ComputeError::dispatch(
                    DispatchCode::OutOfResources,
                    "a host worker thread has stopped",
                ));
            }
            msg_count += 1;
        }
        drop(send);

        let mut first_fault: Option<TaskResult> = None;
        let mut received = 0;
        for result in receive.iter().take(msg_count) {
            received += 1;
            if result.is_err() && first_fault.is_none() {
                first_fault = Some(result);
            }
        }

        if received < msg_count && first_fault.is_none() {
            return Err(ComputeError::dispatch(
                DispatchCode::ExecutionFault,
                format!(
                    "{} lost {} of {msg_count} group range(s): a host worker thread stopped",
                    kernel.definition().entry,
                    msg_count - received
                ),
            ));
        }

        match first_fault {
            Some(Err(([x, y], fault))) => Err(ComputeError::dispatch(
                DispatchCode::ExecutionFault,
                format!("{} faulted in group ({x}, {y}): {fault}", kernel.definition().entry),
            )),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::{GlobalBuffer, KernelFault, WorkGroup};
    use tilecl_runtime::{Access, ArgKind, DeviceProperties, KernelDefinition, WorkPartition};

    const FILL: KernelDefinition = KernelDefinition {
        entry: "fill_or_panic",
        args: &[ArgKind::Buffer(Access::Write)],
    };

    /// Writes ones, except in the group named by `panic_in`.
    #[derive(Debug)]
    struct FillOrPanic {
        panic_in: Option<u32>,
    }

    impl NativeKernel for FillOrPanic {
        fn definition(&self) -> KernelDefinition {
            FILL
        }

        fn execute(&self, group: &mut WorkGroup<'_>) -> Result<(), KernelFault> {
            if Some(group.id()[0]) == self.panic_in {
                panic!("group {} gave up", group.id()[0]);
            }
            let output = group.buffer(0)?;
            group.lanes(|lane| output.store(lane.global_x() as usize, 1.0))
        }
    }

    fn grid() -> LaunchGrid {
        let properties = DeviceProperties::new(64, 1024, true, 1 << 20, 65535);
        LaunchGrid::new(WorkPartition::new(8, 4, &properties).unwrap(), 1)
    }

    #[test_log::test]
    fn panics_fault_the_launch() {
        let scheduler = Scheduler::new(2).unwrap();
        let output = GlobalBuffer::from_values(0, Access::Write, &[0.0; 8]);

        let result = scheduler.execute(
            Arc::new(FillOrPanic { panic_in: Some(1) }),
            vec![GroupArg::Buffer(output.clone())],
            &grid(),
            0,
        );

        match result {
            Err(ComputeError::RuntimeDispatchError { code, reason }) => {
                assert_eq!(code, DispatchCode::ExecutionFault);
                assert!(reason.contains("group (1, 0)"), "{reason}");
                assert!(reason.contains("group 1 gave up"), "{reason}");
            }
            other => panic!("expected an execution fault, got {other:?}"),
        }
    }

    #[test_log::test]
    fn workers_survive_a_panicking_kernel() {
        let scheduler = Scheduler::new(2).unwrap();
        let output = GlobalBuffer::from_values(0, Access::Write, &[0.0; 8]);

        let first = scheduler.execute(
            Arc::new(FillOrPanic { panic_in: Some(0) }),
            vec![GroupArg::Buffer(output.clone())],
            &grid(),
            0,
        );
        assert!(first.is_err());

        scheduler
            .execute(
                Arc::new(FillOrPanic { panic_in: None }),
                vec![GroupArg::Buffer(output.clone())],
                &grid(),
                0,
            )
            .unwrap();
        assert_eq!(output.values(), vec![1.0; 8]);
    }
}
