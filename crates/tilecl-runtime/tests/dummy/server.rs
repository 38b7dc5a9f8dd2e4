use core::sync::atomic::{AtomicBool, Ordering};
use std::{sync::Arc, time::Duration};

use hashbrown::HashMap;
use tilecl_runtime::{
    BufferId, ComputeError, ComputeResult, DispatchCode, KernelArg, KernelDefinition, ProgramId,
    program::Program,
    server::{ComputeServer, KernelKey, KernelLaunch},
};

/// Released by tests to let a running `hold` kernel complete.
pub static RELEASE_HOLD: AtomicBool = AtomicBool::new(false);

/// Executes the dummy program on byte buffers.
#[derive(Debug, Default)]
pub struct DummyServer {
    programs: HashMap<ProgramId, Arc<Program>>,
    buffers: HashMap<BufferId, Vec<u8>>,
}

impl DummyServer {
    fn buffer(&self, arg: &KernelArg) -> ComputeResult<Vec<u32>> {
        match arg {
            KernelArg::Buffer(handle) => self
                .buffers
                .get(&handle.id())
                .map(|bytes| bytemuck::pod_collect_to_vec(bytes))
                .ok_or(ComputeError::InvalidHandle {
                    id: handle.id().value(),
                }),
            _ => Err(ComputeError::dispatch(
                DispatchCode::InvalidKernel,
                "expected a buffer",
            )),
        }
    }
}

impl ComputeServer for DummyServer {
    fn build(&mut self, program: Arc<Program>) -> ComputeResult<String> {
        let log = format!("{} entry point(s)", program.entry_points().len());
        self.programs.insert(program.id(), program);
        Ok(log)
    }

    fn check_kernel(
        &mut self,
        program: ProgramId,
        definition: &KernelDefinition,
    ) -> ComputeResult<()> {
        self.programs[&program].check_interface(definition)
    }

    fn prepare(&mut self, key: KernelKey) -> ComputeResult<()> {
        match self.programs.get(&key.program) {
            Some(program) if program.has_entry_point(key.entry) => Ok(()),
            _ => Err(ComputeError::dispatch(
                DispatchCode::InvalidKernel,
                format!("unknown kernel {}", key.entry),
            )),
        }
    }

    fn create(&mut self, id: BufferId, data: Vec<u8>) -> ComputeResult<()> {
        self.buffers.insert(id, data);
        Ok(())
    }

    fn empty(&mut self, id: BufferId, size: u64) -> ComputeResult<()> {
        self.buffers.insert(id, vec![0; size as usize]);
        Ok(())
    }

    fn read(&mut self, id: BufferId) -> ComputeResult<Vec<u8>> {
        self.buffers
            .get(&id)
            .cloned()
            .ok_or(ComputeError::InvalidHandle { id: id.value() })
    }

    fn release(&mut self, id: BufferId) {
        self.buffers.remove(&id);
    }

    fn execute(&mut self, launch: KernelLaunch) -> ComputeResult<()> {
        self.prepare(launch.key)?;

        if launch.key.entry == "hold" {
            hold();
            return Ok(());
        }
        if launch.key.entry == "fail" {
            return Err(ComputeError::dispatch(
                DispatchCode::ExecutionFault,
                "division by zero",
            ));
        }

        let count = match launch.args[0] {
            KernelArg::Int(count) => count as usize,
            _ => unreachable!("validated by the dispatcher"),
        };
        let lhs = self.buffer(&launch.args[1])?;
        let rhs = self.buffer(&launch.args[2])?;
        let mut out = self.buffer(&launch.args[3])?;

        let global = launch.grid.partition.global() as usize;
        for i in 0..global.min(count) {
            out[i] = lhs[i] + rhs[i];
        }

        if let KernelArg::Buffer(handle) = &launch.args[3] {
            self.buffers
                .insert(handle.id(), bytemuck::cast_slice(&out).to_vec());
        }

        Ok(())
    }

    fn sync(&mut self) -> ComputeResult<()> {
        Ok(())
    }
}

/// Block the queue thread until [RELEASE_HOLD] is set, for at most five seconds.
fn hold() {
    let start = web_time::Instant::now();
    while !RELEASE_HOLD.load(Ordering::SeqCst) && start.elapsed() < Duration::from_secs(5) {
        std::thread::sleep(Duration::from_millis(1));
    }
}
