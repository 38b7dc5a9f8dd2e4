use std::sync::Arc;

use hashbrown::HashMap;
use tilecl_runtime::{
    ArgKind, BufferId, ComputeError, ComputeResult, DeviceProperties, DispatchCode, KernelArg,
    KernelDefinition, Program, ProgramId,
    server::{ComputeServer, KernelKey, KernelLaunch},
};

use super::{CpuStorage, Scheduler, sentinel_word};
use crate::kernel::{self, GroupArg, NativeKernel};

/// Executes commands on the host-emulated device.
///
/// Building a program binds every entry point to its registered native kernel. Launches run
/// synchronously on the scheduler, so by the time `execute` returns the work is done.
#[derive(Debug)]
pub struct CpuServer {
    properties: DeviceProperties,
    fill_sentinel: bool,
    storage: CpuStorage,
    scheduler: Scheduler,
    programs: HashMap<ProgramId, CpuProgram>,
}

#[derive(new, Debug)]
struct CpuProgram {
    program: Arc<Program>,
    kernels: HashMap<String, Arc<dyn NativeKernel>>,
}

impl CpuServer {
    /// Create a server with `workers` threads.
    pub fn new(
        properties: DeviceProperties,
        workers: usize,
        fill_sentinel: bool,
    ) -> ComputeResult<Self> {
        Ok(Self {
            properties,
            fill_sentinel,
            storage: CpuStorage::default(),
            scheduler: Scheduler::new(workers)?,
            programs: HashMap::new(),
        })
    }

    /// Capabilities of the emulated device.
    pub fn properties(&self) -> &DeviceProperties {
        &self.properties
    }

    fn native(&self, program: ProgramId, entry: &str) -> ComputeResult<&Arc<dyn NativeKernel>> {
        let program = self.programs.get(&program).ok_or_else(|| {
            ComputeError::dispatch(
                DispatchCode::InvalidKernel,
                format!("program {program} isn't built on this device"),
            )
        })?;

        program
            .kernels
            .get(entry)
            .ok_or_else(|| ComputeError::ArgumentMismatch {
                kernel: entry.to_string(),
                ordinal: 0,
                reason: format!("{} has no entry point named '{entry}'", program.program.source().name()),
            })
    }

    fn resolve(
        &self,
        definition: &KernelDefinition,
        args: &[KernelArg],
    ) -> ComputeResult<Vec<GroupArg>> {
        args.iter()
            .enumerate()
            .map(|(ordinal, arg)| match (arg, definition.args.get(ordinal)) {
                (KernelArg::Int(value), Some(ArgKind::Int)) => Ok(GroupArg::Int(*value)),
                (KernelArg::Buffer(handle), Some(ArgKind::Buffer(access))) => self
                    .storage
                    .bind(handle.id(), ordinal, *access)
                    .map(GroupArg::Buffer),
                (KernelArg::LocalScratch(bytes), Some(ArgKind::LocalScratch)) => Ok(
                    GroupArg::LocalScratch(bytes.div_ceil(size_of::<f32>())),
                ),
                (_, kind) => Err(ComputeError::ArgumentMismatch {
                    kernel: definition.entry.to_string(),
                    ordinal,
                    reason: match kind {
                        Some(kind) => format!("the native kernel expects {kind}"),
                        None => "the native kernel has no such argument".into(),
                    },
                }),
            })
            .collect()
    }
}

impl ComputeServer for CpuServer {
    fn build(&mut self, program: Arc<Program>) -> ComputeResult<String> {
        let mut kernels = HashMap::new();
        let mut missing = Vec::new();

        for entry in program.entry_points() {
            match kernel::lookup(entry) {
                Some(native) => {
                    kernels.insert(entry.clone(), native);
                }
                None => missing.push(entry.as_str()),
            }
        }

        if !missing.is_empty() {
            return Err(ComputeError::BuildFailure {
                log: format!(
                    "{}: no native implementation for entry point(s) {}\nAvailable: {}",
                    program.source().name(),
                    missing.join(", "),
                    kernel::registered().join(", ")
                ),
            });
        }

        let log = format!(
            "{}: bound {} entry point(s) to native kernels",
            program.source().name(),
            kernels.len()
        );
        self.programs
            .insert(program.id(), CpuProgram::new(program, kernels));

        Ok(log)
    }

    fn check_kernel(
        &mut self,
        program: ProgramId,
        definition: &KernelDefinition,
    ) -> ComputeResult<()> {
        let native = self.native(program, definition.entry)?.definition();
        let expected = native.args;
        let found = definition.args;

        let mismatch = expected
            .iter()
            .zip(found.iter())
            .position(|(expected, found)| expected != found)
            .or((expected.len() != found.len()).then(|| expected.len().min(found.len())));

        match mismatch {
            None => Ok(()),
            Some(ordinal) => Err(ComputeError::ArgumentMismatch {
                kernel: definition.entry.to_string(),
                ordinal,
                reason: format!("the device kernel is {native}, the host declares {definition}"),
            }),
        }
    }

    fn prepare(&mut self, key: KernelKey) -> ComputeResult<()> {
        self.native(key.program, key.entry)?;
        log::trace!(
            "Prepared {} for work-groups of {} and tiles of {}",
            key.entry,
            key.workgroup_size,
            key.tile_len
        );

        Ok(())
    }

    fn create(&mut self, id: BufferId, data: Vec<u8>) -> ComputeResult<()> {
        self.storage.create(id, &data);
        Ok(())
    }

    fn empty(&mut self, id: BufferId, size: u64) -> ComputeResult<()> {
        let fill = if self.fill_sentinel { sentinel_word() } else { 0 };
        self.storage.empty(id, size, fill);
        Ok(())
    }

    fn read(&mut self, id: BufferId) -> ComputeResult<Vec<u8>> {
        self.storage.read(id)
    }

    fn release(&mut self, id: BufferId) {
        self.storage.release(id);
    }

    fn execute(&mut self, launch: KernelLaunch) -> ComputeResult<()> {
        self.prepare(launch.key)?;

        let native = self.native(launch.key.program, launch.key.entry)?.clone();
        let args = self.resolve(&native.definition(), &launch.args)?;
        let tile_len = args
            .iter()
            .find_map(|arg| match arg {
                GroupArg::LocalScratch(slots) => Some(*slots),
                _ => None,
            })
            .unwrap_or(0);

        log::trace!(
            "Running {} over {:?} groups on {} worker(s)",
            launch.key.entry,
            launch.grid.group_count(),
            self.scheduler.worker_count()
        );

        self.scheduler.execute(native, args, &launch.grid, tile_len)
    }

    fn sync(&mut self) -> ComputeResult<()> {
        Ok(())
    }
}
