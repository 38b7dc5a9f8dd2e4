use std::sync::{Arc, Once};

use tilecl_cpu::{KernelFault, NativeKernel, WorkGroup, register};
use tilecl_runtime::{Access, ArgKind, KernelDefinition, ProgramSource};

pub const SCALE: KernelDefinition = KernelDefinition {
    entry: "scale",
    args: &[
        ArgKind::Int,
        ArgKind::Int,
        ArgKind::Buffer(Access::Read),
        ArgKind::Buffer(Access::Write),
    ],
};

pub const REVERSE: KernelDefinition = KernelDefinition {
    entry: "reverse",
    args: &[
        ArgKind::Buffer(Access::Read),
        ArgKind::Buffer(Access::Write),
        ArgKind::LocalScratch,
    ],
};

pub const RACY_REVERSE: KernelDefinition = KernelDefinition {
    entry: "racy_reverse",
    args: REVERSE.args,
};

pub const EXPLODE: KernelDefinition = KernelDefinition {
    entry: "explode",
    args: SCALE.args,
};

/// `out[i] = in[i] * factor` for `i < n`.
#[derive(Debug)]
struct Scale;

impl NativeKernel for Scale {
    fn definition(&self) -> KernelDefinition {
        SCALE
    }

    fn execute(&self, group: &mut WorkGroup<'_>) -> Result<(), KernelFault> {
        let n = group.int(0)?;
        let factor = group.int(1)? as f32;
        let input = group.buffer(2)?;
        let output = group.buffer(3)?;

        group.lanes(|lane| {
            let i = lane.global_x();
            if i < n {
                output.store(i as usize, input.load(i as usize)? * factor)?;
            }
            Ok(())
        })
    }
}

/// Reverses each group-sized block through local memory.
#[derive(Debug)]
struct Reverse {
    barrier: bool,
}

impl NativeKernel for Reverse {
    fn definition(&self) -> KernelDefinition {
        if self.barrier { REVERSE } else { RACY_REVERSE }
    }

    fn execute(&self, group: &mut WorkGroup<'_>) -> Result<(), KernelFault> {
        let size = group.size();
        let input = group.buffer(0)?;
        let output = group.buffer(1)?;

        group.lanes(|lane| {
            let value = input.load(lane.global_x() as usize)?;
            lane.store_local(lane.index() as usize, value)
        })?;
        if self.barrier {
            group.barrier();
        }
        group.lanes(|lane| {
            let value = lane.load_local((size - 1 - lane.index()) as usize)?;
            output.store(lane.global_x() as usize, value)
        })
    }
}

/// Copies like [Scale] but panics in the group whose id equals the `factor` argument.
#[derive(Debug)]
struct Explode;

impl NativeKernel for Explode {
    fn definition(&self) -> KernelDefinition {
        EXPLODE
    }

    fn execute(&self, group: &mut WorkGroup<'_>) -> Result<(), KernelFault> {
        let target = group.int(1)?;
        let input = group.buffer(2)?;
        let output = group.buffer(3)?;

        if group.id()[0] == target {
            panic!("group {target} exploded");
        }
        group.lanes(|lane| {
            let i = lane.global_x() as usize;
            output.store(i, input.load(i)?)
        })
    }
}

pub fn install() {
    static INSTALL: Once = Once::new();

    INSTALL.call_once(|| {
        register(Arc::new(Scale));
        register(Arc::new(Reverse { barrier: true }));
        register(Arc::new(Reverse { barrier: false }));
        register(Arc::new(Explode));
    });
}

pub fn program() -> ProgramSource {
    ProgramSource::new("host.wgsl", include_str!("host.wgsl"))
}
