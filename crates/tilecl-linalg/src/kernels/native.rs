use std::sync::{Arc, Once};

use tilecl_cpu::{KernelFault, NativeKernel, WorkGroup, register};
use tilecl_runtime::KernelDefinition;

use super::{MMUL, MMUL_NAIVE, VADD, VADD3};

#[derive(Debug)]
struct Vadd;

impl NativeKernel for Vadd {
    fn definition(&self) -> KernelDefinition {
        VADD
    }

    fn execute(&self, group: &mut WorkGroup<'_>) -> Result<(), KernelFault> {
        let a = group.buffer(0)?;
        let b = group.buffer(1)?;
        let c = group.buffer(2)?;
        let count = group.int(3)?;

        group.lanes(|lane| {
            let i = lane.global_x();
            if i < count {
                let i = i as usize;
                c.store(i, a.load(i)? + b.load(i)?)?;
            }
            Ok(())
        })
    }
}

#[derive(Debug)]
struct Vadd3;

impl NativeKernel for Vadd3 {
    fn definition(&self) -> KernelDefinition {
        VADD3
    }

    fn execute(&self, group: &mut WorkGroup<'_>) -> Result<(), KernelFault> {
        let a = group.buffer(0)?;
        let b = group.buffer(1)?;
        let c = group.buffer(2)?;
        let d = group.buffer(3)?;
        let count = group.int(4)?;

        group.lanes(|lane| {
            let i = lane.global_x();
            if i < count {
                let i = i as usize;
                d.store(i, a.load(i)? + b.load(i)? + c.load(i)?)?;
            }
            Ok(())
        })
    }
}

#[derive(Debug)]
struct Mmul;

impl NativeKernel for Mmul {
    fn definition(&self) -> KernelDefinition {
        MMUL
    }

    fn execute(&self, group: &mut WorkGroup<'_>) -> Result<(), KernelFault> {
        let n = group.int(0)? as usize;
        let a = group.buffer(1)?;
        let b = group.buffer(2)?;
        let c = group.buffer(3)?;
        let i = group.id()[1] as usize;

        group.lane(0, |lane| {
            for k in 0..n {
                lane.store_local(k, a.load(i * n + k)?)?;
            }
            Ok(())
        })?;
        group.barrier();

        group.lanes(|lane| {
            let j = lane.global_x() as usize;
            let mut sum = 0.0f32;
            for k in 0..n {
                sum += lane.load_local(k)? * b.load(k * n + j)?;
            }
            c.store(i * n + j, sum)
        })
    }
}

#[derive(Debug)]
struct MmulNaive;

impl NativeKernel for MmulNaive {
    fn definition(&self) -> KernelDefinition {
        MMUL_NAIVE
    }

    fn execute(&self, group: &mut WorkGroup<'_>) -> Result<(), KernelFault> {
        let n = group.int(0)? as usize;
        let a = group.buffer(1)?;
        let b = group.buffer(2)?;
        let c = group.buffer(3)?;
        let i = group.id()[1] as usize;

        group.lanes(|lane| {
            let j = lane.global_x() as usize;
            let mut sum = 0.0f32;
            for k in 0..n {
                sum += a.load(i * n + k)? * b.load(k * n + j)?;
            }
            c.store(i * n + j, sum)
        })
    }
}

pub(super) fn install() {
    static INSTALL: Once = Once::new();

    INSTALL.call_once(|| {
        register(Arc::new(Vadd));
        register(Arc::new(Vadd3));
        register(Arc::new(Mmul));
        register(Arc::new(MmulNaive));
    });
}

#[cfg(test)]
mod tests {
    use tilecl_cpu::kernel::{GlobalBuffer, GroupArg, LocalScratch};
    use tilecl_runtime::Access;

    use super::*;

    // A = [1 2; 3 4], B = [5 6; 7 8], A * B = [19 22; 43 50].
    fn matmul_args(c: &GlobalBuffer) -> Vec<GroupArg> {
        vec![
            GroupArg::Int(2),
            GroupArg::Buffer(GlobalBuffer::from_values(1, Access::Read, &[1.0, 2.0, 3.0, 4.0])),
            GroupArg::Buffer(GlobalBuffer::from_values(2, Access::Read, &[5.0, 6.0, 7.0, 8.0])),
            GroupArg::Buffer(c.clone()),
            GroupArg::LocalScratch(2),
        ]
    }

    #[test]
    fn one_group_computes_one_row() {
        let c = GlobalBuffer::from_values(3, Access::Write, &[0.0; 4]);
        let args = matmul_args(&c);
        let mut scratch = LocalScratch::new(2);

        let mut group = WorkGroup::new([0, 1], [1, 2], 2, &args, &mut scratch);
        Mmul.execute(&mut group).unwrap();

        assert_eq!(c.values(), vec![0.0, 0.0, 43.0, 50.0]);
    }

    #[test]
    fn naive_matches_tiled() {
        let tiled = GlobalBuffer::from_values(3, Access::Write, &[0.0; 4]);
        let naive = GlobalBuffer::from_values(3, Access::Write, &[0.0; 4]);

        for row in 0..2 {
            let args = matmul_args(&tiled);
            let mut scratch = LocalScratch::new(2);
            Mmul.execute(&mut WorkGroup::new([0, row], [1, 2], 2, &args, &mut scratch))
                .unwrap();

            let args = matmul_args(&naive);
            let mut scratch = LocalScratch::new(2);
            MmulNaive
                .execute(&mut WorkGroup::new([0, row], [1, 2], 2, &args, &mut scratch))
                .unwrap();
        }

        assert_eq!(tiled.values(), vec![19.0, 22.0, 43.0, 50.0]);
        assert_eq!(tiled.values(), naive.values());
    }

    #[test]
    fn tile_shorter_than_a_row() {
        let c = GlobalBuffer::from_values(3, Access::Write, &[0.0; 4]);
        let args = matmul_args(&c);
        let mut scratch = LocalScratch::new(1);

        let mut group = WorkGroup::new([0, 0], [1, 2], 2, &args, &mut scratch);

        assert_eq!(
            Mmul.execute(&mut group),
            Err(KernelFault::ScratchOutOfBounds { slot: 1, len: 1 })
        );
    }
}
