#![allow(missing_docs)]

use tilecl_runtime::{ExecutionContext, ProgramSource, Runtime};

pub mod device;

/// Open the first device of `R` with `source` built, or `None` when the runtime has no device.
pub fn context_with<R: Runtime>(source: ProgramSource) -> Option<ExecutionContext<R>> {
    let catalog = R::catalog().ok()?;
    if catalog.is_empty() {
        log::warn!("No {} device, skipping", R::name());
        return None;
    }

    let mut context =
        ExecutionContext::<R>::from_catalog(&catalog, 0).expect("Should open the first device");
    crate::kernels::build(&mut context, source, "").expect("Should build the program");

    Some(context)
}

// Generates the shared suite for a runtime. The caller defines `TestRuntime`.
#[macro_export]
macro_rules! testgen_linalg {
    // Every test runs.
    () => {
        $crate::testgen_linalg!(@suite [] None);
    };

    // The large random multiplication is ignored, for slow devices.
    (ignore_large) => {
        $crate::testgen_linalg!(@suite [#[ignore = "slow on this device"]] None);
    };

    // The random multiplications compare with a custom absolute tolerance.
    (random_tolerance = $tolerance:expr) => {
        $crate::testgen_linalg!(@suite [] Some($tolerance));
    };

    (@suite [$(#[$large:meta])*] $tolerance:expr) => {
        mod test_linalg {
            use super::*;

            #[test]
            fn device_index_out_of_range() {
                $crate::tests::device::test_index_out_of_range::<TestRuntime>();
            }

            #[test]
            fn partition_of_powers_of_two() {
                $crate::tests::device::test_partition_powers_of_two::<TestRuntime>();
            }

            #[test]
            fn vadd_chain() {
                $crate::tests::vadd::test_vadd_chain::<TestRuntime>(1024);
            }

            #[test]
            fn vadd_chain_odd_length() {
                $crate::tests::vadd::test_vadd_chain::<TestRuntime>(1000);
            }

            #[test]
            fn vadd3() {
                $crate::tests::vadd::test_vadd3::<TestRuntime>(4096);
            }

            #[test]
            fn matmul_constant() {
                $crate::tests::matmul::test_constant::<TestRuntime>(64);
            }

            #[test]
            fn matmul_tiled_matches_naive() {
                $crate::tests::matmul::test_tiled_matches_naive::<TestRuntime>(128);
            }

            #[test]
            fn matmul_random_small() {
                $crate::tests::matmul::test_random::<TestRuntime>(32, $tolerance);
            }

            #[test]
            $(#[$large])*
            fn matmul_random_large() {
                $crate::tests::matmul::test_random::<TestRuntime>(1024, $tolerance);
            }

            #[test]
            fn matmul_rerun_is_idempotent() {
                $crate::tests::matmul::test_rerun::<TestRuntime>(64);
            }

            #[test]
            fn matmul_explicit_local_size() {
                $crate::tests::matmul::test_explicit_local::<TestRuntime>(64, 16);
            }

            #[test]
            fn matmul_mismatched_sizes() {
                $crate::tests::matmul::test_mismatched_sizes::<TestRuntime>(64);
            }

            #[test]
            fn matmul_insufficient_local_memory() {
                $crate::tests::matmul::test_insufficient_local_memory::<TestRuntime>();
            }
        }
    };
}
