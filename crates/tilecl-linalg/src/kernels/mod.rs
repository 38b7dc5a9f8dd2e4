#[cfg(feature = "cpu")]
mod native;

use tilecl_runtime::{
    Access, ArgKind, ComputeResult, ExecutionContext, KernelDefinition, Program, ProgramSource,
    Runtime,
};

/// Tiled matrix multiplication: `mmul(n, a, b, c, tile)`.
///
/// Lane 0 of each group copies row `i` of `a` into the local tile; after a barrier each lane
/// computes one element of row `i` of `c`.
pub const MMUL: KernelDefinition = KernelDefinition {
    entry: "mmul",
    args: MATMUL_ARGS,
};

/// Matrix multiplication reading `a` from global memory. It takes the same arguments as
/// [MMUL] and ignores the tile.
pub const MMUL_NAIVE: KernelDefinition = KernelDefinition {
    entry: "mmul_naive",
    args: MATMUL_ARGS,
};

/// `c = a + b` over the first `count` elements: `vadd(a, b, c, count)`.
pub const VADD: KernelDefinition = KernelDefinition {
    entry: "vadd",
    args: &[
        ArgKind::Buffer(Access::Read),
        ArgKind::Buffer(Access::Read),
        ArgKind::Buffer(Access::Write),
        ArgKind::Int,
    ],
};

/// `d = a + b + c` over the first `count` elements: `vadd3(a, b, c, d, count)`.
pub const VADD3: KernelDefinition = KernelDefinition {
    entry: "vadd3",
    args: &[
        ArgKind::Buffer(Access::Read),
        ArgKind::Buffer(Access::Read),
        ArgKind::Buffer(Access::Read),
        ArgKind::Buffer(Access::Write),
        ArgKind::Int,
    ],
};

const MATMUL_ARGS: &[ArgKind] = &[
    ArgKind::Int,
    ArgKind::Buffer(Access::Read),
    ArgKind::Buffer(Access::Read),
    ArgKind::Buffer(Access::Write),
    ArgKind::LocalScratch,
];

/// The matrix multiplication program, holding [MMUL] and [MMUL_NAIVE].
pub fn matmul_source() -> ProgramSource {
    ProgramSource::new("matmul.wgsl", include_str!("matmul.wgsl"))
}

/// The two-input vector addition program, holding [VADD].
pub fn vadd_source() -> ProgramSource {
    ProgramSource::new("vadd.wgsl", include_str!("vadd.wgsl"))
}

/// The three-input vector addition program, holding [VADD3].
pub fn vadd3_source() -> ProgramSource {
    ProgramSource::new("vadd3.wgsl", include_str!("vadd3.wgsl"))
}

/// Build a program of this crate on a context.
///
/// On the host device the native implementations of the entry points are registered first.
pub fn build<'a, R: Runtime>(
    context: &'a mut ExecutionContext<R>,
    source: ProgramSource,
    options: &str,
) -> ComputeResult<&'a Program> {
    install_native();
    context.build(source, options)
}

/// Register the native kernels of this crate with the host device.
pub fn install_native() {
    #[cfg(feature = "cpu")]
    native::install();
}
