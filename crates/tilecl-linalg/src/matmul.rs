use core::{fmt::Display, time::Duration};

use tilecl_runtime::{
    AccessMode, BufferHandle, ComputeError, ComputeResult, ExecutionContext, Kernel, KernelArg,
    KernelDefinition, KernelDispatcher, LaunchGrid, Runtime, WorkPartition,
};
use web_time::Instant;

use crate::{
    HostMatrix,
    kernels::{MMUL, MMUL_NAIVE},
};

/// Which matrix multiplication kernel to launch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum MatmulStrategy {
    /// Rows of `A` staged in local memory.
    #[default]
    Tiled,
    /// Everything read from global memory.
    Naive,
}

impl MatmulStrategy {
    /// The kernel implementing the strategy.
    pub fn definition(&self) -> KernelDefinition {
        match self {
            MatmulStrategy::Tiled => MMUL,
            MatmulStrategy::Naive => MMUL_NAIVE,
        }
    }
}

impl Display for MatmulStrategy {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            MatmulStrategy::Tiled => f.write_str("tiled"),
            MatmulStrategy::Naive => f.write_str("naive"),
        }
    }
}

/// `C = A * B` on the host, accumulating in `f32` in increasing `k` like the device kernels.
pub fn host_matmul(a: &HostMatrix, b: &HostMatrix, c: &mut HostMatrix) {
    let n = a.order();

    for i in 0..n {
        for j in 0..n {
            let mut sum = 0.0f32;
            for k in 0..n {
                sum += a.get(i, k) * b.get(k, j);
            }
            c.as_mut_slice()[i * n + j] = sum;
        }
    }
}

/// Launches a matrix multiplication kernel of a context.
///
/// The context must hold the [matmul program](crate::kernels::matmul_source).
#[derive(Debug)]
pub struct MatmulLauncher<R: Runtime> {
    strategy: MatmulStrategy,
    kernel: Kernel,
    dispatcher: KernelDispatcher<R>,
}

impl<R: Runtime> MatmulLauncher<R> {
    /// Create a launcher for the kernel of `strategy`.
    pub fn new(context: &ExecutionContext<R>, strategy: MatmulStrategy) -> ComputeResult<Self> {
        Ok(Self {
            strategy,
            kernel: context.kernel(&strategy.definition())?,
            dispatcher: context.dispatcher(),
        })
    }

    /// The strategy.
    pub fn strategy(&self) -> MatmulStrategy {
        self.strategy
    }

    /// The partition of a row of `order` elements, from an explicit local extent or derived
    /// from the device.
    pub fn partition(&self, order: u32, local: Option<u32>) -> ComputeResult<WorkPartition> {
        match local {
            Some(local) => WorkPartition::new(order, local, self.dispatcher.properties()),
            None => self.dispatcher.compute_work_partition(order),
        }
    }

    /// Enqueue `c = a * b` for matrices of `order`. Returns without waiting.
    ///
    /// The local tile of `order` floats is requested before anything is bound, so a device
    /// with too little local memory fails before submission. Each buffer must hold exactly
    /// `order * order` floats.
    pub fn launch(
        &mut self,
        order: u32,
        a: &BufferHandle,
        b: &BufferHandle,
        c: &BufferHandle,
        local: Option<u32>,
    ) -> ComputeResult<WorkPartition> {
        let partition = self.partition(order, local)?;
        let tile = self
            .dispatcher
            .request_local_scratch(order as usize * size_of::<f32>())?;

        let expected = u64::from(order) * u64::from(order) * size_of::<f32>() as u64;
        for (ordinal, handle) in [(1, a), (2, b), (3, c)] {
            if handle.size() != expected {
                return Err(ComputeError::ArgumentMismatch {
                    kernel: self.strategy.definition().entry.to_string(),
                    ordinal,
                    reason: format!(
                        "a matrix of order {order} needs {expected} bytes, the buffer has {}",
                        handle.size()
                    ),
                });
            }
        }

        self.kernel.bind_arguments([
            (0, KernelArg::Int(order)),
            (1, KernelArg::from(a)),
            (2, KernelArg::from(b)),
            (3, KernelArg::from(c)),
            (4, tile),
        ])?;
        self.dispatcher
            .submit(&self.kernel, LaunchGrid::new(partition, order))?;

        Ok(partition)
    }
}

/// Outcome of a timed device multiplication.
#[derive(new, Debug)]
pub struct MatmulRun {
    /// The downloaded product.
    pub product: HostMatrix,
    /// The partition used.
    pub partition: WorkPartition,
    /// Time from submission until the queue drained.
    pub duration: Duration,
}

/// Upload `a` and `b`, multiply them on the device and download the product.
///
/// Both matrices must have the same order; nothing is uploaded otherwise.
///
/// The product is downloaded into a sentinel-filled matrix so unwritten elements stay
/// recognisable. The device buffers are released before returning.
pub fn run_matmul<R: Runtime>(
    context: &ExecutionContext<R>,
    strategy: MatmulStrategy,
    a: &HostMatrix,
    b: &HostMatrix,
    local: Option<u32>,
) -> ComputeResult<MatmulRun> {
    if b.order() != a.order() {
        return Err(ComputeError::TransferMismatch {
            expected: (a.len() * size_of::<f32>()) as u64,
            found: (b.len() * size_of::<f32>()) as u64,
        });
    }
    let order = u32::try_from(a.order()).map_err(|_| ComputeError::PartitionError {
        reason: format!("order {} doesn't fit a launch", a.order()),
    })?;
    let buffers = context.buffers();
    let mut launcher = MatmulLauncher::new(context, strategy)?;

    let d_a = buffers.upload(a.as_slice(), AccessMode::ReadOnly)?;
    let d_b = buffers.upload(b.as_slice(), AccessMode::ReadOnly)?;
    let d_c = buffers.allocate(
        (a.len() * size_of::<f32>()) as u64,
        AccessMode::WriteOnly,
    )?;

    let start = Instant::now();
    let partition = launcher.launch(order, &d_a, &d_b, &d_c, local)?;
    context.finish()?;
    let duration = start.elapsed();

    let mut product = HostMatrix::sentinel(a.order());
    buffers.download(&d_c, product.as_mut_slice())?;

    for handle in [d_a, d_b, d_c] {
        buffers.release(&handle)?;
    }

    log::debug!(
        "{strategy} matmul of order {order} on groups of {} took {duration:?}",
        partition.local()
    );

    Ok(MatmulRun::new(product, partition, duration))
}
