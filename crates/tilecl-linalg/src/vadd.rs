use tilecl_runtime::{
    AccessMode, BufferHandle, ComputeError, ComputeResult, ExecutionContext, Kernel, KernelArg,
    KernelDispatcher, Runtime,
};

use crate::kernels::{VADD, VADD3};

/// Launches `c = a + b` on a context holding the [vadd program](crate::kernels::vadd_source).
#[derive(Debug)]
pub struct VaddLauncher<R: Runtime> {
    kernel: Kernel,
    dispatcher: KernelDispatcher<R>,
}

impl<R: Runtime> VaddLauncher<R> {
    /// Create the launcher.
    pub fn new(context: &ExecutionContext<R>) -> ComputeResult<Self> {
        Ok(Self {
            kernel: context.kernel(&VADD)?,
            dispatcher: context.dispatcher(),
        })
    }

    /// Enqueue `c = a + b` over `count` elements.
    pub fn launch(
        &mut self,
        a: &BufferHandle,
        b: &BufferHandle,
        c: &BufferHandle,
        count: u32,
    ) -> ComputeResult<()> {
        self.kernel.bind_arguments([
            (0, KernelArg::from(a)),
            (1, KernelArg::from(b)),
            (2, KernelArg::from(c)),
            (3, KernelArg::Int(count)),
        ])?;

        let partition = self.dispatcher.compute_work_partition(count)?;
        self.dispatcher.submit(&self.kernel, partition)
    }

    /// Compute `a + b + e + g` with three dependent launches and no host wait in between.
    ///
    /// The intermediates stay on the device and are released once the last launch is
    /// enqueued; the returned buffer is owned by the caller.
    pub fn chain(
        &mut self,
        context: &ExecutionContext<R>,
        a: &BufferHandle,
        b: &BufferHandle,
        e: &BufferHandle,
        g: &BufferHandle,
    ) -> ComputeResult<BufferHandle> {
        let count = element_count(a)?;
        let buffers = context.buffers();

        let c = buffers.allocate(a.size(), AccessMode::ReadWrite)?;
        let d = buffers.allocate(a.size(), AccessMode::ReadWrite)?;
        let f = buffers.allocate(a.size(), AccessMode::ReadWrite)?;

        self.launch(a, b, &c, count)?;
        self.launch(&c, e, &d, count)?;
        self.launch(&d, g, &f, count)?;

        buffers.release(&c)?;
        buffers.release(&d)?;

        Ok(f)
    }
}

/// Launches `d = a + b + c` on a context holding the
/// [vadd3 program](crate::kernels::vadd3_source).
#[derive(Debug)]
pub struct Vadd3Launcher<R: Runtime> {
    kernel: Kernel,
    dispatcher: KernelDispatcher<R>,
}

impl<R: Runtime> Vadd3Launcher<R> {
    /// Create the launcher.
    pub fn new(context: &ExecutionContext<R>) -> ComputeResult<Self> {
        Ok(Self {
            kernel: context.kernel(&VADD3)?,
            dispatcher: context.dispatcher(),
        })
    }

    /// Enqueue `d = a + b + c` over `count` elements.
    pub fn launch(
        &mut self,
        a: &BufferHandle,
        b: &BufferHandle,
        c: &BufferHandle,
        d: &BufferHandle,
        count: u32,
    ) -> ComputeResult<()> {
        self.kernel.bind_arguments([
            (0, KernelArg::from(a)),
            (1, KernelArg::from(b)),
            (2, KernelArg::from(c)),
            (3, KernelArg::from(d)),
            (4, KernelArg::Int(count)),
        ])?;

        let partition = self.dispatcher.compute_work_partition(count)?;
        self.dispatcher.submit(&self.kernel, partition)
    }
}

/// Element-wise sum of host vectors.
pub fn host_vadd(inputs: &[&[f32]]) -> Vec<f32> {
    let len = inputs.first().map(|input| input.len()).unwrap_or(0);

    (0..len)
        .map(|i| inputs.iter().fold(0.0f32, |sum, input| sum + input[i]))
        .collect()
}

fn element_count(handle: &BufferHandle) -> ComputeResult<u32> {
    u32::try_from(handle.size() / size_of::<f32>() as u64).map_err(|_| {
        ComputeError::PartitionError {
            reason: format!("{} bytes is too many elements for one launch", handle.size()),
        }
    })
}
