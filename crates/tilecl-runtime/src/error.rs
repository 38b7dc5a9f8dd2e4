use thiserror::Error;

/// Result type used across the runtime.
pub type ComputeResult<T> = Result<T, ComputeError>;

/// Every failure a run can hit. None of them is retried: the current execution path stops and
/// the error is reported.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ComputeError {
    /// The device handle doesn't name an openable device.
    #[error("The device is unavailable\nCaused by:\n  {reason}")]
    DeviceUnavailable {
        /// Why the device couldn't be opened.
        reason: String,
    },

    /// The requested device index exceeds the enumerated device count.
    #[error("Invalid device index {index}, {count} device(s) available (try '--list')")]
    DeviceIndexOutOfRange {
        /// Requested index.
        index: usize,
        /// Number of enumerated devices.
        count: usize,
    },

    /// The program couldn't be compiled for the device.
    #[error("Program build failed\nBuild log:\n{log}")]
    BuildFailure {
        /// Compiler diagnostics.
        log: String,
    },

    /// A kernel was requested before any program was built.
    #[error("No program has been built on this context")]
    ProgramNotBuilt,

    /// The device can't hold the requested buffer.
    #[error(
        "Buffer allocation failed\nRequested {requested} bytes, {available} bytes available"
    )]
    AllocationFailure {
        /// Requested size in bytes.
        requested: u64,
        /// Remaining capacity in bytes.
        available: u64,
    },

    /// The buffer handle was released or belongs to another context.
    #[error("Invalid buffer handle {id}")]
    InvalidHandle {
        /// Raw buffer id.
        id: u64,
    },

    /// A host/device transfer doesn't match the buffer size.
    #[error("Transfer size mismatch: buffer holds {expected} bytes, host side has {found} bytes")]
    TransferMismatch {
        /// Device buffer size in bytes.
        expected: u64,
        /// Host region size in bytes.
        found: u64,
    },

    /// A kernel argument doesn't match the kernel signature.
    #[error("Argument mismatch for kernel '{kernel}' at ordinal {ordinal}: {reason}")]
    ArgumentMismatch {
        /// Kernel entry point.
        kernel: String,
        /// Argument ordinal.
        ordinal: usize,
        /// What went wrong.
        reason: String,
    },

    /// The work partition violates the device or divisibility constraints.
    #[error("Invalid work partition: {reason}")]
    PartitionError {
        /// What went wrong.
        reason: String,
    },

    /// The per-group local memory request exceeds the device capacity.
    #[error(
        "Insufficient local memory\nRequested {requested} bytes per work-group, {available} bytes available"
    )]
    InsufficientLocalMemory {
        /// Requested size in bytes.
        requested: usize,
        /// Device capacity in bytes.
        available: usize,
    },

    /// Any other device runtime failure.
    #[error("Runtime dispatch error ({code})\nCaused by:\n  {reason}")]
    RuntimeDispatchError {
        /// Error code.
        code: DispatchCode,
        /// What went wrong.
        reason: String,
    },
}

impl ComputeError {
    /// Shorthand for a [runtime dispatch error](ComputeError::RuntimeDispatchError).
    pub fn dispatch(code: DispatchCode, reason: impl Into<String>) -> Self {
        Self::RuntimeDispatchError {
            code,
            reason: reason.into(),
        }
    }
}

/// Error codes carried by [ComputeError::RuntimeDispatchError].
///
/// The numeric values follow the OpenCL status codes with the same meaning.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, derive_more::Display)]
#[repr(i32)]
pub enum DispatchCode {
    /// The device ran out of resources while executing.
    #[display("CL_OUT_OF_RESOURCES")]
    OutOfResources = -5,
    /// A kernel faulted while executing.
    #[display("CL_EXEC_STATUS_ERROR")]
    ExecutionFault = -14,
    /// The command queue is gone.
    #[display("CL_INVALID_COMMAND_QUEUE")]
    InvalidQueue = -36,
    /// The kernel couldn't be created or specialised.
    #[display("CL_INVALID_KERNEL")]
    InvalidKernel = -48,
    /// The launch grid is invalid for the device.
    #[display("CL_INVALID_WORK_DIMENSION")]
    InvalidGrid = -53,
    /// The device reported an error outside of the other categories.
    #[display("CL_DEVICE_ERROR")]
    Device = -9999,
}

impl DispatchCode {
    /// The raw status value.
    pub fn value(self) -> i32 {
        self as i32
    }
}
