use core::fmt::Display;

use crate::{AccessMode, BufferHandle, ComputeError, ComputeResult, ContextId, ProgramId};

/// How a kernel uses a buffer argument.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, derive_more::Display)]
pub enum Access {
    /// The kernel only reads the buffer.
    #[display("read")]
    Read,
    /// The kernel only writes the buffer.
    #[display("write")]
    Write,
    /// The kernel reads and writes the buffer.
    #[display("read_write")]
    ReadWrite,
}

impl Access {
    /// Whether a buffer created with `mode` can be bound with this access.
    pub fn accepts(&self, mode: AccessMode) -> bool {
        match self {
            Access::Read => mode.readable(),
            Access::Write => mode.writable(),
            Access::ReadWrite => mode.readable() && mode.writable(),
        }
    }
}

/// The kind of one kernel argument.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, derive_more::Display)]
pub enum ArgKind {
    /// A 32-bit unsigned integer passed by value.
    #[display("int")]
    Int,
    /// A device buffer.
    #[display("buffer({_0})")]
    Buffer(Access),
    /// A per-group local scratch allocation, given by size.
    #[display("local")]
    LocalScratch,
}

/// Host-side description of a kernel entry point.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct KernelDefinition {
    /// Entry point name in the program.
    pub entry: &'static str,
    /// Argument kinds by ordinal.
    pub args: &'static [ArgKind],
}

impl KernelDefinition {
    /// Ordinal of the local scratch argument, if the kernel has one.
    pub fn local_scratch_ordinal(&self) -> Option<usize> {
        self.args
            .iter()
            .position(|kind| matches!(kind, ArgKind::LocalScratch))
    }
}

impl Display for KernelDefinition {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}(", self.entry)?;
        for (ordinal, kind) in self.args.iter().enumerate() {
            if ordinal > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{kind}")?;
        }
        f.write_str(")")
    }
}

/// A kernel argument value.
#[derive(Clone, Debug, PartialEq)]
pub enum KernelArg {
    /// An integer value.
    Int(u32),
    /// A device buffer.
    Buffer(BufferHandle),
    /// Local scratch of the given size in bytes.
    LocalScratch(usize),
}

impl KernelArg {
    fn kind_name(&self) -> &'static str {
        match self {
            KernelArg::Int(_) => "int",
            KernelArg::Buffer(_) => "buffer",
            KernelArg::LocalScratch(_) => "local",
        }
    }
}

impl From<u32> for KernelArg {
    fn from(value: u32) -> Self {
        Self::Int(value)
    }
}

impl From<&BufferHandle> for KernelArg {
    fn from(handle: &BufferHandle) -> Self {
        Self::Buffer(handle.clone())
    }
}

/// A kernel of a built program with its argument bindings.
///
/// Arguments keep their value across submissions, so a kernel can be resubmitted after
/// rebinding only what changed.
#[derive(Clone, Debug)]
pub struct Kernel {
    definition: KernelDefinition,
    program: ProgramId,
    context: ContextId,
    args: Vec<Option<KernelArg>>,
}

impl Kernel {
    pub(crate) fn new(definition: KernelDefinition, program: ProgramId, context: ContextId) -> Self {
        Self {
            definition,
            program,
            context,
            args: vec![None; definition.args.len()],
        }
    }

    /// The kernel definition.
    pub fn definition(&self) -> &KernelDefinition {
        &self.definition
    }

    /// The entry point name.
    pub fn name(&self) -> &'static str {
        self.definition.entry
    }

    /// The program the kernel belongs to.
    pub fn program(&self) -> ProgramId {
        self.program
    }

    /// The context the kernel was created on.
    pub fn context(&self) -> ContextId {
        self.context
    }

    /// Bind one argument.
    pub fn set_arg<A: Into<KernelArg>>(&mut self, ordinal: usize, arg: A) -> ComputeResult<()> {
        let arg = arg.into();
        let Some(kind) = self.definition.args.get(ordinal) else {
            return Err(self.mismatch(
                ordinal,
                format!(
                    "the kernel takes {} argument(s)",
                    self.definition.args.len()
                ),
            ));
        };

        match (kind, &arg) {
            (ArgKind::Int, KernelArg::Int(_)) => {}
            (ArgKind::Buffer(access), KernelArg::Buffer(handle)) => {
                if handle.context() != self.context {
                    return Err(ComputeError::InvalidHandle {
                        id: handle.id().value(),
                    });
                }
                if !access.accepts(handle.mode()) {
                    return Err(self.mismatch(
                        ordinal,
                        format!(
                            "a {} buffer can't be bound with {access} access",
                            handle.mode()
                        ),
                    ));
                }
            }
            (ArgKind::LocalScratch, KernelArg::LocalScratch(size)) => {
                if *size == 0 {
                    return Err(self.mismatch(ordinal, "local scratch of zero bytes"));
                }
            }
            (kind, arg) => {
                return Err(self.mismatch(
                    ordinal,
                    format!("expected {kind}, got {}", arg.kind_name()),
                ));
            }
        }

        self.args[ordinal] = Some(arg);
        Ok(())
    }

    /// Bind several arguments by ordinal. Stops at the first invalid one.
    pub fn bind_arguments<I, A>(&mut self, args: I) -> ComputeResult<()>
    where
        I: IntoIterator<Item = (usize, A)>,
        A: Into<KernelArg>,
    {
        for (ordinal, arg) in args {
            self.set_arg(ordinal, arg)?;
        }
        Ok(())
    }

    /// The bound arguments, failing on the first unbound ordinal.
    pub fn arguments(&self) -> ComputeResult<Vec<KernelArg>> {
        self.args
            .iter()
            .enumerate()
            .map(|(ordinal, arg)| {
                arg.clone()
                    .ok_or_else(|| self.mismatch(ordinal, "argument not bound"))
            })
            .collect()
    }

    fn mismatch(&self, ordinal: usize, reason: impl Into<String>) -> ComputeError {
        ComputeError::ArgumentMismatch {
            kernel: self.definition.entry.to_string(),
            ordinal,
            reason: reason.into(),
        }
    }
}
