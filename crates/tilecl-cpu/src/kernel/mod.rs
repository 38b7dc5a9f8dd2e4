//! Native kernels standing in for program entry points.

mod buffer;
mod group;

pub use buffer::GlobalBuffer;
pub use group::{GroupArg, Lane, LocalScratch, WorkGroup};

use std::sync::Arc;

use tilecl_runtime::{Access, KernelDefinition};

/// A kernel implemented in Rust, executed one work-group at a time.
///
/// The lanes of a group run one after the other inside [WorkGroup::lanes]; code between two
/// such calls plays the role of a barrier.
pub trait NativeKernel: Send + Sync + core::fmt::Debug + 'static {
    /// Entry point name and argument kinds. The name must match the program entry point.
    fn definition(&self) -> KernelDefinition;

    /// Execute one work-group.
    fn execute(&self, group: &mut WorkGroup<'_>) -> Result<(), KernelFault>;
}

/// A fault raised by a native kernel. It aborts the launch and poisons the queue.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum KernelFault {
    /// A buffer index is outside of the buffer.
    #[error("index {index} is out of bounds for argument {ordinal} of length {len}")]
    OutOfBounds {
        /// Argument ordinal.
        ordinal: usize,
        /// Element index.
        index: usize,
        /// Buffer length in elements.
        len: usize,
    },
    /// A buffer was used against its declared access.
    #[error("argument {ordinal} is declared {access} and can't be {operation}")]
    AccessViolation {
        /// Argument ordinal.
        ordinal: usize,
        /// Declared access.
        access: Access,
        /// `read` or `written`.
        operation: &'static str,
    },
    /// The argument at the ordinal doesn't have the requested kind.
    #[error("argument {ordinal} is not {expected}")]
    WrongArgument {
        /// Argument ordinal.
        ordinal: usize,
        /// Requested kind.
        expected: &'static str,
    },
    /// A local scratch slot is outside of the tile.
    #[error("local slot {slot} is out of bounds for a tile of {len}")]
    ScratchOutOfBounds {
        /// Slot index.
        slot: usize,
        /// Tile length.
        len: usize,
    },
    /// A lane accessed a local slot written by another lane without a barrier in between.
    #[error("lane {lane} accessed local slot {slot} written by lane {writer} without a barrier")]
    BarrierViolation {
        /// Offending lane.
        lane: u32,
        /// Lane that wrote the slot.
        writer: u32,
        /// Slot index.
        slot: usize,
    },
    /// The kernel panicked while executing a group.
    #[error("the kernel panicked: {message}")]
    Panicked {
        /// The panic payload, when it's a string.
        message: String,
    },
    /// A lane outside of the group was requested.
    #[error("lane {lane} is outside of a group of {size}")]
    LaneOutOfRange {
        /// Requested lane.
        lane: u32,
        /// Group size.
        size: u32,
    },
}

static REGISTRY: spin::Mutex<Vec<Arc<dyn NativeKernel>>> = spin::Mutex::new(Vec::new());

/// Register a native kernel, replacing any previous kernel with the same entry point name.
pub fn register(kernel: Arc<dyn NativeKernel>) {
    let entry = kernel.definition().entry;
    let mut registry = REGISTRY.lock();

    registry.retain(|registered| registered.definition().entry != entry);
    log::debug!("Registered native kernel {}", kernel.definition());
    registry.push(kernel);
}

/// The native kernel registered for an entry point.
pub fn lookup(entry: &str) -> Option<Arc<dyn NativeKernel>> {
    REGISTRY
        .lock()
        .iter()
        .find(|kernel| kernel.definition().entry == entry)
        .cloned()
}

/// Entry point names with a native implementation.
pub fn registered() -> Vec<&'static str> {
    REGISTRY
        .lock()
        .iter()
        .map(|kernel| kernel.definition().entry)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tilecl_runtime::ArgKind;

    #[derive(Debug)]
    struct Named(&'static str, &'static [ArgKind]);

    impl NativeKernel for Named {
        fn definition(&self) -> KernelDefinition {
            KernelDefinition {
                entry: self.0,
                args: self.1,
            }
        }

        fn execute(&self, _group: &mut WorkGroup<'_>) -> Result<(), KernelFault> {
            Ok(())
        }
    }

    #[test]
    fn registering_twice_replaces() {
        register(Arc::new(Named("registry_replace", &[ArgKind::Int])));
        register(Arc::new(Named("registry_replace", &[])));

        let kernel = lookup("registry_replace").unwrap();
        assert!(kernel.definition().args.is_empty());
        assert_eq!(
            registered()
                .into_iter()
                .filter(|entry| *entry == "registry_replace")
                .count(),
            1
        );
    }

    #[test]
    fn unknown_entry_points() {
        assert!(lookup("registry_never_registered").is_none());
    }
}
