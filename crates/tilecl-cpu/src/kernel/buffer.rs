use core::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use tilecl_runtime::Access;

use super::KernelFault;

/// A device buffer as seen by a native kernel: 32-bit words with the declared access of the
/// argument it's bound to.
///
/// Lanes of different groups run on different threads. Each word is an atomic so that
/// disjoint writes need no locking.
#[derive(Clone, Debug)]
pub struct GlobalBuffer {
    ordinal: usize,
    access: Access,
    words: Arc<[AtomicU32]>,
}

impl GlobalBuffer {
    pub(crate) fn new(ordinal: usize, access: Access, words: Arc<[AtomicU32]>) -> Self {
        Self {
            ordinal,
            access,
            words,
        }
    }

    /// A buffer holding `values`, outside of any device.
    pub fn from_values(ordinal: usize, access: Access, values: &[f32]) -> Self {
        let words = values
            .iter()
            .map(|value| AtomicU32::new(value.to_bits()))
            .collect();

        Self::new(ordinal, access, words)
    }

    /// Copy of the contents, ignoring the declared access.
    pub fn values(&self) -> Vec<f32> {
        self.words
            .iter()
            .map(|word| f32::from_bits(word.load(Ordering::Relaxed)))
            .collect()
    }

    /// Number of 32-bit elements.
    pub fn len(&self) -> usize {
        self.words.len()
    }

    /// Whether the buffer has no element.
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Read an `f32` element.
    pub fn load(&self, index: usize) -> Result<f32, KernelFault> {
        self.load_bits(index).map(f32::from_bits)
    }

    /// Write an `f32` element.
    pub fn store(&self, index: usize, value: f32) -> Result<(), KernelFault> {
        self.store_bits(index, value.to_bits())
    }

    /// Read a `u32` element.
    pub fn load_bits(&self, index: usize) -> Result<u32, KernelFault> {
        if self.access == Access::Write {
            return Err(KernelFault::AccessViolation {
                ordinal: self.ordinal,
                access: self.access,
                operation: "read",
            });
        }

        Ok(self.word(index)?.load(Ordering::Relaxed))
    }

    /// Write a `u32` element.
    pub fn store_bits(&self, index: usize, value: u32) -> Result<(), KernelFault> {
        if self.access == Access::Read {
            return Err(KernelFault::AccessViolation {
                ordinal: self.ordinal,
                access: self.access,
                operation: "written",
            });
        }

        self.word(index)?.store(value, Ordering::Relaxed);
        Ok(())
    }

    fn word(&self, index: usize) -> Result<&AtomicU32, KernelFault> {
        self.words.get(index).ok_or(KernelFault::OutOfBounds {
            ordinal: self.ordinal,
            index,
            len: self.words.len(),
        })
    }
}
