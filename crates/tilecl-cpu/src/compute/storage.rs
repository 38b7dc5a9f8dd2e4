use core::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use hashbrown::HashMap;
use tilecl_runtime::{Access, BufferId, ComputeError, ComputeResult, SENTINEL};

use crate::kernel::GlobalBuffer;

/// Host memory backing the device buffers.
///
/// Buffers are stored as 32-bit words; sizes that aren't a multiple of four are padded and
/// the padding is never read back.
#[derive(Debug, Default)]
pub struct CpuStorage {
    buffers: HashMap<BufferId, StorageBuffer>,
}

#[derive(new, Debug)]
struct StorageBuffer {
    size: u64,
    words: Arc<[AtomicU32]>,
}

impl CpuStorage {
    /// Store a buffer initialised with `data`.
    pub fn create(&mut self, id: BufferId, data: &[u8]) {
        let words = data
            .chunks(size_of::<u32>())
            .map(|chunk| {
                let mut word = [0u8; 4];
                word[..chunk.len()].copy_from_slice(chunk);
                AtomicU32::new(u32::from_le_bytes(word))
            })
            .collect();

        self.insert(id, data.len() as u64, words);
    }

    /// Store a buffer of `size` bytes with every word set to `fill`.
    pub fn empty(&mut self, id: BufferId, size: u64, fill: u32) {
        let len = size.div_ceil(size_of::<u32>() as u64) as usize;
        let words = (0..len).map(|_| AtomicU32::new(fill)).collect();

        self.insert(id, size, words);
    }

    /// Copy a buffer out.
    pub fn read(&self, id: BufferId) -> ComputeResult<Vec<u8>> {
        let buffer = self.get(id)?;
        let mut bytes = buffer
            .words
            .iter()
            .flat_map(|word| word.load(Ordering::Relaxed).to_le_bytes())
            .collect::<Vec<_>>();
        bytes.truncate(buffer.size as usize);

        Ok(bytes)
    }

    /// The kernel view of a buffer bound at `ordinal`.
    pub fn bind(&self, id: BufferId, ordinal: usize, access: Access) -> ComputeResult<GlobalBuffer> {
        let buffer = self.get(id)?;
        Ok(GlobalBuffer::new(ordinal, access, buffer.words.clone()))
    }

    /// Free a buffer. Unknown ids are ignored.
    pub fn release(&mut self, id: BufferId) {
        self.buffers.remove(&id);
    }

    /// Bytes currently stored.
    pub fn bytes_in_use(&self) -> u64 {
        self.buffers.values().map(|buffer| buffer.size).sum()
    }

    fn insert(&mut self, id: BufferId, size: u64, words: Arc<[AtomicU32]>) {
        self.buffers.insert(id, StorageBuffer::new(size, words));
    }

    fn get(&self, id: BufferId) -> ComputeResult<&StorageBuffer> {
        self.buffers
            .get(&id)
            .ok_or(ComputeError::InvalidHandle { id: id.value() })
    }
}

/// Word written into fresh buffers when the sentinel fill is enabled.
pub fn sentinel_word() -> u32 {
    SENTINEL.to_bits()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unaligned_sizes_are_padded() {
        let mut storage = CpuStorage::default();
        let id = BufferId::new();

        storage.create(id, &[1, 2, 3, 4, 5, 6]);

        assert_eq!(storage.read(id).unwrap(), vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(storage.bind(id, 0, Access::Read).unwrap().len(), 2);
    }

    #[test]
    fn empty_buffers_are_filled() {
        let mut storage = CpuStorage::default();
        let id = BufferId::new();

        storage.empty(id, 8, sentinel_word());

        let values: Vec<f32> = storage
            .read(id)
            .unwrap()
            .chunks(4)
            .map(|bytes| f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
            .collect();
        assert_eq!(values, vec![SENTINEL, SENTINEL]);
    }

    #[test]
    fn released_buffers_are_gone() {
        let mut storage = CpuStorage::default();
        let id = BufferId::new();
        storage.empty(id, 4, 0);
        assert_eq!(storage.bytes_in_use(), 4);

        storage.release(id);

        assert_eq!(storage.bytes_in_use(), 0);
        assert_eq!(
            storage.read(id),
            Err(ComputeError::InvalidHandle { id: id.value() })
        );
    }
}
