use core::fmt::Display;
use std::sync::Arc;

use bytemuck::Pod;
use hashbrown::HashMap;

use crate::{
    BufferId, ComputeError, ComputeResult, ContextId, Runtime, queue::CommandQueue,
    server::ReadCallback,
};

/// Host access intent of a device buffer, checked when it is bound to a kernel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, derive_more::Display)]
pub enum AccessMode {
    /// Kernels may only read the buffer.
    #[display("read-only")]
    ReadOnly,
    /// Kernels may only write the buffer.
    #[display("write-only")]
    WriteOnly,
    /// Kernels may read and write the buffer.
    #[display("read-write")]
    ReadWrite,
}

impl AccessMode {
    /// Kernels may read the buffer.
    pub fn readable(&self) -> bool {
        matches!(self, AccessMode::ReadOnly | AccessMode::ReadWrite)
    }

    /// Kernels may write the buffer.
    pub fn writable(&self) -> bool {
        matches!(self, AccessMode::WriteOnly | AccessMode::ReadWrite)
    }
}

/// A device buffer owned by the buffer manager of one context.
///
/// Cloning the handle doesn't duplicate the buffer; releasing any clone invalidates all of them.
#[derive(new, Clone, Debug, PartialEq, Eq, Hash)]
pub struct BufferHandle {
    id: BufferId,
    context: ContextId,
    size: u64,
    mode: AccessMode,
}

impl BufferHandle {
    /// The buffer id.
    pub fn id(&self) -> BufferId {
        self.id
    }

    /// The owning context.
    pub fn context(&self) -> ContextId {
        self.context
    }

    /// Size in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// The access mode the buffer was created with.
    pub fn mode(&self) -> AccessMode {
        self.mode
    }
}

/// Memory accounting of one context.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MemoryUsage {
    /// Number of live buffers.
    pub buffers: usize,
    /// Bytes held by live buffers.
    pub bytes_in_use: u64,
    /// Device capacity in bytes.
    pub capacity: u64,
}

impl Display for MemoryUsage {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "{} buffer(s), {} of {} bytes in use",
            self.buffers, self.bytes_in_use, self.capacity
        )
    }
}

/// Live buffers of a context, checked against the device capacity.
#[derive(Debug)]
pub(crate) struct MemoryRegistry {
    buffers: HashMap<BufferId, u64>,
    bytes_in_use: u64,
    capacity: u64,
}

impl MemoryRegistry {
    pub(crate) fn new(capacity: u64) -> Self {
        Self {
            buffers: HashMap::new(),
            bytes_in_use: 0,
            capacity,
        }
    }

    fn reserve(&mut self, size: u64) -> ComputeResult<BufferId> {
        let available = self.capacity - self.bytes_in_use;

        if size == 0 || size > available {
            return Err(ComputeError::AllocationFailure {
                requested: size,
                available,
            });
        }

        let id = BufferId::new();
        self.buffers.insert(id, size);
        self.bytes_in_use += size;

        Ok(id)
    }

    fn free(&mut self, id: BufferId) -> ComputeResult<()> {
        let size = self
            .buffers
            .remove(&id)
            .ok_or(ComputeError::InvalidHandle { id: id.value() })?;
        self.bytes_in_use -= size;

        Ok(())
    }

    pub(crate) fn contains(&self, id: BufferId) -> bool {
        self.buffers.contains_key(&id)
    }

    fn usage(&self) -> MemoryUsage {
        MemoryUsage {
            buffers: self.buffers.len(),
            bytes_in_use: self.bytes_in_use,
            capacity: self.capacity,
        }
    }
}

/// Allocates, transfers and releases the device buffers of one context.
///
/// Transfers go through the context command queue, so they're ordered with kernel launches.
#[derive(Debug)]
pub struct BufferManager<R: Runtime> {
    context: ContextId,
    queue: Arc<CommandQueue<R::Server>>,
    registry: Arc<spin::Mutex<MemoryRegistry>>,
}

impl<R: Runtime> Clone for BufferManager<R> {
    fn clone(&self) -> Self {
        Self {
            context: self.context,
            queue: self.queue.clone(),
            registry: self.registry.clone(),
        }
    }
}

impl<R: Runtime> BufferManager<R> {
    pub(crate) fn new(
        context: ContextId,
        queue: Arc<CommandQueue<R::Server>>,
        capacity: u64,
    ) -> Self {
        Self {
            context,
            queue,
            registry: Arc::new(spin::Mutex::new(MemoryRegistry::new(capacity))),
        }
    }

    /// Create a buffer holding a copy of `data`.
    ///
    /// The copy is enqueued; `data` may be reused as soon as this returns.
    pub fn upload<E: Pod>(&self, data: &[E], mode: AccessMode) -> ComputeResult<BufferHandle> {
        let bytes = bytemuck::cast_slice::<E, u8>(data).to_vec();
        let handle = self.reserve(bytes.len() as u64, mode)?;

        self.queue.create(handle.id, bytes).inspect_err(|_| {
            self.registry.lock().free(handle.id).ok();
        })?;

        Ok(handle)
    }

    /// Create an uninitialized buffer of `size` bytes.
    pub fn allocate(&self, size: u64, mode: AccessMode) -> ComputeResult<BufferHandle> {
        let handle = self.reserve(size, mode)?;

        self.queue.empty(handle.id, size).inspect_err(|_| {
            self.registry.lock().free(handle.id).ok();
        })?;

        Ok(handle)
    }

    /// Copy a buffer into `dest`, waiting for every previously submitted command.
    pub fn download<E: Pod>(&self, handle: &BufferHandle, dest: &mut [E]) -> ComputeResult<()> {
        let expected = core::mem::size_of_val(dest) as u64;
        if expected != handle.size {
            return Err(ComputeError::TransferMismatch {
                expected: handle.size,
                found: expected,
            });
        }

        self.download_async(handle)?.wait_into(dest)
    }

    /// Read a whole buffer as a vector of `E`.
    pub fn read<E: Pod>(&self, handle: &BufferHandle) -> ComputeResult<Vec<E>> {
        let size = core::mem::size_of::<E>() as u64;
        if size == 0 || handle.size % size != 0 {
            return Err(ComputeError::TransferMismatch {
                expected: handle.size,
                found: size,
            });
        }

        let mut data = vec![E::zeroed(); (handle.size / size) as usize];
        self.download(handle, &mut data)?;

        Ok(data)
    }

    /// Enqueue a device to host copy without waiting for it.
    pub fn download_async(&self, handle: &BufferHandle) -> ComputeResult<PendingRead> {
        self.validate(handle)?;
        let receiver = self.queue.read(handle.id)?;

        Ok(PendingRead {
            size: handle.size,
            receiver,
        })
    }

    /// Free a buffer. Any later use of the handle fails with [ComputeError::InvalidHandle].
    pub fn release(&self, handle: &BufferHandle) -> ComputeResult<()> {
        if handle.context != self.context {
            return Err(ComputeError::InvalidHandle {
                id: handle.id.value(),
            });
        }

        self.registry.lock().free(handle.id)?;
        self.queue.release(handle.id)
    }

    /// Check a handle names a live buffer of this context.
    pub fn validate(&self, handle: &BufferHandle) -> ComputeResult<()> {
        if handle.context != self.context || !self.registry.lock().contains(handle.id) {
            return Err(ComputeError::InvalidHandle {
                id: handle.id.value(),
            });
        }

        Ok(())
    }

    /// The current memory accounting.
    pub fn memory_usage(&self) -> MemoryUsage {
        self.registry.lock().usage()
    }

    fn reserve(&self, size: u64, mode: AccessMode) -> ComputeResult<BufferHandle> {
        let id = self.registry.lock().reserve(size)?;
        log::trace!("Reserved {size} bytes for {id}");

        Ok(BufferHandle::new(id, self.context, size, mode))
    }
}

/// A device to host copy in flight.
#[derive(Debug)]
pub struct PendingRead {
    size: u64,
    receiver: ReadCallback,
}

impl PendingRead {
    /// Size of the buffer being read, in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Block until the copy completes and return the bytes.
    pub fn wait(self) -> ComputeResult<Vec<u8>> {
        self.receiver.recv_blocking().map_err(|_| {
            ComputeError::dispatch(
                crate::DispatchCode::InvalidQueue,
                "the command queue stopped before the read completed",
            )
        })?
    }

    /// Block until the copy completes and write it into `dest`.
    pub fn wait_into<E: Pod>(self, dest: &mut [E]) -> ComputeResult<()> {
        let size = self.size;
        let found = core::mem::size_of_val(dest) as u64;
        if found != size {
            return Err(ComputeError::TransferMismatch {
                expected: size,
                found,
            });
        }

        let bytes = self.wait()?;
        if bytes.len() as u64 != size {
            return Err(ComputeError::TransferMismatch {
                expected: size,
                found: bytes.len() as u64,
            });
        }

        bytemuck::cast_slice_mut::<E, u8>(dest).copy_from_slice(&bytes);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_tracks_capacity() {
        let mut registry = MemoryRegistry::new(100);

        let first = registry.reserve(60).unwrap();
        assert_eq!(
            registry.reserve(41),
            Err(ComputeError::AllocationFailure {
                requested: 41,
                available: 40
            })
        );

        registry.free(first).unwrap();
        assert!(registry.reserve(100).is_ok());
        assert_eq!(registry.usage().bytes_in_use, 100);
    }

    #[test]
    fn zero_sized_reservation_fails() {
        let mut registry = MemoryRegistry::new(100);

        assert!(matches!(
            registry.reserve(0),
            Err(ComputeError::AllocationFailure { requested: 0, .. })
        ));
    }

    #[test]
    fn double_free_is_invalid() {
        let mut registry = MemoryRegistry::new(100);
        let id = registry.reserve(4).unwrap();

        registry.free(id).unwrap();
        assert_eq!(
            registry.free(id),
            Err(ComputeError::InvalidHandle { id: id.value() })
        );
    }

    #[test]
    fn access_modes() {
        assert!(AccessMode::ReadOnly.readable());
        assert!(!AccessMode::ReadOnly.writable());
        assert!(AccessMode::WriteOnly.writable());
        assert!(!AccessMode::WriteOnly.readable());
        assert!(AccessMode::ReadWrite.readable() && AccessMode::ReadWrite.writable());
    }
}
