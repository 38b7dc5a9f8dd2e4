use hashbrown::HashMap;
use tilecl_runtime::{BufferId, ComputeError, ComputeResult};
use wgpu::{BufferUsages, util::DeviceExt};

/// Usages of every storage buffer.
pub const STORAGE_USAGES: BufferUsages = BufferUsages::STORAGE
    .union(BufferUsages::COPY_SRC)
    .union(BufferUsages::COPY_DST);

/// A device buffer. Its allocation is rounded up to the copy alignment.
#[derive(new, Debug)]
pub struct WgpuResource {
    buffer: wgpu::Buffer,
    size: u64,
}

impl WgpuResource {
    /// The wgpu buffer.
    pub fn buffer(&self) -> &wgpu::Buffer {
        &self.buffer
    }

    /// The requested size in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// The allocated size in bytes.
    pub fn aligned_size(&self) -> u64 {
        self.buffer.size()
    }
}

/// Keeps the wgpu buffers of a server by id.
#[derive(Debug)]
pub struct WgpuStorage {
    memory: HashMap<BufferId, WgpuResource>,
    device: wgpu::Device,
}

impl WgpuStorage {
    /// Create a storage on the given [device](wgpu::Device).
    pub fn new(device: wgpu::Device) -> Self {
        Self {
            memory: HashMap::new(),
            device,
        }
    }

    /// Create a buffer initialised with `data`.
    pub fn create(&mut self, id: BufferId, data: &[u8]) {
        let size = data.len() as u64;
        let mut contents = data.to_vec();
        contents.resize(aligned(size) as usize, 0);

        let buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: None,
                contents: &contents,
                usage: STORAGE_USAGES,
            });
        self.memory.insert(id, WgpuResource::new(buffer, size));
    }

    /// Create a zeroed buffer of `size` bytes.
    pub fn empty(&mut self, id: BufferId, size: u64) {
        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: None,
            size: aligned(size),
            usage: STORAGE_USAGES,
            mapped_at_creation: false,
        });
        self.memory.insert(id, WgpuResource::new(buffer, size));
    }

    /// The buffer of `id`.
    pub fn get(&self, id: BufferId) -> ComputeResult<&WgpuResource> {
        self.memory
            .get(&id)
            .ok_or(ComputeError::InvalidHandle { id: id.value() })
    }

    /// Free a buffer.
    pub fn release(&mut self, id: BufferId) {
        if let Some(resource) = self.memory.remove(&id) {
            resource.buffer.destroy();
        }
    }
}

/// Round a size up to [wgpu::COPY_BUFFER_ALIGNMENT].
pub fn aligned(size: u64) -> u64 {
    size.div_ceil(wgpu::COPY_BUFFER_ALIGNMENT) * wgpu::COPY_BUFFER_ALIGNMENT
}
