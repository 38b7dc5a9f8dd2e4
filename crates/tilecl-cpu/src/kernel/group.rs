use super::{GlobalBuffer, KernelFault};

/// A resolved kernel argument.
#[derive(Clone, Debug)]
pub enum GroupArg {
    /// An integer value.
    Int(u32),
    /// A device buffer.
    Buffer(GlobalBuffer),
    /// Local scratch, as a number of `f32` slots.
    LocalScratch(usize),
}

/// Per-group local memory.
///
/// Every slot remembers the lane that last wrote it since the last barrier. Another lane
/// touching that slot before the next barrier is a race on a real device and faults here.
#[derive(Debug, Default)]
pub struct LocalScratch {
    values: Vec<f32>,
    writers: Vec<Option<u32>>,
}

impl LocalScratch {
    /// Create a tile of `len` slots.
    pub fn new(len: usize) -> Self {
        Self {
            values: vec![0.0; len],
            writers: vec![None; len],
        }
    }

    /// Number of slots.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the tile has no slot.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Clear the tile before a new group runs.
    pub fn reset(&mut self) {
        self.values.fill(0.0);
        self.barrier();
    }

    /// Synchronise the lanes: every write becomes visible to every lane.
    pub fn barrier(&mut self) {
        self.writers.fill(None);
    }

    fn load(&self, lane: u32, slot: usize) -> Result<f32, KernelFault> {
        self.check(lane, slot)?;
        Ok(self.values[slot])
    }

    fn store(&mut self, lane: u32, slot: usize, value: f32) -> Result<(), KernelFault> {
        self.check(lane, slot)?;
        self.values[slot] = value;
        self.writers[slot] = Some(lane);
        Ok(())
    }

    fn check(&self, lane: u32, slot: usize) -> Result<(), KernelFault> {
        match self.writers.get(slot) {
            None => Err(KernelFault::ScratchOutOfBounds {
                slot,
                len: self.values.len(),
            }),
            Some(Some(writer)) if *writer != lane => Err(KernelFault::BarrierViolation {
                lane,
                writer: *writer,
                slot,
            }),
            Some(_) => Ok(()),
        }
    }
}

/// One work-group being executed.
#[derive(Debug)]
pub struct WorkGroup<'a> {
    id: [u32; 2],
    count: [u32; 2],
    size: u32,
    args: &'a [GroupArg],
    scratch: &'a mut LocalScratch,
}

impl<'a> WorkGroup<'a> {
    /// Create the group `id` of a grid of `count` groups of `size` lanes.
    pub fn new(
        id: [u32; 2],
        count: [u32; 2],
        size: u32,
        args: &'a [GroupArg],
        scratch: &'a mut LocalScratch,
    ) -> Self {
        Self {
            id,
            count,
            size,
            args,
            scratch,
        }
    }

    /// Group coordinates in the grid.
    pub fn id(&self) -> [u32; 2] {
        self.id
    }

    /// Number of groups along each grid dimension.
    pub fn count(&self) -> [u32; 2] {
        self.count
    }

    /// Lanes per group.
    pub fn size(&self) -> u32 {
        self.size
    }

    /// Slots of the local tile.
    pub fn scratch_len(&self) -> usize {
        self.scratch.len()
    }

    /// The integer argument at `ordinal`.
    pub fn int(&self, ordinal: usize) -> Result<u32, KernelFault> {
        match self.args.get(ordinal) {
            Some(GroupArg::Int(value)) => Ok(*value),
            _ => Err(KernelFault::WrongArgument {
                ordinal,
                expected: "an int",
            }),
        }
    }

    /// The buffer argument at `ordinal`.
    pub fn buffer(&self, ordinal: usize) -> Result<GlobalBuffer, KernelFault> {
        match self.args.get(ordinal) {
            Some(GroupArg::Buffer(buffer)) => Ok(buffer.clone()),
            _ => Err(KernelFault::WrongArgument {
                ordinal,
                expected: "a buffer",
            }),
        }
    }

    /// Run `func` for a single lane.
    pub fn lane<F>(&mut self, lane: u32, func: F) -> Result<(), KernelFault>
    where
        F: FnOnce(&mut Lane<'_>) -> Result<(), KernelFault>,
    {
        if lane >= self.size {
            return Err(KernelFault::LaneOutOfRange {
                lane,
                size: self.size,
            });
        }

        func(&mut Lane {
            index: lane,
            group: self.id,
            size: self.size,
            scratch: &mut *self.scratch,
        })
    }

    /// Run `func` for every lane, in lane order.
    pub fn lanes<F>(&mut self, mut func: F) -> Result<(), KernelFault>
    where
        F: FnMut(&mut Lane<'_>) -> Result<(), KernelFault>,
    {
        for lane in 0..self.size {
            self.lane(lane, &mut func)?;
        }

        Ok(())
    }

    /// Work-group barrier.
    pub fn barrier(&mut self) {
        self.scratch.barrier();
    }
}

/// One lane of a running group.
#[derive(Debug)]
pub struct Lane<'g> {
    index: u32,
    group: [u32; 2],
    size: u32,
    scratch: &'g mut LocalScratch,
}

impl Lane<'_> {
    /// Lane index in the group.
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Coordinates of the group.
    pub fn group(&self) -> [u32; 2] {
        self.group
    }

    /// Global index along the partitioned dimension.
    pub fn global_x(&self) -> u32 {
        self.group[0] * self.size + self.index
    }

    /// Read a local slot.
    pub fn load_local(&self, slot: usize) -> Result<f32, KernelFault> {
        self.scratch.load(self.index, slot)
    }

    /// Write a local slot.
    pub fn store_local(&mut self, slot: usize, value: f32) -> Result<(), KernelFault> {
        self.scratch.store(self.index, slot, value)
    }
}
