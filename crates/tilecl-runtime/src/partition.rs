use crate::{ComputeError, ComputeResult, DeviceProperties};

/// A one dimensional work partition: `global` work-items split into groups of `local` lanes.
///
/// The local extent always divides the global extent and never exceeds the device maximum;
/// matrices are never padded or truncated to make a partition fit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct WorkPartition {
    global: u32,
    local: u32,
}

impl WorkPartition {
    /// Validate an explicit partition against a device.
    pub fn new(global: u32, local: u32, device: &DeviceProperties) -> ComputeResult<Self> {
        if global == 0 {
            return Err(partition_error("the global extent is zero"));
        }
        if local == 0 {
            return Err(partition_error("the local extent is zero"));
        }
        if local > device.max_work_group_size {
            return Err(partition_error(format!(
                "local extent {local} exceeds the device maximum work-group size {}",
                device.max_work_group_size
            )));
        }
        if global % local != 0 {
            return Err(partition_error(format!(
                "local extent {local} doesn't divide the global extent {global}"
            )));
        }

        Ok(Self { global, local })
    }

    /// Pick the local extent for `n` work-items on a device.
    ///
    /// Prefers the largest power-of-two divisor of `n` not exceeding the device maximum. When
    /// `n` has no power-of-two divisor above one, searches exact divisors from the device
    /// maximum downward.
    pub fn compute(n: u32, device: &DeviceProperties) -> ComputeResult<Self> {
        let max = device.max_work_group_size;

        if n == 0 {
            return Err(partition_error("the global extent is zero"));
        }
        if max == 0 {
            return Err(partition_error("the device reports a zero work-group size"));
        }

        let mut local = largest_power_of_two_divisor(n, max);

        if local == 1 {
            local = (1..=u32::min(max, n))
                .rev()
                .find(|candidate| n % candidate == 0)
                .unwrap_or(1);
        }

        Self::new(n, local, device)
    }

    /// Number of work-items.
    pub fn global(&self) -> u32 {
        self.global
    }

    /// Lanes per work-group.
    pub fn local(&self) -> u32 {
        self.local
    }

    /// Number of work-groups.
    pub fn groups(&self) -> u32 {
        self.global / self.local
    }
}

fn largest_power_of_two_divisor(n: u32, max: u32) -> u32 {
    // The lowest set bit is the largest power of two dividing `n`.
    let mut local = 1 << n.trailing_zeros();
    while local > max {
        local >>= 1;
    }
    local
}

fn partition_error(reason: impl Into<String>) -> ComputeError {
    ComputeError::PartitionError {
        reason: reason.into(),
    }
}

/// A launch grid: the partition along x and the number of group rows along y.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct LaunchGrid {
    /// Partition of the x dimension.
    pub partition: WorkPartition,
    /// Number of groups along y.
    pub rows: u32,
}

impl LaunchGrid {
    /// A grid with `rows` rows of the given partition.
    pub fn new(partition: WorkPartition, rows: u32) -> Self {
        Self { partition, rows }
    }

    /// Number of groups along each dimension.
    pub fn group_count(&self) -> [u32; 2] {
        [self.partition.groups(), self.rows]
    }

    /// Total number of groups.
    pub fn total_groups(&self) -> u64 {
        self.partition.groups() as u64 * self.rows as u64
    }

    /// Check the grid fits on the device.
    pub fn validate(&self, device: &DeviceProperties) -> ComputeResult<()> {
        WorkPartition::new(self.partition.global, self.partition.local, device)?;

        let max = device.max_groups_per_dimension;
        let [x, y] = self.group_count();

        if self.rows == 0 {
            return Err(partition_error("the grid has no rows"));
        }
        if x > max || y > max {
            return Err(partition_error(format!(
                "{x}x{y} work-groups exceed the device limit of {max} per dimension"
            )));
        }

        Ok(())
    }
}

impl From<WorkPartition> for LaunchGrid {
    fn from(partition: WorkPartition) -> Self {
        Self::new(partition, 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device(max_work_group_size: u32) -> DeviceProperties {
        DeviceProperties::new(max_work_group_size, 16 * 1024, true, 1 << 30, 65535)
    }

    #[test]
    fn powers_of_two_divide_exactly() {
        for max in [1, 16, 64, 100, 256, 1024] {
            let device = device(max);
            let mut n = 16;
            while n <= 1 << 16 {
                let partition = WorkPartition::compute(n, &device).unwrap();

                assert_eq!(n % partition.local(), 0, "n={n} max={max}");
                assert!(partition.local() <= max, "n={n} max={max}");
                assert_eq!(partition.global(), n);
                n *= 2;
            }
        }
    }

    #[test]
    fn prefers_largest_power_of_two() {
        let partition = WorkPartition::compute(1024, &device(256)).unwrap();
        assert_eq!(partition.local(), 256);
        assert_eq!(partition.groups(), 4);

        // 96 = 32 * 3, the largest power of two wins over the divisor 48.
        let partition = WorkPartition::compute(96, &device(64)).unwrap();
        assert_eq!(partition.local(), 32);
    }

    #[test]
    fn non_power_of_two_maximum() {
        let partition = WorkPartition::compute(1024, &device(100)).unwrap();
        assert_eq!(partition.local(), 64);
    }

    #[test]
    fn odd_order_falls_back_to_divisor_search() {
        let partition = WorkPartition::compute(75, &device(64)).unwrap();
        assert_eq!(partition.local(), 25);

        let partition = WorkPartition::compute(7, &device(64)).unwrap();
        assert_eq!(partition.local(), 7);

        let partition = WorkPartition::compute(97, &device(64)).unwrap();
        assert_eq!(partition.local(), 1);
    }

    #[test]
    fn zero_extent_is_rejected() {
        assert!(matches!(
            WorkPartition::compute(0, &device(64)),
            Err(ComputeError::PartitionError { .. })
        ));
        assert!(matches!(
            WorkPartition::compute(64, &device(0)),
            Err(ComputeError::PartitionError { .. })
        ));
    }

    #[test]
    fn explicit_partition_must_divide() {
        assert!(matches!(
            WorkPartition::new(1000, 64, &device(256)),
            Err(ComputeError::PartitionError { .. })
        ));
        assert!(matches!(
            WorkPartition::new(1024, 512, &device(256)),
            Err(ComputeError::PartitionError { .. })
        ));
        assert!(WorkPartition::new(1024, 64, &device(256)).is_ok());
    }

    #[test]
    fn grid_respects_group_limit() {
        let mut device = device(64);
        device.max_groups_per_dimension = 8;
        let partition = WorkPartition::new(1024, 64, &device).unwrap();

        assert!(LaunchGrid::new(partition, 8).validate(&device).is_err());

        let partition = WorkPartition::new(512, 64, &device).unwrap();
        assert!(LaunchGrid::new(partition, 8).validate(&device).is_ok());
        assert_eq!(LaunchGrid::new(partition, 8).total_groups(), 64);
    }
}
