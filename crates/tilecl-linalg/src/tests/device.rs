use pretty_assertions::assert_eq;
use tilecl_runtime::{ComputeError, ExecutionContext, Runtime, WorkPartition};

/// Selecting one past the last device fails without opening anything.
pub fn test_index_out_of_range<R: Runtime>() {
    let catalog = R::catalog().expect("Should enumerate devices");
    let count = catalog.len();

    let result = ExecutionContext::<R>::from_catalog(&catalog, count);

    match result {
        Err(err) => assert_eq!(err, ComputeError::DeviceIndexOutOfRange { index: count, count }),
        Ok(_) => panic!("Index {count} should be out of range"),
    }
}

/// For `n` a power of two, the local extent is `min(n, largest power of two <= max)`.
pub fn test_partition_powers_of_two<R: Runtime>() {
    let catalog = R::catalog().expect("Should enumerate devices");

    for device in catalog.iter() {
        let properties = &device.properties;
        let max = properties.max_work_group_size;
        let largest = 1u32 << (u32::BITS - 1 - max.leading_zeros());

        let mut n = 16u32;
        while n <= max.saturating_mul(4) {
            let partition =
                WorkPartition::compute(n, properties).expect("Should partition a power of two");

            assert_eq!(partition.local(), n.min(largest), "n = {n} on {device}");
            assert_eq!(partition.groups() * partition.local(), n);
            n *= 2;
        }
    }
}
