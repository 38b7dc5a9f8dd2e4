use futures_lite::future;

/// Run `func` inside a validation error scope and return the first error it raised.
pub(crate) fn capture_validation<T>(
    device: &wgpu::Device,
    func: impl FnOnce() -> T,
) -> (T, Option<wgpu::Error>) {
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let result = func();
    let error = future::block_on(device.pop_error_scope());

    (result, error)
}

/// Run `func` inside an out-of-memory error scope.
pub(crate) fn capture_out_of_memory<T>(
    device: &wgpu::Device,
    func: impl FnOnce() -> T,
) -> (T, Option<wgpu::Error>) {
    device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
    let result = func();
    let error = future::block_on(device.pop_error_scope());

    (result, error)
}
