use rand::{Rng, SeedableRng, rngs::StdRng};
use tilecl_runtime::SENTINEL;

/// Value of every element of the constant `A` matrix.
pub const AVAL: f32 = 3.0;
/// Value of every element of the constant `B` matrix.
pub const BVAL: f32 = 5.0;

/// A square, row-major `f32` matrix on the host.
#[derive(Clone, Debug, PartialEq)]
pub struct HostMatrix {
    order: usize,
    data: Vec<f32>,
}

impl HostMatrix {
    /// A matrix with every element set to `value`.
    pub fn filled(order: usize, value: f32) -> Self {
        Self {
            order,
            data: vec![value; order * order],
        }
    }

    /// A zero matrix.
    pub fn zeros(order: usize) -> Self {
        Self::filled(order, 0.0)
    }

    /// A matrix holding the sentinel, used for results before they're downloaded.
    pub fn sentinel(order: usize) -> Self {
        Self::filled(order, SENTINEL)
    }

    /// A matrix of uniform values in `[0, 1)`, reproducible from `seed`.
    pub fn random(order: usize, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let data = (0..order * order).map(|_| rng.random::<f32>()).collect();

        Self { order, data }
    }

    /// Wrap row-major data. Returns `None` unless `data` holds `order * order` elements.
    pub fn from_vec(order: usize, data: Vec<f32>) -> Option<Self> {
        (data.len() == order * order).then_some(Self { order, data })
    }

    /// The order `N` of the matrix.
    pub fn order(&self) -> usize {
        self.order
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the matrix has no element.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The element at row `i`, column `j`.
    pub fn get(&self, i: usize, j: usize) -> f32 {
        self.data[i * self.order + j]
    }

    /// Set every element to `value`.
    pub fn fill(&mut self, value: f32) {
        self.data.fill(value);
    }

    /// Row-major elements.
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// Mutable row-major elements.
    pub fn as_mut_slice(&mut self) -> &mut [f32] {
        &mut self.data
    }
}
