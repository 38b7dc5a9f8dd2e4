use core::{fmt::Display, time::Duration};

use tilecl_runtime::{
    SENTINEL,
    config::{GlobalConfig, verify::VerifyConfig},
};

use crate::{AVAL, BVAL};

/// Compares device results with host expectations.
///
/// An element passes when `(expected - actual)^2 < tolerance^2`. Mismatches are logged, never
/// raised as errors.
#[derive(new, Clone, Copy, Debug, PartialEq)]
pub struct Verifier {
    tolerance: f32,
    max_reported: usize,
}

impl Default for Verifier {
    fn default() -> Self {
        Self::from_config(&GlobalConfig::get().verify)
    }
}

impl Verifier {
    /// A verifier using the `[verify]` settings.
    pub fn from_config(config: &VerifyConfig) -> Self {
        Self::new(config.tolerance, config.max_reported)
    }

    /// The absolute tolerance.
    pub fn tolerance(&self) -> f32 {
        self.tolerance
    }

    /// Compare `actual` with `expected`, element by element.
    pub fn verify(&self, expected: &[f32], actual: &[f32]) -> Verification {
        let mut verification = Verification {
            total: actual.len(),
            ..Default::default()
        };

        if expected.len() != actual.len() {
            log::warn!(
                "Expected {} elements, found {}",
                expected.len(),
                actual.len()
            );
        }

        for (index, (expected, actual)) in expected.iter().zip(actual.iter()).enumerate() {
            self.check(&mut verification, index, *expected, *actual);
        }

        verification
    }

    /// Check a product of the constant matrices: every element should be `N * AVAL * BVAL`.
    pub fn verify_constant(&self, order: usize, actual: &[f32]) -> Verification {
        let expected = order as f32 * AVAL * BVAL;
        let mut verification = Verification {
            total: actual.len(),
            ..Default::default()
        };

        for (index, actual) in actual.iter().enumerate() {
            self.check(&mut verification, index, expected, *actual);
        }

        verification
    }

    fn check(&self, verification: &mut Verification, index: usize, expected: f32, actual: f32) {
        let error = expected - actual;
        let error_sq = error * error;

        if actual == SENTINEL {
            verification.sentinels += 1;
        }

        if error_sq < self.tolerance * self.tolerance {
            verification.correct += 1;
        } else if index - verification.correct < self.max_reported {
            log::warn!("Element {index}: expected {expected}, found {actual}");
        }

        verification.error_sq += error_sq as f64;
    }
}

/// Outcome of a verification.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Verification {
    /// Elements within tolerance.
    pub correct: usize,
    /// Elements compared.
    pub total: usize,
    /// Sum of the squared errors.
    pub error_sq: f64,
    /// Elements still holding the sentinel.
    pub sentinels: usize,
}

impl Verification {
    /// Whether every element is within tolerance.
    pub fn passed(&self) -> bool {
        self.correct == self.total
    }
}

impl Display for Verification {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "{} out of {} results were correct (errsq {:e})",
            self.correct, self.total, self.error_sq
        )?;
        if self.sentinels > 0 {
            write!(f, ", {} still hold the sentinel", self.sentinels)?;
        }
        Ok(())
    }
}

/// Millions of floating point operations per second of an order `N` multiplication.
pub fn mflops(order: usize, duration: Duration) -> f64 {
    let n = order as f64;
    2.0 * n * n * n / 1_000_000.0 / duration.as_secs_f64()
}

/// One timed and verified run, as printed on the console.
#[derive(new, Debug)]
pub struct RunSummary {
    /// Order of the matrices.
    pub order: usize,
    /// Measured duration.
    pub duration: Duration,
    /// Verification of the result.
    pub verification: Verification,
}

impl Display for RunSummary {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let seconds = self.duration.as_secs_f64();

        if seconds > 0.0 {
            writeln!(
                f,
                " {seconds:.6} seconds at {:.1} MFLOPS",
                mflops(self.order, self.duration)
            )?;
        } else {
            writeln!(f, " {seconds:.6} seconds")?;
        }
        write!(f, " {}", self.verification)
    }
}
