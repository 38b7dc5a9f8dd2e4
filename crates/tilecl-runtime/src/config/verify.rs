/// Result verification settings.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct VerifyConfig {
    /// Absolute tolerance: an element passes when `(expected - actual)^2 < tolerance^2`.
    #[serde(default = "default_tolerance")]
    pub tolerance: f32,

    /// How many mismatching elements are logged before the rest are only counted.
    #[serde(default = "default_max_reported")]
    pub max_reported: usize,
}

impl Default for VerifyConfig {
    fn default() -> Self {
        Self {
            tolerance: default_tolerance(),
            max_reported: default_max_reported(),
        }
    }
}

fn default_tolerance() -> f32 {
    0.001
}

fn default_max_reported() -> usize {
    8
}
