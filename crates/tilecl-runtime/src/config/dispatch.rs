/// Kernel dispatch settings.
#[derive(Default, Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct DispatchConfig {
    /// Explicit local extent for matrix launches. When unset, the extent is derived from the
    /// device maximum work-group size.
    #[serde(default)]
    pub local_size: Option<u32>,
}
