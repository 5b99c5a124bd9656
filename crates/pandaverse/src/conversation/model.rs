use std::fmt;

/// The model (or sentinel provider value) the user picked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSelection(String);

impl ModelSelection {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn id(&self) -> &str {
        &self.0
    }

    /// The id without its `:tag` suffix, e.g. `qwen/qwen3-coder` for
    /// `qwen/qwen3-coder:free`.
    pub fn display_name(&self) -> &str {
        self.0.split_once(':').map_or(self.0.as_str(), |(name, _)| name)
    }
}

impl fmt::Display for ModelSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
