//! Load-progress reporting for explorer contract fetches.
//!
//! Callers pass a callback that is invoked synchronously at each stage
//! boundary so a frontend can render incremental status.

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadStage {
    Validating,
    Fetching,
    Parsing,
    Complete,
    Failed,
}

impl LoadStage {
    /// Progress percentage (0–100) for UI rendering.
    pub fn progress_pct(self) -> u8 {
        match self {
            Self::Validating => 10,
            Self::Fetching => 40,
            Self::Parsing => 85,
            Self::Complete => 100,
            Self::Failed => 0,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Failed)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LoadProgress {
    pub stage: LoadStage,
    pub message: String,
    pub progress_pct: u8,
    pub contract_name: Option<String>,
}

impl LoadProgress {
    pub fn new(stage: LoadStage, message: impl Into<String>) -> Self {
        Self {
            stage,
            message: message.into(),
            progress_pct: stage.progress_pct(),
            contract_name: None,
        }
    }

    pub fn with_contract(mut self, name: impl Into<String>) -> Self {
        self.contract_name = Some(name.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stages_map_to_percentages() {
        assert_eq!(LoadStage::Validating.progress_pct(), 10);
        assert_eq!(LoadStage::Complete.progress_pct(), 100);
        assert_eq!(LoadStage::Failed.progress_pct(), 0);
        assert!(LoadStage::Complete.is_terminal());
        assert!(!LoadStage::Fetching.is_terminal());
    }

    #[test]
    fn progress_carries_contract_name() {
        let progress =
            LoadProgress::new(LoadStage::Fetching, "Found contract").with_contract("Counter");
        assert_eq!(progress.progress_pct, 40);
        assert_eq!(progress.contract_name.as_deref(), Some("Counter"));
    }
}
