use serde::{Deserialize, Serialize};

/// Stages of a table run, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EtlStage {
    /// Reading the raw extract
    Extracting,
    /// Computing the quality profile
    Profiling,
    /// Quarantining anomalies and cleaning
    Cleaning,
    /// Writing the quality report and anomaly log
    Reporting,
    /// Persisting to the columnar and relational sinks
    Loading,
    Complete,
    Failed,
}

impl EtlStage {
    /// Returns a human-readable name for the stage.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Extracting => "Extracting",
            Self::Profiling => "Profiling Table",
            Self::Cleaning => "Cleaning Data",
            Self::Reporting => "Writing Reports",
            Self::Loading => "Loading Sinks",
            Self::Complete => "Complete",
            Self::Failed => "Failed",
        }
    }
}

impl std::fmt::Display for EtlStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_and_serde() {
        assert_eq!(EtlStage::Loading.to_string(), "Loading Sinks");
        assert_eq!(
            serde_json::to_string(&EtlStage::Extracting).unwrap(),
            "\"extracting\""
        );
        assert_eq!(EtlStage::Failed.to_string(), "Failed");
    }
}
