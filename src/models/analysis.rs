use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ConfidenceLevel {
    High,
    Medium,
    Low,
}

impl ConfidenceLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfidenceLevel::High => "High",
            ConfidenceLevel::Medium => "Medium",
            ConfidenceLevel::Low => "Low",
        }
    }

    /// Accepts the English labels and the French ones the model answers with
    /// when prompted in French.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "high" | "élevé" | "eleve" | "elevé" | "élevée" => Some(ConfidenceLevel::High),
            "medium" | "moyen" | "moyenne" => Some(ConfidenceLevel::Medium),
            "low" | "faible" => Some(ConfidenceLevel::Low),
            _ => None,
        }
    }
}

/// Parsed answer of one inference call.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub count: u32,
    pub description: String,
    pub confidence_level: Option<ConfidenceLevel>,
    pub analyzed_at: DateTime<Utc>,
}
