//! Billable operation types and cost overrides.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// The closed set of billable operation kinds.
///
/// The key mapping is total and reversible: every enumerant has exactly one
/// key and every recognized key maps back to exactly one enumerant. Keys
/// outside this set are rejected at the boundary, never defaulted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationType {
    TextChat,
    ImageGeneration,
    DocumentAnalysis,
    AudioTranscription,
}

impl OperationType {
    pub const ALL: [OperationType; 4] = [
        OperationType::TextChat,
        OperationType::ImageGeneration,
        OperationType::DocumentAnalysis,
        OperationType::AudioTranscription,
    ];

    /// Wire/storage key for this operation.
    pub fn as_key(&self) -> &'static str {
        match self {
            OperationType::TextChat => "ai_text_chat",
            OperationType::ImageGeneration => "ai_image_generation",
            OperationType::DocumentAnalysis => "ai_document_analysis",
            OperationType::AudioTranscription => "ai_audio_transcription",
        }
    }

    /// Parse a wire/storage key. Returns `None` for keys outside the closed
    /// set; callers turn that into an `UnrecognizedOperationType` error.
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "ai_text_chat" => Some(OperationType::TextChat),
            "ai_image_generation" => Some(OperationType::ImageGeneration),
            "ai_document_analysis" => Some(OperationType::DocumentAnalysis),
            "ai_audio_transcription" => Some(OperationType::AudioTranscription),
            _ => None,
        }
    }

    /// Compiled-in credit cost, used when no override row exists.
    pub fn default_cost(&self) -> i64 {
        match self {
            OperationType::TextChat => 1,
            OperationType::ImageGeneration => 5,
            OperationType::DocumentAnalysis => 3,
            OperationType::AudioTranscription => 2,
        }
    }
}

impl std::fmt::Display for OperationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_key())
    }
}

/// Administrator-supplied cost override for one operation key.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct FeatureCostOverride {
    pub operation_key: String,
    pub cost: i64,
    pub updated_utc: DateTime<Utc>,
}

/// Administrator-supplied credit-grant override for one plan key.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PlanCreditOverride {
    pub plan_key: String,
    pub credits: i64,
    pub updated_utc: DateTime<Utc>,
}
