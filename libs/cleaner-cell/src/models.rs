use serde::{Deserialize, Serialize};

/// Document types a cleaner must upload before admin review.
pub const REQUIRED_CLEANER_DOCUMENTS: [&str; 2] = ["cazier_judiciar", "contract_munca"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CleanerStatus {
    Invited,
    PendingReview,
    Active,
    Suspended,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanerDocument {
    pub id: String,
    pub document_type: String,
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default)]
    pub file_url: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub uploaded_at: Option<String>,
    #[serde(default)]
    pub rejection_reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonalityAssessment {
    pub id: String,
    #[serde(default)]
    pub completed_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanerProfile {
    pub id: String,
    #[serde(default)]
    pub full_name: Option<String>,
    pub status: CleanerStatus,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub personality_assessment: Option<PersonalityAssessment>,
    #[serde(default)]
    pub documents: Vec<CleanerDocument>,
}

impl CleanerProfile {
    pub fn has_completed_assessment(&self) -> bool {
        self.personality_assessment.is_some()
    }

    pub fn has_profile_image(&self) -> bool {
        self.avatar_url.as_deref().is_some_and(|url| !url.is_empty())
    }

    pub fn has_all_required_documents(&self) -> bool {
        REQUIRED_CLEANER_DOCUMENTS
            .iter()
            .all(|required| self.documents.iter().any(|doc| doc.document_type == *required))
    }

    /// Documents and portrait are both in, so only the admin review remains.
    pub fn is_ready_for_review(&self) -> bool {
        self.has_all_required_documents() && self.has_profile_image()
    }
}
