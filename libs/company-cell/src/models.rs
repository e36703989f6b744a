use serde::{Deserialize, Serialize};

/// Document types a company must upload before review can finish.
pub const REQUIRED_COMPANY_DOCUMENTS: [&str; 3] = [
    "certificat_constatator",
    "asigurare_raspundere_civila",
    "cui_document",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CompanyStatus {
    PendingReview,
    Approved,
    Rejected,
    Suspended,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyDocument {
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
pub struct CompanyProfile {
    pub id: String,
    pub company_name: String,
    #[serde(default)]
    pub cui: Option<String>,
    pub status: CompanyStatus,
    #[serde(default)]
    pub rejection_reason: Option<String>,
    #[serde(default)]
    pub documents: Vec<CompanyDocument>,
}

impl CompanyProfile {
    pub fn has_document(&self, document_type: &str) -> bool {
        self.documents.iter().any(|doc| doc.document_type == document_type)
    }

    /// Every required document type has at least one upload, whatever its
    /// review status.
    pub fn has_all_required_documents(&self) -> bool {
        REQUIRED_COMPANY_DOCUMENTS.iter().all(|doc| self.has_document(doc))
    }

    pub fn missing_documents(&self) -> Vec<&'static str> {
        REQUIRED_COMPANY_DOCUMENTS
            .iter()
            .copied()
            .filter(|doc| !self.has_document(doc))
            .collect()
    }
}
