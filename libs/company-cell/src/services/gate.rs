use tracing::debug;

use shared_models::gate::{GateAction, GateDecision, GateInput, Overlay, OverlayKind, StatusGate, SupportContact};

use crate::models::{CompanyProfile, CompanyStatus};

pub const REGISTER_COMPANY_PATH: &str = "/inregistrare-firma";
pub const CLAIM_COMPANY_PATH: &str = "/claim-firma";
pub const LOGIN_PATH: &str = "/autentificare";
pub const COMPANY_DOCUMENTS_PATH: &str = "/firma/documente-obligatorii";

/// Paths reachable whatever the company's status.
pub const EXCLUDED_PATHS: [&str; 3] = [REGISTER_COMPANY_PATH, CLAIM_COMPANY_PATH, LOGIN_PATH];

const DOCUMENTS_SEGMENT: &str = "/documente-obligatorii";

/// Onboarding gate for company administrators.
#[derive(Debug, Clone, Default)]
pub struct CompanyStatusGate {
    contact: SupportContact,
}

impl CompanyStatusGate {
    pub fn new(contact: SupportContact) -> Self {
        Self { contact }
    }

    fn overlay(&self, kind: OverlayKind) -> Overlay {
        Overlay::new(kind).with_contact(self.contact.clone())
    }

    fn register_action() -> GateAction {
        GateAction::Navigate { to: REGISTER_COMPANY_PATH.to_string() }
    }

    fn evaluate_company(&self, company: &CompanyProfile, path: &str) -> GateDecision {
        let on_documents_page = path.contains(DOCUMENTS_SEGMENT);

        match company.status {
            CompanyStatus::PendingReview if !company.has_all_required_documents() && !on_documents_page => {
                debug!("Company {} still misses {:?}", company.id, company.missing_documents());
                GateDecision::redirect(COMPANY_DOCUMENTS_PATH)
            }
            // Documents can still be replaced while the review runs
            CompanyStatus::PendingReview if on_documents_page => GateDecision::PassThrough,
            CompanyStatus::PendingReview => GateDecision::block(
                self.overlay(OverlayKind::UnderReview).with_action(GateAction::Logout),
            ),
            CompanyStatus::Rejected => GateDecision::block(
                self.overlay(OverlayKind::Rejected)
                    .with_reason(company.rejection_reason.clone())
                    .with_action(Self::register_action())
                    .with_action(GateAction::Logout),
            ),
            CompanyStatus::Suspended => GateDecision::block(
                self.overlay(OverlayKind::CompanySuspended).with_action(GateAction::Logout),
            ),
            CompanyStatus::Approved | CompanyStatus::Unknown => GateDecision::PassThrough,
        }
    }
}

impl StatusGate for CompanyStatusGate {
    type Profile = CompanyProfile;

    fn evaluate(&self, input: &GateInput<'_, CompanyProfile>) -> GateDecision {
        if !input.is_authenticated || EXCLUDED_PATHS.iter().any(|p| input.path.starts_with(p)) {
            return GateDecision::PassThrough;
        }

        if input.loading {
            return GateDecision::Wait;
        }

        match input.profile {
            Some(company) if !input.failed => self.evaluate_company(company, input.path),
            _ => GateDecision::block(
                self.overlay(OverlayKind::NoCompany)
                    .with_action(Self::register_action())
                    .with_action(GateAction::Logout),
            ),
        }
    }
}
