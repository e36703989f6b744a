use tracing::debug;

use shared_models::gate::{GateAction, GateDecision, GateInput, Overlay, OverlayKind, StatusGate, SupportContact};

use crate::models::{CleanerProfile, CleanerStatus};

pub const ASSESSMENT_PATH: &str = "/worker/test-personalitate";
pub const CLEANER_DOCUMENTS_PATH: &str = "/worker/documente-obligatorii";

/// Screens that complete the very steps the gate asks for.
pub const EXEMPT_PATHS: [&str; 2] = [ASSESSMENT_PATH, CLEANER_DOCUMENTS_PATH];

/// Onboarding gate for individual cleaners. Prerequisites are strictly
/// ordered: assessment, then documents and portrait, then admin approval.
#[derive(Debug, Clone, Default)]
pub struct CleanerStatusGate {
    contact: SupportContact,
}

impl CleanerStatusGate {
    pub fn new(contact: SupportContact) -> Self {
        Self { contact }
    }
}

impl StatusGate for CleanerStatusGate {
    type Profile = CleanerProfile;

    fn evaluate(&self, input: &GateInput<'_, CleanerProfile>) -> GateDecision {
        if !input.is_authenticated {
            return GateDecision::PassThrough;
        }

        if input.loading {
            return GateDecision::Wait;
        }

        let profile = match input.profile {
            Some(profile) if !input.failed => profile,
            _ => {
                return GateDecision::block(
                    Overlay::new(OverlayKind::ProfileNotFound).with_contact(self.contact.clone()),
                )
            }
        };

        let pending = profile.status == CleanerStatus::PendingReview;

        // Applies on the assessment screen too, once the assessment is done
        if pending
            && profile.has_completed_assessment()
            && !profile.is_ready_for_review()
            && !input.path.contains(CLEANER_DOCUMENTS_PATH)
        {
            debug!("Cleaner {} must upload documents or a portrait", profile.id);
            return GateDecision::redirect(CLEANER_DOCUMENTS_PATH);
        }

        if EXEMPT_PATHS.iter().any(|p| input.path.contains(p)) {
            return GateDecision::PassThrough;
        }

        match profile.status {
            CleanerStatus::PendingReview if !profile.has_completed_assessment() => GateDecision::block(
                Overlay::new(OverlayKind::CompleteAssessment)
                    .with_action(GateAction::Navigate { to: ASSESSMENT_PATH.to_string() }),
            ),
            CleanerStatus::PendingReview if profile.is_ready_for_review() => {
                GateDecision::block(Overlay::new(OverlayKind::AwaitingApproval))
            }
            CleanerStatus::PendingReview => GateDecision::redirect(CLEANER_DOCUMENTS_PATH),
            CleanerStatus::Suspended => GateDecision::block(
                Overlay::new(OverlayKind::Suspended).with_contact(self.contact.clone()),
            ),
            CleanerStatus::Active | CleanerStatus::Invited | CleanerStatus::Unknown => GateDecision::PassThrough,
        }
    }
}
