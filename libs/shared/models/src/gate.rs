use serde::Serialize;

/// What an onboarding gate wants the presentation layer to do.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "kebab-case")]
pub enum GateDecision {
    PassThrough,
    Wait,
    Block { overlay: Overlay },
    Redirect { to: String },
}

impl GateDecision {
    pub fn block(overlay: Overlay) -> Self {
        GateDecision::Block { overlay }
    }

    pub fn redirect(to: impl Into<String>) -> Self {
        GateDecision::Redirect { to: to.into() }
    }

    pub fn overlay(&self) -> Option<&Overlay> {
        match self {
            GateDecision::Block { overlay } => Some(overlay),
            _ => None,
        }
    }

    pub fn redirect_target(&self) -> Option<&str> {
        match self {
            GateDecision::Redirect { to } => Some(to.as_str()),
            _ => None,
        }
    }

    pub fn is_pass_through(&self) -> bool {
        matches!(self, GateDecision::PassThrough)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum OverlayKind {
    // Cleaner onboarding
    CompleteAssessment,
    AwaitingApproval,
    Suspended,
    ProfileNotFound,
    // Company onboarding
    NoCompany,
    UnderReview,
    Rejected,
    CompanySuspended,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum GateAction {
    Navigate { to: String },
    Logout,
}

/// Where to reach a human when an overlay has no self-service way out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SupportContact {
    pub phone: String,
    pub email: String,
}

impl Default for SupportContact {
    fn default() -> Self {
        Self {
            phone: "+40 312 345 678".to_string(),
            email: "contact@helpmeclean.ro".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Overlay {
    pub kind: OverlayKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub actions: Vec<GateAction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact: Option<SupportContact>,
}

impl Overlay {
    pub fn new(kind: OverlayKind) -> Self {
        Self {
            kind,
            reason: None,
            actions: Vec::new(),
            contact: None,
        }
    }

    pub fn with_reason(mut self, reason: Option<String>) -> Self {
        self.reason = reason;
        self
    }

    pub fn with_action(mut self, action: GateAction) -> Self {
        self.actions.push(action);
        self
    }

    pub fn with_contact(mut self, contact: SupportContact) -> Self {
        self.contact = Some(contact);
        self
    }

    pub fn primary_action(&self) -> Option<&GateAction> {
        self.actions.first()
    }

    pub fn navigates_to(&self, path: &str) -> bool {
        self.actions
            .iter()
            .any(|action| matches!(action, GateAction::Navigate { to } if to == path))
    }
}

/// Everything a gate looks at. `failed` marks a profile query that errored
/// rather than answering.
#[derive(Debug, Clone, Copy)]
pub struct GateInput<'a, P> {
    pub is_authenticated: bool,
    pub profile: Option<&'a P>,
    pub loading: bool,
    pub failed: bool,
    pub path: &'a str,
}

/// Pure mapping from session flag + profile record + location to a decision.
pub trait StatusGate: Send + Sync {
    type Profile;

    fn evaluate(&self, input: &GateInput<'_, Self::Profile>) -> GateDecision;
}

/// Side-effecting navigation used for auto-redirects.
pub trait Navigator: Send + Sync {
    fn navigate(&self, to: &str, replace: bool);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decision_serializes_as_tagged_union() {
        let decision = GateDecision::block(
            Overlay::new(OverlayKind::Rejected)
                .with_reason(Some("CUI invalid".to_string()))
                .with_action(GateAction::Navigate { to: "/inregistrare-firma".to_string() }),
        );

        let value = serde_json::to_value(&decision).unwrap();
        assert_eq!(value["decision"], json!("block"));
        assert_eq!(value["overlay"]["kind"], json!("rejected"));
        assert_eq!(value["overlay"]["reason"], json!("CUI invalid"));
        assert_eq!(value["overlay"]["actions"][0]["action"], json!("navigate"));

        let redirect = serde_json::to_value(GateDecision::redirect("/x")).unwrap();
        assert_eq!(redirect, json!({ "decision": "redirect", "to": "/x" }));
    }

    #[test]
    fn test_overlay_navigates_to() {
        let overlay = Overlay::new(OverlayKind::NoCompany)
            .with_action(GateAction::Navigate { to: "/a".to_string() })
            .with_action(GateAction::Logout);

        assert!(overlay.navigates_to("/a"));
        assert!(!overlay.navigates_to("/b"));
        assert_eq!(overlay.primary_action(), Some(&GateAction::Navigate { to: "/a".to_string() }));
    }
}
