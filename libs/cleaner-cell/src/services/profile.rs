use std::sync::Arc;

use serde_json::json;
use tracing::{instrument, warn};

use shared_graphql::{FetchPolicy, GraphqlClient, Operation};
use shared_models::error::BackendError;
use shared_utils::gate::{GateMonitor, QueryState};

use crate::models::CleanerProfile;
use crate::services::gate::CleanerStatusGate;

pub const MY_CLEANER_PROFILE_QUERY: Operation = Operation {
    name: "MyCleanerProfile",
    root: "myCleanerProfile",
    document: r#"query MyCleanerProfile {
  myCleanerProfile {
    id
    fullName
    avatarUrl
    status
    documents { id documentType fileUrl fileName status uploadedAt rejectionReason }
    personalityAssessment { id completedAt }
  }
}"#,
};

pub struct CleanerProfileService {
    client: Arc<GraphqlClient>,
}

impl CleanerProfileService {
    pub fn new(client: Arc<GraphqlClient>) -> Self {
        Self { client }
    }

    #[instrument(skip(self))]
    pub async fn my_cleaner_profile(&self, policy: FetchPolicy) -> Result<Option<CleanerProfile>, BackendError> {
        self.client.query(&MY_CLEANER_PROFILE_QUERY, json!({}), policy).await
    }

    pub async fn load(&self, policy: FetchPolicy) -> QueryState<CleanerProfile> {
        match self.my_cleaner_profile(policy).await {
            Ok(profile) => QueryState::loaded(profile),
            Err(e) => {
                warn!("Failed to load cleaner profile: {}", e);
                QueryState::failed(e.to_string())
            }
        }
    }

    pub async fn sync(&self, monitor: &GateMonitor<CleanerStatusGate>, policy: FetchPolicy) {
        monitor.set_query(self.load(policy).await);
    }
}
