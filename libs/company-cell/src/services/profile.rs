use std::sync::Arc;

use serde_json::json;
use tracing::{instrument, warn};

use shared_graphql::{FetchPolicy, GraphqlClient, Operation};
use shared_models::error::BackendError;
use shared_utils::gate::{GateMonitor, QueryState};

use crate::models::CompanyProfile;
use crate::services::gate::CompanyStatusGate;

pub const MY_COMPANY_QUERY: Operation = Operation {
    name: "MyCompany",
    root: "myCompany",
    document: r#"query MyCompany {
  myCompany {
    id
    companyName
    cui
    status
    rejectionReason
    documents { id documentType fileName fileUrl status uploadedAt rejectionReason }
  }
}"#,
};

pub struct CompanyProfileService {
    client: Arc<GraphqlClient>,
}

impl CompanyProfileService {
    pub fn new(client: Arc<GraphqlClient>) -> Self {
        Self { client }
    }

    #[instrument(skip(self))]
    pub async fn my_company(&self, policy: FetchPolicy) -> Result<Option<CompanyProfile>, BackendError> {
        self.client.query(&MY_COMPANY_QUERY, json!({}), policy).await
    }

    /// Query result in the shape the gate monitor consumes.
    pub async fn load(&self, policy: FetchPolicy) -> QueryState<CompanyProfile> {
        match self.my_company(policy).await {
            Ok(company) => QueryState::loaded(company),
            Err(e) => {
                warn!("Failed to load company profile: {}", e);
                QueryState::failed(e.to_string())
            }
        }
    }

    /// Fetch and hand the result to `monitor`, which re-evaluates.
    pub async fn sync(&self, monitor: &GateMonitor<CompanyStatusGate>, policy: FetchPolicy) {
        monitor.set_query(self.load(policy).await);
    }
}
