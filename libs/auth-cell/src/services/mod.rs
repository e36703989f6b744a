pub mod backend;
pub mod fetcher;
pub mod service;

pub use backend::SessionBackend;
pub use fetcher::{FetchPhase, SessionFetcher};
pub use service::{AuthService, SignIn, DEV_CREDENTIAL_PREFIX};
