pub mod guards;
pub mod services;
pub mod token_store;

pub use guards::{protected_route, role_route, LOGIN_PATH};
pub use services::*;
pub use token_store::{FileTokenStore, MemoryTokenStore, TOKEN_KEY};
