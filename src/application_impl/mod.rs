mod api_client;
mod bearer_auth;
mod credential_store;
mod reissue_api_fake;
mod reissue_coordinator;
mod reissue_on_expiry;
mod session_manager;

pub use api_client::*;
pub use bearer_auth::*;
pub use credential_store::*;
pub use reissue_api_fake::*;
pub use reissue_coordinator::*;
pub use reissue_on_expiry::*;
pub use session_manager::*;
