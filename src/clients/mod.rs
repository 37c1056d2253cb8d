pub mod doc_requests;
pub mod google_auth;
pub mod google_workspace;

pub use google_auth::{AuthError, GoogleAuth};
pub use google_workspace::GoogleWorkspace;
