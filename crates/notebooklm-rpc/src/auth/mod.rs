//! Session credentials and the single-flight refresh coordinator.

mod credentials;
mod refresh;

pub use credentials::{Cookie, Credentials, REQUIRED_COOKIE};
pub use refresh::{is_login_redirect, RefreshCoordinator, RefreshReason, SessionState};
