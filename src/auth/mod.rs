//! Identity provider boundary
//!
//! Handles:
//! - Signed session tokens issued by the identity provider
//! - Syncing verified identities into the users table
//! - Authentication extractors and middleware

mod middleware;
pub mod session;

pub use middleware::{AdminUser, CurrentUser, MaybeUser, require_auth};
pub use session::{Session, create_session_token, verify_session_token};
