//! Authentication: user accounts, session tokens, and the request extractor.
//!
//! Sessions are a short-lived JWT access token (15 minutes) plus a
//! longer-lived rotating refresh token (7 days) persisted server-side and
//! valid for exactly one refresh. The background scheduler never consults
//! either.

pub mod middleware;
pub mod models;
pub mod service;

pub use middleware::CurrentUser;
pub use models::{AuthenticatedUser, RefreshToken, User, UserStore};
pub use service::{AuthService, TokenPair};
