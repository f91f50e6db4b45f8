//! HTTP middleware for the backoffice server.
pub mod auth;

pub use auth::{AuthConfig, AuthContext, AuthError, AuthLayer, AuthMethod, Authenticator, Claims};
