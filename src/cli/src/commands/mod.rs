//! CLI command implementations.

pub mod common;
pub mod config;
pub mod permissions;
pub mod roles;

use backoffice_client::RemoteResourceClient;

use crate::output::OutputFormat;

/// What every resource command needs.
pub struct Context {
    pub client: RemoteResourceClient,
    pub format: OutputFormat,
}
