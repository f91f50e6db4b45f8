//! Controllers that drive list and form screens from the caches.
//!
//! Controllers hold no transport logic of their own. They sequence cache
//! calls and turn failed responses into a user-facing message cell.

pub mod association;
pub mod form;
pub mod list;

pub use association::{AssociationEditController, CommitOutcome};
pub use form::FormSyncController;
pub use list::ResourceListController;

use crate::remote::ApiResponse;

pub const NOT_ALLOWED_TO_SAVE: &str = "Not allowed to save";
pub const NOT_ALLOWED_TO_VIEW: &str = "Not allowed to view";

/// Message for a failed response, or `None` for a 401 already redirected.
pub(crate) fn failure_message(response: &ApiResponse, forbidden: &str) -> Option<String> {
    if response.is_unauthorized() {
        None
    } else if response.is_forbidden() {
        Some(forbidden.to_string())
    } else {
        Some(
            response
                .error_message()
                .map(str::to_string)
                .unwrap_or_else(|| format!("Request failed with status {}", response.status)),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_failure_message() {
        let forbidden = ApiResponse::new(403, json!({"error": {"message": "Not allowed"}}));
        assert_eq!(failure_message(&forbidden, NOT_ALLOWED_TO_SAVE).as_deref(), Some(NOT_ALLOWED_TO_SAVE));

        let invalid = ApiResponse::new(400, json!({"error": {"message": "body.name: field is required"}}));
        assert_eq!(
            failure_message(&invalid, NOT_ALLOWED_TO_SAVE).as_deref(),
            Some("body.name: field is required")
        );

        assert_eq!(
            failure_message(&ApiResponse::new(502, json!(null)), NOT_ALLOWED_TO_VIEW).as_deref(),
            Some("Request failed with status 502")
        );
        assert!(failure_message(&ApiResponse::new(401, json!(null)), NOT_ALLOWED_TO_VIEW).is_none());
    }
}
