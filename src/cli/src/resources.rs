//! Resource definitions: base path, field mapping and local record type.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tabled::Tabled;

use crate::mapping::{FieldMapping, Fields};

/// An entity type exposed through the uniform CRUD endpoints.
pub trait Resource: Clone + Send + Sync + Serialize + DeserializeOwned + 'static {
    /// Path under the API base URL, without slashes.
    const BASE_PATH: &'static str;

    /// Local fields a form may send back.
    const EDITABLE: &'static [&'static str] = &["name"];

    fn mapping() -> &'static FieldMapping;

    fn id(&self) -> &str;

    /// Decode a wire record through the mapping.
    fn from_api(record: &Value) -> serde_json::Result<Self> {
        serde_json::from_value(Value::Object(Self::mapping().map_from_api(record)))
    }

    /// The record as local fields, the shape an edit form starts from.
    fn to_fields(&self) -> Fields {
        match serde_json::to_value(self) {
            Ok(Value::Object(fields)) => fields,
            _ => Fields::new(),
        }
    }
}

static STANDARD_MAPPING: FieldMapping = FieldMapping::new(&[
    ("id", "id"),
    ("name", "name"),
    ("created_at", "createdAt"),
    ("updated_at", "updatedAt"),
    ("deleted_at", "deletedAt"),
]);

fn display_time(value: &Option<DateTime<Utc>>) -> String {
    value
        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".to_string())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Tabled)]
#[serde(rename_all = "camelCase")]
pub struct Role {
    #[tabled(rename = "ID")]
    pub id: String,
    #[tabled(rename = "Name")]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[tabled(rename = "Created", display_with = "display_time")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[tabled(rename = "Updated", display_with = "display_time")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[tabled(rename = "Archived", display_with = "display_time")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Resource for Role {
    const BASE_PATH: &'static str = "roles";

    fn mapping() -> &'static FieldMapping {
        &STANDARD_MAPPING
    }

    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Tabled)]
#[serde(rename_all = "camelCase")]
pub struct Permission {
    #[tabled(rename = "ID")]
    pub id: String,
    #[tabled(rename = "Name")]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[tabled(rename = "Created", display_with = "display_time")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[tabled(rename = "Updated", display_with = "display_time")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[tabled(rename = "Archived", display_with = "display_time")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Resource for Permission {
    const BASE_PATH: &'static str = "permissions";

    fn mapping() -> &'static FieldMapping {
        &STANDARD_MAPPING
    }

    fn id(&self) -> &str {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_role_from_api() {
        let role = Role::from_api(&json!({
            "id": "7f1c",
            "name": "Editor",
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-02T00:00:00Z",
            "deleted_at": null
        }))
        .unwrap();

        assert_eq!(role.id(), "7f1c");
        assert_eq!(role.name, "Editor");
        assert!(role.updated_at.is_some());
        assert!(role.deleted_at.is_none());
    }

    #[test]
    fn test_from_api_requires_identity() {
        assert!(Permission::from_api(&json!({"name": "roles:read"})).is_err());
    }

    #[test]
    fn test_to_fields_uses_local_names() {
        let role = Role::from_api(&json!({"id": "1", "name": "Editor", "created_at": "2024-01-01T00:00:00Z"})).unwrap();
        let fields = role.to_fields();
        assert_eq!(fields["name"], json!("Editor"));
        assert!(fields.contains_key("createdAt"));
        assert!(!fields.contains_key("deletedAt"));
    }
}
