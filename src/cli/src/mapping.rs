//! Field-name translation between wire records and local records.

use serde_json::{Map, Value};

/// A JSON object keyed by field name.
pub type Fields = Map<String, Value>;

/// Allow-list of `(api field, local field)` pairs.
///
/// Fields missing from the table are dropped in both directions, as are
/// null values.
#[derive(Debug, Clone, Copy)]
pub struct FieldMapping {
    pairs: &'static [(&'static str, &'static str)],
}

impl FieldMapping {
    pub const fn new(pairs: &'static [(&'static str, &'static str)]) -> Self {
        Self { pairs }
    }

    pub fn map_from_api(&self, record: &Value) -> Fields {
        self.translate(record, |(api, local)| (api, local))
    }

    pub fn map_to_api(&self, fields: &Fields) -> Fields {
        let record = Value::Object(fields.clone());
        self.translate(&record, |(api, local)| (local, api))
    }

    fn translate(
        &self,
        source: &Value,
        direction: impl Fn((&'static str, &'static str)) -> (&'static str, &'static str),
    ) -> Fields {
        let mut out = Fields::new();
        for &pair in self.pairs {
            let (from, to) = direction(pair);
            match source.get(from) {
                None | Some(Value::Null) => {}
                Some(value) => {
                    out.insert(to.to_string(), value.clone());
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const MAPPING: FieldMapping = FieldMapping::new(&[
        ("id", "id"),
        ("name", "name"),
        ("created_at", "createdAt"),
        ("deleted_at", "deletedAt"),
    ]);

    #[test]
    fn test_map_from_api_renames_and_filters() {
        let mapped = MAPPING.map_from_api(&json!({
            "id": "1",
            "name": "Editor",
            "created_at": "2024-01-01T00:00:00Z",
            "deleted_at": null,
            "secret": "x"
        }));
        assert_eq!(
            Value::Object(mapped),
            json!({"id": "1", "name": "Editor", "createdAt": "2024-01-01T00:00:00Z"})
        );
    }

    #[test]
    fn test_map_to_api_drops_unknown_fields() {
        let mut fields = Fields::new();
        fields.insert("name".into(), json!("Editor"));
        fields.insert("createdAt".into(), json!("2024-01-01T00:00:00Z"));
        fields.insert("extra".into(), json!(true));

        assert_eq!(
            Value::Object(MAPPING.map_to_api(&fields)),
            json!({"name": "Editor", "created_at": "2024-01-01T00:00:00Z"})
        );
    }

    #[test]
    fn test_non_object_maps_to_nothing() {
        assert!(MAPPING.map_from_api(&json!(null)).is_empty());
        assert!(MAPPING.map_from_api(&json!([1, 2])).is_empty());
    }
}
