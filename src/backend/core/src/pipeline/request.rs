//! Raw request capture and per-region decoding.

use axum::{
    async_trait,
    body::{to_bytes, Body},
    extract::{FromRequest, FromRequestParts, Path, Query, Request},
};
use serde::de::{DeserializeOwned, IgnoredAny};
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::convert::Infallible;

use crate::middleware::AuthContext;
use crate::validation::{Validate, ValidationErrorKind, ValidationErrors, ValidationResult};

/// Largest request body the pipeline reads.
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

// ═══════════════════════════════════════════════════════════════════════════════
// Regions
// ═══════════════════════════════════════════════════════════════════════════════

/// The three input regions a request schema can constrain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Region {
    PathParameters,
    QueryStringParameters,
    Body,
}

impl Region {
    /// Prefix used for field errors in this region.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PathParameters => "pathParameters",
            Self::QueryStringParameters => "queryStringParameters",
            Self::Body => "body",
        }
    }
}

/// A typed, validatable view of one input region.
pub trait Schema: DeserializeOwned + Validate + Send + 'static {}

impl<T> Schema for T where T: DeserializeOwned + Validate + Send + 'static {}

/// Accepts any region content without looking at it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Unchecked;

impl<'de> Deserialize<'de> for Unchecked {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        IgnoredAny::deserialize(deserializer).map(|_| Unchecked)
    }
}

impl Validate for Unchecked {
    fn validate(&self) -> ValidationResult<()> {
        Ok(())
    }
}

/// A query value that may be given once or repeated.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    pub fn into_vec(self) -> Vec<T> {
        match self {
            Self::One(value) => vec![value],
            Self::Many(values) => values,
        }
    }
}

impl<T: Clone> OneOrMany<T> {
    pub fn to_vec(&self) -> Vec<T> {
        self.clone().into_vec()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Raw Request
// ═══════════════════════════════════════════════════════════════════════════════

/// Request body as received.
#[derive(Debug, Clone, PartialEq)]
pub enum RawBody {
    Empty,
    Json(Value),
    /// Not valid JSON; carries the parser message.
    Malformed(String),
}

impl RawBody {
    pub fn from_bytes(bytes: &[u8]) -> Self {
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Self::Empty;
        }
        match serde_json::from_slice(bytes) {
            Ok(value) => Self::Json(value),
            Err(e) => Self::Malformed(e.to_string()),
        }
    }
}

/// Everything the pipeline needs from an HTTP request, before validation.
#[derive(Debug, Clone)]
pub struct RawRequest {
    pub path: HashMap<String, String>,
    pub query: Vec<(String, String)>,
    pub body: RawBody,
    /// Set by the auth layer.
    pub caller: Option<AuthContext>,
}

impl RawRequest {
    pub fn new() -> Self {
        Self {
            path: HashMap::new(),
            query: Vec::new(),
            body: RawBody::Empty,
            caller: None,
        }
    }

    pub fn path_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.path.insert(name.into(), value.into());
        self
    }

    pub fn query_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = RawBody::Json(body);
        self
    }

    pub fn caller(mut self, caller: AuthContext) -> Self {
        self.caller = Some(caller);
        self
    }

    /// Decode one region into its schema type and validate it.
    ///
    /// Errors are reported under the region's prefix.
    pub fn decode<T: Schema>(&self, region: Region) -> ValidationResult<T> {
        let value = match region {
            Region::PathParameters => path_value(&self.path),
            Region::QueryStringParameters => query_value(&self.query),
            Region::Body => match &self.body {
                RawBody::Empty => Value::Null,
                RawBody::Json(value) => value.clone(),
                RawBody::Malformed(reason) => {
                    return Err(invalid(region, format!("malformed JSON: {}", reason)));
                }
            },
        };

        let parsed: T = serde_json::from_value(value).map_err(|e| invalid(region, e.to_string()))?;

        if let Err(errors) = parsed.validate() {
            let mut scoped = ValidationErrors::new();
            scoped.merge_with_prefix(region.as_str(), errors);
            return Err(scoped);
        }
        Ok(parsed)
    }
}

impl Default for RawRequest {
    fn default() -> Self {
        Self::new()
    }
}

fn invalid(region: Region, reason: String) -> ValidationErrors {
    ValidationErrors::single(region.as_str(), ValidationErrorKind::InvalidType { reason })
}

fn path_value(params: &HashMap<String, String>) -> Value {
    Value::Object(
        params
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect(),
    )
}

/// Repeated keys collapse into an array, in the order given.
fn query_value(pairs: &[(String, String)]) -> Value {
    let mut object = Map::new();
    for (key, value) in pairs {
        let value = Value::String(value.clone());
        match object.get_mut(key) {
            None => {
                object.insert(key.clone(), value);
            }
            Some(Value::Array(values)) => values.push(value),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, value]);
            }
        }
    }
    Value::Object(object)
}

#[async_trait]
impl<S> FromRequest<S> for RawRequest
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request(request: Request<Body>, state: &S) -> Result<Self, Self::Rejection> {
        let (mut parts, body) = request.into_parts();

        let path = Path::<HashMap<String, String>>::from_request_parts(&mut parts, state)
            .await
            .map(|Path(params)| params)
            .unwrap_or_default();

        let query = Query::<Vec<(String, String)>>::try_from_uri(&parts.uri)
            .map(|Query(pairs)| pairs)
            .unwrap_or_default();

        let caller = parts.extensions.get::<AuthContext>().cloned();

        let body = match to_bytes(body, MAX_BODY_BYTES).await {
            Ok(bytes) => RawBody::from_bytes(&bytes),
            Err(e) => RawBody::Malformed(e.to_string()),
        };

        Ok(Self {
            path,
            query,
            body,
            caller,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::{validate_field, validate_request, Required};
    use serde_json::json;

    #[derive(Debug, Deserialize)]
    struct Named {
        name: String,
    }

    impl Validate for Named {
        fn validate(&self) -> ValidationResult<()> {
            validate_request()
                .field(validate_field("name", &self.name).rule(Required))
                .result()
        }
    }

    #[derive(Debug, Deserialize)]
    struct Ids {
        ids: OneOrMany<String>,
    }

    impl Validate for Ids {
        fn validate(&self) -> ValidationResult<()> {
            Ok(())
        }
    }

    #[test]
    fn test_raw_body_from_bytes() {
        assert_eq!(RawBody::from_bytes(b""), RawBody::Empty);
        assert_eq!(RawBody::from_bytes(b"  \n"), RawBody::Empty);
        assert_eq!(RawBody::from_bytes(b"[1]"), RawBody::Json(json!([1])));
        assert!(matches!(RawBody::from_bytes(b"{nope"), RawBody::Malformed(_)));
    }

    #[test]
    fn test_query_repeated_keys_become_array() {
        let value = query_value(&[
            ("ids".into(), "a".into()),
            ("other".into(), "x".into()),
            ("ids".into(), "b".into()),
            ("ids".into(), "c".into()),
        ]);
        assert_eq!(value, json!({"ids": ["a", "b", "c"], "other": "x"}));
    }

    #[test]
    fn test_one_or_many() {
        let one = RawRequest::new().query_param("ids", "a");
        let parsed: Ids = one.decode(Region::QueryStringParameters).unwrap();
        assert_eq!(parsed.ids.into_vec(), vec!["a".to_string()]);

        let many = RawRequest::new().query_param("ids", "a").query_param("ids", "b");
        let parsed: Ids = many.decode(Region::QueryStringParameters).unwrap();
        assert_eq!(parsed.ids.to_vec(), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_decode_scopes_errors_by_region() {
        let request = RawRequest::new().json(json!({"name": "  "}));
        let errors = request.decode::<Named>(Region::Body).unwrap_err();
        assert!(errors.has_errors("body.name"));

        let missing = RawRequest::new().decode::<Named>(Region::Body).unwrap_err();
        assert!(missing.has_errors("body"));

        let query = RawRequest::new().decode::<Ids>(Region::QueryStringParameters).unwrap_err();
        assert!(query.has_errors("queryStringParameters"));
    }

    #[test]
    fn test_malformed_body_is_a_validation_error() {
        let mut request = RawRequest::new();
        request.body = RawBody::Malformed("expected value".into());
        let errors = request.decode::<Unchecked>(Region::Body).unwrap_err();
        assert!(errors.has_errors("body"));
    }

    #[test]
    fn test_unchecked_accepts_anything() {
        let request = RawRequest::new().json(json!({"anything": [1, 2]}));
        assert!(request.decode::<Unchecked>(Region::Body).is_ok());
        assert!(RawRequest::new().decode::<Unchecked>(Region::PathParameters).is_ok());
    }
}
