//! Generic CRUD viewset over a [`ResourceStore`].

use std::sync::Arc;

use serde_json::Value;

use crate::http::response::{ApiError, ApiResult, FieldErrors};
use crate::views::store::{Object, ResourceStore};
use crate::views::{Permission, ViewRequest, ViewSet};

/// Full list/create/retrieve/update/destroy over JSON objects.
#[derive(Debug, Clone)]
pub struct ModelViewSet {
    model_name: &'static str,
    description: &'static str,
    required_fields: &'static [&'static str],
    filter_fields: &'static [&'static str],
    permission: Permission,
    store: Arc<ResourceStore>,
}

impl ModelViewSet {
    pub fn new(model_name: &'static str, store: Arc<ResourceStore>) -> Self {
        Self {
            model_name,
            description: "",
            required_fields: &[],
            filter_fields: &[],
            permission: Permission::IsAuthenticatedOrReadOnly,
            store,
        }
    }

    pub fn describe(mut self, description: &'static str) -> Self {
        self.description = description;
        self
    }

    /// Fields that must be present and non-null on create and full update.
    pub fn required(mut self, fields: &'static [&'static str]) -> Self {
        self.required_fields = fields;
        self
    }

    /// Fields the list action may filter on by query-string equality.
    pub fn filter_on(mut self, fields: &'static [&'static str]) -> Self {
        self.filter_fields = fields;
        self
    }

    pub fn with_permission(mut self, permission: Permission) -> Self {
        self.permission = permission;
        self
    }

    fn validate(&self, data: Value, partial: bool) -> ApiResult<Object> {
        let fields = into_object(data)?;
        if partial {
            return Ok(fields);
        }

        let mut errors = FieldErrors::new();
        for &field in self.required_fields {
            match fields.get(field) {
                None => {
                    errors.insert(field.to_string(), vec!["This field is required.".into()]);
                }
                Some(Value::Null) => {
                    errors.insert(field.to_string(), vec!["This field may not be null.".into()]);
                }
                Some(_) => {}
            }
        }

        if errors.is_empty() {
            Ok(fields)
        } else {
            Err(ApiError::Validation(errors))
        }
    }

    fn matches_filters(&self, row: &Object, req: &ViewRequest<'_>) -> bool {
        self.filter_fields.iter().all(|&field| match req.query.get(field) {
            None => true,
            Some(wanted) => row.get(field).is_some_and(|value| query_equals(value, wanted)),
        })
    }
}

/// Lookups are integer ids; anything else cannot exist.
pub fn parse_pk(pk: &str) -> ApiResult<u64> {
    pk.parse::<u64>().map_err(|_| ApiError::NotFound)
}

/// Require a JSON object request body.
pub fn into_object(data: Value) -> ApiResult<Object> {
    match data {
        Value::Object(fields) => Ok(fields),
        other => Err(ApiError::field(
            "non_field_errors",
            format!(
                "Invalid data. Expected a dictionary, but got {}.",
                json_type_name(&other)
            ),
        )),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "str",
        Value::Array(_) => "list",
        Value::Object(_) => "dict",
    }
}

/// Compare a stored value with a query-string value.
fn query_equals(value: &Value, wanted: &str) -> bool {
    match value {
        Value::String(s) => s == wanted,
        Value::Bool(b) => match wanted.to_ascii_lowercase().as_str() {
            "true" | "1" => *b,
            "false" | "0" => !*b,
            _ => false,
        },
        Value::Number(n) => n.to_string() == wanted,
        Value::Null => wanted.is_empty() || wanted == "null",
        Value::Array(_) | Value::Object(_) => false,
    }
}

impl ViewSet for ModelViewSet {
    fn model_name(&self) -> &str {
        self.model_name
    }

    fn description(&self) -> &str {
        self.description
    }

    fn permission(&self) -> Permission {
        self.permission
    }

    fn list(&self, req: &ViewRequest<'_>) -> ApiResult<Value> {
        let rows = self
            .store
            .list()
            .into_iter()
            .filter(|row| self.matches_filters(row, req))
            .map(Value::Object)
            .collect();
        Ok(Value::Array(rows))
    }

    fn create(&self, _req: &ViewRequest<'_>, data: Value) -> ApiResult<Value> {
        let fields = self.validate(data, false)?;
        let created = self.store.insert(fields);
        tracing::debug!(model = self.model_name, id = ?created.get("id"), "Object created");
        Ok(Value::Object(created))
    }

    fn retrieve(&self, _req: &ViewRequest<'_>, pk: &str) -> ApiResult<Value> {
        self.store
            .get(parse_pk(pk)?)
            .map(Value::Object)
            .ok_or(ApiError::NotFound)
    }

    fn update(&self, _req: &ViewRequest<'_>, pk: &str, data: Value) -> ApiResult<Value> {
        let id = parse_pk(pk)?;
        if self.store.get(id).is_none() {
            return Err(ApiError::NotFound);
        }
        let fields = self.validate(data, false)?;
        self.store
            .replace(id, fields)
            .map(Value::Object)
            .ok_or(ApiError::NotFound)
    }

    fn partial_update(&self, _req: &ViewRequest<'_>, pk: &str, data: Value) -> ApiResult<Value> {
        let id = parse_pk(pk)?;
        let fields = self.validate(data, true)?;
        self.store
            .merge(id, fields)
            .map(Value::Object)
            .ok_or(ApiError::NotFound)
    }

    fn destroy(&self, _req: &ViewRequest<'_>, pk: &str) -> ApiResult<()> {
        if self.store.remove(parse_pk(pk)?) {
            tracing::debug!(model = self.model_name, pk, "Object deleted");
            Ok(())
        } else {
            Err(ApiError::NotFound)
        }
    }
}
