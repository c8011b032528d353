use serde_json::Value;

use crate::models::{FieldSpec, FieldType};

pub struct Validation {
    pub is_valid: bool,
    pub errors: Vec<String>,
}

/// Validate a parsed body against a field schema. Collects every
/// violation instead of failing fast, so one response can enumerate all
/// problems. `require_all = false` skips required-presence checks (used
/// for PATCH merges) but still type-checks whatever is present.
pub fn validate(fields: &[FieldSpec], body: &Value, require_all: bool) -> Validation {
    let mut errors = Vec::new();

    match body.as_object() {
        Some(obj) => {
            for field in fields {
                check_field(field, obj.get(&field.name), &field.name, require_all, &mut errors);
            }
        }
        None => {
            // Raw/string bodies bypass structural checks unless the schema
            // demands required fields.
            if require_all && fields.iter().any(|f| f.required) {
                errors.push("Request body must be a JSON object".to_string());
            }
        }
    }

    Validation {
        is_valid: errors.is_empty(),
        errors,
    }
}

fn check_field(
    spec: &FieldSpec,
    value: Option<&Value>,
    path: &str,
    require_all: bool,
    errors: &mut Vec<String>,
) {
    let missing = match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty(),
        _ => false,
    };

    if missing {
        if spec.required && require_all {
            errors.push(format!("Missing required field: {path}"));
        }
        return;
    }

    let value = value.expect("present");
    check_type(spec.field_type, &spec.nested_fields, spec.array_item_type, value, path, errors);
}

fn check_type(
    field_type: FieldType,
    nested: &[FieldSpec],
    item_type: Option<FieldType>,
    value: &Value,
    path: &str,
    errors: &mut Vec<String>,
) {
    match field_type {
        FieldType::String => {
            if !value.is_string() {
                errors.push(format!("Field '{path}' must be a string"));
            }
        }
        FieldType::Number => {
            if !value.is_number() {
                errors.push(format!("Field '{path}' must be a number"));
            }
        }
        FieldType::Boolean => {
            if !value.is_boolean() {
                errors.push(format!("Field '{path}' must be a boolean"));
            }
        }
        FieldType::Object => match value.as_object() {
            Some(obj) => {
                for sub in nested {
                    let sub_path = format!("{path}.{}", sub.name);
                    check_field(sub, obj.get(&sub.name), &sub_path, true, errors);
                }
            }
            None => errors.push(format!("Field '{path}' must be an object")),
        },
        FieldType::Array => match value.as_array() {
            Some(items) => {
                if let Some(item_type) = item_type {
                    for (i, item) in items.iter().enumerate() {
                        let item_path = format!("{path}[{i}]");
                        check_type(item_type, nested, None, item, &item_path, errors);
                    }
                }
            }
            None => errors.push(format!("Field '{path}' must be an array")),
        },
        FieldType::Image | FieldType::Video | FieldType::Audio | FieldType::File => {
            // A blob reference: either a URL string or an upload result
            // object carrying url/secureUrl.
            let ok = value.is_string()
                || value
                    .as_object()
                    .is_some_and(|o| o.contains_key("url") || o.contains_key("secureUrl"));
            if !ok {
                errors.push(format!("Field '{path}' must be a file URL or upload object"));
            }
        }
    }
}
