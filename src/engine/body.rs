use axum::http::HeaderMap;
use bytes::Bytes;
use serde_json::{Map, Value};

use crate::blob::BlobStore;
use crate::error::EngineError;
use crate::models::{FieldSpec, FieldType, StoredFile};

/// Canonical parse result: downstream stages are content-type agnostic.
#[derive(Debug)]
pub struct ParsedBody {
    pub body: Value,
    pub aux_files_size: u64,
    pub uploaded_files: Vec<StoredFile>,
}

impl ParsedBody {
    fn plain(body: Value) -> Self {
        ParsedBody {
            body,
            aux_files_size: 0,
            uploaded_files: Vec::new(),
        }
    }
}

/// Content-type-driven decoder. Form bodies coerce each value against the
/// matching FieldSpec; multipart file parts are buffered, pushed to the
/// blob store, and replaced in the body with the resulting URL.
pub async fn parse(
    headers: &HeaderMap,
    body: Bytes,
    fields: &[FieldSpec],
    blob: &dyn BlobStore,
) -> Result<ParsedBody, EngineError> {
    let content_type = headers
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string());

    match content_type.as_deref() {
        Some(ct) if ct.contains("multipart/form-data") => {
            parse_multipart(headers, body, fields, blob).await
        }
        Some(ct) if ct.contains("application/x-www-form-urlencoded") => {
            Ok(ParsedBody::plain(parse_urlencoded(&body, fields)?))
        }
        Some(ct) if ct.contains("application/json") || ct.contains("text/json") => {
            let value: Value = serde_json::from_slice(&body)
                .map_err(|e| EngineError::MalformedInput(format!("Invalid JSON: {e}")))?;
            Ok(ParsedBody::plain(value))
        }
        Some(_) => Ok(ParsedBody::plain(raw_text(&body))),
        None => {
            // No Content-Type: probe form-data, then JSON, then raw text.
            if let Ok(parsed) = parse_multipart(headers, body.clone(), fields, blob).await {
                return Ok(parsed);
            }
            if let Ok(value) = serde_json::from_slice::<Value>(&body) {
                return Ok(ParsedBody::plain(value));
            }
            Ok(ParsedBody::plain(raw_text(&body)))
        }
    }
}

fn raw_text(body: &Bytes) -> Value {
    Value::String(String::from_utf8_lossy(body).into_owned())
}

fn parse_urlencoded(body: &Bytes, fields: &[FieldSpec]) -> Result<Value, EngineError> {
    let body_str = std::str::from_utf8(body)
        .map_err(|e| EngineError::MalformedInput(format!("Invalid UTF-8: {e}")))?;

    let mut map = Map::new();
    for (k, v) in form_urlencoded::parse(body_str.as_bytes()) {
        let spec = fields.iter().find(|f| f.name == *k);
        map.insert(k.into_owned(), coerce(&v, spec));
    }
    Ok(Value::Object(map))
}

async fn parse_multipart(
    headers: &HeaderMap,
    body: Bytes,
    fields: &[FieldSpec],
    blob: &dyn BlobStore,
) -> Result<ParsedBody, EngineError> {
    let boundary = headers
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .and_then(|ct| multer::parse_boundary(ct).ok())
        .ok_or_else(|| EngineError::MalformedInput("Missing multipart boundary".to_string()))?;

    let stream = futures_util::stream::once(async { Ok::<_, std::io::Error>(body) });
    let mut multipart = multer::Multipart::new(stream, boundary);

    let mut map = Map::new();
    let mut uploaded_files = Vec::new();
    let mut aux_files_size: u64 = 0;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| EngineError::MalformedInput(format!("Multipart error: {e}")))?
    {
        let name = field.name().unwrap_or("unknown").to_string();
        let spec = fields.iter().find(|f| f.name == name);

        let is_file = field.file_name().is_some()
            || spec.is_some_and(|s| s.field_type.is_file_like());

        if is_file {
            let filename = field
                .file_name()
                .map(|s| s.to_string())
                .unwrap_or_else(|| name.clone());
            let mime = field
                .content_type()
                .map(|m| m.to_string())
                .unwrap_or_else(|| "application/octet-stream".to_string());

            // Fully buffered before forwarding; no streaming.
            let bytes = field
                .bytes()
                .await
                .map_err(|e| EngineError::MalformedInput(format!("File read error: {e}")))?;
            aux_files_size += bytes.len() as u64;

            let stored = blob
                .upload(bytes, &filename, &mime, &name)
                .await
                .map_err(|e| EngineError::UploadFailed(e.to_string()))?;

            map.insert(name, Value::String(stored.url.clone()));
            uploaded_files.push(stored);
        } else {
            let text = field
                .text()
                .await
                .map_err(|e| EngineError::MalformedInput(format!("Field read error: {e}")))?;
            map.insert(name, coerce(&text, spec));
        }
    }

    Ok(ParsedBody {
        body: Value::Object(map),
        aux_files_size,
        uploaded_files,
    })
}

/// Form values arrive as strings; coerce them toward the declared type,
/// falling back to the original string when the value does not parse.
fn coerce(raw: &str, spec: Option<&FieldSpec>) -> Value {
    let Some(spec) = spec else {
        return Value::String(raw.to_string());
    };

    match spec.field_type {
        FieldType::Number => match raw.trim().parse::<f64>() {
            Ok(n) => serde_json::Number::from_f64(n)
                .map(Value::Number)
                .unwrap_or_else(|| Value::String(raw.to_string())),
            Err(_) => Value::String(raw.to_string()),
        },
        FieldType::Boolean => {
            if raw.eq_ignore_ascii_case("true") {
                Value::Bool(true)
            } else if raw.eq_ignore_ascii_case("false") {
                Value::Bool(false)
            } else {
                Value::String(raw.to_string())
            }
        }
        FieldType::Object | FieldType::Array => {
            serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
        }
        _ => Value::String(raw.to_string()),
    }
}
