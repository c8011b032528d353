use axum::http::HeaderMap;

use crate::error::EngineError;
use crate::models::{Endpoint, Project};

/// Token check for protected endpoints. `requires_auth = None` inherits
/// the project-level toggle. The error echoes the expected header and
/// format to aid integrators, never the configured token.
pub fn check(project: &Project, endpoint: &Endpoint, headers: &HeaderMap) -> Result<(), EngineError> {
    let auth = &project.authentication;
    let required = endpoint.requires_auth.unwrap_or(auth.enabled);
    if !required {
        return Ok(());
    }

    let expected_format = if auth.token_prefix.is_empty() {
        "<token>".to_string()
    } else {
        format!("{} <token>", auth.token_prefix)
    };
    let reject = || {
        EngineError::Unauthorized(format!(
            "Missing or invalid token. Send header '{}' with value '{}'",
            auth.header_name, expected_format
        ))
    };

    let value = headers
        .get(auth.header_name.as_str())
        .and_then(|v| v.to_str().ok())
        .ok_or_else(reject)?;

    let token = if auth.token_prefix.is_empty() {
        value.trim()
    } else {
        value
            .strip_prefix(auth.token_prefix.as_str())
            .map(str::trim_start)
            .ok_or_else(reject)?
    };

    if token.is_empty() || token != auth.token {
        return Err(reject());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;
    use chrono::Utc;
    use uuid::Uuid;

    use crate::models::{AuthSettings, DataSourceMode};

    use super::*;

    fn fixture(enabled: bool, requires_auth: Option<bool>) -> (Project, Endpoint) {
        let endpoint = Endpoint {
            id: Uuid::now_v7(),
            path: "/ping".to_string(),
            method: "GET".to_string(),
            response_body: String::new(),
            status_code: 200,
            requires_auth,
            fields: vec![],
            data_source: None,
            data_source_mode: DataSourceMode::Full,
            data_source_fields: vec![],
            aggregator: None,
            conditions: vec![],
            pagination: None,
            is_crud: false,
        };
        let project = Project {
            id: Uuid::now_v7(),
            name: "p".to_string(),
            base_url: String::new(),
            authentication: AuthSettings {
                enabled,
                token: "sekret".to_string(),
                ..AuthSettings::default()
            },
            endpoints: vec![],
            owner_user_id: Uuid::now_v7(),
            created_at: Utc::now(),
            expires_at: None,
        };
        (project, endpoint)
    }

    #[test]
    fn inherits_project_toggle() {
        let (project, endpoint) = fixture(true, None);
        let headers = HeaderMap::new();
        assert!(check(&project, &endpoint, &headers).is_err());

        let (project, endpoint) = fixture(false, None);
        assert!(check(&project, &endpoint, &headers).is_ok());
    }

    #[test]
    fn endpoint_override_beats_project() {
        let headers = HeaderMap::new();
        let (project, endpoint) = fixture(true, Some(false));
        assert!(check(&project, &endpoint, &headers).is_ok());

        let (project, endpoint) = fixture(false, Some(true));
        assert!(check(&project, &endpoint, &headers).is_err());
    }

    #[test]
    fn exact_token_with_prefix() {
        let (project, endpoint) = fixture(true, None);

        let mut headers = HeaderMap::new();
        headers.insert("Authorization", HeaderValue::from_static("Bearer sekret"));
        assert!(check(&project, &endpoint, &headers).is_ok());

        headers.insert("Authorization", HeaderValue::from_static("Bearer wrong"));
        assert!(check(&project, &endpoint, &headers).is_err());

        // No prefix at all.
        headers.insert("Authorization", HeaderValue::from_static("sekret"));
        assert!(check(&project, &endpoint, &headers).is_err());
    }

    #[test]
    fn error_never_echoes_the_token() {
        let (project, endpoint) = fixture(true, None);
        let err = check(&project, &endpoint, &HeaderMap::new()).unwrap_err();
        assert!(!err.to_string().contains("sekret"));
    }
}
