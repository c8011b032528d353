use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Endpoint;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub base_url: String,
    #[serde(default)]
    pub authentication: AuthSettings,
    #[serde(default)]
    pub endpoints: Vec<Endpoint>,
    pub owner_user_id: Uuid,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthSettings {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub token: String,
    #[serde(default = "default_header_name")]
    pub header_name: String,
    #[serde(default = "default_token_prefix")]
    pub token_prefix: String,
}

impl Default for AuthSettings {
    fn default() -> Self {
        AuthSettings {
            enabled: false,
            token: String::new(),
            header_name: default_header_name(),
            token_prefix: default_token_prefix(),
        }
    }
}

fn default_header_name() -> String {
    "Authorization".to_string()
}

fn default_token_prefix() -> String {
    "Bearer".to_string()
}

impl Project {
    /// URL slug derived from the project name. Collisions are not
    /// deduplicated; the matcher takes the first project in creation order.
    pub fn slug(&self) -> String {
        slugify(&self.name)
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// Lowercase the name and replace every non-alphanumeric character with `-`.
pub fn slugify(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::slugify;

    #[test]
    fn slugify_lowercases_and_replaces() {
        assert_eq!(slugify("My Shop API"), "my-shop-api");
        assert_eq!(slugify("todo_list v2!"), "todo-list-v2-");
        assert_eq!(slugify("plain"), "plain");
    }
}
