pub mod aggregate;
pub mod auth_gate;
pub mod body;
pub mod cache;
pub mod conditions;
pub mod datasource;
pub mod matcher;
pub mod pipeline;
pub mod quota;
pub mod schema;
