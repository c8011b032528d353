pub mod serve;

use axum::Router;
use axum::routing::any;

use crate::state::SharedState;

pub fn serve_routes() -> Router<SharedState> {
    Router::new()
        .route("/v1/{*path}", any(serve::serve_legacy))
        .route("/v2/{*path}", any(serve::serve_extended))
}
