use std::sync::Arc;

use anyhow::Result;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use rand::Rng;
use serde_json::json;

use crate::layers::resolver::{Archive, Resolver};

/// Two routes plus a JSON 404 fallback. Non-GET verbs on the known paths
/// get axum's 405. Every response asks the client to close the connection.
pub fn router<A, R>(resolver: Arc<Resolver<A, R>>) -> Router
where
    A: Archive + 'static,
    R: Rng + Send + 'static,
{
    Router::new()
        .route("/", get(random_artifact::<A, R>))
        .route("/random", get(random_artifact::<A, R>))
        .fallback(not_found)
        .with_state(resolver)
}

pub async fn serve<A, R>(resolver: Arc<Resolver<A, R>>, port: u16) -> Result<()>
where
    A: Archive + 'static,
    R: Rng + Send + 'static,
{
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    tracing::info!("Server at http://localhost:{port}/ (GET / or /random for JSON)");
    axum::serve(listener, router(resolver)).await?;
    Ok(())
}

async fn random_artifact<A, R>(State(resolver): State<Arc<Resolver<A, R>>>) -> Response
where
    A: Archive + 'static,
    R: Rng + Send + 'static,
{
    match resolver.resolve_random_artifact().await {
        Ok(artifact) => json_response(StatusCode::OK, Json(artifact)),
        Err(e) => {
            tracing::warn!("Resolution failed: {e}");
            json_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "Failed to fetch artifact"})),
            )
        }
    }
}

async fn not_found() -> Response {
    json_response(StatusCode::NOT_FOUND, Json(json!({"error": "Not found"})))
}

fn json_response(status: StatusCode, body: impl IntoResponse) -> Response {
    (status, [(header::CONNECTION, "close")], body).into_response()
}
