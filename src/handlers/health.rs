use axum::Json;
use serde_json::{json, Value};

/// Health check endpoint
///
/// Returns a simple JSON response indicating the server is running.
/// Used by load balancers and monitoring systems.
pub async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": "second-factor-server"
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reports_healthy() {
        let Json(body) = health_check().await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["service"], "second-factor-server");
    }
}
