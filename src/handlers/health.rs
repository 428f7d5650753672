use actix_web::{HttpResponse, Result};
use actix_web::web::Data;
use chrono::Utc;

use crate::handlers::AppState;

pub async fn health_check(state: Data<AppState>) -> Result<HttpResponse> {
    match state.stores.health.health_check().await {
        Ok(()) => Ok(HttpResponse::Ok().json(serde_json::json!({
            "status": "healthy",
            "timestamp": Utc::now(),
        }))),
        Err(e) => {
            log::error!("Health check failed: {}", e);
            Ok(HttpResponse::ServiceUnavailable().json(serde_json::json!({
                "status": "unhealthy",
                "error": e.to_string(),
                "timestamp": Utc::now(),
            })))
        }
    }
}
