use actix_web::{post, HttpResponse};
use actix_web::web::{Data, Json};
use chrono::Utc;
use validator::Validate;

use crate::handlers::{ApiError, AppState};
use crate::models::{common::ApiResponse, payment::ActivationRequest};

// POST /activations
#[post("/activations")]
pub async fn activate(
    state: Data<AppState>,
    payload: Json<ActivationRequest>,
) -> Result<HttpResponse, ApiError> {
    let request = payload.into_inner();
    request.validate()?;

    let activation = state.activation.activate(request, Utc::now()).await?;
    if activation.replayed {
        Ok(HttpResponse::Ok().json(ApiResponse::success_with_message(
            activation,
            "Payment was already activated".to_string(),
        )))
    } else {
        Ok(HttpResponse::Created().json(ApiResponse::success(activation)))
    }
}
