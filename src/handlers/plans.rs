use actix_web::{get, post, put, HttpRequest, HttpResponse};
use actix_web::web::{Data, Json, Path};
use uuid::Uuid;
use validator::Validate;

use crate::handlers::{ApiError, AppState};
use crate::models::{
    common::ApiResponse,
    coupon::CreateCouponRequest,
    plan::{CreatePlanRequest, Plan},
};

fn plan_not_found(plan_id: Uuid) -> ApiError {
    ApiError::not_found("plan_not_found", format!("plan {} not found", plan_id))
}

// GET /plans
#[get("/plans")]
pub async fn list_plans(state: Data<AppState>) -> Result<HttpResponse, ApiError> {
    let plans = state.stores.plans.list_plans().await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(plans)))
}

// GET /plans/{plan_id}
#[get("/plans/{plan_id}")]
pub async fn get_plan(
    state: Data<AppState>,
    path: Path<Uuid>,
) -> Result<HttpResponse, ApiError> {
    let plan_id = path.into_inner();
    let plan = state
        .stores
        .plans
        .get_plan(&plan_id)
        .await?
        .ok_or_else(|| plan_not_found(plan_id))?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(plan)))
}

// POST /admin/plans
#[post("/admin/plans")]
pub async fn create_plan(
    req: HttpRequest,
    state: Data<AppState>,
    payload: Json<CreatePlanRequest>,
) -> Result<HttpResponse, ApiError> {
    state.require_admin(&req)?;
    payload.validate()?;

    let plan = Plan::new(payload.into_inner());
    state.stores.plans.save_plan(&plan).await?;
    log::info!("Created plan {} ({})", plan.name, plan.id);
    Ok(HttpResponse::Created().json(ApiResponse::success(plan)))
}

// PUT /admin/plans/{plan_id}
#[put("/admin/plans/{plan_id}")]
pub async fn update_plan(
    req: HttpRequest,
    state: Data<AppState>,
    path: Path<Uuid>,
    payload: Json<CreatePlanRequest>,
) -> Result<HttpResponse, ApiError> {
    state.require_admin(&req)?;
    payload.validate()?;

    let plan_id = path.into_inner();
    let mut plan = state
        .stores
        .plans
        .get_plan(&plan_id)
        .await?
        .ok_or_else(|| plan_not_found(plan_id))?;

    plan.replace(payload.into_inner());
    state.stores.plans.save_plan(&plan).await?;
    log::info!("Updated plan {} ({})", plan.name, plan.id);
    Ok(HttpResponse::Ok().json(ApiResponse::success(plan)))
}

// POST /admin/coupons
#[post("/admin/coupons")]
pub async fn create_coupon(
    req: HttpRequest,
    state: Data<AppState>,
    payload: Json<CreateCouponRequest>,
) -> Result<HttpResponse, ApiError> {
    state.require_admin(&req)?;
    let coupon = state.coupons.create_coupon(payload.into_inner()).await?;
    Ok(HttpResponse::Created().json(ApiResponse::success(coupon)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{http::StatusCode, test, App};
    use chrono::{Duration, Utc};
    use serde_json::{json, Value};
    use crate::handlers::test_support::{app_state, ADMIN_TOKEN};
    use crate::handlers::ADMIN_TOKEN_HEADER;

    fn plan_body(name: &str, price: f64) -> Value {
        json!({ "name": name, "price": price, "discounted_price": null, "validity_days": 30, "level": 2 })
    }

    #[actix_web::test]
    async fn test_admin_routes_require_token() {
        let app = test::init_service(App::new().app_data(Data::new(app_state())).service(create_plan)).await;

        let resp = test::call_service(
            &app,
            test::TestRequest::post().uri("/admin/plans").set_json(plan_body("Pro", 1000.0)).to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let resp = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/admin/plans")
                .insert_header((ADMIN_TOKEN_HEADER, "wrong"))
                .set_json(plan_body("Pro", 1000.0))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn test_plan_lifecycle() {
        let app = test::init_service(
            App::new()
                .app_data(Data::new(app_state()))
                .service(list_plans)
                .service(get_plan)
                .service(create_plan)
                .service(update_plan),
        )
        .await;

        let resp = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/admin/plans")
                .insert_header((ADMIN_TOKEN_HEADER, ADMIN_TOKEN))
                .set_json(plan_body("Pro", 1000.0))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let created: Value = test::read_body_json(resp).await;
        let id = created["data"]["id"].as_str().unwrap().to_string();

        let resp = test::call_service(
            &app,
            test::TestRequest::put()
                .uri(&format!("/admin/plans/{}", id))
                .insert_header((ADMIN_TOKEN_HEADER, ADMIN_TOKEN))
                .set_json(plan_body("Pro Plus", 1200.0))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = test::call_service(&app, test::TestRequest::get().uri(&format!("/plans/{}", id)).to_request()).await;
        let fetched: Value = test::read_body_json(resp).await;
        assert_eq!(fetched["data"]["name"], "Pro Plus");
        assert_eq!(fetched["data"]["id"], created["data"]["id"]);

        let resp = test::call_service(&app, test::TestRequest::get().uri("/plans").to_request()).await;
        let listed: Value = test::read_body_json(resp).await;
        assert_eq!(listed["data"].as_array().unwrap().len(), 1);

        let resp = test::call_service(
            &app,
            test::TestRequest::get().uri(&format!("/plans/{}", Uuid::new_v4())).to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn test_invalid_plan_is_rejected() {
        let app = test::init_service(App::new().app_data(Data::new(app_state())).service(create_plan)).await;
        let resp = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/admin/plans")
                .insert_header((ADMIN_TOKEN_HEADER, ADMIN_TOKEN))
                .set_json(plan_body("X", -5.0))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_duplicate_coupon_conflicts() {
        let app = test::init_service(App::new().app_data(Data::new(app_state())).service(create_coupon)).await;
        let now = Utc::now();
        let body = json!({
            "code": "launch",
            "discount_percent": 25,
            "valid_from": now,
            "valid_till": now + Duration::days(7),
            "usage_limit": 100,
        });

        for expected in [StatusCode::CREATED, StatusCode::CONFLICT] {
            let resp = test::call_service(
                &app,
                test::TestRequest::post()
                    .uri("/admin/coupons")
                    .insert_header((ADMIN_TOKEN_HEADER, ADMIN_TOKEN))
                    .set_json(&body)
                    .to_request(),
            )
            .await;
            assert_eq!(resp.status(), expected);
        }
    }
}
