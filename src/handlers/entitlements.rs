use actix_web::{get, HttpResponse};
use actix_web::web::{Data, Path, Query};
use chrono::Utc;
use uuid::Uuid;

use crate::handlers::{ApiError, AppState};
use crate::models::common::{ApiResponse, PaginatedResponse, PaginationQuery};

// GET /entitlements/{account_id}
#[get("/entitlements/{account_id}")]
pub async fn get_entitlement(
    state: Data<AppState>,
    path: Path<Uuid>,
) -> Result<HttpResponse, ApiError> {
    let account_id = path.into_inner();
    let snapshot = state.resolver.resolve(account_id, Utc::now()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(snapshot)))
}

// GET /entitlements/{account_id}/cached
#[get("/entitlements/{account_id}/cached")]
pub async fn get_cached_entitlement(
    state: Data<AppState>,
    path: Path<Uuid>,
) -> Result<HttpResponse, ApiError> {
    let account_id = path.into_inner();
    match state.resolver.cached(account_id).await? {
        Some(snapshot) => Ok(HttpResponse::Ok().json(ApiResponse::success(snapshot))),
        None => Err(ApiError::not_found(
            "entitlement_not_cached",
            format!("No cached entitlement for account {}", account_id),
        )),
    }
}

// GET /accounts/{account_id}/grants
#[get("/accounts/{account_id}/grants")]
pub async fn list_grants(
    state: Data<AppState>,
    path: Path<Uuid>,
    query: Query<PaginationQuery>,
) -> Result<HttpResponse, ApiError> {
    let account_id = path.into_inner();
    let grants = state.stores.ledger.grants_for_account(&account_id).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(PaginatedResponse::paginate(grants, &query))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{http::StatusCode, test, App};
    use rust_decimal::Decimal;
    use serde_json::Value;
    use crate::handlers::test_support::app_state;
    use crate::models::grant::{Grant, GrantTerms, Settlement};
    use crate::models::plan::{CreatePlanRequest, Plan};

    #[actix_web::test]
    async fn test_fresh_then_cached() {
        let state = app_state();
        let account = Uuid::new_v4();
        let plan = Plan::new(CreatePlanRequest {
            name: "Lifetime".to_string(),
            price: Decimal::ZERO,
            discounted_price: None,
            validity_days: 0,
            level: 3,
            features: vec![],
        });
        for n in 0..3 {
            let grant = Grant::new(
                account,
                &plan,
                GrantTerms {
                    settlement: Settlement::Paid {
                        order_ref: format!("order_{}", n),
                        payment_ref: format!("pay_{}", n),
                    },
                    amount: Decimal::ZERO,
                    currency: "INR".to_string(),
                    coupon_code: None,
                },
                Utc::now(),
            );
            state.stores.ledger.append(grant).await.unwrap();
        }

        let app = test::init_service(
            App::new()
                .app_data(Data::new(state))
                .service(get_entitlement)
                .service(get_cached_entitlement)
                .service(list_grants),
        )
        .await;

        let cached_uri = format!("/entitlements/{}/cached", account);
        let resp = test::call_service(&app, test::TestRequest::get().uri(&cached_uri).to_request()).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let resp = test::call_service(
            &app,
            test::TestRequest::get().uri(&format!("/entitlements/{}", account)).to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let fresh: Value = test::read_body_json(resp).await;
        assert_eq!(fresh["data"]["is_premium"], true);
        assert_eq!(fresh["data"]["expires_at"], Value::Null);

        let resp = test::call_service(&app, test::TestRequest::get().uri(&cached_uri).to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let cached: Value = test::read_body_json(resp).await;
        assert_eq!(cached["data"], fresh["data"]);

        let resp = test::call_service(
            &app,
            test::TestRequest::get()
                .uri(&format!("/accounts/{}/grants?page=2&limit=2", account))
                .to_request(),
        )
        .await;
        let page: Value = test::read_body_json(resp).await;
        assert_eq!(page["data"]["total"], 3);
        assert_eq!(page["data"]["data"].as_array().unwrap().len(), 1);
    }

    #[actix_web::test]
    async fn test_unknown_account_is_free() {
        let app = test::init_service(App::new().app_data(Data::new(app_state())).service(get_entitlement)).await;
        let resp = test::call_service(
            &app,
            test::TestRequest::get().uri(&format!("/entitlements/{}", Uuid::new_v4())).to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["data"]["is_premium"], false);
    }
}
