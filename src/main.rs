mod config;
mod error;
mod handlers;
mod models;
mod services;

use std::sync::Arc;

use actix_web::{web, App, HttpServer, middleware::Logger};
use actix_cors::Cors;
use anyhow::Context;
use dotenv::dotenv;

use handlers::AppState;
use services::{
    activation::ActivationService,
    coupons::CouponService,
    resolver::EntitlementResolver,
    verifier::HmacPaymentVerifier,
};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::init();

    let config = config::Config::from_env().context("PAYMENT_KEY_SECRET must be set")?;

    let stores = services::connect_stores(&config.database)
        .await
        .context("Failed to initialize storage")?;

    match &config.payment.key_id {
        Some(key_id) => log::info!("Verifying payments signed with key {}", key_id),
        None => log::info!("Verifying payments with the configured key secret"),
    }

    let coupons = CouponService::new(stores.coupons.clone());
    let resolver = EntitlementResolver::new(stores.ledger.clone(), stores.cache.clone());
    let activation = ActivationService::new(
        stores.plans.clone(),
        coupons.clone(),
        Arc::new(HmacPaymentVerifier::new(&config.payment)),
        stores.ledger.clone(),
        resolver.clone(),
        config.app.currency.clone(),
    );

    if config.app.admin_token.is_none() {
        log::warn!("ADMIN_TOKEN is not set; admin routes will reject every request");
    }

    let state = web::Data::new(AppState {
        stores,
        activation,
        coupons,
        resolver,
        admin_token: config.app.admin_token.clone(),
    });

    let bind_address = format!("0.0.0.0:{}", config.app.port);
    log::info!("Starting entitlement server on {}", bind_address);

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allow_any_method()
                    .allow_any_header()
            )
            .app_data(state.clone())
            .service(
                web::scope("/api/v1")
                    // Purchases
                    .service(handlers::activation::activate)
                    // Entitlements
                    .service(handlers::entitlements::get_entitlement)
                    .service(handlers::entitlements::get_cached_entitlement)
                    .service(handlers::entitlements::list_grants)
                    // Coupons
                    .service(handlers::coupons::redeem_coupon)
                    .service(handlers::coupons::preview_coupon)
                    // Catalog
                    .service(handlers::plans::list_plans)
                    .service(handlers::plans::get_plan)
                    .service(handlers::plans::create_plan)
                    .service(handlers::plans::update_plan)
                    .service(handlers::plans::create_coupon)
                    // Health check
                    .route("/health", web::get().to(handlers::health::health_check))
            )
    })
    .bind(&bind_address)?
    .run()
    .await?;

    Ok(())
}
