//! HTTP router.
//!
//! Routes fall into three groups:
//!
//! - public: health, registration, catalog, storefronts, search, analytics
//!   events and the payment provider's notifications
//! - authenticated: everything a business owner does, behind `auth_middleware`
//! - admin: moderation and reporting, behind `auth_middleware` + `require_admin`

use axum::{
    Router, middleware as axum_middleware,
    routing::{delete, get, patch, post, put},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{
        admin, analytics, businesses, categories, explore, health, payments, plans, products,
        uploads, users,
    },
    middleware::auth::{auth_middleware, require_admin},
    state::AppState,
};

pub fn build_router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(health::health_check))
        .route("/api/v1/users", post(users::register))
        .route("/api/v1/categories", get(categories::list_categories))
        .route("/api/v1/plans", get(plans::list_plans))
        .route(
            "/api/v1/storefronts/{slug}",
            get(businesses::get_storefront),
        )
        .route(
            "/api/v1/public/products/{id}",
            get(products::get_public_product),
        )
        .route(
            "/api/v1/explore/businesses",
            get(explore::search_businesses),
        )
        .route("/api/v1/explore/products", get(explore::search_products))
        .route("/api/v1/analytics/events", post(analytics::record_event))
        .route(
            "/api/v1/payments/webhook",
            post(payments::receive_notification),
        );

    let authenticated_routes = Router::new()
        // Account
        .route("/api/v1/me", get(users::me))
        .route(
            "/api/v1/me/profile",
            get(users::get_profile).patch(users::update_profile),
        )
        .route("/api/v1/me/api-key", post(users::rotate_api_key))
        // Businesses
        .route(
            "/api/v1/businesses",
            post(businesses::create_business).get(businesses::list_businesses),
        )
        .route(
            "/api/v1/businesses/{id}",
            get(businesses::get_business)
                .patch(businesses::update_business)
                .delete(businesses::delete_business),
        )
        .route(
            "/api/v1/businesses/{id}/settings",
            put(businesses::update_settings),
        )
        // Products
        .route(
            "/api/v1/businesses/{id}/products",
            post(products::create_product).get(products::list_products),
        )
        .route(
            "/api/v1/products/{id}",
            get(products::get_product)
                .patch(products::update_product)
                .delete(products::delete_product),
        )
        .route(
            "/api/v1/products/{id}/active",
            put(products::set_product_active),
        )
        // Plans and payments
        .route("/api/v1/businesses/{id}/plan", get(plans::get_plan))
        .route(
            "/api/v1/businesses/{id}/plan/trial",
            post(plans::activate_trial),
        )
        .route(
            "/api/v1/businesses/{id}/plan/upgrade",
            post(plans::upgrade_plan),
        )
        .route(
            "/api/v1/businesses/{id}/payments",
            get(payments::list_payments),
        )
        // Images
        .route(
            "/api/v1/businesses/{id}/uploads",
            post(uploads::presign_upload),
        )
        .route(
            "/api/v1/businesses/{id}/images",
            post(uploads::complete_upload),
        )
        .route("/api/v1/images/{id}", delete(uploads::delete_image))
        // Analytics
        .route(
            "/api/v1/businesses/{id}/analytics",
            get(analytics::get_summary),
        )
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    // route_layer wraps outward, so auth runs before the admin check
    let admin_routes = Router::new()
        .route("/api/v1/admin/stats", get(admin::get_stats))
        .route("/api/v1/admin/businesses", get(admin::list_businesses))
        .route(
            "/api/v1/admin/businesses/{id}/active",
            put(admin::set_business_active),
        )
        .route(
            "/api/v1/admin/businesses/{id}/verified",
            put(admin::set_business_verified),
        )
        .route("/api/v1/admin/payments", get(admin::list_payments))
        .route(
            "/api/v1/admin/webhook-events",
            get(admin::list_webhook_events),
        )
        .route(
            "/api/v1/admin/categories",
            post(categories::create_category),
        )
        .route(
            "/api/v1/admin/categories/{id}",
            patch(categories::update_category).delete(categories::delete_category),
        )
        .route_layer(axum_middleware::from_fn(require_admin))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .merge(public_routes)
        .merge(authenticated_routes)
        .merge(admin_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::Config,
        models::webhook::{sign_manifest, signature_manifest},
    };
    use axum::{
        body::{Body, to_bytes},
        http::{Request, StatusCode},
    };
    use sqlx::postgres::PgPoolOptions;
    use tower::ServiceExt;

    // The pool never connects; every request below is rejected before a query runs.
    fn test_router() -> Router {
        let config = Config::from_pairs([
            ("DATABASE_URL", "postgres://localhost/market_test"),
            ("CHECKOUT_WEBHOOK_SECRET", "whsec"),
        ])
        .unwrap();
        let pool = PgPoolOptions::new()
            .connect_lazy(&config.database_url)
            .unwrap();
        build_router(AppState::new(pool, config).unwrap())
    }

    async fn error_code(response: axum::response::Response) -> String {
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        json["error"]["code"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn owner_routes_require_api_key() {
        let response = test_router()
            .oneshot(
                Request::get("/api/v1/businesses")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(error_code(response).await, "invalid_api_key");
    }

    #[tokio::test]
    async fn malformed_authorization_header_is_rejected() {
        let response = test_router()
            .oneshot(
                Request::get("/api/v1/me")
                    .header("Authorization", "Basic dXNlcjpwYXNz")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn admin_routes_require_api_key() {
        let response = test_router()
            .oneshot(
                Request::get("/api/v1/admin/stats")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn unsigned_notification_is_rejected() {
        let response = test_router()
            .oneshot(
                Request::post("/api/v1/payments/webhook?data.id=123")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"type":"payment","data":{"id":"123"}}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(error_code(response).await, "invalid_signature");
    }

    #[tokio::test]
    async fn forged_notification_is_rejected() {
        let response = test_router()
            .oneshot(
                Request::post("/api/v1/payments/webhook")
                    .header("x-signature", "ts=1700000000,v1=deadbeef")
                    .header("x-request-id", "req-1")
                    .body(Body::from(r#"{"type":"payment","data":{"id":"123"}}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn unsigned_garbage_notification_is_unauthorized() {
        let response = test_router()
            .oneshot(
                Request::post("/api/v1/payments/webhook")
                    .body(Body::from("not json"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(error_code(response).await, "invalid_signature");
    }

    #[tokio::test]
    async fn signed_malformed_notification_is_a_bad_request() {
        let ts = "1704908010";
        let v1 = sign_manifest("whsec", &signature_manifest("123", "req-7", ts));

        let response = test_router()
            .oneshot(
                Request::post("/api/v1/payments/webhook?data.id=123")
                    .header("x-signature", format!("ts={ts},v1={v1}"))
                    .header("x-request-id", "req-7")
                    .body(Body::from("not json"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(error_code(response).await, "invalid_request");
    }

    #[tokio::test]
    async fn unknown_route_is_not_found() {
        let response = test_router()
            .oneshot(Request::get("/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
