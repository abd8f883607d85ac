//! Route definitions for the Recyclable Materials Marketplace

use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};

use crate::{handlers, middleware::auth_middleware, AppState};

/// Create API routes
pub fn api_routes() -> Router<AppState> {
    Router::new()
        // Health check (public)
        .route("/health", get(handlers::health_check))
        // Auth routes (public)
        .nest("/auth", auth_routes())
        // Payment webhook (public - called by the gateway)
        .route("/webhook/payments", post(handlers::handle_payment_webhook))
        // Protected routes - administration
        .nest("/admin", admin_routes())
        // Protected routes - own profile
        .nest("/profile", profile_routes())
        // Protected routes - material listings
        .nest("/materials", material_routes())
        // Protected routes - purchases
        .nest("/purchases", purchase_routes())
        // Protected routes - dashboard statistics
        .nest("/stats", stats_routes())
}

/// Authentication routes (public)
fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/login", post(handlers::login))
        .route("/refresh", post(handlers::refresh))
}

/// Administration routes (protected)
fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(handlers::list_users).post(handlers::register_user))
        .route("/users/:user_id", delete(handlers::deactivate_user))
        .route("/admins", post(handlers::register_admin))
        .route("/materials", get(handlers::list_materials))
        .route("/reconcile", post(handlers::reconcile_purchases))
        .route_layer(middleware::from_fn(auth_middleware))
}

/// Own-profile routes (protected)
fn profile_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::get_profile).put(handlers::update_profile))
        .route_layer(middleware::from_fn(auth_middleware))
}

/// Material listing routes (protected)
fn material_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_own_materials).post(handlers::create_material),
        )
        .route("/available", get(handlers::list_available_materials))
        .route("/user/:user_id", get(handlers::list_user_materials))
        .route(
            "/:material_id",
            get(handlers::get_material)
                .put(handlers::update_material)
                .delete(handlers::delete_material),
        )
        .route_layer(middleware::from_fn(auth_middleware))
}

/// Purchase routes (protected)
fn purchase_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_own_purchases).post(handlers::create_purchase),
        )
        .route("/user/:user_id", get(handlers::list_user_purchases))
        .route("/:purchase_id", get(handlers::get_purchase))
        .route("/:purchase_id/receipt", get(handlers::get_receipt))
        .route_layer(middleware::from_fn(auth_middleware))
}

/// Statistics routes (protected)
fn stats_routes() -> Router<AppState> {
    Router::new()
        .route("/school", get(handlers::school_stats))
        .route_layer(middleware::from_fn(auth_middleware))
}
