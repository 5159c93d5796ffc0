// src/routes.rs

use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};

use crate::{config::AppState, handlers, middleware::auth::auth_guard};

pub fn build_router(app_state: AppState) -> Router {
    // Define as rotas de autenticação (públicas)
    let auth_routes = Router::new().route("/login", post(handlers::auth::login));

    let user_routes = Router::new()
        .route("/", post(handlers::auth::create_user))
        .route("/me", get(handlers::auth::get_me));

    let inventory_routes = Router::new()
        .route(
            "/items",
            post(handlers::inventory::create_item).get(handlers::inventory::get_all_items),
        )
        .route(
            "/items/{id}",
            get(handlers::inventory::get_item)
                .patch(handlers::inventory::update_item)
                .delete(handlers::inventory::delete_item),
        )
        .route("/items/{id}/archive", post(handlers::inventory::archive_item))
        .route("/items/{id}/restore", post(handlers::inventory::restore_item));

    let loss_routes = Router::new()
        .route(
            "/",
            post(handlers::losses::record_loss).get(handlers::losses::list_losses),
        )
        .route(
            "/{id}",
            get(handlers::losses::get_loss).delete(handlers::losses::reverse_loss),
        );

    let transaction_routes = Router::new()
        .route(
            "/",
            post(handlers::transactions::create_transaction)
                .get(handlers::transactions::list_transactions),
        )
        .route("/parse", post(handlers::transactions::parse_transaction))
        .route(
            "/{id}",
            get(handlers::transactions::get_transaction)
                .patch(handlers::transactions::update_transaction)
                .delete(handlers::transactions::delete_transaction),
        );

    let report_routes = Router::new()
        .route("/summary", get(handlers::reports::get_summary))
        .route("/analytics", get(handlers::reports::get_analytics));

    // Tudo abaixo exige token
    let protected = Router::new()
        .nest("/api/users", user_routes)
        .nest("/api/inventory", inventory_routes)
        .nest("/api/losses", loss_routes)
        .nest("/api/transactions", transaction_routes)
        .nest("/api/reports", report_routes)
        .route("/api/audit-logs", get(handlers::audit::list_audit_logs))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            auth_guard,
        ));

    // Combina tudo no router principal
    Router::new()
        .route("/api/health", get(|| async { "OK" }))
        .nest("/api/auth", auth_routes)
        .merge(protected)
        .with_state(app_state)
}
