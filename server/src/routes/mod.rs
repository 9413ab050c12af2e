use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::config::{create_cors_layer, create_security_headers_layer};
use crate::handlers::{admin, events, health_check, orders, payments, tickets};
use crate::AppState;

pub fn create_routes(state: AppState) -> Router {
    let admin_routes = Router::new()
        .route("/admin/stats", get(admin::stats))
        .route_layer(from_fn_with_state(state.clone(), admin::require_admin));

    Router::new()
        .route("/health", get(health_check))
        .route("/events", get(events::list_events))
        .route("/events/:id", get(events::get_event))
        .route("/orders", post(orders::create_order))
        .route("/orders/:id", get(orders::get_order))
        .route(
            "/payment-callback",
            post(payments::payment_callback).get(payments::payment_redirect),
        )
        .route("/payment-return", get(payments::payment_return))
        .route("/mock-payment", get(payments::mock_payment_page))
        .route("/tickets/by-id/:id", get(tickets::ticket_by_id))
        .route("/tickets/:token", get(tickets::validate_ticket))
        .route("/tickets/:token/qr", get(tickets::ticket_qr))
        .route("/check-in", post(tickets::check_in))
        .merge(admin_routes)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(create_security_headers_layer())
        .layer(create_cors_layer())
}
