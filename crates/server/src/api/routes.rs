use axum::{
    extract::{DefaultBodyLimit, State},
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use super::{
    admin, files, handlers, library, middleware::metrics_middleware, reports, tickets,
};
use crate::metrics::{collect_dynamic_metrics, encode_metrics};
use crate::state::AppState;

/// Largest accepted request body (uploads and attachments).
const MAX_BODY_BYTES: usize = 50 * 1024 * 1024;

pub fn create_router(state: Arc<AppState>) -> Router {
    // API routes
    let api_routes = Router::new()
        // Health and config
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::get_config))
        // Reports
        .route("/reports", post(reports::create_report).get(reports::list_reports))
        .route("/reports/upload", post(reports::upload_report))
        .route("/reports/{filename}", delete(reports::delete_report))
        // Stored artifacts
        .route("/files/{prefix}/{name}", get(files::get_file))
        // File library
        .route("/library", get(library::list_files).post(library::upload_files))
        .route("/library/rename", put(library::rename_file))
        .route("/library/{filename}", delete(library::delete_file))
        // Tickets
        .route("/tickets", post(tickets::create_ticket).get(tickets::list_tickets))
        .route(
            "/tickets/{id}",
            get(tickets::get_ticket)
                .put(tickets::update_ticket)
                .delete(tickets::delete_ticket),
        )
        .route(
            "/tickets/{id}/reports",
            get(tickets::ticket_reports).post(tickets::link_report),
        )
        .route(
            "/tickets/{id}/reports/{report_id}",
            delete(tickets::unlink_report),
        )
        // Queue and notifier
        .route("/queue/status", get(admin::queue_status))
        .route("/admin/notify-backlog", post(admin::notify_backlog))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(Arc::clone(&state));

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/metrics", get(metrics_handler).with_state(state))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

async fn metrics_handler(State(state): State<Arc<AppState>>) -> String {
    collect_dynamic_metrics(&state).await;
    encode_metrics()
}
