//! Volunteer Scheduler Backend
//!
//! REST backend for church volunteer rosters: teams, events, schedules and
//! assignments, with double-booking protection and conflict reporting.

mod api;
mod auth;
mod config;
mod db;
mod errors;
mod models;
mod scheduling;
mod search;

use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, patch, post, put},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use config::{Config, StorageKind};
use db::{MemoryStorage, SqliteStorage, Storage};
use search::VolunteerIndex;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Storage>,
    pub search: Arc<VolunteerIndex>,
    pub config: Arc<Config>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env()?;

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Volunteer Scheduler Backend");
    tracing::info!("Storage: {:?}", config.storage);
    tracing::info!("Bind address: {}", config.bind_addr);
    tracing::info!(
        "Collisions require same location: {}",
        config.match_location
    );

    if config.api_psk.is_none() {
        tracing::warn!("No API PSK configured (SCHEDULER_API_PSK). Authentication is disabled!");
    }

    let (store, search): (Arc<dyn Storage>, VolunteerIndex) = match config.storage {
        StorageKind::Sqlite => {
            tracing::info!("Database path: {:?}", config.db_path);
            tracing::info!("Index path: {:?}", config.index_path);
            let pool = db::init_database(&config.db_path).await?;
            let store: Arc<dyn Storage> = Arc::new(SqliteStorage::new(pool));
            (store, VolunteerIndex::open(&config.index_path)?)
        }
        StorageKind::Memory => {
            tracing::warn!("Using in-memory storage; data is lost on exit");
            let store: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
            (store, VolunteerIndex::in_memory()?)
        }
    };

    tracing::info!("Building volunteer search index...");
    search.rebuild(&store.list_volunteers().await?).await?;

    let state = AppState {
        store,
        search: Arc::new(search),
        config: Arc::new(config.clone()),
    };

    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Create the application router with all routes.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let psk = state.config.api_psk.clone();

    let api_routes = Router::new()
        // Volunteers
        .route(
            "/volunteers",
            get(api::list_volunteers).post(api::create_volunteer),
        )
        .route("/volunteers/search", get(api::search_volunteers))
        .route(
            "/volunteers/{id}",
            get(api::get_volunteer)
                .put(api::update_volunteer)
                .delete(api::delete_volunteer),
        )
        .route(
            "/volunteers/{id}/assignments",
            get(api::list_volunteer_assignments),
        )
        .route(
            "/volunteers/{id}/availability",
            get(api::list_volunteer_availability),
        )
        .route(
            "/volunteers/{id}/notifications",
            get(api::list_notifications),
        )
        .route(
            "/volunteers/{id}/unread-notifications",
            get(api::list_unread_notifications),
        )
        // Teams, roles and members
        .route("/teams", get(api::list_teams).post(api::create_team))
        .route(
            "/teams/{id}",
            get(api::get_team)
                .put(api::update_team)
                .delete(api::delete_team),
        )
        .route(
            "/teams/{id}/roles",
            get(api::list_team_roles).post(api::create_team_role),
        )
        .route("/teams/{id}/members", get(api::list_team_members))
        .route(
            "/roles/{id}",
            put(api::update_role).delete(api::delete_role),
        )
        .route("/team-members", post(api::add_team_member))
        .route(
            "/team-members/{volunteer_id}/{team_id}",
            axum::routing::delete(api::remove_team_member),
        )
        // Events
        .route("/events", get(api::list_events).post(api::create_event))
        .route(
            "/events/{id}",
            get(api::get_event)
                .put(api::update_event)
                .delete(api::delete_event),
        )
        // Schedules
        .route(
            "/schedules",
            get(api::list_schedules).post(api::create_schedule),
        )
        .route(
            "/schedules/{id}",
            get(api::get_schedule)
                .put(api::update_schedule)
                .delete(api::delete_schedule),
        )
        .route("/schedules/{id}/details", get(api::list_schedule_details))
        .route("/schedule-details", post(api::create_schedule_detail))
        .route(
            "/schedule-details/{id}",
            get(api::get_schedule_detail)
                .put(api::update_schedule_detail)
                .delete(api::delete_schedule_detail),
        )
        // Conflicts
        .route("/conflicts", get(api::list_conflicts))
        .route("/conflicts/check", post(api::check_conflict))
        // Dashboard
        .route("/dashboard/stats", get(api::dashboard_stats))
        .route("/dashboard/services", get(api::dashboard_services))
        // Availability
        .route(
            "/availability-rules",
            post(api::create_availability_rule),
        )
        .route(
            "/availability-rules/{id}",
            put(api::update_availability_rule).delete(api::delete_availability_rule),
        )
        // Swap requests
        .route(
            "/swap-requests",
            get(api::list_swap_requests).post(api::create_swap_request),
        )
        .route(
            "/swap-requests/{id}",
            get(api::get_swap_request)
                .put(api::resolve_swap_request)
                .delete(api::delete_swap_request),
        )
        // Notifications
        .route("/notifications", post(api::create_notification))
        .route(
            "/notifications/{id}",
            axum::routing::delete(api::delete_notification),
        )
        .route(
            "/notifications/{id}/read",
            patch(api::mark_notification_read),
        )
        .layer(middleware::from_fn(move |req, next| {
            auth::psk_auth_layer(psk.clone(), req, next)
        }));

    // Health check (no auth required)
    let health_routes = Router::new().route("/health", get(health_check));

    Router::new()
        .nest("/api", api_routes)
        .merge(health_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests;
