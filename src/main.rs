use axum::{middleware::from_fn, routing::get, Router};
use serde_json::{json, Value};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use pajak_api::handlers::{protected, public};
use pajak_api::middleware::jwt_auth_middleware;

#[tokio::main]
async fn main() {
    // Load .env if present so cargo run picks up DATABASE_URL, JWT_SECRET, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt::init();

    let config = pajak_api::config::config();
    tracing::info!("Starting Pajak API in {:?} mode", config.environment);

    let app = app();

    // Allow tests or deployments to override port via env
    let port = std::env::var("PAJAK_API_PORT")
        .ok()
        .or_else(|| std::env::var("PORT").ok())
        .and_then(|s| s.parse::<u16>().ok())
        .unwrap_or(3000);

    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .unwrap_or_else(|e| panic!("failed to bind {}: {}", bind_addr, e));

    tracing::info!("Pajak API server listening on http://{}", bind_addr);

    axum::serve(listener, app).await.expect("server");
}

fn app() -> Router {
    Router::new()
        // Public
        .route("/", get(root))
        .route("/health", get(health))
        .merge(auth_public_routes())
        // Protected API behind JWT auth
        .merge(protected_routes().layer(from_fn(jwt_auth_middleware)))
        // Global middleware
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

fn auth_public_routes() -> Router {
    use axum::routing::post;
    use public::auth;

    Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
}

fn protected_routes() -> Router {
    Router::new()
        .merge(auth_routes())
        .merge(profile_routes())
        .merge(audit_routes())
        .merge(consultation_routes())
        .merge(document_routes())
        .merge(bank_integration_routes())
        .merge(tax_calculation_routes())
        .merge(compliance_routes())
        .merge(notification_routes())
}

fn auth_routes() -> Router {
    use protected::auth;

    Router::new().route("/api/auth/whoami", get(auth::whoami))
}

fn profile_routes() -> Router {
    use protected::profile;

    Router::new()
        .route(
            "/api/profile",
            get(profile::get_profile).patch(profile::update_profile),
        )
        .route("/api/users", get(profile::list_users))
        .route(
            "/api/users/:id",
            get(profile::get_user).patch(profile::update_user),
        )
}

fn audit_routes() -> Router {
    use axum::routing::post;
    use protected::audits;

    Router::new()
        .route("/api/audits", get(audits::list).post(audits::create))
        .route(
            "/api/audits/:id",
            get(audits::get)
                .patch(audits::update)
                .put(audits::update)
                .delete(audits::delete),
        )
        .route("/api/audits/bulk", post(audits::bulk))
}

fn consultation_routes() -> Router {
    use axum::routing::post;
    use protected::consultations;

    Router::new()
        .route(
            "/api/consultations",
            get(consultations::list).post(consultations::create),
        )
        .route(
            "/api/consultations/:id",
            get(consultations::get)
                .patch(consultations::update)
                .put(consultations::update)
                .delete(consultations::delete),
        )
        .route("/api/consultations/bulk", post(consultations::bulk))
}

fn document_routes() -> Router {
    use axum::routing::post;
    use protected::documents;

    Router::new()
        .route(
            "/api/documents",
            get(documents::list).post(documents::create),
        )
        .route(
            "/api/documents/:id",
            get(documents::get)
                .patch(documents::update)
                .put(documents::update)
                .delete(documents::delete),
        )
        .route("/api/documents/bulk", post(documents::bulk))
}

fn bank_integration_routes() -> Router {
    use axum::routing::post;
    use protected::bank_integrations;

    Router::new()
        .route(
            "/api/bank-integrations",
            get(bank_integrations::list).post(bank_integrations::create),
        )
        .route(
            "/api/bank-integrations/:id",
            get(bank_integrations::get)
                .patch(bank_integrations::update)
                .put(bank_integrations::update)
                .delete(bank_integrations::delete),
        )
        .route("/api/bank-integrations/bulk", post(bank_integrations::bulk))
}

fn tax_calculation_routes() -> Router {
    use axum::routing::post;
    use protected::tax_calculations;

    Router::new()
        .route(
            "/api/tax-calculations",
            get(tax_calculations::list).post(tax_calculations::create),
        )
        .route(
            "/api/tax-calculations/:id",
            get(tax_calculations::get)
                .patch(tax_calculations::update)
                .put(tax_calculations::update)
                .delete(tax_calculations::delete),
        )
        .route("/api/tax-calculations/bulk", post(tax_calculations::bulk))
}

fn compliance_routes() -> Router {
    use axum::routing::post;
    use protected::compliance_records;

    Router::new()
        .route(
            "/api/compliance-records",
            get(compliance_records::list).post(compliance_records::create),
        )
        .route(
            "/api/compliance-records/:id",
            get(compliance_records::get)
                .patch(compliance_records::update)
                .put(compliance_records::update)
                .delete(compliance_records::delete),
        )
        .route("/api/compliance-records/bulk", post(compliance_records::bulk))
}

fn notification_routes() -> Router {
    use axum::routing::post;
    use protected::notifications;

    Router::new()
        .route(
            "/api/notifications",
            get(notifications::list).post(notifications::create),
        )
        .route(
            "/api/notifications/:id",
            get(notifications::get)
                .patch(notifications::update)
                .delete(notifications::delete),
        )
        .route("/api/notifications/bulk", post(notifications::bulk))
}

async fn root() -> axum::response::Json<Value> {
    let version = env!("CARGO_PKG_VERSION");

    axum::response::Json(json!({
        "data": {
            "name": "Pajak API",
            "version": version,
            "description": "Tax administration backend API built with Rust (Axum)",
            "endpoints": {
                "home": "/ (public)",
                "health": "/health (public)",
                "auth": "/auth/register, /auth/login (public - token acquisition)",
                "whoami": "/api/auth/whoami (protected)",
                "profile": "/api/profile (protected)",
                "users": "/api/users[/:id] (staff)",
                "audits": "/api/audits[/:id|/bulk] (protected)",
                "consultations": "/api/consultations[/:id|/bulk] (protected)",
                "documents": "/api/documents[/:id|/bulk] (protected)",
                "bank_integrations": "/api/bank-integrations[/:id|/bulk] (protected)",
                "tax_calculations": "/api/tax-calculations[/:id|/bulk] (protected)",
                "compliance_records": "/api/compliance-records[/:id|/bulk] (protected)",
                "notifications": "/api/notifications[/:id|/bulk] (protected)",
            }
        }
    }))
}

async fn health() -> impl axum::response::IntoResponse {
    let now = chrono::Utc::now();

    match pajak_api::database::manager::DatabaseManager::health_check().await {
        Ok(_) => (
            axum::http::StatusCode::OK,
            axum::response::Json(json!({
                "data": {
                    "status": "ok",
                    "timestamp": now,
                    "database": "ok"
                }
            })),
        ),
        Err(e) => (
            axum::http::StatusCode::SERVICE_UNAVAILABLE,
            axum::response::Json(json!({
                "error": "database unavailable",
                "data": {
                    "status": "degraded",
                    "timestamp": now,
                    "database_error": e.to_string()
                }
            })),
        ),
    }
}
