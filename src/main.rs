use actix_web::{web, App, HttpServer, HttpResponse};
use actix_cors::Cors;
use augment_admin_server::{AppState, Settings, AppError};
use augment_admin_server::auth::handlers::{login, logout, validate};
use augment_admin_server::tokens::handlers::{
    batch_import, batch_share, check_tokens, create_token, delete_token, get_share, get_token,
    import_session, list_tokens, share_token, update_token,
};
use dotenv::dotenv;
use std::net::TcpListener;
use std::time::Duration;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

/// Health check endpoint handler
/// Returns a JSON response with server status, timestamp, and pool usage
async fn health_check(state: web::Data<AppState>) -> HttpResponse {
    let pool = state.db.pool_status();

    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "database": pool,
    }))
}

#[actix_web::main]
async fn main() -> augment_admin_server::Result<()> {
    // Load environment variables
    dotenv().ok();

    // Initialize logging
    FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .pretty()
        .init();

    // Load configuration
    let config = Settings::new()?;
    info!("Configuration loaded successfully");

    info!("Starting server at {}:{}", config.server.host, config.server.port);

    // Initialize application state
    let state = AppState::new(config.clone()).await?;
    let state = web::Data::new(state);

    // Expired admin sessions are swept in the background.
    let cleanup_state = state.clone();
    tokio::spawn(async move {
        loop {
            match cleanup_state.auth_service.cleanup_expired_sessions().await {
                Ok(0) => {}
                Ok(n) => info!("Removed {} expired admin sessions", n),
                Err(e) => warn!("Session cleanup failed: {}", e),
            }

            tokio::time::sleep(Duration::from_secs(600)).await;
        }
    });

    // Create and bind TCP listener
    let listener = TcpListener::bind(format!("{}:{}", config.server.host, config.server.port))?;
    let workers = config.server.workers as usize;

    // Start HTTP server
    HttpServer::new(move || {
        let cors = if config.cors.enabled {
            let cors_config = Cors::default();

            // Apply specific CORS rules based on configuration
            let cors_config = if config.cors.allow_any_origin {
                cors_config
                    .allow_any_origin()
                    .allow_any_method()
                    .allow_any_header()
                    .expose_any_header()
            } else {
                let mut restricted = cors_config
                    .allowed_methods(vec!["GET", "POST", "PUT", "DELETE"])
                    .allowed_headers(vec!["Authorization", "Content-Type"])
                    .supports_credentials();
                for origin in &config.cors.allowed_origins {
                    restricted = restricted.allowed_origin(origin);
                }
                restricted
            };

            // Set max age
            cors_config.max_age(config.cors.max_age as usize)
        } else {
            // CORS disabled - use most restrictive settings
            Cors::default()
        };

        App::new()
            .wrap(cors)
            .app_data(state.clone())
            .route("/health", web::get().to(health_check))
            .route("/auth/login", web::post().to(login))
            .route("/auth/logout", web::post().to(logout))
            .route("/auth/validate", web::get().to(validate))
            .route("/tokens", web::get().to(list_tokens))
            .route("/tokens", web::post().to(create_token))
            .route("/tokens/batch", web::post().to(batch_import))
            .route("/tokens/check", web::post().to(check_tokens))
            .route("/tokens/import-session", web::post().to(import_session))
            .route("/tokens/share", web::post().to(batch_share))
            .route("/tokens/{id}", web::get().to(get_token))
            .route("/tokens/{id}", web::put().to(update_token))
            .route("/tokens/{id}", web::delete().to(delete_token))
            .route("/tokens/{id}/share", web::post().to(share_token))
            .route("/tokens/{id}/share", web::get().to(get_share))
    })
    .listen(listener)?
    .workers(workers)
    .run()
    .await
    .map_err(|e| AppError::InternalError(e.to_string()))?;

    Ok(())
}
