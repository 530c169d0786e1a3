mod api;
mod config;
mod database;
mod jobs;
mod middleware;
mod models;
mod services;
mod state;
mod store;
mod utils;

use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use dotenv::dotenv;
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::config::AppConfig;
use crate::state::AppState;
use crate::store::UserStore;

fn build_cors(origins: &[String]) -> Cors {
    let cors = if origins.is_empty() {
        Cors::default().allow_any_origin()
    } else {
        origins
            .iter()
            .fold(Cors::default(), |cors, origin| cors.allowed_origin(origin))
            .supports_credentials()
    };

    cors.allowed_methods(vec!["GET", "POST", "PUT", "OPTIONS"])
        .allowed_headers(vec![
            actix_web::http::header::AUTHORIZATION,
            actix_web::http::header::CONTENT_TYPE,
            actix_web::http::header::ACCEPT,
        ])
        .expose_headers(vec![actix_web::http::header::CONTENT_TYPE])
        .max_age(3600)
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load environment variables
    dotenv().ok();

    // Initialize logger
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = AppConfig::from_env().map_err(|e| {
        log::error!("❌ Invalid configuration: {}", e);
        std::io::Error::new(std::io::ErrorKind::InvalidInput, e)
    })?;

    log::info!("🚀 Starting Roommate Review Service...");
    log::info!("📊 Database: {}", config.database_name);

    // Initialize MongoDB connection
    let db = database::MongoDB::new(
        &config.database_url,
        &config.database_name,
        config.mongo_max_pool_size,
    )
    .await
    .map_err(|e| {
        log::error!("❌ Failed to connect to MongoDB: {}", e);
        std::io::Error::new(std::io::ErrorKind::ConnectionRefused, e.to_string())
    })?;

    log::info!("✅ MongoDB connected successfully");

    let store: Arc<dyn UserStore> = Arc::new(db);

    // Maintenance failures leave the data as it was; serve anyway.
    match jobs::maintenance::run_startup_maintenance(store.as_ref(), &config).await {
        Ok(report) => log::info!(
            "✅ Maintenance: {} documents backfilled, legacy import {}",
            report.backfilled,
            if report.import.is_some() { "done" } else { "skipped" }
        ),
        Err(e) => log::error!("❌ Startup maintenance failed: {}", e),
    }

    let host = config.host.clone();
    let port = config.port;
    let state = web::Data::new(AppState::new(store, config));

    log::info!("🌐 Server starting on {}:{}", host, port);
    log::info!("📚 Swagger UI available at: http://{}:{}/swagger-ui/", host, port);
    log::info!("📄 OpenAPI spec at: http://{}:{}/api-docs/openapi.json", host, port);

    HttpServer::new(move || {
        let cors = build_cors(&state.config.cors_origins);

        // Generate OpenAPI specification
        let openapi = api::swagger::ApiDoc::openapi();

        App::new()
            .app_data(state.clone())
            .wrap(cors)
            .wrap(middleware::SecurityHeaders)
            .wrap(Logger::default())
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}").url("/api-docs/openapi.json", openapi),
            )
            .configure(api::configure)
    })
    .bind((host.as_str(), port))?
    .run()
    .await
}
