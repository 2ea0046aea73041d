use actix_cors::Cors;
use actix_web::{http::header, middleware::Logger, web, App, HttpServer};
use std::io;

use tasklane::config::Config;
use tasklane::routes::{self, health};
use tasklane::state::AppState;
use tasklane::store::PgStore;

fn cors(client_url: Option<&str>) -> Cors {
    let cors = match client_url {
        Some(origin) => Cors::default().allowed_origin(origin).supports_credentials(),
        None => Cors::default().allow_any_origin(),
    };
    cors.allow_any_method()
        .allow_any_header()
        // Refreshed access tokens come back in this header.
        .expose_headers([header::AUTHORIZATION])
        .max_age(3600)
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::from_env().map_err(|e| {
        log::error!("invalid configuration: {}", e);
        io::Error::new(io::ErrorKind::InvalidInput, e)
    })?;

    let store = PgStore::connect(&config).await.map_err(|e| {
        log::error!("failed to connect to database: {}", e);
        io::Error::new(io::ErrorKind::ConnectionRefused, e)
    })?;
    store.migrate().await.map_err(|e| {
        log::error!("failed to run migrations: {}", e);
        io::Error::new(io::ErrorKind::Other, e)
    })?;

    let state = web::Data::new(AppState::with_pg_store(store, &config));
    let client_url = config.client_url.clone();

    log::info!("Starting tasklane server at {}", config.server_url());
    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(cors(client_url.as_deref()))
            .wrap(Logger::default())
            .service(health::health)
            .service(web::scope("/api").configure(routes::config))
    })
    .bind((config.server_host.as_str(), config.server_port))?
    .run()
    .await
}
