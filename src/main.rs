use actix_web::{middleware, web, App, HttpServer};
use std::sync::Arc;

use photo_greeter::api::{self, AppState};
use photo_greeter::config::Config;
use photo_greeter::detection;
use photo_greeter::session::SessionKeys;
use photo_greeter::store::Store;
use photo_greeter::upload::UploadDir;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize logger
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let config = Config::from_env().expect("Invalid configuration");

    let store = Arc::new(Store::new(&config.data_dir).expect("Failed to initialize data directory"));
    let uploads = Arc::new(
        UploadDir::new(&config.upload_dir, config.max_upload_bytes)
            .expect("Failed to create upload directory"),
    );
    let detector = detection::build(&config.detection).expect("Failed to initialize face detector");
    let session_keys = web::Data::new(SessionKeys::new(
        config.session_secret.clone(),
        config.session_ttl_hours,
    ));

    log::info!("Data directory: {}", store.data_dir().display());
    log::info!("Upload directory: {}", uploads.path().display());
    log::info!("Face detection policy: {}", detector.name());

    let state = web::Data::new(AppState {
        store,
        uploads,
        detector,
    });
    let static_dir = config.static_dir.clone();
    let upload_dir = config.upload_dir.clone();
    let max_upload_bytes = config.max_upload_bytes;

    log::info!("Starting photo-greeter on {}:{}", config.host, config.port);

    HttpServer::new(move || {
        App::new()
            .wrap(api::error_handlers())
            .wrap(middleware::Logger::default())
            .app_data(state.clone())
            .app_data(session_keys.clone())
            .configure(api::configure_limits(max_upload_bytes))
            .configure(api::configure_routes)
            .configure(api::configure_assets(static_dir.clone(), upload_dir.clone()))
            .default_service(web::to(api::not_found))
    })
    .workers(config.workers)
    .bind((config.host.as_str(), config.port))?
    .run()
    .await
}
