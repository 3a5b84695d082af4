mod analysis;
mod auth;
mod chat;
mod config;
mod detection;
mod error;
mod routes;
mod users;

use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use analysis::config::AnalysisConfig;
use analysis::render::Renderer;
use auth::jwt::JwtService;
use auth::middleware::AuthMiddleware;
use chat::gemini::GeminiClient;
use chat::memory::SessionStore;
use chat::service::{ChatHandle, ChatManager};
use config::Settings;
use detection::RoboflowClient;
use routes::configure_routes;
use std::env;
use users::repository::UserRepository;

fn startup_error(message: String) -> std::io::Error {
    log::error!("{}", message);
    std::io::Error::other(message)
}

fn cors(frontend_url: Option<&str>) -> Cors {
    let cors = match frontend_url {
        Some(origin) => Cors::default().allowed_origin(origin).supports_credentials(),
        None => Cors::default().allow_any_origin(),
    };
    cors.allowed_methods(vec!["GET", "POST", "DELETE", "OPTIONS"])
        .allowed_headers(vec![
            actix_web::http::header::AUTHORIZATION,
            actix_web::http::header::ACCEPT,
            actix_web::http::header::CONTENT_TYPE,
        ])
        .max_age(3600)
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));
    dotenv::dotenv().ok();

    if let Ok(current_dir) = env::current_dir() {
        log::info!("Current working directory: {}", current_dir.display());
    }

    let settings = Settings::from_env()
        .map_err(|e| startup_error(format!("Invalid configuration: {}", e)))?;

    let analysis_config = AnalysisConfig::load(&settings.analysis_config_path)
        .map_err(|e| startup_error(e.to_string()))?;
    let renderer = Renderer::new(settings.font_path.as_deref());

    let detector = RoboflowClient::new(&settings);
    let user_repo = UserRepository::new();
    let jwt_service = JwtService::new(&settings.jwt_secret_key, settings.jwt_expiration_minutes);
    let auth_middleware = AuthMiddleware::new(jwt_service.clone());

    let sessions = web::Data::new(SessionStore::new(
        settings.memory_window_k,
        settings.session_ttl_minutes,
    ));
    let chat_handle = web::Data::new(ChatHandle::<GeminiClient>::new());
    {
        let chat_handle = chat_handle.clone();
        let settings = settings.clone();
        actix_web::rt::spawn(async move {
            let manager = match GeminiClient::new(&settings) {
                Ok(model) => ChatManager::initialize(model, &settings).await,
                Err(e) => Err(e),
            };
            match manager {
                Ok(manager) => {
                    chat_handle.set(manager);
                    log::info!("Chatbot initialized");
                }
                Err(e) => log::error!("Chatbot initialization failed: {}", e),
            }
        });
    }

    let bind_address = format!("0.0.0.0:{}", settings.port);
    log::info!("Starting {} on {}", settings.app_name, bind_address);

    let frontend_url = settings.frontend_url.clone();
    HttpServer::new(move || {
        App::new()
            .wrap(cors(frontend_url.as_deref()))
            .wrap(middleware::Logger::default())
            .app_data(web::Data::new(settings.clone()))
            .app_data(web::Data::new(analysis_config.clone()))
            .app_data(web::Data::new(renderer.clone()))
            .app_data(web::Data::new(detector.clone()))
            .app_data(web::Data::new(user_repo.clone()))
            .app_data(web::Data::new(jwt_service.clone()))
            .app_data(sessions.clone())
            .app_data(chat_handle.clone())
            .configure(|cfg| configure_routes(cfg, auth_middleware.clone()))
    })
    .bind(&bind_address)?
    .run()
    .await
}
