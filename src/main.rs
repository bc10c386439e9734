// src/main.rs

use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{http, middleware::Logger, web, App, HttpServer};
use env_logger::Env;
use log::{error, info};

use taskbox::app_state::AppState;
use taskbox::config::Config;
use taskbox::db::FileDb;
use taskbox::router::dispatch;
use taskbox::task::task_routes;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let config = Config::from_env();
    let db = Arc::new(FileDb::open(&config.db_path)?);
    let state = AppState {
        db: db.clone(),
        routes: Arc::new(task_routes()),
    };

    info!("server running at http://{}", config.server_addr);
    info!("store backed by {}", config.db_path);

    let frontend_origin = config.frontend_origin.clone();
    let server = HttpServer::new(move || {
        let cors = Cors::default()
            .allowed_origin(&frontend_origin)
            .allowed_methods(vec!["GET", "POST", "PUT", "DELETE", "PATCH", "OPTIONS"])
            .allowed_headers(vec![http::header::CONTENT_TYPE, http::header::ACCEPT])
            .max_age(3600);

        App::new()
            .wrap(Logger::default())
            .wrap(cors)
            .app_data(web::Data::new(state.clone()))
            .default_service(web::route().to(dispatch))
    })
    // Handlers mutate the store without awaiting, so a single worker keeps
    // request handling serialized.
    .workers(1)
    .bind(&config.server_addr)?
    .run();

    let result = server.await;
    if let Err(err) = db.flush() {
        error!("error flushing store on shutdown: {}", err);
    }
    result
}
