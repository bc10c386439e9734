use std::env;

#[derive(Clone)]
pub struct Config {
    pub server_addr: String,
    pub db_path: String,
    pub frontend_origin: String,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();

        Self {
            server_addr: env::var("SERVER_ADDR").unwrap_or_else(|_| "0.0.0.0:3333".to_string()),
            db_path: env::var("DB_PATH").unwrap_or_else(|_| "db.json".to_string()),
            frontend_origin: env::var("FRONTEND_ORIGIN")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
        }
    }
}
