use crate::db::FileDb;
use crate::router::Route;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<FileDb>,
    pub routes: Arc<Vec<Route>>,
}
