use crate::config::Config;
use rusqlite::Connection;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Shared application state. The SQLite connection sits behind one async
/// mutex: every balance mutation goes through it, which together with the
/// conditional-decrement queries serializes spends per profile.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Mutex<Connection>>,
    pub config: Arc<Config>,
}
