use std::sync::Arc;

use raven_db::Database;
use raven_messaging::MessageLifecycle;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    /// Write path: every insert, edit, reaction and delete goes through here.
    pub lifecycle: MessageLifecycle<Arc<Database>>,
    /// Read path for listings and ownership checks.
    pub db: Arc<Database>,
    pub jwt_secret: String,
}
