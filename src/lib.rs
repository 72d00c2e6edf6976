pub mod alert;
pub mod api;
pub mod history;
pub mod models;
pub mod settings;
pub mod store;
pub mod tracker;

use std::sync::Arc;

use settings::SettingsStore;
use store::UserStore;
use tracker::SessionController;

/// Shared application state: the store, the settings cache, and the one
/// session controller for this process.
pub struct AppState {
    pub store: UserStore,
    pub settings: Arc<SettingsStore>,
    pub controller: SessionController,
}

impl AppState {
    pub fn new(store: UserStore, settings: Arc<SettingsStore>) -> Self {
        let controller = SessionController::new(store.clone(), settings.clone());
        Self {
            store,
            settings,
            controller,
        }
    }
}
