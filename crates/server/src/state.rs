use std::sync::Arc;

use crate::{config::Config, remote::RemoteHost, store::JsonStore};

#[derive(Clone)]
pub struct AppState {
    pub store: JsonStore,
    pub config: Config,
    pub remote: Arc<dyn RemoteHost>,
}

impl AppState {
    pub fn new(config: Config, remote: Arc<dyn RemoteHost>) -> Self {
        let store = JsonStore::new(&config.storage.data_dir);
        Self {
            store,
            config,
            remote,
        }
    }
}
