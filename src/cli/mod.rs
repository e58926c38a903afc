pub mod account;
pub mod login;
pub mod output;

use std::sync::Arc;

use crate::config::load_config;
use crate::error::SwiftyError;
use crate::oauth::store::{default_store_path, FileTokenStore, MemoryTokenStore, TokenStore};
use crate::session::SessionController;

/// Load configuration and assemble the controller every command runs against.
/// `ephemeral` keeps the refresh token in memory only.
pub fn build_controller(
    config_path: Option<&str>,
    ephemeral: bool,
) -> Result<SessionController, SwiftyError> {
    let config = load_config(config_path)?;
    let store: Arc<dyn TokenStore> = if ephemeral {
        Arc::new(MemoryTokenStore::new())
    } else {
        let path = config.store_path.clone().unwrap_or_else(default_store_path);
        tracing::debug!("Using token store {}", path.display());
        Arc::new(FileTokenStore::new(path))
    };
    Ok(SessionController::new(config, store))
}
