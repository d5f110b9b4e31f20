use std::sync::Arc;

use trackle_core::AccessControl;

use crate::config::ServerConfig;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub access: Arc<AccessControl>,
}
