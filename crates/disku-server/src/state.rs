use crate::config::ServerConfig;
use crate::engine::ReportEngine;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<ReportEngine>,
    pub config: Arc<ServerConfig>,
}
