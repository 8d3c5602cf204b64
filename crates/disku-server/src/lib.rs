pub mod api;
pub mod app;
pub mod config;
pub mod engine;
pub mod logging;
pub mod state;
