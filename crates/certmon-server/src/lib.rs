pub mod api;
pub mod app;
pub mod cert;
pub mod config;
pub mod logging;
pub mod openapi;
pub mod state;
