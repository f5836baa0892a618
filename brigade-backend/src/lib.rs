pub mod api;
pub mod config;
pub mod live;
pub mod scheduled;
pub mod service;
