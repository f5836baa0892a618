pub mod animation;
pub mod app;
pub mod config;
pub mod live;
pub mod markers;
pub mod poll;
pub mod render;
