
pub mod canvas;
pub mod colorize;
pub mod commands;
pub mod compose;
pub mod config;
pub mod discover;
pub mod loader;
pub mod logging;
pub mod normalize;
pub mod plate;
pub mod platemap;
pub mod reconcile;
pub mod render;
