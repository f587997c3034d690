#![allow(clippy::uninlined_format_args)]

pub mod app;
pub mod author;
pub mod carousel;
pub mod config;
pub mod data;
pub mod export;
pub mod filter;
pub mod gesture;
pub mod import;
pub mod logging;
pub mod media;
pub mod navigator;
pub mod post;
pub mod probe;
pub mod timer;
pub mod ui;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use app::{run, RunOptions};
