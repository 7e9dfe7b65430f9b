#![allow(clippy::uninlined_format_args)]

pub mod app;
pub mod config;
pub mod data;
pub mod dispatch;
pub mod forms;
pub mod hover;
pub mod nav;
pub mod net;
pub mod readstate;
pub mod rows;
pub mod storage;
pub mod view;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use app::run;
