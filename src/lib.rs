pub mod app;
pub mod error;
pub mod runtime;
pub mod settings;
pub mod speedtest;
pub mod ticker;
pub mod ui;
