//! Binary-side wiring: command line, configuration, the Chromium page
//! controller and terminal progress display.
mod app;
mod browser;
mod cli;
mod config;
mod progress;

pub use app::run_app;
