//! Wyrm: a neon snake arcade game with an HDR bloom pipeline.

mod app;
mod config;
mod input;
mod runtime;
mod snake;

use anyhow::Result;
use wyrm_render::logging::{LoggingConfig, init_logging};

use crate::config::Settings;

fn main() -> Result<()> {
    init_logging(LoggingConfig::default());
    let settings = Settings::load(config::SETTINGS_PATH);
    runtime::run(settings)
}
