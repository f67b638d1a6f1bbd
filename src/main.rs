use anyhow::Result;
use clap::Parser;
use dotenv::dotenv;
use std::fs::File;
use tokio::select;
use tracing::{info, level_filters::LevelFilter};
use uradial::app::{self, AppStateBuilder};
use uradial::config::{Cli, Config};
use uradial::version;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let cli = Cli::parse();

    let mut config = cli
        .conf
        .map(|conf| Config::load(&conf).expect("Failed to load config"))
        .unwrap_or_default();
    // deployment secrets come from the environment, never the config file
    config.apply_env(|key| std::env::var(key).ok());

    let mut log_fmt = tracing_subscriber::fmt();
    if let Some(ref level) = config.log_level {
        if let Ok(lv) = level.as_str().parse::<LevelFilter>() {
            log_fmt = log_fmt.with_max_level(lv);
        }
    }

    let mut guard_holder = None;
    if let Some(ref log_file) = config.log_file {
        let file = File::create(log_file).expect("Failed to create log file");
        let (non_blocking, guard) = tracing_appender::non_blocking(file);
        // the writer stops flushing the moment the guard drops
        guard_holder = Some(guard);
        log_fmt
            .with_writer(non_blocking)
            .with_ansi(false)
            .try_init()
            .ok();
    } else {
        log_fmt.try_init().ok();
    }

    info!("{}", version::get_version_info());

    let state = AppStateBuilder::new()
        .config(config)
        .build()
        .expect("Failed to build app");

    info!("Starting uradial on {}", state.config.http_addr);
    select! {
        _ = app::run(state.clone()) => {}
        _ = tokio::signal::ctrl_c() => {
            info!("Received CTRL+C, shutting down");
            state.token.cancel();
        }
    }

    drop(guard_holder);
    Ok(())
}
