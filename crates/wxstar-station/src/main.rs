mod cli;
mod input;
mod renderer;
mod runtime;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use wxstar_core::{AppError, Config, SettingsController, SettingsStore, TracingSink};
use wxstar_display::{PageCatalog, Scheduler};
use wxstar_weather::{
    LocationResolver, NoaaClient, OpenMeteoClient, ProviderDispatcher, RefreshPipeline,
    RetryConfig, WeatherCache,
};

use crate::cli::{fallback_coordinate, Cli};
use crate::renderer::LogRenderer;
use crate::runtime::{run_refresh_loop, run_render_loop, RenderContext};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    wxstar_core::init_tracing(cli.log_level.as_deref())?;

    let (config, _validation) = Config::load_validated(cli.config.as_deref()).map_err(|e| {
        let err = AppError::from(e);
        tracing::error!("{} ({})", err.user_message(), err);
        err
    })?;
    tracing::info!("Config directory: {}", config.config_dir.display());

    let settings_store = SettingsStore::new(config.settings_path());
    let controller = SettingsController::new(settings_store.load());
    let settings = controller.handle();

    let noaa = NoaaClient::new(&config.providers, &config.refresh)
        .context("Failed to build NWS client")?;
    let open_meteo = OpenMeteoClient::new(&config.providers, &config.refresh)
        .context("Failed to build Open-Meteo client")?
        .with_settings(settings.clone());
    let dispatcher = ProviderDispatcher::new(
        Arc::new(noaa),
        Arc::new(open_meteo),
        RetryConfig::from_refresh(&config.refresh),
    );

    let cache = if config.refresh.persist_cache {
        let cache = WeatherCache::with_snapshot(config.cache_path());
        match cache.load_snapshot() {
            Ok(count) => tracing::info!("Restored {} cached location(s)", count),
            Err(e) => tracing::warn!("Ignoring cache snapshot: {}", e),
        }
        cache
    } else {
        WeatherCache::new()
    };
    let cache = Arc::new(cache);

    let events = Arc::new(TracingSink);
    let pipeline = Arc::new(RefreshPipeline::new(
        dispatcher,
        Arc::clone(&cache),
        settings,
        events.clone(),
    ));

    let manual = cli.manual_coordinate(&config.location)?;
    let resolver = LocationResolver::new(&config.providers, &config.refresh)?;
    let coordinate = match resolver.resolve(manual).await {
        Ok(location) => {
            tracing::info!(
                label = location.label.as_deref().unwrap_or("unknown"),
                "Station located at {}",
                location.coordinate
            );
            location.coordinate
        }
        Err(e) => {
            let fallback = fallback_coordinate(&config.location)?;
            let err = AppError::from(e);
            tracing::warn!(%fallback, "{} ({})", err.user_message(), err);
            fallback
        }
    };
    pipeline.set_coordinate(&coordinate);

    let scheduler = Scheduler::new(
        PageCatalog::default_catalog(Duration::from_secs(config.display.dwell_secs)),
        controller,
        events,
    );

    let token = CancellationToken::new();
    let (command_tx, command_rx) = mpsc::unbounded_channel();
    let (force_tx, force_rx) = mpsc::unbounded_channel();

    let refresh = tokio::spawn(run_refresh_loop(
        Arc::clone(&pipeline),
        coordinate,
        Duration::from_secs(config.refresh.interval_secs),
        force_rx,
        token.clone(),
    ));
    tokio::spawn(input::read_commands(command_tx, token.clone()));

    let ctrl_c = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupted");
            ctrl_c.cancel();
        }
    });

    tracing::info!("WxStar started");
    let mut renderer = LogRenderer::new();
    run_render_loop(
        scheduler,
        &mut renderer,
        RenderContext {
            cache,
            coordinate,
            commands: command_rx,
            force_refresh: force_tx,
            settings_store,
            frame_rate: config.display.frame_rate,
        },
        token.clone(),
    )
    .await;

    token.cancel();
    if let Err(e) = refresh.await {
        tracing::warn!("Refresh loop ended abnormally: {}", e);
    }
    tracing::info!("WxStar stopped");
    Ok(())
}
