//! The two concurrent activities: refreshing weather and rendering pages.
//!
//! They share only the weather cache and the published settings. The
//! render loop never waits on the network.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use wxstar_core::{AppError, Settings, SettingsStore};
use wxstar_display::{Command, Renderer, Scheduler, SchedulerEvent};
use wxstar_weather::{Coordinate, RefreshOutcome, RefreshPipeline, WeatherCache};

/// Refresh on a fixed interval and whenever a force-refresh arrives.
///
/// Each refresh runs as its own task so a forced refresh can overlap a
/// scheduled one; the pipeline coalesces them. A zero interval disables
/// scheduled refreshes after the first one.
pub async fn run_refresh_loop(
    pipeline: Arc<RefreshPipeline>,
    coordinate: Coordinate,
    interval: Duration,
    mut force_rx: mpsc::UnboundedReceiver<()>,
    token: CancellationToken,
) {
    let mut ticker = (!interval.is_zero()).then(|| {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker
    });
    if ticker.is_none() {
        spawn_refresh(&pipeline, coordinate);
    }

    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            _ = next_tick(ticker.as_mut()) => {}
            forced = force_rx.recv() => match forced {
                Some(()) => tracing::info!("Forced refresh requested"),
                None => break,
            },
        }
        spawn_refresh(&pipeline, coordinate);
    }
    tracing::debug!("Refresh loop stopped");
}

async fn next_tick(ticker: Option<&mut Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}

fn spawn_refresh(pipeline: &Arc<RefreshPipeline>, coordinate: Coordinate) {
    let pipeline = Arc::clone(pipeline);
    tokio::spawn(async move {
        match pipeline.refresh(&coordinate).await {
            RefreshOutcome::FailedKeepingStale(e) => {
                tracing::warn!("Refresh failed: {}", e);
            }
            outcome => tracing::debug!(?outcome, "Refresh finished"),
        }
    });
}

/// What the render loop reads from and reports to.
pub struct RenderContext {
    pub cache: Arc<WeatherCache>,
    pub coordinate: Coordinate,
    pub commands: mpsc::UnboundedReceiver<Command>,
    pub force_refresh: mpsc::UnboundedSender<()>,
    pub settings_store: SettingsStore,
    pub frame_rate: u32,
}

/// Tick the scheduler at the frame cadence until exit or cancellation.
pub async fn run_render_loop<R: Renderer>(
    mut scheduler: Scheduler,
    renderer: &mut R,
    mut ctx: RenderContext,
    token: CancellationToken,
) {
    let period = Duration::from_secs(1) / ctx.frame_rate.max(1);
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut last_tick = Instant::now();
    let mut refresh_after_publish = false;

    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            _ = ticker.tick() => {}
        }

        while let Ok(command) = ctx.commands.try_recv() {
            scheduler.push_command(command);
        }

        let now = Instant::now();
        let elapsed = now - last_tick;
        last_tick = now;

        let entry = ctx.cache.get_current(&ctx.coordinate).ok();
        let events = scheduler.tick(elapsed, entry, Utc::now());

        // Settings committed last tick were published at the start of this
        // one, so the refresh sees them.
        if std::mem::take(&mut refresh_after_publish) {
            request_refresh(&ctx);
        }
        let published = scheduler.current_settings();
        for event in events {
            refresh_after_publish |= handle_event(event, &ctx, &published, &token);
        }

        if let Err(e) = renderer.render(&scheduler.frame()) {
            tracing::error!("Render failed: {}", e);
        }

        if scheduler.is_terminated() {
            break;
        }
    }
    tracing::debug!("Render loop stopped");
}

fn request_refresh(ctx: &RenderContext) {
    if ctx.force_refresh.send(()).is_err() {
        tracing::warn!("Refresh loop is gone; ignoring refresh request");
    }
}

/// Whether moving from `published` to `committed` changes what a refresh
/// fetches.
fn needs_refetch(published: &Settings, committed: &Settings) -> bool {
    published.provider_preference != committed.provider_preference
        || (committed.marine_forecast_enabled && !published.marine_forecast_enabled)
}

/// Returns whether a refresh should follow once committed settings are
/// published.
fn handle_event(
    event: SchedulerEvent,
    ctx: &RenderContext,
    published: &Settings,
    token: &CancellationToken,
) -> bool {
    match event {
        SchedulerEvent::PageChanged { from, to } => {
            tracing::debug!(?from, ?to, "Page changed");
        }
        SchedulerEvent::RefreshRequested => request_refresh(ctx),
        SchedulerEvent::SettingsCommitted(settings) => {
            if let Err(e) = ctx.settings_store.save(&settings) {
                let err = AppError::from(e);
                tracing::warn!("{} ({})", err.user_message(), err);
            }
            return needs_refetch(published, &settings);
        }
        SchedulerEvent::SettingsRejected(e) => {
            let err = AppError::from(e);
            tracing::warn!("{} ({})", err.user_message(), err);
        }
        SchedulerEvent::Exit => token.cancel(),
    }
    false
}
