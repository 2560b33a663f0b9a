//! Tick-driven display scheduler.
//!
//! Each [`Scheduler::tick`] does, in order:
//!
//! 1. publish settings committed on the previous tick,
//! 2. re-evaluate page eligibility against the latest cache entry
//!    (the first entry restarts the rotation from the top),
//! 3. apply at most one queued command,
//! 4. advance the dwell timer (autoplay only).
//!
//! Time only moves when the caller passes an elapsed duration, so tests can
//! drive the scheduler with synthetic ticks.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use wxstar_core::{CoreEvent, EventSink, Settings, SettingsController, SettingsHandle};
use wxstar_weather::{CacheEntry, TrendReport, WeatherModel};

use crate::command::{Command, SchedulerEvent};
use crate::page::{PageCatalog, PageDescriptor, SkipReason};
use crate::render::Frame;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Autoplay,
    Paused,
    SettingsOpen,
    /// An exit command was processed; the run loop should shut down.
    Terminal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Forward,
    Backward,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SchedulerState {
    pub current_page_index: Option<usize>,
    pub mode: Mode,
    pub elapsed_in_page: Duration,
    /// Settings as they were when the overlay opened.
    pub settings_snapshot: Option<Settings>,
    /// Mode to return to when the overlay closes.
    resume_mode: Mode,
}

impl Default for SchedulerState {
    fn default() -> Self {
        Self {
            current_page_index: None,
            mode: Mode::Autoplay,
            elapsed_in_page: Duration::ZERO,
            settings_snapshot: None,
            resume_mode: Mode::Autoplay,
        }
    }
}

type Eligibility = Vec<Result<(), SkipReason>>;

pub struct Scheduler {
    catalog: PageCatalog,
    settings: SettingsController,
    state: SchedulerState,
    pending: VecDeque<Command>,
    entry: Option<Arc<CacheEntry>>,
    sink: Arc<dyn EventSink>,
}

impl Scheduler {
    pub fn new(catalog: PageCatalog, settings: SettingsController, sink: Arc<dyn EventSink>) -> Self {
        Self {
            catalog,
            settings,
            state: SchedulerState::default(),
            pending: VecDeque::new(),
            entry: None,
            sink,
        }
    }

    pub fn catalog(&self) -> &PageCatalog {
        &self.catalog
    }

    pub fn settings_handle(&self) -> SettingsHandle {
        self.settings.handle()
    }

    pub fn state(&self) -> &SchedulerState {
        &self.state
    }

    pub fn mode(&self) -> Mode {
        self.state.mode
    }

    pub fn is_terminated(&self) -> bool {
        self.state.mode == Mode::Terminal
    }

    /// Queue a command for a later tick. Commands run in arrival order.
    pub fn push_command(&mut self, command: Command) {
        self.pending.push_back(command);
    }

    pub fn pending_commands(&self) -> usize {
        self.pending.len()
    }

    pub fn current_page(&self) -> Option<&PageDescriptor> {
        self.state
            .current_page_index
            .and_then(|i| self.catalog.get(i))
    }

    pub fn current_entry(&self) -> Option<&CacheEntry> {
        self.entry.as_deref()
    }

    pub fn current_model(&self) -> Option<&WeatherModel> {
        self.entry.as_deref().map(|e| &e.model)
    }

    /// Published settings. Edits committed during a tick show up here only
    /// after the next tick starts.
    pub fn current_settings(&self) -> Arc<Settings> {
        self.settings.handle().snapshot()
    }

    /// Trend data, hidden when trends are switched off.
    pub fn current_trends(&self) -> Option<&TrendReport> {
        if !self.current_settings().trends_enabled {
            return None;
        }
        self.entry.as_deref().map(|e| &e.trends)
    }

    pub fn frame(&self) -> Frame<'_> {
        Frame {
            page: self.current_page(),
            entry: self.current_entry(),
            settings: self.current_settings(),
            trends: self.current_trends(),
            mode: self.state.mode,
        }
    }

    /// Advance the scheduler by one tick.
    pub fn tick(
        &mut self,
        elapsed: Duration,
        entry: Option<Arc<CacheEntry>>,
        now: DateTime<Utc>,
    ) -> Vec<SchedulerEvent> {
        let mut events = Vec::new();
        if self.is_terminated() {
            return events;
        }

        if let Some(version) = self.settings.publish_pending() {
            self.sink.emit(CoreEvent::SettingsChanged { version });
        }

        let first_data = self.entry.is_none() && entry.is_some();
        self.entry = entry;
        let settings = self.settings.handle().snapshot();
        let eligibility: Eligibility = self
            .catalog
            .iter()
            .map(|page| page.eligibility(self.entry.as_deref(), &settings, now))
            .collect();

        let mut restarted = if first_data {
            self.restart_rotation(&eligibility, &mut events);
            true
        } else {
            self.revalidate_current(&eligibility, &mut events)
        };

        if let Some(command) = self.pending.pop_front() {
            restarted |= self.apply_command(command, &eligibility, &mut events);
        }

        if self.state.mode == Mode::Autoplay && !restarted {
            self.advance_dwell(elapsed, &eligibility, &mut events);
        }

        events
    }

    /// Move off the current page if it stopped being eligible. Returns
    /// whether the page changed.
    fn revalidate_current(
        &mut self,
        eligibility: &Eligibility,
        events: &mut Vec<SchedulerEvent>,
    ) -> bool {
        let current = self.state.current_page_index;
        match current.and_then(|i| eligibility.get(i).map(|e| (i, e))) {
            Some((_, Ok(()))) => return false,
            Some((i, Err(reason))) => self.report_skip(i, reason),
            None => {}
        }
        let next = self.scan(current, Direction::Forward, eligibility);
        self.move_to(next, events)
    }

    /// Start over from the top of the catalog. Pages that need no data
    /// (news) may have been showing while the first fetch was pending.
    fn restart_rotation(&mut self, eligibility: &Eligibility, events: &mut Vec<SchedulerEvent>) {
        let first = self.scan(None, Direction::Forward, eligibility);
        self.move_to(first, events);
        self.state.elapsed_in_page = Duration::ZERO;
    }

    fn advance_dwell(
        &mut self,
        elapsed: Duration,
        eligibility: &Eligibility,
        events: &mut Vec<SchedulerEvent>,
    ) {
        let Some(dwell) = self.current_page().map(|p| p.dwell) else {
            return;
        };
        self.state.elapsed_in_page += elapsed;
        if self.state.elapsed_in_page >= dwell {
            let next = self.scan(self.state.current_page_index, Direction::Forward, eligibility);
            self.move_to(next, events);
            self.state.elapsed_in_page = Duration::ZERO;
        }
    }

    /// Returns whether page timing was restarted.
    fn apply_command(
        &mut self,
        command: Command,
        eligibility: &Eligibility,
        events: &mut Vec<SchedulerEvent>,
    ) -> bool {
        tracing::debug!(command = command.name(), mode = ?self.state.mode, "Applying command");
        let mode = self.state.mode;

        match (command, mode) {
            (Command::Exit, _) => {
                tracing::info!("Exit requested");
                self.state.mode = Mode::Terminal;
                events.push(SchedulerEvent::Exit);
                false
            }
            (Command::ForceRefresh, _) => {
                events.push(SchedulerEvent::RefreshRequested);
                false
            }
            (Command::Pause, Mode::Autoplay) => {
                self.state.mode = Mode::Paused;
                false
            }
            (Command::Resume, Mode::Paused) => {
                self.state.mode = Mode::Autoplay;
                self.state.elapsed_in_page = Duration::ZERO;
                true
            }
            (Command::TogglePause, Mode::Autoplay | Mode::Paused) => {
                let toggled = if mode == Mode::Autoplay {
                    Command::Pause
                } else {
                    Command::Resume
                };
                self.apply_command(toggled, eligibility, events)
            }
            (Command::NavigateNext, Mode::Autoplay | Mode::Paused) => {
                let next = self.scan(self.state.current_page_index, Direction::Forward, eligibility);
                self.move_to(next, events);
                self.state.elapsed_in_page = Duration::ZERO;
                true
            }
            (Command::NavigatePrevious, Mode::Autoplay | Mode::Paused) => {
                let previous =
                    self.scan(self.state.current_page_index, Direction::Backward, eligibility);
                self.move_to(previous, events);
                self.state.elapsed_in_page = Duration::ZERO;
                true
            }
            (Command::OpenSettings, Mode::Autoplay | Mode::Paused) => {
                self.state.settings_snapshot = Some(self.settings.current());
                self.state.resume_mode = mode;
                self.state.mode = Mode::SettingsOpen;
                false
            }
            (Command::CommitSettings(update), Mode::SettingsOpen) => {
                match self.settings.apply(&update) {
                    Ok(settings) => {
                        tracing::info!("Settings committed");
                        self.state.settings_snapshot = None;
                        self.state.mode = self.state.resume_mode;
                        events.push(SchedulerEvent::SettingsCommitted(settings));
                    }
                    Err(e) => {
                        tracing::warn!("Settings rejected: {}", e);
                        events.push(SchedulerEvent::SettingsRejected(e));
                    }
                }
                false
            }
            (Command::CancelSettings, Mode::SettingsOpen) => {
                if let Some(snapshot) = self.state.settings_snapshot.take() {
                    self.settings.restore(snapshot);
                }
                self.state.mode = self.state.resume_mode;
                false
            }
            (command, mode) => {
                tracing::debug!(command = command.name(), ?mode, "Command ignored in this mode");
                false
            }
        }
    }

    /// Next eligible page from `from` in `direction`, wrapping around. With
    /// no starting page the scan covers the whole catalog from one end.
    fn scan(
        &self,
        from: Option<usize>,
        direction: Direction,
        eligibility: &Eligibility,
    ) -> Option<usize> {
        let len = self.catalog.len();
        if len == 0 {
            return None;
        }

        let candidates = (0..len).map(|k| match (from, direction) {
            (Some(i), Direction::Forward) => (i + 1 + k) % len,
            (Some(i), Direction::Backward) => (i + len - 1 - k % len) % len,
            (None, Direction::Forward) => k,
            (None, Direction::Backward) => len - 1 - k,
        });

        for index in candidates {
            match eligibility.get(index) {
                Some(Ok(())) => return Some(index),
                Some(Err(reason)) if from.is_some() && from != Some(index) => {
                    self.report_skip(index, reason);
                }
                _ => {}
            }
        }
        None
    }

    fn report_skip(&self, index: usize, reason: &SkipReason) {
        if let Some(page) = self.catalog.get(index) {
            self.sink.emit(CoreEvent::PageSkipped {
                page: page.id.to_string(),
                reason: reason.to_string(),
            });
        }
    }

    /// Select `next`. Returns whether the selected page changed.
    fn move_to(&mut self, next: Option<usize>, events: &mut Vec<SchedulerEvent>) -> bool {
        let previous = self.state.current_page_index;
        if previous == next {
            return false;
        }

        let id = |index: Option<usize>| index.and_then(|i| self.catalog.get(i)).map(|p| p.id);
        let (from, to) = (id(previous), id(next));
        tracing::debug!(?from, ?to, "Page changed");

        self.state.current_page_index = next;
        self.state.elapsed_in_page = Duration::ZERO;
        events.push(SchedulerEvent::PageChanged { from, to });
        true
    }
}
