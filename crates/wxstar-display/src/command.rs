//! Commands accepted by the scheduler, and what a tick reports back.

use wxstar_core::{Settings, SettingsUpdate, ValidationError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Pause,
    Resume,
    /// Pause when playing, resume when paused.
    TogglePause,
    NavigateNext,
    NavigatePrevious,
    OpenSettings,
    CommitSettings(SettingsUpdate),
    CancelSettings,
    ForceRefresh,
    Exit,
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::Pause => "pause",
            Command::Resume => "resume",
            Command::TogglePause => "toggle_pause",
            Command::NavigateNext => "navigate_next",
            Command::NavigatePrevious => "navigate_previous",
            Command::OpenSettings => "open_settings",
            Command::CommitSettings(_) => "commit_settings",
            Command::CancelSettings => "cancel_settings",
            Command::ForceRefresh => "force_refresh",
            Command::Exit => "exit",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SchedulerEvent {
    PageChanged {
        from: Option<&'static str>,
        to: Option<&'static str>,
    },
    RefreshRequested,
    /// Edits were accepted; they become visible on the next tick.
    SettingsCommitted(Settings),
    SettingsRejected(ValidationError),
    Exit,
}
