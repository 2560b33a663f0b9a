//! Page rotation for the WxStar display.
//!
//! The [`Scheduler`] owns page selection and the settings overlay. It reads
//! weather only through cache entries handed to [`Scheduler::tick`] and
//! never touches the network.

pub mod command;
pub mod page;
pub mod render;
pub mod scheduler;

pub use command::{Command, SchedulerEvent};
pub use page::{
    ModelField, PageCatalog, PageCategory, PageDescriptor, SettingsGate, SkipReason,
    HAZARDS_DWELL,
};
pub use render::{Frame, RenderError, Renderer};
pub use scheduler::{Mode, Scheduler, SchedulerState};
