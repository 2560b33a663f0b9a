//! Renderer boundary.
//!
//! A renderer is a pure consumer of [`Frame`]s; nothing it receives can be
//! used to mutate scheduler or cache state.

use std::sync::Arc;

use thiserror::Error;
use wxstar_core::Settings;
use wxstar_weather::{CacheEntry, TrendReport};

use crate::page::PageDescriptor;
use crate::scheduler::Mode;

/// Everything needed to draw one frame.
#[derive(Debug, Clone)]
pub struct Frame<'a> {
    /// `None` while no page is eligible; draw a loading screen.
    pub page: Option<&'a PageDescriptor>,
    pub entry: Option<&'a CacheEntry>,
    pub settings: Arc<Settings>,
    /// Present only when trends are enabled.
    pub trends: Option<&'a TrendReport>,
    pub mode: Mode,
}

impl Frame<'_> {
    pub fn is_loading(&self) -> bool {
        self.page.is_none()
    }
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Render backend failed: {0}")]
    Backend(String),
}

pub trait Renderer {
    fn render(&mut self, frame: &Frame<'_>) -> Result<(), RenderError>;
}
