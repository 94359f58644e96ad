//! TUI screen definitions.
//!
//! Each screen corresponds to a tab in the TUI and encapsulates its
//! own state and rendering logic.

mod archive;
mod chat;

use std::fmt;

use crossterm::event::{KeyCode, KeyModifiers};
use ratatui::prelude::*;

use crate::app::AppContext;

/// Screen identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ScreenId {
    Chat,
    Archive,
}

impl fmt::Display for ScreenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Chat => write!(f, "Chat"),
            Self::Archive => write!(f, "Archive"),
        }
    }
}

/// Per-screen state and behaviour.
pub(crate) enum Screen {
    Chat(chat::ChatScreen),
    Archive(archive::ArchiveScreen),
}

impl Screen {
    pub(crate) fn new(id: ScreenId) -> Self {
        match id {
            ScreenId::Chat => Self::Chat(chat::ChatScreen::new()),
            ScreenId::Archive => Self::Archive(archive::ArchiveScreen::new()),
        }
    }

    /// Kick off any initial loading.
    pub(crate) fn activate(&mut self, ctx: &AppContext) {
        if let Self::Archive(screen) = self {
            screen.refresh(ctx);
        }
    }

    /// Whether the current screen has an active text input field.
    pub(crate) fn is_editing(&self) -> bool {
        match self {
            Self::Chat(screen) => screen.is_editing(),
            Self::Archive(_) => false,
        }
    }

    /// Pick up results from background tasks.
    pub(crate) fn tick(&mut self) {
        match self {
            Self::Chat(screen) => screen.tick(),
            Self::Archive(screen) => screen.tick(),
        }
    }

    /// Status line override while the screen has something to report.
    pub(crate) fn status(&self) -> Option<String> {
        match self {
            Self::Chat(screen) => screen.status(),
            Self::Archive(screen) => screen.status(),
        }
    }

    pub(crate) fn draw(&self, f: &mut Frame, area: Rect) {
        match self {
            Self::Chat(screen) => screen.draw(f, area),
            Self::Archive(screen) => screen.draw(f, area),
        }
    }

    pub(crate) fn handle_key(&mut self, code: KeyCode, modifiers: KeyModifiers, ctx: &AppContext) {
        match self {
            Self::Chat(screen) => screen.handle_key(code, modifiers, ctx),
            Self::Archive(screen) => screen.handle_key(code, modifiers, ctx),
        }
    }
}
