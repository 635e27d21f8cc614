//! Command messages exchanged between the settings side and the page
//!
//! Wire shape matches the extension messages:
//!
//! ```json
//! {"type":"APPLY_NAMES","names":{"12345":"CS 101"}}
//! {"items":[{"id":"12345","originalLabel":"Intro","savedName":"CS 101"}]}
//! {"ok":true}
//! ```

use crate::theme::PaletteInput;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Command {
    /// Snapshot of the targets currently on the page
    GetItems,
    /// Replace the override map and resynchronize
    ApplyNames { names: BTreeMap<String, String> },
    /// Toggle page recolor and per-item accents
    SetDarkMode { enabled: bool },
    /// Rebuild the page recolor from a new palette
    ApplyTheme { colors: PaletteInput },
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::GetItems => "GET_ITEMS",
            Command::ApplyNames { .. } => "APPLY_NAMES",
            Command::SetDarkMode { .. } => "SET_DARK_MODE",
            Command::ApplyTheme { .. } => "APPLY_THEME",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemSummary {
    pub id: String,
    pub original_label: String,
    /// Current override, empty when none
    pub saved_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Response {
    Items {
        items: Vec<ItemSummary>,
    },
    Ack {
        ok: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
}

impl Response {
    pub fn ok() -> Self {
        Response::Ack { ok: true, error: None }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Response::Ack {
            ok: false,
            error: Some(message.into()),
        }
    }

    pub fn is_ok(&self) -> bool {
        match self {
            Response::Items { .. } => true,
            Response::Ack { ok, .. } => *ok,
        }
    }
}

/// Transport that carries a command into the page context
pub trait CommandChannel {
    fn deliver(&mut self, command: Command) -> Result<Response>;
}

impl<C: CommandChannel + ?Sized> CommandChannel for &mut C {
    fn deliver(&mut self, command: Command) -> Result<Response> {
        (**self).deliver(command)
    }
}

/// A channel with no page behind it; every delivery is unreachable
#[derive(Debug, Clone, Copy, Default)]
pub struct Disconnected;

impl CommandChannel for Disconnected {
    fn deliver(&mut self, command: Command) -> Result<Response> {
        Err(Error::Unreachable(format!("no page to receive {}", command.name())))
    }
}
