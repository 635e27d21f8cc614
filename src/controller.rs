//! Settings-side operations
//!
//! The settings surface persists first and broadcasts second. Storage is the
//! source of truth: if the page cannot be reached, the saved state is picked
//! up the next time the engine starts.

use crate::protocol::{Command, CommandChannel, ItemSummary, Response};
use crate::store::{is_name_key, PersistedState, StateStore, DARK_MODE_KEY, THEME_KEY};
use crate::theme::{PaletteInput, ThemePalette};
use crate::{Error, Result};
use serde_json::Value;
use std::collections::BTreeMap;

/// What happened to a broadcast after the state was saved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// The page applied the change
    Applied,
    /// No page was reachable; it will apply on next start
    Deferred,
}

pub struct SettingsController<S, C> {
    store: S,
    channel: C,
}

impl<S: StateStore, C: CommandChannel> SettingsController<S, C> {
    pub fn new(store: S, channel: C) -> Self {
        Self { store, channel }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn channel_mut(&mut self) -> &mut C {
        &mut self.channel
    }

    pub fn into_parts(self) -> (S, C) {
        (self.store, self.channel)
    }

    /// Ask the page for its current targets
    pub fn fetch_items(&mut self) -> Result<Vec<ItemSummary>> {
        match self.channel.deliver(Command::GetItems)? {
            Response::Items { items } => Ok(items),
            Response::Ack { error, .. } => Err(Error::Protocol(
                error.unwrap_or_else(|| "page answered GET_ITEMS without items".to_string()),
            )),
        }
    }

    /// Save edited names (empty means revert) and push the full map
    pub fn save_names(&mut self, names: &BTreeMap<String, String>) -> Result<Delivery> {
        for (id, name) in names {
            if !is_name_key(id) {
                log::warn!("skipping non-numeric id {:?}", id);
                continue;
            }
            let name = name.trim();
            if name.is_empty() {
                self.store.remove(id)?;
            } else {
                self.store.set(id, Value::String(name.to_string()))?;
            }
        }
        self.broadcast_names()
    }

    /// Drop every saved name
    pub fn reset_names(&mut self) -> Result<Delivery> {
        let keys: Vec<String> = self
            .store
            .entries()?
            .keys()
            .filter(|k| is_name_key(k))
            .cloned()
            .collect();
        for key in keys {
            self.store.remove(&key)?;
        }
        self.broadcast_names()
    }

    fn broadcast_names(&mut self) -> Result<Delivery> {
        let state = PersistedState::load(&self.store)?;
        self.broadcast(Command::ApplyNames {
            names: state.names.into_inner(),
        })
    }

    /// Validate, save, and push a palette. An invalid color rejects the
    /// whole palette before anything is stored or sent.
    pub fn save_palette(&mut self, input: &PaletteInput) -> Result<Delivery> {
        let palette = ThemePalette::validate(input)?;
        self.store.set(THEME_KEY, serde_json::to_value(&palette)?)?;
        self.broadcast(Command::ApplyTheme {
            colors: palette.to_input(),
        })
    }

    pub fn set_dark_mode(&mut self, enabled: bool) -> Result<Delivery> {
        self.store.set(DARK_MODE_KEY, Value::Bool(enabled))?;
        self.broadcast(Command::SetDarkMode { enabled })
    }

    fn broadcast(&mut self, command: Command) -> Result<Delivery> {
        let name = command.name();
        match self.channel.deliver(command) {
            Ok(Response::Ack { ok: false, error }) => Err(Error::Protocol(
                error.unwrap_or_else(|| format!("page rejected {}", name)),
            )),
            Ok(_) => Ok(Delivery::Applied),
            Err(e) if e.is_soft() => {
                log::warn!("{} not delivered, will apply on next load: {}", name, e);
                Ok(Delivery::Deferred)
            }
            Err(e) => Err(e),
        }
    }
}
