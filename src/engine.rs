//! The synchronization engine
//!
//! [`Engine`] ties the pieces together. All of its mutable state lives in one
//! [`EngineState`] value, and every operation takes the document explicitly,
//! so nothing is shared behind the caller's back.
//!
//! A pass is: walk every reachable scope, locate targets, write names, apply
//! or clear accents, and subscribe to any scope not yet observed. Passes are
//! cheap to repeat because every write is equality-guarded.

use crate::dom::{Document, MutationRecord};
use crate::locator::{ElementLocator, LocatedItem};
use crate::protocol::{Command, ItemSummary, Response};
use crate::store::PersistedState;
use crate::sync::{ContentSynchronizer, NameOverrideMap};
use crate::theme::{ThemeEngine, ThemePalette};
use crate::watcher::ChangeWatcher;
use crate::{EngineConfig, Result};
use log::{debug, info, warn};
use std::collections::HashSet;

/// Everything the engine remembers between passes
pub struct EngineState {
    pub overrides: NameOverrideMap,
    pub palette: ThemePalette,
    pub dark_mode: bool,
    pub watcher: ChangeWatcher,
}

/// Outcome of one synchronization pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassReport {
    pub items: usize,
    /// Name and attribute writes
    pub writes: usize,
    /// Accent writes (gradient property, sheet registration)
    pub theme_writes: usize,
    /// Scopes newly subscribed during the pass
    pub new_scopes: usize,
}

impl PassReport {
    pub fn total_writes(&self) -> usize {
        self.writes + self.theme_writes
    }
}

pub struct Engine {
    locator: ElementLocator,
    synchronizer: ContentSynchronizer,
    theme: ThemeEngine,
    state: EngineState,
}

impl Engine {
    pub fn new(config: &EngineConfig, persisted: PersistedState) -> Result<Self> {
        Ok(Self {
            locator: ElementLocator::new(config)?,
            synchronizer: ContentSynchronizer::new(config),
            theme: ThemeEngine::new(config),
            state: EngineState {
                overrides: persisted.names,
                palette: persisted.palette,
                dark_mode: persisted.dark_mode,
                watcher: ChangeWatcher::new(config.debounce_ms),
            },
        })
    }

    pub fn state(&self) -> &EngineState {
        &self.state
    }

    pub fn theme(&self) -> &ThemeEngine {
        &self.theme
    }

    pub fn locator(&self) -> &ElementLocator {
        &self.locator
    }

    /// Attach to the document, apply persisted theme, run the first pass
    pub fn start(&mut self, doc: &mut Document) -> PassReport {
        let root = doc.root();
        let scopes = self.state.watcher.watch(doc, root);
        info!("engine started, observing {} scope(s)", scopes);
        if self.state.dark_mode {
            self.theme.apply_page_theme(doc, &self.state.palette);
        }
        self.sync_pass(doc)
    }

    pub fn sync_pass(&mut self, doc: &mut Document) -> PassReport {
        let items = self.locator.locate(doc);
        let sync = self.synchronizer.synchronize(doc, &items, &self.state.overrides);

        let theme_writes = items
            .iter()
            .map(|item| {
                if self.state.dark_mode {
                    self.theme.enhance(doc, item)
                } else {
                    self.theme.clear_enhancement(doc, item)
                }
            })
            .sum();

        let root = doc.root();
        let new_scopes = self.state.watcher.watch(doc, root);

        let report = PassReport {
            items: sync.items,
            writes: sync.writes,
            theme_writes,
            new_scopes,
        };
        debug!("sync pass: {:?}", report);
        report
    }

    /// Feed delivered mutation records to the watcher
    pub fn on_mutations(&mut self, doc: &mut Document, records: &[MutationRecord], now: u64) {
        self.state.watcher.handle_records(doc, records, now);
    }

    /// When the next debounced pass is due, if one is pending
    pub fn next_deadline(&self) -> Option<u64> {
        self.state.watcher.next_deadline()
    }

    /// Run the debounced pass if it is due at `now`
    pub fn poll(&mut self, doc: &mut Document, now: u64) -> Option<PassReport> {
        if self.state.watcher.poll(now) {
            Some(self.sync_pass(doc))
        } else {
            None
        }
    }

    /// Current targets, one entry per id
    pub fn items(&self, doc: &mut Document) -> Vec<ItemSummary> {
        let mut seen = HashSet::new();
        self.locator
            .locate(doc)
            .into_iter()
            .filter(|item| seen.insert(item.id.clone()))
            .map(|item| self.summarize(&item))
            .collect()
    }

    fn summarize(&self, item: &LocatedItem) -> ItemSummary {
        ItemSummary {
            id: item.id.clone(),
            original_label: item.original_label.clone(),
            saved_name: self
                .state
                .overrides
                .get(&item.id)
                .unwrap_or_default()
                .to_string(),
        }
    }

    pub fn handle_command(&mut self, doc: &mut Document, command: Command) -> Response {
        debug!("handling {}", command.name());
        match command {
            Command::GetItems => Response::Items {
                items: self.items(doc),
            },
            Command::ApplyNames { names } => {
                self.state.overrides = names.into();
                self.sync_pass(doc);
                Response::ok()
            }
            Command::SetDarkMode { enabled } => {
                self.state.dark_mode = enabled;
                if enabled {
                    self.theme.apply_page_theme(doc, &self.state.palette);
                } else {
                    self.theme.remove_page_theme(doc);
                }
                self.sync_pass(doc);
                Response::ok()
            }
            Command::ApplyTheme { colors } => match ThemePalette::validate(&colors) {
                Ok(palette) => {
                    self.state.palette = palette;
                    if self.state.dark_mode {
                        self.theme.apply_page_theme(doc, &self.state.palette);
                    }
                    Response::ok()
                }
                Err(e) => {
                    warn!("rejected palette: {}", e);
                    Response::error(e.to_string())
                }
            },
        }
    }
}
