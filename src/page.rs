//! Single-threaded page event loop
//!
//! A [`Page`] owns the document, the engine, and a virtual millisecond
//! clock. It plays the role of the browser event loop: mutation records are
//! delivered between tasks, and the debounce timer fires when the clock
//! reaches its deadline. Nothing here runs concurrently, so passes never
//! interleave.

use crate::dom::Document;
use crate::engine::{Engine, PassReport};
use crate::protocol::{Command, CommandChannel, Response};
use crate::store::PersistedState;
use crate::{EngineConfig, Result};

// Upper bound on timer firings in one `run_until_idle`. Equality-guarded
// writes settle after one echo pass; hitting this means they did not.
const MAX_IDLE_PASSES: usize = 1_000;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageStats {
    /// Passes of any origin: start, commands, debounced
    pub sync_passes: u64,
    /// Passes fired by the debounce timer
    pub debounced_passes: u64,
    pub records_delivered: u64,
    pub last_pass: Option<PassReport>,
}

pub struct Page {
    document: Document,
    engine: Engine,
    now_ms: u64,
    stats: PageStats,
}

impl Page {
    /// Start the engine on an existing document
    pub fn new(mut document: Document, config: EngineConfig, persisted: PersistedState) -> Result<Self> {
        let mut engine = Engine::new(&config, persisted)?;
        let report = engine.start(&mut document);
        Ok(Self {
            document,
            engine,
            now_ms: 0,
            stats: PageStats {
                sync_passes: 1,
                last_pass: Some(report),
                ..Default::default()
            },
        })
    }

    pub fn from_html(html: &str, config: EngineConfig, persisted: PersistedState) -> Result<Self> {
        Self::new(Document::parse_html(html), config, persisted)
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Host-side access: edits made here are observed like host re-renders
    pub fn document_mut(&mut self) -> &mut Document {
        &mut self.document
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn now(&self) -> u64 {
        self.now_ms
    }

    pub fn stats(&self) -> &PageStats {
        &self.stats
    }

    pub fn next_deadline(&self) -> Option<u64> {
        self.engine.next_deadline()
    }

    /// Handle one command as a task, then deliver the records it produced
    pub fn dispatch(&mut self, command: Command) -> Response {
        let counts_as_pass = !matches!(command, Command::GetItems | Command::ApplyTheme { .. });
        let before = self.document.write_count();
        let response = self.engine.handle_command(&mut self.document, command);
        if counts_as_pass {
            self.stats.sync_passes += 1;
        }
        log::debug!(
            "command handled with {} write(s)",
            self.document.write_count() - before
        );
        self.deliver_records();
        response
    }

    fn deliver_records(&mut self) {
        let records = self.document.take_mutation_records();
        if records.is_empty() {
            return;
        }
        self.stats.records_delivered += records.len() as u64;
        self.engine.on_mutations(&mut self.document, &records, self.now_ms);
    }

    fn fire_timer(&mut self) {
        if let Some(report) = self.engine.poll(&mut self.document, self.now_ms) {
            self.stats.sync_passes += 1;
            self.stats.debounced_passes += 1;
            self.stats.last_pass = Some(report);
        }
    }

    /// Deliver pending records without moving the clock
    pub fn flush(&mut self) {
        self.deliver_records();
    }

    /// Move the clock forward by `ms`, firing every timer that falls due
    pub fn advance(&mut self, ms: u64) {
        let target = self.now_ms + ms;
        loop {
            self.deliver_records();
            match self.engine.next_deadline() {
                Some(deadline) if deadline <= target => {
                    self.now_ms = self.now_ms.max(deadline);
                    self.fire_timer();
                }
                _ => break,
            }
        }
        self.now_ms = target;
        self.deliver_records();
    }

    /// Run until no records are pending and no timer is armed.
    /// Returns the number of debounced passes that ran.
    pub fn run_until_idle(&mut self) -> usize {
        let mut passes = 0;
        loop {
            self.deliver_records();
            let Some(deadline) = self.engine.next_deadline() else {
                break;
            };
            if passes >= MAX_IDLE_PASSES {
                log::warn!("page did not settle after {} passes", passes);
                break;
            }
            self.now_ms = self.now_ms.max(deadline);
            self.fire_timer();
            passes += 1;
        }
        passes
    }
}

impl CommandChannel for Page {
    fn deliver(&mut self, command: Command) -> Result<Response> {
        Ok(self.dispatch(command))
    }
}
