//! lms-relabel
//!
//! A live synchronization engine that renames course labels and re-themes a
//! learning-management page built from deeply nested web components, without
//! touching the host application's code.
//!
//! # Features
//!
//! - **Scoped traversal**: finds targets through any number of nested open
//!   shadow roots; closed roots are skipped silently
//! - **Write-once originals**: the first non-empty label read is kept in an
//!   out-of-band marker and survives every later pass
//! - **Loop-safe writes**: every write is guarded by an equality check, so a
//!   pass triggered by the engine's own writes changes nothing
//! - **Debounced observation**: bursts of host re-renders collapse into one
//!   trailing-edge pass
//! - **Theming**: a page-wide dark palette plus per-item gradient accents
//!
//! # Example
//!
//! ```
//! use lms_relabel::{Command, EngineConfig, Page, PersistedState};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let html = r#"<html><body>
//!   <d2l-card href="/d2l/home/12345">
//!     <d2l-organization-name><template shadowrootmode="open">Intro to Biology</template></d2l-organization-name>
//!   </d2l-card>
//! </body></html>"#;
//!
//! let mut page = Page::from_html(html, EngineConfig::default(), PersistedState::default())?;
//! let mut names = std::collections::BTreeMap::new();
//! names.insert("12345".to_string(), "BIO 101".to_string());
//! page.dispatch(Command::ApplyNames { names });
//! page.run_until_idle();
//! assert!(page.document().to_html(page.document().root()).contains("BIO 101"));
//! # Ok(())
//! # }
//! ```

use serde::Deserialize;

pub mod error;
pub use error::{Error, Result};

pub mod dom;
pub mod selector;
pub mod scope;
pub mod locator;
pub mod sync;
pub mod watcher;
pub mod theme;
pub mod protocol;
pub mod store;
pub mod engine;
pub mod page;
pub mod controller;

// Worker-thread page handle with an async command interface
pub mod async_api;

pub use async_api::PageWorker;
pub use controller::{Delivery, SettingsController};
pub use dom::{Document, NodeId, ShadowMode};
pub use engine::{Engine, EngineState, PassReport};
pub use locator::{ElementLocator, LocatedItem};
pub use page::{Page, PageStats};
pub use protocol::{Command, CommandChannel, Disconnected, ItemSummary, Response};
pub use store::{JsonFileStore, MemoryStore, PersistedState, StateStore};
pub use sync::{ContentSynchronizer, NameOverrideMap, SyncReport};
pub use theme::{HexColor, PaletteInput, ThemeEngine, ThemePalette};
pub use watcher::{ChangeWatcher, Debouncer, ObservedScopeSet};

/// Configuration for the relabel engine
///
/// The defaults describe the Brightspace course widgets: a `d2l-card` whose
/// `href` carries the org unit id, with the visible name rendered inside a
/// nested `d2l-organization-name` component.
///
/// Every field has a default, so a partial JSON file is a valid config.
///
/// # Examples
///
/// ```
/// let cfg = lms_relabel::EngineConfig::default();
/// assert_eq!(cfg.debounce_ms, 150);
/// assert_eq!(cfg.target_selector, "d2l-card");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Selector for elements that carry an identifier
    pub target_selector: String,
    /// Attribute holding the path with the numeric identifier
    pub id_attribute: String,
    /// Pattern applied to `id_attribute`; capture group 1 is the identifier
    pub id_pattern: String,
    /// Selector for the companion element that renders the visible label
    pub label_selector: String,
    /// Host-level attribute mirrored for assistive technology
    pub aria_attribute: String,
    /// Trailing-edge debounce applied to structural change notifications
    pub debounce_ms: u64,
    /// `id` of the injected page-wide theme `<style>` element
    pub style_element_id: String,
    /// Custom property carrying each item's gradient into its render scope
    pub gradient_property: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            target_selector: "d2l-card".to_string(),
            id_attribute: "href".to_string(),
            id_pattern: r"/d2l/home/(\d+)".to_string(),
            label_selector: "d2l-organization-name".to_string(),
            aria_attribute: "text".to_string(),
            debounce_ms: 150,
            style_element_id: "relabel-theme".to_string(),
            gradient_property: "--relabel-card-gradient".to_string(),
        }
    }
}

impl EngineConfig {
    /// Read a (possibly partial) JSON config
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
