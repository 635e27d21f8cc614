//! Settings flow against a file-backed store: save while no page is open,
//! then pick the saved state up when the page loads

mod common;

use common::*;
use lms_relabel::store::{DARK_MODE_KEY, THEME_KEY};
use lms_relabel::{
    Delivery, Disconnected, EngineConfig, Error, JsonFileStore, Page, PaletteInput, PersistedState,
    SettingsController, StateStore,
};

fn palette(accent: &str) -> PaletteInput {
    PaletteInput {
        background: "0b0c0d".into(),
        surface: "16181b".into(),
        border: "2a2e33".into(),
        accent: accent.into(),
    }
}

#[test]
fn test_saved_state_applies_on_next_load() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("settings.json");

    let mut controller = SettingsController::new(JsonFileStore::new(&path), Disconnected);
    assert_eq!(
        controller.save_names(&names(&[("12345", "CS 101"), ("abc", "ignored")])).expect("names"),
        Delivery::Deferred
    );
    assert_eq!(controller.set_dark_mode(true).expect("dark"), Delivery::Deferred);
    assert_eq!(controller.save_palette(&palette("FF8800")).expect("palette"), Delivery::Deferred);

    let entries = JsonFileStore::new(&path).entries().expect("read back");
    assert_eq!(entries["12345"], "CS 101");
    assert!(!entries.contains_key("abc"));
    assert_eq!(entries[DARK_MODE_KEY], true);
    assert_eq!(entries[THEME_KEY]["accent"], "#ff8800");

    let state = PersistedState::load(&JsonFileStore::new(&path)).expect("load");
    let mut page = Page::from_html(
        &page_html(&card_html(12345, "Intro to Computing")),
        EngineConfig::default(),
        state,
    )
    .expect("page starts");
    page.run_until_idle();

    let doc = page.document();
    let card = card(doc, 12345);
    assert_eq!(label(doc, card), "CS 101");
    let style = page.engine().theme().style_element(doc).expect("theme injected at start");
    assert!(doc.text_content(style).contains("#ff8800"));
    assert!(doc.style_property(card, "--relabel-card-gradient").is_some());
}

#[test]
fn test_rejected_palette_leaves_store_untouched() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("settings.json");
    let mut controller = SettingsController::new(JsonFileStore::new(&path), Disconnected);
    controller.save_palette(&palette("4d9de0")).expect("first palette");

    let err = controller.save_palette(&palette("#4d9de")).unwrap_err();
    match err {
        Error::InvalidColor { slot, value } => {
            assert_eq!(slot, "accent");
            assert_eq!(value, "#4d9de");
        }
        other => panic!("unexpected {:?}", other),
    }
    let entries = JsonFileStore::new(&path).entries().expect("read back");
    assert_eq!(entries[THEME_KEY]["accent"], "#4d9de0");
}

#[test]
fn test_reset_names_reverts_every_card() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("settings.json");
    let mut page = Page::from_html(
        &page_html(&[card_html(1, "Art"), card_html(2, "Music")].concat()),
        EngineConfig::default(),
        PersistedState::default(),
    )
    .expect("page starts");

    let mut controller = SettingsController::new(JsonFileStore::new(&path), &mut page);
    controller
        .save_names(&names(&[("1", "ART 100"), ("2", "MUS 200")]))
        .expect("names");
    controller.set_dark_mode(false).expect("dark");
    assert_eq!(controller.reset_names().expect("reset"), Delivery::Applied);

    let entries = controller.store().entries().expect("read back");
    assert_eq!(entries.len(), 1);
    assert!(entries.contains_key(DARK_MODE_KEY));

    let doc = page.document();
    assert_eq!(label(doc, card(doc, 1)), "Art");
    assert_eq!(label(doc, card(doc, 2)), "Music");
}
