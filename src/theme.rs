//! Theming: page-wide dark palette and per-item gradient accents
//!
//! Both halves inject style the same way the host does: the palette goes in
//! as one singleton `<style>` element that is rewritten wholesale, and the
//! per-item accent is a custom property on the item's host element, picked
//! up inside its shadow root by a single shared adopted stylesheet.

use crate::dom::{Document, NodeId, StyleSheet};
use crate::locator::LocatedItem;
use crate::{EngineConfig, Error, Result};
use serde::{Deserialize, Serialize};
use std::cell::OnceCell;
use std::fmt;
use std::sync::Arc;

/// Gradient variants handed out by [`assign_variant`]
pub const GRADIENT_VARIANTS: [&str; 8] = [
    "linear-gradient(135deg, #667eea 0%, #764ba2 100%)",
    "linear-gradient(135deg, #f093fb 0%, #f5576c 100%)",
    "linear-gradient(135deg, #4facfe 0%, #00f2fe 100%)",
    "linear-gradient(135deg, #43e97b 0%, #38f9d7 100%)",
    "linear-gradient(135deg, #fa709a 0%, #fee140 100%)",
    "linear-gradient(135deg, #30cfd0 0%, #330867 100%)",
    "linear-gradient(135deg, #a8edea 0%, #fed6e3 100%)",
    "linear-gradient(135deg, #ff9a9e 0%, #fecfef 100%)",
];

/// Variant index for a numeric id: `id mod GRADIENT_VARIANTS.len()`.
///
/// Computed digit by digit, so ids longer than any integer type still map
/// deterministically. Non-numeric ids have no variant.
pub fn assign_variant(id: &str) -> Option<usize> {
    if id.is_empty() || !id.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let n = GRADIENT_VARIANTS.len();
    Some(id.bytes().fold(0usize, |acc, b| (acc * 10 + usize::from(b - b'0')) % n))
}

/// A color normalized to `#rrggbb`, lowercase
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct HexColor(String);

impl HexColor {
    /// Accepts six hex digits with or without a leading `#`
    pub fn parse(input: &str) -> Option<Self> {
        let trimmed = input.trim();
        let digits = trimmed.strip_prefix('#').unwrap_or(trimmed);
        if digits.len() != 6 || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        Some(Self(format!("#{}", digits.to_ascii_lowercase())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HexColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Palette as submitted, before validation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaletteInput {
    pub background: String,
    pub surface: String,
    pub border: String,
    pub accent: String,
}

/// The four semantic color slots
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    Background,
    Surface,
    Border,
    Accent,
}

/// A fully validated palette. There is no way to build one with a bad slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "PaletteInput", into = "PaletteInput")]
pub struct ThemePalette {
    background: HexColor,
    surface: HexColor,
    border: HexColor,
    accent: HexColor,
}

impl ThemePalette {
    /// Validate every slot; one bad color rejects the whole palette
    pub fn validate(input: &PaletteInput) -> Result<Self> {
        let slot = |name: &str, value: &str| {
            HexColor::parse(value).ok_or_else(|| Error::InvalidColor {
                slot: name.to_string(),
                value: value.to_string(),
            })
        };
        Ok(Self {
            background: slot("background", &input.background)?,
            surface: slot("surface", &input.surface)?,
            border: slot("border", &input.border)?,
            accent: slot("accent", &input.accent)?,
        })
    }

    pub fn get(&self, slot: Slot) -> &HexColor {
        match slot {
            Slot::Background => &self.background,
            Slot::Surface => &self.surface,
            Slot::Border => &self.border,
            Slot::Accent => &self.accent,
        }
    }

    pub fn to_input(&self) -> PaletteInput {
        PaletteInput {
            background: self.background.to_string(),
            surface: self.surface.to_string(),
            border: self.border.to_string(),
            accent: self.accent.to_string(),
        }
    }
}

impl Default for ThemePalette {
    fn default() -> Self {
        Self {
            background: HexColor("#121417".to_string()),
            surface: HexColor("#1e2228".to_string()),
            border: HexColor("#3a3f47".to_string()),
            accent: HexColor("#4d9de0".to_string()),
        }
    }
}

impl TryFrom<PaletteInput> for ThemePalette {
    type Error = Error;

    fn try_from(input: PaletteInput) -> Result<Self> {
        Self::validate(&input)
    }
}

impl From<ThemePalette> for PaletteInput {
    fn from(palette: ThemePalette) -> Self {
        palette.to_input()
    }
}

/// Host design tokens and the slot each one is recolored with
pub const HOST_TOKENS: &[(&str, Slot)] = &[
    ("--d2l-color-regolith", Slot::Background),
    ("--d2l-color-sylvite", Slot::Background),
    ("--d2l-color-white", Slot::Surface),
    ("--d2l-color-gypsum", Slot::Surface),
    ("--d2l-color-mica", Slot::Border),
    ("--d2l-color-corundum", Slot::Border),
    ("--d2l-color-chromite", Slot::Border),
    ("--d2l-color-celestine", Slot::Accent),
    ("--d2l-color-celestine-minus-1", Slot::Accent),
    ("--d2l-color-celestine-plus-1", Slot::Accent),
];

/// Style rules for the page-wide recolor
pub fn page_stylesheet(palette: &ThemePalette) -> String {
    let mut css = String::from(":root, html, body {\n");
    for (token, slot) in HOST_TOKENS {
        css.push_str(&format!("  {}: {} !important;\n", token, palette.get(*slot)));
    }
    css.push_str("}\n");
    css.push_str(&format!(
        "html, body {{ background-color: {} !important; }}\n",
        palette.background
    ));
    css.push_str(&format!(
        "a, a:visited, h1, h2, h3, h4, h5, h6 {{ color: {} !important; }}\n",
        palette.accent
    ));
    css
}

/// Rules of the shared per-item sheet; reads the gradient from `property`
pub fn enhancement_stylesheet(property: &str) -> String {
    format!(
        ":host {{ border-radius: 8px; overflow: hidden; }}\n\
         .d2l-card-container {{ background-image: var({prop}, none); border-color: transparent; }}\n\
         .d2l-card-header {{ background-image: var({prop}, none); }}\n",
        prop = property
    )
}

pub struct ThemeEngine {
    style_element_id: String,
    gradient_property: String,
    shared_sheet: OnceCell<Arc<StyleSheet>>,
}

impl ThemeEngine {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            style_element_id: config.style_element_id.clone(),
            gradient_property: config.gradient_property.clone(),
            shared_sheet: OnceCell::new(),
        }
    }

    /// The single per-item sheet, built on first use
    pub fn shared_sheet(&self) -> &Arc<StyleSheet> {
        self.shared_sheet
            .get_or_init(|| Arc::new(StyleSheet::new(enhancement_stylesheet(&self.gradient_property))))
    }

    pub fn has_shared_sheet(&self) -> bool {
        self.shared_sheet.get().is_some()
    }

    pub fn style_element(&self, doc: &Document) -> Option<NodeId> {
        doc.get_element_by_id(&self.style_element_id)
    }

    /// Create or rewrite the singleton theme `<style>` element. Unchanged
    /// CSS is left alone.
    pub fn apply_page_theme(&self, doc: &mut Document, palette: &ThemePalette) -> NodeId {
        let css = page_stylesheet(palette);
        let style = match self.style_element(doc) {
            Some(existing) if doc.text_content(existing) == css => return existing,
            Some(existing) => existing,
            None => {
                let style = doc.create_element("style");
                doc.set_attribute(style, "id", &self.style_element_id);
                let root = doc.root();
                let parent = doc
                    .first_by_tag(root, "head")
                    .or_else(|| doc.first_by_tag(root, "html"))
                    .unwrap_or(root);
                doc.append_child(parent, style);
                style
            }
        };
        doc.set_text_content(style, &css);
        style
    }

    /// Remove the theme `<style>` element; false if there was none
    pub fn remove_page_theme(&self, doc: &mut Document) -> bool {
        let Some(style) = self.style_element(doc) else {
            return false;
        };
        match doc.parent(style) {
            Some(parent) => doc.remove_child(parent, style),
            None => false,
        }
    }

    /// Give `item` its gradient and register the shared sheet in its scope.
    /// Returns writes made.
    pub fn enhance(&self, doc: &mut Document, item: &LocatedItem) -> usize {
        let Some(variant) = assign_variant(&item.id) else {
            return 0;
        };
        let gradient = GRADIENT_VARIANTS[variant];
        let mut writes = 0;
        if doc.style_property(item.target, &self.gradient_property) != Some(gradient) {
            doc.set_style_property(item.target, &self.gradient_property, gradient);
            writes += 1;
        }
        if let Some(root) = doc.open_shadow_root(item.target) {
            let sheet = self.shared_sheet();
            let registered = doc
                .adopted_stylesheets(root)
                .iter()
                .any(|s| Arc::ptr_eq(s, sheet));
            if !registered && doc.adopt_stylesheet(root, sheet) {
                writes += 1;
            }
        }
        writes
    }

    /// Undo [`ThemeEngine::enhance`]; returns writes made
    pub fn clear_enhancement(&self, doc: &mut Document, item: &LocatedItem) -> usize {
        let mut writes = 0;
        if doc.remove_style_property(item.target, &self.gradient_property) {
            writes += 1;
        }
        if let (Some(sheet), Some(root)) = (self.shared_sheet.get(), doc.open_shadow_root(item.target)) {
            if doc.drop_adopted_stylesheet(root, sheet) {
                writes += 1;
            }
        }
        writes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::ShadowMode;

    fn input(bg: &str, surface: &str, border: &str, accent: &str) -> PaletteInput {
        PaletteInput {
            background: bg.into(),
            surface: surface.into(),
            border: border.into(),
            accent: accent.into(),
        }
    }

    #[test]
    fn hex_colors_normalize() {
        assert_eq!(HexColor::parse("4D9DE0").unwrap().as_str(), "#4d9de0");
        assert_eq!(HexColor::parse("#4d9de0").unwrap().as_str(), "#4d9de0");
        assert_eq!(HexColor::parse(" #ABCDEF ").unwrap().as_str(), "#abcdef");
        for bad in ["", "#", "fff", "#12345", "1234567", "##123456", "zzzzzz", "#12 456"] {
            assert!(HexColor::parse(bad).is_none(), "{:?}", bad);
        }
    }

    #[test]
    fn palette_is_all_or_nothing() {
        let ok = ThemePalette::validate(&input("111111", "#222222", "333333", "4d9de0")).unwrap();
        assert_eq!(ok.get(Slot::Accent).as_str(), "#4d9de0");

        let err = ThemePalette::validate(&input("111111", "#222222", "nope", "4d9de0")).unwrap_err();
        match err {
            Error::InvalidColor { slot, .. } => assert_eq!(slot, "border"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn palette_deserialization_validates() {
        let p: ThemePalette =
            serde_json::from_str(r#"{"background":"000000","surface":"111111","border":"222222","accent":"ABCDEF"}"#)
                .unwrap();
        assert_eq!(p.get(Slot::Accent).as_str(), "#abcdef");
        assert!(serde_json::from_str::<ThemePalette>(r#"{"background":"000000"}"#).is_err());
        let back = serde_json::to_value(&p).unwrap();
        assert_eq!(back["background"], "#000000");
    }

    #[test]
    fn variants_are_id_mod_palette_size() {
        assert_eq!(assign_variant("12345"), Some(12345 % GRADIENT_VARIANTS.len()));
        assert_eq!(assign_variant("8"), Some(0));
        assert_eq!(assign_variant("12345"), assign_variant("12345"));
        let long = "98765432109876543210987654321";
        assert_eq!(assign_variant(long), Some(1));
        assert_eq!(assign_variant("12a"), None);
    }

    #[test]
    fn stylesheet_maps_every_token() {
        let css = page_stylesheet(&ThemePalette::default());
        for (token, _) in HOST_TOKENS {
            assert!(css.contains(token));
        }
        assert!(css.contains("background-color: #121417"));
    }

    #[test]
    fn theme_element_is_a_singleton() {
        let mut doc = Document::parse_html("<html><head></head><body></body></html>");
        let engine = ThemeEngine::new(&EngineConfig::default());
        let first = engine.apply_page_theme(&mut doc, &ThemePalette::default());
        let palette = ThemePalette::validate(&input("000000", "111111", "222222", "333333")).unwrap();
        let second = engine.apply_page_theme(&mut doc, &palette);
        assert_eq!(first, second);
        assert!(doc.text_content(second).contains("#333333"));
        assert!(engine.remove_page_theme(&mut doc));
        assert!(engine.style_element(&doc).is_none());
        assert!(!engine.remove_page_theme(&mut doc));
    }

    #[test]
    fn enhancement_registers_shared_sheet_once() {
        let mut doc = Document::new();
        let target = doc.create_element("d2l-card");
        doc.append_child(doc.root(), target);
        let card_root = doc.attach_shadow(target, ShadowMode::Open);
        let item = LocatedItem {
            id: "12345".into(),
            original_label: "X".into(),
            target,
            label_host: target,
            label_scope: card_root,
        };
        let engine = ThemeEngine::new(&EngineConfig::default());
        assert!(!engine.has_shared_sheet());
        assert_eq!(engine.enhance(&mut doc, &item), 2);
        assert_eq!(engine.enhance(&mut doc, &item), 0);
        assert_eq!(doc.adopted_stylesheets(card_root).len(), 1);
        assert_eq!(
            doc.style_property(target, "--relabel-card-gradient"),
            Some(GRADIENT_VARIANTS[12345 % 8])
        );
        assert_eq!(engine.clear_enhancement(&mut doc, &item), 2);
        assert!(doc.adopted_stylesheets(card_root).is_empty());
    }

    #[test]
    fn reapplying_the_same_palette_writes_nothing() {
        let mut doc = Document::parse_html("<html><head></head><body></body></html>");
        let root = doc.root();
        doc.observe(root);
        let engine = ThemeEngine::new(&EngineConfig::default());
        let palette = ThemePalette::default();
        let style = engine.apply_page_theme(&mut doc, &palette);
        doc.take_mutation_records();
        let writes = doc.write_count();

        assert_eq!(engine.apply_page_theme(&mut doc, &palette), style);
        assert_eq!(doc.write_count(), writes);
        assert!(!doc.has_pending_records());

        let brighter = ThemePalette::validate(&input("000000", "111111", "222222", "ff8800")).unwrap();
        engine.apply_page_theme(&mut doc, &brighter);
        assert!(doc.text_content(style).contains("#ff8800"));
        assert!(doc.has_pending_records());
    }
}
