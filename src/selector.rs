//! Element predicates
//!
//! The engine finds targets by structural heuristics only. `SimpleSelector`
//! covers the compound selectors those heuristics need; anything that wants
//! more can pass a closure, which implements [`ElementPredicate`] too.

use crate::dom::Element;
use crate::{Error, Result};
use std::str::FromStr;

/// Anything that can decide whether an element matches
pub trait ElementPredicate {
    fn matches(&self, element: &Element) -> bool;
}

impl<F> ElementPredicate for F
where
    F: Fn(&Element) -> bool,
{
    fn matches(&self, element: &Element) -> bool {
        self(element)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AttrOp {
    Exists,
    Equals,
    Prefix,
    Contains,
    Suffix,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct AttrTest {
    name: String,
    op: AttrOp,
    value: String,
}

impl AttrTest {
    fn matches(&self, element: &Element) -> bool {
        let Some(actual) = element.attr(&self.name) else {
            return false;
        };
        match self.op {
            AttrOp::Exists => true,
            AttrOp::Equals => actual == self.value,
            AttrOp::Prefix => actual.starts_with(&self.value),
            AttrOp::Contains => actual.contains(&self.value),
            AttrOp::Suffix => actual.ends_with(&self.value),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Compound {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attrs: Vec<AttrTest>,
}

impl Compound {
    fn matches(&self, element: &Element) -> bool {
        if let Some(tag) = &self.tag {
            if element.tag() != tag {
                return false;
            }
        }
        if let Some(id) = &self.id {
            if element.id() != Some(id.as_str()) {
                return false;
            }
        }
        self.classes.iter().all(|c| element.has_class(c))
            && self.attrs.iter().all(|a| a.matches(element))
    }
}

/// A comma-separated list of compound selectors, e.g.
/// `d2l-card[href*="/home/"], .course-card`.
///
/// Combinators (descendant, child, sibling) are not supported; scope
/// crossing is the walker's job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimpleSelector {
    source: String,
    alternatives: Vec<Compound>,
}

impl SimpleSelector {
    pub fn parse(input: &str) -> Result<Self> {
        let mut alternatives = Vec::new();
        for part in split_top_level(input) {
            alternatives.push(parse_compound(part.trim(), input)?);
        }
        if alternatives.is_empty() {
            return Err(Error::Selector(format!("empty selector {:?}", input)));
        }
        Ok(Self {
            source: input.trim().to_string(),
            alternatives,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl FromStr for SimpleSelector {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl ElementPredicate for SimpleSelector {
    fn matches(&self, element: &Element) -> bool {
        self.alternatives.iter().any(|c| c.matches(element))
    }
}

// Split on commas that are not inside an attribute test.
fn split_top_level(input: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, ch) in input.char_indices() {
        match ch {
            '[' => depth += 1,
            ']' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(&input[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&input[start..]);
    parts
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

fn read_ident(chars: &[char], pos: &mut usize) -> String {
    let start = *pos;
    while *pos < chars.len() && is_ident_char(chars[*pos]) {
        *pos += 1;
    }
    chars[start..*pos].iter().collect()
}

fn parse_compound(part: &str, whole: &str) -> Result<Compound> {
    let bad = |why: &str| Error::Selector(format!("{} in {:?}", why, whole));
    if part.is_empty() {
        return Err(bad("empty compound"));
    }
    let chars: Vec<char> = part.chars().collect();
    let mut pos = 0;
    let mut compound = Compound::default();

    if chars[0] == '*' {
        pos = 1;
    } else if is_ident_char(chars[0]) {
        compound.tag = Some(read_ident(&chars, &mut pos).to_ascii_lowercase());
    }

    while pos < chars.len() {
        match chars[pos] {
            '#' => {
                pos += 1;
                let id = read_ident(&chars, &mut pos);
                if id.is_empty() {
                    return Err(bad("empty id"));
                }
                compound.id = Some(id);
            }
            '.' => {
                pos += 1;
                let class = read_ident(&chars, &mut pos);
                if class.is_empty() {
                    return Err(bad("empty class"));
                }
                compound.classes.push(class);
            }
            '[' => {
                pos += 1;
                compound.attrs.push(parse_attr(&chars, &mut pos).map_err(|why| bad(why))?);
            }
            c if c.is_whitespace() || c == '>' || c == '+' || c == '~' => {
                return Err(bad("combinators are not supported"));
            }
            c => return Err(bad(&format!("unexpected {:?}", c))),
        }
    }
    Ok(compound)
}

fn parse_attr(chars: &[char], pos: &mut usize) -> std::result::Result<AttrTest, &'static str> {
    let name = read_ident(chars, pos);
    if name.is_empty() {
        return Err("empty attribute name");
    }
    let op = match chars.get(*pos) {
        Some(']') => {
            *pos += 1;
            return Ok(AttrTest {
                name,
                op: AttrOp::Exists,
                value: String::new(),
            });
        }
        Some('=') => {
            *pos += 1;
            AttrOp::Equals
        }
        Some(c @ ('^' | '*' | '$')) if chars.get(*pos + 1) == Some(&'=') => {
            *pos += 2;
            match c {
                '^' => AttrOp::Prefix,
                '*' => AttrOp::Contains,
                _ => AttrOp::Suffix,
            }
        }
        _ => return Err("bad attribute operator"),
    };

    let value: String = match chars.get(*pos) {
        Some(q @ ('"' | '\'')) => {
            let quote = *q;
            *pos += 1;
            let start = *pos;
            while *pos < chars.len() && chars[*pos] != quote {
                *pos += 1;
            }
            if *pos >= chars.len() {
                return Err("unterminated attribute value");
            }
            let v = chars[start..*pos].iter().collect();
            *pos += 1;
            v
        }
        _ => read_ident(chars, pos),
    };

    if chars.get(*pos) != Some(&']') {
        return Err("unterminated attribute test");
    }
    *pos += 1;
    Ok(AttrTest { name, op, value })
}
