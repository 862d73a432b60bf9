//! `background` shorthand <-> longhand conversion.
//!
//! The shorthand is tokenized with `cssparser` and each component value is
//! classified by what it can be (image, repeat, attachment, box, position or
//! color). Component text is kept verbatim so that a declaration which is
//! decomposed and merged again serializes the same components it started with.

use crate::declaration::Declaration;
use cssparser::{ParseError, Parser, ParserInput, Token};

/// Longhands folded back into `background`, in serialization order.
pub const MERGE_ORDER: [&str; 7] = [
    "background-color",
    "background-image",
    "background-position",
    "background-repeat",
    "background-attachment",
    "background-origin",
    "background-clip",
];

/// Outcome of [`decompose`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decomposition {
    /// No `background` property.
    NoShorthand,
    /// Comma-separated layers; the shorthand is left untouched.
    MultipleLayers,
    /// One layer that cannot be expanded (no image, `/ size`, `!important`); left untouched.
    Kept,
    /// The shorthand was replaced by its longhands.
    Expanded,
}

/// One comma-separated layer of a `background` value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackgroundLayer {
    pub color: Option<String>,
    pub image: Option<String>,
    pub position_x: Option<String>,
    pub position_y: Option<String>,
    pub repeat: Option<String>,
    pub attachment: Option<String>,
    pub origin: Option<String>,
    pub clip: Option<String>,
    pub size: Option<String>,
}

impl BackgroundLayer {
    /// Longhand properties defined by this layer, in merge order.
    pub fn longhands(&self) -> Vec<(&'static str, &str)> {
        [
            ("background-color", &self.color),
            ("background-image", &self.image),
            ("background-position-x", &self.position_x),
            ("background-position-y", &self.position_y),
            ("background-repeat", &self.repeat),
            ("background-attachment", &self.attachment),
            ("background-origin", &self.origin),
            ("background-clip", &self.clip),
        ]
        .into_iter()
        .filter_map(|(name, v)| v.as_deref().map(|v| (name, v)))
        .collect()
    }
}

#[derive(Default)]
struct LayerBuilder {
    layer: BackgroundLayer,
    positions: Vec<String>,
    sizes: Vec<String>,
    in_size: bool,
}

impl LayerBuilder {
    fn push(slot: &mut Option<String>, text: &str) {
        match slot {
            Some(existing) => {
                existing.push(' ');
                existing.push_str(text);
            }
            None => *slot = Some(text.to_owned()),
        }
    }

    fn position(&mut self, text: &str) {
        if self.in_size {
            self.sizes.push(text.to_owned());
        } else {
            self.positions.push(text.to_owned());
        }
    }

    fn boxed(&mut self, text: &str) {
        if self.layer.origin.is_none() {
            self.layer.origin = Some(text.to_owned());
        } else {
            Self::push(&mut self.layer.clip, text);
        }
    }

    fn finish(mut self) -> BackgroundLayer {
        let (x, y) = split_axes(&self.positions);
        self.layer.position_x = x;
        self.layer.position_y = y;
        if self.in_size {
            self.layer.size = Some(self.sizes.join(" "));
        }
        self.layer
    }
}

/// Splits position components into x and y; a lone x is reused for y.
fn split_axes(parts: &[String]) -> (Option<String>, Option<String>) {
    match parts {
        [] => (None, None),
        [x] => (Some(x.clone()), Some(x.clone())),
        [x, y] => (Some(x.clone()), Some(y.clone())),
        _ => {
            let mid = parts.len() / 2;
            (Some(parts[..mid].join(" ")), Some(parts[mid..].join(" ")))
        }
    }
}

fn is_position_keyword(ident: &str) -> bool {
    matches!(ident, "left" | "right" | "top" | "bottom" | "center")
}

fn is_repeat_keyword(ident: &str) -> bool {
    matches!(
        ident,
        "repeat" | "repeat-x" | "repeat-y" | "no-repeat" | "space" | "round"
    )
}

fn is_image_function(name: &str) -> bool {
    name == "url" || name == "image-set" || name.ends_with("gradient")
}

/// Parses a `background` value into its comma-separated layers.
pub fn parse_layers(value: &str) -> Vec<BackgroundLayer> {
    let mut input = ParserInput::new(value);
    let mut parser = Parser::new(&mut input);
    let mut layers = Vec::new();
    let mut current = LayerBuilder::default();

    loop {
        parser.skip_whitespace();
        let start = parser.position();
        let token = match parser.next() {
            Ok(t) => t.clone(),
            Err(_) => break,
        };
        match token {
            Token::Comma => {
                layers.push(std::mem::take(&mut current).finish());
                continue;
            }
            Token::Function(name) => {
                let consumed: Result<(), ParseError<'_, ()>> = parser.parse_nested_block(|nested| {
                    while nested.next().is_ok() {}
                    Ok(())
                });
                if consumed.is_err() {
                    break;
                }
                let text = parser.slice_from(start).trim();
                let name = name.to_ascii_lowercase();
                if is_image_function(&name) {
                    LayerBuilder::push(&mut current.layer.image, text);
                } else if matches!(name.as_str(), "calc" | "min" | "max" | "clamp") {
                    current.position(text);
                } else {
                    LayerBuilder::push(&mut current.layer.color, text);
                }
            }
            Token::UnquotedUrl(_) => {
                let text = parser.slice_from(start).trim();
                LayerBuilder::push(&mut current.layer.image, text);
            }
            Token::Ident(ident) => {
                let text = parser.slice_from(start).trim();
                let ident = ident.to_ascii_lowercase();
                match ident.as_str() {
                    "none" => LayerBuilder::push(&mut current.layer.image, text),
                    "scroll" | "fixed" | "local" => {
                        LayerBuilder::push(&mut current.layer.attachment, text)
                    }
                    "border-box" | "padding-box" | "content-box" | "text" => current.boxed(text),
                    "auto" | "cover" | "contain" if current.in_size => current.position(text),
                    k if is_repeat_keyword(k) => {
                        LayerBuilder::push(&mut current.layer.repeat, text)
                    }
                    k if is_position_keyword(k) => current.position(text),
                    _ => LayerBuilder::push(&mut current.layer.color, text),
                }
            }
            Token::Dimension { .. } | Token::Percentage { .. } | Token::Number { .. } => {
                let text = parser.slice_from(start).trim();
                current.position(text);
            }
            Token::Delim('/') => current.in_size = true,
            _ => {
                let text = parser.slice_from(start).trim();
                LayerBuilder::push(&mut current.layer.color, text);
            }
        }
    }
    layers.push(current.finish());
    layers
}

/// Splits `background-position` into `-x`/`-y` in place. No-op when already split.
pub fn split_position(decl: &mut Declaration) {
    if decl.position("background-position-x").is_some()
        || decl.position("background-position-y").is_some()
    {
        return;
    }
    let Some(idx) = decl.position("background-position") else {
        return;
    };
    let value = decl.remove("background-position").unwrap_or_default();
    let parts: Vec<String> = value.split_whitespace().map(str::to_owned).collect();
    let (x, y) = split_axes(&parts);
    decl.insert_at(idx, "background-position-x", x.unwrap_or_default());
    decl.insert_at(idx + 1, "background-position-y", y.unwrap_or_default());
}

/// Joins `-x`/`-y` into `background-position` at the place `-x` occupied.
pub fn join_position(decl: &mut Declaration) {
    let idx = match (
        decl.position("background-position-x"),
        decl.position("background-position-y"),
    ) {
        (None, None) => return,
        (Some(a), Some(b)) => a.min(b),
        (Some(a), None) | (None, Some(a)) => a,
    };
    let x = decl.remove("background-position-x").unwrap_or_default();
    let y = decl.remove("background-position-y").unwrap_or_default();
    let text = format!("{x} {y}").trim().to_owned();
    if !text.is_empty() {
        decl.insert_at(idx, "background-position", text);
    }
}

/// Expands a single-layer `background` shorthand that defines an image.
///
/// An explicit `background-position` is split into `-x`/`-y` first. Longhands
/// already set on the declaration win over the shorthand's components.
pub fn decompose(decl: &mut Declaration) -> Decomposition {
    let Some(value) = decl.get("background").map(str::to_owned) else {
        return Decomposition::NoShorthand;
    };
    split_position(decl);

    let layers = parse_layers(&value);
    let [layer] = layers.as_slice() else {
        return Decomposition::MultipleLayers;
    };
    if layer.image.is_none() || layer.size.is_some() || value.contains('!') {
        return Decomposition::Kept;
    }

    decl.remove("background");
    for (name, v) in layer.longhands() {
        if decl.get(name).is_none() {
            decl.set(name, v);
        }
    }
    Decomposition::Expanded
}

/// Folds longhands back into a `background` shorthand appended at the end.
///
/// Always joins the position first. Folding only happens when no `background`
/// is present, so a shorthand left intact by [`decompose`] is never overwritten.
pub fn merge(decl: &mut Declaration) {
    join_position(decl);
    if decl.get("background").is_some() {
        return;
    }
    let parts: Vec<String> = MERGE_ORDER
        .iter()
        .filter_map(|name| decl.remove(name))
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
        .collect();
    if parts.is_empty() {
        return;
    }
    decl.append("background", parts.join(" "));
}

/// Leading integer of a CSS value (`"-12px"` -> -12, `"0"` -> 0, `"auto"` -> None).
pub(crate) fn leading_integer(value: &str) -> Option<i64> {
    let value = value.trim();
    let end = value
        .char_indices()
        .find(|&(i, c)| !(c.is_ascii_digit() || (i == 0 && (c == '-' || c == '+'))))
        .map_or(value.len(), |(i, _)| i);
    value[..end].parse().ok()
}
