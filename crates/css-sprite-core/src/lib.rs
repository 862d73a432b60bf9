//! Core library for merging stylesheet background images into CSS sprites.
//!
//! - Collection: walks parsed stylesheets (following `@import` and grouping rules) and
//!   picks `background-image` declarations that can be sprited
//! - Packing: size-bounded batches, each laid out by a growing binary-tree packer
//! - Output: composite PNGs plus the input rule trees rewritten in place
//!
//! Quick example:
//! ```ignore
//! use css_sprite_core::prelude::*;
//! # fn main() -> anyhow::Result<()> {
//! let cfg = SpriteConfig::builder().css_source("css/icons.css").build();
//! let mut sources = vec![SourceSheet::read("css/icons.css")?];
//! let out = sprite_stylesheets(&mut sources, cfg)?;
//! for c in &out.composites {
//!     println!("{} {}x{}", c.name, c.width, c.height);
//! }
//! println!("{}", sources[0].sheet.to_css());
//! # Ok(()) }
//! ```

pub mod background;
pub mod collector;
pub mod compositing;
pub mod config;
pub mod declaration;
pub mod error;
pub mod export;
pub mod grouping;
pub mod loader;
pub mod model;
pub mod packer;
pub mod pipeline;
pub mod rewrite;
pub mod stylesheet;

pub use config::*;
pub use declaration::Declaration;
pub use error::*;
pub use export::*;
pub use model::*;
pub use pipeline::*;
pub use stylesheet::{GroupingRule, ImportRule, RuleTree, StyleRule, Stylesheet};

/// Convenience prelude for common types and functions.
/// Importing `css_sprite_core::prelude::*` brings the primary APIs into scope.
pub mod prelude {
    pub use crate::background::Decomposition;
    pub use crate::collector::{CollectedImages, DeclarationRef, ImageReference, StyleCollector};
    pub use crate::config::{SpriteConfig, SpriteConfigBuilder};
    pub use crate::declaration::Declaration;
    pub use crate::error::{Result, SpriteError};
    pub use crate::export::to_json_manifest;
    pub use crate::model::{CompositeOutput, OutputUnit, Rect, SpriteOutput, SpriteStats};
    pub use crate::pipeline::{SourceSheet, SpriteContext, sprite_stylesheets};
    pub use crate::stylesheet::{RuleTree, StyleRule, Stylesheet};
}
