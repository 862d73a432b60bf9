use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Normalized sprite configuration.
/// Key notes:
///   - paths in `css_sources` are already resolved; discovery and config-file merging happen outside the core
///   - `max_single_size` is in bytes and bounds the estimated encoded size of one composite (0 = unlimited)
///   - `format` only names the output files; pixels are always encoded as PNG
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpriteConfig {
    /// Root directory that relative inputs (and `ignore_images` globs) are resolved against.
    #[serde(default = "default_workspace")]
    pub workspace: PathBuf,
    /// Resolved stylesheet paths, processed in order.
    #[serde(default)]
    pub css_sources: Vec<PathBuf>,
    /// Image extensions eligible for spriting (lowercase, without dot).
    #[serde(default = "default_image_formats")]
    pub image_formats: Vec<String>,
    /// Glob patterns (relative to `workspace`) of images that must never be sprited.
    #[serde(default)]
    pub ignore_images: Vec<String>,

    /// Directory the rewritten stylesheets are written to.
    #[serde(default = "default_css_dist")]
    pub css_dist: PathBuf,
    /// Composite directory relative to `css_dist`; prefixed verbatim to composite names.
    #[serde(default = "default_image_dist")]
    pub image_dist: String,
    /// Upper bound of summed encoded image bytes per composite. 0 disables splitting.
    #[serde(default)]
    pub max_single_size: u64,
    /// Transparent gap added to the right and bottom of every slot, in pixels.
    #[serde(default)]
    pub margin: u32,
    /// Prefix of every composite (and of the combined stylesheet).
    #[serde(default = "default_prefix")]
    pub prefix: String,
    /// Output file extension of composites.
    #[serde(default = "default_format")]
    pub format: String,
    /// Merge all stylesheets into one output unit (`{prefix}all.css`).
    #[serde(default)]
    pub combine: bool,
    /// Emit one shared `background-image` rule per composite instead of per declaration.
    #[serde(default)]
    pub combine_css_rule: bool,
}

impl Default for SpriteConfig {
    fn default() -> Self {
        Self {
            workspace: default_workspace(),
            css_sources: Vec::new(),
            image_formats: default_image_formats(),
            ignore_images: Vec::new(),
            css_dist: default_css_dist(),
            image_dist: default_image_dist(),
            max_single_size: 0,
            margin: 0,
            prefix: default_prefix(),
            format: default_format(),
            combine: false,
            combine_css_rule: false,
        }
    }
}

impl SpriteConfig {
    /// Validates the configuration parameters.
    ///
    /// Returns an error if:
    /// - `format` is empty or contains a path separator
    /// - `image_formats` is empty
    /// - `image_dist` is an absolute path (composite names are written relative to `css_dist`)
    pub fn validate(&self) -> crate::error::Result<()> {
        use crate::error::SpriteError;

        if self.format.trim().is_empty() || self.format.contains(['/', '\\']) {
            return Err(SpriteError::InvalidConfig(format!(
                "invalid output format {:?}",
                self.format
            )));
        }
        if self.image_formats.is_empty() {
            return Err(SpriteError::InvalidConfig(
                "image_formats must name at least one extension".into(),
            ));
        }
        if Path::new(&self.image_dist).is_absolute() {
            return Err(SpriteError::InvalidConfig(format!(
                "image_dist ({}) must be relative to css_dist",
                self.image_dist
            )));
        }
        Ok(())
    }

    /// True if `ext` (any case, no dot) is an eligible source image extension.
    pub fn accepts_extension(&self, ext: &str) -> bool {
        self.image_formats
            .iter()
            .any(|f| f.eq_ignore_ascii_case(ext))
    }

    /// Create a fluent builder for `SpriteConfig`.
    pub fn builder() -> SpriteConfigBuilder {
        SpriteConfigBuilder::new()
    }
}

fn default_workspace() -> PathBuf {
    PathBuf::from(".")
}
fn default_image_formats() -> Vec<String> {
    vec!["png".into()]
}
fn default_css_dist() -> PathBuf {
    PathBuf::from("./sprite/css/")
}
fn default_image_dist() -> String {
    "./img/".into()
}
fn default_prefix() -> String {
    "sprite_".into()
}
fn default_format() -> String {
    "png".into()
}

/// Builder for `SpriteConfig` for ergonomic construction.
#[derive(Debug, Default, Clone)]
pub struct SpriteConfigBuilder {
    cfg: SpriteConfig,
}

impl SpriteConfigBuilder {
    pub fn new() -> Self {
        Self {
            cfg: SpriteConfig::default(),
        }
    }
    pub fn workspace(mut self, v: impl Into<PathBuf>) -> Self {
        self.cfg.workspace = v.into();
        self
    }
    pub fn css_source(mut self, v: impl Into<PathBuf>) -> Self {
        self.cfg.css_sources.push(v.into());
        self
    }
    pub fn image_formats<S: Into<String>>(mut self, v: impl IntoIterator<Item = S>) -> Self {
        self.cfg.image_formats = v.into_iter().map(Into::into).collect();
        self
    }
    pub fn ignore_image(mut self, pattern: impl Into<String>) -> Self {
        self.cfg.ignore_images.push(pattern.into());
        self
    }
    pub fn css_dist(mut self, v: impl Into<PathBuf>) -> Self {
        self.cfg.css_dist = v.into();
        self
    }
    pub fn image_dist(mut self, v: impl Into<String>) -> Self {
        self.cfg.image_dist = v.into();
        self
    }
    pub fn max_single_size(mut self, bytes: u64) -> Self {
        self.cfg.max_single_size = bytes;
        self
    }
    pub fn margin(mut self, v: u32) -> Self {
        self.cfg.margin = v;
        self
    }
    pub fn prefix(mut self, v: impl Into<String>) -> Self {
        self.cfg.prefix = v.into();
        self
    }
    pub fn format(mut self, v: impl Into<String>) -> Self {
        self.cfg.format = v.into();
        self
    }
    pub fn combine(mut self, v: bool) -> Self {
        self.cfg.combine = v;
        self
    }
    pub fn combine_css_rule(mut self, v: bool) -> Self {
        self.cfg.combine_css_rule = v;
        self
    }
    pub fn build(self) -> SpriteConfig {
        self.cfg
    }
}
