//! Rule-tree traversal that finds sprite-eligible `background-image` declarations.

use crate::background::Decomposition;
use crate::config::SpriteConfig;
use crate::declaration::Declaration;
use crate::error::{Result, SpriteError};
use crate::stylesheet::{RuleTree, Stylesheet};
use cssparser::{Parser, ParserInput};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::collections::HashMap;
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, trace};

/// Marker that opts one image out of spriting (`url(a.png#unsprite)`).
pub const UNSPRITE_MARKER: &str = "#unsprite";

/// Address of a style rule's declaration: input sheet index plus the rule path
/// (see [`Stylesheet::rule`]).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeclarationRef {
    pub sheet: usize,
    pub path: Vec<usize>,
}

/// One distinct image and every declaration that references it.
#[derive(Debug, Clone)]
pub struct ImageReference {
    /// URL as written in the stylesheet, without query or fragment.
    pub logical_url: String,
    /// Canonical path of the image file; the cache key.
    pub absolute_path: PathBuf,
    pub declarations: Vec<DeclarationRef>,
}

/// Image references keyed by absolute path, in first-seen order.
#[derive(Debug, Clone, Default)]
pub struct CollectedImages {
    refs: Vec<ImageReference>,
    index: HashMap<PathBuf, usize>,
}

impl CollectedImages {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.refs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.refs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ImageReference> {
        self.refs.iter()
    }

    pub fn as_slice(&self) -> &[ImageReference] {
        &self.refs
    }

    pub fn get(&self, path: &Path) -> Option<&ImageReference> {
        self.index.get(path).map(|&i| &self.refs[i])
    }

    /// Distinct image paths in first-seen order.
    pub fn paths(&self) -> Vec<PathBuf> {
        self.refs.iter().map(|r| r.absolute_path.clone()).collect()
    }

    /// Gets or creates the reference for `absolute_path` and appends `decl`.
    pub fn add(&mut self, logical_url: &str, absolute_path: PathBuf, decl: DeclarationRef) {
        let idx = match self.index.get(&absolute_path) {
            Some(&i) => i,
            None => {
                self.refs.push(ImageReference {
                    logical_url: logical_url.to_owned(),
                    absolute_path: absolute_path.clone(),
                    declarations: Vec::new(),
                });
                self.index.insert(absolute_path, self.refs.len() - 1);
                self.refs.len() - 1
            }
        };
        self.refs[idx].declarations.push(decl);
    }

    /// Unions `other` into `self` by path; declarations are concatenated in order.
    pub fn union(&mut self, other: CollectedImages) {
        for r in other.refs {
            for decl in r.declarations {
                self.add(&r.logical_url, r.absolute_path.clone(), decl);
            }
        }
    }
}

/// Why a declaration was left alone. Logged at debug level, never surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Skip {
    BackgroundSize,
    MultipleLayers,
    KeptShorthand,
    PositionKeyword,
    Repeat,
    Important,
    NoImage,
    Unsprite,
    Network,
    Format,
    Ignored,
    Missing,
}

impl Skip {
    fn reason(self) -> &'static str {
        match self {
            Skip::BackgroundSize => "background-size present",
            Skip::MultipleLayers => "multiple background layers",
            Skip::KeptShorthand => "background shorthand cannot be expanded",
            Skip::PositionKeyword => "right/center/bottom position",
            Skip::Repeat => "repeating background",
            Skip::Important => "!important background",
            Skip::NoImage => "no background-image url",
            Skip::Unsprite => "marked #unsprite",
            Skip::Network => "network url",
            Skip::Format => "image format not allowed",
            Skip::Ignored => "matches ignore_images",
            Skip::Missing => "image file missing",
        }
    }
}

/// Image selected from one declaration.
struct Eligible {
    url: String,
    path: PathBuf,
}

/// Walks stylesheets, expanding and filtering background declarations in place.
///
/// Imported sheets are parsed once per collector and attached to their
/// `@import` rule so that later stages can address their declarations.
pub struct StyleCollector<'a> {
    cfg: &'a SpriteConfig,
    ignore: GlobSet,
    workspace: PathBuf,
    imports: HashMap<PathBuf, Stylesheet>,
}

impl<'a> StyleCollector<'a> {
    pub fn new(cfg: &'a SpriteConfig) -> Result<Self> {
        let mut builder = GlobSetBuilder::new();
        for pattern in &cfg.ignore_images {
            let glob = Glob::new(pattern).map_err(|e| {
                SpriteError::InvalidConfig(format!("invalid ignore pattern {pattern:?}: {e}"))
            })?;
            builder.add(glob);
        }
        let ignore = builder
            .build()
            .map_err(|e| SpriteError::InvalidConfig(format!("ignore patterns: {e}")))?;
        let workspace = fs::canonicalize(&cfg.workspace).unwrap_or_else(|_| cfg.workspace.clone());
        Ok(Self {
            cfg,
            ignore,
            workspace,
            imports: HashMap::new(),
        })
    }

    /// Collects the eligible declarations of `sheet` (read from `source`) into `out`.
    ///
    /// Returns the number of declarations added.
    pub fn collect(
        &mut self,
        sheet_index: usize,
        sheet: &mut Stylesheet,
        source: &Path,
        out: &mut CollectedImages,
    ) -> usize {
        let before: usize = out.iter().map(|r| r.declarations.len()).sum();
        let dir = source.parent().map(Path::to_path_buf).unwrap_or_default();
        let mut chain = vec![fs::canonicalize(source).unwrap_or_else(|_| source.to_path_buf())];
        let mut path = Vec::new();
        self.walk(
            &mut sheet.rules,
            &dir,
            sheet_index,
            &mut path,
            &mut chain,
            out,
        );
        let after: usize = out.iter().map(|r| r.declarations.len()).sum();
        after - before
    }

    fn walk(
        &mut self,
        rules: &mut [RuleTree],
        dir: &Path,
        sheet_index: usize,
        path: &mut Vec<usize>,
        chain: &mut Vec<PathBuf>,
        out: &mut CollectedImages,
    ) {
        for (i, rule) in rules.iter_mut().enumerate() {
            path.push(i);
            match rule {
                RuleTree::Style(style) => {
                    match self.filter(&mut style.declaration, dir) {
                        Ok(found) => {
                            trace!(selector = %style.selector, url = %found.url, "collected");
                            out.add(
                                &found.url,
                                found.path,
                                DeclarationRef {
                                    sheet: sheet_index,
                                    path: path.clone(),
                                },
                            );
                        }
                        Err(Skip::NoImage) => {}
                        Err(skip) => {
                            debug!(selector = %style.selector, reason = skip.reason(), "declaration skipped");
                        }
                    }
                }
                RuleTree::Grouping(group) => {
                    self.walk(&mut group.children, dir, sheet_index, path, chain, out);
                }
                RuleTree::Import(import) => {
                    if let Some(target) = self.resolve_import(&import.href, dir, chain) {
                        let nested = match import.nested.take() {
                            Some(sheet) => Some(sheet),
                            None => self.read_import(&target),
                        };
                        if let Some(mut nested) = nested {
                            let nested_dir =
                                target.parent().map(Path::to_path_buf).unwrap_or_default();
                            chain.push(target);
                            self.walk(&mut nested.rules, &nested_dir, sheet_index, path, chain, out);
                            chain.pop();
                            import.nested = Some(nested);
                        }
                    }
                }
                RuleTree::Statement(_) => {}
            }
            path.pop();
        }
    }

    /// Canonical path of an importable `href`, or `None` when it must be skipped.
    fn resolve_import(&self, href: &str, dir: &Path, chain: &[PathBuf]) -> Option<PathBuf> {
        if is_network_url(href) {
            debug!(href, "network import skipped");
            return None;
        }
        let Some(end) = href.find(".css") else {
            debug!(href, "non-css import skipped");
            return None;
        };
        let file = &href[..end + ".css".len()];
        let resolved = match file.strip_prefix('/') {
            Some(rooted) => self.workspace.join(rooted),
            None => dir.join(file),
        };
        let target = match fs::canonicalize(resolved) {
            Ok(p) => p,
            Err(e) => {
                debug!(href, error = %e, "unresolvable import skipped");
                return None;
            }
        };
        if chain.contains(&target) {
            debug!(href, "import cycle skipped");
            return None;
        }
        Some(target)
    }

    fn read_import(&mut self, target: &Path) -> Option<Stylesheet> {
        if let Some(sheet) = self.imports.get(target) {
            return Some(sheet.clone());
        }
        match Stylesheet::from_file(target) {
            Ok(sheet) => {
                self.imports.insert(target.to_path_buf(), sheet.clone());
                Some(sheet)
            }
            Err(e) => {
                debug!(error = %e, "unreadable import skipped");
                None
            }
        }
    }

    /// Applies the eligibility rules to one declaration. On rejection the
    /// declaration is restored: re-merged if it was expanded, untouched otherwise.
    fn filter(&self, decl: &mut Declaration, dir: &Path) -> std::result::Result<Eligible, Skip> {
        if decl.contains("background-size") {
            return Err(Skip::BackgroundSize);
        }
        if !decl.contains("background") && !decl.contains("background-image") {
            return Err(Skip::NoImage);
        }

        let snapshot = decl.clone();
        let outcome = if decl.contains("background") && !decl.contains("background-image") {
            decl.decompose()
        } else {
            decl.split_position();
            Decomposition::NoShorthand
        };

        let verdict = self.check(decl, outcome, dir);
        if let Err(skip) = verdict {
            if outcome == Decomposition::Expanded {
                decl.merge();
            } else {
                *decl = snapshot;
            }
            if skip == Skip::Unsprite {
                strip_unsprite(decl);
            }
        }
        verdict
    }

    fn check(
        &self,
        decl: &Declaration,
        outcome: Decomposition,
        dir: &Path,
    ) -> std::result::Result<Eligible, Skip> {
        match outcome {
            Decomposition::MultipleLayers => return Err(Skip::MultipleLayers),
            Decomposition::Kept => return Err(Skip::KeptShorthand),
            Decomposition::NoShorthand | Decomposition::Expanded => {}
        }

        let important = decl
            .iter()
            .filter(|(name, _)| name.starts_with("background"))
            .any(|(_, v)| is_important(v));
        if important {
            return Err(Skip::Important);
        }

        let positioned = ["background-position-x", "background-position-y"]
            .iter()
            .filter_map(|p| decl.get(p))
            .any(has_position_keyword);
        if positioned {
            return Err(Skip::PositionKeyword);
        }

        let repeats = [
            "background-repeat",
            "background-repeat-x",
            "background-repeat-y",
        ]
        .iter()
        .filter_map(|p| decl.get(p))
        .any(is_repeating);
        if repeats {
            return Err(Skip::Repeat);
        }

        let Some(value) = decl.get("background-image") else {
            return Err(Skip::NoImage);
        };
        if value.contains(',') {
            return Err(Skip::MultipleLayers);
        }
        let Some(raw) = extract_url(value) else {
            return Err(Skip::NoImage);
        };
        if raw.contains(UNSPRITE_MARKER) {
            return Err(Skip::Unsprite);
        }
        if is_network_url(&raw) {
            return Err(Skip::Network);
        }
        let url = strip_query(&raw);
        let ext = Path::new(url)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();
        if !self.cfg.accepts_extension(ext) {
            return Err(Skip::Format);
        }

        let resolved = match url.strip_prefix('/') {
            Some(rooted) => self.workspace.join(rooted),
            None => dir.join(url),
        };
        let Ok(path) = fs::canonicalize(normalize_path(&resolved)) else {
            return Err(Skip::Missing);
        };
        if !path.is_file() {
            return Err(Skip::Missing);
        }
        let relative = path.strip_prefix(&self.workspace).unwrap_or(path.as_path());
        if self.ignore.is_match(relative) {
            return Err(Skip::Ignored);
        }
        Ok(Eligible {
            url: url.to_owned(),
            path,
        })
    }
}

fn is_important(value: &str) -> bool {
    value.to_ascii_lowercase().contains("!important")
}

fn strip_unsprite(decl: &mut Declaration) {
    for name in ["background-image", "background"] {
        if let Some(v) = decl.get(name).filter(|v| v.contains(UNSPRITE_MARKER)) {
            let cleaned = v.replace(UNSPRITE_MARKER, "");
            decl.set(name, cleaned);
        }
    }
}

/// `http://`, `https://`, `ftp://` (any case) and protocol-relative `//` URLs.
pub fn is_network_url(url: &str) -> bool {
    let lower = url.trim().to_ascii_lowercase();
    ["http://", "https://", "ftp://", "//"]
        .iter()
        .any(|p| lower.starts_with(p))
}

fn has_position_keyword(value: &str) -> bool {
    let lower = value.to_ascii_lowercase();
    ["right", "center", "bottom"].iter().any(|k| lower.contains(k))
}

fn is_repeating(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "repeat" | "repeat-x" | "repeat-y"
    )
}

/// URL of the first `url(...)` in a `background-image` value.
pub fn extract_url(value: &str) -> Option<String> {
    let mut input = ParserInput::new(value);
    let mut parser = Parser::new(&mut input);
    parser
        .expect_url()
        .ok()
        .map(|u| String::from(&*u).trim().to_owned())
        .filter(|u| !u.is_empty())
}

/// Drops a `?query` or `#fragment` suffix.
pub fn strip_query(url: &str) -> &str {
    url.find(['?', '#']).map_or(url, |i| &url[..i])
}

/// Lexically removes `.` and resolvable `..` components.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for comp in path.components() {
        match comp {
            Component::CurDir => {}
            Component::ParentDir => {
                let popped = matches!(out.components().next_back(), Some(Component::Normal(_)))
                    && out.pop();
                if !popped && !out.has_root() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_are_extracted_with_or_without_quotes() {
        assert_eq!(extract_url("url(a.png)").as_deref(), Some("a.png"));
        assert_eq!(extract_url("url( 'img/b.png?v=2' )").as_deref(), Some("img/b.png?v=2"));
        assert_eq!(extract_url("url(\"c.jpg\")").as_deref(), Some("c.jpg"));
        assert_eq!(extract_url("none"), None);
    }

    #[test]
    fn query_and_fragment_are_stripped() {
        assert_eq!(strip_query("a.png?v=2"), "a.png");
        assert_eq!(strip_query("a.png#x"), "a.png");
        assert_eq!(strip_query("a.png"), "a.png");
    }

    #[test]
    fn paths_normalize_lexically() {
        assert_eq!(normalize_path(Path::new("css/../img/./a.png")), PathBuf::from("img/a.png"));
        assert_eq!(normalize_path(Path::new("../a.png")), PathBuf::from("../a.png"));
        assert_eq!(normalize_path(Path::new("/x/../../a.png")), PathBuf::from("/a.png"));
    }

    #[test]
    fn network_and_keyword_patterns() {
        assert!(is_network_url("HTTPS://cdn/a.png"));
        assert!(is_network_url("//cdn/a.png"));
        assert!(!is_network_url("img/a.png"));
        assert!(has_position_keyword("Right"));
        assert!(!has_position_keyword("-10px"));
        assert!(is_repeating(" repeat-x "));
        assert!(!is_repeating("no-repeat"));
    }

    #[test]
    fn union_concatenates_declarations_by_path() {
        let mut a = CollectedImages::new();
        a.add("a.png", PathBuf::from("/i/a.png"), DeclarationRef { sheet: 0, path: vec![0] });
        let mut b = CollectedImages::new();
        b.add("../a.png", PathBuf::from("/i/a.png"), DeclarationRef { sheet: 1, path: vec![2] });
        b.add("b.png", PathBuf::from("/i/b.png"), DeclarationRef { sheet: 1, path: vec![3] });
        a.union(b);
        assert_eq!(a.len(), 2);
        let shared = a.get(Path::new("/i/a.png")).expect("shared ref");
        assert_eq!(shared.declarations.len(), 2);
        assert_eq!(shared.logical_url, "a.png");
    }
}
