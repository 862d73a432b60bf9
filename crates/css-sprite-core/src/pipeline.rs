use crate::collector::{CollectedImages, ImageReference, StyleCollector};
use crate::compositing::{blit_rgba, composite_name, encode_png};
use crate::config::SpriteConfig;
use crate::error::{Result, SpriteError};
use crate::grouping::{GroupInput, group_by_size};
use crate::loader::{ImageCache, slot_size};
use crate::model::{
    CompositeFrame, CompositeOutput, OutputUnit, Placement, Rect, SlotSize, SpriteOutput,
};
use crate::packer::pack_slots;
use crate::rewrite::{insert_after_prelude, rewrite_declaration, shared_image_rule};
use crate::stylesheet::Stylesheet;
use image::RgbaImage;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};

/// A parsed stylesheet and the path it was read from (relative URLs resolve against
/// its directory). The rule tree is rewritten in place by a run.
#[derive(Debug, Clone)]
pub struct SourceSheet {
    pub path: PathBuf,
    pub sheet: Stylesheet,
}

impl SourceSheet {
    pub fn new(path: impl Into<PathBuf>, sheet: Stylesheet) -> Self {
        Self {
            path: path.into(),
            sheet,
        }
    }

    /// Reads and parses `path`.
    pub fn read(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let sheet = Stylesheet::from_file(&path)?;
        Ok(Self { path, sheet })
    }
}

/// State of one sprite run: the validated configuration and the image cache.
///
/// The cache outlives units within a run, so an image placed for one stylesheet
/// is reused, not redrawn, by the next. Use a fresh context per run.
pub struct SpriteContext {
    cfg: SpriteConfig,
    cache: ImageCache,
}

impl SpriteContext {
    pub fn new(cfg: SpriteConfig) -> Result<Self> {
        cfg.validate()?;
        Ok(Self {
            cfg,
            cache: ImageCache::new(),
        })
    }

    pub fn config(&self) -> &SpriteConfig {
        &self.cfg
    }

    pub fn cache(&self) -> &ImageCache {
        &self.cache
    }

    /// Sprites every eligible background image of `sources` and rewrites their
    /// declarations in place.
    ///
    /// Notes:
    /// - Stylesheets are collected and their images decoded one sheet at a time;
    ///   any decode failure aborts the run.
    /// - Without `combine` each sheet is its own output unit; with it, image groups
    ///   of all sheets are unioned into a single unit named `{prefix}all.css`.
    #[instrument(skip_all, fields(sheets = sources.len()))]
    pub fn run(&mut self, sources: &mut [SourceSheet]) -> Result<SpriteOutput> {
        if sources.is_empty() {
            return Err(SpriteError::Empty);
        }
        let cfg = &self.cfg;
        let cache = &mut self.cache;
        let mut collector = StyleCollector::new(cfg)?;

        let mut per_sheet = Vec::with_capacity(sources.len());
        for (i, src) in sources.iter_mut().enumerate() {
            let mut collected = CollectedImages::new();
            let found = collector.collect(i, &mut src.sheet, &src.path, &mut collected);
            debug!(sheet = %src.path.display(), declarations = found, images = collected.len(), "collected");
            cache.load_all(&collected.paths())?;
            per_sheet.push(collected);
        }

        let mut out = SpriteOutput::default();
        if cfg.combine {
            let mut all = CollectedImages::new();
            for collected in per_sheet {
                all.union(collected);
            }
            let unit = UnitSpec {
                base: "all".into(),
                css_name: format!("{}all.css", cfg.prefix),
                sheets: (0..sources.len()).collect(),
            };
            process_unit(cfg, cache, unit, &all, sources, &mut out)?;
        } else {
            for (i, collected) in per_sheet.iter().enumerate() {
                let unit = UnitSpec {
                    base: file_stem(&sources[i].path),
                    css_name: file_name(&sources[i].path),
                    sheets: vec![i],
                };
                process_unit(cfg, cache, unit, collected, sources, &mut out)?;
            }
        }

        info!(
            composites = out.composites.len(),
            units = out.units.len(),
            "sprite run finished"
        );
        Ok(out)
    }
}

/// Runs a fresh [`SpriteContext`] over `sources`.
pub fn sprite_stylesheets(sources: &mut [SourceSheet], cfg: SpriteConfig) -> Result<SpriteOutput> {
    SpriteContext::new(cfg)?.run(sources)
}

struct UnitSpec {
    base: String,
    css_name: String,
    sheets: Vec<usize>,
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Groups, packs, draws and rewrites one output unit.
fn process_unit(
    cfg: &SpriteConfig,
    cache: &mut ImageCache,
    spec: UnitSpec,
    collected: &CollectedImages,
    sources: &mut [SourceSheet],
    out: &mut SpriteOutput,
) -> Result<()> {
    let refs = collected.as_slice();
    let mut slots = Vec::with_capacity(refs.len());
    let mut inputs = Vec::with_capacity(refs.len());
    for (index, r) in refs.iter().enumerate() {
        let entry = cache
            .get(&r.absolute_path)
            .ok_or_else(|| missing_entry(&r.absolute_path))?;
        let decls = r
            .declarations
            .iter()
            .filter_map(|d| sources.get(d.sheet)?.sheet.style_rule(&d.path))
            .map(|rule| &rule.declaration);
        slots.push(slot_size(&entry.meta, decls, cfg.margin));
        inputs.push(GroupInput {
            index,
            encoded_size: entry.meta.encoded_size,
            placed: entry.is_placed(),
        });
    }

    let batches = group_by_size(&inputs, cfg.max_single_size);
    let packed: Vec<&[usize]> = batches
        .iter()
        .filter(|b| !b.passthrough && !b.is_empty())
        .map(|b| b.members.as_slice())
        .collect();

    let mut unit = OutputUnit {
        css_name: spec.css_name,
        sheets: spec.sheets,
        composites: Vec::new(),
    };
    for (bi, members) in packed.iter().enumerate() {
        let name = composite_name(cfg, &spec.base, bi, packed.len());
        let composite = draw_batch(cache, &name, members, refs, &slots)?;
        debug!(
            name = %composite.name,
            images = composite.frames.len(),
            width = composite.width,
            height = composite.height,
            bytes = composite.encoded.len(),
            "composite drawn"
        );
        unit.composites.push(name);
        out.composites.push(composite);
    }

    rewrite_unit(cfg, cache, &unit, refs, sources);
    out.units.push(unit);
    Ok(())
}

fn draw_batch(
    cache: &mut ImageCache,
    name: &str,
    members: &[usize],
    refs: &[ImageReference],
    slots: &[SlotSize],
) -> Result<CompositeOutput> {
    let items: Vec<(usize, u32, u32)> = members
        .iter()
        .map(|&m| (m, slots[m].w, slots[m].h))
        .collect();
    let layout = pack_slots(&items)?;

    // Zeroed buffer: gaps between slots stay fully transparent.
    let mut canvas = RgbaImage::new(layout.width, layout.height);
    let mut frames = Vec::with_capacity(layout.frames.len());
    for frame in &layout.frames {
        let path = &refs[frame.key].absolute_path;
        let entry = cache.get_mut(path).ok_or_else(|| missing_entry(path))?;
        blit_rgba(&entry.meta.pixels, &mut canvas, frame.frame.x, frame.frame.y);
        entry.placement = Some(Placement {
            composite: name.to_owned(),
            x: frame.frame.x,
            y: frame.frame.y,
        });
        frames.push(CompositeFrame {
            source: path.clone(),
            frame: Rect::new(
                frame.frame.x,
                frame.frame.y,
                entry.meta.width,
                entry.meta.height,
            ),
        });
    }

    Ok(CompositeOutput {
        name: name.to_owned(),
        width: layout.width,
        height: layout.height,
        encoded: encode_png(&canvas)?,
        frames,
    })
}

/// Rewrites every declaration of every placed reference, passthrough ones included.
fn rewrite_unit(
    cfg: &SpriteConfig,
    cache: &ImageCache,
    unit: &OutputUnit,
    refs: &[ImageReference],
    sources: &mut [SourceSheet],
) {
    // composite name -> selectors, in first-seen order
    let mut shared: Vec<(String, Vec<String>)> = Vec::new();
    for r in refs {
        let Some(placement) = cache.get(&r.absolute_path).and_then(|e| e.placement.as_ref())
        else {
            continue;
        };
        for d in &r.declarations {
            let Some(src) = sources.get_mut(d.sheet) else {
                continue;
            };
            if cfg.combine_css_rule {
                if let Some(rule) = src.sheet.style_rule(&d.path) {
                    let selector = rule.selector.clone();
                    match shared.iter_mut().find(|(n, _)| *n == placement.composite) {
                        Some((_, sels)) => sels.push(selector),
                        None => shared.push((placement.composite.clone(), vec![selector])),
                    }
                }
            }
            if let Some(decl) = src.sheet.declaration_mut(&d.path) {
                rewrite_declaration(
                    decl,
                    &placement.composite,
                    placement.x,
                    placement.y,
                    cfg.combine_css_rule,
                );
            }
        }
    }

    let Some(target) = unit.sheets.first().and_then(|&i| sources.get_mut(i)) else {
        return;
    };
    // Inserted back to front so the rules end up in first-seen order.
    for (name, selectors) in shared.iter().rev() {
        let rule = shared_image_rule(selectors.iter().map(String::as_str), name);
        insert_after_prelude(&mut target.sheet, rule);
    }
}

fn missing_entry(path: &Path) -> SpriteError {
    SpriteError::InvalidConfig(format!("image {} was not loaded", path.display()))
}
