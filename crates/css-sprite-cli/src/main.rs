use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::{ArgAction, Parser};
use css_sprite_core::{SourceSheet, SpriteConfig, SpriteOutput, sprite_stylesheets, to_json_manifest};
use globset::GlobBuilder;
use serde::Deserialize;
use tracing::{debug, info};
use walkdir::WalkDir;

#[derive(Parser, Debug)]
#[command(
    name = "css-sprite",
    about = "Merge stylesheet background images into sprites and rewrite the CSS",
    version,
    author
)]
struct Cli {
    // Input
    /// Stylesheets to process: files, directories (every *.css inside) or glob patterns, relative to the workspace
    #[arg(help_heading = "Input")]
    css_source: Vec<String>,
    /// JSON or YAML config file (CLI options override it)
    #[arg(short, long, help_heading = "Input")]
    config: Option<PathBuf>,
    /// Directory that css sources and root-relative image URLs resolve against
    #[arg(short, long, help_heading = "Input")]
    workspace: Option<PathBuf>,
    /// Image extension eligible for spriting (repeatable; default png)
    #[arg(long = "image-format", help_heading = "Input")]
    image_formats: Vec<String>,
    /// Glob (relative to the workspace) of images that must never be sprited (repeatable)
    #[arg(long, help_heading = "Input")]
    ignore: Vec<String>,

    // Output
    /// Output directory for rewritten stylesheets
    #[arg(long, help_heading = "Output")]
    css_dist: Option<PathBuf>,
    /// Sprite directory relative to --css-dist, as written into the CSS
    #[arg(long, help_heading = "Output")]
    image_dist: Option<String>,
    /// Split sprites whose images add up to more than this many KB (0 = never)
    #[arg(long, help_heading = "Output")]
    max_single_size: Option<f64>,
    /// Transparent gap after each image, in pixels
    #[arg(long, help_heading = "Output")]
    margin: Option<u32>,
    /// Sprite file name prefix
    #[arg(long, help_heading = "Output")]
    prefix: Option<String>,
    /// Sprite file extension (pixels are always PNG encoded)
    #[arg(long, help_heading = "Output")]
    format: Option<String>,
    /// Merge all stylesheets (and their images) into one output
    #[arg(long, default_value_t = false, help_heading = "Output")]
    combine: bool,
    /// Emit one shared background-image rule per sprite
    #[arg(long, default_value_t = false, help_heading = "Output")]
    combine_css_rule: bool,

    // Export
    /// Write a JSON manifest of sprites and frames to this file
    #[arg(long, help_heading = "Export")]
    manifest: Option<PathBuf>,
    /// Compute sprites and stats but do not write files
    #[arg(long, default_value_t = false, help_heading = "Export")]
    dry_run: bool,
    /// Print the merged configuration (after config file and CLI) and exit
    #[arg(long, default_value_t = false, help_heading = "Export")]
    print_config: bool,
    /// Output format for --print-config: json|yaml
    #[arg(long, default_value = "json", value_parser = ["json", "yaml"], help_heading = "Export")]
    print_config_format: String,

    // Logging/UX
    /// Show progress bars (disable with --progress false or --quiet)
    #[arg(long, default_value_t = true, action = ArgAction::Set, help_heading = "Logging/UX")]
    progress: bool,
    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = ArgAction::Count, help_heading = "Logging/UX")]
    verbose: u8,
    /// Quiet mode (overrides verbose)
    #[arg(short, long, default_value_t = false, help_heading = "Logging/UX")]
    quiet: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing_with_level(cli.quiet, cli.verbose);
    run(&cli, cli.progress && !cli.quiet)
}

fn run(cli: &Cli, show_progress: bool) -> anyhow::Result<()> {
    let file_cfg = match &cli.config {
        Some(path) => FileConfig::load(path)?,
        None => FileConfig::default(),
    };
    let (mut cfg, patterns) = file_cfg.into_sprite_config();
    apply_cli_overrides(&mut cfg, cli);
    let patterns = if cli.css_source.is_empty() {
        patterns
    } else {
        cli.css_source.clone()
    };
    cfg.css_sources = resolve_css_sources(&cfg.workspace, &patterns)?;

    if cli.print_config {
        match cli.print_config_format.as_str() {
            "yaml" => println!("{}", serde_yaml::to_string(&cfg)?),
            _ => println!("{}", serde_json::to_string_pretty(&cfg)?),
        }
        return Ok(());
    }

    let started = Instant::now();
    let mut sources = Vec::with_capacity(cfg.css_sources.len());
    for path in &cfg.css_sources {
        let sheet =
            SourceSheet::read(path).with_context(|| format!("read {}", path.display()))?;
        sources.push(sheet);
    }
    info!(count = sources.len(), "loaded stylesheets");

    let css_dist = cfg.css_dist.clone();
    let out = sprite_stylesheets(&mut sources, cfg)?;

    if !cli.dry_run {
        write_outputs(&css_dist, &out, &sources, show_progress)?;
        if let Some(path) = &cli.manifest {
            let json = serde_json::to_string_pretty(&to_json_manifest(&out))?;
            fs::write(path, json).with_context(|| format!("write {}", path.display()))?;
            info!(?path, "manifest written");
        }
    }

    let stats = out.stats();
    info!(
        sprites = stats.num_composites,
        images = stats.num_frames,
        stylesheets = out.units.len(),
        occupancy = format!("{:.2}%", stats.occupancy * 100.0),
        elapsed = fmt_dur(started.elapsed()),
        "done"
    );
    debug!("{}", stats.summary());
    Ok(())
}

fn apply_cli_overrides(cfg: &mut SpriteConfig, cli: &Cli) {
    if let Some(v) = &cli.workspace {
        cfg.workspace = v.clone();
    }
    if !cli.image_formats.is_empty() {
        cfg.image_formats = cli
            .image_formats
            .iter()
            .map(|f| f.trim_start_matches('.').to_ascii_lowercase())
            .collect();
    }
    cfg.ignore_images.extend(cli.ignore.iter().cloned());
    if let Some(v) = &cli.css_dist {
        cfg.css_dist = v.clone();
    }
    if let Some(v) = &cli.image_dist {
        cfg.image_dist = v.clone();
    }
    if let Some(kb) = cli.max_single_size {
        cfg.max_single_size = kb_to_bytes(kb);
    }
    if let Some(v) = cli.margin {
        cfg.margin = v;
    }
    if let Some(v) = &cli.prefix {
        cfg.prefix = v.clone();
    }
    if let Some(v) = &cli.format {
        cfg.format = v.clone();
    }
    if cli.combine {
        cfg.combine = true;
    }
    if cli.combine_css_rule {
        cfg.combine_css_rule = true;
    }
}

fn kb_to_bytes(kb: f64) -> u64 {
    if kb.is_finite() && kb > 0.0 {
        (kb * 1024.0).round() as u64
    } else {
        0
    }
}

/// Writes every sprite and stylesheet below `css_dist`.
fn write_outputs(
    css_dist: &Path,
    out: &SpriteOutput,
    sources: &[SourceSheet],
    progress: bool,
) -> anyhow::Result<()> {
    use indicatif::{ProgressBar, ProgressStyle};

    fs::create_dir_all(css_dist)
        .with_context(|| format!("create css_dist {}", css_dist.display()))?;

    let total = (out.composites.len() + out.units.len()) as u64;
    let bar = if progress {
        let b = ProgressBar::new(total);
        b.set_style(ProgressStyle::with_template(
            "{spinner:.green} writing {pos}/{len} [{elapsed_precise}] {wide_msg}",
        )?);
        Some(b)
    } else {
        None
    };

    for c in &out.composites {
        if let Some(b) = &bar {
            b.set_message(c.name.clone());
        }
        let path = css_dist.join(&c.name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create {}", parent.display()))?;
        }
        fs::write(&path, &c.encoded).with_context(|| format!("write {}", path.display()))?;
        debug!(?path, width = c.width, height = c.height, "wrote sprite");
        if let Some(b) = &bar {
            b.inc(1);
        }
    }

    for unit in &out.units {
        if let Some(b) = &bar {
            b.set_message(unit.css_name.clone());
        }
        let css: String = unit
            .sheets
            .iter()
            .filter_map(|&i| sources.get(i))
            .map(|s| s.sheet.to_css())
            .collect();
        let path = css_dist.join(&unit.css_name);
        fs::write(&path, css).with_context(|| format!("write {}", path.display()))?;
        debug!(?path, sprites = unit.composites.len(), "wrote stylesheet");
        if let Some(b) = &bar {
            b.inc(1);
        }
    }

    if let Some(b) = &bar {
        b.finish_and_clear();
    }
    Ok(())
}

/// Expands css source patterns relative to `workspace`.
///
/// A directory (or a pattern ending in `/`) means every `*.css` directly inside it;
/// an existing file is taken as is; anything else is a glob. Results are deduplicated
/// in first-seen order.
fn resolve_css_sources(workspace: &Path, patterns: &[String]) -> anyhow::Result<Vec<PathBuf>> {
    if patterns.is_empty() {
        anyhow::bail!("no css source given (pass CSS_SOURCE or set input.cssSource)");
    }
    let mut seen = HashSet::new();
    let mut list = Vec::new();
    let mut push = |p: PathBuf| {
        let key = fs::canonicalize(&p).unwrap_or_else(|_| p.clone());
        if seen.insert(key) {
            list.push(p);
        }
    };

    for pattern in patterns {
        let candidate = workspace.join(pattern);
        if pattern.ends_with('/') || pattern.ends_with('\\') || candidate.is_dir() {
            for p in css_files_in(&candidate) {
                push(p);
            }
        } else if candidate.is_file() {
            push(candidate);
        } else {
            for p in glob_css(workspace, pattern)? {
                push(p);
            }
        }
    }

    if list.is_empty() {
        anyhow::bail!(
            "no css file matched {:?} in {}",
            patterns,
            workspace.display()
        );
    }
    Ok(list)
}

fn css_files_in(dir: &Path) -> Vec<PathBuf> {
    WalkDir::new(dir)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .map(|e| e.into_path())
        .filter(|p| p.is_file() && is_css(p))
        .collect()
}

fn glob_css(workspace: &Path, pattern: &str) -> anyhow::Result<Vec<PathBuf>> {
    let pattern = pattern.replace('\\', "/");
    let pattern = pattern.trim_start_matches("./");
    let matcher = GlobBuilder::new(pattern)
        .literal_separator(true)
        .build()
        .with_context(|| format!("invalid css source pattern {pattern:?}"))?
        .compile_matcher();
    let mut list = Vec::new();
    for entry in WalkDir::new(workspace)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let p = entry.path();
        if !p.is_file() || !is_css(p) {
            continue;
        }
        let rel = p.strip_prefix(workspace).unwrap_or(p);
        let rel = rel.to_string_lossy().replace('\\', "/");
        if matcher.is_match(&rel) {
            list.push(p.to_path_buf());
        }
    }
    Ok(list)
}

fn is_css(p: &Path) -> bool {
    p.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("css"))
}

fn fmt_dur(d: Duration) -> String {
    let ms = d.as_secs_f64() * 1000.0;
    if ms >= 1.0 {
        format!("{:.1}ms", ms)
    } else {
        format!("{}µs", d.as_micros())
    }
}

fn init_tracing_with_level(quiet: bool, verbose: u8) {
    let level = if quiet {
        "error".to_string()
    } else {
        match verbose {
            0 => "info".into(),
            1 => "debug".into(),
            _ => "trace".into(),
        }
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(level)
        .with_target(false)
        .try_init();
}

/// A string or a list of strings.
#[derive(Deserialize, Debug, Clone)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    fn into_vec(self) -> Vec<String> {
        match self {
            OneOrMany::One(s) => vec![s],
            OneOrMany::Many(v) => v,
        }
    }
}

/// A config section given either in full or as a bare path string.
#[derive(Deserialize, Debug)]
#[serde(untagged)]
enum Section<T> {
    Path(String),
    Full(T),
}

/// Config file shape: `{ workspace, input: {...}, output: {...} }`.
#[derive(Deserialize, Debug, Default)]
#[serde(default)]
struct FileConfig {
    workspace: Option<PathBuf>,
    input: Option<Section<InputSection>>,
    output: Option<Section<OutputSection>>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(default, rename_all = "camelCase")]
struct InputSection {
    workspace: Option<PathBuf>,
    css_source: Option<OneOrMany>,
    /// Legacy name of `cssSource`.
    css_root: Option<OneOrMany>,
    ignore_images: Option<OneOrMany>,
    format: Option<OneOrMany>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(default, rename_all = "camelCase")]
struct OutputSection {
    css_dist: Option<PathBuf>,
    /// Legacy name of `cssDist`.
    css_root: Option<PathBuf>,
    image_dist: Option<String>,
    /// Legacy name of `imageDist`.
    image_root: Option<String>,
    /// KB.
    max_single_size: Option<f64>,
    /// Legacy name of `maxSingleSize`.
    max_size: Option<f64>,
    margin: Option<u32>,
    prefix: Option<String>,
    format: Option<String>,
    combine: Option<bool>,
    #[serde(rename = "combineCSSRule", alias = "combineCssRule")]
    combine_css_rule: Option<bool>,
}

impl FileConfig {
    fn load(path: &Path) -> anyhow::Result<Self> {
        let text =
            fs::read_to_string(path).with_context(|| format!("read config {}", path.display()))?;
        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("json"));
        let cfg = if is_json {
            serde_json::from_str(&text)
                .with_context(|| format!("parse config {}", path.display()))?
        } else {
            serde_yaml::from_str(&text)
                .with_context(|| format!("parse config {}", path.display()))?
        };
        Ok(cfg)
    }

    /// Normalized config (sources still unresolved) plus the css source patterns.
    fn into_sprite_config(self) -> (SpriteConfig, Vec<String>) {
        let mut cfg = SpriteConfig::default();
        let mut patterns = Vec::new();

        let input = match self.input {
            Some(Section::Path(p)) => InputSection {
                css_source: Some(OneOrMany::One(p)),
                ..Default::default()
            },
            Some(Section::Full(i)) => i,
            None => InputSection::default(),
        };
        if let Some(ws) = input.workspace.or(self.workspace) {
            cfg.workspace = ws;
        }
        if let Some(src) = input.css_source.or(input.css_root) {
            patterns = src.into_vec();
        }
        if let Some(v) = input.ignore_images {
            cfg.ignore_images = v.into_vec();
        }
        if let Some(v) = input.format {
            cfg.image_formats = v
                .into_vec()
                .into_iter()
                .map(|f| f.trim_start_matches('.').to_ascii_lowercase())
                .collect();
        }

        let output = match self.output {
            Some(Section::Path(p)) => OutputSection {
                css_dist: Some(PathBuf::from(p)),
                ..Default::default()
            },
            Some(Section::Full(o)) => o,
            None => OutputSection::default(),
        };
        if let Some(v) = output.css_dist.or(output.css_root) {
            cfg.css_dist = v;
        }
        if let Some(v) = output.image_dist.or(output.image_root) {
            cfg.image_dist = v;
        }
        if let Some(kb) = output.max_single_size.or(output.max_size) {
            cfg.max_single_size = kb_to_bytes(kb);
        }
        if let Some(v) = output.margin {
            cfg.margin = v;
        }
        if let Some(v) = output.prefix {
            cfg.prefix = v;
        }
        if let Some(v) = output.format {
            cfg.format = v;
        }
        if let Some(v) = output.combine {
            cfg.combine = v;
        }
        if let Some(v) = output.combine_css_rule {
            cfg.combine_css_rule = v;
        }
        (cfg, patterns)
    }
}
