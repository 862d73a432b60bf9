use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Axis-aligned rectangle (pixels). `x,y` is top-left; `w,h` are sizes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

impl Rect {
    pub fn new(x: u32, y: u32, w: u32, h: u32) -> Self {
        Self { x, y, w, h }
    }
    /// Exclusive right edge (`x + w`).
    pub fn x2(&self) -> u32 {
        self.x + self.w
    }
    /// Exclusive bottom edge (`y + h`).
    pub fn y2(&self) -> u32 {
        self.y + self.h
    }
    /// True if the interiors of `self` and `r` intersect. Touching edges do not overlap.
    pub fn overlaps(&self, r: &Rect) -> bool {
        !(self.x >= r.x2() || r.x >= self.x2() || self.y >= r.y2() || r.y >= self.y2())
    }
}

/// Slot reserved for one image inside a composite: the larger of the declared CSS
/// box and the image itself, plus the configured margin.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct SlotSize {
    pub w: u32,
    pub h: u32,
}

/// Where an image ended up: which composite and at which offset.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Placement {
    pub composite: String,
    pub x: u32,
    pub y: u32,
}

/// A placed item within a packed layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Frame<K = String> {
    pub key: K,
    /// Reserved slot (slot size, not image size).
    pub frame: Rect,
}

/// One source image drawn into a composite.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompositeFrame {
    /// Absolute path of the source image.
    pub source: PathBuf,
    /// Drawn pixels inside the composite (image size, without margin).
    pub frame: Rect,
}

/// An encoded composite ready to be written to `css_dist/name`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompositeOutput {
    /// `{image_dist}{prefix}{base}[_{index}].{format}`; also the URL written into the CSS.
    pub name: String,
    pub width: u32,
    pub height: u32,
    #[serde(skip)]
    pub encoded: Vec<u8>,
    pub frames: Vec<CompositeFrame>,
}

/// One logical output stylesheet and the composites produced for it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputUnit {
    /// File name of the rewritten stylesheet inside `css_dist`.
    pub css_name: String,
    /// Indices into the input sheets, in order, whose rules make up this unit.
    pub sheets: Vec<usize>,
    /// Names of the composites drawn for this unit.
    pub composites: Vec<String>,
}

/// Result of a sprite run. Rewritten rule trees stay with the caller.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpriteOutput {
    pub composites: Vec<CompositeOutput>,
    pub units: Vec<OutputUnit>,
}

/// Statistics about composite packing efficiency.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SpriteStats {
    pub num_composites: usize,
    pub num_frames: usize,
    /// Sum of width * height over all composites.
    pub total_area: u64,
    /// Sum of drawn image areas.
    pub used_area: u64,
    /// used_area / total_area (0.0 to 1.0).
    pub occupancy: f64,
    /// Sum of encoded composite sizes in bytes.
    pub encoded_bytes: u64,
}

impl SpriteOutput {
    /// Computes packing statistics for this output.
    pub fn stats(&self) -> SpriteStats {
        let mut num_frames = 0;
        let mut total_area = 0u64;
        let mut used_area = 0u64;
        let mut encoded_bytes = 0u64;

        for c in &self.composites {
            total_area += (c.width as u64) * (c.height as u64);
            encoded_bytes += c.encoded.len() as u64;
            for f in &c.frames {
                num_frames += 1;
                used_area += (f.frame.w as u64) * (f.frame.h as u64);
            }
        }

        let occupancy = if total_area > 0 {
            used_area as f64 / total_area as f64
        } else {
            0.0
        };

        SpriteStats {
            num_composites: self.composites.len(),
            num_frames,
            total_area,
            used_area,
            occupancy,
            encoded_bytes,
        }
    }

    /// Looks up a composite by name.
    pub fn composite(&self, name: &str) -> Option<&CompositeOutput> {
        self.composites.iter().find(|c| c.name == name)
    }
}

impl SpriteStats {
    /// Returns a human-readable summary of the statistics.
    pub fn summary(&self) -> String {
        format!(
            "Composites: {}, Images: {}, Occupancy: {:.2}%, Total Area: {} px², Used Area: {} px², Encoded: {} bytes",
            self.num_composites,
            self.num_frames,
            self.occupancy * 100.0,
            self.total_area,
            self.used_area,
            self.encoded_bytes,
        )
    }

    /// Returns wasted space in pixels.
    pub fn wasted_area(&self) -> u64 {
        self.total_area.saturating_sub(self.used_area)
    }
}
