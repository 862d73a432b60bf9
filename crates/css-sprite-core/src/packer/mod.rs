use crate::model::Frame;

pub mod growing;

pub use growing::{GrowingPacker, PackedLayout, pack_slots};

/// A packer places rectangles into a page.
///
/// Implementations must ensure no overlaps. `pack` may return `None` if the
/// rectangle cannot be placed; growing packers only do so for degenerate input.
pub trait Packer<K> {
    fn pack(&mut self, key: K, w: u32, h: u32) -> Option<Frame<K>>;
    /// Current page size `(w, h)`.
    fn bounds(&self) -> (u32, u32);
}
