use super::Packer;
use crate::error::{Result, SpriteError};
use crate::model::{Frame, Rect};

/// Binary-tree node. A used node has been split into `right` and `down` children;
/// a free leaf is available space.
#[derive(Clone, Copy, Debug)]
struct Node {
    rect: Rect,
    used: bool,
    right: Option<usize>,
    down: Option<usize>,
}

impl Node {
    fn free(rect: Rect) -> Self {
        Self {
            rect,
            used: false,
            right: None,
            down: None,
        }
    }
}

/// Growing bin packer: starts with a root the size of the first block and
/// extends the root rightward or downward whenever a block does not fit,
/// keeping the layout roughly square.
///
/// Blocks should be fed in descending area order; placements are final.
pub struct GrowingPacker {
    nodes: Vec<Node>,
    root: usize,
}

impl GrowingPacker {
    pub fn new(w: u32, h: u32) -> Self {
        Self {
            nodes: vec![Node::free(Rect::new(0, 0, w, h))],
            root: 0,
        }
    }

    /// Depth-first search, right subtree before down subtree, for the first free
    /// leaf that can hold `w x h`.
    fn find_node(&self, from: usize, w: u32, h: u32) -> Option<usize> {
        let mut stack = vec![from];
        while let Some(idx) = stack.pop() {
            let node = &self.nodes[idx];
            if node.used {
                if let Some(down) = node.down {
                    stack.push(down);
                }
                if let Some(right) = node.right {
                    stack.push(right);
                }
            } else if w <= node.rect.w && h <= node.rect.h {
                return Some(idx);
            }
        }
        None
    }

    fn split_node(&mut self, idx: usize, w: u32, h: u32) -> Rect {
        let r = self.nodes[idx].rect;
        let down = self.push(Node::free(Rect::new(r.x, r.y + h, r.w, r.h - h)));
        let right = self.push(Node::free(Rect::new(r.x + w, r.y, r.w - w, h)));
        let node = &mut self.nodes[idx];
        node.used = true;
        node.down = Some(down);
        node.right = Some(right);
        Rect::new(r.x, r.y, w, h)
    }

    fn push(&mut self, node: Node) -> usize {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    fn grow_node(&mut self, w: u32, h: u32) -> Option<Rect> {
        let root = self.nodes[self.root].rect;
        let can_grow_down = w <= root.w;
        let can_grow_right = h <= root.h;

        // Grow along the shorter side so the result stays close to square.
        let should_grow_right = can_grow_right && root.h >= root.w + w;
        let should_grow_down = can_grow_down && root.w >= root.h + h;

        if should_grow_right {
            self.grow_right(w, h)
        } else if should_grow_down {
            self.grow_down(w, h)
        } else if can_grow_right {
            self.grow_right(w, h)
        } else if can_grow_down {
            self.grow_down(w, h)
        } else {
            None
        }
    }

    fn grow_right(&mut self, w: u32, h: u32) -> Option<Rect> {
        let old = self.root;
        let r = self.nodes[old].rect;
        let right = self.push(Node::free(Rect::new(r.w, 0, w, r.h)));
        self.root = self.push(Node {
            rect: Rect::new(0, 0, r.w + w, r.h),
            used: true,
            right: Some(right),
            down: Some(old),
        });
        self.place(w, h)
    }

    fn grow_down(&mut self, w: u32, h: u32) -> Option<Rect> {
        let old = self.root;
        let r = self.nodes[old].rect;
        let down = self.push(Node::free(Rect::new(0, r.h, r.w, h)));
        self.root = self.push(Node {
            rect: Rect::new(0, 0, r.w, r.h + h),
            used: true,
            right: Some(old),
            down: Some(down),
        });
        self.place(w, h)
    }

    fn place(&mut self, w: u32, h: u32) -> Option<Rect> {
        let idx = self.find_node(self.root, w, h)?;
        Some(self.split_node(idx, w, h))
    }
}

impl<K> Packer<K> for GrowingPacker {
    fn pack(&mut self, key: K, w: u32, h: u32) -> Option<Frame<K>> {
        let frame = match self.place(w, h) {
            Some(r) => r,
            None => self.grow_node(w, h)?,
        };
        Some(Frame { key, frame })
    }

    fn bounds(&self) -> (u32, u32) {
        let r = self.nodes[self.root].rect;
        (r.w, r.h)
    }
}

/// Result of [`pack_slots`]: the bounding box and one frame per input, in packing order.
#[derive(Debug, Clone)]
pub struct PackedLayout<K> {
    pub width: u32,
    pub height: u32,
    pub frames: Vec<Frame<K>>,
}

/// Packs `(key, w, h)` items with a [`GrowingPacker`].
///
/// Items are stably sorted by descending area first; the root starts at the size
/// of the largest item. Identical input yields identical placements.
pub fn pack_slots<K: Clone>(items: &[(K, u32, u32)]) -> Result<PackedLayout<K>> {
    let mut order: Vec<usize> = (0..items.len()).collect();
    order.sort_by(|&a, &b| {
        let area = |i: usize| (items[i].1 as u64) * (items[i].2 as u64);
        area(b).cmp(&area(a))
    });

    let Some(&first) = order.first() else {
        return Ok(PackedLayout {
            width: 0,
            height: 0,
            frames: Vec::new(),
        });
    };
    let mut packer = GrowingPacker::new(items[first].1, items[first].2);
    let mut frames = Vec::with_capacity(items.len());
    for (placed, &idx) in order.iter().enumerate() {
        let (key, w, h) = &items[idx];
        let frame = packer
            .pack(key.clone(), *w, *h)
            .ok_or(SpriteError::OutOfSpace {
                placed,
                total: items.len(),
            })?;
        frames.push(frame);
    }
    let (width, height) = <GrowingPacker as Packer<K>>::bounds(&packer);
    Ok(PackedLayout {
        width,
        height,
        frames,
    })
}
