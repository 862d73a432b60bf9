/// One image offered to [`group_by_size`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupInput {
    /// Caller-side index of the image reference.
    pub index: usize,
    /// Estimated encoded size in bytes.
    pub encoded_size: u64,
    /// Already drawn into a composite by an earlier unit.
    pub placed: bool,
}

/// Images committed to share one composite.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Batch {
    /// Caller-side indices, in grouping order.
    pub members: Vec<usize>,
    /// Members reuse an existing placement; nothing is packed or drawn.
    pub passthrough: bool,
}

impl Batch {
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// Partitions images into batches whose summed `encoded_size` stays within
/// `max_bytes` (0 = unlimited).
///
/// - Unlimited: one batch with every unplaced image, in input order (possibly empty).
/// - Limited: stable sort by descending size, then greedy accumulation. A batch is
///   closed when adding the next image would exceed the limit and the batch is not
///   empty; a single image larger than the limit gets a batch of its own.
/// - Already placed images are appended as a trailing passthrough batch.
///
/// The sizes are per-image estimates; the encoded composite may come out larger or
/// smaller than the sum, so the limit is a soft bound.
pub fn group_by_size(inputs: &[GroupInput], max_bytes: u64) -> Vec<Batch> {
    let (placed, mut pending): (Vec<GroupInput>, Vec<GroupInput>) =
        inputs.iter().copied().partition(|i| i.placed);

    let mut out = Vec::new();
    if max_bytes == 0 {
        out.push(Batch {
            members: pending.iter().map(|i| i.index).collect(),
            passthrough: false,
        });
    } else {
        pending.sort_by(|a, b| b.encoded_size.cmp(&a.encoded_size));
        let mut total = 0u64;
        let mut current: Vec<usize> = Vec::new();
        for item in &pending {
            total = total.saturating_add(item.encoded_size);
            if total > max_bytes && !current.is_empty() {
                out.push(Batch {
                    members: std::mem::take(&mut current),
                    passthrough: false,
                });
                total = item.encoded_size;
            }
            current.push(item.index);
        }
        if !current.is_empty() {
            out.push(Batch {
                members: current,
                passthrough: false,
            });
        }
    }

    if !placed.is_empty() {
        out.push(Batch {
            members: placed.iter().map(|i| i.index).collect(),
            passthrough: true,
        });
    }
    out
}
