use css_sprite_core::model::Frame;
use css_sprite_core::packer::{GrowingPacker, Packer, pack_slots};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn disjoint<K>(frames: &[Frame<K>]) -> bool {
    for i in 0..frames.len() {
        for j in (i + 1)..frames.len() {
            if frames[i].frame.overlaps(&frames[j].frame) {
                return false;
            }
        }
    }
    true
}

fn random_items(seed: u64, count: usize) -> Vec<(usize, u32, u32)> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|i| (i, rng.gen_range(1..=64), rng.gen_range(1..=64)))
        .collect()
}

#[test]
fn four_equal_squares_form_a_square() {
    let items = vec![("a", 10, 10), ("b", 10, 10), ("c", 10, 10), ("d", 10, 10)];
    let layout = pack_slots(&items).expect("pack");
    assert_eq!((layout.width, layout.height), (20, 20));
    let placed: Vec<(&str, u32, u32)> = layout
        .frames
        .iter()
        .map(|f| (f.key, f.frame.x, f.frame.y))
        .collect();
    assert_eq!(
        placed,
        vec![("a", 0, 0), ("b", 10, 0), ("c", 0, 10), ("d", 10, 10)]
    );
}

#[test]
fn larger_area_is_placed_first() {
    let items = vec![("small", 4, 4), ("big", 16, 16)];
    let layout = pack_slots(&items).expect("pack");
    assert_eq!(layout.frames[0].key, "big");
    assert_eq!((layout.frames[0].frame.x, layout.frames[0].frame.y), (0, 0));
    assert_eq!((layout.frames[1].frame.x, layout.frames[1].frame.y), (16, 0));
    assert_eq!((layout.width, layout.height), (20, 16));
}

#[test]
fn empty_input_has_empty_bounds() {
    let items: Vec<(u32, u32, u32)> = Vec::new();
    let layout = pack_slots(&items).expect("pack");
    assert_eq!((layout.width, layout.height), (0, 0));
    assert!(layout.frames.is_empty());
}

#[test]
fn random_batches_never_overlap_and_stay_in_bounds() {
    for seed in 0..20 {
        let items = random_items(seed, 60);
        let layout = pack_slots(&items).expect("pack");
        assert_eq!(layout.frames.len(), items.len());
        assert!(disjoint(&layout.frames), "overlap with seed {seed}");
        for f in &layout.frames {
            assert!(f.frame.x2() <= layout.width);
            assert!(f.frame.y2() <= layout.height);
        }
        let max_x = layout.frames.iter().map(|f| f.frame.x2()).max().unwrap_or(0);
        let max_y = layout.frames.iter().map(|f| f.frame.y2()).max().unwrap_or(0);
        assert_eq!((max_x, max_y), (layout.width, layout.height));
    }
}

#[test]
fn identical_input_gives_identical_layout() {
    let items = random_items(7, 100);
    let a = pack_slots(&items).expect("pack a");
    let b = pack_slots(&items).expect("pack b");
    assert_eq!((a.width, a.height), (b.width, b.height));
    let ra: Vec<_> = a.frames.iter().map(|f| (f.key, f.frame)).collect();
    let rb: Vec<_> = b.frames.iter().map(|f| (f.key, f.frame)).collect();
    assert_eq!(ra, rb);
}

#[test]
fn packer_trait_reports_growing_bounds() {
    let mut packer = GrowingPacker::new(8, 8);
    let first = packer.pack("a", 8, 8).expect("fits root");
    assert_eq!((first.frame.x, first.frame.y), (0, 0));
    let second = packer.pack("b", 8, 8).expect("grows");
    assert_eq!((second.frame.x, second.frame.y), (8, 0));
    assert_eq!(<GrowingPacker as Packer<&str>>::bounds(&packer), (16, 8));
}
