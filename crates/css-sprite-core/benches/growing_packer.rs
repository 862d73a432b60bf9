use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use css_sprite_core::grouping::{GroupInput, group_by_size};
use css_sprite_core::packer::pack_slots;
use css_sprite_core::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::hint::black_box;

fn generate_slots(count: usize, min_size: u32, max_size: u32) -> Vec<(String, u32, u32)> {
    let mut rng = StdRng::seed_from_u64(42);
    (0..count)
        .map(|i| {
            let w = rng.gen_range(min_size..=max_size);
            let h = rng.gen_range(min_size..=max_size);
            (format!("icon_{}", i), w, h)
        })
        .collect()
}

fn bench_pack_slots(c: &mut Criterion) {
    let mut group = c.benchmark_group("growing_packer");

    for count in [50, 200, 1000] {
        let slots = generate_slots(count, 8, 64);
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::new("pack_slots", count), &slots, |b, slots| {
            b.iter(|| black_box(pack_slots(slots)));
        });
    }

    group.finish();
}

fn bench_grouping(c: &mut Criterion) {
    let mut group = c.benchmark_group("size_grouping");
    let mut rng = StdRng::seed_from_u64(7);
    let inputs: Vec<GroupInput> = (0..1000)
        .map(|index| GroupInput {
            index,
            encoded_size: rng.gen_range(100..20_000),
            placed: index % 10 == 0,
        })
        .collect();

    group.bench_function("group_by_size_64k", |b| {
        b.iter(|| black_box(group_by_size(&inputs, 64 * 1024)));
    });

    group.finish();
}

fn bench_shorthand(c: &mut Criterion) {
    let mut group = c.benchmark_group("background_shorthand");
    let base: Declaration = [
        ("width", "16px"),
        ("background", "#fff url(icons/a.png) no-repeat -16px 0 scroll"),
    ]
    .into_iter()
    .collect();

    group.bench_function("decompose_merge", |b| {
        b.iter(|| {
            let mut d = base.clone();
            d.decompose();
            d.merge();
            black_box(d)
        });
    });

    group.finish();
}

criterion_group!(benches, bench_pack_slots, bench_grouping, bench_shorthand);
criterion_main!(benches);
