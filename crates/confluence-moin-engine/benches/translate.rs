use confluence_moin_engine::translate;
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
mod common;

fn bench_translate_page(c: &mut Criterion) {
    let mut group = c.benchmark_group("translate");
    group.sample_size(10);

    for sections in [1, 10, 100] {
        let body = common::generate_page_body(sections);
        group.bench_with_input(BenchmarkId::new("page", sections), &body, |b, body| {
            b.iter(|| translate(std::hint::black_box(body)).unwrap());
        });
    }

    group.finish();
}

fn bench_nested_regions(c: &mut Criterion) {
    let mut group = c.benchmark_group("translate_regions");

    for depth in [4, 16, 64] {
        let body = common::generate_nested_regions(depth);
        group.bench_with_input(BenchmarkId::new("depth", depth), &body, |b, body| {
            b.iter(|| translate(std::hint::black_box(body)).unwrap());
        });
    }

    group.finish();
}

criterion_group!(benches, bench_translate_page, bench_nested_regions);
criterion_main!(benches);
