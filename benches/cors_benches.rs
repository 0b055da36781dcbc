use std::hint::black_box;

use corsica::config::{build, CorsPolicy};
use corsica::headers::HeaderNameSet;
use corsica::origin::parse_pattern;
use corsica::tree::OriginTree;
use criterion::{criterion_group, criterion_main, Criterion};

fn build_tree(pattern_count: usize) -> OriginTree {
    let mut tree = OriginTree::new();
    for i in 0..pattern_count {
        let pattern = parse_pattern(&format!("https://svc{i:03}.bench.example.com")).unwrap();
        tree.insert_pattern(&pattern);
    }
    let wildcard = parse_pattern("https://*.wildcard.example.com").unwrap();
    tree.insert_pattern(&wildcard);
    tree
}

fn bench_tree_contains_hit(c: &mut Criterion) {
    let tree = build_tree(256);
    c.bench_function("tree_contains_exact_hit", |b| {
        b.iter(|| {
            let found = tree.contains(black_box("https"), black_box("svc128.bench.example.com"), None);
            black_box(found);
        })
    });
}

fn bench_tree_contains_wildcard_hit(c: &mut Criterion) {
    let tree = build_tree(256);
    c.bench_function("tree_contains_wildcard_hit", |b| {
        b.iter(|| {
            let found = tree.contains(
                black_box("https"),
                black_box("deeply.nested.wildcard.example.com"),
                None,
            );
            black_box(found);
        })
    });
}

fn bench_tree_contains_miss(c: &mut Criterion) {
    let tree = build_tree(256);
    c.bench_function("tree_contains_suffix_attack_miss", |b| {
        b.iter(|| {
            let found = tree.contains(black_box("https"), black_box("evilsvc128.bench.example.com"), None);
            black_box(found);
        })
    });
}

fn bench_header_set_subsumes(c: &mut Criterion) {
    let mut set = HeaderNameSet::with_capacity(16);
    for name in ["accept", "content-type", "authorization", "x-request-id", "x-trace-id"] {
        set.insert(name).unwrap();
    }
    let value = " accept , content-type ,authorization,,x-request-id , x-trace-id ";
    c.bench_function("header_set_subsumes", |b| {
        b.iter(|| {
            black_box(set.subsumes(black_box(value)));
        })
    });
}

fn bench_config_build(c: &mut Criterion) {
    let policy = CorsPolicy::builder()
        .origins((0..32).map(|i| format!("https://svc{i:03}.bench.example.com")))
        .method("GET")
        .method("POST")
        .method("PUT")
        .request_headers(["accept", "content-type", "authorization"])
        .response_headers(["x-request-id"])
        .credentialed(true)
        .finish();

    c.bench_function("config_build", |b| {
        b.iter(|| {
            black_box(build(black_box(&policy)).unwrap());
        })
    });
}

fn criterion_benches(c: &mut Criterion) {
    bench_tree_contains_hit(c);
    bench_tree_contains_wildcard_hit(c);
    bench_tree_contains_miss(c);
    bench_header_set_subsumes(c);
    bench_config_build(c);
}

criterion_group!(benches, criterion_benches);
criterion_main!(benches);
