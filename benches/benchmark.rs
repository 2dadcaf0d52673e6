use std::hint::black_box;

use criterion::{Criterion, criterion_group, criterion_main};

use peek::fact::compare;
use peek::rule::Rule;
use peek::store::FactStore;

fn populated(n: u64) -> FactStore {
    let mut facts = FactStore::new();
    for i in (0..n).rev() {
        facts.add(&format!("host:{}:port:{}=open", i % 97, i)).unwrap();
    }
    facts
}

pub fn criterion_benchmark(c: &mut Criterion) {
    c.bench_function("compare numeric", |b| {
        b.iter(|| compare(black_box("host:db12:port:8080"), black_box("host:db12:port:443")))
    });
    c.bench_function("compare separator", |b| {
        b.iter(|| compare(black_box("host:db12:"), black_box("host:db12:port")))
    });
    c.bench_function("add 1k", |b| b.iter(|| populated(black_box(1_000))));
    c.bench_function("add 100k", |b| b.iter(|| populated(black_box(100_000))));
    let facts = populated(100_000);
    c.bench_function("exists 100k", |b| {
        b.iter(|| facts.exists(black_box("host:42:port:99999")))
    });
    let rule = Rule::compile("web:host::port:").unwrap();
    c.bench_function("rule match", |b| {
        b.iter(|| rule.matches(black_box("host:db1:port:5432")))
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
