use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use cresco::models::{Chunk, Document};
use cresco::services::vector_store::{EntryTable, IndexedChunk, MemoryIndex, VectorIndex};
use tokio::runtime::Runtime;

const DIMENSION: usize = 384;

/// Deterministic pseudo-random vector.
fn vector(seed: u64) -> Vec<f32> {
    let mut state = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
    (0..DIMENSION)
        .map(|_| {
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            ((state >> 33) as f32 / u32::MAX as f32) - 0.25
        })
        .collect()
}

fn chunk(i: u64) -> Chunk {
    let doc = Document::new(format!("doc-{i}.md"), format!("field note {i}"));
    Chunk::from_document(&doc, doc.text.clone(), 0)
}

fn table(size: u64) -> EntryTable {
    let table = EntryTable::new();
    table.publish(
        (0..size)
            .map(|i| IndexedChunk::new(&vector(i), chunk(i)))
            .collect(),
    );
    table
}

fn bench_table_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("entry_table_search");
    let query = vector(u64::MAX);

    for size in [1_000u64, 10_000, 50_000] {
        let table = table(size);
        group.throughput(Throughput::Elements(size));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| table.search(black_box(&query), 5));
        });
    }

    group.finish();
}

fn bench_top_k(c: &mut Criterion) {
    let mut group = c.benchmark_group("top_k");
    let table = table(10_000);
    let query = vector(7);

    for top_k in [1usize, 5, 50] {
        group.bench_with_input(BenchmarkId::from_parameter(top_k), &top_k, |b, &k| {
            b.iter(|| table.search(black_box(&query), k));
        });
    }

    group.finish();
}

fn bench_memory_index(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let index = MemoryIndex::new("bench", DIMENSION);
    let entries = (0..10_000u64).map(|i| (vector(i), chunk(i))).collect();
    rt.block_on(index.add(entries)).unwrap();
    let query = vector(42);

    c.bench_function("memory_index_search_10k", |b| {
        b.iter(|| rt.block_on(index.search(black_box(&query), 5)).unwrap());
    });
}

criterion_group!(benches, bench_table_search, bench_top_k, bench_memory_index);
criterion_main!(benches);
