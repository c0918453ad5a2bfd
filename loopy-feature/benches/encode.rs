use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use loopy_core::Algorithm;
use loopy_feature::{sparse_compress_chunked_features, SparseLayout};
use loopy_io::{ColumnData, Table};

// ~5% non-zero counts, deterministic LCG.
fn counts(n_spots: usize, n_genes: usize) -> Table {
    let mut state: u64 = 7;
    let index = (0..n_spots).map(|i| format!("spot{i}")).collect();
    (0..n_genes).fold(Table::new(index), |t, g| {
        let col = (0..n_spots)
            .map(|_| {
                state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
                if (state >> 33) % 20 == 0 {
                    ((state >> 40) % 50) as f64
                } else {
                    0.0
                }
            })
            .collect();
        t.with_column(format!("gene{g}"), ColumnData::Numeric(col))
            .expect("unique gene names")
    })
}

fn bench_sparse(c: &mut Criterion) {
    let mut group = c.benchmark_group("sparse_encode");
    let table = counts(4000, 500);
    group.throughput(Throughput::Elements(500));
    for layout in [SparseLayout::Csc, SparseLayout::Csr] {
        group.bench_with_input(
            BenchmarkId::new(format!("{layout:?}"), "4000x500"),
            &table,
            |b, t| {
                b.iter(|| {
                    sparse_compress_chunked_features(
                        black_box(t),
                        layout,
                        Algorithm::Gzip,
                        &mut |_| {},
                    )
                })
            },
        );
    }
    group.finish();
}

criterion_group!(benches, bench_sparse);
criterion_main!(benches);
