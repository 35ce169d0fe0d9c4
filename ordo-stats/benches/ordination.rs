use criterion::{black_box, criterion_group, criterion_main, Criterion};
use ordo_core::{Distances, Taxa};
use ordo_stats::ellipse::fit_ellipse;
use ordo_stats::pcoa::pcoa;

fn random_points(n: usize, dim: usize, seed: u64) -> Vec<Vec<f64>> {
    let mut state = seed;
    (0..n)
        .map(|_| {
            (0..dim)
                .map(|_| {
                    state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
                    (state >> 11) as f64 / (1u64 << 53) as f64
                })
                .collect()
        })
        .collect()
}

fn euclidean_distances(points: &[Vec<f64>]) -> (Taxa, Distances) {
    let n = points.len();
    let taxa = Taxa::from_labels((0..n).map(|i| format!("sample{}", i))).unwrap();
    let mut d = Distances::new(n);
    for i in 0..n {
        for j in (i + 1)..n {
            let dist = points[i]
                .iter()
                .zip(&points[j])
                .map(|(a, b)| (a - b).powi(2))
                .sum::<f64>()
                .sqrt();
            d.set(i + 1, j + 1, dist);
        }
    }
    (taxa, d)
}

fn bench_pcoa(c: &mut Criterion) {
    let mut group = c.benchmark_group("pcoa");

    let (taxa_50, d_50) = euclidean_distances(&random_points(50, 10, 42));
    group.bench_function("50_samples", |b| {
        b.iter(|| pcoa(black_box(&taxa_50), black_box(&d_50)))
    });

    let (taxa_200, d_200) = euclidean_distances(&random_points(200, 10, 7));
    group.sample_size(10);
    group.bench_function("200_samples", |b| {
        b.iter(|| pcoa(black_box(&taxa_200), black_box(&d_200)))
    });

    group.finish();
}

fn bench_ellipse(c: &mut Criterion) {
    let mut group = c.benchmark_group("ellipse");

    let points: Vec<[f64; 2]> = (0..1_000)
        .map(|i| {
            let t = i as f64 * 0.00628;
            [5.0 * t.cos() + 1.0, 2.0 * t.sin() - 3.0]
        })
        .collect();
    group.bench_function("1k_points", |b| b.iter(|| fit_ellipse(black_box(&points))));

    group.finish();
}

criterion_group!(benches, bench_pcoa, bench_ellipse);
criterion_main!(benches);
