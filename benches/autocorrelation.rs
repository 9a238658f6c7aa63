use adaptive_mcmc::chain::ChainRecord;
use adaptive_mcmc::stats::{autocorrelation, effective_sample_size};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ndarray::Array2;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;

fn random_chain(rng: &mut SmallRng, n: usize, dim: usize) -> ChainRecord {
    ChainRecord::from_samples(Array2::from_shape_fn((n, dim), |_| {
        rng.sample::<f64, _>(StandardNormal)
    }))
}

fn bench_autocorrelation(c: &mut Criterion) {
    let mut rng = SmallRng::seed_from_u64(42);
    let mut group = c.benchmark_group("autocorrelation");
    // 100 and below take the direct sum, longer series the FFT
    for n in [50, 100, 1_000, 10_000] {
        let chain = random_chain(&mut rng, n, 4);
        group.bench_with_input(BenchmarkId::from_parameter(n), &chain, |b, chain| {
            b.iter(|| autocorrelation(black_box(chain), 0, n - 1).unwrap())
        });
    }
    group.finish();
}

fn bench_effective_sample_size(c: &mut Criterion) {
    let mut rng = SmallRng::seed_from_u64(7);
    let chains: Vec<ChainRecord> = (0..4).map(|_| random_chain(&mut rng, 5_000, 10)).collect();
    c.bench_function("effective_sample_size 4x5000x10", |b| {
        b.iter(|| effective_sample_size(black_box(&chains), 1_000).unwrap())
    });
}

criterion_group!(benches, bench_autocorrelation, bench_effective_sample_size);
criterion_main!(benches);
