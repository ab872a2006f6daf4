use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use ndtad_reduce::{ExecutionStrategy, ExtraParams, Reduce3Config, Reduce3Executor, Reduce3Op};
use ndtad_tensor::{DataType, NdArray, Order};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn create_matrix(rows: usize, cols: usize, seed: u64) -> NdArray {
    let mut rng = StdRng::seed_from_u64(seed);
    let data: Vec<f32> = (0..rows * cols).map(|_| rng.random()).collect();
    NdArray::from_values(Order::C, &[rows, cols], &data).unwrap()
}

fn bench_scalar(c: &mut Criterion) {
    let mut group = c.benchmark_group("reduce3_scalar");
    let params = ExtraParams::default();

    for (rows, cols) in [(256, 256), (1024, 1024)] {
        let x = create_matrix(rows, cols, 1);
        let y = create_matrix(rows, cols, 2);
        let xt = x.permute_axes(&[1, 0]).unwrap();
        let yt = y.permute_axes(&[1, 0]).unwrap();
        group.throughput(criterion::Throughput::Elements((rows * cols) as u64));

        for strategy in [ExecutionStrategy::Serial, ExecutionStrategy::Auto] {
            let executor = Reduce3Executor::new(Reduce3Config::default().with_strategy(strategy));
            let mut z = NdArray::zero_scalar(DataType::F32).unwrap();

            group.bench_with_input(
                BenchmarkId::new(format!("euclidean_contiguous_{strategy:?}"), format!("{rows}x{cols}")),
                &(&x, &y),
                |b, &(x, y)| {
                    b.iter(|| {
                        executor
                            .exec_scalar(Reduce3Op::EuclideanDistance, x, y, &params, &mut z)
                            .unwrap()
                    })
                },
            );

            group.bench_with_input(
                BenchmarkId::new(format!("euclidean_permuted_{strategy:?}"), format!("{rows}x{cols}")),
                &(&xt, &yt),
                |b, &(x, y)| {
                    b.iter(|| {
                        executor
                            .exec_scalar(Reduce3Op::EuclideanDistance, x, y, &params, &mut z)
                            .unwrap()
                    })
                },
            );
        }
    }
    group.finish();
}

fn bench_axis(c: &mut Criterion) {
    let mut group = c.benchmark_group("reduce3_axis");
    let params = ExtraParams::default();

    for (rows, cols) in [(512, 128), (4096, 128)] {
        let x = create_matrix(rows, cols, 3);
        let y = create_matrix(rows, cols, 4);
        let executor = Reduce3Executor::default();

        let mut z = NdArray::from_shape(Order::C, &[rows], DataType::F32).unwrap();
        group.bench_with_input(
            BenchmarkId::new("cosine_rows", format!("{rows}x{cols}")),
            &(&x, &y),
            |b, &(x, y)| {
                b.iter(|| {
                    executor
                        .exec(Reduce3Op::CosineDistance, x, y, &params, &mut z, &[1])
                        .unwrap()
                })
            },
        );

        let mut z = NdArray::from_shape(Order::C, &[cols], DataType::F32).unwrap();
        group.bench_with_input(
            BenchmarkId::new("cosine_columns", format!("{rows}x{cols}")),
            &(&x, &y),
            |b, &(x, y)| {
                b.iter(|| {
                    executor
                        .exec(Reduce3Op::CosineDistance, x, y, &params, &mut z, &[0])
                        .unwrap()
                })
            },
        );
    }
    group.finish();
}

fn bench_all_pairs(c: &mut Criterion) {
    let mut group = c.benchmark_group("reduce3_all_pairs");
    let params = ExtraParams::default();

    let x = create_matrix(128, 64, 5);
    let y = create_matrix(256, 64, 6);
    let executor = Reduce3Executor::default();
    let mut z = NdArray::from_shape(Order::C, &[128, 256], DataType::F32).unwrap();

    group.bench_function("manhattan_128x256", |b| {
        b.iter(|| {
            executor
                .exec_all(Reduce3Op::ManhattanDistance, &x, &y, &params, &mut z, &[1])
                .unwrap()
        })
    });
    group.finish();
}

criterion_group!(benches, bench_scalar, bench_axis, bench_all_pairs);
criterion_main!(benches);
