use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use descent::{linalg, Approximation, LeastSquaresMethod, Objective};

#[path = "common/mod.rs"]
mod common;
use common::*;

fn bench_gradient(c: &mut Criterion) {
    let mut group = c.benchmark_group("gradient");
    for n in [2, 10, 100] {
        let x = make_input(n);

        group.bench_with_input(BenchmarkId::new("f64_eval", n), &x, |b, x| {
            b.iter(|| black_box(rosenbrock_f64(black_box(x))))
        });

        for (name, method) in [
            ("forward", Approximation::Forward),
            ("central", Approximation::Central),
        ] {
            group.bench_with_input(BenchmarkId::new(name, n), &x, |b, x| {
                let mut obj = Objective::new(Rosenbrock).with_approximation(method);
                b.iter(|| black_box(obj.gradient(black_box(x))))
            });
        }
    }
    group.finish();
}

fn bench_hessian(c: &mut Criterion) {
    let mut group = c.benchmark_group("hessian");
    for n in [2, 10, 30] {
        let x = make_input(n);

        group.bench_with_input(BenchmarkId::new("from_values", n), &x, |b, x| {
            let mut obj = Objective::new(Rosenbrock);
            b.iter(|| black_box(obj.hessian(black_box(x))))
        });

        group.bench_with_input(BenchmarkId::new("from_gradient", n), &x, |b, x| {
            let mut obj = Objective::new(RosenbrockWithGradient);
            b.iter(|| black_box(obj.hessian(black_box(x))))
        });
    }
    group.finish();
}

fn bench_least_squares(c: &mut Criterion) {
    let mut group = c.benchmark_group("least_squares");
    for n in [10, 50, 200] {
        let a = make_spd(n);
        let rhs = make_rhs(n);
        for (name, method) in [
            ("svd", LeastSquaresMethod::Svd),
            ("normal_equations", LeastSquaresMethod::NormalEquations),
            ("qr", LeastSquaresMethod::Qr),
        ] {
            group.bench_with_input(BenchmarkId::new(name, n), &(&a, &rhs), |b, (a, rhs)| {
                b.iter(|| black_box(linalg::solve_least_squares(a, rhs, method)))
            });
        }
    }
    group.finish();
}

criterion_group!(benches, bench_gradient, bench_hessian, bench_least_squares);
criterion_main!(benches);
