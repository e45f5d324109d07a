use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;

use good_conic::{in_quadratic_cone, variable, Expression, Model};

pub fn criterion_benchmark(c: &mut Criterion) {
    c.bench_function("sum((2 x_i + 1) for i in [1..100_000])", |b| {
        b.iter(|| {
            let mut model = Model::new("sum");
            let x = model.add(variable().shape(100_000)).unwrap();
            let v: Expression = x
                .expr()
                .scale(black_box(2.))
                .add(black_box(1.))
                .unwrap()
                .sum();
            v
        })
    });

    c.bench_function(
        "solving empty problem with 1M variables and reading results",
        |b| {
            b.iter(|| {
                let mut model = Model::new("empty");
                let vs = model
                    .add(variable().min(0).name("test").shape(1_000_000))
                    .unwrap();
                let obj = vs.expr().sum();
                model.minimise(&obj).unwrap();
                let sol = model.solve().unwrap();
                sol.eval(&obj)
            })
        },
    );

    c.bench_function("flattening 1000 cones of dimension 10", |b| {
        let mut model = Model::new("cones");
        let x = model.add(variable().shape((1000, 10))).unwrap();
        model
            .add_constraint(x.expr().in_domain(in_quadratic_cone()))
            .unwrap();
        model.minimise(x.expr().sum()).unwrap();
        b.iter(|| black_box(model.to_flat().unwrap()))
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
