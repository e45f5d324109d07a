use float_eq::assert_float_eq;
use good_conic::{variable, Expression, Matrix, Model};

const BIG_NUM: usize = 1000; // <- Set this higher to test how good_conic and the solvers scale

/// x[i] + 1 <= x[i + 1], as a sparse difference matrix
fn increasing(n: usize) -> Matrix {
    let rows: Vec<usize> = (0..n - 1).flat_map(|i| [i, i]).collect();
    let cols: Vec<usize> = (0..n - 1).flat_map(|i| [i, i + 1]).collect();
    let values: Vec<f64> = (0..n - 1).flat_map(|_| [1., -1.]).collect();
    Matrix::sparse(n - 1, n, &rows, &cols, &values).unwrap()
}

#[test]
#[cfg(any(feature = "clarabel", feature = "microlp"))]
fn solve_large_problem() {
    let mut model = Model::new("large");
    let min = -((BIG_NUM / 2) as f64);
    let max = (BIG_NUM / 2 - 1) as f64;
    let v = model
        .add(variable().shape(BIG_NUM).min(min).max(max))
        .unwrap();
    model.maximise(v.expr().sum()).unwrap();
    let steps = increasing(BIG_NUM).mul(&v.expr()).unwrap();
    model.add_constraint(steps.leq(-1.)).unwrap();
    let sol = model.solve().unwrap();
    for (i, level) in sol.levels(&v).unwrap().into_iter().enumerate() {
        assert_float_eq!(level, min + i as f64, abs <= 1e-4);
    }
}

#[test]
fn add_10_000_constraints() {
    let mut model = Model::new("many constraints");
    let v = model.add(variable().shape(10_000)).unwrap();
    model.maximise(v.get(0).unwrap()).unwrap();
    for i in 0..9_999 {
        let step = v.get(i).unwrap().sub(v.get(i + 1).unwrap()).unwrap();
        model.add_constraint(step.leq(-1.)).unwrap();
    }
    assert_eq!(model.to_flat().unwrap().rows().len(), 9_999);
}

#[test]
fn sum_binaries() {
    let mut model = Model::new("binaries");
    let team1_bools = model.add(variable().shape(BIG_NUM).binary()).unwrap();
    let team1_score: Expression = team1_bools.expr().sum();
    let _constraint = team1_score.eq(5.);
}
