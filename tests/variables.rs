use good_conic::{variable, Expression, Matrix, Model};

#[cfg(target_arch = "wasm32")]
use wasm_bindgen_test::*;

#[test]
#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test)]
fn complex_expression() {
    let mut model = Model::new("expressions");
    let v = model.add(variable().shape(4)).unwrap();
    // 9 (a - 2 b) + 4 c / 2 - d
    let a_minus_2b = v.get(0).unwrap().sub(v.get(1).unwrap().scale(2.)).unwrap();
    let left = a_minus_2b
        .scale(9.)
        .add(v.get(2).unwrap().scale(4.).scale(0.5))
        .unwrap()
        .sub(v.get(3).unwrap())
        .unwrap();
    let right = v.expr().dot(&[9., -18., 2., -1.]).unwrap();
    assert_eq!(left, right);
}

#[test]
#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test)]
fn large_sum() {
    let mut model = Model::new("sum");
    let v = model.add(variable().shape(100_000)).unwrap();
    let elements: Vec<Expression> = (0..100_000).map(|i| v.get(i).unwrap()).collect();
    let sum_reverse = Expression::vstack(&elements.into_iter().rev().collect::<Vec<_>>())
        .unwrap()
        .sum();
    assert_eq!(v.expr().sum(), sum_reverse)
}

#[test]
#[cfg(not(target_arch = "wasm32"))]
fn element_access_on_a_large_variable() {
    let mut model = Model::new("large");
    let v = model.add(variable().shape((1000, 1000))).unwrap();
    let start = std::time::Instant::now();
    for i in 0..100_000 {
        let element = v.index_at(&[i % 1000, i / 100]).unwrap();
        assert_eq!(element.size(), 1);
    }
    let row = v.slice(&[999, 0], &[1000, 3]).unwrap();
    assert!(start.elapsed() < std::time::Duration::from_secs(10));
    assert_eq!(row.shape().dims(), &[1, 3]);
    let mut values = vec![0.; 1_000_000];
    values[999_001] = 7.;
    assert_eq!(row.eval_with(&values), vec![0., 7., 0.]);
    assert!(v.get(0).is_err());
}

#[test]
#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test)]
fn debug_format() {
    let mut model = Model::new("debug");
    let v = model.add(variable().shape(2)).unwrap();
    // 9 (1 + a + b / 3) <= a + 1
    let lhs = v.expr().dot(&[1., 1. / 3.]).unwrap().add(1.).unwrap().scale(9.);
    let difference = lhs.sub(v.get(0).unwrap().add(1.).unwrap()).unwrap();
    let expr_str = format!("{:?}", difference);
    assert_eq!(expr_str, "Expression() [8 c0 + 3 c1 + 8]");
}

#[test]
#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test)]
fn shaped_algebra() {
    let mut model = Model::new("shapes");
    let x = model.add(variable().shape((2, 3))).unwrap();
    assert_eq!(x.expr().transpose().shape().dims(), &[3, 2]);
    assert_eq!(x.slice(&[0, 1], &[2, 3]).unwrap().size(), 4);
    assert_eq!(x.expr().flatten().shape().dims(), &[6]);
    let m = Matrix::identity(2);
    assert_eq!(m.mul(&x.expr()).unwrap(), x.expr());
    let values = [1., 2., 3., 4., 5., 6.];
    assert_eq!(
        x.expr().transpose().eval_with(&values),
        vec![1., 4., 2., 5., 3., 6.]
    );
    assert_eq!(x.index_at(&[1, 2]).unwrap().eval_with(&values), vec![6.]);
    assert!(x.index_at(&[2, 0]).is_err());
}

#[test]
#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test)]
#[cfg(any(feature = "clarabel", feature = "microlp"))]
fn integer_variable() {
    use good_conic::{greater_than, less_than};

    let mut model = Model::new("integer");
    let a = model.add(variable().name("a").max(1)).unwrap();
    let b = model.add(variable().name("b").integer().clamp(2, 4)).unwrap();
    let ab = Expression::vstack(&[a.expr(), b.expr()]).unwrap();
    model.constraint("gap", ab.dot(&[1., -1.]).unwrap(), less_than(-2.)).unwrap();
    model.constraint("floor", ab.sum(), greater_than(3.)).unwrap();
    model.maximise(ab.dot(&[10., -3.]).unwrap()).unwrap();
    let solution = model.solve().expect("solve");
    assert!((solution.value(&a).unwrap() - 1.).abs() < 1e-5);
    assert!((solution.value(&b).unwrap() - 3.).abs() < 1e-5);
}
