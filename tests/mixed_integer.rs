//! Branch and bound over the continuous backends
#![cfg(any(feature = "clarabel", feature = "microlp"))]

use float_eq::assert_float_eq;
use good_conic::parameters::MAX_NODES;
use good_conic::{
    equal_to, integral, less_than, nonnegative, variable, Backend, Model, ResolutionError,
    SolutionStatus, Variable,
};
#[cfg(target_arch = "wasm32")]
use wasm_bindgen_test::*;

const C: [f64; 4] = [7., 10., 1., 5.];

/// maximise c·x such that Σx <= 2.5, x integral and nonnegative
fn knapsack() -> (Model, Variable) {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut model = Model::new("mioinitsol");
    let x = model
        .add(variable().name("x").shape(4).domain(integral(nonnegative())))
        .unwrap();
    model
        .constraint("total", x.expr().sum(), less_than(2.5))
        .unwrap();
    model.maximise(x.expr().dot(&C).unwrap()).unwrap();
    (model, x)
}

fn check_knapsack<B: Backend>(backend: B) {
    let (mut model, x) = knapsack();
    let solution = model.solve_using(&backend).unwrap();
    assert_eq!(solution.status(), SolutionStatus::Optimal);
    assert_float_eq!(solution.objective_value().unwrap(), 20., abs <= 1e-6);
    let levels = solution.levels(&x).unwrap();
    assert_eq!(levels, vec![0., 2., 0., 0.]);
    assert!(solution.info().nodes > 0);
    assert!(solution.dual(model.constraint_reference("total").unwrap()).is_none());
}

#[test]
#[cfg(feature = "clarabel")]
#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test)]
fn knapsack_clarabel() {
    check_knapsack(good_conic::Clarabel);
}

#[test]
#[cfg(feature = "microlp")]
#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test)]
fn knapsack_microlp() {
    check_knapsack(good_conic::MicroLp);
}

#[test]
#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test)]
fn three_integer_columns() {
    let mut model = Model::new("three");
    let x = model.add(variable().shape(3).min(0).integer()).unwrap();
    model.add_constraint(x.expr().sum().leq(2.5)).unwrap();
    model.maximise(x.expr().dot(&[7., 10., 1.]).unwrap()).unwrap();
    let solution = model.solve().unwrap();
    assert_float_eq!(solution.objective_value().unwrap(), 20., abs <= 1e-6);
    assert_eq!(solution.levels(&x).unwrap(), vec![0., 2., 0.]);
}

#[test]
fn warm_start_with_gaps() {
    let (mut model, x) = knapsack();
    model.set_mip_gap(1e-4).unwrap();
    model.set_absolute_gap(0.).unwrap();
    model.set_time_limit(60.);
    model.set_initial_solution(&x, &[0., 2., 0., 0.]).unwrap();
    let solution = model.solve().unwrap();
    assert_float_eq!(solution.objective_value().unwrap(), 20., abs <= 1e-6);
    let info = solution.info();
    println!(
        "relative gap {:?}, absolute gap {:?}, nodes {}",
        info.relative_gap, info.absolute_gap, info.nodes
    );
    assert!(info.relative_gap.unwrap() <= 1e-4);
    assert!(info.best_bound.unwrap() >= 20. - 1e-6);
}

#[test]
fn partial_warm_start_is_completed() {
    let (mut model, x) = knapsack();
    let y = model.add(variable().integer().clamp(0, 3)).unwrap();
    model
        .maximise(x.expr().dot(&C).unwrap().sub(&y).unwrap())
        .unwrap();
    model.set_initial_solution(&x, &[1., 1., 0., 0.]).unwrap();
    let solution = model.solve().unwrap();
    assert_float_eq!(solution.objective_value().unwrap(), 20., abs <= 1e-6);
    assert_float_eq!(solution.value(&y).unwrap(), 0., abs <= 1e-9);
}

#[test]
fn node_limit_keeps_the_best_solution() {
    let (mut model, x) = knapsack();
    model.set_parameter(MAX_NODES, 1);
    match model.solve() {
        Err(ResolutionError::TimeLimitExceeded { best }) => assert!(best.is_none()),
        other => panic!("expected a limit, got {:?}", other),
    }

    model.set_initial_solution(&x, &[1., 1., 0., 0.]).unwrap();
    let error = model.solve().unwrap_err();
    let best = error.best_solution().expect("the warm start is kept");
    assert_eq!(best.status(), SolutionStatus::Feasible);
    assert_float_eq!(best.objective_value().unwrap(), 17., abs <= 1e-6);
    assert_eq!(best.levels(&x).unwrap(), vec![1., 1., 0., 0.]);
    assert!(model.solution().is_none());
}

#[test]
fn integer_infeasible() {
    let mut model = Model::new("odd");
    let x = model.add(variable().integer().clamp(-10, 10)).unwrap();
    model
        .add_constraint(x.expr().scale(2.).in_domain(equal_to(1.)))
        .unwrap();
    model.minimise(&x).unwrap();
    assert_eq!(model.solve(), Err(ResolutionError::Infeasible));
}

#[test]
fn empty_integer_bounds() {
    let mut model = Model::new("narrow");
    let x = model.add(variable().integer().clamp(0.2, 0.8)).unwrap();
    model.minimise(&x).unwrap();
    assert_eq!(model.solve(), Err(ResolutionError::Infeasible));
}

#[test]
fn binary_variables() {
    let weights = [3., 4., 5., 6.];
    let values = [4., 5., 6., 8.];
    let mut model = Model::new("binary knapsack");
    let take = model.add(variable().shape(4).binary()).unwrap();
    model
        .add_constraint(take.expr().dot(&weights).unwrap().leq(10.))
        .unwrap();
    model.maximise(take.expr().dot(&values).unwrap()).unwrap();
    let solution = model.solve().unwrap();
    // 4 + 6 weigh 10 and are worth 13
    assert_float_eq!(solution.objective_value().unwrap(), 13., abs <= 1e-6);
    assert_eq!(solution.levels(&take).unwrap(), vec![0., 1., 0., 1.]);
}
