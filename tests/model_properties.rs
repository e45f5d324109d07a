//! Properties every model should have, whatever it describes
use float_eq::assert_float_eq;
use good_conic::{
    in_rotated_quadratic_cone, less_than, nonnegative, variable, BuildError, Expression, Matrix,
    Model, ResolutionError,
};
#[cfg(target_arch = "wasm32")]
use wasm_bindgen_test::*;

#[test]
#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test)]
fn rotated_cone_needs_three_elements() {
    let mut model = Model::new("small cone");
    let x = model.add(variable().shape(2)).unwrap();
    let result = model.add_constraint(x.expr().in_domain(in_rotated_quadratic_cone()));
    assert!(matches!(result, Err(BuildError::ShapeMismatch(_))));
    assert!(model
        .declare_variable(2, in_rotated_quadratic_cone())
        .is_err());
    assert!(model.declare_variable(3, in_rotated_quadratic_cone()).is_ok());
}

#[test]
#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test)]
fn contradictory_bounds() {
    let mut model = Model::new("bounds");
    assert!(matches!(
        model.add(variable().min(5).max(2)),
        Err(BuildError::InvalidDomain(_))
    ));
    assert_eq!(model.num_variables(), 0);
}

#[test]
#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test)]
fn duplicate_names() {
    let mut model = Model::new("names");
    let x = model.add(variable().name("x")).unwrap();
    assert_eq!(
        model.add(variable().name("x")),
        Err(BuildError::DuplicateName("x".to_string()))
    );
    model.constraint("c", x.expr(), nonnegative()).unwrap();
    assert_eq!(
        model.constraint("c", x.expr(), nonnegative()),
        Err(BuildError::DuplicateName("c".to_string()))
    );
    // variables and constraints do not share names
    model.constraint("x", x.expr(), less_than(3.)).unwrap();
}

#[test]
#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test)]
fn mismatched_shapes() {
    let mut model = Model::new("shapes");
    let x = model.add(variable().shape(3)).unwrap();
    let y = model.add(variable().shape(2)).unwrap();
    assert!(matches!(x.expr().add(&y), Err(BuildError::ShapeMismatch(_))));
    assert!(x.expr().dot(&[1., 2.]).is_err());
    let m = Matrix::dense(2, 2, &[1., 0., 0., 1.]).unwrap();
    assert!(m.mul(&x.expr()).is_err());
    assert!(model.minimise(&x).is_err());
}

#[cfg(any(feature = "clarabel", feature = "microlp"))]
mod solved {
    use super::*;

    /// maximise x + 2y with x, y >= 0 and x + y <= 4
    fn simple() -> (Model, good_conic::Variable) {
        let _ = env_logger::builder().is_test(true).try_init();
        let mut model = Model::new("simple");
        let x = model.add(variable().name("x").shape(2).min(0)).unwrap();
        model.constraint("sum", x.expr().sum(), less_than(4.)).unwrap();
        model.maximise(x.expr().dot(&[1., 2.]).unwrap()).unwrap();
        (model, x)
    }

    #[test]
    #[cfg_attr(target_arch = "wasm32", wasm_bindgen_test)]
    fn levels_follow_the_shape() {
        let mut model = Model::new("levels");
        let x = model.add(variable().shape((2, 3)).clamp(1, 2)).unwrap();
        model.minimise(x.expr().sum()).unwrap();
        let solution = model.solve().unwrap();
        let levels = solution.levels(&x).unwrap();
        assert_eq!(levels.len(), 6);
        for level in levels {
            assert_float_eq!(level, 1., abs <= 1e-6);
        }
        assert_eq!(solution.value(&x), None);
    }

    #[test]
    #[cfg_attr(target_arch = "wasm32", wasm_bindgen_test)]
    fn tightening_never_improves_the_objective() {
        let (mut model, x) = simple();
        let loose = model.solve().unwrap().objective_value().unwrap();
        model
            .add_constraint(x.get(1).unwrap().leq(3.))
            .unwrap();
        let tight = model.solve().unwrap().objective_value().unwrap();
        assert_float_eq!(loose, 8., abs <= 1e-6);
        assert_float_eq!(tight, 7., abs <= 1e-6);
        assert!(tight <= loose + 1e-9);
    }

    #[test]
    #[cfg_attr(target_arch = "wasm32", wasm_bindgen_test)]
    fn same_model_same_solution() {
        let (mut first, x) = simple();
        let (mut second, y) = simple();
        let a = first.solve().unwrap();
        let b = second.solve().unwrap();
        assert_eq!(a.levels(&x), b.levels(&y));
        assert_eq!(a.objective_value(), b.objective_value());
    }

    #[test]
    #[cfg_attr(target_arch = "wasm32", wasm_bindgen_test)]
    fn solutions_belong_to_an_epoch() {
        let (mut model, x) = simple();
        let solution = model.solve().unwrap();
        assert_eq!(solution.epoch(), model.epoch());
        assert_eq!(model.solution(), Some(&solution));
        // solving an unchanged model gives back the same solution
        assert_eq!(model.solve().unwrap(), solution);

        // a rejected objective leaves the model and its solution untouched
        assert!(model.minimise(&x).is_err());
        assert_eq!(model.solution(), Some(&solution));
        model.minimise(x.expr().sum()).unwrap();
        assert!(model.solution().is_none());
        let resolved = model.solve().unwrap();
        assert!(resolved.epoch() > solution.epoch());
        assert_float_eq!(resolved.objective_value().unwrap(), 0., abs <= 1e-6);
    }

    #[test]
    #[cfg_attr(target_arch = "wasm32", wasm_bindgen_test)]
    fn infeasible_and_unbounded() {
        let mut model = Model::new("infeasible");
        let x = model.add(variable().min(0)).unwrap();
        model.add_constraint(x.expr().leq(-1.)).unwrap();
        model.minimise(&x).unwrap();
        assert_eq!(model.solve(), Err(ResolutionError::Infeasible));

        let mut model = Model::new("unbounded");
        let x = model.add(variable().min(0)).unwrap();
        model.maximise(&x).unwrap();
        assert_eq!(model.solve(), Err(ResolutionError::Unbounded));
    }

    #[test]
    #[cfg_attr(target_arch = "wasm32", wasm_bindgen_test)]
    fn objective_is_required() {
        let mut model = Model::new("no objective");
        model.add(variable().min(0)).unwrap();
        assert!(matches!(model.solve(), Err(ResolutionError::InvalidModel(_))));
    }

    /// maximise c·x such that A x <= b, x >= 0, then grow the model twice
    #[test]
    #[cfg_attr(target_arch = "wasm32", wasm_bindgen_test)]
    fn production_planning_grows() {
        let _ = env_logger::builder().is_test(true).try_init();
        let c = [1.5, 2.5, 3.0];
        let a = Matrix::from_rows(&[[2., 4., 3.], [3., 2., 3.], [2., 3., 2.]]).unwrap();
        let b = [100_000., 50_000., 60_000.];
        let mut model = Model::new("production");
        let x = model.add(variable().name("x").shape(3).min(0)).unwrap();
        model
            .constraint("capacity", a.mul(&x.expr()).unwrap(), less_than(b))
            .unwrap();
        model.maximise(x.expr().dot(&c).unwrap()).unwrap();
        let solution = model.solve().unwrap();
        assert_float_eq!(solution.objective_value().unwrap(), 58_000., abs <= 1e-2);

        // a new product, using [4, 0, 1] of the resources, worth 1.
        // The new capacity constraint makes the first one redundant.
        let x3 = model.add(variable().name("x3").min(0)).unwrap();
        let used = a
            .mul(&x.expr())
            .unwrap()
            .add(
                Expression::vstack(&[x3.expr().scale(4.), Expression::scalar(0.), x3.expr()])
                    .unwrap(),
            )
            .unwrap();
        model.constraint("capacity with x3", used, less_than(b)).unwrap();
        let all = Expression::vstack(&[x.expr(), x3.expr()]).unwrap();
        model.maximise(all.dot(&[1.5, 2.5, 3.0, 1.0]).unwrap()).unwrap();
        let grown = model.solve().unwrap();
        assert_float_eq!(grown.objective_value().unwrap(), 62_500., abs <= 1e-2);
        assert_eq!(grown.levels(&x).map(|l| l.len()), Some(3));

        model
            .constraint("labour", all.dot(&[1., 2., 1., 1.]).unwrap(), less_than(30_000.))
            .unwrap();
        let constrained = model.solve().unwrap();
        assert_float_eq!(constrained.objective_value().unwrap(), 62_500., abs <= 1e-2);
        let labour = constrained.eval(&all.dot(&[1., 2., 1., 1.]).unwrap()).unwrap();
        assert!(labour[0] <= 30_000. + 1e-2);
    }
}
