//! Quadratic objectives, solved by the interior point backend
#[cfg(feature = "clarabel")]
mod quadratic_integration_tests {
    use float_eq::assert_float_eq;
    use good_conic::{
        equal_to, greater_than, variable, Matrix, Model, QuadraticExpression, ResolutionError,
    };

    #[test]
    fn test_constrained_quadratic_with_bounds() {
        let _ = env_logger::builder().is_test(true).try_init();
        let mut model = Model::new("bounded");
        let x = model.add(variable().clamp(-2, 2)).unwrap();
        // Minimize x^2 - x
        let objective = x.expr().product(&x.expr().sub(1.).unwrap()).unwrap();
        println!("Objective: {:?}", objective);
        model.minimise(objective).unwrap();
        let solution = model.solve().expect("Bounded quadratic should solve");
        // Unconstrained minimum is at x=0.5, which satisfies the bounds
        assert_float_eq!(solution.value(&x).unwrap(), 0.5, abs <= 1e-4);
        assert_float_eq!(solution.objective_value().unwrap(), -0.25, abs <= 1e-6);
    }

    #[test]
    fn test_quadratic_with_equality_constraints() {
        let mut model = Model::new("equalities");
        let v = model.add(variable().shape(3)).unwrap();
        // Minimize x^2 + y^2 + z^2 subject to x + y + z = 6 and x - y + 2z = 4
        let a = Matrix::from_rows(&[[1., 1., 1.], [1., -1., 2.]]).unwrap();
        model
            .constraint("equalities", a.mul(&v.expr()).unwrap(), equal_to([6., 4.]))
            .unwrap();
        model.minimise(v.expr().sum_squares()).unwrap();
        let solution = model.solve().expect("Quadratic with equality constraints should solve");
        for level in solution.levels(&v).unwrap() {
            assert_float_eq!(level, 2.0, abs <= 1e-4);
        }
        assert_float_eq!(solution.objective_value().unwrap(), 12.0, abs <= 1e-5);
    }

    #[test]
    fn test_quadratic_with_inequality_constraints() {
        let mut model = Model::new("inequality");
        let v = model.add(variable().shape(2)).unwrap();
        // Minimize x^2 + y^2 subject to x + y ≥ 4
        model.add_constraint(v.expr().sum().geq(4.)).unwrap();
        model.minimise(v.expr().sum_squares()).unwrap();
        let solution = model.solve().expect("Quadratic with inequality should solve");
        // By symmetry, the minimum occurs at x = 2, y = 2
        let levels = solution.levels(&v).unwrap();
        assert_float_eq!(levels[0], 2.0, abs <= 1e-4);
        assert_float_eq!(levels[1], 2.0, abs <= 1e-4);
        assert!(levels[0] + levels[1] >= 4.0 - 1e-6);
    }

    #[test]
    fn test_quadratic_with_mixed_constraints() {
        let mut model = Model::new("mixed");
        let v = model.add(variable().shape(2)).unwrap();
        // Minimize (x-1)^2 + (y-3)^2 subject to x + y = 5, x ≥ 0
        model.add_constraint(v.expr().sum().eq(5.)).unwrap();
        model
            .constraint("positive x", v.get(0).unwrap(), greater_than(0.))
            .unwrap();
        model
            .minimise(v.expr().sub(vec![1., 3.]).unwrap().sum_squares())
            .unwrap();
        let solution = model.solve().expect("Quadratic with mixed constraints should solve");
        let levels = solution.levels(&v).unwrap();
        assert_float_eq!(levels[0], 1.5, abs <= 1e-4);
        assert_float_eq!(levels[1], 3.5, abs <= 1e-4);
        assert_float_eq!(solution.objective_value().unwrap(), 0.5, abs <= 1e-5);
    }

    #[test]
    fn test_quadratic_maximization_problem() {
        let mut model = Model::new("concave");
        let v = model.add(variable().shape(2).clamp(0, 10)).unwrap();
        // Maximize -x^2 - y^2 + 8x + 6y = 25 - (x-4)^2 - (y-3)^2
        let objective = QuadraticExpression::from(25.)
            - v.expr().sub(vec![4., 3.]).unwrap().sum_squares();
        model.maximise(objective).unwrap();
        let solution = model.solve().expect("Quadratic maximization should solve");
        let levels = solution.levels(&v).unwrap();
        assert_float_eq!(levels[0], 4.0, abs <= 1e-4);
        assert_float_eq!(levels[1], 3.0, abs <= 1e-4);
        assert_float_eq!(solution.objective_value().unwrap(), 25.0, abs <= 1e-5);
    }

    #[test]
    fn test_nonconvex_objective_is_rejected() {
        let mut model = Model::new("convex");
        let x = model.add(variable().clamp(0, 1)).unwrap();
        model.maximise(x.expr().sum_squares()).unwrap();
        assert!(matches!(model.solve(), Err(ResolutionError::InvalidModel(_))));
    }

    #[test]
    fn test_indefinite_objective_is_rejected() {
        let mut model = Model::new("saddle");
        let v = model.add(variable().shape(2).clamp(-1, 1)).unwrap();
        // x^2 + y^2 + 4xy has a positive diagonal but is not convex
        let (x, y) = (v.get(0).unwrap(), v.get(1).unwrap());
        let objective = v.expr().sum_squares() + x.product(&y).unwrap() * 4.;
        model.minimise(objective).unwrap();
        assert!(matches!(model.solve(), Err(ResolutionError::InvalidModel(_))));
    }

    #[test]
    fn test_infeasible_quadratic_problem() {
        let mut model = Model::new("infeasible");
        let x = model.add(variable().max(1)).unwrap();
        model.add_constraint(x.expr().geq(2.)).unwrap();
        model.minimise(x.expr().sum_squares()).unwrap();
        assert_eq!(model.solve(), Err(ResolutionError::Infeasible));
    }

    #[test]
    fn test_quadratic_problem_scaling() {
        let mut model = Model::new("small");
        let v = model.add(variable().shape(2)).unwrap();
        // Minimize 1000 (x^2 + y^2) - x - y
        let linear = v.expr().sum().scale(-1.).into_elements().remove(0);
        let objective = v.expr().sum_squares() * 1000. + QuadraticExpression::from(linear);
        model.minimise(objective).unwrap();
        let solution = model.solve().unwrap();
        for level in solution.levels(&v).unwrap() {
            assert_float_eq!(level, 5e-4, abs <= 1e-6);
        }
    }
}
