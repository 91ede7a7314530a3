use proptest::prelude::*;
use wlu_models::linalg::solve;
use wlu_models::scoring::{mape, r2, rmse};

proptest! {
    #[test]
    fn perfect_predictions_score_perfectly(values in prop::collection::vec(1.0f64..1_000.0, 2..40)) {
        prop_assert_eq!(rmse(&values, &values), 0.0);
        prop_assert_eq!(mape(&values, &values), 0.0);
        let spread = values.iter().any(|v| *v != values[0]);
        if spread {
            prop_assert!((r2(&values, &values) - 1.0).abs() < 1e-12);
        } else {
            prop_assert!(r2(&values, &values).is_nan());
        }
    }

    #[test]
    fn constant_offset_shows_up_in_rmse(values in prop::collection::vec(-100.0f64..100.0, 1..40), offset in 0.0f64..10.0) {
        let shifted: Vec<f64> = values.iter().map(|v| v + offset).collect();
        prop_assert!((rmse(&values, &shifted) - offset).abs() < 1e-9);
    }

    #[test]
    fn diagonally_dominant_systems_are_solved(
        diag in prop::collection::vec(5.0f64..10.0, 1..6),
        off in -1.0f64..1.0,
        rhs_seed in -10.0f64..10.0,
    ) {
        let n = diag.len();
        let a: Vec<Vec<f64>> = (0..n)
            .map(|i| (0..n).map(|j| if i == j { diag[i] } else { off / n as f64 }).collect())
            .collect();
        let b: Vec<f64> = (0..n).map(|i| rhs_seed + i as f64).collect();
        let x = solve(a.clone(), b.clone()).expect("non-singular");
        for (row, target) in a.iter().zip(&b) {
            let lhs: f64 = row.iter().zip(&x).map(|(a, x)| a * x).sum();
            prop_assert!((lhs - target).abs() < 1e-8);
        }
    }
}
