use proptest::prelude::*;
use quill_forecast::{forecast_ets, Aggregation, Seasonality};

fn series_and_permutation() -> impl Strategy<Value = (Vec<f64>, Vec<usize>)> {
    (4usize..16).prop_flat_map(|n| {
        (
            prop::collection::vec(-100.0f64..100.0, n),
            Just((0..n).collect::<Vec<usize>>()).prop_shuffle(),
        )
    })
}

proptest! {
    // Shuffling the sample pairs must not change the result: preprocessing
    // sorts by X before anything else looks at the data.
    #[test]
    fn forecast_is_sort_invariant((ys, permutation) in series_and_permutation()) {
        let n = ys.len();
        let xs: Vec<f64> = (1..=n).map(|i| i as f64).collect();
        let target = [(n + 1) as f64];

        let sorted = forecast_ets(Seasonality::Additive, &target, &xs, &ys, 0.0, 1.0, 1.0);

        let shuffled_xs: Vec<f64> = permutation.iter().map(|&i| xs[i]).collect();
        let shuffled_ys: Vec<f64> = permutation.iter().map(|&i| ys[i]).collect();
        let shuffled = forecast_ets(
            Seasonality::Additive,
            &target,
            &shuffled_xs,
            &shuffled_ys,
            0.0,
            1.0,
            1.0,
        );

        prop_assert_eq!(sorted, shuffled);
    }

    #[test]
    fn aggregation_laws_hold(run in prop::collection::vec(-50.0f64..50.0, 1..12)) {
        let mean = run.iter().sum::<f64>() / run.len() as f64;
        prop_assert_eq!(Aggregation::Average.apply(&run), mean);
        prop_assert_eq!(Aggregation::Sum.apply(&run), run.iter().sum::<f64>());
        prop_assert_eq!(Aggregation::Count.apply(&run), run.len() as f64);

        let max = run.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let min = run.iter().copied().fold(f64::INFINITY, f64::min);
        prop_assert_eq!(Aggregation::Max.apply(&run), max);
        prop_assert_eq!(Aggregation::Min.apply(&run), min);

        // The median sits between the extrema.
        let median = Aggregation::Median.apply(&run);
        prop_assert!(median >= min && median <= max);
    }
}
