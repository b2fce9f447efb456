//! Prediction intervals around the point forecasts.
//!
//! Double exponential smoothing uses the closed-form coefficients from
//! Bovas & Ledolter, Statistical Methods for Forecasting, 3.8. Triple
//! exponential smoothing has no closed form here; intervals are a numerical
//! approximation of Yar & Chatfield (International Journal of Forecasting,
//! 1990) using simulated scenario paths.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use statrs::distribution::{ContinuousCDF, Normal};

use crate::calculation::EtsCalculation;
use crate::error::{ForecastError, ForecastResult};

/// Number of scenario paths per triple-smoothing interval calculation.
const SCENARIOS: usize = 1000;

fn gauss_inv(probability: f64) -> ForecastResult<f64> {
    if !probability.is_finite() || probability <= 0.0 || probability >= 1.0 {
        return Err(ForecastError::IllegalFpOperation);
    }
    let normal = Normal::new(0.0, 1.0).map_err(|_| ForecastError::UnknownState)?;
    Ok(normal.inverse_cdf(probability))
}

/// Inclusive percentile with linear interpolation between ranks, over a
/// sorted slice.
fn percentile(sorted: &[f64], p: f64) -> f64 {
    let rank = p * (sorted.len() - 1) as f64;
    let idx = rank.floor() as usize;
    let diff = rank - idx as f64;
    if diff == 0.0 {
        sorted[idx]
    } else {
        sorted[idx] + diff * (sorted[idx + 1] - sorted[idx])
    }
}

impl EtsCalculation {
    /// Horizon steps needed to cover the furthest target, plus one spare
    /// entry so fractional-step interpolation never reads past the end.
    fn horizon_len(&self, targets: &[f64]) -> usize {
        let last_x = self.range[self.range.len() - 1].x;
        let mut max_delta: f64 = 0.0;
        for &t in targets {
            max_delta = max_delta.max(self.to_target(t) - last_x);
        }
        let mut size = (max_delta / self.step_size) as usize;
        if max_delta % self.step_size != 0.0 {
            size += 1;
        }
        size + 1
    }

    fn horizon_step(&self, target: f64) -> (usize, f64) {
        let last_x = self.range[self.range.len() - 1].x;
        let delta = self.to_target(target) - last_x;
        let steps = (delta / self.step_size - 1.0).trunc().max(0.0) as usize;
        (steps, delta % self.step_size)
    }

    fn rand_dev(&self, rng: &mut StdRng, normal: &Normal) -> f64 {
        // A random deviation scaled by the in-sample standard deviation.
        self.rmse * normal.inverse_cdf(rng.gen_range(0.5..1.0))
    }

    /// Analytic prediction-interval half-widths for double exponential
    /// smoothing.
    pub fn eds_prediction_intervals(
        &mut self,
        targets: &[f64],
        level: f64,
    ) -> ForecastResult<Vec<f64>> {
        self.ensure_optimized();

        let z = gauss_inv((1.0 + level) / 2.0)?;
        let o = 1.0 - level;
        let horizon = self.horizon_len(targets);
        let c: Vec<f64> = (0..horizon)
            .map(|i| {
                let i = i as f64;
                (1.0 + (level / (1.0 + o).powi(3))
                    * ((1.0 + 4.0 * o + 5.0 * o * o)
                        + 2.0 * i * level * (1.0 + 3.0 * o)
                        + 2.0 * i * i * level * level))
                    .sqrt()
            })
            .collect();

        Ok(targets
            .iter()
            .map(|&t| {
                let (steps, factor) = self.horizon_step(t);
                let mut pi = z * self.rmse * c[steps] / c[0];
                if factor != 0.0 {
                    let pi_next = z * self.rmse * c[steps + 1] / c[0];
                    pi += factor * (pi_next - pi);
                }
                pi
            })
            .collect())
    }

    /// Simulated prediction-interval half-widths for triple exponential
    /// smoothing.
    pub fn ets_prediction_intervals(
        &mut self,
        targets: &[f64],
        level: f64,
    ) -> ForecastResult<Vec<f64>> {
        let mut rng = StdRng::from_entropy();
        self.ets_prediction_intervals_with_rng(targets, level, &mut rng)
    }

    /// Same as [`EtsCalculation::ets_prediction_intervals`] with a caller
    /// supplied generator, for reproducible runs.
    pub fn ets_prediction_intervals_with_rng(
        &mut self,
        targets: &[f64],
        level: f64,
        rng: &mut StdRng,
    ) -> ForecastResult<Vec<f64>> {
        self.ensure_optimized();
        if self.eds {
            return Err(ForecastError::UnknownState);
        }

        let normal = Normal::new(0.0, 1.0).map_err(|_| ForecastError::UnknownState)?;
        let n = self.range.len();
        let period = self.samples_in_period;
        let horizon = self.horizon_len(targets);

        let mut predictions = vec![Vec::with_capacity(SCENARIOS); horizon];
        let mut scen_range = vec![0.0; horizon];
        let mut scen_base = vec![0.0; horizon];
        let mut scen_trend = vec![0.0; horizon];
        let mut scen_per_idx = vec![0.0; horizon];

        let last_base = self.base[n - 1];
        let last_trend = self.trend[n - 1];

        for _ in 0..SCENARIOS {
            // Evolve one scenario path with the training recurrences, the
            // observed Y replaced by the simulated forecast plus noise.
            if self.additive {
                scen_range[0] = last_base + last_trend + self.per_idx[n - period]
                    + self.rand_dev(rng, &normal);
                predictions[0].push(scen_range[0]);
                scen_base[0] = self.alpha * (scen_range[0] - self.per_idx[n - period])
                    + (1.0 - self.alpha) * (last_base + last_trend);
                scen_trend[0] = self.gamma * (scen_base[0] - last_base)
                    + (1.0 - self.gamma) * last_trend;
                scen_per_idx[0] = self.beta * (scen_range[0] - scen_base[0])
                    + (1.0 - self.beta) * self.per_idx[n - period];
                for i in 1..horizon {
                    let per_idx = if i < period {
                        self.per_idx[n + i - period]
                    } else {
                        scen_per_idx[i - period]
                    };
                    scen_range[i] = scen_base[i - 1] + scen_trend[i - 1] + per_idx
                        + self.rand_dev(rng, &normal);
                    predictions[i].push(scen_range[i]);
                    scen_base[i] = self.alpha * (scen_range[i] - per_idx)
                        + (1.0 - self.alpha) * (scen_base[i - 1] + scen_trend[i - 1]);
                    scen_trend[i] = self.gamma * (scen_base[i] - scen_base[i - 1])
                        + (1.0 - self.gamma) * scen_trend[i - 1];
                    scen_per_idx[i] = self.beta * (scen_range[i] - scen_base[i])
                        + (1.0 - self.beta) * per_idx;
                }
            } else {
                scen_range[0] = (last_base + last_trend) * self.per_idx[n - period]
                    + self.rand_dev(rng, &normal);
                predictions[0].push(scen_range[0]);
                scen_base[0] = self.alpha * (scen_range[0] / self.per_idx[n - period])
                    + (1.0 - self.alpha) * (last_base + last_trend);
                scen_trend[0] = self.gamma * (scen_base[0] - last_base)
                    + (1.0 - self.gamma) * last_trend;
                scen_per_idx[0] = self.beta * (scen_range[0] / scen_base[0])
                    + (1.0 - self.beta) * self.per_idx[n - period];
                for i in 1..horizon {
                    let per_idx = if i < period {
                        self.per_idx[n + i - period]
                    } else {
                        scen_per_idx[i - period]
                    };
                    scen_range[i] = (scen_base[i - 1] + scen_trend[i - 1]) * per_idx
                        + self.rand_dev(rng, &normal);
                    predictions[i].push(scen_range[i]);
                    scen_base[i] = self.alpha * (scen_range[i] / per_idx)
                        + (1.0 - self.alpha) * (scen_base[i - 1] + scen_trend[i - 1]);
                    scen_trend[i] = self.gamma * (scen_base[i] - scen_base[i - 1])
                        + (1.0 - self.gamma) * scen_trend[i - 1];
                    scen_per_idx[i] = self.beta * (scen_range[i] / scen_base[i])
                        + (1.0 - self.beta) * per_idx;
                }
            }
        }

        let spread: Vec<f64> = predictions
            .into_iter()
            .map(|mut paths| {
                paths.sort_by(f64::total_cmp);
                percentile(&paths, (1.0 + level) / 2.0) - percentile(&paths, 0.5)
            })
            .collect();

        Ok(targets
            .iter()
            .map(|&t| {
                let (steps, factor) = self.horizon_step(t);
                let mut pi = spread[steps];
                if factor != 0.0 {
                    pi += factor * (spread[steps + 1] - pi);
                }
                pi
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregation::Aggregation;
    use crate::calculation::EtsVariant;

    fn seasonal_calc() -> EtsCalculation {
        let xs: Vec<f64> = (1..=24).map(f64::from).collect();
        let ys: Vec<f64> = (0..24).map(|i| f64::from(i % 4) + 10.0).collect();
        EtsCalculation::preprocess(
            &xs,
            &ys,
            4,
            true,
            Some(Aggregation::Average),
            Some(&[25.0]),
            EtsVariant::PiAdd,
        )
        .unwrap()
    }

    #[test]
    fn percentile_interpolates_between_ranks() {
        let sorted = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(percentile(&sorted, 0.5), 2.5);
        assert_eq!(percentile(&sorted, 0.0), 1.0);
        assert_eq!(percentile(&sorted, 1.0), 4.0);
    }

    #[test]
    fn gauss_inv_rejects_degenerate_probabilities() {
        assert!(gauss_inv(0.0).is_err());
        assert!(gauss_inv(1.0).is_err());
        assert_eq!(gauss_inv(0.5).unwrap(), 0.0);
    }

    #[test]
    fn monte_carlo_intervals_are_reproducible_with_a_seed() {
        let targets = [25.0, 26.0];
        let mut calc = seasonal_calc();
        let mut rng = StdRng::seed_from_u64(42);
        let first = calc
            .ets_prediction_intervals_with_rng(&targets, 0.95, &mut rng)
            .unwrap();

        let mut calc = seasonal_calc();
        let mut rng = StdRng::seed_from_u64(42);
        let second = calc
            .ets_prediction_intervals_with_rng(&targets, 0.95, &mut rng)
            .unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn wider_levels_give_wider_monte_carlo_intervals() {
        let mut calc = seasonal_calc();
        let mut rng = StdRng::seed_from_u64(7);
        let narrow = calc
            .ets_prediction_intervals_with_rng(&[26.0], 0.5, &mut rng)
            .unwrap();
        let mut calc = seasonal_calc();
        let mut rng = StdRng::seed_from_u64(7);
        let wide = calc
            .ets_prediction_intervals_with_rng(&[26.0], 0.99, &mut rng)
            .unwrap();
        assert!(wide[0] >= narrow[0]);
    }
}
