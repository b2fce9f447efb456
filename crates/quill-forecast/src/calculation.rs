//! Holt-Winters exponential smoothing over a preprocessed sample range.
//!
//! A calculation session owns its model arrays; they live exactly as long as
//! the [`EtsCalculation`] that produced them. The smoothing recurrences and
//! their initialisation follow the Engineering Statistics Handbook
//! (6.4.3.3 double, 6.4.3.5 triple exponential smoothing), with the initial
//! seasonal effect corrected for trend.

use crate::aggregation::Aggregation;
use crate::date::{serial_to_date, days_in_month};
use crate::error::{ForecastError, ForecastResult};

/// Minimum change of alpha, beta, gamma during smoothing-constant search.
pub(crate) const MIN_PARAM_RESOLUTION: f64 = 0.001;

/// Which calculation the caller is driving. PI variants relax the target
/// bounds check to extrapolation-only; Stat variants carry no targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EtsVariant {
    Add,
    Mult,
    PiAdd,
    PiMult,
    StatAdd,
    StatMult,
    Season,
}

impl EtsVariant {
    fn is_additive(self) -> bool {
        matches!(
            self,
            EtsVariant::Add | EtsVariant::PiAdd | EtsVariant::StatAdd | EtsVariant::Season
        )
    }

    fn is_prediction_interval(self) -> bool {
        matches!(self, EtsVariant::PiAdd | EtsVariant::PiMult)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct DataPoint {
    pub x: f64,
    pub y: f64,
}

/// One forecasting session: the preprocessed range plus the model arrays
/// refilled for the current smoothing constants.
#[derive(Debug)]
pub struct EtsCalculation {
    pub(crate) range: Vec<DataPoint>,
    pub(crate) base: Vec<f64>,
    pub(crate) trend: Vec<f64>,
    pub(crate) per_idx: Vec<f64>,
    pub(crate) forecast: Vec<f64>,
    pub(crate) samples_in_period: usize,
    pub(crate) step_size: f64,
    pub(crate) alpha: f64,
    pub(crate) beta: f64,
    pub(crate) gamma: f64,
    /// Day of month shared by all samples when the axis is month-granular;
    /// 0 when the X values stay plain numbers.
    pub(crate) month_day: u8,
    pub(crate) mae: f64,
    pub(crate) mase: f64,
    pub(crate) mse: f64,
    pub(crate) rmse: f64,
    pub(crate) smape: f64,
    pub(crate) additive: bool,
    pub(crate) eds: bool,
    initialised: bool,
}

impl EtsCalculation {
    /// Shape the raw sample vectors into a strictly increasing, uniformly
    /// stepped range and seed the model arrays.
    ///
    /// `samples_in_period`: 0 selects double exponential smoothing, 1 runs
    /// period autodetection, anything larger is used as given.
    pub fn preprocess(
        xs: &[f64],
        ys: &[f64],
        samples_in_period: usize,
        data_completion: bool,
        aggregation: Option<Aggregation>,
        targets: Option<&[f64]>,
        variant: EtsVariant,
    ) -> ForecastResult<Self> {
        if xs.len() != ys.len() || xs.is_empty() {
            return Err(ForecastError::IllegalArgument);
        }
        if xs.iter().chain(ys).any(|v| !v.is_finite()) {
            return Err(ForecastError::IllegalArgument);
        }
        if xs.len() < 2 {
            return Err(ForecastError::NoValue);
        }

        let mut range: Vec<DataPoint> = xs
            .iter()
            .zip(ys)
            .map(|(&x, &y)| DataPoint { x, y })
            .collect();
        range.sort_by(|a, b| a.x.total_cmp(&b.x));

        if let Some(targets) = targets.filter(|t| !t.is_empty()) {
            if variant.is_prediction_interval() {
                // PIs only extrapolate: the target may not precede the end of
                // the X range.
                if targets[0] < range[range.len() - 1].x {
                    return Err(ForecastError::IllegalFpOperation);
                }
            } else if targets[0] < range[0].x {
                return Err(ForecastError::IllegalFpOperation);
            }
        }

        // Month intervals have no exact step size. Assume a month cadence,
        // verify every sample shares the first sample's day of month, and if
        // so replace X with month numbers for ease of calculation.
        let first_date = serial_to_date(range[0].x);
        let mut month_day = first_date.day;
        for point in &range[1..] {
            if month_day == 0 {
                break;
            }
            let date = serial_to_date(point.x);
            if date != first_date && date.day != month_day {
                month_day = 0;
            }
        }
        if month_day != 0 {
            for point in &mut range {
                let date = serial_to_date(point.x);
                point.x = f64::from(date.year * 12 + i32::from(date.month));
            }
        }

        let range = collapse_duplicates(range, aggregation)?;
        if range.len() < 2 {
            return Err(ForecastError::NoValue);
        }

        let mut step_size = f64::MAX;
        for pair in range.windows(2) {
            let step = pair[1].x - pair[0].x;
            if step < step_size {
                step_size = step;
            }
        }

        // The step must be constant, or every gap a multiple of it.
        let mut has_gap = false;
        for pair in range.windows(2) {
            let step = pair[1].x - pair[0].x;
            if step != step_size {
                if step % step_size != 0.0 {
                    return Err(ForecastError::NoValue);
                }
                has_gap = true;
            }
        }

        let range = if has_gap {
            fill_gaps(range, step_size, data_completion)?
        } else {
            range
        };

        let (eds, samples_in_period) = match samples_in_period {
            0 => (true, 0),
            1 => (false, calc_period_len(&range)),
            given => (false, given),
        };

        let mut calc = EtsCalculation {
            base: vec![0.0; range.len()],
            trend: vec![0.0; range.len()],
            per_idx: if eds { Vec::new() } else { vec![0.0; range.len()] },
            forecast: vec![0.0; range.len()],
            range,
            samples_in_period,
            step_size,
            alpha: 0.0,
            beta: 0.0,
            gamma: 0.0,
            month_day,
            mae: 0.0,
            mase: 0.0,
            mse: 0.0,
            rmse: 0.0,
            smape: 0.0,
            additive: variant.is_additive(),
            eds,
            initialised: false,
        };
        calc.forecast[0] = calc.range[0].y;
        calc.prefill_trend()?;
        calc.prefill_per_idx()?;
        calc.prefill_base()?;
        Ok(calc)
    }

    fn prefill_trend(&mut self) -> ForecastResult<()> {
        let n = self.range.len();
        if self.eds {
            self.trend[0] =
                (self.range[n - 1].y - self.range[0].y) / (n - 1) as f64;
        } else {
            let period = self.samples_in_period;
            // At least two complete periods must be present in the range.
            if n < 2 * period {
                return Err(ForecastError::NoValue);
            }
            let mut sum = 0.0;
            for i in 0..period {
                sum += self.range[i + period].y - self.range[i].y;
            }
            self.trend[0] = sum / (period * period) as f64;
        }
        Ok(())
    }

    fn prefill_per_idx(&mut self) -> ForecastResult<()> {
        if self.eds {
            return Ok(());
        }
        let period = self.samples_in_period;
        if period == 0 {
            // A zero period with EDS disabled is a dispatch bug upstream.
            return Err(ForecastError::UnknownState);
        }

        let n = self.range.len();
        let periods = n / period;
        let mut period_average = vec![0.0; periods];
        for (i, average) in period_average.iter_mut().enumerate() {
            for j in 0..period {
                *average += self.range[i * period + j].y;
            }
            *average /= period as f64;
            if *average == 0.0 {
                log::warn!(
                    "period average of 0 would divide by zero, quitting calculation"
                );
                return Err(ForecastError::DivisionByZero);
            }
        }

        for j in 0..period {
            let mut index_sum = 0.0;
            for (i, average) in period_average.iter().enumerate() {
                // Adjust the period average for the position within the
                // period before detrending.
                let detrended =
                    average + (j as f64 - 0.5 * (period - 1) as f64) * self.trend[0];
                let y = self.range[i * period + j].y;
                index_sum += if self.additive {
                    y - detrended
                } else {
                    y / detrended
                };
            }
            self.per_idx[j] = index_sum / periods as f64;
        }
        Ok(())
    }

    fn prefill_base(&mut self) -> ForecastResult<()> {
        self.base[0] = if !self.eds && !self.additive {
            self.range[0].y / self.per_idx[0]
        } else {
            self.range[0].y
        };
        Ok(())
    }

    /// Optimize the smoothing constants on first use and refresh the
    /// accuracy indicators.
    pub(crate) fn ensure_optimized(&mut self) {
        if !self.initialised {
            self.optimize_alpha();
            self.initialised = true;
            self.calc_accuracy_indicators();
        }
    }

    /// Recompute the one-step-ahead recurrence over the whole range with the
    /// current smoothing constants.
    pub(crate) fn refill(&mut self) {
        let period = self.samples_in_period;
        for i in 1..self.range.len() {
            if self.eds {
                self.base[i] = self.alpha * self.range[i].y
                    + (1.0 - self.alpha) * (self.base[i - 1] + self.trend[i - 1]);
                self.trend[i] = self.gamma * (self.base[i] - self.base[i - 1])
                    + (1.0 - self.gamma) * self.trend[i - 1];
                self.forecast[i] = self.base[i - 1] + self.trend[i - 1];
            } else if self.additive {
                let idx = if i > period { i - period } else { i };
                self.base[i] = self.alpha * (self.range[i].y - self.per_idx[idx])
                    + (1.0 - self.alpha) * (self.base[i - 1] + self.trend[i - 1]);
                self.per_idx[i] = self.beta * (self.range[i].y - self.base[i])
                    + (1.0 - self.beta) * self.per_idx[idx];
                self.trend[i] = self.gamma * (self.base[i] - self.base[i - 1])
                    + (1.0 - self.gamma) * self.trend[i - 1];
                self.forecast[i] =
                    self.base[i - 1] + self.trend[i - 1] + self.per_idx[idx];
            } else {
                let idx = if i >= period { i - period } else { i };
                self.base[i] = self.alpha * (self.range[i].y / self.per_idx[idx])
                    + (1.0 - self.alpha) * (self.base[i - 1] + self.trend[i - 1]);
                self.per_idx[i] = self.beta * (self.range[i].y / self.base[i])
                    + (1.0 - self.beta) * self.per_idx[idx];
                self.trend[i] = self.gamma * (self.base[i] - self.base[i - 1])
                    + (1.0 - self.gamma) * self.trend[i - 1];
                self.forecast[i] =
                    (self.base[i - 1] + self.trend[i - 1]) * self.per_idx[idx];
            }
        }
        self.calc_accuracy_indicators();
    }

    fn calc_accuracy_indicators(&mut self) {
        let mut sum_abs_err = 0.0;
        let mut sum_err_sq = 0.0;
        let mut sum_abs_perc_err = 0.0;
        for i in 1..self.range.len() {
            let error = self.forecast[i] - self.range[i].y;
            sum_abs_err += error.abs();
            sum_err_sq += error * error;
            sum_abs_perc_err +=
                error.abs() / (self.forecast[i].abs() + self.range[i].y.abs());
        }

        let mut sum_divisor = 0.0;
        for i in 2..self.range.len() {
            sum_divisor += (self.range[i].y - self.range[i - 1].y).abs();
        }

        let calc_count = (self.range.len() - 1) as f64;
        self.mae = sum_abs_err / calc_count;
        self.mase = sum_abs_err / (calc_count * sum_divisor / (calc_count - 1.0));
        self.mse = sum_err_sq / calc_count;
        self.rmse = self.mse.sqrt();
        self.smape = sum_abs_perc_err * 2.0 / calc_count;
    }

    /// Ternary search over one smoothing constant, minimizing MSE.
    ///
    /// `apply` assigns a candidate value and recomputes everything downstream
    /// of it (inner constants and the recurrence), leaving the resulting MSE
    /// on `self`. Equal MSE at 0, 0.5 and 1 short-circuits the constant to 0.
    fn ternary_search(calc: &mut Self, apply: impl Fn(&mut Self, f64)) {
        let mut f0 = 0.0;
        apply(calc, f0);
        let mut e0 = calc.mse;

        let mut f2 = 1.0;
        apply(calc, f2);
        let mut e2 = calc.mse;

        let mut f1 = 0.5;
        apply(calc, f1);

        if e0 == calc.mse && calc.mse == e2 {
            apply(calc, 0.0);
            return;
        }
        while f2 - f1 > MIN_PARAM_RESOLUTION {
            if e2 > e0 {
                f2 = f1;
                e2 = calc.mse;
                f1 = (f0 + f1) / 2.0;
            } else {
                f0 = f1;
                e0 = calc.mse;
                f1 = (f1 + f2) / 2.0;
            }
            apply(calc, f1);
        }
        if e2 > e0 {
            if e0 < calc.mse {
                apply(calc, f0);
            }
        } else if e2 < calc.mse {
            apply(calc, f2);
        }
    }

    fn optimize_alpha(&mut self) {
        Self::ternary_search(self, |calc, value| {
            calc.alpha = value;
            if calc.eds {
                // Beta is not used with EDS.
                calc.beta = 0.0;
                calc.optimize_gamma();
            } else {
                calc.optimize_beta();
            }
            calc.refill();
        });
        self.calc_accuracy_indicators();
    }

    fn optimize_beta(&mut self) {
        Self::ternary_search(self, |calc, value| {
            calc.beta = value;
            calc.optimize_gamma();
            calc.refill();
        });
    }

    fn optimize_gamma(&mut self) {
        Self::ternary_search(self, |calc, value| {
            calc.gamma = value;
            calc.refill();
        });
    }

    /// Remap a serial-day target onto the month axis, with the day offset
    /// from the shared day-of-month expressed as a leap-aware month fraction.
    pub(crate) fn convert_x_to_months(&self, x: f64) -> f64 {
        let date = serial_to_date(x);
        let month_length = f64::from(days_in_month(date.year, date.month));
        12.0 * f64::from(date.year)
            + f64::from(date.month)
            + (f64::from(date.day) - f64::from(self.month_day)) / month_length
    }

    pub(crate) fn to_target(&self, x: f64) -> f64 {
        if self.month_day != 0 {
            self.convert_x_to_months(x)
        } else {
            x
        }
    }

    fn forecast_at(&self, target: f64) -> f64 {
        let n = self.range.len();
        let period = self.samples_in_period;
        if target <= self.range[n - 1].x {
            let idx = ((target - self.range[0].x) / self.step_size) as usize;
            let interpolate = (target - self.range[0].x) % self.step_size;
            let mut value = self.range[idx].y;
            if interpolate >= MIN_PARAM_RESOLUTION && idx + 1 < self.range.len() {
                let factor = interpolate / self.step_size;
                value += factor * (self.forecast[idx + 1] - value);
            }
            value
        } else {
            let steps = ((target - self.range[n - 1].x) / self.step_size) as usize;
            let interpolate = (target - self.range[n - 1].x) % self.step_size;
            let project = |k: usize| -> f64 {
                let linear = self.base[n - 1] + k as f64 * self.trend[n - 1];
                if self.eds {
                    linear
                } else if self.additive {
                    linear + self.per_idx[n - 1 - period + (k % period)]
                } else {
                    linear * self.per_idx[n - 1 - period + (k % period)]
                }
            };
            let mut value = project(steps);
            if interpolate >= MIN_PARAM_RESOLUTION {
                let factor = interpolate / self.step_size;
                value += factor * (project(steps + 1) - value);
            }
            value
        }
    }

    /// Point forecasts for every target, in-sample interpolated and
    /// out-of-sample extrapolated.
    pub fn forecast_range(&mut self, targets: &[f64]) -> ForecastResult<Vec<f64>> {
        self.ensure_optimized();
        Ok(targets
            .iter()
            .map(|&t| self.forecast_at(self.to_target(t)))
            .collect())
    }

    /// Statistics selected per position: 1 alpha, 2 gamma, 3 beta, 4 MASE,
    /// 5 SMAPE, 6 MAE, 7 RMSE, 8 step size, 9 samples per period.
    pub fn statistics(&mut self, selectors: &[u8]) -> ForecastResult<Vec<f64>> {
        self.ensure_optimized();
        selectors
            .iter()
            .map(|&selector| match selector {
                1 => Ok(self.alpha),
                2 => Ok(self.gamma),
                3 => Ok(self.beta),
                4 => Ok(self.mase),
                5 => Ok(self.smape),
                6 => Ok(self.mae),
                7 => Ok(self.rmse),
                8 => Ok(self.step_size),
                9 => Ok(self.samples_in_period as f64),
                _ => Err(ForecastError::IllegalParameter),
            })
            .collect()
    }

    /// The period length in use (declared or detected).
    pub fn samples_in_period(&mut self) -> f64 {
        self.ensure_optimized();
        self.samples_in_period as f64
    }

    /// Day of month shared by all samples on a month-granular axis, 0 when
    /// the axis is plain numeric.
    pub fn month_day(&self) -> u8 {
        self.month_day
    }
}

fn collapse_duplicates(
    range: Vec<DataPoint>,
    aggregation: Option<Aggregation>,
) -> ForecastResult<Vec<DataPoint>> {
    let mut cleaned = Vec::with_capacity(range.len());
    let mut i = 0;
    while i < range.len() {
        let mut j = i + 1;
        while j < range.len() && range[j].x == range[i].x {
            j += 1;
        }
        if j - i > 1 {
            // Identical X values are only allowed with an aggregation mode.
            let Some(mode) = aggregation else {
                return Err(ForecastError::NoValue);
            };
            let run: Vec<f64> = range[i..j].iter().map(|p| p.y).collect();
            cleaned.push(DataPoint {
                x: range[i].x,
                y: mode.apply(&run),
            });
        } else {
            cleaned.push(range[i]);
        }
        i = j;
    }
    Ok(cleaned)
}

fn fill_gaps(
    mut range: Vec<DataPoint>,
    step_size: f64,
    data_completion: bool,
) -> ForecastResult<Vec<DataPoint>> {
    let original_count = range.len() as f64;
    let mut missing = 0usize;
    let mut i = 1;
    while i < range.len() {
        let dist = range[i].x - range[i - 1].x;
        if dist > step_size {
            let y_gap = (range[i].y + range[i - 1].y) / 2.0;
            let mut x_gap = range[i - 1].x + step_size;
            while x_gap < range[i].x {
                range.insert(
                    i,
                    DataPoint {
                        x: x_gap,
                        y: if data_completion { y_gap } else { 0.0 },
                    },
                );
                i += 1;
                missing += 1;
                if missing as f64 / original_count > 0.3 {
                    // Maximum of 30% missing points exceeded.
                    return Err(ForecastError::NoValue);
                }
                x_gap += step_size;
            }
        }
        i += 1;
    }
    Ok(range)
}

/// Most plausible period length: for every candidate length, align the most
/// recent complete periods and compare first differences of corresponding
/// positions in adjacent periods; the candidate with the lowest mean error
/// wins, a zero error winning outright.
fn calc_period_len(range: &[DataPoint]) -> usize {
    let n = range.len();
    let mut best = n;
    let mut best_mean_error = f64::MAX;

    for period_len in (2..=n / 2).rev() {
        let periods = n / period_len;
        let start = n - periods * period_len + 1;
        let mut mean_error = 0.0;
        for i in start..n - period_len {
            mean_error += ((range[i].y - range[i - 1].y)
                - (range[period_len + i].y - range[period_len + i - 1].y))
                .abs();
        }
        mean_error /= ((periods - 1) * period_len - 1) as f64;

        if mean_error < best_mean_error || mean_error == 0.0 {
            best = period_len;
            best_mean_error = mean_error;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn preprocess_plain(xs: &[f64], ys: &[f64], period: usize) -> ForecastResult<EtsCalculation> {
        EtsCalculation::preprocess(
            xs,
            ys,
            period,
            true,
            Some(Aggregation::Average),
            None,
            EtsVariant::Add,
        )
    }

    #[test]
    fn unsorted_input_is_sorted_by_x() {
        let calc = preprocess_plain(&[3.0, 1.0, 2.0], &[30.0, 10.0, 20.0], 0).unwrap();
        let xs: Vec<f64> = calc.range.iter().map(|p| p.x).collect();
        let ys: Vec<f64> = calc.range.iter().map(|p| p.y).collect();
        assert_eq!(xs, vec![1.0, 2.0, 3.0]);
        assert_eq!(ys, vec![10.0, 20.0, 30.0]);
    }

    #[test]
    fn duplicates_without_aggregation_fail() {
        let err = EtsCalculation::preprocess(
            &[1.0, 1.0, 2.0],
            &[5.0, 7.0, 9.0],
            0,
            true,
            None,
            None,
            EtsVariant::Add,
        )
        .unwrap_err();
        assert_eq!(err, ForecastError::NoValue);
    }

    #[test]
    fn duplicates_collapse_with_the_selected_mode() {
        let calc = EtsCalculation::preprocess(
            &[1.0, 1.0, 2.0, 3.0],
            &[4.0, 8.0, 1.0, 2.0],
            0,
            true,
            Some(Aggregation::Sum),
            None,
            EtsVariant::Add,
        )
        .unwrap();
        assert_eq!(calc.range.len(), 3);
        assert_eq!(calc.range[0].y, 12.0);
    }

    #[test]
    fn irregular_step_fails() {
        let err = preprocess_plain(&[1.0, 2.0, 3.5], &[1.0, 2.0, 3.0], 0).unwrap_err();
        assert_eq!(err, ForecastError::NoValue);
    }

    #[test]
    fn gaps_fill_with_bracketing_mean() {
        let calc = preprocess_plain(&[1.0, 2.0, 5.0, 6.0], &[1.0, 2.0, 8.0, 9.0], 0).unwrap();
        let ys: Vec<f64> = calc.range.iter().map(|p| p.y).collect();
        assert_eq!(ys, vec![1.0, 2.0, 5.0, 5.0, 8.0, 9.0]);
        assert_eq!(calc.step_size, 1.0);
    }

    #[test]
    fn gaps_fill_with_zero_without_completion() {
        let calc = EtsCalculation::preprocess(
            &[1.0, 2.0, 4.0],
            &[1.0, 2.0, 4.0],
            0,
            false,
            Some(Aggregation::Average),
            None,
            EtsVariant::Add,
        )
        .unwrap();
        let ys: Vec<f64> = calc.range.iter().map(|p| p.y).collect();
        assert_eq!(ys, vec![1.0, 2.0, 0.0, 4.0]);
    }

    #[test]
    fn more_than_thirty_percent_missing_fails() {
        // Ten original points, four missing interior ones.
        let xs = [1.0, 2.0, 3.0, 4.0, 5.0, 10.0, 11.0, 12.0, 13.0, 14.0];
        let ys = [1.0; 10];
        let err = preprocess_plain(&xs, &ys, 0).unwrap_err();
        assert_eq!(err, ForecastError::NoValue);
    }

    #[test]
    fn target_before_range_start_fails() {
        let err = EtsCalculation::preprocess(
            &[5.0, 6.0, 7.0],
            &[1.0, 2.0, 3.0],
            0,
            true,
            Some(Aggregation::Average),
            Some(&[4.0]),
            EtsVariant::Add,
        )
        .unwrap_err();
        assert_eq!(err, ForecastError::IllegalFpOperation);
    }

    #[test]
    fn pi_target_before_range_end_fails() {
        let err = EtsCalculation::preprocess(
            &[5.0, 6.0, 7.0],
            &[1.0, 2.0, 3.0],
            0,
            true,
            Some(Aggregation::Average),
            Some(&[6.0]),
            EtsVariant::PiAdd,
        )
        .unwrap_err();
        assert_eq!(err, ForecastError::IllegalFpOperation);
    }

    #[test]
    fn seasonal_needs_two_full_periods() {
        let err = preprocess_plain(&[1.0, 2.0, 3.0, 4.0, 5.0], &[1.0; 5], 3).unwrap_err();
        assert_eq!(err, ForecastError::NoValue);
    }

    #[test]
    fn zero_period_mean_divides_by_zero() {
        let xs: Vec<f64> = (1..=8).map(f64::from).collect();
        let ys = [-1.0, 1.0, -1.0, 1.0, -1.0, 1.0, -1.0, 1.0];
        let err = EtsCalculation::preprocess(
            &xs,
            &ys,
            2,
            true,
            Some(Aggregation::Average),
            None,
            EtsVariant::Mult,
        )
        .unwrap_err();
        assert_eq!(err, ForecastError::DivisionByZero);
    }

    #[test]
    fn period_detection_finds_a_perfect_cycle() {
        let xs: Vec<f64> = (1..=24).map(f64::from).collect();
        let ys: Vec<f64> = (0..24).map(|i| f64::from(i % 4)).collect();
        let calc = preprocess_plain(&xs, &ys, 1).unwrap();
        assert_eq!(calc.samples_in_period, 4);
    }

    #[test]
    fn flat_series_short_circuits_the_search_to_zero() {
        let xs: Vec<f64> = (1..=10).map(f64::from).collect();
        let ys = [5.0; 10];
        let mut calc = preprocess_plain(&xs, &ys, 0).unwrap();
        let stats = calc.statistics(&[1, 2, 3]).unwrap();
        assert_eq!(stats, vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn optimized_constants_stay_in_the_unit_interval() {
        let xs: Vec<f64> = (1..=16).map(f64::from).collect();
        let ys: Vec<f64> = xs
            .iter()
            .map(|x| 2.0 * x + f64::from((*x as i32) % 3))
            .collect();
        let mut calc = preprocess_plain(&xs, &ys, 0).unwrap();
        let stats = calc.statistics(&[1, 2, 3]).unwrap();
        for value in stats {
            assert!((0.0..=1.0).contains(&value));
        }
    }

    #[test]
    fn month_axis_is_detected_and_remapped() {
        use crate::date::{date_to_serial, CivilDate};
        let xs: Vec<f64> = (0..24)
            .map(|i| {
                let year = 1900 + i / 12;
                let month = (i % 12) as u8 + 1;
                date_to_serial(CivilDate::new(year, month, 15))
            })
            .collect();
        let ys: Vec<f64> = (0..24).map(f64::from).collect();
        let calc = preprocess_plain(&xs, &ys, 0).unwrap();
        assert_eq!(calc.month_day(), 15);
        assert_eq!(calc.step_size, 1.0);
    }

    #[test]
    fn day_axis_is_not_month_granular() {
        let calc = preprocess_plain(&[1.0, 2.0, 3.0], &[1.0, 2.0, 3.0], 0).unwrap();
        assert_eq!(calc.month_day(), 0);
    }
}
