//! The spreadsheet-facing callable surface.
//!
//! Arguments arrive as doubles, the way a formula interpreter hands them
//! over, and are validated here before a calculation session is built.
//! Optional arguments of the source functions default to: period 1
//! (autodetect), completion 1, aggregation 1 (average), interval level 0.95.

use crate::aggregation::Aggregation;
use crate::calculation::{EtsCalculation, EtsVariant};
use crate::error::{ForecastError, ForecastResult};

/// Whether the seasonal effect sums into or multiplies the level-plus-trend
/// forecast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Seasonality {
    Additive,
    Multiplicative,
}

fn validate_args(
    period: f64,
    completion: f64,
    aggregation: f64,
) -> ForecastResult<(usize, bool, Option<Aggregation>)> {
    if period % 1.0 != 0.0 || period < 0.0 {
        return Err(ForecastError::IllegalFpOperation);
    }
    if completion != 0.0 && completion != 1.0 {
        return Err(ForecastError::IllegalParameter);
    }
    if aggregation % 1.0 != 0.0 {
        return Err(ForecastError::IllegalParameter);
    }
    let aggregation = Aggregation::from_selector(aggregation as i32)?;
    Ok((period as usize, completion == 1.0, aggregation))
}

/// Point forecasts for every target timestamp.
pub fn forecast_ets(
    seasonality: Seasonality,
    targets: &[f64],
    xs: &[f64],
    ys: &[f64],
    period: f64,
    completion: f64,
    aggregation: f64,
) -> ForecastResult<Vec<f64>> {
    if targets.is_empty() {
        return Err(ForecastError::IllegalArgument);
    }
    let (period, completion, aggregation) = validate_args(period, completion, aggregation)?;
    let variant = match seasonality {
        Seasonality::Additive => EtsVariant::Add,
        Seasonality::Multiplicative => EtsVariant::Mult,
    };
    let mut calc = EtsCalculation::preprocess(
        xs,
        ys,
        period,
        completion,
        aggregation,
        Some(targets),
        variant,
    )?;
    calc.forecast_range(targets)
}

/// Prediction-interval half-widths for every target timestamp.
///
/// A declared period of 0 selects the analytic double-smoothing intervals;
/// anything else runs the scenario simulation.
pub fn forecast_ets_pi(
    seasonality: Seasonality,
    targets: &[f64],
    xs: &[f64],
    ys: &[f64],
    level: f64,
    period: f64,
    completion: f64,
    aggregation: f64,
) -> ForecastResult<Vec<f64>> {
    if targets.is_empty() {
        return Err(ForecastError::IllegalArgument);
    }
    if !(0.0..=1.0).contains(&level) {
        return Err(ForecastError::IllegalParameter);
    }
    let (period, completion, aggregation) = validate_args(period, completion, aggregation)?;
    let variant = match seasonality {
        Seasonality::Additive => EtsVariant::PiAdd,
        Seasonality::Multiplicative => EtsVariant::PiMult,
    };
    let mut calc = EtsCalculation::preprocess(
        xs,
        ys,
        period,
        completion,
        aggregation,
        Some(targets),
        variant,
    )?;
    if period == 0 {
        calc.eds_prediction_intervals(targets, level)
    } else {
        calc.ets_prediction_intervals(targets, level)
    }
}

/// Model statistics, one value per selector (see
/// [`EtsCalculation::statistics`] for the selector mapping).
pub fn forecast_ets_stat(
    seasonality: Seasonality,
    xs: &[f64],
    ys: &[f64],
    selectors: &[f64],
    period: f64,
    completion: f64,
    aggregation: f64,
) -> ForecastResult<Vec<f64>> {
    if selectors.is_empty() {
        return Err(ForecastError::IllegalArgument);
    }
    // The selector matrix is validated before any data shaping happens.
    for &selector in selectors {
        if selector % 1.0 != 0.0 || !(1.0..=9.0).contains(&selector) {
            return Err(ForecastError::IllegalParameter);
        }
    }
    let (period, completion, aggregation) = validate_args(period, completion, aggregation)?;
    let variant = match seasonality {
        Seasonality::Additive => EtsVariant::StatAdd,
        Seasonality::Multiplicative => EtsVariant::StatMult,
    };
    let mut calc =
        EtsCalculation::preprocess(xs, ys, period, completion, aggregation, None, variant)?;
    let selectors: Vec<u8> = selectors.iter().map(|&s| s as u8).collect();
    calc.statistics(&selectors)
}

/// The detected number of samples per period.
pub fn forecast_ets_season(
    xs: &[f64],
    ys: &[f64],
    completion: f64,
    aggregation: f64,
) -> ForecastResult<f64> {
    let (_, completion, aggregation) = validate_args(1.0, completion, aggregation)?;
    let mut calc = EtsCalculation::preprocess(
        xs,
        ys,
        1,
        completion,
        aggregation,
        None,
        EtsVariant::Season,
    )?;
    Ok(calc.samples_in_period())
}
