#![forbid(unsafe_code)]

//! Exponential-smoothing forecast engine (Holt-Winters method).
//!
//! Forecasting of a linear change in data over time (`y = a + b*x`), plain
//! ([`forecast_ets`] with a declared period of 0, double exponential
//! smoothing) or with superimposed absolute or relative seasonal deviations
//! (additive respectively multiplicative triple exponential smoothing).
//!
//! The engine preprocesses raw sample vectors (sorting, month-cadence
//! detection, duplicate aggregation, gap filling), seeds the model arrays,
//! picks the smoothing constants that minimize the in-sample mean squared
//! error, and then answers forecast, statistic, season and
//! prediction-interval queries for one calculation session.

pub mod aggregation;
pub mod calculation;
pub mod date;
pub mod error;
pub mod surface;

mod intervals;

pub use aggregation::Aggregation;
pub use calculation::{EtsCalculation, EtsVariant};
pub use error::{ForecastError, ForecastResult};
pub use surface::{
    forecast_ets, forecast_ets_pi, forecast_ets_season, forecast_ets_stat, Seasonality,
};
