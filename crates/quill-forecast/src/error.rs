use std::fmt;

/// Spreadsheet-compatible error codes surfaced by the forecast functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForecastError {
    /// `#N/A`: the sample data cannot be shaped into a usable series.
    /// Duplicate timestamps without an aggregation mode, gaps that are not a
    /// multiple of the step, more than 30% missing points, or too few samples
    /// for the requested period.
    NoValue,
    /// `#NUM!`: a target before the permitted range, or a fractional or
    /// negative period argument.
    IllegalFpOperation,
    /// `#DIV/0!`: a period mean of zero.
    DivisionByZero,
    /// Invariant violation inside the calculation; indicates a bug.
    UnknownState,
    /// `#VALUE!`: malformed caller arguments, such as mismatched or
    /// non-numeric sample vectors.
    IllegalArgument,
    /// `#NUM!`: a parameter outside its documented domain.
    IllegalParameter,
}

impl fmt::Display for ForecastError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ForecastError::NoValue => write!(f, "#N/A"),
            ForecastError::IllegalFpOperation => write!(f, "#NUM!"),
            ForecastError::DivisionByZero => write!(f, "#DIV/0!"),
            ForecastError::UnknownState => write!(f, "#UNKNOWN!"),
            ForecastError::IllegalArgument => write!(f, "#VALUE!"),
            ForecastError::IllegalParameter => write!(f, "#NUM!"),
        }
    }
}

impl std::error::Error for ForecastError {}

pub type ForecastResult<T> = Result<T, ForecastError>;
