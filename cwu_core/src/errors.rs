//! # Error Types
//!
//! Structured error types for cwu_core. Errors serialize to JSON the same way
//! results do, so a front end can hand them straight back to the caller.
//!
//! Three families exist:
//!
//! - **Validation** (`InvalidInput`, `MissingField`): a field is absent,
//!   non-finite or out of range. Raised before any formula runs.
//! - **Physical constraint** (`PhysicalConstraint`): e.g. hot water colder than
//!   cold water where a ΔT is needed.
//! - **Non-fatal warnings** ([`CalcWarning`]): documented fallbacks that still
//!   produce a result and are attached to it.
//!
//! ## Example
//!
//! ```rust
//! use cwu_core::errors::{CalcError, CalcResult};
//!
//! fn validate_flats(flats: u32) -> CalcResult<()> {
//!     if flats == 0 {
//!         return Err(CalcError::invalid_input(
//!             "flats",
//!             flats.to_string(),
//!             "Number of flats must be positive",
//!         ));
//!     }
//!     Ok(())
//! }
//! assert!(validate_flats(0).is_err());
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::units::Celsius;

/// Result type alias for cwu_core operations
pub type CalcResult<T> = Result<T, CalcError>;

/// Structured error type for calculation operations.
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "details")]
pub enum CalcError {
    /// An input value is invalid (out of range, not finite, etc.)
    #[error("Invalid input for '{field}': {value} - {reason}")]
    InvalidInput {
        field: String,
        value: String,
        reason: String,
    },

    /// A required field is missing
    #[error("Missing required field: {field}")]
    MissingField { field: String },

    /// Inputs are individually valid but physically meaningless together
    #[error("Physical constraint violated for '{field}': {reason}")]
    PhysicalConstraint { field: String, reason: String },

    /// Calculation could not produce a result
    #[error("Calculation failed: {calculation_type} - {reason}")]
    CalculationFailed {
        calculation_type: String,
        reason: String,
    },

    /// JSON serialization/deserialization error
    #[error("Serialization error: {reason}")]
    SerializationError { reason: String },

    /// Settings file could not be read or parsed
    #[error("Configuration error in '{path}': {reason}")]
    ConfigError { path: String, reason: String },

    /// PDF rendering failed
    #[error("Render error: {reason}")]
    RenderError { reason: String },

    /// Generic internal error (should be rare)
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl CalcError {
    /// Create an InvalidInput error
    pub fn invalid_input(
        field: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        CalcError::InvalidInput {
            field: field.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// Create a MissingField error
    pub fn missing_field(field: impl Into<String>) -> Self {
        CalcError::MissingField {
            field: field.into(),
        }
    }

    /// Create a PhysicalConstraint error
    pub fn physical_constraint(field: impl Into<String>, reason: impl Into<String>) -> Self {
        CalcError::PhysicalConstraint {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create a CalculationFailed error
    pub fn calculation_failed(
        calculation_type: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        CalcError::CalculationFailed {
            calculation_type: calculation_type.into(),
            reason: reason.into(),
        }
    }

    /// Create a ConfigError
    pub fn config_error(path: impl Into<String>, reason: impl Into<String>) -> Self {
        CalcError::ConfigError {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// True for errors caused by the caller's input rather than the engine
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            CalcError::InvalidInput { .. } | CalcError::MissingField { .. }
        )
    }

    /// Get a short error code for programmatic handling
    pub fn error_code(&self) -> &'static str {
        match self {
            CalcError::InvalidInput { .. } => "INVALID_INPUT",
            CalcError::MissingField { .. } => "MISSING_FIELD",
            CalcError::PhysicalConstraint { .. } => "PHYSICAL_CONSTRAINT",
            CalcError::CalculationFailed { .. } => "CALCULATION_FAILED",
            CalcError::SerializationError { .. } => "SERIALIZATION_ERROR",
            CalcError::ConfigError { .. } => "CONFIG_ERROR",
            CalcError::RenderError { .. } => "RENDER_ERROR",
            CalcError::Internal { .. } => "INTERNAL_ERROR",
        }
    }
}

impl From<serde_json::Error> for CalcError {
    fn from(err: serde_json::Error) -> Self {
        CalcError::SerializationError {
            reason: err.to_string(),
        }
    }
}

/// Require a finite value, reporting the field name on failure.
pub fn require_finite(field: &str, value: f64) -> CalcResult<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(CalcError::invalid_input(
            field,
            value.to_string(),
            "Value must be a finite number",
        ))
    }
}

/// Require an `Option<f64>` to be present and finite.
pub fn require_present(field: &str, value: Option<f64>) -> CalcResult<f64> {
    match value {
        Some(v) => require_finite(field, v),
        None => Err(CalcError::missing_field(field)),
    }
}

/// Require a finite, strictly positive value.
pub fn require_positive(field: &str, value: f64) -> CalcResult<f64> {
    require_finite(field, value)?;
    if value <= 0.0 {
        return Err(CalcError::invalid_input(field, value.to_string(), "Value must be positive"));
    }
    Ok(value)
}

/// Require a finite value that is zero or more.
pub fn require_non_negative(field: &str, value: f64) -> CalcResult<f64> {
    require_finite(field, value)?;
    if value < 0.0 {
        return Err(CalcError::invalid_input(field, value.to_string(), "Value cannot be negative"));
    }
    Ok(value)
}

/// Require a finite percentage in 0–100.
pub fn require_percentage(field: &str, value: f64) -> CalcResult<f64> {
    require_finite(field, value)?;
    if !(0.0..=100.0).contains(&value) {
        return Err(CalcError::invalid_input(
            field,
            value.to_string(),
            "Percentage must be between 0 and 100",
        ));
    }
    Ok(value)
}

/// Require hot water to be warmer than cold water and return ΔT in K.
pub fn require_positive_delta_t(cold_temp_c: f64, hot_temp_c: f64) -> CalcResult<f64> {
    require_finite("cold_temp_c", cold_temp_c)?;
    require_finite("hot_temp_c", hot_temp_c)?;
    if hot_temp_c <= cold_temp_c {
        return Err(CalcError::physical_constraint(
            "hot_temp_c",
            format!(
                "Hot water temperature ({hot_temp_c} °C) must exceed cold water temperature ({cold_temp_c} °C)"
            ),
        ));
    }
    Ok((Celsius(hot_temp_c) - Celsius(cold_temp_c)).value())
}

/// Non-fatal condition attached to a result.
///
/// The engine still returns numbers, but a report should mention these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "details")]
pub enum CalcWarning {
    /// City heat price was zero; energy loss per m³ was divided by 1 instead.
    ZeroHeatPriceFallback,
    /// A modernization tier saves nothing, so it never pays back.
    NoPayback { label: String },
    /// Purchased heat was not supplied; a reference value was used for ratios.
    AssumedPurchasedHeat { assumed_gj: f64 },
}

impl CalcWarning {
    /// Get a short warning code for programmatic handling
    pub fn code(&self) -> &'static str {
        match self {
            CalcWarning::ZeroHeatPriceFallback => "ZERO_HEAT_PRICE_FALLBACK",
            CalcWarning::NoPayback { .. } => "NO_PAYBACK",
            CalcWarning::AssumedPurchasedHeat { .. } => "ASSUMED_PURCHASED_HEAT",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_serialization() {
        let error = CalcError::invalid_input("current_loss_pct", "NaN", "Value must be a finite number");
        let json = serde_json::to_string(&error).unwrap();
        assert!(json.contains("\"type\":\"InvalidInput\""));
        let roundtrip: CalcError = serde_json::from_str(&json).unwrap();
        assert_eq!(error, roundtrip);
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(CalcError::missing_field("x").error_code(), "MISSING_FIELD");
        assert_eq!(
            CalcError::physical_constraint("hot_temp_c", "too cold").error_code(),
            "PHYSICAL_CONSTRAINT"
        );
        assert!(CalcError::missing_field("x").is_validation());
        assert!(!CalcError::physical_constraint("a", "b").is_validation());
    }

    #[test]
    fn test_require_finite_rejects_nan_and_infinity() {
        assert!(require_finite("x", f64::NAN).is_err());
        assert!(require_finite("x", f64::INFINITY).is_err());
        assert_eq!(require_finite("x", 1.5), Ok(1.5));
    }

    #[test]
    fn test_require_present() {
        assert_eq!(
            require_present("x", None),
            Err(CalcError::missing_field("x"))
        );
        assert_eq!(require_present("x", Some(2.0)), Ok(2.0));
    }

    #[test]
    fn test_range_helpers() {
        assert!(require_positive("x", 0.0).is_err());
        assert_eq!(require_non_negative("x", 0.0), Ok(0.0));
        assert!(require_non_negative("x", -0.1).is_err());
        assert_eq!(require_percentage("x", 100.0), Ok(100.0));
        assert!(require_percentage("x", 100.5).is_err());
    }

    #[test]
    fn test_delta_t_must_be_positive() {
        assert_eq!(require_positive_delta_t(8.0, 55.0), Ok(47.0));
        let err = require_positive_delta_t(55.0, 55.0).unwrap_err();
        assert_eq!(err.error_code(), "PHYSICAL_CONSTRAINT");
        assert!(require_positive_delta_t(60.0, 55.0).is_err());
    }

    #[test]
    fn test_warning_codes() {
        assert_eq!(CalcWarning::ZeroHeatPriceFallback.code(), "ZERO_HEAT_PRICE_FALLBACK");
        let w = CalcWarning::NoPayback { label: "minimum".into() };
        let json = serde_json::to_string(&w).unwrap();
        assert!(json.contains("NoPayback"));
    }
}
