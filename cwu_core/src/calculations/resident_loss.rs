//! # Resident Loss Statement
//!
//! Compares what a resident pays per m³ of hot water with what heating that
//! m³ should cost at the city's district-heat price.
//!
//! ## Formulas
//!
//! ```text
//! ΔT                  = hot − cold                       (K, must be > 0)
//! energy per m³       = 0.004186 × ΔT                    (GJ/m³)
//! theoretical cost    = energy per m³ × heat price       (PLN/m³)
//! loss per m³         = billed price − theoretical cost  (PLN/m³, may be < 0)
//! energy loss per m³  = loss per m³ / heat price         (GJ/m³)
//! ```
//!
//! A zero heat price makes the last division meaningless. The divisor falls
//! back to 1 and a [`CalcWarning::ZeroHeatPriceFallback`] is attached, so the
//! "energy loss" figure is then numerically the PLN loss.
//!
//! ## Rounding
//!
//! | Field                          | Decimals |
//! |--------------------------------|----------|
//! | PLN values                     | 2        |
//! | GJ/m³ values                   | 4        |
//! | monthly / yearly GJ            | 3        |
//!
//! Intermediate values are kept unrounded; only the outputs are rounded.
//!
//! ## Example
//!
//! ```rust
//! use cwu_core::calculations::resident_loss::{compute_resident_loss, ResidentBillingRecord};
//!
//! let record = ResidentBillingRecord {
//!     billed_price_per_m3: 65.0,
//!     monthly_consumption_m3: 3.5,
//!     cold_temp_c: 8.0,
//!     hot_temp_c: 55.0,
//!     city_heat_price_per_gj: 82.13,
//! };
//! let result = compute_resident_loss(&record).unwrap();
//! assert_eq!(result.energy_per_m3_gj, 0.1967);
//! assert_eq!(result.theoretical_cost_per_m3, 16.16);
//! assert_eq!(result.loss_per_m3, 48.84);
//! ```

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::errors::{
    require_finite, require_non_negative, require_positive_delta_t, CalcResult, CalcWarning,
};
use crate::units::{round_to, MONTHS_PER_YEAR, WATER_HEAT_GJ_PER_M3_K};

/// One resident's hot-water bill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResidentBillingRecord {
    /// Price per m³ of hot water on the bill, PLN/m³
    pub billed_price_per_m3: f64,
    /// Hot water used per month, m³
    pub monthly_consumption_m3: f64,
    /// Cold water supply temperature, °C
    pub cold_temp_c: f64,
    /// Hot water temperature at the tap, °C
    pub hot_temp_c: f64,
    /// District-heat price, PLN/GJ
    pub city_heat_price_per_gj: f64,
}

impl ResidentBillingRecord {
    /// Validate input parameters and return ΔT in K.
    pub fn validate(&self) -> CalcResult<f64> {
        require_finite("billed_price_per_m3", self.billed_price_per_m3)?;
        require_non_negative("monthly_consumption_m3", self.monthly_consumption_m3)?;
        require_finite("city_heat_price_per_gj", self.city_heat_price_per_gj)?;
        require_positive_delta_t(self.cold_temp_c, self.hot_temp_c)
    }
}

/// Loss statement for one resident.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResidentLossResult {
    /// Heat needed to warm one m³, GJ/m³
    pub energy_per_m3_gj: f64,
    /// Cost of that heat at the city price, PLN/m³
    pub theoretical_cost_per_m3: f64,
    /// Billed price minus theoretical cost, PLN/m³
    pub loss_per_m3: f64,
    /// Loss per m³ expressed as heat, GJ/m³
    pub energy_loss_per_m3_gj: f64,
    pub monthly_financial_loss: f64,
    /// GJ per month
    pub monthly_energy_loss_gj: f64,
    pub yearly_financial_loss: f64,
    /// GJ per year
    pub yearly_energy_loss_gj: f64,
    /// What the resident would pay per month at the theoretical cost, PLN
    pub theoretical_monthly_payment: f64,
    /// What the resident pays per month now, PLN
    pub actual_monthly_payment: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<CalcWarning>,
}

impl ResidentLossResult {
    /// True when the bill is below the theoretical heat cost.
    pub fn is_underbilled(&self) -> bool {
        self.loss_per_m3 < 0.0
    }
}

/// Compute the loss statement for one bill.
pub fn compute_resident_loss(record: &ResidentBillingRecord) -> CalcResult<ResidentLossResult> {
    let delta_t = record.validate()?;
    let price = record.city_heat_price_per_gj;
    let consumption = record.monthly_consumption_m3;

    let mut warnings = Vec::new();
    let energy_per_m3 = WATER_HEAT_GJ_PER_M3_K * delta_t;
    let theoretical_cost = energy_per_m3 * price;
    let loss_per_m3 = record.billed_price_per_m3 - theoretical_cost;

    let divisor = if price == 0.0 {
        warn!("city heat price is zero, energy loss per m³ divided by 1");
        warnings.push(CalcWarning::ZeroHeatPriceFallback);
        1.0
    } else {
        price
    };
    let energy_loss_per_m3 = loss_per_m3 / divisor;

    let monthly_financial = loss_per_m3 * consumption;
    let monthly_energy = energy_loss_per_m3 * consumption;

    debug!(
        delta_t,
        energy_per_m3,
        theoretical_cost,
        loss_per_m3,
        energy_loss_per_m3,
        "resident loss"
    );

    Ok(ResidentLossResult {
        energy_per_m3_gj: round_to(energy_per_m3, 4),
        theoretical_cost_per_m3: round_to(theoretical_cost, 2),
        loss_per_m3: round_to(loss_per_m3, 2),
        energy_loss_per_m3_gj: round_to(energy_loss_per_m3, 4),
        monthly_financial_loss: round_to(monthly_financial, 2),
        monthly_energy_loss_gj: round_to(monthly_energy, 3),
        yearly_financial_loss: round_to(monthly_financial * MONTHS_PER_YEAR, 2),
        yearly_energy_loss_gj: round_to(monthly_energy * MONTHS_PER_YEAR, 3),
        theoretical_monthly_payment: round_to(theoretical_cost * consumption, 2),
        actual_monthly_payment: round_to(record.billed_price_per_m3 * consumption, 2),
        warnings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn reference_bill() -> ResidentBillingRecord {
        ResidentBillingRecord {
            billed_price_per_m3: 65.0,
            monthly_consumption_m3: 3.5,
            cold_temp_c: 8.0,
            hot_temp_c: 55.0,
            city_heat_price_per_gj: 82.13,
        }
    }

    #[test]
    fn test_reference_statement() {
        let r = compute_resident_loss(&reference_bill()).unwrap();
        assert_eq!(r.energy_per_m3_gj, 0.1967);
        assert_eq!(r.theoretical_cost_per_m3, 16.16);
        assert_eq!(r.loss_per_m3, 48.84);
        // 48.841580… × 3.5
        assert_eq!(r.monthly_financial_loss, 170.95);
        assert_eq!(r.yearly_financial_loss, 2051.35);
        assert_eq!(r.actual_monthly_payment, 227.5);
        assert_eq!(r.theoretical_monthly_payment, 56.55);
        assert_eq!(r.energy_loss_per_m3_gj, 0.5947);
        assert_abs_diff_eq!(r.monthly_energy_loss_gj, 2.081, epsilon = 1e-12);
        assert_abs_diff_eq!(r.yearly_energy_loss_gj, 24.977, epsilon = 1e-12);
        assert!(r.warnings.is_empty());
        assert!(!r.is_underbilled());
    }

    #[test]
    fn test_energy_per_m3_is_linear_in_delta_t() {
        let record = ResidentBillingRecord {
            cold_temp_c: 10.0,
            hot_temp_c: 50.0,
            city_heat_price_per_gj: 100.0,
            ..reference_bill()
        };
        let r = compute_resident_loss(&record).unwrap();
        // 0.004186 × 40 = 0.16744 GJ/m³
        assert_eq!(r.energy_per_m3_gj, round_to(WATER_HEAT_GJ_PER_M3_K * 40.0, 4));
        assert_eq!(r.energy_per_m3_gj, 0.1674);
        assert_eq!(r.theoretical_cost_per_m3, 16.74);
    }

    #[test]
    fn test_underbilled_is_valid_outcome() {
        let record = ResidentBillingRecord {
            billed_price_per_m3: 10.0,
            ..reference_bill()
        };
        let r = compute_resident_loss(&record).unwrap();
        assert!(r.is_underbilled());
        assert_eq!(r.loss_per_m3, -6.16);
    }

    #[test]
    fn test_zero_price_falls_back_to_unit_divisor() {
        let record = ResidentBillingRecord {
            city_heat_price_per_gj: 0.0,
            ..reference_bill()
        };
        let r = compute_resident_loss(&record).unwrap();
        assert_eq!(r.theoretical_cost_per_m3, 0.0);
        assert_eq!(r.loss_per_m3, 65.0);
        assert_eq!(r.energy_loss_per_m3_gj, 65.0);
        assert_eq!(r.warnings, vec![CalcWarning::ZeroHeatPriceFallback]);
    }

    #[test]
    fn test_zero_consumption() {
        let record = ResidentBillingRecord {
            monthly_consumption_m3: 0.0,
            ..reference_bill()
        };
        let r = compute_resident_loss(&record).unwrap();
        assert_eq!(r.monthly_financial_loss, 0.0);
        assert_eq!(r.yearly_energy_loss_gj, 0.0);
        assert_eq!(r.loss_per_m3, 48.84);
    }

    #[test]
    fn test_rejects_non_positive_delta_t() {
        let record = ResidentBillingRecord {
            hot_temp_c: 8.0,
            ..reference_bill()
        };
        let err = compute_resident_loss(&record).unwrap_err();
        assert_eq!(err.error_code(), "PHYSICAL_CONSTRAINT");
    }

    #[test]
    fn test_rejects_non_finite_fields() {
        let record = ResidentBillingRecord {
            billed_price_per_m3: f64::NAN,
            ..reference_bill()
        };
        assert!(compute_resident_loss(&record).unwrap_err().is_validation());

        let record = ResidentBillingRecord {
            monthly_consumption_m3: -1.0,
            ..reference_bill()
        };
        assert!(compute_resident_loss(&record).is_err());
    }
}
