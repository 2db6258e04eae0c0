//! # Cost-Optimal Ordered Power
//!
//! Ordering more power costs a fixed annual fee per kW; ordering less than the
//! technical peak risks exceedance penalties. This module tabulates the
//! annual cost over a grid of candidate powers and picks the cheapest.
//!
//! ## Cost model
//!
//! For each candidate `P`:
//!
//! ```text
//! fixed   = P × power_rate                          (PLN/year)
//! penalty = avg_exceed × penalty_rate × hours       if P < technical power
//!         = 0                                       otherwise
//! total   = fixed + penalty
//! ```
//!
//! Default grid: from max(5, round(0.5·P_tech)) to round(1.5·P_tech) in
//! about 20 steps of at least 1 kW. For a very small technical power the
//! default grid collapses to the single 5 kW candidate.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::{require_non_negative, require_positive, CalcError, CalcResult};
use crate::units::round_to;

/// Upper bound on the number of candidate rows
const MAX_CANDIDATES: usize = 10_000;

/// Default hours per year spent above the ordered power
const DEFAULT_EXCEED_HOURS: f64 = 50.0;

/// Economic parameters of the cost method.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CostOptimizationInput {
    /// Annual fee per ordered kW, PLN/(kW·year)
    pub power_rate_pln_per_kw: f64,

    /// Penalty per kW of exceedance per hour, PLN/(kW·h)
    pub penalty_rate_pln_per_kw_h: f64,

    /// Hours per year with exceedance (default 50)
    #[serde(default)]
    pub expected_exceed_hours: Option<f64>,

    /// Average exceedance when it happens, kW (default 10 % of technical power)
    #[serde(default)]
    pub avg_exceed_kw: Option<f64>,

    /// First candidate, kW
    #[serde(default)]
    pub candidate_from_kw: Option<f64>,

    /// Last candidate, kW
    #[serde(default)]
    pub candidate_to_kw: Option<f64>,

    /// Grid step, kW
    #[serde(default)]
    pub candidate_step_kw: Option<f64>,
}

impl CostOptimizationInput {
    /// Validate input parameters.
    pub fn validate(&self) -> CalcResult<()> {
        require_positive("power_rate_pln_per_kw", self.power_rate_pln_per_kw)?;
        require_positive("penalty_rate_pln_per_kw_h", self.penalty_rate_pln_per_kw_h)?;
        if let Some(h) = self.expected_exceed_hours {
            require_non_negative("expected_exceed_hours", h)?;
        }
        if let Some(kw) = self.avg_exceed_kw {
            require_non_negative("avg_exceed_kw", kw)?;
        }
        if let Some(from) = self.candidate_from_kw {
            require_non_negative("candidate_from_kw", from)?;
        }
        if let Some(to) = self.candidate_to_kw {
            require_non_negative("candidate_to_kw", to)?;
        }
        if let Some(step) = self.candidate_step_kw {
            require_positive("candidate_step_kw", step)?;
        }
        Ok(())
    }
}

/// One candidate power and its annual cost.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostRow {
    pub power_kw: f64,
    pub cost_fixed_pln: f64,
    pub cost_penalty_pln: f64,
    pub cost_total_pln: f64,
}

/// Cost table and its optimum.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostOptimization {
    pub rows: Vec<CostRow>,
    pub optimum_power_kw: f64,
    pub optimum_cost_pln: f64,
    /// Human-readable list of the assumptions used
    pub assumptions: Vec<String>,
}

/// Number of grid points in `from..=to`, checked before any allocation.
fn candidate_count(from: f64, to: f64, step: f64) -> CalcResult<usize> {
    let intervals = ((to - from) / step).floor();
    if !intervals.is_finite() || intervals + 1.0 > MAX_CANDIDATES as f64 {
        return Err(CalcError::invalid_input(
            "candidate_step_kw",
            step.to_string(),
            format!("Grid from {from} kW to {to} kW would exceed {MAX_CANDIDATES} candidates"),
        ));
    }
    Ok(intervals as usize + 1)
}

/// Tabulate annual cost over candidate powers and return the cheapest.
///
/// # Example
///
/// ```rust
/// use cwu_core::calculations::power_cost::{optimize_ordered_power, CostOptimizationInput};
///
/// let input = CostOptimizationInput {
///     power_rate_pln_per_kw: 150.0,
///     penalty_rate_pln_per_kw_h: 20.0,
///     ..Default::default()
/// };
/// let result = optimize_ordered_power(100.0, &input).unwrap();
/// assert!(!result.rows.is_empty());
/// ```
pub fn optimize_ordered_power(
    technical_power_kw: f64,
    input: &CostOptimizationInput,
) -> CalcResult<CostOptimization> {
    require_non_negative("technical_power_kw", technical_power_kw)?;
    input.validate()?;

    let from = input
        .candidate_from_kw
        .unwrap_or_else(|| 5f64.max((technical_power_kw * 0.5).round()));
    // A defaulted upper bound never falls below the lower one.
    let to = input
        .candidate_to_kw
        .unwrap_or_else(|| (technical_power_kw * 1.5).round().max(from));
    let step = input
        .candidate_step_kw
        .unwrap_or_else(|| 1f64.max(((to - from) / 20.0).round()));
    let hours = input.expected_exceed_hours.unwrap_or(DEFAULT_EXCEED_HOURS);
    let avg_exceed_kw = input
        .avg_exceed_kw
        .unwrap_or_else(|| (technical_power_kw * 0.1).max(0.0));

    if from > to {
        return Err(CalcError::calculation_failed(
            "power_cost",
            format!("Candidate range is empty ({from} kW > {to} kW)"),
        ));
    }
    let count = candidate_count(from, to, step)?;

    let rows: Vec<CostRow> = (0..count)
        .map(|i| {
            let p = from + i as f64 * step;
            let exceed_kw = (technical_power_kw - p).max(0.0);
            let cost_fixed = p * input.power_rate_pln_per_kw;
            let penalty_kw = if exceed_kw > 0.0 { avg_exceed_kw } else { 0.0 };
            let cost_penalty = penalty_kw * input.penalty_rate_pln_per_kw_h * hours;
            CostRow {
                power_kw: round_to(p, 1),
                cost_fixed_pln: cost_fixed.round(),
                cost_penalty_pln: cost_penalty.round(),
                cost_total_pln: (cost_fixed + cost_penalty).round(),
            }
        })
        .collect();

    // First minimum wins on ties.
    let optimum = rows
        .iter()
        .fold(None::<&CostRow>, |best, row| match best {
            Some(b) if b.cost_total_pln <= row.cost_total_pln => Some(b),
            _ => Some(row),
        })
        .ok_or_else(|| CalcError::calculation_failed("power_cost", "No candidate rows"))?;

    let (optimum_power_kw, optimum_cost_pln) = (optimum.power_kw, optimum.cost_total_pln);
    debug!(
        technical_power_kw,
        candidates = rows.len(),
        optimum_power_kw,
        optimum_cost_pln,
        "ordered power cost optimization"
    );

    Ok(CostOptimization {
        assumptions: vec![
            format!("Power rate: {} PLN/kW/year", input.power_rate_pln_per_kw),
            format!("Penalty: {} PLN/kW·h", input.penalty_rate_pln_per_kw_h),
            format!("Exceedance hours: {hours} h/year"),
            format!("Average exceedance: {avg_exceed_kw:.1} kW"),
        ],
        rows,
        optimum_power_kw,
        optimum_cost_pln,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rates() -> CostOptimizationInput {
        CostOptimizationInput {
            power_rate_pln_per_kw: 150.0,
            penalty_rate_pln_per_kw_h: 20.0,
            ..Default::default()
        }
    }

    #[test]
    fn test_default_grid() {
        let result = optimize_ordered_power(100.0, &rates()).unwrap();
        // 50..=150 step 5 → 21 rows
        assert_eq!(result.rows.len(), 21);
        assert_eq!(result.rows[0].power_kw, 50.0);
        assert_eq!(result.rows[20].power_kw, 150.0);
    }

    #[test]
    fn test_penalty_only_below_technical_power() {
        let result = optimize_ordered_power(100.0, &rates()).unwrap();
        for row in &result.rows {
            if row.power_kw < 100.0 {
                // 10 kW × 20 PLN × 50 h
                assert_eq!(row.cost_penalty_pln, 10_000.0);
            } else {
                assert_eq!(row.cost_penalty_pln, 0.0);
            }
        }
    }

    #[test]
    fn test_optimum_is_cheapest_row() {
        let result = optimize_ordered_power(100.0, &rates()).unwrap();
        // 50 kW: 7500 + 10 000 = 17 500; 100 kW: 15 000 → cheapest is 100 kW
        assert_eq!(result.optimum_power_kw, 100.0);
        assert_eq!(result.optimum_cost_pln, 15_000.0);
        let min = result
            .rows
            .iter()
            .map(|r| r.cost_total_pln)
            .fold(f64::INFINITY, f64::min);
        assert_eq!(result.optimum_cost_pln, min);
    }

    #[test]
    fn test_cheap_penalty_prefers_low_order() {
        let input = CostOptimizationInput {
            penalty_rate_pln_per_kw_h: 0.5,
            ..rates()
        };
        let result = optimize_ordered_power(100.0, &input).unwrap();
        // penalty 250 PLN is far below fixed savings; lowest candidate wins
        assert_eq!(result.optimum_power_kw, 50.0);
    }

    #[test]
    fn test_explicit_grid_and_empty_range() {
        let input = CostOptimizationInput {
            candidate_from_kw: Some(80.0),
            candidate_to_kw: Some(120.0),
            candidate_step_kw: Some(10.0),
            ..rates()
        };
        let result = optimize_ordered_power(100.0, &input).unwrap();
        let powers: Vec<f64> = result.rows.iter().map(|r| r.power_kw).collect();
        assert_eq!(powers, vec![80.0, 90.0, 100.0, 110.0, 120.0]);

        let bad = CostOptimizationInput {
            candidate_from_kw: Some(200.0),
            candidate_to_kw: Some(100.0),
            ..rates()
        };
        assert_eq!(
            optimize_ordered_power(100.0, &bad).unwrap_err().error_code(),
            "CALCULATION_FAILED"
        );
    }

    #[test]
    fn test_huge_range_rejected_without_overflow() {
        let input = CostOptimizationInput {
            candidate_from_kw: Some(0.0),
            candidate_to_kw: Some(1e20),
            candidate_step_kw: Some(1.0),
            ..rates()
        };
        let err = optimize_ordered_power(100.0, &input).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_INPUT");

        let just_over = CostOptimizationInput {
            candidate_from_kw: Some(0.0),
            candidate_to_kw: Some(MAX_CANDIDATES as f64),
            candidate_step_kw: Some(1.0),
            ..rates()
        };
        assert!(optimize_ordered_power(100.0, &just_over).is_err());

        let at_limit = CostOptimizationInput {
            candidate_to_kw: Some(MAX_CANDIDATES as f64 - 1.0),
            ..just_over
        };
        let result = optimize_ordered_power(100.0, &at_limit).unwrap();
        assert_eq!(result.rows.len(), MAX_CANDIDATES);
    }

    #[test]
    fn test_small_technical_power_keeps_one_candidate() {
        let result = optimize_ordered_power(2.0, &rates()).unwrap();
        assert_eq!(result.rows.len(), 1);
        assert_eq!(result.optimum_power_kw, 5.0);

        let result = optimize_ordered_power(0.0, &rates()).unwrap();
        assert_eq!(result.rows[0].cost_penalty_pln, 0.0);
    }

    #[test]
    fn test_rejects_zero_rates() {
        let input = CostOptimizationInput::default();
        assert!(optimize_ordered_power(100.0, &input).is_err());
    }
}
