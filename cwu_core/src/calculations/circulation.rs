//! # Circulation Heat Loss
//!
//! Annual heat lost in the hot-water circulation loop, from one of two models:
//!
//! - **Physical**: UA × ΔT × t, from a measured or estimated heat-loss
//!   coefficient of the pipe run
//! - **Percentage**: an assumed share of the purchased heat
//!
//! When a positive UA is supplied the physical model is used, even if a
//! percentage and purchased heat are supplied too. [`CirculationModel::select`]
//! makes that choice explicit so every branch can be tested on its own.
//!
//! ## Example
//!
//! ```rust
//! use cwu_core::calculations::circulation::{loss_by_ua, CirculationModel};
//!
//! let loss = loss_by_ua(100.0, 20.0, 8760.0).unwrap();
//! assert!((loss.annual_loss_gj - 63.072).abs() < 1e-9);
//!
//! let model = CirculationModel::select(Some(100.0), 20.0, 8760.0, Some(25.0), Some(800.0));
//! assert!(matches!(model, CirculationModel::Physical { .. }));
//! ```

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::equations::losses::{percentage_loss_gj, ua_loss_gj};
use crate::errors::{require_non_negative, require_percentage, require_positive, CalcResult};

/// Annual circulation loss.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CirculationLoss {
    /// Heat lost per year, GJ
    pub annual_loss_gj: f64,
}

/// Annual loss from a heat-loss coefficient.
///
/// # Arguments
///
/// * `ua_w_per_k` - Heat-loss coefficient of the loop, W/K (≥ 0)
/// * `delta_t_k` - Loop temperature minus surroundings, K (≥ 0)
/// * `hours_per_year` - Hours the loop runs per year (> 0)
pub fn loss_by_ua(ua_w_per_k: f64, delta_t_k: f64, hours_per_year: f64) -> CalcResult<CirculationLoss> {
    require_non_negative("ua_w_per_k", ua_w_per_k)?;
    require_non_negative("delta_t_k", delta_t_k)?;
    require_positive("hours_per_year", hours_per_year)?;

    let annual_loss_gj = ua_loss_gj(ua_w_per_k, delta_t_k, hours_per_year);
    debug!(ua_w_per_k, delta_t_k, hours_per_year, annual_loss_gj, "circulation loss (UA)");
    Ok(CirculationLoss { annual_loss_gj })
}

/// Annual loss as a percentage of purchased heat.
///
/// # Arguments
///
/// * `purchased_gj` - Heat bought for hot water per year, GJ (> 0)
/// * `circulation_pct` - Share lost in circulation, 0–100
pub fn loss_by_percentage(purchased_gj: f64, circulation_pct: f64) -> CalcResult<CirculationLoss> {
    require_positive("purchased_gj", purchased_gj)?;
    require_percentage("circulation_pct", circulation_pct)?;

    let annual_loss_gj = percentage_loss_gj(purchased_gj, circulation_pct);
    debug!(purchased_gj, circulation_pct, annual_loss_gj, "circulation loss (percentage)");
    Ok(CirculationLoss { annual_loss_gj })
}

/// Which loss model applies to a given set of inputs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "model")]
pub enum CirculationModel {
    /// UA × ΔT × t; chosen whenever UA > 0
    Physical {
        ua_w_per_k: f64,
        delta_t_k: f64,
        hours_per_year: f64,
    },
    /// Share of purchased heat; chosen when UA is absent or zero and both
    /// a positive percentage and purchased heat are supplied
    Percentage {
        purchased_gj: f64,
        circulation_pct: f64,
    },
    /// Not enough data; loss is taken as zero
    NotAssessed,
}

impl CirculationModel {
    /// Pick the model. A positive UA always wins over a percentage.
    pub fn select(
        ua_w_per_k: Option<f64>,
        delta_t_k: f64,
        hours_per_year: f64,
        circulation_pct: Option<f64>,
        purchased_gj: Option<f64>,
    ) -> Self {
        match (ua_w_per_k, circulation_pct, purchased_gj) {
            (Some(ua), _, _) if ua > 0.0 => CirculationModel::Physical {
                ua_w_per_k: ua,
                delta_t_k,
                hours_per_year,
            },
            (_, Some(pct), Some(gj)) if pct > 0.0 && gj > 0.0 => CirculationModel::Percentage {
                purchased_gj: gj,
                circulation_pct: pct,
            },
            _ => CirculationModel::NotAssessed,
        }
    }

    /// Evaluate the selected model.
    pub fn annual_loss(&self) -> CalcResult<CirculationLoss> {
        match *self {
            CirculationModel::Physical {
                ua_w_per_k,
                delta_t_k,
                hours_per_year,
            } => loss_by_ua(ua_w_per_k, delta_t_k, hours_per_year),
            CirculationModel::Percentage {
                purchased_gj,
                circulation_pct,
            } => loss_by_percentage(purchased_gj, circulation_pct),
            CirculationModel::NotAssessed => Ok(CirculationLoss { annual_loss_gj: 0.0 }),
        }
    }

    /// Short name for reports
    pub fn name(&self) -> &'static str {
        match self {
            CirculationModel::Physical { .. } => "UA×ΔT×t",
            CirculationModel::Percentage { .. } => "percentage of purchased heat",
            CirculationModel::NotAssessed => "not assessed",
        }
    }
}
