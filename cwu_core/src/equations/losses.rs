//! # Loss Formulas
//!
//! Circulation heat loss and the degradation correction used to estimate
//! energy use after a circulation upgrade (PN-EN 15316-3-2 style).

use crate::units::{watt_hours_to_gj, Kilowatts, Watts};

/// Annual circulation loss from a heat-loss coefficient.
///
/// # Formula
/// Q = UA × ΔT × t  (W·h), then × 3600 / 1e9 → GJ
///
/// # Example
/// ```rust
/// use cwu_core::equations::losses::ua_loss_gj;
///
/// let q = ua_loss_gj(100.0, 20.0, 8760.0);
/// assert!((q - 63.072).abs() < 1e-9);
/// ```
#[inline]
pub fn ua_loss_gj(ua_w_per_k: f64, delta_t_k: f64, hours: f64) -> f64 {
    watt_hours_to_gj(ua_w_per_k * delta_t_k * hours)
}

/// Constant loss power of a pipe run or tank, kW.
///
/// # Formula
/// Φ = UA × ΔT  (W) → kW
#[inline]
pub fn ua_loss_kw(ua_w_per_k: f64, delta_t_k: f64) -> f64 {
    Kilowatts::from(Watts(ua_w_per_k * delta_t_k)).value()
}

/// Circulation loss as a share of purchased heat.
#[inline]
pub fn percentage_loss_gj(purchased_gj: f64, circulation_pct: f64) -> f64 {
    purchased_gj * circulation_pct / 100.0
}

/// Loss after a relative reduction: x_po = x × (1 − r/100).
#[inline]
pub fn modernized_loss_pct(current_loss_pct: f64, reduction_pct: f64) -> f64 {
    current_loss_pct * (1.0 - reduction_pct / 100.0)
}

/// Energy use after the loss changes from `x` to `x_po` percent.
///
/// # Formula
/// E_po = E × (1 + x_po/100) / (1 + x/100)
#[inline]
pub fn modernized_annual_energy(current_energy: f64, current_loss_pct: f64, post_loss_pct: f64) -> f64 {
    current_energy * (1.0 + post_loss_pct / 100.0) / (1.0 + current_loss_pct / 100.0)
}
