//! # Thermal Formulas
//!
//! Energy and power needed to raise domestic water from the cold-supply
//! temperature to the hot-water set point.
//!
//! ## Notation
//!
//! - `V` = Volume of water
//! - `ΔT` = Hot minus cold temperature (K)
//! - `c` = Specific heat of water (kJ/(kg·K))
//! - `ṁ` = Mass flow (kg/s)
//! - `Φ` = Thermal power (kW)

use serde::{Deserialize, Serialize};

use crate::units::{
    KiloJoules, GigaJoules, KilowattHours, SECONDS_PER_HOUR, WATER_DENSITY_KG_PER_M3,
    WATER_HEAT_KWH_PER_M3_K, WATER_SPECIFIC_HEAT_KJ_PER_KG_K,
};

/// Energy needed to heat a volume of water, in both reporting units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HeatingEnergy {
    pub kwh: f64,
    pub gj: f64,
}

/// Energy to heat `volume_m3` of water by `delta_t_k`.
///
/// # Formula
/// Q = V × ρ × c × ΔT  (kJ), with ρ = 1000 kg/m³ and c = 4.186 kJ/(kg·K)
///
/// # Example
/// ```rust
/// use cwu_core::equations::thermal::water_heating_energy;
///
/// // 1 m³ heated by 47 K
/// let q = water_heating_energy(1.0, 47.0);
/// assert!((q.gj - 0.196742).abs() < 1e-9);
/// ```
pub fn water_heating_energy(volume_m3: f64, delta_t_k: f64) -> HeatingEnergy {
    let q = KiloJoules(volume_m3 * WATER_DENSITY_KG_PER_M3 * WATER_SPECIFIC_HEAT_KJ_PER_KG_K * delta_t_k);
    let kwh: KilowattHours = q.into();
    let gj: GigaJoules = q.into();
    HeatingEnergy {
        kwh: kwh.0,
        gj: gj.0,
    }
}

/// Mass flow of water for a volumetric flow in m³/h.
///
/// # Formula
/// ṁ = V̇ × 1000 / 3600  (kg/s)
#[inline]
pub fn mass_flow_kg_per_s(flow_m3_per_h: f64) -> f64 {
    flow_m3_per_h * WATER_DENSITY_KG_PER_M3 / SECONDS_PER_HOUR
}

/// Thermal power carried by a flow heated through `delta_t_k`.
///
/// # Formula
/// Φ = ṁ × c × ΔT  (kW)
///
/// # Example
/// ```rust
/// use cwu_core::equations::thermal::power_from_flow_kw;
///
/// // 3.6 m³/h = 1 kg/s, c = 4.19, ΔT = 45 K
/// let phi = power_from_flow_kw(3.6, 4.19, 45.0);
/// assert!((phi - 188.55).abs() < 1e-9);
/// ```
#[inline]
pub fn power_from_flow_kw(flow_m3_per_h: f64, specific_heat_kj_per_kg_k: f64, delta_t_k: f64) -> f64 {
    mass_flow_kg_per_s(flow_m3_per_h) * specific_heat_kj_per_kg_k * delta_t_k
}

/// Energy stored in a tank of hot water.
///
/// # Formula
/// Q = 1.163 × V × ΔT  (kWh), V in m³
#[inline]
pub fn tank_stored_energy_kwh(volume_m3: f64, delta_t_k: f64) -> f64 {
    WATER_HEAT_KWH_PER_M3_K * volume_m3 * delta_t_k
}

/// Simultaneity factor for a number of flats.
///
/// # Formula
/// φ = clamp(m / √n, 0.1, 1.0), where `m` is the usage-profile multiplier
pub fn simultaneity_factor(flats: u32, profile_multiplier: f64) -> f64 {
    let base = 1.0 / (flats.max(1) as f64).sqrt();
    (base * profile_multiplier).clamp(0.1, 1.0)
}

/// Estimated peak hot-water draw for a block of flats, L/min.
///
/// Unit draw is 16 L/min per flat with bathtubs and 12 L/min with showers
/// only. Simultaneity is 0.20 above 40 flats and 0.25 otherwise.
///
/// # Example
/// ```rust
/// use cwu_core::equations::thermal::peak_draw_lpm;
///
/// assert_eq!(peak_draw_lpm(40, true), 160.0);
/// assert_eq!(peak_draw_lpm(50, false), 120.0);
/// ```
pub fn peak_draw_lpm(apartments: u32, has_bathtubs: bool) -> f64 {
    let unit_flow = if has_bathtubs { 16.0 } else { 12.0 };
    let phi = if apartments > 40 { 0.20 } else { 0.25 };
    apartments as f64 * unit_flow * phi
}
