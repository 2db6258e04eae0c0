//! # Ordered Power for Domestic Hot Water
//!
//! Sizes the thermal power a building must order from the district-heat
//! supplier to cover hot-water demand. Three forms are provided:
//!
//! - [`calculate`] - occupancy based, with an optional buffer tank that
//!   smooths the peak (the most complete form)
//! - [`calculate_building`] - building-level shortcut: peak flow per person,
//!   circulation add-on, safety margin and a rounding step
//! - [`calculate_peak_draw`] - auditor form driven by a measured or estimated
//!   peak draw rate and a simultaneity profile
//!
//! ## Assumptions
//!
//! - Water density 1000 kg/m³
//! - c = 4.19 kJ/(kg·K) in the occupancy form, 4.186 kJ/(kg·K) in the
//!   auditor form, 1.16 kWh/(m³·K) in the building shortcut
//! - A tank can lower the required source power, never below average demand
//!
//! ## Example
//!
//! ```rust
//! use cwu_core::calculations::ordered_power::{calculate, BufferTank, OccupancyPowerInput};
//!
//! let input = OccupancyPowerInput {
//!     label: "Block A".to_string(),
//!     flats: 88,
//!     persons_per_flat: 1.5,
//!     per_person_daily_use_l: 110.0,
//!     operating_hours_per_day: 18.0,
//!     non_uniformity_nh: 2.5,
//!     cold_temp_c: 10.0,
//!     hot_temp_c: 55.0,
//!     tank: Some(BufferTank {
//!         volume_l: 1000.0,
//!         usable_fraction: 0.8,
//!         peak_duration_h: 0.5,
//!     }),
//! };
//!
//! let result = calculate(&input).unwrap();
//! assert!(result.required_source_power_kw >= result.average_power_kw);
//! ```

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::equations::thermal::{power_from_flow_kw, simultaneity_factor, tank_stored_energy_kwh};
use crate::errors::{
    require_finite, require_non_negative, require_positive, require_positive_delta_t, CalcError,
    CalcResult,
};
use crate::units::{
    CubicMeters, Liters, SECONDS_PER_HOUR, WATER_DENSITY_KG_PER_L,
    WATER_HEAT_SHORTCUT_KWH_PER_M3_K, WATER_SPECIFIC_HEAT_KJ_PER_KG_K,
    WATER_SPECIFIC_HEAT_SIZING_KJ_PER_KG_K,
};

// ============================================================================
// Occupancy form (with optional buffer tank)
// ============================================================================

/// Buffer tank that covers part of the peak draw.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BufferTank {
    /// Tank volume in liters
    pub volume_l: f64,

    /// Share of stored energy that can actually be drawn (0–1)
    pub usable_fraction: f64,

    /// Length of the peak the tank has to bridge, hours
    pub peak_duration_h: f64,
}

impl BufferTank {
    /// Validate tank parameters.
    pub fn validate(&self) -> CalcResult<()> {
        require_finite("tank.volume_l", self.volume_l)?;
        require_finite("tank.usable_fraction", self.usable_fraction)?;
        require_finite("tank.peak_duration_h", self.peak_duration_h)?;
        if self.volume_l < 0.0 {
            return Err(CalcError::invalid_input(
                "tank.volume_l",
                self.volume_l.to_string(),
                "Tank volume cannot be negative",
            ));
        }
        if !(0.0..=1.0).contains(&self.usable_fraction) {
            return Err(CalcError::invalid_input(
                "tank.usable_fraction",
                self.usable_fraction.to_string(),
                "Usable fraction must be between 0 and 1",
            ));
        }
        if self.peak_duration_h <= 0.0 {
            return Err(CalcError::invalid_input(
                "tank.peak_duration_h",
                self.peak_duration_h.to_string(),
                "Peak duration must be positive",
            ));
        }
        Ok(())
    }
}

/// Input parameters for occupancy-based ordered power.
///
/// ## JSON Example
///
/// ```json
/// {
///   "label": "Block A",
///   "flats": 88,
///   "persons_per_flat": 1.5,
///   "per_person_daily_use_l": 110.0,
///   "operating_hours_per_day": 18.0,
///   "non_uniformity_nh": 2.5,
///   "cold_temp_c": 10.0,
///   "hot_temp_c": 55.0,
///   "tank": { "volume_l": 1000.0, "usable_fraction": 0.8, "peak_duration_h": 0.5 }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OccupancyPowerInput {
    /// User label (building or substation name)
    pub label: String,

    /// Number of flats
    pub flats: u32,

    /// Average number of residents per flat
    pub persons_per_flat: f64,

    /// Hot water used per person per day, liters
    pub per_person_daily_use_l: f64,

    /// Hours per day over which the daily demand is spread
    pub operating_hours_per_day: f64,

    /// Non-uniformity coefficient Nh (peak hour / average hour), ≥ 1
    pub non_uniformity_nh: f64,

    /// Cold supply temperature, °C
    pub cold_temp_c: f64,

    /// Hot water set point, °C
    pub hot_temp_c: f64,

    /// Optional buffer tank; `None` sizes without smoothing
    #[serde(default)]
    pub tank: Option<BufferTank>,
}

impl Default for OccupancyPowerInput {
    fn default() -> Self {
        OccupancyPowerInput {
            label: String::new(),
            flats: 88,
            persons_per_flat: 1.5,
            per_person_daily_use_l: 110.0,
            operating_hours_per_day: 18.0,
            non_uniformity_nh: 2.5,
            cold_temp_c: 10.0,
            hot_temp_c: 55.0,
            tank: Some(BufferTank {
                volume_l: 1000.0,
                usable_fraction: 0.8,
                peak_duration_h: 0.5,
            }),
        }
    }
}

impl OccupancyPowerInput {
    /// Validate input parameters.
    pub fn validate(&self) -> CalcResult<()> {
        if self.flats == 0 {
            return Err(CalcError::invalid_input(
                "flats",
                self.flats.to_string(),
                "Number of flats must be positive",
            ));
        }
        require_positive("persons_per_flat", self.persons_per_flat)?;
        require_positive("per_person_daily_use_l", self.per_person_daily_use_l)?;
        require_positive("operating_hours_per_day", self.operating_hours_per_day)?;
        if self.operating_hours_per_day > 24.0 {
            return Err(CalcError::invalid_input(
                "operating_hours_per_day",
                self.operating_hours_per_day.to_string(),
                "A day has at most 24 hours",
            ));
        }
        require_finite("non_uniformity_nh", self.non_uniformity_nh)?;
        if self.non_uniformity_nh < 1.0 {
            return Err(CalcError::invalid_input(
                "non_uniformity_nh",
                self.non_uniformity_nh.to_string(),
                "Non-uniformity coefficient must be at least 1",
            ));
        }
        require_positive_delta_t(self.cold_temp_c, self.hot_temp_c)?;
        if let Some(tank) = &self.tank {
            tank.validate()?;
        }
        Ok(())
    }

    /// Number of residents
    pub fn occupants(&self) -> f64 {
        self.flats as f64 * self.persons_per_flat
    }
}

/// Results from occupancy-based ordered power.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OccupancyPowerResult {
    /// Number of residents
    pub occupants: f64,

    /// Average daily hot-water demand, m³/day
    pub average_daily_demand_m3: f64,

    /// Average hourly flow, m³/h
    pub average_hourly_flow_m3h: f64,

    /// Peak hourly flow (Nh × average), m³/h
    pub peak_hourly_flow_m3h: f64,

    /// Power to cover the average flow, kW
    pub average_power_kw: f64,

    /// Power to cover the peak flow with no tank, kW
    pub peak_power_without_tank_kw: f64,

    /// Energy held by the tank between cold and hot temperature, kWh
    pub stored_energy_kwh: f64,

    /// Part of stored energy that can be drawn, kWh
    pub usable_energy_kwh: f64,

    /// Usable tank energy spread over the peak duration, kW
    pub tank_equivalent_power_kw: f64,

    /// Power the heat source must deliver, kW
    pub required_source_power_kw: f64,
}

/// Calculate ordered power from occupancy and an optional buffer tank.
///
/// # Returns
///
/// * `Ok(OccupancyPowerResult)` - Flows, powers and tank contribution
/// * `Err(CalcError)` - If inputs are invalid or hot ≤ cold
pub fn calculate(input: &OccupancyPowerInput) -> CalcResult<OccupancyPowerResult> {
    input.validate()?;

    let delta_t = input.hot_temp_c - input.cold_temp_c;
    let occupants = input.occupants();

    let daily_demand_l = occupants * input.per_person_daily_use_l;
    let avg_hourly_l = daily_demand_l / input.operating_hours_per_day;
    let peak_hourly_l = input.non_uniformity_nh * avg_hourly_l;

    let average_hourly_flow_m3h = CubicMeters::from(Liters(avg_hourly_l)).0;
    let peak_hourly_flow_m3h = CubicMeters::from(Liters(peak_hourly_l)).0;

    let c = WATER_SPECIFIC_HEAT_SIZING_KJ_PER_KG_K;
    let average_power_kw = power_from_flow_kw(average_hourly_flow_m3h, c, delta_t);
    let peak_power_kw = power_from_flow_kw(peak_hourly_flow_m3h, c, delta_t);

    let (stored_energy_kwh, usable_energy_kwh, tank_power_kw) = match &input.tank {
        Some(tank) => {
            let volume_m3 = CubicMeters::from(Liters(tank.volume_l)).0;
            let stored = tank_stored_energy_kwh(volume_m3, delta_t);
            let usable = stored * tank.usable_fraction;
            (stored, usable, usable / tank.peak_duration_h)
        }
        None => (0.0, 0.0, 0.0),
    };

    // Tank may shave the peak but never below mean demand.
    let required_source_power_kw = average_power_kw.max(peak_power_kw - tank_power_kw);

    debug!(
        label = %input.label,
        occupants,
        average_power_kw,
        peak_power_kw,
        tank_power_kw,
        required_source_power_kw,
        "ordered power (occupancy)"
    );

    Ok(OccupancyPowerResult {
        occupants,
        average_daily_demand_m3: CubicMeters::from(Liters(daily_demand_l)).0,
        average_hourly_flow_m3h,
        peak_hourly_flow_m3h,
        average_power_kw,
        peak_power_without_tank_kw: peak_power_kw,
        stored_energy_kwh,
        usable_energy_kwh,
        tank_equivalent_power_kw: tank_power_kw,
        required_source_power_kw,
    })
}

// ============================================================================
// Building-level shortcut
// ============================================================================

/// Final rounding applied to the recommended ordered power.
///
/// Suppliers sell capacity in steps; the default convention rounds **up** to
/// the next 5 kW.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode")]
pub enum PowerRounding {
    /// Report the raw value
    None,
    /// Ceiling to the next multiple of `step_kw`
    CeilToStep { step_kw: f64 },
}

impl Default for PowerRounding {
    fn default() -> Self {
        PowerRounding::CeilToStep { step_kw: 5.0 }
    }
}

impl PowerRounding {
    /// A ceiling step must be a positive number of kW.
    pub fn validate(&self) -> CalcResult<()> {
        if let PowerRounding::CeilToStep { step_kw } = *self {
            require_positive("power_rounding.step_kw", step_kw)?;
        }
        Ok(())
    }

    /// Apply the rounding rule to a power in kW.
    ///
    /// ```rust
    /// use cwu_core::calculations::ordered_power::PowerRounding;
    ///
    /// let r = PowerRounding::default();
    /// assert_eq!(r.apply(151.2), 155.0);
    /// assert_eq!(r.apply(150.0), 150.0);
    /// assert_eq!(PowerRounding::None.apply(151.2), 151.2);
    /// ```
    pub fn apply(&self, power_kw: f64) -> f64 {
        match *self {
            PowerRounding::None => power_kw,
            PowerRounding::CeilToStep { step_kw } if step_kw > 0.0 => {
                (power_kw / step_kw).ceil() * step_kw
            }
            PowerRounding::CeilToStep { .. } => power_kw,
        }
    }
}

/// Input parameters for the building-level ordered-power shortcut.
///
/// ## JSON Example
///
/// ```json
/// {
///   "flats": 50,
///   "persons_per_flat": 2.7,
///   "peak_use_per_person_l_h": 30.0,
///   "hot_temp_c": 55.0,
///   "cold_temp_c": 8.0,
///   "circulation_loss_pct": 20.0,
///   "safety_margin_pct": 15.0
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildingPowerInput {
    /// Number of flats
    pub flats: u32,

    /// Average residents per flat
    pub persons_per_flat: f64,

    /// Peak hot-water use per person, L/h
    pub peak_use_per_person_l_h: f64,

    /// Hot water set point, °C
    pub hot_temp_c: f64,

    /// Cold supply temperature, °C
    pub cold_temp_c: f64,

    /// Circulation loss added on top of the draw power, %
    pub circulation_loss_pct: f64,

    /// Safety margin applied before rounding, %
    pub safety_margin_pct: f64,
}

impl BuildingPowerInput {
    /// Validate input parameters.
    pub fn validate(&self) -> CalcResult<()> {
        if self.flats == 0 {
            return Err(CalcError::invalid_input(
                "flats",
                self.flats.to_string(),
                "Number of flats must be positive",
            ));
        }
        require_positive("persons_per_flat", self.persons_per_flat)?;
        require_positive("peak_use_per_person_l_h", self.peak_use_per_person_l_h)?;
        require_positive_delta_t(self.cold_temp_c, self.hot_temp_c)?;
        require_non_negative("circulation_loss_pct", self.circulation_loss_pct)?;
        require_non_negative("safety_margin_pct", self.safety_margin_pct)?;
        Ok(())
    }
}

/// Results from the building-level shortcut.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildingPowerResult {
    /// Peak instantaneous flow, m³/h
    pub instantaneous_flow_m3h: f64,

    /// Power to heat the peak flow, no losses, kW
    pub power_no_loss_kw: f64,

    /// Power lost in circulation, kW
    pub circulation_power_kw: f64,

    /// Draw power plus circulation loss, kW
    pub power_with_circulation_loss_kw: f64,

    /// Value with safety margin, after the rounding step, kW
    pub recommended_ordered_power_kw: f64,
}

/// Building-level ordered power with circulation add-on and rounding.
///
/// # Example
///
/// ```rust
/// use cwu_core::calculations::ordered_power::{calculate_building, BuildingPowerInput, PowerRounding};
///
/// let input = BuildingPowerInput {
///     flats: 50,
///     persons_per_flat: 2.7,
///     peak_use_per_person_l_h: 30.0,
///     hot_temp_c: 55.0,
///     cold_temp_c: 8.0,
///     circulation_loss_pct: 20.0,
///     safety_margin_pct: 15.0,
/// };
/// let result = calculate_building(&input, &PowerRounding::default()).unwrap();
/// assert_eq!(result.recommended_ordered_power_kw, 305.0);
/// ```
pub fn calculate_building(
    input: &BuildingPowerInput,
    rounding: &PowerRounding,
) -> CalcResult<BuildingPowerResult> {
    input.validate()?;

    let persons = input.flats as f64 * input.persons_per_flat;
    let flow_m3h = CubicMeters::from(Liters(persons * input.peak_use_per_person_l_h)).0;
    let delta_t = input.hot_temp_c - input.cold_temp_c;

    let power_no_loss_kw = WATER_HEAT_SHORTCUT_KWH_PER_M3_K * flow_m3h * delta_t;
    let circulation_power_kw = power_no_loss_kw * input.circulation_loss_pct / 100.0;
    let power_with_circulation_loss_kw = power_no_loss_kw + circulation_power_kw;
    let with_margin = power_with_circulation_loss_kw * (1.0 + input.safety_margin_pct / 100.0);
    let recommended_ordered_power_kw = rounding.apply(with_margin);

    debug!(
        flow_m3h,
        power_no_loss_kw,
        with_margin,
        recommended_ordered_power_kw,
        "ordered power (building)"
    );

    Ok(BuildingPowerResult {
        instantaneous_flow_m3h: flow_m3h,
        power_no_loss_kw,
        circulation_power_kw,
        power_with_circulation_loss_kw,
        recommended_ordered_power_kw,
    })
}

// ============================================================================
// Auditor form (peak draw × simultaneity)
// ============================================================================

/// Usage intensity profile of the building's residents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SimultaneityProfile {
    Low,
    #[default]
    Med,
    High,
}

impl SimultaneityProfile {
    /// Multiplier on the 1/√n base simultaneity
    pub fn multiplier(self) -> f64 {
        match self {
            SimultaneityProfile::Low => 0.6,
            SimultaneityProfile::Med => 0.8,
            SimultaneityProfile::High => 1.0,
        }
    }

    /// Wire name
    pub fn as_str(self) -> &'static str {
        match self {
            SimultaneityProfile::Low => "low",
            SimultaneityProfile::Med => "med",
            SimultaneityProfile::High => "high",
        }
    }
}

/// Input for the auditor's peak-draw sizing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeakDrawInput {
    /// Number of flats
    pub flats: u32,

    /// Number of risers (reported, not used in the formula)
    pub risers: u32,

    /// Cold supply temperature, °C
    pub cold_temp_c: f64,

    /// Hot water set point, °C
    pub hot_temp_c: f64,

    /// Peak draw for the whole building before simultaneity, L/min
    pub draw_peak_lpm: f64,

    /// Usage profile
    pub simult_profile: SimultaneityProfile,

    /// Buffer volume, liters (0 = none)
    pub buffer_l: f64,

    /// Usable temperature swing of the buffer, K
    pub buffer_delta_c: f64,

    /// Peak duration the buffer has to cover, seconds
    pub peak_duration_s: f64,
}

impl PeakDrawInput {
    /// Validate input parameters.
    pub fn validate(&self) -> CalcResult<()> {
        if self.flats == 0 {
            return Err(CalcError::invalid_input("flats", "0", "Number of flats must be positive"));
        }
        if self.risers == 0 {
            return Err(CalcError::invalid_input("risers", "0", "Number of risers must be positive"));
        }
        require_positive_delta_t(self.cold_temp_c, self.hot_temp_c)?;
        require_positive("draw_peak_lpm", self.draw_peak_lpm)?;
        require_non_negative("buffer_l", self.buffer_l)?;
        require_non_negative("buffer_delta_c", self.buffer_delta_c)?;
        require_positive("peak_duration_s", self.peak_duration_s)?;
        Ok(())
    }
}

/// Physical assumptions reported with the auditor power.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PowerAssumptions {
    pub density_kg_m3: f64,
    pub specific_heat_kj_kg_k: f64,
    pub buffer_density_kg_l: f64,
}

impl Default for PowerAssumptions {
    fn default() -> Self {
        PowerAssumptions {
            density_kg_m3: 1000.0,
            specific_heat_kj_kg_k: WATER_SPECIFIC_HEAT_KJ_PER_KG_K,
            buffer_density_kg_l: WATER_DENSITY_KG_PER_L,
        }
    }
}

/// Results of the auditor's peak-draw sizing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeakDrawResult {
    /// Usage profile the simultaneity was taken from
    pub simult_profile: SimultaneityProfile,

    /// Simultaneity factor applied to the peak draw (3 decimals)
    pub simultaneity: f64,

    /// Hot minus cold temperature, K
    pub delta_t_k: f64,

    /// Power for the simultaneous peak draw, kW
    pub power_kw: f64,

    /// Energy in the buffer, kWh
    pub buffer_energy_kwh: f64,

    /// Buffer energy released over the peak duration, kW
    pub buffer_power_kw: f64,

    /// Power left for the source after the buffer, kW (≥ 0)
    pub net_power_kw: f64,

    pub assumptions: PowerAssumptions,
}

/// Auditor's ordered-power estimate from peak draw and simultaneity.
pub fn calculate_peak_draw(input: &PeakDrawInput) -> CalcResult<PeakDrawResult> {
    input.validate()?;

    let c = WATER_SPECIFIC_HEAT_KJ_PER_KG_K;
    let delta_t = input.hot_temp_c - input.cold_temp_c;
    let simultaneity = simultaneity_factor(input.flats, input.simult_profile.multiplier());

    let mass_flow_kg_s = input.draw_peak_lpm / 60.0 * simultaneity * WATER_DENSITY_KG_PER_L;
    let power_kw = mass_flow_kg_s * c * delta_t;

    let buffer_energy_kj = input.buffer_l * WATER_DENSITY_KG_PER_L * c * input.buffer_delta_c;
    let buffer_energy_kwh = buffer_energy_kj / SECONDS_PER_HOUR;
    let buffer_power_kw = buffer_energy_kj / input.peak_duration_s;
    let net_power_kw = (power_kw - buffer_power_kw).max(0.0);

    debug!(
        flats = input.flats,
        profile = input.simult_profile.as_str(),
        simultaneity,
        power_kw,
        buffer_power_kw,
        net_power_kw,
        "ordered power (peak draw)"
    );

    Ok(PeakDrawResult {
        simult_profile: input.simult_profile,
        simultaneity: crate::units::round_to(simultaneity, 3),
        delta_t_k: delta_t,
        power_kw,
        buffer_energy_kwh,
        buffer_power_kw,
        net_power_kw,
        assumptions: PowerAssumptions::default(),
    })
}

/// Measured-peak power: the full peak draw with no simultaneity, plus margin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeakDemandPower {
    /// Power of the unreduced peak draw, kW
    pub peak_kw: f64,

    /// Peak plus margin, kW
    pub ordered_kw: f64,

    /// Margin applied, %
    pub margin_pct: f64,
}

/// Ordered power from a measured peak draw plus a margin.
pub fn peak_demand_power(input: &PeakDrawInput, margin_pct: f64) -> CalcResult<PeakDemandPower> {
    input.validate()?;
    require_non_negative("peak_margin_pct", margin_pct)?;

    let delta_t = input.hot_temp_c - input.cold_temp_c;
    let mass_flow_kg_s = input.draw_peak_lpm / 60.0 * WATER_DENSITY_KG_PER_L;
    let peak_kw = mass_flow_kg_s * WATER_SPECIFIC_HEAT_KJ_PER_KG_K * delta_t;

    Ok(PeakDemandPower {
        peak_kw,
        ordered_kw: peak_kw * (1.0 + margin_pct / 100.0),
        margin_pct,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn no_tank() -> OccupancyPowerInput {
        OccupancyPowerInput {
            tank: None,
            ..OccupancyPowerInput::default()
        }
    }

    #[test]
    fn test_occupancy_flows() {
        let result = calculate(&OccupancyPowerInput::default()).unwrap();
        // 88 × 1.5 = 132 persons, × 110 L = 14 520 L/day
        assert_relative_eq!(result.occupants, 132.0);
        assert_relative_eq!(result.average_daily_demand_m3, 14.52, epsilon = 1e-9);
        // 14 520 / 18 = 806.67 L/h, × 2.5 = 2016.67 L/h
        assert_relative_eq!(result.average_hourly_flow_m3h, 0.806_666_666, epsilon = 1e-6);
        assert_relative_eq!(result.peak_hourly_flow_m3h, 2.016_666_666, epsilon = 1e-6);
    }

    #[test]
    fn test_occupancy_powers_with_tank() {
        let result = calculate(&OccupancyPowerInput::default()).unwrap();
        // ṁ_peak = 2.016667 × 1000 / 3600 = 0.560185 kg/s; × 4.19 × 45 = 105.62 kW
        assert_relative_eq!(result.peak_power_without_tank_kw, 105.622_9, epsilon = 1e-3);
        assert_relative_eq!(result.average_power_kw, 42.249_2, epsilon = 1e-3);
        // 1.163 × 1 m³ × 45 K = 52.335 kWh; × 0.8 / 0.5 h = 83.736 kW
        assert_relative_eq!(result.stored_energy_kwh, 52.335, epsilon = 1e-9);
        assert_relative_eq!(result.tank_equivalent_power_kw, 83.736, epsilon = 1e-9);
        // 105.62 − 83.74 = 21.89 < average → floored at 42.25
        assert_relative_eq!(result.required_source_power_kw, result.average_power_kw);
    }

    #[test]
    fn test_no_tank_requires_peak_power() {
        let result = calculate(&no_tank()).unwrap();
        assert_eq!(result.stored_energy_kwh, 0.0);
        assert_relative_eq!(result.required_source_power_kw, result.peak_power_without_tank_kw);
    }

    #[test]
    fn test_zero_usable_fraction_collapses_to_peak() {
        let mut input = OccupancyPowerInput::default();
        input.tank = Some(BufferTank {
            volume_l: 2000.0,
            usable_fraction: 0.0,
            peak_duration_h: 1.0,
        });
        let result = calculate(&input).unwrap();
        assert_eq!(result.tank_equivalent_power_kw, 0.0);
        assert_relative_eq!(result.required_source_power_kw, result.peak_power_without_tank_kw);
    }

    #[test]
    fn test_required_power_never_below_average() {
        for volume_l in [0.0, 100.0, 500.0, 1_000.0, 10_000.0, 1_000_000.0] {
            let mut input = OccupancyPowerInput::default();
            input.tank = Some(BufferTank {
                volume_l,
                usable_fraction: 1.0,
                peak_duration_h: 0.25,
            });
            let result = calculate(&input).unwrap();
            assert!(result.required_source_power_kw >= result.average_power_kw);
            assert!(result.required_source_power_kw <= result.peak_power_without_tank_kw);
        }
    }

    #[test]
    fn test_occupancy_rejects_bad_input() {
        let mut input = no_tank();
        input.hot_temp_c = 10.0;
        let err = calculate(&input).unwrap_err();
        assert_eq!(err.error_code(), "PHYSICAL_CONSTRAINT");

        let mut input = no_tank();
        input.non_uniformity_nh = 0.5;
        assert!(calculate(&input).is_err());

        let mut input = OccupancyPowerInput::default();
        input.tank = Some(BufferTank {
            volume_l: 500.0,
            usable_fraction: 0.8,
            peak_duration_h: 0.0,
        });
        assert_eq!(calculate(&input).unwrap_err().error_code(), "INVALID_INPUT");

        let mut input = no_tank();
        input.persons_per_flat = f64::NAN;
        assert!(calculate(&input).is_err());
    }

    fn building() -> BuildingPowerInput {
        BuildingPowerInput {
            flats: 50,
            persons_per_flat: 2.7,
            peak_use_per_person_l_h: 30.0,
            hot_temp_c: 55.0,
            cold_temp_c: 8.0,
            circulation_loss_pct: 20.0,
            safety_margin_pct: 15.0,
        }
    }

    #[test]
    fn test_building_power_steps() {
        let result = calculate_building(&building(), &PowerRounding::default()).unwrap();
        // 135 persons × 30 L/h = 4.05 m³/h
        assert_relative_eq!(result.instantaneous_flow_m3h, 4.05, epsilon = 1e-12);
        // 1.16 × 4.05 × 47 = 220.806 kW
        assert_relative_eq!(result.power_no_loss_kw, 220.806, epsilon = 1e-9);
        assert_relative_eq!(result.circulation_power_kw, 44.1612, epsilon = 1e-9);
        assert_relative_eq!(result.power_with_circulation_loss_kw, 264.9672, epsilon = 1e-9);
        // × 1.15 = 304.71 → ceiling to 5 kW grid = 305
        assert_eq!(result.recommended_ordered_power_kw, 305.0);
    }

    #[test]
    fn test_building_power_rounding_is_ceiling_not_nearest() {
        let mut input = building();
        input.safety_margin_pct = 0.0;
        input.circulation_loss_pct = 0.0;
        // 220.806 would round to 220 at nearest; ceiling gives 225
        let result = calculate_building(&input, &PowerRounding::default()).unwrap();
        assert_eq!(result.recommended_ordered_power_kw, 225.0);

        let raw = calculate_building(&input, &PowerRounding::None).unwrap();
        assert_relative_eq!(raw.recommended_ordered_power_kw, 220.806, epsilon = 1e-9);

        let ten = calculate_building(&input, &PowerRounding::CeilToStep { step_kw: 10.0 }).unwrap();
        assert_eq!(ten.recommended_ordered_power_kw, 230.0);
    }

    fn peak_input() -> PeakDrawInput {
        PeakDrawInput {
            flats: 64,
            risers: 4,
            cold_temp_c: 10.0,
            hot_temp_c: 55.0,
            draw_peak_lpm: 240.0,
            simult_profile: SimultaneityProfile::Med,
            buffer_l: 0.0,
            buffer_delta_c: 0.0,
            peak_duration_s: 300.0,
        }
    }

    #[test]
    fn test_peak_draw_power() {
        let result = calculate_peak_draw(&peak_input()).unwrap();
        // φ = 0.8 / √64 = 0.1; 240 L/min = 4 L/s × 0.1 = 0.4 kg/s; × 4.186 × 45
        assert_eq!(result.simult_profile, SimultaneityProfile::Med);
        assert_relative_eq!(result.simultaneity, 0.1);
        assert_relative_eq!(result.power_kw, 75.348, epsilon = 1e-9);
        assert_relative_eq!(result.net_power_kw, result.power_kw);
    }

    #[test]
    fn test_peak_draw_buffer_netting() {
        let mut input = peak_input();
        input.buffer_l = 500.0;
        input.buffer_delta_c = 10.0;
        let result = calculate_peak_draw(&input).unwrap();
        // 500 × 4.186 × 10 = 20 930 kJ; / 300 s = 69.77 kW
        assert_relative_eq!(result.buffer_power_kw, 69.766_666, epsilon = 1e-5);
        assert_relative_eq!(result.buffer_energy_kwh, 20_930.0 / 3600.0, epsilon = 1e-9);
        assert_relative_eq!(result.net_power_kw, 75.348 - 69.766_666, epsilon = 1e-5);

        input.buffer_l = 5000.0;
        let big = calculate_peak_draw(&input).unwrap();
        assert_eq!(big.net_power_kw, 0.0);
    }

    #[test]
    fn test_peak_demand_adds_margin() {
        let result = peak_demand_power(&peak_input(), 10.0).unwrap();
        // 4 kg/s × 4.186 × 45 = 753.48 kW
        assert_relative_eq!(result.peak_kw, 753.48, epsilon = 1e-9);
        assert_relative_eq!(result.ordered_kw, 828.828, epsilon = 1e-9);
    }

    #[test]
    fn test_profile_serialization() {
        let json = serde_json::to_string(&SimultaneityProfile::High).unwrap();
        assert_eq!(json, "\"high\"");
        let p: SimultaneityProfile = serde_json::from_str("\"low\"").unwrap();
        assert_eq!(p, SimultaneityProfile::Low);

        // the report label matches the wire name
        for profile in [SimultaneityProfile::Low, SimultaneityProfile::Med, SimultaneityProfile::High] {
            let json = serde_json::to_string(&profile).unwrap();
            assert_eq!(json, format!("\"{}\"", profile.as_str()));
        }
    }
}
