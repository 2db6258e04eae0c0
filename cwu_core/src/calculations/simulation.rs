//! # Tank Time Simulation
//!
//! Ordered power from a step-by-step simulation of a storage tank against a
//! daily draw profile, instead of a single peak figure.
//!
//! Two tank models are simulated with the same draw and the same constant
//! loss power:
//!
//! - **mixed** - the whole tank at one temperature; conservative
//! - **layered** - a hot upper zone and a cold lower zone with plug-flow
//!   refill from below and slow relaxation between the zones
//!
//! For each model the smallest heater power that keeps the tank (the hot
//! zone, for the layered model) above the minimum temperature is found by
//! doubling and then bisection. The difference between the two powers drives
//! an A/B/C recommendation and the cost of ordering the conservative one.
//!
//! ## Energy bookkeeping
//!
//! Energy is counted relative to the cold supply: `E = m·cp·(T − T_cold)`
//! with water at 1 kg/L and cp = 4180 J/(kg·K). Draws are water delivered at
//! the set point, so a draw of `v` liters removes `v·cp·(T_set − T_cold)`.
//!
//! ## Example
//!
//! ```rust
//! use cwu_core::calculations::simulation::{
//!     default_demand_profile, simulate_tank, LossInput, TankParams, TankSimulationInput,
//! };
//!
//! let input = TankSimulationInput {
//!     tank: TankParams {
//!         volume_l: 1000.0,
//!         init_temp_c: 55.0,
//!         set_temp_c: 55.0,
//!         cold_temp_c: 10.0,
//!         min_temp_c: 45.0,
//!         dt_s: 60,
//!     },
//!     demand_lpm: default_demand_profile(60).unwrap(),
//!     loss: LossInput::Power { loss_kw: 2.0 },
//!     ..TankSimulationInput::default()
//! };
//! let result = simulate_tank(&input).unwrap();
//! assert!(result.layered.ordered_power_kw <= result.mixed.ordered_power_kw);
//! ```

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::equations::losses::ua_loss_kw;
use crate::errors::{
    require_finite, require_non_negative, require_positive, require_positive_delta_t, CalcError,
    CalcResult,
};
use crate::units::{Joules, KilowattHours, Kilowatts, Watts, MONTHS_PER_YEAR, SECONDS_PER_HOUR};

/// Specific heat of water in the simulation, J/(kg·K)
pub const SIM_SPECIFIC_HEAT_J_PER_KG_K: f64 = 4180.0;

/// Longest profile accepted, in steps (one week at one-minute steps)
pub const MAX_STEPS: usize = 7 * 24 * 60;

// ============================================================================
// Inputs
// ============================================================================

fn default_dt_s() -> u32 {
    60
}

/// Tank and temperature set-up shared by both models.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TankParams {
    /// Tank volume, liters
    pub volume_l: f64,
    /// Temperature at the start of the run, °C
    pub init_temp_c: f64,
    /// Heater set point and delivery temperature, °C
    pub set_temp_c: f64,
    /// Cold supply temperature, °C
    pub cold_temp_c: f64,
    /// Comfort limit; time below it counts as violation, °C
    pub min_temp_c: f64,
    /// Simulation step, seconds
    #[serde(default = "default_dt_s")]
    pub dt_s: u32,
}

impl Default for TankParams {
    fn default() -> Self {
        TankParams {
            volume_l: 1000.0,
            init_temp_c: 55.0,
            set_temp_c: 55.0,
            cold_temp_c: 10.0,
            min_temp_c: 45.0,
            dt_s: default_dt_s(),
        }
    }
}

impl TankParams {
    /// Validate input parameters.
    pub fn validate(&self) -> CalcResult<()> {
        require_positive("volume_l", self.volume_l)?;
        require_finite("init_temp_c", self.init_temp_c)?;
        require_finite("min_temp_c", self.min_temp_c)?;
        require_positive_delta_t(self.cold_temp_c, self.set_temp_c)?;
        if self.dt_s == 0 {
            return Err(CalcError::invalid_input("dt_s", "0", "Time step must be positive"));
        }
        Ok(())
    }

    fn dt(&self) -> f64 {
        f64::from(self.dt_s)
    }
}

/// How the constant loss power is shared between the zones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LossSplit {
    #[default]
    ByVolume,
    AllHot,
}

/// Two-zone tank shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayeredParams {
    /// Share of the volume in the hot zone, 0.05–0.95
    pub hot_fraction: f64,
    /// Relaxation time between the zones, seconds (0 = no mixing)
    pub mixing_tau_s: f64,
    pub losses_split: LossSplit,
}

impl Default for LayeredParams {
    fn default() -> Self {
        LayeredParams {
            hot_fraction: 0.3,
            mixing_tau_s: 3600.0,
            losses_split: LossSplit::ByVolume,
        }
    }
}

impl LayeredParams {
    /// Validate input parameters.
    pub fn validate(&self) -> CalcResult<()> {
        if !(0.05..=0.95).contains(&self.hot_fraction) {
            return Err(CalcError::invalid_input(
                "hot_fraction",
                self.hot_fraction.to_string(),
                "Hot zone share must be between 0.05 and 0.95",
            ));
        }
        require_non_negative("mixing_tau_s", self.mixing_tau_s)?;
        Ok(())
    }
}

/// Constant standing loss of the tank and its loop. It never depends on the
/// heater power being searched for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "basis", rename_all = "snake_case")]
pub enum LossInput {
    /// Loss power given directly, kW
    Power { loss_kw: f64 },
    /// Share of the average hot-water power over the profile, %
    PercentOfAverage { pct: f64 },
    /// UA × ΔT
    Ua { ua_w_per_k: f64, delta_t_k: f64 },
}

impl Default for LossInput {
    fn default() -> Self {
        LossInput::Power { loss_kw: 0.0 }
    }
}

impl LossInput {
    /// Validate input parameters.
    pub fn validate(&self) -> CalcResult<()> {
        match *self {
            LossInput::Power { loss_kw } => require_non_negative("loss_kw", loss_kw).map(|_| ()),
            LossInput::PercentOfAverage { pct } => require_non_negative("pct", pct).map(|_| ()),
            LossInput::Ua { ua_w_per_k, delta_t_k } => {
                require_non_negative("ua_w_per_k", ua_w_per_k)?;
                require_non_negative("delta_t_k", delta_t_k)?;
                Ok(())
            }
        }
    }

    /// Loss power in kW for a profile with the given average power.
    pub fn loss_kw(&self, average_power_kw: f64) -> f64 {
        match *self {
            LossInput::Power { loss_kw } => loss_kw,
            LossInput::PercentOfAverage { pct } => pct / 100.0 * average_power_kw.max(0.0),
            LossInput::Ua { ua_w_per_k, delta_t_k } => ua_loss_kw(ua_w_per_k, delta_t_k),
        }
    }
}

fn default_horizon_years() -> u32 {
    10
}

/// Power tariff for pricing the gap between the two models.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostParams {
    /// PLN per kW per month
    #[serde(default)]
    pub cost_per_kw_month_pln: Option<f64>,
    /// PLN per kW per year; derived from the monthly rate when absent
    #[serde(default)]
    pub cost_per_kw_year_pln: Option<f64>,
    #[serde(default = "default_horizon_years")]
    pub horizon_years: u32,
}

impl Default for CostParams {
    fn default() -> Self {
        CostParams {
            cost_per_kw_month_pln: None,
            cost_per_kw_year_pln: None,
            horizon_years: default_horizon_years(),
        }
    }
}

impl CostParams {
    /// Validate input parameters.
    pub fn validate(&self) -> CalcResult<()> {
        if let Some(rate) = self.cost_per_kw_month_pln {
            require_non_negative("cost_per_kw_month_pln", rate)?;
        }
        if let Some(rate) = self.cost_per_kw_year_pln {
            require_non_negative("cost_per_kw_year_pln", rate)?;
        }
        if self.horizon_years == 0 {
            return Err(CalcError::invalid_input(
                "horizon_years",
                "0",
                "Analysis horizon must be at least one year",
            ));
        }
        Ok(())
    }

    /// (monthly, yearly) rates with the missing one derived; `None` when
    /// neither is given.
    pub fn rates(&self) -> Option<(f64, f64)> {
        match (self.cost_per_kw_month_pln, self.cost_per_kw_year_pln) {
            (Some(month), Some(year)) => Some((month, year)),
            (Some(month), None) => Some((month, month * MONTHS_PER_YEAR)),
            (None, Some(year)) => Some((year / MONTHS_PER_YEAR, year)),
            (None, None) => None,
        }
    }
}

/// Decision thresholds. These are advisory parameters, not physics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecisionThresholds {
    /// Power gap that counts as significant, kW
    pub delta_abs_kw: f64,
    /// Power gap that counts as significant, % of the layered power
    pub delta_pct: f64,
    /// A step is part of a peak at this share of the maximum draw...
    pub peak_fraction_of_max: f64,
    /// ...and never below this draw, L/min
    pub peak_min_lpm: f64,
    /// Longest peak still called short, minutes
    pub short_peak_max_min: f64,
    /// Share of the drawn water inside peaks that counts as peak-dominated
    pub peak_energy_share: f64,
    /// Tank hours at average draw that make a tank large
    pub tank_hours: f64,
    /// Mixing time constant that counts as good stratification, seconds
    pub stratification_good_tau_s: f64,
}

impl Default for DecisionThresholds {
    fn default() -> Self {
        DecisionThresholds {
            delta_abs_kw: 5.0,
            delta_pct: 10.0,
            peak_fraction_of_max: 0.5,
            peak_min_lpm: 10.0,
            short_peak_max_min: 30.0,
            peak_energy_share: 0.35,
            tank_hours: 1.0,
            stratification_good_tau_s: 1800.0,
        }
    }
}

/// Bounds of the minimum-power search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PowerSearch {
    /// First power tried, kW; doubled until the tank holds
    pub start_kw: f64,
    /// Give up above this power, kW
    pub max_kw: f64,
    /// Bisection stops when the bracket is this narrow, kW
    pub tolerance_kw: f64,
}

impl Default for PowerSearch {
    fn default() -> Self {
        PowerSearch {
            start_kw: 10.0,
            max_kw: 5000.0,
            tolerance_kw: 0.1,
        }
    }
}

impl PowerSearch {
    /// Validate input parameters.
    pub fn validate(&self) -> CalcResult<()> {
        require_positive("start_kw", self.start_kw)?;
        require_positive("max_kw", self.max_kw)?;
        require_positive("tolerance_kw", self.tolerance_kw)?;
        Ok(())
    }
}

/// Everything one simulation run needs.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TankSimulationInput {
    pub tank: TankParams,
    /// Delivered hot water per step, L/min
    pub demand_lpm: Vec<f64>,
    pub loss: LossInput,
    /// Minutes below the comfort limit that are tolerated
    #[serde(default)]
    pub allowed_violation_min: f64,
    /// Heater switching band below the set point, K (0 = switch at set point)
    #[serde(default)]
    pub hysteresis_k: f64,
    #[serde(default)]
    pub layered: LayeredParams,
    #[serde(default)]
    pub thresholds: DecisionThresholds,
    #[serde(default)]
    pub cost: CostParams,
    #[serde(default)]
    pub search: PowerSearch,
}

impl TankSimulationInput {
    /// Validate input parameters.
    pub fn validate(&self) -> CalcResult<()> {
        self.tank.validate()?;
        validate_profile(&self.demand_lpm)?;
        self.loss.validate()?;
        require_non_negative("allowed_violation_min", self.allowed_violation_min)?;
        require_non_negative("hysteresis_k", self.hysteresis_k)?;
        self.layered.validate()?;
        self.cost.validate()?;
        self.search.validate()?;
        Ok(())
    }
}

fn validate_profile(demand_lpm: &[f64]) -> CalcResult<()> {
    if demand_lpm.is_empty() {
        return Err(CalcError::invalid_input(
            "demand_lpm",
            "[]",
            "Demand profile cannot be empty",
        ));
    }
    if demand_lpm.len() > MAX_STEPS {
        return Err(CalcError::invalid_input(
            "demand_lpm",
            demand_lpm.len().to_string(),
            format!("Demand profile is limited to {MAX_STEPS} steps"),
        ));
    }
    for &lpm in demand_lpm {
        require_finite("demand_lpm", lpm)?;
    }
    Ok(())
}

/// Reference daily profile: 60 L/min for 20 minutes from 07:00 and
/// 50 L/min for 20 minutes from 19:00, zero otherwise.
pub fn default_demand_profile(dt_s: u32) -> CalcResult<Vec<f64>> {
    if dt_s == 0 {
        return Err(CalcError::invalid_input("dt_s", "0", "Time step must be positive"));
    }
    let dt = dt_s as usize;
    let steps = 24 * 3600 / dt;
    let mut profile = vec![0.0; steps];
    for (start_min, duration_min, lpm) in [(7 * 60, 20, 60.0), (19 * 60, 20, 50.0)] {
        let start = start_min * 60 / dt;
        let end = ((start_min + duration_min) * 60 / dt).min(steps);
        for step in profile.iter_mut().take(end).skip(start) {
            *step = lpm;
        }
    }
    Ok(profile)
}

// ============================================================================
// Physics
// ============================================================================

/// Energy above the cold supply held by `volume_l` at `temp_c`.
fn energy_j(volume_l: f64, temp_c: f64, cold_temp_c: f64) -> f64 {
    volume_l * SIM_SPECIFIC_HEAT_J_PER_KG_K * (temp_c - cold_temp_c).max(0.0)
}

fn temperature_c(energy_j: f64, volume_l: f64, cold_temp_c: f64) -> f64 {
    if volume_l <= 0.0 {
        return cold_temp_c;
    }
    cold_temp_c + energy_j.max(0.0) / (volume_l * SIM_SPECIFIC_HEAT_J_PER_KG_K)
}

fn kw_over_step_j(power_kw: f64, dt_s: f64) -> f64 {
    Watts::from(Kilowatts(power_kw)).value() * dt_s
}

/// Hot-water energy of a profile and its average power.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProfileEnergy {
    /// Energy delivered over the profile, kWh
    pub energy_kwh: f64,
    /// Energy divided by the profile duration, kW
    pub average_power_kw: f64,
}

/// Energy of the delivered water over the whole profile.
pub fn prepass_energy(demand_lpm: &[f64], tank: &TankParams) -> CalcResult<ProfileEnergy> {
    tank.validate()?;
    validate_profile(demand_lpm)?;

    let dt = tank.dt();
    let total = demand_lpm
        .iter()
        .map(|lpm| Joules(energy_j(lpm.max(0.0) * dt / 60.0, tank.set_temp_c, tank.cold_temp_c)))
        .fold(Joules(0.0), |acc, e| acc + e);
    let energy_kwh = KilowattHours::from(total).value();
    let hours = demand_lpm.len() as f64 * dt / SECONDS_PER_HOUR;

    Ok(ProfileEnergy {
        energy_kwh,
        average_power_kw: energy_kwh / hours,
    })
}

/// Which tank model a run used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TankModel {
    Mixed,
    Layered,
}

/// One simulated day at a fixed heater power.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelRun {
    pub model: TankModel,
    /// Heater power of this run, kW
    pub ordered_power_kw: f64,
    pub loss_kw: f64,
    /// Start of each step, seconds
    pub time_s: Vec<u64>,
    /// Tank temperature (mixed) or hot-zone temperature (layered), °C
    pub primary_temp_c: Vec<f64>,
    /// Cold-zone temperature, layered model only, °C
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary_temp_c: Option<Vec<f64>>,
    /// Heater power per step, kW
    pub heater_kw: Vec<f64>,
    /// Time spent below the comfort limit, minutes
    pub violation_minutes: f64,
    /// Time from the coldest moment back to the comfort limit, seconds
    pub regen_to_min_s: Option<u64>,
    /// Time from the coldest moment back to the set point, seconds
    pub regen_to_set_s: Option<u64>,
    /// End of the step with the lowest temperature, seconds
    pub min_temp_time_s: u64,
    pub min_temp_c: f64,
}

/// On/off heater following the set point, optionally with a switching band.
struct Thermostat {
    on: bool,
    set_temp_c: f64,
    hysteresis_k: f64,
}

impl Thermostat {
    fn new(start_temp_c: f64, set_temp_c: f64, hysteresis_k: f64) -> Self {
        Thermostat {
            on: start_temp_c < set_temp_c,
            set_temp_c,
            hysteresis_k,
        }
    }

    fn update(&mut self, temp_c: f64) -> bool {
        if self.hysteresis_k > 0.0 {
            if self.on && temp_c >= self.set_temp_c {
                self.on = false;
            } else if !self.on && temp_c <= self.set_temp_c - self.hysteresis_k {
                self.on = true;
            }
        } else {
            self.on = temp_c < self.set_temp_c;
        }
        self.on
    }
}

/// Running comfort statistics for one run.
struct Comfort {
    min_temp_c: f64,
    violation_s: u64,
    min_temp_time_s: u64,
    dt_s: u64,
}

impl Comfort {
    fn new(start_temp_c: f64, dt_s: u32) -> Self {
        Comfort {
            min_temp_c: start_temp_c,
            violation_s: 0,
            min_temp_time_s: 0,
            dt_s: u64::from(dt_s),
        }
    }

    fn record(&mut self, step_start_s: u64, end_temp_c: f64, limit_c: f64) {
        if end_temp_c < limit_c {
            self.violation_s += self.dt_s;
        }
        if end_temp_c < self.min_temp_c {
            self.min_temp_c = end_temp_c;
            self.min_temp_time_s = step_start_s + self.dt_s;
        }
    }
}

/// Time after the coldest moment until a recorded temperature reaches
/// `threshold_c`.
fn regen_time_s(time_s: &[u64], temps_c: &[f64], min_temp_time_s: u64, threshold_c: f64, dt_s: u32) -> Option<u64> {
    let last = time_s.len().checked_sub(1)?;
    let start = ((min_temp_time_s / u64::from(dt_s)) as usize).min(last);
    (start..time_s.len())
        .find(|&j| temps_c[j] >= threshold_c)
        .map(|j| time_s[j].saturating_sub(min_temp_time_s))
}

fn check_run_inputs(tank: &TankParams, pmax_kw: f64, loss_kw: f64, hysteresis_k: f64) -> CalcResult<()> {
    tank.validate()?;
    require_non_negative("pmax_kw", pmax_kw)?;
    require_non_negative("loss_kw", loss_kw)?;
    require_non_negative("hysteresis_k", hysteresis_k)?;
    Ok(())
}

/// Simulate a fully mixed tank at a fixed heater power.
pub fn simulate_mixed(
    tank: &TankParams,
    demand_lpm: &[f64],
    pmax_kw: f64,
    loss_kw: f64,
    hysteresis_k: f64,
) -> CalcResult<ModelRun> {
    check_run_inputs(tank, pmax_kw, loss_kw, hysteresis_k)?;

    let dt = tank.dt();
    let cold = tank.cold_temp_c;
    let capacity_j = energy_j(tank.volume_l, tank.set_temp_c, cold);
    let loss_j = kw_over_step_j(loss_kw, dt);
    let heat_j = kw_over_step_j(pmax_kw, dt);

    let mut stored_j = energy_j(tank.volume_l, tank.init_temp_c, cold);
    let start_temp = temperature_c(stored_j, tank.volume_l, cold);
    let mut thermostat = Thermostat::new(start_temp, tank.set_temp_c, hysteresis_k);
    let mut comfort = Comfort::new(start_temp, tank.dt_s);

    let steps = demand_lpm.len();
    let mut time_s = Vec::with_capacity(steps);
    let mut temps_c = Vec::with_capacity(steps);
    let mut heater_kw = Vec::with_capacity(steps);

    for (i, &lpm) in demand_lpm.iter().enumerate() {
        let t_s = i as u64 * u64::from(tank.dt_s);
        time_s.push(t_s);
        temps_c.push(temperature_c(stored_j, tank.volume_l, cold));

        let draw_j = energy_j(lpm.max(0.0) * dt / 60.0, tank.set_temp_c, cold);
        stored_j = (stored_j - draw_j).max(0.0);
        stored_j = (stored_j - loss_j).max(0.0);

        let on = thermostat.update(temperature_c(stored_j, tank.volume_l, cold));
        heater_kw.push(if on { pmax_kw } else { 0.0 });
        if on {
            stored_j = (stored_j + heat_j).min(capacity_j);
        }

        comfort.record(t_s, temperature_c(stored_j, tank.volume_l, cold), tank.min_temp_c);
    }

    Ok(finish_run(
        TankModel::Mixed,
        tank,
        pmax_kw,
        loss_kw,
        time_s,
        temps_c,
        None,
        heater_kw,
        comfort,
    ))
}

/// Simulate a two-zone stratified tank at a fixed heater power.
///
/// Per step: the draw leaves the hot zone and the same volume is refilled
/// from the cold zone (its energy share moves up); losses are taken; the
/// zones relax toward their common temperature; the heater tops up the hot
/// zone. Comfort is judged on the hot zone only.
pub fn simulate_layered(
    tank: &TankParams,
    layered: &LayeredParams,
    demand_lpm: &[f64],
    pmax_kw: f64,
    loss_kw: f64,
    hysteresis_k: f64,
) -> CalcResult<ModelRun> {
    check_run_inputs(tank, pmax_kw, loss_kw, hysteresis_k)?;
    layered.validate()?;

    let dt = tank.dt();
    let cold = tank.cold_temp_c;
    let volume = tank.volume_l;
    let hot_volume = volume * layered.hot_fraction;
    let cold_volume = volume - hot_volume;

    let hot_capacity_j = energy_j(hot_volume, tank.set_temp_c, cold);
    let loss_j = kw_over_step_j(loss_kw, dt);
    let (hot_loss_j, cold_loss_j) = match layered.losses_split {
        LossSplit::ByVolume => (loss_j * hot_volume / volume, loss_j * cold_volume / volume),
        LossSplit::AllHot => (loss_j, 0.0),
    };
    let heat_j = kw_over_step_j(pmax_kw, dt);
    let alpha = if layered.mixing_tau_s > 0.0 {
        (dt / layered.mixing_tau_s).clamp(0.0, 1.0)
    } else {
        0.0
    };

    let mut hot_j = energy_j(hot_volume, tank.init_temp_c, cold);
    let mut cold_j = energy_j(cold_volume, tank.init_temp_c, cold);
    let start_temp = temperature_c(hot_j, hot_volume, cold);
    let mut thermostat = Thermostat::new(start_temp, tank.set_temp_c, hysteresis_k);
    let mut comfort = Comfort::new(start_temp, tank.dt_s);

    let steps = demand_lpm.len();
    let mut time_s = Vec::with_capacity(steps);
    let mut hot_temps = Vec::with_capacity(steps);
    let mut cold_temps = Vec::with_capacity(steps);
    let mut heater_kw = Vec::with_capacity(steps);

    for (i, &lpm) in demand_lpm.iter().enumerate() {
        let t_s = i as u64 * u64::from(tank.dt_s);
        time_s.push(t_s);
        hot_temps.push(temperature_c(hot_j, hot_volume, cold));
        cold_temps.push(temperature_c(cold_j, cold_volume, cold));

        let drawn_l = lpm.max(0.0) * dt / 60.0;
        hot_j = (hot_j - energy_j(drawn_l, tank.set_temp_c, cold)).max(0.0);

        // plug-flow refill from below
        if drawn_l > 0.0 && cold_volume > 0.0 {
            let moved_j = cold_j * (drawn_l / cold_volume).min(1.0);
            cold_j = (cold_j - moved_j).max(0.0);
            hot_j = (hot_j + moved_j).min(hot_capacity_j);
        }

        hot_j = (hot_j - hot_loss_j).max(0.0);
        cold_j = (cold_j - cold_loss_j).max(0.0);

        if alpha > 0.0 {
            let th = temperature_c(hot_j, hot_volume, cold);
            let tc = temperature_c(cold_j, cold_volume, cold);
            let t_eq = (th * hot_volume + tc * cold_volume) / volume;
            hot_j = energy_j(hot_volume, th + alpha * (t_eq - th), cold).min(hot_capacity_j);
            cold_j = energy_j(cold_volume, tc + alpha * (t_eq - tc), cold);
        }

        let on = thermostat.update(temperature_c(hot_j, hot_volume, cold));
        heater_kw.push(if on { pmax_kw } else { 0.0 });
        if on {
            hot_j = (hot_j + heat_j).min(hot_capacity_j);
        }

        comfort.record(t_s, temperature_c(hot_j, hot_volume, cold), tank.min_temp_c);
    }

    Ok(finish_run(
        TankModel::Layered,
        tank,
        pmax_kw,
        loss_kw,
        time_s,
        hot_temps,
        Some(cold_temps),
        heater_kw,
        comfort,
    ))
}

#[allow(clippy::too_many_arguments)]
fn finish_run(
    model: TankModel,
    tank: &TankParams,
    pmax_kw: f64,
    loss_kw: f64,
    time_s: Vec<u64>,
    primary_temp_c: Vec<f64>,
    secondary_temp_c: Option<Vec<f64>>,
    heater_kw: Vec<f64>,
    comfort: Comfort,
) -> ModelRun {
    let regen_to_min_s = regen_time_s(
        &time_s,
        &primary_temp_c,
        comfort.min_temp_time_s,
        tank.min_temp_c,
        tank.dt_s,
    );
    let regen_to_set_s = regen_time_s(
        &time_s,
        &primary_temp_c,
        comfort.min_temp_time_s,
        tank.set_temp_c,
        tank.dt_s,
    );
    ModelRun {
        model,
        ordered_power_kw: pmax_kw,
        loss_kw,
        time_s,
        primary_temp_c,
        secondary_temp_c,
        heater_kw,
        violation_minutes: comfort.violation_s as f64 / 60.0,
        regen_to_min_s,
        regen_to_set_s,
        min_temp_time_s: comfort.min_temp_time_s,
        min_temp_c: comfort.min_temp_c,
    }
}

/// Smallest heater power whose run stays within `allowed_violation_min`.
///
/// Doubles from `search.start_kw` until a run holds (or `search.max_kw` is
/// passed), then bisects down from zero to within `search.tolerance_kw`.
/// The returned run is the one at the upper end of the final bracket.
pub fn find_min_power<F>(mut simulate: F, search: &PowerSearch, allowed_violation_min: f64) -> CalcResult<ModelRun>
where
    F: FnMut(f64) -> CalcResult<ModelRun>,
{
    search.validate()?;

    let mut holds = |p: f64| -> CalcResult<(bool, ModelRun)> {
        let run = simulate(p)?;
        Ok((run.violation_minutes <= allowed_violation_min, run))
    };

    let mut p_hi = search.start_kw;
    let (mut hi_ok, mut best) = holds(p_hi)?;
    while !hi_ok && p_hi < search.max_kw {
        p_hi *= 2.0;
        (hi_ok, best) = holds(p_hi)?;
    }
    if !hi_ok {
        warn!(max_kw = search.max_kw, "no heater power keeps the tank above the comfort limit");
        return Err(CalcError::calculation_failed(
            "TankSimulation",
            format!(
                "No heater power up to {} kW keeps the tank above the comfort limit",
                search.max_kw
            ),
        ));
    }

    let mut p_lo = 0.0;
    while p_hi - p_lo > search.tolerance_kw {
        let p_mid = 0.5 * (p_lo + p_hi);
        let (mid_ok, run) = holds(p_mid)?;
        if mid_ok {
            p_hi = p_mid;
            best = run;
        } else {
            p_lo = p_mid;
        }
    }
    Ok(best)
}

// ============================================================================
// Decision
// ============================================================================

/// Shape of the draw profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileMetrics {
    pub demand_max_lpm: f64,
    pub demand_avg_lpm: f64,
    /// Draw at or above which a step belongs to a peak, L/min
    pub peak_threshold_lpm: f64,
    pub peaks_count: usize,
    /// Longest run of peak steps, minutes
    pub peak_max_duration_min: f64,
    /// Share of the drawn water delivered inside peaks, 0–1
    pub peak_energy_share: f64,
}

/// Count peaks as runs of consecutive steps at or above the peak threshold.
pub fn profile_metrics(demand_lpm: &[f64], dt_s: u32, thresholds: &DecisionThresholds) -> ProfileMetrics {
    let demand_max_lpm = demand_lpm.iter().copied().fold(0.0, f64::max);
    let demand_avg_lpm = if demand_lpm.is_empty() {
        0.0
    } else {
        demand_lpm.iter().sum::<f64>() / demand_lpm.len() as f64
    };
    let peak_threshold_lpm = thresholds
        .peak_min_lpm
        .max(thresholds.peak_fraction_of_max * demand_max_lpm);

    let mut segments = Vec::new();
    let mut current = 0usize;
    let mut peak_sum = 0.0;
    let mut total_sum = 0.0;
    for &lpm in demand_lpm {
        let v = lpm.max(0.0);
        total_sum += v;
        if v >= peak_threshold_lpm {
            peak_sum += v;
            current += 1;
        } else if current > 0 {
            segments.push(current);
            current = 0;
        }
    }
    if current > 0 {
        segments.push(current);
    }

    let longest = segments.iter().copied().max().unwrap_or(0);
    ProfileMetrics {
        demand_max_lpm,
        demand_avg_lpm,
        peak_threshold_lpm,
        peaks_count: segments.len(),
        peak_max_duration_min: longest as f64 * f64::from(dt_s) / 60.0,
        peak_energy_share: if total_sum > 0.0 { peak_sum / total_sum } else { 0.0 },
    }
}

/// How much the layered model matters for this installation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecommendationLevel {
    /// The mixed model is good enough
    A,
    /// The layered model is advised
    B,
    /// The layered model is essential
    C,
}

impl RecommendationLevel {
    pub fn title(self) -> &'static str {
        match self {
            RecommendationLevel::A => "Mixed tank model is sufficient",
            RecommendationLevel::B => "Layered tank model recommended",
            RecommendationLevel::C => "Layered tank model essential",
        }
    }
}

/// The A/B/C call and the facts behind it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub level: RecommendationLevel,
    /// Gap passes the absolute or the percentage threshold
    pub significant: bool,
    /// Gap passes twice either threshold
    pub strong: bool,
    /// Tank volume over average draw, hours; `None` without draw
    pub tank_capacity_hours: Option<f64>,
    pub large_tank: bool,
    pub short_peaks: bool,
    pub stratification_good: bool,
}

/// Grade the gap between the mixed and layered powers.
pub fn recommend(
    tank: &TankParams,
    layered: &LayeredParams,
    thresholds: &DecisionThresholds,
    metrics: &ProfileMetrics,
    delta_kw: f64,
    delta_pct: f64,
) -> Recommendation {
    let significant = delta_kw >= thresholds.delta_abs_kw || delta_pct >= thresholds.delta_pct;
    let strong = delta_kw >= 2.0 * thresholds.delta_abs_kw || delta_pct >= 2.0 * thresholds.delta_pct;

    let tank_capacity_hours =
        (metrics.demand_avg_lpm > 0.0).then(|| tank.volume_l / (metrics.demand_avg_lpm * 60.0));
    let large_tank = tank_capacity_hours.map_or(true, |h| h >= thresholds.tank_hours);
    let short_peaks =
        metrics.peak_max_duration_min > 0.0 && metrics.peak_max_duration_min <= thresholds.short_peak_max_min;
    let stratification_good = layered.mixing_tau_s >= thresholds.stratification_good_tau_s;

    let peak_dominated = short_peaks || metrics.peak_energy_share >= thresholds.peak_energy_share;
    let level = if !significant {
        RecommendationLevel::A
    } else if strong && peak_dominated && (large_tank || stratification_good) {
        RecommendationLevel::C
    } else {
        RecommendationLevel::B
    };

    Recommendation {
        level,
        significant,
        strong,
        tank_capacity_hours,
        large_tank,
        short_peaks,
        stratification_good,
    }
}

/// Cost of ordering the mixed-model power instead of the layered one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancialImpact {
    pub extra_cost_month_pln: f64,
    pub extra_cost_year_pln: f64,
    /// Yearly cost over the horizon
    pub extra_cost_total_pln: f64,
    /// Set only when a tariff was given
    pub horizon_years: Option<u32>,
}

/// Price a power gap; zero when there is no gap or no tariff.
pub fn financial_impact(delta_kw: f64, cost: &CostParams) -> FinancialImpact {
    let horizon_years = cost.rates().map(|_| cost.horizon_years);
    match cost.rates() {
        Some((month, year)) if delta_kw > 0.0 => {
            let extra_cost_year_pln = delta_kw * year;
            FinancialImpact {
                extra_cost_month_pln: delta_kw * month,
                extra_cost_year_pln,
                extra_cost_total_pln: extra_cost_year_pln * f64::from(cost.horizon_years),
                horizon_years,
            }
        }
        _ => FinancialImpact {
            extra_cost_month_pln: 0.0,
            extra_cost_year_pln: 0.0,
            extra_cost_total_pln: 0.0,
            horizon_years,
        },
    }
}

/// What the final power rests on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionBasis {
    Technical,
    /// A positive gap was priced
    TechnicalFinancial,
}

impl DecisionBasis {
    pub fn as_str(self) -> &'static str {
        match self {
            DecisionBasis::Technical => "technical",
            DecisionBasis::TechnicalFinancial => "technical and financial",
        }
    }
}

/// Both runs, the comparison and the proposed ordered power.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TankSimulationResult {
    pub energy_kwh: f64,
    pub average_power_kw: f64,
    pub loss_kw: f64,
    pub metrics: ProfileMetrics,
    pub mixed: ModelRun,
    pub layered: ModelRun,
    /// Mixed minus layered power, kW
    pub delta_power_kw: f64,
    /// Gap as a share of the layered power, %
    pub delta_power_pct: f64,
    pub recommendation: Recommendation,
    pub financial: FinancialImpact,
    /// Mixed power at level A, layered power at B and C, kW
    pub ordered_power_kw: f64,
    pub decision_basis: DecisionBasis,
}

/// Run both tank models, compare them and propose an ordered power.
pub fn simulate_tank(input: &TankSimulationInput) -> CalcResult<TankSimulationResult> {
    input.validate()?;

    let tank = &input.tank;
    let demand = input.demand_lpm.as_slice();
    let energy = prepass_energy(demand, tank)?;
    let loss_kw = input.loss.loss_kw(energy.average_power_kw);
    let metrics = profile_metrics(demand, tank.dt_s, &input.thresholds);

    let mixed = find_min_power(
        |p| simulate_mixed(tank, demand, p, loss_kw, input.hysteresis_k),
        &input.search,
        input.allowed_violation_min,
    )?;
    let layered = find_min_power(
        |p| simulate_layered(tank, &input.layered, demand, p, loss_kw, input.hysteresis_k),
        &input.search,
        input.allowed_violation_min,
    )?;

    let delta_power_kw = mixed.ordered_power_kw - layered.ordered_power_kw;
    let delta_power_pct = if layered.ordered_power_kw > 0.0 {
        delta_power_kw / layered.ordered_power_kw * 100.0
    } else {
        0.0
    };

    let recommendation = recommend(
        tank,
        &input.layered,
        &input.thresholds,
        &metrics,
        delta_power_kw,
        delta_power_pct,
    );
    let financial = financial_impact(delta_power_kw, &input.cost);

    let ordered_power_kw = match recommendation.level {
        RecommendationLevel::A => mixed.ordered_power_kw,
        RecommendationLevel::B | RecommendationLevel::C => layered.ordered_power_kw,
    };
    let decision_basis = if delta_power_kw > 0.0 && financial.extra_cost_year_pln > 0.0 {
        DecisionBasis::TechnicalFinancial
    } else {
        DecisionBasis::Technical
    };

    debug!(
        steps = demand.len(),
        loss_kw,
        mixed_kw = mixed.ordered_power_kw,
        layered_kw = layered.ordered_power_kw,
        level = ?recommendation.level,
        ordered_power_kw,
        "tank simulation"
    );

    Ok(TankSimulationResult {
        energy_kwh: energy.energy_kwh,
        average_power_kw: energy.average_power_kw,
        loss_kw,
        metrics,
        mixed,
        layered,
        delta_power_kw,
        delta_power_pct,
        recommendation,
        financial,
        ordered_power_kw,
        decision_basis,
    })
}
