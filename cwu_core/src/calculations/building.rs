//! # Building Balance and Audit
//!
//! The only calculators that call other calculators.
//!
//! - [`calculate_balance`] - building-level heat and money balance from the
//!   hot-water bill data: theoretical need, purchased heat, circulation
//!   loss, useful heat, cost and the difference against resident payments.
//! - [`audit`] - auditor's report payload: ordered power by the chosen
//!   method, circulation loss, modernization variants, economics and a
//!   technical rating. The time-simulation method runs the tank
//!   simulation in [`crate::calculations::simulation`].
//!
//! ## Purchased heat
//!
//! The balance uses, in order: the metered heat, payments divided by the
//! heat price (when a positive price is supplied), or the theoretical need.
//! The audit's ratios use the purchased heat when supplied and a reference
//! value from [`Settings::fallback_purchased_gj`] otherwise.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::calculations::circulation::CirculationModel;
use crate::calculations::modernization::{generate_variants, VariantInput, VariantSet};
use crate::calculations::ordered_power::{
    calculate_peak_draw, peak_demand_power, PeakDemandPower, PeakDrawInput, PeakDrawResult,
};
use crate::calculations::power_cost::{optimize_ordered_power, CostOptimization, CostOptimizationInput};
use crate::calculations::simulation::{simulate_tank, TankSimulationInput, TankSimulationResult};
use crate::equations::thermal::water_heating_energy;
use crate::errors::{
    require_non_negative, require_percentage, require_positive, require_positive_delta_t, CalcResult,
    CalcWarning,
};
use crate::settings::Settings;
use crate::units::HOURS_PER_YEAR;

// ============================================================================
// Resident balance
// ============================================================================

/// Building hot-water bill data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildingBillInput {
    /// Hot water used, m³
    pub water_m3: f64,
    pub cold_temp_c: f64,
    pub hot_temp_c: f64,
    /// Metered heat bought from the supplier, GJ
    #[serde(default)]
    pub purchased_heat_gj: Option<f64>,
    /// Heat price, PLN/GJ
    #[serde(default)]
    pub price_per_gj: Option<f64>,
    /// What residents paid for hot water, PLN
    pub resident_payments_pln: f64,
    /// Assumed circulation share of purchased heat, %
    #[serde(default)]
    pub circulation_loss_pct: Option<f64>,
    /// Circulation loop heat-loss coefficient, W/K; wins over the percentage
    #[serde(default)]
    pub ua_w_per_k: Option<f64>,
    /// Loop temperature minus surroundings, K
    #[serde(default = "default_circulation_delta_t_k")]
    pub circulation_delta_t_k: f64,
    /// Loop operating hours per year
    #[serde(default = "default_circulation_hours")]
    pub circulation_hours: f64,
}

fn default_circulation_delta_t_k() -> f64 {
    20.0
}

fn default_circulation_hours() -> f64 {
    HOURS_PER_YEAR
}

impl BuildingBillInput {
    /// Validate input parameters and return ΔT in K.
    pub fn validate(&self) -> CalcResult<f64> {
        require_positive("water_m3", self.water_m3)?;
        require_non_negative("resident_payments_pln", self.resident_payments_pln)?;
        if let Some(gj) = self.purchased_heat_gj {
            require_non_negative("purchased_heat_gj", gj)?;
        }
        if let Some(price) = self.price_per_gj {
            require_non_negative("price_per_gj", price)?;
        }
        if let Some(pct) = self.circulation_loss_pct {
            require_percentage("circulation_loss_pct", pct)?;
        }
        if let Some(ua) = self.ua_w_per_k {
            require_non_negative("ua_w_per_k", ua)?;
        }
        require_non_negative("circulation_delta_t_k", self.circulation_delta_t_k)?;
        require_positive("circulation_hours", self.circulation_hours)?;
        require_positive_delta_t(self.cold_temp_c, self.hot_temp_c)
    }

    fn positive_price(&self) -> Option<f64> {
        self.price_per_gj.filter(|p| *p > 0.0)
    }
}

/// Where the purchased heat figure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PurchasedHeatSource {
    /// Supplied meter reading
    Metered,
    /// Payments divided by the heat price
    FromPayments,
    /// No data; theoretical need used instead
    TheoreticalNeed,
}

/// Building heat and money balance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildingBalance {
    /// Heat needed to warm the water with no losses, GJ
    pub need_gj: f64,
    /// Heat bought, GJ
    pub purchased_gj: f64,
    pub purchased_source: PurchasedHeatSource,
    /// Loss model used for `circulation_gj`
    pub circulation_model: CirculationModel,
    /// Heat lost in circulation, GJ
    pub circulation_gj: f64,
    /// Purchased minus circulation, GJ (≥ 0)
    pub useful_gj: f64,
    /// Purchased heat at the heat price, PLN (0 without a price)
    pub cost_pln: f64,
    /// Resident payments minus cost, PLN
    pub diff_pln: f64,
    /// Circulation share of purchased heat, %; `None` when nothing was bought
    pub loss_share_pct: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<CalcWarning>,
}

/// Compute the building balance.
///
/// # Example
///
/// ```rust
/// use cwu_core::calculations::building::{calculate_balance, BuildingBillInput};
///
/// let input = BuildingBillInput {
///     water_m3: 1000.0,
///     cold_temp_c: 10.0,
///     hot_temp_c: 55.0,
///     purchased_heat_gj: Some(400.0),
///     price_per_gj: Some(80.0),
///     resident_payments_pln: 35_000.0,
///     circulation_loss_pct: Some(25.0),
///     ua_w_per_k: None,
///     circulation_delta_t_k: 20.0,
///     circulation_hours: 8760.0,
/// };
/// let balance = calculate_balance(&input).unwrap();
/// assert_eq!(balance.circulation_gj, 100.0);
/// assert_eq!(balance.cost_pln, 32_000.0);
/// assert_eq!(balance.diff_pln, 3_000.0);
/// ```
pub fn calculate_balance(input: &BuildingBillInput) -> CalcResult<BuildingBalance> {
    let delta_t = input.validate()?;
    let mut warnings = Vec::new();

    let need_gj = water_heating_energy(input.water_m3, delta_t).gj;
    let price = input.positive_price();

    let (purchased_gj, purchased_source) = match (input.purchased_heat_gj, price) {
        (Some(gj), _) => (gj, PurchasedHeatSource::Metered),
        (None, Some(p)) => (input.resident_payments_pln / p, PurchasedHeatSource::FromPayments),
        (None, None) => {
            warn!(need_gj, "no purchased heat or price, using theoretical need");
            warnings.push(CalcWarning::AssumedPurchasedHeat { assumed_gj: need_gj });
            (need_gj, PurchasedHeatSource::TheoreticalNeed)
        }
    };

    let circulation_model = CirculationModel::select(
        input.ua_w_per_k,
        input.circulation_delta_t_k,
        input.circulation_hours,
        input.circulation_loss_pct,
        Some(purchased_gj),
    );
    let circulation_gj = circulation_model.annual_loss()?.annual_loss_gj;
    let useful_gj = (purchased_gj - circulation_gj).max(0.0);
    let cost_pln = price.map_or(0.0, |p| purchased_gj * p);
    let diff_pln = input.resident_payments_pln - cost_pln;
    let loss_share_pct = (purchased_gj > 0.0).then(|| circulation_gj / purchased_gj * 100.0);

    debug!(
        need_gj,
        purchased_gj,
        circulation_model = circulation_model.name(),
        circulation_gj,
        useful_gj,
        cost_pln,
        diff_pln,
        "building balance"
    );

    Ok(BuildingBalance {
        need_gj,
        purchased_gj,
        purchased_source,
        circulation_model,
        circulation_gj,
        useful_gj,
        cost_pln,
        diff_pln,
        loss_share_pct,
        warnings,
    })
}

// ============================================================================
// Auditor composite
// ============================================================================

/// How the ordered power is chosen.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum PowerMethod {
    /// Peak draw × simultaneity; the buffer's share is reported, not deducted
    #[default]
    Normative,
    /// Measured peak with no simultaneity, plus a margin
    PeakDemand { margin_pct: f64 },
    /// Cheapest ordered power over a candidate grid
    CostOptimization(CostOptimizationInput),
    /// Smallest heater power that keeps a simulated tank above its comfort limit
    TimeSimulation(Box<TankSimulationInput>),
}

impl PowerMethod {
    pub fn name(&self) -> &'static str {
        match self {
            PowerMethod::Normative => "normative",
            PowerMethod::PeakDemand { .. } => "peak_demand",
            PowerMethod::CostOptimization(_) => "cost_optimization",
            PowerMethod::TimeSimulation(_) => "time_simulation",
        }
    }
}

/// Everything the auditor supplies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditInput {
    pub power: PeakDrawInput,
    #[serde(default)]
    pub method: PowerMethod,
    /// Circulation loop heat-loss coefficient, W/K
    #[serde(default)]
    pub ua_w_per_k: Option<f64>,
    /// Loop temperature minus surroundings, K
    pub circulation_delta_t_k: f64,
    /// Loop operating hours per year
    pub circulation_hours: f64,
    /// Assumed circulation share of purchased heat, %
    #[serde(default)]
    pub circulation_pct: Option<f64>,
    /// Heat bought per year, GJ
    #[serde(default)]
    pub purchased_gj: Option<f64>,
    /// Heat price, PLN/GJ
    pub price_per_gj: f64,
}

impl AuditInput {
    /// Validate input parameters.
    pub fn validate(&self) -> CalcResult<()> {
        self.power.validate()?;
        if let Some(ua) = self.ua_w_per_k {
            require_non_negative("ua_w_per_k", ua)?;
        }
        require_non_negative("circulation_delta_t_k", self.circulation_delta_t_k)?;
        require_positive("circulation_hours", self.circulation_hours)?;
        if let Some(pct) = self.circulation_pct {
            require_percentage("circulation_pct", pct)?;
        }
        if let Some(gj) = self.purchased_gj {
            require_positive("purchased_gj", gj)?;
        }
        require_positive("price_per_gj", self.price_per_gj)?;
        Ok(())
    }

    /// Circulation model implied by the inputs (UA first).
    pub fn circulation_model(&self) -> CirculationModel {
        CirculationModel::select(
            self.ua_w_per_k,
            self.circulation_delta_t_k,
            self.circulation_hours,
            self.circulation_pct,
            self.purchased_gj,
        )
    }
}

/// Ordered power as decided by the chosen method.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditPower {
    /// Normative peak-draw sizing, always computed
    pub peak_draw: PeakDrawResult,
    pub method: String,
    /// Power to order, kW
    pub ordered_power_kw: f64,
    pub method_note: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub peak_demand: Option<PeakDemandPower>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost_optimization: Option<CostOptimization>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tank_simulation: Option<Box<TankSimulationResult>>,
    /// Share of purchased heat not lost in circulation, % (whole number)
    pub efficiency_pct: f64,
    /// e.g. "48 flats, 180 L/min peak"
    pub consumption_pattern: String,
}

/// Investment advice tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvestmentRecommendation {
    /// Mean savings above 50 000 PLN/year
    StronglyRecommended,
    /// Mean savings above 20 000 PLN/year
    Recommended,
    Consider,
}

impl InvestmentRecommendation {
    pub fn from_savings(mean_savings_pln: f64) -> Self {
        if mean_savings_pln > 50_000.0 {
            InvestmentRecommendation::StronglyRecommended
        } else if mean_savings_pln > 20_000.0 {
            InvestmentRecommendation::Recommended
        } else {
            InvestmentRecommendation::Consider
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            InvestmentRecommendation::StronglyRecommended => {
                "Modernization strongly recommended - high savings"
            }
            InvestmentRecommendation::Recommended => "Modernization recommended - good savings",
            InvestmentRecommendation::Consider => "Consider modernization - moderate savings",
        }
    }
}

/// Money side of the audit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEconomics {
    /// Circulation loss at the heat price, PLN/year (whole złoty)
    pub current_cost_pln: f64,
    /// Mean annual savings over the variants, PLN (whole złoty)
    pub potential_savings_pln: f64,
    pub recommendation: InvestmentRecommendation,
    /// CO₂ attributable to the circulation loss, kg/year
    pub co2_reduction_kg: f64,
}

/// Condition of the installation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SystemRating {
    VeryGood,
    Good,
    Average,
    RequiresModernization,
}

impl SystemRating {
    pub fn from_efficiency(efficiency_pct: f64) -> Self {
        if efficiency_pct > 85.0 {
            SystemRating::VeryGood
        } else if efficiency_pct > 75.0 {
            SystemRating::Good
        } else if efficiency_pct > 65.0 {
            SystemRating::Average
        } else {
            SystemRating::RequiresModernization
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SystemRating::VeryGood => "very good",
            SystemRating::Good => "good",
            SystemRating::Average => "average",
            SystemRating::RequiresModernization => "requires modernization",
        }
    }
}

/// Technical side of the audit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechnicalAssessment {
    /// 100 − loss share, clamped to 60–95 % (1 decimal)
    pub efficiency_pct: f64,
    /// Circulation loss as a share of purchased heat, % (1 decimal)
    pub heat_losses_pct: f64,
    pub system_rating: SystemRating,
    pub recommendations: Vec<String>,
}

/// Full audit payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditResult {
    pub power: AuditPower,
    pub circulation_model: CirculationModel,
    pub circulation_loss_gj: f64,
    pub variants: VariantSet,
    pub economics: AuditEconomics,
    pub technical: TechnicalAssessment,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<CalcWarning>,
}

fn round_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn recommendations(heat_losses_pct: f64) -> Vec<String> {
    let insulation = if heat_losses_pct > 20.0 {
        "Urgent replacement of uninsulated pipes"
    } else {
        "Regular inspection of pipe insulation"
    };
    [
        "Upgrade insulation of circulation pipes",
        "Fit thermostatic valves on the risers",
        "Optimize circulation temperature",
        insulation,
        "Consider heat recovery",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Ordered power and the method-specific detail behind it.
struct MethodPower {
    ordered_power_kw: f64,
    note: String,
    peak_demand: Option<PeakDemandPower>,
    cost_optimization: Option<CostOptimization>,
    tank_simulation: Option<Box<TankSimulationResult>>,
}

impl MethodPower {
    fn plain(ordered_power_kw: f64, note: impl Into<String>) -> Self {
        MethodPower {
            ordered_power_kw,
            note: note.into(),
            peak_demand: None,
            cost_optimization: None,
            tank_simulation: None,
        }
    }
}

fn select_power(input: &AuditInput, peak_draw: &PeakDrawResult) -> CalcResult<MethodPower> {
    match &input.method {
        PowerMethod::Normative => Ok(MethodPower::plain(peak_draw.power_kw, "Normative peak-draw power")),
        PowerMethod::PeakDemand { margin_pct } => {
            let peak = peak_demand_power(&input.power, *margin_pct)?;
            let note = format!("Peak demand: peak={:.1} kW + {}% margin", peak.peak_kw, margin_pct);
            let ordered_kw = peak.ordered_kw;
            Ok(MethodPower {
                peak_demand: Some(peak),
                ..MethodPower::plain(ordered_kw, note)
            })
        }
        PowerMethod::CostOptimization(rates) => {
            let table = optimize_ordered_power(peak_draw.power_kw, rates)?;
            let ordered_kw = table.optimum_power_kw;
            Ok(MethodPower {
                cost_optimization: Some(table),
                ..MethodPower::plain(ordered_kw, "Power after cost optimization")
            })
        }
        PowerMethod::TimeSimulation(sim) => {
            let result = simulate_tank(sim)?;
            let note = format!(
                "Tank simulation: mixed={:.1} kW, layered={:.1} kW, level {:?}",
                result.mixed.ordered_power_kw, result.layered.ordered_power_kw, result.recommendation.level
            );
            let ordered_kw = result.ordered_power_kw;
            Ok(MethodPower {
                tank_simulation: Some(Box::new(result)),
                ..MethodPower::plain(ordered_kw, note)
            })
        }
    }
}

/// Build the auditor's report payload.
///
/// # Example
///
/// ```rust
/// use cwu_core::calculations::building::{audit, AuditInput, PowerMethod};
/// use cwu_core::calculations::ordered_power::{PeakDrawInput, SimultaneityProfile};
/// use cwu_core::settings::Settings;
///
/// let input = AuditInput {
///     power: PeakDrawInput {
///         flats: 48,
///         risers: 4,
///         cold_temp_c: 10.0,
///         hot_temp_c: 55.0,
///         draw_peak_lpm: 180.0,
///         simult_profile: SimultaneityProfile::Med,
///         buffer_l: 0.0,
///         buffer_delta_c: 0.0,
///         peak_duration_s: 300.0,
///     },
///     method: PowerMethod::Normative,
///     ua_w_per_k: Some(100.0),
///     circulation_delta_t_k: 20.0,
///     circulation_hours: 8760.0,
///     circulation_pct: None,
///     purchased_gj: Some(800.0),
///     price_per_gj: 60.0,
/// };
/// let result = audit(&input, &Settings::default()).unwrap();
/// assert!((result.circulation_loss_gj - 63.072).abs() < 1e-9);
/// assert_eq!(result.variants.variants.len(), 3);
/// ```
pub fn audit(input: &AuditInput, settings: &Settings) -> CalcResult<AuditResult> {
    input.validate()?;
    let mut warnings = Vec::new();

    let peak_draw = calculate_peak_draw(&input.power)?;
    let selected = select_power(input, &peak_draw)?;
    let ordered_power_kw = selected.ordered_power_kw;

    let circulation_model = input.circulation_model();
    let circulation_loss_gj = circulation_model.annual_loss()?.annual_loss_gj;

    let reference_gj = match input.purchased_gj {
        Some(gj) => gj,
        None => {
            let assumed_gj = settings.fallback_purchased_gj;
            warn!(assumed_gj, "purchased heat not supplied, using reference value for ratios");
            warnings.push(CalcWarning::AssumedPurchasedHeat { assumed_gj });
            assumed_gj
        }
    };
    let heat_losses_pct = circulation_loss_gj / reference_gj * 100.0;

    let variants = generate_variants(
        &VariantInput {
            circulation_loss_gj,
            price_per_gj: input.price_per_gj,
        },
        &settings.modernization_tiers,
    )?;
    warnings.extend(variants.warnings.iter().cloned());

    let potential_savings_pln = variants.mean_savings_pln().round();
    let economics = AuditEconomics {
        current_cost_pln: (circulation_loss_gj * input.price_per_gj).round(),
        potential_savings_pln,
        recommendation: InvestmentRecommendation::from_savings(potential_savings_pln),
        co2_reduction_kg: (circulation_loss_gj * settings.co2_kg_per_gj).round(),
    };

    let efficiency = (100.0 - heat_losses_pct).clamp(60.0, 95.0);
    let technical = TechnicalAssessment {
        efficiency_pct: round_tenth(efficiency),
        heat_losses_pct: round_tenth(heat_losses_pct),
        system_rating: SystemRating::from_efficiency(efficiency),
        recommendations: recommendations(heat_losses_pct),
    };

    debug!(
        method = input.method.name(),
        ordered_power_kw,
        circulation_model = circulation_model.name(),
        circulation_loss_gj,
        heat_losses_pct,
        "audit"
    );

    Ok(AuditResult {
        power: AuditPower {
            consumption_pattern: format!(
                "{} flats, {} L/min peak",
                input.power.flats, input.power.draw_peak_lpm
            ),
            efficiency_pct: (100.0 - heat_losses_pct).round(),
            peak_draw,
            method: input.method.name().to_string(),
            ordered_power_kw,
            method_note: selected.note,
            peak_demand: selected.peak_demand,
            cost_optimization: selected.cost_optimization,
            tank_simulation: selected.tank_simulation,
        },
        circulation_model,
        circulation_loss_gj,
        variants,
        economics,
        technical,
        warnings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calculations::ordered_power::SimultaneityProfile;
    use approx::assert_relative_eq;

    fn bill() -> BuildingBillInput {
        BuildingBillInput {
            water_m3: 1000.0,
            cold_temp_c: 10.0,
            hot_temp_c: 55.0,
            purchased_heat_gj: Some(400.0),
            price_per_gj: Some(80.0),
            resident_payments_pln: 35_000.0,
            circulation_loss_pct: Some(25.0),
            ua_w_per_k: None,
            circulation_delta_t_k: 20.0,
            circulation_hours: 8760.0,
        }
    }

    #[test]
    fn test_balance_with_meter_reading() {
        let b = calculate_balance(&bill()).unwrap();
        // 1000 m³ × 4.186 × 45 / 1000
        assert_relative_eq!(b.need_gj, 188.37, epsilon = 1e-9);
        assert_eq!(b.purchased_source, PurchasedHeatSource::Metered);
        assert_eq!(b.circulation_gj, 100.0);
        assert_eq!(b.useful_gj, 300.0);
        assert_eq!(b.cost_pln, 32_000.0);
        assert_eq!(b.diff_pln, 3_000.0);
        assert_eq!(b.loss_share_pct, Some(25.0));
        assert!(b.warnings.is_empty());
    }

    #[test]
    fn test_balance_ua_wins_over_percentage() {
        let input = BuildingBillInput {
            ua_w_per_k: Some(100.0),
            ..bill()
        };
        let b = calculate_balance(&input).unwrap();
        assert!(matches!(b.circulation_model, CirculationModel::Physical { .. }));
        assert_relative_eq!(b.circulation_gj, 63.072, epsilon = 1e-9);
        assert_relative_eq!(b.useful_gj, 336.928, epsilon = 1e-9);
        assert_relative_eq!(b.loss_share_pct.unwrap(), 15.768, epsilon = 1e-9);

        // zero UA falls back to the percentage
        let input = BuildingBillInput {
            ua_w_per_k: Some(0.0),
            ..bill()
        };
        let b = calculate_balance(&input).unwrap();
        assert!(matches!(b.circulation_model, CirculationModel::Percentage { .. }));
        assert_eq!(b.circulation_gj, 100.0);
    }

    #[test]
    fn test_balance_purchased_from_payments() {
        let input = BuildingBillInput {
            purchased_heat_gj: None,
            ..bill()
        };
        let b = calculate_balance(&input).unwrap();
        assert_eq!(b.purchased_source, PurchasedHeatSource::FromPayments);
        assert_relative_eq!(b.purchased_gj, 437.5);
        // cost equals payments when purchased heat is derived from them
        assert_relative_eq!(b.diff_pln, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_balance_falls_back_to_need() {
        let input = BuildingBillInput {
            purchased_heat_gj: None,
            price_per_gj: None,
            circulation_loss_pct: None,
            ..bill()
        };
        let b = calculate_balance(&input).unwrap();
        assert_eq!(b.purchased_source, PurchasedHeatSource::TheoreticalNeed);
        assert_eq!(b.purchased_gj, b.need_gj);
        assert_eq!(b.circulation_model, CirculationModel::NotAssessed);
        assert_eq!(b.circulation_gj, 0.0);
        assert_eq!(b.cost_pln, 0.0);
        assert_eq!(b.diff_pln, 35_000.0);
        assert!(matches!(b.warnings[0], CalcWarning::AssumedPurchasedHeat { .. }));
    }

    #[test]
    fn test_balance_zero_price_is_no_price() {
        let input = BuildingBillInput {
            purchased_heat_gj: None,
            price_per_gj: Some(0.0),
            ..bill()
        };
        let b = calculate_balance(&input).unwrap();
        assert_eq!(b.purchased_source, PurchasedHeatSource::TheoreticalNeed);
        assert_eq!(b.cost_pln, 0.0);
    }

    #[test]
    fn test_balance_zero_purchase_has_no_share() {
        let input = BuildingBillInput {
            purchased_heat_gj: Some(0.0),
            ..bill()
        };
        let b = calculate_balance(&input).unwrap();
        assert_eq!(b.useful_gj, 0.0);
        assert_eq!(b.loss_share_pct, None);
    }

    #[test]
    fn test_balance_validation() {
        let mut input = bill();
        input.hot_temp_c = 5.0;
        assert_eq!(calculate_balance(&input).unwrap_err().error_code(), "PHYSICAL_CONSTRAINT");

        let mut input = bill();
        input.water_m3 = 0.0;
        assert!(calculate_balance(&input).is_err());

        let mut input = bill();
        input.resident_payments_pln = -1.0;
        assert!(calculate_balance(&input).is_err());

        let mut input = bill();
        input.circulation_loss_pct = Some(120.0);
        assert!(calculate_balance(&input).is_err());

        let mut input = bill();
        input.ua_w_per_k = Some(-5.0);
        assert!(calculate_balance(&input).is_err());
    }

    fn audit_input() -> AuditInput {
        AuditInput {
            power: PeakDrawInput {
                flats: 64,
                risers: 4,
                cold_temp_c: 10.0,
                hot_temp_c: 55.0,
                draw_peak_lpm: 240.0,
                simult_profile: SimultaneityProfile::Med,
                buffer_l: 0.0,
                buffer_delta_c: 0.0,
                peak_duration_s: 300.0,
            },
            method: PowerMethod::Normative,
            ua_w_per_k: None,
            circulation_delta_t_k: 20.0,
            circulation_hours: 8760.0,
            circulation_pct: Some(30.0),
            purchased_gj: Some(1000.0),
            price_per_gj: 60.0,
        }
    }

    #[test]
    fn test_audit_percentage_model() {
        let r = audit(&audit_input(), &Settings::default()).unwrap();
        assert!(matches!(r.circulation_model, CirculationModel::Percentage { .. }));
        assert_eq!(r.circulation_loss_gj, 300.0);

        // 1/√64 × 0.8 = 0.1; 240/60 × 0.1 kg/s × 4.186 × 45
        assert_eq!(r.power.peak_draw.simultaneity, 0.1);
        assert_relative_eq!(r.power.ordered_power_kw, 75.348, epsilon = 1e-9);
        assert_eq!(r.power.method, "normative");
        assert_eq!(r.power.efficiency_pct, 70.0);

        // 300 GJ × 60 PLN
        assert_eq!(r.economics.current_cost_pln, 18_000.0);
        // savings 2700 / 5400 / 8100 → mean 5400
        assert_eq!(r.economics.potential_savings_pln, 5_400.0);
        assert_eq!(r.economics.recommendation, InvestmentRecommendation::Consider);
        assert_eq!(r.economics.co2_reduction_kg, 60_000.0);

        assert_eq!(r.technical.heat_losses_pct, 30.0);
        assert_eq!(r.technical.efficiency_pct, 70.0);
        assert_eq!(r.technical.system_rating, SystemRating::Average);
        assert_eq!(r.technical.recommendations[3], "Urgent replacement of uninsulated pipes");
        assert!(r.warnings.is_empty());
    }

    #[test]
    fn test_audit_ua_takes_priority() {
        let input = AuditInput {
            ua_w_per_k: Some(100.0),
            ..audit_input()
        };
        let r = audit(&input, &Settings::default()).unwrap();
        assert!(matches!(r.circulation_model, CirculationModel::Physical { .. }));
        assert_relative_eq!(r.circulation_loss_gj, 63.072, epsilon = 1e-9);
        // 63.072 / 1000 → 6.3 % loss
        assert_eq!(r.technical.heat_losses_pct, 6.3);
        assert_eq!(r.technical.efficiency_pct, 93.7);
        assert_eq!(r.technical.system_rating, SystemRating::VeryGood);
    }

    #[test]
    fn test_audit_without_purchased_heat_uses_reference() {
        let input = AuditInput {
            ua_w_per_k: Some(100.0),
            purchased_gj: None,
            ..audit_input()
        };
        let r = audit(&input, &Settings::default()).unwrap();
        assert_eq!(
            r.warnings,
            vec![CalcWarning::AssumedPurchasedHeat { assumed_gj: 500.0 }]
        );
        // 63.072 / 500
        assert_eq!(r.technical.heat_losses_pct, 12.6);
    }

    #[test]
    fn test_audit_no_circulation_data() {
        let input = AuditInput {
            circulation_pct: None,
            ..audit_input()
        };
        let r = audit(&input, &Settings::default()).unwrap();
        assert_eq!(r.circulation_model, CirculationModel::NotAssessed);
        assert_eq!(r.circulation_loss_gj, 0.0);
        assert_eq!(r.technical.efficiency_pct, 95.0);
        assert_eq!(r.warnings.len(), 3);
    }

    #[test]
    fn test_audit_peak_demand_method() {
        let input = AuditInput {
            method: PowerMethod::PeakDemand { margin_pct: 10.0 },
            ..audit_input()
        };
        let r = audit(&input, &Settings::default()).unwrap();
        let peak = r.power.peak_demand.as_ref().unwrap();
        // 4 kg/s × 4.186 × 45 = 753.48 kW
        assert_relative_eq!(peak.peak_kw, 753.48, epsilon = 1e-9);
        assert_relative_eq!(r.power.ordered_power_kw, 828.828, epsilon = 1e-9);
        assert!(r.power.method_note.contains("753.5"));
    }

    #[test]
    fn test_audit_cost_method_orders_optimum() {
        let input = AuditInput {
            method: PowerMethod::CostOptimization(CostOptimizationInput {
                power_rate_pln_per_kw: 150.0,
                penalty_rate_pln_per_kw_h: 20.0,
                ..Default::default()
            }),
            ..audit_input()
        };
        let r = audit(&input, &Settings::default()).unwrap();
        let table = r.power.cost_optimization.as_ref().unwrap();
        assert_eq!(r.power.ordered_power_kw, table.optimum_power_kw);
        assert_eq!(r.power.method, "cost_optimization");
    }

    #[test]
    fn test_audit_time_simulation_method() {
        use crate::calculations::simulation::{default_demand_profile, LossInput, TankParams};

        let sim = TankSimulationInput {
            tank: TankParams {
                volume_l: 200.0,
                ..TankParams::default()
            },
            demand_lpm: vec![10.0; 24 * 60],
            loss: LossInput::Power { loss_kw: 0.0 },
            ..TankSimulationInput::default()
        };
        let input = AuditInput {
            method: PowerMethod::TimeSimulation(Box::new(sim)),
            ..audit_input()
        };
        let r = audit(&input, &Settings::default()).unwrap();
        let sim = r.power.tank_simulation.as_ref().unwrap();
        assert_eq!(r.power.method, "time_simulation");
        assert_eq!(r.power.ordered_power_kw, sim.ordered_power_kw);
        // steady 10 L/min at 45 K
        assert!((r.power.ordered_power_kw - 31.35).abs() < 1.0);
        assert!(r.power.peak_demand.is_none());

        let input = AuditInput {
            method: PowerMethod::TimeSimulation(Box::new(TankSimulationInput {
                demand_lpm: default_demand_profile(60).unwrap(),
                search: crate::calculations::simulation::PowerSearch {
                    max_kw: 20.0,
                    ..Default::default()
                },
                ..TankSimulationInput::default()
            })),
            ..audit_input()
        };
        let err = audit(&input, &Settings::default()).unwrap_err();
        assert_eq!(err.error_code(), "CALCULATION_FAILED");
    }

    #[test]
    fn test_buffer_covering_whole_peak() {
        let mut power = audit_input().power;
        // 5000 L × 4.186 × 10 K over 300 s ≈ 698 kW of buffer against a 75 kW peak
        power.buffer_l = 5000.0;
        power.buffer_delta_c = 10.0;

        let normative = audit(
            &AuditInput {
                power: power.clone(),
                ..audit_input()
            },
            &Settings::default(),
        )
        .unwrap();
        assert_eq!(normative.power.peak_draw.net_power_kw, 0.0);
        assert_relative_eq!(normative.power.ordered_power_kw, 75.348, epsilon = 1e-9);

        let input = AuditInput {
            power,
            method: PowerMethod::CostOptimization(CostOptimizationInput {
                power_rate_pln_per_kw: 150.0,
                penalty_rate_pln_per_kw_h: 20.0,
                ..Default::default()
            }),
            ..audit_input()
        };
        let r = audit(&input, &Settings::default()).unwrap();
        let table = r.power.cost_optimization.as_ref().unwrap();
        // grid 38..=113 around the gross 75.3 kW
        assert_eq!(table.rows[0].power_kw, 38.0);
        assert!(r.power.ordered_power_kw > 0.0);
    }

    #[test]
    fn test_recommendation_thresholds() {
        assert_eq!(
            InvestmentRecommendation::from_savings(50_001.0),
            InvestmentRecommendation::StronglyRecommended
        );
        assert_eq!(
            InvestmentRecommendation::from_savings(50_000.0),
            InvestmentRecommendation::Recommended
        );
        assert_eq!(
            InvestmentRecommendation::from_savings(20_000.0),
            InvestmentRecommendation::Consider
        );
    }

    #[test]
    fn test_rating_bands() {
        assert_eq!(SystemRating::from_efficiency(90.0), SystemRating::VeryGood);
        assert_eq!(SystemRating::from_efficiency(85.0), SystemRating::Good);
        assert_eq!(SystemRating::from_efficiency(70.0), SystemRating::Average);
        assert_eq!(SystemRating::from_efficiency(65.0), SystemRating::RequiresModernization);
    }

    #[test]
    fn test_power_method_json() {
        let m: PowerMethod = serde_json::from_str(r#"{"method":"peak_demand","margin_pct":15}"#).unwrap();
        assert!(matches!(m, PowerMethod::PeakDemand { margin_pct } if margin_pct == 15.0));
        let m: PowerMethod = serde_json::from_str(
            r#"{"method":"cost_optimization","power_rate_pln_per_kw":150,"penalty_rate_pln_per_kw_h":20}"#,
        )
        .unwrap();
        assert_eq!(m.name(), "cost_optimization");
        let m: PowerMethod = serde_json::from_str(
            r#"{"method":"time_simulation","tank":{"volume_l":500,"init_temp_c":55,"set_temp_c":55,
                "cold_temp_c":10,"min_temp_c":45},"demand_lpm":[5,5],"loss":{"basis":"power","loss_kw":1}}"#,
        )
        .unwrap();
        assert!(matches!(&m, PowerMethod::TimeSimulation(sim) if sim.tank.dt_s == 60));
    }
}
