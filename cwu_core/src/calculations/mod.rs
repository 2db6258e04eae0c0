//! # Hot-Water Calculations
//!
//! Each calculator follows the same pattern:
//!
//! - `*Input` - Input parameters (JSON-serializable, with `validate()`)
//! - `*Result` - Calculation results (JSON-serializable)
//! - a pure function `fn(&Input) -> CalcResult<Result>`
//!
//! Only [`building`] calls other calculators.
//!
//! ## Available Calculations
//!
//! - [`ordered_power`] - Ordered thermal power (occupancy, building shortcut, peak draw)
//! - [`power_cost`] - Cost-optimal ordered power
//! - [`circulation`] - Circulation heat loss (UA or percentage)
//! - [`resident_loss`] - Resident's billed price against theoretical cost
//! - [`modernization`] - Degradation correction and investment variants
//! - [`simulation`] - Ordered power from a mixed/layered tank time simulation
//! - [`building`] - Building balance and the auditor composite

pub mod building;
pub mod circulation;
pub mod modernization;
pub mod ordered_power;
pub mod power_cost;
pub mod resident_loss;
pub mod simulation;

use serde::{Deserialize, Serialize};

use crate::errors::CalcResult;
use crate::settings::Settings;

// Re-export commonly used types
pub use building::{AuditInput, AuditResult, BuildingBalance, BuildingBillInput};
pub use circulation::{CirculationLoss, CirculationModel};
pub use modernization::{ModernizationState, ModernizedState, VariantInput, VariantSet};
pub use ordered_power::{
    BuildingPowerInput, BuildingPowerResult, OccupancyPowerInput, OccupancyPowerResult, PeakDrawInput,
    PeakDrawResult,
};
pub use resident_loss::{ResidentBillingRecord, ResidentLossResult};
pub use simulation::{TankSimulationInput, TankSimulationResult};

/// Enum wrapper for all calculation inputs.
///
/// Lets a report hold heterogeneous calculations in one collection while
/// keeping a clean tagged serialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum CalculationItem {
    OccupancyPower(OccupancyPowerInput),
    /// Rounded with [`Settings::power_rounding`]
    BuildingPower(BuildingPowerInput),
    PeakDraw(PeakDrawInput),
    Circulation(CirculationModel),
    ResidentLoss(ResidentBillingRecord),
    Modernization(ModernizationState),
    /// Evaluated against [`Settings::modernization_tiers`]
    Variants(VariantInput),
    Balance(BuildingBillInput),
    Audit(AuditInput),
    TankSimulation(TankSimulationInput),
}

/// Result of running a [`CalculationItem`]; variant names match.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum CalculationOutput {
    OccupancyPower(OccupancyPowerResult),
    BuildingPower(BuildingPowerResult),
    PeakDraw(PeakDrawResult),
    Circulation(CirculationLoss),
    ResidentLoss(ResidentLossResult),
    Modernization(ModernizedState),
    Variants(VariantSet),
    Balance(BuildingBalance),
    Audit(Box<AuditResult>),
    TankSimulation(Box<TankSimulationResult>),
}

impl CalculationItem {
    /// Get the calculation type as a string
    pub fn calc_type(&self) -> &'static str {
        match self {
            CalculationItem::OccupancyPower(_) => "OccupancyPower",
            CalculationItem::BuildingPower(_) => "BuildingPower",
            CalculationItem::PeakDraw(_) => "PeakDraw",
            CalculationItem::Circulation(_) => "Circulation",
            CalculationItem::ResidentLoss(_) => "ResidentLoss",
            CalculationItem::Modernization(_) => "Modernization",
            CalculationItem::Variants(_) => "Variants",
            CalculationItem::Balance(_) => "Balance",
            CalculationItem::Audit(_) => "Audit",
            CalculationItem::TankSimulation(_) => "TankSimulation",
        }
    }

    /// Run the calculator for this item.
    ///
    /// # Example
    ///
    /// ```rust
    /// use cwu_core::calculations::{CalculationItem, CalculationOutput, CirculationModel};
    /// use cwu_core::settings::Settings;
    ///
    /// let item = CalculationItem::Circulation(CirculationModel::Percentage {
    ///     purchased_gj: 800.0,
    ///     circulation_pct: 25.0,
    /// });
    /// match item.run(&Settings::default()).unwrap() {
    ///     CalculationOutput::Circulation(loss) => assert_eq!(loss.annual_loss_gj, 200.0),
    ///     other => panic!("unexpected output {other:?}"),
    /// }
    /// ```
    pub fn run(&self, settings: &Settings) -> CalcResult<CalculationOutput> {
        let output = match self {
            CalculationItem::OccupancyPower(input) => {
                CalculationOutput::OccupancyPower(ordered_power::calculate(input)?)
            }
            CalculationItem::BuildingPower(input) => CalculationOutput::BuildingPower(
                ordered_power::calculate_building(input, &settings.power_rounding)?,
            ),
            CalculationItem::PeakDraw(input) => {
                CalculationOutput::PeakDraw(ordered_power::calculate_peak_draw(input)?)
            }
            CalculationItem::Circulation(model) => CalculationOutput::Circulation(model.annual_loss()?),
            CalculationItem::ResidentLoss(record) => {
                CalculationOutput::ResidentLoss(resident_loss::compute_resident_loss(record)?)
            }
            CalculationItem::Modernization(state) => CalculationOutput::Modernization(state.calculate()?),
            CalculationItem::Variants(input) => CalculationOutput::Variants(
                modernization::generate_variants(input, &settings.modernization_tiers)?,
            ),
            CalculationItem::Balance(input) => CalculationOutput::Balance(building::calculate_balance(input)?),
            CalculationItem::Audit(input) => {
                CalculationOutput::Audit(Box::new(building::audit(input, settings)?))
            }
            CalculationItem::TankSimulation(input) => {
                CalculationOutput::TankSimulation(Box::new(simulation::simulate_tank(input)?))
            }
        };
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_serialization_is_tagged() {
        let item = CalculationItem::Variants(VariantInput {
            circulation_loss_gj: 100.0,
            price_per_gj: 60.0,
        });
        let json = serde_json::to_string(&item).unwrap();
        assert!(json.contains("\"type\":\"Variants\""));
        let back: CalculationItem = serde_json::from_str(&json).unwrap();
        assert_eq!(back.calc_type(), "Variants");
    }

    #[test]
    fn test_nested_circulation_tag() {
        let json = r#"{"type":"Circulation","model":"Physical","ua_w_per_k":100.0,"delta_t_k":20.0,"hours_per_year":8760.0}"#;
        let item: CalculationItem = serde_json::from_str(json).unwrap();
        match item.run(&Settings::default()).unwrap() {
            CalculationOutput::Circulation(loss) => {
                assert!((loss.annual_loss_gj - 63.072).abs() < 1e-9)
            }
            other => panic!("unexpected output {other:?}"),
        }
    }

    #[test]
    fn test_building_power_uses_settings_rounding() {
        let item = CalculationItem::BuildingPower(BuildingPowerInput {
            flats: 50,
            persons_per_flat: 2.7,
            peak_use_per_person_l_h: 30.0,
            hot_temp_c: 55.0,
            cold_temp_c: 8.0,
            circulation_loss_pct: 20.0,
            safety_margin_pct: 15.0,
        });
        let settings = Settings {
            power_rounding: ordered_power::PowerRounding::None,
            ..Settings::default()
        };
        match item.run(&settings).unwrap() {
            CalculationOutput::BuildingPower(r) => {
                assert!(r.recommended_ordered_power_kw < 305.0);
                assert!(r.recommended_ordered_power_kw > 300.0);
            }
            other => panic!("unexpected output {other:?}"),
        }
    }

    #[test]
    fn test_errors_propagate() {
        let item = CalculationItem::Modernization(ModernizationState::default());
        assert!(item.run(&Settings::default()).unwrap_err().is_validation());
    }
}
