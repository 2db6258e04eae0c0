//! # Request Boundary
//!
//! JSON request shapes as sent by a front end (camelCase, optional fields
//! with defaults), converted into the calculators' input types.
//!
//! All schema checks happen here or in the `validate()` of the input type
//! the request converts into, so a calculator never sees malformed data.
//!
//! ## Envelope
//!
//! [`respond`] wraps the outcome the way a web handler would:
//!
//! ```json
//! { "ok": true, "result": { "type": "Balance", ... } }
//! { "ok": false, "error": { "type": "PhysicalConstraint", "details": { ... } } }
//! ```
//!
//! ## Example
//!
//! ```rust
//! use cwu_core::api::{respond, CalcRequest};
//! use cwu_core::settings::Settings;
//!
//! let request: CalcRequest = serde_json::from_str(r#"{
//!     "kind": "modernization",
//!     "currentLossPct": 74,
//!     "targetReductionPct": 50,
//!     "currentAnnualEnergyGJ": 600
//! }"#).unwrap();
//! let response = respond(&request, &Settings::default());
//! assert!(response.ok);
//! ```

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::calculations::building::{AuditInput, BuildingBillInput, PowerMethod};
use crate::calculations::modernization::{ModernizationState, VariantInput};
use crate::calculations::ordered_power::{
    BufferTank, BuildingPowerInput, OccupancyPowerInput, PeakDrawInput, SimultaneityProfile,
};
use crate::calculations::power_cost::CostOptimizationInput;
use crate::calculations::resident_loss::ResidentBillingRecord;
use crate::calculations::simulation::{
    default_demand_profile, CostParams, LossInput, TankParams, TankSimulationInput,
};
use crate::calculations::{CalculationItem, CalculationOutput};
use crate::equations::thermal::peak_draw_lpm;
use crate::errors::{require_finite, CalcError, CalcResult};
use crate::settings::Settings;
use crate::units::HOURS_PER_YEAR;

fn default_peak_duration_s() -> f64 {
    300.0
}

fn default_circulation_delta_t() -> f64 {
    20.0
}

fn default_circulation_hours() -> f64 {
    HOURS_PER_YEAR
}

fn default_price_per_gj() -> f64 {
    60.0
}

fn default_true() -> bool {
    true
}

/// Ordered-power method names accepted by the auditor endpoint.
///
/// The Polish front-end identifiers are accepted as aliases. The standard-
/// and curve-based ones all size from the normative peak draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditMethod {
    #[default]
    #[serde(
        alias = "PN_EN_806_3",
        alias = "PN_92_B_01706",
        alias = "bilans_energetyczny",
        alias = "moc_czas_rozbioru",
        alias = "krzywa_mocy_sezonowa"
    )]
    Normative,
    #[serde(alias = "peak_demand_pomiary")]
    PeakDemand,
    #[serde(alias = "kosztowa")]
    CostOptimization,
    #[serde(alias = "symulacja_programowa")]
    TimeSimulation,
}

/// Auditor endpoint input.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditorRequest {
    pub flats: u32,
    pub risers: u32,
    pub cold_temp_c: f64,
    pub hot_temp_c: f64,
    /// Building peak draw, L/min; estimated from `flats` when absent
    #[serde(default)]
    pub draw_peak_lpm: Option<f64>,
    /// Used only for the peak draw estimate
    #[serde(default = "default_true")]
    pub has_bathtubs: bool,
    #[serde(default)]
    pub simult_profile: SimultaneityProfile,
    #[serde(default)]
    pub buffer_l: f64,
    #[serde(default)]
    pub buffer_delta_c: f64,
    #[serde(default = "default_peak_duration_s")]
    pub peak_duration_sec: f64,
    #[serde(default)]
    pub circulation_pct: Option<f64>,
    #[serde(default, rename = "purchasedGJ")]
    pub purchased_gj: Option<f64>,
    #[serde(default, rename = "UA_WK")]
    pub ua_wk: Option<f64>,
    #[serde(default = "default_circulation_delta_t", rename = "dT_circ")]
    pub dt_circ: f64,
    #[serde(default = "default_circulation_hours", rename = "hours_circ")]
    pub hours_circ: f64,
    #[serde(default = "default_price_per_gj", rename = "pricePerGJ")]
    pub price_per_gj: f64,
    #[serde(default)]
    pub method: AuditMethod,
    #[serde(default, rename = "costPowerRatePLNkW")]
    pub cost_power_rate_pln_kw: Option<f64>,
    #[serde(default, rename = "penaltyRatePLNkW")]
    pub penalty_rate_pln_kw: Option<f64>,
    #[serde(default)]
    pub expected_exceed_hours: Option<f64>,
    #[serde(default, rename = "avgExceedKW")]
    pub avg_exceed_kw: Option<f64>,
    #[serde(default, rename = "candidateFromKW")]
    pub candidate_from_kw: Option<f64>,
    #[serde(default, rename = "candidateToKW")]
    pub candidate_to_kw: Option<f64>,
    #[serde(default, rename = "candidateStepKW")]
    pub candidate_step_kw: Option<f64>,
    #[serde(default)]
    pub peak_margin_pct: Option<f64>,
    #[serde(default)]
    pub tank_volume_l: Option<f64>,
    #[serde(default, rename = "tMinC")]
    pub t_min_c: Option<f64>,
    #[serde(default, rename = "lossKW")]
    pub loss_kw: Option<f64>,
    #[serde(default, rename = "costKWMonth")]
    pub cost_kw_month: Option<f64>,
    #[serde(default)]
    pub horizon_years: Option<u32>,
    /// Draw profile at one-minute steps; the reference day when absent
    #[serde(default)]
    pub demand_lpm: Option<Vec<f64>>,
}

impl AuditorRequest {
    fn simulation_input(&self) -> CalcResult<TankSimulationInput> {
        let volume_l = self
            .tank_volume_l
            .ok_or_else(|| CalcError::missing_field("tankVolumeL"))?;
        let min_temp_c = self.t_min_c.ok_or_else(|| CalcError::missing_field("tMinC"))?;
        let loss_kw = self.loss_kw.ok_or_else(|| CalcError::missing_field("lossKW"))?;
        tank_simulation_input(
            TankParams {
                volume_l,
                init_temp_c: self.hot_temp_c,
                set_temp_c: self.hot_temp_c,
                cold_temp_c: self.cold_temp_c,
                min_temp_c,
                dt_s: SIMULATION_STEP_S,
            },
            self.demand_lpm.clone(),
            loss_kw,
            self.cost_kw_month,
            self.horizon_years,
        )
    }

    /// Convert to the composite's input, applying defaults.
    pub fn to_input(&self, settings: &Settings) -> CalcResult<AuditInput> {
        let draw_peak_lpm = match self.draw_peak_lpm {
            Some(lpm) => lpm,
            None => {
                let estimate = peak_draw_lpm(self.flats, self.has_bathtubs);
                debug!(flats = self.flats, estimate, "peak draw estimated");
                estimate
            }
        };

        let method = match self.method {
            AuditMethod::Normative => PowerMethod::Normative,
            AuditMethod::PeakDemand => PowerMethod::PeakDemand {
                margin_pct: self.peak_margin_pct.unwrap_or(settings.peak_margin_pct),
            },
            AuditMethod::CostOptimization => {
                let power_rate = self
                    .cost_power_rate_pln_kw
                    .ok_or_else(|| CalcError::missing_field("costPowerRatePLNkW"))?;
                let penalty_rate = self
                    .penalty_rate_pln_kw
                    .ok_or_else(|| CalcError::missing_field("penaltyRatePLNkW"))?;
                PowerMethod::CostOptimization(CostOptimizationInput {
                    power_rate_pln_per_kw: power_rate,
                    penalty_rate_pln_per_kw_h: penalty_rate,
                    expected_exceed_hours: self.expected_exceed_hours,
                    avg_exceed_kw: self.avg_exceed_kw,
                    candidate_from_kw: self.candidate_from_kw,
                    candidate_to_kw: self.candidate_to_kw,
                    candidate_step_kw: self.candidate_step_kw,
                })
            }
            AuditMethod::TimeSimulation => PowerMethod::TimeSimulation(Box::new(self.simulation_input()?)),
        };

        let input = AuditInput {
            power: PeakDrawInput {
                flats: self.flats,
                risers: self.risers,
                cold_temp_c: self.cold_temp_c,
                hot_temp_c: self.hot_temp_c,
                draw_peak_lpm,
                simult_profile: self.simult_profile,
                buffer_l: self.buffer_l,
                buffer_delta_c: self.buffer_delta_c,
                peak_duration_s: self.peak_duration_sec,
            },
            method,
            ua_w_per_k: self.ua_wk,
            circulation_delta_t_k: self.dt_circ,
            circulation_hours: self.hours_circ,
            circulation_pct: self.circulation_pct,
            purchased_gj: self.purchased_gj,
            price_per_gj: self.price_per_gj,
        };
        input.validate()?;
        Ok(input)
    }
}

/// Resident (building balance) endpoint input.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResidentRequest {
    pub water_m3: f64,
    pub cold_temp_c: f64,
    pub hot_temp_c: f64,
    #[serde(default, rename = "mpecHeatGJ")]
    pub mpec_heat_gj: Option<f64>,
    #[serde(default, rename = "pricePerGJ")]
    pub price_per_gj: Option<f64>,
    #[serde(rename = "residentPaymentsPLN")]
    pub resident_payments_pln: f64,
    #[serde(default)]
    pub circulation_loss_pct: Option<f64>,
    #[serde(default, rename = "UA_WK")]
    pub ua_wk: Option<f64>,
    #[serde(default = "default_circulation_delta_t", rename = "dT_circ")]
    pub dt_circ: f64,
    #[serde(default = "default_circulation_hours", rename = "hours_circ")]
    pub hours_circ: f64,
}

impl ResidentRequest {
    pub fn to_input(&self) -> CalcResult<BuildingBillInput> {
        let input = BuildingBillInput {
            water_m3: self.water_m3,
            cold_temp_c: self.cold_temp_c,
            hot_temp_c: self.hot_temp_c,
            purchased_heat_gj: self.mpec_heat_gj.filter(|gj| !gj.is_nan()),
            price_per_gj: self.price_per_gj,
            resident_payments_pln: self.resident_payments_pln,
            circulation_loss_pct: self.circulation_loss_pct,
            ua_w_per_k: self.ua_wk,
            circulation_delta_t_k: self.dt_circ,
            circulation_hours: self.hours_circ,
        };
        input.validate()?;
        Ok(input)
    }
}

/// Single-resident bill check.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResidentLossRequest {
    pub billed_price_per_m3: f64,
    pub monthly_consumption_m3: f64,
    pub cold_temp_c: f64,
    pub hot_temp_c: f64,
    #[serde(rename = "cityHeatPricePerGJ")]
    pub city_heat_price_per_gj: f64,
}

impl ResidentLossRequest {
    pub fn to_input(&self) -> CalcResult<ResidentBillingRecord> {
        let record = ResidentBillingRecord {
            billed_price_per_m3: self.billed_price_per_m3,
            monthly_consumption_m3: self.monthly_consumption_m3,
            cold_temp_c: self.cold_temp_c,
            hot_temp_c: self.hot_temp_c,
            city_heat_price_per_gj: self.city_heat_price_per_gj,
        };
        record.validate()?;
        Ok(record)
    }
}

/// Standalone modernization formula input. Missing fields are reported by
/// the formula itself.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModernizationRequest {
    #[serde(default)]
    pub current_loss_pct: Option<f64>,
    #[serde(default)]
    pub target_reduction_pct: Option<f64>,
    #[serde(default, rename = "currentAnnualEnergyGJ")]
    pub current_annual_energy_gj: Option<f64>,
}

impl From<&ModernizationRequest> for ModernizationState {
    fn from(r: &ModernizationRequest) -> Self {
        ModernizationState {
            current_loss_pct: r.current_loss_pct,
            target_reduction_pct: r.target_reduction_pct,
            current_annual_energy_gj: r.current_annual_energy_gj,
        }
    }
}

/// Variant economics for a known circulation loss.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariantsRequest {
    #[serde(rename = "circLossGJ")]
    pub circ_loss_gj: f64,
    #[serde(default = "default_price_per_gj", rename = "pricePerGJ")]
    pub price_per_gj: f64,
}

/// Occupancy-based ordered power; per-person defaults come from settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OccupancyPowerRequest {
    #[serde(default)]
    pub label: String,
    pub flats: u32,
    pub persons_per_flat: f64,
    #[serde(default)]
    pub per_person_daily_use_l: Option<f64>,
    #[serde(default)]
    pub operating_hours_per_day: Option<f64>,
    #[serde(default)]
    pub non_uniformity_nh: Option<f64>,
    pub cold_temp_c: f64,
    pub hot_temp_c: f64,
    #[serde(default)]
    pub tank_volume_l: Option<f64>,
    #[serde(default)]
    pub tank_usable_fraction: Option<f64>,
    #[serde(default)]
    pub peak_duration_h: Option<f64>,
}

impl OccupancyPowerRequest {
    pub fn to_input(&self, settings: &Settings) -> CalcResult<OccupancyPowerInput> {
        let tank = match self.tank_volume_l {
            Some(volume_l) => Some(BufferTank {
                volume_l,
                usable_fraction: self.tank_usable_fraction.unwrap_or(1.0),
                peak_duration_h: self
                    .peak_duration_h
                    .ok_or_else(|| CalcError::missing_field("peakDurationH"))?,
            }),
            None => None,
        };
        let input = OccupancyPowerInput {
            label: self.label.clone(),
            flats: self.flats,
            persons_per_flat: self.persons_per_flat,
            per_person_daily_use_l: self.per_person_daily_use_l.unwrap_or(settings.per_person_daily_use_l),
            operating_hours_per_day: self.operating_hours_per_day.unwrap_or(settings.operating_hours_per_day),
            non_uniformity_nh: self.non_uniformity_nh.unwrap_or(settings.non_uniformity_nh),
            cold_temp_c: self.cold_temp_c,
            hot_temp_c: self.hot_temp_c,
            tank,
        };
        input.validate()?;
        Ok(input)
    }
}

/// Building-level ordered power shortcut.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildingPowerRequest {
    pub flats: u32,
    pub persons_per_flat: f64,
    pub peak_use_per_person_l_h: f64,
    pub hot_temp_c: f64,
    pub cold_temp_c: f64,
    #[serde(default)]
    pub circulation_loss_pct: f64,
    #[serde(default)]
    pub safety_margin_pct: Option<f64>,
}

impl BuildingPowerRequest {
    pub fn to_input(&self, settings: &Settings) -> CalcResult<BuildingPowerInput> {
        let input = BuildingPowerInput {
            flats: self.flats,
            persons_per_flat: self.persons_per_flat,
            peak_use_per_person_l_h: self.peak_use_per_person_l_h,
            hot_temp_c: self.hot_temp_c,
            cold_temp_c: self.cold_temp_c,
            circulation_loss_pct: self.circulation_loss_pct,
            safety_margin_pct: self.safety_margin_pct.unwrap_or(settings.safety_margin_pct),
        };
        input.validate()?;
        Ok(input)
    }
}

const SIMULATION_STEP_S: u32 = 60;

fn default_cold_supply_c() -> f64 {
    10.0
}

fn tank_simulation_input(
    tank: TankParams,
    demand_lpm: Option<Vec<f64>>,
    loss_kw: f64,
    cost_kw_month: Option<f64>,
    horizon_years: Option<u32>,
) -> CalcResult<TankSimulationInput> {
    let demand_lpm = match demand_lpm {
        Some(profile) => profile,
        None => default_demand_profile(tank.dt_s)?,
    };
    let defaults = CostParams::default();
    let input = TankSimulationInput {
        tank,
        demand_lpm,
        loss: LossInput::Power { loss_kw },
        cost: CostParams {
            cost_per_kw_month_pln: cost_kw_month,
            horizon_years: horizon_years.unwrap_or(defaults.horizon_years),
            ..defaults
        },
        ..TankSimulationInput::default()
    };
    input.validate()?;
    Ok(input)
}

/// Mixed vs layered tank comparison. The tank starts at the set point.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TankSimulationRequest {
    #[serde(rename = "V_tank_l")]
    pub v_tank_l: f64,
    #[serde(rename = "T_set_C")]
    pub t_set_c: f64,
    #[serde(rename = "T_min_C")]
    pub t_min_c: f64,
    #[serde(default = "default_cold_supply_c", rename = "T_cold_C")]
    pub t_cold_c: f64,
    pub loss_kw: f64,
    #[serde(default)]
    pub cost_kw_month: Option<f64>,
    #[serde(default)]
    pub horizon_years: Option<u32>,
    /// Draw profile at one-minute steps; the reference day when absent
    #[serde(default)]
    pub demand_lpm: Option<Vec<f64>>,
}

impl TankSimulationRequest {
    pub fn to_input(&self) -> CalcResult<TankSimulationInput> {
        tank_simulation_input(
            TankParams {
                volume_l: self.v_tank_l,
                init_temp_c: self.t_set_c,
                set_temp_c: self.t_set_c,
                cold_temp_c: self.t_cold_c,
                min_temp_c: self.t_min_c,
                dt_s: SIMULATION_STEP_S,
            },
            self.demand_lpm.clone(),
            self.loss_kw,
            self.cost_kw_month,
            self.horizon_years,
        )
    }
}

/// Every request the boundary accepts, tagged by `kind`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CalcRequest {
    Auditor(AuditorRequest),
    Resident(ResidentRequest),
    ResidentLoss(ResidentLossRequest),
    Modernization(ModernizationRequest),
    Variants(VariantsRequest),
    OccupancyPower(OccupancyPowerRequest),
    BuildingPower(BuildingPowerRequest),
    TankSimulation(TankSimulationRequest),
}

impl CalcRequest {
    /// Validate the request and convert it to an engine item.
    pub fn to_item(&self, settings: &Settings) -> CalcResult<CalculationItem> {
        let item = match self {
            CalcRequest::Auditor(r) => CalculationItem::Audit(r.to_input(settings)?),
            CalcRequest::Resident(r) => CalculationItem::Balance(r.to_input()?),
            CalcRequest::ResidentLoss(r) => CalculationItem::ResidentLoss(r.to_input()?),
            CalcRequest::Modernization(r) => CalculationItem::Modernization(r.into()),
            CalcRequest::Variants(r) => {
                let input = VariantInput {
                    circulation_loss_gj: require_finite("circLossGJ", r.circ_loss_gj)?,
                    price_per_gj: r.price_per_gj,
                };
                input.validate()?;
                CalculationItem::Variants(input)
            }
            CalcRequest::OccupancyPower(r) => CalculationItem::OccupancyPower(r.to_input(settings)?),
            CalcRequest::BuildingPower(r) => CalculationItem::BuildingPower(r.to_input(settings)?),
            CalcRequest::TankSimulation(r) => CalculationItem::TankSimulation(r.to_input()?),
        };
        Ok(item)
    }
}

/// Run a request end to end.
pub fn handle(request: &CalcRequest, settings: &Settings) -> CalcResult<CalculationOutput> {
    let item = request.to_item(settings)?;
    debug!(calc_type = item.calc_type(), "handling request");
    item.run(settings)
}

/// Response envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<CalculationOutput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<CalcError>,
}

/// Run a request and wrap the outcome.
pub fn respond(request: &CalcRequest, settings: &Settings) -> ApiResponse {
    match handle(request, settings) {
        Ok(result) => ApiResponse {
            ok: true,
            result: Some(result),
            error: None,
        },
        Err(error) => ApiResponse {
            ok: false,
            result: None,
            error: Some(error),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calculations::building::PurchasedHeatSource;
    use crate::calculations::circulation::CirculationModel;

    fn parse(json: &str) -> CalcRequest {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_auditor_defaults() {
        let request = parse(
            r#"{"kind":"auditor","flats":64,"risers":4,"coldTempC":10,"hotTempC":55,
                "drawPeakLpm":240,"circulationPct":30,"purchasedGJ":1000}"#,
        );
        let CalcRequest::Auditor(r) = &request else {
            panic!("expected auditor request");
        };
        assert_eq!(r.simult_profile, SimultaneityProfile::Med);
        assert_eq!(r.peak_duration_sec, 300.0);
        assert_eq!(r.dt_circ, 20.0);
        assert_eq!(r.hours_circ, 8760.0);
        assert_eq!(r.price_per_gj, 60.0);
        assert_eq!(r.method, AuditMethod::Normative);

        match handle(&request, &Settings::default()).unwrap() {
            CalculationOutput::Audit(a) => {
                assert_eq!(a.circulation_loss_gj, 300.0);
                assert!(matches!(a.circulation_model, CirculationModel::Percentage { .. }));
            }
            other => panic!("unexpected output {other:?}"),
        }
    }

    #[test]
    fn test_auditor_estimates_missing_peak_draw() {
        let request = parse(r#"{"kind":"auditor","flats":40,"risers":2,"coldTempC":10,"hotTempC":55}"#);
        let item = request.to_item(&Settings::default()).unwrap();
        let CalculationItem::Audit(input) = item else {
            panic!("expected audit item");
        };
        assert_eq!(input.power.draw_peak_lpm, 160.0);
    }

    #[test]
    fn test_auditor_cost_method_requires_rates() {
        let request = parse(
            r#"{"kind":"auditor","flats":64,"risers":4,"coldTempC":10,"hotTempC":55,
                "drawPeakLpm":240,"method":"cost_optimization","costPowerRatePLNkW":150}"#,
        );
        let err = handle(&request, &Settings::default()).unwrap_err();
        assert_eq!(err, CalcError::missing_field("penaltyRatePLNkW"));
    }

    #[test]
    fn test_auditor_peak_margin_from_settings() {
        let request = parse(
            r#"{"kind":"auditor","flats":64,"risers":4,"coldTempC":10,"hotTempC":55,
                "drawPeakLpm":240,"method":"peak_demand"}"#,
        );
        let CalculationItem::Audit(input) = request.to_item(&Settings::default()).unwrap() else {
            panic!("expected audit item");
        };
        assert!(matches!(input.method, PowerMethod::PeakDemand { margin_pct } if margin_pct == 10.0));
    }

    #[test]
    fn test_resident_request() {
        let request = parse(
            r#"{"kind":"resident","waterM3":1000,"coldTempC":10,"hotTempC":55,
                "mpecHeatGJ":null,"pricePerGJ":80,"residentPaymentsPLN":35000,"circulationLossPct":25}"#,
        );
        match handle(&request, &Settings::default()).unwrap() {
            CalculationOutput::Balance(b) => {
                assert_eq!(b.purchased_source, PurchasedHeatSource::FromPayments);
                assert_eq!(b.purchased_gj, 437.5);
            }
            other => panic!("unexpected output {other:?}"),
        }
    }

    #[test]
    fn test_resident_request_rejects_cold_hot_water() {
        let request = parse(
            r#"{"kind":"resident","waterM3":10,"coldTempC":50,"hotTempC":45,"residentPaymentsPLN":0}"#,
        );
        let response = respond(&request, &Settings::default());
        assert!(!response.ok);
        assert_eq!(response.error.unwrap().error_code(), "PHYSICAL_CONSTRAINT");
    }

    #[test]
    fn test_modernization_missing_field() {
        let request = parse(r#"{"kind":"modernization","currentLossPct":74,"targetReductionPct":50}"#);
        let err = handle(&request, &Settings::default()).unwrap_err();
        assert_eq!(err, CalcError::missing_field("current_annual_energy_gj"));
    }

    #[test]
    fn test_occupancy_defaults_from_settings() {
        let request = parse(
            r#"{"kind":"occupancy_power","flats":88,"personsPerFlat":1.5,"coldTempC":10,"hotTempC":55}"#,
        );
        let settings = Settings {
            non_uniformity_nh: 3.0,
            ..Settings::default()
        };
        let CalculationItem::OccupancyPower(input) = request.to_item(&settings).unwrap() else {
            panic!("expected occupancy item");
        };
        assert_eq!(input.non_uniformity_nh, 3.0);
        assert_eq!(input.per_person_daily_use_l, 110.0);
        assert!(input.tank.is_none());
    }

    #[test]
    fn test_tank_without_duration_rejected() {
        let request = parse(
            r#"{"kind":"occupancy_power","flats":88,"personsPerFlat":1.5,"coldTempC":10,"hotTempC":55,
                "tankVolumeL":1000}"#,
        );
        let err = request.to_item(&Settings::default()).unwrap_err();
        assert_eq!(err.error_code(), "MISSING_FIELD");
    }

    #[test]
    fn test_front_end_method_ids() {
        for (id, method) in [
            ("PN_EN_806_3", AuditMethod::Normative),
            ("PN_92_B_01706", AuditMethod::Normative),
            ("bilans_energetyczny", AuditMethod::Normative),
            ("moc_czas_rozbioru", AuditMethod::Normative),
            ("krzywa_mocy_sezonowa", AuditMethod::Normative),
            ("peak_demand_pomiary", AuditMethod::PeakDemand),
            ("kosztowa", AuditMethod::CostOptimization),
            ("symulacja_programowa", AuditMethod::TimeSimulation),
            ("time_simulation", AuditMethod::TimeSimulation),
        ] {
            let parsed: AuditMethod = serde_json::from_str(&format!("\"{id}\"")).unwrap();
            assert_eq!(parsed, method, "{id}");
        }
        assert!(serde_json::from_str::<AuditMethod>("\"unknown\"").is_err());
    }

    #[test]
    fn test_auditor_simulation_method() {
        let request = parse(
            r#"{"kind":"auditor","flats":64,"risers":4,"coldTempC":10,"hotTempC":55,
                "drawPeakLpm":240,"method":"symulacja_programowa","tankVolumeL":200,"tMinC":45,
                "lossKW":0,"demandLpm":[10,10,10,10]}"#,
        );
        let CalculationItem::Audit(input) = request.to_item(&Settings::default()).unwrap() else {
            panic!("expected audit item");
        };
        let PowerMethod::TimeSimulation(sim) = &input.method else {
            panic!("expected time simulation");
        };
        assert_eq!(sim.tank.set_temp_c, 55.0);
        assert_eq!(sim.tank.cold_temp_c, 10.0);
        assert_eq!(sim.demand_lpm.len(), 4);

        let missing = parse(
            r#"{"kind":"auditor","flats":64,"risers":4,"coldTempC":10,"hotTempC":55,
                "drawPeakLpm":240,"method":"symulacja_programowa","tMinC":45,"lossKW":1}"#,
        );
        assert_eq!(
            missing.to_item(&Settings::default()).unwrap_err(),
            CalcError::missing_field("tankVolumeL")
        );
    }

    #[test]
    fn test_tank_simulation_request() {
        let request = parse(
            r#"{"kind":"tank_simulation","V_tank_l":1000,"T_set_C":55,"T_min_C":45,"loss_kw":1,
                "cost_kw_month":40,"horizon_years":5}"#,
        );
        let CalculationItem::TankSimulation(input) = request.to_item(&Settings::default()).unwrap() else {
            panic!("expected tank simulation item");
        };
        assert_eq!(input.demand_lpm.len(), 1440);
        assert_eq!(input.tank.cold_temp_c, 10.0);
        assert_eq!(input.tank.init_temp_c, 55.0);
        assert_eq!(input.cost.horizon_years, 5);

        match handle(&request, &Settings::default()).unwrap() {
            CalculationOutput::TankSimulation(r) => {
                assert!(r.layered.ordered_power_kw <= r.mixed.ordered_power_kw);
                assert!(r.financial.extra_cost_year_pln >= 0.0);
                assert_eq!(r.financial.horizon_years, Some(5));
            }
            other => panic!("unexpected output {other:?}"),
        }
    }

    #[test]
    fn test_tank_simulation_request_validation() {
        let request = parse(r#"{"kind":"tank_simulation","V_tank_l":0,"T_set_C":55,"T_min_C":45,"loss_kw":1}"#);
        let response = respond(&request, &Settings::default());
        assert!(!response.ok);
        assert_eq!(response.error.unwrap().error_code(), "INVALID_INPUT");
    }

    #[test]
    fn test_envelope_shape() {
        let request = parse(r#"{"kind":"variants","circLossGJ":100}"#);
        let response = respond(&request, &Settings::default());
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["ok"], true);
        assert_eq!(json["result"]["type"], "Variants");
        assert!(json.get("error").is_none());
    }
}
