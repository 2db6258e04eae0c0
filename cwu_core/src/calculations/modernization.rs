//! # Circulation Modernization
//!
//! Two related calculations:
//!
//! 1. **Degradation correction**: how annual energy use changes when the
//!    circulation loss share drops from `x` % to `x_po` %:
//!
//!    ```text
//!    x_po = x × (1 − r/100)
//!    E_po = E × (1 + x_po/100) / (1 + x/100)
//!    ```
//!
//!    This function validates its own inputs. `NaN`, infinities and missing
//!    values are rejected rather than propagated.
//!
//! 2. **Investment variants**: for a catalogue of upgrade tiers (minimum,
//!    optimal, maximum), annual savings, simple payback and a 10-year net
//!    value.
//!
//! ## Example
//!
//! ```rust
//! use cwu_core::calculations::modernization::modernized_loss_and_energy;
//!
//! let r = modernized_loss_and_energy(74.0, 50.0, 600.0).unwrap();
//! assert!((r.post_loss_pct - 37.0).abs() < 1e-9);
//! assert!((r.post_annual_energy_gj - 472.41).abs() < 0.01);
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::equations::losses::{modernized_annual_energy, modernized_loss_pct};
use crate::errors::{
    require_non_negative, require_percentage, require_present, CalcError, CalcResult, CalcWarning,
};
use crate::units::round_to;

/// Years used for the simple net value
const NPV_HORIZON_YEARS: f64 = 10.0;

// ============================================================================
// Degradation correction
// ============================================================================

/// Loss share and energy before modernization.
///
/// Fields are optional so that a request with a missing value deserializes
/// and is then rejected with `MissingField` instead of a parse error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModernizationState {
    /// Current circulation loss, % (the `x` of the correction)
    pub current_loss_pct: Option<f64>,
    /// Relative reduction achieved by the upgrade, 0–100 %
    pub target_reduction_pct: Option<f64>,
    /// Current annual energy use, GJ
    pub current_annual_energy_gj: Option<f64>,
}

impl ModernizationState {
    /// Validate and evaluate the correction.
    pub fn calculate(&self) -> CalcResult<ModernizedState> {
        modernized_loss_and_energy(
            require_present("current_loss_pct", self.current_loss_pct)?,
            require_present("target_reduction_pct", self.target_reduction_pct)?,
            require_present("current_annual_energy_gj", self.current_annual_energy_gj)?,
        )
    }
}

/// Loss share and energy after modernization.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModernizedState {
    pub post_loss_pct: f64,
    pub post_annual_energy_gj: f64,
}

/// Apply the degradation correction.
///
/// # Arguments
///
/// * `current_loss_pct` - Current loss share, % (≥ 0)
/// * `target_reduction_pct` - Relative reduction of that share, 0–100 %
/// * `current_annual_energy_gj` - Current annual energy use, GJ (≥ 0)
pub fn modernized_loss_and_energy(
    current_loss_pct: f64,
    target_reduction_pct: f64,
    current_annual_energy_gj: f64,
) -> CalcResult<ModernizedState> {
    require_non_negative("current_loss_pct", current_loss_pct)?;
    require_percentage("target_reduction_pct", target_reduction_pct)?;
    require_non_negative("current_annual_energy_gj", current_annual_energy_gj)?;

    let post_loss_pct = modernized_loss_pct(current_loss_pct, target_reduction_pct);
    let post_annual_energy_gj =
        modernized_annual_energy(current_annual_energy_gj, current_loss_pct, post_loss_pct);

    debug!(
        current_loss_pct,
        target_reduction_pct,
        post_loss_pct,
        post_annual_energy_gj,
        "modernization correction"
    );
    Ok(ModernizedState {
        post_loss_pct,
        post_annual_energy_gj,
    })
}

// ============================================================================
// Investment variants
// ============================================================================

/// Upgrade tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariantLabel {
    Minimum,
    Optimal,
    Maximum,
}

impl fmt::Display for VariantLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            VariantLabel::Minimum => "minimum",
            VariantLabel::Optimal => "optimal",
            VariantLabel::Maximum => "maximum",
        };
        f.write_str(s)
    }
}

/// One entry of the variant catalogue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModernizationTier {
    pub label: VariantLabel,
    /// Share of the circulation loss removed, %
    pub reduction_pct: f64,
    /// Investment cost, PLN
    pub capex_pln: f64,
    #[serde(default)]
    pub description: String,
}

impl ModernizationTier {
    /// Validate the tier.
    pub fn validate(&self) -> CalcResult<()> {
        require_percentage("reduction_pct", self.reduction_pct)?;
        require_non_negative("capex_pln", self.capex_pln)?;
        Ok(())
    }
}

/// The built-in catalogue: basic insulation, mid-range rework and full
/// replacement.
pub fn default_tiers() -> Vec<ModernizationTier> {
    vec![
        ModernizationTier {
            label: VariantLabel::Minimum,
            reduction_pct: 15.0,
            capex_pln: 30_000.0,
            description: "Basic insulation, valve replacement".to_string(),
        },
        ModernizationTier {
            label: VariantLabel::Optimal,
            reduction_pct: 30.0,
            capex_pln: 80_000.0,
            description: "New pipework, controlled pumps, premium insulation".to_string(),
        },
        ModernizationTier {
            label: VariantLabel::Maximum,
            reduction_pct: 45.0,
            capex_pln: 150_000.0,
            description: "Full replacement, smart control, route optimization".to_string(),
        },
    ]
}

/// Simple payback period.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Payback {
    /// Years until savings cover the investment (1 decimal)
    Years(f64),
    /// Savings are zero or negative
    Never,
}

impl Payback {
    pub fn years(&self) -> Option<f64> {
        match self {
            Payback::Years(y) => Some(*y),
            Payback::Never => None,
        }
    }
}

/// Economics of one tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModernizationVariant {
    pub label: VariantLabel,
    pub description: String,
    pub reduction_pct: f64,
    pub investment_cost_pln: f64,
    /// Heat saved per year, GJ (3 decimals)
    pub annual_savings_gj: f64,
    /// Money saved per year, PLN (whole złoty)
    pub annual_savings_pln: f64,
    pub payback: Payback,
    /// 10 × annual savings − investment, PLN (whole złoty)
    pub npv_10_years_pln: f64,
    /// Annual savings / investment, % (1 decimal); `None` for a free tier
    pub roi_pct: Option<f64>,
}

/// Inputs for variant generation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VariantInput {
    /// Current annual circulation loss, GJ
    pub circulation_loss_gj: f64,
    /// Heat price, PLN/GJ
    pub price_per_gj: f64,
}

impl VariantInput {
    /// Validate input parameters.
    pub fn validate(&self) -> CalcResult<()> {
        require_non_negative("circulation_loss_gj", self.circulation_loss_gj)?;
        require_non_negative("price_per_gj", self.price_per_gj)?;
        Ok(())
    }
}

/// Variants in catalogue order, plus any warnings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantSet {
    pub variants: Vec<ModernizationVariant>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<CalcWarning>,
}

impl VariantSet {
    /// Mean annual savings over all variants, PLN.
    pub fn mean_savings_pln(&self) -> f64 {
        if self.variants.is_empty() {
            return 0.0;
        }
        let total: f64 = self.variants.iter().map(|v| v.annual_savings_pln).sum();
        total / self.variants.len() as f64
    }

    pub fn get(&self, label: VariantLabel) -> Option<&ModernizationVariant> {
        self.variants.iter().find(|v| v.label == label)
    }
}

/// Evaluate every tier of the catalogue.
///
/// # Example
///
/// ```rust
/// use cwu_core::calculations::modernization::{default_tiers, generate_variants, VariantInput};
///
/// let input = VariantInput { circulation_loss_gj: 200.0, price_per_gj: 60.0 };
/// let set = generate_variants(&input, &default_tiers()).unwrap();
/// assert_eq!(set.variants.len(), 3);
/// assert_eq!(set.variants[0].annual_savings_pln, 1800.0);
/// ```
pub fn generate_variants(input: &VariantInput, tiers: &[ModernizationTier]) -> CalcResult<VariantSet> {
    input.validate()?;
    if tiers.is_empty() {
        return Err(CalcError::invalid_input(
            "modernization_tiers",
            "[]",
            "At least one modernization tier is required",
        ));
    }

    let mut warnings = Vec::new();
    let mut variants = Vec::with_capacity(tiers.len());
    for tier in tiers {
        tier.validate()?;

        let savings_gj = input.circulation_loss_gj * tier.reduction_pct / 100.0;
        let savings_pln = savings_gj * input.price_per_gj;
        let payback = if savings_pln > 0.0 {
            Payback::Years(round_to(tier.capex_pln / savings_pln, 1))
        } else {
            warn!(label = %tier.label, "modernization tier never pays back");
            warnings.push(CalcWarning::NoPayback {
                label: tier.label.to_string(),
            });
            Payback::Never
        };
        let savings_pln_whole = round_to(savings_pln, 0);
        // ROI is quoted against the savings as reported, in whole PLN
        let roi_pct = (tier.capex_pln > 0.0).then(|| round_to(savings_pln_whole / tier.capex_pln * 100.0, 1));

        variants.push(ModernizationVariant {
            label: tier.label,
            description: tier.description.clone(),
            reduction_pct: tier.reduction_pct,
            investment_cost_pln: tier.capex_pln,
            annual_savings_gj: round_to(savings_gj, 3),
            annual_savings_pln: savings_pln_whole,
            payback,
            npv_10_years_pln: round_to(savings_pln * NPV_HORIZON_YEARS - tier.capex_pln, 0),
            roi_pct,
        });
    }

    debug!(
        circulation_loss_gj = input.circulation_loss_gj,
        price_per_gj = input.price_per_gj,
        count = variants.len(),
        "modernization variants"
    );
    Ok(VariantSet { variants, warnings })
}
