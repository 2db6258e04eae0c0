//! # Engine Settings
//!
//! Tunables shared by the calculators. Every key is optional in the TOML
//! file; missing keys keep their defaults.
//!
//! ```toml
//! per_person_daily_use_l = 110.0
//! operating_hours_per_day = 18.0
//! non_uniformity_nh = 2.5
//! safety_margin_pct = 15.0
//! co2_kg_per_gj = 200.0
//!
//! [power_rounding]
//! mode = "CeilToStep"
//! step_kw = 5.0
//!
//! [[modernization_tiers]]
//! label = "minimum"
//! reduction_pct = 15.0
//! capex_pln = 30000.0
//! ```
//!
//! ## Example
//!
//! ```rust
//! use cwu_core::settings::Settings;
//!
//! let settings = Settings::from_toml_str("non_uniformity_nh = 3.0").unwrap();
//! assert_eq!(settings.non_uniformity_nh, 3.0);
//! assert_eq!(settings.operating_hours_per_day, 18.0);
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::calculations::modernization::{default_tiers, ModernizationTier};
use crate::calculations::ordered_power::PowerRounding;
use crate::errors::{require_non_negative, require_positive, CalcError, CalcResult};

/// Engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Hot water per person per day, L (occupancy form default)
    pub per_person_daily_use_l: f64,

    /// Hours per day hot water is drawn (occupancy form default)
    pub operating_hours_per_day: f64,

    /// Peak-to-average flow ratio Nh (occupancy form default)
    pub non_uniformity_nh: f64,

    /// Rounding of the recommended ordered power
    pub power_rounding: PowerRounding,

    /// Safety margin on the building shortcut, %
    pub safety_margin_pct: f64,

    /// Margin for the peak-demand method when a request omits it, %
    pub peak_margin_pct: f64,

    /// Variant catalogue for modernization economics
    pub modernization_tiers: Vec<ModernizationTier>,

    /// CO₂ attributed to one GJ of district heat, kg
    pub co2_kg_per_gj: f64,

    /// Purchased heat assumed for audit ratios when none is supplied, GJ
    pub fallback_purchased_gj: f64,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            per_person_daily_use_l: 110.0,
            operating_hours_per_day: 18.0,
            non_uniformity_nh: 2.5,
            power_rounding: PowerRounding::default(),
            safety_margin_pct: 15.0,
            peak_margin_pct: 10.0,
            modernization_tiers: default_tiers(),
            co2_kg_per_gj: 200.0,
            fallback_purchased_gj: 500.0,
        }
    }
}

impl Settings {
    /// Parse settings from TOML text.
    pub fn from_toml_str(text: &str) -> CalcResult<Self> {
        let settings: Settings =
            toml::from_str(text).map_err(|e| CalcError::config_error("<inline>", e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> CalcResult<Self> {
        let path = path.as_ref();
        let shown = path.display().to_string();
        let text = std::fs::read_to_string(path).map_err(|e| CalcError::config_error(&shown, e.to_string()))?;
        let settings: Settings = toml::from_str(&text).map_err(|e| CalcError::config_error(&shown, e.to_string()))?;
        settings
            .validate()
            .map_err(|e| CalcError::config_error(&shown, e.to_string()))?;
        debug!(path = %shown, "settings loaded");
        Ok(settings)
    }

    /// Check every tunable is usable.
    pub fn validate(&self) -> CalcResult<()> {
        require_positive("per_person_daily_use_l", self.per_person_daily_use_l)?;
        require_positive("operating_hours_per_day", self.operating_hours_per_day)?;
        require_positive("non_uniformity_nh", self.non_uniformity_nh)?;
        if self.non_uniformity_nh < 1.0 {
            return Err(CalcError::invalid_input(
                "non_uniformity_nh",
                self.non_uniformity_nh.to_string(),
                "Non-uniformity coefficient must be at least 1",
            ));
        }
        self.power_rounding.validate()?;
        require_non_negative("safety_margin_pct", self.safety_margin_pct)?;
        require_non_negative("peak_margin_pct", self.peak_margin_pct)?;
        require_non_negative("co2_kg_per_gj", self.co2_kg_per_gj)?;
        require_positive("fallback_purchased_gj", self.fallback_purchased_gj)?;
        if self.modernization_tiers.is_empty() {
            return Err(CalcError::invalid_input(
                "modernization_tiers",
                "[]",
                "At least one modernization tier is required",
            ));
        }
        for tier in &self.modernization_tiers {
            tier.validate()?;
        }
        Ok(())
    }
}
