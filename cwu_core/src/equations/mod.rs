//! # Hot-Water Equations
//!
//! The raw formulas used by the calculators, kept in one place so each can be
//! checked against its source independently of input handling.
//!
//! ## Modules
//!
//! - [`thermal`] - Water heating energy, mass flow, power, tank storage
//! - [`losses`] - Circulation loss and the normative modernization correction
//!
//! ## Conventions
//!
//! - Temperatures in °C, temperature differences in K
//! - Flows in m³/h unless the name says otherwise (`_lpm`, `_lps`)
//! - Percentages enter as 0–100 and are turned into fractions here
//!
//! ## References
//!
//! - PN-EN 15316-3-2: Space heating and DHW systems, distribution
//! - PN-92/B-01706: Water supply installations in buildings, requirements

pub mod losses;
pub mod thermal;

pub use losses::{
    modernized_annual_energy, modernized_loss_pct, percentage_loss_gj, ua_loss_gj,
};
pub use thermal::{
    mass_flow_kg_per_s, peak_draw_lpm, power_from_flow_kw, simultaneity_factor,
    tank_stored_energy_kwh, water_heating_energy, HeatingEnergy,
};
