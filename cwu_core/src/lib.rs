//! # cwu_core - Domestic Hot Water Calculation Engine
//!
//! `cwu_core` computes the energy, cost and ordered thermal power of a
//! building's domestic hot water (CWU) system. All inputs and outputs are
//! JSON-serializable, so a web handler or the bundled CLI can sit directly
//! on top of it.
//!
//! ## Design Philosophy
//!
//! - **Stateless**: Pure functions that take input and return results
//! - **JSON-First**: All types implement Serialize/Deserialize
//! - **Rich Errors**: Structured error types, not just strings
//! - **Warnings, not silence**: documented fallbacks are reported in the result
//!
//! ## Quick Start
//!
//! ```rust
//! use cwu_core::calculations::resident_loss::{compute_resident_loss, ResidentBillingRecord};
//!
//! let record = ResidentBillingRecord {
//!     billed_price_per_m3: 65.0,
//!     monthly_consumption_m3: 3.5,
//!     cold_temp_c: 8.0,
//!     hot_temp_c: 55.0,
//!     city_heat_price_per_gj: 82.13,
//! };
//! let result = compute_resident_loss(&record).unwrap();
//! assert_eq!(result.theoretical_cost_per_m3, 16.16);
//! ```
//!
//! ## Modules
//!
//! - [`calculations`] - Ordered power, circulation loss, resident loss, modernization, building balance
//! - [`equations`] - Raw thermal formulas used by the calculators
//! - [`api`] - JSON request shapes and the response envelope
//! - [`report`] - Audit report container
//! - [`pdf`] - PDF rendering via Typst
//! - [`settings`] - Engine tunables loaded from TOML
//! - [`units`] - Type-safe unit wrappers and physical constants
//! - [`errors`] - Structured error and warning types

pub mod api;
pub mod calculations;
pub mod equations;
pub mod errors;
pub mod pdf;
pub mod report;
pub mod settings;
pub mod units;

// Re-export commonly used types at crate root for convenience
pub use api::{handle, respond, ApiResponse, CalcRequest};
pub use errors::{CalcError, CalcResult, CalcWarning};
pub use report::AuditReport;
pub use settings::Settings;
