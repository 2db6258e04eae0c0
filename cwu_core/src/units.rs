//! # Unit Types
//!
//! Type-safe wrappers for the units used in hot-water accounting, plus the
//! physical constants the calculators share.
//!
//! We use simple newtype wrappers rather than a full units library because:
//! - The domain uses a small, fixed set of units (°C, K, J, GJ, kWh, kW, m³, L)
//! - JSON serialization stays clean (just numbers)
//! - Minimal runtime overhead
//!
//! ## Energy
//!
//! District heat is billed in gigajoules (GJ). Power sizing works in kW and
//! kWh. 1 kWh = 3.6 MJ, so 1 GJ ≈ 277.78 kWh.
//!
//! ## Example
//!
//! ```rust
//! use cwu_core::units::{GigaJoules, KilowattHours, Liters, CubicMeters};
//!
//! let energy = KilowattHours(277.777_777_777_777_8);
//! let gj: GigaJoules = energy.into();
//! assert!((gj.0 - 1.0).abs() < 1e-9);
//!
//! let tank: CubicMeters = Liters(1000.0).into();
//! assert_eq!(tank.0, 1.0);
//! ```

use serde::{Deserialize, Serialize};
use std::ops::{Add, Div, Mul, Sub};

// ============================================================================
// Physical Constants
// ============================================================================

/// Specific heat of water used for billing-side energy, kJ/(kg·K)
pub const WATER_SPECIFIC_HEAT_KJ_PER_KG_K: f64 = 4.186;

/// Specific heat of water used in ordered-power sizing, kJ/(kg·K)
pub const WATER_SPECIFIC_HEAT_SIZING_KJ_PER_KG_K: f64 = 4.19;

/// Energy to heat one m³ of water by one kelvin, GJ/(m³·K)
///
/// 1000 kg × 4.186 kJ/(kg·K) = 4186 kJ = 0.004186 GJ
pub const WATER_HEAT_GJ_PER_M3_K: f64 = 0.004186;

/// Energy to heat one m³ of water by one kelvin, kWh/(m³·K)
pub const WATER_HEAT_KWH_PER_M3_K: f64 = 1.163;

/// Volumetric heat used by the building-level ordered-power shortcut, kWh/(m³·K)
pub const WATER_HEAT_SHORTCUT_KWH_PER_M3_K: f64 = 1.16;

/// Density of water, kg/m³
pub const WATER_DENSITY_KG_PER_M3: f64 = 1000.0;

/// Density of water, kg/L
pub const WATER_DENSITY_KG_PER_L: f64 = 1.0;

/// Seconds in one hour
pub const SECONDS_PER_HOUR: f64 = 3600.0;

/// Joules in one gigajoule
pub const JOULES_PER_GJ: f64 = 1e9;

/// kJ in one gigajoule
pub const KJ_PER_GJ: f64 = 1e6;

/// Hours in a (non-leap) year
pub const HOURS_PER_YEAR: f64 = 8760.0;

/// Months in a year, for scaling monthly bills
pub const MONTHS_PER_YEAR: f64 = 12.0;

// ============================================================================
// Temperature
// ============================================================================

/// Temperature in degrees Celsius
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Celsius(pub f64);

/// Temperature difference in kelvin (numerically equal to a °C difference)
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Kelvin(pub f64);

impl Sub for Celsius {
    type Output = Kelvin;
    fn sub(self, rhs: Self) -> Kelvin {
        Kelvin(self.0 - rhs.0)
    }
}

// ============================================================================
// Energy Units
// ============================================================================

/// Energy in joules
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Joules(pub f64);

/// Energy in kilojoules
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KiloJoules(pub f64);

/// Energy in gigajoules (district-heat billing unit)
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GigaJoules(pub f64);

/// Energy in kilowatt-hours
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KilowattHours(pub f64);

impl From<Joules> for GigaJoules {
    fn from(j: Joules) -> Self {
        GigaJoules(j.0 / JOULES_PER_GJ)
    }
}

impl From<GigaJoules> for Joules {
    fn from(gj: GigaJoules) -> Self {
        Joules(gj.0 * JOULES_PER_GJ)
    }
}

impl From<KiloJoules> for GigaJoules {
    fn from(kj: KiloJoules) -> Self {
        GigaJoules(kj.0 / KJ_PER_GJ)
    }
}

impl From<KiloJoules> for KilowattHours {
    fn from(kj: KiloJoules) -> Self {
        KilowattHours(kj.0 / SECONDS_PER_HOUR)
    }
}

impl From<KilowattHours> for GigaJoules {
    fn from(kwh: KilowattHours) -> Self {
        GigaJoules(kwh.0 * SECONDS_PER_HOUR * 1000.0 / JOULES_PER_GJ)
    }
}

impl From<GigaJoules> for KilowattHours {
    fn from(gj: GigaJoules) -> Self {
        KilowattHours(gj.0 * JOULES_PER_GJ / (SECONDS_PER_HOUR * 1000.0))
    }
}

impl From<Joules> for KilowattHours {
    fn from(j: Joules) -> Self {
        KilowattHours(j.0 / (SECONDS_PER_HOUR * 1000.0))
    }
}

/// Convert watt-hours to gigajoules (W·h → J via ×3600, J → GJ via /1e9).
#[inline]
pub fn watt_hours_to_gj(wh: f64) -> f64 {
    wh * SECONDS_PER_HOUR / JOULES_PER_GJ
}

// ============================================================================
// Power
// ============================================================================

/// Power in kilowatts
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Kilowatts(pub f64);

/// Power in watts
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Watts(pub f64);

impl From<Watts> for Kilowatts {
    fn from(w: Watts) -> Self {
        Kilowatts(w.0 / 1000.0)
    }
}

impl From<Kilowatts> for Watts {
    fn from(kw: Kilowatts) -> Self {
        Watts(kw.0 * 1000.0)
    }
}

// ============================================================================
// Volume
// ============================================================================

/// Volume in liters (dm³)
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Liters(pub f64);

/// Volume in cubic meters
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CubicMeters(pub f64);

impl From<Liters> for CubicMeters {
    fn from(l: Liters) -> Self {
        CubicMeters(l.0 / 1000.0)
    }
}

impl From<CubicMeters> for Liters {
    fn from(m3: CubicMeters) -> Self {
        Liters(m3.0 * 1000.0)
    }
}

// ============================================================================
// Rounding
// ============================================================================

/// Round to a fixed number of decimal places.
///
/// Rounds the exact binary value of `value`, so `1.005` (stored as
/// 1.00499999…) becomes `1.0` at two decimals. Billing outputs are compared
/// against statements produced this way.
///
/// ```rust
/// use cwu_core::units::round_to;
///
/// assert_eq!(round_to(16.158_918, 2), 16.16);
/// assert_eq!(round_to(0.196_742, 4), 0.1967);
/// ```
pub fn round_to(value: f64, decimals: u32) -> f64 {
    if !value.is_finite() {
        return value;
    }
    format!("{:.*}", decimals as usize, value)
        .parse()
        .unwrap_or(value)
}

// ============================================================================
// Arithmetic Implementations
// ============================================================================

macro_rules! impl_arithmetic {
    ($type:ty) => {
        impl Add for $type {
            type Output = Self;
            fn add(self, rhs: Self) -> Self::Output {
                Self(self.0 + rhs.0)
            }
        }

        impl Sub for $type {
            type Output = Self;
            fn sub(self, rhs: Self) -> Self::Output {
                Self(self.0 - rhs.0)
            }
        }

        impl Mul<f64> for $type {
            type Output = Self;
            fn mul(self, rhs: f64) -> Self::Output {
                Self(self.0 * rhs)
            }
        }

        impl Div<f64> for $type {
            type Output = Self;
            fn div(self, rhs: f64) -> Self::Output {
                Self(self.0 / rhs)
            }
        }

        impl $type {
            /// Get the raw f64 value
            pub fn value(self) -> f64 {
                self.0
            }

            /// Create from raw f64 value
            pub fn new(value: f64) -> Self {
                Self(value)
            }
        }
    };
}

impl_arithmetic!(Kelvin);
impl_arithmetic!(Joules);
impl_arithmetic!(KiloJoules);
impl_arithmetic!(GigaJoules);
impl_arithmetic!(KilowattHours);
impl_arithmetic!(Kilowatts);
impl_arithmetic!(Watts);
impl_arithmetic!(Liters);
impl_arithmetic!(CubicMeters);
