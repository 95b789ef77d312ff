//! Unit newtypes for the quantities that cross the study API.
//!
//! Specified power is entered in MW/Mvar and converted to per-unit on the
//! system MVA base before it reaches the solver. Angles are always radians
//! inside the numerics; [`Degrees`] exists for presentation only.
//!
//! All types are `#[repr(transparent)]` over `f64` and serialize as plain
//! numbers.
//!
//! ```
//! use faultflow_core::units::{Degrees, Megawatts, MegavoltAmperes};
//!
//! let p = Megawatts(110.0);
//! assert!((p.to_per_unit(MegavoltAmperes(100.0)) - 1.1).abs() < 1e-12);
//!
//! let angle = Degrees(90.0).to_radians();
//! assert!((angle.sin() - 1.0).abs() < 1e-12);
//! ```

use serde::{Deserialize, Serialize};
use std::ops::{Add, Div, Mul, Neg, Sub};

macro_rules! impl_unit_ops {
    ($type:ty, $unit_name:literal) => {
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

        impl Neg for $type {
            type Output = Self;
            fn neg(self) -> Self::Output {
                Self(-self.0)
            }
        }

        impl Mul<f64> for $type {
            type Output = Self;
            fn mul(self, rhs: f64) -> Self::Output {
                Self(self.0 * rhs)
            }
        }

        impl Div<$type> for $type {
            type Output = f64;
            fn div(self, rhs: $type) -> Self::Output {
                self.0 / rhs.0
            }
        }

        impl std::fmt::Display for $type {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{:.4} {}", self.0, $unit_name)
            }
        }

        impl $type {
            #[inline]
            pub const fn new(value: f64) -> Self {
                Self(value)
            }

            /// Raw numeric value
            #[inline]
            pub const fn value(self) -> f64 {
                self.0
            }

            #[inline]
            pub fn is_finite(self) -> bool {
                self.0.is_finite()
            }
        }

        impl std::iter::Sum for $type {
            fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
                Self(iter.map(|x| x.0).sum())
            }
        }
    };
}

// =============================================================================
// Power
// =============================================================================

/// Active power in megawatts (MW)
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[repr(transparent)]
pub struct Megawatts(pub f64);

impl_unit_ops!(Megawatts, "MW");

/// Reactive power in megavolt-amperes reactive (Mvar)
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[repr(transparent)]
pub struct Megavars(pub f64);

impl_unit_ops!(Megavars, "Mvar");

/// Apparent power in megavolt-amperes (MVA). Used for the system base and
/// machine ratings.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[repr(transparent)]
pub struct MegavoltAmperes(pub f64);

impl_unit_ops!(MegavoltAmperes, "MVA");

impl Megawatts {
    /// Per-unit value on the given system base.
    #[inline]
    pub fn to_per_unit(self, base: MegavoltAmperes) -> f64 {
        self.0 / base.0
    }

    #[inline]
    pub fn from_per_unit(pu: f64, base: MegavoltAmperes) -> Self {
        Self(pu * base.0)
    }
}

impl Megavars {
    /// Per-unit value on the given system base.
    #[inline]
    pub fn to_per_unit(self, base: MegavoltAmperes) -> f64 {
        self.0 / base.0
    }

    #[inline]
    pub fn from_per_unit(pu: f64, base: MegavoltAmperes) -> Self {
        Self(pu * base.0)
    }
}

impl MegavoltAmperes {
    /// Base line current for a three-phase system: `I = S / (√3 · V_LL)`.
    #[inline]
    pub fn base_current(self, base_kv: Kilovolts) -> Kiloamperes {
        Kiloamperes(self.0 / (3.0_f64.sqrt() * base_kv.0))
    }
}

// =============================================================================
// Voltage
// =============================================================================

/// Voltage magnitude in per-unit (pu)
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[repr(transparent)]
pub struct PerUnit(pub f64);

impl_unit_ops!(PerUnit, "pu");

/// Line-to-line voltage in kilovolts (kV)
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[repr(transparent)]
pub struct Kilovolts(pub f64);

impl_unit_ops!(Kilovolts, "kV");

impl PerUnit {
    pub const ONE: Self = Self(1.0);
}

// =============================================================================
// Angle
// =============================================================================

/// Angle in radians
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[repr(transparent)]
pub struct Radians(pub f64);

impl_unit_ops!(Radians, "rad");

/// Angle in degrees (display only)
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[repr(transparent)]
pub struct Degrees(pub f64);

impl_unit_ops!(Degrees, "°");

impl Radians {
    pub const ZERO: Self = Self(0.0);

    #[inline]
    pub fn to_degrees(self) -> Degrees {
        Degrees(self.0.to_degrees())
    }

    #[inline]
    pub fn sin(self) -> f64 {
        self.0.sin()
    }

    #[inline]
    pub fn cos(self) -> f64 {
        self.0.cos()
    }
}

impl Degrees {
    #[inline]
    pub fn to_radians(self) -> Radians {
        Radians(self.0.to_radians())
    }
}

// =============================================================================
// Frequency and current
// =============================================================================

/// System frequency in hertz (Hz)
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[repr(transparent)]
pub struct Hertz(pub f64);

impl_unit_ops!(Hertz, "Hz");

impl Hertz {
}

/// Current in kiloamperes (kA)
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[repr(transparent)]
pub struct Kiloamperes(pub f64);

impl_unit_ops!(Kiloamperes, "kA");
