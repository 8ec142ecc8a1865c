//! Validated input records: memory macros and target slots.
//!
//! The `model` module provides the following types:
//! - [`MacroSpec`]: a physical SRAM macro (capacity, footprint, ports, optional timing).
//! - [`SlotGeometry`]: a die/core outline with its I/O pad budget and reserved area.
//!
//! Both are validated when they are constructed or deserialized. A value of either
//! type is therefore always well formed, and later stages never re-check it.

mod macro_spec;
mod slot;

pub use self::macro_spec::{
    ClockPolarity, Dimensions, MacroFiles, MacroPort, MacroSource, MacroSpec, PinMap, PortKind,
    SetupHold, Timing,
};
pub use self::slot::{Inset, IoBudget, Rect, SlotGeometry};

use crate::util::MAX_ADDRESS_BITS;
use thiserror::Error;

/// Errors raised when a macro, slot or option record is malformed.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    /// A dimension or timing value must be strictly positive and finite.
    #[error("{field} must be a finite number greater than zero, got {value}")]
    NotPositive {
        /// Name of the offending field
        field: &'static str,
        /// Value that was supplied
        value: f64,
    },
    /// An inset, halo or area must be finite and not negative.
    #[error("{field} must be a finite number not below zero, got {value}")]
    Negative {
        /// Name of the offending field
        field: &'static str,
        /// Value that was supplied
        value: f64,
    },
    /// An integer quantity must be greater than zero.
    #[error("{field} must be greater than zero")]
    Zero {
        /// Name of the offending field
        field: &'static str,
    },
    /// The address bus is too narrow for the number of words.
    #[error("address width {abits} cannot address {size} words, at least {required} bits are needed")]
    AddressWidth {
        /// Number of words in the macro
        size: u64,
        /// Declared address width
        abits: u32,
        /// Minimum address width for `size` words
        required: u32,
    },
    /// The address bus is wider than any composed bus may be.
    #[error("address width {0} exceeds the supported maximum of {max} bits", max = MAX_ADDRESS_BITS)]
    AddressTooWide(u32),
    /// A macro must declare at least one port.
    #[error("macro declares no ports")]
    NoPorts,
    /// Port names identify ports and must be unique within a macro.
    #[error("port name {0:?} is declared more than once")]
    DuplicatePort(String),
    /// The insets consume the whole die.
    #[error("core area is empty: {width} x {height} um after insets")]
    EmptyCore {
        /// Core width after insets
        width: f64,
        /// Core height after insets
        height: f64,
    },
    /// A derived capacity does not fit into 64 bits.
    #[error("{0} overflows 64 bits")]
    Overflow(&'static str),
}

/// Checks that `value` is finite and strictly positive.
pub(crate) fn positive(field: &'static str, value: f64) -> Result<f64, ValidationError> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(ValidationError::NotPositive { field, value })
    }
}

/// Checks that `value` is finite and not negative.
pub(crate) fn non_negative(field: &'static str, value: f64) -> Result<f64, ValidationError> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(ValidationError::Negative { field, value })
    }
}

#[cfg(test)]
mod tests {
    use super::{ValidationError, non_negative, positive};

    #[test]
    fn test_positive_rejects_zero_nan_and_infinity() {
        assert_eq!(positive("w", 1.5), Ok(1.5));
        assert!(matches!(positive("w", 0.0), Err(ValidationError::NotPositive { .. })));
        assert!(positive("w", f64::NAN).is_err());
        assert!(positive("w", f64::INFINITY).is_err());
    }

    #[test]
    fn test_non_negative_accepts_zero() {
        assert_eq!(non_negative("halo", 0.0), Ok(0.0));
        assert!(matches!(
            non_negative("halo", -0.5),
            Err(ValidationError::Negative { field: "halo", .. })
        ));
    }
}
