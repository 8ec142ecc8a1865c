//! # SRAM Forge
//!
//! Composes many physical SRAM macros into one addressable chip memory.
//!
//! This crate re-exports [`sram_forge_core`]. The command-line tools live in
//! `sram-forge-bin`.
//!
//! ```
//! use sram_forge::model::{Dimensions, Inset, IoBudget, SlotGeometry};
//!
//! let slot = SlotGeometry::new(
//!     Dimensions::new(3932.0, 5122.0),
//!     Inset::uniform(442.0),
//!     IoBudget { dvdd: 8, dvss: 10, input: 12, bidir: 40, analog: 2 },
//!     50_000.0,
//! )
//! .unwrap();
//! assert_eq!(slot.io_budget().total_signal_pins(), 54);
//! ```

pub use sram_forge_core::*;
