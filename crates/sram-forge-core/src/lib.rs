//! # SRAM Forge Core
//!
//! `sram-forge-core` turns many discrete SRAM macros into one addressable
//! memory. Given a macro from a catalog and a target die slot it decides how many
//! instances fit, lays out a gapless address space across them and derives the
//! external bus that drives them.
//!
//! ## Stages
//!
//! - [`fit::plan_fit`] - Packs macros on a regular grid inside the core and gives
//!   up columns or rows until the slot's reserved area is free. Produces a
//!   [`fit::FitResult`].
//!
//! - [`address::compose_address_space`] - Partitions `[0, total_words)` into
//!   one window per instance with binary instance select. Produces an
//!   [`address::AddressMap`].
//!
//! - [`interface::synthesize_interface`] - Builds enable decode, output routing,
//!   write-mask fanout and the external pin set. Produces an
//!   [`interface::InterfaceDescriptor`].
//!
//! [`Forge`] runs all three stages for one chip and checks the resulting pins
//! against the slot's pad budget.
//!
//! ## Determinism
//!
//! Every stage is a pure function of its inputs. Results contain ordered
//! collections only, so equal inputs serialize to equal bytes. Downstream RTL
//! and physical-design generators rely on this.

#![warn(missing_docs)]

pub mod address;
pub mod fit;
pub mod forge;
pub mod interface;
pub mod model;
pub mod util;

pub use crate::address::{AddressMap, InstanceCount, compose_address_space};
pub use crate::fit::{FitResult, plan_fit};
pub use crate::forge::{Composition, Error, Forge, ForgeBuilder, ForgeConfig};
pub use crate::interface::{BusOptions, InterfaceDescriptor, synthesize_interface};
pub use crate::model::{MacroSpec, SlotGeometry};
