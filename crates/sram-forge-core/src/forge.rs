//! The composition pipeline.
//!
//! [`Forge`] ties the fit planner, the address composer and the bus synthesizer
//! together and surfaces their failures as one [`Error`].

use crate::address::{AddressMap, ComposeError, InstanceCount};
use crate::fit::{FitResult, plan_fit};
use crate::interface::{
    BusOptions, ConfigError, InterfaceDescriptor, PadAssignment, PinBudgetError, check_pin_budget,
};
use crate::model::{Dimensions, MacroSpec, SlotGeometry, ValidationError, non_negative, positive};
use crate::util::DEFAULT_HALO_UM;
use log::{info, warn};
use serde::{Deserialize, Serialize, Serializer};
use std::sync::Arc;
use thiserror::Error;

/// Composition pipeline for one chip.
///
/// `Forge` runs the three stages in order for a single slot and macro:
///
/// 1. Fit planning with [`plan_fit`]
/// 2. Address composition with [`AddressMap::compose`]
/// 3. Bus synthesis with [`InterfaceDescriptor::synthesize`]
///
/// and finally assigns the external pins to the slot's signal pads. Each run
/// recomputes everything from the inputs.
///
/// # Examples
///
/// Use [`Forge::builder()`] to construct a `Forge` from a slot and a macro.
#[derive(Debug, Clone)]
pub struct Forge {
    slot: SlotGeometry,
    sram: Arc<MacroSpec>,
    config: ForgeConfig,
}

/// Tunables of a composition run.
///
/// Deserialized values are range checked, see [`ForgeConfig::validate`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ForgeConfigDef", into = "ForgeConfigDef")]
pub struct ForgeConfig {
    /// Clearance around every macro, in microns per side
    pub halo_um: f64,
    /// Reserved area to use instead of the slot's own value
    pub reserved_area_um2: Option<f64>,
    /// Number of instances to compose
    pub count: InstanceCount,
    /// Options of the external bus
    pub bus: BusOptions,
    /// Target clock frequency in MHz, checked against the macro timing
    pub clock_mhz: Option<f64>,
}

#[derive(Serialize, Deserialize)]
#[serde(default)]
struct ForgeConfigDef {
    halo_um: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    reserved_area_um2: Option<f64>,
    count: InstanceCount,
    bus: BusOptions,
    #[serde(skip_serializing_if = "Option::is_none")]
    clock_mhz: Option<f64>,
}

impl Default for ForgeConfigDef {
    fn default() -> Self {
        ForgeConfig::default().into()
    }
}

impl TryFrom<ForgeConfigDef> for ForgeConfig {
    type Error = ValidationError;

    fn try_from(def: ForgeConfigDef) -> Result<Self, Self::Error> {
        let config = ForgeConfig {
            halo_um: def.halo_um,
            reserved_area_um2: def.reserved_area_um2,
            count: def.count,
            bus: def.bus,
            clock_mhz: def.clock_mhz,
        };
        config.validate()?;
        Ok(config)
    }
}

impl From<ForgeConfig> for ForgeConfigDef {
    fn from(config: ForgeConfig) -> Self {
        ForgeConfigDef {
            halo_um: config.halo_um,
            reserved_area_um2: config.reserved_area_um2,
            count: config.count,
            bus: config.bus,
            clock_mhz: config.clock_mhz,
        }
    }
}

impl Default for ForgeConfig {
    fn default() -> Self {
        Self {
            halo_um: DEFAULT_HALO_UM,
            reserved_area_um2: None,
            count: InstanceCount::Auto,
            bus: BusOptions::default(),
            clock_mhz: None,
        }
    }
}

impl ForgeConfig {
    /// Checks that every tunable is in range.
    ///
    /// # Errors
    ///
    /// Returns error if the halo or reserved area is negative or the clock
    /// frequency is not positive
    pub fn validate(&self) -> Result<(), ValidationError> {
        non_negative("halo_um", self.halo_um)?;
        if let Some(area) = self.reserved_area_um2 {
            non_negative("reserved_area_um2", area)?;
        }
        if let Some(mhz) = self.clock_mhz {
            positive("clock_mhz", mhz)?;
        }
        Ok(())
    }

    /// Clock period in nanoseconds, if a clock frequency is set.
    pub fn clock_period_ns(&self) -> Option<f64> {
        self.clock_mhz.map(|mhz| 1000.0 / mhz)
    }
}

/// Everything computed for one chip.
///
/// This is the contract handed to downstream generators.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Composition {
    /// Die outline as `[x_min, y_min, x_max, y_max]`
    pub die_area: [f64; 4],
    /// Core outline as `[x_min, y_min, x_max, y_max]`
    pub core_area: [f64; 4],
    /// Fit planner result
    pub fit: FitResult,
    /// Composed address space
    pub address_map: AddressMap,
    /// Synthesized external bus
    pub interface: InterfaceDescriptor,
    /// Signal pads used by the external bus
    pub pads: PadAssignment,
    /// Target clock period, if a clock frequency is set
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clock_period_ns: Option<f64>,
}

impl Forge {
    /// Creates a new Forge builder.
    pub fn builder() -> ForgeBuilder {
        ForgeBuilder::default()
    }

    /// Returns the target slot.
    pub fn slot(&self) -> &SlotGeometry {
        &self.slot
    }

    /// Returns the replicated macro.
    pub fn sram(&self) -> &Arc<MacroSpec> {
        &self.sram
    }

    /// Returns the run configuration.
    pub fn config(&self) -> &ForgeConfig {
        &self.config
    }

    /// Runs only the fit planner.
    ///
    /// A zero-capacity fit is returned as is, it is not an error here.
    pub fn plan(&self) -> Result<FitResult, Error> {
        Ok(plan_fit(
            &self.slot,
            &self.sram,
            self.config.halo_um,
            self.config.reserved_area_um2,
        )?)
    }

    /// Runs the full pipeline.
    ///
    /// # Errors
    ///
    /// * [`Error::NoFit`] if not a single macro fits into the slot
    /// * [`Error::Compose`] if the instance count cannot be served
    /// * [`Error::Interface`] if the bus options do not match the macro
    /// * [`Error::PinBudget`] if the slot has too few signal pads for the bus
    pub fn run(&self) -> Result<Composition, Error> {
        info!(
            "Composing {}-word x {}-bit macros into a {} x {} um die",
            self.sram.size(),
            self.sram.width(),
            self.slot.die().width,
            self.slot.die().height
        );
        let fit = self.plan()?;
        if !fit.has_capacity() {
            return Err(Error::NoFit {
                footprint: fit.footprint_um(),
                core: Dimensions::new(self.slot.core_width(), self.slot.core_height()),
            });
        }
        let address_map = AddressMap::compose(&self.sram, &fit, self.config.count)?;
        let interface = InterfaceDescriptor::synthesize(&address_map, &self.sram, &self.config.bus)?;
        let pads = check_pin_budget(interface.pin_usage(), &self.slot.io_budget())?;
        info!(
            "Using {} input and {} bidirectional pads",
            pads.input_pads, pads.bidir_pads
        );

        let clock_period_ns = self.config.clock_period_ns();
        if let (Some(period), Some(timing)) = (clock_period_ns, self.sram.timing()) {
            if timing.min_cycle > period {
                warn!(
                    "Clock period {:.3} ns is shorter than the macro minimum cycle {:.3} ns",
                    period, timing.min_cycle
                );
            }
        }

        let (die, core) = self.slot.areas();
        Ok(Composition {
            die_area: die.to_array(),
            core_area: core.to_array(),
            fit,
            address_map,
            interface,
            pads,
            clock_period_ns,
        })
    }
}

/// Builder for [`Forge`].
#[derive(Debug, Default)]
pub struct ForgeBuilder {
    slot: Option<SlotGeometry>,
    sram: Option<Arc<MacroSpec>>,
    config: ForgeConfig,
}

impl ForgeBuilder {
    /// Sets the target slot.
    pub fn slot(mut self, slot: SlotGeometry) -> Self {
        self.slot = Some(slot);
        self
    }

    /// Sets the macro to replicate.
    pub fn sram(mut self, sram: impl Into<Arc<MacroSpec>>) -> Self {
        self.sram = Some(sram.into());
        self
    }

    /// Sets the run configuration.
    pub fn config(mut self, config: ForgeConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the halo in microns.
    pub fn halo_um(mut self, halo_um: f64) -> Self {
        self.config.halo_um = halo_um;
        self
    }

    /// Sets the number of instances.
    pub fn count(mut self, count: InstanceCount) -> Self {
        self.config.count = count;
        self
    }

    /// Sets the bus options.
    pub fn bus(mut self, bus: BusOptions) -> Self {
        self.config.bus = bus;
        self
    }

    /// Builds the pipeline.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Slot`] or [`Error::Macro`] if an input is missing and
    /// [`Error::Validation`] if a tunable is out of range.
    pub fn build(self) -> Result<Forge, Error> {
        self.config.validate()?;
        Ok(Forge {
            slot: self.slot.ok_or(Error::Slot)?,
            sram: self.sram.ok_or(Error::Macro)?,
            config: self.config,
        })
    }
}

/// Errors of the composition pipeline.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum Error {
    /// No slot was given to the builder.
    #[error("No slot specified")]
    Slot,
    /// No macro was given to the builder.
    #[error("No macro specified")]
    Macro,
    /// Not a single macro fits into the slot.
    #[error(
        "macro footprint {:.2} x {:.2} um does not fit into core {:.2} x {:.2} um",
        .footprint.width, .footprint.height, .core.width, .core.height
    )]
    NoFit {
        /// Macro footprint including halo
        footprint: Dimensions,
        /// Core dimensions of the slot
        core: Dimensions,
    },
    /// An input or tunable is malformed.
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// The address space cannot be composed.
    #[error(transparent)]
    Compose(#[from] ComposeError),
    /// The bus options do not match the macro.
    #[error(transparent)]
    Interface(#[from] ConfigError),
    /// The slot has too few signal pads.
    #[error(transparent)]
    PinBudget(#[from] PinBudgetError),
}

impl Serialize for Error {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}
