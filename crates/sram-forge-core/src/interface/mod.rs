//! Bus interface synthesis.
//!
//! Turns an [`AddressMap`] and the replicated [`MacroSpec`] into the single
//! external bus that makes all instances behave as one memory:
//!
//! - per-instance enable decode, taken from the address map
//! - the output path, built by the [`Interconnect`] strategy that matches the
//!   requested [`OutputRouting`]
//! - the write-mask fanout table, if a mask is exposed
//! - the external pin set and the read latency of the composed bus
//!
//! The result is an [`InterfaceDescriptor`]. It holds ordered collections only,
//! so equal inputs always render to the same canonical JSON.

mod interconnect;
mod mux;
mod pins;
mod tristate;
mod write_mask;

pub use self::interconnect::{BusDriver, Interconnect, MuxInput, OutputPath};
pub use self::mux::MuxSelect;
pub use self::pins::{
    ExternalPin, PadAssignment, PinBudgetError, PinDirection, PinUsage, check_pin_budget,
};
pub use self::tristate::SharedBus;
pub use self::write_mask::{MaskFanout, MaskLine};

use crate::address::{AddressMap, EnableDecode};
use crate::model::{MacroPort, MacroSpec, Timing};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use thiserror::Error;

/// Errors raised when bus options do not match the macro or the address map.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The requested data width differs from the macro word width.
    #[error("data width {requested} requested but the macro stores {word_width}-bit words")]
    DataWidth {
        /// Requested external data width
        requested: u32,
        /// Word width of the macro
        word_width: u32,
    },
    /// The address map was composed for another macro.
    #[error("address map was composed for a different macro")]
    MacroMismatch,
    /// A unified read/write bus needs a read-write port.
    #[error("macro has no read-write port to serve a unified bus")]
    NoReadWritePort,
    /// Several instances share the bus but the port cannot be enabled selectively.
    #[error("port {port:?} has no enable pin, so {instances} instances cannot share one bus")]
    NoEnablePin {
        /// Name of the bus port
        port: String,
        /// Number of composed instances
        instances: u64,
    },
    /// A write mask was requested from a port without a mask pin.
    #[error("{mode} write mask requested but port {port:?} has no write mask pin")]
    NoMaskPin {
        /// Requested mask mode
        mode: WriteMaskMode,
        /// Name of the bus port
        port: String,
    },
    /// Byte masks need whole bytes.
    #[error("byte write mask needs a word width divisible by 8, got {0}")]
    ByteMaskWidth(u32),
    /// An output path would enable more than one driver for some address.
    #[error("{discipline} output path is not single-driver: {reason}")]
    Contention {
        /// Routing discipline that detected the conflict
        discipline: OutputRouting,
        /// What went wrong
        reason: String,
    },
    /// An output path has a different number of pipeline stages than its discipline.
    #[error("{discipline} output path has {actual} pipeline stages, expected {expected}")]
    PipelineDepth {
        /// Routing discipline that detected the mismatch
        discipline: OutputRouting,
        /// Stages the discipline adds
        expected: u32,
        /// Stages found in the output path
        actual: u32,
    },
}

/// Write-mask exposure on the external bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteMaskMode {
    /// No mask, every write stores the full word
    #[default]
    #[serde(rename = "none")]
    Disabled,
    /// One mask line per data bit
    Bit,
    /// One mask line per data byte
    Byte,
}

impl Display for WriteMaskMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let mode = match self {
            WriteMaskMode::Disabled => "none",
            WriteMaskMode::Bit => "bit",
            WriteMaskMode::Byte => "byte",
        };
        f.write_str(mode)
    }
}

/// How the data outputs of all instances reach the external bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputRouting {
    /// Combinational selector on the instance select bits
    #[default]
    Mux,
    /// Shared bus, every instance drives it while enabled
    Tristate,
    /// Shared bus followed by an output register
    TristateRegistered,
}

impl OutputRouting {
    /// Returns the strategy that builds output paths of this discipline.
    pub fn strategy(self) -> Box<dyn Interconnect> {
        match self {
            OutputRouting::Mux => Box::new(MuxSelect),
            OutputRouting::Tristate => Box::new(SharedBus::combinational()),
            OutputRouting::TristateRegistered => Box::new(SharedBus::registered()),
        }
    }
}

impl Display for OutputRouting {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let routing = match self {
            OutputRouting::Mux => "mux",
            OutputRouting::Tristate => "tristate",
            OutputRouting::TristateRegistered => "tristate_registered",
        };
        f.write_str(routing)
    }
}

/// Options of the unified external bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BusOptions {
    /// External data width. Must equal the macro word width when given.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_width: Option<u32>,
    /// Write-mask exposure
    pub write_mask: WriteMaskMode,
    /// Output routing discipline
    pub output_routing: OutputRouting,
    /// Adds an output register after the routing discipline
    pub registered_output: bool,
}

/// Read timing of the composed bus.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TimingInfo {
    /// Cycles from address to data inside a macro
    pub macro_read_latency: u32,
    /// Register stages between the macros and the data output pins
    pub output_stages: u32,
    /// Cycles from address to data on the external bus
    pub read_latency: u32,
    /// Minimum clock period of the macro, if characterized
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_cycle_ns: Option<f64>,
    /// Clock to output delay of the macro, if characterized
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clk_to_q_ns: Option<f64>,
}

impl TimingInfo {
    fn new(port: &MacroPort, timing: Option<&Timing>, output_stages: u32) -> Self {
        let macro_read_latency = port.read_latency();
        TimingInfo {
            macro_read_latency,
            output_stages,
            read_latency: macro_read_latency + output_stages,
            min_cycle_ns: timing.map(|t| t.min_cycle),
            clk_to_q_ns: timing.map(|t| t.clk_to_q),
        }
    }
}

/// The synthesized external bus of a composition.
///
/// Immutable. Any change to the inputs requires a new synthesis.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InterfaceDescriptor {
    data_width: u32,
    address_bits: u32,
    instance_count: u64,
    macro_port: String,
    output_routing: OutputRouting,
    registered_output: bool,
    enables: Vec<EnableDecode>,
    output_path: OutputPath,
    #[serde(skip_serializing_if = "Option::is_none")]
    write_mask: Option<MaskFanout>,
    pins: Vec<ExternalPin>,
    timing: TimingInfo,
}

/// Synthesizes the external bus for `map`.
///
/// # Arguments
///
/// * `map` - The composed address space
/// * `sram` - The macro `map` was composed for
/// * `options` - Bus options
///
/// # Errors
///
/// Returns a [`ConfigError`] if the options cannot be served by the macro, for
/// example a write mask on a macro without mask pin. Requests are rejected,
/// never silently dropped.
pub fn synthesize_interface(
    map: &AddressMap,
    sram: &MacroSpec,
    options: &BusOptions,
) -> Result<InterfaceDescriptor, ConfigError> {
    InterfaceDescriptor::synthesize(map, sram, options)
}

impl InterfaceDescriptor {
    /// Synthesizes the external bus for `map`. See [`synthesize_interface`].
    pub fn synthesize(
        map: &AddressMap,
        sram: &MacroSpec,
        options: &BusOptions,
    ) -> Result<Self, ConfigError> {
        let data_width = match options.data_width {
            Some(requested) if requested != sram.width() => {
                return Err(ConfigError::DataWidth {
                    requested,
                    word_width: sram.width(),
                });
            }
            _ => sram.width(),
        };
        if map.words_per_instance() != sram.size() || map.macro_abits() != sram.abits() {
            return Err(ConfigError::MacroMismatch);
        }

        let port = sram.read_write_port().ok_or(ConfigError::NoReadWritePort)?;
        if map.instance_count() > 1 && !port.has_enable() {
            return Err(ConfigError::NoEnablePin {
                port: port.name.clone(),
                instances: map.instance_count(),
            });
        }
        debug!("Unified bus on port {:?}", port.name);

        let write_mask = MaskFanout::new(options.write_mask, port, data_width)?;

        let strategy = options.output_routing.strategy();
        let output_path = strategy.route(map)?;
        let output_stages = strategy.output_stages() + u32::from(options.registered_output);

        let pins = ExternalPin::for_bus(map.address_bits(), data_width, write_mask.as_ref());
        let timing = TimingInfo::new(port, sram.timing(), output_stages);

        let descriptor = InterfaceDescriptor {
            data_width,
            address_bits: map.address_bits(),
            instance_count: map.instance_count(),
            macro_port: port.name.clone(),
            output_routing: strategy.discipline(),
            registered_output: options.registered_output,
            enables: map.enables(),
            output_path,
            write_mask,
            pins,
            timing,
        };
        info!(
            "Synthesized {}-bit bus, {} address bits, {} routing, read latency {}",
            descriptor.data_width,
            descriptor.address_bits,
            descriptor.output_routing,
            descriptor.timing.read_latency
        );
        Ok(descriptor)
    }

    /// External data width.
    pub fn data_width(&self) -> u32 {
        self.data_width
    }

    /// External address width.
    pub fn address_bits(&self) -> u32 {
        self.address_bits
    }

    /// Number of instances behind the bus.
    pub fn instance_count(&self) -> u64 {
        self.instance_count
    }

    /// Name of the macro port the bus is wired to.
    pub fn macro_port(&self) -> &str {
        &self.macro_port
    }

    /// Routing discipline of the output path.
    pub fn output_routing(&self) -> OutputRouting {
        self.output_routing
    }

    /// Whether an extra output register was requested.
    pub fn registered_output(&self) -> bool {
        self.registered_output
    }

    /// Enable decode per instance, ordered by instance.
    pub fn enables(&self) -> &[EnableDecode] {
        &self.enables
    }

    /// The output path built by the routing discipline.
    pub fn output_path(&self) -> &OutputPath {
        &self.output_path
    }

    /// Write-mask fanout, if a mask is exposed.
    pub fn write_mask(&self) -> Option<&MaskFanout> {
        self.write_mask.as_ref()
    }

    /// External pins in declaration order.
    pub fn pins(&self) -> &[ExternalPin] {
        &self.pins
    }

    /// Signal bits the external pins need, by direction.
    pub fn pin_usage(&self) -> PinUsage {
        PinUsage::of(&self.pins)
    }

    /// Read timing of the composed bus.
    pub fn timing(&self) -> &TimingInfo {
        &self.timing
    }

    /// Renders the descriptor as compact JSON. Equal descriptors render to equal bytes.
    pub fn to_canonical_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::{AddressMap, InstanceCount};
    use crate::fit::plan_fit;
    use crate::model::{
        ClockPolarity, Dimensions, Inset, IoBudget, MacroSource, PinMap, PortKind, SetupHold,
        SlotGeometry,
    };

    fn full_pins() -> PinMap {
        PinMap {
            clk: "CLK".into(),
            en_n: Some("CEN".into()),
            we_n: Some("GWEN".into()),
            wem_n: Some("WEN[7:0]".into()),
            addr: Some("A[8:0]".into()),
            din: Some("D[7:0]".into()),
            dout: Some("Q[7:0]".into()),
        }
    }

    fn sram_with(ports: Vec<MacroPort>, width: u32) -> MacroSpec {
        MacroSpec::new(
            MacroSource::Pdk,
            512,
            width,
            9,
            Dimensions::new(431.86, 484.88),
            ports,
        )
        .unwrap()
    }

    fn rw_port(pins: PinMap) -> MacroPort {
        MacroPort {
            name: "port0".into(),
            kind: PortKind::ReadWrite,
            clk_enable: true,
            clk_polarity: ClockPolarity::Rising,
            pins,
        }
    }

    fn compose(sram: &MacroSpec, count: InstanceCount) -> AddressMap {
        let slot = SlotGeometry::new(
            Dimensions::new(3932.0, 5122.0),
            Inset::uniform(442.0),
            IoBudget::default(),
            50_000.0,
        )
        .unwrap();
        let fit = plan_fit(&slot, sram, 10.0, None).unwrap();
        AddressMap::compose(sram, &fit, count).unwrap()
    }

    #[test]
    fn test_default_mux_bus() {
        let sram = sram_with(vec![rw_port(full_pins())], 8);
        let map = compose(&sram, InstanceCount::Auto);
        let bus = synthesize_interface(&map, &sram, &BusOptions::default()).unwrap();
        assert_eq!(bus.data_width(), 8);
        assert_eq!(bus.address_bits(), 15);
        assert_eq!(bus.output_routing(), OutputRouting::Mux);
        assert_eq!(bus.enables().len(), 48);
        assert_eq!(bus.enables()[5].to_string(), "addr[14:9] == 6'd5");
        assert!(bus.write_mask().is_none());
        assert_eq!(bus.timing().read_latency, 1);
        assert_eq!(bus.macro_port(), "port0");
        match bus.output_path() {
            OutputPath::Mux { inputs, .. } => assert_eq!(inputs.len(), 48),
            other => panic!("unexpected output path {:?}", other),
        }
    }

    #[test]
    fn test_mask_without_pin_is_rejected() {
        let pins = PinMap {
            wem_n: None,
            ..full_pins()
        };
        let sram = sram_with(vec![rw_port(pins)], 8);
        let map = compose(&sram, InstanceCount::Auto);
        for mode in [WriteMaskMode::Bit, WriteMaskMode::Byte] {
            let options = BusOptions {
                write_mask: mode,
                ..BusOptions::default()
            };
            assert_eq!(
                synthesize_interface(&map, &sram, &options),
                Err(ConfigError::NoMaskPin {
                    mode,
                    port: "port0".into()
                })
            );
        }
    }

    #[test]
    fn test_data_width_must_match_macro() {
        let sram = sram_with(vec![rw_port(full_pins())], 8);
        let map = compose(&sram, InstanceCount::Auto);
        let options = BusOptions {
            data_width: Some(16),
            ..BusOptions::default()
        };
        assert_eq!(
            synthesize_interface(&map, &sram, &options),
            Err(ConfigError::DataWidth {
                requested: 16,
                word_width: 8
            })
        );
        let options = BusOptions {
            data_width: Some(8),
            ..BusOptions::default()
        };
        assert!(synthesize_interface(&map, &sram, &options).is_ok());
    }

    #[test]
    fn test_requires_read_write_port() {
        let ro = MacroPort {
            kind: PortKind::ReadOnly,
            ..rw_port(full_pins())
        };
        let sram = sram_with(vec![ro], 8);
        let map = compose(&sram, InstanceCount::Auto);
        assert_eq!(
            synthesize_interface(&map, &sram, &BusOptions::default()),
            Err(ConfigError::NoReadWritePort)
        );
    }

    #[test]
    fn test_uses_first_read_write_port() {
        let ro = MacroPort {
            name: "read".into(),
            kind: PortKind::ReadOnly,
            ..rw_port(full_pins())
        };
        let rw = MacroPort {
            name: "main".into(),
            ..rw_port(full_pins())
        };
        let sram = sram_with(vec![ro, rw], 8);
        let map = compose(&sram, InstanceCount::Auto);
        let bus = synthesize_interface(&map, &sram, &BusOptions::default()).unwrap();
        assert_eq!(bus.macro_port(), "main");
    }

    #[test]
    fn test_enable_pin_needed_for_several_instances() {
        let sram = sram_with(vec![rw_port(PinMap::clocked("CLK"))], 8);
        let map = compose(&sram, InstanceCount::Fixed(2));
        assert_eq!(
            synthesize_interface(&map, &sram, &BusOptions::default()),
            Err(ConfigError::NoEnablePin {
                port: "port0".into(),
                instances: 2
            })
        );
        let single = compose(&sram, InstanceCount::Fixed(1));
        assert!(synthesize_interface(&single, &sram, &BusOptions::default()).is_ok());
    }

    #[test]
    fn test_registered_tristate_latency() {
        let sram = sram_with(vec![rw_port(full_pins())], 8);
        let map = compose(&sram, InstanceCount::Auto);
        let options = BusOptions {
            output_routing: OutputRouting::TristateRegistered,
            registered_output: true,
            ..BusOptions::default()
        };
        let bus = synthesize_interface(&map, &sram, &options).unwrap();
        assert_eq!(bus.timing().output_stages, 2);
        assert_eq!(bus.timing().read_latency, 3);
        assert!(matches!(
            bus.output_path(),
            OutputPath::SharedBus { registered: true, .. }
        ));
    }

    #[test]
    fn test_timing_metadata_from_macro() {
        let timing = Timing {
            min_cycle: 6.077,
            clk_to_q: 5.008,
            setup: SetupHold {
                addr: 0.947,
                din: Some(0.458),
                en: Some(0.406),
            },
            hold: SetupHold {
                addr: 0.549,
                din: Some(0.674),
                en: None,
            },
        };
        let sram = sram_with(vec![rw_port(full_pins())], 8)
            .with_timing(timing)
            .unwrap();
        let map = compose(&sram, InstanceCount::Fixed(4));
        let bus = synthesize_interface(&map, &sram, &BusOptions::default()).unwrap();
        assert_eq!(bus.timing().min_cycle_ns, Some(6.077));
        assert_eq!(bus.timing().clk_to_q_ns, Some(5.008));
    }

    #[test]
    fn test_canonical_json_is_deterministic() {
        let sram = sram_with(vec![rw_port(full_pins())], 8);
        let options = BusOptions {
            write_mask: WriteMaskMode::Bit,
            output_routing: OutputRouting::Tristate,
            ..BusOptions::default()
        };
        let a = synthesize_interface(&compose(&sram, InstanceCount::Auto), &sram, &options)
            .unwrap()
            .to_canonical_json()
            .unwrap();
        let b = synthesize_interface(&compose(&sram, InstanceCount::Auto), &sram, &options)
            .unwrap()
            .to_canonical_json()
            .unwrap();
        assert_eq!(a, b);
        assert!(a.contains("\"output_routing\":\"tristate\""));
    }

    #[test]
    fn test_options_deserialize() {
        let options: BusOptions = serde_json::from_str(
            r#"{"write_mask": "byte", "output_routing": "tristate_registered"}"#,
        )
        .unwrap();
        assert_eq!(options.write_mask, WriteMaskMode::Byte);
        assert_eq!(options.output_routing, OutputRouting::TristateRegistered);
        assert_eq!(options.data_width, None);
        assert!(!options.registered_output);
        let none: BusOptions = serde_json::from_str(r#"{"write_mask": "none"}"#).unwrap();
        assert_eq!(none, BusOptions::default());
        assert!(serde_json::from_str::<BusOptions>(r#"{"output_routing": "wired_or"}"#).is_err());
    }
}
