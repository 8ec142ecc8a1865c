//! # SRAM Forge
//!
//! Command-line shell around `sram-forge-core`. This crate loads the macro
//! catalog, the slot table and a chip description from JSON files, builds a
//! [`Forge`] from them and leaves all computation to the core.
//!
//! ## Files
//!
//! - `srams.json`: `{"srams": {"<name>": <macro>, ...}}`
//! - `slots.json`: `{"slots": {"<name>": <slot>, ...}}`
//! - `chip.json`: a [`ChipConfig`]
//!
//! ## Binaries
//!
//! - `compose`: runs the pipeline for one chip and writes the composition as JSON.

use serde::{Deserialize, Serialize};
use sram_forge_core::interface::BusOptions;
use sram_forge_core::model::ValidationError;
use sram_forge_core::{Forge, ForgeConfig, InstanceCount, MacroSpec, SlotGeometry};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// Initializes `env_logger` with the `info` level unless `RUST_LOG` says otherwise.
pub fn init_logging() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .try_init()?;
    Ok(())
}

/// Errors that can occur when loading input files.
#[derive(Debug, Error)]
#[allow(missing_docs)]
pub enum Error {
    #[error(transparent)]
    IoError(#[from] std::io::Error),
    #[error(transparent)]
    JsonError(#[from] serde_json::Error),
    #[error("Unknown macro {0:?}")]
    UnknownMacro(String),
    #[error("Unknown slot {0:?}")]
    UnknownSlot(String),
    #[error(transparent)]
    Forge(#[from] sram_forge_core::Error),
}

/// Result type for the loaders.
pub type Result<T> = std::result::Result<T, Error>;

fn read_to_string(filepath: impl AsRef<Path>) -> Result<String> {
    let mut file = File::open(filepath.as_ref())?;
    let mut contents = String::new();
    file.read_to_string(&mut contents)?;
    Ok(contents)
}

/// Named macro specifications.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    srams: BTreeMap<String, Arc<MacroSpec>>,
}

#[derive(Deserialize)]
struct CatalogFile {
    #[serde(default)]
    srams: BTreeMap<String, MacroSpec>,
}

impl Catalog {
    /// Loads a catalog from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or any macro is malformed
    pub fn from_jsonfile(filepath: impl AsRef<Path>) -> Result<Self> {
        Self::from_json_str(&read_to_string(filepath)?)
    }

    /// Parses a catalog from JSON text.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let file: CatalogFile = serde_json::from_str(json)?;
        let srams = file
            .srams
            .into_iter()
            .map(|(name, spec)| (name, Arc::new(spec)))
            .collect();
        Ok(Catalog { srams })
    }

    /// Looks up a macro by name.
    pub fn get(&self, name: &str) -> Result<Arc<MacroSpec>> {
        self.srams
            .get(name)
            .cloned()
            .ok_or_else(|| Error::UnknownMacro(name.to_string()))
    }

    /// Number of macros in the catalog.
    pub fn len(&self) -> usize {
        self.srams.len()
    }

    /// Returns whether the catalog is empty.
    pub fn is_empty(&self) -> bool {
        self.srams.is_empty()
    }
}

/// Named target slots.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SlotTable {
    #[serde(default)]
    slots: BTreeMap<String, SlotGeometry>,
}

impl SlotTable {
    /// Loads a slot table from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or any slot is malformed
    pub fn from_jsonfile(filepath: impl AsRef<Path>) -> Result<Self> {
        Self::from_json_str(&read_to_string(filepath)?)
    }

    /// Parses a slot table from JSON text.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Looks up a slot by name.
    pub fn get(&self, name: &str) -> Result<&SlotGeometry> {
        self.slots
            .get(name)
            .ok_or_else(|| Error::UnknownSlot(name.to_string()))
    }

    /// Iterates over all slots ordered by name.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &SlotGeometry)> {
        self.slots.iter().map(|(name, slot)| (name.as_str(), slot))
    }
}

/// Chip identification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChipInfo {
    /// Design name
    pub name: String,
    /// Free-form description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Memory array of a chip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Catalog name of the macro
    #[serde(rename = "macro")]
    pub macro_name: String,
    /// Number of instances, `"auto"` or an integer
    #[serde(default)]
    pub count: InstanceCount,
    /// Halo around every macro in microns
    #[serde(default = "default_halo_um")]
    pub halo_um: f64,
    /// Reserved area to use instead of the slot's own value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reserved_area_um2: Option<f64>,
}

fn default_halo_um() -> f64 {
    ForgeConfig::default().halo_um
}

/// External interface of a chip.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct InterfaceConfig {
    /// Options of the unified bus
    #[serde(default)]
    pub unified_bus: BusOptions,
}

/// Clock of a chip.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClockConfig {
    /// Target frequency in MHz
    pub frequency_mhz: f64,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            frequency_mhz: 25.0,
        }
    }
}

/// On-disk description of one chip.
///
/// ```json
/// {
///     "chip": {"name": "sram_8k"},
///     "slot": "1x1",
///     "memory": {"macro": "gf180mcu_fd_ip_sram__sram512x8m8wm1", "count": "auto"},
///     "interface": {"unified_bus": {"output_routing": "mux", "write_mask": "byte"}},
///     "clock": {"frequency_mhz": 25}
/// }
/// ```
///
/// Parsing fails if the halo or reserved area is negative or the clock
/// frequency is not positive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ChipConfigDef", into = "ChipConfigDef")]
pub struct ChipConfig {
    /// Chip identification
    pub chip: ChipInfo,
    /// Slot name in the slot table
    pub slot: String,
    /// Memory array
    pub memory: MemoryConfig,
    /// External interface
    pub interface: InterfaceConfig,
    /// Clock
    pub clock: ClockConfig,
}

#[derive(Serialize, Deserialize)]
struct ChipConfigDef {
    chip: ChipInfo,
    slot: String,
    memory: MemoryConfig,
    #[serde(default)]
    interface: InterfaceConfig,
    #[serde(default)]
    clock: ClockConfig,
}

impl TryFrom<ChipConfigDef> for ChipConfig {
    type Error = ValidationError;

    fn try_from(def: ChipConfigDef) -> std::result::Result<Self, Self::Error> {
        let chip = ChipConfig {
            chip: def.chip,
            slot: def.slot,
            memory: def.memory,
            interface: def.interface,
            clock: def.clock,
        };
        chip.forge_config().validate()?;
        Ok(chip)
    }
}

impl From<ChipConfig> for ChipConfigDef {
    fn from(chip: ChipConfig) -> Self {
        ChipConfigDef {
            chip: chip.chip,
            slot: chip.slot,
            memory: chip.memory,
            interface: chip.interface,
            clock: chip.clock,
        }
    }
}

impl ChipConfig {
    /// Loads a chip description from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or parsed
    pub fn from_jsonfile(filepath: impl AsRef<Path>) -> Result<Self> {
        Self::from_json_str(&read_to_string(filepath)?)
    }

    /// Parses a chip description from JSON text.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Clock period in nanoseconds.
    pub fn clock_period_ns(&self) -> f64 {
        1000.0 / self.clock.frequency_mhz
    }

    /// The pipeline configuration described by this chip.
    pub fn forge_config(&self) -> ForgeConfig {
        ForgeConfig {
            halo_um: self.memory.halo_um,
            reserved_area_um2: self.memory.reserved_area_um2,
            count: self.memory.count,
            bus: self.interface.unified_bus,
            clock_mhz: Some(self.clock.frequency_mhz),
        }
    }

    /// Resolves slot and macro by name and builds the pipeline.
    ///
    /// # Errors
    ///
    /// Returns error if the slot or macro is unknown or the configuration is
    /// out of range, for example a clock frequency that is not positive.
    pub fn build_forge(&self, catalog: &Catalog, slots: &SlotTable) -> Result<Forge> {
        let sram = catalog.get(&self.memory.macro_name)?;
        let slot = slots.get(&self.slot)?.clone();
        Ok(Forge::builder()
            .slot(slot)
            .sram(sram)
            .config(self.forge_config())
            .build()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sram_forge_core::interface::{OutputRouting, WriteMaskMode};

    const SRAMS: &str = r#"{"srams": {
        "sram512x8": {
            "source": "pdk", "size": 512, "width": 8, "abits": 9,
            "dimensions_um": {"width": 431.86, "height": 484.88},
            "ports": [{
                "name": "port0", "type": "rw", "clk_enable": true, "clk_polarity": "rising",
                "pins": {"clk": "CLK", "en_n": "CEN", "we_n": "GWEN", "wem_n": "WEN[7:0]",
                         "addr": "A[8:0]", "din": "D[7:0]", "dout": "Q[7:0]"}
            }],
            "files": {"gds": "sram.gds", "lef": "sram.lef"}
        }
    }}"#;

    const SLOTS: &str = r#"{"slots": {
        "1x1": {
            "die": {"width": 3932, "height": 5122},
            "core": {"inset": {"left": 442, "bottom": 442, "right": 442, "top": 442}},
            "io_budget": {"dvdd": 8, "dvss": 10, "input": 12, "bidir": 40, "analog": 2},
            "reserved_area_um2": 50000
        }
    }}"#;

    const CHIP: &str = r#"{
        "chip": {"name": "sram_24k", "description": "48 macros"},
        "slot": "1x1",
        "memory": {"macro": "sram512x8"},
        "interface": {"unified_bus": {"output_routing": "tristate", "write_mask": "bit"}}
    }"#;

    #[test]
    fn test_catalog_lookup() {
        let catalog = Catalog::from_json_str(SRAMS).unwrap();
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.get("sram512x8").unwrap().size(), 512);
        assert!(matches!(catalog.get("sram1024x8"), Err(Error::UnknownMacro(_))));
        assert!(Catalog::from_json_str("{}").unwrap().is_empty());
    }

    #[test]
    fn test_slot_lookup() {
        let slots = SlotTable::from_json_str(SLOTS).unwrap();
        assert_eq!(slots.get("1x1").unwrap().core_width(), 3048.0);
        assert!(matches!(slots.get("2x2"), Err(Error::UnknownSlot(_))));
        assert_eq!(slots.iter().count(), 1);
    }

    #[test]
    fn test_chip_defaults() {
        let chip = ChipConfig::from_json_str(CHIP).unwrap();
        assert_eq!(chip.memory.count, InstanceCount::Auto);
        assert_eq!(chip.memory.halo_um, 10.0);
        assert_eq!(chip.clock.frequency_mhz, 25.0);
        assert_eq!(chip.clock_period_ns(), 40.0);
        let bus = chip.forge_config().bus;
        assert_eq!(bus.output_routing, OutputRouting::Tristate);
        assert_eq!(bus.write_mask, WriteMaskMode::Bit);
    }

    #[test]
    fn test_build_and_run() {
        let catalog = Catalog::from_json_str(SRAMS).unwrap();
        let slots = SlotTable::from_json_str(SLOTS).unwrap();
        let chip = ChipConfig::from_json_str(CHIP).unwrap();
        let composition = chip.build_forge(&catalog, &slots).unwrap().run().unwrap();
        assert_eq!(composition.fit.count(), 48);
        assert_eq!(composition.clock_period_ns, Some(40.0));
    }

    #[test]
    fn test_unknown_names_and_bad_clock() {
        let catalog = Catalog::from_json_str(SRAMS).unwrap();
        let slots = SlotTable::from_json_str(SLOTS).unwrap();
        let mut chip = ChipConfig::from_json_str(CHIP).unwrap();
        chip.slot = "4x4".into();
        assert!(matches!(
            chip.build_forge(&catalog, &slots),
            Err(Error::UnknownSlot(_))
        ));
        chip.slot = "1x1".into();
        chip.clock.frequency_mhz = 0.0;
        assert!(matches!(
            chip.build_forge(&catalog, &slots),
            Err(Error::Forge(sram_forge_core::Error::Validation(_)))
        ));
    }

    #[test]
    fn test_out_of_range_chip_fails_to_parse() {
        let negative_clock = CHIP.replace(
            r#""interface""#,
            r#""clock": {"frequency_mhz": -5}, "interface""#,
        );
        let negative_halo = CHIP.replace(
            r#""macro": "sram512x8""#,
            r#""macro": "sram512x8", "halo_um": -3.0"#,
        );
        let zero_clock = CHIP.replace(
            r#""interface""#,
            r#""clock": {"frequency_mhz": 0}, "interface""#,
        );
        for json in [negative_clock, negative_halo, zero_clock] {
            assert!(
                matches!(ChipConfig::from_json_str(&json), Err(Error::JsonError(_))),
                "{}",
                json
            );
        }
    }

    #[test]
    fn test_chip_serializes_back() {
        let chip = ChipConfig::from_json_str(CHIP).unwrap();
        let json = serde_json::to_string(&chip).unwrap();
        assert_eq!(ChipConfig::from_json_str(&json).unwrap(), chip);
    }

    #[test]
    fn test_malformed_macro_is_rejected() {
        let bad = SRAMS.replace("\"abits\": 9", "\"abits\": 4");
        assert!(matches!(Catalog::from_json_str(&bad), Err(Error::JsonError(_))));
    }
}
