use crate::model::{ValidationError, non_negative, positive};
use crate::util::{MAX_ADDRESS_BITS, ceil_log2};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt::{self, Display, Formatter};

/// Origin of a memory macro.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MacroSource {
    /// Shipped with the process design kit
    Pdk,
    /// Generated by OpenRAM
    OpenRam,
    /// Hand-made or third-party macro
    Custom,
}

/// Physical extent of a rectangle in microns.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in microns
    pub width: f64,
    /// Height in microns
    pub height: f64,
}

impl Dimensions {
    /// Creates a new dimension pair. Values are checked by the record that owns them.
    pub fn new(width: f64, height: f64) -> Self {
        Dimensions { width, height }
    }

    /// Returns `width * height`.
    pub fn area(&self) -> f64 {
        self.width * self.height
    }
}

/// Access direction of a macro port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PortKind {
    /// Read-only port
    #[serde(rename = "ro")]
    ReadOnly,
    /// Write-only port
    #[serde(rename = "wo")]
    WriteOnly,
    /// Read-write port
    #[serde(rename = "rw")]
    ReadWrite,
}

impl PortKind {
    /// Returns whether data can be read through a port of this kind.
    pub fn can_read(self) -> bool {
        matches!(self, PortKind::ReadOnly | PortKind::ReadWrite)
    }

    /// Returns whether data can be written through a port of this kind.
    pub fn can_write(self) -> bool {
        matches!(self, PortKind::WriteOnly | PortKind::ReadWrite)
    }
}

impl Display for PortKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let kind = match self {
            PortKind::ReadOnly => "ro",
            PortKind::WriteOnly => "wo",
            PortKind::ReadWrite => "rw",
        };
        f.write_str(kind)
    }
}

/// Clock edge a synchronous port samples on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClockPolarity {
    /// Rising edge
    Rising,
    /// Falling edge
    Falling,
}

/// Pin names of one macro port.
///
/// Only the clock is mandatory. Active-low pins carry the `_n` suffix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinMap {
    /// Clock pin
    pub clk: String,
    /// Chip enable, active low
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub en_n: Option<String>,
    /// Write enable, active low
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub we_n: Option<String>,
    /// Per-bit write mask, active low
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wem_n: Option<String>,
    /// Address bus
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub addr: Option<String>,
    /// Data input bus
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub din: Option<String>,
    /// Data output bus
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dout: Option<String>,
}

impl PinMap {
    /// Creates a pin map with only a clock pin.
    pub fn clocked(clk: impl Into<String>) -> Self {
        PinMap {
            clk: clk.into(),
            en_n: None,
            we_n: None,
            wem_n: None,
            addr: None,
            din: None,
            dout: None,
        }
    }
}

/// A single port of a memory macro.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MacroPort {
    /// Port identifier, unique within the macro
    pub name: String,
    /// Access direction
    #[serde(rename = "type")]
    pub kind: PortKind,
    /// Whether the port is synchronous
    pub clk_enable: bool,
    /// Sampling clock edge
    pub clk_polarity: ClockPolarity,
    /// Pin mapping
    pub pins: PinMap,
}

impl MacroPort {
    /// Returns whether this port exposes a per-bit write mask pin.
    pub fn has_write_mask(&self) -> bool {
        self.pins.wem_n.is_some()
    }

    /// Returns whether this port exposes a chip enable that a decoder can drive.
    pub fn has_enable(&self) -> bool {
        self.pins.en_n.is_some()
    }

    /// Number of clock cycles between presenting an address and data appearing on `dout`.
    pub fn read_latency(&self) -> u32 {
        if self.clk_enable { 1 } else { 0 }
    }
}

/// Setup or hold times in nanoseconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SetupHold {
    /// Address setup/hold
    pub addr: f64,
    /// Data input setup/hold
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub din: Option<f64>,
    /// Enable setup/hold
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub en: Option<f64>,
}

/// Characterized timing of a macro in nanoseconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Timing {
    /// Minimum clock period
    pub min_cycle: f64,
    /// Clock to output delay
    pub clk_to_q: f64,
    /// Setup times
    pub setup: SetupHold,
    /// Hold times
    pub hold: SetupHold,
}

impl Timing {
    fn validate(&self) -> Result<(), ValidationError> {
        positive("timing.min_cycle", self.min_cycle)?;
        positive("timing.clk_to_q", self.clk_to_q)?;
        for (field, value) in [
            ("timing.setup.addr", Some(self.setup.addr)),
            ("timing.setup.din", self.setup.din),
            ("timing.setup.en", self.setup.en),
            ("timing.hold.addr", Some(self.hold.addr)),
            ("timing.hold.din", self.hold.din),
            ("timing.hold.en", self.hold.en),
        ] {
            if let Some(value) = value {
                non_negative(field, value)?;
            }
        }
        Ok(())
    }
}

/// Paths of the views shipped with a macro.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MacroFiles {
    /// Layout
    pub gds: String,
    /// Abstract
    pub lef: String,
    /// Liberty timing model
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lib: Option<String>,
    /// Behavioral model
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verilog: Option<String>,
}

/// Physical SRAM macro specification.
///
/// A `MacroSpec` describes one hard memory block: how many words it stores, how
/// wide they are, how large the block is on silicon and which ports it exposes.
/// The record is immutable after construction. Compositions usually hold it in
/// an `Arc` so one catalog entry serves any number of chips.
///
/// # Invariants
///
/// * `size > 0`, `width > 0`
/// * `ceil(log2(size)) <= abits <= 63`
/// * both physical dimensions are finite and `> 0`
/// * at least one port, port names unique
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "MacroSpecDef")]
pub struct MacroSpec {
    source: MacroSource,
    size: u64,
    width: u32,
    abits: u32,
    #[serde(rename = "dimensions_um")]
    dimensions: Dimensions,
    ports: Vec<MacroPort>,
    #[serde(rename = "timing_ns", skip_serializing_if = "Option::is_none")]
    timing: Option<Timing>,
    #[serde(skip_serializing_if = "Option::is_none")]
    files: Option<MacroFiles>,
}

#[derive(Deserialize)]
struct MacroSpecDef {
    source: MacroSource,
    size: u64,
    width: u32,
    abits: u32,
    dimensions_um: Dimensions,
    ports: Vec<MacroPort>,
    #[serde(default)]
    timing_ns: Option<Timing>,
    #[serde(default)]
    files: Option<MacroFiles>,
}

impl TryFrom<MacroSpecDef> for MacroSpec {
    type Error = ValidationError;

    fn try_from(def: MacroSpecDef) -> Result<Self, Self::Error> {
        let spec = MacroSpec::new(
            def.source,
            def.size,
            def.width,
            def.abits,
            def.dimensions_um,
            def.ports,
        )?
        .with_files(def.files);
        match def.timing_ns {
            Some(timing) => spec.with_timing(timing),
            None => Ok(spec),
        }
    }
}

impl MacroSpec {
    /// Creates a validated macro specification without timing data.
    ///
    /// # Arguments
    ///
    /// * `source` - Where the macro comes from
    /// * `size` - Number of words
    /// * `width` - Bits per word
    /// * `abits` - Width of the macro address bus
    /// * `dimensions` - Physical footprint in microns
    /// * `ports` - Port definitions, in declaration order
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] if any of the invariants listed on
    /// [`MacroSpec`] does not hold.
    ///
    /// # Examples
    ///
    /// ```
    /// use sram_forge_core::model::{
    ///     ClockPolarity, Dimensions, MacroPort, MacroSource, MacroSpec, PinMap, PortKind,
    /// };
    ///
    /// let port = MacroPort {
    ///     name: "port0".into(),
    ///     kind: PortKind::ReadWrite,
    ///     clk_enable: true,
    ///     clk_polarity: ClockPolarity::Rising,
    ///     pins: PinMap::clocked("CLK"),
    /// };
    /// let spec = MacroSpec::new(
    ///     MacroSource::Pdk,
    ///     512,
    ///     8,
    ///     9,
    ///     Dimensions::new(431.86, 484.88),
    ///     vec![port],
    /// )
    /// .unwrap();
    /// assert_eq!(spec.total_bits(), 4096);
    ///
    /// assert!(MacroSpec::new(MacroSource::Pdk, 512, 8, 8, spec.dimensions(), spec.ports().to_vec()).is_err());
    /// ```
    pub fn new(
        source: MacroSource,
        size: u64,
        width: u32,
        abits: u32,
        dimensions: Dimensions,
        ports: Vec<MacroPort>,
    ) -> Result<Self, ValidationError> {
        if size == 0 {
            return Err(ValidationError::Zero { field: "size" });
        }
        if width == 0 {
            return Err(ValidationError::Zero { field: "width" });
        }
        let required = ceil_log2(size);
        if abits < required {
            return Err(ValidationError::AddressWidth {
                size,
                abits,
                required,
            });
        }
        if abits > MAX_ADDRESS_BITS {
            return Err(ValidationError::AddressTooWide(abits));
        }
        positive("dimensions_um.width", dimensions.width)?;
        positive("dimensions_um.height", dimensions.height)?;
        if ports.is_empty() {
            return Err(ValidationError::NoPorts);
        }
        let mut names = BTreeSet::new();
        for port in &ports {
            if !names.insert(port.name.as_str()) {
                return Err(ValidationError::DuplicatePort(port.name.clone()));
            }
        }
        size.checked_mul(width as u64)
            .ok_or(ValidationError::Overflow("macro capacity in bits"))?;

        Ok(MacroSpec {
            source,
            size,
            width,
            abits,
            dimensions,
            ports,
            timing: None,
            files: None,
        })
    }

    /// Attaches characterized timing to this macro.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] if a period or delay is not positive, or a
    /// setup/hold time is negative.
    pub fn with_timing(self, timing: Timing) -> Result<Self, ValidationError> {
        timing.validate()?;
        Ok(MacroSpec {
            timing: Some(timing),
            ..self
        })
    }

    /// Attaches the view file paths.
    pub fn with_files(self, files: Option<MacroFiles>) -> Self {
        MacroSpec { files, ..self }
    }

    /// Returns the view file paths, if the catalog lists them.
    pub fn files(&self) -> Option<&MacroFiles> {
        self.files.as_ref()
    }

    /// Returns the origin of the macro.
    pub fn source(&self) -> MacroSource {
        self.source
    }

    /// Returns the number of words.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Returns the number of bits per word.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Returns the width of the macro address bus.
    pub fn abits(&self) -> u32 {
        self.abits
    }

    /// Returns the physical footprint without halo.
    pub fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    /// Returns the ports in declaration order.
    pub fn ports(&self) -> &[MacroPort] {
        &self.ports
    }

    /// Returns the characterized timing, if any.
    pub fn timing(&self) -> Option<&Timing> {
        self.timing.as_ref()
    }

    /// Total storage capacity in bits.
    pub fn total_bits(&self) -> u64 {
        self.size * self.width as u64
    }

    /// Footprint area in square microns.
    pub fn area(&self) -> f64 {
        self.dimensions.area()
    }

    /// Returns the first port that can both read and write.
    pub fn read_write_port(&self) -> Option<&MacroPort> {
        self.ports.iter().find(|p| p.kind == PortKind::ReadWrite)
    }

    /// Returns whether any port exposes a per-bit write mask.
    pub fn has_write_mask(&self) -> bool {
        self.ports.iter().any(MacroPort::has_write_mask)
    }
}
