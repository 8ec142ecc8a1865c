use crate::address::BitRange;
use crate::interface::{ConfigError, WriteMaskMode};
use crate::model::MacroPort;
use crate::util::BYTE_WIDTH;
use serde::Serialize;

/// One external mask line and the macro mask bits it drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct MaskLine {
    /// Index of the external mask line
    pub line: u32,
    /// Macro mask bits driven by the line
    pub bits: BitRange,
}

/// Fanout from the external write-mask lines to the per-bit macro mask.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MaskFanout {
    mode: WriteMaskMode,
    macro_pin: String,
    lines: Vec<MaskLine>,
}

impl MaskFanout {
    /// Builds the fanout table for `mode` on `port`.
    ///
    /// Returns `Ok(None)` if no mask is requested.
    ///
    /// # Errors
    ///
    /// * [`ConfigError::NoMaskPin`] if a mask is requested but the port has no
    ///   mask pin
    /// * [`ConfigError::ByteMaskWidth`] if a byte mask is requested for a word
    ///   width that is not a multiple of 8
    pub fn new(
        mode: WriteMaskMode,
        port: &MacroPort,
        width: u32,
    ) -> Result<Option<Self>, ConfigError> {
        let lane = match mode {
            WriteMaskMode::Disabled => return Ok(None),
            WriteMaskMode::Bit => 1,
            WriteMaskMode::Byte => BYTE_WIDTH,
        };
        let Some(macro_pin) = port.pins.wem_n.clone() else {
            return Err(ConfigError::NoMaskPin {
                mode,
                port: port.name.clone(),
            });
        };
        if width % lane != 0 {
            return Err(ConfigError::ByteMaskWidth(width));
        }
        let lines = (0..width / lane)
            .filter_map(|line| {
                BitRange::from_width(line * lane, lane).map(|bits| MaskLine { line, bits })
            })
            .collect();
        Ok(Some(MaskFanout {
            mode,
            macro_pin,
            lines,
        }))
    }

    /// Mask granularity.
    pub fn mode(&self) -> WriteMaskMode {
        self.mode
    }

    /// Name of the macro mask pin the lines fan out to.
    pub fn macro_pin(&self) -> &str {
        &self.macro_pin
    }

    /// Fanout per external line, ordered by line.
    pub fn lines(&self) -> &[MaskLine] {
        &self.lines
    }

    /// Number of external mask lines.
    pub fn width(&self) -> u32 {
        self.lines.len() as u32
    }

    /// Returns the external line that masks data bit `bit`.
    pub fn line_for_bit(&self, bit: u32) -> Option<u32> {
        self.lines
            .iter()
            .find(|l| (l.bits.lsb..=l.bits.msb).contains(&bit))
            .map(|l| l.line)
    }
}
