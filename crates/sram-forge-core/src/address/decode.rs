use crate::util::mask;
use serde::Serialize;
use std::fmt::{self, Display, Formatter};

/// Inclusive bit slice `[msb:lsb]` of an address bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct BitRange {
    /// Most significant bit, inclusive
    pub msb: u32,
    /// Least significant bit, inclusive
    pub lsb: u32,
}

impl BitRange {
    /// Returns the slice of `width` bits starting at `lsb`, or `None` for an empty slice.
    pub fn from_width(lsb: u32, width: u32) -> Option<Self> {
        (width > 0).then(|| BitRange {
            msb: lsb + width - 1,
            lsb,
        })
    }

    /// Number of bits in the slice.
    pub fn width(&self) -> u32 {
        self.msb - self.lsb + 1
    }

    /// Extracts the slice from `value`.
    pub fn extract(&self, value: u64) -> u64 {
        (value >> self.lsb) & mask(self.width())
    }
}

impl Display for BitRange {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.msb == self.lsb {
            write!(f, "[{}]", self.lsb)
        } else {
            write!(f, "[{}:{}]", self.msb, self.lsb)
        }
    }
}

/// An external address split into instance index and macro-local address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct DecodedAddress {
    /// Index of the instance that stores the word
    pub instance: u64,
    /// Address presented to that instance
    pub local: u64,
}

/// Enable condition of one macro instance.
///
/// The instance is enabled when the select slice of the external address equals
/// `value`. An enable without a select slice is always asserted; that is the
/// case for a composition of a single instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct EnableDecode {
    /// Instance this enable belongs to
    pub instance: u64,
    /// Address bits compared against `value`
    pub select: Option<BitRange>,
    /// Select code of the instance
    pub value: u64,
}

impl EnableDecode {
    /// Returns whether the enable is asserted for `address`.
    pub fn matches(&self, address: u64) -> bool {
        match self.select {
            Some(select) => select.extract(address) == self.value,
            None => true,
        }
    }

    /// Renders the enable as a comparison on the bus called `signal`.
    ///
    /// ```
    /// use sram_forge_core::address::{BitRange, EnableDecode};
    ///
    /// let en = EnableDecode { instance: 5, select: BitRange::from_width(9, 6), value: 5 };
    /// assert_eq!(en.expression("addr"), "addr[14:9] == 6'd5");
    /// ```
    pub fn expression(&self, signal: &str) -> String {
        match self.select {
            Some(select) => format!("{}{} == {}'d{}", signal, select, select.width(), self.value),
            None => "1'b1".to_string(),
        }
    }
}

impl Display for EnableDecode {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.expression("addr"))
    }
}
