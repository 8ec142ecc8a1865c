//! Address space composition.
//!
//! This module partitions the linear address range `[0, total_words)` across the
//! instances chosen by the fit planner. Instance `i` owns the window
//! `[i * size, (i + 1) * size)`. The upper address bits select the instance by
//! plain binary decode and the lower bits pass through unchanged as the
//! macro-local address:
//!
//! ```text
//!  address_bits-1        local_bits   local_bits-1        0
//! +---------------------------------+----------------------+
//! |        instance index           |    local address     |
//! +---------------------------------+----------------------+
//! ```
//!
//! The module provides:
//! - [`InstanceCount`]: `Auto` or `Fixed(n)`, resolved once against a [`FitResult`]
//! - [`AddressMap`]: the partition with decode and compose in both directions
//! - [`EnableDecode`]: the per-instance enable condition

mod decode;

pub use self::decode::{BitRange, DecodedAddress, EnableDecode};

use crate::fit::FitResult;
use crate::model::MacroSpec;
use crate::util::{MAX_ADDRESS_BITS, ceil_log2, mask};
use itertools::Itertools;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use thiserror::Error;

/// Errors that can occur while composing an address space.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ComposeError {
    /// An explicit instance count exceeds what fits into the slot.
    #[error("{requested} instances requested but only {available} fit into the slot")]
    Capacity {
        /// Requested number of instances
        requested: u64,
        /// Number of instances the fit planner found room for
        available: u64,
    },
    /// The resolved instance count is zero.
    #[error("no macro instance is available to compose")]
    NoCapacity,
    /// Bit-sliced decode needs power-of-two windows.
    #[error("macro size {0} is not a power of two and cannot form a gapless bit-sliced address space")]
    NonBinaryWindow(u64),
    /// The fit was planned for a different macro.
    #[error("fit was planned for {planned}-word macros but the macro has {actual} words")]
    MacroMismatch {
        /// Words per instance recorded in the fit
        planned: u64,
        /// Words of the macro handed to the composer
        actual: u64,
    },
    /// The composed bus would be wider than supported.
    #[error("composed address space needs {0} address bits, more than the supported {max}", max = MAX_ADDRESS_BITS)]
    AddressTooWide(u32),
}

/// Number of macro instances to compose.
///
/// Deserializes from the string `"auto"` or a non-negative integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "CountDef", into = "CountDef")]
pub enum InstanceCount {
    /// As many instances as the fit planner found room for
    #[default]
    Auto,
    /// An explicit number of instances
    Fixed(u64),
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum CountDef {
    Fixed(u64),
    Keyword(String),
}

impl TryFrom<CountDef> for InstanceCount {
    type Error = String;

    fn try_from(def: CountDef) -> Result<Self, Self::Error> {
        match def {
            CountDef::Fixed(n) => Ok(InstanceCount::Fixed(n)),
            CountDef::Keyword(k) if k == "auto" => Ok(InstanceCount::Auto),
            CountDef::Keyword(k) => Err(format!("expected \"auto\" or an integer, got {:?}", k)),
        }
    }
}

impl From<InstanceCount> for CountDef {
    fn from(count: InstanceCount) -> Self {
        match count {
            InstanceCount::Auto => CountDef::Keyword("auto".into()),
            InstanceCount::Fixed(n) => CountDef::Fixed(n),
        }
    }
}

impl Display for InstanceCount {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            InstanceCount::Auto => f.write_str("auto"),
            InstanceCount::Fixed(n) => write!(f, "{}", n),
        }
    }
}

impl InstanceCount {
    /// Resolves the count against the capacity found by the fit planner.
    ///
    /// # Errors
    ///
    /// * [`ComposeError::Capacity`] if a fixed count exceeds `fit.count()`. The
    ///   count is never clamped.
    /// * [`ComposeError::NoCapacity`] if the resolved count is zero.
    pub fn resolve(self, fit: &FitResult) -> Result<u64, ComposeError> {
        let count = match self {
            InstanceCount::Auto => fit.count(),
            InstanceCount::Fixed(requested) if requested > fit.count() => {
                return Err(ComposeError::Capacity {
                    requested,
                    available: fit.count(),
                });
            }
            InstanceCount::Fixed(requested) => requested,
        };
        if count == 0 {
            return Err(ComposeError::NoCapacity);
        }
        Ok(count)
    }
}

/// The address window owned by one instance, `[base, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct AddressWindow {
    /// Instance index
    pub instance: u64,
    /// First address of the window
    pub base: u64,
    /// One past the last address of the window
    pub end: u64,
}

impl AddressWindow {
    /// Returns whether `address` lies inside the window.
    pub fn contains(&self, address: u64) -> bool {
        (self.base..self.end).contains(&address)
    }

    /// Number of addresses in the window.
    pub fn len(&self) -> u64 {
        self.end - self.base
    }

    /// Returns whether the window is empty. Composed windows never are.
    pub fn is_empty(&self) -> bool {
        self.end == self.base
    }
}

/// Partition of a linear address range across macro instances.
///
/// # Invariants
///
/// * `windows` are ordered by instance, contiguous, non-overlapping and cover
///   exactly `[0, total_words)`
/// * every window holds `words_per_instance = 2^local_bits` addresses
/// * `address_bits = ceil(log2(total_words))`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AddressMap {
    instance_count: u64,
    words_per_instance: u64,
    total_words: u64,
    address_bits: u32,
    local_bits: u32,
    macro_abits: u32,
    select: Option<BitRange>,
    windows: Vec<AddressWindow>,
}

/// Composes the address space of `count` instances of `sram`.
///
/// Shorthand for [`AddressMap::compose`].
pub fn compose_address_space(
    sram: &MacroSpec,
    fit: &FitResult,
    count: InstanceCount,
) -> Result<AddressMap, ComposeError> {
    AddressMap::compose(sram, fit, count)
}

impl AddressMap {
    /// Composes the address space of `count` instances of `sram`.
    ///
    /// # Arguments
    ///
    /// * `sram` - The replicated macro; must be the macro `fit` was planned for
    /// * `fit` - Capacity found by the fit planner
    /// * `count` - Number of instances to use
    ///
    /// # Errors
    ///
    /// Returns a [`ComposeError`] if the count cannot be resolved against the
    /// fit, if the fit belongs to another macro, or if the macro's word count is
    /// not a power of two.
    pub fn compose(
        sram: &MacroSpec,
        fit: &FitResult,
        count: InstanceCount,
    ) -> Result<Self, ComposeError> {
        if fit.words_per_instance() != sram.size() {
            return Err(ComposeError::MacroMismatch {
                planned: fit.words_per_instance(),
                actual: sram.size(),
            });
        }
        let instance_count = count.resolve(fit)?;
        let words_per_instance = sram.size();
        if !words_per_instance.is_power_of_two() {
            return Err(ComposeError::NonBinaryWindow(words_per_instance));
        }
        let local_bits = words_per_instance.trailing_zeros();

        // bounded by fit.total_words(), which the fit planner computed without overflow
        let total_words = instance_count * words_per_instance;
        let address_bits = ceil_log2(total_words);
        if address_bits > MAX_ADDRESS_BITS {
            return Err(ComposeError::AddressTooWide(address_bits));
        }
        let select = BitRange::from_width(local_bits, address_bits - local_bits);

        let windows = (0..instance_count)
            .map(|instance| AddressWindow {
                instance,
                base: instance * words_per_instance,
                end: (instance + 1) * words_per_instance,
            })
            .collect();

        let map = AddressMap {
            instance_count,
            words_per_instance,
            total_words,
            address_bits,
            local_bits,
            macro_abits: sram.abits(),
            select,
            windows,
        };
        debug_assert!(map.is_partition());
        match map.select {
            Some(select) => debug!("Instance select on address bits {}", select),
            None => debug!("Single instance, no instance select"),
        }
        info!(
            "Composed {} instances x {} words = {} words on {} address bits",
            map.instance_count, map.words_per_instance, map.total_words, map.address_bits
        );
        Ok(map)
    }

    /// Number of composed instances.
    pub fn instance_count(&self) -> u64 {
        self.instance_count
    }

    /// Words owned by each instance.
    pub fn words_per_instance(&self) -> u64 {
        self.words_per_instance
    }

    /// Size of the composed address space.
    pub fn total_words(&self) -> u64 {
        self.total_words
    }

    /// Width of the external address bus.
    pub fn address_bits(&self) -> u32 {
        self.address_bits
    }

    /// Width of the macro-local part of the address.
    pub fn local_bits(&self) -> u32 {
        self.local_bits
    }

    /// Width of the macro address pins. The local address is zero-extended to it.
    pub fn macro_abits(&self) -> u32 {
        self.macro_abits
    }

    /// Address bits selecting the instance, `None` for a single instance.
    pub fn select(&self) -> Option<BitRange> {
        self.select
    }

    /// Width of the instance select field.
    pub fn select_bits(&self) -> u32 {
        self.select.map_or(0, |s| s.width())
    }

    /// Windows ordered by instance index.
    pub fn windows(&self) -> &[AddressWindow] {
        &self.windows
    }

    /// Splits `address` into instance index and local address.
    ///
    /// Returns `None` for addresses outside `[0, total_words)`.
    ///
    /// ```
    /// # use sram_forge_core::address::{AddressMap, DecodedAddress, InstanceCount};
    /// # use sram_forge_core::fit::plan_fit;
    /// # use sram_forge_core::model::{
    /// #     ClockPolarity, Dimensions, Inset, IoBudget, MacroPort, MacroSource, MacroSpec, PinMap,
    /// #     PortKind, SlotGeometry,
    /// # };
    /// # fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// # let port = MacroPort {
    /// #     name: "port0".into(),
    /// #     kind: PortKind::ReadWrite,
    /// #     clk_enable: true,
    /// #     clk_polarity: ClockPolarity::Rising,
    /// #     pins: PinMap::clocked("CLK"),
    /// # };
    /// # let sram = MacroSpec::new(
    /// #     MacroSource::Pdk, 512, 8, 9, Dimensions::new(431.86, 484.88), vec![port],
    /// # )?;
    /// # let slot = SlotGeometry::new(
    /// #     Dimensions::new(3932.0, 5122.0), Inset::uniform(442.0), IoBudget::default(), 50_000.0,
    /// # )?;
    /// # let fit = plan_fit(&slot, &sram, 10.0, None)?;
    /// let map = AddressMap::compose(&sram, &fit, InstanceCount::Auto)?;
    /// // 48 instances of 512 words
    /// assert_eq!(map.instance_count(), 48);
    /// assert_eq!(map.decompose(1537), Some(DecodedAddress { instance: 3, local: 1 }));
    /// assert_eq!(map.decompose(24576), None);
    /// # Ok(())
    /// # }
    /// ```
    pub fn decompose(&self, address: u64) -> Option<DecodedAddress> {
        (address < self.total_words).then(|| DecodedAddress {
            instance: address >> self.local_bits,
            local: address & mask(self.local_bits),
        })
    }

    /// Joins instance index and local address back into an external address.
    ///
    /// Returns `None` if the instance does not exist or the local address lies
    /// outside its window.
    pub fn compose_address(&self, decoded: DecodedAddress) -> Option<u64> {
        (decoded.instance < self.instance_count && decoded.local < self.words_per_instance)
            .then(|| (decoded.instance << self.local_bits) | decoded.local)
    }

    /// Returns the enable condition of `instance`.
    pub fn enable(&self, instance: u64) -> Option<EnableDecode> {
        (instance < self.instance_count).then_some(EnableDecode {
            instance,
            select: self.select,
            value: instance,
        })
    }

    /// Returns the enable conditions of all instances, ordered by instance.
    pub fn enables(&self) -> Vec<EnableDecode> {
        (0..self.instance_count)
            .filter_map(|instance| self.enable(instance))
            .collect()
    }

    /// Returns the window that contains `address`.
    pub fn window_of(&self, address: u64) -> Option<&AddressWindow> {
        let decoded = self.decompose(address)?;
        self.windows.get(decoded.instance as usize)
    }

    /// Checks that the windows form a gapless, non-overlapping cover of
    /// `[0, total_words)`.
    pub fn is_partition(&self) -> bool {
        let starts_at_zero = self.windows.first().is_some_and(|w| w.base == 0);
        let ends_at_total = self.windows.last().is_some_and(|w| w.end == self.total_words);
        let sized = self
            .windows
            .iter()
            .enumerate()
            .all(|(i, w)| w.instance == i as u64 && w.len() == self.words_per_instance);
        let contiguous = self
            .windows
            .iter()
            .tuple_windows()
            .all(|(a, b)| a.end == b.base);
        starts_at_zero && ends_at_total && sized && contiguous
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fit::plan_fit;
    use crate::model::{
        ClockPolarity, Dimensions, Inset, IoBudget, MacroPort, MacroSource, PinMap, PortKind,
        SlotGeometry,
    };
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn sram(size: u64, abits: u32) -> MacroSpec {
        let port = MacroPort {
            name: "port0".into(),
            kind: PortKind::ReadWrite,
            clk_enable: true,
            clk_polarity: ClockPolarity::Rising,
            pins: PinMap::clocked("CLK"),
        };
        MacroSpec::new(
            MacroSource::Pdk,
            size,
            8,
            abits,
            Dimensions::new(431.86, 484.88),
            vec![port],
        )
        .unwrap()
    }

    fn reference_fit(sram: &MacroSpec) -> FitResult {
        let slot = SlotGeometry::new(
            Dimensions::new(3932.0, 5122.0),
            Inset::uniform(442.0),
            IoBudget::default(),
            50_000.0,
        )
        .unwrap();
        plan_fit(&slot, sram, 10.0, None).unwrap()
    }

    #[test]
    fn test_auto_uses_fit_capacity() {
        let s = sram(512, 9);
        let map = AddressMap::compose(&s, &reference_fit(&s), InstanceCount::Auto).unwrap();
        assert_eq!(map.instance_count(), 48);
        assert_eq!(map.total_words(), 24576);
        assert_eq!(map.address_bits(), 15);
        assert_eq!(map.local_bits(), 9);
        assert_eq!(map.select(), BitRange::from_width(9, 6));
        assert_eq!(map.windows().len(), 48);
        assert!(map.is_partition());
    }

    #[test]
    fn test_fixed_count_above_capacity_is_rejected() {
        let s = sram(512, 9);
        let err = AddressMap::compose(&s, &reference_fit(&s), InstanceCount::Fixed(100)).unwrap_err();
        assert_eq!(
            err,
            ComposeError::Capacity {
                requested: 100,
                available: 48
            }
        );
    }

    #[test]
    fn test_zero_count_is_no_capacity() {
        let s = sram(512, 9);
        let err = AddressMap::compose(&s, &reference_fit(&s), InstanceCount::Fixed(0)).unwrap_err();
        assert_eq!(err, ComposeError::NoCapacity);
    }

    #[test]
    fn test_fixed_count_below_capacity() {
        let s = sram(512, 9);
        let map = AddressMap::compose(&s, &reference_fit(&s), InstanceCount::Fixed(16)).unwrap();
        assert_eq!(map.total_words(), 8192);
        assert_eq!(map.address_bits(), 13);
        assert_eq!(map.select_bits(), 4);
    }

    #[test]
    fn test_single_instance_has_no_select() {
        let s = sram(512, 9);
        let map = AddressMap::compose(&s, &reference_fit(&s), InstanceCount::Fixed(1)).unwrap();
        assert_eq!(map.select(), None);
        assert_eq!(map.address_bits(), 9);
        assert_eq!(map.enable(0).unwrap().to_string(), "1'b1");
        assert_eq!(map.enable(1), None);
    }

    #[test]
    fn test_non_binary_window_is_rejected() {
        let s = sram(500, 9);
        let err = AddressMap::compose(&s, &reference_fit(&s), InstanceCount::Auto).unwrap_err();
        assert_eq!(err, ComposeError::NonBinaryWindow(500));
    }

    #[test]
    fn test_wide_macro_address_is_zero_extended() {
        let s = sram(256, 10);
        let map = AddressMap::compose(&s, &reference_fit(&s), InstanceCount::Fixed(4)).unwrap();
        assert_eq!(map.local_bits(), 8);
        assert_eq!(map.macro_abits(), 10);
        assert_eq!(map.address_bits(), 10);
        assert_eq!(map.decompose(0x2ff), Some(DecodedAddress { instance: 2, local: 0xff }));
    }

    #[test]
    fn test_fit_for_other_macro_is_rejected() {
        let s = sram(512, 9);
        let other = sram(256, 8);
        let err = AddressMap::compose(&other, &reference_fit(&s), InstanceCount::Auto).unwrap_err();
        assert_eq!(
            err,
            ComposeError::MacroMismatch {
                planned: 512,
                actual: 256
            }
        );
    }

    #[test]
    fn test_decode_roundtrip_and_exclusive_enables() {
        let s = sram(512, 9);
        let map = AddressMap::compose(&s, &reference_fit(&s), InstanceCount::Auto).unwrap();
        let enables = map.enables();
        let mut rng = StdRng::seed_from_u64(0x5eed);
        for _ in 0..10_000 {
            let address = rng.random_range(0..map.total_words());
            let decoded = map.decompose(address).unwrap();
            assert_eq!(map.compose_address(decoded), Some(address));
            let window = map.window_of(address).unwrap();
            assert!(window.contains(address));
            assert_eq!(window.instance, decoded.instance);
            let active: Vec<_> = enables.iter().filter(|e| e.matches(address)).collect();
            assert_eq!(active.len(), 1, "address {}", address);
            assert_eq!(active[0].instance, decoded.instance);
        }
        assert_eq!(map.decompose(map.total_words()), None);
    }

    #[test]
    fn test_compose_address_rejects_out_of_range() {
        let s = sram(512, 9);
        let map = AddressMap::compose(&s, &reference_fit(&s), InstanceCount::Auto).unwrap();
        assert_eq!(map.compose_address(DecodedAddress { instance: 48, local: 0 }), None);
        assert_eq!(map.compose_address(DecodedAddress { instance: 0, local: 512 }), None);
        assert_eq!(
            map.compose_address(DecodedAddress { instance: 47, local: 511 }),
            Some(24575)
        );
    }

    #[test]
    fn test_instance_count_serde() {
        let auto: InstanceCount = serde_json::from_str("\"auto\"").unwrap();
        assert_eq!(auto, InstanceCount::Auto);
        let fixed: InstanceCount = serde_json::from_str("14").unwrap();
        assert_eq!(fixed, InstanceCount::Fixed(14));
        assert!(serde_json::from_str::<InstanceCount>("\"many\"").is_err());
        assert!(serde_json::from_str::<InstanceCount>("-1").is_err());
        assert_eq!(serde_json::to_string(&InstanceCount::Auto).unwrap(), "\"auto\"");
        assert_eq!(serde_json::to_string(&InstanceCount::Fixed(3)).unwrap(), "3");
    }
}
