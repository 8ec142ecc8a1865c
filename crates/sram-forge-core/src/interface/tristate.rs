use crate::address::{AddressMap, EnableDecode};
use crate::interface::interconnect::check_depth;
use crate::interface::{BusDriver, ConfigError, Interconnect, OutputPath, OutputRouting};
use itertools::Itertools;
use log::debug;

/// Shared output bus with one gated driver per instance.
///
/// A driver is active while its instance enable is asserted and presents high
/// impedance otherwise. The bus is free of contention only because the enables
/// partition the address space, so the strategy verifies that partition before
/// it hands out a path.
#[derive(Debug, Clone, Copy)]
pub struct SharedBus {
    registered: bool,
}

impl SharedBus {
    /// A shared bus wired straight to the data output pins.
    pub fn combinational() -> Self {
        SharedBus { registered: false }
    }

    /// A shared bus sampled by one output register.
    pub fn registered() -> Self {
        SharedBus { registered: true }
    }
}

impl Interconnect for SharedBus {
    fn discipline(&self) -> OutputRouting {
        if self.registered {
            OutputRouting::TristateRegistered
        } else {
            OutputRouting::Tristate
        }
    }

    fn output_stages(&self) -> u32 {
        u32::from(self.registered)
    }

    fn route(&self, map: &AddressMap) -> Result<OutputPath, ConfigError> {
        let enables = map.enables();
        self.check_enables(&enables)?;

        let drivers = enables
            .iter()
            .map(|enable| BusDriver {
                instance: enable.instance,
                enable: enable.to_string(),
            })
            .collect_vec();
        debug!(
            "Shared bus with {} drivers{}",
            drivers.len(),
            if self.registered { ", registered" } else { "" }
        );
        let path = OutputPath::SharedBus {
            drivers,
            registered: self.registered,
        };
        check_depth(self, &path)?;
        Ok(path)
    }
}

impl SharedBus {
    /// Checks that no two drivers are enabled for the same address.
    fn check_enables(&self, enables: &[EnableDecode]) -> Result<(), ConfigError> {
        let contention = |reason: String| ConfigError::Contention {
            discipline: self.discipline(),
            reason,
        };

        if !enables.iter().map(|e| e.select).all_equal() {
            return Err(contention("drivers decode different address bits".into()));
        }
        if let Some((_, code)) = enables.iter().map(|e| (e.select, e.value)).duplicates().next() {
            return Err(contention(format!(
                "select code {} enables several instances",
                code
            )));
        }
        if enables.len() > 1 && enables.iter().any(|e| e.select.is_none()) {
            return Err(contention(format!(
                "{} always-enabled drivers on one bus",
                enables.len()
            )));
        }
        Ok(())
    }
}
