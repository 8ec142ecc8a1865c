use crate::address::{AddressMap, BitRange};
use crate::interface::interconnect::check_depth;
use crate::interface::{ConfigError, Interconnect, MuxInput, OutputPath, OutputRouting};
use crate::util::mask;
use itertools::Itertools;
use log::debug;

/// Combinational output selector.
///
/// The selector is driven by the same address bits as the enable decode, so
/// exactly one instance reaches the bus for every address.
#[derive(Debug, Clone, Copy, Default)]
pub struct MuxSelect;

impl Interconnect for MuxSelect {
    fn discipline(&self) -> OutputRouting {
        OutputRouting::Mux
    }

    fn output_stages(&self) -> u32 {
        0
    }

    fn route(&self, map: &AddressMap) -> Result<OutputPath, ConfigError> {
        let select = map.select();
        let inputs: Vec<MuxInput> = map
            .enables()
            .into_iter()
            .map(|enable| MuxInput {
                code: enable.value,
                instance: enable.instance,
            })
            .sorted_by_key(|input| input.code)
            .collect();
        self.check_inputs(select, &inputs)?;

        debug!("Mux with {} inputs on {} select bits", inputs.len(), map.select_bits());
        let path = OutputPath::Mux { select, inputs };
        check_depth(self, &path)?;
        Ok(path)
    }
}

impl MuxSelect {
    /// Checks that every select code routes exactly one input to the bus.
    fn check_inputs(
        &self,
        select: Option<BitRange>,
        inputs: &[MuxInput],
    ) -> Result<(), ConfigError> {
        let contention = |reason: String| ConfigError::Contention {
            discipline: self.discipline(),
            reason,
        };

        if let Some(duplicate) = inputs.iter().map(|i| i.code).duplicates().next() {
            return Err(contention(format!(
                "select code {} reaches several instances",
                duplicate
            )));
        }
        let select_bits = select.map_or(0, |s| s.width());
        let max_code = mask(select_bits);
        if let Some(input) = inputs.iter().find(|i| i.code > max_code) {
            return Err(contention(format!(
                "instance {} has select code {} beyond {} select bits",
                input.instance, input.code, select_bits
            )));
        }
        if select.is_none() && inputs.len() > 1 {
            return Err(contention(format!(
                "{} instances share the bus without select bits",
                inputs.len()
            )));
        }
        Ok(())
    }
}
