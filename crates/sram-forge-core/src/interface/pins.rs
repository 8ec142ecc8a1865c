use crate::interface::MaskFanout;
use crate::model::IoBudget;
use serde::Serialize;
use thiserror::Error;

/// Direction of an external pin as seen from the chip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PinDirection {
    /// Driven from outside the chip
    Input,
    /// Driven by the chip
    Output,
}

/// One external signal of the composed bus.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ExternalPin {
    /// Signal name
    pub name: String,
    /// Signal direction
    pub direction: PinDirection,
    /// Number of bits
    pub width: u32,
}

impl ExternalPin {
    fn new(name: &str, direction: PinDirection, width: u32) -> Self {
        ExternalPin {
            name: name.to_string(),
            direction,
            width,
        }
    }

    /// The pin set of a unified bus, in declaration order.
    ///
    /// Zero-width signals are left out, so a single one-word instance has no
    /// address pins.
    pub(crate) fn for_bus(
        address_bits: u32,
        data_width: u32,
        write_mask: Option<&MaskFanout>,
    ) -> Vec<Self> {
        use PinDirection::{Input, Output};
        let mut pins = vec![
            ExternalPin::new("clk", Input, 1),
            ExternalPin::new("ce_n", Input, 1),
            ExternalPin::new("we_n", Input, 1),
            ExternalPin::new("addr", Input, address_bits),
            ExternalPin::new("din", Input, data_width),
            ExternalPin::new("dout", Output, data_width),
        ];
        if let Some(mask) = write_mask {
            pins.push(ExternalPin::new("wem_n", Input, mask.width()));
        }
        pins.retain(|p| p.width > 0);
        pins
    }
}

/// Signal bits needed by a pin set, by direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct PinUsage {
    /// Input bits
    pub inputs: u32,
    /// Output bits
    pub outputs: u32,
}

impl PinUsage {
    /// Counts the signal bits of `pins`.
    pub fn of(pins: &[ExternalPin]) -> Self {
        pins.iter().fold(PinUsage::default(), |usage, pin| match pin.direction {
            PinDirection::Input => PinUsage {
                inputs: usage.inputs.saturating_add(pin.width),
                ..usage
            },
            PinDirection::Output => PinUsage {
                outputs: usage.outputs.saturating_add(pin.width),
                ..usage
            },
        })
    }

    /// Total signal bits.
    pub fn total(&self) -> u32 {
        self.inputs.saturating_add(self.outputs)
    }
}

/// Pads taken from the slot's budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct PadAssignment {
    /// Input-only pads in use
    pub input_pads: u32,
    /// Bidirectional pads in use
    pub bidir_pads: u32,
}

/// The slot does not have enough signal pads for the external bus.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error(
    "bus needs {} input and {} output signals, slot offers {} input and {} bidirectional pads",
    .usage.inputs, .usage.outputs, .budget.input, .budget.bidir
)]
pub struct PinBudgetError {
    /// Signals the bus needs
    pub usage: PinUsage,
    /// Pads the slot offers
    pub budget: IoBudget,
}

/// Assigns the signals of `usage` to the signal pads of `budget`.
///
/// Outputs need bidirectional pads. Inputs take input-only pads first and
/// bidirectional pads for the rest. Power and analog pads are never used.
///
/// # Errors
///
/// Returns a [`PinBudgetError`] if the signals do not fit.
///
/// # Examples
///
/// ```
/// use sram_forge_core::interface::{PinUsage, check_pin_budget};
/// use sram_forge_core::model::IoBudget;
///
/// let budget = IoBudget { dvdd: 8, dvss: 10, input: 12, bidir: 40, analog: 2 };
/// let pads = check_pin_budget(PinUsage { inputs: 34, outputs: 8 }, &budget).unwrap();
/// assert_eq!((pads.input_pads, pads.bidir_pads), (12, 30));
/// ```
pub fn check_pin_budget(
    usage: PinUsage,
    budget: &IoBudget,
) -> Result<PadAssignment, PinBudgetError> {
    let input_pads = usage.inputs.min(budget.input);
    let bidir_pads = usage.outputs.saturating_add(usage.inputs - input_pads);
    if bidir_pads > budget.bidir {
        return Err(PinBudgetError {
            usage,
            budget: *budget,
        });
    }
    Ok(PadAssignment {
        input_pads,
        bidir_pads,
    })
}
