//! Output routing strategies.
//!
//! This module defines the [`Interconnect`] trait. Every [`OutputRouting`]
//! discipline has one implementation, selected once by
//! [`OutputRouting::strategy`].

use crate::address::{AddressMap, BitRange};
use crate::interface::{ConfigError, OutputRouting};
use serde::Serialize;

/// Builds the path from the instance data outputs to the external data bus.
///
/// Implementors check their own invariants before they return a path: at most
/// one driver reaches the bus for every address, and the path has exactly
/// [`output_stages`](Interconnect::output_stages) register stages.
pub trait Interconnect {
    /// The discipline this strategy implements.
    fn discipline(&self) -> OutputRouting;

    /// Register stages the discipline inserts between the macros and the pins.
    fn output_stages(&self) -> u32;

    /// Builds the output path for `map`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Contention`] if two instances could drive the bus
    /// at the same time, and [`ConfigError::PipelineDepth`] if the path does not
    /// have the discipline's number of stages.
    fn route(&self, map: &AddressMap) -> Result<OutputPath, ConfigError>;
}

/// One selector input of a multiplexed output path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct MuxInput {
    /// Select code that routes this input to the bus
    pub code: u64,
    /// Instance whose `dout` feeds this input
    pub instance: u64,
}

/// One driver of a shared output bus.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct BusDriver {
    /// Instance that drives the bus
    pub instance: u64,
    /// Condition under which the driver is enabled; high impedance otherwise
    pub enable: String,
}

/// Path from the instance outputs to the external data bus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OutputPath {
    /// A selector driven by the instance select bits
    Mux {
        /// Address bits driving the selector, `None` for a single instance
        select: Option<BitRange>,
        /// Selector inputs ordered by code
        inputs: Vec<MuxInput>,
    },
    /// A bus shared by gated drivers
    SharedBus {
        /// Drivers ordered by instance
        drivers: Vec<BusDriver>,
        /// Whether the bus is registered before it reaches the pins
        registered: bool,
    },
}

impl OutputPath {
    /// Register stages on the path.
    pub fn stages(&self) -> u32 {
        match self {
            OutputPath::Mux { .. } => 0,
            OutputPath::SharedBus { registered, .. } => u32::from(*registered),
        }
    }

    /// Number of instances connected to the path.
    pub fn fan_in(&self) -> usize {
        match self {
            OutputPath::Mux { inputs, .. } => inputs.len(),
            OutputPath::SharedBus { drivers, .. } => drivers.len(),
        }
    }
}

/// Checks that `path` has as many stages as `strategy` promises.
pub(crate) fn check_depth(
    strategy: &dyn Interconnect,
    path: &OutputPath,
) -> Result<(), ConfigError> {
    let (expected, actual) = (strategy.output_stages(), path.stages());
    if expected == actual {
        Ok(())
    } else {
        Err(ConfigError::PipelineDepth {
            discipline: strategy.discipline(),
            expected,
            actual,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_path_serializes_tagged() {
        let path = OutputPath::SharedBus {
            drivers: vec![BusDriver {
                instance: 0,
                enable: "1'b1".into(),
            }],
            registered: true,
        };
        let value = serde_json::to_value(&path).unwrap();
        assert_eq!(value["kind"], "shared_bus");
        assert_eq!(value["drivers"][0]["enable"], "1'b1");
        assert_eq!(path.stages(), 1);
        assert_eq!(path.fan_in(), 1);
    }

    #[test]
    fn test_strategy_dispatch() {
        for routing in [
            OutputRouting::Mux,
            OutputRouting::Tristate,
            OutputRouting::TristateRegistered,
        ] {
            assert_eq!(routing.strategy().discipline(), routing);
        }
        assert_eq!(OutputRouting::Mux.strategy().output_stages(), 0);
        assert_eq!(OutputRouting::Tristate.strategy().output_stages(), 0);
        assert_eq!(OutputRouting::TristateRegistered.strategy().output_stages(), 1);
    }

    /// Promises a register stage but routes through a bare mux.
    struct UnregisteredMux;

    impl Interconnect for UnregisteredMux {
        fn discipline(&self) -> OutputRouting {
            OutputRouting::TristateRegistered
        }

        fn output_stages(&self) -> u32 {
            1
        }

        fn route(&self, _map: &AddressMap) -> Result<OutputPath, ConfigError> {
            unreachable!()
        }
    }

    #[test]
    fn test_stage_mismatch_is_rejected() {
        let path = OutputPath::Mux {
            select: None,
            inputs: vec![MuxInput {
                code: 0,
                instance: 0,
            }],
        };
        assert_eq!(
            check_depth(&UnregisteredMux, &path),
            Err(ConfigError::PipelineDepth {
                discipline: OutputRouting::TristateRegistered,
                expected: 1,
                actual: 0,
            })
        );
        let registered = OutputPath::SharedBus {
            drivers: vec![],
            registered: true,
        };
        assert_eq!(check_depth(&UnregisteredMux, &registered), Ok(()));
    }
}
