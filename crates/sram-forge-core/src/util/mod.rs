//! Utility functions and types used throughout SRAM Forge.
//!
//! This module provides:
//! - Bit-width arithmetic ([`ceil_log2`], [`mask`])
//! - Constants shared by the planning and synthesis stages ([`DEFAULT_HALO_UM`], [`BYTE_WIDTH`])

mod bits;
mod constants;

pub use self::bits::*;
pub use self::constants::*;
