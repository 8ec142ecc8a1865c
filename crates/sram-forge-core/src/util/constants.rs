/// Default routing halo around each macro, per side, in microns
pub const DEFAULT_HALO_UM: f64 = 10.0;

/// Number of data bits covered by one byte-enable line
pub const BYTE_WIDTH: u32 = 8;

/// Widest external address bus the composer will produce
pub const MAX_ADDRESS_BITS: u32 = 63;
