//! Fit planning: how many macro instances fit into a slot.
//!
//! The planner packs macros on a regular grid. Each macro occupies its footprint
//! plus a halo on every side. The grid starts as large as the core allows and
//! then gives up whole columns or rows until the area left over covers the
//! slot's reserved area. The policy is greedy and deterministic: when columns
//! and rows are equal, columns go first. Existing tape-outs rely on exactly this
//! outcome, so [`shrink_step`] must not change.

use crate::model::{Dimensions, MacroSpec, SlotGeometry, ValidationError, non_negative};
use crate::util::ceil_log2;
use log::{debug, info, warn};
use serde::Serialize;

/// Result of planning one macro into one slot.
///
/// A `FitResult` with `count == 0` is a valid outcome (the macro does not fit even
/// once); use [`FitResult::has_capacity`] to tell it apart.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FitResult {
    cols: u64,
    rows: u64,
    count: u64,
    words_per_instance: u64,
    total_words: u64,
    total_bits: u64,
    address_bits: u32,
    utilization: f64,
    halo_um: f64,
    footprint_um: Dimensions,
    shrink_steps: u32,
}

impl FitResult {
    /// Number of grid columns.
    pub fn cols(&self) -> u64 {
        self.cols
    }

    /// Number of grid rows.
    pub fn rows(&self) -> u64 {
        self.rows
    }

    /// Number of macro instances, `cols * rows`.
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Words stored by a single instance.
    pub fn words_per_instance(&self) -> u64 {
        self.words_per_instance
    }

    /// Words stored by all instances together.
    pub fn total_words(&self) -> u64 {
        self.total_words
    }

    /// Bits stored by all instances together.
    pub fn total_bits(&self) -> u64 {
        self.total_bits
    }

    /// Bytes stored by all instances together, rounded down.
    pub fn total_bytes(&self) -> u64 {
        self.total_bits / 8
    }

    /// Width of an address bus spanning every word, `ceil(log2(total_words))`.
    pub fn address_bits(&self) -> u32 {
        self.address_bits
    }

    /// Fraction of the core area covered by macros, halo excluded.
    pub fn utilization(&self) -> f64 {
        self.utilization
    }

    /// Halo used for planning, in microns per side.
    pub fn halo_um(&self) -> f64 {
        self.halo_um
    }

    /// Footprint of one grid cell, macro plus halo on both sides.
    pub fn footprint_um(&self) -> Dimensions {
        self.footprint_um
    }

    /// Number of columns or rows given up to make room for the reserved area.
    pub fn shrink_steps(&self) -> u32 {
        self.shrink_steps
    }

    /// Returns whether at least one instance fits.
    pub fn has_capacity(&self) -> bool {
        self.count > 0
    }

    /// Target standard-cell placement density, in percent, for the area left
    /// between the macros.
    ///
    /// The more of the core the macros occupy, the fewer standard cells remain,
    /// and a global placer diverges if its target density is far above the
    /// density it can actually reach.
    pub fn placement_density_pct(&self) -> u32 {
        match self.utilization {
            u if u > 0.80 => 2,
            u if u > 0.70 => 5,
            u if u > 0.50 => 10,
            u if u > 0.30 => 15,
            _ => 20,
        }
    }
}

/// One step of the shrink recurrence.
///
/// Removes a column if there are at least as many columns as rows, a row
/// otherwise. Returns `None` once the grid is down to a single instance. Every
/// step lowers `cols + rows` by one, so a grid of `cols₀ × rows₀` reaches `1 × 1`
/// after at most `cols₀ + rows₀ - 2` steps.
///
/// # Examples
///
/// ```
/// use sram_forge_core::fit::shrink_step;
///
/// assert_eq!(shrink_step(4, 4), Some((3, 4)));
/// assert_eq!(shrink_step(3, 4), Some((3, 3)));
/// assert_eq!(shrink_step(1, 1), None);
/// ```
pub fn shrink_step(cols: u64, rows: u64) -> Option<(u64, u64)> {
    if cols >= rows && cols > 1 {
        Some((cols - 1, rows))
    } else if rows > 1 {
        Some((cols, rows - 1))
    } else {
        None
    }
}

/// Plans how many instances of `sram` fit into `slot`.
///
/// # Arguments
///
/// * `slot` - Target slot
/// * `sram` - Macro to replicate
/// * `halo_um` - Clearance added on every side of each macro, in microns
/// * `reserved_override` - Reserved area to honour instead of the slot's own value
///
/// # Errors
///
/// Returns a [`ValidationError`] if the halo or the reserved override is negative
/// or not finite, or if the resulting capacity overflows 64 bits. A macro that
/// does not fit at all is not an error; the result then has `count == 0`.
///
/// # Examples
///
/// ```
/// use sram_forge_core::fit::plan_fit;
/// # use sram_forge_core::model::*;
/// # let slot = SlotGeometry::new(
/// #     Dimensions::new(200.0, 200.0), Inset::uniform(10.0), IoBudget::default(), 0.0).unwrap();
/// # let port = MacroPort { name: "p".into(), kind: PortKind::ReadWrite, clk_enable: true,
/// #     clk_polarity: ClockPolarity::Rising, pins: PinMap::clocked("CLK") };
/// # let sram = MacroSpec::new(MacroSource::Pdk, 64, 8, 6, Dimensions::new(100.0, 100.0), vec![port]).unwrap();
/// // 180 x 180 core, 120 x 120 effective macro
/// let fit = plan_fit(&slot, &sram, 10.0, None).unwrap();
/// assert_eq!((fit.cols(), fit.rows()), (1, 1));
/// assert_eq!(fit.address_bits(), 6);
/// ```
pub fn plan_fit(
    slot: &SlotGeometry,
    sram: &MacroSpec,
    halo_um: f64,
    reserved_override: Option<f64>,
) -> Result<FitResult, ValidationError> {
    let halo_um = non_negative("halo_um", halo_um)?;
    let reserved = match reserved_override {
        Some(area) => non_negative("reserved_area_um2", area)?,
        None => slot.reserved_area_um2(),
    };

    let core_w = slot.core_width();
    let core_h = slot.core_height();
    let core_area = slot.core_area_um2();

    let footprint = Dimensions::new(
        sram.dimensions().width + 2.0 * halo_um,
        sram.dimensions().height + 2.0 * halo_um,
    );
    let cell_area = footprint.area();

    let mut cols = (core_w / footprint.width).floor() as u64;
    let mut rows = (core_h / footprint.height).floor() as u64;
    let mut shrink_steps = 0;

    if cols == 0 || rows == 0 {
        warn!(
            "Macro footprint {:.2} x {:.2} um does not fit into core {:.2} x {:.2} um",
            footprint.width, footprint.height, core_w, core_h
        );
        cols = 0;
        rows = 0;
    } else {
        debug!("Initial grid {} x {} for core {:.2} x {:.2} um", cols, rows, core_w, core_h);
        let grid_area = |cols: u64, rows: u64| cols as f64 * rows as f64 * cell_area;
        while core_area - grid_area(cols, rows) < reserved {
            match shrink_step(cols, rows) {
                Some((c, r)) => {
                    debug!("Shrinking grid {} x {} -> {} x {}", cols, rows, c, r);
                    cols = c;
                    rows = r;
                    shrink_steps += 1;
                }
                None => {
                    warn!(
                        "Reserved area {:.0} um^2 cannot be honoured even with a single macro",
                        reserved
                    );
                    break;
                }
            }
        }
    }

    let count = cols
        .checked_mul(rows)
        .ok_or(ValidationError::Overflow("instance count"))?;
    let total_words = count
        .checked_mul(sram.size())
        .ok_or(ValidationError::Overflow("total words"))?;
    let total_bits = total_words
        .checked_mul(sram.width() as u64)
        .ok_or(ValidationError::Overflow("total bits"))?;
    let utilization = count as f64 * sram.area() / core_area;

    let fit = FitResult {
        cols,
        rows,
        count,
        words_per_instance: sram.size(),
        total_words,
        total_bits,
        address_bits: ceil_log2(total_words),
        utilization,
        halo_um,
        footprint_um: footprint,
        shrink_steps,
    };
    info!(
        "Fit {} x {} = {} instances, {} words, {} address bits, {:.1}% utilization",
        fit.cols,
        fit.rows,
        fit.count,
        fit.total_words,
        fit.address_bits,
        fit.utilization * 100.0
    );
    Ok(fit)
}
