use crate::model::{Dimensions, ValidationError, non_negative, positive};
use serde::{Deserialize, Serialize};

/// Distance from each die edge to the core boundary, in microns.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Inset {
    /// Left inset
    pub left: f64,
    /// Bottom inset
    pub bottom: f64,
    /// Right inset
    pub right: f64,
    /// Top inset
    pub top: f64,
}

impl Inset {
    /// Creates the same inset on all four sides.
    pub fn uniform(inset: f64) -> Self {
        Inset {
            left: inset,
            bottom: inset,
            right: inset,
            top: inset,
        }
    }
}

/// Available I/O pads by category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct IoBudget {
    /// VDD power pads
    pub dvdd: u32,
    /// VSS ground pads
    pub dvss: u32,
    /// Input-only pads
    pub input: u32,
    /// Bidirectional pads
    pub bidir: u32,
    /// Analog pads
    pub analog: u32,
}

impl IoBudget {
    /// Total signal pads, excluding power and ground.
    pub fn total_signal_pins(&self) -> u32 {
        self.input.saturating_add(self.bidir).saturating_add(self.analog)
    }
}

/// Axis-aligned rectangle in microns.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    /// Left edge
    pub x_min: f64,
    /// Bottom edge
    pub y_min: f64,
    /// Right edge
    pub x_max: f64,
    /// Top edge
    pub y_max: f64,
}

impl Rect {
    /// Returns the rectangle as `[x_min, y_min, x_max, y_max]`, the form
    /// physical-design flows expect for die and core areas.
    pub fn to_array(&self) -> [f64; 4] {
        [self.x_min, self.y_min, self.x_max, self.y_max]
    }
}

/// Target die slot: outline, core insets, pad budget and reserved area.
///
/// # Invariants
///
/// * die width and height are finite and `> 0`
/// * every inset and the reserved area are finite and `>= 0`
/// * the core (die minus insets) has positive width and height
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "SlotDef", into = "SlotDef")]
pub struct SlotGeometry {
    die: Dimensions,
    inset: Inset,
    io_budget: IoBudget,
    reserved_area_um2: f64,
}

#[derive(Clone, Serialize, Deserialize)]
struct CoreDef {
    inset: Inset,
}

#[derive(Clone, Serialize, Deserialize)]
struct SlotDef {
    die: Dimensions,
    core: CoreDef,
    io_budget: IoBudget,
    reserved_area_um2: f64,
}

impl TryFrom<SlotDef> for SlotGeometry {
    type Error = ValidationError;

    fn try_from(def: SlotDef) -> Result<Self, Self::Error> {
        SlotGeometry::new(def.die, def.core.inset, def.io_budget, def.reserved_area_um2)
    }
}

impl From<SlotGeometry> for SlotDef {
    fn from(slot: SlotGeometry) -> Self {
        SlotDef {
            die: slot.die,
            core: CoreDef { inset: slot.inset },
            io_budget: slot.io_budget,
            reserved_area_um2: slot.reserved_area_um2,
        }
    }
}

impl SlotGeometry {
    /// Creates a validated slot.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] if a dimension is not positive, an inset or
    /// the reserved area is negative, or the insets leave no core area.
    ///
    /// # Examples
    ///
    /// ```
    /// use sram_forge_core::model::{Dimensions, Inset, IoBudget, SlotGeometry};
    ///
    /// let slot = SlotGeometry::new(
    ///     Dimensions::new(3932.0, 5122.0),
    ///     Inset::uniform(442.0),
    ///     IoBudget::default(),
    ///     50_000.0,
    /// )
    /// .unwrap();
    /// assert_eq!(slot.core_width(), 3048.0);
    /// assert_eq!(slot.core_height(), 4238.0);
    /// ```
    pub fn new(
        die: Dimensions,
        inset: Inset,
        io_budget: IoBudget,
        reserved_area_um2: f64,
    ) -> Result<Self, ValidationError> {
        positive("die.width", die.width)?;
        positive("die.height", die.height)?;
        non_negative("core.inset.left", inset.left)?;
        non_negative("core.inset.bottom", inset.bottom)?;
        non_negative("core.inset.right", inset.right)?;
        non_negative("core.inset.top", inset.top)?;
        non_negative("reserved_area_um2", reserved_area_um2)?;

        let slot = SlotGeometry {
            die,
            inset,
            io_budget,
            reserved_area_um2,
        };
        let (width, height) = (slot.core_width(), slot.core_height());
        if width <= 0.0 || height <= 0.0 {
            return Err(ValidationError::EmptyCore { width, height });
        }
        Ok(slot)
    }

    /// Returns the die outline.
    pub fn die(&self) -> Dimensions {
        self.die
    }

    /// Returns the core insets.
    pub fn inset(&self) -> Inset {
        self.inset
    }

    /// Returns the pad budget.
    pub fn io_budget(&self) -> IoBudget {
        self.io_budget
    }

    /// Returns the area reserved for non-memory logic (logo, ID, glue logic).
    pub fn reserved_area_um2(&self) -> f64 {
        self.reserved_area_um2
    }

    /// Usable core width in microns.
    pub fn core_width(&self) -> f64 {
        self.die.width - self.inset.left - self.inset.right
    }

    /// Usable core height in microns.
    pub fn core_height(&self) -> f64 {
        self.die.height - self.inset.bottom - self.inset.top
    }

    /// Usable core area in square microns.
    pub fn core_area_um2(&self) -> f64 {
        self.core_width() * self.core_height()
    }

    /// Returns the die and core rectangles, in that order.
    pub fn areas(&self) -> (Rect, Rect) {
        let die = Rect {
            x_min: 0.0,
            y_min: 0.0,
            x_max: self.die.width,
            y_max: self.die.height,
        };
        let core = Rect {
            x_min: self.inset.left,
            y_min: self.inset.bottom,
            x_max: self.die.width - self.inset.right,
            y_max: self.die.height - self.inset.top,
        };
        (die, core)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "die": {"width": 3932, "height": 5122},
        "core": {"inset": {"left": 442, "bottom": 442, "right": 442, "top": 442}},
        "io_budget": {"dvdd": 8, "dvss": 10, "input": 12, "bidir": 40, "analog": 2},
        "reserved_area_um2": 50000
    }"#;

    #[test]
    fn test_deserialize_sample() {
        let slot: SlotGeometry = serde_json::from_str(SAMPLE).expect("valid slot");
        assert_eq!(slot.die().width, 3932.0);
        assert_eq!(slot.inset().left, 442.0);
        assert_eq!(slot.core_width(), 3048.0);
        assert_eq!(slot.core_height(), 4238.0);
        assert_eq!(slot.core_area_um2(), 3048.0 * 4238.0);
        assert_eq!(slot.io_budget().total_signal_pins(), 12 + 40 + 2);
        assert_eq!(slot.reserved_area_um2(), 50_000.0);
    }

    #[test]
    fn test_areas() {
        let slot: SlotGeometry = serde_json::from_str(SAMPLE).unwrap();
        let (die, core) = slot.areas();
        assert_eq!(die.to_array(), [0.0, 0.0, 3932.0, 5122.0]);
        assert_eq!(core.to_array(), [442.0, 442.0, 3490.0, 4680.0]);
    }

    #[test]
    fn test_serialize_keeps_nested_core() {
        let slot: SlotGeometry = serde_json::from_str(SAMPLE).unwrap();
        let value = serde_json::to_value(&slot).unwrap();
        assert_eq!(value["core"]["inset"]["top"], 442.0);
        let again: SlotGeometry = serde_json::from_value(value).unwrap();
        assert_eq!(slot, again);
    }

    #[test]
    fn test_rejects_empty_core() {
        let err = SlotGeometry::new(
            Dimensions::new(100.0, 100.0),
            Inset {
                left: 60.0,
                right: 40.0,
                ..Inset::default()
            },
            IoBudget::default(),
            0.0,
        )
        .unwrap_err();
        assert_eq!(
            err,
            ValidationError::EmptyCore {
                width: 0.0,
                height: 100.0
            }
        );
    }

    #[test]
    fn test_rejects_negative_fields() {
        let bad = SAMPLE.replace("\"reserved_area_um2\": 50000", "\"reserved_area_um2\": -1");
        assert!(serde_json::from_str::<SlotGeometry>(&bad).is_err());
        let bad = SAMPLE.replace("\"left\": 442", "\"left\": -442");
        assert!(serde_json::from_str::<SlotGeometry>(&bad).is_err());
        let bad = SAMPLE.replace("\"bidir\": 40", "\"bidir\": -40");
        assert!(serde_json::from_str::<SlotGeometry>(&bad).is_err());
    }

    #[test]
    fn test_signal_pin_total_saturates() {
        let budget = IoBudget {
            input: u32::MAX,
            bidir: 40,
            analog: 2,
            ..IoBudget::default()
        };
        assert_eq!(budget.total_signal_pins(), u32::MAX);
    }
}
