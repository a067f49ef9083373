use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Aspect ratio such as 21:9, stored as `[width, height]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "[u32; 2]", into = "[u32; 2]")]
pub struct AspectRatio {
    pub width: u32,
    pub height: u32,
}

impl AspectRatio {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Pixel width of a region with this ratio at the given height (truncated)
    pub fn width_for_height(&self, height: i32) -> i32 {
        (i64::from(height) * i64::from(self.width) / i64::from(self.height)) as i32
    }
}

impl TryFrom<[u32; 2]> for AspectRatio {
    type Error = LayoutPresetError;

    fn try_from(value: [u32; 2]) -> Result<Self, Self::Error> {
        if value[0] == 0 || value[1] == 0 {
            return Err(LayoutPresetError::InvalidAspectRatio(value[0], value[1]));
        }
        Ok(Self::new(value[0], value[1]))
    }
}

impl From<AspectRatio> for [u32; 2] {
    fn from(value: AspectRatio) -> Self {
        [value.width, value.height]
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.width, self.height)
    }
}

/// Proper fraction in `[0, 1]`, stored as `[numerator, denominator]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "[u32; 2]", into = "[u32; 2]")]
pub struct Fraction {
    pub numerator: u32,
    pub denominator: u32,
}

impl Fraction {
    pub const HALF: Fraction = Fraction::new(1, 2);

    pub const fn new(numerator: u32, denominator: u32) -> Self {
        Self {
            numerator,
            denominator,
        }
    }

    /// `value * self`, truncated
    pub fn of(&self, value: i32) -> i32 {
        (i64::from(value) * i64::from(self.numerator) / i64::from(self.denominator)) as i32
    }

    pub fn complement(&self) -> Fraction {
        Fraction::new(self.denominator - self.numerator, self.denominator)
    }
}

impl TryFrom<[u32; 2]> for Fraction {
    type Error = LayoutPresetError;

    fn try_from(value: [u32; 2]) -> Result<Self, Self::Error> {
        if value[1] == 0 || value[0] > value[1] {
            return Err(LayoutPresetError::InvalidFraction(value[0], value[1]));
        }
        Ok(Self::new(value[0], value[1]))
    }
}

impl From<Fraction> for [u32; 2] {
    fn from(value: Fraction) -> Self {
        [value.numerator, value.denominator]
    }
}

impl fmt::Display for Fraction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.numerator, self.denominator)
    }
}

/// Where a single aspect-ratio window sits on the display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SingleAlignment {
    /// Span the whole display width
    Fill,
    Center,
    Left,
    Right,
}

/// Which side the aspect-ratio window of a two-window layout occupies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PairSide {
    Right,
    Left,
    /// Aspect window centred, companion fills the space to its left
    CenterLeft,
    /// Aspect window centred, companion fills the space to its right
    CenterRight,
}

impl fmt::Display for PairSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            PairSide::Right => "Right",
            PairSide::Left => "Left",
            PairSide::CenterLeft => "Center Left",
            PairSide::CenterRight => "Center Right",
        };
        f.write_str(text)
    }
}

/// Rectangle expressed as fractions of the display, `[x, y, width, height]`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "[f64; 4]", into = "[f64; 4]")]
pub struct RelativeRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl RelativeRect {
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

impl TryFrom<[f64; 4]> for RelativeRect {
    type Error = LayoutPresetError;

    fn try_from(value: [f64; 4]) -> Result<Self, Self::Error> {
        let [x, y, width, height] = value;
        let in_unit = |v: f64| (0.0..=1.0).contains(&v);
        if !(in_unit(x) && in_unit(y) && width > 0.0 && height > 0.0)
            || x + width > 1.0 + f64::EPSILON
            || y + height > 1.0 + f64::EPSILON
        {
            return Err(LayoutPresetError::InvalidCell(value));
        }
        Ok(Self::new(x, y, width, height))
    }
}

impl From<RelativeRect> for [f64; 4] {
    fn from(value: RelativeRect) -> Self {
        [value.x, value.y, value.width, value.height]
    }
}

/// A named arrangement for a fixed (or, for columns, any) number of windows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LayoutPreset {
    /// One window with a fixed aspect ratio
    Single {
        aspect: AspectRatio,
        align: SingleAlignment,
    },
    /// Aspect-ratio window plus a companion filling the remaining width
    Pair { aspect: AspectRatio, side: PairSide },
    /// Centred aspect-ratio window with the remaining width split by `left_weight`
    Triple {
        aspect: AspectRatio,
        left_weight: Fraction,
    },
    /// Explicit cells as display fractions, one per window
    Grid { cells: Vec<RelativeRect> },
    /// Equal-width full-height columns for any number of windows
    Columns,
}

impl LayoutPreset {
    pub fn supports(&self, window_count: usize) -> bool {
        match self {
            LayoutPreset::Single { .. } => window_count == 1,
            LayoutPreset::Pair { .. } => window_count == 2,
            LayoutPreset::Triple { .. } => window_count == 3,
            LayoutPreset::Grid { cells } => cells.len() == window_count,
            LayoutPreset::Columns => window_count > 0,
        }
    }

    pub fn label(&self) -> String {
        match self {
            LayoutPreset::Single { aspect, align } => {
                let side = match align {
                    SingleAlignment::Fill => "Fullscreen",
                    SingleAlignment::Center => "Center",
                    SingleAlignment::Left => "Left",
                    SingleAlignment::Right => "Right",
                };
                format!("{side} {aspect}")
            }
            LayoutPreset::Pair { aspect, side } => format!("{side} {aspect}"),
            LayoutPreset::Triple {
                aspect,
                left_weight,
            } => format!(
                "Aspect {aspect} Left {left_weight} Right {}",
                left_weight.complement()
            ),
            LayoutPreset::Grid { cells } => format!("Grid of {}", cells.len()),
            LayoutPreset::Columns => "Columns".to_string(),
        }
    }

    /// Built-in preset library, in the order presets are cycled
    pub fn builtin() -> Vec<LayoutPreset> {
        const WIDE: AspectRatio = AspectRatio::new(21, 9);
        const STANDARD: AspectRatio = AspectRatio::new(16, 9);
        const CLASSIC: AspectRatio = AspectRatio::new(4, 3);
        const RATIOS: [AspectRatio; 3] = [WIDE, STANDARD, CLASSIC];

        let mut presets = vec![LayoutPreset::Single {
            aspect: AspectRatio::new(32, 9),
            align: SingleAlignment::Fill,
        }];

        for align in [
            SingleAlignment::Center,
            SingleAlignment::Left,
            SingleAlignment::Right,
        ] {
            for aspect in RATIOS {
                presets.push(LayoutPreset::Single { aspect, align });
            }
        }

        for side in [
            PairSide::Right,
            PairSide::Left,
            PairSide::CenterLeft,
            PairSide::CenterRight,
        ] {
            for aspect in RATIOS {
                presets.push(LayoutPreset::Pair { aspect, side });
            }
        }

        for left_weight in [
            Fraction::HALF,
            Fraction::new(2, 3),
            Fraction::new(3, 5),
            Fraction::new(2, 5),
        ] {
            for aspect in RATIOS {
                presets.push(LayoutPreset::Triple {
                    aspect,
                    left_weight,
                });
            }
        }

        let grids: [[(f64, f64, f64, f64); 4]; 4] = [
            // four equal columns
            [
                (0.0, 0.0, 0.25, 1.0),
                (0.25, 0.0, 0.25, 1.0),
                (0.5, 0.0, 0.25, 1.0),
                (0.75, 0.0, 0.25, 1.0),
            ],
            // two stacked on the left half, two columns on the right half
            [
                (0.0, 0.0, 0.5, 0.5),
                (0.0, 0.5, 0.5, 0.5),
                (0.5, 0.0, 0.25, 1.0),
                (0.75, 0.0, 0.25, 1.0),
            ],
            // two columns on the left half, two stacked on the right half
            [
                (0.0, 0.0, 0.25, 1.0),
                (0.25, 0.0, 0.25, 1.0),
                (0.5, 0.0, 0.5, 0.5),
                (0.5, 0.5, 0.5, 0.5),
            ],
            // 2x2
            [
                (0.0, 0.0, 0.5, 0.5),
                (0.5, 0.0, 0.5, 0.5),
                (0.0, 0.5, 0.5, 0.5),
                (0.5, 0.5, 0.5, 0.5),
            ],
        ];

        for grid in grids {
            presets.push(LayoutPreset::Grid {
                cells: grid
                    .iter()
                    .map(|&(x, y, w, h)| RelativeRect::new(x, y, w, h))
                    .collect(),
            });
        }

        presets
    }
}

/// Per-title tweak applied on top of an auto-align result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AlignOverride {
    /// `[dx, dy, dw, dh]` added to the computed rectangle
    #[serde(default)]
    pub offset: [i32; 4],
    /// Forces the titlebar on or off regardless of the preset suggestion
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub titlebar: Option<bool>,
}

/// Errors that can occur with layout presets
#[derive(Debug, Error)]
pub enum LayoutPresetError {
    #[error("Invalid aspect ratio {0}:{1}")]
    InvalidAspectRatio(u32, u32),

    #[error("Invalid fraction {0}/{1}. Must be between 0 and 1")]
    InvalidFraction(u32, u32),

    #[error("Invalid grid cell {0:?}. Cells must lie within the unit square")]
    InvalidCell([f64; 4]),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_library_covers_one_to_four_windows() {
        let presets = LayoutPreset::builtin();
        let count_for = |n| presets.iter().filter(|p| p.supports(n)).count();

        assert_eq!(count_for(1), 10);
        assert_eq!(count_for(2), 12);
        assert_eq!(count_for(3), 12);
        assert_eq!(count_for(4), 4);
        assert_eq!(count_for(5), 0);
    }

    #[test]
    fn aspect_width_truncates() {
        let ratio = AspectRatio::new(21, 9);
        assert_eq!(ratio.width_for_height(1440), 3360);
        assert_eq!(AspectRatio::new(4, 3).width_for_height(1001), 1334);
    }

    #[test]
    fn fraction_rejects_values_above_one() {
        assert!(Fraction::try_from([3, 2]).is_err());
        assert!(Fraction::try_from([1, 0]).is_err());
        assert_eq!(Fraction::new(2, 5).complement(), Fraction::new(3, 5));
    }

    #[test]
    fn preset_round_trips_through_toml() {
        let preset = LayoutPreset::Triple {
            aspect: AspectRatio::new(21, 9),
            left_weight: Fraction::new(2, 3),
        };
        let text = toml::to_string(&preset).unwrap();
        assert!(text.contains("kind = \"triple\""));
        let parsed: LayoutPreset = toml::from_str(&text).unwrap();
        assert_eq!(parsed, preset);
    }

    #[test]
    fn grid_cells_outside_unit_square_are_rejected() {
        let result: Result<LayoutPreset, _> =
            toml::from_str("kind = \"grid\"\ncells = [[0.5, 0.0, 0.75, 1.0]]\n");
        assert!(result.is_err());
    }
}
