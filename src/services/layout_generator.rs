//! Auto-align geometry for 1..N windows on the primary display

use crate::models::{
    AlignOverride, LayoutPreset, PairSide, Point, Rect, SingleAlignment, Size,
};
use crate::services::title_matcher::TitleCleaner;
use crate::{Result, UltrawideError};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

/// Height reserved for the taskbar when sizing side windows
pub const DEFAULT_TASKBAR_HEIGHT: i32 = 48;

/// Target rectangle plus the style the preset suggests for that window
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LayoutSlot {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub rect: Rect,
    pub always_on_top: bool,
    pub titlebar: bool,
}

/// One computed auto-align arrangement
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AutoAlignment {
    /// 1-based number of the preset among those valid for this window count
    pub preset_number: usize,
    pub preset_count: usize,
    pub label: String,
    pub slots: Vec<LayoutSlot>,
}

impl AutoAlignment {
    pub fn rects(&self) -> Vec<Rect> {
        self.slots.iter().map(|slot| slot.rect).collect()
    }
}

/// Raw placement before conversion into validated rectangles
struct Placement {
    x: i32,
    y: i32,
    width: i32,
    height: i32,
    aspect_window: bool,
}

impl Placement {
    fn side(x: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y: 0,
            width,
            height,
            aspect_window: false,
        }
    }

    fn aspect(x: i32, width: i32, height: i32) -> Self {
        Self {
            aspect_window: true,
            ..Self::side(x, width, height)
        }
    }
}

/// Computes target rectangles from the ordered preset library.
///
/// The library is the built-in presets, then custom presets, then an
/// equal-columns fallback. Presets that cannot be laid out on the given
/// display are skipped, and preset indices cycle over the remaining ones.
#[derive(Debug, Clone)]
pub struct LayoutGenerator {
    presets: Vec<LayoutPreset>,
    overrides: BTreeMap<String, AlignOverride>,
    taskbar_height: i32,
    cleaner: TitleCleaner,
}

impl LayoutGenerator {
    pub fn new(taskbar_height: i32) -> Result<Self> {
        let mut presets = LayoutPreset::builtin();
        presets.push(LayoutPreset::Columns);
        Ok(Self {
            presets,
            overrides: BTreeMap::new(),
            taskbar_height: taskbar_height.max(0),
            cleaner: TitleCleaner::new()?,
        })
    }

    /// Append user presets after the built-ins, keeping the columns fallback last
    pub fn with_custom_presets(mut self, custom: impl IntoIterator<Item = LayoutPreset>) -> Self {
        let fallback = self.presets.pop();
        self.presets.extend(custom);
        self.presets.extend(fallback);
        self
    }

    /// Per-title offsets keyed by sanitized window name (case-insensitive)
    pub fn with_overrides(mut self, overrides: BTreeMap<String, AlignOverride>) -> Self {
        self.overrides = overrides
            .into_iter()
            .map(|(title, value)| (title.trim().to_lowercase(), value))
            .collect();
        self
    }

    pub fn presets(&self) -> &[LayoutPreset] {
        &self.presets
    }

    fn usable_height(&self, display: &Rect) -> i32 {
        if display.height() > self.taskbar_height {
            display.height() - self.taskbar_height
        } else {
            display.height()
        }
    }

    fn place(&self, preset: &LayoutPreset, count: usize, display: &Rect) -> Option<Vec<Placement>> {
        if !preset.supports(count) {
            return None;
        }

        let width = display.width();
        let height = display.height();
        let usable = self.usable_height(display);

        let placements = match preset {
            LayoutPreset::Single { aspect, align } => {
                let aspect_width = aspect.width_for_height(height);
                let (x, w) = match align {
                    SingleAlignment::Fill => (0, width),
                    SingleAlignment::Center => ((width - aspect_width) / 2, aspect_width),
                    SingleAlignment::Left => (0, aspect_width),
                    SingleAlignment::Right => (width - aspect_width, aspect_width),
                };
                if *align != SingleAlignment::Fill && aspect_width > width {
                    return None;
                }
                vec![Placement::aspect(x, w, height)]
            }
            LayoutPreset::Pair { aspect, side } => {
                let aspect_width = aspect.width_for_height(height);
                if aspect_width >= width {
                    return None;
                }
                let remainder = width - aspect_width;
                match side {
                    PairSide::Right => vec![
                        Placement::side(0, remainder, height),
                        Placement::aspect(remainder, aspect_width, height),
                    ],
                    PairSide::Left => vec![
                        Placement::aspect(0, aspect_width, height),
                        Placement::side(aspect_width, remainder, height),
                    ],
                    PairSide::CenterLeft => {
                        let side_width = remainder / 2;
                        vec![
                            Placement::side(0, side_width, usable),
                            Placement::aspect(side_width, aspect_width, height),
                        ]
                    }
                    PairSide::CenterRight => {
                        let side_width = remainder / 2;
                        vec![
                            Placement::aspect(side_width, aspect_width, height),
                            Placement::side(side_width + aspect_width, side_width, usable),
                        ]
                    }
                }
            }
            LayoutPreset::Triple {
                aspect,
                left_weight,
            } => {
                let aspect_width = aspect.width_for_height(height);
                if aspect_width >= width {
                    return None;
                }
                let aux = width - aspect_width;
                let left = left_weight.of(aux);
                let right = aux - left;
                vec![
                    Placement::side(0, left, usable),
                    Placement::aspect(left, aspect_width, height),
                    Placement::side(left + aspect_width, right, usable),
                ]
            }
            LayoutPreset::Grid { cells } => cells
                .iter()
                .map(|cell| Placement {
                    x: (cell.x * f64::from(width)) as i32,
                    y: (cell.y * f64::from(usable)) as i32,
                    width: (cell.width * f64::from(width)) as i32,
                    height: (cell.height * f64::from(usable)) as i32,
                    aspect_window: false,
                })
                .collect(),
            LayoutPreset::Columns => {
                let count = i32::try_from(count).ok()?;
                let column = width / count;
                (0..count)
                    .map(|i| {
                        let w = if i == count - 1 {
                            width - column * (count - 1)
                        } else {
                            column
                        };
                        Placement::side(column * i, w, usable)
                    })
                    .collect()
            }
        };

        if placements.iter().any(|p| p.width <= 0 || p.height <= 0) {
            return None;
        }
        Some(placements)
    }

    fn usable_presets(&self, count: usize, display: &Rect) -> Vec<(&LayoutPreset, Vec<Placement>)> {
        self.presets
            .iter()
            .filter_map(|preset| {
                self.place(preset, count, display)
                    .map(|placements| (preset, placements))
            })
            .collect()
    }

    /// Number of presets that can arrange `count` windows on `display`
    pub fn preset_count(&self, count: usize, display: &Rect) -> usize {
        self.usable_presets(count, display).len()
    }

    /// Exactly `count` rectangles for the preset at `preset_index` (cycling)
    pub fn generate(&self, count: usize, preset_index: usize, display: &Rect) -> Result<Vec<Rect>> {
        Ok(self.generate_slots(count, preset_index, display)?.rects())
    }

    /// Rectangles plus the preset's suggested always-on-top and titlebar flags
    pub fn generate_slots(
        &self,
        count: usize,
        preset_index: usize,
        display: &Rect,
    ) -> Result<AutoAlignment> {
        if count == 0 {
            return Err(UltrawideError::NoLayoutAvailable(0).into());
        }

        let mut usable = self.usable_presets(count, display);
        if usable.is_empty() {
            return Err(UltrawideError::NoLayoutAvailable(count).into());
        }

        let preset_count = usable.len();
        let index = preset_index % preset_count;
        let (preset, placements) = usable.swap_remove(index);
        let tiled = matches!(preset, LayoutPreset::Grid { .. } | LayoutPreset::Columns);

        let slots = placements
            .into_iter()
            .map(|p| {
                let rect = Rect::new(
                    Point::new(display.x() + p.x, display.y() + p.y),
                    Size::new(p.width, p.height)?,
                );
                let emphasized = p.aspect_window && !tiled;
                Ok(LayoutSlot {
                    title: None,
                    rect,
                    always_on_top: emphasized,
                    titlebar: !emphasized,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        debug!(
            "Auto-align preset {}/{} ({}) for {} windows",
            index + 1,
            preset_count,
            preset.label(),
            count
        );

        Ok(AutoAlignment {
            preset_number: index + 1,
            preset_count,
            label: preset.label(),
            slots,
        })
    }

    /// Layout for specific windows, applying per-title offsets and titlebar overrides
    pub fn generate_for_titles(
        &self,
        titles: &[String],
        preset_index: usize,
        display: &Rect,
    ) -> Result<AutoAlignment> {
        let mut alignment = self.generate_slots(titles.len(), preset_index, display)?;

        for (slot, title) in alignment.slots.iter_mut().zip(titles) {
            slot.title = Some(title.clone());

            let key = self.cleaner.clean_window_title(title, true).to_lowercase();
            let Some(adjustment) = self.overrides.get(&key) else {
                continue;
            };

            let [dx, dy, dw, dh] = adjustment.offset;
            slot.rect = Rect::from_xywh(
                slot.rect.x() + dx,
                slot.rect.y() + dy,
                slot.rect.width() + dw,
                slot.rect.height() + dh,
            )?;
            if let Some(titlebar) = adjustment.titlebar {
                slot.titlebar = titlebar;
            }
        }

        Ok(alignment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AspectRatio, Fraction};

    fn display(width: i32, height: i32) -> Rect {
        Rect::from_xywh(0, 0, width, height).unwrap()
    }

    fn generator() -> LayoutGenerator {
        LayoutGenerator::new(DEFAULT_TASKBAR_HEIGHT).unwrap()
    }

    #[test]
    fn two_windows_never_overlap_and_stay_on_display() {
        let generator = generator();
        for bounds in [display(5120, 1440), display(3440, 1440), display(1920, 1080)] {
            let count = generator.preset_count(2, &bounds);
            assert!(count > 0);
            for index in 0..count {
                let rects = generator.generate(2, index, &bounds).unwrap();
                assert_eq!(rects.len(), 2);
                assert!(!rects[0].intersects(&rects[1]), "preset {index} overlaps");
                assert!(bounds.contains(&rects[0]) && bounds.contains(&rects[1]));
            }
        }
    }

    #[test]
    fn right_pair_on_super_ultrawide() {
        let slots = generator()
            .generate_slots(2, 0, &display(5120, 1440))
            .unwrap();

        assert_eq!(slots.label, "Right 21/9");
        assert_eq!(slots.slots[0].rect, Rect::from_xywh(0, 0, 1760, 1440).unwrap());
        assert_eq!(slots.slots[1].rect, Rect::from_xywh(1760, 0, 3360, 1440).unwrap());
        assert!(slots.slots[1].always_on_top && !slots.slots[1].titlebar);
        assert!(!slots.slots[0].always_on_top && slots.slots[0].titlebar);
    }

    #[test]
    fn triple_splits_remaining_width_by_weight() {
        let generator = LayoutGenerator::new(48).unwrap();
        let triple_index = generator
            .usable_presets(3, &display(5120, 1440))
            .iter()
            .position(|(preset, _)| {
                **preset
                    == LayoutPreset::Triple {
                        aspect: AspectRatio::new(16, 9),
                        left_weight: Fraction::new(2, 3),
                    }
            })
            .unwrap();

        let rects = generator
            .generate(3, triple_index, &display(5120, 1440))
            .unwrap();
        // 16:9 at 1440 is 2560 wide, leaving 2560 split 2/3 and 1/3
        assert_eq!(rects[0], Rect::from_xywh(0, 0, 1706, 1392).unwrap());
        assert_eq!(rects[1], Rect::from_xywh(1706, 0, 2560, 1440).unwrap());
        assert_eq!(rects[2], Rect::from_xywh(4266, 0, 854, 1392).unwrap());
    }

    #[test]
    fn index_cycles_and_is_deterministic() {
        let generator = generator();
        let bounds = display(5120, 1440);
        let count = generator.preset_count(4, &bounds);
        assert_eq!(count, 5);

        let first = generator.generate(4, 0, &bounds).unwrap();
        assert_eq!(first, generator.generate(4, count, &bounds).unwrap());
        assert_eq!(first, generator.generate(4, 0, &bounds).unwrap());
    }

    #[test]
    fn presets_that_do_not_fit_are_skipped() {
        let generator = generator();
        // 21:9 at 1080 is 2520 wide and cannot sit beside anything on a 1920 display
        let narrow = display(1920, 1080);
        let labels: Vec<String> = (0..generator.preset_count(2, &narrow))
            .map(|i| generator.generate_slots(2, i, &narrow).unwrap().label)
            .collect();
        assert!(labels.iter().all(|label| !label.contains("21/9")));
        assert!(labels.iter().any(|label| label.contains("4/3")));
    }

    #[test]
    fn custom_presets_follow_builtins() {
        let custom = LayoutPreset::Pair {
            aspect: AspectRatio::new(5, 4),
            side: PairSide::Left,
        };
        let generator = generator().with_custom_presets(vec![custom.clone()]);
        let bounds = display(5120, 1440);

        let count = generator.preset_count(2, &bounds);
        assert_eq!(count, 14);
        assert_eq!(
            generator.generate_slots(2, 12, &bounds).unwrap().label,
            custom.label()
        );
        assert_eq!(generator.generate_slots(2, 13, &bounds).unwrap().label, "Columns");
    }

    #[test]
    fn columns_cover_counts_without_builtins() {
        let bounds = display(5120, 1440);
        let rects = generator().generate(5, 0, &bounds).unwrap();
        assert_eq!(rects.len(), 5);
        assert_eq!(rects[4].right(), 5120);
        assert!(generator().generate(0, 0, &bounds).is_err());
    }

    #[test]
    fn rectangles_are_relative_to_display_origin() {
        let bounds = Rect::from_xywh(-2560, 0, 5120, 1440).unwrap();
        let rects = generator().generate(1, 0, &bounds).unwrap();
        assert_eq!(rects[0], Rect::from_xywh(-2560, 0, 5120, 1440).unwrap());
    }

    #[test]
    fn overrides_adjust_matching_titles() {
        let mut overrides = BTreeMap::new();
        overrides.insert(
            "Discord".to_string(),
            AlignOverride {
                offset: [-7, 0, 14, 7],
                titlebar: Some(false),
            },
        );
        let generator = generator().with_overrides(overrides);

        let titles = vec!["Opera".to_string(), "#general - Discord".to_string()];
        let alignment = generator
            .generate_for_titles(&titles, 0, &display(5120, 1440))
            .unwrap();

        assert_eq!(alignment.slots[0].rect, Rect::from_xywh(0, 0, 1760, 1440).unwrap());
        assert_eq!(
            alignment.slots[1].rect,
            Rect::from_xywh(1753, 0, 3374, 1447).unwrap()
        );
        assert!(!alignment.slots[1].titlebar);
        assert_eq!(alignment.slots[1].title.as_deref(), Some("#general - Discord"));
    }
}
