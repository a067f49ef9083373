//! User presets and per-title overrides for auto-align.
//!
//! ```toml
//! [[presets]]
//! kind = "pair"
//! aspect = [21, 9]
//! side = "center_left"
//!
//! [overrides."Discord"]
//! offset = [0, 0, -16, 0]
//! titlebar = "off"
//! ```

use crate::models::{AlignOverride, LayoutPreset};
use serde::Serialize;
use std::collections::BTreeMap;
use toml::{Table, Value};
use tracing::warn;

/// Written when `layout_config.toml` does not exist yet
pub const LAYOUT_CONFIG_HEADER: &str = r#"# Auto-align layout configuration
#
# Custom presets are added after the built-in ones and cycle with them.
#
# [[presets]]
# kind = "single"            # single, pair, triple, grid
# aspect = [21, 9]
# align = "center"           # fill, center, left, right
#
# [[presets]]
# kind = "grid"
# cells = [[0.0, 0.0, 0.5, 1.0], [0.5, 0.0, 0.5, 1.0]]
#
# Per-window adjustments, keyed by window name:
#
# [overrides."Discord"]
# offset = [0, 0, -16, 0]    # dx, dy, dw, dh
# titlebar = "off"           # on, off
"#;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LayoutConfig {
    pub presets: Vec<LayoutPreset>,
    pub overrides: BTreeMap<String, AlignOverride>,
}

impl LayoutConfig {
    /// Parse the file, skipping invalid presets and overrides.
    ///
    /// Returns the config together with one warning per skipped item. Only a
    /// TOML syntax error fails the whole file.
    pub fn parse(content: &str) -> Result<(Self, Vec<String>), toml::de::Error> {
        let table: Table = toml::from_str(content)?;
        let mut config = LayoutConfig::default();
        let mut warnings = Vec::new();

        match table.get("presets") {
            Some(Value::Array(presets)) => {
                for (index, value) in presets.iter().enumerate() {
                    match value.clone().try_into::<LayoutPreset>() {
                        Ok(LayoutPreset::Columns) => warnings.push(format!(
                            "Preset {} is the built-in columns fallback, skipped",
                            index + 1
                        )),
                        Ok(preset) => config.presets.push(preset),
                        Err(err) => warnings.push(format!("Preset {} skipped: {}", index + 1, err)),
                    }
                }
            }
            Some(_) => warnings.push("'presets' must be an array of tables".to_string()),
            None => {}
        }

        match table.get("overrides") {
            Some(Value::Table(overrides)) => {
                for (title, value) in overrides {
                    match parse_override(value) {
                        Some(adjustment) if !title.trim().is_empty() => {
                            config.overrides.insert(title.clone(), adjustment);
                        }
                        _ => warnings.push(format!("Override for '{}' skipped", title)),
                    }
                }
            }
            Some(_) => warnings.push("'overrides' must be a table".to_string()),
            None => {}
        }

        for warning in &warnings {
            warn!("layout_config: {}", warning);
        }

        Ok((config, warnings))
    }
}

fn parse_override(value: &Value) -> Option<AlignOverride> {
    let keys = value.as_table()?;
    let mut adjustment = AlignOverride::default();

    if let Some(offset) = keys.get("offset") {
        let items = offset.as_array()?;
        if items.len() != 4 {
            return None;
        }
        for (slot, item) in adjustment.offset.iter_mut().zip(items) {
            *slot = i32::try_from(item.as_integer()?).ok()?;
        }
    }

    if let Some(titlebar) = keys.get("titlebar") {
        adjustment.titlebar = Some(match titlebar {
            Value::Boolean(flag) => *flag,
            Value::String(text) => match text.trim().to_lowercase().as_str() {
                "on" | "true" => true,
                "off" | "false" => false,
                _ => return None,
            },
            _ => return None,
        });
    }

    Some(adjustment)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AspectRatio, PairSide};

    #[test]
    fn header_parses_to_an_empty_config() {
        let (config, warnings) = LayoutConfig::parse(LAYOUT_CONFIG_HEADER).unwrap();
        assert_eq!(config, LayoutConfig::default());
        assert!(warnings.is_empty());
    }

    #[test]
    fn invalid_items_are_skipped() {
        let (config, warnings) = LayoutConfig::parse(
            r#"
[[presets]]
kind = "pair"
aspect = [21, 9]
side = "center_left"

[[presets]]
kind = "single"
aspect = [0, 9]
align = "left"

[overrides."Discord"]
offset = [0, 0, -16, 0]
titlebar = "off"

[overrides."Spotify"]
offset = [1, 2]
"#,
        )
        .unwrap();

        assert_eq!(
            config.presets,
            vec![LayoutPreset::Pair {
                aspect: AspectRatio::new(21, 9),
                side: PairSide::CenterLeft
            }]
        );
        assert_eq!(
            config.overrides.get("Discord"),
            Some(&AlignOverride {
                offset: [0, 0, -16, 0],
                titlebar: Some(false)
            })
        );
        assert!(!config.overrides.contains_key("Spotify"));
        assert_eq!(warnings.len(), 2);
    }

    #[test]
    fn syntax_errors_reject_the_file() {
        assert!(LayoutConfig::parse("[[presets]\nkind=").is_err());
    }
}
