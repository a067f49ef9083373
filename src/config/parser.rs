//! Parser for `config_<name>.toml` layout configuration files.
//!
//! Each top-level table is one entry, named by the title pattern it matches:
//!
//! ```toml
//! apply_order = "titlebar,pos,size,aot"   # default for every entry
//!
//! ["Opera"]
//! position = "-7,0"
//! size = "1720,1401"
//! always_on_top = false
//! titlebar = true
//! ```
//!
//! Malformed TOML rejects the whole file. Invalid values for known keys are
//! repaired to safe defaults and reported as warnings.

use crate::models::{ApplyOrder, ConfigEntry, Configuration, Point, Size};
use std::path::Path;
use thiserror::Error;
use toml::{Table, Value};

const DEFAULT_POSITION: Point = Point { x: 0, y: 0 };
const DEFAULT_SIZE: Size = Size {
    width: 100,
    height: 100,
};

#[derive(Error, Debug)]
pub enum ConfigParseError {
    #[error("File IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),
    #[error("TOML serialization error: {0}")]
    SerializeError(#[from] toml::ser::Error),
    #[error("Validation error: {message}")]
    ValidationError { message: String },
}

impl ConfigParseError {
    fn validation(message: impl Into<String>) -> Self {
        ConfigParseError::ValidationError {
            message: message.into(),
        }
    }
}

/// Reads and writes configuration files, collecting repair warnings
#[derive(Debug, Default)]
pub struct ConfigParser {
    warnings: Vec<String>,
}

impl ConfigParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Warnings produced by the most recent parse
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn parse_file<P: AsRef<Path>>(
        &mut self,
        name: &str,
        path: P,
    ) -> Result<Configuration, ConfigParseError> {
        let content = std::fs::read_to_string(path)?;
        self.parse_configuration(name, &content)
    }

    pub fn parse_configuration(
        &mut self,
        name: &str,
        content: &str,
    ) -> Result<Configuration, ConfigParseError> {
        self.warnings.clear();
        let table: Table = toml::from_str(content)?;

        let default_order = match table.get("apply_order") {
            Some(value) => parse_apply_order("DEFAULT", value)?,
            None => ApplyOrder::default(),
        };

        let mut entries = Vec::new();
        for (section, value) in &table {
            if section == "apply_order" {
                continue;
            }

            let Value::Table(keys) = value else {
                self.warn(format!("Ignoring top-level key '{}' that is not a section", section));
                continue;
            };

            let section = section.trim();
            if section.is_empty() {
                self.warn("Dropping section with an empty name".to_string());
                continue;
            }

            entries.push(self.parse_entry(section, keys, &default_order)?);
        }

        Configuration::new(name, entries).map_err(|e| ConfigParseError::validation(e.to_string()))
    }

    fn parse_entry(
        &mut self,
        section: &str,
        keys: &Table,
        default_order: &ApplyOrder,
    ) -> Result<ConfigEntry, ConfigParseError> {
        let apply_order = match keys.get("apply_order") {
            Some(value) => parse_apply_order(section, value)?,
            None => default_order.clone(),
        };

        let position = match keys.get("position").map(parse_pair) {
            Some(Some((x, y))) => Point::new(x, y),
            Some(None) => {
                self.warn(format!("[{}] invalid position, using 0,0", section));
                DEFAULT_POSITION
            }
            None => {
                self.warn(format!("[{}] missing position, using 0,0", section));
                DEFAULT_POSITION
            }
        };

        let size = match keys
            .get("size")
            .map(|value| parse_pair(value).and_then(|(w, h)| Size::new(w, h).ok()))
        {
            Some(Some(size)) => size,
            Some(None) => {
                self.warn(format!("[{}] invalid size, using 100,100", section));
                DEFAULT_SIZE
            }
            None => {
                self.warn(format!("[{}] missing size, using 100,100", section));
                DEFAULT_SIZE
            }
        };

        let always_on_top = self.parse_flag(section, keys, "always_on_top", false);
        let titlebar = self.parse_flag(section, keys, "titlebar", true);
        let process_priority = self.parse_flag(section, keys, "process_priority", false);

        let search_title = match keys.get("search_title") {
            Some(Value::String(title)) if !title.trim().is_empty() => Some(title.clone()),
            Some(Value::String(_)) | None => None,
            Some(_) => {
                self.warn(format!("[{}] search_title must be a string, ignoring", section));
                None
            }
        };

        for key in keys.keys() {
            if !matches!(
                key.as_str(),
                "apply_order"
                    | "position"
                    | "size"
                    | "always_on_top"
                    | "titlebar"
                    | "process_priority"
                    | "search_title"
            ) {
                self.warn(format!("[{}] unknown key '{}' ignored", section, key));
            }
        }

        let mut entry = ConfigEntry::new(section, position, size)
            .with_apply_order(apply_order)
            .with_always_on_top(always_on_top)
            .with_titlebar(titlebar)
            .with_process_priority(process_priority);
        entry.search_title = search_title;
        Ok(entry)
    }

    fn parse_flag(&mut self, section: &str, keys: &Table, key: &str, default: bool) -> bool {
        let Some(value) = keys.get(key) else {
            return default;
        };

        let parsed = match value {
            Value::Boolean(flag) => Some(*flag),
            Value::Integer(0) => Some(false),
            Value::Integer(1) => Some(true),
            Value::String(text) => match text.trim().to_lowercase().as_str() {
                "true" | "yes" | "on" | "1" => Some(true),
                "false" | "no" | "off" | "0" => Some(false),
                _ => None,
            },
            _ => None,
        };

        parsed.unwrap_or_else(|| {
            self.warn(format!("[{}] invalid {}, using {}", section, key, default));
            default
        })
    }

    fn warn(&mut self, message: String) {
        tracing::warn!("{}", message);
        self.warnings.push(message);
    }

    /// Render a configuration back to TOML, entries in the given order
    pub fn serialize_configuration(config: &Configuration) -> Result<String, ConfigParseError> {
        let mut table = Table::new();
        for entry in &config.entries {
            let mut keys = Table::new();
            if entry.apply_order.is_specified() {
                keys.insert(
                    "apply_order".into(),
                    Value::String(entry.apply_order.to_string()),
                );
            }
            keys.insert("position".into(), Value::String(entry.position.to_string()));
            keys.insert("size".into(), Value::String(entry.size.to_string()));
            keys.insert("always_on_top".into(), Value::Boolean(entry.always_on_top));
            keys.insert("titlebar".into(), Value::Boolean(entry.titlebar));
            keys.insert(
                "process_priority".into(),
                Value::Boolean(entry.process_priority),
            );
            if let Some(search_title) = &entry.search_title {
                keys.insert("search_title".into(), Value::String(search_title.clone()));
            }
            table.insert(entry.name.clone(), Value::Table(keys));
        }

        Ok(toml::to_string(&table)?)
    }
}

fn parse_apply_order(section: &str, value: &Value) -> Result<ApplyOrder, ConfigParseError> {
    let text = match value {
        Value::String(text) => text.clone(),
        Value::Array(items) => items
            .iter()
            .map(|item| item.as_str().unwrap_or_default())
            .collect::<Vec<_>>()
            .join(","),
        _ => {
            return Err(ConfigParseError::validation(format!(
                "[{}] apply_order must be a comma separated string",
                section
            )))
        }
    };

    text.parse::<ApplyOrder>()
        .map_err(|e| ConfigParseError::validation(format!("[{}] {}", section, e)))
}

/// Accept `"x,y"` strings and `[x, y]` arrays
fn parse_pair(value: &Value) -> Option<(i32, i32)> {
    match value {
        Value::String(text) => {
            let (first, second) = text.split_once(',')?;
            Some((first.trim().parse().ok()?, second.trim().parse().ok()?))
        }
        Value::Array(items) if items.len() == 2 => {
            let first = i32::try_from(items[0].as_integer()?).ok()?;
            let second = i32::try_from(items[1].as_integer()?).ok()?;
            Some((first, second))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ApplyOperation;

    const OPERA_DISCORD: &str = r#"
apply_order = "titlebar,pos,size,aot"

["Opera"]
position = "-7,0"
size = "1720,1401"
always_on_top = false
titlebar = true

["Discord"]
position = [4264, -1]
size = "856,1394"
always_on_top = "false"
titlebar = "true"
process_priority = true
"#;

    #[test]
    fn parses_sections_in_declaration_order() {
        let mut parser = ConfigParser::new();
        let config = parser.parse_configuration("desk", OPERA_DISCORD).unwrap();

        assert_eq!(config.name, "desk");
        let names: Vec<&str> = config.entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Opera", "Discord"]);

        let discord = config.entry("Discord").unwrap();
        assert_eq!(discord.position, Point::new(4264, -1));
        assert_eq!(discord.size, Size::new(856, 1394).unwrap());
        assert!(discord.titlebar);
        assert!(discord.process_priority);
        assert_eq!(
            discord.apply_order.operations(),
            &[
                ApplyOperation::Titlebar,
                ApplyOperation::Position,
                ApplyOperation::Size,
                ApplyOperation::Aot
            ]
        );
        assert!(parser.warnings().is_empty());
    }

    #[test]
    fn repairs_invalid_values_with_warnings() {
        let mut parser = ConfigParser::new();
        let config = parser
            .parse_configuration(
                "broken",
                r#"
["Game"]
position = "left"
size = "0,100"
titlebar = "maybe"
colour = "red"
"#,
            )
            .unwrap();

        let game = config.entry("Game").unwrap();
        assert_eq!(game.position, Point::new(0, 0));
        assert_eq!(game.size, Size::new(100, 100).unwrap());
        assert!(game.titlebar);
        assert_eq!(parser.warnings().len(), 4);
    }

    #[test]
    fn rejects_malformed_toml_and_unknown_operations() {
        let mut parser = ConfigParser::new();
        assert!(matches!(
            parser.parse_configuration("bad", "[\"Opera\"\nposition = 1"),
            Err(ConfigParseError::TomlError(_))
        ));
        assert!(matches!(
            parser.parse_configuration("bad", "[\"Opera\"]\napply_order = \"wiggle\"\n"),
            Err(ConfigParseError::ValidationError { .. })
        ));
    }

    #[test]
    fn drops_empty_section_names() {
        let mut parser = ConfigParser::new();
        let config = parser
            .parse_configuration("c", "[\" \"]\nposition = \"1,1\"\nsize = \"5,5\"\n")
            .unwrap();
        assert!(config.is_empty());
        assert_eq!(parser.warnings().len(), 1);
    }

    #[test]
    fn serialized_output_parses_back() {
        let mut parser = ConfigParser::new();
        let config = parser.parse_configuration("desk", OPERA_DISCORD).unwrap();

        let text = ConfigParser::serialize_configuration(&config).unwrap();
        assert!(text.contains("position = \"4264,-1\""));
        assert_eq!(parser.parse_configuration("desk", &text).unwrap(), config);
    }
}
