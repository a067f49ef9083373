use crate::models::geometry::{Point, Size};
use crate::{Result, UltrawideError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A single operation applied to a matched window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplyOperation {
    Titlebar,
    Position,
    Size,
    Aot,
    ProcessPriority,
}

impl ApplyOperation {
    /// Token used in configuration files
    pub fn as_token(&self) -> &'static str {
        match self {
            ApplyOperation::Titlebar => "titlebar",
            ApplyOperation::Position => "pos",
            ApplyOperation::Size => "size",
            ApplyOperation::Aot => "aot",
            ApplyOperation::ProcessPriority => "priority",
        }
    }
}

impl fmt::Display for ApplyOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ApplyOperation::Titlebar => "Titlebar",
            ApplyOperation::Position => "Position",
            ApplyOperation::Size => "Size",
            ApplyOperation::Aot => "Always-on-top",
            ApplyOperation::ProcessPriority => "Process priority",
        };
        f.write_str(name)
    }
}

impl FromStr for ApplyOperation {
    type Err = UltrawideError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "titlebar" => Ok(ApplyOperation::Titlebar),
            "pos" | "position" => Ok(ApplyOperation::Position),
            "size" => Ok(ApplyOperation::Size),
            "aot" | "always_on_top" => Ok(ApplyOperation::Aot),
            "priority" | "process_priority" => Ok(ApplyOperation::ProcessPriority),
            other => Err(UltrawideError::ConfigurationError(format!(
                "Unknown apply_order operation '{}'",
                other
            ))),
        }
    }
}

/// Ordered list of operations for an entry. An empty order means "use the default".
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApplyOrder(Vec<ApplyOperation>);

impl ApplyOrder {
    pub const DEFAULT: [ApplyOperation; 4] = [
        ApplyOperation::Titlebar,
        ApplyOperation::Position,
        ApplyOperation::Size,
        ApplyOperation::Aot,
    ];

    pub fn new(operations: Vec<ApplyOperation>) -> Self {
        Self(operations)
    }

    pub fn is_specified(&self) -> bool {
        !self.0.is_empty()
    }

    pub fn operations(&self) -> &[ApplyOperation] {
        &self.0
    }

    /// Operations to run for a window, in execution order.
    ///
    /// Listed operations keep their order with duplicates dropped. Process
    /// priority never takes its listed slot: it is appended last when the
    /// entry asks for it and left out otherwise.
    pub fn execution_plan(&self, process_priority: bool) -> Vec<ApplyOperation> {
        let listed: &[ApplyOperation] = if self.0.is_empty() {
            &Self::DEFAULT
        } else {
            &self.0
        };

        let mut plan: Vec<ApplyOperation> = Vec::with_capacity(listed.len() + 1);
        for operation in listed {
            if *operation != ApplyOperation::ProcessPriority && !plan.contains(operation) {
                plan.push(*operation);
            }
        }

        if process_priority {
            plan.push(ApplyOperation::ProcessPriority);
        }

        plan
    }
}

impl FromStr for ApplyOrder {
    type Err = UltrawideError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let operations = s
            .split(',')
            .filter(|token| !token.trim().is_empty())
            .map(ApplyOperation::from_str)
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(Self(operations))
    }
}

impl fmt::Display for ApplyOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tokens: Vec<&str> = self.0.iter().map(|op| op.as_token()).collect();
        f.write_str(&tokens.join(","))
    }
}

/// Settings for one managed application. The entry name doubles as the
/// title pattern used to find its windows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigEntry {
    pub name: String,
    #[serde(default)]
    pub apply_order: ApplyOrder,
    pub position: Point,
    pub size: Size,
    #[serde(default)]
    pub always_on_top: bool,
    #[serde(default = "default_titlebar")]
    pub titlebar: bool,
    #[serde(default)]
    pub process_priority: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_title: Option<String>,
}

fn default_titlebar() -> bool {
    true
}

impl ConfigEntry {
    pub fn new(name: impl Into<String>, position: Point, size: Size) -> Self {
        Self {
            name: name.into(),
            apply_order: ApplyOrder::default(),
            position,
            size,
            always_on_top: false,
            titlebar: true,
            process_priority: false,
            search_title: None,
        }
    }

    pub fn with_apply_order(mut self, apply_order: ApplyOrder) -> Self {
        self.apply_order = apply_order;
        self
    }

    pub fn with_always_on_top(mut self, always_on_top: bool) -> Self {
        self.always_on_top = always_on_top;
        self
    }

    pub fn with_titlebar(mut self, titlebar: bool) -> Self {
        self.titlebar = titlebar;
        self
    }

    pub fn with_process_priority(mut self, process_priority: bool) -> Self {
        self.process_priority = process_priority;
        self
    }

    pub fn with_search_title(mut self, search_title: impl Into<String>) -> Self {
        self.search_title = Some(search_title.into());
        self
    }

    /// Pattern used when looking for this entry's window for screenshots.
    /// Layout matching always uses the entry name.
    pub fn screenshot_pattern(&self) -> &str {
        self.search_title
            .as_deref()
            .filter(|title| !title.trim().is_empty())
            .unwrap_or(&self.name)
    }

    pub fn execution_plan(&self) -> Vec<ApplyOperation> {
        self.apply_order.execution_plan(self.process_priority)
    }
}

/// Named set of entries. Declaration order is significant for match precedence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Configuration {
    pub name: String,
    pub entries: Vec<ConfigEntry>,
}

impl Configuration {
    pub fn new(name: impl Into<String>, entries: Vec<ConfigEntry>) -> Result<Self> {
        let config = Self {
            name: name.into(),
            entries,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn entry(&self, name: &str) -> Option<&ConfigEntry> {
        self.entries.iter().find(|entry| entry.name == name)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn validate(&self) -> Result<()> {
        let mut seen = std::collections::HashSet::new();
        for entry in &self.entries {
            if entry.name.trim().is_empty() {
                return Err(UltrawideError::ValidationError(format!(
                    "Configuration '{}' contains an entry without a name",
                    self.name
                ))
                .into());
            }

            if !seen.insert(entry.name.as_str()) {
                return Err(UltrawideError::ValidationError(format!(
                    "Duplicate entry '{}' in configuration '{}'",
                    entry.name, self.name
                ))
                .into());
            }
        }

        Ok(())
    }
}
