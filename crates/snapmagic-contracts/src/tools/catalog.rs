use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::prompt::resolve_prompt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Tool {
    #[default]
    OneTap,
    Cinematic,
    Vintage,
    Vibrant,
    SoftGlow,
    RemoveObject,
    Custom,
}

#[derive(Clone, Copy, Debug)]
pub struct ToolSpec {
    pub tool: Tool,
    pub id: &'static str,
    pub name: &'static str,
    pub requires_text: bool,
}

pub const TOOL_SPECS: &[ToolSpec] = &[
    ToolSpec {
        tool: Tool::OneTap,
        id: "one-tap",
        name: "One-Tap Enhance",
        requires_text: false,
    },
    ToolSpec {
        tool: Tool::Cinematic,
        id: "cinematic",
        name: "Cinematic",
        requires_text: false,
    },
    ToolSpec {
        tool: Tool::Vintage,
        id: "vintage",
        name: "Vintage",
        requires_text: false,
    },
    ToolSpec {
        tool: Tool::Vibrant,
        id: "vibrant",
        name: "Vibrant",
        requires_text: false,
    },
    ToolSpec {
        tool: Tool::SoftGlow,
        id: "soft-glow",
        name: "Soft Glow",
        requires_text: false,
    },
    ToolSpec {
        tool: Tool::RemoveObject,
        id: "remove-object",
        name: "Remove Object",
        requires_text: true,
    },
    ToolSpec {
        tool: Tool::Custom,
        id: "custom",
        name: "Custom Edit",
        requires_text: true,
    },
];

impl Tool {
    pub fn spec(self) -> &'static ToolSpec {
        TOOL_SPECS
            .iter()
            .find(|spec| spec.tool == self)
            .unwrap_or(&TOOL_SPECS[0])
    }

    pub fn id(self) -> &'static str {
        self.spec().id
    }

    pub fn display_name(self) -> &'static str {
        self.spec().name
    }

    pub fn requires_text(self) -> bool {
        self.spec().requires_text
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for Tool {
    type Err = SelectionError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let normalized = raw.trim().to_ascii_lowercase().replace('_', "-");
        TOOL_SPECS
            .iter()
            .find(|spec| spec.id == normalized)
            .map(|spec| spec.tool)
            .ok_or_else(|| SelectionError::UnknownTool(raw.trim().to_string()))
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SelectionError {
    #[error("unknown tool '{0}'")]
    UnknownTool(String),
    #[error("tool '{0}' requires a non-empty instruction")]
    MissingText(Tool),
}

/// The active tool plus, for text-driven tools, the user's instruction.
///
/// Construction is the submission gate: a text-requiring tool can never hold
/// blank text, so resolving a selection always yields a usable instruction.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ToolSelection {
    tool: Tool,
    text: Option<String>,
}

impl ToolSelection {
    pub fn new(tool: Tool, text: Option<&str>) -> Result<Self, SelectionError> {
        if !tool.requires_text() {
            return Ok(Self { tool, text: None });
        }
        let text = text
            .filter(|value| !value.trim().is_empty())
            .ok_or(SelectionError::MissingText(tool))?;
        Ok(Self {
            tool,
            text: Some(text.to_string()),
        })
    }

    pub fn preset(tool: Tool) -> Result<Self, SelectionError> {
        Self::new(tool, None)
    }

    pub fn tool(&self) -> Tool {
        self.tool
    }

    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    pub fn instruction(&self) -> String {
        resolve_prompt(self.tool, self.text())
    }
}
