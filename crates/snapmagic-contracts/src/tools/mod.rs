mod catalog;
mod prompt;

pub use catalog::{SelectionError, Tool, ToolSelection, ToolSpec, TOOL_SPECS};
pub use prompt::resolve_prompt;
