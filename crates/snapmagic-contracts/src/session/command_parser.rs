use std::collections::BTreeMap;

use serde_json::Value;

use super::command_registry::{
    CommandSpec, MULTI_PATH_COMMANDS, NO_ARG_COMMANDS, OPTIONAL_PATH_COMMANDS, PHOTO_ID_COMMANDS,
    TOOL_COMMAND,
};

/// One parsed line of session input.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionCommand {
    pub action: String,
    pub raw: String,
    pub command_args: BTreeMap<String, Value>,
}

impl SessionCommand {
    fn new(action: &str, raw: &str) -> Self {
        Self {
            action: action.to_string(),
            raw: raw.to_string(),
            command_args: BTreeMap::new(),
        }
    }

    fn with_arg(mut self, key: &str, value: Value) -> Self {
        self.command_args.insert(key.to_string(), value);
        self
    }

    pub fn arg_str(&self, key: &str) -> Option<&str> {
        self.command_args
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }

    pub fn arg_list(&self, key: &str) -> Vec<String> {
        self.command_args
            .get(key)
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}

fn find_action(command: &str, specs: &[CommandSpec]) -> Option<&'static str> {
    specs
        .iter()
        .find(|spec| spec.command == command)
        .map(|spec| spec.action)
}

fn parse_path_args(arg: &str) -> Vec<String> {
    if arg.trim().is_empty() {
        return Vec::new();
    }
    match shell_words::split(arg) {
        Ok(parts) => parts
            .into_iter()
            .filter(|value| !value.is_empty())
            .collect(),
        Err(_) => arg
            .split_whitespace()
            .map(str::to_string)
            .filter(|value| !value.is_empty())
            .collect(),
    }
}

fn parse_single_arg(arg: &str) -> String {
    let parts = parse_path_args(arg);
    match parts.len() {
        0 => String::new(),
        1 => parts[0].clone(),
        _ => parts.join(" "),
    }
}

/// Splits `/tool <id> [text...]` into the tool id and the untouched remainder.
fn parse_tool_args(arg: &str) -> (String, String) {
    let trimmed = arg.trim_start();
    match trimmed.find(char::is_whitespace) {
        Some(idx) => (
            trimmed[..idx].to_string(),
            trimmed[idx..].trim().to_string(),
        ),
        None => (trimmed.to_string(), String::new()),
    }
}

pub fn parse_command(text: &str) -> SessionCommand {
    let raw_trimmed = text.trim();
    if raw_trimmed.is_empty() {
        return SessionCommand::new("noop", text);
    }

    if let Some(slash_tail) = raw_trimmed.strip_prefix('/') {
        let command_len = slash_tail
            .chars()
            .take_while(|ch| ch.is_ascii_alphanumeric() || *ch == '_')
            .count();
        if command_len > 0 {
            let command = slash_tail[..command_len].to_ascii_lowercase();
            let remainder = &slash_tail[command_len..];
            let arg = remainder.trim();

            if let Some(action) = find_action(&command, MULTI_PATH_COMMANDS) {
                let paths = parse_path_args(arg).into_iter().map(Value::String).collect();
                return SessionCommand::new(action, text).with_arg("paths", Value::Array(paths));
            }

            if let Some(action) = find_action(&command, PHOTO_ID_COMMANDS) {
                return SessionCommand::new(action, text)
                    .with_arg("id", Value::String(parse_single_arg(arg)));
            }

            if let Some(action) = find_action(&command, OPTIONAL_PATH_COMMANDS) {
                let path = parse_single_arg(arg);
                let value = if path.is_empty() {
                    Value::Null
                } else {
                    Value::String(path)
                };
                return SessionCommand::new(action, text).with_arg("path", value);
            }

            if let Some(action) = find_action(&command, NO_ARG_COMMANDS) {
                return SessionCommand::new(action, text);
            }

            if command == TOOL_COMMAND.command {
                let (tool, tool_text) = parse_tool_args(arg);
                return SessionCommand::new(TOOL_COMMAND.action, text)
                    .with_arg("tool", Value::String(tool))
                    .with_arg("text", Value::String(tool_text));
            }

            return SessionCommand::new("unknown", text)
                .with_arg("command", Value::String(command))
                .with_arg("arg", Value::String(arg.to_string()));
        }
    }

    SessionCommand::new("select_tool", text)
        .with_arg("tool", Value::String("custom".to_string()))
        .with_arg("text", Value::String(raw_trimmed.to_string()))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::parse_command;

    #[test]
    fn parse_add_quoted_paths() {
        let command = parse_command("/add \"/tmp/a b.png\" c.jpg");
        assert_eq!(command.action, "add_photos");
        assert_eq!(command.command_args["paths"], json!(["/tmp/a b.png", "c.jpg"]));
        assert_eq!(command.arg_list("paths"), vec!["/tmp/a b.png", "c.jpg"]);
    }

    #[test]
    fn parse_photo_id_commands() {
        let remove = parse_command("/remove a.png-17-0");
        assert_eq!(remove.action, "remove_photo");
        assert_eq!(remove.arg_str("id"), Some("a.png-17-0"));

        assert_eq!(parse_command("/delete x").action, "remove_photo");

        let retry = parse_command("/retry \"my photo.png-17-1\"");
        assert_eq!(retry.action, "reset_photo");
        assert_eq!(retry.arg_str("id"), Some("my photo.png-17-1"));
    }

    #[test]
    fn parse_tool_with_and_without_text() {
        let preset = parse_command("/tool cinematic");
        assert_eq!(preset.action, "select_tool");
        assert_eq!(preset.arg_str("tool"), Some("cinematic"));
        assert_eq!(preset.arg_str("text"), None);

        let removal = parse_command("/tool remove-object the man in the red coat");
        assert_eq!(removal.arg_str("tool"), Some("remove-object"));
        assert_eq!(removal.arg_str("text"), Some("the man in the red coat"));
    }

    #[test]
    fn plain_text_selects_custom_edit() {
        let command = parse_command("  make the sky stormy ");
        assert_eq!(command.action, "select_tool");
        assert_eq!(command.arg_str("tool"), Some("custom"));
        assert_eq!(command.arg_str("text"), Some("make the sky stormy"));
    }

    #[test]
    fn parse_download_optional_dir() {
        assert_eq!(parse_command("/download").command_args["path"], json!(null));
        assert_eq!(
            parse_command("/download /tmp/out").command_args["path"],
            json!("/tmp/out")
        );
    }

    #[test]
    fn parse_no_arg_and_noop() {
        assert_eq!(parse_command("/run").action, "run_batch");
        assert_eq!(parse_command("/LIST").action, "list_photos");
        assert_eq!(parse_command("/exit").action, "quit");
        assert_eq!(parse_command("   ").action, "noop");
    }

    #[test]
    fn parse_unknown_command() {
        let command = parse_command("/magic foo bar");
        assert_eq!(command.action, "unknown");
        assert_eq!(command.command_args["command"], json!("magic"));
        assert_eq!(command.command_args["arg"], json!("foo bar"));
    }
}
