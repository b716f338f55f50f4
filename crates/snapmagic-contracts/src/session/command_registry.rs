#[derive(Clone, Copy, Debug)]
pub(crate) struct CommandSpec {
    pub command: &'static str,
    pub action: &'static str,
}

pub(crate) const MULTI_PATH_COMMANDS: &[CommandSpec] = &[CommandSpec {
    command: "add",
    action: "add_photos",
}];

pub(crate) const PHOTO_ID_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "remove",
        action: "remove_photo",
    },
    CommandSpec {
        command: "delete",
        action: "remove_photo",
    },
    CommandSpec {
        command: "retry",
        action: "reset_photo",
    },
];

pub(crate) const OPTIONAL_PATH_COMMANDS: &[CommandSpec] = &[CommandSpec {
    command: "download",
    action: "download_all",
}];

pub(crate) const NO_ARG_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "run",
        action: "run_batch",
    },
    CommandSpec {
        command: "list",
        action: "list_photos",
    },
    CommandSpec {
        command: "tools",
        action: "list_tools",
    },
    CommandSpec {
        command: "help",
        action: "help",
    },
    CommandSpec {
        command: "quit",
        action: "quit",
    },
    CommandSpec {
        command: "exit",
        action: "quit",
    },
];

pub(crate) const TOOL_COMMAND: CommandSpec = CommandSpec {
    command: "tool",
    action: "select_tool",
};

pub const SESSION_HELP_COMMANDS: &[&str] = &[
    "/add",
    "/remove",
    "/retry",
    "/tool",
    "/tools",
    "/run",
    "/list",
    "/download",
    "/help",
    "/quit",
];
