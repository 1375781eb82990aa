//! Declarative command allowlist: the fixed table of daemon maintenance
//! commands the gateway may invoke, modeled as data rather than handlers so
//! the allowlist stays auditable.
//!
//! Every command receives the storage basedir as its first positional argument
//! after the command name; the table only describes the caller-supplied
//! arguments that follow. Keep this table tight; the gateway runs OS
//! commands.

use serde::Serialize;
use std::collections::HashMap;

/// How a caller-supplied argument is validated before it may enter the
/// argument vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ArgKind {
    /// `[A-Za-z0-9_]+` only; the daemon interpolates these into filesystem paths.
    Identifier,
    /// Absolute http(s) URL.
    Url,
    /// Any non-empty string; the daemon handles the content itself.
    Freetext,
}

/// One positional argument of a command. Order within `CommandSpec::args` is
/// argv order.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArgSpec {
    pub name: &'static str,
    pub kind: ArgKind,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_len: Option<usize>,
}

/// A named command with its display label and argument schema.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandSpec {
    pub name: &'static str,
    pub label: &'static str,
    pub args: Vec<ArgSpec>,
}

/// Immutable lookup table built once at startup. `get` is the sole gate for
/// whether a command is nameable at all; declaration order is preserved for
/// the listing endpoint.
pub struct CommandRegistry {
    commands: Vec<CommandSpec>,
    index: HashMap<&'static str, usize>,
}

impl CommandRegistry {
    /// The built-in table of daemon maintenance commands.
    pub fn builtin() -> Self {
        Self::from_commands(builtin_commands())
    }

    fn from_commands(commands: Vec<CommandSpec>) -> Self {
        let index = commands
            .iter()
            .enumerate()
            .map(|(i, c)| (c.name, i))
            .collect();
        Self { commands, index }
    }

    /// O(1) lookup by command name.
    pub fn get(&self, name: &str) -> Option<&CommandSpec> {
        self.index.get(name).map(|&i| &self.commands[i])
    }

    /// All commands in declaration order.
    pub fn all(&self) -> &[CommandSpec] {
        &self.commands
    }
}

fn uid() -> ArgSpec {
    ArgSpec {
        name: "uid",
        kind: ArgKind::Identifier,
        required: true,
        max_len: None,
    }
}

fn freetext(name: &'static str, max_len: usize) -> ArgSpec {
    ArgSpec {
        name,
        kind: ArgKind::Freetext,
        required: true,
        max_len: Some(max_len),
    }
}

fn url_arg(name: &'static str) -> ArgSpec {
    ArgSpec {
        name,
        kind: ArgKind::Url,
        required: true,
        max_len: Some(2048),
    }
}

fn cmd(name: &'static str, label: &'static str, args: Vec<ArgSpec>) -> CommandSpec {
    CommandSpec { name, label, args }
}

fn builtin_commands() -> Vec<CommandSpec> {
    vec![
        cmd("state", "Server state", vec![]),
        cmd("upgrade", "Upgrade storage layout", vec![]),
        cmd("purge", "Purge old data", vec![]),
        cmd(
            "webfinger",
            "Resolve @user@host (or actor URL) via WebFinger",
            vec![freetext("account", 2048)],
        ),
        cmd(
            "actor",
            "Fetch actor JSON (optional uid for signed fetch)",
            vec![
                ArgSpec {
                    name: "uid",
                    kind: ArgKind::Identifier,
                    required: false,
                    max_len: None,
                },
                url_arg("url"),
            ],
        ),
        cmd("adduser", "Add user (prints password)", vec![uid()]),
        cmd("resetpwd", "Reset user password (prints new one)", vec![uid()]),
        cmd("deluser", "Delete user", vec![uid()]),
        cmd(
            "update",
            "Send user's updated profile to following instances",
            vec![uid()],
        ),
        cmd("verify_links", "Verify user links (rel=\"me\")", vec![uid()]),
        cmd(
            "webfinger_s",
            "Signed WebFinger (requires uid)",
            vec![uid(), freetext("account", 2048)],
        ),
        cmd(
            "request",
            "Fetch ActivityPub object JSON (signed, requires uid)",
            vec![uid(), url_arg("url")],
        ),
        cmd(
            "insert",
            "Fetch object and insert into user timeline",
            vec![uid(), url_arg("url")],
        ),
        cmd(
            "collect_replies",
            "Collect all replies from a post (enqueue job)",
            vec![uid(), url_arg("url")],
        ),
        cmd(
            "follow",
            "Follow an actor URL",
            vec![uid(), freetext("actor", 2048)],
        ),
        cmd(
            "unfollow",
            "Unfollow an actor URL",
            vec![uid(), freetext("actor", 2048)],
        ),
        cmd("muted", "List muted actors for user", vec![uid()]),
        cmd(
            "unmute",
            "Unmute an actor URL",
            vec![uid(), freetext("actor", 2048)],
        ),
        cmd(
            "limit",
            "Limit an actor (drops their announces; must be followed)",
            vec![uid(), freetext("actor", 2048)],
        ),
        cmd(
            "unlimit",
            "Remove limit from an actor",
            vec![uid(), freetext("actor", 2048)],
        ),
        cmd(
            "ping",
            "Ping an actor (actor URL or @user@host)",
            vec![uid(), freetext("actor_or_account", 2048)],
        ),
        cmd(
            "search",
            "Search posts by content (regex)",
            vec![uid(), freetext("regex", 2048)],
        ),
        cmd("pin", "Pin a post URL", vec![uid(), url_arg("msg_url")]),
        cmd("unpin", "Unpin a post URL", vec![uid(), url_arg("msg_url")]),
        cmd(
            "bookmark",
            "Bookmark a post URL",
            vec![uid(), url_arg("msg_url")],
        ),
        cmd(
            "unbookmark",
            "Remove bookmark for a post URL",
            vec![uid(), url_arg("msg_url")],
        ),
        cmd("lists", "List user lists", vec![uid()]),
        cmd(
            "list_members",
            "List members in a list",
            vec![uid(), freetext("name", 256)],
        ),
        cmd(
            "list_create",
            "Create a new list",
            vec![uid(), freetext("name", 256)],
        ),
        cmd(
            "list_remove",
            "Remove a list",
            vec![uid(), freetext("name", 256)],
        ),
        cmd(
            "list_add",
            "Add account to list (@user@host or actor URL)",
            vec![uid(), freetext("name", 256), freetext("account", 2048)],
        ),
        cmd(
            "list_del",
            "Delete actor URL from list",
            vec![uid(), freetext("name", 256), freetext("actor", 2048)],
        ),
        cmd(
            "block",
            "Block instance (URL or domain)",
            vec![freetext("instance_url", 2048)],
        ),
        cmd(
            "unblock",
            "Unblock instance (URL or domain)",
            vec![freetext("instance_url", 2048)],
        ),
    ]
}
