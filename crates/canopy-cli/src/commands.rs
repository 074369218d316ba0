//! Command parsing for the shell.
//!
//! This module parses input lines into structured [`Command`] values.

use canopy_core::{InstanceId, State};
use canopy_proto::NodeKey;
use serde_json::Value;

/// Parsed command from user input.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Mount a registered component as a root.
    Mount {
        /// Component name.
        component: String,
    },

    /// Unmount an instance.
    Unmount {
        /// Target instance.
        id: InstanceId,
    },

    /// Merge a partial into an instance's state.
    Set {
        /// Target instance.
        id: InstanceId,
        /// Partial state.
        state: State,
    },

    /// Print an instance's state.
    Get {
        /// Target instance.
        id: InstanceId,
    },

    /// Dispatch a store action.
    Dispatch {
        /// Action name.
        action: String,
        /// Optional JSON payload.
        payload: Option<Value>,
    },

    /// Fire a surface event on a node.
    Click {
        /// Node carrying the listener.
        node: NodeKey,
        /// Event property, `onClick` unless given.
        event: String,
    },

    /// Navigate the router.
    Go {
        /// Target path.
        path: String,
    },

    /// Print the instance tree.
    Tree,

    /// Print the store snapshot.
    Store,

    /// Print the event history.
    History,

    /// Print the surface markup.
    Render,

    /// List registered components.
    Components,

    /// List store actions.
    Actions,

    /// Print command help.
    Help,

    /// Quit the shell.
    Quit,

    /// Raw bridge request in JSON.
    Request {
        /// Request text.
        json: String,
    },

    /// Blank input.
    Empty,

    /// Unknown or invalid command.
    Unknown {
        /// The original input.
        input: String,
    },

    /// Command with missing or invalid arguments.
    InvalidArgs {
        /// Command name.
        command: String,
        /// Error message.
        error: String,
    },
}

/// Help text listing every command.
pub const HELP: &str = "\
/mount <component>           mount a registered component
/unmount <id>                unmount an instance
/set <id> <json object>      merge state into an instance
/get <id>                    print an instance's state
/dispatch <action> [json]    dispatch a store action
/click <node> [event]        fire a surface event (default onClick)
/go <path>                   navigate
/tree  /store  /history  /render  /components  /actions
/help  /quit
{...}                        raw bridge request";

/// Parse a user input string into a command.
///
/// Commands start with `/`. Lines starting with `{` are raw bridge requests.
pub fn parse(input: &str) -> Command {
    let input = input.trim();

    if input.is_empty() {
        return Command::Empty;
    }
    if input.starts_with('{') {
        return Command::Request { json: input.to_string() };
    }

    let Some(cmd_str) = input.strip_prefix('/') else {
        return Command::Unknown { input: input.to_string() };
    };

    let (command, rest) = match cmd_str.split_once(char::is_whitespace) {
        Some((command, rest)) => (command, rest.trim()),
        None => (cmd_str, ""),
    };
    let mut words = rest.split_whitespace();

    match command {
        "mount" => match words.next() {
            Some(component) => Command::Mount { component: component.to_string() },
            None => usage("mount", "Usage: /mount <component>"),
        },

        "unmount" => match words.next() {
            Some(id) => Command::Unmount { id: id.into() },
            None => usage("unmount", "Usage: /unmount <id>"),
        },

        "get" => match words.next() {
            Some(id) => Command::Get { id: id.into() },
            None => usage("get", "Usage: /get <id>"),
        },

        "set" => {
            let Some((id, state)) = rest.split_once(char::is_whitespace) else {
                return usage("set", "Usage: /set <id> <json object>");
            };
            match serde_json::from_str::<Value>(state.trim()) {
                Ok(Value::Object(state)) => Command::Set { id: id.into(), state },
                Ok(_) => usage("set", "State must be a JSON object"),
                Err(err) => usage("set", &format!("Invalid JSON: {err}")),
            }
        },

        "dispatch" => {
            let (action, payload) = match rest.split_once(char::is_whitespace) {
                Some((action, payload)) => (action, Some(payload.trim())),
                None => (rest, None),
            };
            if action.is_empty() {
                return usage("dispatch", "Usage: /dispatch <action> [json]");
            }
            match payload.map(serde_json::from_str::<Value>).transpose() {
                Ok(payload) => Command::Dispatch { action: action.to_string(), payload },
                Err(err) => usage("dispatch", &format!("Invalid JSON: {err}")),
            }
        },

        "click" => match words.next().map(str::parse::<u32>) {
            Some(Ok(node)) => Command::Click {
                node: NodeKey(node),
                event: words.next().unwrap_or("onClick").to_string(),
            },
            Some(Err(_)) => usage("click", "Invalid node"),
            None => usage("click", "Usage: /click <node> [event]"),
        },

        "go" => match words.next() {
            Some(path) => Command::Go { path: path.to_string() },
            None => usage("go", "Usage: /go <path>"),
        },

        "tree" => Command::Tree,
        "store" => Command::Store,
        "history" => Command::History,
        "render" => Command::Render,
        "components" => Command::Components,
        "actions" => Command::Actions,
        "help" | "h" => Command::Help,
        "quit" | "q" => Command::Quit,

        _ => Command::Unknown { input: input.to_string() },
    }
}

fn usage(command: &str, error: &str) -> Command {
    Command::InvalidArgs { command: command.to_string(), error: error.to_string() }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn parse_mount() {
        assert_eq!(parse("/mount Counter"), Command::Mount { component: "Counter".into() });
    }

    #[test]
    fn parse_set_with_json() {
        let line = r#"/set Counter-1 {"count": 3, "label": "a b"}"#;
        let Command::Set { id, state } = parse(line) else {
            panic!("expected set");
        };
        assert_eq!(id.as_str(), "Counter-1");
        assert_eq!(state.get("label"), Some(&json!("a b")));
    }

    #[test]
    fn parse_set_rejects_non_objects() {
        assert!(matches!(parse("/set Counter-1 [1]"), Command::InvalidArgs { .. }));
        assert!(matches!(parse("/set Counter-1"), Command::InvalidArgs { .. }));
    }

    #[test]
    fn parse_dispatch() {
        assert_eq!(
            parse("/dispatch toggle"),
            Command::Dispatch { action: "toggle".into(), payload: None }
        );
        assert_eq!(parse(r#"/dispatch set "dark""#), Command::Dispatch {
            action: "set".into(),
            payload: Some(json!("dark")),
        });
        assert!(matches!(parse("/dispatch"), Command::InvalidArgs { .. }));
    }

    #[test]
    fn parse_click() {
        assert_eq!(parse("/click 4"), Command::Click { node: NodeKey(4), event: "onClick".into() });
        assert_eq!(
            parse("/click 4 onHover"),
            Command::Click { node: NodeKey(4), event: "onHover".into() }
        );
        assert!(matches!(parse("/click four"), Command::InvalidArgs { .. }));
    }

    #[test]
    fn parse_raw_request() {
        let json = r#"{"op":"store-state"}"#;
        assert_eq!(parse(json), Command::Request { json: json.into() });
    }

    #[test]
    fn parse_misc() {
        assert_eq!(parse("   "), Command::Empty);
        assert_eq!(parse("/q"), Command::Quit);
        assert_eq!(parse("/go /about"), Command::Go { path: "/about".into() });
        assert_eq!(parse("/actions"), Command::Actions);
        assert_eq!(parse("/frobnicate"), Command::Unknown { input: "/frobnicate".into() });
        assert_eq!(parse("hello"), Command::Unknown { input: "hello".into() });
    }
}
