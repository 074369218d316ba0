//! Line-oriented shell over an [`App`].

use std::io::{BufRead, Write};

use canopy_app::{App, Bridge};
use canopy_core::RuntimeError;
use canopy_harness::MemorySurface;
use canopy_proto::NodeKey;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::commands::{self, Command, HELP};

/// Shell failures that end the session.
#[derive(Debug, Error)]
pub enum CliError {
    /// Reading input or writing output failed
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// The demo application could not be assembled
    #[error("setup failed: {0}")]
    Setup(#[from] RuntimeError),
}

/// What the session does after a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Print the text and read the next line
    Continue(String),
    /// End the session
    Quit,
}

/// Application plus the surface it renders into.
pub struct Shell {
    app: App,
    surface: MemorySurface,
}

impl Shell {
    /// Shell over `app`, which must render into `surface`.
    pub fn new(app: App, surface: MemorySurface) -> Self {
        Self { app, surface }
    }

    /// The application.
    pub fn app(&self) -> &App {
        &self.app
    }

    /// Execute one command. Runtime failures are reported as text and leave
    /// the session running.
    pub fn execute(&mut self, command: Command) -> Outcome {
        debug!(?command, "execute");
        match command {
            Command::Quit => Outcome::Quit,
            Command::Empty => Outcome::Continue(String::new()),
            Command::Help => Outcome::Continue(HELP.to_string()),
            Command::Unknown { input } => Outcome::Continue(format!("unknown command: {input}")),
            Command::InvalidArgs { command, error } => {
                Outcome::Continue(format!("{command}: {error}"))
            },
            Command::Request { json } => {
                Outcome::Continue(Bridge::handle_json(&mut self.app, &json))
            },
            other => {
                Outcome::Continue(self.run(other).unwrap_or_else(|err| format!("error: {err}")))
            },
        }
    }

    fn run(&mut self, command: Command) -> Result<String, RuntimeError> {
        let text = match command {
            Command::Mount { component } => {
                let id = self.app.mount(&component, NodeKey::ROOT)?;
                format!("mounted {id}")
            },
            Command::Unmount { id } => {
                self.app.unmount(&id)?;
                format!("unmounted {id}")
            },
            Command::Set { id, state } => {
                self.app.set_state(&id, state)?;
                "ok".to_string()
            },
            Command::Get { id } => pretty(&self.app.get_state(&id)),
            Command::Dispatch { action, payload } => {
                self.app.dispatch(&action, payload)?;
                "ok".to_string()
            },
            Command::Click { node, event } => {
                if self.app.dispatch_event(node, &event, &Value::Null)? {
                    "handled".to_string()
                } else {
                    format!("no {event} listener on {node}")
                }
            },
            Command::Go { path } => {
                self.app.navigate(&path)?;
                format!("at {}", self.app.current_path().unwrap_or("/"))
            },
            Command::Tree => pretty(&self.app.instance_tree()),
            Command::Store => pretty(&self.app.store_state()),
            Command::History => self
                .app
                .event_history()
                .iter()
                .map(|record| {
                    let payload = Value::Object(record.payload.clone());
                    format!("{:>8} {} {payload}", record.timestamp, record.kind)
                })
                .collect::<Vec<_>>()
                .join("\n"),
            Command::Render => self.surface.render(),
            Command::Components => self.app.registered_names().join(" "),
            Command::Actions => self
                .app
                .runtime()
                .store()
                .map(|store| store.action_names().collect::<Vec<_>>().join(" "))
                .ok_or(RuntimeError::NoStoreConfigured)?,
            Command::Quit
            | Command::Empty
            | Command::Help
            | Command::Unknown { .. }
            | Command::InvalidArgs { .. }
            | Command::Request { .. } => String::new(),
        };
        self.app.process_navigation()?;
        Ok(text)
    }

    /// Read commands from `input` until it ends or `/quit`, writing each
    /// reply to `output`.
    pub fn run_session(
        &mut self,
        input: impl BufRead,
        mut output: impl Write,
    ) -> Result<(), CliError> {
        for line in input.lines() {
            match self.execute(commands::parse(&line?)) {
                Outcome::Quit => break,
                Outcome::Continue(text) if text.is_empty() => {},
                Outcome::Continue(text) => writeln!(output, "{text}")?,
            }
        }
        output.flush()?;
        Ok(())
    }
}

fn pretty(value: &impl Serialize) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|err| format!("error: {err}"))
}
