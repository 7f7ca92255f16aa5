//! Interactive REPL implementation.

use std::io::Stdout;
use std::path::PathBuf;

use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use rustyline::{Config, Editor};
use tracing::debug;

use crate::completer::{CqlHelper, SchemaSnapshot};
use crate::executor::{Flow, Shell};

const PROMPT_PREFIX: &str = "cqlshell";
const CONTINUATION_PROMPT: &str = ">>> ";

/// Get the history file path.
fn history_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".cqlshell_history")
}

/// Prompt showing the active keyspace.
pub fn prompt(keyspace: &str) -> String {
    format!("{PROMPT_PREFIX}:{keyspace}> ")
}

/// Collects input lines until one ends with `;`.
#[derive(Debug, Default)]
pub struct StatementBuffer {
    lines: Vec<String>,
}

impl StatementBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a line. Returns the complete statement, joined with spaces, once
    /// the line ends with `;`. Blank lines are ignored.
    pub fn push_line(&mut self, line: &str) -> Option<String> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        self.lines.push(line.to_string());
        if !line.ends_with(';') {
            return None;
        }
        let statement = self.lines.join(" ");
        self.lines.clear();
        Some(statement)
    }

    /// Whether a statement is partially entered.
    pub fn is_pending(&self) -> bool {
        !self.lines.is_empty()
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }
}

/// Run the interactive REPL.
pub async fn run(mut shell: Shell<Stdout>) -> Result<(), Box<dyn std::error::Error>> {
    let rl_config = Config::builder()
        .history_ignore_space(true)
        .auto_add_history(false)
        .build();

    let mut helper = CqlHelper::new();
    helper.set_snapshot(SchemaSnapshot::load(shell.session()).await);
    let mut rl: Editor<CqlHelper, DefaultHistory> = Editor::with_config(rl_config)?;
    rl.set_helper(Some(helper));

    // Load history
    let hist_path = history_path();
    if hist_path.exists() {
        if let Err(e) = rl.load_history(&hist_path) {
            debug!(error = %e, "could not load history");
        }
    }

    let mut buffer = StatementBuffer::new();
    loop {
        let current_prompt = if buffer.is_pending() {
            CONTINUATION_PROMPT.to_string()
        } else {
            prompt(shell.session().active_keyspace())
        };

        match rl.readline(&current_prompt) {
            Ok(line) => {
                let Some(statement) = buffer.push_line(&line) else {
                    continue;
                };
                let step = shell.run(&statement).await;
                if step.flow == Flow::Exit {
                    break;
                }
                if let Err(e) = rl.add_history_entry(statement.as_str()) {
                    debug!(error = %e, "could not record history");
                }

                let snapshot = SchemaSnapshot::load(shell.session()).await;
                if let Some(helper) = rl.helper_mut() {
                    helper.set_snapshot(snapshot);
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("^C");
                buffer.clear();
                continue;
            }
            Err(ReadlineError::Eof) => break,
            Err(err) => {
                println!("Error: {:?}", err);
                break;
            }
        }
    }

    // Save history
    if let Err(e) = rl.save_history(&hist_path) {
        debug!(error = %e, "could not save history");
    }

    shell.close();
    Ok(())
}
