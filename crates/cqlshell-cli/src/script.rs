//! Batch execution of script files.

use std::io::Write;

use crate::executor::{Flow, Shell};

/// Script mode switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScriptOptions {
    /// Echo each statement before running it.
    pub print_cql: bool,
    /// Print `ok` after each statement that succeeds.
    pub print_confirmation: bool,
    /// Stop at the first connection or execution failure.
    pub fail_on_error: bool,
}

/// How a script run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptOutcome {
    /// Every statement ran.
    Completed,
    /// An `exit` statement stopped the script.
    Exited,
    /// A failure stopped the script under fail-on-error.
    Aborted,
}

/// Split a script into `;`-terminated statements. Text after the last `;`
/// is dropped.
pub fn split_statements(content: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut rest = content;
    while let Some(end) = rest.find(';') {
        let statement = rest[..=end].trim();
        if statement != ";" {
            statements.push(statement.to_string());
        }
        rest = &rest[end + 1..];
    }
    statements
}

/// Run every statement of `content` through `shell`.
pub async fn run<W: Write>(
    shell: &mut Shell<W>,
    content: &str,
    options: ScriptOptions,
) -> std::io::Result<ScriptOutcome> {
    for statement in split_statements(content) {
        if options.print_cql {
            writeln!(shell.output_mut(), "{statement}")?;
        }

        let step = shell.run(&statement).await;
        if step.flow == Flow::Exit {
            return Ok(ScriptOutcome::Exited);
        }
        if options.fail_on_error && step.is_fatal() {
            return Ok(ScriptOutcome::Aborted);
        }
        if options.print_confirmation && !step.failed() {
            writeln!(shell.output_mut(), "ok")?;
        }
    }
    Ok(ScriptOutcome::Completed)
}
