//! cqlshell - an interactive and scriptable CQL shell.
//!
//! Statements are typed at a prompt or read from a script file, dispatched
//! against a keyspace-bound session and printed as aligned tables.

mod commands;
mod completer;
mod executor;
mod formatter;
mod repl;
mod script;
mod tracer;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use cqlshell_client::{
    config::{DEFAULT_HOST, DEFAULT_KEYSPACE, DEFAULT_PORT},
    ConnectionConfig, KeyspaceSession, ScyllaConnector,
};
use tracing_subscriber::EnvFilter;

use executor::Shell;
use formatter::{format_error, ColorMode};
use script::{ScriptOptions, ScriptOutcome};

/// Exit code for a failed statement or connection.
const EXIT_FAILURE: i32 = 1;

/// Exit code when the script file cannot be read.
const EXIT_SCRIPT_UNREADABLE: i32 = 2;

/// cqlshell - CQL shell for Cassandra and ScyllaDB
#[derive(Parser, Debug)]
#[command(name = "cqlshell")]
#[command(version, about = "Interactive and scriptable CQL shell")]
pub struct Args {
    /// Contact point host
    #[arg(long, default_value = DEFAULT_HOST)]
    pub host: String,

    /// Native protocol port
    #[arg(long, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Username for password authentication
    #[arg(short = 'u', long, requires = "password")]
    pub username: Option<String>,

    /// Password for password authentication
    #[arg(short = 'p', long, requires = "username")]
    pub password: Option<String>,

    /// Keyspace to start in
    #[arg(short = 'k', long, default_value = DEFAULT_KEYSPACE)]
    pub keyspace: String,

    /// Execute statements from a script file
    #[arg(short = 'f', long, conflicts_with = "command")]
    pub file: Option<PathBuf>,

    /// Execute a single statement and exit
    #[arg(short = 'c', long)]
    pub command: Option<String>,

    /// Echo each script statement before running it
    #[arg(long)]
    pub print_cql: bool,

    /// Print "ok" after each successful script statement
    #[arg(long)]
    pub print_confirmation: bool,

    /// Stop the script at the first failing statement
    #[arg(long)]
    pub fail_on_error: bool,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,

    /// Request timeout in seconds
    #[arg(long, default_value_t = 10)]
    pub timeout: u64,
}

impl Args {
    fn connection_config(&self) -> ConnectionConfig {
        let config = ConnectionConfig::new(&self.host, self.port)
            .with_keyspace(&self.keyspace)
            .with_timeout(Duration::from_secs(self.timeout));
        match (&self.username, &self.password) {
            (Some(user), Some(password)) => config.with_credentials(user, password),
            _ => config,
        }
    }

    fn script_options(&self) -> ScriptOptions {
        ScriptOptions {
            print_cql: self.print_cql,
            print_confirmation: self.print_confirmation,
            fail_on_error: self.fail_on_error,
        }
    }
}

#[tokio::main]
async fn main() {
    // Diagnostics go to stderr so they never interleave with result tables
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("cqlshell=warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let code = match run(args).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            EXIT_FAILURE
        }
    };
    std::process::exit(code);
}

async fn run(args: Args) -> Result<i32, Box<dyn std::error::Error>> {
    let colors = ColorMode::new(!args.no_color && args.file.is_none());

    // Read the script before connecting so a bad path fails fast
    let script = match &args.file {
        Some(path) => match std::fs::read_to_string(path) {
            Ok(content) => Some(content),
            Err(e) => {
                eprintln!("error opening file {}: {}", path.display(), e);
                return Ok(EXIT_SCRIPT_UNREADABLE);
            }
        },
        None => None,
    };

    let session =
        match KeyspaceSession::connect(Arc::new(ScyllaConnector), args.connection_config()).await {
            Ok(session) => session,
            Err(e) => {
                eprintln!("{}", format_error(&e.to_string(), colors));
                return Ok(EXIT_FAILURE);
            }
        };

    if let Some(command) = &args.command {
        // Command mode: execute a single statement and exit
        run_command_mode(session, command, colors).await
    } else if let Some(content) = script {
        // Script mode: execute statements from file
        run_script_mode(session, &content, args.script_options()).await
    } else {
        // REPL mode: interactive shell
        repl::run(Shell::new(session, std::io::stdout(), colors)).await?;
        Ok(0)
    }
}

/// Execute a single statement and exit.
async fn run_command_mode(
    session: KeyspaceSession,
    command: &str,
    colors: ColorMode,
) -> Result<i32, Box<dyn std::error::Error>> {
    let mut shell = Shell::new(session, std::io::stdout(), colors);
    let step = shell.run(command).await;
    shell.close();
    Ok(if step.failed() { EXIT_FAILURE } else { 0 })
}

/// Execute statements from a script.
async fn run_script_mode(
    session: KeyspaceSession,
    content: &str,
    options: ScriptOptions,
) -> Result<i32, Box<dyn std::error::Error>> {
    let mut shell = Shell::new(session, std::io::stdout(), ColorMode::disabled());
    let outcome = script::run(&mut shell, content, options).await?;
    shell.close();
    Ok(match outcome {
        ScriptOutcome::Completed | ScriptOutcome::Exited => 0,
        ScriptOutcome::Aborted => EXIT_FAILURE,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = Args::parse_from(["cqlshell"]);
        let config = args.connection_config();
        assert_eq!(config, ConnectionConfig::localhost());
        assert_eq!(args.script_options(), ScriptOptions::default());
        assert!(!args.no_color);
    }

    #[test]
    fn test_flags_build_config() {
        let args = Args::parse_from([
            "cqlshell",
            "--host",
            "10.0.0.5",
            "--port",
            "19042",
            "-u",
            "admin",
            "-p",
            "secret",
            "-k",
            "shop",
            "--timeout",
            "3",
            "-f",
            "load.cql",
            "--print-cql",
            "--fail-on-error",
        ]);
        let config = args.connection_config();
        assert_eq!(config.node_address(), "10.0.0.5:19042");
        assert_eq!(config.keyspace, "shop");
        assert_eq!(config.timeout, Duration::from_secs(3));
        assert_eq!(config.credentials.as_ref().map(|c| c.username.as_str()), Some("admin"));

        let options = args.script_options();
        assert!(options.print_cql);
        assert!(options.fail_on_error);
        assert!(!options.print_confirmation);
    }

    #[test]
    fn test_username_requires_password() {
        assert!(Args::try_parse_from(["cqlshell", "-u", "admin"]).is_err());
        assert!(Args::try_parse_from(["cqlshell", "-f", "a.cql", "-c", "select 1;"]).is_err());
    }

    #[tokio::test]
    async fn test_unreadable_script_exit_code() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.cql");
        let args = Args::parse_from(["cqlshell", "-f", missing.to_str().unwrap()]);
        assert_eq!(run(args).await.unwrap(), EXIT_SCRIPT_UNREADABLE);
    }
}
