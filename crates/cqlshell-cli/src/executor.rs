//! Statement dispatch.

use std::io::Write;

use colored::Color;
use cqlshell_client::{ColumnRole, KeyspaceSession, QueryResult};
use thiserror::Error;
use tracing::debug;

use crate::commands::{is_select, Command, DescribeTarget, TracingSwitch};
use crate::formatter::{
    format_error, render_result, render_table, role_color, Cell, ColorMode, TableColumn,
};
use crate::tracer::Tracer;

/// Execution errors.
#[derive(Debug, Error)]
pub enum ExecuteError {
    /// Client or driver error.
    #[error(transparent)]
    Client(#[from] cqlshell_client::Error),

    /// A shell command with arguments it does not accept.
    #[error("{0}")]
    Usage(String),

    /// Writing output failed.
    #[error("output error: {0}")]
    Io(#[from] std::io::Error),
}

impl ExecuteError {
    /// Whether a script run with fail-on-error should stop.
    pub fn is_fatal(&self) -> bool {
        match self {
            ExecuteError::Client(e) => e.is_fatal(),
            ExecuteError::Usage(_) => false,
            ExecuteError::Io(_) => true,
        }
    }
}

/// Whether the front end keeps reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

/// Outcome of one statement after its error, if any, has been printed.
#[derive(Debug)]
pub struct Step {
    pub flow: Flow,
    pub error: Option<ExecuteError>,
}

impl Step {
    pub fn failed(&self) -> bool {
        self.error.is_some()
    }

    pub fn is_fatal(&self) -> bool {
        self.error.as_ref().map(ExecuteError::is_fatal).unwrap_or(false)
    }
}

/// A session plus the output it writes to.
pub struct Shell<W: Write> {
    session: KeyspaceSession,
    out: W,
    colors: ColorMode,
}

impl<W: Write> Shell<W> {
    pub fn new(session: KeyspaceSession, out: W, colors: ColorMode) -> Self {
        Self {
            session,
            out,
            colors,
        }
    }

    pub fn session(&self) -> &KeyspaceSession {
        &self.session
    }

    pub fn output(&self) -> &W {
        &self.out
    }

    pub fn output_mut(&mut self) -> &mut W {
        &mut self.out
    }

    /// Release the session and hand back the output.
    pub fn close(self) -> W {
        self.session.close();
        self.out
    }

    /// Process a statement, printing its error instead of returning it.
    pub async fn run(&mut self, statement: &str) -> Step {
        match self.process(statement).await {
            Ok(flow) => Step { flow, error: None },
            Err(e) => {
                let message = format_error(&e.to_string(), self.colors);
                if let Err(io) = writeln!(self.out, "{message}") {
                    debug!(error = %io, "failed to print error");
                }
                Step {
                    flow: Flow::Continue,
                    error: Some(e),
                }
            }
        }
    }

    /// Classify and execute one complete statement.
    pub async fn process(&mut self, statement: &str) -> Result<Flow, ExecuteError> {
        match Command::parse(statement) {
            Command::Exit => return Ok(Flow::Exit),
            Command::Noop => {}
            Command::UseKeyspace(keyspace) => self.session.rebind(&keyspace).await?,
            Command::Describe(target) => self.describe(target).await?,
            Command::Tracing(TracingSwitch::On) => {
                self.session.enable_tracing()?;
                writeln!(self.out, "Now Tracing is enabled.")?;
            }
            Command::Tracing(TracingSwitch::Off) => {
                self.session.disable_tracing()?;
                writeln!(self.out, "Disabled Tracing.")?;
            }
            Command::Tracing(TracingSwitch::Invalid) => {
                return Err(ExecuteError::Usage("Improper tracing command.".to_string()));
            }
            Command::Passthrough(cql) => self.passthrough(&cql).await?,
        }
        Ok(Flow::Continue)
    }

    async fn passthrough(&mut self, cql: &str) -> Result<(), ExecuteError> {
        let mut tracer = Tracer::new(&self.session, self.colors).await;
        if let Some(warning) = tracer.take_warning() {
            writeln!(self.out, "{}", format_error(&warning.to_string(), self.colors))?;
        }

        let result = match tracer.query(&self.session, cql).await {
            Ok(result) => result,
            Err(e) => {
                tracer.close(&mut self.out)?;
                return Err(e.into());
            }
        };

        if is_select(cql) {
            let rendered = self.render_rows(&result).await;
            self.out.write_all(rendered.as_bytes())?;
        }
        tracer.close(&mut self.out)?;
        Ok(())
    }

    async fn render_rows(&self, result: &QueryResult) -> String {
        let mut roles = Vec::with_capacity(result.columns.len());
        for column in &result.columns {
            roles.push(self.session.column_role(column).await);
        }
        render_result(&result.columns, &roles, &result.rows, self.colors)
    }

    async fn describe(&mut self, target: DescribeTarget) -> Result<(), ExecuteError> {
        let rendered = match target {
            DescribeTarget::Keyspaces => lines(self.session.list_keyspaces().await?),
            DescribeTarget::Tables => lines(self.session.list_tables().await?),
            DescribeTarget::Keyspace(name) => {
                let name = name.unwrap_or_else(|| self.session.active_keyspace().to_string());
                match self.session.keyspace_metadata(&name).await {
                    Ok(keyspace) => {
                        let columns = [
                            TableColumn::new("table", Color::Magenta),
                            TableColumn::new("columns", Color::Magenta),
                        ];
                        let rows: Vec<Vec<Cell>> = keyspace
                            .tables
                            .values()
                            .map(|table| {
                                let names: Vec<&str> = table
                                    .ordered_columns()
                                    .into_iter()
                                    .map(|c| c.name.as_str())
                                    .collect();
                                vec![
                                    Cell::new(table.name.as_str(), Color::Yellow),
                                    Cell::new(names.join(", "), Color::Yellow),
                                ]
                            })
                            .collect();
                        render_table(&columns, &rows, self.colors)
                    }
                    Err(cqlshell_client::Error::NotFound(what)) => {
                        debug!(%what, "describe keyspace missed");
                        String::new()
                    }
                    Err(e) => return Err(e.into()),
                }
            }
            DescribeTarget::Table(name) => {
                let (keyspace, table) = match name.split_once('.') {
                    Some((ks, table)) => (ks.to_string(), table.to_string()),
                    None => (self.session.active_keyspace().to_string(), name.clone()),
                };
                match self.session.table_metadata(&keyspace, &table).await {
                    Ok(table) => {
                        let columns = [
                            TableColumn::new("name", Color::Magenta),
                            TableColumn::new("type", Color::Magenta),
                            TableColumn::new("kind", Color::Magenta),
                        ];
                        let rows: Vec<Vec<Cell>> = table
                            .ordered_columns()
                            .into_iter()
                            .map(|column| {
                                let role = table.role(&column.name);
                                let name_color = match role {
                                    ColumnRole::Regular => Color::Yellow,
                                    key => role_color(key),
                                };
                                vec![
                                    Cell::new(column.name.as_str(), name_color),
                                    Cell::new(column.typ.to_string(), Color::Green),
                                    Cell::new(column.kind.as_str(), Color::Green),
                                ]
                            })
                            .collect();
                        render_table(&columns, &rows, self.colors)
                    }
                    Err(cqlshell_client::Error::NotFound(what)) => {
                        debug!(%what, "describe table missed");
                        String::new()
                    }
                    Err(e) => return Err(e.into()),
                }
            }
            DescribeTarget::Unknown => String::new(),
        };
        self.out.write_all(rendered.as_bytes())?;
        Ok(())
    }
}

fn lines(names: Vec<String>) -> String {
    names.into_iter().map(|name| name + "\n").collect()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use cqlshell_client::{
        ColumnKind, ColumnSpec, ColumnType, ConnectionConfig, KeyspaceMetadata, MemoryCluster,
        TableMetadata, Value,
    };

    fn app_cluster() -> MemoryCluster {
        let cluster = MemoryCluster::new().with_keyspace(
            KeyspaceMetadata::new("app").with_table(
                TableMetadata::new("users")
                    .with_column("id", ColumnType::Int, ColumnKind::PartitionKey)
                    .with_column("name", ColumnType::Text, ColumnKind::Regular),
            ),
        );
        cluster.respond(
            "SELECT * FROM users",
            QueryResult::new(
                vec![
                    ColumnSpec::new("app", "users", "id", ColumnType::Int),
                    ColumnSpec::new("app", "users", "name", ColumnType::Text),
                ],
                vec![vec![Some(Value::Int(1)), Some(Value::Text("a".into()))]],
            ),
        );
        cluster
    }

    async fn shell(cluster: &MemoryCluster, keyspace: &str) -> Shell<Vec<u8>> {
        let session = KeyspaceSession::connect(
            Arc::new(cluster.clone()),
            ConnectionConfig::localhost().with_keyspace(keyspace),
        )
        .await
        .unwrap();
        Shell::new(session, Vec::new(), ColorMode::disabled())
    }

    fn text(shell: &Shell<Vec<u8>>) -> String {
        String::from_utf8(shell.output().clone()).unwrap()
    }

    #[tokio::test]
    async fn test_select_renders_table() {
        let cluster = app_cluster();
        let mut shell = shell(&cluster, "app").await;

        let step = shell.run("SELECT * FROM users LIMIT 1;").await;
        assert_eq!(step.flow, Flow::Continue);
        assert!(!step.failed());
        assert_eq!(
            text(&shell),
            "\n| id | name \n+----+------\n|  1 |    a \n\n (1 row)\n"
        );
        assert_eq!(cluster.executed()[0].cql, "SELECT * FROM users LIMIT 1;");
    }

    #[tokio::test]
    async fn test_partition_header_colored() {
        colored::control::set_override(true);
        let cluster = app_cluster();
        let session = KeyspaceSession::connect(
            Arc::new(cluster.clone()),
            ConnectionConfig::localhost().with_keyspace("app"),
        )
        .await
        .unwrap();
        let mut shell = Shell::new(session, Vec::new(), ColorMode::enabled());
        shell.run("select * from users").await;

        let out = text(&shell);
        assert!(out.contains("\u{1b}[31mid"));
        assert!(out.contains("\u{1b}[35mname"));
    }

    #[tokio::test]
    async fn test_non_select_prints_nothing() {
        let cluster = app_cluster();
        let mut shell = shell(&cluster, "app").await;
        let step = shell.run("INSERT INTO users (id, name) VALUES (2, 'b');").await;
        assert!(!step.failed());
        assert!(text(&shell).is_empty());
    }

    #[tokio::test]
    async fn test_use_rebinds_and_failure_keeps_keyspace() {
        let cluster = app_cluster();
        let mut shell = shell(&cluster, "system").await;

        for stmt in ["use app;", "USE app", "use \"app\";"] {
            assert!(!shell.run(stmt).await.failed());
            assert_eq!(shell.session().active_keyspace(), "app");
        }

        let step = shell.run("use missing;").await;
        assert!(step.failed());
        assert!(step.is_fatal());
        assert_eq!(shell.session().active_keyspace(), "app");
        assert_eq!(cluster.open_sessions(), 1);
        assert!(text(&shell).contains("Keyspace 'missing' does not exist"));

        shell.run("select * from users;").await;
        assert!(text(&shell).contains("(1 row)"));
    }

    #[tokio::test]
    async fn test_tracing_toggles() {
        let cluster = app_cluster();
        let mut shell = shell(&cluster, "app").await;

        let step = shell.run("tracing off;").await;
        assert!(step.failed());
        assert!(!step.is_fatal());

        assert!(!shell.run("TRACING ON;").await.failed());
        let again = shell.run("tracing on").await;
        assert!(again.failed());
        assert!(shell.session().tracing_enabled());

        shell.run("select * from users").await;
        assert!(!shell.run("tracing off;").await.failed());
        assert_eq!(cluster.open_sessions(), 1);

        let out = text(&shell);
        assert!(out.contains("Tracing is not enabled."));
        assert!(out.contains("Now Tracing is enabled."));
        assert!(out.contains("Tracing is already enabled. Use TRACING OFF to disable."));
        assert!(out.contains("Disabled Tracing."));
    }

    #[tokio::test]
    async fn test_tracing_off_restores_plain_execution() {
        let cluster = app_cluster();
        let mut shell = shell(&cluster, "app").await;

        shell.run("tracing on;").await;
        shell.run("select * from users;").await;
        let traced = cluster.executed();
        assert!(traced.iter().any(|s| s.tracing));

        assert!(!shell.run("tracing off;").await.failed());
        shell.output_mut().clear();
        assert!(!shell.run("select * from users;").await.failed());

        let log = cluster.executed();
        let after = &log[traced.len()..];
        assert_eq!(after.len(), 1);
        assert!(!after[0].tracing);
        assert_eq!(after[0].cql, "select * from users;");
        assert!(after.iter().all(|s| !s.cql.contains("system_traces")));
        assert_eq!(cluster.open_sessions(), 1);
        assert_eq!(
            text(&shell),
            "\n| id | name \n+----+------\n|  1 |    a \n\n (1 row)\n"
        );
    }

    #[derive(Clone, Default)]
    struct LogBuffer(Arc<std::sync::Mutex<Vec<u8>>>);

    impl Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_failures_are_not_logged_at_warn() {
        let logs = LogBuffer::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::WARN)
            .with_writer(move || writer.clone())
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let cluster = app_cluster();
        let mut shell = shell(&cluster, "app").await;
        assert!(shell.run("use missing;").await.failed());

        shell.run("tracing on;").await;
        cluster.set_refuse_connections(true);
        shell.run("select * from users;").await;

        let out = text(&shell);
        assert_eq!(out.matches("Keyspace 'missing' does not exist").count(), 1);
        assert!(out.contains("Cannot create trace session: "));
        assert!(logs.0.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_improper_tracing_command() {
        let cluster = app_cluster();
        let mut shell = shell(&cluster, "app").await;
        let step = shell.run("tracing sideways;").await;
        assert!(matches!(step.error, Some(ExecuteError::Usage(_))));
        assert!(!shell.session().tracing_enabled());
        assert_eq!(text(&shell), "Improper tracing command.\n");
    }

    #[tokio::test]
    async fn test_execution_error_is_printed() {
        let cluster = app_cluster();
        cluster.fail("SELECT * FROM nope", "unconfigured table nope");
        let mut shell = shell(&cluster, "app").await;

        let step = shell.run("SELECT * FROM nope;").await;
        assert!(step.is_fatal());
        assert_eq!(
            text(&shell),
            "error executing cql cql=\"SELECT * FROM nope;\" err=unconfigured table nope\n"
        );
    }

    #[tokio::test]
    async fn test_describe_commands() {
        let cluster = app_cluster();
        let mut shell = shell(&cluster, "app").await;

        shell.run("desc keyspaces;").await;
        shell.run("desc tables;").await;
        let out = text(&shell);
        assert_eq!(out, "app\nsystem\nsystem_traces\nusers\n");

        shell.output_mut().clear();
        shell.run("describe table users;").await;
        let out = text(&shell);
        assert!(out.contains("|   id |  int | partition_key "));
        assert!(out.contains("| name | text |       regular "));

        shell.output_mut().clear();
        shell.run("desc table \"app\".\"users\";").await;
        assert!(text(&shell).contains("|   id |  int | partition_key "));

        shell.output_mut().clear();
        shell.run("desc keyspace;").await;
        assert!(text(&shell).contains("| users | id, name "));

        shell.output_mut().clear();
        for stmt in ["desc table nope;", "desc keyspace nope;", "desc cluster;"] {
            let step = shell.run(stmt).await;
            assert!(!step.failed(), "{stmt}");
        }
        assert!(text(&shell).is_empty());
    }

    #[tokio::test]
    async fn test_exit_and_comments() {
        let cluster = app_cluster();
        let mut shell = shell(&cluster, "app").await;
        assert_eq!(shell.run("-- nothing here;").await.flow, Flow::Continue);
        assert_eq!(shell.run("EXIT;").await.flow, Flow::Exit);
        assert!(cluster.executed().is_empty());
    }
}
