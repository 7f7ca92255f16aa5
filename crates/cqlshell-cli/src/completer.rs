//! Tab completion for the REPL.

use std::borrow::Cow;
use std::collections::BTreeMap;

use cqlshell_client::KeyspaceSession;
use rustyline::completion::{Completer, Pair};
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::validate::Validator;
use rustyline::{Context, Helper};
use tracing::debug;

/// Keywords offered at the start of a statement.
const STATEMENT_KEYWORDS: &[&str] = &[
    "alter", "apply", "batch", "begin", "create", "delete", "desc", "describe", "drop", "exit",
    "grant", "insert", "list", "quit", "revoke", "select", "tracing", "truncate", "update", "use",
];

const DESCRIBE_TARGETS: &[&str] = &["keyspace", "keyspaces", "table", "tables"];

const TRACING_SWITCHES: &[&str] = &["on", "off"];

/// Schema names completion draws from, taken from the current session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaSnapshot {
    pub keyspaces: Vec<String>,
    pub tables: Vec<String>,
    /// Column names per table of the active keyspace.
    pub columns: BTreeMap<String, Vec<String>>,
}

impl SchemaSnapshot {
    /// Read keyspaces, tables and columns. Lookups that fail leave their part
    /// empty.
    pub async fn load(session: &KeyspaceSession) -> Self {
        let keyspaces = session.list_keyspaces().await.unwrap_or_else(|e| {
            debug!(error = %e, "keyspace listing failed");
            Vec::new()
        });
        let tables = session.list_tables().await.unwrap_or_else(|e| {
            debug!(error = %e, "table listing failed");
            Vec::new()
        });

        let mut columns = BTreeMap::new();
        for table in &tables {
            if let Ok(cols) = session.list_columns(table).await {
                columns.insert(table.clone(), cols.into_keys().collect());
            }
        }

        Self {
            keyspaces,
            tables,
            columns,
        }
    }

    fn columns_of(&self, table: &str) -> Vec<String> {
        self.columns.get(table).cloned().unwrap_or_default()
    }
}

/// Completion candidates for the word ending at `pos`, with the byte offset
/// the candidates replace from.
pub fn candidates(snapshot: &SchemaSnapshot, line: &str, pos: usize) -> (usize, Vec<String>) {
    let before = line.get(..pos).unwrap_or(line);
    let word_start = before
        .char_indices()
        .rev()
        .find(|(_, c)| c.is_whitespace() || *c == ',')
        .map(|(i, c)| i + c.len_utf8())
        .unwrap_or(0);
    let word = &before[word_start..];
    let path: Vec<String> = before[..word_start]
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect();
    let path: Vec<&str> = path.iter().map(String::as_str).collect();

    let pool: Vec<String> = match path.as_slice() {
        [] => owned(STATEMENT_KEYWORDS),
        ["use"] => snapshot.keyspaces.clone(),
        ["desc" | "describe"] => owned(DESCRIBE_TARGETS),
        ["desc" | "describe", "keyspace"] => snapshot.keyspaces.clone(),
        ["desc" | "describe", "table"] => snapshot.tables.clone(),
        ["tracing"] => owned(TRACING_SWITCHES),
        ["insert", "into"] | ["delete", "from"] | ["update"] => snapshot.tables.clone(),
        ["select", .., "from"] => snapshot.tables.clone(),
        ["update", table, "set", ..] => snapshot.columns_of(table),
        ["delete", "from", table, "where", ..] => snapshot.columns_of(table),
        ["select", rest @ ..] => match rest.iter().position(|w| *w == "from") {
            Some(i) if rest.get(i + 2) == Some(&"where") => snapshot.columns_of(rest[i + 1]),
            _ => Vec::new(),
        },
        _ => Vec::new(),
    };

    let lowered = word.to_lowercase();
    let matches = pool
        .into_iter()
        .filter(|candidate| candidate.to_lowercase().starts_with(&lowered))
        .collect();
    (word_start, matches)
}

fn owned(words: &[&str]) -> Vec<String> {
    words.iter().map(|w| w.to_string()).collect()
}

/// Line editor helper serving completions from a [`SchemaSnapshot`].
#[derive(Default)]
pub struct CqlHelper {
    snapshot: SchemaSnapshot,
}

impl CqlHelper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_snapshot(&mut self, snapshot: SchemaSnapshot) {
        self.snapshot = snapshot;
    }
}

impl Completer for CqlHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let (start, words) = candidates(&self.snapshot, line, pos);
        let pairs = words
            .into_iter()
            .map(|word| Pair {
                display: word.clone(),
                replacement: word,
            })
            .collect();
        Ok((start, pairs))
    }
}

impl Hinter for CqlHelper {
    type Hint = String;

    fn hint(&self, _line: &str, _pos: usize, _ctx: &Context<'_>) -> Option<String> {
        None
    }
}

impl Highlighter for CqlHelper {
    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        Cow::Borrowed(line)
    }

    fn highlight_char(&self, _line: &str, _pos: usize, _kind: rustyline::highlight::CmdKind) -> bool {
        false
    }
}

impl Validator for CqlHelper {}

impl Helper for CqlHelper {}
