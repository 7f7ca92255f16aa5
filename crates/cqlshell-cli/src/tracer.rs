//! Query tracing.
//!
//! With tracing on, each statement gets its own [`Tracer`] holding a second
//! session. Trace rows are read on that session after the primary result is
//! in, rendered into a buffer, and written out when the tracer is closed.

use std::io::Write;
use std::time::Duration;

use chrono::DateTime;
use colored::Color;
use cqlshell_client::{Error, KeyspaceSession, QueryResult, Value};
use tracing::debug;
use uuid::Uuid;

use crate::formatter::{render_table, Cell, ColorMode, TableColumn};

/// Attempts at reading the trace session row before giving up.
const TRACE_FETCH_ATTEMPTS: u32 = 5;

/// Pause between attempts.
const TRACE_FETCH_INTERVAL: Duration = Duration::from_millis(3);

const TIMESTAMP_WIDTH: usize = 23;
const SOURCE_WIDTH: usize = 12;
const ELAPSED_WIDTH: usize = 12;
const ACTIVITY_WIDTH: usize = 60;

/// Wraps the execution of one statement.
pub struct Tracer {
    trace_session: Option<KeyspaceSession>,
    warning: Option<Error>,
    buffer: String,
    colors: ColorMode,
}

impl Tracer {
    /// A pass-through when tracing is off. Otherwise clones `session`; if the
    /// clone fails the statement runs untraced and [`Tracer::take_warning`]
    /// reports why.
    pub async fn new(session: &KeyspaceSession, colors: ColorMode) -> Self {
        let mut tracer = Self {
            trace_session: None,
            warning: None,
            buffer: String::new(),
            colors,
        };
        if !session.tracing_enabled() {
            return tracer;
        }

        match session.clone_session().await {
            Ok(clone) => tracer.trace_session = Some(clone),
            Err(e) => {
                debug!(error = %e, "trace session unavailable");
                tracer.warning = Some(Error::TraceUnavailable(e.to_string()));
            }
        }
        tracer
    }

    /// Whether statements run through this tracer are traced.
    pub fn is_tracing(&self) -> bool {
        self.trace_session.is_some()
    }

    pub fn take_warning(&mut self) -> Option<Error> {
        self.warning.take()
    }

    /// Execute `cql` on `session`, then collect its trace.
    pub async fn query(
        &mut self,
        session: &KeyspaceSession,
        cql: &str,
    ) -> Result<QueryResult, Error> {
        if !self.is_tracing() {
            return session.execute(cql).await;
        }

        let result = session.execute_traced(cql).await?;
        match result.tracing_id {
            Some(id) => self.write_trace(id).await,
            None => debug!("statement returned no tracing id"),
        }
        Ok(result)
    }

    async fn write_trace(&mut self, id: Uuid) {
        let Some(trace_session) = self.trace_session.as_ref() else {
            return;
        };
        match TraceRecord::fetch(trace_session, id).await {
            Ok(Some(record)) => self.buffer.push_str(&record.render(self.colors)),
            Ok(None) => self
                .buffer
                .push_str(&format!("Trace for session {} is not available.\n", hex_id(id))),
            Err(e) => self.buffer.push_str(&format!("Error: {e}\n")),
        }
    }

    /// Write the buffered trace and release the trace session.
    pub fn close<W: Write>(self, out: &mut W) -> std::io::Result<()> {
        out.write_all(self.buffer.as_bytes())?;
        if let Some(session) = self.trace_session {
            session.close();
        }
        Ok(())
    }
}

fn hex_id(id: Uuid) -> String {
    hex::encode(id.as_bytes())
}

/// Human-readable duration from microseconds: `850µs`, `1.234ms`, `2.5s`.
pub fn format_micros(micros: i64) -> String {
    let abs = micros.unsigned_abs();
    if abs == 0 {
        "0s".to_string()
    } else if abs < 1_000 {
        format!("{micros}µs")
    } else if abs < 1_000_000 {
        format!("{}ms", micros as f64 / 1_000.0)
    } else {
        format!("{}s", micros as f64 / 1_000_000.0)
    }
}

/// Wall-clock time embedded in a time-based event id.
fn event_timestamp(event_id: Option<&Value>) -> String {
    event_id
        .and_then(Value::as_uuid)
        .and_then(|id| id.get_timestamp())
        .and_then(|ts| {
            let (secs, nanos) = ts.to_unix();
            DateTime::from_timestamp(i64::try_from(secs).ok()?, nanos)
        })
        .map(|dt| dt.format("%Y/%m/%d %H:%M:%S%.6f").to_string())
        .unwrap_or_default()
}

#[derive(Debug, Clone, PartialEq)]
struct TraceEvent {
    timestamp: String,
    source: String,
    elapsed: String,
    activity: String,
}

/// A finished trace read back from `system_traces`.
#[derive(Debug, Clone, PartialEq)]
struct TraceRecord {
    id: Uuid,
    coordinator: String,
    duration: i64,
    events: Vec<TraceEvent>,
}

impl TraceRecord {
    /// `None` when the session row never showed up.
    async fn fetch(session: &KeyspaceSession, id: Uuid) -> Result<Option<Self>, Error> {
        let sessions_query = format!(
            "SELECT coordinator, duration FROM system_traces.sessions WHERE session_id = {id}"
        );

        let mut header = None;
        for attempt in 1..=TRACE_FETCH_ATTEMPTS {
            let result = session.execute(&sessions_query).await?;
            let complete = result
                .rows
                .first()
                .filter(|row| result.value(row, "duration").is_some())
                .map(|row| {
                    let coordinator = result
                        .value(row, "coordinator")
                        .map(Value::to_string)
                        .unwrap_or_default();
                    let duration = result
                        .value(row, "duration")
                        .and_then(Value::as_i64)
                        .unwrap_or_default();
                    (coordinator, duration)
                });
            if complete.is_some() {
                header = complete;
                break;
            }
            debug!(attempt, trace = %id, "trace session not written yet");
            if attempt < TRACE_FETCH_ATTEMPTS {
                tokio::time::sleep(TRACE_FETCH_INTERVAL).await;
            }
        }
        let Some((coordinator, duration)) = header else {
            return Ok(None);
        };

        let events_query = format!(
            "SELECT event_id, activity, source, source_elapsed FROM system_traces.events WHERE session_id = {id}"
        );
        let result = session.execute(&events_query).await?;
        let events = result
            .rows
            .iter()
            .map(|row| {
                let text = |name: &str| {
                    result
                        .value(row, name)
                        .map(Value::to_string)
                        .unwrap_or_default()
                };
                TraceEvent {
                    timestamp: event_timestamp(result.value(row, "event_id")),
                    source: text("source"),
                    elapsed: text("source_elapsed"),
                    activity: text("activity"),
                }
            })
            .collect();

        Ok(Some(Self {
            id,
            coordinator,
            duration,
            events,
        }))
    }

    /// Header line and event table. Empty when there are no events.
    fn render(&self, colors: ColorMode) -> String {
        if self.events.is_empty() {
            return String::new();
        }

        let columns = [
            TableColumn::new("timestamp", Color::Magenta).with_min_width(TIMESTAMP_WIDTH),
            TableColumn::new("source", Color::Magenta).with_min_width(SOURCE_WIDTH),
            TableColumn::new("elapsed", Color::Magenta).with_min_width(ELAPSED_WIDTH),
            TableColumn::new("activity", Color::Magenta).with_min_width(ACTIVITY_WIDTH),
        ];
        let rows: Vec<Vec<Cell>> = self
            .events
            .iter()
            .map(|event| {
                [&event.timestamp, &event.source, &event.elapsed, &event.activity]
                    .into_iter()
                    .map(|text| Cell::new(text.as_str(), Color::Yellow))
                    .collect()
            })
            .collect();

        format!(
            "Tracing session {} (coordinator: {}, duration: {}):\n{}",
            hex_id(self.id),
            self.coordinator,
            format_micros(self.duration),
            render_table(&columns, &rows, colors)
        )
    }
}
