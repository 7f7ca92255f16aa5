//! Driver sessions backed by the `scylla` crate.

use async_trait::async_trait;
use num_bigint::{BigInt, Sign};
use scylla::frame::response::result::{
    ColumnSpec as ScyllaColumnSpec, ColumnType as WireType, CqlValue,
};
use scylla::query::Query;
use scylla::statement::Consistency;
use scylla::transport::topology::{
    CollectionType, ColumnKind as SchemaColumnKind, CqlType, NativeType, Table,
};
use scylla::{ExecutionProfile, Session, SessionBuilder};
use tracing::debug;
use uuid::Uuid;

use crate::config::ConnectionConfig;
use crate::driver::{
    ColumnKind, ColumnMetadata, ColumnSpec, Connector, DriverSession, KeyspaceMetadata,
    QueryResult, Row, TableMetadata,
};
use crate::error::Error;
use crate::value::{ColumnType, Value};

/// Opens sessions against a real cluster.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScyllaConnector;

impl ScyllaConnector {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Connector for ScyllaConnector {
    async fn connect(&self, config: &ConnectionConfig) -> Result<Box<dyn DriverSession>, Error> {
        let session = ScyllaSession::establish(config).await?;
        Ok(Box::new(session))
    }
}

/// A scylla driver session bound to one keyspace.
pub struct ScyllaSession {
    session: Session,
    keyspace: String,
}

impl ScyllaSession {
    /// Connect to the contact point and bind the keyspace.
    pub async fn establish(config: &ConnectionConfig) -> Result<Self, Error> {
        let address = config.node_address();

        let profile = ExecutionProfile::builder()
            .consistency(Consistency::One)
            .request_timeout(Some(config.timeout))
            .build();

        let mut builder = SessionBuilder::new()
            .known_node(&address)
            .connection_timeout(config.timeout)
            .default_execution_profile_handle(profile.into_handle());

        if !config.keyspace.is_empty() {
            builder = builder.use_keyspace(&config.keyspace, true);
        }
        if let Some(credentials) = &config.credentials {
            builder = builder.user(&credentials.username, &credentials.password);
        }

        let session = builder
            .build()
            .await
            .map_err(|e| Error::Connection(format!("failed to connect to {}: {}", address, e)))?;

        debug!(%address, keyspace = %config.keyspace, "driver session established");

        Ok(Self {
            session,
            keyspace: config.keyspace.clone(),
        })
    }
}

#[async_trait]
impl DriverSession for ScyllaSession {
    async fn execute(&self, cql: &str, tracing: bool) -> Result<QueryResult, Error> {
        let mut query = Query::new(cql.to_string());
        query.set_tracing(tracing);

        let result = self
            .session
            .query_unpaged(query, ())
            .await
            .map_err(|e| Error::execution(cql, e))?;

        let tracing_id = result.tracing_id;
        let columns: Vec<ColumnSpec> = result.col_specs().iter().map(convert_spec).collect();
        let rows: Vec<Row> = result
            .rows_or_empty()
            .into_iter()
            .map(|row| {
                row.columns
                    .into_iter()
                    .map(|cell| cell.map(convert_value))
                    .collect()
            })
            .collect();

        Ok(QueryResult {
            columns,
            rows,
            tracing_id,
        })
    }

    async fn keyspace_metadata(&self, keyspace: &str) -> Result<Option<KeyspaceMetadata>, Error> {
        let cluster = self.session.get_cluster_data();
        let Some(info) = cluster.get_keyspace_info().get(keyspace) else {
            return Ok(None);
        };

        let mut metadata = KeyspaceMetadata::new(keyspace);
        for (name, table) in &info.tables {
            metadata = metadata.with_table(convert_table(name, table));
        }
        Ok(Some(metadata))
    }

    fn keyspace(&self) -> &str {
        &self.keyspace
    }
}

impl Drop for ScyllaSession {
    fn drop(&mut self) {
        debug!(keyspace = %self.keyspace, "driver session closed");
    }
}

fn convert_spec(spec: &ScyllaColumnSpec) -> ColumnSpec {
    ColumnSpec {
        name: spec.name.clone(),
        keyspace: spec.table_spec.ks_name().to_string(),
        table: spec.table_spec.table_name().to_string(),
        typ: convert_wire_type(&spec.typ),
    }
}

fn convert_wire_type(typ: &WireType) -> ColumnType {
    match typ {
        WireType::Ascii => ColumnType::Ascii,
        WireType::Text => ColumnType::Text,
        WireType::Boolean => ColumnType::Boolean,
        WireType::TinyInt => ColumnType::TinyInt,
        WireType::SmallInt => ColumnType::SmallInt,
        WireType::Int => ColumnType::Int,
        WireType::BigInt => ColumnType::BigInt,
        WireType::Counter => ColumnType::Counter,
        WireType::Varint => ColumnType::Varint,
        WireType::Float => ColumnType::Float,
        WireType::Double => ColumnType::Double,
        WireType::Decimal => ColumnType::Decimal,
        WireType::Blob => ColumnType::Blob,
        WireType::Uuid => ColumnType::Uuid,
        WireType::Timeuuid => ColumnType::Timeuuid,
        WireType::Inet => ColumnType::Inet,
        WireType::Timestamp => ColumnType::Timestamp,
        WireType::Date => ColumnType::Date,
        WireType::Time => ColumnType::Time,
        WireType::Duration => ColumnType::Duration,
        WireType::List(elem) => ColumnType::List(Box::new(convert_wire_type(elem))),
        WireType::Set(elem) => ColumnType::Set(Box::new(convert_wire_type(elem))),
        WireType::Map(key, value) => ColumnType::Map(
            Box::new(convert_wire_type(key)),
            Box::new(convert_wire_type(value)),
        ),
        WireType::Tuple(elems) => ColumnType::Tuple(elems.iter().map(convert_wire_type).collect()),
        WireType::UserDefinedType {
            type_name,
            keyspace,
            ..
        } => ColumnType::UserDefined {
            keyspace: keyspace.to_string(),
            name: type_name.to_string(),
        },
        WireType::Custom(class) => ColumnType::Custom(class.to_string()),
        #[allow(unreachable_patterns)]
        other => ColumnType::Custom(format!("{:?}", other)),
    }
}

fn convert_schema_type(typ: &CqlType) -> ColumnType {
    match typ {
        CqlType::Native(native) => match native {
            NativeType::Ascii => ColumnType::Ascii,
            NativeType::Text => ColumnType::Text,
            NativeType::Boolean => ColumnType::Boolean,
            NativeType::TinyInt => ColumnType::TinyInt,
            NativeType::SmallInt => ColumnType::SmallInt,
            NativeType::Int => ColumnType::Int,
            NativeType::BigInt => ColumnType::BigInt,
            NativeType::Counter => ColumnType::Counter,
            NativeType::Varint => ColumnType::Varint,
            NativeType::Float => ColumnType::Float,
            NativeType::Double => ColumnType::Double,
            NativeType::Decimal => ColumnType::Decimal,
            NativeType::Blob => ColumnType::Blob,
            NativeType::Uuid => ColumnType::Uuid,
            NativeType::Timeuuid => ColumnType::Timeuuid,
            NativeType::Inet => ColumnType::Inet,
            NativeType::Timestamp => ColumnType::Timestamp,
            NativeType::Date => ColumnType::Date,
            NativeType::Time => ColumnType::Time,
            NativeType::Duration => ColumnType::Duration,
            #[allow(unreachable_patterns)]
            other => ColumnType::Custom(format!("{:?}", other)),
        },
        CqlType::Collection { type_, .. } => match type_ {
            CollectionType::List(elem) => ColumnType::List(Box::new(convert_schema_type(elem))),
            CollectionType::Set(elem) => ColumnType::Set(Box::new(convert_schema_type(elem))),
            CollectionType::Map(key, value) => ColumnType::Map(
                Box::new(convert_schema_type(key)),
                Box::new(convert_schema_type(value)),
            ),
            #[allow(unreachable_patterns)]
            other => ColumnType::Custom(format!("{:?}", other)),
        },
        CqlType::Tuple(elems) => ColumnType::Tuple(elems.iter().map(convert_schema_type).collect()),
        other => ColumnType::Custom(format!("{:?}", other)),
    }
}

fn convert_table(name: &str, table: &Table) -> TableMetadata {
    let mut metadata = TableMetadata::new(name);
    metadata.partition_key = table.partition_key.clone();
    metadata.clustering_key = table.clustering_key.clone();
    for (column_name, column) in &table.columns {
        let kind = match column.kind {
            SchemaColumnKind::PartitionKey => ColumnKind::PartitionKey,
            SchemaColumnKind::Clustering => ColumnKind::Clustering,
            SchemaColumnKind::Static => ColumnKind::Static,
            #[allow(unreachable_patterns)]
            _ => ColumnKind::Regular,
        };
        metadata.columns.insert(
            column_name.clone(),
            ColumnMetadata {
                name: column_name.clone(),
                typ: convert_schema_type(&column.type_),
                kind,
            },
        );
    }
    metadata
}

fn convert_value(value: CqlValue) -> Value {
    match value {
        CqlValue::Ascii(s) => Value::Ascii(s),
        CqlValue::Text(s) => Value::Text(s),
        CqlValue::Boolean(b) => Value::Boolean(b),
        CqlValue::TinyInt(v) => Value::TinyInt(v),
        CqlValue::SmallInt(v) => Value::SmallInt(v),
        CqlValue::Int(v) => Value::Int(v),
        CqlValue::BigInt(v) => Value::BigInt(v),
        CqlValue::Counter(c) => Value::Counter(c.0),
        CqlValue::Varint(v) => Value::Varint(varint_text(v.as_signed_bytes_be_slice())),
        CqlValue::Float(v) => Value::Float(v),
        CqlValue::Double(v) => Value::Double(v),
        CqlValue::Decimal(d) => {
            let (unscaled, scale) = d.as_signed_be_bytes_slice_and_exponent();
            Value::Decimal(decimal_text(unscaled, scale))
        }
        CqlValue::Blob(bytes) => Value::Blob(bytes),
        CqlValue::Uuid(u) => Value::Uuid(u),
        CqlValue::Timeuuid(t) => Value::Timeuuid(Uuid::from_bytes(*t.as_bytes())),
        CqlValue::Inet(addr) => Value::Inet(addr),
        CqlValue::Timestamp(ts) => Value::Timestamp(ts.0),
        CqlValue::Date(d) => Value::Date(d.0),
        CqlValue::Time(t) => Value::Time(t.0),
        CqlValue::Duration(d) => Value::Duration {
            months: d.months,
            days: d.days,
            nanoseconds: d.nanoseconds,
        },
        CqlValue::List(items) => Value::List(items.into_iter().map(convert_value).collect()),
        CqlValue::Set(items) => Value::Set(items.into_iter().map(convert_value).collect()),
        CqlValue::Map(entries) => Value::Map(
            entries
                .into_iter()
                .map(|(k, v)| (convert_value(k), convert_value(v)))
                .collect(),
        ),
        CqlValue::Tuple(items) => Value::Tuple(
            items
                .into_iter()
                .map(|item| item.map(convert_value))
                .collect(),
        ),
        CqlValue::UserDefinedType { fields, .. } => Value::UserDefined(
            fields
                .into_iter()
                .map(|(name, v)| (name, v.map(convert_value)))
                .collect(),
        ),
        CqlValue::Empty => Value::Empty,
        #[allow(unreachable_patterns)]
        other => Value::Text(format!("{:?}", other)),
    }
}

/// Zero padding past this many digits switches a decimal to exponent form.
const MAX_PLAIN_ZEROS: usize = 100;

/// Decimal digits of a big-endian two's complement integer of any width.
fn varint_text(bytes: &[u8]) -> String {
    BigInt::from_signed_bytes_be(bytes).to_string()
}

/// Decimal notation of `unscaled * 10^-scale`, or `<unscaled>E<exp>` when
/// plain notation would need more than [`MAX_PLAIN_ZEROS`] padding zeros.
fn decimal_text(unscaled: &[u8], scale: i32) -> String {
    let n = BigInt::from_signed_bytes_be(unscaled);
    let sign = if n.sign() == Sign::Minus { "-" } else { "" };
    let digits = n.magnitude().to_string();

    let zeros = match scale {
        _ if n.sign() == Sign::NoSign && scale <= 0 => 0,
        s if s <= 0 => s.unsigned_abs() as usize,
        s => (s as usize).saturating_sub(digits.len()),
    };
    if zeros > MAX_PLAIN_ZEROS {
        return format!("{}{}E{:+}", sign, digits, -(scale as i64));
    }

    if scale <= 0 {
        return format!("{}{}{}", sign, digits, "0".repeat(zeros));
    }

    let scale = scale as usize;
    if digits.len() > scale {
        let (int, frac) = digits.split_at(digits.len() - scale);
        format!("{}{}.{}", sign, int, frac)
    } else {
        format!("{}0.{}{}", sign, "0".repeat(zeros), digits)
    }
}
