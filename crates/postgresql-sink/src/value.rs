use bytes::BytesMut;
use chrono::{DateTime, Utc};
use std::error::Error;
use sync_core::{ColumnType, UniversalValue};
use tokio_postgres::types::{to_sql_checked, IsNull, ToSql, Type};
use tokio_postgres::Row;

type BoxError = Box<dyn Error + Sync + Send>;

/// Binds a [`UniversalValue`] as a statement parameter.
///
/// The server infers each parameter's type from the target column, so the
/// wire encoding is picked from that type. Integers and floats narrow to
/// `INT2`/`INT4`/`FLOAT4` columns when the value fits.
#[derive(Debug)]
pub(crate) struct Param<'a>(pub &'a UniversalValue);

impl ToSql for Param<'_> {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
        match self.0 {
            UniversalValue::Null => Ok(IsNull::Yes),
            UniversalValue::Bool(b) => b.to_sql_checked(ty, out),
            UniversalValue::Int(i) if *ty == Type::INT4 => i32::try_from(*i)?.to_sql_checked(ty, out),
            UniversalValue::Int(i) if *ty == Type::INT2 => i16::try_from(*i)?.to_sql_checked(ty, out),
            UniversalValue::Int(i) => i.to_sql_checked(ty, out),
            UniversalValue::Float(f) if *ty == Type::FLOAT4 => (*f as f32).to_sql_checked(ty, out),
            UniversalValue::Float(f) => f.to_sql_checked(ty, out),
            UniversalValue::Text(s) => s.as_str().to_sql_checked(ty, out),
            UniversalValue::Timestamp(ts) => ts.to_sql_checked(ty, out),
        }
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    to_sql_checked!();
}

/// Read column `idx` back using the column's declared type.
pub(crate) fn from_row(
    row: &Row,
    idx: usize,
    column_type: ColumnType,
) -> Result<UniversalValue, tokio_postgres::Error> {
    Ok(match column_type {
        ColumnType::Integer => row
            .try_get::<_, Option<i64>>(idx)?
            .map_or(UniversalValue::Null, UniversalValue::Int),
        ColumnType::String => row
            .try_get::<_, Option<String>>(idx)?
            .map_or(UniversalValue::Null, UniversalValue::Text),
        ColumnType::Float => row
            .try_get::<_, Option<f64>>(idx)?
            .map_or(UniversalValue::Null, UniversalValue::Float),
        ColumnType::Boolean => row
            .try_get::<_, Option<bool>>(idx)?
            .map_or(UniversalValue::Null, UniversalValue::Bool),
        ColumnType::Timestamp => row
            .try_get::<_, Option<DateTime<Utc>>>(idx)?
            .map_or(UniversalValue::Null, UniversalValue::Timestamp),
    })
}
