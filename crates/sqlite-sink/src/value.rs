use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::types::{ToSql, ToSqlOutput, Value as SqlValue, ValueRef};
use sync_core::{ColumnType, UniversalValue};

/// Storage format for timestamps; lexically sortable, always UTC.
pub(crate) const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// Binds a [`UniversalValue`] as a statement parameter.
#[derive(Debug)]
pub(crate) struct Param<'a>(pub &'a UniversalValue);

impl ToSql for Param<'_> {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self.0 {
            UniversalValue::Null => ToSqlOutput::Owned(SqlValue::Null),
            UniversalValue::Bool(b) => ToSqlOutput::Owned(SqlValue::Integer(i64::from(*b))),
            UniversalValue::Int(i) => ToSqlOutput::Owned(SqlValue::Integer(*i)),
            UniversalValue::Float(f) => ToSqlOutput::Owned(SqlValue::Real(*f)),
            UniversalValue::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            UniversalValue::Timestamp(ts) => {
                ToSqlOutput::Owned(SqlValue::Text(ts.format(TIMESTAMP_FORMAT).to_string()))
            }
        })
    }
}

/// Convert a stored value back using the column's declared type.
pub(crate) fn from_sql(value: SqlValue, column_type: ColumnType) -> UniversalValue {
    match (value, column_type) {
        (SqlValue::Null, _) => UniversalValue::Null,
        (SqlValue::Integer(i), ColumnType::Boolean) => UniversalValue::Bool(i != 0),
        (SqlValue::Integer(i), ColumnType::Float) => UniversalValue::Float(i as f64),
        (SqlValue::Integer(i), ColumnType::String) => UniversalValue::Text(i.to_string()),
        (SqlValue::Integer(i), _) => UniversalValue::Int(i),
        (SqlValue::Real(f), _) => UniversalValue::Float(f),
        (SqlValue::Text(s), ColumnType::Timestamp) => match parse_timestamp(&s) {
            Some(ts) => UniversalValue::Timestamp(ts),
            None => UniversalValue::Text(s),
        },
        (SqlValue::Text(s), _) => UniversalValue::Text(s),
        (SqlValue::Blob(bytes), _) => UniversalValue::Text(String::from_utf8_lossy(&bytes).into_owned()),
    }
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_timestamp_storage_format() {
        let ts = Utc.with_ymd_and_hms(2023, 7, 11, 9, 8, 46).unwrap();
        let value = UniversalValue::Timestamp(ts);
        match Param(&value).to_sql().unwrap() {
            ToSqlOutput::Owned(SqlValue::Text(s)) => assert_eq!(s, "2023-07-11 09:08:46.000000"),
            other => panic!("unexpected output: {other:?}"),
        }

        assert_eq!(
            from_sql(
                SqlValue::Text("2023-07-11 09:08:46.000000".to_string()),
                ColumnType::Timestamp
            ),
            value
        );
    }

    #[test]
    fn test_booleans_are_integers() {
        let value = UniversalValue::Bool(true);
        assert!(matches!(
            Param(&value).to_sql().unwrap(),
            ToSqlOutput::Owned(SqlValue::Integer(1))
        ));
        assert_eq!(
            from_sql(SqlValue::Integer(0), ColumnType::Boolean),
            UniversalValue::Bool(false)
        );
    }

    #[test]
    fn test_null_decodes_for_every_type() {
        for ty in ColumnType::ALL {
            assert_eq!(from_sql(SqlValue::Null, ty), UniversalValue::Null);
        }
    }
}
