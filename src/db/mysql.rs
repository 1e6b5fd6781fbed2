use crate::rows::{Scalar, SerializationError, TabularResult};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use sqlx::mysql::MySqlRow;
use sqlx::{Column, Row, TypeInfo, ValueRef};

const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// Converts fetched rows into a `TabularResult`.
///
/// Column names come from the first row's metadata; an empty result has no columns and no rows.
pub(super) fn tabulate(rows: &[MySqlRow]) -> Result<TabularResult, SerializationError> {
    let Some(first) = rows.first() else {
        return Ok(TabularResult::new(Vec::new()));
    };
    let columns = first
        .columns()
        .iter()
        .map(|c| c.name().to_string())
        .collect();

    let mut result = TabularResult::new(columns);
    for (idx, row) in rows.iter().enumerate() {
        let cells = (0..row.len())
            .map(|col| {
                decode_cell(row, col).map_err(|e| SerializationError::Decode {
                    row: idx,
                    column: row.column(col).name().to_string(),
                    message: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        result.push_row(cells);
    }
    Ok(result)
}

/// Text-family, decimal, enum/set, JSON, binary and unrecognised columns are handed over as the
/// raw bytes the server sent, mirroring what a plain driver scan produces. Numbers, booleans
/// and temporal values are decoded.
fn decode_cell(row: &MySqlRow, idx: usize) -> Result<Scalar, sqlx::Error> {
    if row.try_get_raw(idx)?.is_null() {
        return Ok(Scalar::Null);
    }

    let type_name = row.column(idx).type_info().name();
    let unsigned = type_name.ends_with("UNSIGNED");
    let cell = match type_name.split_whitespace().next().unwrap_or(type_name) {
        "NULL" => Scalar::Null,
        "BOOLEAN" => Scalar::Bool(row.try_get::<bool, _>(idx)?),
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" | "YEAR" => {
            if unsigned || type_name == "YEAR" {
                Scalar::UInt(row.try_get_unchecked::<u64, _>(idx)?)
            } else {
                Scalar::Int(row.try_get_unchecked::<i64, _>(idx)?)
            }
        }
        "FLOAT" => Scalar::Float(widen_f32(row.try_get::<f32, _>(idx)?)),
        "DOUBLE" => Scalar::Float(row.try_get::<f64, _>(idx)?),
        "DATETIME" => Scalar::Text(
            row.try_get::<NaiveDateTime, _>(idx)?
                .format(DATETIME_FORMAT)
                .to_string(),
        ),
        "TIMESTAMP" => Scalar::Text(
            row.try_get::<DateTime<Utc>, _>(idx)?
                .naive_utc()
                .format(DATETIME_FORMAT)
                .to_string(),
        ),
        "DATE" => Scalar::Text(row.try_get::<NaiveDate, _>(idx)?.format("%Y-%m-%d").to_string()),
        "TIME" => Scalar::Text(
            row.try_get::<NaiveTime, _>(idx)?
                .format("%H:%M:%S%.f")
                .to_string(),
        ),
        _ => Scalar::Bytes(row.try_get_unchecked::<Vec<u8>, _>(idx)?),
    };
    Ok(cell)
}

/// `0.1f32` should read back as `0.1`, not `0.10000000149011612`.
fn widen_f32(value: f32) -> f64 {
    value
        .to_string()
        .parse::<f64>()
        .unwrap_or_else(|_| f64::from(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn widen_keeps_short_decimal_form() {
        assert!((widen_f32(0.1) - 0.1).abs() < f64::EPSILON);
        assert!((widen_f32(-2.5) + 2.5).abs() < f64::EPSILON);
    }

    #[test]
    fn empty_fetch_has_no_rows() {
        let result = tabulate(&[]).unwrap();
        assert_eq!(result.row_count(), 0);
        assert_eq!(result.columns(), Some(&[][..]));
    }
}
