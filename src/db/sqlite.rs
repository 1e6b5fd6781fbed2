use crate::rows::{Scalar, SerializationError, TabularResult};
use sqlx::sqlite::SqliteRow;
use sqlx::{Column, Row, TypeInfo, ValueRef};

/// Converts fetched rows into a `TabularResult`. SQLite is dynamically typed, so each cell is
/// decoded by its storage class rather than the declared column type.
pub(super) fn tabulate(rows: &[SqliteRow]) -> Result<TabularResult, SerializationError> {
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

fn decode_cell(row: &SqliteRow, idx: usize) -> Result<Scalar, sqlx::Error> {
    let storage = {
        let raw = row.try_get_raw(idx)?;
        if raw.is_null() {
            return Ok(Scalar::Null);
        }
        raw.type_info().name().to_string()
    };

    let cell = match storage.as_str() {
        "INTEGER" => Scalar::Int(row.try_get::<i64, _>(idx)?),
        "REAL" => Scalar::Float(row.try_get::<f64, _>(idx)?),
        "TEXT" => Scalar::Text(row.try_get::<String, _>(idx)?),
        _ => Scalar::Bytes(row.try_get_unchecked::<Vec<u8>, _>(idx)?),
    };
    Ok(cell)
}
