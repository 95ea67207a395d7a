use serde_json::Value;

use crate::data_types::TableData;

use super::table::TableBuilder;
use super::IngestError;

/// Parse a tabular JSON document of the form
/// `{"data": [...], "columns": [...]}`. Rows may be objects or arrays;
/// `columns` is optional and, when present, selects and orders the columns.
///
/// Returns `None` when there's nothing to load (no `data`, or `data` empty).
pub fn parse_json(bytes: &[u8]) -> Result<Option<TableData>, IngestError> {
    let document: Value = serde_json::from_slice(bytes)?;
    let Value::Object(mut document) = document else {
        return Err(IngestError::NotAnObject);
    };

    let rows = match document.remove("data") {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Array(rows)) if rows.is_empty() => return Ok(None),
        Some(Value::Array(rows)) => rows,
        Some(_) => return Err(IngestError::DataNotAnArray),
    };

    let mut builder = match document.remove("columns") {
        None | Some(Value::Null) => TableBuilder::new(),
        Some(Value::Array(columns)) => {
            TableBuilder::with_columns(columns.into_iter().map(column_name).collect())
        }
        Some(_) => return Err(IngestError::ColumnsNotAnArray),
    };

    for row in rows {
        match row {
            Value::Object(object) => builder.push_object(object),
            Value::Array(values) => builder.push_array(values)?,
            scalar => builder.push_array(vec![scalar])?,
        }
    }

    Ok(Some(builder.finish()))
}

fn column_name(value: Value) -> String {
    match value {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::parse_json;
    use crate::data_types::ColumnType;
    use crate::ingest::IngestError;

    fn parse(document: serde_json::Value) -> Result<Option<crate::data_types::TableData>, IngestError> {
        parse_json(&serde_json::to_vec(&document).unwrap())
    }

    #[test]
    fn test_records() {
        let table = parse(json!({
            "data": [
                {"country": "NG", "capacity": 12.5, "year": 2020},
                {"country": "CO", "capacity": 3, "year": 2021},
            ]
        }))
        .unwrap()
        .unwrap();

        assert_eq!(table.row_count(), 2);
        assert_eq!(table.column("country").unwrap().column_type, ColumnType::Text);
        assert_eq!(table.column("capacity").unwrap().column_type, ColumnType::Double);
        assert_eq!(table.column("year").unwrap().column_type, ColumnType::BigInt);
    }

    #[test]
    fn test_split_orientation() {
        let table = parse(json!({
            "columns": ["carrier", "p_nom"],
            "data": [["solar", 10], ["wind", 20]],
        }))
        .unwrap()
        .unwrap();

        let names: Vec<_> = table.columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["carrier", "p_nom"]);
        assert_eq!(table.rows[1], vec![json!("wind"), json!(20)]);
    }

    #[test]
    fn test_nothing_to_load() {
        assert!(parse(json!({"data": []})).unwrap().is_none());
        assert!(parse(json!({"columns": ["a"]})).unwrap().is_none());
        assert!(parse(json!({"data": null})).unwrap().is_none());
    }

    #[test]
    fn test_malformed() {
        assert!(matches!(parse(json!([1, 2])), Err(IngestError::NotAnObject)));
        assert!(matches!(
            parse(json!({"data": {"a": 1}})),
            Err(IngestError::DataNotAnArray)
        ));
        assert!(matches!(
            parse(json!({"data": [[1]], "columns": "a"})),
            Err(IngestError::ColumnsNotAnArray)
        ));
        assert!(matches!(
            parse_json(b"{not json"),
            Err(IngestError::SerdeJsonError(_))
        ));
    }
}
