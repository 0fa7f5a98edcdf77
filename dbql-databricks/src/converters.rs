use crate::api::ColumnInfo;
use dbql_core::Row;
use serde_json::{Number, Value};

/// Turn `JSON_ARRAY` chunk data into rows keyed by column name.
///
/// The warehouse sends every cell as a string (or null); the column's
/// `type_name` decides what JSON type the cell becomes.
pub fn rows_from_data_array(columns: &[ColumnInfo], data: Vec<Vec<Value>>) -> Vec<Row> {
    let mut ordered: Vec<&ColumnInfo> = columns.iter().collect();
    ordered.sort_by_key(|c| c.position.unwrap_or(usize::MAX));

    data.into_iter()
        .map(|cells| {
            let mut row = Row::new();
            for (column, cell) in ordered.iter().zip(cells) {
                row.insert(
                    column.name.clone(),
                    convert_cell(column.type_name.as_deref(), cell),
                );
            }
            row
        })
        .collect()
}

pub fn convert_cell(type_name: Option<&str>, cell: Value) -> Value {
    let text = match cell {
        Value::String(s) => s,
        other => return other,
    };

    let type_name = type_name.unwrap_or("STRING").to_ascii_uppercase();
    match type_name.as_str() {
        "BYTE" | "TINYINT" | "SHORT" | "SMALLINT" | "INT" | "INTEGER" | "LONG" | "BIGINT" => {
            match text.parse::<i64>() {
                Ok(n) => Value::from(n),
                Err(_) => Value::String(text),
            }
        }
        "FLOAT" | "DOUBLE" => match text.parse::<f64>().ok().and_then(Number::from_f64) {
            Some(n) => Value::Number(n),
            // NaN and infinities have no JSON number form
            None => Value::String(text),
        },
        "BOOLEAN" => match text.as_str() {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            _ => Value::String(text),
        },
        "ARRAY" | "MAP" | "STRUCT" => {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        }
        _ => Value::String(text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn column(name: &str, type_name: &str, position: usize) -> ColumnInfo {
        ColumnInfo {
            name: name.to_string(),
            type_name: Some(type_name.to_string()),
            position: Some(position),
        }
    }

    #[test]
    fn test_rows_from_data_array() {
        let columns = vec![
            column("id", "LONG", 0),
            column("name", "STRING", 1),
            column("active", "BOOLEAN", 2),
            column("score", "DOUBLE", 3),
        ];
        let data = vec![
            vec![json!("1"), json!("Alice"), json!("true"), json!("9.5")],
            vec![json!("2"), Value::Null, json!("false"), json!("7")],
        ];

        let rows = rows_from_data_array(&columns, data);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["id"], json!(1));
        assert_eq!(rows[0]["name"], json!("Alice"));
        assert_eq!(rows[0]["active"], json!(true));
        assert_eq!(rows[0]["score"], json!(9.5));
        assert_eq!(rows[1]["name"], Value::Null);
        assert_eq!(rows[1]["active"], json!(false));
    }

    #[test]
    fn test_column_order_follows_position() {
        let columns = vec![column("b", "STRING", 1), column("a", "STRING", 0)];
        let rows = rows_from_data_array(&columns, vec![vec![json!("first"), json!("second")]]);
        let keys: Vec<&String> = rows[0].keys().collect();
        assert_eq!(keys, vec!["a", "b"]);
        assert_eq!(rows[0]["a"], json!("first"));
    }

    #[test]
    fn test_decimal_and_dates_stay_strings() {
        assert_eq!(
            convert_cell(Some("DECIMAL"), json!("12345678901234567890.12")),
            json!("12345678901234567890.12")
        );
        assert_eq!(convert_cell(Some("DATE"), json!("2024-01-31")), json!("2024-01-31"));
        assert_eq!(
            convert_cell(Some("TIMESTAMP"), json!("2024-01-31T10:00:00.000Z")),
            json!("2024-01-31T10:00:00.000Z")
        );
    }

    #[test]
    fn test_nested_types_are_parsed() {
        assert_eq!(convert_cell(Some("ARRAY"), json!("[1,2,3]")), json!([1, 2, 3]));
        assert_eq!(
            convert_cell(Some("STRUCT"), json!(r#"{"city":"Oslo"}"#)),
            json!({"city": "Oslo"})
        );
        assert_eq!(convert_cell(Some("MAP"), json!("not json")), json!("not json"));
    }

    #[test]
    fn test_non_finite_double_stays_string() {
        assert_eq!(convert_cell(Some("DOUBLE"), json!("NaN")), json!("NaN"));
    }

    #[test]
    fn test_missing_type_defaults_to_string() {
        assert_eq!(convert_cell(None, json!("42")), json!("42"));
    }
}
