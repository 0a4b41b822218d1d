//! Arrow 结果集 → JSON 行
//!
//! 每个单元格先取 ScalarValue，再统一经 scalar_value_to_json 转换；
//! 列顺序与结果集 schema 一致。

use datafusion::arrow::record_batch::RecordBatch;
use datafusion::error::DataFusionError;
use datafusion::scalar::ScalarValue;
use serde_json::{Number, Value};

use super::Record;

/// 单个标量转 JSON：数值保持数值，小数按 scale 格式化为字符串，其余类型取其文本表示
pub fn scalar_value_to_json(value: &ScalarValue) -> Value {
    if value.is_null() {
        return Value::Null;
    }
    match value {
        ScalarValue::Boolean(Some(b)) => Value::Bool(*b),
        ScalarValue::Int8(Some(i)) => Value::Number((*i).into()),
        ScalarValue::Int16(Some(i)) => Value::Number((*i).into()),
        ScalarValue::Int32(Some(i)) => Value::Number((*i).into()),
        ScalarValue::Int64(Some(i)) => Value::Number((*i).into()),
        ScalarValue::UInt8(Some(i)) => Value::Number((*i).into()),
        ScalarValue::UInt16(Some(i)) => Value::Number((*i).into()),
        ScalarValue::UInt32(Some(i)) => Value::Number((*i).into()),
        ScalarValue::UInt64(Some(i)) => Value::Number((*i).into()),
        ScalarValue::Float32(Some(f)) => float_to_json(*f as f64),
        ScalarValue::Float64(Some(f)) => float_to_json(*f),
        ScalarValue::Utf8(Some(s))
        | ScalarValue::LargeUtf8(Some(s))
        | ScalarValue::Utf8View(Some(s)) => Value::String(s.clone()),
        ScalarValue::Decimal128(Some(v), _precision, scale) => {
            Value::String(format_decimal(*v, *scale))
        }
        other => Value::String(other.to_string()),
    }
}

fn float_to_json(f: f64) -> Value {
    Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null)
}

/// 20075 with scale=2 -> "200.75"
fn format_decimal(v: i128, scale: i8) -> String {
    if scale <= 0 {
        return v.to_string();
    }
    let divisor = 10i128.pow(scale as u32);
    let integer_part = v / divisor;
    let fractional_part = (v % divisor).abs();
    let sign = if v < 0 && integer_part == 0 { "-" } else { "" };
    format!(
        "{}{}.{:0>width$}",
        sign,
        integer_part,
        fractional_part,
        width = scale as usize
    )
}

/// 将若干 RecordBatch 转为行列表，最多 max_rows 行；第二个返回值表示是否被截断
pub fn record_batches_to_records(
    batches: &[RecordBatch],
    max_rows: usize,
) -> Result<(Vec<Record>, bool), DataFusionError> {
    let mut rows = Vec::new();
    for batch in batches {
        let schema = batch.schema();
        for row_idx in 0..batch.num_rows() {
            if rows.len() >= max_rows {
                return Ok((rows, true));
            }
            let mut record = Record::new();
            for (col_idx, field) in schema.fields().iter().enumerate() {
                let scalar = ScalarValue::try_from_array(batch.column(col_idx).as_ref(), row_idx)?;
                record.insert(field.name().clone(), scalar_value_to_json(&scalar));
            }
            rows.push(record);
        }
    }
    Ok((rows, false))
}

#[cfg(test)]
mod tests {
    use super::*;
    use datafusion::arrow::array::{Float64Array, Int64Array, StringArray};
    use datafusion::arrow::datatypes::{DataType, Field, Schema};
    use serde_json::json;
    use std::sync::Arc;

    fn batch() -> RecordBatch {
        let schema = Arc::new(Schema::new(vec![
            Field::new("gender", DataType::Utf8, true),
            Field::new("n", DataType::Int64, false),
            Field::new("pct", DataType::Float64, true),
        ]));
        RecordBatch::try_new(
            schema,
            vec![
                Arc::new(StringArray::from(vec![Some("Female"), None])),
                Arc::new(Int64Array::from(vec![3, 1])),
                Arc::new(Float64Array::from(vec![Some(75.0), None])),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_rows_keep_column_order_and_nulls() {
        let (rows, truncated) = record_batches_to_records(&[batch()], 100).unwrap();
        assert!(!truncated);
        assert_eq!(rows.len(), 2);
        let keys: Vec<&String> = rows[0].keys().collect();
        assert_eq!(keys, vec!["gender", "n", "pct"]);
        assert_eq!(rows[0]["gender"], json!("Female"));
        assert_eq!(rows[0]["n"], json!(3));
        assert_eq!(rows[0]["pct"], json!(75.0));
        assert_eq!(rows[1]["gender"], Value::Null);
        assert_eq!(rows[1]["pct"], Value::Null);
    }

    #[test]
    fn test_truncation() {
        let (rows, truncated) = record_batches_to_records(&[batch(), batch()], 3).unwrap();
        assert_eq!(rows.len(), 3);
        assert!(truncated);
    }

    #[test]
    fn test_decimal_formatting() {
        assert_eq!(format_decimal(20075, 2), "200.75");
        assert_eq!(format_decimal(-5, 2), "-0.05");
        assert_eq!(format_decimal(42, 0), "42");
        assert_eq!(
            scalar_value_to_json(&ScalarValue::Decimal128(Some(1234), 10, 1)),
            json!("123.4")
        );
    }

    #[test]
    fn test_nan_becomes_null() {
        assert_eq!(scalar_value_to_json(&ScalarValue::Float64(Some(f64::NAN))), Value::Null);
    }
}
