// ── Frames ──
//
// Column-oriented result handed back to the dashboard host: one time
// column plus one value column, all of equal length.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Values of a single column.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "values", rename_all = "lowercase")]
pub enum FieldValues {
    Time(Vec<DateTime<Utc>>),
    Number(Vec<Option<f64>>),
    Text(Vec<Option<String>>),
}

impl FieldValues {
    pub fn len(&self) -> usize {
        match self {
            Self::Time(v) => v.len(),
            Self::Number(v) => v.len(),
            Self::Text(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Field {
    pub name: String,
    #[serde(flatten)]
    pub values: FieldValues,
}

impl Field {
    pub fn new(name: impl Into<String>, values: FieldValues) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }
}

/// A named set of equally long columns.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Frame {
    pub name: String,
    pub fields: Vec<Field>,
}

impl Frame {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    /// Append a column. Columns must all have the same length.
    pub fn with_field(mut self, field: Field) -> Self {
        debug_assert!(
            self.fields.first().is_none_or(|f| f.values.len() == field.values.len()),
            "frame columns differ in length"
        );
        self.fields.push(field);
        self
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.fields.first().map_or(0, |f| f.values.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn serializes_column_type_and_values() {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let frame = Frame::new("Traffic In")
            .with_field(Field::new("time", FieldValues::Time(vec![at])))
            .with_field(Field::new("Traffic In", FieldValues::Number(vec![Some(42.5)])));

        assert_eq!(frame.len(), 1);
        assert_eq!(
            serde_json::to_value(&frame).unwrap(),
            json!({
                "name": "Traffic In",
                "fields": [
                    {"name": "time", "type": "time", "values": ["2024-03-01T12:00:00Z"]},
                    {"name": "Traffic In", "type": "number", "values": [42.5]},
                ],
            })
        );
    }

    #[test]
    fn empty_frame_has_no_rows() {
        let frame = Frame::new("empty");
        assert!(frame.is_empty());
        assert!(frame.field("time").is_none());
    }
}
