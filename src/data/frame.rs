use serde::{Deserialize, Serialize};

use super::field::Field;

/// A columnar result table: one or more equal-length fields
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Frame {
    #[serde(default)]
    pub name: String,
    pub fields: Vec<Field>,
}

impl Frame {
    pub fn new(name: impl Into<String>, fields: Vec<Field>) -> Self {
        Self {
            name: name.into(),
            fields,
        }
    }

    pub fn with_field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    /// Number of rows. Fails when fields disagree on length.
    pub fn row_len(&self) -> Result<usize, FrameError> {
        let Some(first) = self.fields.first() else {
            return Ok(0);
        };
        let rows = first.len();
        for (idx, field) in self.fields.iter().enumerate().skip(1) {
            if field.len() != rows {
                return Err(FrameError::FieldLengthMismatch {
                    frame: self.name.clone(),
                    field_index: idx,
                    expected: rows,
                    actual: field.len(),
                });
            }
        }
        Ok(rows)
    }

    /// Render at most `max_fields` columns and `max_rows` rows as text, for logs
    pub fn string_table(&self, max_fields: usize, max_rows: usize) -> String {
        let mut out = format!("Name: {}\n", self.name);
        let rows = match self.row_len() {
            Ok(rows) => rows,
            Err(e) => {
                out.push_str(&format!("<{}>\n", e));
                return out;
            }
        };
        out.push_str(&format!(
            "Dimensions: {} Fields by {} Rows\n",
            self.fields.len(),
            rows
        ));

        let shown = &self.fields[..self.fields.len().min(max_fields)];
        let truncated_fields = self.fields.len() > shown.len();

        let mut header: Vec<String> = shown
            .iter()
            .map(|f| {
                if f.labels.is_empty() {
                    format!("{} [{}]", f.name, f.field_type())
                } else {
                    let labels: Vec<String> =
                        f.labels.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
                    format!("{} {{{}}} [{}]", f.name, labels.join(", "), f.field_type())
                }
            })
            .collect();
        if truncated_fields {
            header.push("...".to_string());
        }
        out.push_str(&format!("| {} |\n", header.join(" | ")));

        for row in 0..rows.min(max_rows) {
            let mut cells: Vec<String> = shown.iter().map(|f| f.get(row).to_string()).collect();
            if truncated_fields {
                cells.push("...".to_string());
            }
            out.push_str(&format!("| {} |\n", cells.join(" | ")));
        }
        if rows > max_rows {
            out.push_str(&format!("... {} more rows\n", rows - max_rows));
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FrameError {
    #[error("frame {frame:?}: field {field_index} has {actual} rows, expected {expected}")]
    FieldLengthMismatch {
        frame: String,
        field_index: usize,
        expected: usize,
        actual: usize,
    },
}
