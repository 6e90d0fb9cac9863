//! Text rendering of values, shared by `Out-String` and the REPL.
//!
//! Scalars render as their string form. Records render as a two-column
//! `Name`/`Value` table. Nested sequences render one element per line.

use pash_types::{Record, Value};

/// Width of the `Name` column before it grows to fit longer keys.
const NAME_WIDTH: usize = 30;

/// Render values as display lines.
pub fn render_lines(values: &[Value]) -> Vec<String> {
    let mut lines = Vec::new();
    for value in values {
        render_into(value, &mut lines);
    }
    lines
}

fn render_into(value: &Value, lines: &mut Vec<String>) {
    if value.is_null() {
        return;
    }
    if let Some(record) = value.as_record() {
        render_record(record, lines);
    } else if value.as_sequence().is_some() {
        for item in value.clone().unroll() {
            render_into(&item, lines);
        }
    } else {
        lines.extend(value.to_string().lines().map(str::to_string));
    }
}

fn render_record(record: &Record, lines: &mut Vec<String>) {
    let width = record
        .keys()
        .map(|k| k.chars().count())
        .max()
        .unwrap_or(0)
        .max(NAME_WIDTH);
    lines.push(format!("{:<width$} {}", "Name", "Value", width = width));
    lines.push(format!("{:<width$} {}", "----", "-----", width = width));
    for (key, value) in record.iter() {
        lines.push(format!("{:<width$} {}", key, value, width = width).trim_end().to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalars_and_sequences() {
        let values = vec![
            Value::from(1),
            Value::sequence(vec![Value::from("a"), Value::from("b")]),
            Value::null(),
            Value::from("x\ny"),
        ];
        assert_eq!(render_lines(&values), ["1", "a", "b", "x", "y"]);
    }

    #[test]
    fn records_render_as_a_table() {
        let mut record = Record::new();
        record.insert("Count", Value::from(3));
        let lines = render_lines(&[Value::record(record)]);
        insta::assert_snapshot!(lines.join("\n"), @r"
        Name                           Value
        ----                           -----
        Count                          3
        ");
    }
}
