//! Writes [`Record`]s back out as strict vCard 3.0 text.
//!
//! Mirrors the shape of the input the fixer/parser pair accepts: one
//! `BEGIN:VCARD`/`END:VCARD` block per record, CRLF line termination,
//! and the escaping rules inverted from [`crate::parser`].

use crate::model::{Property, Record, StructuredName, Value};

fn escape_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            ',' => out.push_str("\\,"),
            ';' => out.push_str("\\;"),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            other => out.push(other),
        }
    }
    out
}

fn render_name(n: &StructuredName) -> String {
    let suffix = n.suffix.as_deref().unwrap_or("");
    format!(
        "{};{};;;{}",
        escape_text(&n.family),
        escape_text(&n.given),
        escape_text(suffix)
    )
}

fn render_org(parts: &[String]) -> String {
    parts
        .iter()
        .map(|p| escape_text(p))
        .collect::<Vec<_>>()
        .join(";")
}

fn render_value(value: &Value) -> String {
    match value {
        Value::Text(s) => escape_text(s),
        Value::Name(n) => render_name(n),
        Value::List(items) => render_org(items),
    }
}

fn render_header(property: &Property) -> String {
    let mut header = property.name.to_string();
    for (pname, values) in &property.params {
        if values.is_empty() {
            continue;
        }
        header.push(';');
        header.push_str(pname);
        header.push('=');
        header.push_str(&values.join(","));
    }
    header
}

/// Renders a single record as one `BEGIN:VCARD ... END:VCARD` block,
/// terminated with `\r\n` per line as RFC 6350 prescribes.
pub fn render_record(record: &Record) -> String {
    let mut out = String::new();
    out.push_str("BEGIN:VCARD\r\n");
    out.push_str("VERSION:3.0\r\n");
    for property in &record.properties {
        out.push_str(&render_header(property));
        out.push(':');
        out.push_str(&render_value(&property.value));
        out.push_str("\r\n");
    }
    out.push_str("END:VCARD\r\n");
    out
}

/// Renders many records back to back, the way they would be written to
/// a single address-book file.
pub fn render_records<'a>(records: impl IntoIterator<Item = &'a Record>) -> String {
    records.into_iter().map(render_record).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Params;

    #[test]
    fn renders_minimal_record() {
        let mut record = Record::new();
        record.push(Property::new("FN", Value::Text("Alice Doe".into())));
        let rendered = render_record(&record);
        assert!(rendered.starts_with("BEGIN:VCARD\r\nVERSION:3.0\r\n"));
        assert!(rendered.contains("FN:Alice Doe\r\n"));
        assert!(rendered.ends_with("END:VCARD\r\n"));
    }

    #[test]
    fn renders_params_in_insertion_order() {
        let mut params = Params::new();
        params.insert("TYPE".into(), vec!["CELL".to_string(), "VOICE".to_string()]);
        let property = Property::new("TEL", Value::Text("0601020304".into())).with_params(params);
        let mut record = Record::new();
        record.push(property);
        assert!(render_record(&record).contains("TEL;TYPE=CELL,VOICE:0601020304\r\n"));
    }

    #[test]
    fn renders_structured_name_with_empty_middle_fields() {
        let n = StructuredName {
            family: "Doe".into(),
            given: "John".into(),
            suffix: Some("Jr".into()),
        };
        let mut record = Record::new();
        record.push(Property::new("N", Value::Name(n)));
        assert!(render_record(&record).contains("N:Doe;John;;;Jr\r\n"));
    }

    #[test]
    fn escapes_commas_and_semicolons_in_text_values() {
        let mut record = Record::new();
        record.push(Property::new("NOTE", Value::Text("a, b; c".into())));
        assert!(render_record(&record).contains("NOTE:a\\, b\\; c\r\n"));
    }

    #[test]
    fn renders_org_list_with_semicolon_separators() {
        let mut record = Record::new();
        record.push(Property::new(
            "ORG",
            Value::List(vec!["Acme".into(), "R&D".into()]),
        ));
        assert!(render_record(&record).contains("ORG:Acme;R&D\r\n"));
    }

    #[test]
    fn round_trips_through_parser() {
        let mut record = Record::new();
        record.push(Property::new("FN", Value::Text("Bob, Jr.".into())));
        let rendered = render_record(&record);
        let parsed = crate::parser::parse(&rendered).unwrap();
        assert_eq!(
            parsed[0].first("FN").unwrap().value.as_text(),
            Some("Bob, Jr.")
        );
    }
}
