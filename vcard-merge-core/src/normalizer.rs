//! Per-record normalization: harmonizes `FN`/`N`, `EMAIL` and `TEL` in
//! place.
//!
//! Ported from the original tool's per-vcard cleanup pass, which ran
//! these same five operations directly against the `vobject.vCard` it
//! had just parsed.

use tracing::debug;

use crate::model::{Property, Record, Value};
use crate::names::{build_structured_name, close_parentheses_or_braces, extract_bracketed_groups, split_quoted_display_email};
use crate::options::NormalizeOptions;

fn property_plain_text(value: &Value) -> String {
    match value {
        Value::Text(s) => s.clone(),
        Value::Name(n) => n.to_plain_string(),
        Value::List(items) => items.join(" "),
    }
}

/// Normalizes `record` in place, using `selected_name` as the name to
/// fall back to when `FN`/`N` are missing (or were just removed).
pub fn normalize(record: &mut Record, selected_name: &str, options: &NormalizeOptions) {
    record.remove_all("VERSION");

    if !options.no_overwrite_names {
        record.remove_all("FN");
        record.remove_all("N");
    }

    if !record.has("FN") {
        record.push(Property::new("FN", Value::Text(selected_name.to_string())));
    }
    if !record.has("N") {
        record.push(Property::new(
            "N",
            Value::Name(build_structured_name(selected_name, options)),
        ));
    }

    if options.move_name_parenth_braces_to_note {
        move_parentheticals_to_note(record);
    }

    normalize_emails(record, options);
    normalize_tels(record, options);
}

/// For every existing `FN`/`N`, moves any bracketed `(...)`/`[...]`
/// content to a new `NOTE` line and rewrites the name to the outer text.
fn move_parentheticals_to_note(record: &mut Record) {
    let mut notes = Vec::new();

    for name in ["FN", "N"] {
        for property in record.all_mut(name) {
            let plain = close_parentheses_or_braces(&property_plain_text(&property.value));
            let Some((outer, inner)) = extract_bracketed_groups(&plain) else {
                continue;
            };
            if inner.is_empty() {
                continue;
            }
            notes.push(inner);
            property.value = Value::Text(outer);
        }
    }

    for note in notes {
        record.push(Property::new("NOTE", Value::Text(note)));
    }
}

fn normalize_emails(record: &mut Record, options: &NormalizeOptions) {
    record.properties.retain_mut(|property| {
        if property.name != "EMAIL" {
            return true;
        }
        let Some(value) = property.value.as_text() else {
            return true;
        };
        let mut normalized = value.trim().to_lowercase();
        if normalized.ends_with("@nowhere.invalid") {
            debug!(email = %normalized, "dropping Thunderbird placeholder address");
            return false;
        }
        if !options.no_remove_name_in_email {
            if let Some((_display, addr)) = split_quoted_display_email(&normalized) {
                normalized = addr;
            }
        }
        property.value = Value::Text(normalized);
        true
    });
}

fn normalize_tels(record: &mut Record, options: &NormalizeOptions) {
    for property in record.all_mut("TEL") {
        let Some(value) = property.value.as_text() else {
            continue;
        };
        let mut stripped: String = value.chars().filter(|c| !c.is_whitespace()).collect();
        if options.french_tweaks {
            if let Some(rest) = stripped.strip_prefix("+33") {
                stripped = format!("0{rest}");
            }
        }
        property.value = Value::Text(stripped);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normalize_default(record: &mut Record, selected_name: &str) {
        normalize(record, selected_name, &NormalizeOptions::default());
    }

    #[test]
    fn removes_version() {
        let mut record = Record::new();
        record.push(Property::new("VERSION", Value::Text("2.1".into())));
        normalize_default(&mut record, "Alice");
        assert!(!record.has("VERSION"));
    }

    #[test]
    fn adds_missing_fn_and_n_from_selected_name() {
        let mut record = Record::new();
        normalize_default(&mut record, "Alice Doe");
        assert_eq!(record.first("FN").unwrap().value.as_text(), Some("Alice Doe"));
        let n = record.first("N").unwrap().value.as_name().unwrap();
        assert_eq!(n.family, "Doe");
        assert_eq!(n.given, "Alice");
    }

    #[test]
    fn overwrites_existing_names_by_default() {
        let mut record = Record::new();
        record.push(Property::new("FN", Value::Text("Old Name".into())));
        record.push(Property::new("N", Value::Name(Default::default())));
        normalize_default(&mut record, "New Name");
        assert_eq!(record.all("FN").count(), 1);
        assert_eq!(record.first("FN").unwrap().value.as_text(), Some("New Name"));
    }

    #[test]
    fn keeps_existing_names_when_no_overwrite_set() {
        let mut record = Record::new();
        record.push(Property::new("FN", Value::Text("Kept Name".into())));
        record.push(Property::new("N", Value::Name(Default::default())));
        let mut options = NormalizeOptions::default();
        options.no_overwrite_names = true;
        normalize(&mut record, "Ignored", &options);
        assert_eq!(record.first("FN").unwrap().value.as_text(), Some("Kept Name"));
    }

    #[test]
    fn moves_bracketed_fn_content_to_note() {
        let mut record = Record::new();
        record.push(Property::new("FN", Value::Text("Marie (Maiden Name) Martin".into())));
        let mut options = NormalizeOptions::default();
        options.move_name_parenth_braces_to_note = true;
        normalize(&mut record, "Marie Martin", &options);
        assert_eq!(
            record.first("FN").unwrap().value.as_text(),
            Some("Marie Martin")
        );
        assert_eq!(
            record.first("NOTE").unwrap().value.as_text(),
            Some("Maiden Name")
        );
    }

    #[test]
    fn lowercases_and_strips_email() {
        let mut record = Record::new();
        record.push(Property::new("EMAIL", Value::Text("  Alice@Example.COM  ".into())));
        normalize_default(&mut record, "Alice");
        assert_eq!(
            record.first("EMAIL").unwrap().value.as_text(),
            Some("alice@example.com")
        );
    }

    #[test]
    fn drops_thunderbird_placeholder_email() {
        let mut record = Record::new();
        record.push(Property::new(
            "EMAIL",
            Value::Text("nobody@nowhere.invalid".into()),
        ));
        normalize_default(&mut record, "Alice");
        assert!(!record.has("EMAIL"));
    }

    #[test]
    fn strips_display_name_from_email() {
        let mut record = Record::new();
        record.push(Property::new(
            "EMAIL",
            Value::Text("\"Jean Dupont\" <jean.dupont@ex.fr>".into()),
        ));
        normalize_default(&mut record, "Jean Dupont");
        assert_eq!(
            record.first("EMAIL").unwrap().value.as_text(),
            Some("jean.dupont@ex.fr")
        );
    }

    #[test]
    fn keeps_display_name_when_disabled() {
        let mut record = Record::new();
        record.push(Property::new(
            "EMAIL",
            Value::Text("\"Jean Dupont\" <jean.dupont@ex.fr>".into()),
        ));
        let mut options = NormalizeOptions::default();
        options.no_remove_name_in_email = true;
        normalize(&mut record, "Jean Dupont", &options);
        assert_eq!(
            record.first("EMAIL").unwrap().value.as_text(),
            Some("\"jean dupont\" <jean.dupont@ex.fr>")
        );
    }

    #[test]
    fn strips_whitespace_from_tel() {
        let mut record = Record::new();
        record.push(Property::new("TEL", Value::Text("06 12 34 56 78".into())));
        normalize_default(&mut record, "Alice");
        assert_eq!(record.first("TEL").unwrap().value.as_text(), Some("0612345678"));
    }

    #[test]
    fn french_tweaks_rewrites_international_prefix() {
        let mut record = Record::new();
        record.push(Property::new("TEL", Value::Text("+33 6 12 34 56 78".into())));
        let mut options = NormalizeOptions::default();
        options.french_tweaks = true;
        normalize(&mut record, "Alice", &options);
        assert_eq!(record.first("TEL").unwrap().value.as_text(), Some("0612345678"));
    }
}
