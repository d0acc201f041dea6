//! A small, lenient tokenizer that turns the strict vCard 3.0 text
//! produced by [`crate::fixer`] into [`Record`]s.
//!
//! Exposes a generic property/parameter model rather than assuming any
//! particular schema, so the pipeline stays runnable end to end on
//! whatever properties a given vCard happens to carry. It does not
//! decode base64/quoted-printable bodies or transcode character sets —
//! escaped/encoded text is carried through verbatim in
//! [`crate::model::Value::Text`].

use crate::model::{InvalidNameError, ParamName, Property, PropertyName, Record, StructuredName, Value};

#[derive(Debug, thiserror::Error)]
pub enum ParserError {
    #[error("unterminated BEGIN:VCARD block")]
    UnterminatedRecord,
    #[error("property line has no ':' separator: {0:?}")]
    MissingColon(String),
    #[error(transparent)]
    InvalidName(#[from] InvalidNameError),
}

/// Unfolds RFC 6350 §3.2 line folding: a line break followed by a
/// single leading space or tab continues the previous line.
fn unfold(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for line in text.lines() {
        if (line.starts_with(' ') || line.starts_with('\t')) && !out.is_empty() {
            out.push_str(&line[1..]);
        } else {
            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str(line);
        }
    }
    out
}

fn unescape_value(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.peek() {
                Some(',') => {
                    out.push(',');
                    chars.next();
                }
                Some(';') => {
                    out.push(';');
                    chars.next();
                }
                Some('\\') => {
                    out.push('\\');
                    chars.next();
                }
                Some('n') | Some('N') => {
                    out.push('\n');
                    chars.next();
                }
                _ => out.push('\\'),
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Splits `s` on occurrences of `sep` that are not escaped with a
/// preceding backslash.
fn split_unescaped(s: &str, sep: char) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' {
            current.push(c);
            if let Some(&next) = chars.peek() {
                current.push(next);
                chars.next();
            }
        } else if c == sep {
            parts.push(current.clone());
            current.clear();
        } else {
            current.push(c);
        }
    }
    parts.push(current);
    parts
}

struct ParsedLine {
    name: String,
    params: indexmap::IndexMap<String, Vec<String>>,
    raw_value: String,
}

fn parse_line(line: &str) -> Result<Option<ParsedLine>, ParserError> {
    if line.trim().is_empty() {
        return Ok(None);
    }
    let colon = line
        .find(':')
        .ok_or_else(|| ParserError::MissingColon(line.to_string()))?;
    let header = &line[..colon];
    let raw_value = line[colon + 1..].to_string();

    let mut segments = header.split(';');
    let mut name = segments.next().unwrap_or_default().to_string();
    // Strip a leading "group." prefix, e.g. "item1.TEL" -> "TEL".
    if let Some(dot) = name.find('.') {
        name = name[dot + 1..].to_string();
    }
    name = name.to_uppercase();

    let mut params = indexmap::IndexMap::new();
    for segment in segments {
        if segment.is_empty() {
            continue;
        }
        if let Some((pname, pvalue)) = segment.split_once('=') {
            let values: Vec<String> = pvalue.split(',').map(|v| v.to_string()).collect();
            params
                .entry(pname.to_uppercase())
                .or_insert_with(Vec::new)
                .extend(values);
        } else {
            // Bare parameter token (legacy shape, should be rare after
            // the fixer has run, but tolerate it for --no-fix-and-convert).
            params
                .entry("TYPE".to_string())
                .or_insert_with(Vec::new)
                .push(segment.to_uppercase());
        }
    }

    Ok(Some(ParsedLine {
        name,
        params,
        raw_value,
    }))
}

fn build_structured_name_value(raw: &str) -> StructuredName {
    let fields = split_unescaped(raw, ';');
    let unescape = |s: &str| unescape_value(s);
    let family = fields.first().map(|s| unescape(s)).unwrap_or_default();
    let given_additional: Vec<String> = fields
        .get(1..3.min(fields.len()))
        .unwrap_or(&[])
        .iter()
        .map(|s| unescape(s))
        .filter(|s| !s.is_empty())
        .collect();
    let given = given_additional.join(" ");
    let suffix: Vec<String> = fields
        .get(3..)
        .unwrap_or(&[])
        .iter()
        .map(|s| unescape(s))
        .filter(|s| !s.is_empty())
        .collect();
    let suffix = if suffix.is_empty() {
        None
    } else {
        Some(suffix.join(" "))
    };
    StructuredName {
        family,
        given,
        suffix,
    }
}

/// Parses one or more `BEGIN:VCARD ... END:VCARD` blocks out of `text`.
pub fn parse(text: &str) -> Result<Vec<Record>, ParserError> {
    let unfolded = unfold(text);
    let mut records = Vec::new();
    let mut current: Option<Record> = None;

    for line in unfolded.lines() {
        let trimmed = line.trim();
        if trimmed.eq_ignore_ascii_case("BEGIN:VCARD") {
            current = Some(Record::new());
            continue;
        }
        if trimmed.eq_ignore_ascii_case("END:VCARD") {
            let record = current.take().ok_or(ParserError::UnterminatedRecord)?;
            records.push(record);
            continue;
        }
        let Some(record) = current.as_mut() else {
            continue;
        };
        let Some(parsed) = parse_line(line)? else {
            continue;
        };

        let value = match parsed.name.as_str() {
            "N" => Value::Name(build_structured_name_value(&parsed.raw_value)),
            "ORG" => Value::List(
                split_unescaped(&parsed.raw_value, ';')
                    .into_iter()
                    .map(|s| unescape_value(&s))
                    .collect(),
            ),
            _ => Value::Text(unescape_value(&parsed.raw_value)),
        };

        let name = PropertyName::new(parsed.name)?;
        let mut params = indexmap::IndexMap::new();
        for (pname, pvalues) in parsed.params {
            params.insert(ParamName::new(pname)?, pvalues);
        }

        record.push(Property {
            name,
            value,
            params,
        });
    }

    if current.is_some() {
        return Err(ParserError::UnterminatedRecord);
    }

    Ok(records)
}
