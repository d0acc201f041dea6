//! Lenient text -> text fixer: turns messy vCard 2.1 input into strict
//! vCard 3.0 line syntax, ready for [`crate::parser`].
//!
//! Ported line-by-line from the original tool's `fix_and_convert_to_v3`,
//! keeping the same state machine (a pending logical line plus a
//! "currently inside a quoted-printable continuation" flag) instead of
//! the original's exception-driven, duck-typed file scan.

use std::sync::LazyLock;

use regex::Regex;

use crate::options::FixerOptions;

const TYPE_TOKENS: &[&str] = &[
    "PGP", "PNG", "JPEG", "GIF", "OGG", "INTERNET", "PREF", "HOME", "WORK", "MAIN", "CELL", "FAX",
    "VOICE",
];

static HEADER_LINE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[^: ]+:").unwrap());
static BEGIN_END_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(BEGIN|END):VCARD$").unwrap());
static UNESCAPED_COMMA: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(^|[^\\]),").unwrap());
static TYPE_TOKEN_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r";({})", TYPE_TOKENS.join("|"))).unwrap()
});
static LEADING_PROPERTY: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^([^;]+);").unwrap());
static LEADING_PROPERTY_ONLY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([^;]+);.*").unwrap());

/// Escapes every unescaped comma in `s` (`,` not preceded by `\` becomes
/// `\,`), unless `options.do_not_force_escape_commas` is set.
fn escape_commas(s: &str, options: &FixerOptions) -> String {
    if options.do_not_force_escape_commas {
        return s.to_string();
    }
    UNESCAPED_COMMA.replace_all(s, "${1}\\,").into_owned()
}

/// Rewrites a single new logical line's header, returning the rewritten
/// line and whether it starts a quoted-printable continuation run.
fn rewrite_header_line(line: &str, options: &FixerOptions) -> (String, bool) {
    if BEGIN_END_LINE.is_match(line) {
        return (line.to_uppercase(), false);
    }
    if !HEADER_LINE.is_match(line) {
        return (line.to_string(), false);
    }

    let colon = line.find(':').expect("HEADER_LINE match guarantees a colon");
    let mut key_part = line[..colon].to_uppercase();
    let rest_part = escape_commas(&line[colon + 1..], options);

    if !key_part.contains(';') {
        let new_line = format!("{key_part}:{rest_part}");
        let starts_qp = new_line.contains("ENCODING=QUOTED-PRINTABLE");
        return (new_line, starts_qp);
    }

    if key_part.contains("QUOTED-PRINTABLE;QUOTED-PRINTABLE") {
        key_part = key_part.replace("QUOTED-PRINTABLE;QUOTED-PRINTABLE", "QUOTED-PRINTABLE");
    }

    let new_key_part = TYPE_TOKEN_PREFIX
        .replace_all(&key_part, ";TYPE=$1")
        .into_owned();

    let new_line = if new_key_part.contains("TYPE=") {
        let key_value = LEADING_PROPERTY_ONLY.replace(&key_part, "$1").into_owned();
        let remainder = LEADING_PROPERTY.replace(&new_key_part, "").into_owned();

        let mut type_list: Vec<String> = Vec::new();
        let mut rest_list: Vec<String> = Vec::new();
        for field in remainder.split(';') {
            if let Some(ty) = field.strip_prefix("TYPE=") {
                type_list.push(ty.to_string());
            } else {
                let field = match field {
                    "ENCODING=BASE64" | "ENCODING=B" => "ENCODING=b".to_string(),
                    "QUOTED-PRINTABLE" => "ENCODING=QUOTED-PRINTABLE".to_string(),
                    other => other.to_string(),
                };
                rest_list.push(field);
            }
        }

        let has_image_type = ["JPEG", "PNG", "GIF"]
            .iter()
            .any(|t| type_list.iter().any(|ty| ty == t));
        if has_image_type
            && !rest_list.iter().any(|f| f == "ENCODING=b")
            && !rest_list.iter().any(|f| f == "VALUE=URI")
        {
            rest_list.push("VALUE=URI".to_string());
        }

        if rest_list.iter().any(|f| f == "ENCODING=QUOTED-PRINTABLE")
            && !rest_list.iter().any(|f| f.starts_with("CHARSET="))
        {
            rest_list.push("CHARSET=UTF-8".to_string());
        }

        let tail = if rest_list.is_empty() {
            String::new()
        } else {
            format!(";{}", rest_list.join(";"))
        };
        format!(
            "{key_value};TYPE={}{tail}:{rest_part}",
            type_list.join(","),
        )
    } else {
        let mut new_key_part = new_key_part;
        if new_key_part.contains("QUOTED-PRINTABLE") {
            new_key_part = new_key_part.replace(";QUOTED-PRINTABLE", ";ENCODING=QUOTED-PRINTABLE");
            if !new_key_part.contains("CHARSET=") {
                new_key_part =
                    new_key_part.replace("=QUOTED-PRINTABLE", "=QUOTED-PRINTABLE;CHARSET=UTF-8");
            }
        }
        format!("{new_key_part}:{rest_part}")
    };

    let starts_qp = new_line.contains("ENCODING=QUOTED-PRINTABLE");
    (new_line, starts_qp)
}

/// Repairs `raw` into strict vCard 3.0 line syntax. Pure and
/// deterministic: the only failure mode is decoding `raw` as UTF-8,
/// which is done lossily rather than failing, since malformed bodies
/// are a downstream parser concern.
pub fn fix(raw: &[u8], options: &FixerOptions) -> String {
    let text = String::from_utf8_lossy(raw);
    // Normalize line endings: CRLF -> LF, then any remaining CR -> LF.
    let text = text.replace("\r\n", "\n").replace('\r', "\n");

    let mut out_lines: Vec<String> = Vec::new();
    let mut pending: Option<String> = None;
    let mut started_quoted_printable = false;

    for line in text.lines() {
        if let Some(current) = pending.as_mut() {
            if started_quoted_printable && !HEADER_LINE.is_match(line) {
                // Quoted-printable continuation: strip a trailing soft
                // break, escape commas in the fragment, and join.
                if let Some(stripped) = current.strip_suffix('=') {
                    *current = stripped.to_string();
                }
                current.push_str(escape_commas(line, options).trim());
                continue;
            }
            out_lines.push(pending.take().unwrap());
            started_quoted_printable = false;
        }

        let (rewritten, starts_qp) = rewrite_header_line(line, options);
        started_quoted_printable = starts_qp;
        pending = Some(rewritten);
    }
    if let Some(last) = pending {
        out_lines.push(last);
    }

    out_lines.join("\n")
}
