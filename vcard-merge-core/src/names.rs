//! Name extraction, sanitizing and selection.
//!
//! Candidate names are gathered from `FN`, `N`, `EMAIL` and (failing
//! those) `ORG` and `TEL`, then reduced to a single "most relevant"
//! one. Ported from the original tool's `collect_vcard_names`,
//! `sanitize_name`, `build_name_from_email` and
//! `select_most_relevant_name`.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::error::{Error, Result};
use crate::fuzzy::token_sort_ratio;
use crate::model::{Record, StructuredName, Value};
use crate::options::NormalizeOptions;

/// When building a name from an email's local part, prefixing the
/// domain name helps distinguish otherwise-identical generic mailboxes
/// (e.g. `contact@acme.fr` vs `contact@other.fr`).
const EMAIL_USERS_ADD_DOMAIN: &[&str] = &[
    "contact",
    "info",
    "admin",
    "hello",
    "job",
    "question",
    "support",
    "service",
    "sales",
    "deal",
    "unsubscribe",
    "return",
    "credit",
    "recrute",
    "desinscription",
    "sav",
    "servicecommercial",
    "relationclient",
];

static PARENTH_OR_BRACES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r" *(\([^)]*\)|\[[^]]*\]) *").unwrap());
static TRAILING_INDEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(.*)\([0-9]+\)$").unwrap());
static ICE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\b(ICE[0-9]*)\b").unwrap());
static DASH_OR_UNDERSCORE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[_-]").unwrap());
static ANY_DIGIT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[0-9]").unwrap());
static WITHOUT_EXTENSION: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(.+)\.[a-zA-Z]+$").unwrap());
static QUOTED_DISPLAY_EMAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^ *"([^"]+)" *<([^>]+)> *$"#).unwrap());
static ONLY_NON_ALPHANUM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[ \t]*[^[:alnum:]_]*[ \t]*$").unwrap());

/// Matches the `"display name" <addr>` shape an `EMAIL` value can carry.
/// Returns `(display, addr)` when it matches.
pub fn split_quoted_display_email(value: &str) -> Option<(String, String)> {
    QUOTED_DISPLAY_EMAIL
        .captures(value)
        .map(|c| (c[1].to_string(), c[2].to_string()))
}

/// Extracts every `(...)`/`[...]` bracketed segment from `s`, returning
/// `(outer, inner)` where `outer` is `s` with the bracketed segments
/// removed (trimmed) and `inner` is their stripped contents, space
/// joined. Returns `None` if `s` carries no bracketed segment.
pub fn extract_bracketed_groups(s: &str) -> Option<(String, String)> {
    if !PARENTH_OR_BRACES.is_match(s) {
        return None;
    }
    let inner = PARENTH_OR_BRACES
        .find_iter(s)
        .map(|m| {
            m.as_str()
                .trim()
                .trim_start_matches(['(', '['])
                .trim_end_matches([')', ']'])
                .trim()
                .to_string()
        })
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    let outer = PARENTH_OR_BRACES.replace_all(s, "").trim().to_string();
    Some((outer, inner))
}

/// Capitalizes the first letter of each whitespace-separated word and
/// lowercases the rest, mirroring Python's `str.title()` closely enough
/// for the ASCII/Latin-1 names this tool deals with.
fn title_case(s: &str) -> String {
    s.split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => {
                    first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Adds a missing closing bracket, or drops a leading unmatched opening
/// one — an opener with no closer that reaches the end of the string
/// would otherwise swallow the whole value once parentheses/braces
/// content is stripped.
pub fn close_parentheses_or_braces(s: &str) -> String {
    if s.contains('(') && !s.contains(')') {
        if s.trim_start().starts_with('(') {
            let idx = s.find('(').unwrap();
            format!("{}{}", &s[..idx], &s[idx + 1..])
        } else {
            format!("{s})")
        }
    } else if s.contains('[') && !s.contains(']') {
        if s.trim_start().starts_with('[') {
            let idx = s.find('[').unwrap();
            format!("{}{}", &s[..idx], &s[idx + 1..])
        } else {
            format!("{s}]")
        }
    } else {
        s.to_string()
    }
}

fn len_without_parenth_or_braces(s: &str) -> usize {
    PARENTH_OR_BRACES.replace_all(s, "").chars().count()
}

fn len_without_index(s: &str) -> usize {
    TRAILING_INDEX.replace(s, "$1").chars().count()
}

/// Removes `ICE`/`ICE1`/... markers, collapses whitespace, title-cases
/// the result, then collapses a `Name (Name)` / `Name [Name]` form down
/// to the outer name alone when the bracketed part is the same name
/// (exactly, or up to word order via [`token_sort_ratio`]).
pub fn sanitize_name(name: &str) -> String {
    let mut sanitized = ICE.replace_all(name, "").replace('.', " ");
    while sanitized.contains("  ") {
        sanitized = sanitized.replace("  ", " ");
    }
    let mut sanitized = title_case(sanitized.trim());

    if let Some(m) = PARENTH_OR_BRACES.find(name) {
        let bracketed = &name[m.start()..m.end()];
        let inner = title_case(
            bracketed
                .trim()
                .replace(['(', ')', '[', ']'], "")
                .trim(),
        );
        let outer = title_case(PARENTH_OR_BRACES.replace_all(name, "").trim());
        if inner == outer || token_sort_ratio(&inner, &outer) == 100 {
            sanitized = outer;
        }
    }
    sanitized
}

/// Builds a display name out of an email address's local part, adding
/// the domain as a prefix for generic mailboxes (`contact@acme.com` ->
/// `Acme - Contact`). Fails on Thunderbird's `nobody@nowhere.invalid`
/// placeholder addresses, which carry no usable identity.
pub fn build_name_from_email(email: &str) -> Result<String> {
    let trimmed = email.trim();
    if trimmed.to_lowercase().ends_with("nowhere.invalid") {
        return Err(Error::InvalidPlaceholderEmail(email.to_string()));
    }
    let (user, domain) = trimmed
        .rsplit_once('@')
        .ok_or_else(|| Error::InvalidPlaceholderEmail(email.to_string()))?;

    let mut name = DASH_OR_UNDERSCORE
        .replace_all(&ANY_DIGIT.replace_all(user, ""), " ")
        .into_owned();

    if EMAIL_USERS_ADD_DOMAIN
        .iter()
        .any(|prefix| name.to_lowercase().starts_with(prefix))
    {
        let domain_part = DASH_OR_UNDERSCORE.replace_all(domain, " ");
        let domain_part = WITHOUT_EXTENSION.replace(&domain_part, "$1");
        name = format!("{domain_part} - {name}");
    }

    name = name.replace('.', " ");
    Ok(sanitize_name(&name))
}

/// Picks the longest candidate (ignoring bracketed content), breaking
/// ties by preferring the longer name once a trailing `(3)`-style
/// duplicate-index suffix is stripped, and preferring a candidate with
/// no index at all over one that has one when both are otherwise tied.
pub fn select_most_relevant_name(names: &[String]) -> Result<String> {
    let mut selected: Option<&str> = None;
    let mut longest_length = 0usize;

    for name in names {
        if name.is_empty() {
            continue;
        }
        let length = len_without_parenth_or_braces(name);
        match selected {
            None => {
                selected = Some(name);
                longest_length = length;
            }
            Some(current) => {
                if length > longest_length {
                    longest_length = length;
                    selected = Some(name);
                } else if length == longest_length {
                    let name_no_idx = len_without_index(name);
                    let current_no_idx = len_without_index(current);
                    if name_no_idx > current_no_idx {
                        selected = Some(name);
                    } else if name_no_idx == current_no_idx
                        && name_no_idx == name.chars().count()
                        && current_no_idx != current.chars().count()
                    {
                        longest_length = length;
                        selected = Some(name);
                    }
                }
            }
        }
    }

    let selected = selected.ok_or(Error::EmptyCandidateList)?;
    if selected.contains('=') {
        return Err(Error::UndecodedValue(selected.to_string()));
    }
    Ok(selected.to_string())
}

/// Splits a plain display string into a [`StructuredName`], extracting
/// a bracketed suffix first, then splitting on ` - ` (explicit
/// family/given separator), then on ` de ` when French tweaks are
/// enabled (`Jean de La Fontaine` -> family `De La Fontaine`), falling
/// back to treating the last whitespace-separated token as the family
/// name.
pub fn build_structured_name(name: &str, options: &NormalizeOptions) -> StructuredName {
    let mut suffix = None;
    let mut working = name.to_string();
    if let Some(m) = PARENTH_OR_BRACES.find(name) {
        let bracketed = &name[m.start()..m.end()];
        suffix = Some(
            bracketed
                .trim()
                .replace(['(', ')', '[', ']'], "")
                .trim()
                .to_string(),
        );
        working = PARENTH_OR_BRACES.replace_all(name, "").into_owned();
    }

    let (family, given) = if let Some(idx) = working.find(" - ") {
        let family = working[..idx].to_string();
        let given = working[idx + 3..].to_string();
        (family, given)
    } else if options.french_tweaks && working.to_lowercase().contains(" de ") {
        let lower = working.to_lowercase();
        let idx = lower.find(" de ").unwrap();
        let family = format!("De {}", &working[..idx]);
        let given = working[idx + 4..].to_string();
        (family, given)
    } else {
        match working.rfind(' ') {
            Some(idx) => (working[idx + 1..].to_string(), working[..idx].to_string()),
            None => (working.clone(), String::new()),
        }
    };

    StructuredName {
        family,
        given,
        suffix,
    }
}

/// Gathers every plausible candidate name for `record`: `FN`/`N`
/// values (via email-building when they look like a single address),
/// display names embedded in `EMAIL` (`"Jane Doe" <jane@x.com>`), then
/// — only if nothing was found — `ORG` and finally a `tel_`-prefixed
/// fallback built from the first `TEL`.
pub fn collect_candidate_names(record: &Record) -> Result<Vec<String>> {
    let mut available = Vec::new();
    let mut push_unique = |names: &mut Vec<String>, name: String| {
        if !names.contains(&name) {
            names.push(name);
        }
    };

    for key in ["FN", "N"] {
        for property in record.all(key) {
            let raw = match &property.value {
                Value::Text(s) => s.clone(),
                Value::Name(n) => n.to_plain_string(),
                Value::List(items) => items.join(" "),
            };
            let value = close_parentheses_or_braces(raw.trim());
            if ONLY_NON_ALPHANUM.is_match(&value) {
                continue;
            }
            if value.matches('@').count() == 1 {
                if let Ok(name) = build_name_from_email(&value) {
                    push_unique(&mut available, name);
                }
            } else {
                push_unique(&mut available, sanitize_name(&value));
            }
        }
    }

    for email in record.all("EMAIL") {
        let Some(value) = email.value.as_text() else {
            continue;
        };
        if value.to_lowercase().trim().ends_with("nowhere.invalid") {
            continue;
        }
        if let Some((display, _addr)) = split_quoted_display_email(value) {
            push_unique(&mut available, sanitize_name(&display));
        }
    }

    if available.is_empty() {
        for email in record.all("EMAIL") {
            if let Some(value) = email.value.as_text() {
                if let Ok(name) = build_name_from_email(value) {
                    push_unique(&mut available, name);
                }
            }
        }
    }

    if available.is_empty() {
        debug!("no name candidates from FN/N/EMAIL, falling back to ORG");
        for org in record.all("ORG") {
            match &org.value {
                Value::List(items) => {
                    for item in items {
                        if !ONLY_NON_ALPHANUM.is_match(item.trim()) {
                            push_unique(&mut available, sanitize_name(item));
                        }
                    }
                }
                Value::Text(s) => {
                    if !ONLY_NON_ALPHANUM.is_match(s.trim()) {
                        push_unique(&mut available, sanitize_name(s));
                    }
                }
                Value::Name(_) => {}
            }
        }
    }

    if available.is_empty() {
        debug!("no name candidates from FN/N/EMAIL/ORG, falling back to TEL");
        if let Some(tel) = record.first("TEL") {
            if let Some(value) = tel.value.as_text() {
                push_unique(&mut available, format!("tel_{}", value.trim()));
            }
        }
    }

    Ok(available)
}
