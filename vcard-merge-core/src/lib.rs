//! Fix, normalize, group and merge vCard 2.1/3.0 address books.
//!
//! The pipeline, leaves first: [`fixer`] repairs messy vCard 2.1 text
//! into strict 3.0 line syntax; [`parser`] turns that text into
//! [`model::Record`]s; [`names`] extracts and selects a display name per
//! record; [`normalizer`] harmonizes `FN`/`N`/`EMAIL`/`TEL` in place;
//! [`grouper`] clusters records believed to refer to the same person;
//! [`merge`] collapses a group into one record; [`serialize`] writes a
//! record back out as strict vCard 3.0 text.

#![forbid(unsafe_code)]
#![warn(
    unused,
    clippy::correctness,
    missing_debug_implementations,
    missing_docs,
    clippy::all,
    clippy::wildcard_imports,
    clippy::needless_borrow,
    clippy::cast_lossless,
    clippy::unused_async,
    clippy::explicit_iter_loop,
    clippy::explicit_into_iter_loop,
    clippy::cloned_instead_of_copied
)]
#![cfg_attr(not(test), forbid(clippy::indexing_slicing))]
#![cfg_attr(not(test), forbid(clippy::string_slice))]
#![allow(
    clippy::match_bool,
    clippy::mixed_read_write_in_expression,
    clippy::bool_assert_comparison,
    clippy::manual_split_once,
    clippy::format_push_string,
    clippy::bool_to_int_with_if,
    clippy::manual_range_contains
)]

pub mod error;
pub mod fixer;
pub mod fuzzy;
pub mod grouper;
pub mod merge;
pub mod model;
pub mod names;
pub mod normalizer;
pub mod options;
pub mod parser;
pub mod serialize;

pub use error::{Error, Result};
pub use model::{ParamName, Params, Property, PropertyName, Record, StructuredName, Value};
pub use options::Options;

/// Runs the fixer, parser, name extraction and normalizer over one
/// source file's raw bytes, front to back.
///
/// Returns `(selected_name, record)` pairs in file order. The caller
/// (the CLI driver) is responsible for merging these into a working set
/// keyed by name and resolving collisions across files, since that
/// requires knowledge this crate deliberately doesn't have — which
/// other files are part of the same batch.
pub fn process_file(raw: &[u8], options: &Options) -> Result<Vec<(String, Record)>> {
    let fixed = if options.no_fix_and_convert {
        String::from_utf8_lossy(raw).into_owned()
    } else {
        fixer::fix(raw, &options.fixer)
    };
    let records = parser::parse(&fixed)?;
    records
        .into_iter()
        .map(|mut record| {
            let candidates = names::collect_candidate_names(&record)?;
            let selected = names::select_most_relevant_name(&candidates)?;
            normalizer::normalize(&mut record, &selected, &options.normalize);
            Ok((selected, record))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn process_file_fixes_parses_names_and_normalizes() {
        let raw = b"BEGIN:vcard\r\nFN:Alice Doe\r\nEMAIL:Alice@Example.COM\r\nEND:vcard\r\n";
        let (name, record) = process_file(raw, &Options::default())
            .unwrap()
            .into_iter()
            .next()
            .unwrap();
        assert_eq!(name, "Alice Doe");
        assert_eq!(
            record.first("EMAIL").unwrap().value.as_text(),
            Some("alice@example.com")
        );
        assert!(!record.has("VERSION"));
    }

    #[test]
    fn process_file_falls_back_to_org_when_no_name_fields() {
        let raw = b"BEGIN:VCARD\r\nORG:Acme Corp\r\nEND:VCARD\r\n";
        let (name, _record) = process_file(raw, &Options::default())
            .unwrap()
            .into_iter()
            .next()
            .unwrap();
        assert_eq!(name, "Acme Corp");
    }
}
