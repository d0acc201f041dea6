//! Collects, deduplicates and re-assembles properties across one or
//! more records. Used both for the single-record "dedupe a messy
//! export" path and for folding a whole group of matched records into
//! one.
//!
//! Ported from `add_attributes`, `collect_attributes`, `set_name`,
//! `build_vcard`, `merge` and `deduplicate`.

use indexmap::IndexMap;

use crate::error::Result;
use crate::model::{Property, PropertyName, Record, Value};
use crate::names::{
    build_structured_name, collect_candidate_names, sanitize_name, select_most_relevant_name,
    split_quoted_display_email,
};
use crate::options::NormalizeOptions;

/// Properties whose semantics only make sense with a single instance
/// per record; extra instances collected while merging a group are
/// dropped rather than appended.
const SINGLE_INSTANCE_PROPERTIES: &[&str] = &["PRODID", "REV", "UID"];

/// Adds `attr_to_add` to `attributes`, unless a property with an equal
/// value is already present — in which case any parameter values the
/// new instance carries that the existing one doesn't are merged in,
/// preserving the existing instance's parameter order.
pub fn add_attributes(attributes: &mut Vec<Property>, attr_to_add: Property) {
    for existing in attributes.iter_mut() {
        if existing.value == attr_to_add.value {
            for (pname, pvalues) in &attr_to_add.params {
                if pvalues.is_empty() {
                    continue;
                }
                let entry = existing.params.entry(pname.clone()).or_default();
                for v in pvalues {
                    if !entry.contains(v) {
                        entry.push(v.clone());
                    }
                }
            }
            return;
        }
    }
    attributes.push(attr_to_add);
}

/// Collects every distinct property instance across `records` into a
/// property-name -> instances map, skipping `VERSION`. The first
/// record to mention a given property name wins the ordering of the
/// resulting key set; values are deduplicated via [`add_attributes`].
pub fn collect_attributes(records: &[&Record]) -> IndexMap<PropertyName, Vec<Property>> {
    let mut attributes: IndexMap<PropertyName, Vec<Property>> = IndexMap::new();
    let mut seen_names: Vec<PropertyName> = Vec::new();

    for record in records {
        for property in &record.properties {
            if property.name == "VERSION" {
                continue;
            }
            if !seen_names.contains(&property.name) {
                seen_names.push(property.name.clone());
            }
        }
    }

    for name in seen_names {
        let bucket = attributes.entry(name.clone()).or_default();
        for record in records {
            for property in record.all(&name) {
                add_attributes(bucket, property.clone());
            }
        }
    }

    attributes
}

/// Selects a single name from the collected `FN`/`N`/`EMAIL` candidates
/// and replaces the `FN`/`N` buckets with exactly one instance each,
/// built from the selection. Returns the selected plain-text name.
pub fn set_name(
    attributes: &mut IndexMap<PropertyName, Vec<Property>>,
    options: &NormalizeOptions,
) -> Result<String> {
    let mut available = Vec::new();
    let mut push_unique = |names: &mut Vec<String>, name: String| {
        if !names.contains(&name) {
            names.push(name);
        }
    };

    if let Some(fns) = attributes.get("FN") {
        for attr in fns {
            if let Some(text) = attr.value.as_text() {
                push_unique(&mut available, sanitize_name(text));
            }
        }
    }
    if let Some(ns) = attributes.get("N") {
        for attr in ns {
            let plain = match &attr.value {
                Value::Name(n) => n.to_plain_string(),
                Value::Text(s) => s.clone(),
                Value::List(items) => items.join(" "),
            };
            push_unique(&mut available, sanitize_name(&plain));
        }
    }
    if let Some(emails) = attributes.get("EMAIL") {
        for attr in emails {
            if let Some(text) = attr.value.as_text() {
                if let Some(name) = extract_display_name_from_email(text) {
                    push_unique(&mut available, sanitize_name(&name));
                }
            }
        }
    }

    let selected_name = select_most_relevant_name(&available)?;

    attributes.shift_remove("FN");
    attributes.shift_remove("N");
    attributes.insert(
        "FN".into(),
        vec![Property::new("FN", Value::Text(selected_name.clone()))],
    );
    attributes.insert(
        "N".into(),
        vec![Property::new(
            "N",
            Value::Name(build_structured_name(&selected_name, options)),
        )],
    );

    Ok(selected_name)
}

fn extract_display_name_from_email(email: &str) -> Option<String> {
    split_quoted_display_email(email).map(|(display, _addr)| display)
}

/// Flattens a property-name -> instances map back into a [`Record`],
/// keeping only the first instance of a [`SINGLE_INSTANCE_PROPERTIES`]
/// property when more than one was collected.
pub fn build_vcard(attributes: &IndexMap<PropertyName, Vec<Property>>) -> Record {
    let mut record = Record::new();
    for (name, instances) in attributes {
        let mut kept_single = false;
        for instance in instances {
            if SINGLE_INSTANCE_PROPERTIES.contains(&name.as_str()) {
                if kept_single {
                    continue;
                }
                kept_single = true;
            }
            record.push(instance.clone());
        }
    }
    record
}

/// Appends every property instance from `others` onto `base`, each
/// exactly once, with no deduplication against `base`'s existing
/// properties (unlike [`collect_attributes`]/[`add_attributes`] — this
/// is a plain structural merge, the building block `deduplicate` is
/// layered on top of).
pub fn merge(base: &mut Record, others: &[&Record]) {
    for other in others {
        for property in &other.properties {
            base.push(property.clone());
        }
    }
}

/// Collapses duplicate property instances within a single record and
/// picks one name for it.
pub fn deduplicate(record: &Record, options: &NormalizeOptions) -> Result<Record> {
    let records = [record];
    let mut attributes = collect_attributes(&records);
    set_name(&mut attributes, options)?;
    Ok(build_vcard(&attributes))
}

/// Collects a whole group of matched records into one, by name
/// selection over every record's candidate names rather than just
/// their `FN`/`N`/`EMAIL` attributes (a group's best name may come from
/// an `ORG` or `TEL` fallback on a member with no name fields at all).
pub fn merge_group(records: &[&Record], options: &NormalizeOptions) -> Result<Record> {
    let mut attributes = collect_attributes(records);
    if !attributes.contains_key("FN") && !attributes.contains_key("N") {
        let mut candidates = Vec::new();
        for record in records {
            for name in collect_candidate_names(record)? {
                if !candidates.contains(&name) {
                    candidates.push(name);
                }
            }
        }
        let selected = select_most_relevant_name(&candidates)?;
        attributes.insert(
            "FN".into(),
            vec![Property::new("FN", Value::Text(selected.clone()))],
        );
        attributes.insert(
            "N".into(),
            vec![Property::new(
                "N",
                Value::Name(build_structured_name(&selected, options)),
            )],
        );
        return Ok(build_vcard(&attributes));
    }
    set_name(&mut attributes, options)?;
    Ok(build_vcard(&attributes))
}
