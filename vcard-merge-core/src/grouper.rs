//! Builds equivalence classes over a collection of normalized records.
//!
//! Ported from `get_vcards_groups`/`group_keys`/`collect_values` in the
//! original tool. Phase 1 groups records that share an exact attribute
//! value (name, email, a filtered `TEL` bucket, ...); phase 2 optionally
//! folds in near-miss name matches via [`crate::fuzzy`].

use indexmap::{IndexMap, IndexSet};
use tracing::debug;

use crate::error::{Error, Result};
use crate::fuzzy::match_approx;
use crate::model::{Record, Value};
use crate::names::select_most_relevant_name;
use crate::options::GroupOptions;

fn collapse_spaces(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Collects the set of attribute values `record` exposes for the given
/// match-attribute spec (`"names"`, `"mobiles"`, `"tel_!work"`, a bare
/// property name, ...).
pub fn collect_values(record: &Record, spec: &str) -> IndexSet<String> {
    match spec {
        "names" => {
            let mut set = collect_values(record, "fn");
            set.extend(collect_values(record, "n"));
            set
        }
        "mobiles" => record
            .all("TEL")
            .filter_map(|p| p.value.as_text())
            .map(|v| v.chars().filter(|c| !c.is_whitespace()).collect::<String>())
            .filter(|v| v.starts_with("06") || v.starts_with("07"))
            .collect(),
        "n" => record
            .all("N")
            .map(|p| collapse_spaces(&property_plain_text(&p.value)))
            .collect(),
        "org" => record
            .all("ORG")
            .flat_map(|p| match &p.value {
                Value::List(items) => items.iter().map(|s| s.trim().to_string()).collect(),
                Value::Text(s) => vec![s.trim().to_string()],
                Value::Name(_) => Vec::new(),
            })
            .collect(),
        spec if spec.contains('_') => {
            let (name, filter) = spec.split_once('_').expect("guarded by contains('_')");
            let name = name.to_uppercase();
            let (negating, type_name) = match filter.strip_prefix('!') {
                Some(rest) => (true, rest.to_uppercase()),
                None => (false, filter.to_uppercase()),
            };
            record
                .all(&name)
                .filter(|p| {
                    let is_exact_type = p
                        .types()
                        .map(|types| types.len() == 1 && types[0].eq_ignore_ascii_case(&type_name))
                        .unwrap_or(false);
                    if negating {
                        !is_exact_type
                    } else {
                        is_exact_type
                    }
                })
                .filter_map(|p| p.value.as_text())
                .map(|s| s.to_string())
                .collect()
        }
        other => record
            .all(&other.to_uppercase())
            .filter_map(|p| p.value.as_text())
            .map(|s| s.to_string())
            .collect(),
    }
}

/// Strips a `_`-separated filter suffix off a match-attribute spec, so
/// `tel_home` and `tel_!work` both index into the same `tel` bucket as
/// a bare `tel` spec would.
fn a_key(attr: &str) -> &str {
    match attr.split_once('_') {
        Some((base, _)) => base,
        None => attr,
    }
}

fn property_plain_text(value: &Value) -> String {
    match value {
        Value::Text(s) => s.clone(),
        Value::Name(n) => n.to_plain_string(),
        Value::List(items) => items.join(" "),
    }
}

/// Owns the group/membership/index tables and builds them
/// deterministically from a working set of normalized records.
#[derive(Debug, Default)]
pub struct Grouper {
    groups: IndexMap<String, Vec<String>>,
    member_of: IndexMap<String, String>,
    index: IndexMap<String, IndexMap<String, Vec<String>>>,
}

impl Grouper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn groups(&self) -> &IndexMap<String, Vec<String>> {
        &self.groups
    }

    pub fn member_of(&self) -> &IndexMap<String, String> {
        &self.member_of
    }

    /// Runs phase 1 (exact attribute matching) then, unless disabled or
    /// `names` isn't a configured match attribute, phase 2 (fuzzy name
    /// matching) over `records`. Returns the keys that ended up in no
    /// group, in `records`' insertion order.
    pub fn run(
        &mut self,
        records: &IndexMap<String, Record>,
        options: &GroupOptions,
    ) -> Result<Vec<String>> {
        for (key, record) in records {
            for attr in &options.match_attributes {
                self.index_record(key, record, attr, options.update_group_key)?;
            }
        }
        debug!(groups = self.groups.len(), records = records.len(), "phase 1 exact matching done");

        if !options.no_match_approx && options.match_attributes.iter().any(|a| a == "names") {
            self.match_approx_pass(options)?;
            debug!(groups = self.groups.len(), "phase 2 fuzzy matching done");
        }

        let ungrouped: Vec<String> = records
            .keys()
            .filter(|k| !self.member_of.contains_key(k.as_str()))
            .cloned()
            .collect();
        debug!(ungrouped = ungrouped.len(), "grouping complete");
        Ok(ungrouped)
    }

    fn index_record(
        &mut self,
        key: &str,
        record: &Record,
        attr: &str,
        update_group_key: bool,
    ) -> Result<()> {
        for value in collect_values(record, attr) {
            let mut needs_group = None;
            {
                let bucket = self.index.entry(a_key(attr).to_string()).or_default();
                match bucket.get_mut(&value) {
                    None => {
                        bucket.insert(value, vec![key.to_string()]);
                    }
                    Some(list) => {
                        if !list.iter().any(|k| k == key) {
                            list.push(key.to_string());
                            needs_group = Some(list[0].clone());
                        }
                    }
                }
            }
            if let Some(pivot) = needs_group {
                let g_key = self.member_of.get(key).cloned();
                let g_pivot = self.member_of.get(&pivot).cloned();
                self.group_keys(key, &pivot, g_key, g_pivot, update_group_key)?;
            }
        }
        Ok(())
    }

    fn match_approx_pass(&mut self, options: &GroupOptions) -> Result<()> {
        let Some(names_index) = self.index.get("names").cloned() else {
            return Ok(());
        };
        let pending: Vec<(String, Vec<String>)> = names_index.into_iter().collect();

        for i in 0..pending.len() {
            let (name1, keys1) = &pending[i];
            for (name2, keys2) in pending.iter().skip(i + 1) {
                if match_approx(name1, name2, &options.fuzzy) {
                    let key1 = keys1[0].clone();
                    let key2 = if keys2.contains(&keys1[0]) {
                        keys1[0].clone()
                    } else {
                        keys2[0].clone()
                    };
                    let g1 = self.member_of.get(&key1).cloned();
                    let g2 = self.member_of.get(&key2).cloned();
                    self.group_keys(&key1, &key2, g1, g2, options.update_group_key)?;
                }
            }
        }
        Ok(())
    }

    /// Folds `k2` into whatever group `k1` is (or isn't) part of, per
    /// the `group_keys` rules described above. `g1`/`g2` must be the groups `k1`
    /// and `k2` belonged to *before* this call (captured by the caller,
    /// since phase 1 mutates `index` before looking them up).
    fn group_keys(
        &mut self,
        k1: &str,
        k2: &str,
        g1: Option<String>,
        g2: Option<String>,
        update_group_key: bool,
    ) -> Result<String> {
        if k1 == k2 {
            if let Some(g) = g1.clone().or_else(|| g2.clone()) {
                return Ok(g);
            }
        }
        if let (Some(a), Some(b)) = (&g1, &g2) {
            if a == b {
                return Ok(a.clone());
            }
        }

        match (g1, g2) {
            (None, None) => {
                let new_key = select_most_relevant_name(&[k1.to_string(), k2.to_string()])?;
                if self.groups.contains_key(&new_key) {
                    return Err(Error::GroupKeyCollision(new_key));
                }
                debug!(group = %new_key, %k1, %k2, "new group");
                self.groups
                    .insert(new_key.clone(), vec![k1.to_string(), k2.to_string()]);
                self.member_of.insert(k1.to_string(), new_key.clone());
                self.member_of.insert(k2.to_string(), new_key.clone());
                Ok(new_key)
            }
            (Some(existing), None) => self.add_to_group(existing, k2, k1, k2, update_group_key),
            (None, Some(existing)) => self.add_to_group(existing, k1, k1, k2, update_group_key),
            (Some(ga), Some(gb)) => {
                let winner = select_most_relevant_name(&[ga.clone(), gb.clone()])?;
                let (dest, source) = if winner == ga { (ga, gb) } else { (gb, ga) };
                debug!(%dest, %source, "merging groups");
                let moved = self.groups.shift_remove(&source).unwrap_or_default();
                for member in &moved {
                    self.member_of.insert(member.clone(), dest.clone());
                }
                self.groups.entry(dest.clone()).or_default().extend(moved);
                self.member_of.insert(k1.to_string(), dest.clone());
                self.member_of.insert(k2.to_string(), dest.clone());
                Ok(dest)
            }
        }
    }

    /// Appends `added` to `existing`'s group, optionally renaming the
    /// group when `added` makes a more relevant key than `existing`,
    /// then records `k1`/`k2` as members of the resulting group key.
    fn add_to_group(
        &mut self,
        existing: String,
        added: &str,
        k1: &str,
        k2: &str,
        update_group_key: bool,
    ) -> Result<String> {
        self.groups
            .entry(existing.clone())
            .or_default()
            .push(added.to_string());
        self.member_of.insert(added.to_string(), existing.clone());

        let mut final_group = existing.clone();
        if update_group_key {
            let candidate = select_most_relevant_name(&[existing.clone(), added.to_string()])?;
            if candidate != existing {
                self.rename_group(&existing, &candidate);
                final_group = candidate;
            }
        }
        self.member_of.insert(k1.to_string(), final_group.clone());
        self.member_of.insert(k2.to_string(), final_group.clone());
        Ok(final_group)
    }

    fn rename_group(&mut self, old: &str, new: &str) {
        if let Some(members) = self.groups.shift_remove(old) {
            for member in &members {
                self.member_of.insert(member.clone(), new.to_string());
            }
            self.groups.insert(new.to_string(), members);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Property;
    use crate::options::FuzzyMatchOptions;

    fn record_with_email(email: &str) -> Record {
        let mut r = Record::new();
        r.push(Property::new("EMAIL", Value::Text(email.to_string())));
        r
    }

    fn record_with_fn(name: &str) -> Record {
        let mut r = Record::new();
        r.push(Property::new("FN", Value::Text(name.to_string())));
        r
    }

    #[test]
    fn groups_records_sharing_an_exact_email() {
        let mut records = IndexMap::new();
        records.insert("Alice".to_string(), record_with_email("alice@example.com"));
        records.insert("ALICE".to_string(), record_with_email("alice@example.com"));

        let mut grouper = Grouper::new();
        let options = GroupOptions {
            match_attributes: vec!["email".to_string()],
            ..GroupOptions::default()
        };
        let ungrouped = grouper.run(&records, &options).unwrap();
        assert!(ungrouped.is_empty());
        assert_eq!(grouper.groups().len(), 1);
        let (_, members) = grouper.groups().iter().next().unwrap();
        assert_eq!(members.len(), 2);
    }

    #[test]
    fn tel_filter_excludes_work_numbers() {
        let mut record = Record::new();
        let mut params = crate::model::Params::new();
        params.insert("TYPE".into(), vec!["WORK".to_string()]);
        record.push(
            Property::new("TEL", Value::Text("0100000000".into())).with_params(params),
        );
        let values = collect_values(&record, "tel_!work");
        assert!(values.is_empty());
    }

    #[test]
    fn tel_filter_includes_non_work_numbers() {
        let mut record = Record::new();
        let mut params = crate::model::Params::new();
        params.insert("TYPE".into(), vec!["CELL".to_string()]);
        record.push(
            Property::new("TEL", Value::Text("0600000000".into())).with_params(params),
        );
        let values = collect_values(&record, "tel_!work");
        assert!(values.contains("0600000000"));
    }

    #[test]
    fn tel_home_and_tel_mobile_specs_cross_match_via_the_shared_tel_bucket() {
        let mut home = Record::new();
        let mut home_params = crate::model::Params::new();
        home_params.insert("TYPE".into(), vec!["HOME".to_string()]);
        home.push(Property::new("TEL", Value::Text("0100000000".into())).with_params(home_params));

        let mut mobile = Record::new();
        let mut mobile_params = crate::model::Params::new();
        mobile_params.insert("TYPE".into(), vec!["MOBILE".to_string()]);
        mobile.push(
            Property::new("TEL", Value::Text("0100000000".into())).with_params(mobile_params),
        );

        let mut records = IndexMap::new();
        records.insert("Alice".to_string(), home);
        records.insert("Bob".to_string(), mobile);

        let mut grouper = Grouper::new();
        let options = GroupOptions {
            match_attributes: vec!["tel_home".to_string(), "tel_mobile".to_string()],
            no_match_approx: true,
            ..GroupOptions::default()
        };
        let ungrouped = grouper.run(&records, &options).unwrap();
        assert!(ungrouped.is_empty());
        assert_eq!(grouper.groups().len(), 1);
    }

    #[test]
    fn fuzzy_match_groups_reordered_names() {
        let mut records = IndexMap::new();
        records.insert("Dupont Jean".to_string(), record_with_fn("Dupont Jean"));
        records.insert("Jean Dupont".to_string(), record_with_fn("Jean Dupont"));

        let mut grouper = Grouper::new();
        let options = GroupOptions {
            match_attributes: vec!["names".to_string()],
            fuzzy: FuzzyMatchOptions {
                ratio: 100,
                ..FuzzyMatchOptions::default()
            },
            ..GroupOptions::default()
        };
        let ungrouped = grouper.run(&records, &options).unwrap();
        assert!(ungrouped.is_empty());
        assert_eq!(grouper.groups().len(), 1);
    }

    #[test]
    fn ungrouped_keys_are_reported() {
        let mut records = IndexMap::new();
        records.insert("Alice".to_string(), record_with_email("alice@example.com"));
        records.insert("Bob".to_string(), record_with_email("bob@example.com"));

        let mut grouper = Grouper::new();
        let options = GroupOptions {
            match_attributes: vec!["email".to_string()],
            no_match_approx: true,
            ..GroupOptions::default()
        };
        let ungrouped = grouper.run(&records, &options).unwrap();
        assert_eq!(ungrouped, vec!["Alice".to_string(), "Bob".to_string()]);
    }

    #[test]
    fn member_of_and_groups_stay_consistent() {
        let mut records = IndexMap::new();
        records.insert("Alice".to_string(), record_with_email("a@example.com"));
        records.insert("Alice2".to_string(), record_with_email("a@example.com"));
        records.insert("Alice3".to_string(), record_with_email("a@example.com"));

        let mut grouper = Grouper::new();
        let options = GroupOptions {
            match_attributes: vec!["email".to_string()],
            ..GroupOptions::default()
        };
        grouper.run(&records, &options).unwrap();

        for (group_key, members) in grouper.groups() {
            for member in members {
                assert_eq!(grouper.member_of().get(member), Some(group_key));
            }
        }
    }
}
