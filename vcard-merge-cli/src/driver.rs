//! The batch driver: reads every input file, runs the core pipeline over
//! each, then groups/merges/writes the results.
//!
//! Ported from `vcardtools.py`'s `main()`: validate the destination,
//! validate every input, process file by file into a working set keyed
//! by name (colliding names get a `(n)` suffix), then either write one
//! file per record, one subdirectory per group, or one merged file per
//! group, depending on `--group`/`--merge`.

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use indexmap::IndexMap;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info, warn};

use vcard_merge_core::grouper::Grouper;
use vcard_merge_core::merge::merge_group;
use vcard_merge_core::serialize::render_record;
use vcard_merge_core::{process_file, Error, Record};

use crate::cli::Cli;

/// Characters the original tool's `sanitise_name` replaced with `_` when
/// turning a selected name into a filename.
const FILENAME_UNSAFE: &[char] = &[
    '.', '\\', '/', '"', '\'', '!', '@', '#', '?', '$', '%', '^', '&', '*', '|', '(', ')', '[',
    ']', '{', '}', ';', ':', '<', '>',
];

fn sanitize_filename(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| if FILENAME_UNSAFE.contains(&c) { '_' } else { c })
        .collect();
    if sanitized.is_empty() {
        "_".to_string()
    } else {
        sanitized
    }
}

/// Returns `base`, or `base(2)`, `base(3)`, ... — the first of those not
/// already a key in `existing` — mirroring `get_vcards_from_files`'s
/// collision handling across input files.
fn unique_key(existing: &IndexMap<String, Record>, base: &str) -> String {
    if !existing.contains_key(base) {
        return base.to_string();
    }
    let mut n = 2;
    loop {
        let candidate = format!("{base}({n})");
        if !existing.contains_key(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

fn write_record(dest: &Path, key: &str, extension: &str, record: &Record) -> Result<()> {
    let path = dest.join(format!("{}{extension}", sanitize_filename(key)));
    if path.exists() {
        bail!(Error::OutputExists(path.display().to_string()));
    }
    fs::write(&path, render_record(record))
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

/// Runs the whole batch described by `cli`. Returns an error (with
/// context) on the first fatal problem; per-file/per-record logging
/// happens on the way so a long batch's progress survives an abort.
pub fn run(cli: &Cli) -> Result<()> {
    let options = cli.to_options();

    if cli.dest_dir.exists() {
        bail!(Error::OutputExists(cli.dest_dir.display().to_string()));
    }
    fs::create_dir_all(&cli.dest_dir)
        .with_context(|| format!("creating destination directory {}", cli.dest_dir.display()))?;

    for file in &cli.files {
        if !file.is_file() {
            bail!("input path is not a regular file: {}", file.display());
        }
    }

    let mut records: IndexMap<String, Record> = IndexMap::new();
    let file_bar = ProgressBar::new(cli.files.len() as u64);
    if let Ok(style) = ProgressStyle::with_template("{bar:40} {pos}/{len} files") {
        file_bar.set_style(style);
    }

    for file in &cli.files {
        let raw = fs::read(file).with_context(|| format!("reading {}", file.display()))?;
        let parsed = process_file(&raw, &options)
            .with_context(|| format!("processing {}", file.display()))?;
        info!(file = %file.display(), records = parsed.len(), "processed file");
        for (name, record) in parsed {
            let key = unique_key(&records, &name);
            if key != name {
                debug!(original = %name, renamed = %key, "name collision across input files");
            }
            records.insert(key, record);
        }
        file_bar.inc(1);
    }
    file_bar.finish_and_clear();

    if !cli.group && !cli.merge {
        for (key, record) in &records {
            write_record(&cli.dest_dir, key, &cli.vcard_extension, record)?;
        }
        info!(count = records.len(), "wrote ungrouped output");
        return Ok(());
    }

    let mut grouper = Grouper::new();
    let n = records.len() as u64;
    let pair_count = n.saturating_sub(1) * n / 2;
    let match_bar = ProgressBar::new(pair_count);
    if let Ok(style) = ProgressStyle::with_template("{bar:40} {pos}/{len} comparisons") {
        match_bar.set_style(style);
    }
    let ungrouped = grouper.run(&records, &options.group).context("grouping records")?;
    match_bar.finish_and_clear();
    info!(groups = grouper.groups().len(), ungrouped = ungrouped.len(), "grouping complete");

    for (group_key, members) in grouper.groups() {
        if members.len() < 2 {
            warn!(group = %group_key, "single-member group, treating as ungrouped");
            write_record(
                &cli.dest_dir,
                group_key,
                &cli.vcard_extension,
                members
                    .first()
                    .and_then(|m| records.get(m))
                    .expect("group member must exist in the working set"),
            )?;
            continue;
        }

        if cli.merge {
            let refs: Vec<&Record> = members
                .iter()
                .filter_map(|key| records.get(key))
                .collect();
            let merged = merge_group(&refs, &options.normalize)
                .with_context(|| format!("merging group {group_key}"))?;
            write_record(&cli.dest_dir, group_key, &cli.vcard_extension, &merged)?;
        } else {
            let group_dir = cli.dest_dir.join(sanitize_filename(group_key));
            fs::create_dir_all(&group_dir)
                .with_context(|| format!("creating {}", group_dir.display()))?;
            for member in members {
                if let Some(record) = records.get(member) {
                    write_record(&group_dir, member, &cli.vcard_extension, record)?;
                }
            }
        }
    }

    for key in &ungrouped {
        if let Some(record) = records.get(key) {
            write_record(&cli.dest_dir, key, &cli.vcard_extension, record)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    use pretty_assertions::assert_eq;

    #[test]
    fn sanitize_filename_replaces_unsafe_characters() {
        assert_eq!(sanitize_filename("Jean/Paul (ICE)"), "Jean_Paul _ICE_");
    }

    #[test]
    fn sanitize_filename_never_produces_an_empty_string() {
        assert_eq!(sanitize_filename("..."), "_");
    }

    #[test]
    fn unique_key_appends_a_numbered_suffix_on_collision() {
        let mut existing = IndexMap::new();
        existing.insert("Alice".to_string(), Record::new());
        assert_eq!(unique_key(&existing, "Alice"), "Alice(2)");
        existing.insert("Alice(2)".to_string(), Record::new());
        assert_eq!(unique_key(&existing, "Alice"), "Alice(3)");
    }

    fn base_cli(dest_dir: PathBuf, files: Vec<PathBuf>) -> Cli {
        Cli {
            dest_dir,
            files,
            vcard_extension: ".vcard".to_string(),
            group: false,
            merge: false,
            no_match_approx: false,
            no_fix_and_convert: false,
            no_overwrite_names: false,
            french_tweaks: false,
            match_attributes: Vec::new(),
            match_ratio: 100,
            match_min_length: 5,
            match_max_distance: 3,
            no_match_same_first_letter: false,
            match_startswith: false,
            move_name_extra_info_to_note: false,
            no_remove_name_in_email: false,
            do_not_force_escape_commas: false,
            log_level: "error".to_string(),
        }
    }

    #[test]
    fn writes_one_file_per_record_when_ungrouped() {
        let tmp = tempfile::tempdir().unwrap();
        let input = tmp.path().join("in.vcf");
        fs::write(
            &input,
            "BEGIN:vcard\r\nFN:Alice Doe\r\nEMAIL:Alice@Example.COM\r\nEND:vcard\r\n",
        )
        .unwrap();
        let dest = tmp.path().join("out");

        run(&base_cli(dest.clone(), vec![input])).unwrap();

        let contents = fs::read_to_string(dest.join("Alice Doe.vcard")).unwrap();
        assert!(contents.contains("FN:Alice Doe"));
        assert!(contents.contains("EMAIL:alice@example.com"));
    }

    #[test]
    fn refuses_to_overwrite_an_existing_destination() {
        let tmp = tempfile::tempdir().unwrap();
        let input = tmp.path().join("in.vcf");
        fs::write(&input, "BEGIN:vcard\r\nFN:Alice\r\nEND:vcard\r\n").unwrap();
        let dest = tmp.path().join("out");
        fs::create_dir(&dest).unwrap();

        let err = run(&base_cli(dest, vec![input])).unwrap_err();
        assert!(err.to_string().contains("already exists"));
    }

    #[test]
    fn merges_a_group_sharing_an_email_into_one_file() {
        let tmp = tempfile::tempdir().unwrap();
        let input = tmp.path().join("in.vcf");
        fs::write(
            &input,
            "BEGIN:vcard\r\nFN:Alice Doe\r\nEMAIL:alice@example.com\r\nEND:vcard\r\n\
             BEGIN:vcard\r\nFN:A. Doe\r\nEMAIL:alice@example.com\r\nTEL:0600000000\r\nEND:vcard\r\n",
        )
        .unwrap();
        let dest = tmp.path().join("out");

        let mut cli = base_cli(dest.clone(), vec![input]);
        cli.merge = true;
        cli.match_attributes = vec!["email".to_string()];
        run(&cli).unwrap();

        let entries: Vec<_> = fs::read_dir(&dest).unwrap().collect();
        assert_eq!(entries.len(), 1);
        let merged = fs::read_to_string(entries.into_iter().next().unwrap().unwrap().path()).unwrap();
        assert_eq!(merged.matches("EMAIL:").count(), 1);
        assert!(merged.contains("TEL:0600000000"));
    }

    #[test]
    fn groups_into_subdirectories_when_group_flag_is_set() {
        let tmp = tempfile::tempdir().unwrap();
        let input = tmp.path().join("in.vcf");
        fs::write(
            &input,
            "BEGIN:vcard\r\nFN:Alice Doe\r\nEMAIL:alice@example.com\r\nEND:vcard\r\n\
             BEGIN:vcard\r\nFN:A. Doe\r\nEMAIL:alice@example.com\r\nEND:vcard\r\n",
        )
        .unwrap();
        let dest = tmp.path().join("out");

        let mut cli = base_cli(dest.clone(), vec![input]);
        cli.group = true;
        cli.match_attributes = vec!["email".to_string()];
        run(&cli).unwrap();

        let subdirs: Vec<_> = fs::read_dir(&dest)
            .unwrap()
            .map(|e| e.unwrap().path())
            .filter(|p| p.is_dir())
            .collect();
        assert_eq!(subdirs.len(), 1);
        let members: Vec<_> = fs::read_dir(&subdirs[0]).unwrap().collect();
        assert_eq!(members.len(), 2);
    }
}
