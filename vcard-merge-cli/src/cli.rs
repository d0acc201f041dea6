//! Command-line surface: one flag per knob in [`vcard_merge_core::Options`],
//! plus the batch-level flags (`--group`, `--merge`, extension, log level)
//! that only the driver cares about.
//!
//! Ported from `vcardtools.py`'s `init_parser`.

use std::path::PathBuf;

use clap::Parser;
use vcard_merge_core::options::{FixerOptions, FuzzyMatchOptions, GroupOptions, NormalizeOptions};
use vcard_merge_core::Options;

/// Fixes, normalizes, groups and merges vCard 2.1/3.0 address books.
#[derive(Debug, Parser)]
#[command(name = "vcard-merge", version, about)]
pub struct Cli {
    /// Output directory. Must not already exist.
    pub dest_dir: PathBuf,

    /// Input vCard/VCF files, read in the order given.
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Extension appended to every output filename.
    #[arg(short = 'e', long = "vcard-extension", default_value = ".vcard")]
    pub vcard_extension: String,

    /// Write one subdirectory per group, one file per member.
    #[arg(short = 'g', long)]
    pub group: bool,

    /// Merge each group into a single output file.
    #[arg(short = 'm', long)]
    pub merge: bool,

    /// Disable fuzzy name matching; keep only exact attribute grouping.
    #[arg(short = 'x', long = "no-match-approx")]
    pub no_match_approx: bool,

    /// Skip the 2.1-to-3.0 fixer and parse the input as strict 3.0.
    #[arg(short = 'c', long = "no-fix-and-convert")]
    pub no_fix_and_convert: bool,

    /// Keep each record's existing FN/N instead of overwriting them with
    /// the selected name.
    #[arg(short = 'n', long = "no-overwrite-names")]
    pub no_overwrite_names: bool,

    /// Enable French-specific name and phone-number rewriting.
    #[arg(short = 'f', long = "french-tweaks")]
    pub french_tweaks: bool,

    /// Attribute(s) used for exact-match grouping. Repeatable.
    #[arg(short = 'a', long = "match-attributes")]
    pub match_attributes: Vec<String>,

    /// Fuzzy name-match ratio threshold, 0-100.
    #[arg(short = 't', long = "match-ratio", default_value_t = 100)]
    pub match_ratio: u8,

    /// Minimum name length considered for fuzzy matching.
    #[arg(short = 'i', long = "match-min-length", default_value_t = 5)]
    pub match_min_length: usize,

    /// Maximum length difference allowed by the startswith branch.
    #[arg(short = 'd', long = "match-max-distance", default_value_t = 3)]
    pub match_max_distance: i64,

    /// Disable the same-first-letter constraint on fuzzy matching.
    #[arg(short = '1', long = "no-match-same-first-letter")]
    pub no_match_same_first_letter: bool,

    /// Enable the startswith fuzzy-match branch.
    #[arg(short = 's', long = "match-startswith")]
    pub match_startswith: bool,

    /// Move bracketed/parenthesized FN/N content to a NOTE line.
    #[arg(long = "move-name-extra-info-to-note")]
    pub move_name_extra_info_to_note: bool,

    /// Keep a wrapped display name in EMAIL values instead of stripping it.
    #[arg(long = "no-remove-name-in-email")]
    pub no_remove_name_in_email: bool,

    /// Disable automatic comma-escaping in the fixer.
    #[arg(long = "do-not-force-escape-commas")]
    pub do_not_force_escape_commas: bool,

    /// Log level (error, warn, info, debug, trace), or an `RUST_LOG` filter.
    #[arg(short = 'l', long = "log-level", default_value = "info")]
    pub log_level: String,
}

impl Cli {
    /// Translates the flat CLI flags into the core crate's nested
    /// [`Options`].
    pub fn to_options(&self) -> Options {
        let match_attributes = if self.match_attributes.is_empty() {
            GroupOptions::default().match_attributes
        } else {
            self.match_attributes.clone()
        };

        let options = Options {
            fixer: FixerOptions {
                do_not_force_escape_commas: self.do_not_force_escape_commas,
            },
            normalize: NormalizeOptions {
                no_overwrite_names: self.no_overwrite_names,
                move_name_parenth_braces_to_note: self.move_name_extra_info_to_note,
                no_remove_name_in_email: self.no_remove_name_in_email,
                french_tweaks: false,
            },
            group: GroupOptions {
                match_attributes,
                no_match_approx: self.no_match_approx,
                update_group_key: true,
                fuzzy: FuzzyMatchOptions {
                    same_first_letter: !self.no_match_same_first_letter,
                    startswith: self.match_startswith,
                    min_length: self.match_min_length,
                    max_distance: self.match_max_distance,
                    ratio: self.match_ratio,
                },
            },
            french_tweaks: false,
            no_fix_and_convert: self.no_fix_and_convert,
        };

        options.with_french_tweaks(self.french_tweaks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_match_attributes_match_core_default() {
        let cli = Cli::parse_from(["vcard-merge", "out", "a.vcf"]);
        let options = cli.to_options();
        assert_eq!(
            options.group.match_attributes,
            vec!["names".to_string(), "tel_!work".to_string(), "email".to_string()]
        );
    }

    #[test]
    fn explicit_match_attributes_override_default() {
        let cli = Cli::parse_from([
            "vcard-merge",
            "out",
            "a.vcf",
            "-a",
            "email",
            "-a",
            "org",
        ]);
        let options = cli.to_options();
        assert_eq!(
            options.group.match_attributes,
            vec!["email".to_string(), "org".to_string()]
        );
    }

    #[test]
    fn french_tweaks_flag_propagates_to_normalize_options() {
        let cli = Cli::parse_from(["vcard-merge", "out", "a.vcf", "--french-tweaks"]);
        let options = cli.to_options();
        assert!(options.french_tweaks);
        assert!(options.normalize.french_tweaks);
    }

    #[test]
    fn no_match_same_first_letter_flips_fuzzy_default() {
        let cli = Cli::parse_from(["vcard-merge", "out", "a.vcf", "-1"]);
        let options = cli.to_options();
        assert!(!options.group.fuzzy.same_first_letter);
    }
}
