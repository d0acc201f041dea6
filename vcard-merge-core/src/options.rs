//! Immutable configuration threaded through the Fixer, Normalizer and
//! Grouper.
//!
//! The original tool reads a dozen process-wide `OPTION_*` globals set
//! once by the CLI and never touched again; this is that same
//! configuration, but as a value passed by reference instead of module
//! globals.

/// Options consumed by [`crate::fixer::fix`].
#[derive(Debug, Clone)]
pub struct FixerOptions {
    /// Disables the unescaped-comma rewriting in header and continuation
    /// bodies (`--do-not-force-escape-commas`).
    pub do_not_force_escape_commas: bool,
}

impl Default for FixerOptions {
    fn default() -> Self {
        FixerOptions {
            do_not_force_escape_commas: false,
        }
    }
}

/// Options consumed by [`crate::normalizer::normalize`].
#[derive(Debug, Clone)]
pub struct NormalizeOptions {
    pub no_overwrite_names: bool,
    pub move_name_parenth_braces_to_note: bool,
    pub no_remove_name_in_email: bool,
    pub french_tweaks: bool,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        NormalizeOptions {
            no_overwrite_names: false,
            move_name_parenth_braces_to_note: false,
            no_remove_name_in_email: false,
            french_tweaks: false,
        }
    }
}

/// Options consumed by [`crate::fuzzy::match_approx`].
#[derive(Debug, Clone)]
pub struct FuzzyMatchOptions {
    pub same_first_letter: bool,
    pub startswith: bool,
    pub min_length: usize,
    /// Inclusive-exclusive range `[-max_distance, max_distance)`, as
    /// used by the `startswith` branch.
    pub max_distance: i64,
    pub ratio: u8,
}

impl Default for FuzzyMatchOptions {
    fn default() -> Self {
        FuzzyMatchOptions {
            same_first_letter: true,
            startswith: false,
            min_length: 5,
            max_distance: 3,
            ratio: 100,
        }
    }
}

/// Options consumed by [`crate::grouper::Grouper::run`].
#[derive(Debug, Clone)]
pub struct GroupOptions {
    pub match_attributes: Vec<String>,
    pub no_match_approx: bool,
    pub update_group_key: bool,
    pub fuzzy: FuzzyMatchOptions,
}

impl Default for GroupOptions {
    fn default() -> Self {
        GroupOptions {
            match_attributes: vec!["names".to_string(), "tel_!work".to_string(), "email".to_string()],
            no_match_approx: false,
            update_group_key: true,
            fuzzy: FuzzyMatchOptions::default(),
        }
    }
}

/// The full, immutable configuration for a run, covering every stage.
/// Each stage only reads the slice relevant to it.
#[derive(Debug, Clone, Default)]
pub struct Options {
    pub fixer: FixerOptions,
    pub normalize: NormalizeOptions,
    pub group: GroupOptions,
    pub french_tweaks: bool,
    pub no_fix_and_convert: bool,
}

impl Options {
    /// Applies the top-level `french_tweaks` flag consistently to the
    /// sub-options that need it (normalizer for tel/name rewriting,
    /// names module for `build_structured_name`'s ` de ` splitting).
    pub fn with_french_tweaks(mut self, enabled: bool) -> Self {
        self.french_tweaks = enabled;
        self.normalize.french_tweaks = enabled;
        self
    }
}
