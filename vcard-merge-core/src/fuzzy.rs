//! Fuzzy name matching, used by the grouper's second pass to fold
//! records whose identifying attributes don't match exactly but whose
//! names are close enough (typos, word order, a missing middle name).
//!
//! Ported from `match_approx`/`token_sort_ratio`/`reverse_words`.

use strsim::normalized_levenshtein;

use crate::names::build_structured_name;
use crate::options::{FuzzyMatchOptions, NormalizeOptions};

/// `fuzzywuzzy.fuzz.token_sort_ratio`: tokenize on whitespace, sort the
/// tokens, rejoin, and compute a normalized edit-distance similarity
/// scaled to 0..=100.
pub fn token_sort_ratio(a: &str, b: &str) -> u8 {
    let sort_tokens = |s: &str| {
        let mut tokens: Vec<&str> = s.split_whitespace().collect();
        tokens.sort_unstable();
        tokens.join(" ")
    };
    let sorted_a = sort_tokens(a);
    let sorted_b = sort_tokens(b);
    (normalized_levenshtein(&sorted_a, &sorted_b) * 100.0).round() as u8
}

/// Rebuilds `string` as `family given` instead of the usual
/// `given family`, by running it through the same structured-name
/// splitting the normalizer uses. Used to tolerate names given in
/// either order when comparing a reference against a candidate.
fn reverse_words(string: &str) -> String {
    let n = build_structured_name(string, &NormalizeOptions::default());
    if n.given.is_empty() {
        n.family
    } else {
        format!("{} {}", n.family, n.given)
    }
}

/// Returns whether `reference` approximately matches `compared`,
/// per `options`.
///
/// Always tries the "safe" `token_sort_ratio == 100` case first,
/// regardless of `options.ratio`, since an exact token-set match is
/// never a false positive. Below the configured minimum length, no
/// further fuzzy comparison is attempted.
pub fn match_approx(reference: &str, compared: &str, options: &FuzzyMatchOptions) -> bool {
    if options.ratio == 100 && token_sort_ratio(reference, compared) == 100 {
        return true;
    }

    if reference.chars().count() <= options.min_length || compared.chars().count() <= options.min_length {
        return false;
    }

    let (reference_reversed, compared_reversed) = if options.same_first_letter || options.startswith {
        (reverse_words(reference), reverse_words(compared))
    } else {
        (String::new(), String::new())
    };

    let first_letter_ok = !options.same_first_letter
        || first_char_eq_ignore_case(reference, compared)
        || first_char_eq_ignore_case(reference, &compared_reversed)
        || first_char_eq_ignore_case(&reference_reversed, compared);
    if !first_letter_ok {
        return false;
    }

    if options.startswith {
        let distance = reference.chars().count() as i64 - compared.chars().count() as i64;
        if distance >= -options.max_distance && distance < options.max_distance {
            if reference.starts_with(compared)
                || compared.starts_with(reference)
                || reference_reversed.starts_with(compared)
                || compared_reversed.starts_with(reference)
            {
                return true;
            }
        }
    }

    token_sort_ratio(reference, compared) >= options.ratio
}

fn first_char_eq_ignore_case(a: &str, b: &str) -> bool {
    match (a.chars().next(), b.chars().next()) {
        (Some(ca), Some(cb)) => ca.to_lowercase().eq(cb.to_lowercase()),
        _ => false,
    }
}
