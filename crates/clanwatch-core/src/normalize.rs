//! Canonical form of display names, used only for matching.
//!
//! Two names that differ only by case, spacing, compatibility forms or
//! invisible marks normalize to the same string. The normalized value is
//! never shown or stored as a display name.

use caseless::default_case_fold_str;
use unicode_normalization::UnicodeNormalization;

/// Upper bound on fold passes; real input settles in one or two.
const MAX_PASSES: usize = 4;

/// Normalize a display name for equality matching.
///
/// Idempotent: `normalize(&normalize(x)) == normalize(x)`.
pub fn normalize(raw: &str) -> String {
    let mut current = fold(raw);
    for _ in 0..MAX_PASSES {
        let next = fold(&current);
        if next == current {
            break;
        }
        current = next;
    }
    current
}

/// `normalize` for optional input; absent names normalize to `""`.
pub fn normalize_opt(raw: Option<&str>) -> String {
    raw.map(normalize).unwrap_or_default()
}

// Stripping can bring a base letter next to a combining mark, so the
// composition step runs again after the strip until nothing changes.
fn fold(raw: &str) -> String {
    let stripped: String = raw.chars().filter(|c| !is_invisible(*c)).collect();
    let folded = default_case_fold_str(&stripped.nfkc().collect::<String>());
    folded
        .nfkc()
        .filter(|c| !is_invisible(*c))
        .collect()
}

fn is_invisible(c: char) -> bool {
    c.is_whitespace()
        || matches!(
            c,
            '\u{00AD}'
                | '\u{061C}'
                | '\u{180E}'
                | '\u{200B}'..='\u{200F}'
                | '\u{202A}'..='\u{202E}'
                | '\u{2060}'..='\u{2064}'
                | '\u{2066}'..='\u{2069}'
                | '\u{FEFF}'
        )
}
