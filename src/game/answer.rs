//! Answer matching for question cards.
//!
//! Two independent modes, either or both of which a card may enable:
//! - normalized equality: case, diacritics, punctuation and spacing are
//!   ignored before comparing against the canonical answer and its aliases.
//! - containment: every word of the canonical answer (or an alias) must
//!   appear somewhere in the submitted text.
//!
//! With neither mode enabled the trimmed texts must match exactly.

use std::collections::HashMap;

use once_cell::sync::Lazy;

/// Lowercase Latin letters with diacritics and their plain spelling.
static DIACRITIC_FOLDS: Lazy<HashMap<char, &'static str>> = Lazy::new(|| {
    let table: &[(&str, &str)] = &[
        ("àáâãäåāăą", "a"),
        ("çćĉċč", "c"),
        ("ďđ", "d"),
        ("èéêëēĕėęě", "e"),
        ("ĝğġģ", "g"),
        ("ĥħ", "h"),
        ("ìíîïĩīĭįı", "i"),
        ("ĵ", "j"),
        ("ķ", "k"),
        ("ĺļľŀł", "l"),
        ("ñńņňŉ", "n"),
        ("òóôõöøōŏő", "o"),
        ("ŕŗř", "r"),
        ("śŝşšș", "s"),
        ("ţťŧț", "t"),
        ("ùúûüũūŭůűų", "u"),
        ("ŵ", "w"),
        ("ýÿŷ", "y"),
        ("źżž", "z"),
        ("ß", "ss"),
        ("æ", "ae"),
        ("œ", "oe"),
    ];
    let mut map = HashMap::new();
    for (chars, plain) in table {
        for c in chars.chars() {
            map.insert(c, *plain);
        }
    }
    map
});

/// How a question card compares submitted answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MatchMode {
    pub normalized: bool,
    pub containment: bool,
}

/// Lowercase, strip diacritics, keep only letters, digits, spaces, `!` and
/// `-`, turn hyphens into spaces and collapse runs of spaces.
///
/// Digits are kept on purpose, unlike a letters-only filter: answers such as
/// "H2O" or "1822" would otherwise normalize to something else or to nothing.
pub fn normalize(text: &str) -> String {
    let mut folded = String::with_capacity(text.len());
    for c in text.chars().flat_map(char::to_lowercase) {
        match DIACRITIC_FOLDS.get(&c) {
            Some(plain) => folded.push_str(plain),
            None if c.is_alphanumeric() || c == '!' || c == ' ' => folded.push(c),
            None if c == '-' => folded.push(' '),
            None if c.is_whitespace() => folded.push(' '),
            None => {}
        }
    }
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn contains_all_words(expected: &str, submitted: &str) -> bool {
    let mut words = expected.split_whitespace().peekable();
    if words.peek().is_none() {
        return false;
    }
    words.all(|w| submitted.contains(w))
}

/// Whether `submitted` answers a card whose canonical answer is `answer`.
pub fn is_correct(submitted: &str, answer: &str, aliases: &[String], mode: MatchMode) -> bool {
    let candidates: Vec<&str> = std::iter::once(answer)
        .chain(aliases.iter().map(String::as_str))
        .collect();

    if !mode.normalized && !mode.containment {
        let submitted = submitted.trim();
        return !submitted.is_empty() && candidates.iter().any(|c| c.trim() == submitted);
    }

    let submitted_norm = normalize(submitted);

    if mode.normalized
        && !submitted_norm.is_empty()
        && candidates.iter().any(|c| normalize(c) == submitted_norm)
    {
        return true;
    }

    if mode.containment {
        return if mode.normalized {
            candidates
                .iter()
                .any(|c| contains_all_words(&normalize(c), &submitted_norm))
        } else {
            candidates.iter().any(|c| contains_all_words(c, submitted))
        };
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;

    const NORMALIZED: MatchMode = MatchMode {
        normalized: true,
        containment: false,
    };
    const CONTAINS: MatchMode = MatchMode {
        normalized: false,
        containment: true,
    };
    const BOTH: MatchMode = MatchMode {
        normalized: true,
        containment: true,
    };

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("Água"), "agua");
        assert_eq!(normalize("  São-Paulo!!  "), "sao paulo!!");
        assert_eq!(normalize("Dom Pedro   II."), "dom pedro ii");
        assert_eq!(normalize("Straße"), "strasse");
        assert_eq!(normalize("1969"), "1969");
        assert_eq!(normalize("?,;"), "");
    }

    #[test]
    fn test_digits_survive_normalization() {
        assert_eq!(normalize("H2O"), "h2o");
        assert!(is_correct("1822", "1822", &[], NORMALIZED));
        assert!(!is_correct("1823", "1822", &[], NORMALIZED));
    }

    #[test]
    fn test_normalized_equality() {
        assert!(is_correct("Água", "agua", &[], NORMALIZED));
        assert!(is_correct("agua", "Água", &[], NORMALIZED));
        assert!(!is_correct("aguas", "Água", &[], NORMALIZED));
    }

    #[test]
    fn test_normalized_alias() {
        let aliases = vec!["H2O".to_string()];
        assert!(is_correct("h2o", "Água", &aliases, NORMALIZED));
    }

    #[test]
    fn test_containment() {
        assert!(is_correct("sir isaac newton", "isaac newton", &[], CONTAINS));
        assert!(!is_correct("isaac", "isaac newton", &[], CONTAINS));
    }

    #[test]
    fn test_containment_with_normalization() {
        assert!(is_correct("Sir Isaac NEWTON", "Isaac Newton", &[], BOTH));
        assert!(is_correct("foi o Cabral", "Pedro Álvares Cabral", &["Cabral".into()], BOTH));
        assert!(!is_correct("Sir Isaac NEWTON", "Isaac Newton", &[], CONTAINS));
    }

    #[test]
    fn test_exact_mode() {
        let mode = MatchMode::default();
        assert!(is_correct(" Paris ", "Paris", &[], mode));
        assert!(!is_correct("paris", "Paris", &[], mode));
    }

    #[test]
    fn test_empty_answer_is_wrong() {
        assert!(!is_correct("", "agua", &[], NORMALIZED));
        assert!(!is_correct("", "agua", &[], MatchMode::default()));
        assert!(!is_correct("", "agua", &[], CONTAINS));
        assert!(!is_correct("whatever", "", &[], CONTAINS));
    }
}
