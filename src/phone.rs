//! UAE mobile number normalisation.

const COUNTRY_CODE: &str = "+971";

/// `0501234567`, `971501234567`, `+971 50 123 4567` and `501234567` all become
/// `+971501234567`. Returns `None` for anything that is not a UAE mobile number.
pub fn normalize_uae(raw: &str) -> Option<String> {
    let compact: String = raw
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '(' | ')' | '.'))
        .collect();

    let candidates = [
        compact.strip_prefix("+971"),
        compact.strip_prefix("971"),
        compact.strip_prefix('0'),
        Some(compact.as_str()),
    ];
    candidates
        .into_iter()
        .flatten()
        .find(|local| is_local_mobile(local))
        .map(|local| format!("{COUNTRY_CODE}{local}"))
}

/// Normalised form when recognised, otherwise the trimmed input.
pub fn normalize_or_keep(raw: &str) -> String {
    normalize_uae(raw).unwrap_or_else(|| raw.trim().to_string())
}

/// Loose check used by import sniffing: mostly digits, long enough to dial.
pub fn looks_like_phone(value: &str) -> bool {
    let value = value.trim();
    let digits = value.chars().filter(|c| c.is_ascii_digit()).count();
    let others = value
        .chars()
        .filter(|c| !c.is_ascii_digit() && !matches!(c, '+' | ' ' | '-' | '(' | ')'))
        .count();
    digits >= 7 && others == 0
}

fn is_local_mobile(local: &str) -> bool {
    local.len() == 9
        && local.bytes().all(|b| b.is_ascii_digit())
        && matches!(local.as_bytes()[0], b'5'..=b'9')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalises_common_uae_spellings() {
        for raw in ["0501234567", "971501234567", "+971 50 123 4567", "501234567", "050-123-4567"] {
            assert_eq!(normalize_uae(raw).as_deref(), Some("+971501234567"), "{raw}");
        }
    }

    #[test]
    fn keeps_numbers_it_does_not_recognise() {
        assert_eq!(normalize_uae("12345"), None);
        assert_eq!(normalize_or_keep(" +44 20 7946 0958 "), "+44 20 7946 0958");
    }

    #[test]
    fn phone_sniffing_rejects_names() {
        assert!(looks_like_phone("+971 50 123 4567"));
        assert!(!looks_like_phone("John Smith"));
        assert!(!looks_like_phone("12-34"));
    }
}
