/// Match a topic against a subscription pattern
///
/// `*` matches any run of characters (including none and including `.`, so a
/// trailing `*` spans segments); `?` matches exactly one character.
pub fn is_matching(topic: &str, pattern: &str) -> bool {
    let topic = topic.as_bytes();
    let pattern = pattern.as_bytes();

    // table[j] == pattern[..j] matches topic[..i] for the current row i
    let mut table = vec![false; pattern.len() + 1];
    table[0] = true;
    for j in 1..=pattern.len() {
        table[j] = table[j - 1] && pattern[j - 1] == b'*';
    }

    for &tc in topic {
        let mut prev_diag = table[0];
        table[0] = false;
        for j in 1..=pattern.len() {
            let above = table[j];
            table[j] = match pattern[j - 1] {
                b'*' => table[j - 1] || above,
                b'?' => prev_diag,
                pc => prev_diag && pc == tc,
            };
            prev_diag = above;
        }
    }

    table[pattern.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_and_wildcards() {
        assert!(is_matching("data.quotes.SIM.BTCUSDT", "data.quotes.SIM.BTCUSDT"));
        assert!(is_matching("data.quotes.SIM.BTCUSDT", "data.quotes.*"));
        assert!(is_matching("data.quotes.SIM.BTCUSDT", "data.*.SIM.*"));
        assert!(is_matching("data.quotes.SIM.BTCUSDT", "*"));
        assert!(is_matching("events.order.S-001", "events.order.S-00?"));
        assert!(!is_matching("events.order.S-001", "events.order.S-0?"));
        assert!(!is_matching("data.trades.SIM.BTCUSDT", "data.quotes.*"));
        assert!(!is_matching("data.quotes", "data.quotes.*"));
    }

    #[test]
    fn test_empty_cases() {
        assert!(is_matching("", ""));
        assert!(is_matching("", "*"));
        assert!(!is_matching("", "?"));
        assert!(!is_matching("a", ""));
    }

    #[test]
    fn test_star_matches_empty_run() {
        assert!(is_matching("data.quotes.", "data.quotes.*"));
        assert!(is_matching("abc", "a*b*c"));
        assert!(!is_matching("abcd", "a*b*c"));
    }
}
