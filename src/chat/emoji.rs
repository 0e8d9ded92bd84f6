/// Emoji substitution — replaces a fixed set of ASCII tokens with their
/// Unicode equivalents in already-formatted display lines.

/// Token table, applied in this order. No token is a prefix of another and
/// no replacement contains a token, so substitution is idempotent.
const EMOJI_TABLE: [(&str, &str); 6] = [
    (":)", "😊"),
    (":(", "😞"),
    (":D", "😃"),
    (":P", "😛"),
    ("<3", "❤️"),
    (":O", "😮"),
];

/// Replace every non-overlapping occurrence of each table token.
pub fn substitute(input: &str) -> String {
    let mut out = input.to_owned();
    for (token, emoji) in EMOJI_TABLE {
        if out.contains(token) {
            out = out.replace(token, emoji);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replaces_every_token() {
        assert_eq!(substitute(":)"), "😊");
        assert_eq!(substitute(":("), "😞");
        assert_eq!(substitute(":D"), "😃");
        assert_eq!(substitute(":P"), "😛");
        assert_eq!(substitute("<3"), "❤️");
        assert_eq!(substitute(":O"), "😮");
    }

    #[test]
    fn replaces_multiple_occurrences() {
        assert_eq!(substitute("hi :) bye :)"), "hi 😊 bye 😊");
    }

    #[test]
    fn replaces_mixed_tokens_in_one_line() {
        assert_eq!(substitute("alice: hi :) <3"), "alice: hi 😊 ❤️");
    }

    #[test]
    fn is_case_sensitive() {
        assert_eq!(substitute(":o :d :p"), ":o :d :p");
    }

    #[test]
    fn leaves_plain_text_untouched() {
        assert_eq!(substitute("no tokens here"), "no tokens here");
    }

    #[test]
    fn is_idempotent_after_one_pass() {
        let once = substitute("bob: :D :( <3 plain");
        assert_eq!(substitute(&once), once);
    }

    #[test]
    fn is_deterministic_across_invocations() {
        let input = ":):(:D";
        assert_eq!(substitute(input), substitute(input));
    }
}
