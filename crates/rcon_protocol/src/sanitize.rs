//! Cleanup of console output before it is shown in chat.

use once_cell::sync::Lazy;
use regex::Regex;
use std::borrow::Cow;

/// ESC followed by a two-character escape or a full CSI sequence.
static ANSI_ESCAPE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\x1B(?:[@-Z\\-_\-]|\[[0-?]*[ -/]*[@-~])").expect("ANSI escape pattern is valid")
});

/// Minecraft `§` colour and style codes.
static SECTION_CODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"§[0-9A-FK-ORXa-fk-orx]").expect("formatting code pattern is valid"));

/// Removes every ANSI/VT100 escape sequence from `text`.
///
/// Removal is repeated until nothing matches, because deleting one sequence
/// can join an orphaned ESC with the bytes that followed it. That makes the
/// function idempotent. Text without escapes is returned unchanged.
pub fn sanitize(text: &str) -> String {
    strip_all(&ANSI_ESCAPE, text)
}

/// Removes Minecraft `§x` formatting codes.
pub fn strip_formatting_codes(text: &str) -> String {
    strip_all(&SECTION_CODE, text)
}

fn strip_all(pattern: &Regex, text: &str) -> String {
    let mut cleaned = match pattern.replace_all(text, "") {
        Cow::Borrowed(untouched) => return untouched.to_string(),
        Cow::Owned(changed) => changed,
    };

    while pattern.is_match(&cleaned) {
        cleaned = pattern.replace_all(&cleaned, "").into_owned();
    }

    cleaned
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_plain_text_unchanged() {
        let text = "There are 2 of a max of 20 players online: Steve, Alex";
        assert_eq!(sanitize(text), text);
        assert_eq!(sanitize(""), "");
    }

    #[test]
    fn test_strips_csi_colour_sequences() {
        let raw = "\x1B[0;31mError:\x1B[0m player not found";
        assert_eq!(sanitize(raw), "Error: player not found");
    }

    #[test]
    fn test_strips_csi_with_intermediate_bytes() {
        assert_eq!(sanitize("a\x1B[1 qb"), "ab");
        assert_eq!(sanitize("a\x1B[?25hb"), "ab");
    }

    #[test]
    fn test_strips_two_character_escapes() {
        assert_eq!(sanitize("x\x1B@y"), "xy");
        assert_eq!(sanitize("x\x1BMy"), "xy");
        assert_eq!(sanitize("x\x1B\\y"), "xy");
        assert_eq!(sanitize("x\x1B^y"), "xy");
        assert_eq!(sanitize("x\x1B_y"), "xy");
        assert_eq!(sanitize("x\x1B-y"), "xy");
    }

    #[test]
    fn test_lone_escape_is_kept() {
        assert_eq!(sanitize("end\x1B"), "end\x1B");
        assert_eq!(sanitize("\x1Ba"), "\x1Ba");
    }

    #[test]
    fn test_idempotent_when_removal_exposes_new_sequence() {
        let raw = "\x1B\x1B@[31mred";
        let once = sanitize(raw);
        assert_eq!(once, "red");
        assert_eq!(sanitize(&once), once);
    }

    #[test]
    fn test_idempotent_on_mixed_inputs() {
        let inputs = [
            "plain",
            "\x1B[32mgreen\x1B[0m",
            "\x1B\x1B\x1B[m[m",
            "multi\nline\x1B[K\r\n",
            "unicode é ✓ \x1B[1mbold",
        ];
        for input in inputs {
            let once = sanitize(input);
            assert_eq!(sanitize(&once), once, "not idempotent for {:?}", input);
            assert!(!once.contains("\x1B["), "left CSI in {:?}", once);
        }
    }

    #[test]
    fn test_strip_formatting_codes() {
        assert_eq!(strip_formatting_codes("§aGreen §lbold§r text"), "Green bold text");
        assert_eq!(strip_formatting_codes("no codes"), "no codes");
    }

    fn escape_heavy() -> impl Strategy<Value = String> {
        prop::collection::vec(
            prop::sample::select(vec![
                '\x1B', '[', ']', '?', ';', '0', '3', '1', 'm', 'K', '@', 'Z', '\\', '^', '_',
                '-', ' ', '~', 'a', 'é', '§',
            ]),
            0..64,
        )
        .prop_map(|chars| chars.into_iter().collect())
    }

    proptest! {
        #[test]
        fn sanitize_is_idempotent(text in any::<String>()) {
            let once = sanitize(&text);
            prop_assert_eq!(sanitize(&once), once);
        }

        #[test]
        fn sanitize_is_idempotent_on_escape_heavy_text(text in escape_heavy()) {
            let once = sanitize(&text);
            prop_assert_eq!(sanitize(&once), once.clone());
            prop_assert!(!ANSI_ESCAPE.is_match(&once));
        }

        #[test]
        fn text_without_escapes_is_unchanged(text in "[ -~\n\t\u{e9}\u{2713}]{0,80}") {
            prop_assert_eq!(sanitize(&text), text);
        }
    }
}
