use std::iter::Peekable;
use std::str::Chars;

use itertools::Itertools;

//
// Sentinel characters used in intermediate expansion strings. They live in
// a private-use block so they can never collide with legal input
// characters, and none of them may survive into a final expansion result.
//

/// Marks a leading tilde awaiting home-directory resolution.
pub const HOME_DIRECTORY: char = '\u{F500}';
/// Marks a leading `%` awaiting process/job expansion.
pub const PROCESS_EXPAND: char = '\u{F501}';
/// Marks an unquoted `$`.
pub const VARIABLE_EXPAND: char = '\u{F502}';
/// Marks a `$` that appeared inside double quotes (expands to one element).
pub const VARIABLE_EXPAND_SINGLE: char = '\u{F503}';
/// Placeholder recording that an expansion at this position produced an
/// empty value. Only used transiently while expanding variables.
pub const VARIABLE_EXPAND_EMPTY: char = '\u{F504}';
/// Soft boundary between adjacent subtokens, stripped before output.
pub const INTERNAL_SEPARATOR: char = '\u{F505}';
/// Encoded `{`.
pub const BRACE_BEGIN: char = '\u{F506}';
/// Encoded `}`.
pub const BRACE_END: char = '\u{F507}';
/// Encoded `,` between brace alternatives.
pub const BRACE_SEP: char = '\u{F508}';
/// Encoded `?`.
pub const ANY_CHAR: char = '\u{F509}';
/// Encoded `*`.
pub const ANY_STRING: char = '\u{F50A}';
/// Encoded `**`.
pub const ANY_STRING_RECURSIVE: char = '\u{F50B}';

/// All sentinels, in block order. Useful for leak assertions.
pub const EXPAND_SENTINELS: [char; 12] = [
    HOME_DIRECTORY,
    PROCESS_EXPAND,
    VARIABLE_EXPAND,
    VARIABLE_EXPAND_SINGLE,
    VARIABLE_EXPAND_EMPTY,
    INTERNAL_SEPARATOR,
    BRACE_BEGIN,
    BRACE_END,
    BRACE_SEP,
    ANY_CHAR,
    ANY_STRING,
    ANY_STRING_RECURSIVE,
];

pub fn is_expand_sentinel(c: char) -> bool {
    EXPAND_SENTINELS.contains(&c)
}

#[derive(Clone, Copy, Eq, PartialEq)]
enum QuoteMode {
    Unquoted,
    Single,
    Double,
}

/// Decode a raw argument word into sentinel form: escape sequences are
/// resolved, quotes are consumed, and expansion operators become sentinel
/// characters. Incomplete input (an unterminated quote, a trailing
/// backslash) is accepted, since the completion engine feeds us words the
/// user is still typing.
pub(crate) fn unescape_script(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut it = input.chars().peekable();
    let mut mode = QuoteMode::Unquoted;
    let mut brace_depth = 0usize;
    let mut pos = 0usize;

    while let Some(c) = it.next() {
        let at_start = pos == 0;
        pos += 1;

        match mode {
            QuoteMode::Unquoted => match c {
                '\\' => unescape_backslash(&mut it, &mut result),
                '\'' => mode = QuoteMode::Single,
                '"' => mode = QuoteMode::Double,
                '$' => result.push(VARIABLE_EXPAND),
                '*' => {
                    if it.peek() == Some(&'*') {
                        it.next();
                        pos += 1;
                        result.push(ANY_STRING_RECURSIVE);
                    } else {
                        result.push(ANY_STRING);
                    }
                }
                '?' => result.push(ANY_CHAR),
                '{' => {
                    brace_depth += 1;
                    result.push(BRACE_BEGIN);
                }
                '}' => {
                    brace_depth = brace_depth.saturating_sub(1);
                    result.push(BRACE_END);
                }
                ',' if brace_depth > 0 => result.push(BRACE_SEP),
                '~' if at_start => result.push(HOME_DIRECTORY),
                '%' if at_start => result.push(PROCESS_EXPAND),
                c => result.push(c),
            },
            QuoteMode::Single => match c {
                '\'' => mode = QuoteMode::Unquoted,
                '\\' => match it.peek().copied() {
                    Some(next @ ('\'' | '\\')) => {
                        it.next();
                        pos += 1;
                        result.push(next);
                    }
                    _ => result.push('\\'),
                },
                c => result.push(c),
            },
            QuoteMode::Double => match c {
                '"' => mode = QuoteMode::Unquoted,
                '$' => result.push(VARIABLE_EXPAND_SINGLE),
                '\\' => match it.peek().copied() {
                    Some(next @ ('"' | '$' | '\\')) => {
                        it.next();
                        pos += 1;
                        result.push(next);
                    }
                    _ => result.push('\\'),
                },
                c => result.push(c),
            },
        }
    }

    result
}

fn unescape_backslash(it: &mut Peekable<Chars<'_>>, result: &mut String) {
    let Some(next) = it.next() else {
        // A trailing backslash from an incomplete word; keep it.
        result.push('\\');
        return;
    };

    match next {
        'a' => result.push('\x07'),
        'b' => result.push('\x08'),
        'e' | 'E' => result.push('\x1b'),
        'f' => result.push('\x0c'),
        'n' => result.push('\n'),
        'r' => result.push('\r'),
        't' => result.push('\t'),
        'v' => result.push('\x0b'),
        'x' => {
            // Consume 1-2 valid hex chars.
            let mut taken_so_far = 0;
            let hex_chars: String = it
                .take_while_ref(|c| {
                    if taken_so_far < 2 && c.is_ascii_hexdigit() {
                        taken_so_far += 1;
                        true
                    } else {
                        false
                    }
                })
                .collect();

            if hex_chars.is_empty() {
                result.push('\\');
                result.push('x');
            } else if let Ok(value) = u8::from_str_radix(hex_chars.as_str(), 16) {
                if let Some(decoded) = char::from_u32(u32::from(value)) {
                    result.push(decoded);
                }
            }
        }
        'u' => {
            // Consume 1-4 valid hex chars.
            let mut taken_so_far = 0;
            let hex_chars: String = it
                .take_while_ref(|c| {
                    if taken_so_far < 4 && c.is_ascii_hexdigit() {
                        taken_so_far += 1;
                        true
                    } else {
                        false
                    }
                })
                .collect();

            if hex_chars.is_empty() {
                result.push('\\');
                result.push('u');
            } else if let Ok(value) = u16::from_str_radix(hex_chars.as_str(), 16) {
                if let Some(decoded) = char::from_u32(u32::from(value)) {
                    result.push(decoded);
                }
            }
        }
        // An escaped character is that character, stripped of its special
        // meaning.
        c => result.push(c),
    }
}

/// Characters given a backslash prefix by [`escape_script`]. The set covers
/// every character [`unescape_script`] treats specially in any position,
/// plus the comma so that substituted output cannot be split by an
/// enclosing brace expansion.
const SCRIPT_SPECIAL_CHARS: &str = "\\'\"$ *?~%#(){}[],;&|<>";

/// Escape a string so that [`unescape_script`] reproduces it exactly. Used
/// to embed command-substitution output lines into the word being expanded.
pub(crate) fn escape_script(s: &str) -> String {
    let mut result = String::with_capacity(s.len());

    for c in s.chars() {
        match c {
            '\x07' => result.push_str("\\a"),
            '\x08' => result.push_str("\\b"),
            '\x1b' => result.push_str("\\e"),
            '\x0c' => result.push_str("\\f"),
            '\n' => result.push_str("\\n"),
            '\r' => result.push_str("\\r"),
            '\t' => result.push_str("\\t"),
            '\x0b' => result.push_str("\\v"),
            c if SCRIPT_SPECIAL_CHARS.contains(c) => {
                result.push('\\');
                result.push(c);
            }
            c => result.push(c),
        }
    }

    result
}

//
// Variable-name encoding. Stored abbreviations live in shell variables, so
// arbitrary words have to be smuggled into the identifier alphabet: ASCII
// alphanumerics pass through, `_` doubles, anything else becomes `_HH…_`
// with the uppercase hex of the code point.
//

pub fn encode_var_name(name: &str) -> String {
    let mut result = String::with_capacity(name.len());

    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            result.push(c);
        } else if c == '_' {
            result.push_str("__");
        } else {
            result.push_str(&format!("_{:02X}_", u32::from(c)));
        }
    }

    result
}

pub fn decode_var_name(encoded: &str) -> Option<String> {
    let mut result = String::with_capacity(encoded.len());
    let mut it = encoded.chars().peekable();

    while let Some(c) = it.next() {
        if c != '_' {
            result.push(c);
            continue;
        }

        if it.peek() == Some(&'_') {
            it.next();
            result.push('_');
            continue;
        }

        let hex: String = it.take_while_ref(|c| c.is_ascii_hexdigit()).collect();
        if hex.is_empty() || it.next() != Some('_') {
            return None;
        }

        let value = u32::from_str_radix(hex.as_str(), 16).ok()?;
        result.push(char::from_u32(value)?);
    }

    Some(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unescape_produces_sentinels() {
        assert_eq!(
            unescape_script("$a"),
            format!("{VARIABLE_EXPAND}a"),
        );
        assert_eq!(unescape_script("a*b"), format!("a{ANY_STRING}b"));
        assert_eq!(unescape_script("a**"), format!("a{ANY_STRING_RECURSIVE}"));
        assert_eq!(unescape_script("a?"), format!("a{ANY_CHAR}"));
        assert_eq!(unescape_script("~x"), format!("{HOME_DIRECTORY}x"));
        assert_eq!(unescape_script("%1"), format!("{PROCESS_EXPAND}1"));
    }

    #[test]
    fn test_tilde_and_percent_only_special_at_start() {
        assert_eq!(unescape_script("a~b"), "a~b");
        assert_eq!(unescape_script("a%b"), "a%b");
    }

    #[test]
    fn test_comma_encodes_only_inside_braces() {
        assert_eq!(unescape_script("a,b"), "a,b");
        assert_eq!(
            unescape_script("{a,b}"),
            format!("{BRACE_BEGIN}a{BRACE_SEP}b{BRACE_END}"),
        );
        assert_eq!(unescape_script("{a}c,d"), format!("{BRACE_BEGIN}a{BRACE_END}c,d"));
    }

    #[test]
    fn test_quoting() {
        // Single quotes suppress everything except \' and \\.
        assert_eq!(unescape_script(r"'$a *'"), "$a *");
        assert_eq!(unescape_script(r"'don\'t'"), "don't");

        // Double quotes keep wildcards and braces literal but mark dollars.
        assert_eq!(
            unescape_script(r#""$a *{}""#),
            format!("{VARIABLE_EXPAND_SINGLE}a *{{}}"),
        );
        assert_eq!(unescape_script(r#""a\$b""#), "a$b");
    }

    #[test]
    fn test_incomplete_input_is_tolerated() {
        assert_eq!(unescape_script(r#""half"#), "half");
        assert_eq!(unescape_script("trail\\"), "trail\\");
    }

    #[test]
    fn test_backslash_sequences() {
        assert_eq!(unescape_script(r"a\nb"), "a\nb");
        assert_eq!(unescape_script(r"\x41"), "A");
        assert_eq!(unescape_script(r"\u0041"), "A");
        assert_eq!(unescape_script(r"\$"), "$");
        assert_eq!(unescape_script(r"\*"), "*");
        assert_eq!(unescape_script(r"\~user"), "~user");
    }

    #[test]
    fn test_escape_round_trips_through_unescape() {
        for s in [
            "plain",
            "with space",
            "a$b*c?d",
            "~home %proc",
            "{braces,commas}",
            "half'quote\"s",
            "tabs\tand\nnewlines",
            "(parens) [brackets]",
        ] {
            assert_eq!(unescape_script(&escape_script(s)), s, "round-trip of {s:?}");
        }
    }

    #[test]
    fn test_var_name_codec() {
        assert_eq!(encode_var_name("gco"), "gco");
        assert_eq!(encode_var_name("g_c"), "g__c");
        assert_eq!(encode_var_name("g++"), "g_2B__2B_");

        for name in ["gco", "g_c", "g++", "a b", "..."] {
            assert_eq!(
                decode_var_name(&encode_var_name(name)).as_deref(),
                Some(name),
                "round-trip of {name:?}",
            );
        }

        assert_eq!(decode_var_name("_ZZ"), None);
        assert_eq!(decode_var_name("_2B"), None);
    }
}
