/// Hard failures surfaced by the expansion engine. Softer, positional
/// diagnostics are accumulated separately as [`ParseError`] records.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("mismatched parenthesis")]
    MismatchedParenthesis,

    #[error("mismatched braces")]
    MismatchedBraces,

    #[error("invalid index value")]
    InvalidSliceIndex,

    #[error("expected a variable name after this $")]
    MissingVariableName,

    #[error("command substitutions not allowed")]
    CmdSubstitutionNotAllowed,

    #[error("error while evaluating command substitution")]
    CmdSubstitutionFailed,

    #[error("too much data emitted by command substitution")]
    CmdSubstitutionOverflow,

    #[error("could not expand process specifier '{0}'")]
    FailedProcessExpansion(String),

    #[error("expansion was cancelled")]
    Cancelled,

    #[error("{0}")]
    Unknown(#[from] anyhow::Error),

    #[error("{0}")]
    IoError(#[from] std::io::Error),
}

/// Classification of an accumulated expansion diagnostic.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ParseErrorKind {
    Syntax,
    CommandSubstitution,
    Wildcard,
}

/// A positional diagnostic produced while expanding a word. The offset
/// indexes into the original raw input where known, or is
/// [`SOURCE_LOCATION_UNKNOWN`].
#[derive(Clone, Debug)]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub source_offset: usize,
    pub text: String,
}

pub type ParseErrorList = Vec<ParseError>;

pub const SOURCE_LOCATION_UNKNOWN: usize = usize::MAX;

pub(crate) fn append_syntax_error<S: Into<String>>(
    errors: &mut ParseErrorList,
    source_offset: usize,
    text: S,
) {
    errors.push(ParseError {
        kind: ParseErrorKind::Syntax,
        source_offset,
        text: text.into(),
    });
}

/// Append a command-substitution error, unless one with the same text has
/// already been recorded. Command substitution is a recursive process, and
/// the same failure could otherwise be reported once per level.
pub(crate) fn append_cmdsub_error<S: Into<String>>(
    errors: &mut ParseErrorList,
    source_offset: usize,
    text: S,
) {
    let text = text.into();
    if errors.iter().any(|e| e.text == text) {
        return;
    }

    errors.push(ParseError {
        kind: ParseErrorKind::CommandSubstitution,
        source_offset,
        text,
    });
}

pub(crate) fn append_wildcard_error<S: Into<String>>(
    errors: &mut ParseErrorList,
    source_offset: usize,
    text: S,
) {
    errors.push(ParseError {
        kind: ParseErrorKind::Wildcard,
        source_offset,
        text: text.into(),
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cmdsub_errors_dedupe_by_text() {
        let mut errors = ParseErrorList::new();

        append_cmdsub_error(&mut errors, 0, "boom");
        append_cmdsub_error(&mut errors, 7, "boom");
        append_cmdsub_error(&mut errors, 0, "other");

        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].text, "boom");
        assert_eq!(errors[1].text, "other");
    }

    #[test]
    fn test_syntax_errors_accumulate_in_order() {
        let mut errors = ParseErrorList::new();

        append_syntax_error(&mut errors, 3, "first");
        append_syntax_error(&mut errors, 1, "second");

        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].source_offset, 3);
        assert_eq!(errors[1].source_offset, 1);
    }
}
