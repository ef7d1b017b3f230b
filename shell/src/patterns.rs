use std::path::{Path, PathBuf};

use tokio_util::sync::CancellationToken;

use crate::completion::{CompleteFlags, Completion};
use crate::escape::{ANY_CHAR, ANY_STRING, ANY_STRING_RECURSIVE};
use crate::expansion::ExpandFlags;

/// Outcome of one wildcard search rooted at a working directory.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum WildcardResult {
    Match,
    NoMatch,
    Cancelled,
}

/// The engine's seam to the filesystem. `pattern` is in sentinel form
/// (encoded `?`, `*`, `**`); candidates are appended to `out` relative to
/// `working_dir` (or absolute, for absolute patterns).
pub trait WildcardMatcher: Send + Sync {
    fn expand(
        &self,
        pattern: &str,
        working_dir: &Path,
        flags: ExpandFlags,
        out: &mut Vec<Completion>,
    ) -> WildcardResult;
}

pub(crate) fn wildcard_has(s: &str) -> bool {
    s.chars()
        .any(|c| matches!(c, ANY_CHAR | ANY_STRING | ANY_STRING_RECURSIVE))
}

/// The default matcher: walks real directories component by component,
/// pruning as it goes, with `**` switching to a full recursive descent.
#[derive(Default)]
pub struct FsWildcardMatcher {
    cancel: Option<CancellationToken>,
}

impl FsWildcardMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cancellation(cancel: CancellationToken) -> Self {
        Self {
            cancel: Some(cancel),
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancellationToken::is_cancelled)
    }

    fn walk(
        &self,
        dir: &Path,
        prefix: &str,
        components: &[String],
        out: &mut Vec<String>,
    ) -> Result<(), WildcardResult> {
        if self.is_cancelled() {
            return Err(WildcardResult::Cancelled);
        }

        let Some((component, rest)) = components.split_first() else {
            return Ok(());
        };

        if component.contains(ANY_STRING_RECURSIVE) {
            // The rest of the pattern may match at any depth below here;
            // switch to a single regex over the remaining relative path.
            let Some(regex) = compile_wildcard(&components.join("/"), true) else {
                return Ok(());
            };
            return self.walk_recursive(dir, "", &regex, prefix, out);
        }

        if !wildcard_has(component) && !component.contains('[') {
            let path = dir.join(component);
            if rest.is_empty() {
                if path.symlink_metadata().is_ok() {
                    out.push(format!("{prefix}{component}"));
                }
            } else if path.is_dir() {
                return self.walk(&path, &format!("{prefix}{component}/"), rest, out);
            }
            return Ok(());
        }

        let Some(regex) = compile_wildcard(component, false) else {
            return Ok(());
        };

        for name in read_dir_sorted(dir) {
            // A wildcard never matches a leading dot unless the pattern
            // component spells one out.
            if name.starts_with('.') && !component.starts_with('.') {
                continue;
            }
            if !regex.is_match(&name).unwrap_or(false) {
                continue;
            }

            if rest.is_empty() {
                out.push(format!("{prefix}{name}"));
            } else {
                let path = dir.join(&name);
                if path.is_dir() {
                    self.walk(&path, &format!("{prefix}{name}/"), rest, out)?;
                }
            }
        }

        Ok(())
    }

    fn walk_recursive(
        &self,
        dir: &Path,
        rel: &str,
        regex: &fancy_regex::Regex,
        prefix: &str,
        out: &mut Vec<String>,
    ) -> Result<(), WildcardResult> {
        if self.is_cancelled() {
            return Err(WildcardResult::Cancelled);
        }

        for name in read_dir_sorted(dir) {
            if name.starts_with('.') {
                continue;
            }

            let entry_rel = if rel.is_empty() {
                name.clone()
            } else {
                format!("{rel}/{name}")
            };

            if regex.is_match(&entry_rel).unwrap_or(false) {
                out.push(format!("{prefix}{entry_rel}"));
            }

            let path = dir.join(&name);
            if path.is_dir() {
                self.walk_recursive(&path, &entry_rel, regex, prefix, out)?;
            }
        }

        Ok(())
    }
}

impl WildcardMatcher for FsWildcardMatcher {
    fn expand(
        &self,
        pattern: &str,
        working_dir: &Path,
        flags: ExpandFlags,
        out: &mut Vec<Completion>,
    ) -> WildcardResult {
        if pattern.is_empty() {
            return WildcardResult::NoMatch;
        }

        let is_absolute = pattern.starts_with('/');
        let components: Vec<String> = pattern
            .split('/')
            .filter(|c| !c.is_empty())
            .map(|c| c.to_owned())
            .collect();
        if components.is_empty() {
            return WildcardResult::NoMatch;
        }

        let root = if is_absolute {
            PathBuf::from("/")
        } else {
            working_dir.to_path_buf()
        };
        let prefix = if is_absolute { "/" } else { "" };

        let mut matched = vec![];
        if self.walk(&root, prefix, &components, &mut matched).is_err() {
            return WildcardResult::Cancelled;
        }

        if matched.is_empty() {
            return WildcardResult::NoMatch;
        }

        let comp_flags = if flags.contains(ExpandFlags::FOR_COMPLETIONS) {
            CompleteFlags::REPLACES_TOKEN
        } else {
            CompleteFlags::empty()
        };
        for m in matched {
            out.push(Completion::new(m, None, comp_flags));
        }

        WildcardResult::Match
    }
}

fn read_dir_sorted(dir: &Path) -> Vec<String> {
    let Ok(entries) = dir.read_dir() else {
        return vec![];
    };

    let mut names: Vec<String> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

fn compile_wildcard(pattern: &str, crossing_dirs: bool) -> Option<fancy_regex::Regex> {
    let regex_str = wildcard_to_regex_str(pattern, crossing_dirs);
    match fancy_regex::Regex::new(regex_str.as_str()) {
        Ok(regex) => Some(regex),
        Err(err) => {
            tracing::warn!("invalid wildcard pattern: {err}");
            None
        }
    }
}

fn wildcard_to_regex_str(pattern: &str, crossing_dirs: bool) -> String {
    let chars: Vec<char> = pattern.chars().collect();
    let mut regex_str = String::from("^");

    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            ANY_CHAR => regex_str.push_str(if crossing_dirs { "[^/]" } else { "." }),
            ANY_STRING => regex_str.push_str(if crossing_dirs { "[^/]*" } else { ".*" }),
            ANY_STRING_RECURSIVE => {
                if crossing_dirs && chars.get(i + 1) == Some(&'/') {
                    // `**/` also matches zero directory levels.
                    regex_str.push_str("(?:.*/)?");
                    i += 1;
                } else {
                    regex_str.push_str(".*");
                }
            }
            '[' => {
                let class_end = chars[i + 1..]
                    .iter()
                    .position(|&c| c == ']')
                    .map(|p| p + i + 1);
                match class_end {
                    Some(end) if end > i + 1 => {
                        regex_str.push('[');
                        let mut j = i + 1;
                        if chars[j] == '!' {
                            regex_str.push('^');
                            j += 1;
                        }
                        while j < end {
                            if chars[j] == '\\' {
                                regex_str.push('\\');
                            }
                            regex_str.push(chars[j]);
                            j += 1;
                        }
                        regex_str.push(']');
                        i = end;
                    }
                    _ => regex_str.push_str("\\["),
                }
            }
            c if "\\^$.|?*+()]{}".contains(c) => {
                regex_str.push('\\');
                regex_str.push(c);
            }
            c => regex_str.push(c),
        }
        i += 1;
    }

    regex_str.push('$');
    regex_str
}
