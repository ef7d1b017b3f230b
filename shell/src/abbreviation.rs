use std::collections::HashMap;

use crate::env::ShellEnvironment;
use crate::escape;

/// Variables with this name prefix back the abbreviation store.
pub const ABBR_VAR_PREFIX: &str = "_fish_abbr_";

/// A change notification for an abbreviation-backing variable.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AbbrOp {
    Set,
    Erase,
}

/// The word-to-expansion abbreviation map. Created at shell start, torn
/// down at shell exit, and updated from variable-change notifications.
#[derive(Clone, Default)]
pub struct Abbreviations {
    entries: HashMap<String, String>,
}

impl Abbreviations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a `SET`/`ERASE` notification for `varname`. The abbreviated
    /// word is recovered by decoding the variable name's suffix.
    pub fn update(&mut self, op: AbbrOp, varname: &str, env: &ShellEnvironment) {
        let Some(encoded) = varname.strip_prefix(ABBR_VAR_PREFIX) else {
            return;
        };

        let Some(word) = escape::decode_var_name(encoded) else {
            tracing::warn!("abbreviation var '{varname}' is not correctly encoded, ignoring it");
            return;
        };

        self.entries.remove(&word);
        if matches!(op, AbbrOp::Set) {
            if let Some(expansion) = env.get_unless_empty(varname) {
                self.entries.insert(word, expansion.as_string());
            }
        }
    }

    pub fn expand_abbreviation(&self, word: &str) -> Option<&str> {
        if word.is_empty() {
            return None;
        }

        self.entries.get(word).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_then_erase() {
        let mut env = ShellEnvironment::new();
        env.set("_fish_abbr_gco", "git checkout");

        let mut abbrs = Abbreviations::new();
        abbrs.update(AbbrOp::Set, "_fish_abbr_gco", &env);
        assert_eq!(abbrs.expand_abbreviation("gco"), Some("git checkout"));
        assert_eq!(abbrs.expand_abbreviation("gc"), None);

        abbrs.update(AbbrOp::Erase, "_fish_abbr_gco", &env);
        assert_eq!(abbrs.expand_abbreviation("gco"), None);
    }

    #[test]
    fn test_encoded_names_round_trip() {
        let word = "g++";
        let varname = format!("{ABBR_VAR_PREFIX}{}", escape::encode_var_name(word));

        let mut env = ShellEnvironment::new();
        env.set(varname.clone(), "c++ --version");

        let mut abbrs = Abbreviations::new();
        abbrs.update(AbbrOp::Set, &varname, &env);
        assert_eq!(abbrs.expand_abbreviation("g++"), Some("c++ --version"));
    }

    #[test]
    fn test_set_with_missing_value_erases() {
        let mut env = ShellEnvironment::new();
        env.set("_fish_abbr_gco", "git checkout");

        let mut abbrs = Abbreviations::new();
        abbrs.update(AbbrOp::Set, "_fish_abbr_gco", &env);

        env.unset("_fish_abbr_gco");
        abbrs.update(AbbrOp::Set, "_fish_abbr_gco", &env);
        assert_eq!(abbrs.expand_abbreviation("gco"), None);
    }

    #[test]
    fn test_unrelated_and_malformed_vars_ignored() {
        let env = ShellEnvironment::new();
        let mut abbrs = Abbreviations::new();

        abbrs.update(AbbrOp::Set, "PATH", &env);
        abbrs.update(AbbrOp::Set, "_fish_abbr__ZZ", &env);
        assert_eq!(abbrs.expand_abbreviation(""), None);
    }
}
