use std::collections::HashMap;

use crate::variables::ShellValue;

/// Variables that are always surfaced as colon-split lists, for
/// consistency with how POSIX shells consume them.
const COLON_DELIMITED_VARS: [&str; 3] = ["PATH", "CDPATH", "MANPATH"];

/// The variable store the expansion engine reads from. Expansion itself
/// never writes; mutation is for the embedding shell (and tests).
#[derive(Clone, Default)]
pub struct ShellEnvironment {
    vars: HashMap<String, ShellValue>,
}

impl ShellEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get<S: AsRef<str>>(&self, name: S) -> Option<&ShellValue> {
        self.vars.get(name.as_ref())
    }

    /// Look up a variable, treating a set-but-empty value as missing.
    pub fn get_unless_empty<S: AsRef<str>>(&self, name: S) -> Option<&ShellValue> {
        self.get(name).filter(|value| !value.is_empty())
    }

    pub fn get_str<S: AsRef<str>>(&self, name: S) -> Option<String> {
        self.get(name).map(ShellValue::as_string)
    }

    pub fn is_set<S: AsRef<str>>(&self, name: S) -> bool {
        self.vars.contains_key(name.as_ref())
    }

    pub fn set<S: Into<String>, V: Into<ShellValue>>(&mut self, name: S, value: V) {
        let name = name.into();
        let mut value = value.into();

        // PATH-like variables come in as colon-delimited strings but are
        // consumed element-wise.
        if let ShellValue::String(s) = &value {
            if COLON_DELIMITED_VARS.contains(&name.as_str()) {
                value = ShellValue::colon_delimited(s);
            }
        }

        self.vars.insert(name, value);
    }

    pub fn unset<S: AsRef<str>>(&mut self, name: S) {
        self.vars.remove(name.as_ref());
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ShellValue)> {
        self.vars.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_set_unset() {
        let mut env = ShellEnvironment::new();
        assert!(env.get("a").is_none());

        env.set("a", "x");
        assert_eq!(env.get_str("a").as_deref(), Some("x"));
        assert!(env.is_set("a"));

        env.unset("a");
        assert!(!env.is_set("a"));
    }

    #[test]
    fn test_path_vars_are_split_on_colons() {
        let mut env = ShellEnvironment::new();
        env.set("PATH", "/bin:/usr/bin");
        env.set("OTHER", "/bin:/usr/bin");

        assert_eq!(
            env.get("PATH").unwrap().to_list(),
            vec!["/bin".to_owned(), "/usr/bin".to_owned()],
        );
        assert_eq!(env.get("OTHER").unwrap().to_list(), vec!["/bin:/usr/bin"]);
    }

    #[test]
    fn test_get_unless_empty() {
        let mut env = ShellEnvironment::new();
        env.set("empty", "");
        env.set("list", Vec::<String>::new());
        env.set("full", "x");

        assert!(env.get_unless_empty("empty").is_none());
        assert!(env.get_unless_empty("list").is_none());
        assert!(env.get_unless_empty("full").is_some());
    }
}
