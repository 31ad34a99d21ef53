//! Snapshot of the process environment.
//!
//! Taken once at the entry point and passed down explicitly, so nothing in
//! the core reads ambient process state.

use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvSnapshot {
    vars: BTreeMap<String, String>,
}

impl EnvSnapshot {
    pub fn from_process() -> Self {
        Self {
            vars: std::env::vars().collect(),
        }
    }

    /// Value of `name`, treating empty values as unset.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars
            .get(name)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }
}

impl<K, V> FromIterator<(K, V)> for EnvSnapshot
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            vars: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_value_is_unset() {
        let env = EnvSnapshot::from_iter([("OPENAI_API_KEY", ""), ("ANTHROPIC_API_KEY", "sk")]);
        assert!(!env.contains("OPENAI_API_KEY"));
        assert_eq!(env.get("ANTHROPIC_API_KEY"), Some("sk"));
        assert_eq!(env.get("MISSING"), None);
    }
}
