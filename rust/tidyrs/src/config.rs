//! Option settings collected on the Rust side
//!
//! A [`Config`] is an ordered list of `(name, value)` settings built in code.
//! Nothing is validated here; names and values are handed to libtidy one by
//! one when the config is applied to a [`crate::Document`]. Config files are
//! read by libtidy itself through [`crate::Document::load_config`].

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Config {
    entries: Vec<(String, String)>,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a setting. Later settings override earlier ones when applied.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.entries.push((name.into(), value.into()));
        self
    }

    /// Last value set for `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .rev()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<N: Into<String>, V: Into<String>> FromIterator<(N, V)> for Config {
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        let mut config = Config::new();
        for (name, value) in iter {
            config.set(name, value);
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_overrides() {
        let mut config = Config::new();
        config.set("wrap", "80").set("wrap", "0");
        assert_eq!(config.get("wrap"), Some("0"));
        assert_eq!(config.iter().count(), 2);
        assert_eq!(config.get("indent"), None);
    }

    #[test]
    fn test_collect() {
        let config: Config = [("indent", "auto"), ("tidy-mark", "no")].into_iter().collect();
        assert_eq!(config.len(), 2);
        assert_eq!(config.get("tidy-mark"), Some("no"));
        let names: Vec<_> = config.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["indent", "tidy-mark"]);
        assert!(Config::new().is_empty());
    }
}
