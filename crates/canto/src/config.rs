use serde::Deserialize;

/// Evaluation options for a [`Context`](crate::Context).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Options {
    /// Maximum number of frames on one context stack.
    pub max_depth: usize,
    /// Trailing marker on a cache name that asks for retention beyond the
    /// current evaluation.
    pub retain_marker: char,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            max_depth: 256,
            retain_marker: '!',
        }
    }
}

impl Options {
    /// Splits the retention marker off `name`.
    pub fn strip_retain_marker<'a>(&self, name: &'a str) -> (&'a str, bool) {
        match name.strip_suffix(self.retain_marker) {
            Some(stripped) => (stripped, true),
            None => (name, false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_keeps_defaults() {
        let options: Options = serde_json::from_str(r#"{ "max_depth": 12 }"#).unwrap();
        assert_eq!(options.max_depth, 12);
        assert_eq!(options.retain_marker, '!');
    }

    #[test]
    fn test_strip_retain_marker() {
        let options = Options::default();
        assert_eq!(options.strip_retain_marker("user!"), ("user", true));
        assert_eq!(options.strip_retain_marker("user"), ("user", false));
    }
}
