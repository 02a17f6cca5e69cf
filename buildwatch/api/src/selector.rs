use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

const MAX_NAME: usize = 63;
const MAX_PREFIX: usize = 253;

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum SelectorError {
    #[error("invalid label key '{0}'")]
    InvalidKey(String),
    #[error("invalid value '{value}' for label '{key}'")]
    InvalidValue { key: String, value: String },
}

/// Exact-match label selector, all entries must match.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Selector(BTreeMap<String, String>);

impl Selector {
    pub fn new<I, K, V>(labels: I) -> Result<Self, SelectorError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        labels
            .into_iter()
            .try_fold(Self::default(), |selector, (key, value)| selector.with(key, value))
    }

    /// Add an entry, replacing an existing one for the same key.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Result<Self, SelectorError> {
        let key = key.into();
        let value = value.into();

        if !valid_key(&key) {
            return Err(SelectorError::InvalidKey(key));
        }
        if !valid_value(&value) {
            return Err(SelectorError::InvalidValue { key, value });
        }

        self.0.insert(key, value);
        Ok(self)
    }

    /// Add an entry only when a value is present.
    pub fn with_optional(
        self,
        key: impl Into<String>,
        value: Option<impl Into<String>>,
    ) -> Result<Self, SelectorError> {
        match value {
            Some(value) => self.with(key, value),
            None => Ok(self),
        }
    }

    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        self.0
            .iter()
            .all(|(key, value)| labels.get(key).is_some_and(|actual| actual == value))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl Display for Selector {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for (i, (key, value)) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{key}={value}")?;
        }
        Ok(())
    }
}

fn valid_name(name: &str) -> bool {
    let bytes = name.as_bytes();
    match (bytes.first(), bytes.last()) {
        (Some(first), Some(last)) => {
            name.len() <= MAX_NAME
                && first.is_ascii_alphanumeric()
                && last.is_ascii_alphanumeric()
                && bytes
                    .iter()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, b'-' | b'_' | b'.'))
        }
        _ => false,
    }
}

fn valid_prefix(prefix: &str) -> bool {
    prefix.len() <= MAX_PREFIX
        && prefix.split('.').all(|part| {
            let bytes = part.as_bytes();
            !part.is_empty()
                && part.len() <= MAX_NAME
                && bytes[0].is_ascii_alphanumeric()
                && bytes[bytes.len() - 1].is_ascii_alphanumeric()
                && bytes
                    .iter()
                    .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == b'-')
        })
}

fn valid_key(key: &str) -> bool {
    match key.split_once('/') {
        Some((prefix, name)) => valid_prefix(prefix) && valid_name(name),
        None => valid_name(key),
    }
}

fn valid_value(value: &str) -> bool {
    value.is_empty() || valid_name(value)
}
