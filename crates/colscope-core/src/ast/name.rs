use serde::Serialize;
use std::fmt;

/// A single SQL identifier as written.
///
/// Undelimited identifiers compare case-insensitively; delimited ones keep
/// their exact spelling in [`Identifier::canonical`].
#[derive(Debug, Clone, Eq, Serialize)]
pub struct Identifier {
    pub value: String,
    pub delimited: bool,
}

impl Identifier {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            delimited: false,
        }
    }

    pub fn delimited(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            delimited: true,
        }
    }

    /// Lower-cased unless the identifier was quoted.
    pub fn canonical(&self) -> String {
        if self.delimited {
            self.value.clone()
        } else {
            self.value.to_lowercase()
        }
    }

    /// Case-insensitive match, used for column and relation resolution.
    pub fn matches(&self, name: &str) -> bool {
        self.value.to_lowercase() == name.to_lowercase()
    }
}

impl PartialEq for Identifier {
    fn eq(&self, other: &Self) -> bool {
        self.canonical() == other.canonical()
    }
}

impl std::hash::Hash for Identifier {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.canonical().hash(state);
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.delimited {
            write!(f, "\"{}\"", self.value.replace('"', "\"\""))
        } else {
            f.write_str(&self.value)
        }
    }
}

impl From<&str> for Identifier {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// A dotted name such as `catalog.schema.table` or `t.col`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct QualifiedName {
    parts: Vec<Identifier>,
}

impl QualifiedName {
    /// Builds a name from its parts. An empty part list is a programming error.
    pub fn new(parts: Vec<Identifier>) -> Self {
        assert!(!parts.is_empty(), "qualified name needs at least one part");
        Self { parts }
    }

    pub fn single(part: Identifier) -> Self {
        Self { parts: vec![part] }
    }

    /// Splits on `.`; no quoting support, intended for tests and metadata keys.
    pub fn parse(dotted: &str) -> Self {
        Self::new(dotted.split('.').map(Identifier::new).collect())
    }

    pub fn parts(&self) -> &[Identifier] {
        &self.parts
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    pub fn first(&self) -> &Identifier {
        &self.parts[0]
    }

    /// The last part.
    pub fn suffix(&self) -> &Identifier {
        &self.parts[self.parts.len() - 1]
    }

    /// Everything but the last part.
    pub fn prefix(&self) -> Option<QualifiedName> {
        if self.parts.len() > 1 {
            Some(Self {
                parts: self.parts[..self.parts.len() - 1].to_vec(),
            })
        } else {
            None
        }
    }

    /// Case-insensitive suffix test: `s.t` has suffix `t` and `s.t`, not `x.t`.
    pub fn has_suffix(&self, suffix: &QualifiedName) -> bool {
        if suffix.parts.len() > self.parts.len() {
            return false;
        }
        let offset = self.parts.len() - suffix.parts.len();
        self.parts[offset..]
            .iter()
            .zip(&suffix.parts)
            .all(|(mine, theirs)| mine.matches(&theirs.value))
    }

    pub fn canonical(&self) -> String {
        self.parts
            .iter()
            .map(Identifier::canonical)
            .collect::<Vec<_>>()
            .join(".")
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, part) in self.parts.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{part}")?;
        }
        Ok(())
    }
}

impl From<Identifier> for QualifiedName {
    fn from(value: Identifier) -> Self {
        Self::single(value)
    }
}
