use symbol_table::GlobalSymbol;

/// Represents an identifier in the IR. Identifiers are interned in a global,
/// thread-safe symbol table so they are cheap to copy, hash and compare.
#[derive(Clone, Copy, Eq, Hash, PartialOrd, Ord)]
pub struct Id {
    id: GlobalSymbol,
}

impl Id {
    pub fn new<S: AsRef<str>>(id: S) -> Self {
        Self {
            id: GlobalSymbol::from(id.as_ref()),
        }
    }

    pub fn as_str(&self) -> &'static str {
        self.id.as_str()
    }

    /// True if the identifier is a valid identifier in most schema and
    /// hardware description languages: a letter followed by letters, digits or
    /// underscores.
    pub fn is_plain_identifier(&self) -> bool {
        let mut chars = self.as_str().chars();
        match chars.next() {
            Some(c) if c.is_ascii_alphabetic() => {
                chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
            }
            _ => false,
        }
    }
}

/* =================== Impls for Id to make them easier to use ============== */

impl Default for Id {
    fn default() -> Self {
        Id::new("")
    }
}

impl std::fmt::Debug for Id {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(self.as_str(), f)
    }
}

impl std::fmt::Display for Id {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl AsRef<str> for Id {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl From<&str> for Id {
    fn from(s: &str) -> Self {
        Id::new(s)
    }
}

impl From<String> for Id {
    fn from(s: String) -> Self {
        Id::new(s)
    }
}

impl From<&String> for Id {
    fn from(s: &String) -> Self {
        Id::new(s)
    }
}

impl PartialEq<str> for Id {
    fn eq(&self, other: &str) -> bool {
        self.as_str() == other
    }
}

impl<S: AsRef<str>> PartialEq<S> for Id {
    fn eq(&self, other: &S) -> bool {
        self.as_str() == other.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::Id;

    #[test]
    fn interned_ids_compare_by_content() {
        let a = Id::new("encodeUi8");
        let b = Id::from("encode".to_string() + "Ui8");
        assert_eq!(a, b);
        assert_eq!(a, "encodeUi8");
    }

    #[test]
    fn plain_identifiers() {
        assert!(Id::new("a").is_plain_identifier());
        assert!(Id::new("data_word2").is_plain_identifier());
        assert!(!Id::new("_hidden").is_plain_identifier());
        assert!(!Id::new("2fast").is_plain_identifier());
        assert!(!Id::new("").is_plain_identifier());
    }
}
