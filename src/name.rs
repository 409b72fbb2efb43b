//! Qualified names
//!
//! A name is a list of segments joined by a language-specific delimiter:
//! - `std::vector` (C++, delimiter `::`)
//! - `java.lang.String` (Java, delimiter `.`)
//!
//! Delimiters nested inside `<>`, `()` or `[]` do not split, so
//! `std::map<a::b, c>::iterator` has three segments.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A possibly qualified name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Name {
    /// Segments from outermost to innermost
    pub segments: Vec<String>,
    /// Delimiter used when rendering
    pub delimiter: String,
}

impl Name {
    /// Create an unqualified name
    pub fn local(name: impl Into<String>, delimiter: impl Into<String>) -> Self {
        let name = name.into();
        let segments = if name.is_empty() { Vec::new() } else { vec![name] };
        Self {
            segments,
            delimiter: delimiter.into(),
        }
    }

    /// Parse a name, splitting at top-level occurrences of `delimiter`
    pub fn parse(text: &str, delimiter: &str) -> Self {
        let text = text.trim();
        if delimiter.is_empty() {
            return Self::local(text, delimiter);
        }

        let mut segments = Vec::new();
        let mut depth = 0usize;
        let mut start = 0usize;
        let mut i = 0usize;
        let bytes = text.as_bytes();

        while i < bytes.len() {
            match bytes[i] {
                b'<' | b'(' | b'[' => depth += 1,
                b'>' | b')' | b']' => depth = depth.saturating_sub(1),
                _ => {}
            }
            if depth == 0 && text.is_char_boundary(i) && text[i..].starts_with(delimiter) {
                segments.push(text[start..i].to_string());
                i += delimiter.len();
                start = i;
                continue;
            }
            i += 1;
        }
        segments.push(text[start..].to_string());
        segments.retain(|s| !s.is_empty());

        Self {
            segments,
            delimiter: delimiter.to_string(),
        }
    }

    /// The innermost segment
    pub fn local_name(&self) -> &str {
        self.segments.last().map(String::as_str).unwrap_or("")
    }

    /// The enclosing name, if this name is qualified
    pub fn parent(&self) -> Option<Name> {
        if self.segments.len() < 2 {
            return None;
        }
        Some(Self {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
            delimiter: self.delimiter.clone(),
        })
    }

    /// Append a segment (which may itself be qualified)
    pub fn join(&self, child: &str) -> Name {
        let child = Name::parse(child, &self.delimiter);
        let mut segments = self.segments.clone();
        segments.extend(child.segments);
        Self {
            segments,
            delimiter: self.delimiter.clone(),
        }
    }

    pub fn is_qualified(&self) -> bool {
        self.segments.len() > 1
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Check whether `other` is a prefix of this name
    pub fn starts_with(&self, other: &Name) -> bool {
        other.segments.len() <= self.segments.len()
            && self.segments.iter().zip(&other.segments).all(|(a, b)| a == b)
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join(&self.delimiter))
    }
}

impl FromStr for Name {
    type Err = crate::Error;

    /// Guesses the delimiter: `::` when present, `.` otherwise.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().is_empty() {
            return Err(crate::Error::InvalidKind("empty name".to_string()));
        }
        let delimiter = if s.contains("::") { "::" } else { "." };
        Ok(Name::parse(s, delimiter))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_qualified() {
        let name = Name::parse("std::vector", "::");
        assert_eq!(name.segments, vec!["std", "vector"]);
        assert_eq!(name.local_name(), "vector");
        assert_eq!(name.parent().unwrap().to_string(), "std");
    }

    #[test]
    fn test_nested_delimiters_do_not_split() {
        let name = Name::parse("std::map<a::b, c>::iterator", "::");
        assert_eq!(name.segments.len(), 3);
        assert_eq!(name.segments[1], "map<a::b, c>");
        assert_eq!(name.local_name(), "iterator");
    }

    #[test]
    fn test_join_and_display() {
        let ns = Name::parse("a.b", ".");
        let joined = ns.join("c.d");
        assert_eq!(joined.to_string(), "a.b.c.d");
        assert!(joined.starts_with(&ns));
        assert!(!ns.starts_with(&joined));
    }

    #[test]
    fn test_from_str_guesses_delimiter() {
        let cpp: Name = "ns::Foo".parse().unwrap();
        assert_eq!(cpp.delimiter, "::");
        let java: Name = "java.lang.String".parse().unwrap();
        assert_eq!(java.local_name(), "String");
        assert!("  ".parse::<Name>().is_err());
    }

    #[test]
    fn test_unqualified_has_no_parent() {
        let name = Name::local("x", "::");
        assert!(name.parent().is_none());
        assert!(!name.is_qualified());
        assert_eq!(Name::local("", ".").local_name(), "");
    }
}
