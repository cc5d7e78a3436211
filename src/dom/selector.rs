//! Compound selectors (`tag.class.class`) used to locate host elements.

use std::fmt;

use super::Element;

/// A single compound selector: optional tag name plus required classes.
///
/// Only the subset needed for structural matching is supported; there are no
/// combinators, attributes or pseudo-classes. `*` or an empty tag matches any
/// element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    tag: Option<String>,
    classes: Vec<String>,
}

impl Selector {
    /// Parse `div.node-card`, `.node-name` or `span`
    pub fn parse(input: &str) -> Self {
        let mut parts = input.trim().split('.');
        let tag = parts
            .next()
            .filter(|t| !t.is_empty() && *t != "*")
            .map(|t| t.to_ascii_lowercase());
        let classes = parts
            .filter(|c| !c.is_empty())
            .map(str::to_string)
            .collect();
        Self { tag, classes }
    }

    /// Selector matching any element carrying the given class
    pub fn class(name: &str) -> Self {
        Self {
            tag: None,
            classes: vec![name.to_string()],
        }
    }

    /// Check whether an element satisfies this selector
    pub fn matches(&self, element: &Element) -> bool {
        if let Some(ref tag) = self.tag {
            if !element.tag.eq_ignore_ascii_case(tag) {
                return false;
            }
        }
        self.classes.iter().all(|c| element.has_class(c))
    }
}

impl From<&str> for Selector {
    fn from(input: &str) -> Self {
        Self::parse(input)
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref tag) = self.tag {
            write!(f, "{}", tag)?;
        }
        for class in &self.classes {
            write!(f, ".{}", class)?;
        }
        Ok(())
    }
}
