//! The CSS selector subset the watcher needs.
//!
//! Supported: type selectors (`svg`, `*`), classes (`.merge-status-item`), ids
//! (`#partial-pull-merging`), attribute presence and equality (`[data-x]`,
//! `[type="checkbox"]`), and the descendant combinator. Anything else is
//! rejected at parse time so misconfiguration surfaces before the first cycle.

use std::fmt;
use std::iter::Peekable;
use std::str::Chars;

use crate::error::{Result, WatcherError};

#[derive(Debug, Clone, PartialEq, Eq)]
struct AttrMatch {
    name: String,
    value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
struct Compound {
    tag: Option<String>,
    classes: Vec<String>,
    attrs: Vec<AttrMatch>,
}

/// Read access a tree must provide for selector matching.
pub(crate) trait SelectorSubject {
    type Node: Copy;

    fn tag(&self, node: Self::Node) -> &str;
    fn has_class(&self, node: Self::Node, class: &str) -> bool;
    fn attr(&self, node: Self::Node, name: &str) -> Option<&str>;
    fn parent(&self, node: Self::Node) -> Option<Self::Node>;
}

/// A parsed selector: compounds joined by descendant combinators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    source: String,
    compounds: Vec<Compound>,
}

impl Selector {
    pub fn parse(input: &str) -> Result<Self> {
        let invalid = |reason: &str| WatcherError::InvalidSelector {
            selector: input.to_string(),
            reason: reason.to_string(),
        };

        let mut chars = input.chars().peekable();
        let mut compounds = Vec::new();

        loop {
            while chars.peek().is_some_and(|c| c.is_whitespace()) {
                chars.next();
            }
            if chars.peek().is_none() {
                break;
            }
            let compound = parse_compound(&mut chars).map_err(|reason| invalid(&reason))?;
            compounds.push(compound);
        }

        if compounds.is_empty() {
            return Err(invalid("empty selector"));
        }

        Ok(Self {
            source: input.trim().to_string(),
            compounds,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Attribute-presence selector, used to find tagged overlay containers.
    pub fn has_attribute(name: &str) -> Result<Self> {
        Self::parse(&format!("[{}]", name))
    }

    pub(crate) fn matches<T: SelectorSubject>(&self, tree: &T, node: T::Node) -> bool {
        let Some((last, ancestors)) = self.compounds.split_last() else {
            return false;
        };
        if !last.matches(tree, node) {
            return false;
        }

        // Greedy right-to-left walk is exact for descendant-only selectors.
        let mut cursor = tree.parent(node);
        for compound in ancestors.iter().rev() {
            loop {
                match cursor {
                    Some(candidate) => {
                        cursor = tree.parent(candidate);
                        if compound.matches(tree, candidate) {
                            break;
                        }
                    }
                    None => return false,
                }
            }
        }
        true
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl Compound {
    fn matches<T: SelectorSubject>(&self, tree: &T, node: T::Node) -> bool {
        if let Some(tag) = &self.tag {
            if !tree.tag(node).eq_ignore_ascii_case(tag) {
                return false;
            }
        }
        if !self.classes.iter().all(|class| tree.has_class(node, class)) {
            return false;
        }
        self.attrs.iter().all(|attr| match (&attr.value, tree.attr(node, &attr.name)) {
            (_, None) => false,
            (None, Some(_)) => true,
            (Some(expected), Some(actual)) => expected == actual,
        })
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

fn parse_ident(chars: &mut Peekable<Chars<'_>>) -> Option<String> {
    let mut ident = String::new();
    while let Some(&c) = chars.peek() {
        if !is_ident_char(c) {
            break;
        }
        ident.push(c);
        chars.next();
    }
    (!ident.is_empty()).then_some(ident)
}

fn parse_compound(chars: &mut Peekable<Chars<'_>>) -> std::result::Result<Compound, String> {
    let mut compound = Compound::default();

    if chars.peek() == Some(&'*') {
        chars.next();
    } else if chars.peek().is_some_and(|c| c.is_ascii_alphabetic()) {
        compound.tag = parse_ident(chars);
    }

    while let Some(&c) = chars.peek() {
        match c {
            '.' => {
                chars.next();
                let class = parse_ident(chars).ok_or("expected class name after '.'")?;
                compound.classes.push(class);
            }
            '#' => {
                chars.next();
                let id = parse_ident(chars).ok_or("expected id after '#'")?;
                compound.attrs.push(AttrMatch {
                    name: "id".to_string(),
                    value: Some(id),
                });
            }
            '[' => {
                chars.next();
                compound.attrs.push(parse_attr(chars)?);
            }
            c if c.is_whitespace() => break,
            other => return Err(format!("unsupported selector syntax '{}'", other)),
        }
    }

    Ok(compound)
}

fn parse_attr(chars: &mut Peekable<Chars<'_>>) -> std::result::Result<AttrMatch, String> {
    let name = parse_ident(chars).ok_or("expected attribute name")?;
    match chars.next() {
        Some(']') => Ok(AttrMatch { name, value: None }),
        Some('=') => {
            let value = match chars.peek() {
                Some(&quote) if quote == '"' || quote == '\'' => {
                    chars.next();
                    let mut value = String::new();
                    loop {
                        match chars.next() {
                            Some(c) if c == quote => break,
                            Some(c) => value.push(c),
                            None => return Err("unterminated attribute value".to_string()),
                        }
                    }
                    value
                }
                _ => parse_ident(chars).ok_or("expected attribute value")?,
            };
            match chars.next() {
                Some(']') => Ok(AttrMatch {
                    name,
                    value: Some(value),
                }),
                _ => Err("expected ']' after attribute value".to_string()),
            }
        }
        _ => Err("unsupported attribute operator".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Flat {
        nodes: Vec<(&'static str, Vec<&'static str>, Vec<(&'static str, &'static str)>, Option<usize>)>,
    }

    impl SelectorSubject for Flat {
        type Node = usize;

        fn tag(&self, node: usize) -> &str {
            self.nodes[node].0
        }

        fn has_class(&self, node: usize, class: &str) -> bool {
            self.nodes[node].1.iter().any(|candidate| *candidate == class)
        }

        fn attr(&self, node: usize, name: &str) -> Option<&str> {
            self.nodes[node]
                .2
                .iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| *value)
        }

        fn parent(&self, node: usize) -> Option<usize> {
            self.nodes[node].3
        }
    }

    fn tree() -> Flat {
        Flat {
            nodes: vec![
                ("div", vec!["merge-status-list"], vec![], None),
                ("div", vec!["merge-status-item", "d-flex"], vec![], Some(0)),
                ("div", vec!["merge-status-icon"], vec![], Some(1)),
                (
                    "svg",
                    vec!["octicon", "hx_dot-fill-pending-icon"],
                    vec![("aria-hidden", "true")],
                    Some(2),
                ),
                ("input", vec![], vec![("type", "checkbox")], None),
            ],
        }
    }

    #[test]
    fn test_matches_descendant_chain() {
        let selector = Selector::parse(".merge-status-list .merge-status-icon svg").unwrap();
        assert!(selector.matches(&tree(), 3));
        assert!(!selector.matches(&tree(), 2));
    }

    #[test]
    fn test_compound_requires_every_class() {
        let selector = Selector::parse("div.merge-status-item.d-flex").unwrap();
        assert!(selector.matches(&tree(), 1));

        let selector = Selector::parse("div.merge-status-item.d-none").unwrap();
        assert!(!selector.matches(&tree(), 1));
    }

    #[test]
    fn test_attribute_presence_and_equality() {
        assert!(Selector::parse("[aria-hidden]").unwrap().matches(&tree(), 3));
        assert!(Selector::parse("input[type=\"checkbox\"]")
            .unwrap()
            .matches(&tree(), 4));
        assert!(!Selector::parse("input[type=radio]")
            .unwrap()
            .matches(&tree(), 4));
    }

    #[test]
    fn test_detached_node_fails_ancestor_requirement() {
        let selector = Selector::parse(".merge-status-list input").unwrap();
        assert!(!selector.matches(&tree(), 4));
    }

    #[test]
    fn test_tag_match_is_case_insensitive() {
        assert!(Selector::parse("SVG").unwrap().matches(&tree(), 3));
    }

    #[test]
    fn test_rejects_unsupported_syntax() {
        assert!(Selector::parse(".a > .b").is_err());
        assert!(Selector::parse(".a, .b").is_err());
        assert!(Selector::parse("li:first-child").is_err());
        assert!(Selector::parse("[data-x").is_err());
        assert!(Selector::parse("   ").is_err());
    }

    #[test]
    fn test_keeps_trimmed_source() {
        let selector = Selector::parse("  .merge-status-list  .merge-status-item ").unwrap();
        assert_eq!(selector.as_str(), ".merge-status-list  .merge-status-item");
    }
}
