//! Minimal CSS selector engine for [`MemoryDocument`](super::MemoryDocument).
//!
//! Supports type (`span`, custom elements, `*`), `#id`, `.class`,
//! `[attr]`, `[attr=v]`, `[attr*=v]`, `[attr^=v]`, `[attr$=v]`, the descendant and
//! child (`>`) combinators, and comma-separated groups.

use caselens_protocols::{DomError, NodeId};

/// Read access to a node tree for matching.
pub(crate) trait SelectorTarget {
    fn tag_of(&self, node: NodeId) -> Option<&str>;
    fn attr_of(&self, node: NodeId, name: &str) -> Option<&str>;
    fn parent_of(&self, node: NodeId) -> Option<NodeId>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum AttrOp {
    Exists,
    Equals,
    Contains,
    Prefix,
    Suffix,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct AttrMatcher {
    name: String,
    op: AttrOp,
    value: String,
}

impl AttrMatcher {
    fn matches(&self, actual: Option<&str>) -> bool {
        let Some(actual) = actual else {
            return false;
        };
        match self.op {
            AttrOp::Exists => true,
            AttrOp::Equals => actual == self.value,
            AttrOp::Contains => actual.contains(&self.value),
            AttrOp::Prefix => actual.starts_with(&self.value),
            AttrOp::Suffix => actual.ends_with(&self.value),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Compound {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attrs: Vec<AttrMatcher>,
}

impl Compound {
    fn is_empty(&self) -> bool {
        self.tag.is_none() && self.id.is_none() && self.classes.is_empty() && self.attrs.is_empty()
    }

    fn matches<T: SelectorTarget>(&self, tree: &T, node: NodeId) -> bool {
        let Some(tag) = tree.tag_of(node) else {
            return false;
        };
        if let Some(expected) = &self.tag {
            if !expected.eq_ignore_ascii_case(tag) {
                return false;
            }
        }
        if let Some(id) = &self.id {
            if tree.attr_of(node, "id") != Some(id.as_str()) {
                return false;
            }
        }
        if !self.classes.is_empty() {
            let class_attr = tree.attr_of(node, "class").unwrap_or("");
            let has_all = self
                .classes
                .iter()
                .all(|c| class_attr.split_whitespace().any(|have| have == c));
            if !has_all {
                return false;
            }
        }
        self.attrs
            .iter()
            .all(|m| m.matches(tree.attr_of(node, &m.name)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Combinator {
    Descendant,
    Child,
}

/// One comma-separated alternative: compounds joined by combinators. The
/// combinator stored with a part relates it to the part on its left.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Complex {
    parts: Vec<(Combinator, Compound)>,
}

impl Complex {
    fn matches<T: SelectorTarget>(&self, tree: &T, node: NodeId) -> bool {
        self.matches_at(tree, self.parts.len() - 1, node)
    }

    fn matches_at<T: SelectorTarget>(&self, tree: &T, index: usize, node: NodeId) -> bool {
        let (combinator, compound) = &self.parts[index];
        if !compound.matches(tree, node) {
            return false;
        }
        if index == 0 {
            return true;
        }
        match combinator {
            Combinator::Child => tree
                .parent_of(node)
                .map(|p| self.matches_at(tree, index - 1, p))
                .unwrap_or(false),
            Combinator::Descendant => {
                let mut current = tree.parent_of(node);
                while let Some(ancestor) = current {
                    if self.matches_at(tree, index - 1, ancestor) {
                        return true;
                    }
                    current = tree.parent_of(ancestor);
                }
                false
            }
        }
    }
}

/// A parsed selector list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SelectorList {
    alternatives: Vec<Complex>,
}

impl SelectorList {
    pub(crate) fn parse(input: &str) -> Result<Self, DomError> {
        let alternatives = split_top_level(input)
            .into_iter()
            .map(|group| parse_complex(group.trim(), input))
            .collect::<Result<Vec<_>, _>>()?;
        if alternatives.is_empty() {
            return Err(DomError::InvalidSelector(input.to_string()));
        }
        Ok(Self { alternatives })
    }

    pub(crate) fn matches<T: SelectorTarget>(&self, tree: &T, node: NodeId) -> bool {
        self.alternatives.iter().any(|c| c.matches(tree, node))
    }
}

/// Split on commas that are not inside `[...]` or quotes.
fn split_top_level(input: &str) -> Vec<&str> {
    let mut groups = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0;
    for (i, ch) in input.char_indices() {
        match (quote, ch) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"') | (None, '\'') => quote = Some(ch),
            (None, '[') => depth += 1,
            (None, ']') => depth = depth.saturating_sub(1),
            (None, ',') if depth == 0 => {
                groups.push(&input[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    groups.push(&input[start..]);
    groups
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

fn parse_complex(group: &str, original: &str) -> Result<Complex, DomError> {
    let invalid = || DomError::InvalidSelector(original.to_string());
    let chars: Vec<char> = group.chars().collect();
    let mut parts: Vec<(Combinator, Compound)> = Vec::new();
    let mut pending = Combinator::Descendant;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }
        if c == '>' {
            if parts.is_empty() {
                return Err(invalid());
            }
            pending = Combinator::Child;
            i += 1;
            continue;
        }

        let mut compound = Compound::default();
        let mut universal = false;
        while i < chars.len() && !chars[i].is_whitespace() && chars[i] != '>' {
            match chars[i] {
                '*' => {
                    universal = true;
                    i += 1;
                }
                '#' | '.' => {
                    let kind = chars[i];
                    let start = i + 1;
                    i = start;
                    while i < chars.len() && is_ident_char(chars[i]) {
                        i += 1;
                    }
                    if i == start {
                        return Err(invalid());
                    }
                    let name: String = chars[start..i].iter().collect();
                    if kind == '#' {
                        compound.id = Some(name);
                    } else {
                        compound.classes.push(name);
                    }
                }
                '[' => {
                    let close = chars[i..]
                        .iter()
                        .position(|&c| c == ']')
                        .map(|p| p + i)
                        .ok_or_else(invalid)?;
                    let body: String = chars[i + 1..close].iter().collect();
                    compound.attrs.push(parse_attr(&body).ok_or_else(invalid)?);
                    i = close + 1;
                }
                c if is_ident_char(c) => {
                    let start = i;
                    while i < chars.len() && is_ident_char(chars[i]) {
                        i += 1;
                    }
                    compound.tag = Some(chars[start..i].iter().collect());
                }
                _ => return Err(invalid()),
            }
        }

        if compound.is_empty() && !universal {
            return Err(invalid());
        }
        parts.push((pending, compound));
        pending = Combinator::Descendant;
    }

    if parts.is_empty() {
        return Err(invalid());
    }
    Ok(Complex { parts })
}

fn parse_attr(body: &str) -> Option<AttrMatcher> {
    let body = body.trim();
    let ops = [
        ("*=", AttrOp::Contains),
        ("^=", AttrOp::Prefix),
        ("$=", AttrOp::Suffix),
        ("=", AttrOp::Equals),
    ];
    for (token, op) in ops {
        if let Some(pos) = body.find(token) {
            let name = body[..pos].trim();
            let value = body[pos + token.len()..]
                .trim()
                .trim_matches(|c| c == '"' || c == '\'');
            if name.is_empty() || !name.chars().all(is_ident_char) {
                return None;
            }
            return Some(AttrMatcher {
                name: name.to_string(),
                op,
                value: value.to_string(),
            });
        }
    }
    if body.is_empty() || !body.chars().all(is_ident_char) {
        return None;
    }
    Some(AttrMatcher {
        name: body.to_string(),
        op: AttrOp::Exists,
        value: String::new(),
    })
}
