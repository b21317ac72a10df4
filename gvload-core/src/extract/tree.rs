//! Navigable document tree
//!
//! The extractors never touch the HTML parser directly. They work against
//! [`DocumentNode`], which offers exactly what the export layout needs:
//! find the first / all nodes matching a structural [`Pattern`], read text
//! content, read an attribute. [`HtmlDocument`] implements it on top of
//! `scraper`; tests may implement it over anything else.
//!
//! A [`Pattern`] is a short path of [`Step`]s. Each step names a tag, an
//! optional exact attribute value and how it relates to the previous step:
//!
//! | Axis | XPath equivalent |
//! |------|------------------|
//! | [`Axis::Child`] | `./tag` |
//! | [`Axis::Descendant`] | `.//tag` |
//! | [`Axis::SelfOrDescendant`] | `self::tag` or `.//tag` |

use scraper::{ElementRef, Html};

/// How a step relates to the nodes matched by the previous step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Child,
    Descendant,
    SelfOrDescendant,
}

/// One element test within a [`Pattern`].
#[derive(Debug, Clone, Copy)]
pub struct Step {
    pub axis: Axis,
    pub tag: &'static str,
    /// Attribute name and its exact expected value
    pub attr: Option<(&'static str, &'static str)>,
}

impl Step {
    pub const fn child(tag: &'static str) -> Self {
        Self {
            axis: Axis::Child,
            tag,
            attr: None,
        }
    }

    pub const fn descendant(tag: &'static str) -> Self {
        Self {
            axis: Axis::Descendant,
            tag,
            attr: None,
        }
    }

    pub const fn self_or_descendant(tag: &'static str) -> Self {
        Self {
            axis: Axis::SelfOrDescendant,
            tag,
            attr: None,
        }
    }

    /// Require `name="value"` on the element (exact string match).
    pub const fn with(self, name: &'static str, value: &'static str) -> Self {
        Self {
            axis: self.axis,
            tag: self.tag,
            attr: Some((name, value)),
        }
    }
}

/// A fixed structural signature identifying a region of the export layout.
#[derive(Debug, Clone, Copy)]
pub struct Pattern {
    steps: &'static [Step],
}

impl Pattern {
    pub const fn new(steps: &'static [Step]) -> Self {
        Self { steps }
    }

    pub fn steps(&self) -> &'static [Step] {
        self.steps
    }
}

/// Read-only view of one element in a parsed page.
pub trait DocumentNode: Clone {
    /// Lowercase local tag name
    fn tag_name(&self) -> &str;

    fn attribute(&self, name: &str) -> Option<&str>;

    /// Concatenated text of this element and all its descendants
    fn text_content(&self) -> String;

    /// Element children in document order
    fn child_nodes(&self) -> Vec<Self>;

    /// Element descendants in document order, excluding `self`
    fn descendant_nodes(&self) -> Vec<Self> {
        let mut out = Vec::new();
        let mut stack: Vec<Self> = self.child_nodes().into_iter().rev().collect();
        while let Some(node) = stack.pop() {
            stack.extend(node.child_nodes().into_iter().rev());
            out.push(node);
        }
        out
    }

    fn matches(&self, step: &Step) -> bool {
        if self.tag_name() != step.tag {
            return false;
        }
        match step.attr {
            Some((name, value)) => self.attribute(name) == Some(value),
            None => true,
        }
    }

    /// All nodes matching `pattern`, in document order.
    fn find_all(&self, pattern: &Pattern) -> Vec<Self> {
        let mut current = vec![self.clone()];
        for step in pattern.steps() {
            let mut next = Vec::new();
            for node in &current {
                if step.axis == Axis::SelfOrDescendant && node.matches(step) {
                    next.push(node.clone());
                }
                let candidates = match step.axis {
                    Axis::Child => node.child_nodes(),
                    Axis::Descendant | Axis::SelfOrDescendant => node.descendant_nodes(),
                };
                next.extend(candidates.into_iter().filter(|c| c.matches(step)));
            }
            if next.is_empty() {
                return next;
            }
            current = next;
        }
        current
    }

    /// First node matching `pattern`.
    fn find(&self, pattern: &Pattern) -> Option<Self> {
        self.find_all(pattern).into_iter().next()
    }

    /// Text content of the first node matching `pattern`.
    fn find_text(&self, pattern: &Pattern) -> Option<String> {
        self.find(pattern).map(|n| n.text_content())
    }
}

/// A parsed export page.
pub struct HtmlDocument {
    html: Html,
}

impl HtmlDocument {
    pub fn parse(source: &str) -> Self {
        Self {
            html: Html::parse_document(source),
        }
    }

    /// The `<html>` element
    pub fn root(&self) -> HtmlNode<'_> {
        HtmlNode(self.html.root_element())
    }
}

/// [`DocumentNode`] over a `scraper` element.
#[derive(Debug, Clone, Copy)]
pub struct HtmlNode<'a>(ElementRef<'a>);

impl<'a> DocumentNode for HtmlNode<'a> {
    fn tag_name(&self) -> &str {
        self.0.value().name()
    }

    fn attribute(&self, name: &str) -> Option<&str> {
        self.0.value().attr(name)
    }

    fn text_content(&self) -> String {
        self.0.text().collect()
    }

    fn child_nodes(&self) -> Vec<Self> {
        self.0
            .children()
            .filter_map(ElementRef::wrap)
            .map(HtmlNode)
            .collect()
    }
}

/// Decode raw page bytes.
///
/// Pages are declared as ISO-8859-15; valid UTF-8 is accepted as-is, anything
/// else is mapped byte-for-byte through the Latin-9 table.
pub fn decode_page(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => bytes.iter().map(|&b| latin9_char(b)).collect(),
    }
}

fn latin9_char(byte: u8) -> char {
    // ISO-8859-15 differs from Latin-1 in eight positions
    match byte {
        0xA4 => '\u{20AC}',
        0xA6 => '\u{0160}',
        0xA8 => '\u{0161}',
        0xB4 => '\u{017D}',
        0xB8 => '\u{017E}',
        0xBC => '\u{0152}',
        0xBD => '\u{0153}',
        0xBE => '\u{0178}',
        b => char::from(b),
    }
}
