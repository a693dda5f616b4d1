//! Rendered document tree: the structure the word indexer walks and the
//! highlighter addresses by word id.

use std::fmt::Write as _;

use crate::types::TrackedWordSpan;

/// Element kinds the markdown renderer produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tag {
    /// Link to another page, article, or URL. Never indexed.
    Anchor,
    /// Block quote container.
    BlockQuote,
    /// Hard line break.
    Break,
    /// Inline code span.
    Code,
    /// `*emphasis*`.
    Emphasis,
    /// Heading of the given level (1–6).
    Heading(u8),
    /// List container.
    List,
    /// One list item.
    ListItem,
    /// Paragraph-level block; the unit the word indexer visits.
    Paragraph,
    /// Preformatted block (code, raw HTML).
    Pre,
    /// Tree root.
    Root,
    /// Thematic break.
    Rule,
    /// `**strong**`.
    Strong,
}

impl Tag {
    /// HTML element name.
    pub const fn html_name(self) -> &'static str {
        return match self {
            Tag::Anchor => "a",
            Tag::BlockQuote => "blockquote",
            Tag::Break => "br",
            Tag::Code => "code",
            Tag::Emphasis => "em",
            Tag::Heading(1) => "h1",
            Tag::Heading(2) => "h2",
            Tag::Heading(3) => "h3",
            Tag::Heading(4) => "h4",
            Tag::Heading(5) => "h5",
            Tag::Heading(_) => "h6",
            Tag::List => "ul",
            Tag::ListItem => "li",
            Tag::Paragraph => "p",
            Tag::Pre => "pre",
            Tag::Root => "article",
            Tag::Rule => "hr",
            Tag::Strong => "strong",
        };
    }

    /// Void elements have no children and no closing tag.
    const fn is_void(self) -> bool {
        return matches!(self, Tag::Break | Tag::Rule);
    }

    /// Block elements are followed by a newline in HTML output.
    const fn is_block(self) -> bool {
        return !matches!(self, Tag::Anchor | Tag::Break | Tag::Code | Tag::Emphasis | Tag::Strong);
    }
}

/// A node of the rendered tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// Element with children.
    Element(Element),
    /// Raw text, including whitespace runs left between indexed words.
    Text(String),
    /// An indexed, addressable word.
    Word {
        /// Address assigned by the indexer.
        span: TrackedWordSpan,
        /// The word itself.
        text: String,
    },
}

impl Node {
    /// Concatenated text of this node and its descendants.
    pub fn text_content(&self) -> String {
        return match self {
            Node::Element(element) => element.text_content(),
            Node::Text(text) | Node::Word { text, .. } => text.clone(),
        };
    }
}

/// An element with attributes and ordered children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    /// Attributes in insertion order.
    pub attrs: Vec<(String, String)>,
    /// Child nodes in document order.
    pub children: Vec<Node>,
    /// Element kind.
    pub tag: Tag,
}

impl Element {
    /// An element with no attributes or children.
    pub const fn new(tag: Tag) -> Self {
        return Self {
            attrs: Vec::new(),
            children: Vec::new(),
            tag,
        };
    }

    /// Value of the named attribute.
    pub fn attr(&self, name: &str) -> Option<&str> {
        return self
            .attrs
            .iter()
            .find(|(key, _)| return key == name)
            .map(|(_, value)| return value.as_str());
    }

    /// Concatenated text of all descendants.
    pub fn text_content(&self) -> String {
        return self.children.iter().map(Node::text_content).collect();
    }

    /// Render as HTML. Indexed words become `span.annoref-word` elements
    /// carrying their DOM id and word index.
    pub fn to_html(&self) -> String {
        let mut out = String::new();
        write_element(&mut out, self);
        return out;
    }

    /// Builder-style attribute setter.
    pub fn with_attr(mut self, name: &str, value: &str) -> Self {
        self.attrs.push((name.to_string(), value.to_string()));
        return self;
    }

    /// Builder-style child setter.
    pub fn with_children(mut self, children: Vec<Node>) -> Self {
        self.children = children;
        return self;
    }
}

/// Append one element and its subtree.
fn write_element(out: &mut String, element: &Element) {
    let name = element.tag.html_name();
    let _ = write!(out, "<{name}");
    for (key, value) in &element.attrs {
        let _ = write!(out, " {key}=\"{}\"", escape_html(value));
    }
    out.push('>');

    if element.tag.is_void() {
        return;
    }

    for child in &element.children {
        match child {
            Node::Element(inner) => write_element(out, inner),
            Node::Text(text) => out.push_str(&escape_html(text)),
            Node::Word { span, text } => {
                let _ = write!(
                    out,
                    "<span class=\"annoref-word\" id=\"{}\" data-word-index=\"{}\">{}</span>",
                    escape_html(&span.dom_id),
                    span.word_index,
                    escape_html(text),
                );
            },
        }
    }

    let _ = write!(out, "</{name}>");
    if element.tag.is_block() {
        out.push('\n');
    }
}

/// Escape the five HTML-significant characters.
fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    return out;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_words_as_addressable_spans() {
        let paragraph = Element::new(Tag::Paragraph).with_children(vec![
            Node::Word { span: TrackedWordSpan::new("a", 0), text: "Hi".to_string() },
            Node::Text(" ".to_string()),
            Node::Element(Element::new(Tag::Break)),
        ]);
        assert_eq!(
            paragraph.to_html(),
            "<p><span class=\"annoref-word\" id=\"a-0\" data-word-index=\"0\">Hi</span> <br></p>\n"
        );
    }

    #[test]
    fn escapes_text_and_attributes() {
        let link = Element::new(Tag::Anchor)
            .with_attr("href", "a\"b")
            .with_children(vec![Node::Text("<x>".to_string())]);
        assert_eq!(link.to_html(), "<a href=\"a&quot;b\">&lt;x&gt;</a>");
    }

    #[test]
    fn text_content_concatenates_descendants() {
        let root = Element::new(Tag::Root).with_children(vec![
            Node::Text("one ".to_string()),
            Node::Element(Element::new(Tag::Strong).with_children(vec![Node::Text("two".to_string())])),
        ]);
        assert_eq!(root.text_content(), "one two");
    }
}
