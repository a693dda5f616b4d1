//! Markdown rendering into the document tree, via the tree-sitter block grammar.
use std::ops::Range;
use std::path::Path;
use std::sync::LazyLock;

use regex::{Captures, Regex};
use tree_sitter::{Node as SyntaxNode, Parser, Tree};

use crate::dom::{Element, Node, Tag};
use crate::error::Error;
use crate::parser::LINK_PATTERN;

/// Inline constructs the renderer turns into elements. Links share the
/// parser's pattern so both sides agree on which text is never indexed.
static INLINE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    let pattern = format!(
        r"(?P<link>{})|(?P<code>`[^`\n]+`)|(?P<strong>\*\*[^*\n]+\*\*)|(?P<em>\*[^*\s][^*\n]*\*)|(?P<br>(?: {{2,}}|\\)\r?\n)",
        LINK_PATTERN.as_str(),
    );
    return Regex::new(&pattern).expect("valid regex");
});

/// Parse markdown source into a rendered tree.
///
/// # Errors
///
/// Returns `Error::ParseFailure` if the grammar cannot be loaded or tree-sitter
/// returns no tree.
pub fn render(source: &str) -> Result<Element, Error> {
    let tree = parse_markdown(source)?;
    let mut root = Element::new(Tag::Root);
    render_children(tree.root_node(), source, &mut root);
    return Ok(root);
}

/// Parse source with the tree-sitter markdown block grammar.
///
/// # Errors
///
/// Returns `Error::ParseFailure` if the language cannot be set or parsing fails.
fn parse_markdown(source: &str) -> Result<Tree, Error> {
    let mut parser = Parser::new();
    parser
        .set_language(&tree_sitter_md::LANGUAGE.into())
        .map_err(|e| return Error::ParseFailure {
            path: Path::new("<markdown>").to_path_buf(),
            reason: e.to_string(),
        })?;

    return parser.parse(source, None).ok_or_else(|| return Error::ParseFailure {
        path: Path::new("<markdown>").to_path_buf(),
        reason: "tree-sitter returned None".to_string(),
    });
}

/// Render every child block of a syntax node into `parent`.
fn render_children(node: SyntaxNode<'_>, source: &str, parent: &mut Element) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        render_block(child, source, parent);
    }
}

/// Render one block node. Containers we don't model are flattened into the parent.
fn render_block(node: SyntaxNode<'_>, source: &str, parent: &mut Element) {
    match node.kind() {
        "paragraph" => {
            let text = inline_text(node, source);
            let paragraph = Element::new(Tag::Paragraph).with_children(inline_nodes(&text));
            parent.children.push(Node::Element(paragraph));
        },
        "atx_heading" | "setext_heading" => {
            let heading = Element::new(Tag::Heading(heading_level(node)))
                .with_children(vec![Node::Text(heading_text(node, source))]);
            parent.children.push(Node::Element(heading));
        },
        "fenced_code_block" | "indented_code_block" | "html_block" => {
            let pre = Element::new(Tag::Pre).with_children(vec![Node::Text(code_text(node, source))]);
            parent.children.push(Node::Element(pre));
        },
        "thematic_break" => parent.children.push(Node::Element(Element::new(Tag::Rule))),
        "list" | "list_item" | "block_quote" => {
            let tag = match node.kind() {
                "list" => Tag::List,
                "list_item" => Tag::ListItem,
                _ => Tag::BlockQuote,
            };
            let mut container = Element::new(tag);
            render_children(node, source, &mut container);
            parent.children.push(Node::Element(container));
        },
        _ => render_children(node, source, parent),
    }
}

/// Text of a block's `inline` children, without block continuation markers
/// (`>` prefixes and list indentation on continuation lines).
fn inline_text(node: SyntaxNode<'_>, source: &str) -> String {
    let mut out = String::new();
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() != "inline" && child.kind() != "heading_content" {
            continue;
        }
        let mut skipped: Vec<Range<usize>> = Vec::new();
        let mut inner = child.walk();
        for part in child.children(&mut inner) {
            if part.kind() == "block_continuation" {
                skipped.push(part.start_byte()..part.end_byte());
            }
        }
        push_without(&mut out, source, child.start_byte()..child.end_byte(), &skipped);
    }
    return out;
}

/// Append `source[range]` minus the `skipped` sub-ranges.
fn push_without(out: &mut String, source: &str, range: Range<usize>, skipped: &[Range<usize>]) {
    let mut cursor = range.start;
    for skip in skipped {
        out.push_str(source.get(cursor..skip.start).unwrap_or(""));
        cursor = skip.end;
    }
    out.push_str(source.get(cursor..range.end).unwrap_or(""));
}

/// Heading text. Setext headings wrap their text in a paragraph node.
fn heading_text(node: SyntaxNode<'_>, source: &str) -> String {
    let mut cursor = node.walk();
    let paragraph = node.children(&mut cursor).find(|c| return c.kind() == "paragraph");
    let text = match paragraph {
        Some(inner) => inline_text(inner, source),
        None => inline_text(node, source),
    };
    return text.trim().to_string();
}

/// Heading level from the ATX marker or setext underline.
fn heading_level(node: SyntaxNode<'_>) -> u8 {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        let level = match child.kind() {
            "atx_h1_marker" | "setext_h1_underline" => 1,
            "atx_h2_marker" | "setext_h2_underline" => 2,
            "atx_h3_marker" => 3,
            "atx_h4_marker" => 4,
            "atx_h5_marker" => 5,
            "atx_h6_marker" => 6,
            _ => continue,
        };
        return level;
    }
    return 1;
}

/// Body of a code block, without its fences.
fn code_text(node: SyntaxNode<'_>, source: &str) -> String {
    let mut cursor = node.walk();
    let content = node
        .children(&mut cursor)
        .find(|c| return c.kind() == "code_fence_content")
        .unwrap_or(node);
    return source.get(content.start_byte()..content.end_byte()).unwrap_or("").to_string();
}

/// Split paragraph text into text runs and inline elements. A rejected
/// delimiter match stays unconsumed, so links inside it are still found.
fn inline_nodes(text: &str) -> Vec<Node> {
    let mut nodes = Vec::new();
    let mut cursor = 0_usize;
    let mut search = 0_usize;

    while let Some(caps) = INLINE_PATTERN.captures_at(text, search) {
        let Some(whole) = caps.get(0) else {
            break;
        };
        let Some(element) = inline_element(&caps, text, whole.range()) else {
            search = next_boundary(text, whole.start());
            continue;
        };
        push_text(&mut nodes, text.get(cursor..whole.start()).unwrap_or(""));
        nodes.push(Node::Element(element));
        cursor = whole.end();
        search = whole.end();
    }

    push_text(&mut nodes, text.get(cursor..).unwrap_or(""));
    return nodes;
}

/// Byte offset of the character after the one at `at`.
fn next_boundary(text: &str, at: usize) -> usize {
    return text
        .get(at..)
        .and_then(|s| return s.chars().next())
        .map_or(text.len(), |c| return at.saturating_add(c.len_utf8()));
}

/// Append a non-empty text node.
fn push_text(nodes: &mut Vec<Node>, text: &str) {
    if !text.is_empty() {
        nodes.push(Node::Text(text.to_string()));
    }
}

/// Build the element for one inline match. Code and emphasis only count when
/// they stand alone between whitespace, so a delimiter glued to a word keeps
/// that word whole.
fn inline_element(caps: &Captures<'_>, text: &str, range: Range<usize>) -> Option<Element> {
    let raw = text.get(range.clone())?;

    if caps.name("link").is_some() {
        return Some(link_element(raw));
    }
    if caps.name("br").is_some() {
        return Some(Element::new(Tag::Break));
    }
    if !stands_alone(text, range) {
        return None;
    }
    if caps.name("code").is_some() {
        let inner = raw.get(1..raw.len().saturating_sub(1))?;
        return Some(Element::new(Tag::Code).with_children(vec![Node::Text(inner.to_string())]));
    }
    if caps.name("strong").is_some() {
        let inner = raw.get(2..raw.len().saturating_sub(2))?;
        return Some(Element::new(Tag::Strong).with_children(inline_nodes(inner)));
    }
    let inner = raw.get(1..raw.len().saturating_sub(1))?;
    return Some(Element::new(Tag::Emphasis).with_children(inline_nodes(inner)));
}

/// True when `range` is bounded by whitespace or the ends of `text`.
fn stands_alone(text: &str, range: Range<usize>) -> bool {
    let before = text.get(..range.start).and_then(|s| return s.chars().last());
    let after = text.get(range.end..).and_then(|s| return s.chars().next());
    return before.is_none_or(char::is_whitespace) && after.is_none_or(char::is_whitespace);
}

/// Anchor element for a wiki link or a markdown link.
fn link_element(raw: &str) -> Element {
    if let Some(inner) = raw.strip_prefix("[[").and_then(|s| return s.strip_suffix("]]")) {
        let (target, label) = inner.split_once('|').unwrap_or((inner, inner));
        let anchor = Element::new(Tag::Anchor).with_children(vec![Node::Text(label.to_string())]);
        return match target.strip_prefix('@') {
            Some(article) => anchor.with_attr("class", "article-ref").with_attr("data-article-id", article),
            None => anchor.with_attr("class", "internal-link").with_attr("href", target),
        };
    }

    let (label, url) = raw
        .strip_prefix('[')
        .and_then(|s| return s.strip_suffix(')'))
        .and_then(|s| return s.split_once("]("))
        .unwrap_or((raw, ""));
    return Element::new(Tag::Anchor)
        .with_attr("href", url)
        .with_children(vec![Node::Text(label.to_string())]);
}
