//! Word indexer: makes a rendered tree addressable at word granularity.

use crate::dom::{Element, Node, Tag};
use crate::parser;
use crate::types::TrackedWordSpan;

/// Wrap every word inside the paragraph-level blocks under `root` in an
/// addressable word node, numbering from 0 across the whole pass.
///
/// Anchor subtrees are left untouched. Whitespace stays as plain text so the
/// tree's text content is unchanged. Words already indexed by an earlier pass
/// are kept as they are and do not consume an index.
pub fn index_words(root: &mut Element, article_id: &str) -> Vec<TrackedWordSpan> {
    let mut spans = Vec::new();
    visit_blocks(root, article_id, &mut spans);
    return spans;
}

/// Find paragraph-level blocks in document order.
fn visit_blocks(element: &mut Element, article_id: &str, spans: &mut Vec<TrackedWordSpan>) {
    if element.tag == Tag::Paragraph {
        index_inline(element, article_id, spans);
        return;
    }

    for child in &mut element.children {
        if let Node::Element(inner) = child {
            visit_blocks(inner, article_id, spans);
        }
    }
}

/// Replace the text children of an inline container with word and whitespace runs,
/// recursing into formatting elements.
fn index_inline(element: &mut Element, article_id: &str, spans: &mut Vec<TrackedWordSpan>) {
    let children = std::mem::take(&mut element.children);
    let mut indexed = Vec::with_capacity(children.len());

    for child in children {
        match child {
            Node::Text(text) => split_text_node(&text, article_id, spans, &mut indexed),
            Node::Element(mut inner) => {
                if inner.tag != Tag::Anchor && !inner.children.is_empty() {
                    index_inline(&mut inner, article_id, spans);
                }
                indexed.push(Node::Element(inner));
            },
            word @ Node::Word { .. } => indexed.push(word),
        }
    }

    element.children = indexed;
}

/// Split one text node into interleaved whitespace text and word nodes.
fn split_text_node(text: &str, article_id: &str, spans: &mut Vec<TrackedWordSpan>, out: &mut Vec<Node>) {
    for run in parser::split_runs(text) {
        let Some(slice) = text.get(run.range) else {
            continue;
        };
        if !run.is_word {
            out.push(Node::Text(slice.to_string()));
            continue;
        }
        let span = TrackedWordSpan::new(article_id, spans.len());
        spans.push(span.clone());
        out.push(Node::Word {
            span,
            text: slice.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markdown;

    fn text(s: &str) -> Node {
        Node::Text(s.to_string())
    }

    fn paragraph(children: Vec<Node>) -> Node {
        Node::Element(Element::new(Tag::Paragraph).with_children(children))
    }

    #[test]
    fn hello_world() {
        let mut root = Element::new(Tag::Root).with_children(vec![paragraph(vec![text("Hello world")])]);
        let spans = index_words(&mut root, "art");
        let ids: Vec<&str> = spans.iter().map(|s| s.dom_id.as_str()).collect();
        assert_eq!(ids, vec!["art-0", "art-1"]);
        assert_eq!(spans[1].word_index, 1);
        assert_eq!(root.text_content(), "Hello world");
    }

    #[test]
    fn anchors_are_not_indexed() {
        let link = Element::new(Tag::Anchor).with_children(vec![text("linked words")]);
        let mut root = Element::new(Tag::Root)
            .with_children(vec![paragraph(vec![text("before "), Node::Element(link), text(" after")])]);
        let spans = index_words(&mut root, "a");
        assert_eq!(spans.len(), 2);

        let Node::Element(p) = &root.children[0] else { panic!("expected paragraph") };
        let Node::Element(anchor) = &p.children[2] else { panic!("expected anchor") };
        assert_eq!(anchor.children, vec![text("linked words")]);
    }

    #[test]
    fn numbering_continues_across_paragraphs_and_formatting() {
        let strong = Element::new(Tag::Strong).with_children(vec![text("bold words")]);
        let mut root = Element::new(Tag::Root).with_children(vec![
            paragraph(vec![text("one two")]),
            paragraph(vec![]),
            paragraph(vec![text("three "), Node::Element(strong), Node::Element(Element::new(Tag::Break)), text("six")]),
        ]);
        let spans = index_words(&mut root, "x");
        let indices: Vec<usize> = spans.iter().map(|s| s.word_index).collect();
        assert_eq!(indices, vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn headings_and_code_are_not_paragraphs() {
        let mut root = Element::new(Tag::Root).with_children(vec![
            Node::Element(Element::new(Tag::Heading(1)).with_children(vec![text("Title words")])),
            Node::Element(Element::new(Tag::Pre).with_children(vec![text("let x = 1;")])),
            paragraph(vec![text("body")]),
        ]);
        let spans = index_words(&mut root, "x");
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].word_index, 0);
    }

    #[test]
    fn second_pass_adds_nothing() {
        let mut root = Element::new(Tag::Root).with_children(vec![paragraph(vec![text("a b c")])]);
        assert_eq!(index_words(&mut root, "x").len(), 3);
        assert!(index_words(&mut root, "x").is_empty());
    }

    #[test]
    fn agrees_with_parser_word_indices() {
        let source = "# Heading words\n\nIntro with [[Some Page]] and *emphasis here*.\n\n\
                      - First item. Item body:\n- second `code span`\n\n> Quoted title. Quoted body:\n\n\
                      Start *see [[Page]] now*. Title here. Body text:\n\n\
                      ```\nignored code\n```\n\nLast [link](https://example.com) line  \nafter break.\n";
        let mut root = markdown::render(source).unwrap();
        let spans = index_words(&mut root, "doc");
        let words = parser::words(source);
        assert_eq!(spans.len(), words.len());

        let comments = parser::parse(source);
        assert_eq!(comments.len(), 3);
        assert_eq!(comments[1].title, "Quoted title.");
        assert_eq!(comments[2].title, "Title here.");

        let indexed: Vec<String> = collect_words(&root);
        let at_indices: Vec<&str> = comments[1].indices.iter().map(|i| indexed[*i].as_str()).collect();
        assert_eq!(at_indices, vec!["Quoted", "title.", "Quoted", "body:"]);
        let after_glued: Vec<&str> = comments[2].indices.iter().map(|i| indexed[*i].as_str()).collect();
        assert_eq!(after_glued, vec!["Title", "here.", "Body", "text:"]);
    }

    fn collect_words(element: &Element) -> Vec<String> {
        let mut out = Vec::new();
        for child in &element.children {
            match child {
                Node::Element(inner) => out.extend(collect_words(inner)),
                Node::Word { text, .. } => out.push(text.clone()),
                Node::Text(_) => {},
            }
        }
        out
    }
}
