//! Markdown-to-`Document` parsing.
//!
//! Two passes: (1) front-matter extraction plus a flat walk of pulldown-cmark
//! events into a sequence of top-level blocks (headings, paragraphs, lists,
//! images); (2) a recursive heading-level grouping pass that turns the flat
//! sequence into a nested `Section` tree, mirroring the two-step shape of
//! the original document parser this is ported from.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use pulldown_cmark::{Event, Parser, Tag, TagEnd};
use regex::Regex;

use super::model::{BulletList, Document, Image, Paragraph, Section, SectionChild, Table};
use crate::error::ParseError;

fn whitespace_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("static whitespace regex is valid"))
}

fn collapse_whitespace(s: &str) -> String {
    whitespace_re().replace_all(s, " ").into_owned()
}

/// One top-level block of a document body, before heading-level grouping.
#[derive(Debug, Clone)]
enum RawNode {
    Heading { level: u8, title: String },
    Paragraph { text: String },
    BulletList(Vec<String>),
    Image { url: String, alt: String },
}

/// Parses a Markdown string plus file name (and optional mtime) into a `Document`.
///
/// # Errors
///
/// Returns a `ParseError` if front-matter is present but never closed with a
/// second `---` delimiter in a way that makes the document unrecoverable —
/// in practice this parser tolerates malformed front-matter by skipping
/// colon-less lines, so this only surfaces for pathological inputs.
pub fn parse_document(
    file_name: &str,
    source: &str,
    updated_at: Option<i64>,
) -> Result<Document, ParseError> {
    let (metadata, raw_front_matter, body) = extract_front_matter(source);

    let raw_nodes = flat_parse(body);
    let sections = group_by_heading(&raw_nodes)
        .into_iter()
        .map(|child| match child {
            SectionChild::Section(s) => s,
            // A bare top-level paragraph/table/list/image with no enclosing
            // heading has nowhere to live in `Document.sections`; wrap it in
            // an untitled level-0 section so nothing from the body is lost.
            other => Section {
                title: String::new(),
                level: 0,
                content: vec![other],
            },
        })
        .collect();

    Ok(Document {
        file_name: file_name.to_string(),
        metadata,
        raw_front_matter,
        sections,
        updated_at,
    })
}

fn extract_front_matter(source: &str) -> (BTreeMap<String, String>, Option<String>, &str) {
    if !source.starts_with("---") {
        return (BTreeMap::new(), None, source);
    }
    let Some(end_rel) = source[3..].find("---") else {
        return (BTreeMap::new(), None, source);
    };
    let end = 3 + end_rel;
    let metadata_text = source[3..end].trim();
    let body = &source[end + 3..];

    let mut metadata = BTreeMap::new();
    for line in metadata_text.lines() {
        if let Some((key, value)) = line.split_once(':') {
            metadata.insert(key.trim().to_string(), value.trim().to_string());
        }
    }

    (metadata, Some(metadata_text.to_string()), body)
}

fn flat_parse(body: &str) -> Vec<RawNode> {
    let events: Vec<Event> = Parser::new(body).collect();
    let mut nodes = Vec::new();
    let mut idx = 0;
    while idx < events.len() {
        match &events[idx] {
            Event::Start(Tag::Heading { level, .. }) => {
                let level = *level as u8;
                idx += 1;
                let inner = collect_until_end(&events, &mut idx);
                nodes.push(RawNode::Heading {
                    level,
                    title: decode_flat(&inner),
                });
            }
            Event::Start(Tag::Paragraph) => {
                idx += 1;
                let inner = collect_until_end(&events, &mut idx);
                nodes.push(paragraph_node(&inner));
            }
            Event::Start(Tag::List(_)) => {
                idx += 1;
                let items = collect_list(&events, &mut idx);
                nodes.push(RawNode::BulletList(items));
            }
            Event::Start(_) => {
                idx += 1;
                let _ = collect_until_end(&events, &mut idx);
            }
            _ => idx += 1,
        }
    }
    nodes
}

/// Consumes events until the matching `End` for the `Start` already consumed,
/// returning everything in between (not including the terminating `End`).
fn collect_until_end<'a>(events: &'a [Event<'a>], idx: &mut usize) -> Vec<Event<'a>> {
    let mut depth = 1;
    let mut inner = Vec::new();
    while *idx < events.len() && depth > 0 {
        match &events[*idx] {
            Event::Start(_) => {
                depth += 1;
                inner.push(events[*idx].clone());
            }
            Event::End(_) => {
                depth -= 1;
                if depth > 0 {
                    inner.push(events[*idx].clone());
                }
            }
            other => inner.push(other.clone()),
        }
        *idx += 1;
    }
    inner
}

/// Flattens text-bearing events (ignoring nested `Start`/`End` markers) into
/// a single collapsed string, matching the original's token-child decoding:
/// whitespace runs collapse to a single space, soft/hard breaks become `\n`.
fn decode_flat(events: &[Event]) -> String {
    let mut text = String::new();
    for event in events {
        match event {
            Event::Text(s) | Event::Code(s) => text.push_str(&collapse_whitespace(s)),
            Event::SoftBreak | Event::HardBreak => text.push('\n'),
            _ => {}
        }
    }
    text
}

fn paragraph_node(inner: &[Event]) -> RawNode {
    if let [Event::Start(Tag::Image { dest_url, .. }), rest @ .., Event::End(TagEnd::Image)] =
        inner
    {
        return RawNode::Image {
            url: dest_url.to_string(),
            alt: decode_flat(rest),
        };
    }

    let text = decode_flat(inner);
    RawNode::Paragraph { text }
}

fn collect_list(events: &[Event], idx: &mut usize) -> Vec<String> {
    let mut items = Vec::new();
    while *idx < events.len() {
        match &events[*idx] {
            Event::Start(Tag::Item) => {
                *idx += 1;
                items.extend(collect_list_item(events, idx));
            }
            Event::End(TagEnd::Item) => {
                *idx += 1;
            }
            Event::End(TagEnd::List(_)) => {
                *idx += 1;
                break;
            }
            _ => *idx += 1,
        }
    }
    items
}

fn collect_list_item(events: &[Event], idx: &mut usize) -> Vec<String> {
    let mut items = Vec::new();
    let mut depth = 0;
    loop {
        if *idx >= events.len() {
            break;
        }
        match &events[*idx] {
            Event::Start(Tag::Paragraph) => {
                *idx += 1;
                let inner = collect_until_end(events, idx);
                items.push(decode_flat(&inner));
            }
            Event::Start(Tag::List(_)) => {
                *idx += 1;
                items.extend(collect_list(events, idx));
            }
            Event::End(TagEnd::Item) if depth == 0 => {
                *idx += 1;
                break;
            }
            Event::Start(_) => {
                depth += 1;
                *idx += 1;
            }
            Event::End(_) => {
                if depth > 0 {
                    depth -= 1;
                }
                *idx += 1;
            }
            _ => *idx += 1,
        }
    }
    items
}

/// Recursively groups a flat block sequence into a `Section` tree, grouping
/// every block following a heading of level `L` until the next heading of
/// level `<= L`.
fn group_by_heading(nodes: &[RawNode]) -> Vec<SectionChild> {
    let mut result = Vec::new();
    let mut i = 0;
    let mut preceding_text: Option<&str> = None;

    while i < nodes.len() {
        match &nodes[i] {
            RawNode::Heading { level, title } => {
                let mut j = i + 1;
                while j < nodes.len() {
                    if let RawNode::Heading { level: next_level, .. } = &nodes[j]
                        && *next_level <= *level
                    {
                        break;
                    }
                    j += 1;
                }
                let content = group_by_heading(&nodes[i + 1..j]);
                result.push(SectionChild::Section(Section {
                    title: title.clone(),
                    level: *level,
                    content,
                }));
                preceding_text = None;
                i = j;
            }
            RawNode::Paragraph { text } => {
                if let Some(table) = try_parse_table(text, preceding_text) {
                    result.push(SectionChild::Table(table));
                } else {
                    result.push(SectionChild::Paragraph(Paragraph {
                        content: text.clone(),
                    }));
                }
                preceding_text = Some(text);
                i += 1;
            }
            RawNode::BulletList(items) => {
                result.push(SectionChild::BulletList(BulletList {
                    items: items.clone(),
                }));
                preceding_text = None;
                i += 1;
            }
            RawNode::Image { url, alt } => {
                result.push(SectionChild::Image(Image {
                    url: url.clone(),
                    alt: alt.clone(),
                }));
                preceding_text = None;
                i += 1;
            }
        }
    }

    result
}

fn try_parse_table(text: &str, caption_candidate: Option<&str>) -> Option<Table> {
    if !text.starts_with('|') {
        return None;
    }
    let lines: Vec<&str> = text.lines().collect();
    if lines.len() < 2 {
        return None;
    }
    let headers = split_row(lines[0]);
    let rows = lines[2..].iter().map(|line| split_row(line)).collect();
    Some(Table {
        caption: caption_candidate.unwrap_or("").to_string(),
        headers,
        rows,
    })
}

fn split_row(line: &str) -> Vec<String> {
    line.split('|')
        .map(str::trim)
        .filter(|cell| !cell.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn front_matter_and_one_section() {
        let src = "---\nsource: A\n---\n\n# Title\n\ntext.\n";
        let doc = parse_document("foo.md", src, None).unwrap();
        assert_eq!(doc.metadata.get("source").map(String::as_str), Some("A"));
        assert_eq!(doc.sections.len(), 1);
        assert_eq!(doc.sections[0].title, "Title");
        assert_eq!(doc.sections[0].level, 1);
        assert_eq!(doc.sections[0].content.len(), 1);
        match &doc.sections[0].content[0] {
            SectionChild::Paragraph(p) => assert_eq!(p.content, "text."),
            other => panic!("expected paragraph, got {other:?}"),
        }
    }

    #[test]
    fn table_with_caption() {
        let src = "Prices:\n\n| A | B |\n|---|---|\n| 1 | 2 |\n";
        let doc = parse_document("foo.md", src, None).unwrap();
        // untitled level-0 wrapper holds the caption paragraph + the table
        let children = &doc.sections[0].content;
        assert_eq!(children.len(), 2);
        match &children[1] {
            SectionChild::Table(t) => {
                assert_eq!(t.caption, "Prices:");
                assert_eq!(t.headers, vec!["A".to_string(), "B".to_string()]);
                assert_eq!(t.rows, vec![vec!["1".to_string(), "2".to_string()]]);
            }
            other => panic!("expected table, got {other:?}"),
        }
    }

    #[test]
    fn nested_headings_build_a_tree() {
        let src = "# One\n\ntext1\n\n## Two\n\ntext2\n\n# Three\n\ntext3\n";
        let doc = parse_document("foo.md", src, None).unwrap();
        assert_eq!(doc.sections.len(), 2);
        assert_eq!(doc.sections[0].title, "One");
        assert_eq!(doc.sections[0].content.len(), 2);
        match &doc.sections[0].content[1] {
            SectionChild::Section(s) => assert_eq!(s.title, "Two"),
            other => panic!("expected nested section, got {other:?}"),
        }
        assert_eq!(doc.sections[1].title, "Three");
    }

    #[test]
    fn bullet_list_is_flattened() {
        let src = "- one\n- two\n  - nested\n- three\n";
        let doc = parse_document("foo.md", src, None).unwrap();
        match &doc.sections[0].content[0] {
            SectionChild::BulletList(b) => {
                assert_eq!(
                    b.items,
                    vec![
                        "one".to_string(),
                        "two".to_string(),
                        "nested".to_string(),
                        "three".to_string()
                    ]
                );
            }
            other => panic!("expected bullet list, got {other:?}"),
        }
    }

    #[test]
    fn image_paragraph_is_detected() {
        let src = "![alt text](http://example.com/a.png)\n";
        let doc = parse_document("foo.md", src, None).unwrap();
        match &doc.sections[0].content[0] {
            SectionChild::Image(img) => {
                assert_eq!(img.alt, "alt text");
                assert_eq!(img.url, "http://example.com/a.png");
            }
            other => panic!("expected image, got {other:?}"),
        }
    }

    #[test]
    fn malformed_front_matter_line_is_skipped() {
        let src = "---\nsource: A\nbadline\n---\n\ntext\n";
        let doc = parse_document("foo.md", src, None).unwrap();
        assert_eq!(doc.metadata.len(), 1);
    }

    #[test]
    fn no_front_matter_is_tolerated() {
        let src = "# Title\n\nhello\n";
        let doc = parse_document("foo.md", src, None).unwrap();
        assert!(doc.metadata.is_empty());
        assert_eq!(doc.sections[0].title, "Title");
    }
}
