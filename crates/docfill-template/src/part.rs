//! Rewrites one WordprocessingML part (`word/document.xml`, headers, footers, ...).
//!
//! Sections whose tags share a paragraph render inline. A section whose open
//! and close tags each sit alone in sibling paragraphs repeats the paragraphs
//! between them; the tag paragraphs themselves are dropped.

use std::collections::{HashMap, HashSet};

use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use serde_json::{Map, Value};

use crate::scan::{scan_paragraph, ParagraphScan, Piece, Tag, TagError, TagKind};
use crate::section::{pair_sections, Scope};

const PARAGRAPH: &str = "w:p";
const TEXT: &str = "w:t";
const BREAK: &str = "w:br";

/// Rendered part bytes plus the tag errors found in it
pub(crate) struct RenderedPart {
    pub xml: Vec<u8>,
    pub errors: Vec<TagError>,
}

/// A `<w:t>` text event and the start tag that owns it
struct TextNode {
    start: usize,
    text: usize,
}

/// Output of a rewritten text node
#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Text(String),
    Break,
}

struct Paragraph {
    start: usize,
    end: usize,
    /// Start event of the enclosing element
    parent: Option<usize>,
    nodes: Vec<TextNode>,
    scan: ParagraphScan,
    /// (node, piece) for every piece, in reading order
    items: Vec<(usize, usize)>,
    /// Inline sections: opening item -> closing item
    inline: HashMap<usize, usize>,
}

/// A tag located in the part
struct TagRef {
    paragraph: usize,
    item: usize,
    tag: usize,
    text_event: usize,
}

/// Paragraphs repeated by a section
#[derive(Clone, Copy)]
struct Repeat {
    open: usize,
    tag: usize,
    close: usize,
}

struct Layout {
    events: Vec<Event<'static>>,
    paragraphs: Vec<Paragraph>,
    /// Paragraph start event -> paragraph
    by_start: HashMap<usize, usize>,
    /// Opening paragraph -> repeat
    repeats: HashMap<usize, Repeat>,
    /// `<w:t>` starts of tagged paragraphs
    preserve: HashSet<usize>,
}

pub(crate) fn render_part(
    xml: &[u8],
    data: &Map<String, Value>,
) -> Result<RenderedPart, quick_xml::Error> {
    let events = read_events(xml)?;
    let mut paragraphs = collect_paragraphs(&events)?;

    let mut errors: Vec<TagError> = paragraphs
        .iter()
        .flat_map(|p| p.scan.errors.iter().cloned())
        .collect();

    if !paragraphs.iter().any(|p| p.scan.has_tags()) {
        return Ok(RenderedPart {
            xml: xml.to_vec(),
            errors,
        });
    }

    let repeats = match_sections(&mut paragraphs, &mut errors);
    if !errors.is_empty() {
        return Ok(RenderedPart {
            xml: xml.to_vec(),
            errors,
        });
    }

    let by_start = paragraphs.iter().enumerate().map(|(i, p)| (p.start, i)).collect();
    let preserve = paragraphs
        .iter()
        .filter(|p| p.scan.has_tags())
        .flat_map(|p| p.nodes.iter().map(|n| n.start))
        .collect();
    let layout = Layout {
        events,
        paragraphs,
        by_start,
        repeats,
        preserve,
    };

    let mut out = Output {
        writer: Writer::new(Vec::with_capacity(xml.len())),
        rewritten: HashMap::new(),
    };
    let mut scope = Scope::new(data);
    render_range(&layout, 0, layout.events.len(), &mut scope, &mut out)?;

    Ok(RenderedPart {
        xml: out.writer.into_inner(),
        errors,
    })
}

fn read_events(xml: &[u8]) -> Result<Vec<Event<'static>>, quick_xml::Error> {
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut events = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Eof => break,
            event => events.push(event.into_owned()),
        }
        buf.clear();
    }

    Ok(events)
}

/// Scan every paragraph, nested ones (text boxes) included, in document order
fn collect_paragraphs(events: &[Event<'static>]) -> Result<Vec<Paragraph>, quick_xml::Error> {
    // (start event, parent, text nodes)
    let mut open: Vec<(usize, Option<usize>, Vec<TextNode>)> = Vec::new();
    let mut elements: Vec<usize> = Vec::new();
    let mut open_text: Option<usize> = None;
    let mut paragraphs = Vec::new();

    for (idx, event) in events.iter().enumerate() {
        match event {
            Event::Start(e) => {
                let name = e.name();
                if name.as_ref() == PARAGRAPH.as_bytes() {
                    open.push((idx, elements.last().copied(), Vec::new()));
                } else if name.as_ref() == TEXT.as_bytes() {
                    open_text = Some(idx);
                }
                elements.push(idx);
            }
            Event::End(e) => {
                elements.pop();
                let name = e.name();
                if name.as_ref() == TEXT.as_bytes() {
                    open_text = None;
                } else if name.as_ref() == PARAGRAPH.as_bytes() {
                    if let Some((start, parent, nodes)) = open.pop() {
                        paragraphs.push(scan_nodes(events, start, idx, parent, nodes)?);
                    }
                }
            }
            Event::Text(_) => {
                if let (Some(start), Some((_, _, nodes))) = (open_text, open.last_mut()) {
                    nodes.push(TextNode { start, text: idx });
                }
            }
            _ => {}
        }
    }

    paragraphs.sort_by_key(|p| p.start);
    Ok(paragraphs)
}

fn scan_nodes(
    events: &[Event<'static>],
    start: usize,
    end: usize,
    parent: Option<usize>,
    nodes: Vec<TextNode>,
) -> Result<Paragraph, quick_xml::Error> {
    let texts = nodes
        .iter()
        .map(|node| match &events[node.text] {
            Event::Text(t) => t.unescape().map(|s| s.into_owned()),
            _ => Ok(String::new()),
        })
        .collect::<Result<Vec<_>, _>>()?;

    let scan = scan_paragraph(&texts);
    let items = scan
        .nodes
        .iter()
        .enumerate()
        .flat_map(|(node, pieces)| (0..pieces.len()).map(move |piece| (node, piece)))
        .collect();

    Ok(Paragraph {
        start,
        end,
        parent,
        nodes,
        scan,
        items,
        inline: HashMap::new(),
    })
}

/// Pair section tags across the part and decide how each section renders
fn match_sections(
    paragraphs: &mut [Paragraph],
    errors: &mut Vec<TagError>,
) -> HashMap<usize, Repeat> {
    let mut refs: Vec<TagRef> = Vec::new();
    for (index, paragraph) in paragraphs.iter().enumerate() {
        for (item, &(node, piece)) in paragraph.items.iter().enumerate() {
            if let Piece::Tag(tag) = paragraph.scan.nodes[node][piece] {
                refs.push(TagRef {
                    paragraph: index,
                    item,
                    tag,
                    text_event: paragraph.nodes[node].text,
                });
            }
        }
    }
    refs.sort_by_key(|r| (r.text_event, r.item));

    let tags: Vec<&Tag> = refs
        .iter()
        .map(|r| &paragraphs[r.paragraph].scan.tags[r.tag])
        .collect();
    let pairing = pair_sections(&tags);
    errors.extend(pairing.errors);

    let mut repeats = HashMap::new();
    let mut inline = Vec::new();
    for (open, close) in pairing.pairs {
        let first = &refs[open];
        let last = &refs[close];
        if first.paragraph == last.paragraph {
            let spans_paragraphs = refs[open..close]
                .iter()
                .any(|r| r.paragraph != first.paragraph);
            if spans_paragraphs {
                errors.push(TagError::unbalanced_loop(&tags[open].name));
            } else {
                inline.push((first.paragraph, first.item, last.item));
            }
            continue;
        }

        let opening = &paragraphs[first.paragraph];
        let closing = &paragraphs[last.paragraph];
        let siblings = opening.parent == closing.parent && opening.end < closing.start;
        if siblings && opening.scan.is_standalone_tag() && closing.scan.is_standalone_tag() {
            repeats.insert(
                first.paragraph,
                Repeat {
                    open: first.paragraph,
                    tag: first.tag,
                    close: last.paragraph,
                },
            );
        } else {
            errors.push(TagError::unbalanced_loop(&tags[open].name));
        }
    }

    for (paragraph, open, close) in inline {
        paragraphs[paragraph].inline.insert(open, close);
    }
    repeats
}

struct Output {
    writer: Writer<Vec<u8>>,
    /// Text event -> segments for the paragraph pass being written
    rewritten: HashMap<usize, Vec<Segment>>,
}

/// Write events `from..to` under `scope`
fn render_range(
    layout: &Layout,
    from: usize,
    to: usize,
    scope: &mut Scope<'_>,
    out: &mut Output,
) -> Result<(), quick_xml::Error> {
    let mut idx = from;
    while idx < to {
        if let Some(&index) = layout.by_start.get(&idx) {
            if let Some(&repeat) = layout.repeats.get(&index) {
                let open = &layout.paragraphs[repeat.open];
                let close = &layout.paragraphs[repeat.close];
                let tag = &open.scan.tags[repeat.tag];
                for item in scope.iterations(tag) {
                    if let Some(value) = item {
                        scope.push(value);
                    }
                    render_range(layout, open.end + 1, close.start, scope, out)?;
                    if item.is_some() {
                        scope.pop();
                    }
                }
                idx = close.end + 1;
                continue;
            }

            let paragraph = &layout.paragraphs[index];
            if paragraph.scan.has_tags() {
                let segments = render_paragraph(paragraph, scope);
                for (node, segments) in paragraph.nodes.iter().zip(segments) {
                    out.rewritten.insert(node.text, segments);
                }
            }
        }

        match &layout.events[idx] {
            Event::Start(e) if layout.preserve.contains(&idx) => {
                out.writer
                    .write_event(Event::Start(with_preserved_space(e.clone())))?;
            }
            Event::Text(_) if out.rewritten.contains_key(&idx) => {
                for segment in &out.rewritten[&idx] {
                    write_segment(&mut out.writer, segment)?;
                }
            }
            other => out.writer.write_event(other.clone())?,
        }
        idx += 1;
    }
    Ok(())
}

/// Segments for each text node of `paragraph`; everything a tag produces
/// lands in the node where the tag starts
fn render_paragraph(paragraph: &Paragraph, scope: &mut Scope<'_>) -> Vec<Vec<Segment>> {
    let mut out = vec![Vec::new(); paragraph.nodes.len()];
    let mut item = 0;
    while item < paragraph.items.len() {
        let (node, _) = paragraph.items[item];
        item = render_item(paragraph, item, scope, &mut out[node]);
    }
    out
}

/// Render one item, or a whole inline section, and return the next item
fn render_item(
    paragraph: &Paragraph,
    item: usize,
    scope: &mut Scope<'_>,
    out: &mut Vec<Segment>,
) -> usize {
    let (node, piece) = paragraph.items[item];
    match &paragraph.scan.nodes[node][piece] {
        Piece::Text(text) => push_text(out, text),
        Piece::Tag(index) => {
            let tag = &paragraph.scan.tags[*index];
            match tag.kind {
                TagKind::Value => push_value(out, &scope.text(&tag.name)),
                TagKind::Section | TagKind::Inverted => {
                    let close = paragraph.inline.get(&item).copied().unwrap_or(item);
                    for value in scope.iterations(tag) {
                        if let Some(value) = value {
                            scope.push(value);
                        }
                        let mut next = item + 1;
                        while next < close {
                            next = render_item(paragraph, next, scope, out);
                        }
                        if value.is_some() {
                            scope.pop();
                        }
                    }
                    return close + 1;
                }
                TagKind::Close => {}
            }
        }
    }
    item + 1
}

fn push_text(out: &mut Vec<Segment>, text: &str) {
    if text.is_empty() {
        return;
    }
    match out.last_mut() {
        Some(Segment::Text(last)) => last.push_str(text),
        _ => out.push(Segment::Text(text.to_string())),
    }
}

/// Newlines in values become line breaks
fn push_value(out: &mut Vec<Segment>, value: &str) {
    for (i, line) in value.split('\n').enumerate() {
        if i > 0 {
            out.push(Segment::Break);
        }
        push_text(out, line);
    }
}

fn write_segment(writer: &mut Writer<Vec<u8>>, segment: &Segment) -> Result<(), quick_xml::Error> {
    match segment {
        Segment::Text(text) => writer.write_event(Event::Text(BytesText::new(text))),
        Segment::Break => {
            writer.write_event(Event::End(BytesEnd::new(TEXT)))?;
            writer.write_event(Event::Empty(BytesStart::new(BREAK)))?;
            writer.write_event(Event::Start(with_preserved_space(BytesStart::new(TEXT))))
        }
    }
}

/// Rewritten runs can start or end with spaces; keep Word from collapsing them
fn with_preserved_space(mut start: BytesStart<'static>) -> BytesStart<'static> {
    let has_space = start
        .attributes()
        .flatten()
        .any(|attr| attr.key.as_ref() == b"xml:space");
    if !has_space {
        start.push_attribute(("xml:space", "preserve"));
    }
    start
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn render(xml: &str, data: Value) -> (String, Vec<TagError>) {
        let data = data.as_object().cloned().unwrap_or_default();
        let part = render_part(xml.as_bytes(), &data).unwrap();
        (String::from_utf8(part.xml).unwrap(), part.errors)
    }

    fn ids(errors: &[TagError]) -> Vec<&'static str> {
        errors.iter().map(|e| e.id).collect()
    }

    fn p(text: &str) -> String {
        format!("<w:p><w:r><w:t>{text}</w:t></w:r></w:p>")
    }

    fn rendered_p(text: &str) -> String {
        format!(r#"<w:p><w:r><w:t xml:space="preserve">{text}</w:t></w:r></w:p>"#)
    }

    fn body(paragraphs: &[&str]) -> String {
        let inner: String = paragraphs.iter().map(|t| p(t)).collect();
        format!("<w:body>{inner}</w:body>")
    }

    #[test]
    fn test_replaces_tag_split_across_runs() {
        let xml = concat!(
            r#"<w:document><w:body><w:p>"#,
            r#"<w:r><w:t>Hello {</w:t></w:r>"#,
            r#"<w:r><w:rPr><w:b/></w:rPr><w:t>name</w:t></w:r>"#,
            r#"<w:r><w:t>}!</w:t></w:r>"#,
            r#"</w:p></w:body></w:document>"#
        );

        let (out, errors) = render(xml, json!({"name": "Ada & Co"}));

        assert!(errors.is_empty());
        assert_eq!(
            out,
            concat!(
                r#"<w:document><w:body><w:p>"#,
                r#"<w:r><w:t xml:space="preserve">Hello Ada &amp; Co</w:t></w:r>"#,
                r#"<w:r><w:rPr><w:b/></w:rPr><w:t xml:space="preserve"></w:t></w:r>"#,
                r#"<w:r><w:t xml:space="preserve">!</w:t></w:r>"#,
                r#"</w:p></w:body></w:document>"#
            )
        );
    }

    #[test]
    fn test_untouched_part_is_byte_identical() {
        let xml = r#"<?xml version="1.0"?><w:document><w:p><w:r><w:t>plain</w:t></w:r></w:p></w:document>"#;
        let (out, errors) = render(xml, json!({}));
        assert!(errors.is_empty());
        assert_eq!(out, xml);
    }

    #[test]
    fn test_line_breaks() {
        let (out, _) = render(&p("{addr}"), json!({"addr": "a\nb"}));
        assert_eq!(
            out,
            r#"<w:p><w:r><w:t xml:space="preserve">a</w:t><w:br/><w:t xml:space="preserve">b</w:t></w:r></w:p>"#
        );
    }

    #[test]
    fn test_tags_do_not_span_paragraphs() {
        let (_, errors) = render(&body(&["{open", "close}"]), json!({}));
        assert_eq!(ids(&errors), vec!["unclosed_tag", "unopened_tag"]);
    }

    #[test]
    fn test_existing_space_attribute_is_kept() {
        let xml = r#"<w:p><w:r><w:t xml:space="preserve"> {x} </w:t></w:r></w:p>"#;
        let (out, _) = render(xml, json!({"x": 1}));
        assert_eq!(out, r#"<w:p><w:r><w:t xml:space="preserve"> 1 </w:t></w:r></w:p>"#);
    }

    #[test]
    fn test_malformed_xml_is_an_error() {
        assert!(render_part(b"<w:p><w:t>x</w:p>", &Map::new()).is_err());
    }

    #[test]
    fn test_inline_conditional_sections() {
        let xml = p("{#vip}Dear VIP {name}{/vip}{^vip}Hello {name}{/}");

        let (out, errors) = render(&xml, json!({"vip": true, "name": "Ada"}));
        assert!(errors.is_empty());
        assert_eq!(out, rendered_p("Dear VIP Ada"));

        let (out, _) = render(&xml, json!({"vip": 0, "name": "Ada"}));
        assert_eq!(out, rendered_p("Hello Ada"));

        let (out, _) = render(&xml, json!({"name": "Ada"}));
        assert_eq!(out, rendered_p("Hello Ada"));
    }

    #[test]
    fn test_inline_section_over_array() {
        let xml = p("Items: {#items}{name} x{qty}; {/items}done");
        let data = json!({"items": [{"name": "pen", "qty": 2}, {"name": "ink", "qty": 1}]});

        let (out, errors) = render(&xml, data);

        assert!(errors.is_empty());
        assert_eq!(out, rendered_p("Items: pen x2; ink x1; done"));
    }

    #[test]
    fn test_inline_section_split_across_runs() {
        let xml = concat!(
            "<w:p>",
            "<w:r><w:t>{#show}A</w:t></w:r>",
            "<w:r><w:t>B{/sh</w:t></w:r>",
            "<w:r><w:t>ow}C</w:t></w:r>",
            "</w:p>"
        );

        let (out, errors) = render(xml, json!({"show": "yes"}));

        assert!(errors.is_empty());
        assert_eq!(
            out,
            concat!(
                "<w:p>",
                r#"<w:r><w:t xml:space="preserve">AB</w:t></w:r>"#,
                r#"<w:r><w:t xml:space="preserve"></w:t></w:r>"#,
                r#"<w:r><w:t xml:space="preserve">C</w:t></w:r>"#,
                "</w:p>"
            )
        );
    }

    #[test]
    fn test_paragraph_loop_repeats_paragraphs() {
        let xml = body(&["Header", "{#rows}", "{name}: {city}", "{/rows}", "Footer {city}"]);
        let data = json!({
            "city": "Oslo",
            "rows": [{"name": "Ada"}, {"name": "Bob", "city": "Rome"}]
        });

        let (out, errors) = render(&xml, data);

        assert!(errors.is_empty());
        let expected = [
            p("Header"),
            rendered_p("Ada: Oslo"),
            rendered_p("Bob: Rome"),
            rendered_p("Footer Oslo"),
        ]
        .concat();
        assert_eq!(out, format!("<w:body>{expected}</w:body>"));
    }

    #[test]
    fn test_paragraph_loop_over_empty_array_and_inverted() {
        let xml = body(&["{#rows}", "{name}", "{/rows}", "{^rows}", "No rows", "{/rows}"]);

        let (out, errors) = render(&xml, json!({"rows": []}));

        assert!(errors.is_empty());
        assert_eq!(out, format!("<w:body>{}</w:body>", p("No rows")));
    }

    #[test]
    fn test_nested_paragraph_loops() {
        let xml = body(&["{#groups}", "{title}", "{#members}", "- {.}", "{/members}", "{/groups}"]);
        let data = json!({"groups": [
            {"title": "A", "members": ["x", "y"]},
            {"title": "B", "members": []}
        ]});

        let (out, errors) = render(&xml, data);

        assert!(errors.is_empty());
        let expected = [
            rendered_p("A"),
            rendered_p("- x"),
            rendered_p("- y"),
            rendered_p("B"),
        ]
        .concat();
        assert_eq!(out, format!("<w:body>{expected}</w:body>"));
    }

    #[test]
    fn test_unmatched_sections_are_reported() {
        let xml = p("{#items}{name}{/items} and {#open} only");
        let (out, errors) = render(&xml, json!({"items": [{"name": "a"}]}));
        assert_eq!(ids(&errors), vec!["unclosed_loop"]);
        assert_eq!(out, xml);

        let (_, errors) = render(&body(&["{name}", "{/items}"]), json!({}));
        assert_eq!(ids(&errors), vec!["unopened_loop"]);
    }

    #[test]
    fn test_mismatched_sections_are_reported() {
        let (_, errors) = render(&p("{#a}{#b}x{/a}{/b}"), json!({}));
        assert_eq!(
            ids(&errors),
            vec![
                "closing_tag_does_not_match_opening_tag",
                "closing_tag_does_not_match_opening_tag",
            ]
        );
    }

    #[test]
    fn test_section_across_paragraphs_with_text_is_unbalanced() {
        let (_, errors) = render(&body(&["Rows: {#rows}", "{name}", "{/rows}"]), json!({}));
        assert_eq!(ids(&errors), vec!["unbalanced_loop_tags"]);

        let (_, errors) = render(&body(&["{#a}{name}", "x{/a}"]), json!({}));
        assert_eq!(ids(&errors), vec!["unbalanced_loop_tags"]);
    }

    #[test]
    fn test_paragraph_loop_tags_must_be_siblings() {
        let xml = concat!(
            "<w:body><w:tbl><w:tr><w:tc>",
            "<w:p><w:r><w:t>{#rows}</w:t></w:r></w:p>",
            "</w:tc></w:tr></w:tbl>",
            "<w:p><w:r><w:t>{/rows}</w:t></w:r></w:p>",
            "</w:body>"
        );
        let (_, errors) = render(xml, json!({"rows": [1]}));
        assert_eq!(ids(&errors), vec!["unbalanced_loop_tags"]);
    }
}
