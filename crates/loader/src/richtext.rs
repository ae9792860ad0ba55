//! Markdown to Contentful rich-text documents.
//!
//! Covers what the council datasets use: paragraphs, headings, lists,
//! links, block quotes, rules and bold/italic/code marks. Anything else is
//! flattened into the surrounding text.

use pulldown_cmark::{Event, Parser, Tag, TagEnd};
use serde_json::{json, Value};

struct Block {
    node_type: String,
    data: Value,
    content: Vec<Value>,
    /// Opened only to give loose inline content a paragraph to live in.
    implicit: bool,
}

impl Block {
    fn new(node_type: impl Into<String>) -> Self {
        Self {
            node_type: node_type.into(),
            data: json!({}),
            content: Vec::new(),
            implicit: false,
        }
    }

    fn into_value(self) -> Value {
        json!({
            "nodeType": self.node_type,
            "data": self.data,
            "content": self.content,
        })
    }
}

struct Builder {
    stack: Vec<Block>,
    marks: Vec<&'static str>,
}

impl Builder {
    fn new() -> Self {
        Self {
            stack: vec![Block::new("document")],
            marks: Vec::new(),
        }
    }

    fn top_type(&self) -> &str {
        self.stack.last().map(|b| b.node_type.as_str()).unwrap_or("document")
    }

    fn open(&mut self, block: Block) {
        self.close_implicit();
        self.stack.push(block);
    }

    fn open_inline(&mut self, block: Block) {
        self.ensure_inline_parent();
        self.stack.push(block);
    }

    fn close(&mut self) {
        self.close_implicit();
        self.pop_into_parent();
    }

    fn close_implicit(&mut self) {
        if self.stack.last().map(|b| b.implicit).unwrap_or(false) {
            self.pop_into_parent();
        }
    }

    fn pop_into_parent(&mut self) {
        if self.stack.len() < 2 {
            return;
        }
        if let Some(block) = self.stack.pop() {
            let value = block.into_value();
            if let Some(parent) = self.stack.last_mut() {
                parent.content.push(value);
            }
        }
    }

    /// Text and hyperlinks may only sit inside paragraphs, headings or links.
    fn ensure_inline_parent(&mut self) {
        if matches!(
            self.top_type(),
            "document" | "list-item" | "blockquote" | "unordered-list" | "ordered-list"
        ) {
            let mut paragraph = Block::new("paragraph");
            paragraph.implicit = true;
            self.stack.push(paragraph);
        }
    }

    fn text(&mut self, value: &str, extra_mark: Option<&'static str>) {
        self.ensure_inline_parent();
        let mut marks: Vec<Value> = self.marks.iter().map(|m| json!({ "type": m })).collect();
        if let Some(mark) = extra_mark {
            marks.push(json!({ "type": mark }));
        }
        let node = json!({
            "nodeType": "text",
            "value": value,
            "marks": marks,
            "data": {},
        });
        if let Some(top) = self.stack.last_mut() {
            top.content.push(node);
        }
    }

    fn leaf(&mut self, node_type: &str) {
        self.close_implicit();
        let node = Block::new(node_type).into_value();
        if let Some(top) = self.stack.last_mut() {
            top.content.push(node);
        }
    }

    fn finish(mut self) -> Value {
        while self.stack.len() > 1 {
            self.pop_into_parent();
        }
        self.stack
            .pop()
            .map(Block::into_value)
            .unwrap_or_else(|| Block::new("document").into_value())
    }
}

/// Convert markdown to a rich-text `document` node.
pub fn markdown_to_rich_text(markdown: &str) -> Value {
    let mut builder = Builder::new();
    for event in Parser::new(markdown) {
        match event {
            Event::Start(tag) => match tag {
                Tag::Paragraph => builder.open(Block::new("paragraph")),
                Tag::Heading { level, .. } => {
                    builder.open(Block::new(format!("heading-{}", level as usize)))
                }
                Tag::List(Some(_)) => builder.open(Block::new("ordered-list")),
                Tag::List(None) => builder.open(Block::new("unordered-list")),
                Tag::Item => builder.open(Block::new("list-item")),
                Tag::BlockQuote(_) => builder.open(Block::new("blockquote")),
                Tag::CodeBlock(_) => {
                    builder.open(Block::new("paragraph"));
                    builder.marks.push("code");
                }
                Tag::Link { dest_url, .. } => {
                    let mut link = Block::new("hyperlink");
                    link.data = json!({ "uri": dest_url.to_string() });
                    builder.open_inline(link);
                }
                Tag::Emphasis => builder.marks.push("italic"),
                Tag::Strong => builder.marks.push("bold"),
                _ => {}
            },
            Event::End(tag) => match tag {
                TagEnd::Paragraph
                | TagEnd::Heading(_)
                | TagEnd::List(_)
                | TagEnd::Item
                | TagEnd::BlockQuote(_)
                | TagEnd::Link => builder.close(),
                TagEnd::CodeBlock => {
                    builder.marks.pop();
                    builder.close();
                }
                TagEnd::Emphasis | TagEnd::Strong => {
                    builder.marks.pop();
                }
                _ => {}
            },
            Event::Text(text) => builder.text(&text, None),
            Event::Code(code) => builder.text(&code, Some("code")),
            Event::SoftBreak => builder.text(" ", None),
            Event::HardBreak => builder.text("\n", None),
            Event::Rule => builder.leaf("hr"),
            _ => {}
        }
    }
    builder.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node_types(value: &Value) -> Vec<&str> {
        value["content"]
            .as_array()
            .map(|nodes| nodes.iter().filter_map(|n| n["nodeType"].as_str()).collect())
            .unwrap_or_default()
    }

    #[test]
    fn plain_paragraph() {
        let doc = markdown_to_rich_text("Call us on 0300 123 4567.");
        assert_eq!(doc["nodeType"], "document");
        assert_eq!(node_types(&doc), vec!["paragraph"]);
        assert_eq!(doc["content"][0]["content"][0]["value"], "Call us on 0300 123 4567.");
    }

    #[test]
    fn empty_markdown_is_empty_document() {
        let doc = markdown_to_rich_text("");
        assert_eq!(doc["nodeType"], "document");
        assert!(doc["content"].as_array().unwrap().is_empty());
    }

    #[test]
    fn headings_carry_level() {
        let doc = markdown_to_rich_text("# Housing\n\n### Opening hours");
        assert_eq!(node_types(&doc), vec!["heading-1", "heading-3"]);
    }

    #[test]
    fn bold_and_italic_become_marks() {
        let doc = markdown_to_rich_text("Apply **today** or *tomorrow*");
        let inline = doc["content"][0]["content"].as_array().unwrap();
        let bold = inline.iter().find(|n| n["value"] == "today").unwrap();
        assert_eq!(bold["marks"], json!([{ "type": "bold" }]));
        let italic = inline.iter().find(|n| n["value"] == "tomorrow").unwrap();
        assert_eq!(italic["marks"], json!([{ "type": "italic" }]));
    }

    #[test]
    fn tight_list_items_wrap_text_in_paragraphs() {
        let doc = markdown_to_rich_text("- Rent arrears\n- Eviction notice\n");
        assert_eq!(node_types(&doc), vec!["unordered-list"]);
        let items = &doc["content"][0];
        assert_eq!(node_types(items), vec!["list-item", "list-item"]);
        assert_eq!(node_types(&items["content"][0]), vec!["paragraph"]);
        assert_eq!(
            items["content"][1]["content"][0]["content"][0]["value"],
            "Eviction notice"
        );
    }

    #[test]
    fn ordered_list() {
        let doc = markdown_to_rich_text("1. Fill in the form\n2. Send it back\n");
        assert_eq!(node_types(&doc), vec!["ordered-list"]);
    }

    #[test]
    fn link_keeps_uri_and_text() {
        let doc = markdown_to_rich_text("See [the council site](https://example.gov.uk/help).");
        let paragraph = &doc["content"][0];
        let link = paragraph["content"]
            .as_array()
            .unwrap()
            .iter()
            .find(|n| n["nodeType"] == "hyperlink")
            .unwrap();
        assert_eq!(link["data"]["uri"], "https://example.gov.uk/help");
        assert_eq!(link["content"][0]["value"], "the council site");
    }

    #[test]
    fn inline_code_is_marked() {
        let doc = markdown_to_rich_text("Quote `REF-123`");
        let inline = doc["content"][0]["content"].as_array().unwrap();
        let code = inline.iter().find(|n| n["value"] == "REF-123").unwrap();
        assert_eq!(code["marks"], json!([{ "type": "code" }]));
    }

    #[test]
    fn rule_between_paragraphs() {
        let doc = markdown_to_rich_text("Above\n\n---\n\nBelow");
        assert_eq!(node_types(&doc), vec!["paragraph", "hr", "paragraph"]);
    }
}
