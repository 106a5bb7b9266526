use html5ever::tendril::TendrilSink;
use html5ever::{Attribute, parse_document};
use markup5ever_rcdom::{Handle, NodeData, RcDom};
use std::cell::RefCell;

use crate::error::{PipelineError, Result};

/// Elements whose subtree never contributes visible text.
const SKIPPED_ELEMENTS: &[&str] = &[
    "head", "script", "style", "noscript", "template", "svg", "iframe", "form", "button", "nav",
    "footer",
];

/// Class/id tokens that mark navigation and other page chrome.
const BOILERPLATE_TOKENS: &[&str] = &[
    "nav",
    "navbar",
    "navigation",
    "menu",
    "sidebar",
    "footer",
    "cookie",
    "cookies",
    "banner",
    "promo",
    "ads",
    "advert",
    "advertisement",
];

/// Turns an HTML document into the plain visible text of its body.
#[derive(Debug, Default)]
pub struct HtmlTextExtractor;

impl HtmlTextExtractor {
    pub fn get_dom(html: &str) -> Result<RcDom> {
        parse_document(RcDom::default(), Default::default())
            .from_utf8()
            .read_from(&mut std::io::Cursor::new(html))
            .map_err(|e| PipelineError::Extraction(format!("failed to parse html: {e}")))
    }

    /// Visible text, one block per line. A page without text yields `""`.
    pub fn extract(html: &str) -> Result<String> {
        let dom = Self::get_dom(html)?;
        let mut out = String::new();
        Self::walk_html(&dom.document, &mut out);
        Ok(Self::compress_whitespace(&out))
    }

    fn has_boilerplate_class_or_id(local: &str, attrs: &RefCell<Vec<Attribute>>) -> bool {
        // The document roots are never page chrome, whatever their classes say.
        if matches!(local, "html" | "body" | "main" | "article") {
            return false;
        }
        attrs
            .borrow()
            .iter()
            .filter(|attr| matches!(&*attr.name.local, "class" | "id" | "role"))
            .any(|attr| {
                attr.value
                    .to_lowercase()
                    .split(|c: char| c.is_whitespace() || c == '-' || c == '_')
                    .any(|token| BOILERPLATE_TOKENS.contains(&token))
            })
    }

    fn is_block_like(local: &str) -> bool {
        matches!(
            local,
            "p" | "div"
                | "section"
                | "article"
                | "main"
                | "aside"
                | "li"
                | "ul"
                | "ol"
                | "br"
                | "tr"
                | "table"
                | "blockquote"
                | "pre"
                | "figcaption"
                | "h1"
                | "h2"
                | "h3"
                | "h4"
                | "h5"
                | "h6"
        )
    }

    fn walk_html(handle: &Handle, out: &mut String) {
        match &handle.data {
            NodeData::Text { contents } => {
                // Whitespace runs, newlines included, collapse to one space.
                // No separator is added between adjacent nodes.
                for c in contents.borrow().chars() {
                    if c.is_whitespace() {
                        if !out.ends_with(char::is_whitespace) {
                            out.push(' ');
                        }
                    } else {
                        out.push(c);
                    }
                }
            }
            NodeData::Element { name, attrs, .. } => {
                let local = &*name.local;
                if SKIPPED_ELEMENTS.contains(&local) || Self::has_boilerplate_class_or_id(local, attrs)
                {
                    return;
                }

                let block = Self::is_block_like(local);
                if block && !out.ends_with('\n') {
                    out.push('\n');
                }
                for child in handle.children.borrow().iter() {
                    Self::walk_html(child, out);
                }
                if block && !out.ends_with('\n') {
                    out.push('\n');
                }
            }
            _ => {
                for child in handle.children.borrow().iter() {
                    Self::walk_html(child, out);
                }
            }
        }
    }

    fn compress_whitespace(text: &str) -> String {
        text.lines()
            .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
            .filter(|line| !line.is_empty())
            .collect::<Vec<_>>()
            .join("\n")
    }
}
