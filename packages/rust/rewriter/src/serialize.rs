//! Deterministic, indented HTML output.
//!
//! Every element starts on its own line, indented one space per depth level,
//! and text nodes are trimmed. Whitespace-sensitive elements are emitted as
//! they are so code samples keep their layout.

use kuchiki::{ElementData, NodeData, NodeRef};

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param",
    "source", "track", "wbr",
];

/// Serialized through html5ever untouched.
const PREFORMATTED: &[&str] = &["pre", "textarea"];

/// Raw text content, never escaped.
const RAW_TEXT: &[&str] = &["script", "style"];

/// Pretty-print a whole document.
pub fn to_pretty_html(document: &NodeRef) -> String {
    let mut out = String::new();
    write_node(document, 0, &mut out);
    out
}

fn write_node(node: &NodeRef, depth: usize, out: &mut String) {
    match node.data() {
        NodeData::Document(_) | NodeData::DocumentFragment => {
            for child in node.children() {
                write_node(&child, depth, out);
            }
        }
        NodeData::Doctype(doctype) => push_line(out, depth, &format!("<!DOCTYPE {}>", doctype.name)),
        NodeData::Comment(text) => push_line(out, depth, &format!("<!--{}-->", text.borrow())),
        NodeData::Text(text) => {
            let text = text.borrow();
            let trimmed = text.trim();
            if !trimmed.is_empty() {
                push_line(out, depth, &escape_text(trimmed));
            }
        }
        NodeData::Element(element) => write_element(node, element, depth, out),
        NodeData::ProcessingInstruction(_) => {}
    }
}

fn write_element(node: &NodeRef, element: &ElementData, depth: usize, out: &mut String) {
    let name: &str = &element.name.local;
    let open = open_tag(element);

    if VOID_ELEMENTS.contains(&name) {
        push_line(out, depth, &open);
        return;
    }
    if PREFORMATTED.contains(&name) {
        push_line(out, depth, &node.to_string());
        return;
    }
    if RAW_TEXT.contains(&name) {
        push_line(out, depth, &format!("{open}{}</{name}>", node.text_contents()));
        return;
    }

    push_line(out, depth, &open);
    // Template content lives in its own fragment, not among the children.
    match &element.template_contents {
        Some(contents) => write_node(contents, depth + 1, out),
        None => {
            for child in node.children() {
                write_node(&child, depth + 1, out);
            }
        }
    }
    push_line(out, depth, &format!("</{name}>"));
}

fn open_tag(element: &ElementData) -> String {
    let mut tag = format!("<{}", &*element.name.local);
    for (name, attribute) in element.attributes.borrow().map.iter() {
        tag.push(' ');
        if let Some(prefix) = &attribute.prefix {
            tag.push_str(prefix);
            tag.push(':');
        }
        tag.push_str(&name.local);
        tag.push_str("=\"");
        tag.push_str(&escape_attribute(&attribute.value));
        tag.push('"');
    }
    tag.push('>');
    tag
}

fn push_line(out: &mut String, depth: usize, content: &str) {
    for _ in 0..depth {
        out.push(' ');
    }
    out.push_str(content);
    out.push('\n');
}

fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn escape_attribute(value: &str) -> String {
    value.replace('&', "&amp;").replace('"', "&quot;")
}
