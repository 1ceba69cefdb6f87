//! Removal of site chrome (navigation, search, footers, scripts).

use kuchiki::iter::NodeIterator;
use kuchiki::{ElementData, NodeRef};
use tracing::debug;

/// An element to strip: tag name plus required attribute values.
#[derive(Debug, Clone, Copy)]
pub struct ElementPattern {
    pub tag: &'static str,
    pub attrs: &'static [(&'static str, &'static str)],
}

impl ElementPattern {
    const fn new(tag: &'static str, attrs: &'static [(&'static str, &'static str)]) -> Self {
        Self { tag, attrs }
    }

    /// All attributes must match. A `class` value matches either the whole
    /// attribute or, for a single-word pattern, any one class token.
    pub fn matches(&self, element: &ElementData) -> bool {
        if &*element.name.local != self.tag {
            return false;
        }
        let attributes = element.attributes.borrow();
        self.attrs.iter().all(|(name, expected)| {
            let Some(actual) = attributes.get(*name) else {
                return false;
            };
            if actual.trim() == *expected {
                return true;
            }
            *name == "class"
                && !expected.contains(char::is_whitespace)
                && actual.split_whitespace().any(|token| token == *expected)
        })
    }
}

/// Chrome present on every module and command page.
pub const PAGE_CHROME: &[ElementPattern] = &[
    ElementPattern::new("nav", &[("class", "doc-outline"), ("role", "navigation")]),
    ElementPattern::new("ul", &[("class", "breadcrumbs"), ("role", "navigation")]),
    ElementPattern::new("div", &[("class", "sidebar"), ("role", "navigation")]),
    ElementPattern::new("div", &[("class", "dropdown dropdown-full mobilenavi")]),
    ElementPattern::new("p", &[("class", "api-browser-description")]),
    ElementPattern::new("div", &[("class", "api-browser-search-field-container")]),
    ElementPattern::new("div", &[("class", "pageActions")]),
    ElementPattern::new("div", &[("class", "container footerContainer")]),
    ElementPattern::new("div", &[("class", "dropdown-container")]),
];

/// The start page additionally drops the site header.
pub const START_PAGE_HEADER: ElementPattern =
    ElementPattern::new("div", &[("data-bi-name", "header"), ("id", "headerAreaHolder")]);

/// Detach every element matching any of `patterns`. Returns how many went.
pub fn remove_matching(document: &NodeRef, patterns: &[ElementPattern]) -> usize {
    let doomed: Vec<NodeRef> = document
        .descendants()
        .elements()
        .filter(|element| patterns.iter().any(|p| p.matches(element)))
        .map(|element| element.as_node().clone())
        .collect();

    for node in &doomed {
        node.detach();
    }
    if !doomed.is_empty() {
        debug!(removed = doomed.len(), "removed page chrome");
    }
    doomed.len()
}

/// Drop every `<script>` inside `<head>`.
pub fn remove_head_scripts(document: &NodeRef) -> usize {
    detach_all(document, "head script", |_| true)
}

/// Drop `<body>` scripts that carry both `async` and `defer`.
pub fn remove_deferred_body_scripts(document: &NodeRef) -> usize {
    detach_all(document, "body script", |element| {
        let attributes = element.attributes.borrow();
        attributes.contains("async") && attributes.contains("defer")
    })
}

fn detach_all(document: &NodeRef, selector: &str, keep: impl Fn(&ElementData) -> bool) -> usize {
    // Collected first: detaching while iterating a selection skips siblings.
    let matches: Vec<NodeRef> = match document.select(selector) {
        Ok(selection) => selection
            .filter(|element| keep(element))
            .map(|element| element.as_node().clone())
            .collect(),
        Err(()) => return 0,
    };

    for node in &matches {
        node.detach();
    }
    matches.len()
}
