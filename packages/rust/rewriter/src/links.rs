//! Internal link classification.
//!
//! Downloaded pages link to each other with versioned, extension-less URLs.
//! A [`LinkClassifier`] decides what each such link should point to inside
//! the offline tree.

use regex::Regex;

use poshdocset_shared::{DocsetError, Result};

/// What the rewriter knows about one anchor.
#[derive(Debug, Clone, Copy)]
pub struct LinkContext<'a> {
    pub href: &'a str,
    /// Trimmed text content of the anchor.
    pub text: &'a str,
    /// The anchor's `ms.title` attribute, if any.
    pub title: Option<&'a str>,
}

/// Outcome of classifying a link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkAction {
    /// Point the link at this local target.
    Rewrite(String),
    /// Leave the link alone.
    Unchanged,
}

/// Maps an anchor to its offline target.
pub trait LinkClassifier {
    fn classify(&self, link: &LinkContext<'_>) -> LinkAction;
}

// ---------------------------------------------------------------------------
// Module and command pages
// ---------------------------------------------------------------------------

/// Links inside module and command pages.
///
/// - `./?view=powershell-<v>` is the "back to module" link and becomes
///   `./<anchor text>.html`.
/// - Otherwise the first `Verb-Noun?view=powershell-` token becomes
///   `Verb-Noun.html`, a sibling page in the same module directory.
#[derive(Debug, Clone)]
pub struct DocsLinkClassifier {
    module_sentinel: String,
    command_pattern: Regex,
}

impl DocsLinkClassifier {
    pub fn new(version_query_prefix: &str, version_param: &str) -> Result<Self> {
        let command_pattern = Regex::new(&format!(
            r"(\w+-\w+)\?{}",
            regex::escape(version_query_prefix)
        ))
        .map_err(|e| DocsetError::config(format!("invalid link pattern: {e}")))?;

        Ok(Self {
            module_sentinel: format!("./?{version_param}"),
            command_pattern,
        })
    }
}

impl LinkClassifier for DocsLinkClassifier {
    fn classify(&self, link: &LinkContext<'_>) -> LinkAction {
        if link.href == self.module_sentinel {
            return LinkAction::Rewrite(format!("./{}.html", link.text));
        }

        match self.command_pattern.captures(link.href) {
            Some(caps) => LinkAction::Rewrite(format!("{}.html", &caps[1])),
            None => LinkAction::Unchanged,
        }
    }
}

// ---------------------------------------------------------------------------
// Start page
// ---------------------------------------------------------------------------

/// Links in the start page's module table.
///
/// The versioned path before the query, trimmed of slashes, is joined with
/// the anchor's `ms.title`: `<path>/<title>.html`.
#[derive(Debug, Clone)]
pub struct StartPageLinkClassifier {
    path_pattern: Regex,
}

impl StartPageLinkClassifier {
    pub fn new(version_query_prefix: &str) -> Result<Self> {
        let path_pattern = Regex::new(&format!(
            r"([\w./]+)\?{}",
            regex::escape(version_query_prefix)
        ))
        .map_err(|e| DocsetError::config(format!("invalid start page link pattern: {e}")))?;

        Ok(Self { path_pattern })
    }
}

impl LinkClassifier for StartPageLinkClassifier {
    fn classify(&self, link: &LinkContext<'_>) -> LinkAction {
        let Some(title) = link.title else {
            return LinkAction::Unchanged;
        };
        match self.path_pattern.captures(link.href) {
            Some(caps) => {
                let path = caps[1].trim_matches('/');
                LinkAction::Rewrite(format!("{path}/{title}.html"))
            }
            None => LinkAction::Unchanged,
        }
    }
}
