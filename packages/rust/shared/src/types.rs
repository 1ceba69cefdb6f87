//! Core domain types for the PowerShell docset.

use serde::{Deserialize, Serialize};

use crate::error::{DocsetError, Result};

/// TOC labels that group non-command pages and never become commands.
pub const RESERVED_LABELS: &[&str] = &["about", "functions", "providers", "provider"];

/// Case-insensitive check against [`RESERVED_LABELS`].
pub fn is_reserved_label(label: &str) -> bool {
    let label = label.trim();
    RESERVED_LABELS
        .iter()
        .any(|reserved| reserved.eq_ignore_ascii_case(label))
}

// ---------------------------------------------------------------------------
// Remote TOC document
// ---------------------------------------------------------------------------

/// Root of the site's `toc.json`. Modules are `items[0].children`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TocDocument {
    pub items: Vec<TocNode>,
}

/// One TOC entry: a module at the first level, a command below it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TocNode {
    pub toc_title: String,
    #[serde(default)]
    pub href: Option<String>,
    #[serde(default)]
    pub children: Vec<TocNode>,
}

impl TocDocument {
    /// The module entries, or a parse error if the document has no root item.
    pub fn modules(&self) -> Result<&[TocNode]> {
        self.items
            .first()
            .map(|root| root.children.as_slice())
            .ok_or_else(|| DocsetError::parse("TOC document has no root item"))
    }
}

// ---------------------------------------------------------------------------
// ContentToc
// ---------------------------------------------------------------------------

/// A downloaded command page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandRecord {
    pub name: String,
    /// Relative to the staging root, `/`-separated.
    pub path: String,
}

/// A downloaded module and the commands listed under it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleRecord {
    pub name: String,
    /// Module index page, relative to the staging root.
    pub index: String,
    #[serde(default)]
    pub commands: Vec<CommandRecord>,
}

impl ModuleRecord {
    pub fn new(name: impl Into<String>, index: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            index: index.into(),
            commands: Vec::new(),
        }
    }

    /// Append a command. Returns `false` and drops it if the name is reserved.
    pub fn push_command(&mut self, command: CommandRecord) -> bool {
        if is_reserved_label(&command.name) {
            return false;
        }
        self.commands.push(command);
        true
    }
}

/// Ordered module name → record map produced by the crawl.
///
/// Insertion order is preserved; re-inserting a name replaces the record in
/// place.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentToc {
    modules: Vec<ModuleRecord>,
}

impl ContentToc {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, module: ModuleRecord) {
        match self.modules.iter_mut().find(|m| m.name == module.name) {
            Some(existing) => *existing = module,
            None => self.modules.push(module),
        }
    }

    pub fn get(&self, name: &str) -> Option<&ModuleRecord> {
        self.modules.iter().find(|m| m.name == name)
    }

    pub fn modules(&self) -> &[ModuleRecord] {
        &self.modules
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    pub fn command_count(&self) -> usize {
        self.modules.iter().map(|m| m.commands.len()).sum()
    }
}

// ---------------------------------------------------------------------------
// Theme resources and index entries
// ---------------------------------------------------------------------------

/// A theme stylesheet referenced by a rewritten page.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ThemeResource {
    /// Absolute source URL.
    pub url: String,
    /// Destination relative to the staging root, `/`-separated.
    pub path: String,
}

/// The `type` column of the docset search index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntryType {
    Module,
    Cmdlet,
}

impl EntryType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Module => "Module",
            Self::Cmdlet => "Cmdlet",
        }
    }
}

impl std::fmt::Display for EntryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EntryType {
    type Err = DocsetError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Module" => Ok(Self::Module),
            "Cmdlet" => Ok(Self::Cmdlet),
            other => Err(DocsetError::parse(format!("unknown entry type: {other}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserved_labels_any_case() {
        assert!(is_reserved_label("About"));
        assert!(is_reserved_label("FUNCTIONS"));
        assert!(is_reserved_label("provider"));
        assert!(!is_reserved_label("Get-Help"));
    }

    #[test]
    fn module_rejects_reserved_commands() {
        let mut module = ModuleRecord::new("Microsoft.PowerShell.Core", "a/b.html");
        assert!(!module.push_command(CommandRecord {
            name: "Providers".into(),
            path: "a/Providers.html".into(),
        }));
        assert!(module.push_command(CommandRecord {
            name: "Get-Help".into(),
            path: "a/Get-Help.html".into(),
        }));
        assert_eq!(module.commands.len(), 1);
    }

    #[test]
    fn content_toc_replaces_in_place() {
        let mut toc = ContentToc::new();
        toc.insert(ModuleRecord::new("A", "a.html"));
        toc.insert(ModuleRecord::new("B", "b.html"));
        toc.insert(ModuleRecord::new("A", "a2.html"));

        let names: Vec<_> = toc.modules().iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, ["A", "B"]);
        assert_eq!(toc.get("A").unwrap().index, "a2.html");
    }

    #[test]
    fn toc_document_parses_site_shape() {
        let json = r#"{"items":[{"toc_title":"PowerShell","children":[
            {"toc_title":"Microsoft.PowerShell.Core","href":"Microsoft.PowerShell.Core/Microsoft.PowerShell.Core",
             "children":[{"toc_title":"Get-Help","href":"Microsoft.PowerShell.Core/Get-Help"}]}
        ]}]}"#;
        let doc: TocDocument = serde_json::from_str(json).unwrap();
        let modules = doc.modules().unwrap();
        assert_eq!(modules.len(), 1);
        assert_eq!(modules[0].children[0].toc_title, "Get-Help");
        assert!(modules[0].children[0].children.is_empty());
    }

    #[test]
    fn empty_toc_document_is_parse_error() {
        let doc: TocDocument = serde_json::from_str(r#"{"items":[]}"#).unwrap();
        assert!(matches!(doc.modules(), Err(DocsetError::Parse { .. })));
    }

    #[test]
    fn content_toc_serializes_as_list() {
        let mut toc = ContentToc::new();
        toc.insert(ModuleRecord::new("A", "a.html"));
        let json = serde_json::to_string(&toc).unwrap();
        assert!(json.starts_with('['));
        let back: ContentToc = serde_json::from_str(&json).unwrap();
        assert_eq!(back, toc);
    }
}
