use serde::Deserialize;
use serde::Serialize;
use std::path::PathBuf;

/// Macro prefixes recognized in related-path patterns.
pub const PROJECT_MACRO: &str = "PROJECT/";
pub const MODULE_MACRO: &str = "MODULE/";
pub const WILDCARD_MACRO: &str = "*/";

/// Search breadth for regex and whole-project expansion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    #[default]
    CurrentFolder,
    WithSubfolders,
    WholeProject,
}

impl Scope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::CurrentFolder => "current_folder",
            Scope::WithSubfolders => "with_subfolders",
            Scope::WholeProject => "whole_project",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupColors {
    #[serde(default)]
    pub background: Option<String>,
    #[serde(default)]
    pub foreground: Option<String>,
}

/// The decoded shape of one group declaration from a definition file.
/// Parsing the definition file format is the host's job; this engine only
/// consumes the decoded values, normally via the background index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupDefinition {
    pub id: String,

    pub title: String,

    /// The file whose declaration defines this group.
    pub owner_path: PathBuf,

    /// Optional root override for relative related patterns. A value
    /// starting with `..` is resolved against the owner's parent directory.
    #[serde(default)]
    pub root: Option<String>,

    /// Ordered related-path patterns, expanded by the definition resolver.
    #[serde(default)]
    pub related_patterns: Vec<String>,

    #[serde(default)]
    pub colors: GroupColors,

    #[serde(default)]
    pub scope: Scope,
}

impl GroupDefinition {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        owner_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            owner_path: owner_path.into(),
            root: None,
            related_patterns: Vec::new(),
            colors: GroupColors::default(),
            scope: Scope::default(),
        }
    }

    pub fn with_patterns(mut self, patterns: Vec<String>) -> Self {
        self.related_patterns = patterns;
        self
    }

    pub fn with_root(mut self, root: impl Into<String>) -> Self {
        self.root = Some(root.into());
        self
    }
}

/// A regex-pattern group declaration from settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegexDefinition {
    /// Pattern matched against file names (not full paths).
    pub pattern: String,

    #[serde(default)]
    pub scope: Scope,

    /// Capture-group indices excluded from the back-reference comparison
    /// between the current file and candidates.
    #[serde(default)]
    pub excluded_captures: Vec<usize>,
}

impl RegexDefinition {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            scope: Scope::default(),
            excluded_captures: Vec::new(),
        }
    }

    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    pub fn without_capture(mut self, index: usize) -> Self {
        self.excluded_captures.push(index);
        self
    }
}
