use std::hash::Hash;
use std::hash::Hasher;
use std::path::Path;
use std::path::PathBuf;

/// A resolved reference to a file shown as a single tab: the path plus
/// optional line, icon id and display-name override. Two links are equal
/// iff their paths are equal; the decoration fields never participate in
/// equality or hashing.
#[derive(Debug, Clone)]
pub struct Link {
    path: PathBuf,
    line: Option<u32>,
    icon: Option<String>,
    custom_name: Option<String>,
}

impl Link {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            line: None,
            icon: None,
            custom_name: None,
        }
    }

    pub fn with_line(mut self, line: u32) -> Self {
        self.line = Some(line);
        self
    }

    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    pub fn with_custom_name(mut self, name: impl Into<String>) -> Self {
        self.custom_name = Some(name.into());
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn line(&self) -> Option<u32> {
        self.line
    }

    pub fn icon(&self) -> Option<&str> {
        self.icon.as_deref()
    }

    /// Display name: the override if set, otherwise the file name.
    pub fn name(&self) -> String {
        if let Some(custom) = &self.custom_name {
            return custom.clone();
        }
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// File name without its final extension, used for same-name matching.
    pub fn stem(&self) -> String {
        self.path
            .file_stem()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

impl PartialEq for Link {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path
    }
}

impl Eq for Link {}

impl Hash for Link {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.path.hash(state);
    }
}
