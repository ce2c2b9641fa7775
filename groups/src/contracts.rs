use crate::definition::GroupDefinition;
use crate::error::IndexError;
use crate::group::ExternalGroup;
use std::path::Path;
use std::path::PathBuf;

/// Contract this engine expects from the host's background index of group
/// declarations.
///
/// Every query may fail with [`IndexError::NotReady`] while the index is
/// mid-rebuild; callers treat that as retryable, never fatal. The refresh
/// orchestrator is the sole retry point.
pub trait FileGroupIndex: Send + Sync {
    /// All declarations currently indexed under the given group id. More
    /// than one declaration for an id is a user-configuration error that
    /// the engine surfaces as a duplicate-id warning.
    fn definitions_for_id(&self, id: &str) -> Result<Vec<GroupDefinition>, IndexError>;

    /// Every group id known to the index.
    fn all_ids(&self) -> Result<Vec<String>, IndexError>;

    /// Whole-project search for files whose name, ignoring the final
    /// extension, equals `stem`. Backs the `*/name.*` pattern form.
    fn files_with_stem(&self, stem: &str) -> Result<Vec<PathBuf>, IndexError>;

    /// Ask the host to rebuild the index. Fire-and-forget.
    fn request_reindex(&self);

    /// Whether the index can currently be queried without `NotReady`.
    fn is_ready(&self) -> bool;
}

/// Contract for the bookmark/favorite list collaborator. Groups returned
/// here are opaque to the resolvers: they participate in the cascade and
/// the reverse index but are never expanded from a definition.
pub trait ExternalGroupProvider: Send + Sync {
    /// The external group containing the given file, if any.
    fn group_for_path(&self, path: &Path) -> Option<ExternalGroup>;

    /// Look an external group up by its history id (`bookmarks:`- or
    /// `favorites:`-prefixed).
    fn group_by_id(&self, id: &str) -> Option<ExternalGroup>;
}

/// Static description of the project the engine operates in: where the
/// root is, which directories are excluded from project-wide walks, and
/// where module roots lie for `MODULE/` macro resolution.
#[derive(Debug, Clone, Default)]
pub struct ProjectLayout {
    pub root: PathBuf,
    pub excluded: Vec<PathBuf>,
    pub modules: Vec<PathBuf>,
}

impl ProjectLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            excluded: Vec::new(),
            modules: Vec::new(),
        }
    }

    pub fn with_excluded(mut self, excluded: Vec<PathBuf>) -> Self {
        self.excluded = excluded;
        self
    }

    pub fn with_modules(mut self, modules: Vec<PathBuf>) -> Self {
        self.modules = modules;
        self
    }

    pub fn is_excluded(&self, path: &Path) -> bool {
        self.excluded.iter().any(|dir| path.starts_with(dir))
    }

    /// The deepest module root containing `path`, falling back to the
    /// project root.
    pub fn module_root_for(&self, path: &Path) -> &Path {
        self.modules
            .iter()
            .filter(|module| path.starts_with(module))
            .max_by_key(|module| module.components().count())
            .map(PathBuf::as_path)
            .unwrap_or(&self.root)
    }
}
