use crate::siblings::list_dir_files;
use globset::GlobBuilder;
use globset::GlobMatcher;
use grouptabs_groups::FileGroupIndex;
use grouptabs_groups::GroupDefinition;
use grouptabs_groups::Link;
use grouptabs_groups::ProjectLayout;
use grouptabs_groups::ResolveWarning;
use grouptabs_groups::Settings;
use grouptabs_groups::definition::MODULE_MACRO;
use grouptabs_groups::definition::PROJECT_MACRO;
use grouptabs_groups::definition::WILDCARD_MACRO;
use grouptabs_groups::error::Result;
use path_absolutize::Absolutize;
use std::borrow::Cow;
use std::collections::HashSet;
use std::path::Path;
use std::path::PathBuf;
use tracing::warn;

/// The outcome of expanding one group definition: the deduplicated,
/// size-capped member links plus any non-fatal warnings collected along
/// the way.
#[derive(Debug, Default)]
pub struct Expansion {
    pub links: Vec<Link>,
    pub warnings: Vec<ResolveWarning>,
}

impl Expansion {
    fn capped(&self) -> bool {
        self.warnings
            .iter()
            .any(|w| matches!(w, ResolveWarning::TooManyFiles { .. }))
    }
}

/// Expands a declarative group definition (owner path, optional root
/// override, ordered related-path patterns) into concrete file links.
///
/// Depends only on the file system and, for `*/name.*` whole-project
/// patterns, the background index. The only failure that escapes is the
/// index reporting not-ready; everything else degrades to warnings.
pub struct FileResolver<'a> {
    layout: &'a ProjectLayout,
    index: &'a dyn FileGroupIndex,
    settings: &'a Settings,
}

impl<'a> FileResolver<'a> {
    pub fn new(
        layout: &'a ProjectLayout,
        index: &'a dyn FileGroupIndex,
        settings: &'a Settings,
    ) -> Self {
        Self {
            layout,
            index,
            settings,
        }
    }

    pub fn expand(&self, definition: &GroupDefinition) -> Result<Expansion> {
        let mut expansion = Expansion::default();
        let mut seen = HashSet::new();

        // The owner file is always a member, ahead of every pattern.
        seen.insert(definition.owner_path.clone());
        expansion.links.push(Link::new(&definition.owner_path));

        let root = self.resolve_root(definition, &mut expansion.warnings);
        for pattern in &definition.related_patterns {
            self.expand_pattern(definition, &root, pattern, &mut seen, &mut expansion)?;
        }

        Ok(expansion)
    }

    /// Root for relative patterns: the declared override, else the owner's
    /// directory. A `..`-relative override resolves against the owner's
    /// parent; a missing resolved root is surfaced and then used as-is.
    fn resolve_root(
        &self,
        definition: &GroupDefinition,
        warnings: &mut Vec<ResolveWarning>,
    ) -> PathBuf {
        let owner_dir = definition
            .owner_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        let Some(declared) = &definition.root else {
            return owner_dir;
        };

        let resolved = if declared.starts_with("..") {
            let joined = owner_dir.join(declared);
            joined
                .absolutize()
                .map(Cow::into_owned)
                .unwrap_or(joined)
        } else {
            let declared = Path::new(declared);
            if declared.is_absolute() {
                declared.to_path_buf()
            } else {
                self.layout.root.join(declared)
            }
        };

        if !resolved.exists() {
            warnings.push(ResolveWarning::MissingRoot {
                owner: definition.owner_path.clone(),
                root: resolved.clone(),
            });
        }
        resolved
    }

    fn expand_pattern(
        &self,
        definition: &GroupDefinition,
        root: &Path,
        pattern: &str,
        seen: &mut HashSet<PathBuf>,
        out: &mut Expansion,
    ) -> Result<()> {
        if let Some(rest) = pattern.strip_prefix(WILDCARD_MACRO) {
            return self.expand_project_wide(definition, rest, seen, out);
        }

        let resolved = if let Some(rest) = pattern.strip_prefix(PROJECT_MACRO) {
            self.layout.root.join(rest)
        } else if let Some(rest) = pattern.strip_prefix(MODULE_MACRO) {
            self.layout
                .module_root_for(&definition.owner_path)
                .join(rest)
        } else {
            let raw = Path::new(pattern);
            if raw.is_absolute() {
                raw.to_path_buf()
            } else {
                root.join(pattern)
            }
        };

        let file_name = resolved
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if file_name.contains(['*', '?']) {
            self.expand_glob(definition, &resolved, &file_name, pattern, seen, out);
        } else if resolved.is_file() {
            self.push_candidate(definition, resolved, seen, out);
        } else if resolved.is_dir() {
            self.expand_directory(definition, &resolved, seen, out);
        } else {
            out.warnings.push(ResolveWarning::MissingFile {
                pattern: pattern.to_string(),
            });
        }
        Ok(())
    }

    /// Direct file children of a directory pattern, non-recursive.
    fn expand_directory(
        &self,
        definition: &GroupDefinition,
        dir: &Path,
        seen: &mut HashSet<PathBuf>,
        out: &mut Expansion,
    ) {
        let children = match list_dir_files(dir) {
            Ok(children) => children,
            Err(err) => {
                warn!("skipping unreadable directory {dir:?}: {err}");
                return;
            }
        };
        for child in children {
            if !self.push_candidate(definition, child, seen, out) {
                return;
            }
        }
    }

    /// Glob-match siblings in the pattern's parent directory; when the glob
    /// yields nothing, fall back to a prefix match on the part of the name
    /// before the first wildcard.
    fn expand_glob(
        &self,
        definition: &GroupDefinition,
        resolved: &Path,
        file_pattern: &str,
        pattern: &str,
        seen: &mut HashSet<PathBuf>,
        out: &mut Expansion,
    ) {
        let Some(parent) = resolved.parent() else {
            out.warnings.push(ResolveWarning::MissingFile {
                pattern: pattern.to_string(),
            });
            return;
        };
        let matcher = match build_matcher(file_pattern) {
            Ok(matcher) => matcher,
            Err(err) => {
                out.warnings.push(ResolveWarning::InvalidPattern {
                    pattern: pattern.to_string(),
                    message: err.to_string(),
                });
                return;
            }
        };
        let children = match list_dir_files(parent) {
            Ok(children) => children,
            Err(err) => {
                warn!("skipping unreadable directory {parent:?}: {err}");
                return;
            }
        };

        let mut matched_any = false;
        for child in &children {
            if let Some(name) = child.file_name()
                && matcher.is_match(name)
            {
                matched_any = true;
                if !self.push_candidate(definition, child.clone(), seen, out) {
                    return;
                }
            }
        }
        if matched_any {
            return;
        }

        let prefix: String = file_pattern
            .chars()
            .take_while(|c| *c != '*' && *c != '?')
            .collect();
        if !prefix.is_empty() {
            for child in children {
                let starts = child
                    .file_name()
                    .is_some_and(|n| n.to_string_lossy().starts_with(&prefix));
                if starts {
                    matched_any = true;
                    if !self.push_candidate(definition, child, seen, out) {
                        return;
                    }
                }
            }
        }
        if !matched_any {
            out.warnings.push(ResolveWarning::MissingFile {
                pattern: pattern.to_string(),
            });
        }
    }

    /// `*/name.*`: whole-project search on the base name, extension
    /// ignored, exact stem match.
    fn expand_project_wide(
        &self,
        definition: &GroupDefinition,
        rest: &str,
        seen: &mut HashSet<PathBuf>,
        out: &mut Expansion,
    ) -> Result<()> {
        let stem = match rest.strip_suffix(".*") {
            Some(stem) => stem.to_string(),
            None => Path::new(rest)
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| rest.to_string()),
        };

        let mut files = self.index.files_with_stem(&stem)?;
        files.sort();
        for file in files {
            if self.layout.is_excluded(&file) {
                continue;
            }
            if file.file_stem().map(|s| s.to_string_lossy().into_owned()) != Some(stem.clone()) {
                continue;
            }
            if !self.push_candidate(definition, file, seen, out) {
                return Ok(());
            }
        }
        Ok(())
    }

    /// Apply the exclusion rules and the size cap; returns false once the
    /// cap is hit so the caller stops the current pattern.
    fn push_candidate(
        &self,
        definition: &GroupDefinition,
        path: PathBuf,
        seen: &mut HashSet<PathBuf>,
        out: &mut Expansion,
    ) -> bool {
        if is_archive_entry(&path) {
            return true;
        }
        if self.settings.hide_definition_files
            && has_extension(&path, &self.settings.definition_file_extension)
        {
            return true;
        }
        if !seen.insert(path.clone()) {
            return true;
        }
        if out.links.len() >= self.settings.max_files_per_group {
            if !out.capped() {
                out.warnings.push(ResolveWarning::TooManyFiles {
                    owner: definition.owner_path.clone(),
                    limit: self.settings.max_files_per_group,
                });
            }
            return false;
        }
        out.links.push(Link::new(path));
        true
    }
}

fn build_matcher(file_pattern: &str) -> std::result::Result<GlobMatcher, globset::Error> {
    Ok(GlobBuilder::new(file_pattern)
        .literal_separator(true)
        .build()?
        .compile_matcher())
}

/// Archive (jar/zip) entries never become tabs.
fn is_archive_entry(path: &Path) -> bool {
    if path.to_string_lossy().contains('!') {
        return true;
    }
    has_extension(path, "jar") || has_extension(path, "zip")
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .is_some_and(|ext| ext.to_string_lossy().eq_ignore_ascii_case(extension))
}

#[cfg(test)]
mod tests {
    use super::*;
    use grouptabs_groups::IndexError;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::TempDir;

    struct FakeIndex {
        files: Vec<PathBuf>,
    }

    impl FileGroupIndex for FakeIndex {
        fn definitions_for_id(
            &self,
            _id: &str,
        ) -> std::result::Result<Vec<GroupDefinition>, IndexError> {
            Ok(Vec::new())
        }

        fn all_ids(&self) -> std::result::Result<Vec<String>, IndexError> {
            Ok(Vec::new())
        }

        fn files_with_stem(&self, stem: &str) -> std::result::Result<Vec<PathBuf>, IndexError> {
            Ok(self
                .files
                .iter()
                .filter(|f| f.file_stem().is_some_and(|s| s.to_string_lossy() == stem))
                .cloned()
                .collect())
        }

        fn request_reindex(&self) {}

        fn is_ready(&self) -> bool {
            true
        }
    }

    struct Fixture {
        _dir: TempDir,
        root: PathBuf,
        layout: ProjectLayout,
        index: FakeIndex,
        settings: Settings,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = TempDir::new().expect("temp dir");
            let root = dir.path().to_path_buf();
            Self {
                layout: ProjectLayout::new(&root),
                index: FakeIndex { files: Vec::new() },
                settings: Settings::default(),
                root,
                _dir: dir,
            }
        }

        fn write(&self, rel: &str) -> PathBuf {
            let path = self.root.join(rel);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).expect("create parent");
            }
            fs::write(&path, "").expect("write file");
            path
        }

        fn resolver(&self) -> FileResolver<'_> {
            FileResolver::new(&self.layout, &self.index, &self.settings)
        }
    }

    fn link_names(expansion: &Expansion) -> Vec<String> {
        expansion.links.iter().map(Link::name).collect()
    }

    #[test]
    fn owner_is_always_first_and_never_duplicated() {
        let fx = Fixture::new();
        let owner = fx.write("src/a.ts");
        let related = fx.write("src/b.ts");

        let definition = GroupDefinition::new("G1", "G1", &owner).with_patterns(vec![
            related.to_string_lossy().into_owned(),
            owner.to_string_lossy().into_owned(),
        ]);
        let expansion = fx.resolver().expand(&definition).expect("expand");
        assert_eq!(link_names(&expansion), vec!["a.ts", "b.ts"]);
        assert!(expansion.warnings.is_empty());
    }

    #[test]
    fn directory_pattern_adds_direct_children_only() {
        let fx = Fixture::new();
        let owner = fx.write("src/a.ts");
        fx.write("assets/logo.svg");
        fx.write("assets/style.css");
        fx.write("assets/nested/deep.css");

        let definition = GroupDefinition::new("G1", "G1", &owner)
            .with_patterns(vec![fx.root.join("assets").to_string_lossy().into_owned()]);
        let expansion = fx.resolver().expand(&definition).expect("expand");
        assert_eq!(link_names(&expansion), vec!["a.ts", "logo.svg", "style.css"]);
    }

    #[test]
    fn glob_matches_siblings_in_pattern_parent() {
        let fx = Fixture::new();
        let owner = fx.write("src/foo.ts");
        fx.write("src/foo.css");
        fx.write("src/foo.html");
        fx.write("src/bar.css");

        let definition =
            GroupDefinition::new("G1", "G1", &owner).with_patterns(vec!["foo.*".to_string()]);
        let expansion = fx.resolver().expand(&definition).expect("expand");
        assert_eq!(
            link_names(&expansion),
            vec!["foo.ts", "foo.css", "foo.html"]
        );
    }

    #[test]
    fn glob_without_matches_falls_back_to_prefix() {
        let fx = Fixture::new();
        let owner = fx.write("src/page.ts");
        fx.write("src/page.backup");

        // `page.*[0-9]` matches nothing; the `page.` prefix still does.
        let definition = GroupDefinition::new("G1", "G1", &owner)
            .with_patterns(vec!["page.*[0-9]".to_string()]);
        let expansion = fx.resolver().expand(&definition).expect("expand");
        assert_eq!(link_names(&expansion), vec!["page.ts", "page.backup"]);
    }

    #[test]
    fn project_macro_resolves_against_project_root() {
        let fx = Fixture::new();
        let owner = fx.write("app/feature/a.ts");
        fx.write("shared/util.ts");

        let definition = GroupDefinition::new("G1", "G1", &owner)
            .with_patterns(vec!["PROJECT/shared/util.ts".to_string()]);
        let expansion = fx.resolver().expand(&definition).expect("expand");
        assert_eq!(link_names(&expansion), vec!["a.ts", "util.ts"]);
    }

    #[test]
    fn wildcard_macro_searches_whole_project_by_exact_stem() {
        let mut fx = Fixture::new();
        let owner = fx.write("src/Foo.ts");
        let css = fx.write("styles/Foo.css");
        let near_miss = fx.write("src/FooBar.ts");
        fx.index.files = vec![owner.clone(), css, near_miss];

        let definition =
            GroupDefinition::new("G1", "G1", &owner).with_patterns(vec!["*/Foo.*".to_string()]);
        let expansion = fx.resolver().expand(&definition).expect("expand");
        assert_eq!(link_names(&expansion), vec!["Foo.ts", "Foo.css"]);
    }

    #[test]
    fn size_cap_yields_exactly_limit_and_warns() {
        let mut fx = Fixture::new();
        let owner = fx.write("src/a.ts");
        for i in 0..10 {
            fx.write(&format!("src/file{i}.ts"));
        }
        fx.settings.max_files_per_group = 4;

        let definition = GroupDefinition::new("G1", "G1", &owner)
            .with_patterns(vec![fx.root.join("src").to_string_lossy().into_owned()]);
        let expansion = fx.resolver().expand(&definition).expect("expand");
        assert_eq!(expansion.links.len(), 4);
        assert!(
            expansion
                .warnings
                .iter()
                .any(|w| matches!(w, ResolveWarning::TooManyFiles { limit: 4, .. }))
        );
    }

    #[test]
    fn missing_root_warns_and_resolution_continues() {
        let fx = Fixture::new();
        let owner = fx.write("src/a.ts");
        fx.write("src/a.css");

        let definition = GroupDefinition::new("G1", "G1", &owner)
            .with_root("../no-such-dir")
            .with_patterns(vec![fx
                .root
                .join("src/a.css")
                .to_string_lossy()
                .into_owned()]);
        let expansion = fx.resolver().expand(&definition).expect("expand");
        assert_eq!(link_names(&expansion), vec!["a.ts", "a.css"]);
        assert!(
            expansion
                .warnings
                .iter()
                .any(|w| matches!(w, ResolveWarning::MissingRoot { .. }))
        );
    }

    #[test]
    fn definition_files_are_hidden_when_configured() {
        let mut fx = Fixture::new();
        let owner = fx.write("src/a.ts");
        fx.write("src/a.tabgroups");
        fx.write("src/a.css");
        fx.settings.hide_definition_files = true;

        let definition = GroupDefinition::new("G1", "G1", &owner)
            .with_patterns(vec!["a.*".to_string()]);
        let expansion = fx.resolver().expand(&definition).expect("expand");
        assert_eq!(link_names(&expansion), vec!["a.ts", "a.css"]);
    }

    #[test]
    fn missing_related_path_warns_without_aborting() {
        let fx = Fixture::new();
        let owner = fx.write("src/a.ts");
        fx.write("src/a.css");

        let definition = GroupDefinition::new("G1", "G1", &owner).with_patterns(vec![
            "no-such-file.ts".to_string(),
            "a.css".to_string(),
        ]);
        let expansion = fx.resolver().expand(&definition).expect("expand");
        assert_eq!(link_names(&expansion), vec!["a.ts", "a.css"]);
        assert!(
            expansion
                .warnings
                .iter()
                .any(|w| matches!(w, ResolveWarning::MissingFile { .. }))
        );
    }
}
