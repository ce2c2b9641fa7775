use crate::patterns::Expansion;
use grouptabs_groups::Link;
use grouptabs_groups::ProjectLayout;
use grouptabs_groups::RegexDefinition;
use grouptabs_groups::ResolveWarning;
use grouptabs_groups::Scope;
use grouptabs_groups::Settings;
use ignore::WalkBuilder;
use regex::Regex;
use std::path::Path;
use std::path::PathBuf;
use tracing::warn;

/// True when the definition's pattern matches the file's name. Used by the
/// engine to pick the first applicable regex group for a file.
pub fn pattern_matches(definition: &RegexDefinition, file: &Path) -> bool {
    let Some(name) = file.file_name() else {
        return false;
    };
    match Regex::new(&definition.pattern) {
        Ok(regex) => regex.is_match(&name.to_string_lossy()),
        Err(_) => false,
    }
}

/// Expands a regex group definition by walking its scope and matching file
/// names, honoring back-reference constraints between the triggering file
/// and every candidate: a candidate joins only when each capture group not
/// excluded from comparison produced the same text as the triggering file.
pub struct RegexFileResolver<'a> {
    layout: &'a ProjectLayout,
    settings: &'a Settings,
}

impl<'a> RegexFileResolver<'a> {
    pub fn new(layout: &'a ProjectLayout, settings: &'a Settings) -> Self {
        Self { layout, settings }
    }

    pub fn expand(&self, definition: &RegexDefinition, current: &Path) -> Expansion {
        let mut expansion = Expansion::default();

        let regex = match Regex::new(&definition.pattern) {
            Ok(regex) => regex,
            Err(err) => {
                expansion.warnings.push(ResolveWarning::InvalidPattern {
                    pattern: definition.pattern.clone(),
                    message: err.to_string(),
                });
                expansion.links.push(Link::new(current));
                return expansion;
            }
        };

        let current_name = current
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let Some(base) = capture_texts(&regex, &current_name, &definition.excluded_captures)
        else {
            // The triggering file no longer matches its own pattern; keep
            // just the file rather than guessing at members.
            expansion.links.push(Link::new(current));
            return expansion;
        };

        let mut matches = Vec::new();
        let mut capped = false;
        self.walk_scope(definition.scope, current, |path| {
            if matches.len() >= self.settings.max_files_per_group {
                capped = true;
                return false;
            }
            let name = match path.file_name() {
                Some(name) => name.to_string_lossy().into_owned(),
                None => return true,
            };
            if let Some(texts) = capture_texts(&regex, &name, &definition.excluded_captures)
                && texts == base
            {
                matches.push(path.to_path_buf());
            }
            true
        });

        if capped {
            expansion.warnings.push(ResolveWarning::TooManyFiles {
                owner: current.to_path_buf(),
                limit: self.settings.max_files_per_group,
            });
        }

        matches.sort_by_key(|path| path.file_name().map(|n| n.to_os_string()));
        expansion.links.push(Link::new(current));
        for path in matches {
            if expansion.links.len() >= self.settings.max_files_per_group {
                break;
            }
            if path != current {
                expansion.links.push(Link::new(path));
            }
        }
        expansion
    }

    /// Depth-first walk of the definition's scope. Project-wide walks prune
    /// directories excluded by project configuration; current-folder walks
    /// prune every directory but the starting one.
    fn walk_scope(&self, scope: Scope, current: &Path, mut visit: impl FnMut(&Path) -> bool) {
        let start = match scope {
            Scope::CurrentFolder | Scope::WithSubfolders => match current.parent() {
                Some(parent) => parent.to_path_buf(),
                None => return,
            },
            Scope::WholeProject => self.layout.root.clone(),
        };

        let mut builder = WalkBuilder::new(&start);
        builder.standard_filters(false).follow_links(false);
        if scope == Scope::CurrentFolder {
            builder.max_depth(Some(1));
        }
        let excluded = self.layout.excluded.clone();
        builder.filter_entry(move |entry| {
            let is_dir = entry.file_type().is_some_and(|ft| ft.is_dir());
            if is_dir && excluded.iter().any(|dir| entry.path().starts_with(dir)) {
                return false;
            }
            true
        });

        for entry in builder.build() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    warn!("skipping entry during regex scope walk: {err}");
                    continue;
                }
            };
            if !entry.file_type().is_some_and(|ft| ft.is_file()) {
                continue;
            }
            if !visit(entry.path()) {
                return;
            }
        }
    }
}

/// The capture texts of `name` under `regex`, with excluded groups masked
/// out, or `None` when the name does not match at all.
fn capture_texts(
    regex: &Regex,
    name: &str,
    excluded: &[usize],
) -> Option<Vec<Option<String>>> {
    let captures = regex.captures(name)?;
    let mut texts = Vec::with_capacity(captures.len().saturating_sub(1));
    for index in 1..captures.len() {
        if excluded.contains(&index) {
            texts.push(None);
            continue;
        }
        texts.push(captures.get(index).map(|m| m.as_str().to_string()));
    }
    Some(texts)
}
