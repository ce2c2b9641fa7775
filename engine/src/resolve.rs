use crate::cache::IndexCache;
use crate::cache::OwnershipLookup;
use grouptabs_groups::AutoGroup;
use grouptabs_groups::AutoKind;
use grouptabs_groups::ExternalGroupProvider;
use grouptabs_groups::FileGroupIndex;
use grouptabs_groups::Group;
use grouptabs_groups::IndexedGroup;
use grouptabs_groups::Link;
use grouptabs_groups::MultiGroup;
use grouptabs_groups::ProjectLayout;
use grouptabs_groups::RegexGroup;
use grouptabs_groups::ResolveError;
use grouptabs_groups::ResolveWarning;
use grouptabs_groups::Settings;
use grouptabs_groups::error::Result;
use grouptabs_groups::group::BOOKMARKS_ID_PREFIX;
use grouptabs_groups::group::DIRECTORY_ID;
use grouptabs_groups::group::FAVORITES_ID_PREFIX;
use grouptabs_groups::group::HIDE_PANEL_ID;
use grouptabs_groups::group::REGEX_ID_PREFIX;
use grouptabs_groups::group::SAME_FEATURE_ID;
use grouptabs_groups::group::SAME_NAME_ID;
use grouptabs_resolver::RegexFileResolver;
use grouptabs_resolver::folder_links;
use grouptabs_resolver::pattern_matches;
use grouptabs_resolver::same_feature_links;
use grouptabs_resolver::same_name_links;
use std::path::Path;
use std::sync::Arc;
use tracing::warn;

/// The outcome of one resolution: the group to display, whether it is a
/// stub awaiting full expansion, and any non-fatal warnings collected on
/// the way.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub group: Group,
    pub stub: bool,
    pub warnings: Vec<ResolveWarning>,
}

impl Resolution {
    /// Two resolutions render identically: same stub flag, identical
    /// ordered link list. The refresh orchestrator skips re-rendering when
    /// this holds.
    pub fn visually_equal(&self, other: &Resolution) -> bool {
        self.stub == other.stub && self.group.links() == other.group.links()
    }

    /// The links the widget actually renders, truncated to its tab cap.
    pub fn rendered_links(&self, max_tabs: usize) -> Vec<Link> {
        self.group.links().into_iter().take(max_tabs).collect()
    }
}

/// Runs the priority cascade that picks the authoritative group for a
/// file, consulting the reverse-index cache, the sibling and regex
/// providers, and the external bookmark/favorite collaborator.
pub struct GroupResolutionEngine {
    cache: Arc<IndexCache>,
    index: Arc<dyn FileGroupIndex>,
    provider: Option<Arc<dyn ExternalGroupProvider>>,
    layout: Arc<ProjectLayout>,
    settings: Arc<Settings>,
}

impl GroupResolutionEngine {
    pub fn new(
        index: Arc<dyn FileGroupIndex>,
        layout: Arc<ProjectLayout>,
        settings: Arc<Settings>,
    ) -> Self {
        let cache = Arc::new(IndexCache::new(
            index.clone(),
            layout.clone(),
            settings.clone(),
        ));
        Self {
            cache,
            index,
            provider: None,
            layout,
            settings,
        }
    }

    pub fn with_provider(mut self, provider: Arc<dyn ExternalGroupProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn cache(&self) -> &Arc<IndexCache> {
        &self.cache
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Whether the background index can currently be queried. The refresh
    /// orchestrator polls this while parked on a not-ready index.
    pub fn index_ready(&self) -> bool {
        self.index.is_ready()
    }

    /// Ask the host to rebuild the authoritative index and drop the whole
    /// reverse index; entries repopulate as groups resolve again.
    pub fn request_reindex(&self) {
        self.cache.clear();
        self.index.request_reindex();
    }

    /// Resolve the group to display for `file`.
    ///
    /// `displayed` is what the view currently shows, `requested` an
    /// explicit user pick, `refresh` forces re-derivation from the cache
    /// and providers, and `stub` marks the result as provisional (stub
    /// results are never recorded as the last selection).
    ///
    /// Only [`ResolveError::IndexNotReady`] escapes; the refresh
    /// orchestrator retries it. Any other internal failure is logged and
    /// collapses to the empty group so the view never ends up in an
    /// inconsistent state.
    pub fn resolve(
        &self,
        file: &Path,
        displayed: Option<&Group>,
        requested: Option<&Group>,
        refresh: bool,
        stub: bool,
    ) -> Result<Resolution> {
        match self.resolve_inner(file, displayed, requested, refresh, stub) {
            Ok(resolution) => Ok(resolution),
            Err(ResolveError::IndexNotReady) => Err(ResolveError::IndexNotReady),
            Err(err) => {
                warn!("group resolution failed for {file:?}: {err}");
                Ok(Resolution {
                    group: Group::Empty,
                    stub,
                    warnings: Vec::new(),
                })
            }
        }
    }

    fn resolve_inner(
        &self,
        file: &Path,
        displayed: Option<&Group>,
        requested: Option<&Group>,
        refresh: bool,
        stub: bool,
    ) -> Result<Resolution> {
        let mut warnings = Vec::new();
        let mut group: Option<Group> = None;
        let candidate = requested.or(displayed);

        if refresh && !candidate.is_some_and(Group::is_external) {
            // Re-derive from scratch, ignoring whatever is requested.
            match self.cache.owning_or_single(file, &mut warnings) {
                OwnershipLookup::Ambiguous => {
                    return Ok(self.finish(file, Group::Empty, stub, warnings));
                }
                OwnershipLookup::Single(found) => group = Some(found),
                OwnershipLookup::None => {}
            }
            if group.is_none() && self.settings.remember_last_group {
                group = self.group_from_history(file)?;
            }
            if group.is_none() {
                group = self.first_matching_regex(file);
            }
        } else if let Some(candidate) = candidate {
            self.cache.validate(candidate)?;
            if candidate.is_valid()
                && (candidate.is_auto() || candidate.contains(file) || candidate.owns(file))
            {
                group = Some(candidate.clone());
            }
        }

        if group.is_none() {
            match self.cache.owning_or_single(file, &mut warnings) {
                OwnershipLookup::Ambiguous => {
                    return Ok(self.finish(file, Group::Empty, stub, warnings));
                }
                OwnershipLookup::Single(found) => group = Some(found),
                OwnershipLookup::None => {}
            }
        }
        if group.is_none() && self.settings.remember_last_group {
            group = self.group_from_history(file)?;
        }
        if group.is_none() {
            group = self.first_matching_regex(file);
        }
        let mut group = match group {
            Some(group) => group,
            None => self.default_auto_group(),
        };

        let needs_refresh = refresh
            || (group.is_auto() && !self.index.is_ready())
            || matches!(&group, Group::Auto(auto) if auto.members.is_empty())
            || matches!(&group, Group::Regex(regex) if regex.members.is_empty())
            || matches!(&group, Group::Indexed(indexed) if indexed.resolved_links().is_none());
        if needs_refresh {
            group = self.refresh_group(group, file, refresh, &mut warnings)?;
        }

        // A same-name group that collapsed to just the file itself is not
        // worth a tab strip; aggregate whatever else references the file,
        // unless the user explicitly picked same-name.
        let collapsed_same_name = matches!(
            &group,
            Group::Auto(auto) if auto.kind == AutoKind::SameName && auto.members.len() <= 1
        );
        let user_picked_same_name = requested
            .is_some_and(|r| matches!(r, Group::Auto(a) if a.kind == AutoKind::SameName));
        if collapsed_same_name && !user_picked_same_name {
            group = self.aggregate_or_folder(file, group, &mut warnings)?;
        }

        Ok(self.finish(file, group, stub, warnings))
    }

    fn finish(
        &self,
        file: &Path,
        group: Group,
        stub: bool,
        warnings: Vec<ResolveWarning>,
    ) -> Resolution {
        if !stub {
            self.cache.set_last(file, &group);
        }
        Resolution {
            group,
            stub,
            warnings,
        }
    }

    /// Per-variant member re-derivation: sibling lookups for auto groups,
    /// scope expansion for regex groups, an index re-fetch for indexed
    /// ones. Sentinels, multi groups and external groups pass through.
    fn refresh_group(
        &self,
        group: Group,
        file: &Path,
        force: bool,
        warnings: &mut Vec<ResolveWarning>,
    ) -> Result<Group> {
        match group {
            Group::Auto(auto) => {
                let links = match auto.kind {
                    AutoKind::SameName => same_name_links(file),
                    AutoKind::Folder => folder_links(file),
                    AutoKind::SameFeature => same_feature_links(file),
                };
                match links {
                    Ok(links) => Ok(Group::Auto(AutoGroup::with_members(auto.kind, links))),
                    Err(err) => {
                        warn!("sibling lookup failed for {file:?}: {err}");
                        Ok(Group::Auto(AutoGroup::with_members(
                            auto.kind,
                            vec![Link::new(file)],
                        )))
                    }
                }
            }
            Group::Regex(regex) => {
                let resolver = RegexFileResolver::new(&self.layout, &self.settings);
                let expansion = resolver.expand(&regex.definition, file);
                warnings.extend(expansion.warnings);
                Ok(Group::Regex(RegexGroup {
                    definition: regex.definition,
                    members: expansion.links,
                }))
            }
            Group::Indexed(indexed) => {
                if !force && indexed.is_valid() && indexed.resolved_links().is_none() {
                    warnings.extend(self.cache.init_group(&indexed)?);
                    if indexed.is_valid() {
                        return Ok(Group::Indexed(indexed));
                    }
                    return Ok(Group::Empty);
                }
                // Forced refresh: members are computed at most once per
                // instance, so a re-fetch builds a fresh instance from the
                // current index value.
                let definitions = self.index.definitions_for_id(indexed.id())?;
                match definitions.into_iter().next() {
                    Some(definition) => {
                        let fresh = Arc::new(IndexedGroup::new(definition));
                        warnings.extend(self.cache.init_group(&fresh)?);
                        if fresh.is_valid() {
                            Ok(Group::Indexed(fresh))
                        } else {
                            Ok(Group::Empty)
                        }
                    }
                    None => {
                        indexed.invalidate();
                        Ok(Group::Empty)
                    }
                }
            }
            other @ (Group::Multi(_)
            | Group::External(_)
            | Group::Empty
            | Group::Stub
            | Group::HidePanel) => Ok(other),
        }
    }

    /// Fallback for a collapsed same-name group: every group referencing
    /// the file as a multi group, a single referencing group on its own,
    /// or the folder group when nothing references the file at all.
    /// External bookmark/favorite groups participate here exactly like
    /// cached ones.
    fn aggregate_or_folder(
        &self,
        file: &Path,
        original: Group,
        warnings: &mut Vec<ResolveWarning>,
    ) -> Result<Group> {
        let mut referencing = self.cache.groups_for(file);
        if let Some(provider) = &self.provider
            && let Some(external) = provider.group_for_path(file)
        {
            let id = external.id();
            if !referencing.iter().any(|g| g.id() == id) {
                referencing.push(Group::External(external));
            }
        }
        match referencing.len() {
            0 => {
                if self.settings.auto_folder {
                    self.refresh_group(Group::folder(), file, false, warnings)
                } else {
                    Ok(original)
                }
            }
            1 => match referencing.into_iter().next() {
                Some(group) => Ok(group),
                None => Ok(original),
            },
            _ => Ok(Group::Multi(MultiGroup::new(referencing))),
        }
    }

    fn group_from_history(&self, file: &Path) -> Result<Option<Group>> {
        let Some(id) = self.cache.get_last(file) else {
            return Ok(None);
        };
        self.decode_history_id(&id)
    }

    /// Decode a persisted history id back into a live group: the sentinel
    /// auto/hide values, prefixed regex and external ids, and finally
    /// indexed ids looked up in the cache or re-fetched from the index.
    fn decode_history_id(&self, id: &str) -> Result<Option<Group>> {
        match id {
            SAME_NAME_ID => return Ok(Some(Group::same_name())),
            DIRECTORY_ID => return Ok(Some(Group::folder())),
            SAME_FEATURE_ID => return Ok(Some(Group::Auto(AutoGroup::same_feature()))),
            HIDE_PANEL_ID => return Ok(Some(Group::HidePanel)),
            _ => {}
        }

        if id.starts_with(REGEX_ID_PREFIX) {
            let group = self
                .settings
                .regex_groups
                .iter()
                .map(|definition| RegexGroup::unresolved(definition.clone()))
                .find(|group| group.id() == id)
                .map(Group::Regex);
            return Ok(group);
        }
        if id.starts_with(BOOKMARKS_ID_PREFIX) || id.starts_with(FAVORITES_ID_PREFIX) {
            let group = self
                .provider
                .as_ref()
                .and_then(|provider| provider.group_by_id(id))
                .map(Group::External);
            return Ok(group);
        }

        if let Some(registered) = self.cache.find_registered(id) {
            return Ok(Some(registered));
        }
        let definitions = self.index.definitions_for_id(id)?;
        match definitions.into_iter().next() {
            Some(definition) => {
                let owner = definition.owner_path.clone();
                let group = self
                    .cache
                    .on_indexing_done(&owner, Arc::new(IndexedGroup::new(definition)))?;
                Ok(Some(group))
            }
            None => Ok(None),
        }
    }

    fn first_matching_regex(&self, file: &Path) -> Option<Group> {
        self.settings
            .regex_groups
            .iter()
            .find(|definition| pattern_matches(definition, file))
            .map(|definition| Group::Regex(RegexGroup::unresolved(definition.clone())))
    }

    fn default_auto_group(&self) -> Group {
        if self.settings.auto_same_name {
            Group::same_name()
        } else if self.settings.auto_folder {
            Group::folder()
        } else {
            Group::Empty
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use grouptabs_groups::GroupDefinition;
    use grouptabs_groups::IndexError;
    use grouptabs_groups::RegexDefinition;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use std::fs;
    use std::path::PathBuf;
    use std::sync::Mutex;
    use std::sync::atomic::AtomicBool;
    use std::sync::atomic::Ordering;
    use tempfile::TempDir;

    #[derive(Default)]
    struct FakeIndex {
        definitions: Mutex<HashMap<String, Vec<GroupDefinition>>>,
        not_ready: AtomicBool,
    }

    impl FakeIndex {
        fn put(&self, definition: GroupDefinition) {
            self.definitions
                .lock()
                .expect("definitions lock")
                .entry(definition.id.clone())
                .or_default()
                .push(definition);
        }

        fn set_ready(&self, ready: bool) {
            self.not_ready.store(!ready, Ordering::SeqCst);
        }
    }

    impl FileGroupIndex for FakeIndex {
        fn definitions_for_id(
            &self,
            id: &str,
        ) -> std::result::Result<Vec<GroupDefinition>, IndexError> {
            if self.not_ready.load(Ordering::SeqCst) {
                return Err(IndexError::NotReady);
            }
            Ok(self
                .definitions
                .lock()
                .expect("definitions lock")
                .get(id)
                .cloned()
                .unwrap_or_default())
        }

        fn all_ids(&self) -> std::result::Result<Vec<String>, IndexError> {
            if self.not_ready.load(Ordering::SeqCst) {
                return Err(IndexError::NotReady);
            }
            Ok(self
                .definitions
                .lock()
                .expect("definitions lock")
                .keys()
                .cloned()
                .collect())
        }

        fn files_with_stem(&self, _stem: &str) -> std::result::Result<Vec<PathBuf>, IndexError> {
            if self.not_ready.load(Ordering::SeqCst) {
                return Err(IndexError::NotReady);
            }
            Ok(Vec::new())
        }

        fn request_reindex(&self) {}

        fn is_ready(&self) -> bool {
            !self.not_ready.load(Ordering::SeqCst)
        }
    }

    struct Fixture {
        _dir: TempDir,
        root: PathBuf,
        index: Arc<FakeIndex>,
        settings: Settings,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = TempDir::new().expect("temp dir");
            let root = dir.path().to_path_buf();
            Self {
                _dir: dir,
                root,
                index: Arc::new(FakeIndex::default()),
                settings: Settings::default(),
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

        fn engine(&self) -> GroupResolutionEngine {
            GroupResolutionEngine::new(
                self.index.clone(),
                Arc::new(ProjectLayout::new(&self.root)),
                Arc::new(self.settings.clone()),
            )
        }

        fn declare(
            &self,
            engine: &GroupResolutionEngine,
            id: &str,
            owner: &Path,
            patterns: Vec<String>,
        ) -> Arc<IndexedGroup> {
            let definition = GroupDefinition::new(id, id, owner).with_patterns(patterns);
            self.index.put(definition.clone());
            let group = Arc::new(IndexedGroup::new(definition));
            engine.cache().init_group(&group).expect("init group");
            group
        }
    }

    fn member_names(resolution: &Resolution) -> Vec<String> {
        resolution.group.links().iter().map(Link::name).collect()
    }

    #[test]
    fn sibling_files_resolve_to_a_same_name_group() {
        let fx = Fixture::new();
        let file = fx.write("src/foo.ts");
        fx.write("src/foo.css");
        fx.write("src/unrelated.ts");

        let engine = fx.engine();
        let resolution = engine
            .resolve(&file, None, None, false, false)
            .expect("resolve");

        assert!(matches!(
            &resolution.group,
            Group::Auto(auto) if auto.kind == AutoKind::SameName
        ));
        assert_eq!(member_names(&resolution), vec!["foo.ts", "foo.css"]);
        assert!(!resolution.stub);
    }

    #[test]
    fn resolution_is_idempotent_without_refresh() {
        let fx = Fixture::new();
        let file = fx.write("src/foo.ts");
        fx.write("src/foo.css");

        let engine = fx.engine();
        let first = engine
            .resolve(&file, None, None, false, false)
            .expect("first resolve");
        let second = engine
            .resolve(&file, Some(&first.group), None, false, false)
            .expect("second resolve");

        assert!(first.visually_equal(&second));
    }

    #[test]
    fn lonely_same_name_group_falls_back_to_the_folder() {
        let fx = Fixture::new();
        let file = fx.write("src/foo.ts");
        fx.write("src/bar.css");

        let engine = fx.engine();
        let resolution = engine
            .resolve(&file, None, None, false, false)
            .expect("resolve");

        assert!(matches!(
            &resolution.group,
            Group::Auto(auto) if auto.kind == AutoKind::Folder
        ));
        assert_eq!(member_names(&resolution), vec!["foo.ts", "bar.css"]);
    }

    #[test]
    fn declared_group_outranks_auto_groups() {
        let fx = Fixture::new();
        let file = fx.write("src/a.ts");
        fx.write("src/a.css");
        fx.write("src/extra.ts");

        let engine = fx.engine();
        fx.declare(&engine, "G1", &file, vec!["extra.ts".to_string()]);

        let resolution = engine
            .resolve(&file, None, None, false, false)
            .expect("resolve");
        assert_eq!(resolution.group.id(), "G1");
        assert_eq!(member_names(&resolution), vec!["a.ts", "extra.ts"]);
    }

    #[test]
    fn duplicate_owners_resolve_to_empty_with_a_warning() {
        let fx = Fixture::new();
        let file = fx.write("src/a.kt");

        let engine = fx.engine();
        fx.declare(&engine, "G1", &file, Vec::new());
        fx.declare(&engine, "G2", &file, Vec::new());

        let resolution = engine
            .resolve(&file, None, None, false, false)
            .expect("resolve");
        assert!(matches!(resolution.group, Group::Empty));
        assert!(
            resolution
                .warnings
                .iter()
                .any(|w| matches!(w, ResolveWarning::DuplicateOwners { .. }))
        );
        // Ambiguous results are never remembered.
        assert_eq!(engine.cache().get_last(&file), None);
    }

    #[test]
    fn remembered_folder_selection_outranks_same_name() {
        let fx = Fixture::new();
        let file = fx.write("src/foo.ts");
        fx.write("src/foo.css");
        fx.write("src/other.rs");

        let engine = fx.engine();
        engine.cache().set_last(
            &file,
            &Group::Auto(AutoGroup::with_members(
                AutoKind::Folder,
                vec![Link::new(&file)],
            )),
        );

        let resolution = engine
            .resolve(&file, None, None, false, false)
            .expect("resolve");
        assert!(matches!(
            &resolution.group,
            Group::Auto(auto) if auto.kind == AutoKind::Folder
        ));
        assert_eq!(
            member_names(&resolution),
            vec!["foo.ts", "foo.css", "other.rs"]
        );
    }

    #[test]
    fn requested_group_is_kept_when_it_contains_the_file() {
        let fx = Fixture::new();
        let file = fx.write("src/foo.ts");
        fx.write("src/foo.css");

        let engine = fx.engine();
        let requested = Group::Auto(AutoGroup::with_members(
            AutoKind::SameName,
            vec![Link::new(&file), Link::new(fx.root.join("src/foo.css"))],
        ));

        let resolution = engine
            .resolve(&file, None, Some(&requested), false, false)
            .expect("resolve");
        assert_eq!(member_names(&resolution), vec!["foo.ts", "foo.css"]);
    }

    #[test]
    fn refresh_rederives_and_ignores_the_displayed_group() {
        let fx = Fixture::new();
        let file = fx.write("src/a.ts");
        fx.write("src/related.ts");

        let engine = fx.engine();
        fx.declare(&engine, "G1", &file, vec!["related.ts".to_string()]);

        let displayed = Group::folder();
        let resolution = engine
            .resolve(&file, Some(&displayed), None, true, false)
            .expect("resolve");
        assert_eq!(resolution.group.id(), "G1");
    }

    #[test]
    fn external_requests_survive_refresh() {
        let fx = Fixture::new();
        let file = fx.write("src/notes.md");

        let engine = fx.engine();
        let requested = Group::External(grouptabs_groups::ExternalGroup {
            source: grouptabs_groups::ExternalSource::Bookmarks,
            name: "reading".to_string(),
            links: vec![Link::new(&file)],
        });

        let resolution = engine
            .resolve(&file, None, Some(&requested), true, false)
            .expect("resolve");
        assert_eq!(resolution.group.id(), "bookmarks:reading");
    }

    #[test]
    fn multiple_referencing_groups_aggregate_into_a_multi_group() {
        let fx = Fixture::new();
        let shared = fx.write("src/shared.css");
        let first_owner = fx.write("src/a.ts");
        let second_owner = fx.write("src/b.ts");

        let engine = fx.engine();
        fx.declare(&engine, "G1", &first_owner, vec!["shared.css".to_string()]);
        fx.declare(&engine, "G2", &second_owner, vec!["shared.css".to_string()]);

        let resolution = engine
            .resolve(&shared, None, None, false, false)
            .expect("resolve");
        match &resolution.group {
            Group::Multi(multi) => assert_eq!(multi.groups.len(), 2),
            other => panic!("expected multi group, got {other:?}"),
        }
    }

    #[test]
    fn index_not_ready_propagates_to_the_caller() {
        let fx = Fixture::new();
        let file = fx.write("src/a.ts");

        let engine = fx.engine();
        let group = fx.declare(&engine, "G1", &file, Vec::new());
        engine.cache().set_last(&file, &Group::Indexed(group));
        engine.cache().clear();

        fx.index.set_ready(false);
        let err = engine
            .resolve(&file, None, None, false, false)
            .expect_err("not ready should propagate");
        assert_eq!(err, ResolveError::IndexNotReady);
    }

    #[test]
    fn stub_results_are_not_remembered() {
        let fx = Fixture::new();
        let file = fx.write("src/foo.ts");
        fx.write("src/foo.css");

        let engine = fx.engine();
        let resolution = engine
            .resolve(&file, None, None, false, true)
            .expect("resolve");
        assert!(resolution.stub);
        assert_eq!(engine.cache().get_last(&file), None);
    }

    #[test]
    fn regex_definitions_match_before_auto_fallback() {
        let mut fx = Fixture::new();
        let file = fx.write("src/widget_test.go");
        fx.write("src/widget.go");
        fx.write("src/other.go");
        fx.settings.regex_groups =
            vec![RegexDefinition::new(r"^widget(_test)?\.go$").without_capture(1)];

        let engine = fx.engine();
        let resolution = engine
            .resolve(&file, None, None, false, false)
            .expect("resolve");
        assert!(matches!(resolution.group, Group::Regex(_)));
        assert_eq!(
            member_names(&resolution),
            vec!["widget_test.go", "widget.go"]
        );
    }

    #[test]
    fn provider_groups_participate_in_the_fallback_aggregation() {
        struct FakeProvider {
            group: grouptabs_groups::ExternalGroup,
        }

        impl ExternalGroupProvider for FakeProvider {
            fn group_for_path(&self, path: &Path) -> Option<grouptabs_groups::ExternalGroup> {
                self.group
                    .links
                    .iter()
                    .any(|l| l.path() == path)
                    .then(|| self.group.clone())
            }

            fn group_by_id(&self, id: &str) -> Option<grouptabs_groups::ExternalGroup> {
                (self.group.id() == id).then(|| self.group.clone())
            }
        }

        let fx = Fixture::new();
        let file = fx.write("src/todo.md");
        fx.write("src/unrelated.rs");

        let provider = Arc::new(FakeProvider {
            group: grouptabs_groups::ExternalGroup {
                source: grouptabs_groups::ExternalSource::Favorites,
                name: "planning".to_string(),
                links: vec![Link::new(&file)],
            },
        });
        let engine = fx.engine().with_provider(provider);

        // Same-name finds only the file itself; the favorites list that
        // contains it wins the aggregation.
        let resolution = engine
            .resolve(&file, None, None, false, false)
            .expect("resolve");
        assert_eq!(resolution.group.id(), "favorites:planning");
    }

    #[test]
    fn rendered_links_respect_the_tab_cap() {
        let members: Vec<Link> = (0..10)
            .map(|i| Link::new(format!("/src/file{i}.ts")))
            .collect();
        let resolution = Resolution {
            group: Group::Auto(AutoGroup::with_members(AutoKind::Folder, members)),
            stub: false,
            warnings: Vec::new(),
        };
        assert_eq!(resolution.rendered_links(3).len(), 3);
        assert_eq!(resolution.rendered_links(50).len(), 10);
    }

    #[test]
    fn hide_panel_history_is_decoded() {
        let fx = Fixture::new();
        let file = fx.write("src/foo.ts");
        fx.write("src/foo.css");

        let engine = fx.engine();
        engine.cache().set_last(&file, &Group::HidePanel);

        let resolution = engine
            .resolve(&file, None, None, false, false)
            .expect("resolve");
        assert!(matches!(resolution.group, Group::HidePanel));
    }
}
