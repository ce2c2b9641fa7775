use crate::history::GroupHistory;
use grouptabs_groups::ExternalGroup;
use grouptabs_groups::FileGroupIndex;
use grouptabs_groups::Group;
use grouptabs_groups::IndexedGroup;
use grouptabs_groups::ProjectLayout;
use grouptabs_groups::ResolveWarning;
use grouptabs_groups::Settings;
use grouptabs_groups::error::Result;
use grouptabs_resolver::FileResolver;
use std::collections::HashMap;
use std::io;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::PoisonError;
use std::sync::RwLock;
use std::sync::RwLockReadGuard;
use std::sync::RwLockWriteGuard;
use tokio::sync::broadcast;
use tracing::warn;

/// Notifications emitted when cached groups disappear, so dependent views
/// can re-run resolution.
#[derive(Debug, Clone)]
pub enum CacheEvent {
    GroupRemoved { owner: PathBuf },
    Cleared,
}

/// Result of the owning-or-single lookup.
#[derive(Debug, Clone)]
pub enum OwnershipLookup {
    /// Nothing registered for the path; the cascade continues.
    None,
    /// Exactly one group is registered for the path, or exactly one group
    /// owns it outright.
    Single(Group),
    /// More than one group claims exclusive ownership; resolution yields
    /// the empty group rather than guessing.
    Ambiguous,
}

/// The reverse index: file path to the set of groups referencing it, plus
/// the last-selected-group history.
///
/// Shared by all views and the indexing subsystem. Mutation is confined to
/// atomic per-key operations: insert a per-key container if absent, then
/// mutate inside that container's lock. The map itself is never replaced
/// while readers may be iterating, and entries leave only through explicit
/// invalidation or a reindex clear.
pub struct IndexCache {
    entries: RwLock<HashMap<PathBuf, Arc<RwLock<PathEntry>>>>,
    history: RwLock<GroupHistory>,
    index: Arc<dyn FileGroupIndex>,
    layout: Arc<ProjectLayout>,
    settings: Arc<Settings>,
    events: broadcast::Sender<CacheEvent>,
}

#[derive(Default)]
struct PathEntry {
    groups: Vec<Group>,
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

impl IndexCache {
    pub fn new(
        index: Arc<dyn FileGroupIndex>,
        layout: Arc<ProjectLayout>,
        settings: Arc<Settings>,
    ) -> Self {
        let (events, _) = broadcast::channel(64);
        let history = GroupHistory::new(settings.max_history_entries);
        Self {
            entries: RwLock::new(HashMap::new()),
            history: RwLock::new(history),
            index,
            layout,
            settings,
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CacheEvent> {
        self.events.subscribe()
    }

    /// Seed the last-selected history from the persisted workspace state.
    pub fn load_history(&self, state_dir: &Path) {
        *write(&self.history) = GroupHistory::load(state_dir, self.settings.max_history_entries);
    }

    pub fn save_history(&self, state_dir: &Path) -> io::Result<()> {
        read(&self.history).save(state_dir)
    }

    fn entry(&self, path: &Path) -> Option<Arc<RwLock<PathEntry>>> {
        read(&self.entries).get(path).cloned()
    }

    fn entry_or_insert(&self, path: &Path) -> Arc<RwLock<PathEntry>> {
        if let Some(entry) = self.entry(path) {
            return entry;
        }
        write(&self.entries)
            .entry(path.to_path_buf())
            .or_default()
            .clone()
    }

    /// Every valid group currently registered for the path.
    pub fn groups_for(&self, path: &Path) -> Vec<Group> {
        let Some(entry) = self.entry(path) else {
            return Vec::new();
        };
        let guard = read(&entry);
        guard.groups.iter().filter(|g| g.is_valid()).cloned().collect()
    }

    /// The single group that owns or uniquely references the path. More
    /// than one explicit owner is a user-configuration error surfaced as a
    /// duplicate-id warning, never resolved by an arbitrary pick.
    pub fn owning_or_single(
        &self,
        path: &Path,
        warnings: &mut Vec<ResolveWarning>,
    ) -> OwnershipLookup {
        let groups = self.groups_for(path);
        if groups.is_empty() {
            return OwnershipLookup::None;
        }
        if groups.len() == 1 {
            let Some(group) = groups.into_iter().next() else {
                return OwnershipLookup::None;
            };
            return OwnershipLookup::Single(group);
        }

        let owners: Vec<&Group> = groups.iter().filter(|g| g.owns(path)).collect();
        match owners.len() {
            0 => OwnershipLookup::None,
            1 => owners
                .first()
                .map(|g| OwnershipLookup::Single((*g).clone()))
                .unwrap_or(OwnershipLookup::None),
            _ => {
                warnings.push(ResolveWarning::DuplicateOwners {
                    path: path.to_path_buf(),
                    group_ids: owners.iter().map(|g| g.id()).collect(),
                });
                OwnershipLookup::Ambiguous
            }
        }
    }

    /// Re-fetch an indexed group's id from the authoritative index and
    /// invalidate the cached instance when the fetched value differs.
    /// No-op for every other variant.
    pub fn validate(&self, group: &Group) -> Result<()> {
        let Group::Indexed(indexed) = group else {
            return Ok(());
        };
        if !indexed.is_valid() {
            return Ok(());
        }
        let definitions = self.index.definitions_for_id(indexed.id())?;
        if definitions.iter().any(|d| d == indexed.definition()) {
            return Ok(());
        }
        indexed.invalidate();
        self.purge_invalid();
        Ok(())
    }

    /// Expand an indexed group's member links and register the group under
    /// its owner path and every member path. Skipped when the group no
    /// longer exists in the index.
    pub fn init_group(&self, group: &Arc<IndexedGroup>) -> Result<Vec<ResolveWarning>> {
        let definitions = self.index.definitions_for_id(group.id())?;
        if !definitions.iter().any(|d| d == group.definition()) {
            group.invalidate();
            return Ok(Vec::new());
        }

        let resolver = FileResolver::new(&self.layout, self.index.as_ref(), &self.settings);
        let expansion = resolver.expand(group.definition())?;
        let links = group.init_links(expansion.links).to_vec();

        let wrapped = Group::Indexed(group.clone());
        self.register(&wrapped, group.owner_path());
        for link in &links {
            self.register(&wrapped, link.path());
        }
        Ok(expansion.warnings)
    }

    /// Reconciliation hook invoked when the background indexer finishes a
    /// file: an equal group already cached for the path is returned
    /// unchanged, otherwise the incoming group is initialized.
    pub fn on_indexing_done(&self, path: &Path, group: Arc<IndexedGroup>) -> Result<Group> {
        let candidate = Group::Indexed(group.clone());
        if let Some(entry) = self.entry(path) {
            let guard = read(&entry);
            if let Some(existing) = guard.groups.iter().find(|g| **g == candidate) {
                return Ok(existing.clone());
            }
        }
        for warning in self.init_group(&group)? {
            warn!("{warning}");
        }
        Ok(Group::Indexed(group))
    }

    /// External (bookmark/favorite) groups join the reverse index exactly
    /// like indexed ones, but their member lists arrive ready-made.
    pub fn register_external(&self, group: ExternalGroup) {
        let wrapped = Group::External(group.clone());
        for link in &group.links {
            self.register(&wrapped, link.path());
        }
    }

    fn register(&self, group: &Group, path: &Path) {
        let entry = self.entry_or_insert(path);
        let mut guard = write(&entry);
        let id = group.id();
        guard.groups.retain(|g| g.is_valid() || g.id() != id);
        if !guard.groups.iter().any(|g| g.id() == id) {
            guard.groups.push(group.clone());
        }
    }

    /// Record the group as the last selected one for the path. Stub and
    /// invalid results are never remembered.
    pub fn set_last(&self, path: &Path, group: &Group) {
        if matches!(group, Group::Empty | Group::Stub) || !group.is_valid() {
            return;
        }
        write(&self.history).record(path.to_path_buf(), group.id());
    }

    pub fn get_last(&self, path: &Path) -> Option<String> {
        read(&self.history).get(path).map(str::to_string)
    }

    /// First valid registered group carrying the given id, if any.
    pub fn find_registered(&self, id: &str) -> Option<Group> {
        let snapshot: Vec<Arc<RwLock<PathEntry>>> = read(&self.entries).values().cloned().collect();
        for entry in snapshot {
            let guard = read(&entry);
            if let Some(group) = guard.groups.iter().find(|g| g.is_valid() && g.id() == id) {
                return Some(group.clone());
            }
        }
        None
    }

    /// Invalidate every cached group owned by the path and drop it from
    /// each reverse-index entry, then notify dependent views.
    pub fn remove_group(&self, owner_path: &Path) {
        let snapshot: Vec<Arc<RwLock<PathEntry>>> = read(&self.entries).values().cloned().collect();
        for entry in &snapshot {
            let guard = read(entry);
            for group in &guard.groups {
                if group.owns(owner_path)
                    && let Group::Indexed(indexed) = group
                {
                    indexed.invalidate();
                }
            }
        }
        self.purge_invalid();
        let _ = self.events.send(CacheEvent::GroupRemoved {
            owner: owner_path.to_path_buf(),
        });
    }

    /// Wholesale reset on explicit reindex. History survives; only the
    /// reverse index is rebuilt from scratch.
    pub fn clear(&self) {
        write(&self.entries).clear();
        let _ = self.events.send(CacheEvent::Cleared);
    }

    /// Second phase of invalidation: drop now-invalid groups from a fresh
    /// snapshot of the per-key containers. Validation itself may trigger
    /// re-indexing that mutates the map, so the snapshot is taken after
    /// the validity flags settle.
    fn purge_invalid(&self) {
        let snapshot: Vec<Arc<RwLock<PathEntry>>> = read(&self.entries).values().cloned().collect();
        for entry in snapshot {
            write(&entry).groups.retain(Group::is_valid);
        }
    }
}
