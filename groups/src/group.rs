use crate::definition::GroupColors;
use crate::definition::GroupDefinition;
use crate::definition::RegexDefinition;
use crate::link::Link;
use std::path::Path;
use std::sync::Arc;
use std::sync::OnceLock;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

/// History ids for the constant group variants. These are the exact values
/// written to the persisted last-selected history, so they must stay stable
/// across versions.
pub const SAME_NAME_ID: &str = "SAME_FILE_NAME";
pub const DIRECTORY_ID: &str = "DIRECTORY";
pub const SAME_FEATURE_ID: &str = "SAME_FEATURE";
pub const HIDE_PANEL_ID: &str = "HIDE_PANEL";
pub const REGEX_ID_PREFIX: &str = "regex:";
pub const BOOKMARKS_ID_PREFIX: &str = "bookmarks:";
pub const FAVORITES_ID_PREFIX: &str = "favorites:";

/// A named set of file links shown as tabs for a given file.
///
/// A closed tagged union: sentinel variants are compared by tag and the
/// per-variant refresh behavior lives in a single match in the engine, not
/// in runtime type tests. Only indexed groups carry mutable state (their
/// validity flag and the lazily computed member list).
#[derive(Debug, Clone)]
pub enum Group {
    /// No group applies. Distinguishable by tag, never carries members.
    Empty,
    /// Placeholder returned before index-dependent expansion completes.
    Stub,
    /// The user chose to hide the tab panel for this file.
    HidePanel,
    Auto(AutoGroup),
    Indexed(Arc<IndexedGroup>),
    Regex(RegexGroup),
    Multi(MultiGroup),
    External(ExternalGroup),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AutoKind {
    SameName,
    Folder,
    SameFeature,
}

impl AutoKind {
    pub fn id(&self) -> &'static str {
        match self {
            AutoKind::SameName => SAME_NAME_ID,
            AutoKind::Folder => DIRECTORY_ID,
            AutoKind::SameFeature => SAME_FEATURE_ID,
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            AutoKind::SameName => "Same name",
            AutoKind::Folder => "Folder",
            AutoKind::SameFeature => "Same feature",
        }
    }
}

/// A group computed from file-system siblings rather than a declaration.
/// The constant, unresolved form has no members; refresh recomputes the
/// member list from the current siblings every time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutoGroup {
    pub kind: AutoKind,
    pub members: Vec<Link>,
}

impl AutoGroup {
    pub fn same_name() -> Self {
        Self {
            kind: AutoKind::SameName,
            members: Vec::new(),
        }
    }

    pub fn folder() -> Self {
        Self {
            kind: AutoKind::Folder,
            members: Vec::new(),
        }
    }

    pub fn same_feature() -> Self {
        Self {
            kind: AutoKind::SameFeature,
            members: Vec::new(),
        }
    }

    pub fn with_members(kind: AutoKind, members: Vec<Link>) -> Self {
        Self { kind, members }
    }
}

/// A group declared in file metadata and surfaced through the background
/// index. The member list is expanded lazily from the definition, at most
/// once per instance; invalidation happens when the index re-emits a
/// different definition for the same id.
#[derive(Debug)]
pub struct IndexedGroup {
    definition: GroupDefinition,
    links: OnceLock<Vec<Link>>,
    valid: AtomicBool,
}

impl IndexedGroup {
    pub fn new(definition: GroupDefinition) -> Self {
        Self {
            definition,
            links: OnceLock::new(),
            valid: AtomicBool::new(true),
        }
    }

    pub fn id(&self) -> &str {
        &self.definition.id
    }

    pub fn title(&self) -> &str {
        &self.definition.title
    }

    pub fn owner_path(&self) -> &Path {
        &self.definition.owner_path
    }

    pub fn definition(&self) -> &GroupDefinition {
        &self.definition
    }

    pub fn colors(&self) -> &GroupColors {
        &self.definition.colors
    }

    /// The expanded member list, or `None` while unresolved.
    pub fn resolved_links(&self) -> Option<&[Link]> {
        self.links.get().map(Vec::as_slice)
    }

    /// Install the expanded member list. First write wins; a concurrent
    /// loser's value is discarded and the winner's list is returned.
    pub fn init_links(&self, links: Vec<Link>) -> &[Link] {
        self.links.get_or_init(|| links)
    }

    pub fn is_valid(&self) -> bool {
        self.valid.load(Ordering::Acquire)
    }

    pub fn invalidate(&self) {
        self.valid.store(false, Ordering::Release);
    }
}

impl PartialEq for IndexedGroup {
    fn eq(&self, other: &Self) -> bool {
        self.definition == other.definition
    }
}

impl Eq for IndexedGroup {}

/// A settings-declared regex group, expanded by the regex resolver. A
/// freshly matched group has no members yet and renders as a stub until
/// expansion fills it in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegexGroup {
    pub definition: RegexDefinition,
    pub members: Vec<Link>,
}

impl RegexGroup {
    pub fn unresolved(definition: RegexDefinition) -> Self {
        Self {
            definition,
            members: Vec::new(),
        }
    }

    pub fn id(&self) -> String {
        format!(
            "{REGEX_ID_PREFIX}{}:{}",
            self.definition.scope.as_str(),
            self.definition.pattern
        )
    }
}

/// A synthetic aggregation of other groups, used when several declared
/// groups reference the same file and none owns it outright.
#[derive(Debug, Clone)]
pub struct MultiGroup {
    pub groups: Vec<Group>,
}

impl MultiGroup {
    pub fn new(groups: Vec<Group>) -> Self {
        Self { groups }
    }

    /// Union of the child member lists, first occurrence wins.
    pub fn links(&self) -> Vec<Link> {
        let mut seen = Vec::new();
        for group in &self.groups {
            for link in group.links() {
                if !seen.contains(&link) {
                    seen.push(link);
                }
            }
        }
        seen
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExternalSource {
    Bookmarks,
    Favorites,
}

impl ExternalSource {
    pub fn id_prefix(&self) -> &'static str {
        match self {
            ExternalSource::Bookmarks => BOOKMARKS_ID_PREFIX,
            ExternalSource::Favorites => FAVORITES_ID_PREFIX,
        }
    }
}

/// A ready-made group owned by an external collaborator (bookmark or
/// favorite lists). Participates in the cascade and the reverse index like
/// any other group but is never expanded by the definition resolver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalGroup {
    pub source: ExternalSource,
    pub name: String,
    pub links: Vec<Link>,
}

impl ExternalGroup {
    pub fn id(&self) -> String {
        format!("{}{}", self.source.id_prefix(), self.name)
    }
}

impl Group {
    pub fn same_name() -> Self {
        Group::Auto(AutoGroup::same_name())
    }

    pub fn folder() -> Self {
        Group::Auto(AutoGroup::folder())
    }

    pub fn indexed(definition: GroupDefinition) -> Self {
        Group::Indexed(Arc::new(IndexedGroup::new(definition)))
    }

    /// Stable identity for this group, also used as its history id.
    pub fn id(&self) -> String {
        match self {
            Group::Empty => String::new(),
            Group::Stub => String::new(),
            Group::HidePanel => HIDE_PANEL_ID.to_string(),
            Group::Auto(auto) => auto.kind.id().to_string(),
            Group::Indexed(indexed) => indexed.id().to_string(),
            Group::Regex(regex) => regex.id(),
            Group::Multi(multi) => {
                let ids: Vec<String> = multi.groups.iter().map(Group::id).collect();
                ids.join("+")
            }
            Group::External(external) => external.id(),
        }
    }

    pub fn title(&self) -> String {
        match self {
            Group::Empty | Group::Stub | Group::HidePanel => String::new(),
            Group::Auto(auto) => auto.kind.title().to_string(),
            Group::Indexed(indexed) => indexed.title().to_string(),
            Group::Regex(regex) => regex.definition.pattern.clone(),
            Group::Multi(multi) => {
                let titles: Vec<String> = multi.groups.iter().map(Group::title).collect();
                titles.join(" | ")
            }
            Group::External(external) => external.name.clone(),
        }
    }

    /// The member links this group currently knows about. An unresolved
    /// indexed or regex group reports an empty list.
    pub fn links(&self) -> Vec<Link> {
        match self {
            Group::Empty | Group::Stub | Group::HidePanel => Vec::new(),
            Group::Auto(auto) => auto.members.clone(),
            Group::Indexed(indexed) => indexed
                .resolved_links()
                .map(<[Link]>::to_vec)
                .unwrap_or_default(),
            Group::Regex(regex) => regex.members.clone(),
            Group::Multi(multi) => multi.links(),
            Group::External(external) => external.links.clone(),
        }
    }

    /// Membership test by link path.
    pub fn contains(&self, path: &Path) -> bool {
        match self {
            Group::Empty | Group::Stub | Group::HidePanel => false,
            Group::Auto(auto) => auto.members.iter().any(|l| l.path() == path),
            Group::Indexed(indexed) => indexed
                .resolved_links()
                .is_some_and(|links| links.iter().any(|l| l.path() == path)),
            Group::Regex(regex) => regex.members.iter().any(|l| l.path() == path),
            Group::Multi(multi) => multi.groups.iter().any(|g| g.contains(path)),
            Group::External(external) => external.links.iter().any(|l| l.path() == path),
        }
    }

    /// Exclusive-ownership test: true when this group's declaration lives
    /// in the given file. Only indexed groups own paths.
    pub fn owns(&self, path: &Path) -> bool {
        match self {
            Group::Indexed(indexed) => indexed.owner_path() == path,
            _ => false,
        }
    }

    pub fn is_valid(&self) -> bool {
        match self {
            Group::Indexed(indexed) => indexed.is_valid(),
            Group::Multi(multi) => multi.groups.iter().any(Group::is_valid),
            _ => true,
        }
    }

    pub fn is_auto(&self) -> bool {
        matches!(self, Group::Auto(_))
    }

    pub fn is_external(&self) -> bool {
        matches!(self, Group::External(_))
    }

    pub fn is_sentinel(&self) -> bool {
        matches!(self, Group::Empty | Group::Stub | Group::HidePanel)
    }

    pub fn colors(&self) -> Option<&GroupColors> {
        match self {
            Group::Indexed(indexed) => Some(indexed.colors()),
            _ => None,
        }
    }
}

/// Value equality: sentinels by tag, auto groups by kind and members,
/// indexed groups by definition. Used by the cache's idempotent
/// reconciliation and by validation against re-fetched index values.
impl PartialEq for Group {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Group::Empty, Group::Empty) => true,
            (Group::Stub, Group::Stub) => true,
            (Group::HidePanel, Group::HidePanel) => true,
            (Group::Auto(a), Group::Auto(b)) => a == b,
            (Group::Indexed(a), Group::Indexed(b)) => a == b,
            (Group::Regex(a), Group::Regex(b)) => a == b,
            (Group::Multi(a), Group::Multi(b)) => a.groups == b.groups,
            (Group::External(a), Group::External(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Group {}
