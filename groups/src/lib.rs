pub mod contracts;
pub mod definition;
pub mod error;
pub mod group;
pub mod link;
pub mod settings;

pub use contracts::ExternalGroupProvider;
pub use contracts::FileGroupIndex;
pub use contracts::ProjectLayout;
pub use definition::GroupColors;
pub use definition::GroupDefinition;
pub use definition::RegexDefinition;
pub use definition::Scope;
pub use error::IndexError;
pub use error::ResolveError;
pub use error::ResolveWarning;
pub use group::AutoGroup;
pub use group::AutoKind;
pub use group::ExternalGroup;
pub use group::ExternalSource;
pub use group::Group;
pub use group::IndexedGroup;
pub use group::MultiGroup;
pub use group::RegexGroup;
pub use link::Link;
pub use settings::Settings;
