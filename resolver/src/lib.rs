pub mod patterns;
pub mod regexes;
pub mod siblings;

pub use patterns::Expansion;
pub use patterns::FileResolver;
pub use regexes::RegexFileResolver;
pub use regexes::pattern_matches;
pub use siblings::folder_links;
pub use siblings::same_feature_links;
pub use siblings::same_name_links;
