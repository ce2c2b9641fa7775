use crate::definition::RegexDefinition;
use serde::Deserialize;
use serde::Serialize;

/// Engine configuration and limits, persisted by the host's settings layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Remember the last selected group per file and prefer it during
    /// resolution.
    #[serde(default = "default_true")]
    pub remember_last_group: bool,

    /// Fall back to the same-file-name auto group when nothing else
    /// applies.
    #[serde(default = "default_true")]
    pub auto_same_name: bool,

    /// Fall back to the folder auto group when same-name is disabled or
    /// yields nothing.
    #[serde(default = "default_true")]
    pub auto_folder: bool,

    /// Regex group declarations, tried in order against file names.
    #[serde(default)]
    pub regex_groups: Vec<RegexDefinition>,

    /// Hard cap on members collected for one group expansion.
    #[serde(default = "default_max_files_per_group")]
    pub max_files_per_group: usize,

    /// Cap on tabs the widget renders for one group.
    #[serde(default = "default_max_tabs_rendered")]
    pub max_tabs_rendered: usize,

    /// Cap on persisted last-selected history entries.
    #[serde(default = "default_max_history_entries")]
    pub max_history_entries: usize,

    /// Exclude group-definition files themselves from expanded groups.
    #[serde(default)]
    pub hide_definition_files: bool,

    /// File extension of the declarative group-definition format.
    #[serde(default = "default_definition_extension")]
    pub definition_file_extension: String,
}

fn default_true() -> bool {
    true
}

fn default_max_files_per_group() -> usize {
    10_000
}

fn default_max_tabs_rendered() -> usize {
    50
}

fn default_max_history_entries() -> usize {
    1_000
}

fn default_definition_extension() -> String {
    "tabgroups".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            remember_last_group: true,
            auto_same_name: true,
            auto_folder: true,
            regex_groups: Vec::new(),
            max_files_per_group: default_max_files_per_group(),
            max_tabs_rendered: default_max_tabs_rendered(),
            max_history_entries: default_max_history_entries(),
            hide_definition_files: false,
            definition_file_extension: default_definition_extension(),
        }
    }
}

impl Settings {
    /// Validate configuration before handing it to the engine.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_files_per_group == 0 {
            return Err("max_files_per_group must be > 0".to_string());
        }

        if self.max_tabs_rendered == 0 {
            return Err("max_tabs_rendered must be > 0".to_string());
        }

        if self.definition_file_extension.is_empty() {
            return Err("definition_file_extension must not be empty".to_string());
        }

        for group in &self.regex_groups {
            if group.pattern.is_empty() {
                return Err("regex group pattern must not be empty".to_string());
            }
        }

        Ok(())
    }
}
