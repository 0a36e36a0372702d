use crate::error::{EdgeError, Result};
use crate::host::SettingsStore;
use crate::models::KnownLanguages;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// The keystroke that triggers an expansion.
pub const DELIMITER: char = ' ';
pub const SETTINGS_FILENAME: &str = "settings.json";
/// Directory inside a project folder that holds project-scoped snippets.
pub const PROJECT_SNIPPETS_DIR: &str = ".vscode";
pub const BUNDLE_EXTENSION: &str = "code-snippets";
pub const LANGUAGE_EXTENSION: &str = "json";
/// Environment override for the global snippets directory.
pub const SNIPPETS_DIR_ENV: &str = "EDGE_SNIPPETS_DIR";

/// Editor setting controlling the built-in snippet suggestions.
pub const SNIPPET_SUGGESTIONS_KEY: &str = "editor.snippetSuggestions";
pub const SNIPPET_SUGGESTIONS_NONE: &str = "none";

/// Language identifiers recognised out of the box.
pub const DEFAULT_LANGUAGES: &[&str] = &[
    "bat",
    "c",
    "clojure",
    "coffeescript",
    "cpp",
    "csharp",
    "css",
    "dart",
    "diff",
    "dockerfile",
    "fsharp",
    "git-commit",
    "go",
    "groovy",
    "handlebars",
    "html",
    "ini",
    "java",
    "javascript",
    "javascriptreact",
    "json",
    "jsonc",
    "julia",
    "less",
    "lua",
    "makefile",
    "markdown",
    "objective-c",
    "perl",
    "php",
    "plaintext",
    "powershell",
    "python",
    "r",
    "ruby",
    "rust",
    "scss",
    "shellscript",
    "sql",
    "swift",
    "toml",
    "typescript",
    "typescriptreact",
    "vue",
    "xml",
    "yaml",
];

/// Get the edge configuration directory
pub fn get_config_dir() -> PathBuf {
    dirs::config_dir()
        .map(|dir| dir.join("edge"))
        .unwrap_or_else(|| PathBuf::from(".edge"))
}

/// Get the path to the settings file
pub fn get_settings_file_path() -> PathBuf {
    get_config_dir().join(SETTINGS_FILENAME)
}

/// Directory holding user-wide snippet files.
///
/// Resolution order: `EDGE_SNIPPETS_DIR`, the settings file, then the
/// editor's `User/snippets` directory.
pub fn global_snippets_dir(settings: &Settings) -> PathBuf {
    if let Ok(dir) = env::var(SNIPPETS_DIR_ENV) {
        if !dir.trim().is_empty() {
            return PathBuf::from(dir);
        }
    }

    if let Some(dir) = &settings.snippets_dir {
        return dir.clone();
    }

    dirs::config_dir()
        .map(|dir| dir.join("Code").join("User").join("snippets"))
        .unwrap_or_else(|| PathBuf::from("snippets"))
}

/// Directory that holds project-scoped snippets for a workspace root.
pub fn project_snippets_dir(root: &Path) -> PathBuf {
    root.join(PROJECT_SNIPPETS_DIR)
}

/// Persisted user settings.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    /// Overrides the global snippets directory.
    pub snippets_dir: Option<PathBuf>,
    /// Extra language identifiers on top of [`DEFAULT_LANGUAGES`].
    pub languages: Vec<String>,
    /// Free-form editor settings, e.g. `editor.snippetSuggestions`.
    pub editor: BTreeMap<String, String>,
}

impl Settings {
    pub fn from_json(text: &str) -> Result<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(text).map_err(|e| EdgeError::InvalidConfig(e.to_string()))
    }
}

impl SettingsStore for Settings {
    fn get(&self, key: &str) -> Option<String> {
        self.editor.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.editor.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Load the settings file, falling back to defaults when it does not exist.
pub fn load_settings(path: &Path) -> Result<Settings> {
    if !path.exists() {
        return Ok(Settings::default());
    }

    let content = fs::read_to_string(path).map_err(|e| EdgeError::io(path, e))?;
    Settings::from_json(&content)
}

/// Save settings, creating the parent directory when needed.
pub fn save_settings(path: &Path, settings: &Settings) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| EdgeError::io(parent, e))?;
        }
    }

    let serialized = serde_json::to_string_pretty(settings)?;
    fs::write(path, serialized).map_err(|e| EdgeError::io(path, e))
}

/// Default language identifiers plus the ones listed in the settings.
pub fn known_languages(settings: &Settings) -> KnownLanguages {
    DEFAULT_LANGUAGES
        .iter()
        .map(|language| language.to_string())
        .chain(
            settings
                .languages
                .iter()
                .map(|language| language.trim().to_lowercase())
                .filter(|language| !language.is_empty()),
        )
        .collect()
}
