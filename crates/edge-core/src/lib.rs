pub mod body;
pub mod config;
pub mod error;
pub mod expansion;
pub mod host;
pub mod index;
pub mod library;
pub mod matcher;
pub mod memory;
pub mod models;
pub mod parser;
pub mod sources;
#[cfg(feature = "watch")]
pub mod watcher;
pub mod workspace;

// Re-export common items for convenience
pub use config::{
    get_config_dir, get_settings_file_path, global_snippets_dir, known_languages, load_settings,
    save_settings, Settings, DELIMITER,
};
pub use error::{EdgeError, Result};
pub use expansion::{CoordinatorState, ExpansionCoordinator, ExpansionOutcome};
pub use host::{disable_builtin_suggestions, ChangeEvent, Editor, SettingsStore, TextChange};
pub use index::SnippetIndex;
pub use library::SnippetLibrary;
pub use matcher::find_snippet;
pub use memory::MemoryBuffer;
pub use models::{
    KnownLanguages, Position, Range, Selection, Snippet, WorkspaceFolder, WorkspaceId,
    ANY_LANGUAGE,
};
pub use parser::{classify, parse_definitions, parse_file, SourceKind};
pub use sources::{
    FileEvent, FileEventKind, FileWatcher, NullWatcher, SnippetSources, WatchHandle,
    WorkspaceChange,
};
#[cfg(feature = "watch")]
pub use watcher::NotifyWatcher;
