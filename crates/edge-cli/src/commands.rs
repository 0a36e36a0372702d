use crate::cli::{Commands, Edge};
use edge_core::parser::{classify, parse_definitions, SourceKind};
use edge_core::{
    disable_builtin_suggestions, get_settings_file_path, global_snippets_dir, known_languages,
    load_settings, save_settings, EdgeError, ExpansionCoordinator, ExpansionOutcome, FileWatcher,
    MemoryBuffer, NotifyWatcher, NullWatcher, Position, Result, Settings, Snippet, SnippetLibrary,
    SnippetSources, WorkspaceFolder,
};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tokio::task::LocalSet;
use tracing::info;

/// Settings and directories shared by every subcommand.
pub struct Context {
    pub settings_path: PathBuf,
    pub settings: Settings,
    pub snippets_dir: PathBuf,
}

impl Context {
    pub fn load(snippets_dir: Option<PathBuf>) -> Result<Self> {
        let settings_path = get_settings_file_path();
        let settings = load_settings(&settings_path)?;
        let snippets_dir = snippets_dir.unwrap_or_else(|| global_snippets_dir(&settings));

        Ok(Self {
            settings_path,
            settings,
            snippets_dir,
        })
    }

    fn library(&self) -> Rc<SnippetLibrary> {
        Rc::new(SnippetLibrary::new(known_languages(&self.settings)))
    }

    /// Load the global snippets and the given project folders.
    async fn sources<W: FileWatcher>(
        &self,
        watcher: W,
        workspaces: &[PathBuf],
    ) -> Result<SnippetSources<W>> {
        let folders = workspaces.iter().map(WorkspaceFolder::from_root).collect();
        let mut sources = SnippetSources::new(self.library(), watcher, &self.snippets_dir);
        sources.activate(folders).await?;
        Ok(sources)
    }
}

pub fn handle_command(args: Edge) -> Result<()> {
    let context = Context::load(args.snippets_dir)?;
    let command = args.commands.unwrap_or(Commands::List {
        language: None,
        workspace: Vec::new(),
        json: false,
    });

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| EdgeError::InvalidConfig(format!("failed to start runtime: {}", e)))?;
    LocalSet::new().block_on(&runtime, handle_subcommand(context, command))
}

async fn handle_subcommand(mut context: Context, command: Commands) -> Result<()> {
    match command {
        Commands::List {
            language,
            workspace,
            json,
        } => list(&context, language.as_deref(), &workspace, json).await,
        Commands::Check { file, language } => check(&context, &file, language).await,
        Commands::Expand {
            language,
            workspace,
            at,
            text,
        } => expand(&context, &language, workspace, at, &text)
            .await
            .map(|text| println!("{}", text)),
        Commands::Watch { workspace } => watch(&mut context, &workspace).await,
    }
}

fn source_label(snippet: &Snippet) -> &'static str {
    if snippet.is_project_scoped() {
        "project"
    } else {
        "global"
    }
}

async fn list(
    context: &Context,
    language: Option<&str>,
    workspaces: &[PathBuf],
    json: bool,
) -> Result<()> {
    let sources = context.sources(NullWatcher, workspaces).await?;
    let library = sources.library();

    let snippets: Vec<Snippet> = match language {
        Some(language) => library.lookup(language),
        None => {
            let index = library.index();
            let all: Vec<Snippet> = index
                .languages()
                .into_iter()
                .flat_map(|language| index.bucket(language).iter().cloned())
                .collect();
            all
        }
    };

    if json {
        let entries: Vec<serde_json::Value> = snippets
            .iter()
            .map(|snippet| {
                serde_json::json!({
                    "language": snippet.language,
                    "prefix": snippet.prefix,
                    "body": snippet.body,
                    "source": source_label(snippet),
                    "file": snippet.source_file,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if snippets.is_empty() {
        println!("No snippets found in {}", context.snippets_dir.display());
        return Ok(());
    }

    for snippet in &snippets {
        println!(
            "{:<16} {:<20} {:<8} {}",
            snippet.language,
            snippet.prefix,
            source_label(snippet),
            snippet.source_file.display()
        );
    }
    Ok(())
}

async fn check(context: &Context, file: &Path, extra_languages: Vec<String>) -> Result<()> {
    let mut known = known_languages(&context.settings);
    for language in extra_languages {
        known.insert(language.to_lowercase());
    }

    let kind = classify(file, &known);
    if kind == SourceKind::Ignored {
        return Err(EdgeError::InvalidConfig(format!(
            "{} is not a snippet file for a known language",
            file.display()
        )));
    }

    let text = tokio::fs::read_to_string(file)
        .await
        .map_err(|e| EdgeError::io(file, e))?;
    let snippets = parse_definitions(&text, &kind, file, None, &known)?;

    println!("{}: {} snippet(s)", file.display(), snippets.len());
    for snippet in &snippets {
        println!("  {:<20} {}", snippet.prefix, snippet.language);
    }
    Ok(())
}

/// Type a space at every cursor of `text` and return the resulting document.
pub async fn expand(
    context: &Context,
    language: &str,
    workspace: Option<PathBuf>,
    at: Vec<Position>,
    text: &str,
) -> Result<String> {
    let workspaces: Vec<PathBuf> = workspace.into_iter().collect();
    let sources = context.sources(NullWatcher, &workspaces).await?;

    let mut buffer = MemoryBuffer::new(text, language);
    if let Some(root) = workspaces.first() {
        buffer = buffer.with_workspace(WorkspaceFolder::from_root(root).id);
    }
    if !at.is_empty() {
        buffer.set_cursors(at);
    }

    let coordinator = ExpansionCoordinator::new(Rc::clone(sources.library()));
    let event = buffer.type_text(" ");
    let outcome = coordinator.on_buffer_edited(&buffer, &event).await;
    info!(?outcome, "expansion finished");

    if outcome == ExpansionOutcome::Failed {
        return Err(EdgeError::Mutation("snippet could not be inserted".to_string()));
    }
    Ok(buffer.text())
}

async fn watch(context: &mut Context, workspaces: &[PathBuf]) -> Result<()> {
    if disable_builtin_suggestions(&mut context.settings)? {
        save_settings(&context.settings_path, &context.settings)?;
    }

    let (watcher, mut events) = NotifyWatcher::channel();
    let mut sources = context.sources(watcher, workspaces).await?;
    println!(
        "Watching {} ({} snippets indexed). Press Ctrl+C to stop.",
        context.snippets_dir.display(),
        sources.library().index().len()
    );

    loop {
        tokio::select! {
            Some(event) = events.recv() => {
                info!(kind = ?event.kind, file = %event.path.display(), "snippet file changed");
                sources.on_definition_file_changed(event).await;
                println!("{} snippets indexed", sources.library().index().len());
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    sources.shutdown();
    Ok(())
}
