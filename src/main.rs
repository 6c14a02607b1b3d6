use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use lsp_types::Position;
use tracing::info;

use catscript_lsp::config::CatscriptConfig;
use catscript_lsp::lsp::catscript::CatscriptService;
use catscript_lsp::lsp::{CompletionTrigger, LanguageService};
use catscript_lsp::schema::source::WorkspaceSource;
use catscript_lsp::schema::store::SchemaStore;

#[derive(Parser)]
#[command(name = "catscript-lsp", about = "Hover and completion for catscript runners.")]
struct Cli {
    /// Workspace root (defaults to current directory)
    #[arg(short, long)]
    workspace: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print hover markdown for a position (0-based line and column)
    Hover {
        file: PathBuf,
        line: u32,
        col: u32,
    },
    /// Print completion labels for a position, one per line
    Complete {
        file: PathBuf,
        line: u32,
        col: u32,
        /// Completion was triggered by typing `.`
        #[arg(long)]
        dot: bool,
    },
    /// Print the merged schema of a runner as JSON
    Schema {
        /// Runner id (defaults to the configured default runner)
        runner: Option<String>,
    },
    /// Print the runner id a document resolves to
    Runner { file: PathBuf },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("catscript_lsp=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let workspace = cli.workspace.unwrap_or_else(|| PathBuf::from("."));
    let config = CatscriptConfig::load(&workspace);

    info!("catscript-lsp using workspace {}", workspace.display());

    let source = Arc::new(WorkspaceSource::new(&workspace, config.schema_dir.clone()));
    let store = Arc::new(SchemaStore::new(source));
    let service = CatscriptService::new(store.clone(), config.clone());

    match cli.command {
        Command::Hover { file, line, col } => {
            let text = read(&file)?;
            if let Some(hover) = service.hover(&text, Position::new(line, col)).await {
                println!("{}", hover.content);
            }
        }
        Command::Complete {
            file,
            line,
            col,
            dot,
        } => {
            let text = read(&file)?;
            let trigger = if dot {
                CompletionTrigger::Character('.')
            } else {
                CompletionTrigger::Invoked
            };
            for item in service
                .completions(&text, Position::new(line, col), trigger)
                .await
            {
                println!("{}", item.label);
            }
        }
        Command::Schema { runner } => {
            let runner_id = runner.unwrap_or(config.default_runner);
            let runner = store
                .resolve(&runner_id)
                .await
                .with_context(|| format!("no schema for runner {runner_id}"))?;
            println!("{}", serde_json::to_string_pretty(&*runner)?);
        }
        Command::Runner { file } => {
            let text = read(&file)?;
            println!("{}", service.runner_id(&text));
        }
    }

    Ok(())
}

fn read(file: &Path) -> Result<String> {
    std::fs::read_to_string(file).with_context(|| format!("failed to read {}", file.display()))
}
