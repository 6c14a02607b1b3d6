//! Language service for catscript documents.
//!
//! Every request follows the same path: find the runner id in the document,
//! fetch that runner from the shared schema store, locate the token at the
//! cursor, resolve it to a command and render its descriptor.

use std::sync::Arc;

use async_trait::async_trait;
use lsp_types::{
    CompletionItem, CompletionItemKind, Documentation, MarkupContent, MarkupKind, Position, Range,
};
use tracing::debug;

use super::descriptor::{describe, CommandDescriptor};
use super::directive;
use super::token::{byte_offset, completion_suppressed, dot_scope, hover_token};
use super::{line_at, CompletionTrigger, HoverInfo, LanguageService};
use crate::config::CatscriptConfig;
use crate::schema::source::DocumentId;
use crate::schema::store::SchemaStore;
use crate::schema::{Runner, BASE_SCOPE};

/// Language service for catscript source files.
pub struct CatscriptService {
    store: Arc<SchemaStore>,
    config: CatscriptConfig,
}

impl CatscriptService {
    pub fn new(store: Arc<SchemaStore>, config: CatscriptConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &SchemaStore {
        &self.store
    }

    /// Runner id a document is written against.
    pub fn runner_id<'a>(&'a self, content: &'a str) -> &'a str {
        directive::runner_id(content, &self.config.default_runner)
    }

    /// Loaded runner for a document, if its schema exists.
    pub async fn runner_for(&self, content: &str) -> Option<Arc<Runner>> {
        let runner_id = self.runner_id(content);
        let runner = self.store.resolve(runner_id).await;
        if runner.is_none() {
            debug!("No schema for runner {runner_id}");
        }
        runner
    }

    /// Notify the service that a document changed. Schema documents are
    /// re-parsed; anything else is ignored.
    pub async fn on_document_changed(&self, document: &DocumentId) {
        self.store.invalidate(document).await;
    }

    fn markdown(&self, descriptor: &CommandDescriptor) -> Documentation {
        Documentation::MarkupContent(MarkupContent {
            kind: MarkupKind::Markdown,
            value: descriptor.to_markdown(&self.config.language_id),
        })
    }

    /// Completion items for the commands of one scope.
    ///
    /// `full` is the general (non-dot) listing: `BASE` commands are labelled
    /// by bare name, others as `Scope.command`. Dot-triggered items keep the
    /// qualified label but insert only the command name.
    fn command_items(&self, runner: &Runner, scope_name: &str, full: bool) -> Vec<CompletionItem> {
        runner
            .commands_in(scope_name)
            .map(|command| {
                let descriptor = CommandDescriptor::new(command, &command.scope);
                let label = if full && scope_name == BASE_SCOPE {
                    command.command.clone()
                } else {
                    format!("{}.{}", command.scope, command.command)
                };
                let (insert_text, sort_text) = if full {
                    (None, None)
                } else {
                    (Some(command.command.clone()), Some(command.command.clone()))
                };
                CompletionItem {
                    label,
                    kind: Some(CompletionItemKind::FUNCTION),
                    detail: Some(descriptor.title.clone()),
                    documentation: Some(self.markdown(&descriptor)),
                    insert_text,
                    sort_text,
                    ..Default::default()
                }
            })
            .collect()
    }
}

#[async_trait]
impl LanguageService for CatscriptService {
    async fn completions(
        &self,
        content: &str,
        pos: Position,
        trigger: CompletionTrigger,
    ) -> Vec<CompletionItem> {
        let Some(line) = line_at(content, pos.line) else {
            return Vec::new();
        };
        let cursor = byte_offset(line, pos.character);
        if completion_suppressed(line, cursor) {
            return Vec::new();
        }

        let Some(runner) = self.runner_for(content).await else {
            return Vec::new();
        };

        if trigger.is_dot() {
            return match dot_scope(line, cursor) {
                Some(scope_name) => self.command_items(&runner, scope_name, false),
                None => Vec::new(),
            };
        }

        let mut items = Vec::new();
        let mut commands = Vec::new();
        for scope_name in runner.scopes.keys() {
            items.push(CompletionItem {
                label: scope_name.clone(),
                kind: Some(CompletionItemKind::MODULE),
                ..Default::default()
            });
            commands.extend(self.command_items(&runner, scope_name, true));
        }
        items.extend(commands);
        items
    }

    async fn hover(&self, content: &str, pos: Position) -> Option<HoverInfo> {
        let line = line_at(content, pos.line)?;
        let token = hover_token(line, byte_offset(line, pos.character))?;

        let runner = self.runner_for(content).await?;
        let descriptor = describe(&runner, token.scope, token.command)?;

        // The token is ASCII, so byte and character offsets agree.
        Some(HoverInfo {
            content: descriptor.to_markdown(&self.config.language_id),
            range: Some(Range::new(
                Position::new(pos.line, token.span.start as u32),
                Position::new(pos.line, token.span.end as u32),
            )),
        })
    }
}
