//! In-process language intelligence — no JSON-RPC, no transport.
//!
//! Functions that operate directly on editor buffer content. Uses
//! `lsp-types` for the standard data structures (Position, CompletionItem,
//! etc.) so an editor adapter can forward results without conversion.
//!
//! Requests are async only because schema loading may wait on the
//! workspace. Every failure is absorbed here: a request that cannot be
//! answered yields no hover or an empty completion list.

pub mod catscript;
pub mod descriptor;
pub mod directive;
pub mod token;

use async_trait::async_trait;
use lsp_types::{CompletionItem, Position};

/// Hover information for a position in the document.
#[derive(Debug, Clone, PartialEq)]
pub struct HoverInfo {
    /// Content to display (markdown).
    pub content: String,
    /// Optional range the hover applies to.
    pub range: Option<lsp_types::Range>,
}

/// What caused a completion request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompletionTrigger {
    /// Explicit request or identifier typing.
    #[default]
    Invoked,
    /// A registered trigger character was typed just before the cursor.
    Character(char),
}

impl CompletionTrigger {
    pub fn is_dot(self) -> bool {
        self == CompletionTrigger::Character('.')
    }
}

/// In-process language service.
#[async_trait]
pub trait LanguageService: Send + Sync {
    /// Compute completions at the given position.
    async fn completions(
        &self,
        content: &str,
        pos: Position,
        trigger: CompletionTrigger,
    ) -> Vec<CompletionItem>;

    /// Compute hover information at the given position.
    async fn hover(&self, content: &str, pos: Position) -> Option<HoverInfo>;
}

/// Text of line `line`, without its line terminator. A trailing empty line
/// after the final newline counts as a line.
pub(crate) fn line_at(content: &str, line: u32) -> Option<&str> {
    content
        .split('\n')
        .nth(line as usize)
        .map(|l| l.strip_suffix('\r').unwrap_or(l))
}
