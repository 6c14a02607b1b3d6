//! Runner schemas — the commands a catscript document may call.
//!
//! A runner maps scope names to scopes, and each scope maps an uppercased
//! command name to its definition. Commands in the `BASE` scope are callable
//! without a scope qualifier. A runner may `extends` another runner, in which
//! case its own commands are layered over the parent's, one command at a time.
//!
//! Schema documents come in two historical shapes (flat `commands` and nested
//! `scopes`); `parser` folds both into the single model defined here.

pub mod error;
pub mod parser;
pub mod source;
pub mod store;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use source::DocumentId;

/// Scope holding commands invocable without a qualifier.
pub const BASE_SCOPE: &str = "BASE";

/// One positional argument of a command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Argument {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
    #[serde(default)]
    pub optional: bool,
}

/// A command definition, normalized from either schema shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Command {
    /// Owning scope name. Always equals the key of the scope holding it.
    pub scope: String,
    /// Display name, original case.
    pub command: String,
    pub args: Vec<Argument>,
    pub output: Vec<String>,
    /// Markdown description.
    pub desc: String,
}

impl Command {
    /// Key under which this command is stored in its scope.
    pub fn key(&self) -> String {
        self.command.to_uppercase()
    }
}

/// Uppercased command name → command.
pub type Scope = IndexMap<String, Command>;

/// Scope name (case-sensitive) → scope.
pub type ScopeMap = IndexMap<String, Scope>;

/// Layer `child` over `parent`, scope by scope and command by command.
///
/// Scopes only the parent defines pass through; scopes only the child defines
/// are added; a child command replaces the parent command with the same key
/// and leaves its siblings alone. Neither input is mutated.
pub fn merge_scopes(parent: &ScopeMap, child: &ScopeMap) -> ScopeMap {
    let mut merged = parent.clone();
    for (scope_name, commands) in child {
        let scope = merged.entry(scope_name.clone()).or_default();
        for (key, command) in commands {
            scope.insert(key.clone(), command.clone());
        }
    }
    merged
}

/// A loaded runner schema.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Runner {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extends: Option<String>,
    /// Document this runner was parsed from. Only used to route change
    /// notifications back to the cache entry.
    #[serde(skip)]
    pub document: Option<DocumentId>,
    /// Scopes declared by this runner's own document.
    #[serde(skip)]
    declared: ScopeMap,
    /// Declared scopes merged over the parent chain.
    pub scopes: ScopeMap,
}

impl Runner {
    /// A runner whose scopes are exactly what its own document declares.
    pub fn new(
        name: impl Into<String>,
        extends: Option<String>,
        document: Option<DocumentId>,
        declared: ScopeMap,
    ) -> Self {
        Self {
            name: name.into(),
            extends,
            document,
            scopes: declared.clone(),
            declared,
        }
    }

    /// A runner with no commands. Used for documents that failed to load so
    /// a later edit can still find and re-parse them.
    pub fn empty(name: impl Into<String>, document: Option<DocumentId>) -> Self {
        Self::new(name, None, document, ScopeMap::new())
    }

    /// Rebuild the merged scopes on top of `parent`'s merged scopes.
    pub fn inherit(&mut self, parent: &Runner) {
        self.scopes = merge_scopes(&parent.scopes, &self.declared);
    }

    /// Drop inherited commands, keeping only the declared ones.
    pub fn detach(&mut self) {
        self.scopes = self.declared.clone();
    }

    /// Look up a command. The scope name is matched exactly, the command
    /// name case-insensitively.
    pub fn resolve_command(&self, scope_name: &str, command_name: &str) -> Option<&Command> {
        self.scopes
            .get(scope_name)
            .and_then(|scope| scope.get(&command_name.to_uppercase()))
    }

    /// Commands of one scope, in schema order. Unknown scopes yield nothing.
    pub fn commands_in<'a>(&'a self, scope_name: &str) -> impl Iterator<Item = &'a Command> + 'a {
        self.scopes
            .get(scope_name)
            .into_iter()
            .flat_map(|scope| scope.values())
    }
}
