//! JSON parser for runner schema documents.
//!
//! Accepts both shapes found in the wild and normalizes them into one
//! `ScopeMap`:
//!
//! ```json
//! { "extends": "parent", "commands": { "WAIT": { "command": "wait", "args": ["number"], "argLabels": ["ms"], "desc": "..." } } }
//! { "extends": "parent", "scopes": { "Util": { "LOG": { "command": "log", "scope": "Util", "args": [{ "name": "msg", "type": "string", "optional": false }], "output": [], "desc": "..." } } } }
//! ```
//!
//! Flat `commands` land in `BASE`. When a document carries both, scoped
//! entries are applied after the flat ones and win on collision.

use indexmap::IndexMap;
use serde::Deserialize;

use super::error::{SchemaError, SchemaResult};
use super::source::DocumentId;
use super::{Argument, Command, Runner, ScopeMap, BASE_SCOPE};

/// Top-level schema document.
#[derive(Debug, Deserialize)]
struct SchemaDocument {
    #[serde(default)]
    extends: Option<String>,
    #[serde(default)]
    commands: IndexMap<String, FlatCommand>,
    #[serde(default)]
    scopes: IndexMap<String, IndexMap<String, ScopedCommand>>,
}

/// Legacy flat entry: argument types and labels are parallel arrays.
#[derive(Debug, Deserialize)]
struct FlatCommand {
    #[serde(default)]
    command: Option<String>,
    #[serde(default)]
    args: Vec<String>,
    #[serde(default, rename = "argLabels")]
    arg_labels: Vec<String>,
    #[serde(default)]
    output: Vec<String>,
    #[serde(default)]
    desc: String,
}

#[derive(Debug, Deserialize)]
struct ScopedCommand {
    #[serde(default)]
    command: Option<String>,
    #[serde(default)]
    args: Vec<Argument>,
    #[serde(default)]
    output: Vec<String>,
    #[serde(default)]
    desc: String,
}

/// Parse schema text into a runner holding only its declared scopes.
/// Inheritance is applied later by the store.
pub fn parse_runner(name: &str, text: &str, document: Option<DocumentId>) -> SchemaResult<Runner> {
    let doc: SchemaDocument = serde_json::from_str(text).map_err(|source| SchemaError::Parse {
        runner: name.to_string(),
        source,
    })?;

    let mut declared = ScopeMap::new();

    for (key, flat) in doc.commands {
        let args = flat
            .args
            .into_iter()
            .enumerate()
            .map(|(i, ty)| Argument {
                name: flat
                    .arg_labels
                    .get(i)
                    .cloned()
                    .unwrap_or_else(|| format!("arg{}", i + 1)),
                ty,
                optional: false,
            })
            .collect();
        insert(
            &mut declared,
            Command {
                scope: BASE_SCOPE.to_string(),
                command: flat.command.unwrap_or(key),
                args,
                output: flat.output,
                desc: flat.desc,
            },
        );
    }

    for (scope_name, commands) in doc.scopes {
        // An empty scope still shows up as a namespace in completions.
        declared.entry(scope_name.clone()).or_default();
        for (key, scoped) in commands {
            insert(
                &mut declared,
                Command {
                    scope: scope_name.clone(),
                    command: scoped.command.unwrap_or(key),
                    args: scoped.args,
                    output: scoped.output,
                    desc: scoped.desc,
                },
            );
        }
    }

    let extends = doc
        .extends
        .map(|e| e.trim().to_string())
        .filter(|e| !e.is_empty());

    Ok(Runner::new(name, extends, document, declared))
}

fn insert(scopes: &mut ScopeMap, command: Command) {
    scopes
        .entry(command.scope.clone())
        .or_default()
        .insert(command.key(), command);
}
