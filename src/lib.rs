//! catscript-lsp — schema-driven language intelligence for catscript.
//!
//! Runner schemas (`.catscript/schemas/<runner>.json`) describe the commands
//! a script may call. This crate loads and merges those schemas, works out
//! which command sits under the cursor and renders hover and completion
//! content for an editor adapter to display.

pub mod config;
pub mod lsp;
pub mod schema;
