//! Command descriptors — the text shown for hovers and completion docs.
//!
//! ````text
//! ```catscript
//! Util.log @msg:string @level:!number
//! ```
//! ```
//! -> bool
//! ```
//! Writes a line to the debug console.
//! ````

use crate::schema::{Command, Runner, BASE_SCOPE};

/// Rendered parts of a command's documentation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandDescriptor {
    /// Call signature: qualified name followed by `@name:type` per argument,
    /// with `!` before the type of optional arguments.
    pub title: String,
    /// `-> a, b` when the command returns anything.
    pub returns: Option<String>,
    /// Markdown description, verbatim from the schema.
    pub description: String,
}

impl CommandDescriptor {
    pub fn new(command: &Command, scope_name: &str) -> Self {
        let mut title = if scope_name == BASE_SCOPE {
            command.command.clone()
        } else {
            format!("{scope_name}.{}", command.command)
        };
        for arg in &command.args {
            let bang = if arg.optional { "!" } else { "" };
            title.push_str(&format!(" @{}:{bang}{}", arg.name, arg.ty));
        }

        let returns =
            (!command.output.is_empty()).then(|| format!("-> {}", command.output.join(", ")));

        Self {
            title,
            returns,
            description: command.desc.clone(),
        }
    }

    /// Markdown with the signature fenced as `language_id`, the return line
    /// in a plain fence, then the description.
    pub fn to_markdown(&self, language_id: &str) -> String {
        let mut out = format!("```{language_id}\n{}\n```\n", self.title);
        if let Some(returns) = &self.returns {
            out.push_str(&format!("```\n{returns}\n```\n"));
        }
        out.push_str(&self.description);
        out
    }
}

/// Descriptor for `scope_name.command_name` in `runner`, if it resolves.
pub fn describe(runner: &Runner, scope_name: &str, command_name: &str) -> Option<CommandDescriptor> {
    runner
        .resolve_command(scope_name, command_name)
        .map(|command| CommandDescriptor::new(command, scope_name))
}
