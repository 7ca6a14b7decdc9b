//! Command table and dispatch
//!
//! The router owns a table from normalized command names to handlers. A
//! dispatch:
//!
//! 1. splits the input with shell quoting rules (`"two words"` is one token)
//! 2. picks the longest registered name that prefixes the tokens, so
//!    `github status` wins over a bare `github`
//! 3. fails with `MissingArgument` (handler not run) if fewer tokens remain
//!    than the command requires
//! 4. runs the handler with the arguments mapped to their declared names;
//!    surplus tokens are ignored

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::pin::Pin;

use tracing::{debug, warn};

use crate::descriptor::{CommandArgs, CommandDescriptor};
use crate::error::{Error, Result};

/// Boxed future returned by handlers.
pub type HandlerFuture<'a> = Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;

/// A command implementation running against a caller-supplied context.
///
/// Uses `Pin<Box<dyn Future>>` so handlers of different types share one table.
/// Plain functions `fn(&C, CommandArgs) -> HandlerFuture<'_>` implement it.
pub trait CommandHandler<C>: Send + Sync {
    fn call<'a>(&'a self, ctx: &'a C, args: CommandArgs) -> HandlerFuture<'a>;
}

impl<C, F> CommandHandler<C> for F
where
    F: for<'a> Fn(&'a C, CommandArgs) -> HandlerFuture<'a> + Send + Sync,
{
    fn call<'a>(&'a self, ctx: &'a C, args: CommandArgs) -> HandlerFuture<'a> {
        self(ctx, args)
    }
}

struct Registered<C> {
    descriptor: CommandDescriptor,
    handler: Box<dyn CommandHandler<C>>,
}

/// Registered commands for context type `C`.
pub struct CommandRouter<C> {
    commands: HashMap<String, Registered<C>>,
    longest_name: usize,
}

impl<C> Default for CommandRouter<C> {
    fn default() -> Self {
        Self {
            commands: HashMap::new(),
            longest_name: 0,
        }
    }
}

impl<C> CommandRouter<C> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a command. Names are unique; a second registration of the same
    /// name (ignoring case and spacing) is rejected.
    pub fn register<H>(&mut self, descriptor: CommandDescriptor, handler: H) -> Result<()>
    where
        H: CommandHandler<C> + 'static,
    {
        let name = descriptor.name();
        if name.is_empty() {
            return Err(Error::Parse("command name must not be empty".into()));
        }
        if self.commands.contains_key(&name) {
            return Err(Error::DuplicateCommand(name));
        }
        self.longest_name = self.longest_name.max(descriptor.words().len());
        debug!(command = %name, "registered command");
        self.commands.insert(
            name,
            Registered {
                descriptor,
                handler: Box::new(handler),
            },
        );
        Ok(())
    }

    /// Descriptors sorted by name.
    pub fn descriptors(&self) -> Vec<&CommandDescriptor> {
        let mut all: Vec<_> = self.commands.values().map(|r| &r.descriptor).collect();
        all.sort_by_key(|d| d.name());
        all
    }

    /// Descriptor registered under `name` (case and spacing ignored).
    pub fn descriptor(&self, name: &str) -> Option<&CommandDescriptor> {
        let key = CommandDescriptor::new(name, "").name();
        self.commands.get(&key).map(|r| &r.descriptor)
    }

    /// Descriptor of the command `input` would dispatch to, if any.
    pub fn lookup(&self, input: &str) -> Option<&CommandDescriptor> {
        let tokens = shell_words::split(input).ok()?;
        self.resolve(&tokens).map(|(r, _)| &r.descriptor)
    }

    /// Find the command a token list addresses, and how many tokens its name used.
    ///
    /// Each name word must be its own token: a quoted `"github status"` is one
    /// argument, not the two-word command.
    fn resolve(&self, tokens: &[String]) -> Option<(&Registered<C>, usize)> {
        let max = tokens.len().min(self.longest_name);
        (1..=max).rev().find_map(|len| {
            let head = &tokens[..len];
            let key = head.join(" ").to_lowercase();
            self.commands
                .get(&key)
                .filter(|r| spells(&r.descriptor, head))
                .map(|r| (r, len))
        })
    }

    /// Route `input` to its handler and wait for it to finish.
    pub async fn dispatch(&self, input: &str, ctx: &C) -> Result<()> {
        let tokens = shell_words::split(input).map_err(|e| Error::Parse(e.to_string()))?;
        let Some((command, consumed)) = self.resolve(&tokens) else {
            return Err(Error::UnknownCommand(input.trim().to_owned()));
        };

        let descriptor = &command.descriptor;
        let name = descriptor.name();
        let rest = &tokens[consumed..];
        let required = descriptor.required();

        if let Some(missing) = required.get(rest.len()) {
            return Err(Error::MissingArgument {
                command: name,
                argument: (*missing).to_owned(),
            });
        }

        let declared = required.len() + descriptor.optional().len();
        if rest.len() > declared {
            debug!(
                command = %name,
                ignored = rest.len() - declared,
                "ignoring surplus arguments"
            );
        }
        let values = required
            .iter()
            .chain(descriptor.optional())
            .zip(rest)
            .map(|(arg, value)| (*arg, value.clone()))
            .collect();

        debug!(command = %name, "dispatching command");
        command
            .handler
            .call(ctx, CommandArgs::new(name.clone(), values))
            .await
            .inspect_err(|e| warn!(command = %name, error = %e, "command failed"))
    }

    /// Markdown help, grouped by category. `category` limits the listing.
    pub fn help(&self, category: Option<&str>) -> String {
        let mut grouped: BTreeMap<&str, Vec<&CommandDescriptor>> = BTreeMap::new();
        for descriptor in self.descriptors() {
            if category.is_some_and(|c| !c.eq_ignore_ascii_case(descriptor.category_tag())) {
                continue;
            }
            grouped
                .entry(descriptor.category_tag())
                .or_default()
                .push(descriptor);
        }

        let mut out = String::new();
        for (category, descriptors) in grouped {
            out.push_str(&format!("### {category}\n"));
            for d in descriptors {
                out.push_str(&format!("- `{}` - {}\n", d.usage(), d.help()));
            }
        }
        out
    }
}

/// Whether `tokens` are exactly the words of `descriptor`'s name, one per token.
fn spells(descriptor: &CommandDescriptor, tokens: &[String]) -> bool {
    let words = descriptor.words();
    words.len() == tokens.len()
        && words
            .iter()
            .zip(tokens)
            .all(|(word, token)| *word == token.to_lowercase())
}
