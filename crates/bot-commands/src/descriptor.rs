//! Static command metadata

use crate::error::{Error, Result};

/// Name, help and argument shape of one command.
///
/// Names are sequences of literal words, stored lowercase and matched
/// case-insensitively. Required arguments are filled positionally before
/// optional ones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandDescriptor {
    words: Vec<String>,
    help: &'static str,
    category: &'static str,
    required_args: Vec<&'static str>,
    optional_args: Vec<&'static str>,
}

impl CommandDescriptor {
    pub fn new(name: &str, help: &'static str) -> Self {
        Self {
            words: name.split_whitespace().map(str::to_lowercase).collect(),
            help,
            category: "general",
            required_args: Vec::new(),
            optional_args: Vec::new(),
        }
    }

    pub fn category(mut self, category: &'static str) -> Self {
        self.category = category;
        self
    }

    pub fn required_args(mut self, names: &[&'static str]) -> Self {
        self.required_args = names.to_vec();
        self
    }

    pub fn optional_args(mut self, names: &[&'static str]) -> Self {
        self.optional_args = names.to_vec();
        self
    }

    /// Words joined by single spaces, e.g. `github status`.
    pub fn name(&self) -> String {
        self.words.join(" ")
    }

    pub fn words(&self) -> &[String] {
        &self.words
    }

    pub fn help(&self) -> &'static str {
        self.help
    }

    pub fn category_tag(&self) -> &'static str {
        self.category
    }

    pub fn required(&self) -> &[&'static str] {
        &self.required_args
    }

    pub fn optional(&self) -> &[&'static str] {
        &self.optional_args
    }

    /// One-line usage: `github setpersonaltoken <accessToken> [note]`.
    pub fn usage(&self) -> String {
        let mut usage = self.name();
        for arg in &self.required_args {
            usage.push_str(&format!(" <{arg}>"));
        }
        for arg in &self.optional_args {
            usage.push_str(&format!(" [{arg}]"));
        }
        usage
    }
}

/// Arguments extracted for one invocation, in declared order.
#[derive(Debug, Clone, Default)]
pub struct CommandArgs {
    command: String,
    values: Vec<(&'static str, String)>,
}

impl CommandArgs {
    pub fn new(command: impl Into<String>, values: Vec<(&'static str, String)>) -> Self {
        Self {
            command: command.into(),
            values,
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Like `get`, but a missing value is a `MissingArgument` error.
    pub fn require(&self, name: &str) -> Result<&str> {
        self.get(name).ok_or_else(|| Error::MissingArgument {
            command: self.command.clone(),
            argument: name.to_owned(),
        })
    }
}
