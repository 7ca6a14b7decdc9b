//! Declarative command routing for admin sessions
//!
//! Commands are registered once at startup with a [`CommandDescriptor`]
//! (name words, help, category, argument names) and a handler. Free text from
//! the user is tokenized with shell-style quoting, matched against the
//! longest registered name, checked for required arguments, and handed to the
//! handler with a context value `C` owned by the caller.

pub mod descriptor;
pub mod error;
pub mod router;

pub use descriptor::{CommandArgs, CommandDescriptor};
pub use error::{BoxError, Error, Result};
pub use router::{CommandHandler, CommandRouter, HandlerFuture};
