//! Declarative command-line matching with nested subcommands.
//!
//! A [`Cmdline`] is a tree of parsers built once by a declarative pass. Each
//! parser declares commands, flags (short/long, optionally taking a value),
//! positional parameters and at most one trailing parameter array. Matching
//! walks the tree level by level over one shared token list, where every token
//! is claimed by at most one item:
//!
//! 1. flags, own and inherited from ancestors;
//! 2. the command keyword, which selects the next level;
//! 3. parameters in declaration order, then the parameter array.
//!
//! Global flags (typically `-h/--help`) match at any level and replace the
//! normal actions, even when the rest of the command line is incomplete.
//! Actions are only collected while matching and run once the whole chain
//! validated, so a partial command line never has partial side effects.
//!
//! With [`SHOW_COMPLETIONS`] set, a run prints completion candidates instead.
//!
//! ```
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! use cmdtree::{Cmdline, CompletionMode, Flag, Outcome};
//!
//! let seen = Rc::new(RefCell::new(None));
//! let sink = seen.clone();
//! let cmdline = Cmdline::build("sample application", move |root| {
//!     let verbose = root.add_flag(Flag::short_long("v", "verbose").about("more output"));
//!     root.add_global_flag(Flag::short_long("h", "help").about("show usage"), |m, hit| {
//!         print!("{}", m.usage(hit.parser));
//!         Ok(())
//!     });
//!     root.add_command("greet", "say hello", move |greet| {
//!         let name = greet.add_mandatory_parameter("name", "who to greet");
//!         greet.on_match(move |m| {
//!             let loud = m.is_present(verbose);
//!             *sink.borrow_mut() = m.value(name).map(|n| (n.to_string(), loud));
//!             Ok(())
//!         });
//!     });
//! })
//! .unwrap();
//!
//! let parsed = cmdline.parse(["greet", "-v", "world"], CompletionMode::Off).unwrap();
//! assert!(matches!(parsed.outcome(), Outcome::Ready(_)));
//! parsed.execute().unwrap();
//! assert_eq!(*seen.borrow(), Some(("world".to_string(), true)));
//! ```

mod config;
mod engine;
mod error;
mod item;
mod matches;
mod parser;
mod run;
mod state;
mod usage;

pub use config::{CompletionMode, SHOW_COMPLETIONS};
pub use error::{ClaimError, DefinitionError, ValidationError};
pub use item::{
    CompletionProvider, Flag, GlobalAction, GlobalMatch, ItemId, ItemKind, OnMatch, ParseItem,
    ParserId,
};
pub use matches::Matches;
pub use parser::{Cmdline, Parser, ParserBuilder};
pub use run::{Deferred, Failure, Outcome, Parsed};
pub use state::{Argument, MatchState};
pub use usage::{PlainUsage, RenderUsage};
