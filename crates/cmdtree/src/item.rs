//! Grammar elements: commands, flags, parameters and parameter arrays.

use std::fmt;

use crate::matches::Matches;

/// Index of a parser node inside a [`Cmdline`](crate::Cmdline).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ParserId(pub(crate) usize);

impl ParserId {
    pub(crate) const ROOT: ParserId = ParserId(0);

    pub fn index(self) -> usize {
        self.0
    }
}

/// Index of a parse item inside a [`Cmdline`](crate::Cmdline).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemId(pub(crate) usize);

impl ItemId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// A global flag hit: which flag matched, and at which parser level.
///
/// Global flags are re-offered to every selected subcommand, so `parser` is the
/// deepest level that claimed the flag (the one whose usage a help flag should
/// print).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlobalMatch {
    pub item: ItemId,
    pub parser: ParserId,
}

/// Callback deferred when a parser level matches.
pub type OnMatch = Box<dyn Fn(&Matches<'_>) -> anyhow::Result<()>>;

/// Callback deferred when a global flag matches.
pub type GlobalAction = Box<dyn Fn(&Matches<'_>, GlobalMatch) -> anyhow::Result<()>>;

/// Completion candidates for a partially typed positional value.
pub type CompletionProvider = Box<dyn Fn(&str) -> Vec<String>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemKind {
    /// Literal keyword selecting a child parser. When a parser declares
    /// commands, one of them must match.
    Command,
    /// Short, long or short/long switch, optionally taking a value.
    Flag,
    /// Single positional value, matched after flags and commands.
    Parameter,
    /// Positional value that takes every remaining token.
    ParameterArray,
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Command => "command",
            Self::Flag => "flag",
            Self::Parameter => "parameter",
            Self::ParameterArray => "parameter-array",
        };
        f.write_str(s)
    }
}

/// Declaration of a flag, handed to
/// [`ParserBuilder::add_flag`](crate::ParserBuilder::add_flag).
///
/// Names may be given with or without their dashes: `Flag::short("x")` and
/// `Flag::short("-x")` both match `-x`.
#[derive(Debug, Clone, Default)]
pub struct Flag {
    pub(crate) short: Option<String>,
    pub(crate) long: Option<String>,
    pub(crate) value_name: Option<String>,
    pub(crate) description: String,
    pub(crate) mandatory: bool,
}

impl Flag {
    pub fn short(name: impl Into<String>) -> Self {
        Self {
            short: non_empty(strip_dashes(&name.into())),
            ..Self::default()
        }
    }

    pub fn long(name: impl Into<String>) -> Self {
        Self {
            long: non_empty(strip_dashes(&name.into())),
            ..Self::default()
        }
    }

    pub fn short_long(short: impl Into<String>, long: impl Into<String>) -> Self {
        Self {
            short: non_empty(strip_dashes(&short.into())),
            long: non_empty(strip_dashes(&long.into())),
            ..Self::default()
        }
    }

    /// Description shown in usage.
    pub fn about(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// The flag consumes a value: `-x VALUE`, `-x=VALUE`, `--name=VALUE`.
    pub fn value(mut self, value_name: impl Into<String>) -> Self {
        self.value_name = non_empty(value_name.into().trim().to_string());
        self
    }

    pub fn mandatory(mut self) -> Self {
        self.mandatory = true;
        self
    }
}

fn strip_dashes(raw: &str) -> String {
    raw.trim().trim_start_matches('-').to_string()
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() { None } else { Some(s) }
}

/// A declared grammar element.
///
/// The definition is immutable once the tree is built; what a run matched is
/// kept in the run's [`MatchState`](crate::MatchState).
pub struct ParseItem {
    pub(crate) id: ItemId,
    pub(crate) owner: ParserId,
    pub(crate) kind: ItemKind,
    pub(crate) short_name: Option<String>,
    pub(crate) long_name: Option<String>,
    pub(crate) value_name: Option<String>,
    pub(crate) description: String,
    pub(crate) mandatory: bool,
    pub(crate) global: Option<GlobalAction>,
    pub(crate) completion: Option<CompletionProvider>,
    pub(crate) subparser: Option<ParserId>,
}

impl ParseItem {
    pub(crate) fn new(id: ItemId, owner: ParserId, kind: ItemKind) -> Self {
        Self {
            id,
            owner,
            kind,
            short_name: None,
            long_name: None,
            value_name: None,
            description: String::new(),
            mandatory: false,
            global: None,
            completion: None,
            subparser: None,
        }
    }

    pub fn id(&self) -> ItemId {
        self.id
    }

    /// Parser that declares this item.
    pub fn owner(&self) -> ParserId {
        self.owner
    }

    pub fn kind(&self) -> ItemKind {
        self.kind
    }

    /// Keyword of a command, short name of a flag, display name of a parameter.
    pub fn short_name(&self) -> Option<&str> {
        self.short_name.as_deref()
    }

    pub fn long_name(&self) -> Option<&str> {
        self.long_name.as_deref()
    }

    pub fn value_name(&self) -> Option<&str> {
        self.value_name.as_deref()
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn is_mandatory(&self) -> bool {
        self.mandatory
    }

    pub fn is_global(&self) -> bool {
        self.global.is_some()
    }

    pub fn takes_value(&self) -> bool {
        self.value_name.is_some()
    }

    pub fn has_completion(&self) -> bool {
        self.completion.is_some()
    }

    /// Child parser of a command.
    pub fn subparser(&self) -> Option<ParserId> {
        self.subparser
    }

    /// `-x`, without any value.
    pub fn short_flag(&self) -> Option<String> {
        match self.kind {
            ItemKind::Flag => self.short_name.as_ref().map(|s| format!("-{s}")),
            _ => None,
        }
    }

    /// `--name`, without any value.
    pub fn long_flag(&self) -> Option<String> {
        match self.kind {
            ItemKind::Flag => self.long_name.as_ref().map(|l| format!("--{l}")),
            _ => None,
        }
    }

    /// Spellings in the order the engine tries them.
    pub(crate) fn flag_spellings(&self) -> Vec<String> {
        self.short_flag().into_iter().chain(self.long_flag()).collect()
    }

    /// Human name: `-f,--file` for flags, the name for anything else.
    pub fn display_name(&self) -> String {
        match self.kind {
            ItemKind::Flag => self.flag_spellings().join(","),
            _ => self.short_name.clone().unwrap_or_default(),
        }
    }

    /// Run the completion provider, if any.
    pub fn complete(&self, partial: &str) -> Option<Vec<String>> {
        self.completion.as_ref().map(|provider| provider(partial))
    }

    /// Grouping used by usage and the debug table:
    /// commands, mandatory flags, optional flags, parameters, arrays.
    pub fn sort_order(&self) -> u8 {
        match self.kind {
            ItemKind::Command => 0,
            ItemKind::Flag if self.mandatory => 1,
            ItemKind::Flag => 2,
            ItemKind::Parameter => 3,
            ItemKind::ParameterArray => 4,
        }
    }
}

impl fmt::Debug for ParseItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParseItem")
            .field("id", &self.id)
            .field("owner", &self.owner)
            .field("kind", &self.kind)
            .field("short_name", &self.short_name)
            .field("long_name", &self.long_name)
            .field("value_name", &self.value_name)
            .field("mandatory", &self.mandatory)
            .field("global", &self.global.is_some())
            .field("completion", &self.completion.is_some())
            .field("subparser", &self.subparser)
            .finish()
    }
}
