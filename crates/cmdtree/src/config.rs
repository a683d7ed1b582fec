//! Completion-mode selection.

/// Environment variable a shell completion hook sets to ask for candidates.
///
/// - `SHOW_COMPLETIONS=1`: the hook passes the whole command line, program name
///   included, so the first token is skipped.
/// - `SHOW_COMPLETIONS=2`: tokens are passed as-is (handy when debugging a
///   completion from a terminal).
pub const SHOW_COMPLETIONS: &str = "SHOW_COMPLETIONS";

/// Whether a run enforces validation or emits completion candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompletionMode {
    /// Normal run: validate and execute.
    #[default]
    Off,
    /// Completion requested by a shell hook; the first token is the program name.
    Host,
    /// Completion requested with tokens passed verbatim.
    Direct,
}

impl CompletionMode {
    /// Read [`SHOW_COMPLETIONS`] from the process environment.
    pub fn from_env() -> Self {
        let raw = std::env::var(SHOW_COMPLETIONS).ok();
        Self::from_value(raw.as_deref())
    }

    /// Decode a raw [`SHOW_COMPLETIONS`] value.
    pub fn from_value(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            Some("1") => Self::Host,
            Some("2") => Self::Direct,
            _ => Self::Off,
        }
    }

    pub fn is_active(self) -> bool {
        !matches!(self, Self::Off)
    }

    /// Number of leading tokens to drop before matching.
    pub fn skip(self) -> usize {
        match self {
            Self::Host => 1,
            Self::Off | Self::Direct => 0,
        }
    }
}
