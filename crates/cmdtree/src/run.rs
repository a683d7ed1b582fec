//! Run boundary: parse a token list, then print or execute the result.

use std::io::Write;

use anyhow::Context;

use crate::config::CompletionMode;
use crate::engine::{Engine, Level};
use crate::error::{ClaimError, ValidationError};
use crate::item::{GlobalMatch, ParserId};
use crate::matches::Matches;
use crate::parser::Cmdline;
use crate::state::MatchState;

/// An action the engine decided to run, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deferred {
    /// The `on_match` action of a parser level.
    OnMatch(ParserId),
    /// The action of a global flag.
    Global(GlobalMatch),
}

/// A validation failure and the parser level it happened at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub error: ValidationError,
    pub parser: ParserId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The command line validated; actions outermost level first.
    Ready(Vec<Deferred>),
    /// Completion mode: candidates, one per output line.
    Completions(Vec<String>),
    /// The command line did not validate; nothing will run.
    Invalid(Failure),
}

/// Result of matching one token list against a [`Cmdline`].
pub struct Parsed<'a> {
    cmdline: &'a Cmdline,
    state: MatchState,
    outcome: Outcome,
}

impl<'a> Parsed<'a> {
    pub fn outcome(&self) -> &Outcome {
        &self.outcome
    }

    pub fn into_outcome(self) -> Outcome {
        self.outcome
    }

    pub fn state(&self) -> &MatchState {
        &self.state
    }

    pub fn matches(&self) -> Matches<'_> {
        Matches::new(self.cmdline, &self.state)
    }

    /// Run the deferred actions in order. Stops at the first failing action.
    ///
    /// Returns how many actions ran; zero unless the outcome is `Ready`.
    pub fn execute(&self) -> anyhow::Result<usize> {
        let Outcome::Ready(deferred) = &self.outcome else {
            return Ok(0);
        };
        let matches = self.matches();
        for action in deferred {
            match *action {
                Deferred::OnMatch(parser) => {
                    let Some(callback) = &self.cmdline.node(parser).on_match else {
                        continue;
                    };
                    let label = self.cmdline.parser(parser).invocation();
                    tracing::debug!("running action for '{label}'");
                    callback(&matches).with_context(|| format!("'{label}' failed"))?;
                }
                Deferred::Global(hit) => {
                    let Some(callback) = &self.cmdline.item(hit.item).global else {
                        continue;
                    };
                    let flag = self.cmdline.item(hit.item).display_name();
                    tracing::debug!("running global flag action for {flag}");
                    callback(&matches, hit).with_context(|| format!("global flag {flag} failed"))?;
                }
            }
        }
        Ok(deferred.len())
    }
}

impl Cmdline {
    /// Match `args` against the tree. `mode.skip()` leading tokens are dropped.
    pub fn parse<I, S>(&self, args: I, mode: CompletionMode) -> Result<Parsed<'_>, ClaimError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut state = MatchState::new(args.into_iter().skip(mode.skip()), self.items.len());
        let mut engine = Engine::new(self, mode.is_active());
        let level = engine.descend(ParserId::ROOT, &mut state)?;

        let outcome = if mode.is_active() {
            Outcome::Completions(engine.into_candidates())
        } else {
            match level {
                Level::Ready(deferred) => Outcome::Ready(deferred),
                Level::Failed(failure) => Outcome::Invalid(failure),
            }
        };
        debug_assert!(state.is_consistent());

        Ok(Parsed {
            cmdline: self,
            state,
            outcome,
        })
    }

    /// Parse process arguments (program name excluded) and act on the result,
    /// writing completions and diagnostics to stdout.
    ///
    /// Completion mode comes from [`SHOW_COMPLETIONS`](crate::SHOW_COMPLETIONS).
    pub fn run<I, S>(&self, args: I) -> anyhow::Result<Outcome>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let stdout = std::io::stdout();
        let mut out = stdout.lock();
        self.run_with(args, CompletionMode::from_env(), &mut out)
    }

    /// [`run`](Self::run) with an explicit mode and output.
    pub fn run_with<I, S, W>(&self, args: I, mode: CompletionMode, out: &mut W) -> anyhow::Result<Outcome>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        W: Write,
    {
        let parsed = self.parse(args, mode)?;
        match parsed.outcome() {
            Outcome::Completions(candidates) => {
                for candidate in candidates {
                    writeln!(out, "{candidate}")?;
                }
            }
            Outcome::Invalid(failure) => {
                writeln!(out, "{}", failure.error)?;
                write!(out, "{}", self.usage(failure.parser))?;
            }
            Outcome::Ready(_) => {
                parsed.execute()?;
            }
        }
        out.flush()?;
        Ok(parsed.into_outcome())
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::item::Flag;

    #[test]
    fn actions_run_outermost_first() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let (l1, l2) = (log.clone(), log.clone());
        let cmdline = Cmdline::build("t", move |root| {
            root.on_match(move |_| {
                l1.borrow_mut().push("root");
                Ok(())
            });
            root.add_command("sub", "", move |sub| {
                sub.on_match(move |_| {
                    l2.borrow_mut().push("sub");
                    Ok(())
                });
            });
        })
        .unwrap();

        let parsed = cmdline.parse(["sub"], CompletionMode::Off).unwrap();
        assert_eq!(parsed.execute().unwrap(), 2);
        assert_eq!(*log.borrow(), vec!["root", "sub"]);
    }

    #[test]
    fn a_failing_level_discards_every_action() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let l1 = log.clone();
        let cmdline = Cmdline::build("t", move |root| {
            root.on_match(move |_| {
                l1.borrow_mut().push("root");
                Ok(())
            });
            root.add_command("sub", "", |sub| {
                sub.add_mandatory_parameter("name", "");
            });
        })
        .unwrap();

        let parsed = cmdline.parse(["sub"], CompletionMode::Off).unwrap();
        let Outcome::Invalid(failure) = parsed.outcome() else {
            panic!("expected Invalid, got {:?}", parsed.outcome());
        };
        assert_eq!(
            failure.error,
            ValidationError::MissingMandatoryParameter {
                name: "name".to_string()
            }
        );
        assert_eq!(parsed.execute().unwrap(), 0);
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn action_errors_carry_the_invocation() {
        let cmdline = Cmdline::build("t", |root| {
            root.add_command("deploy", "", |sub| {
                sub.on_match(|_| anyhow::bail!("no target"));
            });
        })
        .unwrap()
        .with_program("tool");

        let mut out = Vec::new();
        let err = cmdline
            .run_with(["deploy"], CompletionMode::Off, &mut out)
            .unwrap_err();
        assert_eq!(err.to_string(), "'tool deploy' failed");
        assert_eq!(err.root_cause().to_string(), "no target");
    }

    #[test]
    fn invalid_runs_print_diagnostic_then_usage() {
        let cmdline = Cmdline::build("tool description", |root| {
            root.add_flag(Flag::short("f").mandatory().about("force"));
        })
        .unwrap()
        .with_program("tool");

        let mut out = Vec::new();
        let outcome = cmdline.run_with(Vec::<String>::new(), CompletionMode::Off, &mut out).unwrap();
        assert!(matches!(outcome, Outcome::Invalid(_)));

        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("missing mandatory flag [-f]\n"), "{text}");
        assert!(text.contains("Usage: tool FLAGS"), "{text}");
    }

    #[test]
    fn host_completion_skips_the_program_name() {
        let cmdline = Cmdline::build("t", |root| {
            root.add_command("status", "", |_| {});
            root.add_command("stash", "", |_| {});
        })
        .unwrap();

        let mut out = Vec::new();
        cmdline
            .run_with(["tool", "sta"], CompletionMode::Host, &mut out)
            .unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "status\nstash\n");
    }
}
