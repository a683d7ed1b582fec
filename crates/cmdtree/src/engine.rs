//! The recursive matching engine.
//!
//! One call to [`Engine::descend`] handles one parser level in three phases
//! (flags, command, parameters) against the shared [`MatchState`], then either
//! fails, defers the level's actions, or recurses into the selected command.
//! Nothing here runs user actions; the result is a list of [`Deferred`] values.

use indexmap::IndexSet;

use crate::error::{Result, ValidationError};
use crate::item::{GlobalMatch, ItemId, ParseItem, ParserId};
use crate::parser::{Cmdline, Parser};
use crate::run::{Deferred, Failure};
use crate::state::MatchState;

pub(crate) enum Level {
    Ready(Vec<Deferred>),
    Failed(Failure),
}

enum FlagHit {
    /// `-x` on its own.
    Bare,
    /// `-x VALUE`: the value is the token at this index.
    Separate(usize),
    /// `-x=VALUE`: the value starts at this byte offset of the flag token.
    Inline(usize),
}

enum CommandPhase {
    NotDeclared,
    Selected(ParserId),
    Missing,
}

pub(crate) struct Engine<'a> {
    cmdline: &'a Cmdline,
    completion: bool,
    candidates: IndexSet<String>,
}

impl<'a> Engine<'a> {
    pub(crate) fn new(cmdline: &'a Cmdline, completion: bool) -> Self {
        Self {
            cmdline,
            completion,
            candidates: IndexSet::new(),
        }
    }

    /// Candidates emitted so far, first emission order, no duplicates.
    pub(crate) fn into_candidates(self) -> Vec<String> {
        self.candidates.into_iter().collect()
    }

    fn emit(&mut self, candidate: impl Into<String>) {
        self.candidates.insert(candidate.into());
    }

    pub(crate) fn descend(&mut self, id: ParserId, state: &mut MatchState) -> Result<Level> {
        let parser = self.cmdline.parser(id);

        let missing_flag = self.match_flags(parser, state)?;
        let command = self.match_command(parser, state)?;
        let missing_command = matches!(command, CommandPhase::Missing);
        let missing_parameter = self.match_parameters(parser, state, missing_command)?;
        let selected = match command {
            CommandPhase::Selected(child) => Some(child),
            CommandPhase::NotDeclared | CommandPhase::Missing => None,
        };

        let globals: Vec<ItemId> = parser
            .global_flags()
            .filter(|f| state.is_matched(f.id()))
            .map(ParseItem::id)
            .collect();

        if self.completion {
            return match selected {
                Some(child) => {
                    reoffer(&globals, state);
                    self.descend(child, state)
                }
                None => Ok(Level::Ready(Vec::new())),
            };
        }

        let error = if let Some(flag) = missing_flag {
            Some(ValidationError::MissingMandatoryFlag {
                flag: flag.display_name(),
            })
        } else if missing_command {
            Some(ValidationError::MissingCommand)
        } else {
            missing_parameter.map(|p| ValidationError::MissingMandatoryParameter {
                name: p.display_name(),
            })
        };
        let fail = |error: ValidationError| -> Result<Level> {
            tracing::debug!(parser = id.index(), "{error}");
            Ok(Level::Failed(Failure { error, parser: id }))
        };
        if globals.is_empty() {
            if let Some(error) = error {
                return fail(error);
            }
        }

        let mut deferred = Vec::new();
        match selected {
            Some(child) => {
                // A global only short-circuits this level if some level below
                // claims it again; the subparser may take its token as a value.
                reoffer(&globals, state);
                let level = self.descend(child, state)?;
                let suppressed = globals.iter().any(|&g| state.is_matched(g));
                if !suppressed {
                    if let Some(error) = error {
                        return fail(error);
                    }
                }
                match level {
                    Level::Ready(rest) => {
                        if !suppressed && parser.has_on_match() {
                            deferred.push(Deferred::OnMatch(id));
                        }
                        deferred.extend(rest);
                    }
                    failed @ Level::Failed(_) => return Ok(failed),
                }
            }
            None if !globals.is_empty() => {
                for &item in &globals {
                    tracing::debug!(parser = id.index(), item = item.index(), "global flag matched");
                    deferred.push(Deferred::Global(GlobalMatch {
                        item,
                        parser: state.matched_in(item).unwrap_or(id),
                    }));
                }
            }
            None => {
                if parser.has_on_match() {
                    deferred.push(Deferred::OnMatch(id));
                }
            }
        }
        Ok(Level::Ready(deferred))
    }

    /// Flag phase. Returns the first own mandatory flag left unmatched.
    fn match_flags(
        &mut self,
        parser: Parser<'a>,
        state: &mut MatchState,
    ) -> Result<Option<&'a ParseItem>> {
        let flags: Vec<&'a ParseItem> = parser.all_flags().collect();
        if flags.is_empty() {
            return Ok(None);
        }

        for index in 0..state.len() {
            if state.is_claimed(index) {
                continue;
            }
            let available: Vec<&'a ParseItem> = flags
                .iter()
                .copied()
                .filter(|f| !state.is_matched(f.id()))
                .collect();
            if available.is_empty() {
                break;
            }

            let hit = available
                .into_iter()
                .find_map(|flag| self.try_flag(flag, index, state).map(|hit| (flag, hit)));
            let Some((flag, hit)) = hit else {
                continue;
            };

            state.mark_matched(flag.id(), parser.id(), index)?;
            match hit {
                FlagHit::Bare => {}
                FlagHit::Separate(value) => state.bind(flag.id(), value, 0)?,
                FlagHit::Inline(offset) => state.bind(flag.id(), index, offset)?,
            }
            tracing::debug!(parser = parser.id().index(), "matched flag {}", flag.display_name());
        }

        if self.completion {
            return Ok(None);
        }
        Ok(parser
            .flags()
            .find(|f| f.is_mandatory() && !state.is_matched(f.id())))
    }

    /// Try every spelling of `flag` against token `index`: short before long,
    /// exact before inline value. In completion mode, spellings the token is a
    /// prefix of are emitted.
    fn try_flag(&mut self, flag: &ParseItem, index: usize, state: &MatchState) -> Option<FlagHit> {
        let token = state.text(index)?;
        for spelling in flag.flag_spellings() {
            if flag.takes_value() {
                if token == spelling {
                    let next = index + 1;
                    if next < state.len() && !state.is_claimed(next) {
                        return Some(FlagHit::Separate(next));
                    }
                } else if token
                    .strip_prefix(spelling.as_str())
                    .is_some_and(|rest| rest.starts_with('='))
                {
                    return Some(FlagHit::Inline(spelling.len() + 1));
                }
                if self.completion && spelling.starts_with(token) {
                    self.emit(format!("{spelling}="));
                }
            } else {
                if token == spelling {
                    return Some(FlagHit::Bare);
                }
                if self.completion && spelling.starts_with(token) {
                    self.emit(spelling);
                }
            }
        }
        None
    }

    fn match_command(&mut self, parser: Parser<'a>, state: &mut MatchState) -> Result<CommandPhase> {
        let commands: Vec<&'a ParseItem> = parser.commands().collect();
        if commands.is_empty() {
            return Ok(CommandPhase::NotDeclared);
        }

        let Some(index) = state.first_unclaimed() else {
            if self.completion {
                for cmd in &commands {
                    self.emit(cmd.short_name().unwrap_or_default());
                }
            }
            return Ok(CommandPhase::Missing);
        };

        let token = state.text(index).unwrap_or_default();
        let Some(cmd) = commands.iter().copied().find(|c| c.short_name() == Some(token)) else {
            if self.completion {
                for name in commands.iter().filter_map(|c| c.short_name()) {
                    if name.starts_with(token) && name != token {
                        self.emit(name);
                    }
                }
            }
            return Ok(CommandPhase::Missing);
        };

        state.mark_matched(cmd.id(), parser.id(), index)?;
        tracing::debug!(parser = parser.id().index(), "selected command {}", cmd.display_name());
        Ok(match cmd.subparser() {
            Some(child) => CommandPhase::Selected(child),
            None => CommandPhase::NotDeclared,
        })
    }

    /// Parameter phase. Returns the first mandatory positional left without a token.
    fn match_parameters(
        &mut self,
        parser: Parser<'a>,
        state: &mut MatchState,
        missing_command: bool,
    ) -> Result<Option<&'a ParseItem>> {
        let offer = self.completion && !missing_command;
        let mut missing = None;
        let mut stopped = false;

        for param in parser.parameters() {
            let Some(index) = state.first_unclaimed() else {
                if offer {
                    self.offer(param, "");
                } else if !self.completion && param.is_mandatory() {
                    missing = Some(param);
                }
                stopped = true;
                break;
            };
            if offer && self.offer_for(param, index, state) {
                stopped = true;
                break;
            }
            state.mark_matched(param.id(), parser.id(), index)?;
            state.bind(param.id(), index, 0)?;
        }

        let Some(array) = parser.parameter_array() else {
            return Ok(missing);
        };
        if self.completion && stopped {
            return Ok(missing);
        }

        let mut taken = 0usize;
        loop {
            let Some(index) = state.first_unclaimed() else {
                if offer {
                    self.offer(array, "");
                }
                break;
            };
            if offer && self.offer_for(array, index, state) {
                break;
            }
            state.mark_matched(array.id(), parser.id(), index)?;
            state.bind(array.id(), index, 0)?;
            taken += 1;
        }

        if !self.completion && missing.is_none() && array.is_mandatory() && taken == 0 {
            missing = Some(array);
        }
        Ok(missing)
    }

    fn offer(&mut self, item: &ParseItem, partial: &str) {
        for candidate in item.complete(partial).unwrap_or_default() {
            self.emit(candidate);
        }
    }

    /// Emit the candidates for token `index` other than the token itself.
    /// Returns false when there were none, so the token gets bound instead.
    fn offer_for(&mut self, item: &ParseItem, index: usize, state: &MatchState) -> bool {
        if !item.has_completion() {
            return false;
        }
        let token = state.text(index).unwrap_or_default();
        let mut emitted = false;
        for candidate in item.complete(token).unwrap_or_default() {
            if candidate != token {
                self.emit(candidate);
                emitted = true;
            }
        }
        emitted
    }
}

/// Release globals matched at this level so the selected subparser can claim
/// them again through its inherited flags.
fn reoffer(globals: &[ItemId], state: &mut MatchState) {
    for &item in globals {
        state.unclaim(item);
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::item::Flag;

    fn run(cmdline: &Cmdline, args: &[&str], completion: bool) -> (Level, MatchState, Vec<String>) {
        let mut state = MatchState::new(args.iter().copied(), cmdline.items().len());
        let mut engine = Engine::new(cmdline, completion);
        let level = engine.descend(ParserId::ROOT, &mut state).unwrap();
        (level, state, engine.into_candidates())
    }

    #[test]
    fn value_flag_takes_the_next_token_only_when_unclaimed() {
        let mut out = None;
        let cmdline = Cmdline::build("t", |root| {
            out = Some(root.add_flag(Flag::short("o").value("FILE")));
            root.add_parameter_array("rest", "");
        })
        .unwrap();
        let out = out.unwrap();

        let (_, state, _) = run(&cmdline, &["-o", "a.txt", "b"], false);
        assert_eq!(state.values(out), vec!["a.txt"]);
        assert_eq!(state.matched_token(out), Some(0));

        let (_, state, _) = run(&cmdline, &["-o"], false);
        assert!(!state.is_matched(out));

        let rest = cmdline.root().parameter_array().unwrap().id();
        let mut state = MatchState::new(["-o", "a.txt"], cmdline.items().len());
        state.claim(1, rest).unwrap();
        Engine::new(&cmdline, false)
            .descend(ParserId::ROOT, &mut state)
            .unwrap();
        assert!(!state.is_matched(out));
        assert_eq!(state.claimed_by(1), Some(rest));
    }

    #[test]
    fn value_flag_skips_a_token_claimed_by_an_outer_level() {
        let mut ids = Vec::new();
        let cmdline = Cmdline::build("t", |root| {
            ids.push(root.add_flag(Flag::short("v")));
            root.add_command("sub", "", |sub| {
                ids.push(sub.add_flag(Flag::short("o").value("FILE")));
            });
        })
        .unwrap();
        let (verbose, out) = (ids[0], ids[1]);

        let (level, state, _) = run(&cmdline, &["sub", "-o", "-v"], false);
        assert!(matches!(level, Level::Ready(_)));
        assert_eq!(state.claimed_by(2), Some(verbose));
        assert!(!state.is_matched(out));
        assert!(!state.is_claimed(1));
    }

    #[test]
    fn inline_value_uses_no_extra_token() {
        let mut out = None;
        let cmdline = Cmdline::build("t", |root| {
            out = Some(root.add_flag(Flag::short_long("o", "output").value("FILE")));
            root.add_parameter_array("rest", "");
        })
        .unwrap();
        let out = out.unwrap();

        let (_, state, _) = run(&cmdline, &["--output=x.bin", "tail"], false);
        assert_eq!(state.values(out), vec!["x.bin"]);
        assert_eq!(state.bound_tokens(out), vec![0]);
        assert_ne!(state.claimed_by(1), Some(out));
    }

    #[test]
    fn first_declared_flag_wins() {
        let mut ids = Vec::new();
        let cmdline = Cmdline::build("t", |root| {
            ids.push(root.add_flag(Flag::short("v")));
            ids.push(root.add_flag(Flag::long("v")));
            ids.push(root.add_flag(Flag::short("v")));
        })
        .unwrap();
        let (_, state, _) = run(&cmdline, &["-v"], false);
        assert_eq!(state.claimed_by(0), Some(ids[0]));
        assert!(!state.is_matched(ids[2]));
    }

    #[test]
    fn completion_lists_unmatched_flag_spellings() {
        let cmdline = Cmdline::build("t", |root| {
            root.add_flag(Flag::short("x"));
            root.add_flag(Flag::short_long("y", "value").value("V"));
        })
        .unwrap();

        let (_, _, candidates) = run(&cmdline, &["-"], true);
        assert_eq!(candidates, vec!["-x", "-y=", "--value="]);

        let (_, _, candidates) = run(&cmdline, &["-x", "-"], true);
        assert_eq!(candidates, vec!["-y=", "--value="]);
    }

    #[test]
    fn completion_lists_commands_by_prefix() {
        let cmdline = Cmdline::build("t", |root| {
            root.add_command("show", "", |_| {});
            root.add_command("shutdown", "", |_| {});
            root.add_command("update", "", |_| {});
        })
        .unwrap();

        let (_, _, candidates) = run(&cmdline, &["sh"], true);
        assert_eq!(candidates, vec!["show", "shutdown"]);

        let (_, _, candidates) = run(&cmdline, &[], true);
        assert_eq!(candidates, vec!["show", "shutdown", "update"]);

        let (_, _, candidates) = run(&cmdline, &["show"], true);
        assert!(candidates.is_empty());
    }

    #[test]
    fn completion_asks_the_parameter_provider() {
        let cmdline = Cmdline::build("t", |root| {
            let color = root.add_parameter("color", "");
            root.on_completion(color, |partial| {
                ["red", "green", "grey"]
                    .iter()
                    .filter(|c| c.starts_with(partial))
                    .map(|c| c.to_string())
                    .collect()
            });
        })
        .unwrap();

        let (_, _, candidates) = run(&cmdline, &["g"], true);
        assert_eq!(candidates, vec!["green", "grey"]);

        let (_, _, candidates) = run(&cmdline, &[], true);
        assert_eq!(candidates, vec!["red", "green", "grey"]);

        // An exact value has nothing left to offer: it binds.
        let (_, state, candidates) = run(&cmdline, &["red"], true);
        assert!(candidates.is_empty());
        assert!(state.is_claimed(0));
    }

    fn recording_provider(
        calls: Rc<RefCell<Vec<String>>>,
        choices: &'static [&'static str],
    ) -> impl Fn(&str) -> Vec<String> + 'static {
        move |partial: &str| {
            calls.borrow_mut().push(partial.to_string());
            choices
                .iter()
                .filter(|c| c.starts_with(partial))
                .map(|c| c.to_string())
                .collect()
        }
    }

    #[test]
    fn array_completion_asks_the_provider_per_token() {
        let calls = Rc::new(RefCell::new(Vec::new()));
        let mut files = None;
        let cmdline = Cmdline::build("t", |root| {
            let id = root.add_parameter_array("files", "");
            root.on_completion(id, recording_provider(calls.clone(), &["alpha", "beta", "gamma"]));
            files = Some(id);
        })
        .unwrap();
        let files = files.unwrap();

        // "alpha" only completes to itself, so it binds and the array goes on.
        let (_, state, candidates) = run(&cmdline, &["alpha", "be"], true);
        assert_eq!(candidates, vec!["beta"]);
        assert_eq!(state.values(files), vec!["alpha"]);
        assert!(!state.is_claimed(1));
        assert_eq!(*calls.borrow(), vec!["alpha", "be"]);

        calls.borrow_mut().clear();
        let (_, state, candidates) = run(&cmdline, &["alpha"], true);
        assert_eq!(candidates, vec!["alpha", "beta", "gamma"]);
        assert_eq!(state.values(files), vec!["alpha"]);
        assert_eq!(*calls.borrow(), vec!["alpha", ""]);
    }

    #[test]
    fn array_is_not_offered_while_a_parameter_is_incomplete() {
        let calls = Rc::new(RefCell::new(Vec::new()));
        let cmdline = Cmdline::build("t", |root| {
            let color = root.add_parameter("color", "");
            root.on_completion(color, |partial| {
                ["red", "green", "grey"]
                    .iter()
                    .filter(|c| c.starts_with(partial))
                    .map(|c| c.to_string())
                    .collect()
            });
            let rest = root.add_parameter_array("rest", "");
            root.on_completion(rest, recording_provider(calls.clone(), &["one", "two"]));
        })
        .unwrap();

        let (_, _, candidates) = run(&cmdline, &["g"], true);
        assert_eq!(candidates, vec!["green", "grey"]);
        let (_, _, candidates) = run(&cmdline, &[], true);
        assert_eq!(candidates, vec!["red", "green", "grey"]);
        assert!(calls.borrow().is_empty());

        let (_, _, candidates) = run(&cmdline, &["red"], true);
        assert_eq!(candidates, vec!["one", "two"]);
        assert_eq!(*calls.borrow(), vec![""]);
    }

    #[test]
    fn parameters_without_provider_bind_in_completion_mode() {
        let mut files = None;
        let cmdline = Cmdline::build("t", |root| {
            files = Some(root.add_parameter_array("files", ""));
        })
        .unwrap();
        let (_, state, candidates) = run(&cmdline, &["a", "b"], true);
        assert!(candidates.is_empty());
        assert_eq!(state.values(files.unwrap()), vec!["a", "b"]);
    }

    #[test]
    fn global_flag_is_reoffered_to_the_subcommand() {
        let mut help = None;
        let cmdline = Cmdline::build("t", |root| {
            help = Some(root.add_global_flag(Flag::short("h"), |_, _| Ok(())));
            root.add_command("sub", "", |_| {});
        })
        .unwrap();
        let help = help.unwrap();

        let (level, state, _) = run(&cmdline, &["-h", "sub"], false);
        let Level::Ready(deferred) = level else {
            panic!("expected Ready");
        };
        let sub = cmdline.root().commands().next().unwrap().subparser().unwrap();
        assert_eq!(
            deferred,
            vec![Deferred::Global(GlobalMatch { item: help, parser: sub })]
        );
        assert_eq!(state.matched_in(help), Some(sub));
    }
}
