//! What a run matched, as seen by actions.

use crate::item::{ItemId, ItemKind, ParserId};
use crate::parser::{Cmdline, Parser};
use crate::state::{Argument, MatchState};

/// Read access to the match results of one run.
///
/// Items are looked up by the [`ItemId`] returned when they were declared.
#[derive(Clone, Copy)]
pub struct Matches<'a> {
    cmdline: &'a Cmdline,
    state: &'a MatchState,
}

impl<'a> Matches<'a> {
    pub(crate) fn new(cmdline: &'a Cmdline, state: &'a MatchState) -> Self {
        Self { cmdline, state }
    }

    pub fn cmdline(&self) -> &'a Cmdline {
        self.cmdline
    }

    /// Whether the item matched (a flag was given, a parameter got a token).
    pub fn is_present(&self, item: ItemId) -> bool {
        self.state.is_matched(item)
    }

    /// First value of a value flag or parameter.
    pub fn value(&self, item: ItemId) -> Option<&'a str> {
        self.state.values(item).into_iter().next()
    }

    /// Every value, in command-line order (parameter arrays).
    pub fn values(&self, item: ItemId) -> Vec<&'a str> {
        self.state.values(item)
    }

    /// Parser level that claimed the item.
    pub fn matched_in(&self, item: ItemId) -> Option<ParserId> {
        self.state.matched_in(item)
    }

    pub fn arguments(&self) -> &'a [Argument] {
        self.state.arguments()
    }

    pub fn parser(&self, id: ParserId) -> Parser<'a> {
        self.cmdline.parser(id)
    }

    pub fn usage(&self, id: ParserId) -> String {
        self.cmdline.usage(id)
    }

    /// Names of the selected commands, outermost first.
    pub fn command_path(&self) -> Vec<&'a str> {
        let mut path = Vec::new();
        let mut parser = self.cmdline.root();
        while let Some(cmd) = parser.commands().find(|c| self.state.is_matched(c.id())) {
            path.push(cmd.short_name().unwrap_or_default());
            match cmd.subparser() {
                Some(child) => parser = self.cmdline.parser(child),
                None => break,
            }
        }
        path
    }

    /// Debug table of every item visible at `parser` and what it matched.
    pub fn table(&self, parser: ParserId) -> String {
        let mut items: Vec<_> = self.cmdline.parser(parser).all_items().collect();
        items.sort_by_key(|item| item.sort_order());

        let mark = |b: bool| if b { "X".to_string() } else { String::new() };
        let rows: Vec<Vec<String>> = items
            .iter()
            .map(|item| {
                let values = self.state.values(item.id());
                let value = if item.kind() == ItemKind::ParameterArray {
                    if values.is_empty() {
                        String::new()
                    } else {
                        let quoted: Vec<String> = values.iter().map(|v| format!("\"{v}\"")).collect();
                        format!("[ {} ]", quoted.join(","))
                    }
                } else {
                    values.first().map(|v| v.to_string()).unwrap_or_default()
                };
                vec![
                    item.kind().to_string(),
                    item.short_name().unwrap_or_default().to_string(),
                    item.long_name().unwrap_or_default().to_string(),
                    item.description().to_string(),
                    mark(item.is_global()),
                    mark(item.is_mandatory()),
                    mark(self.state.is_matched(item.id())),
                    value,
                ]
            })
            .collect();

        format_table(
            &[
                "TYPE",
                "SHORT-NAME",
                "LONG-NAME",
                "DESCRIPTION",
                "GLOBAL",
                "MANDATORY",
                "MATCHES",
                "VALUE",
            ],
            &[false, false, false, false, true, true, true, false],
            &rows,
        )
    }
}

fn format_table(headers: &[&str], centered: &[bool], rows: &[Vec<String>]) -> String {
    let widths: Vec<usize> = headers
        .iter()
        .enumerate()
        .map(|(col, h)| {
            rows.iter()
                .filter_map(|r| r.get(col))
                .map(|c| c.chars().count())
                .chain(std::iter::once(h.len()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let line = |cells: Vec<&str>| -> String {
        let padded: Vec<String> = cells
            .iter()
            .enumerate()
            .map(|(col, cell)| {
                let width = widths[col];
                if centered[col] {
                    format!("{cell:^width$}")
                } else {
                    format!("{cell:width$}")
                }
            })
            .collect();
        format!("{}\n", padded.join(" | ").trim_end())
    };

    let mut out = line(headers.to_vec());
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    out.push_str(&format!("{}\n", rule.join("-|-")));
    for row in rows {
        out.push_str(&line(row.iter().map(String::as_str).collect()));
    }
    out
}
