//! Usage rendering.

use crate::item::{ItemKind, ParseItem};
use crate::parser::Parser;

/// Renders the usage text printed for a failing level or by a help flag.
pub trait RenderUsage {
    fn render_usage(&self, parser: Parser<'_>) -> String;
}

/// Plain-text usage: invocation line, description, then aligned sections for
/// commands, own flags, inherited flags, global flags and parameters.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainUsage;

impl RenderUsage for PlainUsage {
    fn render_usage(&self, parser: Parser<'_>) -> String {
        let mut out = String::new();
        out.push_str(&format!("\nUsage: {}\n", usage_line(parser)));

        let description = parser.description().trim();
        if !description.is_empty() {
            out.push('\n');
            out.push_str(description);
            out.push('\n');
        }

        let sections = sections(parser);
        let width = sections
            .iter()
            .flat_map(|(_, rows)| rows.iter().map(|(left, _)| left.len()))
            .max()
            .unwrap_or(0);

        for (title, rows) in sections {
            out.push_str(&format!("\n{title}\n"));
            for (left, help) in rows {
                if help.is_empty() {
                    out.push_str(&format!("  {left}\n"));
                } else {
                    out.push_str(&format!("  {left:width$}   {help}\n"));
                }
            }
        }
        out
    }
}

fn usage_line(parser: Parser<'_>) -> String {
    let mut line = parser.invocation();
    if parser.has_commands() {
        line.push_str(" COMMAND");
    }
    if parser.flags().next().is_some() {
        line.push_str(" FLAGS");
    }
    for param in parser.positionals() {
        line.push(' ');
        line.push_str(&positional_left(param, true));
    }
    line
}

fn positional_left(param: &ParseItem, bracket_optional: bool) -> String {
    let name = param.display_name();
    let name = if bracket_optional && !param.is_mandatory() {
        format!("[{name}]")
    } else {
        name
    };
    match param.kind() {
        ItemKind::ParameterArray => format!("{name}..."),
        _ => name,
    }
}

fn flag_left(flag: &ParseItem) -> String {
    let mut left = flag.display_name();
    if let Some(value) = flag.value_name() {
        left.push_str(&format!("={value}"));
    }
    left
}

type Rows = Vec<(String, String)>;

fn flag_sections<'a>(
    flags: impl Iterator<Item = &'a ParseItem>,
    prefix: &str,
    sections: &mut Vec<(String, Rows)>,
) {
    let (mandatory, optional): (Vec<_>, Vec<_>) = flags
        .filter(|f| !f.is_global())
        .partition(|f| f.is_mandatory());
    for (title, group) in [("Mandatory flags:", mandatory), ("Optional flags:", optional)] {
        if group.is_empty() {
            continue;
        }
        let rows = group
            .into_iter()
            .map(|f| (flag_left(f), f.description().trim().to_string()))
            .collect();
        sections.push((format!("{prefix}{title}"), rows));
    }
}

fn sections(parser: Parser<'_>) -> Vec<(String, Rows)> {
    let mut sections = Vec::new();

    let commands: Rows = parser
        .commands()
        .map(|c| (c.display_name(), c.description().trim().to_string()))
        .collect();
    if !commands.is_empty() {
        sections.push(("Commands:".to_string(), commands));
    }

    flag_sections(parser.flags(), "", &mut sections);
    flag_sections(parser.inherited_flags(), "(inherited) ", &mut sections);

    let globals: Rows = parser
        .global_flags()
        .map(|f| (flag_left(f), f.description().trim().to_string()))
        .collect();
    if !globals.is_empty() {
        sections.push(("Global flags:".to_string(), globals));
    }

    let params: Rows = parser
        .positionals()
        .map(|p| (positional_left(p, false), p.description().trim().to_string()))
        .collect();
    if !params.is_empty() {
        sections.push(("Parameters:".to_string(), params));
    }

    sections
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::Flag;
    use crate::parser::Cmdline;

    fn sample() -> Cmdline {
        Cmdline::build("Sample tool", |root| {
            root.add_flag(Flag::short("v").about("verbose output"));
            root.add_global_flag(Flag::short_long("h", "help").about("show usage"), |_, _| Ok(()));
            root.add_command("copy", "copy files", |copy| {
                copy.add_flag(Flag::short_long("m", "mode").value("MODE").mandatory().about("copy mode"));
                copy.add_mandatory_parameter("dest", "destination");
                copy.add_parameter_array("sources", "source files");
            });
        })
        .unwrap()
        .with_program("tool")
    }

    #[test]
    fn root_usage_lists_commands_and_globals() {
        let cmdline = sample();
        let text = PlainUsage.render_usage(cmdline.root());

        assert!(text.contains("Usage: tool COMMAND FLAGS\n"), "{text}");
        assert!(text.contains("\nSample tool\n"), "{text}");
        assert!(text.contains("Commands:\n  copy"), "{text}");
        assert!(text.contains("Optional flags:\n  -v"), "{text}");
        assert!(text.contains("Global flags:\n  -h,--help"), "{text}");
        assert!(!text.contains("Parameters:"), "{text}");
    }

    #[test]
    fn subcommand_usage_shows_the_path_and_inherited_flags() {
        let cmdline = sample();
        let copy = cmdline.root().commands().next().unwrap().subparser().unwrap();
        let text = PlainUsage.render_usage(cmdline.parser(copy));

        assert!(text.contains("Usage: tool copy FLAGS dest [sources]...\n"), "{text}");
        assert!(text.contains("\ncopy files\n"), "{text}");
        assert!(text.contains("Mandatory flags:\n  -m,--mode=MODE"), "{text}");
        assert!(text.contains("(inherited) Optional flags:\n  -v"), "{text}");
        assert!(text.contains("Parameters:\n  dest"), "{text}");
        assert!(text.contains("sources..."), "{text}");
    }
}
