//! Operator commands read from stdin, one per line, parsed with clap.

use clap::{Args, CommandFactory, Parser, Subcommand};
use rescuewatch_core::{Criterion, KindFilter, PriorityFilter};

/// One stdin line. The verb is the subcommand.
#[derive(Parser, Debug)]
#[command(
    name = "rescuewatch",
    no_binary_name = true,
    disable_help_flag = true,
    disable_version_flag = true,
    disable_help_subcommand = true,
    help_template = "commands:\n{subcommands}"
)]
struct Line {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Show events through the active filter
    #[command(visible_alias = "ls")]
    List,
    /// Narrow the list: `filter <kind>` or `filter priority <level>`
    #[command(
        args_conflicts_with_subcommands = true,
        subcommand_negates_reqs = true,
        disable_help_subcommand = true
    )]
    Filter(FilterArgs),
    /// Select an event and centre the map on it
    Select { id: String },
    /// Activate map pin <n>
    Pin { n: u64 },
    /// Clear the selection
    Deselect,
    /// Confirm the selected event
    Confirm,
    /// Reject the selected event
    Reject,
    /// Reconnect now
    Retry,
    /// Drop all history and pins
    Clear,
    /// Local counts and relay statistics
    Stats,
    /// Connection status
    Status,
    /// This text
    #[command(visible_alias = "?")]
    Help,
    /// Exit
    #[command(visible_alias = "exit")]
    Quit,
}

#[derive(Args, Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterArgs {
    /// all | person | fire | flood | unknown
    #[arg(required = true)]
    pub kind: Option<KindFilter>,

    #[command(subcommand)]
    pub by: Option<FilterBy>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterBy {
    /// Show one priority level: all | normal | high | critical
    Priority { level: PriorityFilter },
}

impl FilterArgs {
    pub fn criterion(&self) -> Option<Criterion> {
        match (self.by, self.kind) {
            (Some(FilterBy::Priority { level }), _) => Some(level.into()),
            (None, Some(kind)) => Some(kind.into()),
            (None, None) => None,
        }
    }
}

/// Parse one input line. Blank lines yield `None`. The verb is matched
/// case-insensitively; arguments such as event ids are kept as typed.
pub fn parse(line: &str) -> Result<Option<Command>, clap::Error> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(None);
    };
    let verb = verb.to_ascii_lowercase();
    let parsed = Line::try_parse_from(std::iter::once(verb.as_str()).chain(words))?;
    Ok(Some(parsed.command))
}

/// Command summary generated from the definitions above.
pub fn help() -> String {
    Line::command().render_help().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rescuewatch_core::{EventKind, Priority};

    fn criterion(line: &str) -> Criterion {
        match parse(line).unwrap() {
            Some(Command::Filter(args)) => args.criterion().unwrap(),
            other => panic!("expected filter, got {other:?}"),
        }
    }

    #[test]
    fn blank_line_is_nothing() {
        assert_eq!(parse("   ").unwrap(), None);
    }

    #[test]
    fn verbs_with_arguments() {
        assert_eq!(
            criterion("filter fire"),
            Criterion::Kind(KindFilter::Kind(EventKind::Fire))
        );
        assert_eq!(criterion("filter ALL"), Criterion::Kind(KindFilter::All));
        assert_eq!(
            parse("select evt_1").unwrap(),
            Some(Command::Select { id: "evt_1".into() })
        );
        assert_eq!(parse("pin 3").unwrap(), Some(Command::Pin { n: 3 }));
    }

    #[test]
    fn filter_by_priority() {
        assert_eq!(
            criterion("filter priority critical"),
            Criterion::Priority(PriorityFilter::Level(Priority::Critical))
        );
        assert_eq!(
            criterion("filter priority all"),
            Criterion::Priority(PriorityFilter::All)
        );
    }

    #[test]
    fn verb_case_folded_but_ids_kept() {
        assert_eq!(parse("Reject").unwrap(), Some(Command::Reject));
        assert_eq!(parse("confirm").unwrap(), Some(Command::Confirm));
        assert_eq!(
            parse("SELECT Evt_A").unwrap(),
            Some(Command::Select { id: "Evt_A".into() })
        );
    }

    #[test]
    fn aliases() {
        assert_eq!(parse("ls").unwrap(), Some(Command::List));
        assert_eq!(parse("?").unwrap(), Some(Command::Help));
        assert_eq!(parse("exit").unwrap(), Some(Command::Quit));
    }

    #[test]
    fn bad_input_is_reported() {
        assert!(parse("filter smoke").is_err());
        assert!(parse("filter").is_err());
        assert!(parse("filter priority urgent").is_err());
        assert!(parse("filter priority").is_err());
        assert!(parse("select").is_err());
        assert!(parse("pin x").is_err());
        assert!(parse("retry now").is_err());
        assert!(parse("launch").is_err());
        assert!(parse("select a b").is_err());
    }

    #[test]
    fn help_lists_every_verb() {
        let text = help();
        for verb in [
            "list", "filter", "select", "pin", "deselect", "confirm", "reject", "retry", "clear",
            "stats", "status", "help", "quit",
        ] {
            assert!(text.contains(verb), "help is missing `{verb}`");
        }
    }
}
