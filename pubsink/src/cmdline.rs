use clap::{Arg, ArgAction, Command};

pub(super) const BASIC: &str = "basic";
pub(super) const EMULATOR: &str = "emulator";

pub(super) fn root_cli() -> Command {
    Command::new("pubsink")
        .about("Publishes log records to pub/sub topics")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(add_basic_subcommand())
        .subcommand(add_emulator_subcommand())
}

fn add_basic_subcommand() -> Command {
    Command::new(BASIC)
        .about("Log a few records through the sink opened for a URL")
        .arg(
            Arg::new("url")
                .long("url")
                .help("Sink URL, e.g. mem://app/logs?publishTimeout=500ms")
                .action(ArgAction::Set)
                .default_value("mem://pubsink/basic"),
        )
        .arg(
            Arg::new("count")
                .long("count")
                .help("Number of records to log")
                .action(ArgAction::Set)
                .default_value("3")
                .value_parser(clap::value_parser!(usize)),
        )
}

fn add_emulator_subcommand() -> Command {
    Command::new(EMULATOR)
        .about("Log concurrently to an emulated managed pub/sub service and print what it received")
        .arg(
            Arg::new("project-id")
                .long("project-id")
                .help("Project owning the topic")
                .action(ArgAction::Set)
                .default_value("pubsink"),
        )
        .arg(
            Arg::new("topic")
                .long("topic")
                .help("Topic to publish to")
                .action(ArgAction::Set)
                .default_value("logs"),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_cli() {
        root_cli().debug_assert();
    }

    #[test]
    fn test_basic_defaults() {
        let matches = root_cli().get_matches_from(["pubsink", BASIC]);
        let (name, args) = matches.subcommand().unwrap();
        assert_eq!(name, BASIC);
        assert_eq!(
            args.get_one::<String>("url").map(String::as_str),
            Some("mem://pubsink/basic")
        );
        assert_eq!(args.get_one::<usize>("count"), Some(&3));
    }

    #[test]
    fn test_emulator_args() {
        let matches = root_cli().get_matches_from([
            "pubsink",
            EMULATOR,
            "--project-id",
            "proj",
            "--topic",
            "t",
        ]);
        let (name, args) = matches.subcommand().unwrap();
        assert_eq!(name, EMULATOR);
        assert_eq!(args.get_one::<String>("project-id").unwrap(), "proj");
        assert_eq!(args.get_one::<String>("topic").unwrap(), "t");
    }
}
