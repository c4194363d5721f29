use anyhow::{Context, Result, anyhow};
use clap::{Arg, ArgAction, ArgMatches, Command, value_parser};
use indicatif::{ProgressBar, ProgressStyle};
use std::{fmt::Display, io::Write, path::PathBuf};

use crate::flowtsp_commands::{
    flowtsp_command_brute_force, flowtsp_command_generate, flowtsp_command_solve,
};

pub const FLOWTSP_COMMANDS: FlowTspCommand = FlowTspCommand::Group {
    name_short: "flowtsp",
    name_long: None,
    explanation_short: "Flowtsp: exact asymmetric travelling salesman tours through a flow formulation.",
    explanation_long: None,
    children: &[
        &flowtsp_command_brute_force::FLOWTSP_BRUTE_FORCE,
        &flowtsp_command_generate::FLOWTSP_GENERATE,
        &flowtsp_command_solve::FLOWTSP_SOLVE,
    ],
};

pub const ARG_SHORT_OUTPUT: char = 'o';
pub const ARG_ID_OUTPUT: &str = "output";

pub enum FlowTspCommand {
    Group {
        name_short: &'static str,
        name_long: Option<&'static str>,
        explanation_short: &'static str,
        explanation_long: Option<&'static str>,
        children: &'static [&'static FlowTspCommand],
    },
    Command {
        name_short: &'static str,
        name_long: Option<&'static str>,
        explanation_short: &'static str,
        explanation_long: Option<&'static str>,
        cli_command: Option<fn(command: Command) -> Command>, //create the cli command. An output -o argument is always added

        execute: fn(cli_matches: &ArgMatches) -> Result<String>,
    },
}

impl FlowTspCommand {
    pub fn build_cli(&self) -> Command {
        let mut command;
        match self {
            FlowTspCommand::Group {
                name_short,
                name_long,
                explanation_short,
                explanation_long,
                children,
            } => {
                let name = if let Some(x) = name_long { x } else { name_short };
                command = Command::new(*name)
                    .about(*explanation_short)
                    .subcommand_required(true)
                    .allow_external_subcommands(false);

                if name_long.is_some() {
                    command = command.alias(*name_short);
                }

                if let Some(l) = explanation_long {
                    command = command.long_about(*l);
                }

                for child in children.iter() {
                    command = command.subcommand(child.build_cli());
                }
            }
            FlowTspCommand::Command {
                name_short,
                name_long,
                explanation_short,
                explanation_long,
                cli_command,
                ..
            } => {
                let name = if let Some(x) = name_long { x } else { name_short };
                command = Command::new(*name).about(*explanation_short);

                if name_long.is_some() {
                    command = command.alias(*name_short);
                }

                if let Some(l) = explanation_long {
                    command = command.long_about(*l);
                }

                if let Some(f) = cli_command {
                    command = (f)(command);
                }

                command = command.arg(
                    Arg::new(ARG_ID_OUTPUT)
                        .short(ARG_SHORT_OUTPUT)
                        .long(ARG_ID_OUTPUT)
                        .action(ArgAction::Set)
                        .value_name("FILE")
                        .help("Saves the result to a file.")
                        .required(false)
                        .value_parser(value_parser!(PathBuf)),
                );
            }
        };
        command
    }

    pub fn long_name(&self) -> &str {
        match self {
            FlowTspCommand::Group {
                name_short,
                name_long,
                ..
            }
            | FlowTspCommand::Command {
                name_short,
                name_long,
                ..
            } => match name_long {
                Some(x) => x,
                None => name_short,
            },
        }
    }

    pub fn get_progress_bar(total_ticks: usize) -> ProgressBar {
        let pb = ProgressBar::new(total_ticks as u64);
        if let Ok(style) = ProgressStyle::with_template("[{wide_bar:.cyan/blue}] {pos:>7}/{len:7}") {
            pb.set_style(style.progress_chars("#>-"));
        }
        pb.set_position(0);
        pb
    }

    pub fn execute(&self, cli_matches: &ArgMatches) -> Result<()> {
        match self {
            FlowTspCommand::Group { children, .. } => {
                for child in children.iter() {
                    if let Some(sub_matches) = cli_matches.subcommand_matches(child.long_name()) {
                        return child.execute(sub_matches);
                    }
                }
            }
            FlowTspCommand::Command { execute, .. } => {
                log::info!("Starting {}", self.long_name());

                let result = (execute)(cli_matches)
                    .with_context(|| format!("Executing {}.", self.long_name()))?;

                if let Some(to_file) = cli_matches.get_one::<PathBuf>(ARG_ID_OUTPUT) {
                    log::info!("Writing result to {:?}", to_file);
                    export_to_file(to_file, &result)?;
                } else {
                    println!("{}", result);
                }

                return Ok(());
            }
        }
        Err(anyhow!("command not recognised"))
    }
}

pub fn export_to_file(to_file: &PathBuf, result: &str) -> Result<()> {
    let file = std::fs::File::create(to_file)
        .with_context(|| format!("Writing result to file {:?}.", to_file))?;
    let mut writer = std::io::BufWriter::new(&file);
    writeln!(writer, "{}", result).with_context(|| format!("Writing result to file {:?}.", to_file))?;
    writer
        .flush()
        .with_context(|| format!("writing result to file {:?}", to_file))
}

impl Display for FlowTspCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.long_name())
    }
}

#[cfg(test)]
mod tests {
    use super::FLOWTSP_COMMANDS;

    #[test]
    fn cli_is_consistent() {
        FLOWTSP_COMMANDS.build_cli().debug_assert();
    }

    #[test]
    fn cli_dispatches_on_long_names() {
        let matches = FLOWTSP_COMMANDS
            .build_cli()
            .try_get_matches_from(["flowtsp", "bf", "--random", "5", "--seed", "3"])
            .unwrap();
        assert!(matches.subcommand_matches("brute-force").is_some());
        assert!(FLOWTSP_COMMANDS.execute(&matches).is_ok());
    }
}
