use anyhow::Context;
use clap::{Arg, ArgAction, ArgMatches, Command, value_parser};

use crate::{
    flowtsp_commands::flowtsp_command_solve::{ARG_ID_ROOT, ARG_ID_THREADS, get_thread_hint},
    flowtsp_framework::{flowtsp_command::FlowTspCommand, flowtsp_input},
    techniques::brute_force::{BruteForce, MAX_VERTICES},
};

pub fn add_search_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_ID_ROOT)
                .long(ARG_ID_ROOT)
                .action(ArgAction::Set)
                .value_name("VERTEX")
                .help("The vertex tours start from; the first vertex if not given.")
                .value_parser(value_parser!(usize)),
        )
        .arg(
            Arg::new(ARG_ID_THREADS)
                .long(ARG_ID_THREADS)
                .action(ArgAction::Set)
                .value_name("THREADS")
                .help("0 leaves the number of threads to the solver, -1 uses all available threads, and N uses exactly N threads.")
                .default_value("-1")
                .allow_negative_numbers(true)
                .value_parser(value_parser!(i64)),
        )
}

pub const FLOWTSP_BRUTE_FORCE: FlowTspCommand = FlowTspCommand::Command {
    name_short: "bf",
    name_long: Some("brute-force"),
    explanation_short: "Find a shortest tour by trying all of them.",
    explanation_long: Some(
        "Find a shortest tour by enumerating every tour from the root. Only feasible for small instances; serves as a reference for the flow formulation.",
    ),
    cli_command: Some(|command| add_search_args(flowtsp_input::add_instance_args(command))),
    execute: |cli_matches: &ArgMatches| {
        let matrix = flowtsp_input::read_instance(cli_matches)?;
        let root = cli_matches.get_one::<usize>(ARG_ID_ROOT).copied();
        let threads = get_thread_hint(cli_matches)?;

        let (length, tour) = matrix
            .brute_force(root, threads)
            .with_context(|| format!("Enumerating tours of at most {} vertices.", MAX_VERTICES))?;
        Ok(format!("Tour                = {:?}\nSum of distance     = {}", tour, length))
    },
};
