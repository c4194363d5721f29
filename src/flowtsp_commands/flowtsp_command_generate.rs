use clap::{Arg, ArgAction, value_parser};

use crate::flowtsp_framework::{flowtsp_command::FlowTspCommand, flowtsp_input};

pub const ARG_ID_VERTICES: &str = "vertices";

pub const FLOWTSP_GENERATE: FlowTspCommand = FlowTspCommand::Command {
    name_short: "gen",
    name_long: Some("generate"),
    explanation_short: "Generate a random distance matrix.",
    explanation_long: Some(
        "Generate a complete directed graph on the vertices 1 up to and including n, with uniformly drawn distances. The same seed always gives the same instance.",
    ),
    cli_command: Some(|command| {
        flowtsp_input::add_random_args(
            command.arg(
                Arg::new(ARG_ID_VERTICES)
                    .action(ArgAction::Set)
                    .value_name("VERTICES")
                    .help("The number of vertices.")
                    .required(true)
                    .value_parser(value_parser!(usize)),
            ),
        )
    }),
    execute: |cli_matches| {
        let number_of_vertices = *cli_matches
            .get_one::<usize>(ARG_ID_VERTICES)
            .ok_or_else(|| anyhow::anyhow!("no number of vertices given"))?;
        let matrix = flowtsp_input::random_instance(cli_matches, number_of_vertices)?;
        Ok(matrix.to_string())
    },
};
