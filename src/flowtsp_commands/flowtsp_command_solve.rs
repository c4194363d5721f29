use anyhow::{Context, Result, anyhow};
use clap::{Arg, ArgAction, ArgMatches, value_parser};
use std::time::Duration;

use crate::{
    flowtsp_commands::flowtsp_command_brute_force::add_search_args,
    flowtsp_framework::{flowtsp_command::FlowTspCommand, flowtsp_input},
    optimisation_algorithms::{
        microlp_solver::MicrolpSolver, mixed_integer_linear_programming::ThreadHint,
    },
    techniques::{
        flow_tsp::{FlowTsp, SolveParameters},
        tour_decoder::DecodeTolerances,
    },
};

pub const ARG_ID_ROOT: &str = "root";
pub const ARG_ID_THREADS: &str = "threads";
pub const ARG_ID_TIME_LIMIT: &str = "time-limit";
pub const ARG_ID_SELECTION_TOLERANCE: &str = "selection-tolerance";
pub const ARG_ID_OBJECTIVE_TOLERANCE: &str = "objective-tolerance";
pub const ARG_ID_JSON: &str = "json";

pub fn get_thread_hint(cli_matches: &ArgMatches) -> Result<ThreadHint> {
    let hint = *cli_matches
        .get_one::<i64>(ARG_ID_THREADS)
        .ok_or_else(|| anyhow!("no thread hint given"))?;
    ThreadHint::from_hint(hint).ok_or_else(|| {
        anyhow!(
            "thread hint {} is not 0 (solver default), -1 (all available) or a positive number",
            hint
        )
    })
}

pub fn get_tolerances(cli_matches: &ArgMatches) -> Result<DecodeTolerances> {
    let selection = *cli_matches
        .get_one::<f64>(ARG_ID_SELECTION_TOLERANCE)
        .ok_or_else(|| anyhow!("no selection tolerance given"))?;
    let objective = *cli_matches
        .get_one::<f64>(ARG_ID_OBJECTIVE_TOLERANCE)
        .ok_or_else(|| anyhow!("no objective tolerance given"))?;
    if !(selection > 0.0 && selection < 1.0) {
        return Err(anyhow!(
            "the selection tolerance must lie strictly between 0 and 1, but is {}",
            selection
        ));
    }
    if !(objective > 0.0) {
        return Err(anyhow!(
            "the objective tolerance must be positive, but is {}",
            objective
        ));
    }
    Ok(DecodeTolerances {
        selection,
        objective,
    })
}

pub fn get_solve_parameters(cli_matches: &ArgMatches) -> Result<SolveParameters> {
    let seconds = *cli_matches
        .get_one::<u64>(ARG_ID_TIME_LIMIT)
        .ok_or_else(|| anyhow!("no time limit given"))?;
    Ok(SolveParameters {
        root: cli_matches.get_one::<usize>(ARG_ID_ROOT).copied(),
        time_limit: Duration::from_secs(seconds),
        threads: get_thread_hint(cli_matches)?,
        tolerances: get_tolerances(cli_matches)?,
    })
}

pub const FLOWTSP_SOLVE: FlowTspCommand = FlowTspCommand::Command {
    name_short: "sol",
    name_long: Some("solve"),
    explanation_short: "Find a shortest tour with the single-commodity flow formulation.",
    explanation_long: Some(
        "Formulate the instance as a mixed-integer linear program in which the root sends one unit of flow to every other vertex along the selected arcs, solve it, and decode the tour from the flow values. The decoded tour is checked against the instance before it is reported.",
    ),
    cli_command: Some(|command| {
        add_search_args(flowtsp_input::add_instance_args(command))
            .arg(
                Arg::new(ARG_ID_TIME_LIMIT)
                    .long(ARG_ID_TIME_LIMIT)
                    .action(ArgAction::Set)
                    .value_name("SECONDS")
                    .help("Wall-clock limit of the solver.")
                    .default_value("3600")
                    .value_parser(value_parser!(u64)),
            )
            .arg(
                Arg::new(ARG_ID_SELECTION_TOLERANCE)
                    .long(ARG_ID_SELECTION_TOLERANCE)
                    .action(ArgAction::Set)
                    .value_name("EPSILON")
                    .help("An arc is selected when its variable exceeds 1 minus this value.")
                    .default_value("0.01")
                    .value_parser(value_parser!(f64)),
            )
            .arg(
                Arg::new(ARG_ID_OBJECTIVE_TOLERANCE)
                    .long(ARG_ID_OBJECTIVE_TOLERANCE)
                    .action(ArgAction::Set)
                    .value_name("TOLERANCE")
                    .help("Largest accepted difference between the solver's objective and the length of the decoded tour.")
                    .default_value("1.0")
                    .value_parser(value_parser!(f64)),
            )
            .arg(
                Arg::new(ARG_ID_JSON)
                    .long(ARG_ID_JSON)
                    .action(ArgAction::SetTrue)
                    .help("Report in JSON."),
            )
    }),
    execute: |cli_matches| {
        let matrix = flowtsp_input::read_instance(cli_matches)?;
        let parameters = get_solve_parameters(cli_matches)?;

        let report = matrix
            .solve_flow_tsp(&MicrolpSolver::new(), &parameters)
            .with_context(|| {
                format!(
                    "Solving an instance of {} vertices.",
                    matrix.number_of_vertices()
                )
            })?;

        if cli_matches.get_flag(ARG_ID_JSON) {
            Ok(serde_json::to_string_pretty(&report.to_json())?)
        } else {
            Ok(report.to_string())
        }
    },
};
