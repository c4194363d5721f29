use anyhow::{Context, Result, anyhow};
use clap::{Arg, ArgAction, ArgGroup, ArgMatches, Command, value_parser};
use std::{
    fs::File,
    io::{self, BufRead, BufReader},
    path::PathBuf,
};

use crate::flowtsp_objects::distance_matrix::{Distance, DistanceMatrix};

pub const ARG_ID_INSTANCE: &str = "instance";
pub const ARG_ID_RANDOM: &str = "random";
pub const ARG_ID_SEED: &str = "seed";
pub const ARG_ID_MIN_DISTANCE: &str = "min-distance";
pub const ARG_ID_MAX_DISTANCE: &str = "max-distance";

pub fn get_reader_file(from_file: &PathBuf) -> Result<Box<dyn BufRead>> {
    if from_file.as_os_str() == "-" {
        Ok(Box::new(BufReader::new(io::stdin())))
    } else {
        let file = File::open(from_file)
            .with_context(|| format!("Could not read file `{}`.", from_file.display()))?;
        Ok(Box::new(BufReader::new(file)))
    }
}

/**
 * Seed and distance range of a generated instance.
 */
pub fn add_random_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_ID_SEED)
                .long(ARG_ID_SEED)
                .action(ArgAction::Set)
                .value_name("SEED")
                .help("Seed of the random distances.")
                .default_value("1")
                .value_parser(value_parser!(u64)),
        )
        .arg(
            Arg::new(ARG_ID_MIN_DISTANCE)
                .long(ARG_ID_MIN_DISTANCE)
                .action(ArgAction::Set)
                .value_name("DISTANCE")
                .help("Smallest random distance.")
                .default_value("1")
                .value_parser(value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new(ARG_ID_MAX_DISTANCE)
                .long(ARG_ID_MAX_DISTANCE)
                .action(ArgAction::Set)
                .value_name("DISTANCE")
                .help("Largest random distance.")
                .default_value("99")
                .value_parser(value_parser!(u64).range(1..)),
        )
}

/**
 * An instance is read from a file (`-` for stdin), or generated with `--random`.
 */
pub fn add_instance_args(command: Command) -> Command {
    add_random_args(
        command
            .arg(
                Arg::new(ARG_ID_INSTANCE)
                    .action(ArgAction::Set)
                    .value_name("FILE")
                    .help("The distance matrix; `-` reads from standard input.")
                    .value_parser(value_parser!(PathBuf)),
            )
            .arg(
                Arg::new(ARG_ID_RANDOM)
                    .long(ARG_ID_RANDOM)
                    .action(ArgAction::Set)
                    .value_name("VERTICES")
                    .help("Generate a random instance with this many vertices instead of reading one.")
                    .value_parser(value_parser!(usize)),
            ),
    )
    .group(
        ArgGroup::new("source")
            .args([ARG_ID_INSTANCE, ARG_ID_RANDOM])
            .required(true),
    )
}

pub fn random_instance(cli_matches: &ArgMatches, number_of_vertices: usize) -> Result<DistanceMatrix> {
    let seed = *cli_matches
        .get_one::<u64>(ARG_ID_SEED)
        .ok_or_else(|| anyhow!("no seed given"))?;
    let min: Distance = *cli_matches
        .get_one::<u64>(ARG_ID_MIN_DISTANCE)
        .ok_or_else(|| anyhow!("no minimum distance given"))?;
    let max: Distance = *cli_matches
        .get_one::<u64>(ARG_ID_MAX_DISTANCE)
        .ok_or_else(|| anyhow!("no maximum distance given"))?;
    if min > max {
        return Err(anyhow!(
            "the minimum distance {} exceeds the maximum distance {}",
            min,
            max
        ));
    }

    log::info!(
        "Generating {} vertices with distances in {}..={}, seed {}",
        number_of_vertices,
        min,
        max,
        seed
    );
    Ok(DistanceMatrix::random(number_of_vertices, seed, min..=max)?)
}

pub fn read_instance(cli_matches: &ArgMatches) -> Result<DistanceMatrix> {
    if let Some(from_file) = cli_matches.get_one::<PathBuf>(ARG_ID_INSTANCE) {
        log::info!("Reading {}", from_file.display());
        let mut reader = get_reader_file(from_file)?;
        DistanceMatrix::import(&mut reader)
            .with_context(|| format!("Parsing `{}` as a distance matrix.", from_file.display()))
    } else if let Some(number_of_vertices) = cli_matches.get_one::<usize>(ARG_ID_RANDOM) {
        random_instance(cli_matches, *number_of_vertices)
    } else {
        Err(anyhow!("No instance given."))
    }
}
