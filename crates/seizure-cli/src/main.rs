use anyhow::Result;
use clap::{Arg, ArgAction, ArgMatches, Command, ValueHint};
use log::LevelFilter;
use std::path::PathBuf;

use seizure_classifiers::io::DEFAULT_FILE_PATTERN;
use seizure_classifiers::models::registry::Method;
use seizure_cli::commands::batch::run_batch;
use seizure_cli::commands::score::run_score;
use seizure_cli::commands::train::{run_train, TrainSettings};

fn training_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("config")
                .help("Path to an experiment configuration file (JSON)")
                .required(false)
                .value_parser(clap::value_parser!(PathBuf))
                .value_hint(ValueHint::FilePath),
        )
        .arg(
            Arg::new("method")
                .short('m')
                .long("method")
                .help("Model family to train. Overrides the method in the configuration file.")
                .value_parser(Method::ALL.map(|m| m.as_str())),
        )
        .arg(
            Arg::new("seed")
                .short('s')
                .long("seed")
                .help("Seed for downsampling, splitting and the estimators")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new("processes")
                .short('p')
                .long("processes")
                .help("Number of worker threads for the grid search and file loading")
                .value_parser(clap::value_parser!(usize)),
        )
        .arg(
            Arg::new("folds")
                .short('k')
                .long("folds")
                .help("Number of cross-validation folds")
                .value_parser(clap::value_parser!(usize)),
        )
        .arg(
            Arg::new("no_segment_split")
                .long("no-segment-split")
                .help("Split rows instead of whole segments")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("no_downsample")
                .long("no-downsample")
                .help("Keep every interictal row")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("no_report")
                .long("no-report")
                .help("Disable HTML report generation.")
                .action(ArgAction::SetTrue),
        )
}

fn main() -> Result<()> {
    env_logger::Builder::default()
        .filter_level(LevelFilter::Error)
        .parse_env(
            env_logger::Env::default()
                .filter_or("SEIZURE_LOG", "error,seizure=info,seizure_classifiers=info"),
        )
        .init();

    let matches = Command::new("seizure")
        .version(clap::crate_version!())
        .about("Seizure prediction from iEEG wavelet features: train, cross-validate and score")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            training_args(
                Command::new("train")
                    .about("Select and train a model on one subject's feature folder")
                    .arg(
                        Arg::new("feature_folder")
                            .help("Folder holding the per-segment feature CSV files")
                            .required(true)
                            .value_parser(clap::value_parser!(PathBuf))
                            .value_hint(ValueHint::DirPath),
                    ),
            )
            .arg(
                Arg::new("output")
                    .short('o')
                    .long("output")
                    .help("Path of the model file. Defaults to a timestamped file in the feature folder.")
                    .value_parser(clap::value_parser!(PathBuf))
                    .value_hint(ValueHint::FilePath),
            ),
        )
        .subcommand(
            Command::new("score")
                .about("Write per-segment preictal scores for the unlabeled test segments")
                .arg(
                    Arg::new("feature_folder")
                        .help("Folder holding the per-segment feature CSV files")
                        .required(true)
                        .value_parser(clap::value_parser!(PathBuf))
                        .value_hint(ValueHint::DirPath),
                )
                .arg(
                    Arg::new("model")
                        .long("model")
                        .help("Trained model file (JSON). Defaults to the newest model in the feature folder.")
                        .value_parser(clap::value_parser!(PathBuf))
                        .value_hint(ValueHint::FilePath),
                )
                .arg(
                    Arg::new("file_pattern")
                        .long("file-pattern")
                        .help("Suffix of the feature files")
                        .default_value(DEFAULT_FILE_PATTERN),
                )
                .arg(
                    Arg::new("output")
                        .short('o')
                        .long("output")
                        .help("Path of the submission CSV")
                        .value_parser(clap::value_parser!(PathBuf))
                        .value_hint(ValueHint::FilePath),
                ),
        )
        .subcommand(training_args(
            Command::new("batch")
                .about("Train and score every subject folder under a root folder")
                .arg(
                    Arg::new("feature_root")
                        .help("Folder containing one feature folder per subject")
                        .required(true)
                        .value_parser(clap::value_parser!(PathBuf))
                        .value_hint(ValueHint::DirPath),
                ),
        ))
        .help_template(
            "{usage-heading} {usage}\n\n\
             {about-with-newline}\n\
             Version {version}\n\n\
             {all-args}{after-help}",
        )
        .get_matches();

    let outcome = match matches.subcommand() {
        Some(("train", sub_m)) => handle_train(sub_m),
        Some(("score", sub_m)) => handle_score(sub_m),
        Some(("batch", sub_m)) => handle_batch(sub_m),
        _ => unreachable!("Subcommand is required by CLI configuration"),
    };

    if let Err(e) = outcome {
        log::error!("{:#}", e);
        std::process::exit(1);
    }
    Ok(())
}

fn required_path<'a>(matches: &'a ArgMatches, name: &str) -> Result<&'a PathBuf> {
    matches
        .get_one::<PathBuf>(name)
        .ok_or_else(|| anyhow::anyhow!("Missing argument {}", name))
}

fn handle_train(matches: &ArgMatches) -> Result<()> {
    let folder = required_path(matches, "feature_folder")?;
    let settings = TrainSettings::from_arguments(matches.get_one::<PathBuf>("config"), matches)?;
    let (model, path) = run_train(folder, &settings)?;
    match model.best_score() {
        Some(score) => log::info!(
            "[Seizure::Train] {} model (mean CV AUC {:.3}) written to {}",
            model.method,
            score,
            path.display()
        ),
        None => log::info!("[Seizure::Train] {} model written to {}", model.method, path.display()),
    }
    Ok(())
}

fn handle_score(matches: &ArgMatches) -> Result<()> {
    let folder = required_path(matches, "feature_folder")?;
    let pattern = matches
        .get_one::<String>("file_pattern")
        .map(String::as_str)
        .unwrap_or(DEFAULT_FILE_PATTERN);
    let path = run_score(
        folder,
        matches.get_one::<PathBuf>("model"),
        pattern,
        matches.get_one::<PathBuf>("output"),
    )?;
    log::info!("[Seizure::Score] Scores written to {}", path.display());
    Ok(())
}

fn handle_batch(matches: &ArgMatches) -> Result<()> {
    let root = required_path(matches, "feature_root")?;
    let settings = TrainSettings::from_arguments(matches.get_one::<PathBuf>("config"), matches)?;
    for run in run_batch(root, &settings)? {
        log::info!(
            "[Seizure::Batch] {}: model {}, scores {}",
            run.subject.display(),
            run.model.display(),
            run.scores.display()
        );
    }
    Ok(())
}
