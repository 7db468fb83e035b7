use std::fs;
use std::num::NonZeroUsize;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::args::Args;
use crate::manip::*;

/// The options of a run, as written in a JSON configuration file.
#[derive(Eq, PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunConfig {
    pub dataset: Option<String>,
    pub scf: Option<String>,
    pub comparator: Option<String>,
    pub generator: Option<String>,
    pub minimal_n_stop: Option<bool>,
    pub parallel: Option<bool>,
    pub threads: Option<usize>,
    pub output_directory: Option<String>,
    pub skip_malformed: Option<bool>,
    pub prune_satisfied: Option<bool>,
}

/// The resolved options of a run.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct RunSettings {
    pub dataset: String,
    pub configs: Vec<(SocialChoice, RiskAttitude, CandidateGenerator)>,
    pub minimal_n_stop: bool,
    pub parallel: bool,
    pub threads: Option<NonZeroUsize>,
    pub first: bool,
    pub skip_malformed: bool,
    pub prune_satisfied: bool,
    pub output_directory: Option<String>,
    pub force: bool,
    pub reference: Option<String>,
    /// Also logs the rounds of the truthful tabulation.
    pub verbose: bool,
}

pub fn read_run_config(path: &str) -> ManipResult<RunConfig> {
    let contents = fs::read_to_string(path).context(OpeningFileSnafu { path })?;
    let config: RunConfig = serde_json::from_str(&contents).context(ParsingJsonSnafu {})?;
    debug!("read_run_config: {:?}", config);
    Ok(config)
}

/// Merges the command line with the configuration file, if any. The command line wins.
pub fn settings_from_args(args: &Args) -> ManipResult<RunSettings> {
    let file_config = match &args.config {
        Some(path) => Some((path.clone(), read_run_config(path)?)),
        None => None,
    };
    let (config_path, config) = match file_config {
        Some((path, config)) => (Some(path), config),
        None => (None, RunConfig::default()),
    };
    merge(args, &config, config_path.as_deref())
}

fn merge(args: &Args, config: &RunConfig, config_path: Option<&str>) -> ManipResult<RunSettings> {
    let dataset = match (&args.input, &config.dataset) {
        (Some(input), _) => input.clone(),
        (None, Some(dataset)) => relative_to_config(dataset, config_path),
        (None, None) => return MissingDatasetSnafu {}.fail(),
    };

    let configs = if args.all_configs {
        let mut l = Vec::new();
        for scf in SocialChoice::ALL {
            for comparator in RiskAttitude::ALL {
                for generator in CandidateGenerator::ALL {
                    l.push((scf, comparator, generator));
                }
            }
        }
        l
    } else {
        let scf = parse_scf(args.scf.as_ref().or(config.scf.as_ref()))?;
        let comparator = parse_comparator(args.comparator.as_ref().or(config.comparator.as_ref()))?;
        let generator = parse_generator(args.generator.as_ref().or(config.generator.as_ref()))?;
        vec![(scf, comparator, generator)]
    };

    let threads = match args.threads.or(config.threads) {
        None => None,
        Some(n) => Some(NonZeroUsize::new(n).context(InvalidThreadsSnafu {})?),
    };

    Ok(RunSettings {
        dataset,
        configs,
        minimal_n_stop: !args.no_stop_n && config.minimal_n_stop.unwrap_or(true),
        parallel: args.parallel || config.parallel.unwrap_or(false),
        threads,
        first: args.first,
        skip_malformed: args.skip_malformed || config.skip_malformed.unwrap_or(false),
        prune_satisfied: args.prune_satisfied || config.prune_satisfied.unwrap_or(false),
        output_directory: args.out.clone().or_else(|| {
            config
                .output_directory
                .as_ref()
                .map(|d| relative_to_config(d, config_path))
        }),
        force: args.force,
        reference: args.reference.clone(),
        verbose: args.verbose,
    })
}

// Paths in a configuration file are relative to the file itself.
fn relative_to_config(path: &str, config_path: Option<&str>) -> String {
    let parent = config_path.and_then(|c| Path::new(c).parent());
    match parent {
        Some(dir) if Path::new(path).is_relative() => dir.join(path).display().to_string(),
        _ => path.to_string(),
    }
}

fn names<T>(all: &[T], name: impl Fn(&T) -> &'static str) -> String {
    all.iter().map(name).collect::<Vec<_>>().join(", ")
}

pub fn parse_scf(name: Option<&String>) -> ManipResult<SocialChoice> {
    match name {
        None => Ok(SocialChoice::Stv),
        Some(n) => SocialChoice::from_name(n).context(UnknownOptionSnafu {
            kind: "social choice function",
            name: n.clone(),
            expected: names(&SocialChoice::ALL, SocialChoice::name),
        }),
    }
}

pub fn parse_comparator(name: Option<&String>) -> ManipResult<RiskAttitude> {
    match name {
        None => Ok(RiskAttitude::Pessimistic),
        Some(n) => RiskAttitude::from_name(n).context(UnknownOptionSnafu {
            kind: "comparator",
            name: n.clone(),
            expected: names(&RiskAttitude::ALL, RiskAttitude::name),
        }),
    }
}

pub fn parse_generator(name: Option<&String>) -> ManipResult<CandidateGenerator> {
    match name {
        None => Ok(CandidateGenerator::CellPermutations),
        Some(n) => CandidateGenerator::from_name(n).context(UnknownOptionSnafu {
            kind: "generator",
            name: n.clone(),
            expected: names(&CandidateGenerator::ALL, CandidateGenerator::name),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn args(cmd: &[&str]) -> Args {
        Args::parse_from(std::iter::once("stvmanip").chain(cmd.iter().cloned()))
    }

    #[test]
    fn reads_camel_case_fields() {
        let js = r#"{"dataset": "pliny.toi", "scf": "plurality", "minimalNStop": false,
                     "outputDirectory": "out", "pruneSatisfied": true}"#;
        let config: RunConfig = serde_json::from_str(js).unwrap();
        assert_eq!(config.dataset.as_deref(), Some("pliny.toi"));
        assert_eq!(config.minimal_n_stop, Some(false));
        assert_eq!(config.prune_satisfied, Some(true));
        assert_eq!(config.comparator, None);
    }

    #[test]
    fn command_line_overrides_the_file() {
        let config = RunConfig {
            dataset: Some("pliny.toi".to_string()),
            scf: Some("plurality".to_string()),
            comparator: Some("optim".to_string()),
            output_directory: Some("out".to_string()),
            ..RunConfig::default()
        };
        let a = args(&["--comparator", "pessim", "--no-stop-n"]);
        let s = merge(&a, &config, Some("data/run.json")).unwrap();
        assert_eq!(s.dataset, Path::new("data").join("pliny.toi").display().to_string());
        assert_eq!(
            s.configs,
            vec![(
                SocialChoice::Plurality,
                RiskAttitude::Pessimistic,
                CandidateGenerator::CellPermutations
            )]
        );
        assert!(!s.minimal_n_stop);
        assert_eq!(
            s.output_directory,
            Some(Path::new("data").join("out").display().to_string())
        );
    }

    #[test]
    fn all_configs_covers_every_combination() {
        let a = args(&["--input", "x.toi", "--all-configs"]);
        let s = merge(&a, &RunConfig::default(), None).unwrap();
        assert_eq!(s.configs.len(), 8);
        assert!(s.minimal_n_stop);
        assert!(!s.verbose);
    }

    #[test]
    fn bad_options_are_reported() {
        let a = args(&["--input", "x.toi", "--scf", "borda"]);
        assert!(matches!(
            merge(&a, &RunConfig::default(), None),
            Err(ManipError::UnknownOption { .. })
        ));
        let a = args(&["--input", "x.toi", "--threads", "0"]);
        assert!(matches!(
            merge(&a, &RunConfig::default(), None),
            Err(ManipError::InvalidThreads { .. })
        ));
        assert!(matches!(
            merge(&args(&[]), &RunConfig::default(), None),
            Err(ManipError::MissingDataset { .. })
        ));
    }
}
