use log::{debug, info, warn};

use snafu::{prelude::*, Snafu};
use strategic_stv::*;

use std::time::Instant;

use serde_json::json;
use serde_json::Value as JSValue;
use text_diff::print_diff;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::args::Args;
use crate::manip::config_reader::*;
use crate::manip::export::*;
use crate::manip::io_toi::*;

pub mod config_reader;
pub mod export;
pub mod io_toi;

#[derive(Debug, Snafu)]
pub enum ManipError {
    #[snafu(display("Error opening file {path}"))]
    OpeningFile {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error writing {path}"))]
    WritingFile {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error reading or writing JSON"))]
    ParsingJson { source: serde_json::Error },
    #[snafu(display("Line {lineno} of the dataset could not be read"))]
    DatasetLine { lineno: usize, source: VotingError },
    #[snafu(display("The dataset {path} contains no profile"))]
    EmptyDataset { path: String },
    #[snafu(display("No dataset: pass --input or a configuration file with a dataset"))]
    MissingDataset {},
    #[snafu(display("Unknown {kind} '{name}', expected one of: {expected}"))]
    UnknownOption {
        kind: String,
        name: String,
        expected: String,
    },
    #[snafu(display("The number of threads must be at least 1"))]
    InvalidThreads {},
    #[snafu(display("Could not tabulate the dataset"))]
    Voting { source: VotingError },
    #[snafu(display("The search failed"))]
    Search { source: SearchError },
    #[snafu(display("Could not format the time"))]
    FormattingTime { source: time::error::Format },
    #[snafu(display("No configuration named {name} was run to compare with the reference"))]
    MissingReferenceRun { name: String },
    #[snafu(display("Difference detected between the results and the reference {path}"))]
    ReferenceMismatch { path: String },

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

pub type ManipResult<T> = Result<T, ManipError>;

fn outcome_to_json(outcome: &Outcome) -> JSValue {
    json!(outcome.iter().map(|a| a.0).collect::<Vec<u32>>())
}

fn election_to_json(election: &Election) -> JSValue {
    json!(election
        .profiles()
        .iter()
        .map(|p| p.to_string())
        .collect::<Vec<String>>())
}

fn records_to_json(records: &[ManipulationRecord]) -> JSValue {
    let l: Vec<JSValue> = records
        .iter()
        .map(|r| {
            json!({
                "coalition": r.coalition,
                "from": r.from.to_string(),
                "to": r.to.to_string(),
                "n": r.switched,
                "originalOutcome": outcome_to_json(&r.original_outcome),
                "newOutcome": outcome_to_json(&r.new_outcome),
                "newElection": election_to_json(&r.new_election),
            })
        })
        .collect();
    JSValue::Array(l)
}

fn config_to_json(config: &ManipulationConfig) -> JSValue {
    json!({
        "name": config.name(),
        "totalVotes": config.election().total_weight(),
        "scf": config.scf().name(),
        "comparator": config.comparator().name(),
        "generator": config.generator().name(),
        "trueOutcome": outcome_to_json(config.true_outcome()),
        "alternatives": outcome_to_json(config.alternatives()),
        "minimalNStop": config.minimal_n_stop(),
        "branchPrune": config.branch_prune().map(|bp| bp.name().to_string()),
    })
}

/// When a search ran.
#[derive(PartialEq, Debug, Clone)]
struct ExecInfo {
    start: OffsetDateTime,
    end: OffsetDateTime,
    duration_secs: f64,
}

fn build_summary_js(
    dataset: &Dataset,
    config: &ManipulationConfig,
    records: &[ManipulationRecord],
    exec: &ExecInfo,
) -> ManipResult<JSValue> {
    let rs = ResultsSummary::from_records(records);
    info!("results for {}:\n{}", config.name(), rs.to_text());
    Ok(json!({
        "config": config_to_json(config),
        "results": {
            "count": rs.count,
            "distinctFrom": rs.distinct_from,
            "distinctTo": rs.distinct_to,
            "distinctFromTo": rs.distinct_from_to,
        },
        "dataset": {
            "path": dataset.path,
            "sha256": dataset.fingerprint,
            "profiles": dataset.election.len(),
            "skippedLines": dataset.skipped_lines,
        },
        "execution": {
            "start": exec.start.format(&Rfc3339).context(FormattingTimeSnafu {})?,
            "end": exec.end.format(&Rfc3339).context(FormattingTimeSnafu {})?,
            "durationSeconds": exec.duration_secs,
            "threads": config.num_threads().map(|n| n.get()),
            "parallel": config.is_parallel(),
        }
    }))
}

// One line per round of the elimination: the score of every alternative still running
// and the ones eliminated.
fn recap_lines(result: &TabulationResult) -> Vec<String> {
    result
        .round_stats
        .iter()
        .map(|rs| {
            let tally = rs
                .tally_f64()
                .iter()
                .map(|(a, score)| format!("{}: {:.3}", a, score))
                .collect::<Vec<String>>()
                .join(", ");
            format!(
                "round {}: {} | lowest: {}",
                rs.round,
                tally,
                format_outcome(&rs.eliminated)
            )
        })
        .collect()
}

fn print_recap(dataset: &Dataset) -> ManipResult<()> {
    let result = run_elimination(&dataset.election).context(VotingSnafu {})?;
    info!("Recap of the truthful tabulation of {}:", dataset.path);
    for line in recap_lines(&result) {
        info!("  {}", line);
    }
    info!("  winners: {}", format_outcome(&result.winners));
    Ok(())
}

fn collect_records(
    config: &ManipulationConfig,
    first: bool,
) -> ManipResult<Vec<ManipulationRecord>> {
    let mut records: Vec<ManipulationRecord> = Vec::new();
    for r in search(config) {
        let record = r.context(SearchSnafu {})?;
        info!(
            "found: {} voters of coalition {} ({}) submit {}: {} -> {}",
            record.switched,
            record.coalition,
            record.from,
            record.to,
            format_outcome(&record.original_outcome),
            format_outcome(&record.new_outcome)
        );
        records.push(record);
        if first {
            break;
        }
    }
    Ok(records)
}

fn build_config(
    dataset: &Dataset,
    settings: &RunSettings,
    (scf, comparator, generator): (SocialChoice, RiskAttitude, CandidateGenerator),
) -> ManipResult<ManipulationConfig> {
    let branch_prune = if settings.prune_satisfied {
        Some(BranchPrune::already_satisfied())
    } else {
        None
    };
    let config = ManipulationConfig::new(dataset.election.clone(), scf, comparator, generator)
        .context(VotingSnafu {})?
        .with_minimal_n_stop(settings.minimal_n_stop)
        .with_parallel(settings.parallel)
        .with_num_threads(settings.threads)
        .with_branch_prune(branch_prune);
    Ok(config)
}

/// Runs one configuration and returns its summary.
fn run_config(
    dataset: &Dataset,
    settings: &RunSettings,
    config: &ManipulationConfig,
    exporter: Option<&ResultsExporter>,
) -> ManipResult<JSValue> {
    if let Some(exp) = exporter {
        if exp.result_exists(&dataset.path, config) && !settings.force {
            info!(
                "run_config: results for {} already exist in {}, skipping",
                config.name(),
                exp.dir_for(&dataset.path, config).display()
            );
            return exp.load_summary(&dataset.path, config);
        }
    }

    info!("run_config: starting {}:\n{}", config.name(), config.summary());
    let start = OffsetDateTime::now_utc();
    let timer = Instant::now();
    let records = collect_records(config, settings.first)?;
    let exec = ExecInfo {
        start,
        end: OffsetDateTime::now_utc(),
        duration_secs: timer.elapsed().as_secs_f64(),
    };

    let summary_js = build_summary_js(dataset, config, &records, &exec)?;
    match exporter {
        Some(exp) => {
            exp.save(&dataset.path, config, &records_to_json(&records), &summary_js)?;
        }
        None => {
            let pretty_js = serde_json::to_string_pretty(&summary_js).context(ParsingJsonSnafu {})?;
            println!("{}", pretty_js);
        }
    }
    Ok(summary_js)
}

// The parts of a summary that do not depend on when and where the search ran.
fn comparable_summary(summary: &JSValue) -> JSValue {
    json!({
        "config": summary["config"],
        "results": summary["results"],
    })
}

fn check_reference(reference_path: &str, summaries: &[JSValue]) -> ManipResult<()> {
    let reference = read_json(reference_path)?;
    let name = match reference["config"]["name"].as_str() {
        Some(n) => n.to_string(),
        None => whatever!("The reference {} has no configuration name", reference_path),
    };
    let computed = summaries
        .iter()
        .find(|s| s["config"]["name"].as_str() == Some(name.as_str()))
        .context(MissingReferenceRunSnafu { name })?;

    let pretty_ref =
        serde_json::to_string_pretty(&comparable_summary(&reference)).context(ParsingJsonSnafu {})?;
    let pretty_computed =
        serde_json::to_string_pretty(&comparable_summary(computed)).context(ParsingJsonSnafu {})?;
    if pretty_ref != pretty_computed {
        warn!("Found differences with the reference string");
        print_diff(pretty_ref.as_str(), pretty_computed.as_str(), "\n");
        return ReferenceMismatchSnafu {
            path: reference_path,
        }
        .fail();
    }
    info!("check_reference: results match {}", reference_path);
    Ok(())
}

pub fn run(args: &Args) -> ManipResult<()> {
    let settings = settings_from_args(args)?;
    debug!("run: settings: {:?}", settings);
    let dataset = read_dataset(&settings.dataset, settings.skip_malformed)?;
    if !dataset.skipped_lines.is_empty() {
        warn!(
            "run: {} malformed lines were skipped in {}",
            dataset.skipped_lines.len(),
            dataset.path
        );
    }
    if settings.verbose {
        print_recap(&dataset)?;
    }
    let exporter = settings
        .output_directory
        .as_deref()
        .map(ResultsExporter::new);

    let mut summaries: Vec<JSValue> = Vec::new();
    for combination in settings.configs.iter() {
        let config = build_config(&dataset, &settings, *combination)?;
        summaries.push(run_config(&dataset, &settings, &config, exporter.as_ref())?);
    }

    if let Some(reference_path) = &settings.reference {
        check_reference(reference_path, &summaries)?;
    }
    Ok(())
}
