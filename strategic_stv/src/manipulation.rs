//! Search for strategic manipulations.
//!
//! A coalition is the block of voters sharing one truthful profile. For every
//! coalition and every candidate ranking produced by the configured generator, the
//! search lets 1, 2, ... voters of the coalition submit the candidate instead of their
//! truthful ranking, tabulates the modified election and keeps the cases in which the
//! coalition strictly prefers the new outcome.

use std::cmp::Ordering;
use std::collections::{BTreeSet, VecDeque};
use std::fmt;
use std::num::NonZeroUsize;
use std::sync::Arc;

use log::{debug, info};
use rayon::prelude::*;
use snafu::{ResultExt, Snafu};

use crate::comparator::Comparator;
use crate::config::*;
use crate::generator::{Candidates, Generator};
use crate::Tabulator;

#[derive(Debug, Snafu)]
pub enum SearchError {
    #[snafu(display("search failed for coalition {coalition} switching to {candidate}"))]
    Unit {
        coalition: usize,
        candidate: Ranking,
        source: VotingError,
    },
    #[snafu(display("could not start the worker pool"))]
    ThreadPool { source: rayon::ThreadPoolBuildError },
}

type PruneFn = dyn Fn(&ManipulationConfig, usize) -> bool + Send + Sync;

/// A named predicate deciding which coalitions are not searched.
///
/// It receives the configuration and the index of the coalition, and returns true
/// to skip it.
#[derive(Clone)]
pub struct BranchPrune {
    name: String,
    predicate: Arc<PruneFn>,
}

impl BranchPrune {
    pub fn new<F>(name: impl Into<String>, predicate: F) -> BranchPrune
    where
        F: Fn(&ManipulationConfig, usize) -> bool + Send + Sync + 'static,
    {
        BranchPrune {
            name: name.into(),
            predicate: Arc::new(predicate),
        }
    }

    /// Skips the coalitions that already have every true winner in their top rank.
    ///
    /// Such a coalition cannot strictly improve its outcome, whatever its attitude to
    /// risk.
    pub fn already_satisfied() -> BranchPrune {
        BranchPrune::new("already-satisfied", |conf, coalition| {
            conf.election()
                .profiles()
                .get(coalition)
                .map(|p| {
                    let top = p.ranking().top();
                    conf.true_outcome().iter().all(|a| top.contains(a))
                })
                .unwrap_or(false)
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn skips(&self, config: &ManipulationConfig, coalition: usize) -> bool {
        (self.predicate)(config, coalition)
    }
}

impl fmt::Debug for BranchPrune {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("BranchPrune").field(&self.name).finish()
    }
}

/// The configuration of a manipulation search.
///
/// The truthful outcome is computed once, when the configuration is created.
///
/// ```
/// use strategic_stv::*;
///
/// let election: Election = ["102:1,2,3", "101:2,1,3", "100:3,2,1"]
///     .iter()
///     .map(|l| l.parse::<Profile>())
///     .collect::<Result<_, _>>()?;
/// let config = ManipulationConfig::new(
///     election,
///     SocialChoice::Plurality,
///     RiskAttitude::Pessimistic,
///     CandidateGenerator::CellPermutations,
/// )?;
/// assert_eq!(config.name(), "plurality_pessim_perm");
///
/// let first = search(&config).next().unwrap().unwrap();
/// assert_eq!(first.to.to_string(), "2,3,1");
/// assert_eq!(first.switched, 2);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone)]
pub struct ManipulationConfig {
    election: Election,
    scf: SocialChoice,
    comparator: RiskAttitude,
    generator: CandidateGenerator,
    alternatives: BTreeSet<Alternative>,
    true_outcome: Outcome,
    minimal_n_stop: bool,
    parallel: bool,
    num_threads: Option<NonZeroUsize>,
    branch_prune: Option<BranchPrune>,
}

impl ManipulationConfig {
    pub fn new(
        election: Election,
        scf: SocialChoice,
        comparator: RiskAttitude,
        generator: CandidateGenerator,
    ) -> Result<ManipulationConfig, VotingError> {
        let true_outcome = scf.tabulate(&election)?;
        let alternatives = election.alternatives();
        info!(
            "ManipulationConfig: {}_{}_{}: {} profiles, true outcome: {}",
            scf.name(),
            comparator.name(),
            generator.name(),
            election.len(),
            format_outcome(&true_outcome)
        );
        Ok(ManipulationConfig {
            election,
            scf,
            comparator,
            generator,
            alternatives,
            true_outcome,
            minimal_n_stop: true,
            parallel: false,
            num_threads: None,
            branch_prune: None,
        })
    }

    /// If true (the default), the search for one candidate ranking stops at the
    /// smallest number of switching voters that succeeds. Otherwise every larger
    /// successful number is reported too.
    pub fn with_minimal_n_stop(self, minimal_n_stop: bool) -> ManipulationConfig {
        ManipulationConfig {
            minimal_n_stop,
            ..self
        }
    }

    pub fn with_parallel(self, parallel: bool) -> ManipulationConfig {
        ManipulationConfig { parallel, ..self }
    }

    /// The number of workers in parallel mode. Defaults to the number of cores.
    pub fn with_num_threads(self, num_threads: Option<NonZeroUsize>) -> ManipulationConfig {
        ManipulationConfig {
            num_threads,
            ..self
        }
    }

    pub fn with_branch_prune(self, branch_prune: Option<BranchPrune>) -> ManipulationConfig {
        ManipulationConfig {
            branch_prune,
            ..self
        }
    }

    pub fn election(&self) -> &Election {
        &self.election
    }

    pub fn scf(&self) -> SocialChoice {
        self.scf
    }

    pub fn comparator(&self) -> RiskAttitude {
        self.comparator
    }

    pub fn generator(&self) -> CandidateGenerator {
        self.generator
    }

    pub fn alternatives(&self) -> &BTreeSet<Alternative> {
        &self.alternatives
    }

    pub fn true_outcome(&self) -> &Outcome {
        &self.true_outcome
    }

    pub fn minimal_n_stop(&self) -> bool {
        self.minimal_n_stop
    }

    pub fn is_parallel(&self) -> bool {
        self.parallel
    }

    pub fn num_threads(&self) -> Option<NonZeroUsize> {
        self.num_threads
    }

    pub fn branch_prune(&self) -> Option<&BranchPrune> {
        self.branch_prune.as_ref()
    }

    /// `<scf>_<comparator>_<generator>`, for example `stv_optim_perm`.
    pub fn name(&self) -> String {
        format!(
            "{}_{}_{}",
            self.scf.name(),
            self.comparator.name(),
            self.generator.name()
        )
    }

    /// A description of the configuration, one `key\t=\tvalue` line per setting.
    pub fn summary(&self) -> String {
        let threads = match (self.parallel, self.num_threads) {
            (false, _) => 0,
            (true, Some(n)) => n.get(),
            (true, None) => rayon::current_num_threads(),
        };
        format!(
            "total_votes\t=\t{}\n\
             scf\t=\t{}\n\
             comparator\t=\t{}\n\
             generator\t=\t{}\n\
             true_outcome\t=\t{}\n\
             all_alts\t=\t{}\n\
             minimal_n_stop\t=\t{}\n\
             threads\t=\t{}\n\
             branch_prune\t=\t{}\n",
            self.election.total_weight(),
            self.scf.name(),
            self.comparator.name(),
            self.generator.name(),
            format_outcome(&self.true_outcome),
            format_outcome(&self.alternatives),
            self.minimal_n_stop,
            threads,
            self.branch_prune
                .as_ref()
                .map(|bp| bp.name())
                .unwrap_or("None"),
        )
    }
}

/// A successful manipulation.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ManipulationRecord {
    /// The index of the coalition's profile in the truthful election.
    pub coalition: usize,
    /// The truthful ranking of the coalition.
    pub from: Ranking,
    /// The ranking submitted instead.
    pub to: Ranking,
    /// How many voters of the coalition switched.
    pub switched: u64,
    pub original_outcome: Outcome,
    pub new_outcome: Outcome,
    /// The election that produced the new outcome.
    ///
    /// The coalition's profile is replaced by the switched voters, followed by the voters
    /// who kept their truthful ranking. Identical rankings are not merged.
    pub new_election: Election,
}

/// Tries one candidate ranking for one coalition, with an increasing number of
/// switching voters.
///
/// The iterator is empty if no number of switchers leads to a better outcome.
pub fn try_candidate(
    config: &ManipulationConfig,
    coalition: usize,
    candidate: Ranking,
) -> UnitSearch<'_> {
    UnitSearch {
        config,
        coalition,
        candidate,
        next_switched: 1,
        finished: false,
    }
}

/// The search for one (coalition, candidate) pair. See [try_candidate].
#[derive(Debug)]
pub struct UnitSearch<'a> {
    config: &'a ManipulationConfig,
    coalition: usize,
    candidate: Ranking,
    next_switched: u64,
    finished: bool,
}

impl<'a> Iterator for UnitSearch<'a> {
    type Item = Result<ManipulationRecord, SearchError>;

    fn next(&mut self) -> Option<Self::Item> {
        let config = self.config;
        let truthful = config.election.profiles().get(self.coalition)?;
        while !self.finished && self.next_switched <= truthful.weight() {
            let switched = self.next_switched;
            self.next_switched += 1;

            let new_election =
                config
                    .election
                    .with_switched_coalition(self.coalition, &self.candidate, switched);
            let new_outcome = match config.scf.tabulate(&new_election).context(UnitSnafu {
                coalition: self.coalition,
                candidate: self.candidate.clone(),
            }) {
                Ok(o) => o,
                Err(e) => {
                    self.finished = true;
                    return Some(Err(e));
                }
            };

            let cmp = config.comparator.compare(
                truthful.ranking(),
                &config.true_outcome,
                &new_outcome,
                &config.alternatives,
            );
            if cmp == Ordering::Greater {
                debug!(
                    "UnitSearch: coalition {} ({}): {} voters switching to {} get {}",
                    self.coalition,
                    truthful,
                    switched,
                    self.candidate,
                    format_outcome(&new_outcome)
                );
                if config.minimal_n_stop {
                    self.finished = true;
                }
                return Some(Ok(ManipulationRecord {
                    coalition: self.coalition,
                    from: truthful.ranking().clone(),
                    to: self.candidate.clone(),
                    switched,
                    original_outcome: config.true_outcome.clone(),
                    new_outcome,
                    new_election,
                }));
            }
        }
        self.finished = true;
        None
    }
}

/// The number of units handed to each worker of the pool at a time in parallel mode.
const UNITS_PER_THREAD: usize = 8;

/// Runs the search described by the configuration.
///
/// The search is lazy: work is only done when the next record is requested, and
/// dropping the iterator stops it. After an error, the iterator ends.
///
/// Records come by coalition, then by candidate in generation order, then by increasing
/// number of switchers. In parallel mode, candidates are pulled from the generator in
/// small batches and each batch is evaluated on a worker pool owned by the iterator, so
/// the memory used does not depend on the number of candidates.
pub fn search(config: &ManipulationConfig) -> Search<'_> {
    info!(
        "search: {} over {} coalitions ({} mode)",
        config.name(),
        config.election.len(),
        if config.parallel {
            "parallel"
        } else {
            "sequential"
        }
    );
    let mut pending = VecDeque::new();
    let mut pool = None;
    if config.parallel {
        let mut builder = rayon::ThreadPoolBuilder::new();
        if let Some(num_threads) = config.num_threads {
            info!("search: spawning {} threads", num_threads);
            builder = builder.num_threads(num_threads.get());
        }
        match builder.build().context(ThreadPoolSnafu) {
            Ok(p) => pool = Some(p),
            Err(e) => pending.push_back(Err(e)),
        }
    }
    Search {
        config,
        next_coalition: 0,
        candidates: None,
        unit: None,
        pool,
        pending,
        failed: false,
    }
}

/// The lazy sequence of records returned by [search].
pub struct Search<'a> {
    config: &'a ManipulationConfig,
    next_coalition: usize,
    // The coalition being searched and its remaining candidates.
    candidates: Option<(usize, Candidates)>,
    // Sequential mode: the candidate being tried.
    unit: Option<UnitSearch<'a>>,
    // Parallel mode: the workers and the results of the last batch.
    pool: Option<rayon::ThreadPool>,
    pending: VecDeque<Result<ManipulationRecord, SearchError>>,
    failed: bool,
}

impl<'a> Search<'a> {
    /// The number of results computed in advance and not returned yet.
    ///
    /// Always 0 in sequential mode. In parallel mode, it is bounded by the size of one
    /// batch of candidates (times the coalition size without the minimal-n stop).
    pub fn buffered(&self) -> usize {
        self.pending.len()
    }

    fn pull_coalition(&mut self) -> Option<usize> {
        let config = self.config;
        while self.next_coalition < config.election.len() {
            let coalition = self.next_coalition;
            self.next_coalition += 1;
            if let Some(bp) = &config.branch_prune {
                if bp.skips(config, coalition) {
                    debug!("search: {} skips coalition {}", bp.name(), coalition);
                    continue;
                }
            }
            info!(
                "search: coalition {}/{}",
                coalition + 1,
                config.election.len()
            );
            return Some(coalition);
        }
        None
    }

    // Moves to the next coalition that is not pruned. Returns false when there is none.
    fn start_next_coalition(&mut self) -> bool {
        let config = self.config;
        match self.pull_coalition() {
            Some(coalition) => {
                let truthful = config.election.profiles()[coalition].ranking();
                self.candidates = Some((
                    coalition,
                    config.generator.candidates(&config.election, truthful),
                ));
                true
            }
            None => false,
        }
    }

    // Evaluates the next batch of candidates of the current coalition on the pool. The
    // records are queued in generation order, up to the first failed unit. Returns false
    // once the coalition has no candidate left.
    fn run_batch_parallel(&mut self) -> bool {
        let config = self.config;
        let (pool, (coalition, candidates)) = match (&self.pool, self.candidates.as_mut()) {
            (Some(pool), Some(current)) => (pool, current),
            _ => return false,
        };
        let coalition = *coalition;
        let batch: Vec<Ranking> = candidates
            .by_ref()
            .take(pool.current_num_threads() * UNITS_PER_THREAD)
            .collect();
        if batch.is_empty() {
            return false;
        }
        debug!(
            "run_batch_parallel: coalition {}: {} candidates",
            coalition,
            batch.len()
        );
        let results: Vec<Result<Vec<ManipulationRecord>, SearchError>> = pool.install(|| {
            batch
                .into_par_iter()
                .map(|candidate| {
                    try_candidate(config, coalition, candidate).collect::<Result<Vec<_>, _>>()
                })
                .collect()
        });
        for unit in results {
            match unit {
                Ok(records) => self.pending.extend(records.into_iter().map(Ok)),
                Err(e) => {
                    self.pending.push_back(Err(e));
                    break;
                }
            }
        }
        true
    }
}

impl<'a> Iterator for Search<'a> {
    type Item = Result<ManipulationRecord, SearchError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(item) = self.pending.pop_front() {
                if item.is_err() {
                    self.failed = true;
                    self.pending.clear();
                }
                return Some(item);
            }
            if self.failed {
                return None;
            }

            if self.pool.is_some() {
                if !self.run_batch_parallel() {
                    self.candidates = None;
                    if !self.start_next_coalition() {
                        return None;
                    }
                }
                continue;
            }

            if let Some(unit) = self.unit.as_mut() {
                if let Some(item) = unit.next() {
                    if item.is_err() {
                        self.failed = true;
                    }
                    return Some(item);
                }
                self.unit = None;
            }

            if let Some((coalition, candidates)) = self.candidates.as_mut() {
                if let Some(candidate) = candidates.next() {
                    self.unit = Some(try_candidate(self.config, *coalition, candidate));
                    continue;
                }
                self.candidates = None;
            }

            if !self.start_next_coalition() {
                return None;
            }
        }
    }
}

/// Counts over a list of records.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct ResultsSummary {
    pub count: usize,
    /// Distinct truthful rankings that could manipulate.
    pub distinct_from: usize,
    /// Distinct rankings used to manipulate.
    pub distinct_to: usize,
    pub distinct_from_to: usize,
}

impl ResultsSummary {
    pub fn from_records(records: &[ManipulationRecord]) -> ResultsSummary {
        let from: BTreeSet<&Ranking> = records.iter().map(|r| &r.from).collect();
        let to: BTreeSet<&Ranking> = records.iter().map(|r| &r.to).collect();
        let from_to: BTreeSet<(&Ranking, &Ranking)> =
            records.iter().map(|r| (&r.from, &r.to)).collect();
        ResultsSummary {
            count: records.len(),
            distinct_from: from.len(),
            distinct_to: to.len(),
            distinct_from_to: from_to.len(),
        }
    }

    pub fn to_text(&self) -> String {
        format!(
            "count\t=\t{}\nn_from\t=\t{}\nn_to\t=\t{}\nn_from_to\t=\t{}\n",
            self.count, self.distinct_from, self.distinct_to, self.distinct_from_to
        )
    }
}
