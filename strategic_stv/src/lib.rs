mod config;

pub mod builder;
pub mod comparator;
pub mod generator;
pub mod manipulation;
pub mod manual;

use log::debug;
use num::{BigInt, BigRational, ToPrimitive, Zero};
use snafu::{ensure, OptionExt};

use std::{
    borrow::Cow,
    collections::{BTreeMap, BTreeSet},
};

pub use crate::comparator::Comparator;
pub use crate::config::*;
pub use crate::generator::{Candidates, Generator};
pub use crate::manipulation::{
    search, try_candidate, BranchPrune, ManipulationConfig, ManipulationRecord, ResultsSummary,
    Search, SearchError,
};

/// The score of an alternative in one round.
///
/// Scores are exact fractions: a voter who ties `k` alternatives at the top
/// gives `1/k` of a vote to each of them.
pub type Score = BigRational;

/// A social choice function: maps an election to its winners.
pub trait Tabulator {
    fn tabulate(&self, election: &Election) -> Result<Outcome, VotingError>;

    /// A short label for reports and configuration names.
    fn name(&self) -> &'static str;
}

impl Tabulator for SocialChoice {
    fn tabulate(&self, election: &Election) -> Result<Outcome, VotingError> {
        match self {
            SocialChoice::Stv => crate::tabulate(election),
            SocialChoice::Plurality => crate::plurality(election),
        }
    }

    fn name(&self) -> &'static str {
        SocialChoice::name(self)
    }
}

/// Statistics for one round of elimination.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct RoundStats {
    pub round: u32,
    /// The score of every alternative still running, in increasing identifier order.
    pub tally: Vec<(Alternative, Score)>,
    /// The alternatives with the lowest score in this round. In the last round,
    /// these are the winners.
    pub eliminated: Outcome,
}

impl RoundStats {
    /// The tally converted to floating point numbers, for display.
    pub fn tally_f64(&self) -> Vec<(Alternative, f64)> {
        self.tally
            .iter()
            .map(|(a, s)| (*a, s.to_f64().unwrap_or(f64::NAN)))
            .collect()
    }
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct TabulationResult {
    pub winners: Outcome,
    pub round_stats: Vec<RoundStats>,
}

// **** Scoring ****

/// Computes the first-preference score of every alternative in `active`.
///
/// Each profile gives its weight to the alternatives of its top cell, split evenly
/// when several of them are tied. Alternatives without any vote are present with a
/// score of zero.
pub fn first_preference_scores(
    election: &Election,
    active: &BTreeSet<Alternative>,
) -> Result<BTreeMap<Alternative, Score>, VotingError> {
    ensure!(!active.is_empty(), EmptyAlternativeSetSnafu);
    // Initialize the tally with all the active alternatives to capture the ones who do
    // not even have a vote.
    let mut tally: BTreeMap<Alternative, Score> =
        active.iter().map(|a| (*a, Score::zero())).collect();
    for p in election.profiles() {
        let top = p.ranking().top();
        let share = Score::new(BigInt::from(p.weight()), BigInt::from(top.len()));
        for a in top.iter() {
            if let Some(score) = tally.get_mut(a) {
                *score += &share;
            }
        }
    }
    Ok(tally)
}

fn find_lowest(tally: &BTreeMap<Alternative, Score>) -> Result<Outcome, VotingError> {
    let min_score = tally.values().min().context(EmptyAlternativeSetSnafu)?;
    Ok(tally
        .iter()
        .filter_map(|(a, s)| if s == min_score { Some(*a) } else { None })
        .collect())
}

// **** Social choice functions ****

/// Runs the elimination procedure and returns the winners.
///
/// See [run_elimination] for the details.
pub fn tabulate(election: &Election) -> Result<Outcome, VotingError> {
    run_elimination(election).map(|res| res.winners)
}

/// Runs the elimination procedure on an election.
///
/// Each round scores the alternatives still running and removes all the ones sharing
/// the lowest score from every ranking. The procedure stops when every remaining
/// alternative has the lowest score: they are the winners, and more than one of them
/// means the tie could not be broken.
///
/// The election passed in is not modified.
pub fn run_elimination(election: &Election) -> Result<TabulationResult, VotingError> {
    let all_alternatives = election.alternatives();
    ensure!(!all_alternatives.is_empty(), EmptyAlternativeSetSnafu);
    debug!(
        "run_elimination: {} profiles, {} votes, alternatives: {:?}",
        election.len(),
        election.total_weight(),
        all_alternatives
    );

    // Every round removes at least one alternative.
    let max_rounds = all_alternatives.len();
    let mut cur_votes: Cow<'_, Election> = Cow::Borrowed(election);
    let mut cur_alternatives = all_alternatives;
    let mut round_stats: Vec<RoundStats> = Vec::new();

    for round in 1..=max_rounds {
        let tally = first_preference_scores(&cur_votes, &cur_alternatives)?;
        let lowest = find_lowest(&tally)?;
        debug!(
            "run_elimination: round {}: tally: {:?} lowest: {:?}",
            round, tally, lowest
        );
        let finished = lowest.len() == cur_alternatives.len();
        round_stats.push(RoundStats {
            round: round as u32,
            tally: tally.into_iter().collect(),
            eliminated: lowest.clone(),
        });

        if finished {
            debug!("run_elimination: winners: {:?}", lowest);
            return Ok(TabulationResult {
                winners: lowest,
                round_stats,
            });
        }

        cur_votes = Cow::Owned(cur_votes.without_alternatives(&lowest));
        cur_alternatives = cur_alternatives.difference(&lowest).cloned().collect();
    }
    NoConvergenceSnafu { rounds: max_rounds }.fail()
}

/// Plurality: the alternatives with the highest first-preference score, without
/// any elimination.
pub fn plurality(election: &Election) -> Result<Outcome, VotingError> {
    let tally = first_preference_scores(election, &election.alternatives())?;
    let max_score = tally.values().max().context(EmptyAlternativeSetSnafu)?;
    Ok(tally
        .iter()
        .filter_map(|(a, s)| if s == max_score { Some(*a) } else { None })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn election(lines: &[&str]) -> Election {
        lines.iter().map(|l| l.parse::<Profile>().unwrap()).collect()
    }

    fn outcome(ids: &[u32]) -> Outcome {
        ids.iter().map(|id| Alternative(*id)).collect()
    }

    #[test]
    fn scores_split_ties_and_include_unvoted() {
        let e = election(&["10:{1,2},3", "5:3,1", "1:{1,2,3}"]);
        let tally = first_preference_scores(&e, &e.alternatives()).unwrap();
        let third = Score::new(BigInt::from(1), BigInt::from(3));
        assert_eq!(tally[&Alternative(1)], Score::from_integer(BigInt::from(5)) + &third);
        assert_eq!(tally[&Alternative(3)], Score::from_integer(BigInt::from(5)) + &third);

        let e2 = election(&["4:1,2", "3:1"]);
        let tally2 = first_preference_scores(&e2, &outcome(&[1, 2, 7])).unwrap();
        assert_eq!(tally2.len(), 3);
        assert!(tally2[&Alternative(2)].is_zero());
        assert!(tally2[&Alternative(7)].is_zero());
    }

    #[test]
    fn scores_conserve_the_weight() {
        let e = election(&["7:{1,2,3},4", "3:{2,4}", "11:4,1", "2:{1,2,3,4,5,6}"]);
        let tally = first_preference_scores(&e, &e.alternatives()).unwrap();
        let total: Score = tally.values().cloned().sum();
        assert_eq!(total, Score::from_integer(BigInt::from(e.total_weight())));
    }

    #[test]
    fn scores_need_alternatives() {
        let e = election(&["1:1"]);
        assert_eq!(
            first_preference_scores(&e, &BTreeSet::new()),
            Err(VotingError::EmptyAlternativeSet)
        );
    }

    #[test]
    fn single_profile_wins() {
        let e = election(&["10:1,2,3,4"]);
        assert_eq!(tabulate(&e).unwrap(), outcome(&[1]));
    }

    #[test]
    fn tied_last_places_are_eliminated_together() {
        let e = election(&["10:1,2,3,4", "10:2,1,3,4"]);
        let res = run_elimination(&e).unwrap();
        assert_eq!(res.winners, outcome(&[1, 2]));
        assert_eq!(res.round_stats.len(), 2);
        assert_eq!(res.round_stats[0].eliminated, outcome(&[3, 4]));
    }

    #[test]
    fn fractional_split_resolves_a_tie() {
        let e = election(&["10:1,2,3,4", "10:2,1,3,4", "5:3,{4,2},1"]);
        let res = run_elimination(&e).unwrap();
        assert_eq!(res.winners, outcome(&[2]));
        let eliminated: Vec<Outcome> = res.round_stats.iter().map(|r| r.eliminated.clone()).collect();
        assert_eq!(
            eliminated,
            vec![outcome(&[4]), outcome(&[3]), outcome(&[1]), outcome(&[2])]
        );
        // The input is left untouched.
        assert_eq!(e.profiles()[2].to_string(), "5:3,{2,4},1");
    }

    #[test]
    fn terminates_within_the_number_of_alternatives() {
        let e = election(&[
            "3:1,2,3,4,5,6",
            "3:2,3,1",
            "2:{4,5},6",
            "1:6,5,4",
            "4:3,1",
            "2:{1,2,3,4,5,6}",
        ]);
        let res = run_elimination(&e).unwrap();
        assert!(res.round_stats.len() <= e.alternatives().len());
        assert!(!res.winners.is_empty());
    }

    #[test]
    fn complete_tie_is_returned_whole() {
        let e = election(&["1:1,2", "1:2,3", "1:3,1"]);
        assert_eq!(tabulate(&e).unwrap(), outcome(&[1, 2, 3]));
    }

    #[test]
    fn empty_election_is_an_error() {
        let e = Election::default();
        assert_eq!(tabulate(&e), Err(VotingError::EmptyAlternativeSet));
        assert_eq!(plurality(&e), Err(VotingError::EmptyAlternativeSet));
    }

    #[test]
    fn plurality_uses_one_round() {
        let e = election(&["102:1,2,3", "101:2,1,3", "100:3,2,1"]);
        assert_eq!(plurality(&e).unwrap(), outcome(&[1]));
        assert_eq!(tabulate(&e).unwrap(), outcome(&[2]));
        assert_eq!(SocialChoice::Plurality.tabulate(&e).unwrap(), outcome(&[1]));

        let tied = election(&["2:1", "2:{2,3}", "1:3"]);
        assert_eq!(plurality(&tied).unwrap(), outcome(&[1, 3]));
    }
}
