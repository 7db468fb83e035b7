use std::cmp::Ordering;
use std::collections::BTreeSet;

use crate::config::*;

/// Judges whether a proposed outcome is better than the current one for a voter.
pub trait Comparator {
    /// Returns `Greater` if `proposed` is better than `current` according to `voter`,
    /// `Less` if it is worse and `Equal` if the voter is indifferent.
    fn compare(
        &self,
        voter: &Ranking,
        current: &Outcome,
        proposed: &Outcome,
        alternatives: &BTreeSet<Alternative>,
    ) -> Ordering;

    fn name(&self) -> &'static str;
}

impl RiskAttitude {
    /// The rank a voter attaches to an outcome.
    ///
    /// Alternatives the voter did not rank count as 0, and so does an empty outcome.
    pub fn outcome_rank(&self, voter: &Ranking, outcome: &Outcome) -> usize {
        let ranks = outcome.iter().map(|a| voter.rank_of(*a));
        let aggregate = match self {
            RiskAttitude::Optimistic => ranks.max(),
            RiskAttitude::Pessimistic => ranks.min(),
        };
        aggregate.unwrap_or(0)
    }
}

impl Comparator for RiskAttitude {
    fn compare(
        &self,
        voter: &Ranking,
        current: &Outcome,
        proposed: &Outcome,
        _alternatives: &BTreeSet<Alternative>,
    ) -> Ordering {
        self.outcome_rank(voter, proposed)
            .cmp(&self.outcome_rank(voter, current))
    }

    fn name(&self) -> &'static str {
        RiskAttitude::name(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(ids: &[u32]) -> Outcome {
        ids.iter().map(|id| Alternative(*id)).collect()
    }

    #[test]
    fn same_outcome_is_indifferent() {
        let voter = Ranking::from_lists(&[vec![3], vec![1, 2], vec![4]]).unwrap();
        let alts = outcome(&[1, 2, 3, 4, 5]);
        for attitude in RiskAttitude::ALL {
            for o in [outcome(&[1]), outcome(&[2, 3]), outcome(&[5]), outcome(&[1, 4, 5])] {
                assert_eq!(attitude.compare(&voter, &o, &o, &alts), Ordering::Equal);
            }
        }
    }

    #[test]
    fn optimistic_looks_at_the_best_winner() {
        let voter = Ranking::strict(&[3, 2, 1]).unwrap();
        let alts = outcome(&[1, 2, 3]);
        let cmp = RiskAttitude::Optimistic;
        assert_eq!(
            cmp.compare(&voter, &outcome(&[1]), &outcome(&[1, 2]), &alts),
            Ordering::Greater
        );
        assert_eq!(
            cmp.compare(&voter, &outcome(&[1, 3]), &outcome(&[2]), &alts),
            Ordering::Less
        );
        assert_eq!(
            cmp.compare(&voter, &outcome(&[2]), &outcome(&[1, 2]), &alts),
            Ordering::Equal
        );
    }

    #[test]
    fn pessimistic_looks_at_the_worst_winner() {
        let voter = Ranking::strict(&[3, 2, 1]).unwrap();
        let alts = outcome(&[1, 2, 3]);
        let cmp = RiskAttitude::Pessimistic;
        assert_eq!(
            cmp.compare(&voter, &outcome(&[1]), &outcome(&[1, 2]), &alts),
            Ordering::Equal
        );
        assert_eq!(
            cmp.compare(&voter, &outcome(&[1]), &outcome(&[2]), &alts),
            Ordering::Greater
        );
        assert_eq!(
            cmp.compare(&voter, &outcome(&[2]), &outcome(&[2, 3, 1]), &alts),
            Ordering::Less
        );
    }

    #[test]
    fn foreign_alternatives_rank_zero() {
        let voter = Ranking::strict(&[1, 2]).unwrap();
        let alts = outcome(&[1, 2, 7]);
        assert_eq!(RiskAttitude::Optimistic.outcome_rank(&voter, &outcome(&[7])), 0);
        assert_eq!(RiskAttitude::Pessimistic.outcome_rank(&voter, &outcome(&[1, 7])), 0);
        assert_eq!(RiskAttitude::Optimistic.outcome_rank(&voter, &outcome(&[1, 7])), 2);
        assert_eq!(RiskAttitude::Optimistic.outcome_rank(&voter, &Outcome::new()), 0);
        assert_eq!(
            RiskAttitude::Pessimistic.compare(&voter, &outcome(&[7]), &outcome(&[2]), &alts),
            Ordering::Greater
        );
    }
}
