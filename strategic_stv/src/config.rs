// ********* Input data structures ***********

use std::collections::BTreeSet;
use std::fmt::{self, Display};
use std::str::FromStr;

use snafu::{ensure, OptionExt, Snafu};

/// An alternative (a candidate or an option) that voters can rank.
///
/// Identifiers are strictly positive.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Ord, PartialOrd)]
pub struct Alternative(pub u32);

impl Display for Alternative {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A group of alternatives that a voter ranks at the same level.
// Invariant: never empty.
#[derive(Eq, PartialEq, Debug, Clone, Hash, Ord, PartialOrd)]
pub struct Cell(BTreeSet<Alternative>);

impl Cell {
    pub fn new(alternatives: &[Alternative]) -> Result<Cell, VotingError> {
        ensure!(
            !alternatives.is_empty(),
            InvalidRankingSnafu {
                reason: "a rank cannot be empty"
            }
        );
        let set: BTreeSet<Alternative> = alternatives.iter().cloned().collect();
        ensure!(
            set.len() == alternatives.len(),
            InvalidRankingSnafu {
                reason: format!("duplicate alternative in tied group {:?}", alternatives)
            }
        );
        Ok(Cell(set))
    }

    pub fn singleton(alternative: Alternative) -> Cell {
        Cell([alternative].into_iter().collect())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, alternative: &Alternative) -> bool {
        self.0.contains(alternative)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Alternative> {
        self.0.iter()
    }
}

impl Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.len() == 1 {
            write!(f, "{}", join(self.0.iter()))
        } else {
            write!(f, "{{{}}}", join(self.0.iter()))
        }
    }
}

/// The full preference order of a voter, most preferred first.
///
/// Alternatives sharing a [Cell] are tied. An alternative appears at most once
/// in the whole ranking, and a ranking always has at least one cell.
#[derive(Eq, PartialEq, Debug, Clone, Hash, Ord, PartialOrd)]
pub struct Ranking {
    cells: Vec<Cell>,
}

impl Ranking {
    pub fn new(cells: Vec<Cell>) -> Result<Ranking, VotingError> {
        ensure!(
            !cells.is_empty(),
            InvalidRankingSnafu {
                reason: "a ranking needs at least one alternative"
            }
        );
        let mut seen: BTreeSet<Alternative> = BTreeSet::new();
        for a in cells.iter().flat_map(|c| c.iter()) {
            ensure!(
                seen.insert(*a),
                InvalidRankingSnafu {
                    reason: format!("alternative {} is ranked more than once", a)
                }
            );
        }
        Ok(Ranking { cells })
    }

    /// Builds a ranking from nested lists of identifiers, each inner list being one rank.
    ///
    /// `&[vec![1], vec![4, 2], vec![3]]` stands for `1 > 2 = 4 > 3`.
    pub fn from_lists(lists: &[Vec<u32>]) -> Result<Ranking, VotingError> {
        let mut cells: Vec<Cell> = Vec::new();
        for l in lists.iter() {
            let alts = l
                .iter()
                .map(|id| alternative_from_id(*id))
                .collect::<Result<Vec<_>, _>>()?;
            cells.push(Cell::new(&alts)?);
        }
        Ranking::new(cells)
    }

    /// A ranking without any tie.
    pub fn strict(ids: &[u32]) -> Result<Ranking, VotingError> {
        let lists: Vec<Vec<u32>> = ids.iter().map(|id| vec![*id]).collect();
        Ranking::from_lists(&lists)
    }

    // Only for orderings of cells that already satisfy the invariants.
    pub(crate) fn from_cells_unchecked(cells: Vec<Cell>) -> Ranking {
        Ranking { cells }
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    /// The most preferred cell.
    pub fn top(&self) -> &Cell {
        // Non-empty by construction.
        &self.cells[0]
    }

    pub fn alternatives(&self) -> BTreeSet<Alternative> {
        self.cells.iter().flat_map(|c| c.iter().cloned()).collect()
    }

    /// The rank of an alternative, counted from the bottom.
    ///
    /// The top cell has the value of the number of cells, the bottom cell has 1.
    /// Alternatives that do not appear in this ranking have rank 0.
    pub fn rank_of(&self, alternative: Alternative) -> usize {
        let n_cells = self.cells.len();
        self.cells
            .iter()
            .position(|c| c.contains(&alternative))
            .map(|idx| n_cells - idx)
            .unwrap_or(0)
    }

    /// Removes the given alternatives and returns a new ranking.
    ///
    /// Cells that become empty are dropped. Returns None if nothing is left.
    pub fn without(&self, removed: &BTreeSet<Alternative>) -> Option<Ranking> {
        let cells: Vec<Cell> = self
            .cells
            .iter()
            .filter_map(|c| {
                let rest: BTreeSet<Alternative> = c.0.difference(removed).cloned().collect();
                if rest.is_empty() {
                    None
                } else {
                    Some(Cell(rest))
                }
            })
            .collect();
        if cells.is_empty() {
            None
        } else {
            Some(Ranking { cells })
        }
    }
}

impl Display for Ranking {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", join(self.cells.iter()))
    }
}

/// Parses the textual ballot notation: `1,2,{3,4}` means 1 first, then 2,
/// then 3 and 4 tied.
impl FromStr for Ranking {
    type Err = VotingError;

    fn from_str(s: &str) -> Result<Ranking, VotingError> {
        let mut lists: Vec<Vec<u32>> = Vec::new();
        let mut rest = s.trim();
        ensure!(
            !rest.is_empty(),
            MalformedBallotSnafu {
                input: s,
                reason: "empty ranking"
            }
        );
        while !rest.is_empty() {
            let (group, tail) = if let Some(inner) = rest.strip_prefix('{') {
                let close = inner.find('}').context(MalformedBallotSnafu {
                    input: s,
                    reason: "unclosed '{'",
                })?;
                (&inner[..close], &inner[close + 1..])
            } else {
                match rest.find(',') {
                    Some(idx) => (&rest[..idx], &rest[idx..]),
                    None => (rest, ""),
                }
            };
            let ids = group
                .split(',')
                .map(|token| parse_id(token, s))
                .collect::<Result<Vec<u32>, VotingError>>()?;
            lists.push(ids);

            let tail = tail.trim_start();
            rest = match tail.strip_prefix(',') {
                Some(next) => {
                    ensure!(
                        !next.trim().is_empty(),
                        MalformedBallotSnafu {
                            input: s,
                            reason: "trailing ','"
                        }
                    );
                    next.trim_start()
                }
                None => {
                    ensure!(
                        tail.is_empty(),
                        MalformedBallotSnafu {
                            input: s,
                            reason: format!("expected ',' before '{}'", tail)
                        }
                    );
                    tail
                }
            };
        }
        Ranking::from_lists(&lists)
    }
}

fn parse_id(token: &str, input: &str) -> Result<u32, VotingError> {
    let token = token.trim();
    token
        .parse::<u32>()
        .ok()
        .filter(|id| *id > 0)
        .context(MalformedBallotSnafu {
            input,
            reason: format!("'{}' is not a positive alternative identifier", token),
        })
}

fn alternative_from_id(id: u32) -> Result<Alternative, VotingError> {
    ensure!(
        id > 0,
        InvalidRankingSnafu {
            reason: "alternative identifiers start at 1"
        }
    );
    Ok(Alternative(id))
}

/// A ranking submitted by a block of voters.
#[derive(Eq, PartialEq, Debug, Clone, Hash)]
pub struct Profile {
    ranking: Ranking,
    // Guaranteed to never be zero at construction.
    weight: u64,
}

impl Profile {
    pub fn new(ranking: Ranking, weight: u64) -> Result<Profile, VotingError> {
        ensure!(
            weight > 0,
            ZeroWeightSnafu {
                ranking: ranking.to_string()
            }
        );
        Ok(Profile { ranking, weight })
    }

    pub fn ranking(&self) -> &Ranking {
        &self.ranking
    }

    /// The number of voters who submitted this ranking.
    pub fn weight(&self) -> u64 {
        self.weight
    }
}

impl Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.weight, self.ranking)
    }
}

/// Parses a `<count>:<ranking>` line, for example `12:3,{1,2}`.
impl FromStr for Profile {
    type Err = VotingError;

    fn from_str(s: &str) -> Result<Profile, VotingError> {
        let (count, ranking) = s.split_once(':').context(MalformedBallotSnafu {
            input: s,
            reason: "expected '<count>:<ranking>'",
        })?;
        let count = count.trim();
        let weight = count.parse::<u64>().ok().context(MalformedBallotSnafu {
            input: s,
            reason: format!("'{}' is not a voter count", count),
        })?;
        Profile::new(ranking.parse()?, weight)
    }
}

/// All the ballots of an election, as an ordered list of profiles.
///
/// The same ranking may appear in several profiles.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct Election {
    profiles: Vec<Profile>,
}

impl Election {
    pub fn new(profiles: Vec<Profile>) -> Election {
        Election { profiles }
    }

    pub fn profiles(&self) -> &[Profile] {
        &self.profiles
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    pub fn total_weight(&self) -> u64 {
        self.profiles.iter().map(|p| p.weight).sum()
    }

    /// Every alternative ranked by at least one profile.
    pub fn alternatives(&self) -> BTreeSet<Alternative> {
        self.profiles
            .iter()
            .flat_map(|p| p.ranking.cells.iter().flat_map(|c| c.iter().cloned()))
            .collect()
    }

    /// A new election in which the given alternatives have been struck from every ranking.
    ///
    /// Profiles left without any alternative are dropped.
    pub fn without_alternatives(&self, removed: &BTreeSet<Alternative>) -> Election {
        let profiles = self
            .profiles
            .iter()
            .filter_map(|p| {
                p.ranking.without(removed).map(|ranking| Profile {
                    ranking,
                    weight: p.weight,
                })
            })
            .collect();
        Election { profiles }
    }

    /// A new election in which `switched` voters of the profile at index `coalition`
    /// submit `candidate` instead of their truthful ranking.
    ///
    /// The coalition's profile is removed, and the switched block is appended, followed
    /// by the voters who kept their truthful ranking (if any).
    pub(crate) fn with_switched_coalition(
        &self,
        coalition: usize,
        candidate: &Ranking,
        switched: u64,
    ) -> Election {
        let mut profiles = self.profiles.clone();
        let truthful = profiles.remove(coalition);
        debug_assert!(switched > 0 && switched <= truthful.weight);
        profiles.push(Profile {
            ranking: candidate.clone(),
            weight: switched,
        });
        if switched < truthful.weight {
            profiles.push(Profile {
                ranking: truthful.ranking,
                weight: truthful.weight - switched,
            });
        }
        Election { profiles }
    }
}

impl FromIterator<Profile> for Election {
    fn from_iter<I: IntoIterator<Item = Profile>>(iter: I) -> Election {
        Election::new(iter.into_iter().collect())
    }
}

// ******** Output data structures *********

/// The winners of an election. More than one element means an unresolved tie.
pub type Outcome = BTreeSet<Alternative>;

/// Writes an outcome as `{1,2}`.
pub fn format_outcome(outcome: &Outcome) -> String {
    format!("{{{}}}", join(outcome.iter()))
}

fn join<T: Display>(items: impl Iterator<Item = T>) -> String {
    items.map(|x| x.to_string()).collect::<Vec<_>>().join(",")
}

/// Errors that prevent building ballots or tabulating an election.
#[derive(Eq, PartialEq, Debug, Clone, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum VotingError {
    #[snafu(display("cannot tabulate without any alternative"))]
    EmptyAlternativeSet,
    #[snafu(display("tabulation did not converge after {rounds} rounds"))]
    NoConvergence { rounds: usize },
    #[snafu(display("malformed ballot '{input}': {reason}"))]
    MalformedBallot { input: String, reason: String },
    #[snafu(display("invalid ranking: {reason}"))]
    InvalidRanking { reason: String },
    #[snafu(display("profile with ranking {ranking} has no voter"))]
    ZeroWeight { ranking: String },
}

// ********* Configuration **********

/// The social choice functions that map an election to its winners.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum SocialChoice {
    /// Repeated elimination of every last-placed alternative.
    Stv,
    /// One round of (split) first preferences.
    Plurality,
}

/// How a voter judges a tied outcome.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum RiskAttitude {
    /// Only the best alternative of the outcome matters.
    Optimistic,
    /// Only the worst alternative of the outcome matters.
    Pessimistic,
}

/// The rankings a coalition may submit instead of its truthful one.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum CandidateGenerator {
    /// Every reordering of the cells of the truthful ranking.
    CellPermutations,
    /// Every strict order over all the alternatives of the election.
    AllPermutations,
}

impl SocialChoice {
    pub const ALL: [SocialChoice; 2] = [SocialChoice::Stv, SocialChoice::Plurality];

    pub fn name(&self) -> &'static str {
        match self {
            SocialChoice::Stv => "stv",
            SocialChoice::Plurality => "plurality",
        }
    }

    pub fn from_name(name: &str) -> Option<SocialChoice> {
        SocialChoice::ALL.into_iter().find(|x| x.name() == name)
    }
}

impl RiskAttitude {
    pub const ALL: [RiskAttitude; 2] = [RiskAttitude::Optimistic, RiskAttitude::Pessimistic];

    pub fn name(&self) -> &'static str {
        match self {
            RiskAttitude::Optimistic => "optim",
            RiskAttitude::Pessimistic => "pessim",
        }
    }

    pub fn from_name(name: &str) -> Option<RiskAttitude> {
        RiskAttitude::ALL.into_iter().find(|x| x.name() == name)
    }
}

impl CandidateGenerator {
    pub const ALL: [CandidateGenerator; 2] = [
        CandidateGenerator::CellPermutations,
        CandidateGenerator::AllPermutations,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            CandidateGenerator::CellPermutations => "perm",
            CandidateGenerator::AllPermutations => "perm-all",
        }
    }

    pub fn from_name(name: &str) -> Option<CandidateGenerator> {
        CandidateGenerator::ALL.into_iter().find(|x| x.name() == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alts(ids: &[u32]) -> BTreeSet<Alternative> {
        ids.iter().map(|id| Alternative(*id)).collect()
    }

    #[test]
    fn parse_ranking_with_ties() {
        let r: Ranking = "1,2,{3,4}".parse().unwrap();
        assert_eq!(
            r,
            Ranking::from_lists(&[vec![1], vec![2], vec![3, 4]]).unwrap()
        );
        assert_eq!(r.to_string(), "1,2,{3,4}");
    }

    #[test]
    fn parse_ranking_tolerates_spaces() {
        let r: Ranking = " { 4 , 2 } , 1 ".parse().unwrap();
        assert_eq!(r, Ranking::from_lists(&[vec![2, 4], vec![1]]).unwrap());
    }

    #[test]
    fn parse_profile_line() {
        let p: Profile = "12:3,{1,2}".parse().unwrap();
        assert_eq!(p.weight(), 12);
        assert_eq!(p.ranking().to_string(), "3,{1,2}");
        assert_eq!(p.to_string(), "12:3,{1,2}");
    }

    #[test]
    fn malformed_inputs() {
        for s in ["", "1,,2", "1,{2,3", "a,b", "1,2,", "0,1", "{1}{2}"] {
            let res = s.parse::<Ranking>();
            assert!(
                matches!(res, Err(VotingError::MalformedBallot { .. })),
                "{:?} -> {:?}",
                s,
                res
            );
        }
        assert!(matches!(
            "12 3,4".parse::<Profile>(),
            Err(VotingError::MalformedBallot { .. })
        ));
        assert!(matches!(
            "x:3,4".parse::<Profile>(),
            Err(VotingError::MalformedBallot { .. })
        ));
    }

    #[test]
    fn duplicates_and_zero_weight_are_rejected() {
        assert!(matches!(
            "1,2,1".parse::<Ranking>(),
            Err(VotingError::InvalidRanking { .. })
        ));
        assert!(matches!(
            "{3,3}".parse::<Ranking>(),
            Err(VotingError::InvalidRanking { .. })
        ));
        assert!(matches!(
            "0:1,2".parse::<Profile>(),
            Err(VotingError::ZeroWeight { .. })
        ));
    }

    #[test]
    fn rank_of_counts_from_the_bottom() {
        let r = Ranking::from_lists(&[vec![1], vec![2, 3], vec![4]]).unwrap();
        assert_eq!(r.rank_of(Alternative(1)), 3);
        assert_eq!(r.rank_of(Alternative(2)), 2);
        assert_eq!(r.rank_of(Alternative(3)), 2);
        assert_eq!(r.rank_of(Alternative(4)), 1);
        assert_eq!(r.rank_of(Alternative(9)), 0);
    }

    #[test]
    fn removing_alternatives_leaves_the_source_untouched() {
        let r = Ranking::from_lists(&[vec![1], vec![2, 3], vec![4]]).unwrap();
        let r2 = r.without(&alts(&[2, 3])).unwrap();
        assert_eq!(r2, Ranking::strict(&[1, 4]).unwrap());
        assert_eq!(r.to_string(), "1,{2,3},4");
        assert_eq!(r.without(&alts(&[1, 2, 3, 4])), None);
    }

    #[test]
    fn elimination_drops_emptied_profiles() {
        let e: Election = ["10:1,2", "5:3", "2:{3,4},1"]
            .iter()
            .map(|s| s.parse::<Profile>().unwrap())
            .collect();
        assert_eq!(e.total_weight(), 17);
        assert_eq!(e.alternatives(), alts(&[1, 2, 3, 4]));
        let e2 = e.without_alternatives(&alts(&[3]));
        assert_eq!(e2.len(), 2);
        assert_eq!(e2.total_weight(), 12);
        assert_eq!(e2.profiles()[1].to_string(), "2:4,1");
        assert_eq!(e.len(), 3);
    }

    #[test]
    fn switched_coalition_splits_the_profile() {
        let e: Election = ["102:1,2,3", "101:2,1,3", "100:3,2,1"]
            .iter()
            .map(|s| s.parse::<Profile>().unwrap())
            .collect();
        let candidate = Ranking::strict(&[2, 3, 1]).unwrap();
        let e2 = e.with_switched_coalition(2, &candidate, 2);
        let lines: Vec<String> = e2.profiles().iter().map(|p| p.to_string()).collect();
        assert_eq!(lines, vec!["102:1,2,3", "101:2,1,3", "2:2,3,1", "98:3,2,1"]);
        assert_eq!(e2.total_weight(), e.total_weight());

        let e3 = e.with_switched_coalition(2, &candidate, 100);
        assert_eq!(e3.len(), 3);
        assert_eq!(e3.profiles()[2].to_string(), "100:2,3,1");
    }

    #[test]
    fn names_round_trip() {
        for scf in SocialChoice::ALL {
            assert_eq!(SocialChoice::from_name(scf.name()), Some(scf));
        }
        assert_eq!(
            CandidateGenerator::from_name("perm-all"),
            Some(CandidateGenerator::AllPermutations)
        );
        assert_eq!(RiskAttitude::from_name("neutral"), None);
    }
}
