use crate::config::*;

/// Produces the rankings a coalition could submit instead of its truthful ranking.
///
/// Every call returns a fresh sequence; calling twice with the same inputs yields
/// the same rankings in the same order.
pub trait Generator {
    fn candidates(&self, election: &Election, truthful: &Ranking) -> Candidates;

    fn name(&self) -> &'static str;
}

impl Generator for CandidateGenerator {
    fn candidates(&self, election: &Election, truthful: &Ranking) -> Candidates {
        let cells: Vec<Cell> = match self {
            CandidateGenerator::CellPermutations => truthful.cells().to_vec(),
            CandidateGenerator::AllPermutations => election
                .alternatives()
                .into_iter()
                .map(Cell::singleton)
                .collect(),
        };
        Candidates {
            permutations: Permutations::new(cells),
        }
    }

    fn name(&self) -> &'static str {
        CandidateGenerator::name(self)
    }
}

/// A lazy sequence of candidate rankings.
#[derive(Debug, Clone)]
pub struct Candidates {
    permutations: Permutations<Cell>,
}

impl Iterator for Candidates {
    type Item = Ranking;

    fn next(&mut self) -> Option<Ranking> {
        // A reordering of valid cells is still a valid ranking.
        self.permutations.next().map(Ranking::from_cells_unchecked)
    }
}

/// All the orderings of a list of items, in lexicographic order of their positions.
///
/// The first ordering is the list itself. An empty list has no ordering.
#[derive(Debug, Clone)]
pub struct Permutations<T> {
    items: Vec<T>,
    indices: Vec<usize>,
    started: bool,
    done: bool,
}

impl<T: Clone> Permutations<T> {
    pub fn new(items: Vec<T>) -> Permutations<T> {
        let indices = (0..items.len()).collect();
        let done = items.is_empty();
        Permutations {
            items,
            indices,
            started: false,
            done,
        }
    }
}

impl<T: Clone> Iterator for Permutations<T> {
    type Item = Vec<T>;

    fn next(&mut self) -> Option<Vec<T>> {
        if self.done {
            return None;
        }
        if self.started {
            if !next_permutation(&mut self.indices) {
                self.done = true;
                return None;
            }
        } else {
            self.started = true;
        }
        Some(self.indices.iter().map(|&i| self.items[i].clone()).collect())
    }
}

// Rearranges into the next greater permutation. Returns false once the last one is reached.
fn next_permutation(v: &mut [usize]) -> bool {
    if v.len() < 2 {
        return false;
    }
    let mut i = v.len() - 1;
    while i > 0 && v[i - 1] >= v[i] {
        i -= 1;
    }
    if i == 0 {
        return false;
    }
    let mut j = v.len() - 1;
    while v[j] <= v[i - 1] {
        j -= 1;
    }
    v.swap(i - 1, j);
    v[i..].reverse();
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn election(lines: &[&str]) -> Election {
        lines.iter().map(|l| l.parse::<Profile>().unwrap()).collect()
    }

    fn strings(rankings: impl Iterator<Item = Ranking>) -> Vec<String> {
        rankings.map(|r| r.to_string()).collect()
    }

    #[test]
    fn permutations_are_lexicographic() {
        let perms: Vec<Vec<u32>> = Permutations::new(vec![1, 2, 3]).collect();
        assert_eq!(
            perms,
            vec![
                vec![1, 2, 3],
                vec![1, 3, 2],
                vec![2, 1, 3],
                vec![2, 3, 1],
                vec![3, 1, 2],
                vec![3, 2, 1]
            ]
        );
        assert_eq!(Permutations::new(vec![7]).count(), 1);
        assert_eq!(Permutations::new(Vec::<u32>::new()).count(), 0);
        assert_eq!(Permutations::new(vec![1, 2, 3, 4, 5]).count(), 120);
    }

    #[test]
    fn cell_permutations_keep_ties() {
        let e = election(&["3:1,{2,3},4"]);
        let truthful = e.profiles()[0].ranking();
        let cands = strings(CandidateGenerator::CellPermutations.candidates(&e, truthful));
        assert_eq!(cands.len(), 6);
        assert_eq!(cands[0], "1,{2,3},4");
        assert_eq!(cands[5], "4,{2,3},1");
        assert!(cands.iter().all(|c| c.contains("{2,3}")));
    }

    #[test]
    fn all_permutations_cover_the_election() {
        let e = election(&["3:1,{2,3}", "1:4"]);
        let truthful = e.profiles()[1].ranking();
        let cands: Vec<Ranking> = CandidateGenerator::AllPermutations
            .candidates(&e, truthful)
            .collect();
        assert_eq!(cands.len(), 24);
        assert_eq!(cands[0], Ranking::strict(&[1, 2, 3, 4]).unwrap());
        assert!(cands.iter().all(|c| c.cells().len() == 4));
    }

    #[test]
    fn empty_election_has_no_candidate() {
        let truthful = Ranking::strict(&[1, 2]).unwrap();
        let cands = CandidateGenerator::AllPermutations.candidates(&Election::default(), &truthful);
        assert_eq!(cands.count(), 0);
    }

    #[test]
    fn generators_restart() {
        let e = election(&["3:1,2,3", "2:3,1"]);
        let truthful = e.profiles()[0].ranking();
        for gen in CandidateGenerator::ALL {
            let first = strings(gen.candidates(&e, truthful));
            let second = strings(gen.candidates(&e, truthful));
            assert!(!first.is_empty());
            assert_eq!(first, second);
        }
    }
}
