pub use crate::config::*;

/// A builder for assembling an election.
///
/// ```
/// use strategic_stv::builder::Builder;
/// use strategic_stv::*;
///
/// let mut builder = Builder::new();
/// builder.add_strict(&[1, 2, 3], 102)?;
/// builder.add_line("101:2,1,3")?;
/// builder.add_profile(&[vec![3], vec![1, 2]], 100)?;
/// let election = builder.build()?;
///
/// assert_eq!(election.total_weight(), 303);
/// assert_eq!(tabulate(&election)?, Outcome::from([Alternative(1)]));
/// # Ok::<(), VotingError>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct Builder {
    pub(crate) _profiles: Vec<Profile>,
}

impl Builder {
    pub fn new() -> Builder {
        Builder::default()
    }

    /// Adds `weight` voters ranking the given cells, best first.
    pub fn add_profile(&mut self, cells: &[Vec<u32>], weight: u64) -> Result<(), VotingError> {
        let ranking = Ranking::from_lists(cells)?;
        self.push(Profile::new(ranking, weight)?);
        Ok(())
    }

    /// Adds `weight` voters with a ranking without ties.
    pub fn add_strict(&mut self, ids: &[u32], weight: u64) -> Result<(), VotingError> {
        let ranking = Ranking::strict(ids)?;
        self.push(Profile::new(ranking, weight)?);
        Ok(())
    }

    /// Adds a profile written as `<count>:<ranking>`.
    pub fn add_line(&mut self, line: &str) -> Result<(), VotingError> {
        let profile: Profile = line.parse()?;
        self.push(profile);
        Ok(())
    }

    /// Adds a profile that was already validated.
    pub fn push(&mut self, profile: Profile) {
        self._profiles.push(profile);
    }

    /// The election, with the profiles in insertion order.
    ///
    /// Fails if no profile was added.
    pub fn build(self) -> Result<Election, VotingError> {
        if self._profiles.is_empty() {
            return EmptyAlternativeSetSnafu.fail();
        }
        Ok(Election::new(self._profiles))
    }
}
