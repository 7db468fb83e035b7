// Reading datasets of weighted rankings, one `<count>:<ranking>` profile per line.

use std::fs;

use crate::manip::*;

/// A dataset loaded from disk.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Dataset {
    pub path: String,
    pub election: Election,
    /// The SHA-256 digest of the file contents.
    pub fingerprint: String,
    /// The line numbers that were ignored because they could not be read.
    pub skipped_lines: Vec<usize>,
}

pub fn read_dataset(path: &str, skip_malformed: bool) -> ManipResult<Dataset> {
    info!("read_dataset: reading {:?}", path);
    let contents = fs::read_to_string(path).context(OpeningFileSnafu { path })?;
    let (election, skipped_lines) = parse_dataset(&contents, skip_malformed)?;
    ensure!(!election.is_empty(), EmptyDatasetSnafu { path });
    info!(
        "read_dataset: {:?}: {} profiles, {} voters, {} alternatives",
        path,
        election.len(),
        election.total_weight(),
        election.alternatives().len()
    );
    Ok(Dataset {
        path: path.to_string(),
        election,
        fingerprint: sha256::digest(contents.as_str()),
        skipped_lines,
    })
}

pub fn parse_dataset(contents: &str, skip_malformed: bool) -> ManipResult<(Election, Vec<usize>)> {
    let mut profiles: Vec<Profile> = Vec::new();
    let mut skipped: Vec<usize> = Vec::new();
    for (idx, line) in contents.lines().enumerate() {
        // The line numbers start at 1 to match text editors.
        let lineno = idx + 1;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        match line.parse::<Profile>() {
            Ok(p) => {
                debug!("parse_dataset: line {}: {}", lineno, p);
                profiles.push(p);
            }
            Err(e) if skip_malformed => {
                warn!("parse_dataset: skipping line {}: {}", lineno, e);
                skipped.push(lineno);
            }
            Err(e) => return Err(e).context(DatasetLineSnafu { lineno }),
        }
    }
    Ok((Election::new(profiles), skipped))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PLINY: &str = "# Pliny's senate\n\n102:1,2,3\n101:2,1,3\n  100: 3, 2, 1\n";

    #[test]
    fn comments_and_blank_lines_are_ignored() {
        let (e, skipped) = parse_dataset(PLINY, false).unwrap();
        assert!(skipped.is_empty());
        let lines: Vec<String> = e.profiles().iter().map(|p| p.to_string()).collect();
        assert_eq!(lines, vec!["102:1,2,3", "101:2,1,3", "100:3,2,1"]);
    }

    #[test]
    fn reads_the_demo_dataset() {
        let path = format!("{}/demos/pliny.toi", env!("CARGO_MANIFEST_DIR"));
        let d = read_dataset(&path, false).unwrap();
        assert_eq!(d.election.total_weight(), 303);
        assert_eq!(d.fingerprint.len(), 64);
        assert!(matches!(
            read_dataset("no/such/file.toi", false),
            Err(ManipError::OpeningFile { .. })
        ));
    }

    #[test]
    fn malformed_line_reports_its_number() {
        let contents = "3:1,2\n\n4:1,{2\n";
        match parse_dataset(contents, false) {
            Err(ManipError::DatasetLine { lineno, .. }) => assert_eq!(lineno, 3),
            x => panic!("unexpected result {:?}", x),
        }
    }

    #[test]
    fn malformed_lines_can_be_skipped() {
        let contents = "3:1,2\n0:2,1\nfoo\n2:2,1\n";
        let (e, skipped) = parse_dataset(contents, true).unwrap();
        assert_eq!(e.len(), 2);
        assert_eq!(e.total_weight(), 5);
        assert_eq!(skipped, vec![2, 3]);
    }
}
