// Writing the results of a search to disk.
//
// The results are stored in the following hierarchy within the output directory:
// - <dataset name>
//   - <configuration name>[__no-stop-n]
//     - results.json
//     - summary.json

use std::fs;
use std::path::{Path, PathBuf};

use crate::manip::*;

pub const RESULTS_NAME: &str = "results.json";
pub const SUMMARY_NAME: &str = "summary.json";

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ResultsExporter {
    pub out_dir: PathBuf,
}

impl ResultsExporter {
    pub fn new(out_dir: &str) -> ResultsExporter {
        ResultsExporter {
            out_dir: PathBuf::from(out_dir),
        }
    }

    pub fn dir_for(&self, dataset: &str, config: &ManipulationConfig) -> PathBuf {
        let dataset_name = Path::new(dataset)
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "dataset".to_string());
        let suffix = if config.minimal_n_stop() {
            ""
        } else {
            "__no-stop-n"
        };
        self.out_dir
            .join(dataset_name)
            .join(format!("{}{}", config.name(), suffix))
    }

    pub fn result_exists(&self, dataset: &str, config: &ManipulationConfig) -> bool {
        self.dir_for(dataset, config).exists()
    }

    pub fn save(
        &self,
        dataset: &str,
        config: &ManipulationConfig,
        results: &JSValue,
        summary: &JSValue,
    ) -> ManipResult<PathBuf> {
        let dir = self.dir_for(dataset, config);
        fs::create_dir_all(&dir).context(WritingFileSnafu {
            path: dir.display().to_string(),
        })?;
        write_json(&dir.join(RESULTS_NAME), results)?;
        write_json(&dir.join(SUMMARY_NAME), summary)?;
        info!("ResultsExporter: results written to {}", dir.display());
        Ok(dir)
    }

    /// The summary written by a previous run of the same configuration.
    pub fn load_summary(&self, dataset: &str, config: &ManipulationConfig) -> ManipResult<JSValue> {
        let path = self.dir_for(dataset, config).join(SUMMARY_NAME);
        read_json(&path.display().to_string())
    }
}

fn write_json(path: &Path, js: &JSValue) -> ManipResult<()> {
    let contents = serde_json::to_string_pretty(js).context(ParsingJsonSnafu {})?;
    fs::write(path, contents).context(WritingFileSnafu {
        path: path.display().to_string(),
    })
}

pub fn read_json(path: &str) -> ManipResult<JSValue> {
    let contents = fs::read_to_string(path).context(OpeningFileSnafu { path })?;
    let js: JSValue = serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu {})?;
    Ok(js)
}
