//! Record persistence (§6 reuse rule): append-only, newline-delimited JSON,
//! one file per scenario/task pair, keyed by `hash.inputs` so re-runs can
//! skip existing cases without re-parsing every prior record's trajectory.

use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;

use crate::error::{ResultsError, ResultsResult};
use crate::record::BenchmarkRecord;

#[derive(Clone)]
pub struct RecordStore {
    root_dir: PathBuf,
}

impl RecordStore {
    pub fn new(root_dir: PathBuf) -> ResultsResult<Self> {
        if !root_dir.exists() {
            fs::create_dir_all(&root_dir)?;
        }
        Ok(Self { root_dir })
    }

    fn file_path(&self, scenario: &str, task: &str) -> PathBuf {
        self.root_dir.join(format!("{scenario}.{task}.jsonl"))
    }

    /// The set of `hash.inputs` values already persisted for this
    /// scenario/task pair (§6 reuse rule).
    pub fn existing_input_hashes(&self, scenario: &str, task: &str) -> ResultsResult<HashSet<String>> {
        let path = self.file_path(scenario, task);
        if !path.exists() {
            return Ok(HashSet::new());
        }
        let file = fs::File::open(&path)?;
        let mut hashes = HashSet::new();
        for line in BufReader::new(file).lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let record: BenchmarkRecord = serde_json::from_str(&line)?;
            hashes.insert(record.hash.inputs.clone());
        }
        Ok(hashes)
    }

    pub fn has_case(&self, scenario: &str, task: &str, input_hash: &str) -> ResultsResult<bool> {
        Ok(self.existing_input_hashes(scenario, task)?.contains(input_hash))
    }

    /// Appends one record. Per §6, `force=true` is the caller's explicit
    /// override for re-generating a case that already exists; this method
    /// itself never deduplicates — callers consult `has_case` first.
    pub fn append(&self, scenario: &str, task: &str, record: &BenchmarkRecord) -> ResultsResult<()> {
        let path = self.file_path(scenario, task);
        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        let line = serde_json::to_string(record)?;
        writeln!(file, "{line}")?;
        Ok(())
    }

    pub fn load_all(&self, scenario: &str, task: &str) -> ResultsResult<Vec<BenchmarkRecord>> {
        let path = self.file_path(scenario, task);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(&path)?;
        content
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(|l| serde_json::from_str(l).map_err(ResultsError::from))
            .collect()
    }

    pub fn find_by_record_hash(&self, scenario: &str, task: &str, record_hash: &str) -> ResultsResult<BenchmarkRecord> {
        self.load_all(scenario, task)?
            .into_iter()
            .find(|r| r.hash.record == record_hash)
            .ok_or_else(|| ResultsError::RecordNotFound { hash: record_hash.to_string() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::Environment;
    use crate::record::{HashBlock, Task, RECORD_SCHEMA_VERSION};
    use std::collections::BTreeMap;

    fn sample_record(input_hash: &str) -> BenchmarkRecord {
        BenchmarkRecord {
            version: RECORD_SCHEMA_VERSION,
            hash: HashBlock { inputs: input_hash.to_string(), record: "r".repeat(16) },
            environment: Environment::capture(),
            task: Task::Tsh,
            scenario: "s1".to_string(),
            grid: BTreeMap::new(),
            baseline: None,
            engine: None,
            failed: false,
        }
    }

    fn temp_dir(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("pd-results-test-{name}-{}", std::process::id()))
    }

    #[test]
    fn appended_records_are_found_by_input_hash() {
        let dir = temp_dir("append");
        let store = RecordStore::new(dir.clone()).unwrap();
        store.append("s1", "Tsh", &sample_record("abc123")).unwrap();

        let hashes = store.existing_input_hashes("s1", "Tsh").unwrap();
        assert!(hashes.contains("abc123"));
        assert!(store.has_case("s1", "Tsh", "abc123").unwrap());
        assert!(!store.has_case("s1", "Tsh", "nope").unwrap());

        fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn missing_scenario_file_reports_no_existing_cases() {
        let dir = temp_dir("missing");
        let store = RecordStore::new(dir.clone()).unwrap();
        assert!(store.existing_input_hashes("unknown", "Tsh").unwrap().is_empty());
        fs::remove_dir_all(dir).ok();
    }
}
