//! Submission cleanup: removes everything but the entities themselves.
//!
//! Records lose `metadata` and `relations`; entities lose the `score` and
//! `source` bookkeeping the earlier stages carry.

use crate::config::OutputConfig;
use crate::io::{read_json, write_json};
use crate::model::PredictionSet;
use crate::{Result, SpanfuseError};
use std::fs;
use std::path::{Path, PathBuf};

/// Directory the submission branches publish into.
pub const DEFAULT_SUBMISSION_DIR: &str = "final_predictions";

/// Strip one prediction set.
pub fn strip_set(mut set: PredictionSet) -> PredictionSet {
    for record in set.values_mut() {
        record.metadata = None;
        record.relations = None;
        for entity in &mut record.entities {
            entity.score = None;
            entity.source = None;
        }
    }
    set
}

/// Strip a single prediction file in place. Returns the number of documents.
pub fn strip_file(path: impl AsRef<Path>, output: &OutputConfig) -> Result<usize> {
    let path = path.as_ref();
    let set: PredictionSet = read_json(path)?;
    let documents = set.len();
    write_json(path, &strip_set(set), output)?;
    tracing::debug!(path = %path.display(), documents, "stripped prediction file");
    Ok(documents)
}

/// Strip `path` in place: every `.json` file directly inside it if it is a
/// directory, or the file itself otherwise. Returns the files rewritten, sorted.
pub fn strip_path(path: impl AsRef<Path>, output: &OutputConfig) -> Result<Vec<PathBuf>> {
    let path = path.as_ref();
    let files = if path.is_dir() {
        json_files(path)?
    } else if path.is_file() {
        vec![path.to_path_buf()]
    } else {
        return Err(SpanfuseError::Io {
            path: path.display().to_string(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file or directory"),
        });
    };

    for file in &files {
        strip_file(file, output)?;
    }
    tracing::info!(path = %path.display(), files = files.len(), "stripped submission metadata");
    Ok(files)
}

fn json_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let io_err = |source| SpanfuseError::Io {
        path: dir.display().to_string(),
        source,
    };

    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(io_err)? {
        let path = entry.map_err(io_err)?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "json") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DocumentMetadata, DocumentRecord, Entity, Location};
    use tempfile::tempdir;

    fn sample() -> PredictionSet {
        let metadata = DocumentMetadata {
            title: "Gut".to_string(),
            abstract_text: "Lactobacillus".to_string(),
            annotator: Some("distant".to_string()),
            extra: Default::default(),
        };
        let entity = Entity {
            start_idx: 0,
            end_idx: 12,
            location: Location::Abstract,
            text_span: "Lactobacillus".to_string(),
            label: "bacteria".to_string(),
            score: Some(0.8),
            source: Some("model_1".to_string()),
        };
        PredictionSet::from([("99".to_string(), DocumentRecord::new(metadata, vec![entity]))])
    }

    #[test]
    fn stripped_set_has_only_entities() {
        let value = serde_json::to_value(strip_set(sample())).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "99": {
                    "entities": [{
                        "start_idx": 0,
                        "end_idx": 12,
                        "location": "abstract",
                        "text_span": "Lactobacillus",
                        "label": "bacteria"
                    }]
                }
            })
        );
    }

    #[test]
    fn strips_every_json_file_in_a_directory() {
        let dir = tempdir().unwrap();
        let output = OutputConfig::default();
        write_json(dir.path().join("b.json"), &sample(), &output).unwrap();
        write_json(dir.path().join("a.json"), &sample(), &output).unwrap();
        fs::write(dir.path().join("notes.txt"), "leave me").unwrap();

        let files = strip_path(dir.path(), &output).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|f| f.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.json", "b.json"]);

        let text = fs::read_to_string(dir.path().join("a.json")).unwrap();
        assert!(!text.contains("metadata"));
        assert!(!text.contains("score"));
        assert_eq!(fs::read_to_string(dir.path().join("notes.txt")).unwrap(), "leave me");
    }

    #[test]
    fn strips_a_single_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("only.json");
        write_json(&path, &sample(), &OutputConfig::default()).unwrap();
        assert_eq!(strip_path(&path, &OutputConfig::default()).unwrap(), vec![path.clone()]);

        let set: PredictionSet = read_json(&path).unwrap();
        assert!(set["99"].metadata.is_none());
    }

    #[test]
    fn missing_path_is_an_io_error() {
        let err = strip_path("/no/such/dir", &OutputConfig::default()).unwrap_err();
        assert!(matches!(err, SpanfuseError::Io { .. }));
    }
}
