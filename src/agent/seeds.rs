use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::posts::domain::PostText;

/// Corpus shipped with the binary.
pub const DEFAULT_SEEDS: &str = include_str!("../../seeds/seed-posts.json");

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SeedTemplate {
    pub topic: String,
    pub body: String,
}

#[derive(Debug, thiserror::Error)]
pub enum SeedError {
    #[error("Failed to read seed corpus {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Seed corpus is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Seed corpus is empty")]
    Empty,

    #[error("Seed template {index} is unusable: {reason}")]
    Malformed { index: usize, reason: String },
}

/// Load the agent's templates from `path`, or the built-in corpus.
pub fn load_seeds(path: Option<&Path>) -> Result<Vec<SeedTemplate>, SeedError> {
    match path {
        Some(path) => {
            let raw = std::fs::read_to_string(path).map_err(|source| SeedError::Read {
                path: path.to_path_buf(),
                source,
            })?;
            parse_seeds(&raw)
        }
        None => parse_seeds(DEFAULT_SEEDS),
    }
}

/// Every template must be postable as-is.
pub fn parse_seeds(raw: &str) -> Result<Vec<SeedTemplate>, SeedError> {
    let seeds: Vec<SeedTemplate> = serde_json::from_str(raw)?;
    if seeds.is_empty() {
        return Err(SeedError::Empty);
    }

    for (index, seed) in seeds.iter().enumerate() {
        PostText::for_create(&seed.topic, &seed.body).map_err(|e| SeedError::Malformed {
            index,
            reason: e.to_string(),
        })?;
    }

    Ok(seeds)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_corpus_loads() {
        let seeds = load_seeds(None).unwrap();
        assert!(seeds.len() >= 10);
    }

    #[test]
    fn reads_corpus_from_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("seeds.json");
        std::fs::write(&path, r#"[{"topic": "Hi", "body": "A seed from disk"}]"#).unwrap();

        let seeds = load_seeds(Some(&path)).unwrap();
        assert_eq!(
            seeds,
            vec![SeedTemplate {
                topic: "Hi".into(),
                body: "A seed from disk".into()
            }]
        );
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let tmp = tempfile::tempdir().unwrap();
        let result = load_seeds(Some(&tmp.path().join("absent.json")));
        assert!(matches!(result, Err(SeedError::Read { .. })));
    }

    #[test]
    fn rejects_unparsable_empty_and_malformed() {
        assert!(matches!(parse_seeds("not json"), Err(SeedError::Parse(_))));
        assert!(matches!(parse_seeds("[]"), Err(SeedError::Empty)));
        assert!(matches!(
            parse_seeds(r#"[{"topic": "ok", "body": "fine"}, {"topic": "", "body": "x"}]"#),
            Err(SeedError::Malformed { index: 1, .. })
        ));

        let long_body = format!(r#"[{{"topic": "t", "body": "{}"}}]"#, "b".repeat(181));
        assert!(matches!(
            parse_seeds(&long_body),
            Err(SeedError::Malformed { index: 0, .. })
        ));
    }
}
