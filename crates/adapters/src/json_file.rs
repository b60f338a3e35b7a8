//! JSON file input and output for post records

use poem_enricher_domain::RawPost;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

#[derive(Debug, thiserror::Error)]
pub enum JsonFileError {
    #[error("File not found: {0}")]
    NotFound(PathBuf),
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl JsonFileError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        if source.kind() == std::io::ErrorKind::NotFound {
            JsonFileError::NotFound(path.to_path_buf())
        } else {
            JsonFileError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    }
}

/// An input file holds a list of posts or a single post
#[derive(Deserialize)]
#[serde(untagged)]
enum PostFile {
    Many(Vec<RawPost>),
    One(RawPost),
}

/// Read raw posts from a JSON file
pub async fn load_posts(path: &Path) -> Result<Vec<RawPost>, JsonFileError> {
    let contents = fs::read_to_string(path)
        .await
        .map_err(|e| JsonFileError::io(path, e))?;

    let posts = match serde_json::from_str::<PostFile>(&contents) {
        Ok(PostFile::Many(posts)) => posts,
        Ok(PostFile::One(post)) => vec![post],
        Err(source) => {
            return Err(JsonFileError::Json {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    tracing::info!(path = %path.display(), count = posts.len(), "Loaded posts");
    Ok(posts)
}

/// Write records as one pretty-printed JSON array, replacing the file
pub async fn write_json<T: Serialize>(path: &Path, records: &[T]) -> Result<(), JsonFileError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| JsonFileError::io(parent, e))?;
        }
    }

    let mut body = serde_json::to_string_pretty(records).map_err(|source| JsonFileError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    body.push('\n');

    fs::write(path, body)
        .await
        .map_err(|e| JsonFileError::io(path, e))?;

    tracing::info!(path = %path.display(), count = records.len(), "Wrote JSON file");
    Ok(())
}
