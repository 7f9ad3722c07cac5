use super::Model;
use crate::{Error, Result};
use std::{
    path::{Path, PathBuf},
    sync::Arc,
};
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

/// Outcome of listing the model directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelCandidates {
    /// The artifact that will be loaded.
    pub selected: Option<PathBuf>,
    /// Further non-hidden files, ignored.
    pub others: Vec<PathBuf>,
    pub skipped_dotfiles: Vec<PathBuf>,
}

/// Finds, deserializes and caches the single model artifact.
///
/// The first successful load is kept for the life of the loader. Failures
/// are not cached, so the next caller retries from scratch.
pub struct ModelLoader {
    dir: PathBuf,
    model: OnceCell<Arc<Model>>,
}

impl ModelLoader {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            model: OnceCell::new(),
        }
    }

    /// A loader that is already populated; never touches the filesystem.
    pub fn with_model(model: Model) -> Self {
        Self {
            dir: PathBuf::new(),
            model: OnceCell::new_with(Some(Arc::new(model))),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn is_loaded(&self) -> bool {
        self.model.initialized()
    }

    pub async fn get_model(&self) -> Result<Arc<Model>> {
        self.model
            .get_or_try_init(|| self.load())
            .await
            .map(Arc::clone)
    }

    /// Lists regular files in the model directory, setting dotfiles aside.
    /// Candidates are taken in lexicographic order.
    pub async fn scan(&self) -> Result<ModelCandidates> {
        let mut entries = tokio::fs::read_dir(&self.dir)
            .await
            .map_err(|e| self.listing_error(e))?;

        let mut candidates = Vec::new();
        let mut skipped_dotfiles = Vec::new();

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| self.listing_error(e))?
        {
            let path = entry.path();
            // Follows symlinks, so a linked artifact still counts as a file.
            match tokio::fs::metadata(&path).await {
                Ok(meta) if meta.is_file() => {}
                _ => continue,
            }

            if entry.file_name().to_string_lossy().starts_with('.') {
                warn!(
                    "Ignoring dotfile '{}' found in model directory - please exclude dotfiles from model archives",
                    path.display()
                );
                skipped_dotfiles.push(path);
            } else {
                candidates.push(path);
            }
        }

        candidates.sort();
        skipped_dotfiles.sort();

        let mut candidates = candidates.into_iter();
        Ok(ModelCandidates {
            selected: candidates.next(),
            others: candidates.collect(),
            skipped_dotfiles,
        })
    }

    fn listing_error(&self, e: std::io::Error) -> Error {
        Error::model_load(format!(
            "cannot list model directory {}: {}",
            self.dir.display(),
            e
        ))
    }

    async fn load(&self) -> Result<Arc<Model>> {
        debug!("Loading model from {}", self.dir.display());

        let candidates = self.scan().await?;
        let path = candidates.selected.ok_or_else(|| {
            Error::model_load(format!(
                "no model artifact found in {}",
                self.dir.display()
            ))
        })?;

        if !candidates.others.is_empty() {
            warn!(
                "Model directory holds {} artifacts, using {}",
                candidates.others.len() + 1,
                path.display()
            );
        }

        let bytes = tokio::fs::read(&path).await.map_err(|e| {
            Error::model_load(format!("cannot read {}: {}", path.display(), e))
        })?;

        let model = Model::from_slice(&bytes).map_err(|e| match e {
            Error::ModelLoad(msg) => Error::model_load(format!("{}: {}", path.display(), msg)),
            other => other,
        })?;

        info!(
            "Loaded {} model from {} ({} features)",
            model.kind(),
            path.display(),
            model.num_features()
        );

        Ok(Arc::new(model))
    }
}
