use std::fmt;

use thiserror::Error;

/// Pipeline stage that raised an error. Shown in every user-facing message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Load,
    Assemble,
    Clean,
    Features,
    Split,
    Train,
    Evaluate,
    Predict,
    Report,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Stage::Load => "load",
            Stage::Assemble => "assemble",
            Stage::Clean => "clean",
            Stage::Features => "features",
            Stage::Split => "split",
            Stage::Train => "train",
            Stage::Evaluate => "evaluate",
            Stage::Predict => "predict",
            Stage::Report => "report",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("[{stage}] data integrity: {message}")]
    DataIntegrity { stage: Stage, message: String },

    #[error("[{stage}] missing label for {player} (season {season})")]
    MissingLabel {
        stage: Stage,
        player: String,
        season: i32,
    },

    #[error("[{stage}] model not ready: {message}")]
    ModelState { stage: Stage, message: String },

    #[error("failed to access {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("CSV error in {path}: {source}")]
    Csv { path: String, source: csv::Error },

    #[error("model artifact {path}: {source}")]
    Artifact {
        path: String,
        source: serde_json::Error,
    },

    #[error("workbook export failed: {0}")]
    Workbook(#[from] rust_xlsxwriter::XlsxError),

    #[error("configuration error: {0}")]
    Config(String),
}

impl PipelineError {
    pub fn integrity(stage: Stage, message: impl Into<String>) -> Self {
        PipelineError::DataIntegrity {
            stage,
            message: message.into(),
        }
    }

    pub fn missing_label(stage: Stage, player: &str, season: i32) -> Self {
        PipelineError::MissingLabel {
            stage,
            player: player.to_string(),
            season,
        }
    }

    pub fn model_state(stage: Stage, message: impl Into<String>) -> Self {
        PipelineError::ModelState {
            stage,
            message: message.into(),
        }
    }

    pub fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        PipelineError::Io {
            path: path.display().to_string(),
            source,
        }
    }

    pub fn csv(path: &std::path::Path, source: csv::Error) -> Self {
        PipelineError::Csv {
            path: path.display().to_string(),
            source,
        }
    }

    /// Stage the error belongs to, when it carries one.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            PipelineError::DataIntegrity { stage, .. }
            | PipelineError::MissingLabel { stage, .. }
            | PipelineError::ModelState { stage, .. } => Some(*stage),
            PipelineError::Workbook(_) => Some(Stage::Report),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
