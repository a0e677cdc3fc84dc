use std::{fmt, path::PathBuf};

/// Result alias that carries the custom [`BuildError`] type.
pub type Result<T> = std::result::Result<T, BuildError>;

/// Compiler stage that raised a validation error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Choreography,
    Camera,
    Expression,
    MoveGraph,
    Battle,
    PartyJump,
    Practice,
    FrameSequence,
    Timing,
    Build,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Choreography => "choreography",
            Stage::Camera => "camera",
            Stage::Expression => "expression",
            Stage::MoveGraph => "move graph",
            Stage::Battle => "battle",
            Stage::PartyJump => "party jump",
            Stage::Practice => "practice",
            Stage::FrameSequence => "frame sequence",
            Stage::Timing => "timing",
            Stage::Build => "build",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Position in the song an editorial error points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Location {
    Measure(u32),
    Beat(u32),
    Index(u32),
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Measure(m) => write!(f, "measure {m}"),
            Location::Beat(b) => write!(f, "beat {b}"),
            Location::Index(i) => write!(f, "index {i}"),
        }
    }
}

fn location_suffix(location: &Option<Location>) -> String {
    location
        .map(|location| format!(" (at {location})"))
        .unwrap_or_default()
}

/// Common error type for the build pipeline.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    /// Structural problem in the editorial input.
    #[error("{stage} validation error: {message}{}", location_suffix(.location))]
    Validation {
        stage: Stage,
        location: Option<Location>,
        message: String,
    },
    /// An expected library or template file is absent.
    #[error("missing resource `{}`: {message}", .path.display())]
    Resource { path: PathBuf, message: String },
    #[error("{0}")]
    Message(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl BuildError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }

    pub fn validation(stage: Stage, message: impl Into<String>) -> Self {
        Self::Validation {
            stage,
            location: None,
            message: message.into(),
        }
    }

    pub fn at_measure(stage: Stage, measure: u32, message: impl Into<String>) -> Self {
        Self::Validation {
            stage,
            location: Some(Location::Measure(measure)),
            message: message.into(),
        }
    }

    pub fn at(stage: Stage, location: Location, message: impl Into<String>) -> Self {
        Self::Validation {
            stage,
            location: Some(location),
            message: message.into(),
        }
    }

    pub fn resource(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Resource {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Stage that raised the error, for validation errors.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            BuildError::Validation { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_display_names_stage_and_location() {
        let err = BuildError::at_measure(Stage::Battle, 12, "duplicate battle start");
        assert_eq!(
            err.to_string(),
            "battle validation error: duplicate battle start (at measure 12)"
        );

        let err = BuildError::validation(Stage::Practice, "no next move found");
        assert_eq!(err.to_string(), "practice validation error: no next move found");
        assert_eq!(err.stage(), Some(Stage::Practice));
    }

    #[test]
    fn resource_display_names_path() {
        let err = BuildError::resource("lib/dc/song/move.json", "move metadata not found");
        assert!(err.to_string().contains("lib/dc/song/move.json"));
        assert_eq!(err.stage(), None);
    }

    #[test]
    fn message_errors_display_verbatim() {
        let err = BuildError::msg("entry `x` targets unknown container `y`");
        assert_eq!(err.to_string(), "entry `x` targets unknown container `y`");
        assert_eq!(err.stage(), None);
    }
}
