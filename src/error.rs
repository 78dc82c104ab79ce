use std::io;

/// All error types for the facade-atlas pipeline.
#[derive(thiserror::Error, Debug)]
pub enum AtlasError {
    #[error("Input error: {0}")]
    Input(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Building '{building}' needs texture sampling but no source textures were supplied")]
    NoSourceTextures { building: String },
    #[error("Cannot allocate a {width}x{width} atlas pixel buffer")]
    Allocation { width: u32 },
    #[error("Output error: {0}")]
    Output(String),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Image(#[from] image::ImageError),
}

impl AtlasError {
    /// Whether this error only invalidates the current building.
    ///
    /// Building-scoped failures are logged and skipped by the pipeline;
    /// everything else aborts the run.
    pub fn is_building_scoped(&self) -> bool {
        matches!(
            self,
            AtlasError::NoSourceTextures { .. } | AtlasError::Allocation { .. }
        )
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, AtlasError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_strings() {
        let e = AtlasError::Input("bad scene".into());
        assert_eq!(e.to_string(), "Input error: bad scene");

        let e = AtlasError::Config("padding".into());
        assert_eq!(e.to_string(), "Configuration error: padding");

        let e = AtlasError::NoSourceTextures {
            building: "hall".into(),
        };
        assert_eq!(
            e.to_string(),
            "Building 'hall' needs texture sampling but no source textures were supplied"
        );

        let e = AtlasError::Allocation { width: 65536 };
        assert_eq!(e.to_string(), "Cannot allocate a 65536x65536 atlas pixel buffer");

        let e = AtlasError::Output("disk full".into());
        assert_eq!(e.to_string(), "Output error: disk full");
    }

    #[test]
    fn from_io_error() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file missing");
        let e: AtlasError = io_err.into();
        assert!(matches!(e, AtlasError::Io(_)));
        assert!(e.to_string().contains("file missing"));
    }

    #[test]
    fn building_scoped_errors() {
        assert!(AtlasError::Allocation { width: 1 }.is_building_scoped());
        assert!(
            AtlasError::NoSourceTextures {
                building: String::new()
            }
            .is_building_scoped()
        );
        assert!(!AtlasError::Input("x".into()).is_building_scoped());
    }
}
