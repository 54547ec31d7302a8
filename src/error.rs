use thiserror::Error;

/// Errors raised while building sky matrices, intersection matrices and studies.
///
/// Every variant is a caller configuration problem surfaced immediately;
/// nothing in the crate retries.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RadianceError {
    #[error("analysis hour {hour} is outside the valid range [0, {max}]")]
    InvalidHour { hour: i64, max: usize },

    #[error("dimension mismatch for {what}: expected {expected}, found {found}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("projection \"{0}\" is not recognized; choose from Orthographic, Stereographic")]
    UnsupportedProjection(String),

    #[error("invalid geometry: {0}")]
    Geometry(String),

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
}

pub type Result<T> = std::result::Result<T, RadianceError>;

/// Fail fast when two collections that must line up do not.
pub(crate) fn ensure_len(what: &'static str, expected: usize, found: usize) -> Result<()> {
    if expected != found {
        return Err(RadianceError::DimensionMismatch {
            what,
            expected,
            found,
        });
    }
    Ok(())
}
