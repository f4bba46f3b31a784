use thiserror::Error;

/// Coarse classification callers branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A cache was queried before holding any data.
    InvalidState,
    /// A query fell outside the region where the model is defined.
    Domain,
    /// The integrator or its configuration failed; not recoverable locally.
    Integration,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ShapeError {
    #[error("spline is empty")]
    EmptySpline,

    #[error("requested t = {t}, which is outside of the interpolation domain [{lower}, {upper}]")]
    OutsideInterpolation { t: f64, lower: f64, upper: f64 },

    #[error("requested s = {s}, which is outside of the solution domain [-{max}, {max}]")]
    OutsideArclength { s: f64, max: f64 },

    #[error(
        "requested z = {z}, which is outside of the one-to-one domain [{lower}, {}]",
        format_bound(.upper)
    )]
    OutsideHeight {
        z: f64,
        lower: f64,
        /// `None` while the maximum height has not been reached by integration.
        upper: Option<f64>,
    },

    #[error("point ({r}, {z}) has a non-finite coordinate")]
    NonFinitePoint { r: f64, z: f64 },

    #[error("invalid solver settings: {0}")]
    InvalidSettings(String),

    #[error("integration failed: {0}")]
    Integration(String),
}

fn format_bound(upper: &Option<f64>) -> String {
    match upper {
        Some(upper) => upper.to_string(),
        None => "?".to_string(),
    }
}

impl ShapeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ShapeError::EmptySpline => ErrorKind::InvalidState,
            ShapeError::OutsideInterpolation { .. }
            | ShapeError::OutsideArclength { .. }
            | ShapeError::OutsideHeight { .. }
            | ShapeError::NonFinitePoint { .. } => ErrorKind::Domain,
            ShapeError::InvalidSettings(_) | ShapeError::Integration(_) => ErrorKind::Integration,
        }
    }

    /// Domain and invalid-state errors can be handled by adjusting the query.
    pub fn is_recoverable(&self) -> bool {
        matches!(self.kind(), ErrorKind::InvalidState | ErrorKind::Domain)
    }
}

#[cfg(test)]
mod tests {
    use super::{ErrorKind, ShapeError};

    #[test]
    fn height_message_distinguishes_unresolved_bound() {
        let open = ShapeError::OutsideHeight {
            z: 12.0,
            lower: 0.0,
            upper: None,
        };
        assert!(format!("{open}").ends_with("[0, ?]"));

        let closed = ShapeError::OutsideHeight {
            z: 12.0,
            lower: 0.0,
            upper: Some(10.5),
        };
        assert!(format!("{closed}").ends_with("[0, 10.5]"));
    }

    #[test]
    fn kinds_and_recoverability() {
        assert_eq!(ShapeError::EmptySpline.kind(), ErrorKind::InvalidState);
        assert!(ShapeError::EmptySpline.is_recoverable());
        let domain = ShapeError::OutsideArclength { s: 101.0, max: 100.0 };
        assert_eq!(domain.kind(), ErrorKind::Domain);
        assert!(domain.is_recoverable());
        let fatal = ShapeError::Integration("step size underflowed".to_string());
        assert_eq!(fatal.kind(), ErrorKind::Integration);
        assert!(!fatal.is_recoverable());
    }
}
