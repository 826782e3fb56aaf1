use thiserror::Error;

/// Failure kinds of the rigorous set arithmetic.
///
/// `SingularMatrix` is recoverable: basis policies catch it and fall back to a cheaper
/// strategy. `EmptyIntersection` is never swallowed inside the crate; it means the two
/// enclosures of the same object are disjoint, which for sound inputs only happens when
/// the time step is too large for the oracle.
#[derive(Debug, Error)]
pub enum EnclosureError {
    #[error("singular matrix in {0}")]
    SingularMatrix(String),
    #[error("empty intersection in {0}")]
    EmptyIntersection(String),
    #[error("dimension mismatch in {context}: expected {expected}, got {found}")]
    DimensionMismatch {
        context: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("enclosure oracle failed: {0}")]
    Oracle(#[from] anyhow::Error),
}

impl EnclosureError {
    pub fn singular(context: impl Into<String>) -> Self {
        Self::SingularMatrix(context.into())
    }

    pub fn empty(context: impl Into<String>) -> Self {
        Self::EmptyIntersection(context.into())
    }

    pub fn is_singular_matrix(&self) -> bool {
        matches!(self, Self::SingularMatrix(_))
    }

    pub fn is_empty_intersection(&self) -> bool {
        matches!(self, Self::EmptyIntersection(_))
    }
}

pub type Result<T> = std::result::Result<T, EnclosureError>;

/// Returns `DimensionMismatch` unless `found == expected`.
pub(crate) fn check_dim(context: &'static str, expected: usize, found: usize) -> Result<()> {
    if expected != found {
        return Err(EnclosureError::DimensionMismatch {
            context,
            expected,
            found,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_operation() {
        assert_eq!(
            EnclosureError::singular("gauss").to_string(),
            "singular matrix in gauss"
        );
        let err = check_dim("move", 3, 2).expect_err("expected mismatch");
        assert_eq!(
            err.to_string(),
            "dimension mismatch in move: expected 3, got 2"
        );
        assert!(check_dim("move", 2, 2).is_ok());
    }

    #[test]
    fn oracle_errors_convert_from_anyhow() {
        let err: EnclosureError = anyhow::anyhow!("step too large").into();
        assert!(err.to_string().contains("step too large"));
        assert!(!err.is_singular_matrix());
    }
}
