//! Error types for coordination analysis and point-set registration.
//!
//! Both routines validate their input up front and fail before doing any
//! geometric work. A negative outcome (no neighbours passing the threshold,
//! no permutation within the RMSD budget) is not an error.

use thiserror::Error;

/// Errors returned when the input to one of the routines is malformed.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// More points were supplied than the fixed-size buffers can hold.
    #[error("{count} points given, at most {max} are supported")]
    CapacityExceeded { count: usize, max: usize },

    /// A scalar parameter or a coordinate is out of its valid range.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

impl Error {
    /// Create a capacity error
    pub fn capacity_exceeded(count: usize, max: usize) -> Self {
        Error::CapacityExceeded { count, max }
    }

    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Error::InvalidParameter(message.into())
    }
}

/// Result type of this crate
pub type Result<T> = std::result::Result<T, Error>;

/// Reject point sets with more than `max` entries.
pub(crate) fn check_capacity(count: usize, max: usize) -> Result<()> {
    if count > max {
        return Err(Error::capacity_exceeded(count, max));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capacity() {
        assert!(check_capacity(19, 19).is_ok());
        assert_eq!(
            check_capacity(20, 19),
            Err(Error::CapacityExceeded { count: 20, max: 19 })
        );
    }

    #[test]
    fn test_messages() {
        let err = Error::capacity_exceeded(17, 16);
        assert_eq!(err.to_string(), "17 points given, at most 16 are supported");
        let err = Error::invalid("threshold must lie in [0, 1]");
        assert_eq!(err.to_string(), "Invalid parameter: threshold must lie in [0, 1]");
    }
}
