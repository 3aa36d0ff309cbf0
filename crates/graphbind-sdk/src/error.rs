//! Error types shared by hosts and the engine

/// Result type for every get/set/invoke path
pub type BindResult<T> = Result<T, BindError>;

/// Failure taxonomy of the binding engine
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BindError {
    /// The descriptor has no target kind or no path
    #[error("Target is not assigned")]
    Unassigned,

    /// A path segment could not be resolved
    #[error("Member not found: '{path}' on type {searched}")]
    MissingMember {
        /// Full dotted path of the descriptor
        path: String,
        /// Name of the type that was searched
        searched: String,
    },

    /// A type token could not be decoded into a usable type
    #[error("Type not found: {0}")]
    MissingType(String),

    /// A value could not be coerced to the expected type
    #[error("Invalid cast from {from} to {to}")]
    InvalidCast {
        /// Source type name
        from: String,
        /// Target type name
        to: String,
    },

    /// Operation not defined for the target kind
    #[error("Unsupported operation: cannot {operation} {target}")]
    Unsupported {
        /// Operation name (get, set, invoke, ...)
        operation: &'static str,
        /// Description of the target
        target: String,
    },

    /// A member was accessed on a null receiver
    #[error("Null reference while accessing '{0}'")]
    NullReference(String),

    /// The owning graph does not provide a required capability
    #[error("Capability not provided by the owner: {0}")]
    MissingCapability(&'static str),

    /// A named variable, parameter, property or function does not exist
    #[error("Unknown {what}: {name}")]
    UnknownName {
        /// What kind of name was looked up
        what: &'static str,
        /// The name itself
        name: String,
    },

    /// Wrong argument count or shape
    #[error("Argument error: {0}")]
    Argument(String),

    /// Error raised by a host member body
    #[error("Host error: {0}")]
    Host(String),

    /// Persisted shape could not be written or read
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl BindError {
    /// Build an unsupported-operation error
    pub fn unsupported(operation: &'static str, target: impl Into<String>) -> Self {
        BindError::Unsupported {
            operation,
            target: target.into(),
        }
    }

    /// Build an invalid-cast error from two displayable type names
    pub fn invalid_cast(from: impl ToString, to: impl ToString) -> Self {
        BindError::InvalidCast {
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    /// Whether this is a missing-member failure
    pub fn is_missing_member(&self) -> bool {
        matches!(self, BindError::MissingMember { .. })
    }
}

impl From<String> for BindError {
    fn from(s: String) -> Self {
        BindError::Host(s)
    }
}

impl From<&str> for BindError {
    fn from(s: &str) -> Self {
        BindError::Host(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_member_message_carries_path() {
        let err = BindError::MissingMember {
            path: "player.position.w".to_string(),
            searched: "Vector3".to_string(),
        };
        assert!(err.is_missing_member());
        assert_eq!(
            err.to_string(),
            "Member not found: 'player.position.w' on type Vector3"
        );
    }

    #[test]
    fn test_host_error_from_str() {
        let err: BindError = "boom".into();
        assert_eq!(err, BindError::Host("boom".to_string()));
    }
}
