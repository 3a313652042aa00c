use splitter_api::ConfigEntryKind;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CoreError>;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("{kind} {name} not found")]
    NotFound { kind: ConfigEntryKind, name: String },

    #[error("service splitter {target} does not contain routes for primary and canary")]
    NoRoutes { target: String },

    #[error("bad {kind} {name}: {reason}")]
    Malformed {
        kind: ConfigEntryKind,
        name: String,
        reason: String,
    },

    #[error("Config store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("{kind} {name} still conflicting after {attempts} compare-and-swap attempts")]
    ConflictExhausted {
        kind: ConfigEntryKind,
        name: String,
        attempts: u32,
    },

    #[error("{kind} {name} was not accepted by the config store")]
    Rejected { kind: ConfigEntryKind, name: String },

    #[error("Invalid router configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Instance {instance} unreachable: {reason}")]
    InstanceUnreachable { instance: String, reason: String },

    #[error("{action} {target}: {source}")]
    Target {
        action: &'static str,
        target: String,
        #[source]
        source: Box<CoreError>,
    },
}

impl CoreError {
    /// Annotate an error with the action and the `<apex>.<namespace>` it concerned
    pub fn for_target(self, action: &'static str, target: impl ToString) -> Self {
        CoreError::Target {
            action,
            target: target.to_string(),
            source: Box::new(self),
        }
    }

    /// True for a missing entry and for a splitter routing nothing to
    /// either subset
    pub fn is_not_found(&self) -> bool {
        match self {
            CoreError::NotFound { .. } | CoreError::NoRoutes { .. } => true,
            CoreError::Target { source, .. } => source.is_not_found(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_annotation_keeps_source() {
        let err = CoreError::StoreUnavailable("connection refused".to_string())
            .for_target("setting service splitter", "checkout.shop");
        assert_eq!(
            err.to_string(),
            "setting service splitter checkout.shop: Config store unavailable: connection refused"
        );
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_not_found_through_annotation() {
        let err = CoreError::NotFound {
            kind: ConfigEntryKind::ServiceSplitter,
            name: "checkout".to_string(),
        }
        .for_target("reading service splitter", "checkout.shop");
        assert!(err.is_not_found());
        assert!(CoreError::NoRoutes { target: "checkout.shop".to_string() }.is_not_found());
    }
}
