//! Engine configuration

use crate::defaults::{
    DEFAULT_DEBUG_RECORDS_PER_SLOT, DEFAULT_MAX_CHAIN_DEPTH, ENV_DEBUG, ENV_STRICT,
};

/// Options controlling resolution and instrumentation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineOptions {
    /// Unresolvable path segments fail `resolve()` with a missing-member
    /// error; when false they log a warning and leave the descriptor empty
    pub strict: bool,

    /// Report successful get/set/invoke and flow activations to the debug hooks
    pub instrument: bool,

    /// Records kept per slot by the recorder an instrumented engine installs
    pub debug_records_per_slot: usize,

    /// Limit on chained instance descriptors followed by one operation
    pub max_chain_depth: usize,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            strict: true,
            instrument: false,
            debug_records_per_slot: DEFAULT_DEBUG_RECORDS_PER_SLOT,
            max_chain_depth: DEFAULT_MAX_CHAIN_DEPTH,
        }
    }
}

impl EngineOptions {
    /// Defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Lenient resolution for validation passes
    pub fn validation() -> Self {
        Self {
            strict: false,
            ..Self::default()
        }
    }

    /// Instrumentation on
    pub fn debugging() -> Self {
        Self {
            instrument: true,
            ..Self::default()
        }
    }

    /// Defaults overridden by `GRAPHBIND_STRICT` and `GRAPHBIND_DEBUG`
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut options = Self::default();
        if let Some(flag) = lookup(ENV_STRICT).as_deref().and_then(parse_flag) {
            options.strict = flag;
        }
        if let Some(flag) = lookup(ENV_DEBUG).as_deref().and_then(parse_flag) {
            options.instrument = flag;
        }
        options
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets() {
        assert!(EngineOptions::default().strict);
        assert!(!EngineOptions::validation().strict);
        assert!(EngineOptions::debugging().instrument);
    }

    #[test]
    fn test_env_flags_override_defaults() {
        let options = EngineOptions::from_lookup(|key| match key {
            ENV_STRICT => Some("false".to_string()),
            ENV_DEBUG => Some("1".to_string()),
            _ => None,
        });
        assert!(!options.strict);
        assert!(options.instrument);
    }

    #[test]
    fn test_unparseable_flag_is_ignored() {
        let options = EngineOptions::from_lookup(|_| Some("maybe".to_string()));
        assert_eq!(options, EngineOptions::default());
    }
}
