//! Runtime configuration
//!
//! Every knob the engine reads lives in [`RuntimeConfig`], an immutable value handed to
//! the runtime at construction. Nothing here is global: two runtimes with different
//! configurations can coexist in one process.

use serde::{Deserialize, Serialize};

/// Language edition gate. Constructs introduced after the selected edition are
/// rejected by the parser with a diagnostic naming the construct.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum LanguageVersion {
    Es5,
    Es2015,
    Es2016,
    Es2017,
    Es2018,
    Es2020,
    #[default]
    Latest,
}

impl LanguageVersion {
    pub fn name(self) -> &'static str {
        match self {
            LanguageVersion::Es5 => "ES5",
            LanguageVersion::Es2015 => "ES2015",
            LanguageVersion::Es2016 => "ES2016",
            LanguageVersion::Es2017 => "ES2017",
            LanguageVersion::Es2018 => "ES2018",
            LanguageVersion::Es2020 => "ES2020",
            LanguageVersion::Latest => "latest",
        }
    }
}

/// Execution strategy for a compilation unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptimizationTier {
    /// Walk the lowered IR directly, no precompilation
    Interpreted,
    /// Precompile every function to register bytecode and cache it
    #[default]
    Compiled,
}

impl OptimizationTier {
    pub const ALL: [OptimizationTier; 2] =
        [OptimizationTier::Interpreted, OptimizationTier::Compiled];
}

/// Configuration consumed by compilation and evaluation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub language_version: LanguageVersion,
    pub tier: OptimizationTier,
    /// Report suspicious but legal code (reads of missing properties,
    /// assignments to undeclared globals)
    pub strict_diagnostics: bool,
    /// Escalate diagnostics to `ReferenceError`s instead of recording them
    pub warnings_as_errors: bool,
    /// Keep comments on the program and attach doc comments to declarations
    pub record_comments: bool,
    /// Maximum nesting of script calls before `RangeError`
    pub max_call_depth: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            language_version: LanguageVersion::Latest,
            tier: OptimizationTier::Compiled,
            strict_diagnostics: false,
            warnings_as_errors: false,
            record_comments: false,
            max_call_depth: 10_000,
        }
    }
}

impl RuntimeConfig {
    pub fn with_tier(mut self, tier: OptimizationTier) -> Self {
        self.tier = tier;
        self
    }

    pub fn with_language_version(mut self, version: LanguageVersion) -> Self {
        self.language_version = version;
        self
    }

    pub fn with_strict_diagnostics(mut self, warnings_as_errors: bool) -> Self {
        self.strict_diagnostics = true;
        self.warnings_as_errors = warnings_as_errors;
        self
    }

    pub fn with_comments(mut self) -> Self {
        self.record_comments = true;
        self
    }

    /// Parser-facing subset of the configuration
    pub fn parse_options(&self) -> ParseOptions {
        ParseOptions {
            language_version: self.language_version,
            record_comments: self.record_comments,
        }
    }
}

/// Options the parser needs; derived from [`RuntimeConfig`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ParseOptions {
    pub language_version: LanguageVersion,
    pub record_comments: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn versions_are_ordered() {
        assert!(LanguageVersion::Es5 < LanguageVersion::Es2015);
        assert!(LanguageVersion::Es2018 < LanguageVersion::Es2020);
        assert!(LanguageVersion::Latest > LanguageVersion::Es2020);
    }

    #[test]
    fn config_deserializes_with_defaults() {
        let config: RuntimeConfig =
            serde_json::from_str(r#"{"tier": "interpreted", "language_version": "es5"}"#)
                .unwrap_or_default();
        assert_eq!(config.tier, OptimizationTier::Interpreted);
        assert_eq!(config.language_version, LanguageVersion::Es5);
        assert_eq!(config.max_call_depth, 10_000);
        assert!(!config.record_comments);
    }
}
