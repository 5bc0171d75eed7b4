//! Named analysis options.
//!
//! The driver hands the core a flat bag of named options; [`AnalysisConfig`]
//! reads the ones the core understands and fills in defaults for the rest.

use std::collections::HashMap;

/// Enables solver allocation with overapproximation-refinement query shaping.
pub const REFINE: &str = "refine";
/// Maximum number of lexicographic components of a ranking function.
pub const LEXICOGRAPHIC_RANKING: &str = "lexicographic-ranking";
/// Maximum number of inner (coefficient search) iterations per ranking run.
pub const MAX_INNER_RANKING_ITERATIONS: &str = "max-inner-ranking-iterations";
/// Maximum refinement level of the predicate domain.
pub const MAX_REFINEMENT: &str = "max-refinement";

/// Value stored under an option name.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum OptionValue {
    Bool(bool),
    Unsigned(u32),
}

/// Named analysis options. Unknown names are accepted and ignored by
/// [`AnalysisConfig::from_options`].
#[derive(Debug, Clone, Default)]
pub struct Options {
    values: HashMap<String, OptionValue>,
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a boolean option, replacing any previous value of that name.
    pub fn set_bool(&mut self, name: &str, value: bool) -> &mut Self {
        self.values.insert(name.to_string(), OptionValue::Bool(value));
        self
    }

    /// Sets a numeric option, replacing any previous value of that name.
    pub fn set_unsigned(&mut self, name: &str, value: u32) -> &mut Self {
        self.values.insert(name.to_string(), OptionValue::Unsigned(value));
        self
    }

    /// Unset and non-boolean options read as `false`.
    pub fn get_bool(&self, name: &str) -> bool {
        matches!(self.values.get(name), Some(OptionValue::Bool(true)))
    }

    /// `None` when unset or not numeric.
    pub fn get_unsigned(&self, name: &str) -> Option<u32> {
        match self.values.get(name) {
            Some(OptionValue::Unsigned(n)) => Some(*n),
            _ => None,
        }
    }

    pub fn is_set(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }
}

/// Bounds and switches of one analysis run.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct AnalysisConfig {
    pub refine: bool,
    /// Lexicographic components a ranking function may have (at least 1).
    pub max_ranking_components: u32,
    pub max_inner_ranking_iterations: u32,
    pub max_refinement: u32,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            refine: false,
            max_ranking_components: 3,
            max_inner_ranking_iterations: 20,
            max_refinement: 0,
        }
    }
}

impl AnalysisConfig {
    /// Reads the known options, falling back to the defaults for unset ones.
    /// A component bound of 0 is raised to 1.
    pub fn from_options(options: &Options) -> Self {
        let default = Self::default();
        Self {
            refine: options.get_bool(REFINE),
            max_ranking_components: options
                .get_unsigned(LEXICOGRAPHIC_RANKING)
                .unwrap_or(default.max_ranking_components)
                .max(1),
            max_inner_ranking_iterations: options
                .get_unsigned(MAX_INNER_RANKING_ITERATIONS)
                .unwrap_or(default.max_inner_ranking_iterations),
            max_refinement: options.get_unsigned(MAX_REFINEMENT).unwrap_or(default.max_refinement),
        }
    }
}
