//! Engine configuration.

/// When entity names are pushed to the backend.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NameDiscipline {
    /// Names stay in the model; rename notifications skip the backend.
    #[default]
    Auto,
    Lazy,
    Full,
}

impl NameDiscipline {
    pub fn pushes_names(self) -> bool {
        self != NameDiscipline::Auto
    }
}

/// Per-engine behaviour switches.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize), serde(default))]
#[derive(Debug, Clone, PartialEq)]
pub struct SolverConfig {
    pub name_discipline: NameDiscipline,
    /// Snapshot column bounds before branch and bound and restore them afterwards.
    pub auto_reset_mip: bool,
    /// Capture and apply row prices as part of a warm start.
    pub warm_start_row_prices: bool,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            name_discipline: NameDiscipline::Auto,
            auto_reset_mip: true,
            warm_start_row_prices: false,
        }
    }
}

impl SolverConfig {
    /// Create a new configuration with all defaults.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_name_discipline(mut self, discipline: NameDiscipline) -> Self {
        self.name_discipline = discipline;
        self
    }

    pub fn with_auto_reset_mip(mut self, enabled: bool) -> Self {
        self.auto_reset_mip = enabled;
        self
    }

    pub fn with_warm_start_row_prices(mut self, enabled: bool) -> Self {
        self.warm_start_row_prices = enabled;
        self
    }
}
