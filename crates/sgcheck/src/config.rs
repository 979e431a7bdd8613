#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckLevel {
    Fast,
    Standard,
    Paranoid,
}

#[derive(Debug, Clone)]
pub struct CheckerConfig {
    pub level: CheckLevel,
    /// Only track array typed blocks.
    pub arrays_only: bool,
    pub max_threads: usize,
    /// Diagnostics kept in the report; 0 keeps all of them.
    pub max_diagnostics: usize,
    /// Skip the spurious stack read of `pop %bp; ret` and `leave; ret`.
    pub suppress_frame_epilogue: bool,
    /// Entries of the per-thread query cache; 0 disables it.
    pub query_cache_size: usize,
    pub deep_sanity: bool,
}

impl CheckerConfig {
    pub fn for_level(level: CheckLevel) -> Self {
        match level {
            CheckLevel::Fast => Self {
                level,
                arrays_only: true,
                max_threads: 500,
                max_diagnostics: 100,
                suppress_frame_epilogue: true,
                query_cache_size: 16,
                deep_sanity: false,
            },
            CheckLevel::Standard => Self {
                level,
                arrays_only: true,
                max_threads: 500,
                max_diagnostics: 1000,
                suppress_frame_epilogue: true,
                query_cache_size: 16,
                deep_sanity: false,
            },
            CheckLevel::Paranoid => Self {
                level,
                arrays_only: true,
                max_threads: 500,
                max_diagnostics: 0,
                suppress_frame_epilogue: true,
                query_cache_size: 16,
                deep_sanity: true,
            },
        }
    }

    pub fn with_max_threads(mut self, max_threads: usize) -> Self {
        self.max_threads = max_threads;
        self
    }

    pub fn should_run_deep_sanity(&self) -> bool {
        self.deep_sanity || matches!(self.level, CheckLevel::Paranoid)
    }
}

impl Default for CheckerConfig {
    fn default() -> Self {
        Self::for_level(CheckLevel::Standard)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = CheckerConfig::default();
        assert_eq!(config.level, CheckLevel::Standard);
        assert!(config.arrays_only);
        assert_eq!(config.max_threads, 500);
        assert!(!config.should_run_deep_sanity());
        assert!(CheckerConfig::for_level(CheckLevel::Paranoid).should_run_deep_sanity());
    }

    #[test]
    fn levels_only_change_self_checking_and_limits() {
        for level in [CheckLevel::Fast, CheckLevel::Standard, CheckLevel::Paranoid] {
            let config = CheckerConfig::for_level(level);
            assert!(config.arrays_only, "{level:?}");
            assert!(config.suppress_frame_epilogue, "{level:?}");
        }
        assert!(!CheckerConfig::for_level(CheckLevel::Fast).should_run_deep_sanity());
    }
}
