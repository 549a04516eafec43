// Matcher tuning: block and match-length defaults plus per-level profiles.

/// Default fingerprint block size.
pub const DEFAULT_BLOCK_SIZE: usize = 16;

/// Largest accepted block size.
pub const MAX_BLOCK_SIZE: usize = 1 << 16;

/// Shortest match worth a copy by default.
pub const DEFAULT_MIN_MATCH: usize = 8;

/// Default target window size (8 MiB).
pub const DEFAULT_WINDOW_SIZE: usize = 1 << 23;

/// Matcher profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatcherConfig {
    /// Name for display purposes.
    pub name: &'static str,
    /// Maximum candidates examined per target position.
    pub max_chain: usize,
}

/// Profile for a compression level (1-9). Level 0 never reaches the matcher;
/// it is mapped to the fastest profile for display.
///
/// - Levels 0-1: fastest
/// - Levels 2-4: fast
/// - Levels 5-6: default
/// - Levels 7-9: slow
pub fn config_for_level(level: u32) -> MatcherConfig {
    match level {
        0 | 1 => FASTEST,
        2..=4 => FAST,
        5 | 6 => DEFAULT,
        _ => SLOW,
    }
}

pub const FASTEST: MatcherConfig = MatcherConfig {
    name: "fastest",
    max_chain: 1,
};

pub const FAST: MatcherConfig = MatcherConfig {
    name: "fast",
    max_chain: 4,
};

pub const DEFAULT: MatcherConfig = MatcherConfig {
    name: "default",
    max_chain: 16,
};

pub const SLOW: MatcherConfig = MatcherConfig {
    name: "slow",
    max_chain: 64,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chains_grow_with_level() {
        let chains: Vec<usize> = (1..=9).map(|l| config_for_level(l).max_chain).collect();
        assert!(chains.windows(2).all(|w| w[0] <= w[1]), "{chains:?}");
    }

    #[test]
    fn level_mapping() {
        assert_eq!(config_for_level(0).name, "fastest");
        assert_eq!(config_for_level(1).name, "fastest");
        assert_eq!(config_for_level(2).name, "fast");
        assert_eq!(config_for_level(4).name, "fast");
        assert_eq!(config_for_level(6).name, "default");
        assert_eq!(config_for_level(7).name, "slow");
        assert_eq!(config_for_level(9).name, "slow");
    }
}
