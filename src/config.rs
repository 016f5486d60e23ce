use std::time::Duration;

/// Interpreted calls recurse on the native stack; this depth fits a 2 MiB thread.
pub const DEFAULT_MAX_CALL_DEPTH: usize = 64;

/// Resource guards for one interpreter session.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Statements executed before the run is stopped. `None` is unbounded.
    pub max_steps: Option<u64>,
    pub time_limit: Option<Duration>,
    pub max_call_depth: usize,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            max_steps: None,
            time_limit: None,
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
        }
    }
}

impl Config {
    pub fn with_max_steps(mut self, steps: u64) -> Config {
        self.max_steps = Some(steps);
        self
    }

    pub fn with_time_limit(mut self, limit: Duration) -> Config {
        self.time_limit = Some(limit);
        self
    }

    pub fn with_max_call_depth(mut self, depth: usize) -> Config {
        self.max_call_depth = depth;
        self
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_builder() {
        let config = Config::default()
            .with_max_steps(100)
            .with_time_limit(Duration::from_millis(5))
            .with_max_call_depth(8);
        assert_eq!(config.max_steps, Some(100));
        assert_eq!(config.time_limit, Some(Duration::from_millis(5)));
        assert_eq!(config.max_call_depth, 8);
        assert_eq!(Config::default().max_call_depth, DEFAULT_MAX_CALL_DEPTH);
    }
}
