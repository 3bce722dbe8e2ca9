//! Report generation settings.

use super::parse::Env;
use super::ConfigError;
use crate::diagnostics::DEFAULT_LOAD_THRESHOLD;

/// Settings for the per-request diagnostic flow.
#[derive(Clone, Debug)]
pub struct DiagnosticsConfig {
    /// 1-minute load average above which the high-load rule fires.
    pub load_threshold: f64,
    /// Bytecode-cache flag reported for this process.
    pub bytecode_cache: bool,
    /// Size of the sample workload run between `handler_called` and `end`.
    pub workload_iterations: u64,
    /// Micro benchmark iterations (0 = disabled).
    pub bench_iterations: u64,
}

impl DiagnosticsConfig {
    pub(crate) fn load(env: &Env<'_>) -> Result<Self, ConfigError> {
        let load_threshold: f64 = env.parse("LOAD_THRESHOLD", DEFAULT_LOAD_THRESHOLD)?;
        if !load_threshold.is_finite() || load_threshold <= 0.0 {
            return Err(ConfigError::Invalid {
                key: "LOAD_THRESHOLD".into(),
                message: format!("{} must be a positive number", load_threshold),
            });
        }

        Ok(Self {
            load_threshold,
            bytecode_cache: env.flag("BYTECODE_CACHE", false),
            workload_iterations: env.parse("WORKLOAD_ITERATIONS", 10_000)?,
            bench_iterations: env.parse("BENCH_ITERATIONS", 1_000)?,
        })
    }
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            load_threshold: DEFAULT_LOAD_THRESHOLD,
            bytecode_cache: false,
            workload_iterations: 10_000,
            bench_iterations: 1_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse::tests::vars;

    fn load(pairs: &[(&str, &str)]) -> Result<DiagnosticsConfig, ConfigError> {
        let lookup = vars(pairs);
        DiagnosticsConfig::load(&Env::new(&lookup))
    }

    #[test]
    fn test_threshold_must_be_positive() {
        assert!(matches!(
            load(&[("LOAD_THRESHOLD", "0")]),
            Err(ConfigError::Invalid { .. })
        ));
        assert!(matches!(
            load(&[("LOAD_THRESHOLD", "-1.5")]),
            Err(ConfigError::Invalid { .. })
        ));
        assert!(matches!(
            load(&[("LOAD_THRESHOLD", "high")]),
            Err(ConfigError::Parse { .. })
        ));
        assert_eq!(load(&[("LOAD_THRESHOLD", "4")]).unwrap().load_threshold, 4.0);
    }

    #[test]
    fn test_iterations() {
        let config = load(&[("WORKLOAD_ITERATIONS", "50"), ("BENCH_ITERATIONS", "0")]).unwrap();
        assert_eq!(config.workload_iterations, 50);
        assert_eq!(config.bench_iterations, 0);
    }
}
