//! Runtime configuration (spec §6): read once at `init`, from
//! `DART_LOG_LEVEL` and the launcher-injected `--dart-id=`/`--dart-size=`/
//! `--dart-syncarea_id=`/`--dart-syncarea_size=` flags, grounded in
//! `dartrun.c`'s environment handoff to the spawned executable
//! (`examples/original_source/dart-impl/shmem/dart-shmem/dartrun.c`).

use log::LevelFilter;

/// Parsed once at `init`, before any other subsystem is touched.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub log_level: LevelFilter,
    pub dart_id: Option<usize>,
    pub dart_size: Option<usize>,
    pub syncarea_id: Option<usize>,
    pub syncarea_size: Option<usize>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        RuntimeConfig {
            log_level: LevelFilter::Warn,
            dart_id: None,
            dart_size: None,
            syncarea_id: None,
            syncarea_size: None,
        }
    }
}

impl RuntimeConfig {
    /// Reads `DART_LOG_LEVEL` from the environment and scans `argv` for
    /// the four launcher flags (`--flag=value` form); everything else in
    /// `argv` is left for the caller's own use. Default log level when
    /// `DART_LOG_LEVEL` is unset or unparseable: `WARN`.
    pub fn from_env_and_args<S: AsRef<str>>(argv: &[S]) -> Self {
        let log_level = std::env::var("DART_LOG_LEVEL")
            .ok()
            .and_then(|s| s.parse::<LevelFilter>().ok())
            .unwrap_or(LevelFilter::Warn);

        let mut cfg = RuntimeConfig {
            log_level,
            ..RuntimeConfig::default()
        };
        for arg in argv {
            let arg = arg.as_ref();
            if let Some(v) = arg.strip_prefix("--dart-id=") {
                cfg.dart_id = v.parse().ok();
            } else if let Some(v) = arg.strip_prefix("--dart-size=") {
                cfg.dart_size = v.parse().ok();
            } else if let Some(v) = arg.strip_prefix("--dart-syncarea_id=") {
                cfg.syncarea_id = v.parse().ok();
            } else if let Some(v) = arg.strip_prefix("--dart-syncarea_size=") {
                cfg.syncarea_size = v.parse().ok();
            }
        }
        cfg
    }

    /// Initializes the process-wide logger at this level. Idempotent:
    /// later calls (e.g. a second `init` in the same process, as the
    /// integration tests do across scenarios) are no-ops, mirroring
    /// `env_logger`'s own `try_init`.
    pub fn init_logger(&self) {
        let _ = env_logger::Builder::new()
            .filter_level(self.log_level)
            .is_test(cfg!(test))
            .try_init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_launcher_flags_and_ignores_the_rest() {
        let argv = vec![
            "my-app".to_string(),
            "--dart-id=2".to_string(),
            "--dart-size=4".to_string(),
            "--dart-syncarea_id=7".to_string(),
            "--dart-syncarea_size=65536".to_string(),
            "--user-flag".to_string(),
        ];
        let cfg = RuntimeConfig::from_env_and_args(&argv);
        assert_eq!(cfg.dart_id, Some(2));
        assert_eq!(cfg.dart_size, Some(4));
        assert_eq!(cfg.syncarea_id, Some(7));
        assert_eq!(cfg.syncarea_size, Some(65536));
    }

    #[test]
    fn missing_flags_leave_fields_unset() {
        let cfg = RuntimeConfig::from_env_and_args(&["my-app"]);
        assert!(cfg.dart_id.is_none());
        assert!(cfg.dart_size.is_none());
    }
}
