use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use log::{debug, LevelFilter};
use log4rs::append::console::ConsoleAppender;
use log4rs::append::rolling_file::policy::compound::roll::fixed_window::FixedWindowRoller;
use log4rs::append::rolling_file::policy::compound::trigger::size::SizeTrigger;
use log4rs::append::rolling_file::policy::compound::CompoundPolicy;
use log4rs::append::rolling_file::RollingFileAppender;
use log4rs::config::{Appender, Logger, Root};
use log4rs::encode::pattern::PatternEncoder;
use log4rs::{Config, Handle};

use crate::{Component, LoggingError, Result};

const CONSOLE_APPENDER: &str = "console";
const FILE_APPENDER: &str = "file";
const MAX_LOG_FILE_SIZE: u64 = 10 * 1024 * 1024;
const ROLLED_LOG_FILES: u32 = 3;

static INITIALIZED: AtomicBool = AtomicBool::new(false);

/// The log4rs logger of a smetrics binary.
///
/// The [log] facade accepts a single logger per process, building a second one fails with
/// [LoggingError::AlreadyInitialized].
#[derive(Debug)]
pub struct MetricsLogger {
    component: Component,
    level: LevelFilter,
    _handle: Handle,
}

impl MetricsLogger {
    pub fn builder(component: Component) -> MetricsLoggerBuilder {
        MetricsLoggerBuilder::new(component)
    }

    /// Returns the binary for which the logger has been set up.
    pub fn component(&self) -> Component {
        self.component
    }

    /// Returns the root level of the active config.
    pub fn level(&self) -> LevelFilter {
        self.level
    }
}

#[derive(Debug)]
pub struct MetricsLoggerBuilder {
    component: Component,
    level: LevelFilter,
    config_file: Option<PathBuf>,
    log_file: Option<PathBuf>,
    targets: BTreeMap<String, LevelFilter>,
}

impl MetricsLoggerBuilder {
    fn new(component: Component) -> Self {
        Self {
            component,
            level: LevelFilter::Info,
            config_file: None,
            log_file: None,
            targets: component
                .quiet_targets()
                .iter()
                .map(|(target, level)| (target.to_string(), *level))
                .collect(),
        }
    }

    pub fn level(mut self, level: LevelFilter) -> Self {
        self.level = level;
        self
    }

    /// Load the log4rs config from the given file instead of generating one.
    /// The level, log file and targets of the builder are then ignored.
    pub fn config_file(mut self, path: Option<PathBuf>) -> Self {
        self.config_file = path;
        self
    }

    /// Also write the logs to the given file, rolled over once it grows too large.
    pub fn log_file(mut self, path: Option<PathBuf>) -> Self {
        self.log_file = path;
        self
    }

    /// Override the level of a single target.
    pub fn target<S: Into<String>>(mut self, target: S, level: LevelFilter) -> Self {
        self.targets.insert(target.into(), level);
        self
    }

    /// Resolve the log4rs config which would be installed by [MetricsLoggerBuilder::build].
    pub fn config(&self) -> Result<Config> {
        match self.config_file.as_ref() {
            Some(path) => log4rs::config::load_config_file(path, Default::default())
                .map_err(|e| LoggingError::ConfigFile(path.clone(), e.to_string())),
            None => self.generate_config(),
        }
    }

    /// Install the logger for this process.
    pub fn build(self) -> Result<MetricsLogger> {
        let config = self.config()?;
        let level = config.root().level();
        if INITIALIZED.swap(true, Ordering::SeqCst) {
            return Err(LoggingError::AlreadyInitialized);
        }

        let handle =
            log4rs::init_config(config).map_err(|e| LoggingError::Config(e.to_string()))?;
        debug!("Logging of the {} has been initialized at {}", self.component, level);
        Ok(MetricsLogger {
            component: self.component,
            level,
            _handle: handle,
        })
    }

    fn generate_config(&self) -> Result<Config> {
        let console = ConsoleAppender::builder()
            .encoder(Box::new(PatternEncoder::new(
                pattern(self.component, true).as_str(),
            )))
            .build();
        let mut builder =
            Config::builder().appender(Appender::builder().build(CONSOLE_APPENDER, Box::new(console)));
        let mut root = Root::builder().appender(CONSOLE_APPENDER);

        if let Some(path) = self.log_file.as_ref() {
            builder = builder.appender(file_appender(self.component, path)?);
            root = root.appender(FILE_APPENDER);
        }
        for (target, level) in self.targets.iter() {
            builder = builder.logger(Logger::builder().build(target.as_str(), *level));
        }

        builder
            .build(root.build(self.level))
            .map_err(|e| LoggingError::Config(e.to_string()))
    }
}

fn file_appender(component: Component, path: &Path) -> Result<Appender> {
    if let Some(parent) = path.parent().filter(|e| !e.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let roller = FixedWindowRoller::builder()
        .build(
            format!("{}.{{}}", path.display()).as_str(),
            ROLLED_LOG_FILES,
        )
        .map_err(|e| LoggingError::Config(e.to_string()))?;
    let policy = CompoundPolicy::new(
        Box::new(SizeTrigger::new(MAX_LOG_FILE_SIZE)),
        Box::new(roller),
    );
    let appender = RollingFileAppender::builder()
        .encoder(Box::new(PatternEncoder::new(
            pattern(component, false).as_str(),
        )))
        .build(path, Box::new(policy))?;

    Ok(Appender::builder().build(FILE_APPENDER, Box::new(appender)))
}

/// Returns the log line pattern of the component, levels are only colored on the console.
fn pattern(component: Component, highlight: bool) -> String {
    let level = if highlight { "{h({l:<5})}" } else { "{l:<5}" };
    format!(
        "{{d(%Y-%m-%dT%H:%M:%S%.3f)}} {} {} [{{T}}] {{t}}: {{m}}{{n}}",
        level, component
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    fn target_level(config: &Config, target: &str) -> Option<LevelFilter> {
        config
            .loggers()
            .iter()
            .find(|e| e.name() == target)
            .map(|e| e.level())
    }

    #[test]
    fn test_pattern() {
        assert_eq!(
            "{d(%Y-%m-%dT%H:%M:%S%.3f)} {h({l:<5})} server [{T}] {t}: {m}{n}",
            pattern(Component::Server, true)
        );
        assert_eq!(
            "{d(%Y-%m-%dT%H:%M:%S%.3f)} {l:<5} agent [{T}] {t}: {m}{n}",
            pattern(Component::Agent, false)
        );
    }

    #[test]
    fn test_config_quiets_component_targets() {
        let config = MetricsLogger::builder(Component::Server)
            .level(LevelFilter::Debug)
            .config()
            .unwrap();

        assert_eq!(LevelFilter::Debug, config.root().level());
        assert_eq!(Some(LevelFilter::Warn), target_level(&config, "sqlx"));
        assert_eq!(Some(LevelFilter::Info), target_level(&config, "tower_http"));
        assert_eq!(None, target_level(&config, "reqwest"));
        assert_eq!(vec![CONSOLE_APPENDER.to_string()], config.root().appenders());
    }

    #[test]
    fn test_config_target_override() {
        let config = MetricsLogger::builder(Component::Agent)
            .target("reqwest", LevelFilter::Trace)
            .target("smetrics_agent::client", LevelFilter::Debug)
            .config()
            .unwrap();

        assert_eq!(LevelFilter::Info, config.root().level());
        assert_eq!(Some(LevelFilter::Trace), target_level(&config, "reqwest"));
        assert_eq!(
            Some(LevelFilter::Debug),
            target_level(&config, "smetrics_agent::client")
        );
    }

    #[test]
    fn test_config_log_file() {
        let temp_dir = tempdir().unwrap();
        let log_file = temp_dir.path().join("logs").join("server.log");

        let config = MetricsLogger::builder(Component::Server)
            .log_file(Some(log_file.clone()))
            .config()
            .unwrap();

        assert!(
            log_file.parent().unwrap().is_dir(),
            "expected the log directory to have been created"
        );
        assert_eq!(
            vec![CONSOLE_APPENDER.to_string(), FILE_APPENDER.to_string()],
            config.root().appenders()
        );
        assert_eq!(
            vec![CONSOLE_APPENDER, FILE_APPENDER],
            config.appenders().iter().map(|e| e.name()).collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_config_file() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("log4rs.yml");
        let mut file = File::create(&path).unwrap();
        file.write_all(
            b"appenders:\n  stdout:\n    kind: console\nroot:\n  level: warn\n  appenders:\n    - stdout\n",
        )
        .unwrap();

        let config = MetricsLogger::builder(Component::Agent)
            .level(LevelFilter::Trace)
            .config_file(Some(path))
            .config()
            .unwrap();

        assert_eq!(LevelFilter::Warn, config.root().level());
        assert_eq!(None, target_level(&config, "reqwest"));
    }

    #[test]
    fn test_config_file_missing() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("missing.yml");

        let result = MetricsLogger::builder(Component::Server)
            .config_file(Some(path.clone()))
            .config();

        match result.err() {
            Some(LoggingError::ConfigFile(file, _)) => assert_eq!(path, file),
            e => panic!("expected LoggingError::ConfigFile, got {:?} instead", e),
        }
    }

    #[test]
    fn test_build_once_per_process() {
        let logger = MetricsLogger::builder(Component::Agent)
            .level(LevelFilter::Trace)
            .build()
            .expect("expected a logger");

        assert_eq!(Component::Agent, logger.component());
        assert_eq!(LevelFilter::Trace, logger.level());

        let result = MetricsLogger::builder(Component::Server).build();
        assert_eq!(
            Some(LoggingError::AlreadyInitialized),
            result.err(),
            "expected a second logger to be rejected"
        );
    }
}
