/// The current version of the smetrics core.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod core;

#[cfg(feature = "testing")]
pub mod testing {
    use crate::core::event::{Event, Observer};
    use crate::core::metrics::{CounterMetric, GaugeMetric};
    use crate::core::storage;

    use log::{trace, LevelFilter};
    use log4rs::append::console::ConsoleAppender;
    use log4rs::config::{Appender, Logger, Root};
    use log4rs::encode::pattern::PatternEncoder;
    use log4rs::Config;
    use std::fs;
    use std::sync::{Mutex, Once};
    use tempfile::TempDir;

    static INIT: Once = Once::new();

    /// Initializes the logger with the specified log level.
    #[macro_export]
    macro_rules! init_logger {
        ($level:expr) => {
            $crate::testing::init_logger_level($level)
        };
        () => {
            $crate::testing::init_logger_level(log::LevelFilter::Trace)
        };
    }

    /// Initializes the logger with the specified log level.
    pub fn init_logger_level(level: LevelFilter) {
        INIT.call_once(|| {
            log4rs::init_config(Config::builder()
                .appender(Appender::builder().build("stdout", Box::new(ConsoleAppender::builder()
                    .encoder(Box::new(PatternEncoder::new("\x1B[37m{d(%Y-%m-%d %H:%M:%S%.3f)}\x1B[0m {h({l:>5.5})} \x1B[35m{I:>6.6}\x1B[0m \x1B[37m---\x1B[0m \x1B[37m[{T:>15.15}]\x1B[0m \x1B[36m{t:<60.60}\x1B[0m \x1B[37m:\x1B[0m {m}{n}")))
                    .build())))
                .logger(Logger::builder().build("h2", LevelFilter::Info))
                .logger(Logger::builder().build("httpmock::server", LevelFilter::Debug))
                .logger(Logger::builder().build("hyper", LevelFilter::Info))
                .logger(Logger::builder().build("hyper_util", LevelFilter::Info))
                .logger(Logger::builder().build("mio", LevelFilter::Info))
                .logger(Logger::builder().build("reqwest", LevelFilter::Info))
                .logger(Logger::builder().build("sqlx", LevelFilter::Info))
                .logger(Logger::builder().build("tracing", LevelFilter::Info))
                .logger(Logger::builder().build("want", LevelFilter::Info))
                .build(Root::builder().appender("stdout").build(level))
                .unwrap())
                .unwrap();
        })
    }

    /// Create a new gauge metric for testing purposes.
    pub fn gauge(name: &str, value: f64) -> GaugeMetric {
        GaugeMetric::new(name, value)
    }

    /// Create a new counter metric for testing purposes.
    pub fn counter(name: &str, value: i64) -> CounterMetric {
        CounterMetric::new(name, value)
    }

    /// Read a file from the temp directory.
    pub fn read_temp_dir_file_as_string(temp_dir: &TempDir, filename: &str) -> String {
        let path = temp_dir.path().join(filename);

        trace!("Reading temp filepath {:?}", path);
        match fs::read_to_string(&path) {
            Ok(e) => e,
            Err(e) => panic!("Failed to read temp file {:?}, {}", path, e),
        }
    }

    /// Write the given contents to a file within the temp directory.
    pub fn write_tmp_dir_file(temp_dir: &TempDir, filename: &str, contents: impl AsRef<[u8]>) {
        let path = temp_dir.path().join(filename);
        trace!("Writing test file {:?}", path);
        fs::write(path, contents).unwrap();
    }

    /// An observer which records every event it receives.
    #[derive(Debug, Default)]
    pub struct RecordingObserver {
        events: Mutex<Vec<Event>>,
    }

    impl RecordingObserver {
        /// Returns a copy of the received events, in the order they have been received.
        pub fn events(&self) -> Vec<Event> {
            self.events.lock().unwrap().clone()
        }
    }

    impl Observer for RecordingObserver {
        fn handle_event(&self, event: &Event) -> storage::Result<()> {
            self.events.lock().unwrap().push(event.clone());
            Ok(())
        }
    }

    impl Observer for std::sync::Arc<RecordingObserver> {
        fn handle_event(&self, event: &Event) -> storage::Result<()> {
            self.as_ref().handle_event(event)
        }
    }
}
