use derive_more::Display;
use log::LevelFilter;

/// The smetrics binary for which logging is set up.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum Component {
    #[display("server")]
    Server,
    #[display("agent")]
    Agent,
}

impl Component {
    /// Returns the third-party targets which are too chatty at the root level of the component.
    pub fn quiet_targets(&self) -> &'static [(&'static str, LevelFilter)] {
        match self {
            Component::Server => &[
                ("h2", LevelFilter::Info),
                ("hyper", LevelFilter::Info),
                ("hyper_util", LevelFilter::Info),
                ("mio", LevelFilter::Info),
                ("sqlx", LevelFilter::Warn),
                ("tower_http", LevelFilter::Info),
            ],
            Component::Agent => &[
                ("hyper", LevelFilter::Info),
                ("hyper_util", LevelFilter::Info),
                ("mio", LevelFilter::Info),
                ("reqwest", LevelFilter::Info),
            ],
        }
    }
}
