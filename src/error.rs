use thiserror::Error;

#[derive(Error, Debug)]
pub enum TimetableError {
    #[error("Invalid date '{0}': expected YYYY-MM-DD")]
    InvalidDate(String),

    #[error("Invalid time '{0}': expected HH:MM")]
    InvalidTime(String),

    #[error("Invalid weekday '{0}'")]
    InvalidWeekday(String),

    #[error("Configuration error: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, TimetableError>;
