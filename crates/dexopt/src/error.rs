#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config key `{key}`: expected {expected}, found {found}")]
    ConfigType {
        key: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("config parsing error: {0}")]
    ConfigParse(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
