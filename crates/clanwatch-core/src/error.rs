use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("not initialized: run 'clanwatch init'")]
    NotInitialized,

    #[error("member already tracked: {0}")]
    AlreadyTracked(String),

    #[error("member not tracked: {0}")]
    NotTracked(String),

    #[error("invalid schedule target {hour:02}:{minute:02}")]
    InvalidTarget { hour: u32, minute: u32 },

    #[error("no schedule targets configured")]
    NoTargets,

    #[error("invalid utc offset: {0} hours")]
    InvalidOffset(i32),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("store error: {0}")]
    Store(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CoreError>;
