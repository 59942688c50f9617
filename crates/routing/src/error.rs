#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("no agent matched the request and no default agent is configured")]
    NotConfigured,
}

pub type Result<T> = std::result::Result<T, Error>;
