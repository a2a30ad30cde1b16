use coviddash::error::CoviddashError;
use polars::error::PolarsError;

#[derive(thiserror::Error, Debug)]
pub enum CoviddashCliError {
    #[error("Anyhow error")]
    Anyhow(#[from] anyhow::Error),
    #[error("coviddash error")]
    CoviddashError(#[from] CoviddashError),
    #[error("polars error")]
    PolarsError(#[from] PolarsError),
    #[error("std IO error")]
    IOError(#[from] std::io::Error),
}

pub type CoviddashCliResult<T> = Result<T, CoviddashCliError>;
