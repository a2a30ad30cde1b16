//! Error types.

#[derive(thiserror::Error, Debug)]
pub enum CoviddashError {
    #[error("Wrapped anyhow error: {0}")]
    AnyhowError(#[from] anyhow::Error),
    #[error("Wrapped polars error: {0}")]
    PolarsError(#[from] polars::error::PolarsError),
    #[error("Wrapped reqwest error: {0}")]
    RequestError(#[from] reqwest::Error),
    #[error("Wrapped IO error: {0}")]
    IoError(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use anyhow::anyhow;

    use super::*;

    #[test]
    fn test_anyhow() {
        let anyhow_error = anyhow!("An anyhow error");
        let coviddash_error: CoviddashError = anyhow_error.into();
        println!("{}", coviddash_error);
    }
}
