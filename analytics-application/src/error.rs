use analytics_core::error::CoreError;

#[non_exhaustive]
#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("core: {0}")]
    Core(#[from] CoreError),

    #[error("validation: {0}")]
    Validation(String),
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn core_errors_convert_with_question_mark() {
        fn closed() -> AppResult<()> {
            Err(CoreError::QueueClosed)?
        }
        let err = closed().unwrap_err();
        assert!(matches!(err, AppError::Core(CoreError::QueueClosed)));
        assert!(err.to_string().starts_with("core: "));
    }
}
