pub type KosmaResult<T> = Result<T, KosmaError>;

#[derive(thiserror::Error, Debug)]
pub enum KosmaError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("render error: {0}")]
    Render(String),

    #[error("export error: {0}")]
    Export(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl KosmaError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render(msg.into())
    }

    pub fn export(msg: impl Into<String>) -> Self {
        Self::Export(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_prefixes_are_stable() {
        assert!(
            KosmaError::validation("x")
                .to_string()
                .contains("validation error:")
        );
        assert!(KosmaError::decode("x").to_string().contains("decode error:"));
        assert!(KosmaError::render("x").to_string().contains("render error:"));
        assert!(KosmaError::export("x").to_string().contains("export error:"));
    }

    #[test]
    fn other_preserves_source() {
        let base = std::io::Error::other("boom");
        let err = KosmaError::Other(anyhow::Error::new(base));
        assert!(err.to_string().contains("boom"));
    }
}
