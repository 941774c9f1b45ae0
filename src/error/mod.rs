use thiserror::Error;

#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("Template not found: {0}")]
    NotFound(String),

    #[error("Failed to load template {id}: {source}")]
    Load {
        id: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Unresolved placeholder: ${{{0}}}")]
    UnresolvedPlaceholder(String),

    #[error("Invalid parameters: {0}")]
    InvalidParams(String),

    #[error("Runtime error: {0}")]
    Runtime(String),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

impl TemplateError {
    /// Build a load error for the given template identifier
    pub fn load(id: impl Into<String>, source: std::io::Error) -> Self {
        TemplateError::Load {
            id: id.into(),
            source,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, TemplateError::NotFound(_))
    }

    /// Short machine-readable code, used as a log field
    pub fn code(&self) -> &'static str {
        match self {
            TemplateError::NotFound(_) => "NOT_FOUND",
            TemplateError::Load { .. } => "LOAD_ERROR",
            TemplateError::UnresolvedPlaceholder(_) => "UNRESOLVED_PLACEHOLDER",
            TemplateError::InvalidParams(_) => "INVALID_PARAMS",
            TemplateError::Runtime(_) => "RUNTIME_ERROR",
            TemplateError::Config(_) => "CONFIG_ERROR",
        }
    }
}

pub type TemplateResult<T> = std::result::Result<T, TemplateError>;
