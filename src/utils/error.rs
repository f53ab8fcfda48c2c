use thiserror::Error;

#[derive(Error, Debug)]
pub enum ZoningError {
    #[error("Zip operation failed: {0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("XML parse error: {0}")]
    ParseError(#[from] roxmltree::Error),

    #[error("No XML document found in archive (members: {members:?})")]
    NoDocument { members: Vec<String> },

    #[error("Input is not an XML document: {reason}")]
    NotXml { reason: String },

    #[error("Layer '{layer}' could not be loaded: {message}")]
    LayerError { layer: String, message: String },

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Invalid value for '{field}' ({value}): {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Container,
    Document,
    Layer,
    Configuration,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl ZoningError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            ZoningError::ZipError(_) | ZoningError::NoDocument { .. } => ErrorCategory::Container,
            ZoningError::ParseError(_) | ZoningError::NotXml { .. } => ErrorCategory::Document,
            ZoningError::LayerError { .. } | ZoningError::CsvError(_) => ErrorCategory::Layer,
            ZoningError::ConfigError { .. }
            | ZoningError::InvalidConfigValueError { .. }
            | ZoningError::MissingConfigError { .. } => ErrorCategory::Configuration,
            ZoningError::IoError(_) | ZoningError::SerializationError(_) => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Layer => ErrorSeverity::Medium,
            ErrorCategory::Container | ErrorCategory::Document => ErrorSeverity::High,
            ErrorCategory::Configuration => ErrorSeverity::High,
            ErrorCategory::System => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            ZoningError::NoDocument { .. } => {
                "Make sure the archive contains the extract as .xml or .xml.gz"
            }
            ZoningError::ZipError(_) => "The archive looks damaged; download the extract again",
            ZoningError::ParseError(_) | ZoningError::NotXml { .. } => {
                "Check that the file is an unmodified EGRN/KPT XML extract"
            }
            ZoningError::LayerError { .. } | ZoningError::CsvError(_) => {
                "Check the layer path and that the file is a GeoJSON FeatureCollection"
            }
            ZoningError::ConfigError { .. }
            | ZoningError::InvalidConfigValueError { .. }
            | ZoningError::MissingConfigError { .. } => "Review the layer configuration file",
            ZoningError::IoError(_) => "Check file permissions and that the path exists",
            ZoningError::SerializationError(_) => "Report this as a bug with the input file",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            ZoningError::NoDocument { .. } => "The archive has no XML extract inside".to_string(),
            ZoningError::ParseError(e) => format!("The extract is not valid XML ({})", e),
            ZoningError::NotXml { .. } => "The file is not an XML extract".to_string(),
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ZoningError>;
