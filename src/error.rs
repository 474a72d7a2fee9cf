use thiserror::Error;

/// Errors that can occur while fetching, parsing, or resolving a VAST ad
#[derive(Error, Debug)]
pub enum AdError {
    #[error("Failed to parse XML: {0}")]
    XmlParse(#[from] quick_xml::Error),

    #[error("Failed to read file: {0}")]
    Io(#[from] std::io::Error),

    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Wrapper depth limit of {0} exceeded")]
    WrapperDepthExceeded(usize),

    #[error("No ad with a linear creative in the document")]
    NoLinearCreative,

    #[error("Linear creative declares no media files")]
    NoMediaFiles,

    #[error("Unknown error: {0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, AdError>;
