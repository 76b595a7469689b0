use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum Error {
    /// The stylesheet document is not a usable stylesheet.
    #[error("stylesheet error: {0}")]
    Load(String),
    /// A document failed to parse.
    #[error(transparent)]
    Parse(#[from] angle_xml::ParseError),
    /// An XPath compile or evaluation failure.
    #[error(transparent)]
    Xpath(#[from] angle_xpath::Error),
    /// `xsl:message terminate="yes"`.
    #[error("transformation terminated: {0}")]
    Terminate(String),
    #[error("io error: {0}")]
    Io(String),
}

impl Error {
    /// Whether `xsl:try` may catch this error. Termination and cancellation
    /// always propagate.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Error::Terminate(_) => false,
            Error::Xpath(err) => err.is_recoverable(),
            _ => true,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}
