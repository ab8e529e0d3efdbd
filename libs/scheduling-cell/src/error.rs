use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TimeParseError {
    #[error("Time '{0}' is not in HH:MM format")]
    Format(String),

    #[error("Time '{value}' has a non-numeric {component}")]
    NotNumeric { value: String, component: &'static str },
}
