#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum RelayError {
    #[error("No credentials configured (set {env_var})")]
    NoCredentials { env_var: String },

    #[error("Malformed request: {0}")]
    MalformedRequest(String),

    #[error("Course selection must contain between {min} and {max} courses, got {count}")]
    InvalidCourseSelection { count: usize, min: usize, max: usize },
}
