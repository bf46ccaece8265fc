use thiserror::Error;

#[derive(Error, Debug)]
pub enum SignlabError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Camera error: {0}")]
    Camera(#[from] CameraError),

    #[error("Landmark detector error: {details}")]
    Landmarks { details: String },

    #[error("Dataset error: {0}")]
    Dataset(#[from] DatasetError),

    #[error("Training error: {0}")]
    Training(#[from] TrainingError),

    #[error("Credential error: {0}")]
    Credential(#[from] CredentialError),

    #[error("System error: {message}")]
    System { message: String },

    #[error("Component error in {component}: {message}")]
    Component { component: String, message: String },
}

#[derive(Error, Debug)]
pub enum CameraError {
    #[error("failed to open video device {index}: {details}")]
    DeviceOpen { index: u32, details: String },

    #[error("failed to read frame: {details}")]
    FrameRead { details: String },

    #[error("capture pipeline error: {details}")]
    Pipeline { details: String },
}

#[derive(Error, Debug)]
pub enum DatasetError {
    #[error("data directory '{path}' does not exist or is empty")]
    MissingRoot { path: String },

    #[error("no class directories found in '{path}'")]
    NoClasses { path: String },

    #[error("no images found under '{path}'")]
    NoImages { path: String },

    #[error("no landmark rows could be extracted from {images} images")]
    NoRows { images: usize },

    #[error("dataset build was cancelled")]
    Cancelled,
}

#[derive(Error, Debug)]
pub enum TrainingError {
    #[error("dataset file '{path}' does not exist")]
    MissingDataset { path: String },

    #[error("dataset file '{path}' is empty")]
    EmptyDataset { path: String },

    #[error("dataset file '{path}' has no 'label' column")]
    MissingLabelColumn { path: String },

    #[error("dataset holds {found} distinct labels, at least 2 are required")]
    TooFewClasses { found: usize },

    #[error("dataset holds {found} rows, at least 2 are required")]
    TooFewRows { found: usize },

    #[error("failed to split dataset: {details}")]
    Split { details: String },

    #[error("failed to fit model: {details}")]
    Fit { details: String },

    #[error("malformed dataset row {row}: {details}")]
    MalformedRow { row: usize, details: String },
}

#[derive(Error, Debug)]
pub enum CredentialError {
    #[error("username and password must not be empty")]
    EmptyField,

    #[error("passwords do not match")]
    PasswordMismatch,

    #[error("password must be at least {min} characters long")]
    PasswordTooShort { min: usize },

    #[error("user '{username}' already exists")]
    UserExists { username: String },

    #[error("login failed for '{username}': {reason}")]
    LoginFailed { username: String, reason: String },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("password hashing error: {0}")]
    Hashing(#[from] bcrypt::BcryptError),
}

impl SignlabError {
    pub fn system<S: Into<String>>(message: S) -> Self {
        Self::System {
            message: message.into(),
        }
    }

    pub fn component<S: Into<String>>(component: S, message: S) -> Self {
        Self::Component {
            component: component.into(),
            message: message.into(),
        }
    }

    pub fn landmarks<S: Into<String>>(details: S) -> Self {
        Self::Landmarks {
            details: details.into(),
        }
    }

    /// Whether a loop may continue after this error (single frame or single file failures)
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            SignlabError::Io(_)
                | SignlabError::Image(_)
                | SignlabError::Camera(CameraError::FrameRead { .. })
                | SignlabError::Landmarks { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, SignlabError>;
