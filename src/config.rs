use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SignlabConfig {
    pub camera: CameraConfig,
    pub collection: CollectionConfig,
    pub dataset: DatasetConfig,
    pub model: ModelConfig,
    pub landmarks: LandmarkConfig,
    pub inference: InferenceConfig,
    pub credentials: CredentialConfig,
    pub system: SystemConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CameraConfig {
    /// Camera device index (e.g., 0 for /dev/video0)
    #[serde(default = "default_camera_index")]
    pub index: u32,

    /// Camera resolution (width, height)
    #[serde(default = "default_camera_resolution")]
    pub resolution: (u32, u32),

    /// Frames per second
    #[serde(default = "default_camera_fps")]
    pub fps: u32,

    /// Back-off after a failed frame read, in milliseconds
    #[serde(default = "default_read_retry_ms")]
    pub read_retry_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CollectionConfig {
    /// Root of the class-indexed image tree
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DatasetConfig {
    /// Output path of the landmark feature table
    #[serde(default = "default_dataset_path")]
    pub path: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ModelConfig {
    /// Path of the persisted classifier
    #[serde(default = "default_model_path")]
    pub path: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LandmarkConfig {
    /// Interpreter used to launch the hand detector helper
    #[serde(default = "default_helper_command")]
    pub helper_command: String,

    /// Hand detector helper script
    #[serde(default = "default_helper_script")]
    pub helper_script: String,

    /// Detections scoring below this are treated as "no hand"
    #[serde(default = "default_min_detection_confidence")]
    pub min_detection_confidence: f32,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct InferenceConfig {
    /// Path to TrueType font file for prediction labels
    #[serde(default = "default_font_path")]
    pub font_path: String,

    /// Font size for prediction labels
    #[serde(default = "default_font_size")]
    pub font_size: f32,

    /// Bounding box line thickness in pixels
    #[serde(default = "default_box_thickness")]
    pub box_thickness: u32,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CredentialConfig {
    /// SQLx connection URL of the users database
    #[serde(default = "default_database_url")]
    pub database_url: String,

    /// bcrypt work factor
    #[serde(default = "default_bcrypt_cost")]
    pub bcrypt_cost: u32,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SystemConfig {
    /// Event bus capacity
    #[serde(default = "default_event_bus_capacity")]
    pub event_bus_capacity: usize,
}

impl SignlabConfig {
    /// Load configuration from default sources (file + environment variables)
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_file("signlab.toml")
    }

    /// Load configuration from a specific file path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy();
        debug!("Loading configuration from: {}", path_str);

        let settings = Config::builder()
            .set_default("camera.index", default_camera_index())?
            .set_default(
                "camera.resolution",
                vec![default_camera_resolution().0, default_camera_resolution().1],
            )?
            .set_default("camera.fps", default_camera_fps())?
            .set_default("camera.read_retry_ms", default_read_retry_ms())?
            .set_default("collection.data_dir", default_data_dir())?
            .set_default("dataset.path", default_dataset_path())?
            .set_default("model.path", default_model_path())?
            .set_default("landmarks.helper_command", default_helper_command())?
            .set_default("landmarks.helper_script", default_helper_script())?
            .set_default(
                "landmarks.min_detection_confidence",
                default_min_detection_confidence() as f64,
            )?
            .set_default("inference.font_path", default_font_path())?
            .set_default("inference.font_size", default_font_size() as f64)?
            .set_default("inference.box_thickness", default_box_thickness())?
            .set_default("credentials.database_url", default_database_url())?
            .set_default("credentials.bcrypt_cost", default_bcrypt_cost())?
            .set_default(
                "system.event_bus_capacity",
                default_event_bus_capacity() as i64,
            )?
            .add_source(File::with_name(&path_str).required(false))
            .add_source(Environment::with_prefix("SIGNLAB").separator("_"))
            .build()?;

        let config: SignlabConfig = settings.try_deserialize()?;

        info!("Configuration loaded successfully");
        debug!("Final configuration: {:#?}", config);

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.camera.resolution.0 == 0 || self.camera.resolution.1 == 0 {
            return Err(ConfigError::Message(
                "Camera resolution must be greater than 0".to_string(),
            ));
        }

        if self.camera.fps == 0 {
            return Err(ConfigError::Message(
                "Camera fps must be greater than 0".to_string(),
            ));
        }

        for (name, value) in [
            ("collection.data_dir", &self.collection.data_dir),
            ("dataset.path", &self.dataset.path),
            ("model.path", &self.model.path),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::Message(format!("{} must not be empty", name)));
            }
        }

        if !(0.0..=1.0).contains(&self.landmarks.min_detection_confidence) {
            return Err(ConfigError::Message(
                "Landmark min_detection_confidence must be within 0.0..=1.0".to_string(),
            ));
        }

        if self.inference.font_size <= 0.0 {
            return Err(ConfigError::Message(
                "Inference font_size must be greater than 0".to_string(),
            ));
        }

        // bcrypt rejects costs outside 4..=31
        if !(4..=31).contains(&self.credentials.bcrypt_cost) {
            return Err(ConfigError::Message(
                "Credential bcrypt_cost must be within 4..=31".to_string(),
            ));
        }

        if self.system.event_bus_capacity == 0 {
            return Err(ConfigError::Message(
                "Event bus capacity must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    pub fn data_dir(&self) -> PathBuf {
        PathBuf::from(&self.collection.data_dir)
    }

    pub fn dataset_path(&self) -> PathBuf {
        PathBuf::from(&self.dataset.path)
    }

    pub fn model_path(&self) -> PathBuf {
        PathBuf::from(&self.model.path)
    }

    /// Default configuration rendered as TOML
    pub fn default_toml() -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(&Self::default())
    }
}

impl Default for SignlabConfig {
    fn default() -> Self {
        Self {
            camera: CameraConfig {
                index: default_camera_index(),
                resolution: default_camera_resolution(),
                fps: default_camera_fps(),
                read_retry_ms: default_read_retry_ms(),
            },
            collection: CollectionConfig {
                data_dir: default_data_dir(),
            },
            dataset: DatasetConfig {
                path: default_dataset_path(),
            },
            model: ModelConfig {
                path: default_model_path(),
            },
            landmarks: LandmarkConfig {
                helper_command: default_helper_command(),
                helper_script: default_helper_script(),
                min_detection_confidence: default_min_detection_confidence(),
            },
            inference: InferenceConfig {
                font_path: default_font_path(),
                font_size: default_font_size(),
                box_thickness: default_box_thickness(),
            },
            credentials: CredentialConfig {
                database_url: default_database_url(),
                bcrypt_cost: default_bcrypt_cost(),
            },
            system: SystemConfig {
                event_bus_capacity: default_event_bus_capacity(),
            },
        }
    }
}

// Default value functions
fn default_camera_index() -> u32 {
    0
}
fn default_camera_resolution() -> (u32, u32) {
    (640, 480)
}
fn default_camera_fps() -> u32 {
    30
}
fn default_read_retry_ms() -> u64 {
    100
}

fn default_data_dir() -> String {
    "./data".to_string()
}
fn default_dataset_path() -> String {
    "./dataset.csv".to_string()
}
fn default_model_path() -> String {
    "./model.json".to_string()
}

fn default_helper_command() -> String {
    "python3".to_string()
}
fn default_helper_script() -> String {
    "hand_detect.py".to_string()
}
fn default_min_detection_confidence() -> f32 {
    0.3
}

fn default_font_path() -> String {
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf".to_string()
}
fn default_font_size() -> f32 {
    32.0
}
fn default_box_thickness() -> u32 {
    4
}

fn default_database_url() -> String {
    "sqlite://users.db".to_string()
}
fn default_bcrypt_cost() -> u32 {
    12
}

fn default_event_bus_capacity() -> usize {
    256
}
