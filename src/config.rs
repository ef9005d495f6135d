use std::env;
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

const DEFAULT_SESSION_SECRET: &str = "default_session_secret_change_me";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {message}")]
    Invalid { key: String, message: String },
}

/// Which frame classifier answers `/process_frame`.
#[derive(Debug, Clone, PartialEq)]
pub enum DetectionPolicy {
    /// Ignore the frame and report a face with fixed probability.
    Simulated { probability: f64 },
    /// Haar cascade loaded from an OpenCV XML file.
    Cascade {
        path: PathBuf,
        scale_factor: f64,
        min_neighbors: usize,
    },
    /// Share of skin-coloured pixels above a percentage.
    SkinTone { threshold_percent: f64 },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub workers: usize,
    pub data_dir: PathBuf,
    pub upload_dir: PathBuf,
    pub static_dir: PathBuf,
    pub session_secret: String,
    pub session_ttl_hours: i64,
    pub max_upload_bytes: usize,
    pub detection: DetectionPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            workers: 1,
            data_dir: PathBuf::from("data"),
            upload_dir: PathBuf::from("static/images/uploads"),
            static_dir: PathBuf::from("static"),
            session_secret: DEFAULT_SESSION_SECRET.to_string(),
            session_ttl_hours: 24 * 7,
            max_upload_bytes: 16 * 1024 * 1024,
            detection: DetectionPolicy::Simulated { probability: 0.75 },
        }
    }
}

impl Config {
    /// Read configuration from the environment, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Config::default();

        let session_secret = env::var("SESSION_SECRET").unwrap_or_else(|_| {
            log::warn!("SESSION_SECRET not set, using default (not secure for production!)");
            defaults.session_secret.clone()
        });

        let detection = match env::var("DETECTION_POLICY")
            .unwrap_or_else(|_| "simulated".to_string())
            .to_ascii_lowercase()
            .as_str()
        {
            "simulated" => DetectionPolicy::Simulated {
                probability: finite_var("FACE_PROBABILITY", 0.75)?,
            },
            "cascade" => DetectionPolicy::Cascade {
                path: env::var("CASCADE_PATH")
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| PathBuf::from("haarcascade_frontalface_default.xml")),
                scale_factor: finite_var("CASCADE_SCALE_FACTOR", 1.1)?,
                min_neighbors: parse_var("CASCADE_MIN_NEIGHBORS", 4)?,
            },
            "skin" => DetectionPolicy::SkinTone {
                threshold_percent: finite_var("SKIN_THRESHOLD_PERCENT", 2.0)?,
            },
            other => {
                return Err(ConfigError::Invalid {
                    key: "DETECTION_POLICY".to_string(),
                    message: format!("unknown policy '{}'", other),
                })
            }
        };

        Ok(Self {
            host: env::var("HOST").unwrap_or(defaults.host),
            port: parse_var("PORT", defaults.port)?,
            workers: parse_var("WORKERS", defaults.workers)?,
            data_dir: path_var("DATA_DIR", defaults.data_dir),
            upload_dir: path_var("UPLOAD_DIR", defaults.upload_dir),
            static_dir: path_var("STATIC_DIR", defaults.static_dir),
            session_secret,
            session_ttl_hours: parse_var("SESSION_TTL_HOURS", defaults.session_ttl_hours)?,
            max_upload_bytes: parse_var("MAX_UPLOAD_BYTES", defaults.max_upload_bytes)?,
            detection,
        })
    }
}

fn parse_var<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    match env::var(key) {
        Ok(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            key: key.to_string(),
            message: e.to_string(),
        }),
        Err(_) => Ok(default),
    }
}

/// Like `parse_var`, but `NaN` and infinities are rejected.
fn finite_var(key: &str, default: f64) -> Result<f64, ConfigError> {
    let value: f64 = parse_var(key, default)?;
    if !value.is_finite() {
        return Err(ConfigError::Invalid {
            key: key.to_string(),
            message: format!("expected a finite number, got {}", value),
        });
    }
    Ok(value)
}

fn path_var(key: &str, default: PathBuf) -> PathBuf {
    env::var(key).map(PathBuf::from).unwrap_or(default)
}
