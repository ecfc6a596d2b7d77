use crate::db::DEFAULT_DB_FILE;
use log::info;
use std::env;
use std::path::PathBuf;
use tokio::sync::Mutex;
use url::Url;

pub const DEFAULT_WEIGHTS: &str = "bestyolo11.pt";

#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: PathBuf,
    pub port: u16,
    pub ocr_url: Url,
    pub detect_url: Url,
    pub weights: PathBuf,
    pub annotated_dir: PathBuf,
    pub weights_dir: PathBuf,
    pub upload_limit: u64,
}

impl Config {
    pub fn from_env() -> Result<Config, failure::Error> {
        Config::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Config, failure::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());
        let parse_url = |key: &str, default: &str| {
            let value = var(key, default);
            Url::parse(&value).map_err(|e| format_err!("Invalid {} '{}': {}", key, value, e))
        };

        let port = var("LISTEN_PORT", "8402");
        let upload_limit_mb = var("UPLOAD_LIMIT_MB", "64");
        Ok(Config {
            db_path: var("PLATES_DB", DEFAULT_DB_FILE).into(),
            port: port
                .parse()
                .map_err(|e| format_err!("Invalid LISTEN_PORT '{}': {}", port, e))?,
            ocr_url: parse_url("OCR_URL", "http://localhost:8501/ocr")?,
            detect_url: parse_url("DETECT_URL", "http://localhost:8501/detect")?,
            weights: var("YOLO_WEIGHTS", DEFAULT_WEIGHTS).into(),
            annotated_dir: var("ANNOTATED_DIR", "annotated").into(),
            weights_dir: var("WEIGHTS_DIR", "weights").into(),
            upload_limit: upload_limit_mb
                .parse::<u64>()
                .map_err(|e| format_err!("Invalid UPLOAD_LIMIT_MB '{}': {}", upload_limit_mb, e))?
                .checked_mul(1024 * 1024)
                .ok_or_else(|| format_err!("Invalid UPLOAD_LIMIT_MB '{}': too large", upload_limit_mb))?,
        })
    }
}

/// Location of the detector weights. Read by the detector on every call and
/// replaced when new weights are uploaded.
#[derive(Debug)]
pub struct ModelWeights {
    path: Mutex<PathBuf>,
}

impl ModelWeights {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        ModelWeights {
            path: Mutex::new(path.into()),
        }
    }

    pub async fn current(&self) -> PathBuf {
        self.path.lock().await.clone()
    }

    /// Returns the new effective path.
    pub async fn update<P: Into<PathBuf>>(&self, path: P) -> PathBuf {
        let mut current = self.path.lock().await;
        *current = path.into();
        info!("Detector weights set to {:?}", *current);
        current.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_with(vars: &[(&str, &str)]) -> Result<Config, failure::Error> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = config_with(&[]).unwrap();
        assert_eq!(config.db_path, PathBuf::from("database.txt"));
        assert_eq!(config.port, 8402);
        assert_eq!(config.weights, PathBuf::from(DEFAULT_WEIGHTS));
        assert_eq!(config.ocr_url.path(), "/ocr");
        assert_eq!(config.upload_limit, 64 * 1024 * 1024);
    }

    #[test]
    fn variables_override_defaults() {
        let config = config_with(&[
            ("PLATES_DB", "/data/plates.txt"),
            ("LISTEN_PORT", "9000"),
            ("DETECT_URL", "http://yolo:5000/predict"),
        ])
        .unwrap();
        assert_eq!(config.db_path, PathBuf::from("/data/plates.txt"));
        assert_eq!(config.port, 9000);
        assert_eq!(config.detect_url.host_str(), Some("yolo"));
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(config_with(&[("LISTEN_PORT", "http")]).is_err());
        assert!(config_with(&[("OCR_URL", "not a url")]).is_err());
        assert!(config_with(&[("UPLOAD_LIMIT_MB", "-1")]).is_err());
        assert!(config_with(&[("UPLOAD_LIMIT_MB", "18446744073709551615")]).is_err());
    }

    #[tokio::test]
    async fn weights_update_returns_new_path() {
        let weights = ModelWeights::new(DEFAULT_WEIGHTS);
        assert_eq!(weights.current().await, PathBuf::from(DEFAULT_WEIGHTS));
        let updated = weights.update("weights/custom.pt").await;
        assert_eq!(updated, PathBuf::from("weights/custom.pt"));
        assert_eq!(weights.current().await, updated);
    }
}
