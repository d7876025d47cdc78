use thiserror::Error;

use crate::object_store::DEFAULT_SIGNED_URL_EXPIRY_SECS;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_address: String,
    pub data_dir: String,
    pub storage: StorageConfig,
    /// Maximum upload size in bytes
    pub max_upload_size: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Gcs,
    Local,
    S3,
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Directory for the local storage backend
    pub local_storage_path: String,
    /// Base URL under which the local directory is served; without it the
    /// local backend cannot issue retrieval URLs
    pub local_public_url: Option<String>,
    /// S3 settings (bucket required when backend is s3)
    pub s3_bucket: Option<String>,
    pub s3_region: Option<String>,
    /// Custom endpoint for S3-compatible services (MinIO, R2)
    pub s3_endpoint: Option<String>,
    pub s3_access_key: Option<String>,
    pub s3_secret_key: Option<String>,
    /// GCS bucket name (required when backend is gcs)
    pub gcs_bucket: Option<String>,
    /// Path to GCS service account JSON (optional, defaults to ADC)
    pub gcs_credentials_file: Option<String>,
    /// Default signed-URL expiry in seconds
    pub signed_url_expiry_secs: u64,
}

impl StorageConfig {
    /// Logical storage area recorded on each file row.
    pub fn bucket_label(&self) -> String {
        match self.backend {
            StorageBackend::Local => "local".to_string(),
            StorageBackend::S3 => self.s3_bucket.clone().unwrap_or_default(),
            StorageBackend::Gcs => self.gcs_bucket.clone().unwrap_or_default(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Local,
            local_storage_path: "./files".to_string(),
            local_public_url: None,
            s3_bucket: None,
            s3_region: None,
            s3_endpoint: None,
            s3_access_key: None,
            s3_secret_key: None,
            gcs_bucket: None,
            gcs_credentials_file: None,
            signed_url_expiry_secs: DEFAULT_SIGNED_URL_EXPIRY_SECS,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        let bind_address =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:8080".to_string());

        let data_dir = std::env::var("DATA_DIR").unwrap_or_else(|_| "./data".to_string());

        let max_upload_size = std::env::var("MAX_UPLOAD_SIZE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(50 * 1024 * 1024); // 50MB

        let backend = match std::env::var("STORAGE_BACKEND")
            .unwrap_or_else(|_| "local".to_string())
            .to_lowercase()
            .as_str()
        {
            "gcs" => StorageBackend::Gcs,
            "s3" => StorageBackend::S3,
            _ => StorageBackend::Local,
        };

        let signed_url_expiry_secs = std::env::var("SIGNED_URL_EXPIRY")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_SIGNED_URL_EXPIRY_SECS);

        let config = Config {
            bind_address,
            data_dir,
            storage: StorageConfig {
                backend,
                local_storage_path: std::env::var("LOCAL_STORAGE_PATH")
                    .unwrap_or_else(|_| "./files".to_string()),
                local_public_url: std::env::var("LOCAL_PUBLIC_URL").ok(),
                s3_bucket: std::env::var("S3_BUCKET").ok(),
                s3_region: std::env::var("S3_REGION").ok(),
                s3_endpoint: std::env::var("S3_ENDPOINT").ok(),
                s3_access_key: std::env::var("S3_ACCESS_KEY").ok(),
                s3_secret_key: std::env::var("S3_SECRET_KEY").ok(),
                gcs_bucket: std::env::var("GCS_BUCKET").ok(),
                gcs_credentials_file: std::env::var("GCS_CREDENTIALS_FILE").ok(),
                signed_url_expiry_secs,
            },
            max_upload_size,
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.storage.backend == StorageBackend::S3 && self.storage.s3_bucket.is_none() {
            return Err(ConfigError::ValidationError(
                "S3_BUCKET is required when STORAGE_BACKEND=s3".to_string(),
            ));
        }

        if self.storage.backend == StorageBackend::Gcs && self.storage.gcs_bucket.is_none() {
            return Err(ConfigError::ValidationError(
                "GCS_BUCKET is required when STORAGE_BACKEND=gcs".to_string(),
            ));
        }

        if self.storage.signed_url_expiry_secs == 0 {
            return Err(ConfigError::ValidationError(
                "SIGNED_URL_EXPIRY must be greater than 0".to_string(),
            ));
        }

        if self.max_upload_size == 0 {
            return Err(ConfigError::ValidationError(
                "MAX_UPLOAD_SIZE must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}
