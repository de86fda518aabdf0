//! Configuration module
//!
//! Environment-driven configuration for the dispatch service: server,
//! database, storage backend, and the upload policy knobs consumed by the
//! engine.

use std::env;

use crate::storage_types::StorageBackend;

const SERVER_PORT: u16 = 4000;
const DB_MAX_CONNECTIONS: u32 = 20;
const MAX_FILE_SIZE_MB: u64 = 70;
const DIRECT_THRESHOLD_MB: u64 = 5;
const CHUNK_SIZE_MB: u64 = 1;
const MAX_CONCURRENT_UPLOADS: usize = 4;
const MAX_ATTACHMENTS: usize = 10;

/// Upload policy consumed by the Media Upload Manager.
#[derive(Clone, Debug)]
pub struct UploadPolicy {
    /// Hard ceiling; larger payloads are rejected at validation.
    pub max_file_size_bytes: u64,
    /// Payloads at or below this size attempt a direct upload first.
    pub direct_threshold_bytes: u64,
    /// Fixed chunk size for the chunked strategy.
    pub chunk_size_bytes: u64,
    /// Fan-out bound for simultaneous asset uploads in one submission.
    pub max_concurrent_uploads: usize,
    /// Maximum number of attachments in one submission. Also sizes the HTTP
    /// body limit, so N individually-valid files are never cut off mid-body.
    pub max_attachments: usize,
    /// MIME allowlist; compared case-insensitively with parameters stripped.
    pub allowed_content_types: Vec<String>,
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self {
            max_file_size_bytes: MAX_FILE_SIZE_MB * 1024 * 1024,
            direct_threshold_bytes: DIRECT_THRESHOLD_MB * 1024 * 1024,
            chunk_size_bytes: CHUNK_SIZE_MB * 1024 * 1024,
            max_concurrent_uploads: MAX_CONCURRENT_UPLOADS,
            max_attachments: MAX_ATTACHMENTS,
            allowed_content_types: [
                "image/jpeg",
                "image/png",
                "image/gif",
                "image/webp",
                "video/mp4",
                "audio/mpeg",
                "audio/ogg",
                "application/pdf",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

impl UploadPolicy {
    /// True when the (parameter-stripped, lowercased) MIME type is allowed.
    pub fn allows_content_type(&self, content_type: &str) -> bool {
        let normalized = content_type
            .split(';')
            .next()
            .map(str::trim)
            .unwrap_or(content_type)
            .to_lowercase();
        self.allowed_content_types
            .iter()
            .any(|ct| normalized == ct.to_lowercase())
    }
}

/// Application configuration.
#[derive(Clone, Debug)]
pub struct Config {
    pub server_port: u16,
    pub database_url: String,
    pub db_max_connections: u32,
    pub storage_backend: StorageBackend,
    // S3-compatible providers (MinIO, DigitalOcean Spaces, Supabase Storage)
    pub s3_region: Option<String>,
    pub s3_endpoint: Option<String>,
    // Local filesystem backend
    pub local_storage_path: Option<String>,
    pub local_storage_base_url: Option<String>,
    pub upload_policy: UploadPolicy,
}

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let storage_backend = env::var("STORAGE_BACKEND")
            .unwrap_or_else(|_| "s3".to_string())
            .parse()?;

        let max_file_size_mb = env::var("MAX_FILE_SIZE_MB")
            .unwrap_or_else(|_| MAX_FILE_SIZE_MB.to_string())
            .parse::<u64>()
            .unwrap_or(MAX_FILE_SIZE_MB);

        let direct_threshold_mb = env::var("DIRECT_UPLOAD_THRESHOLD_MB")
            .unwrap_or_else(|_| DIRECT_THRESHOLD_MB.to_string())
            .parse::<u64>()
            .unwrap_or(DIRECT_THRESHOLD_MB);

        let chunk_size_mb = env::var("UPLOAD_CHUNK_SIZE_MB")
            .unwrap_or_else(|_| CHUNK_SIZE_MB.to_string())
            .parse::<u64>()
            .unwrap_or(CHUNK_SIZE_MB);

        let max_concurrent_uploads = env::var("MAX_CONCURRENT_UPLOADS")
            .unwrap_or_else(|_| MAX_CONCURRENT_UPLOADS.to_string())
            .parse::<usize>()
            .unwrap_or(MAX_CONCURRENT_UPLOADS);

        let max_attachments = env::var("MAX_ATTACHMENTS")
            .unwrap_or_else(|_| MAX_ATTACHMENTS.to_string())
            .parse::<usize>()
            .unwrap_or(MAX_ATTACHMENTS);

        let defaults = UploadPolicy::default();
        let allowed_content_types = match env::var("ALLOWED_CONTENT_TYPES") {
            Ok(s) => s.split(',').map(|s| s.trim().to_lowercase()).collect(),
            Err(_) => defaults.allowed_content_types,
        };

        Ok(Config {
            server_port: env::var("PORT")
                .unwrap_or_else(|_| SERVER_PORT.to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number"))?,
            database_url: env::var("DATABASE_URL")
                .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?,
            db_max_connections: env::var("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|_| DB_MAX_CONNECTIONS.to_string())
                .parse()
                .unwrap_or(DB_MAX_CONNECTIONS),
            storage_backend,
            s3_region: env::var("S3_REGION")
                .or_else(|_| env::var("AWS_REGION"))
                .ok(),
            s3_endpoint: env::var("S3_ENDPOINT").ok(),
            local_storage_path: env::var("LOCAL_STORAGE_PATH").ok(),
            local_storage_base_url: env::var("LOCAL_STORAGE_BASE_URL").ok(),
            upload_policy: UploadPolicy {
                max_file_size_bytes: max_file_size_mb * 1024 * 1024,
                direct_threshold_bytes: direct_threshold_mb * 1024 * 1024,
                chunk_size_bytes: chunk_size_mb * 1024 * 1024,
                max_concurrent_uploads,
                max_attachments,
                allowed_content_types,
            },
        })
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if !self.database_url.starts_with("postgresql://")
            && !self.database_url.starts_with("postgres://")
        {
            return Err(anyhow::anyhow!(
                "DATABASE_URL must be a valid PostgreSQL connection string"
            ));
        }

        let policy = &self.upload_policy;
        if policy.chunk_size_bytes == 0 {
            return Err(anyhow::anyhow!("UPLOAD_CHUNK_SIZE_MB must be greater than 0"));
        }
        if policy.direct_threshold_bytes > policy.max_file_size_bytes {
            return Err(anyhow::anyhow!(
                "DIRECT_UPLOAD_THRESHOLD_MB cannot exceed MAX_FILE_SIZE_MB"
            ));
        }
        if policy.max_concurrent_uploads == 0 {
            return Err(anyhow::anyhow!(
                "MAX_CONCURRENT_UPLOADS must be greater than 0"
            ));
        }
        if policy.max_attachments == 0 {
            return Err(anyhow::anyhow!("MAX_ATTACHMENTS must be greater than 0"));
        }

        match self.storage_backend {
            StorageBackend::S3 => {
                if self.s3_region.is_none() {
                    return Err(anyhow::anyhow!(
                        "S3_REGION or AWS_REGION must be set when using S3 storage backend"
                    ));
                }
            }
            StorageBackend::Local => {
                if self.local_storage_path.is_none() {
                    return Err(anyhow::anyhow!(
                        "LOCAL_STORAGE_PATH must be set when using local storage backend"
                    ));
                }
                if self.local_storage_base_url.is_none() {
                    return Err(anyhow::anyhow!(
                        "LOCAL_STORAGE_BASE_URL must be set when using local storage backend"
                    ));
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_matches_dispatch_limits() {
        let policy = UploadPolicy::default();
        assert_eq!(policy.max_file_size_bytes, 70 * 1024 * 1024);
        assert_eq!(policy.direct_threshold_bytes, 5 * 1024 * 1024);
        assert_eq!(policy.chunk_size_bytes, 1024 * 1024);
        assert_eq!(policy.max_attachments, 10);
    }

    #[test]
    fn content_type_allowlist_ignores_parameters_and_case() {
        let policy = UploadPolicy::default();
        assert!(policy.allows_content_type("image/jpeg"));
        assert!(policy.allows_content_type("Image/JPEG; charset=utf-8"));
        assert!(!policy.allows_content_type("application/x-msdownload"));
    }
}
