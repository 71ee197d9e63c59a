use serde::Deserialize;
use std::env;
use std::fs;
use std::path::Path;

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub google: GoogleConfig,
    #[serde(default)]
    pub upload: UploadConfig,
    #[serde(default)]
    pub http: HttpConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Google platform settings: Firebase Auth project, Firestore database and
/// Cloud Storage bucket, plus the service-account credentials used for
/// server-to-server calls.
#[derive(Debug, Clone, Deserialize)]
pub struct GoogleConfig {
    #[serde(default)]
    pub project_id: String,
    #[serde(default)]
    pub storage_bucket: String,
    #[serde(default)]
    pub client_email: String,
    /// PEM-encoded RSA private key of the service account. Either inline or
    /// via `private_key_path`.
    #[serde(default)]
    pub private_key: String,
    #[serde(default)]
    pub private_key_path: String,
    /// HMAC key pair for V4 signed download URLs.
    #[serde(default)]
    pub hmac_access_id: String,
    #[serde(default)]
    pub hmac_secret: String,
    /// Endpoint overrides, mainly for emulators.
    #[serde(default = "default_firestore_endpoint")]
    pub firestore_endpoint: String,
    #[serde(default = "default_storage_endpoint")]
    pub storage_endpoint: String,
    #[serde(default = "default_identity_certs_url")]
    pub identity_certs_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadConfig {
    /// Maximum accepted file size in bytes.
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    /// Timeout applied to every upstream platform call, in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

// Default values
fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_firestore_endpoint() -> String {
    "https://firestore.googleapis.com".to_string()
}

fn default_storage_endpoint() -> String {
    "https://storage.googleapis.com".to_string()
}

fn default_identity_certs_url() -> String {
    "https://www.googleapis.com/service_accounts/v1/jwk/securetoken@system.gserviceaccount.com"
        .to_string()
}

fn default_max_file_size() -> u64 {
    100 * 1024 * 1024 // 100 MiB
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_file_size: default_max_file_size(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for GoogleConfig {
    fn default() -> Self {
        Self {
            project_id: String::new(),
            storage_bucket: String::new(),
            client_email: String::new(),
            private_key: String::new(),
            private_key_path: String::new(),
            hmac_access_id: String::new(),
            hmac_secret: String::new(),
            firestore_endpoint: default_firestore_endpoint(),
            storage_endpoint: default_storage_endpoint(),
            identity_certs_url: default_identity_certs_url(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            google: GoogleConfig::default(),
            upload: UploadConfig::default(),
            http: HttpConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from file and environment variables
    pub fn load() -> anyhow::Result<Self> {
        let mut config = Self::load_from_file()?;
        config.apply_env_overrides();
        config.resolve_private_key()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from conf.ini or config.toml
    fn load_from_file() -> anyhow::Result<Self> {
        let config_paths = ["conf.ini", "config.toml", "data/conf.ini", "data/config.toml"];

        for path in config_paths {
            if Path::new(path).exists() {
                let content = fs::read_to_string(path)?;
                let config: Config = toml::from_str(&content)?;
                tracing::info!("Loaded configuration from {}", path);
                return Ok(config);
            }
        }

        tracing::info!("No configuration file found, using defaults");
        Ok(Config::default())
    }

    /// Apply environment variable overrides
    /// Format: CK_CONF_<SECTION>_<KEY>
    fn apply_env_overrides(&mut self) {
        // Server overrides
        if let Ok(val) = env::var("CK_CONF_SERVER_HOST") {
            self.server.host = val;
        }
        if let Ok(val) = env::var("CK_CONF_SERVER_PORT") {
            if let Ok(port) = val.parse() {
                self.server.port = port;
            }
        }

        // Google overrides
        if let Ok(val) = env::var("CK_CONF_GOOGLE_PROJECT_ID") {
            self.google.project_id = val;
        }
        if let Ok(val) = env::var("CK_CONF_GOOGLE_STORAGE_BUCKET") {
            self.google.storage_bucket = val;
        }
        if let Ok(val) = env::var("CK_CONF_GOOGLE_CLIENT_EMAIL") {
            self.google.client_email = val;
        }
        if let Ok(val) = env::var("CK_CONF_GOOGLE_PRIVATE_KEY") {
            // Keys passed through env commonly carry escaped newlines
            self.google.private_key = val.replace("\\n", "\n");
        }
        if let Ok(val) = env::var("CK_CONF_GOOGLE_PRIVATE_KEY_PATH") {
            self.google.private_key_path = val;
        }
        if let Ok(val) = env::var("CK_CONF_GOOGLE_HMAC_ACCESS_ID") {
            self.google.hmac_access_id = val;
        }
        if let Ok(val) = env::var("CK_CONF_GOOGLE_HMAC_SECRET") {
            self.google.hmac_secret = val;
        }
        if let Ok(val) = env::var("CK_CONF_GOOGLE_FIRESTORE_ENDPOINT") {
            if !val.trim().is_empty() {
                self.google.firestore_endpoint = val;
            }
        }
        if let Ok(val) = env::var("CK_CONF_GOOGLE_STORAGE_ENDPOINT") {
            if !val.trim().is_empty() {
                self.google.storage_endpoint = val;
            }
        }
        if let Ok(val) = env::var("CK_CONF_GOOGLE_IDENTITY_CERTS_URL") {
            if !val.trim().is_empty() {
                self.google.identity_certs_url = val;
            }
        }

        // Upload overrides
        if let Ok(val) = env::var("CK_CONF_UPLOAD_MAX_FILE_SIZE") {
            if let Ok(size) = val.parse() {
                self.upload.max_file_size = size;
            }
        }

        // HTTP overrides
        if let Ok(val) = env::var("CK_CONF_HTTP_TIMEOUT_SECS") {
            if let Ok(secs) = val.parse() {
                self.http.timeout_secs = secs;
            }
        }
    }

    /// Read the private key from disk when only a path was configured
    fn resolve_private_key(&mut self) -> anyhow::Result<()> {
        if self.google.private_key.is_empty() && !self.google.private_key_path.is_empty() {
            self.google.private_key = fs::read_to_string(&self.google.private_key_path)?;
            tracing::info!(
                "Loaded service account key from {}",
                self.google.private_key_path
            );
        }
        Ok(())
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.google.project_id.is_empty() {
            anyhow::bail!("google.project_id is required (CK_CONF_GOOGLE_PROJECT_ID)");
        }
        if self.google.storage_bucket.is_empty() {
            anyhow::bail!("google.storage_bucket is required (CK_CONF_GOOGLE_STORAGE_BUCKET)");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.upload.max_file_size, 100 * 1024 * 1024);
        assert_eq!(config.http.timeout_secs, 30);
        assert_eq!(
            config.google.firestore_endpoint,
            "https://firestore.googleapis.com"
        );
    }

    #[test]
    fn test_toml_partial_sections() {
        let config: Config = toml::from_str(
            r#"
            [google]
            project_id = "demo-project"
            storage_bucket = "demo-project.appspot.com"

            [http]
            timeout_secs = 5
            "#,
        )
        .unwrap();
        assert_eq!(config.google.project_id, "demo-project");
        assert_eq!(config.http.timeout_secs, 5);
        // Untouched sections fall back to defaults
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(
            config.google.storage_endpoint,
            "https://storage.googleapis.com"
        );
    }
}
