use std::path::PathBuf;

const DEFAULT_MODEL_PATH: &str = "./models/model.onnx";
const DEFAULT_CORS_ORIGINS: &str = "http://localhost:3000";
const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8000;

pub fn model_path() -> PathBuf {
    std::env::var("MODEL_PATH")
        .unwrap_or_else(|_| DEFAULT_MODEL_PATH.to_string())
        .into()
}

pub fn cors_origins() -> Vec<String> {
    let raw = std::env::var("CORS_ORIGINS").unwrap_or_else(|_| DEFAULT_CORS_ORIGINS.to_string());
    parse_origins(&raw)
}

/// Splits a comma-separated origin list, dropping blank entries.
pub fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|origin| origin.trim())
        .filter(|origin| !origin.is_empty())
        .map(|origin| origin.to_string())
        .collect()
}

#[derive(Clone, Debug, PartialEq)]
pub struct ServeConfig {
    pub model_path: PathBuf,
    pub cors_origins: Vec<String>,
    pub host: String,
    pub port: u16,
}

fn default_model_path() -> PathBuf {
    PathBuf::from(DEFAULT_MODEL_PATH)
}

fn default_cors_origins() -> Vec<String> {
    parse_origins(DEFAULT_CORS_ORIGINS)
}

fn default_host() -> String {
    String::from(DEFAULT_HOST)
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

impl Default for ServeConfig {
    fn default() -> Self {
        ServeConfig {
            model_path: default_model_path(),
            cors_origins: default_cors_origins(),
            host: default_host(),
            port: default_port(),
        }
    }
}

impl ServeConfig {
    /// Reads the environment once; unset or unparsable values fall back to defaults.
    pub fn from_env() -> Self {
        let host = std::env::var("MLSERVE_HOST").unwrap_or_else(|_| default_host());
        let port = std::env::var("MLSERVE_PORT")
            .ok()
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or_else(default_port);

        ServeConfig {
            model_path: model_path(),
            cors_origins: cors_origins(),
            host,
            port,
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
