use clap::Parser;
use std::env;
use thiserror::Error;

pub const SUPPORTED_REGIONS: [&str; 16] = [
    "local",
    "us-east-1",
    "us-east-2",
    "us-west-1",
    "us-west-2",
    "eu-west-1",
    "ap-southeast-1",
    "ap-northeast-1",
    "ap-south-1",
    "ap-south-2",
    "ap-southeast-2",
    "ap-southeast-3",
    "ap-southeast-4",
    "ap-northeast-2",
    "ap-northeast-3",
    "me-south-1",
];

const DEFAULT_SCAN_PAGE_SIZE: usize = 100;

/// Case-insensitive check against [`SUPPORTED_REGIONS`].
pub fn is_supported_region(region: &str) -> bool {
    SUPPORTED_REGIONS
        .iter()
        .any(|candidate| candidate.eq_ignore_ascii_case(region))
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("required setting `{0}` is not set")]
    Missing(&'static str),
    #[error("setting `{name}` has invalid value `{value}`: {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

/// Settings the thumbnail handlers need. Built once at startup and handed
/// to both the creator and the lister.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Side length of the square thumbnail in pixels.
    pub thumbnail_size: u32,
    pub region_name: String,
    pub table_name: String,
}

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub storage_dir: String,
    pub database_url: String,
    /// Base used to compose public object URLs.
    pub endpoint: String,
    pub scan_page_size: usize,
    pub pipeline: PipelineConfig,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug, Default)]
#[command(author, version, about = "Object-created thumbnail pipeline")]
pub struct Args {
    /// Host to bind to (overrides OBJECT_STORE_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides OBJECT_STORE_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Directory where objects are stored (overrides OBJECT_STORE_STORAGE_DIR)
    #[arg(long)]
    pub storage_dir: Option<String>,

    /// Database URL (overrides OBJECT_STORE_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Public base URL for stored objects (overrides OBJECT_STORE_ENDPOINT)
    #[arg(long)]
    pub endpoint: Option<String>,

    /// Thumbnail side length in pixels (overrides THUMBNAIL_SIZE)
    #[arg(long)]
    pub thumbnail_size: Option<u32>,

    /// Run migrations and exit
    #[arg(long)]
    pub migrate: bool,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and migrate flag.
    pub fn from_env_and_args() -> Result<(Self, bool), ConfigError> {
        let args = Args::parse();
        let migrate = args.migrate;
        let cfg = Self::from_sources(args, |name| env::var(name).ok())?;
        Ok((cfg, migrate))
    }

    /// Merge parsed CLI arguments over values produced by `lookup`.
    pub fn from_sources<F>(args: Args, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env_host = lookup("OBJECT_STORE_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let env_port = parse_optional(&lookup, "OBJECT_STORE_PORT")?.unwrap_or(3000);
        let env_storage =
            lookup("OBJECT_STORE_STORAGE_DIR").unwrap_or_else(|| "./data/objects".into());
        let env_db = lookup("OBJECT_STORE_DATABASE_URL")
            .unwrap_or_else(|| "sqlite://./data/meta/thumbnails.db".into());

        let port = args.port.unwrap_or(env_port);
        let endpoint = args
            .endpoint
            .or_else(|| lookup("OBJECT_STORE_ENDPOINT"))
            .unwrap_or_else(|| format!("http://localhost:{}", port));

        let thumbnail_size = match args.thumbnail_size {
            Some(size) => size,
            None => parse_optional::<u32, _>(&lookup, "THUMBNAIL_SIZE")?
                .ok_or(ConfigError::Missing("THUMBNAIL_SIZE"))?,
        };
        if thumbnail_size == 0 {
            return Err(ConfigError::Invalid {
                name: "THUMBNAIL_SIZE",
                value: thumbnail_size.to_string(),
                reason: "must be greater than zero".into(),
            });
        }

        let region_name = required(&lookup, "REGION_NAME")?;

        let table_name = required(&lookup, "MY_TABLE")?;

        let scan_page_size = parse_optional::<usize, _>(&lookup, "THUMBNAIL_SCAN_PAGE_SIZE")?
            .unwrap_or(DEFAULT_SCAN_PAGE_SIZE);
        if scan_page_size == 0 {
            return Err(ConfigError::Invalid {
                name: "THUMBNAIL_SCAN_PAGE_SIZE",
                value: "0".into(),
                reason: "must be greater than zero".into(),
            });
        }

        Ok(Self {
            host: args.host.unwrap_or(env_host),
            port,
            storage_dir: args.storage_dir.unwrap_or(env_storage),
            database_url: args.database_url.unwrap_or(env_db),
            endpoint: endpoint.trim_end_matches('/').to_string(),
            scan_page_size,
            pipeline: PipelineConfig {
                thumbnail_size,
                region_name,
                table_name,
            },
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn required<F>(lookup: &F, name: &'static str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        Some(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ConfigError::Missing(name)),
    }
}

fn parse_optional<T, F>(lookup: &F, name: &'static str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|err| ConfigError::Invalid {
                name,
                value: value.clone(),
                reason: err.to_string(),
            }),
    }
}
