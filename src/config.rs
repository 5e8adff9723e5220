use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use crate::db::config::{env_u32, DbConfig};
use crate::logging::LogConfig;
use crate::services::progress::DEFAULT_MAX_UPSERT_ATTEMPTS;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: IpAddr,
    pub port: u16,
    pub log_level: String,
    pub logging: LogConfig,
    pub db: DbConfig,
    pub max_upsert_attempts: u32,
}

impl Config {
    pub fn from_env() -> Self {
        let port = std::env::var("PORT")
            .ok()
            .and_then(|value| value.parse::<u16>().ok())
            .unwrap_or(3000);

        let host = std::env::var("HOST")
            .ok()
            .and_then(|value| value.parse::<IpAddr>().ok())
            .unwrap_or(IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)));

        let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        Self {
            host,
            port,
            log_level,
            logging: LogConfig::from_env(),
            db: DbConfig::from_env(),
            max_upsert_attempts: env_u32(
                "PROGRESS_MAX_UPSERT_ATTEMPTS",
                DEFAULT_MAX_UPSERT_ATTEMPTS,
            ),
        }
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 3000,
            log_level: "info".to_string(),
            logging: LogConfig::default(),
            db: DbConfig::default(),
            max_upsert_attempts: DEFAULT_MAX_UPSERT_ATTEMPTS,
        }
    }
}
