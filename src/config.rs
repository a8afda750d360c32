//! Server configuration from flags and environment

use std::net::SocketAddr;

use clap::{Parser, Subcommand};

#[derive(Debug, Clone, Parser)]
#[command(name = "academy")]
#[command(about = "Academy server - courses, progress tracking and content approval API")]
#[command(version)]
pub struct Config {
    /// SQLite connection string
    #[arg(long, env = "DATABASE_URL", default_value = "sqlite:academy.db?mode=rwc")]
    pub database_url: String,

    /// Address the HTTP server binds to
    #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0:4000")]
    pub bind_addr: SocketAddr,

    /// Secret used to sign session tokens
    #[arg(long, env = "JWT_SECRET", default_value = "dev-secret", hide_env_values = true)]
    pub jwt_secret: String,

    /// Session token lifetime in hours
    #[arg(long, env = "JWT_TTL_HOURS", default_value_t = 168)]
    pub jwt_ttl_hours: i64,

    /// Origins allowed to call the API with credentials (comma separated)
    #[arg(
        long = "client-origin",
        env = "CLIENT_ORIGIN",
        value_delimiter = ',',
        default_value = "http://localhost:3000"
    )]
    pub client_origins: Vec<String>,

    /// bcrypt work factor for new password hashes
    #[arg(long, env = "BCRYPT_COST", default_value_t = 10)]
    pub bcrypt_cost: u32,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Run the HTTP API (default)
    Serve,
    /// Reset the database and load demo content
    Seed,
}

impl Config {
    pub fn command(&self) -> Command {
        self.command.unwrap_or(Command::Serve)
    }

    /// Configured origins with surrounding whitespace and empty entries removed
    pub fn allowed_origins(&self) -> Vec<String> {
        self.client_origins
            .iter()
            .map(|o| o.trim().to_string())
            .filter(|o| !o.is_empty())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::try_parse_from(["academy"]).unwrap();
        assert_eq!(config.command(), Command::Serve);
        assert_eq!(config.bind_addr.port(), 4000);
        assert_eq!(config.jwt_ttl_hours, 168);
        assert_eq!(config.bcrypt_cost, 10);
    }

    #[test]
    fn test_seed_subcommand() {
        let config = Config::try_parse_from(["academy", "seed"]).unwrap();
        assert_eq!(config.command(), Command::Seed);
    }

    #[test]
    fn test_origin_list() {
        let config = Config::try_parse_from([
            "academy",
            "--client-origin",
            "http://a.test, http://b.test,,",
        ])
        .unwrap();
        assert_eq!(
            config.allowed_origins(),
            vec!["http://a.test".to_string(), "http://b.test".to_string()]
        );
    }
}
