use clap::Parser;
use std::path::PathBuf;

pub const DEFAULT_ADMIN_EMAIL: &str = "admin@ares.com";
pub const DEFAULT_ADMIN_PASSWORD: &str = "Mestre123";

/// Command-line and environment configuration for the sidecar.
#[derive(Parser, Debug, Clone)]
#[command(name = "aresd")]
#[command(about = "Ares gamified grading sidecar (line-delimited JSON on stdin/stdout)", long_about = None)]
#[command(version)]
pub struct Config {
    /// Workspace directory to open at startup (otherwise wait for workspace.select)
    #[arg(long, env = "ARESD_WORKSPACE")]
    pub workspace: Option<PathBuf>,

    /// Idle minutes before a session token stops being accepted
    #[arg(long, env = "ARESD_SESSION_TTL_MINUTES", default_value_t = 720)]
    pub session_ttl_minutes: i64,

    /// Email of the master admin seeded into new workspaces
    #[arg(long, env = "ARESD_ADMIN_EMAIL", default_value = DEFAULT_ADMIN_EMAIL)]
    pub admin_email: String,

    /// Password of the master admin seeded into new workspaces
    #[arg(long, env = "ARESD_ADMIN_PASSWORD", default_value = DEFAULT_ADMIN_PASSWORD)]
    pub admin_password: String,

    /// Tracing filter, e.g. "aresd=debug"
    #[arg(long = "log", env = "ARESD_LOG", default_value = "aresd=info")]
    pub log_filter: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workspace: None,
            session_ttl_minutes: 720,
            admin_email: DEFAULT_ADMIN_EMAIL.to_string(),
            admin_password: DEFAULT_ADMIN_PASSWORD.to_string(),
            log_filter: "aresd=info".to_string(),
        }
    }
}

impl Config {
    pub fn session_ttl(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.session_ttl_minutes.max(1))
    }
}
