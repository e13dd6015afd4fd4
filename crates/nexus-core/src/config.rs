use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_PORT: u16 = 8788;
pub const DEFAULT_BIND: &str = "127.0.0.1";
pub const DEFAULT_BRANCH: &str = "main";
pub const DEFAULT_SERVICES_PATH: &str = "tofu/services.tfvars";
pub const DEFAULT_API_BASE: &str = "https://api.github.com";
pub const DEFAULT_RUN_LIMIT: u32 = 20; // workflow runs inspected per status query
pub const DEFAULT_TIMEOUT_SECS: u64 = 15;
pub const DEFAULT_TICK_SECS: u64 = 60;
pub const DEFAULT_CRON_LABEL: &str = "* * * * *";

/// Top-level config (nexus.toml + NEXUS_* env overrides).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NexusConfig {
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Absent until owner/repo/token are provided; endpoints that need the
    /// remote job runner fail with `NotConfigured` while it is missing.
    #[serde(default)]
    pub github: Option<GithubConfig>,
    #[serde(default)]
    pub scheduler: SchedulerSettings,
    #[serde(default)]
    pub notify: NotifyConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            bind: DEFAULT_BIND.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Binding to the GitHub repository that hosts the deploy workflows and the
/// declarative services file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GithubConfig {
    pub owner: String,
    pub repo: String,
    pub token: String,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_branch")]
    pub branch: String,
    #[serde(default = "default_services_path")]
    pub services_path: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_run_limit")]
    pub run_limit: u32,
    #[serde(default)]
    pub workflows: WorkflowFiles,
}

/// Workflow file names used both to dispatch jobs and to classify runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowFiles {
    #[serde(default = "default_deploy_file")]
    pub deploy: String,
    #[serde(default = "default_teardown_file")]
    pub teardown: String,
    #[serde(default = "default_destroy_file")]
    pub destroy: String,
    #[serde(default = "default_spin_up_file")]
    pub spin_up: String,
}

impl Default for WorkflowFiles {
    fn default() -> Self {
        Self {
            deploy: default_deploy_file(),
            teardown: default_teardown_file(),
            destroy: default_destroy_file(),
            spin_up: default_spin_up_file(),
        }
    }
}

/// Settings for the in-process minute ticker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerSettings {
    /// Run the ticker inside the gateway (default: true).
    #[serde(default = "bool_true")]
    pub enabled: bool,
    /// Seconds between ticks. Matching is minute-exact, so anything above 60
    /// will skip actions.
    #[serde(default = "default_tick_secs")]
    pub tick_secs: u64,
    /// Cron expression reported in tick logs; diagnostics only.
    #[serde(default = "default_cron_label")]
    pub cron: String,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            tick_secs: DEFAULT_TICK_SECS,
            cron: DEFAULT_CRON_LABEL.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotifyConfig {
    /// When set, teardown reminders are POSTed here as JSON.
    pub webhook_url: Option<String>,
}

fn bool_true() -> bool {
    true
}
fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}
fn default_api_base() -> String {
    DEFAULT_API_BASE.to_string()
}
fn default_branch() -> String {
    DEFAULT_BRANCH.to_string()
}
fn default_services_path() -> String {
    DEFAULT_SERVICES_PATH.to_string()
}
fn default_user_agent() -> String {
    "Nexus-Stack-Control-Plane".to_string()
}
fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}
fn default_run_limit() -> u32 {
    DEFAULT_RUN_LIMIT
}
fn default_tick_secs() -> u64 {
    DEFAULT_TICK_SECS
}
fn default_cron_label() -> String {
    DEFAULT_CRON_LABEL.to_string()
}
fn default_deploy_file() -> String {
    "deploy.yml".to_string()
}
fn default_teardown_file() -> String {
    "teardown.yml".to_string()
}
fn default_destroy_file() -> String {
    "destroy-all.yml".to_string()
}
fn default_spin_up_file() -> String {
    "spin-up.yml".to_string()
}
fn default_db_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.nexus/nexus.db", home)
}

impl NexusConfig {
    /// Load config from a TOML file with NEXUS_* env var overrides.
    ///
    /// Nested keys use a double underscore: `NEXUS_GITHUB__TOKEN` sets
    /// `github.token`.
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);
        if !std::path::Path::new(&path).exists() {
            tracing::warn!(path = %path, "config file not found, using defaults and environment");
        }

        Self::figment(&path)
            .extract()
            .map_err(|e| crate::error::NexusError::Config(e.to_string()))
    }

    fn figment(path: &str) -> Figment {
        Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed("NEXUS_").split("__"))
    }

    /// The GitHub binding, or `NotConfigured` naming what is missing.
    pub fn github(&self) -> crate::error::Result<&GithubConfig> {
        self.github
            .as_ref()
            .ok_or_else(|| crate::error::NexusError::NotConfigured("github".to_string()))
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.nexus/nexus.toml", home)
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn empty_file_yields_defaults() {
        Jail::expect_with(|jail| {
            jail.create_file("nexus.toml", "")?;
            let cfg = NexusConfig::load(Some("nexus.toml")).expect("load");
            assert_eq!(cfg.gateway.port, DEFAULT_PORT);
            assert!(cfg.github.is_none());
            assert!(cfg.scheduler.enabled);
            assert_eq!(cfg.scheduler.tick_secs, 60);
            Ok(())
        });
    }

    #[test]
    fn github_section_fills_defaults() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "nexus.toml",
                r#"
                [github]
                owner = "acme"
                repo = "stack"
                token = "t0k"
                "#,
            )?;
            let cfg = NexusConfig::load(Some("nexus.toml")).expect("load");
            let gh = cfg.github().expect("github");
            assert_eq!(gh.branch, "main");
            assert_eq!(gh.services_path, DEFAULT_SERVICES_PATH);
            assert_eq!(gh.workflows.destroy, "destroy-all.yml");
            assert_eq!(gh.run_limit, 20);
            Ok(())
        });
    }

    #[test]
    fn env_overrides_nested_keys() {
        Jail::expect_with(|jail| {
            jail.create_file("nexus.toml", "[gateway]\nport = 9000\n")?;
            jail.set_env("NEXUS_GATEWAY__PORT", "9100");
            let cfg = NexusConfig::load(Some("nexus.toml")).expect("load");
            assert_eq!(cfg.gateway.port, 9100);
            Ok(())
        });
    }

    #[test]
    fn missing_github_is_not_configured() {
        let cfg = NexusConfig::default();
        let err = cfg.github().unwrap_err();
        assert_eq!(err.code(), "NOT_CONFIGURED");
    }
}
