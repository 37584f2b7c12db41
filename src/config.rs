use serde::Deserialize;
use std::path::Path;

/// Global configuration for the provisioner
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    /// Container engine connection settings
    #[serde(default)]
    pub engine: EngineConfig,

    /// Internal container network
    #[serde(default)]
    pub network: NetworkConfig,

    /// Domain and reverse-proxy routing settings
    #[serde(default)]
    pub domains: DomainConfig,

    /// Shared database service
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Reverse-proxy service
    #[serde(default)]
    pub proxy: ProxyConfig,

    /// Database admin UI service
    #[serde(default)]
    pub admin_ui: AdminUiConfig,

    /// Per-site provisioning settings
    #[serde(default)]
    pub sites: SiteConfig,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct EngineConfig {
    /// Explicit engine endpoint ('unix:///path' or 'tcp://host:port').
    /// Falls back to DOCKER_HOST, then platform socket defaults.
    pub docker_host: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct NetworkConfig {
    /// Name of the bridge network shared by all managed containers
    #[serde(default = "default_network_name")]
    pub name: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DomainConfig {
    /// Base domain sites are routed under (`<site>.<base_domain>`)
    #[serde(default = "default_base_domain")]
    pub base_domain: String,

    /// Traefik certificate resolver used for TLS termination
    #[serde(default = "default_cert_resolver")]
    pub cert_resolver: String,

    /// Entrypoint receiving plain HTTP (redirected to HTTPS)
    #[serde(default = "default_entrypoint_web")]
    pub entrypoint_web: String,

    /// Entrypoint receiving HTTPS
    #[serde(default = "default_entrypoint_websecure")]
    pub entrypoint_websecure: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// Well-known container name sites reach the database at
    #[serde(default = "default_db_container")]
    pub container_name: String,

    #[serde(default = "default_db_image")]
    pub image: String,

    #[serde(default = "default_db_root_password")]
    pub root_password: String,

    /// Host port the database is published on
    #[serde(default = "default_db_port")]
    pub port: u16,

    /// Named volume holding database state
    #[serde(default = "default_db_volume")]
    pub data_volume: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ProxyConfig {
    #[serde(default = "default_proxy_container")]
    pub container_name: String,

    #[serde(default = "default_proxy_image")]
    pub image: String,

    /// Host path of the Traefik static configuration file
    #[serde(default = "default_proxy_static_config")]
    pub static_config: String,

    /// Host path of the Traefik dynamic configuration file
    #[serde(default = "default_proxy_dynamic_config")]
    pub dynamic_config: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AdminUiConfig {
    #[serde(default = "default_admin_ui_container")]
    pub container_name: String,

    #[serde(default = "default_admin_ui_image")]
    pub image: String,

    /// Subdomain the admin UI is routed at (`<subdomain>.<base_domain>`)
    #[serde(default = "default_admin_ui_subdomain")]
    pub subdomain: String,

    /// Port the admin UI listens on inside its container
    #[serde(default = "default_admin_ui_port")]
    pub container_port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SiteConfig {
    /// Name prefix shared by all site containers
    #[serde(default = "default_site_prefix")]
    pub container_prefix: String,

    /// First host port handed out when no site containers exist
    #[serde(default = "default_base_port")]
    pub base_port: u16,

    /// Port the web server listens on inside site containers
    #[serde(default = "default_site_container_port")]
    pub container_port: u16,

    /// Host directory holding the wp-cli binary, mysql client,
    /// libedit package and mu-plugins
    #[serde(default = "default_deps_dir")]
    pub deps_dir: String,

    /// Host directory site content directories live under
    #[serde(default = "default_content_dir")]
    pub content_dir: String,

    #[serde(default = "default_site_title")]
    pub site_title: String,

    #[serde(default = "default_admin_user")]
    pub admin_user: String,

    #[serde(default = "default_admin_password")]
    pub admin_password: String,

    #[serde(default = "default_admin_email")]
    pub admin_email: String,
}

fn default_network_name() -> String {
    "spawnpress".to_string()
}

fn default_base_domain() -> String {
    "localhost".to_string()
}

fn default_cert_resolver() -> String {
    "myresolver".to_string()
}

fn default_entrypoint_web() -> String {
    "web".to_string()
}

fn default_entrypoint_websecure() -> String {
    "websecure".to_string()
}

fn default_db_container() -> String {
    "spawnpress-db".to_string()
}

fn default_db_image() -> String {
    "mysql:8.0".to_string()
}

fn default_db_root_password() -> String {
    "password".to_string()
}

fn default_db_port() -> u16 {
    3306
}

fn default_db_volume() -> String {
    "spawnpress-db-data".to_string()
}

fn default_proxy_container() -> String {
    "spawnpress-proxy".to_string()
}

fn default_proxy_image() -> String {
    "traefik:v3.0".to_string()
}

fn default_proxy_static_config() -> String {
    "./traefik/traefik.yml".to_string()
}

fn default_proxy_dynamic_config() -> String {
    "./traefik/dynamic.yml".to_string()
}

fn default_admin_ui_container() -> String {
    "spawnpress-phpmyadmin".to_string()
}

fn default_admin_ui_image() -> String {
    "phpmyadmin:apache".to_string()
}

fn default_admin_ui_subdomain() -> String {
    "db".to_string()
}

fn default_admin_ui_port() -> u16 {
    80
}

fn default_site_prefix() -> String {
    "spawnpress-site-".to_string()
}

fn default_base_port() -> u16 {
    10000
}

fn default_site_container_port() -> u16 {
    80
}

fn default_deps_dir() -> String {
    "./deps".to_string()
}

fn default_content_dir() -> String {
    "./sites".to_string()
}

fn default_site_title() -> String {
    "Your Site Title".to_string()
}

fn default_admin_user() -> String {
    "admin".to_string()
}

fn default_admin_password() -> String {
    "password".to_string()
}

fn default_admin_email() -> String {
    "admin@example.org".to_string()
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            name: default_network_name(),
        }
    }
}

impl Default for DomainConfig {
    fn default() -> Self {
        Self {
            base_domain: default_base_domain(),
            cert_resolver: default_cert_resolver(),
            entrypoint_web: default_entrypoint_web(),
            entrypoint_websecure: default_entrypoint_websecure(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            container_name: default_db_container(),
            image: default_db_image(),
            root_password: default_db_root_password(),
            port: default_db_port(),
            data_volume: default_db_volume(),
        }
    }
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            container_name: default_proxy_container(),
            image: default_proxy_image(),
            static_config: default_proxy_static_config(),
            dynamic_config: default_proxy_dynamic_config(),
        }
    }
}

impl Default for AdminUiConfig {
    fn default() -> Self {
        Self {
            container_name: default_admin_ui_container(),
            image: default_admin_ui_image(),
            subdomain: default_admin_ui_subdomain(),
            container_port: default_admin_ui_port(),
        }
    }
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            container_prefix: default_site_prefix(),
            base_port: default_base_port(),
            container_port: default_site_container_port(),
            deps_dir: default_deps_dir(),
            content_dir: default_content_dir(),
            site_title: default_site_title(),
            admin_user: default_admin_user(),
            admin_password: default_admin_password(),
            admin_email: default_admin_email(),
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_yields_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.sites.base_port, 10000);
        assert_eq!(config.sites.container_prefix, "spawnpress-site-");
        assert_eq!(config.domains.base_domain, "localhost");
        assert_eq!(config.database.container_name, "spawnpress-db");
        assert!(config.engine.docker_host.is_none());
    }

    #[test]
    fn test_partial_override_keeps_other_defaults() {
        let config: Config = toml::from_str(
            r#"
            [domains]
            base_domain = "wp.example.com"

            [sites]
            base_port = 20000
            "#,
        )
        .unwrap();
        assert_eq!(config.domains.base_domain, "wp.example.com");
        assert_eq!(config.domains.entrypoint_websecure, "websecure");
        assert_eq!(config.sites.base_port, 20000);
        assert_eq!(config.sites.admin_user, "admin");
    }

    #[test]
    fn test_load_from_file() {
        use std::io::Write as _;
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[network]\nname = \"wp-test\"").unwrap();
        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.network.name, "wp-test");
    }
}
