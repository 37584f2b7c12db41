//! Schema management on the shared database service
//!
//! DDL is issued through an administrative `mysql` client executed
//! inside the database container, so no direct database driver or
//! network path from this process is required. Both directions are
//! idempotent (`IF NOT EXISTS` / `IF EXISTS`).

use crate::config::DatabaseConfig;
use crate::docker::DockerManager;
use crate::error::{Error, Result};
use std::sync::Arc;
use tracing::{debug, info};

pub struct SchemaAdmin {
    docker: Arc<DockerManager>,
    container: String,
    root_password: String,
}

impl SchemaAdmin {
    pub fn new(docker: Arc<DockerManager>, config: &DatabaseConfig) -> Self {
        Self {
            docker,
            container: config.container_name.clone(),
            root_password: config.root_password.clone(),
        }
    }

    /// Create the site's schema if it does not exist yet
    pub async fn create_schema(&self, name: &str) -> Result<()> {
        if !is_safe_schema_name(name) {
            return Err(Error::InvalidName(name.to_string()));
        }
        info!(schema = name, "Creating schema");
        self.run_sql(&format!("CREATE DATABASE IF NOT EXISTS `{name}`;"))
            .await
    }

    /// Drop the site's schema; absent schemas are a no-op
    pub async fn drop_schema(&self, name: &str) -> Result<()> {
        if !is_safe_schema_name(name) {
            return Err(Error::InvalidName(name.to_string()));
        }
        info!(schema = name, "Dropping schema");
        self.run_sql(&format!("DROP DATABASE IF EXISTS `{name}`;"))
            .await
    }

    async fn run_sql(&self, sql: &str) -> Result<()> {
        let argv = vec![
            "mysql".to_string(),
            "-uroot".to_string(),
            format!("-p{}", self.root_password),
            "-e".to_string(),
            sql.to_string(),
        ];
        let output = self.docker.exec(&self.container, &argv).await?;
        if !output.success() {
            return Err(Error::CommandFailed {
                container: self.container.clone(),
                exit_code: output.exit_code,
                output: output.combined(),
            });
        }
        debug!(container = %self.container, "DDL applied");
        Ok(())
    }
}

/// Quote-safe schema name check. Schema names are container names, which
/// the engine already restricts, so this only guards direct callers.
pub fn is_safe_schema_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_schema_names() {
        assert!(is_safe_schema_name("spawnpress-site-ZGVtbw"));
        assert!(is_safe_schema_name("wp_10000"));
        assert!(!is_safe_schema_name(""));
        assert!(!is_safe_schema_name("x`; DROP DATABASE mysql"));
    }
}
