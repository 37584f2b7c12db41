//! In-container bootstrap pipeline
//!
//! A freshly started WordPress container is a generic image; this fixed,
//! ordered command sequence turns it into a configured, addressable
//! site. Steps run strictly in order and the pipeline stops on the
//! first non-zero exit, reporting the failing step with its captured
//! output. Command construction is pure so the plan can be tested
//! without an engine.

use crate::docker::DockerManager;
use crate::error::{Error, Result};
use serde::Serialize;
use std::fmt;
use tracing::{debug, info};

/// One state of the bootstrap state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum BootstrapStep {
    /// Write the wp-cli config file: the image only honors environment
    /// variables while wp-cli only honors a config file
    Configuring,
    /// Non-interactive `wp core install` plus permalink setup
    Installing,
    /// One-way multisite conversion; only after install
    Converting,
    /// Make Apache also listen on the externally mapped port so
    /// server-side cron triggers fire
    PortPatching,
}

impl fmt::Display for BootstrapStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BootstrapStep::Configuring => "configuring",
            BootstrapStep::Installing => "installing",
            BootstrapStep::Converting => "converting",
            BootstrapStep::PortPatching => "port-patching",
        };
        write!(f, "{name}")
    }
}

/// Everything the command builders need to know about the new site
#[derive(Debug, Clone)]
pub struct BootstrapParams {
    pub db_host: String,
    pub db_name: String,
    pub db_user: String,
    pub db_password: String,
    pub table_prefix: String,
    pub site_url: String,
    pub site_title: String,
    pub admin_user: String,
    pub admin_password: String,
    pub admin_email: String,
    pub host_port: u16,
    pub multi_tenant: bool,
}

/// Build the ordered pipeline for a site. The conversion step is only
/// planned for multi-tenant sites and always lands between install and
/// the port patch.
pub fn plan(params: &BootstrapParams) -> Vec<(BootstrapStep, Vec<String>)> {
    let mut steps = vec![
        (BootstrapStep::Configuring, configure_command(params)),
        (BootstrapStep::Installing, install_command(params)),
    ];
    if params.multi_tenant {
        steps.push((BootstrapStep::Converting, convert_command()));
    }
    steps.push((BootstrapStep::PortPatching, port_patch_command(params.host_port)));
    steps
}

fn shell(script: String) -> Vec<String> {
    vec!["bash".to_string(), "-c".to_string(), script]
}

fn configure_command(params: &BootstrapParams) -> Vec<String> {
    let script = format!(
        "mkdir -p ~/.wp-cli && cat > ~/.wp-cli/config.yml <<'EOF'\n\
         path: /var/www/html\n\
         url: {url}\n\
         database:\n\
         \x20 dbname: {dbname}\n\
         \x20 user: {user}\n\
         \x20 password: {password}\n\
         \x20 host: {host}\n\
         \x20 prefix: {prefix}\n\
         EOF",
        url = params.site_url,
        dbname = params.db_name,
        user = params.db_user,
        password = params.db_password,
        host = params.db_host,
        prefix = params.table_prefix,
    );
    shell(script)
}

fn install_command(params: &BootstrapParams) -> Vec<String> {
    let script = format!(
        "dpkg -i /tmp/libedit.deb && \
         wp core install --path=/var/www/html --url={url} --title=\"{title}\" \
         --admin_user={admin_user} --admin_password={admin_password} \
         --admin_email={admin_email} --allow-root && \
         wp option update permalink_structure '/%postname%/' --allow-root",
        url = params.site_url,
        title = params.site_title,
        admin_user = params.admin_user,
        admin_password = params.admin_password,
        admin_email = params.admin_email,
    );
    shell(script)
}

fn convert_command() -> Vec<String> {
    vec![
        "wp".to_string(),
        "core".to_string(),
        "multisite-convert".to_string(),
        "--allow-root".to_string(),
    ]
}

fn port_patch_command(host_port: u16) -> Vec<String> {
    let script = format!(
        "sed -i 's/<VirtualHost \\*:80>/<VirtualHost \\*:80 *:{port}>/' \
         /etc/apache2/sites-enabled/000-default.conf && \
         sed -i '/Listen 80/a Listen {port}' /etc/apache2/ports.conf && \
         apachectl restart",
        port = host_port,
    );
    shell(script)
}

/// Execute the pipeline inside the container. Step output is logged;
/// the first failing step aborts with its captured output.
pub async fn run(
    docker: &DockerManager,
    container: &str,
    steps: &[(BootstrapStep, Vec<String>)],
) -> Result<()> {
    for (step, argv) in steps {
        info!(container, step = %step, "Running bootstrap step");
        let output = docker.exec(container, argv).await?;
        if !output.stdout.is_empty() {
            debug!(container, step = %step, stdout = %output.stdout.trim_end());
        }
        if !output.stderr.is_empty() {
            debug!(container, step = %step, stderr = %output.stderr.trim_end());
        }
        if !output.success() {
            return Err(Error::BootstrapFailed {
                step: *step,
                exit_code: output.exit_code,
                output: output.combined(),
            });
        }
    }
    Ok(())
}
