use std::sync::Arc;

use crate::config::EdgeConfig;
use crate::error::Result;

use super::EdgeShell;

/// Maps a workload subdomain to its NodePort by writing an nginx site config
/// on the edge host and reloading.
///
/// Provisioning is three sequential remote commands (write config, enable
/// symlink, reload) over the same shell; none is verified before the next —
/// a failed reload leaves the config in place for the next reload to pick up.
pub struct NginxProvisioner {
    shell: Arc<dyn EdgeShell>,
    domain: String,
    subdomain_prefix: String,
    upstream_host: String,
    sites_available: String,
    sites_enabled: String,
}

impl NginxProvisioner {
    pub fn new(shell: Arc<dyn EdgeShell>, edge: &EdgeConfig) -> Self {
        Self {
            shell,
            domain: edge.domain.clone(),
            subdomain_prefix: edge.subdomain_prefix.clone(),
            upstream_host: edge.upstream_host.clone(),
            sites_available: edge.sites_available.clone(),
            sites_enabled: edge.sites_enabled.clone(),
        }
    }

    /// Deterministic: prefix + workload name. Uniqueness rides on the
    /// workload name's own uniqueness.
    pub fn subdomain(&self, workload_name: &str) -> String {
        format!("{}{workload_name}", self.subdomain_prefix)
    }

    pub async fn provision(&self, workload_name: &str, node_port: i32) -> Result<String> {
        let subdomain = self.subdomain(workload_name);
        let available = self.config_path(&subdomain);
        let enabled = format!("{}/{subdomain}.conf", self.sites_enabled);
        let content = self.render(&subdomain, node_port);

        log::info!("nginx: provisioning {subdomain} -> :{node_port}");

        self.shell
            .run(&format!(
                "echo {} > {}",
                shell_words::quote(&content),
                shell_words::quote(&available)
            ))
            .await?;

        self.shell
            .run(&format!(
                "ln -s {} {}",
                shell_words::quote(&available),
                shell_words::quote(&enabled)
            ))
            .await?;

        self.shell.run("sudo nginx -s reload").await?;

        Ok(subdomain)
    }

    /// Removes the site config and its symlink, then reloads. Removal errors
    /// are ignored so a half-provisioned subdomain can still be cleaned up.
    pub async fn deprovision(&self, subdomain: &str) -> Result<()> {
        let available = self.config_path(subdomain);
        let enabled = format!("{}/{subdomain}.conf", self.sites_enabled);

        log::info!("nginx: deprovisioning {subdomain}");

        if let Err(e) = self
            .shell
            .run(&format!("rm {}", shell_words::quote(&available)))
            .await
        {
            log::warn!("nginx: removing {available} failed: {e}");
        }

        if let Err(e) = self
            .shell
            .run(&format!("rm {}", shell_words::quote(&enabled)))
            .await
        {
            log::warn!("nginx: removing {enabled} failed: {e}");
        }

        self.shell.run("sudo nginx -s reload").await?;
        Ok(())
    }

    fn config_path(&self, subdomain: &str) -> String {
        format!("{}/{subdomain}.conf", self.sites_available)
    }

    /// Two server blocks: port 80 redirects to https, port 443 terminates TLS
    /// with the certbot wildcard material for the apex domain and proxies to
    /// the workload's NodePort with the standard forwarded headers.
    fn render(&self, subdomain: &str, node_port: i32) -> String {
        let domain = &self.domain;
        let upstream = &self.upstream_host;
        format!(
            r#"server {{
    listen 80;
    server_name {subdomain}.{domain};

    location / {{
        return 301 https://$host$request_uri;
    }}
}}

server {{
    listen 443 ssl;
    server_name {subdomain}.{domain};

    ssl_certificate /etc/letsencrypt/live/{domain}/fullchain.pem;
    ssl_certificate_key /etc/letsencrypt/live/{domain}/privkey.pem;

    include /etc/letsencrypt/options-ssl-nginx.conf;
    ssl_dhparam /etc/letsencrypt/ssl-dhparams.pem;

    client_max_body_size 100M;

    location / {{
        proxy_pass http://{upstream}:{node_port};
        proxy_set_header Host $host;
        proxy_set_header X-Real-IP $remote_addr;
        proxy_set_header X-Forwarded-For $proxy_add_x_forwarded_for;
        proxy_set_header X-Forwarded-Proto $scheme;
    }}
}}
"#
        )
    }
}
