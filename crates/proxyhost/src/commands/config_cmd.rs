//! Config subcommand handlers.

use std::fmt::Write;

use proxyhost_config::{Config, Mode};

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::commands::{config_path, load_config};
use crate::error::CliError;

/// Format config for display, masking keys.
fn format_config_redacted(cfg: &Config) -> String {
    let mut out = String::new();

    let mode = match cfg.mode {
        Mode::Instances => "instances",
        Mode::Profile => "profile",
    };
    let _ = writeln!(out, "mode = \"{mode}\"");
    if let Some(active) = &cfg.active_profile {
        let _ = writeln!(out, "active_profile = \"{active}\"");
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "[feed]");
    let _ = writeln!(out, "scheme = \"{}\"", cfg.feed.scheme);
    let _ = writeln!(out, "host = \"{}\"", cfg.feed.host);
    let _ = writeln!(out, "path = \"{}\"", cfg.feed.path);
    if let Some(port) = cfg.feed.port {
        let _ = writeln!(out, "port = {port}");
    }
    let _ = writeln!(out, "reconnect_initial_ms = {}", cfg.feed.reconnect_initial_ms);
    let _ = writeln!(out, "reconnect_max_ms = {}", cfg.feed.reconnect_max_ms);
    let _ = writeln!(out, "history = {}", cfg.feed.history);
    let _ = writeln!(out, "live_capacity = {}", cfg.feed.live_capacity);
    let _ = writeln!(out, "batch_ms = {}", cfg.feed.batch_ms);

    let _ = writeln!(out);
    let _ = writeln!(out, "[ports]");
    let _ = writeln!(out, "http_proxy = {}", cfg.ports.http_proxy);
    let _ = writeln!(out, "socks5_proxy = {}", cfg.ports.socks5_proxy);
    let _ = writeln!(out, "api_server = {}", cfg.ports.api_server);

    for p in &cfg.profiles {
        let _ = writeln!(out);
        let _ = writeln!(out, "[[profiles]]");
        let _ = writeln!(out, "id = \"{}\"", p.id);
        let _ = writeln!(out, "name = \"{}\"", p.name);
        let _ = writeln!(out, "main_server_url = \"{}\"", p.main_server_url);
        if let Some(url) = &p.ai_server_url {
            let _ = writeln!(out, "ai_server_url = \"{url}\"");
        }
        if let Some(url) = &p.tailscale_server_url {
            let _ = writeln!(out, "tailscale_server_url = \"{url}\"");
        }
    }

    for i in &cfg.instances {
        let _ = writeln!(out);
        let _ = writeln!(out, "[[instances]]");
        let _ = writeln!(out, "id = \"{}\"", i.id());
        let _ = writeln!(out, "name = \"{}\"", i.name);
        let _ = writeln!(out, "enabled = {}", i.enabled);
        let _ = writeln!(out, "use_websocket = {}", i.use_websocket);
        let _ = writeln!(out, "server_host = \"{}\"", i.server_host);
        let _ = writeln!(out, "server_port = {}", i.server_port);
        let _ = writeln!(out, "bind_address = \"{}\"", i.bind_address);
        if i.key.is_some() {
            let _ = writeln!(out, "key = \"****\"");
        }
        if let Some(env) = &i.key_env {
            let _ = writeln!(out, "key_env = \"{env}\"");
        }
    }

    out
}

pub fn handle(args: &ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Path => {
            println!("{}", config_path(global).display());
            Ok(())
        }
        ConfigCommand::Show => {
            let (cfg, _) = load_config(global)?;
            print!("{}", format_config_redacted(&cfg));
            Ok(())
        }
        ConfigCommand::Validate => {
            let (cfg, path) = load_config(global)?;
            cfg.validate().map_err(|e| CliError::config(&path, e))?;
            println!(
                "{}: ok ({} instances, {} profiles)",
                path.display(),
                cfg.instances.len(),
                cfg.profiles.len()
            );
            Ok(())
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use proxyhost_config::InstanceEntry;

    #[test]
    fn redacted_output_hides_plaintext_key() {
        let mut cfg = Config::default();
        cfg.instances.push(InstanceEntry {
            id: None,
            name: "relay".into(),
            enabled: true,
            use_websocket: false,
            server_host: "relay.example.com".into(),
            server_port: 443,
            bind_address: "127.0.0.1:1080".into(),
            key: Some("super-secret".into()),
            key_env: None,
        });

        let out = format_config_redacted(&cfg);
        assert!(out.contains("key = \"****\""));
        assert!(out.contains("id = \"relay\""));
        assert!(!out.contains("super-secret"));
    }
}
