use courier_core::crypto::KeyStore;
use courier_core::source::{FileJobSource, JobSource};
use serde::Serialize;

use crate::app::{key_store, load_config, resolve_config_path};
use crate::cli::{Cli, DoctorArgs};
use crate::config::CourierConfig;
use crate::ui::{badge, header, table, Badge, UiContext};

#[derive(Debug, Serialize)]
struct Check {
    check: &'static str,
    status: &'static str,
    detail: String,
    #[serde(skip)]
    badge: Badge,
}

impl Check {
    fn new(check: &'static str, badge: Badge, detail: impl Into<String>) -> Self {
        Self {
            check,
            status: badge.word(),
            detail: detail.into(),
            badge,
        }
    }
}

pub fn handle_doctor(cli: &Cli, args: &DoctorArgs) -> anyhow::Result<()> {
    let ctx = UiContext::from_env(args.json, cli.no_color, cli.ascii, cli.quiet);
    let config_path = resolve_config_path(cli)?;
    let config = load_config(cli)?;

    let mut checks = vec![Check::new(
        "config",
        Badge::Ok,
        config_path.display().to_string(),
    )];
    checks.extend(run_checks(&config));

    let failed = checks.iter().any(|c| c.badge == Badge::Err);

    if ctx.mode.is_json() {
        let value = serde_json::json!({ "ok": !failed, "checks": checks });
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        if ctx.mode.is_pretty() {
            println!("{}", header(&ctx, "doctor", None));
        }
        let rows: Vec<Vec<String>> = checks
            .iter()
            .map(|c| {
                let status = if ctx.mode.is_pretty() {
                    badge(&ctx, c.badge, "")
                } else {
                    c.status.to_string()
                };
                vec![c.check.to_string(), status, c.detail.clone()]
            })
            .collect();
        println!("{}", table(&ctx, &["Check", "Status", "Detail"], &rows));
    }

    if failed {
        return Err(anyhow::anyhow!("Doctor found problems"));
    }
    Ok(())
}

fn run_checks(config: &CourierConfig) -> Vec<Check> {
    let mut checks = Vec::new();

    checks.push(match config.job.validate() {
        Ok(()) => Check::new(
            "job",
            Badge::Ok,
            format!(
                "delay {}s..{}s, envelope {}",
                config.job.min_delay_seconds,
                config.job.max_delay_seconds,
                if config.job.enable_envelope { "on" } else { "off" }
            ),
        ),
        Err(err) => Check::new("job", Badge::Err, err.to_string()),
    });

    checks.push(match key_store(config) {
        Err(err) => Check::new("key", Badge::Err, err.to_string()),
        Ok(store) => match store.load() {
            Ok(material) => Check::new(
                "key",
                Badge::Ok,
                format!(
                    "{} ({}, {})",
                    material.fingerprint_hex(),
                    material.kdf().name(),
                    store.path().display()
                ),
            ),
            Err(err) if err.is_not_found() => Check::new(
                "key",
                Badge::Warn,
                "not generated; run `courier keys generate`",
            ),
            Err(err) => Check::new("key", Badge::Err, err.to_string()),
        },
    });

    let source = FileJobSource::new(config.data_dir());

    checks.push(match source.load_credentials() {
        Ok(credentials) if credentials.is_empty() => Check::new(
            "session",
            Badge::Warn,
            format!("empty ({})", source.session_path().display()),
        ),
        Ok(credentials) => Check::new(
            "session",
            Badge::Ok,
            format!("{} entries", credentials.entry_count()),
        ),
        Err(err) => Check::new("session", Badge::Err, err.to_string()),
    });

    checks.push(count_check("targets", source.load_targets().map(|t| t.len())));
    checks.push(count_check(
        "messages",
        source.load_messages().map(|m| m.len()),
    ));

    checks
}

fn count_check(name: &'static str, count: courier_core::Result<usize>) -> Check {
    match count {
        Ok(0) => Check::new(name, Badge::Warn, "none found"),
        Ok(n) => Check::new(name, Badge::Ok, n.to_string()),
        Err(err) => Check::new(name, Badge::Err, err.to_string()),
    }
}
