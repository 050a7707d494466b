use std::path::Path;

use courier_core::source::{MESSAGES_FILE, TARGETS_FILE};

use crate::app::resolve_config_path;
use crate::cli::{Cli, InitArgs};
use crate::config::{default_data_dir, default_key_file, write_config, CourierConfig};
use crate::ui::{header, hint, receipt, UiContext};

const TARGETS_TEMPLATE: &str = "\
# One target per line: `Display Name: target_id` or a bare id.
# Blank lines and lines starting with # are ignored.
";

const MESSAGES_TEMPLATE: &str = "\
# One message per line. Every message is sent to every target.
";

pub fn handle_init(cli: &Cli, args: &InitArgs) -> anyhow::Result<()> {
    let ctx = UiContext::from_env(false, cli.no_color, cli.ascii, cli.quiet);
    let config_path = resolve_config_path(cli)?;
    if config_path.exists() && !args.force {
        return Err(anyhow::anyhow!(
            "Config already exists at {}.\nHint: Use --force to overwrite it.",
            config_path.display()
        ));
    }

    let data_dir = match &args.data_dir {
        Some(dir) => dir.clone(),
        None => default_data_dir()?,
    };
    let key_file = match &args.key_file {
        Some(path) => path.clone(),
        None => default_key_file()?,
    };

    std::fs::create_dir_all(&data_dir).map_err(|e| {
        anyhow::anyhow!(
            "Failed to create data directory {}: {}",
            data_dir.display(),
            e
        )
    })?;
    seed_file(&data_dir.join(TARGETS_FILE), TARGETS_TEMPLATE)?;
    seed_file(&data_dir.join(MESSAGES_FILE), MESSAGES_TEMPLATE)?;

    let config = CourierConfig::new(data_dir.clone(), key_file.clone());
    write_config(&config_path, &config)?;
    tracing::info!(config = %config_path.display(), "wrote config");

    if !cli.quiet {
        if ctx.mode.is_pretty() {
            println!("{}", header(&ctx, "init", None));
        }
        println!(
            "{}",
            receipt(
                &ctx,
                "Initialized",
                &[
                    ("Config", config_path.display().to_string()),
                    ("Data Dir", data_dir.display().to_string()),
                    ("Key File", key_file.display().to_string()),
                ],
            )
        );
        println!("{}", hint(&ctx, "courier keys generate"));
    }
    Ok(())
}

/// Write `contents` unless the file already exists.
fn seed_file(path: &Path, contents: &str) -> anyhow::Result<()> {
    if path.exists() {
        return Ok(());
    }
    std::fs::write(path, contents)
        .map_err(|e| anyhow::anyhow!("Failed to write {}: {}", path.display(), e))
}
