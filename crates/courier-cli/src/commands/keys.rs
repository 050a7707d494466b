use courier_core::crypto::{KeyMaterial, KeyStore};
use secrecy::ExposeSecret;

use crate::app::{key_store, load_config, resolve_password};
use crate::cli::{Cli, KeysGenerateArgs, KeysShowArgs};
use crate::ui::{badge, header, kv, receipt, Badge, UiContext};

pub fn handle_generate(cli: &Cli, args: &KeysGenerateArgs) -> anyhow::Result<()> {
    let ctx = UiContext::from_env(false, cli.no_color, cli.ascii, cli.quiet);
    let config = load_config(cli)?;
    let store = key_store(&config)?;

    if store.exists() && !args.force {
        return Err(anyhow::anyhow!(
            "Key material already exists at {}.\nHint: Use --force to replace it. Messages sealed with the old key can no longer be opened.",
            store.path().display()
        ));
    }

    let password = resolve_password(&ctx, args.password.as_deref(), &config, args.no_input, true)?;
    let material = store.derive(password.expose_secret())?;

    if !cli.quiet {
        if ctx.mode.is_pretty() {
            println!("{}", header(&ctx, "keys generate", None));
        }
        println!(
            "{}",
            receipt(
                &ctx,
                "Key material stored",
                &[
                    ("Path", store.path().display().to_string()),
                    ("KDF", material.kdf().name().to_string()),
                    ("Fingerprint", material.fingerprint_hex()),
                ],
            )
        );
    }
    Ok(())
}

pub fn handle_show(cli: &Cli, args: &KeysShowArgs) -> anyhow::Result<()> {
    let ctx = UiContext::from_env(args.json, cli.no_color, cli.ascii, cli.quiet);
    let config = load_config(cli)?;
    let store = key_store(&config)?;
    let material = store.load()?;

    if ctx.mode.is_json() {
        let mut value = key_json(&material);
        value["path"] = serde_json::json!(store.path());
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    if ctx.mode.is_pretty() {
        println!("{}", header(&ctx, "keys show", None));
        println!("{}", badge(&ctx, Badge::Ok, "Key material present"));
    }
    println!("{}", kv(&ctx, "Path", &store.path().display().to_string()));
    println!("{}", kv(&ctx, "Algorithm", &material.algorithm().to_string()));
    println!("{}", kv(&ctx, "KDF", material.kdf().name()));
    println!("{}", kv(&ctx, "Created", &material.created_at().to_rfc3339()));
    println!("{}", kv(&ctx, "Fingerprint", &material.fingerprint_hex()));
    Ok(())
}

/// Public description of key material. Never includes the key or salt.
pub fn key_json(material: &KeyMaterial) -> serde_json::Value {
    serde_json::json!({
        "algorithm": material.algorithm(),
        "kdf": material.kdf(),
        "created_at": material.created_at(),
        "fingerprint": material.fingerprint_hex(),
    })
}
