use courier_core::crypto::{open_text, KeyStore, OutgoingText};

use crate::app::{key_store, load_config};
use crate::cli::{Cli, OpenArgs};
use crate::ui::{badge, Badge, UiContext};

pub fn handle_open(cli: &Cli, args: &OpenArgs) -> anyhow::Result<()> {
    let ctx = UiContext::from_env(args.json, cli.no_color, cli.ascii, cli.quiet);

    let (kind, text) = match OutgoingText::parse(args.text.trim_end_matches(['\r', '\n'])) {
        OutgoingText::Sealed(encoded) => {
            let config = load_config(cli)?;
            let material = key_store(&config)?.load()?;
            ("sealed", open_text(encoded.trim(), &material)?)
        }
        OutgoingText::Fallback(text) => ("fallback", text),
        OutgoingText::Plain(text) => ("plain", text),
    };

    if ctx.mode.is_json() {
        let value = serde_json::json!({ "kind": kind, "text": text });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    if !cli.quiet {
        match kind {
            "fallback" => eprintln!("{}", badge(&ctx, Badge::Warn, "Sent without envelope")),
            "plain" => eprintln!("{}", badge(&ctx, Badge::Info, "Not a sealed message")),
            _ => {}
        }
    }
    println!("{}", text);
    Ok(())
}
