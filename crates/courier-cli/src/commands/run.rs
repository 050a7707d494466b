use std::sync::Arc;
use std::time::Duration;

use courier_core::crypto::KeyStore;
use courier_core::dispatch::ConsoleDispatcherFactory;
use courier_core::source::FileJobSource;
use courier_core::{JobConfig, JobDeps, JobManager, JobState, JobStatus};
use secrecy::SecretString;

use crate::app::{key_store, load_config, resolve_password};
use crate::cli::{Cli, RunArgs};
use crate::ui::progress::JobBoard;
use crate::ui::{badge, header, kv, Badge, UiContext};

/// How often the board polls job status.
const POLL_INTERVAL: Duration = Duration::from_millis(200);

pub fn handle_run(cli: &Cli, args: &RunArgs) -> anyhow::Result<()> {
    let ctx = UiContext::from_env(args.json, cli.no_color, cli.ascii, cli.quiet);
    let config = load_config(cli)?;

    let job = job_config(&config.job, args);
    job.validate()?;
    if args.jobs == 0 {
        return Err(anyhow::anyhow!("--jobs must be at least 1"));
    }

    let data_dir = args.data_dir.clone().unwrap_or_else(|| config.data_dir());
    let store = key_store(&config)?;
    // The password is only used when a job has to derive new key material.
    let key_password = if job.enable_envelope && !store.exists() {
        resolve_password(&ctx, None, &config, args.no_input, true)?
    } else {
        SecretString::from(String::new())
    };

    let deps = JobDeps {
        key_store: Arc::new(store),
        dispatchers: Arc::new(ConsoleDispatcherFactory),
        source: Arc::new(FileJobSource::new(&data_dir)),
        key_password,
    };

    if ctx.mode.is_pretty() && !cli.quiet {
        println!(
            "{}",
            header(&ctx, "run", Some(&format!("{} job(s)", args.jobs)))
        );
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| anyhow::anyhow!("Failed to start runtime: {}", e))?;
    let statuses = runtime.block_on(supervise(JobManager::new(deps), job, args.jobs, &ctx));

    print_statuses(&ctx, cli.quiet, &statuses)?;

    let failed = statuses
        .iter()
        .filter(|s| s.state == JobState::Error)
        .count();
    if failed > 0 {
        return Err(anyhow::anyhow!("{} of {} job(s) failed", failed, statuses.len()));
    }
    Ok(())
}

/// Apply command-line overrides to the configured job settings.
fn job_config(base: &JobConfig, args: &RunArgs) -> JobConfig {
    let mut job = base.clone();
    if let Some(min) = args.min_delay {
        job.min_delay_seconds = min;
    }
    if let Some(max) = args.max_delay {
        job.max_delay_seconds = max;
    }
    if args.no_envelope {
        job.enable_envelope = false;
    }
    if args.allow_fallback {
        job.require_key = false;
    }
    job
}

/// Start `count` jobs and follow them until all are terminal.
///
/// The first Ctrl-C stops every job cooperatively; jobs finish their
/// in-flight send and report `stopped`.
async fn supervise(
    manager: JobManager,
    config: JobConfig,
    count: usize,
    ctx: &UiContext,
) -> Vec<JobStatus> {
    for _ in 0..count {
        manager.start(config.clone());
    }

    let mut board = JobBoard::new(ctx);
    let mut ticker = tokio::time::interval(POLL_INTERVAL);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut interrupted = false;

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            result = &mut ctrl_c, if !interrupted => {
                interrupted = true;
                match result {
                    Ok(()) => {
                        let stopped = manager.stop_all();
                        tracing::warn!(jobs = stopped, "interrupted, stopping jobs");
                    }
                    Err(err) => tracing::debug!(error = %err, "cannot listen for Ctrl-C"),
                }
            }
        }

        for status in manager.list() {
            board.update(&status);
        }
        if manager.active_count() == 0 {
            break;
        }
    }

    board.finish();
    manager.list()
}

fn print_statuses(ctx: &UiContext, quiet: bool, statuses: &[JobStatus]) -> anyhow::Result<()> {
    if ctx.mode.is_json() {
        println!("{}", serde_json::to_string_pretty(statuses)?);
        return Ok(());
    }

    for status in statuses {
        let kind = match status.state {
            JobState::Completed => Badge::Ok,
            JobState::Stopped => Badge::Warn,
            JobState::Error => Badge::Err,
            _ => Badge::Info,
        };
        let line = badge(ctx, kind, &format!("job {}: {}", status.job_id, status.progress));
        if kind == Badge::Err {
            eprintln!("{}", line);
        } else if !quiet {
            println!("{}", line);
        }
        if quiet {
            continue;
        }

        let pad = if ctx.mode.is_pretty() { "  " } else { "" };
        println!("{}{}", pad, kv(ctx, "State", status.state.as_str()));
        println!("{}{}", pad, kv(ctx, "Sent", &status.messages_sent.to_string()));
        println!("{}{}", pad, kv(ctx, "Failed", &status.failed_sends.to_string()));
        if let Some(seconds) = status.running_time_seconds {
            println!("{}{}", pad, kv(ctx, "Running Time", &format!("{:.1}s", seconds)));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> RunArgs {
        RunArgs {
            min_delay: None,
            max_delay: None,
            no_envelope: false,
            allow_fallback: false,
            jobs: 1,
            data_dir: None,
            no_input: true,
            json: false,
        }
    }

    #[test]
    fn test_overrides_apply_on_top_of_config() {
        let base = JobConfig::with_delays(5.0, 10.0);
        let overridden = job_config(
            &base,
            &RunArgs {
                min_delay: Some(0.5),
                no_envelope: true,
                allow_fallback: true,
                ..args()
            },
        );
        assert_eq!(overridden.min_delay_seconds, 0.5);
        assert_eq!(overridden.max_delay_seconds, 10.0);
        assert!(!overridden.enable_envelope);
        assert!(!overridden.require_key);
    }

    #[test]
    fn test_no_overrides_keeps_config() {
        let base = JobConfig::with_delays(1.0, 2.0);
        assert_eq!(job_config(&base, &args()), base);
    }
}
