//! Live progress for running jobs.

use std::collections::BTreeMap;

use courier_core::{JobId, JobStatus};
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};

use super::context::UiContext;
use super::render::kv;

/// One progress line per job.
///
/// Pretty mode draws an `indicatif` bar per job. Plain mode prints a line
/// whenever a job's progress text changes. JSON and quiet modes print nothing.
pub struct JobBoard<'a> {
    ctx: &'a UiContext,
    multi: Option<MultiProgress>,
    bars: BTreeMap<JobId, ProgressBar>,
    last_progress: BTreeMap<JobId, String>,
}

impl<'a> JobBoard<'a> {
    pub fn new(ctx: &'a UiContext) -> Self {
        let multi = ctx
            .allows_animation()
            .then(|| MultiProgress::with_draw_target(ProgressDrawTarget::stdout()));
        Self {
            ctx,
            multi,
            bars: BTreeMap::new(),
            last_progress: BTreeMap::new(),
        }
    }

    pub fn update(&mut self, status: &JobStatus) {
        let changed = self.last_progress.get(&status.job_id) != Some(&status.progress);
        if changed {
            self.last_progress
                .insert(status.job_id, status.progress.clone());
        }

        match &self.multi {
            Some(multi) => {
                let ascii = !self.ctx.unicode;
                let bar = self
                    .bars
                    .entry(status.job_id)
                    .or_insert_with(|| new_bar(multi, status.job_id, ascii));
                let total = status.total_targets * status.total_messages;
                if total > 0 {
                    bar.set_length(total);
                }
                bar.set_position(status.messages_sent + status.failed_sends);
                if changed {
                    bar.set_message(status.progress.clone());
                }
            }
            None => {
                if changed && !self.ctx.quiet && !self.ctx.mode.is_json() {
                    println!(
                        "job={} state={} {}",
                        status.job_id,
                        status.state,
                        kv(self.ctx, "progress", &status.progress)
                    );
                }
            }
        }
    }

    /// Freeze every bar at its final message.
    pub fn finish(&mut self) {
        for (id, bar) in &self.bars {
            let message = self.last_progress.get(id).cloned().unwrap_or_default();
            bar.finish_with_message(message);
        }
    }
}

fn new_bar(multi: &MultiProgress, id: JobId, ascii: bool) -> ProgressBar {
    let chars = if ascii { "=> " } else { "\u{2588}\u{2591}\u{00B7}" };
    let style = ProgressStyle::with_template("{prefix:>7} [{bar:24}] {pos}/{len} {wide_msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars(chars);
    let bar = multi.add(ProgressBar::new(0));
    bar.set_style(style);
    bar.set_prefix(format!("job {}", id));
    bar
}
