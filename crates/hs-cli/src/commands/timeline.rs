//! `histscope timeline`.

use super::execution_ref;
use crate::cli::TimelineArgs;
use crate::state::AppState;
use hs_analysis::{render, CancellationToken, OutputFormat, TimelineOptions};

pub async fn run(
    state: &AppState,
    namespace: &str,
    format: OutputFormat,
    args: TimelineArgs,
    cancel: &CancellationToken,
) -> anyhow::Result<String> {
    let execution = execution_ref(namespace, &args.execution);
    let options = TimelineOptions {
        compact: args.compact,
        include: args.include,
        exclude: args.exclude,
        per_attempt: args.per_attempt || state.config.per_attempt,
    };
    let result = state
        .analyzer(state.config.clone())
        .timeline(&execution, &options, cancel)
        .await?;
    Ok(render(&result, format)?)
}
