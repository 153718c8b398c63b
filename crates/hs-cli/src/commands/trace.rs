//! `histscope trace`.

use super::execution_ref;
use crate::cli::TraceArgs;
use crate::state::AppState;
use hs_analysis::{render, CancellationToken, OutputFormat};

pub async fn run(
    state: &AppState,
    namespace: &str,
    format: OutputFormat,
    args: TraceArgs,
    cancel: &CancellationToken,
) -> anyhow::Result<String> {
    let execution = execution_ref(namespace, &args.execution);

    let mut config = state.config.clone();
    if let Some(depth) = args.max_depth {
        config.max_depth = depth;
    }
    if let Some(nodes) = args.max_nodes {
        config.max_nodes = nodes.max(1);
    }
    if !args.follow_namespaces.is_empty() {
        config.follow_namespaces = args.follow_namespaces;
    }

    let result = state.analyzer(config).trace(&execution, cancel).await?;
    if let Some(rc) = &result.root_cause {
        tracing::debug!(kind = rc.kind.as_str(), "root cause resolved");
    }
    Ok(render(&result, format)?)
}
