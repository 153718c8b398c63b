//! `histscope failures`.

use crate::cli::FailuresArgs;
use crate::state::AppState;
use anyhow::Context;
use hs_analysis::{render, CancellationToken, FailuresQuery, OutputFormat};
use hs_history::AttributeFilter;

pub async fn run(
    state: &AppState,
    namespace: &str,
    format: OutputFormat,
    args: FailuresArgs,
    cancel: &CancellationToken,
) -> anyhow::Result<String> {
    let query = build_query(namespace, &args)?;

    let mut config = state.config.clone();
    if let Some(workers) = args.workers {
        config.workers = workers.max(1);
    }

    let result = state.analyzer(config).failures(&query, cancel).await?;
    Ok(render(&result, format)?)
}

fn build_query(namespace: &str, args: &FailuresArgs) -> anyhow::Result<FailuresQuery> {
    let filters = args
        .filters
        .iter()
        .map(|raw| AttributeFilter::parse(raw).with_context(|| format!("--filter {raw}")))
        .collect::<anyhow::Result<Vec<_>>>()?;

    Ok(FailuresQuery {
        namespace: (!args.all_namespaces).then(|| namespace.to_string()),
        statuses: args.status.clone(),
        since: args.since,
        filters,
        limit: args.limit,
        error_contains: args.error_contains.clone(),
        leaf_only: args.leaf_only,
        compact_errors: args.compact_errors,
        group_by: args.group_by,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Command};
    use clap::Parser;

    fn failures_args(extra: &[&str]) -> FailuresArgs {
        let mut argv = vec!["histscope", "failures"];
        argv.extend_from_slice(extra);
        match Cli::try_parse_from(argv).unwrap().command {
            Command::Failures(args) => args,
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn namespace_is_scoped_unless_all_requested() {
        let scoped = build_query("prod", &failures_args(&[])).unwrap();
        assert_eq!(scoped.namespace.as_deref(), Some("prod"));

        let all = build_query("prod", &failures_args(&["--all-namespaces"])).unwrap();
        assert!(all.namespace.is_none());
    }

    #[test]
    fn malformed_filter_is_rejected() {
        let args = failures_args(&["--filter", "no-equals-sign"]);
        assert!(build_query("default", &args).is_err());
    }
}
