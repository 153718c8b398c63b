//! Subcommand handlers. Each returns the rendered document for stdout.

pub mod failures;
pub mod import;
pub mod timeline;
pub mod trace;

use crate::cli::ExecutionArgs;
use hs_core::execution::ExecutionRef;

pub(crate) fn execution_ref(namespace: &str, args: &ExecutionArgs) -> ExecutionRef {
    let execution = ExecutionRef::new(namespace, args.workflow_id.clone());
    match &args.run_id {
        Some(run) => execution.with_run(run.clone()),
        None => execution,
    }
}
