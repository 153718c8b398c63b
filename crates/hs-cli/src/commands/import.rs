//! `histscope import`: load history documents into the store.

use crate::cli::ImportArgs;
use crate::state::AppState;
use anyhow::Context;
use hs_history::export::history_from_json;

pub fn run(state: &AppState, args: ImportArgs) -> anyhow::Result<String> {
    let mut imported = Vec::with_capacity(args.files.len());
    for path in &args.files {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let history =
            history_from_json(&raw).with_context(|| format!("parsing {}", path.display()))?;
        let info = state
            .store
            .import(&history)
            .with_context(|| format!("importing {}", path.display()))?;
        tracing::info!(execution = %info.execution, events = history.events.len(), "imported");
        imported.push(info);
    }
    Ok(serde_json::to_string_pretty(&imported)?)
}
