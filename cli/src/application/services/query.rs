//! Application service: metadata queries over the process registry.
//!
//! Reads run against a reconciled snapshot. The only write, setting the
//! `label` column, goes through the same read-only gate as every other
//! registry mutation and never touches live handles.

use std::path::Path;

use devpilot_common::ProcessInfo;

use crate::application::ports::{ProcessControl, ProcessLauncher};
use crate::application::registry::ProcessRegistry;
use crate::domain::config::SecurityConfig;
use crate::domain::error::DevError;
use crate::domain::guardrail::evaluate_session_mutation;
use crate::domain::query::{Column, Condition, Filter, Op, ResultSet, Statement, Value, parse};

/// Result of `devQuery`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryOutcome {
    Rows(ResultSet),
    Updated(usize),
}

/// Restrict `filter` to rows in `dir`.
fn scoped(mut filter: Filter, dir: Option<&Path>) -> Filter {
    if let Some(dir) = dir {
        filter.0.push(Condition {
            column: Column::Cwd,
            op: Op::Eq,
            value: Value::Text(dir.to_string_lossy().into_owned()),
        });
    }
    filter
}

/// Parse and execute `query` with positional `params`. When `dir` is given
/// only rows for that directory are visible.
///
/// # Errors
///
/// [`DevError::Query`] for malformed input, [`DevError::Policy`] for
/// row-creating or row-deleting statements and for writes in read-only mode,
/// [`DevError::Validation`] for writes to identity columns.
pub async fn run_query<B: ProcessLauncher + ProcessControl>(
    registry: &ProcessRegistry<B>,
    security: &SecurityConfig,
    query: &str,
    params: &[Value],
    dir: Option<&Path>,
) -> Result<QueryOutcome, DevError> {
    let statement = parse(query, params)?;
    if statement.is_write() {
        evaluate_session_mutation("devQuery write", security).enforce(false)?;
    }
    match statement {
        Statement::Select(select) => {
            let rows: Vec<ProcessInfo> = registry.list(dir).await;
            Ok(QueryOutcome::Rows(select.execute(&rows)))
        }
        Statement::Update(update) => {
            let filter = scoped(update.filter, dir);
            let changed = registry.set_label(&filter, update.label.as_deref()).await;
            tracing::info!(rows = changed, "updated process labels");
            Ok(QueryOutcome::Updated(changed))
        }
    }
}
