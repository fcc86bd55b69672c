//! Hook dispatcher: runs `applyPlugins` pipelines.
//!
//! - `modify`: the value is threaded through every handler in order; the
//!   last handler's return is the result.
//! - `event`: handlers run one after another with the call's args; the
//!   first failure aborts the rest unless the call is isolated.
//! - `add`: every handler's items are appended to the initial list.
//!
//! Each handler is awaited to completion before the next one starts.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use super::definitions::{HookArgs, HookHandler, HookRecord, HookType};
use super::registry::HookTable;
use crate::error::PluginError;

/// One invocation of the pipeline.
#[derive(Debug, Clone)]
pub struct ApplyPluginsCall {
    /// Composition type.
    pub hook_type: HookType,
    /// Hook key.
    pub key: String,
    /// Starting value (`modify`, `add`); ignored for `event`.
    pub initial_value: Value,
    /// Arguments handed to every handler.
    pub args: HookArgs,
    /// For `event`: run every handler even when some fail.
    pub isolated: bool,
}

impl ApplyPluginsCall {
    /// Creates a call of the given type.
    pub fn new(hook_type: HookType, key: impl Into<String>) -> Self {
        Self {
            hook_type,
            key: key.into(),
            initial_value: Value::Null,
            args: HookArgs::default(),
            isolated: false,
        }
    }

    /// A `modify` call starting from `initial_value`.
    pub fn modify(key: impl Into<String>, initial_value: Value) -> Self {
        Self::new(HookType::Modify, key).with_initial_value(initial_value)
    }

    /// An `event` call.
    pub fn event(key: impl Into<String>) -> Self {
        Self::new(HookType::Event, key)
    }

    /// An `add` call starting from `initial_value`.
    pub fn add(key: impl Into<String>, initial_value: Value) -> Self {
        Self::new(HookType::Add, key).with_initial_value(initial_value)
    }

    /// Sets the initial value.
    pub fn with_initial_value(mut self, initial_value: Value) -> Self {
        self.initial_value = initial_value;
        self
    }

    /// Sets the handler arguments.
    pub fn with_args(mut self, args: impl Into<HookArgs>) -> Self {
        self.args = args.into();
        self
    }

    /// Opts an `event` call into best-effort dispatch.
    pub fn isolated(mut self) -> Self {
        self.isolated = true;
        self
    }
}

/// Dispatches `applyPlugins` calls against a hook table.
#[derive(Debug, Clone)]
pub struct HookDispatcher {
    /// Hook table.
    table: Arc<HookTable>,
}

impl HookDispatcher {
    /// Creates a dispatcher over `table`.
    pub fn new(table: Arc<HookTable>) -> Self {
        Self { table }
    }

    /// Runs one pipeline and returns its result.
    ///
    /// `event` calls resolve to `null`.
    pub async fn apply(&self, call: ApplyPluginsCall) -> Result<Value, PluginError> {
        self.table.claim_key(&call.key, call.hook_type).await?;
        let records = self.table.handlers(&call.key).await;

        debug!(
            key = %call.key,
            hook_type = %call.hook_type,
            handler_count = records.len(),
            "Applying plugins"
        );

        match call.hook_type {
            HookType::Modify => run_modify(&records, call.initial_value, &call.args).await,
            HookType::Add => run_add(&records, call.initial_value, &call.args).await,
            HookType::Event if call.isolated => {
                let failures = run_event_isolated(&records, &call.args).await;
                for failure in &failures {
                    warn!(
                        key = %call.key,
                        plugin_id = failure.plugin_id().unwrap_or("unknown"),
                        error = %failure,
                        "Event handler failed, continuing"
                    );
                }
                Ok(Value::Null)
            }
            HookType::Event => {
                run_event(&records, &call.args).await?;
                Ok(Value::Null)
            }
        }
    }

    /// Fires an event to every handler and returns the failures instead of
    /// stopping at the first one.
    pub async fn fire_isolated(
        &self,
        key: &str,
        args: HookArgs,
    ) -> Result<Vec<PluginError>, PluginError> {
        self.table.claim_key(key, HookType::Event).await?;
        let records = self.table.handlers(key).await;
        Ok(run_event_isolated(&records, &args).await)
    }

    /// Returns a reference to the hook table.
    pub fn table(&self) -> &Arc<HookTable> {
        &self.table
    }
}

async fn run_modify(
    records: &[HookRecord],
    initial_value: Value,
    args: &HookArgs,
) -> Result<Value, PluginError> {
    let mut value = initial_value;
    for record in records {
        let HookHandler::Modify(handler) = &record.handler else {
            return Err(mismatch(record, HookType::Modify));
        };
        value = handler(value, args.clone())
            .await
            .map_err(|source| handler_error(record, source))?;
    }
    Ok(value)
}

async fn run_add(
    records: &[HookRecord],
    initial_value: Value,
    args: &HookArgs,
) -> Result<Value, PluginError> {
    let mut memo = match initial_value {
        Value::Null => Vec::new(),
        Value::Array(items) => items,
        item => vec![item],
    };
    for record in records {
        let HookHandler::Add(handler) = &record.handler else {
            return Err(mismatch(record, HookType::Add));
        };
        let contributed = handler(Value::Array(memo.clone()), args.clone())
            .await
            .map_err(|source| handler_error(record, source))?;
        match contributed {
            Value::Null => {}
            Value::Array(items) => memo.extend(items),
            item => memo.push(item),
        }
    }
    Ok(Value::Array(memo))
}

async fn run_event(records: &[HookRecord], args: &HookArgs) -> Result<(), PluginError> {
    for record in records {
        let HookHandler::Event(handler) = &record.handler else {
            return Err(mismatch(record, HookType::Event));
        };
        handler(args.clone())
            .await
            .map_err(|source| handler_error(record, source))?;
    }
    Ok(())
}

async fn run_event_isolated(records: &[HookRecord], args: &HookArgs) -> Vec<PluginError> {
    let mut failures = Vec::new();
    for record in records {
        let HookHandler::Event(handler) = &record.handler else {
            failures.push(mismatch(record, HookType::Event));
            continue;
        };
        if let Err(source) = handler(args.clone()).await {
            failures.push(handler_error(record, source));
        }
    }
    failures
}

fn handler_error(record: &HookRecord, source: crate::error::BoxError) -> PluginError {
    PluginError::Handler {
        plugin_id: record.plugin_id.clone(),
        key: record.key.clone(),
        hook_type: record.hook_type(),
        source,
    }
}

fn mismatch(record: &HookRecord, requested: HookType) -> PluginError {
    PluginError::HookTypeConflict {
        key: record.key.clone(),
        existing: record.hook_type(),
        requested,
        plugin_id: Some(record.plugin_id.clone()),
    }
}
