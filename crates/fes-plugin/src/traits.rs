//! Trait-based hook handlers.
//!
//! Plugins with state implement one of these traits on a struct instead of
//! capturing the state in a closure, then convert it with
//! [`HookHandler::from_modify`] and friends.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::BoxError;
use crate::hooks::definitions::{HookArgs, HookFuture, HookHandler};

/// A `modify` handler.
#[async_trait]
pub trait ModifyHook: Send + Sync {
    /// Returns the next value of the pipeline.
    async fn modify(&self, value: Value, args: HookArgs) -> Result<Value, BoxError>;
}

/// An `event` handler.
#[async_trait]
pub trait EventHook: Send + Sync {
    /// Reacts to the event.
    async fn on_event(&self, args: HookArgs) -> Result<(), BoxError>;
}

/// An `add` handler.
#[async_trait]
pub trait AddHook: Send + Sync {
    /// Returns an item or list of items to append.
    async fn add(&self, memo: Value, args: HookArgs) -> Result<Value, BoxError>;
}

impl HookHandler {
    /// Adapts a [`ModifyHook`] implementation.
    pub fn from_modify(hook: Arc<dyn ModifyHook>) -> Self {
        Self::Modify(Arc::new(move |value: Value, args: HookArgs| -> HookFuture<Value> {
            let hook = hook.clone();
            Box::pin(async move { hook.modify(value, args).await })
        }))
    }

    /// Adapts an [`EventHook`] implementation.
    pub fn from_event(hook: Arc<dyn EventHook>) -> Self {
        Self::Event(Arc::new(move |args: HookArgs| -> HookFuture<()> {
            let hook = hook.clone();
            Box::pin(async move { hook.on_event(args).await })
        }))
    }

    /// Adapts an [`AddHook`] implementation.
    pub fn from_add(hook: Arc<dyn AddHook>) -> Self {
        Self::Add(Arc::new(move |memo: Value, args: HookArgs| -> HookFuture<Value> {
            let hook = hook.clone();
            Box::pin(async move { hook.add(memo, args).await })
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::definitions::HookType;
    use serde_json::json;

    struct Prefix(&'static str);

    #[async_trait]
    impl ModifyHook for Prefix {
        async fn modify(&self, value: Value, _args: HookArgs) -> Result<Value, BoxError> {
            Ok(json!(format!("{}{}", self.0, value.as_str().unwrap_or_default())))
        }
    }

    #[tokio::test]
    async fn test_modify_adapter() {
        let handler = HookHandler::from_modify(Arc::new(Prefix("pre-")));
        assert_eq!(handler.hook_type(), HookType::Modify);

        let HookHandler::Modify(f) = handler else {
            panic!("expected modify handler");
        };
        let result = f(json!("value"), HookArgs::default()).await.unwrap();
        assert_eq!(result, json!("pre-value"));
    }

    struct Imports(Vec<&'static str>);

    #[async_trait]
    impl AddHook for Imports {
        async fn add(&self, _memo: Value, _args: HookArgs) -> Result<Value, BoxError> {
            Ok(json!(self.0))
        }
    }

    #[tokio::test]
    async fn test_add_adapter() {
        let handler = HookHandler::from_add(Arc::new(Imports(vec!["vue", "pinia"])));
        assert_eq!(handler.hook_type(), HookType::Add);

        let HookHandler::Add(f) = handler else {
            panic!("expected add handler");
        };
        let result = f(json!([]), HookArgs::default()).await.unwrap();
        assert_eq!(result, json!(["vue", "pinia"]));
    }
}
