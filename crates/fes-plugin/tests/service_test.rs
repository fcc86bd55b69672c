//! Integration tests for the service lifecycle.

use std::sync::{Arc, Mutex};

use serde_json::{Value, json};

use fes_core::types::Env;
use fes_plugin::api::Command;
use fes_plugin::hooks::keys;
use fes_plugin::{
    ApplyPluginsCall, BoxError, EnableBy, HookArgs, PluginApi, PluginCatalog, PluginDescriptor,
    PluginError, PluginKind, Service, ServiceOptions, ServicePhase,
};

type Log = Arc<Mutex<Vec<String>>>;

fn service(env: Env, user_config: Value) -> Service {
    Service::new(ServiceOptions::new("/app", env).with_user_config(user_config))
}

fn noop(id: &str) -> PluginDescriptor {
    PluginDescriptor::from_fn(id, PluginKind::User, |_api| async { Ok(()) })
}

fn modify_returning(id: &str, key: &'static str, value: Value) -> PluginDescriptor {
    PluginDescriptor::from_fn(id, PluginKind::User, move |api: PluginApi| {
        let value = value.clone();
        async move {
            api.modify(key, move |_prev: Value, _args: HookArgs| {
                let value = value.clone();
                async move { Ok(value) }
            })
            .await
            .map_err(BoxError::from)
        }
    })
}

fn logged(log: &Log) -> Vec<String> {
    log.lock().unwrap().clone()
}

#[tokio::test]
async fn test_disabled_plugin_hooks_never_run() {
    let svc = service(Env::Development, json!({}));
    svc.register_plugin(
        modify_returning("a", "foo", json!("from-a"))
            .enable_by(EnableBy::predicate(|ctx| ctx.env.is_production())),
    )
    .await
    .unwrap();
    svc.register_plugin(noop("b")).await.unwrap();

    svc.init().await.unwrap();
    assert_eq!(svc.enabled_plugins().await, vec!["b"]);

    let result = svc
        .apply_plugins(ApplyPluginsCall::modify("foo", json!("initial")))
        .await
        .unwrap();
    assert_eq!(result, json!("initial"));
}

#[tokio::test]
async fn test_enabled_plugin_hooks_run_in_production() {
    let svc = service(Env::Production, json!({}));
    svc.register_plugin(
        modify_returning("a", "foo", json!("from-a"))
            .enable_by(EnableBy::predicate(|ctx| ctx.env.is_production())),
    )
    .await
    .unwrap();

    svc.init().await.unwrap();
    let result = svc
        .apply_plugins(ApplyPluginsCall::modify("foo", json!("initial")))
        .await
        .unwrap();
    assert_eq!(result, json!("from-a"));
}

#[tokio::test]
async fn test_init_phases_and_ready_hooks() {
    let log: Log = Arc::default();
    let svc = service(Env::Development, json!({ "title": "demo" }));

    let plugin_log = log.clone();
    svc.register_plugin(PluginDescriptor::from_fn(
        "paths",
        PluginKind::User,
        move |api: PluginApi| {
            let log = plugin_log.clone();
            async move {
                api.modify(keys::MODIFY_PATHS, |mut paths: Value, _args: HookArgs| async move {
                    paths["absOutputPath"] = json!("/app/build");
                    Ok(paths)
                })
                .await?;
                api.modify(keys::MODIFY_CONFIG, |mut config: Value, _args: HookArgs| async move {
                    config["injected"] = json!(true);
                    Ok(config)
                })
                .await?;
                let log = log.clone();
                api.on_event(keys::ON_PLUGIN_READY, move |_args: HookArgs| {
                    let log = log.clone();
                    async move {
                        log.lock().unwrap().push("ready".to_string());
                        Ok(())
                    }
                })
                .await
                .map_err(BoxError::from)
            }
        },
    ))
    .await
    .unwrap();

    assert_eq!(svc.phase().await, ServicePhase::Created);
    svc.init().await.unwrap();
    assert_eq!(svc.phase().await, ServicePhase::PluginsReady);

    assert_eq!(
        svc.paths().await.abs_output_path,
        std::path::PathBuf::from("/app/build")
    );
    let config = svc.config().await;
    assert_eq!(config["injected"], json!(true));
    assert_eq!(config["title"], json!("demo"));
    assert_eq!(logged(&log), vec!["ready"]);
}

#[tokio::test]
async fn test_plugin_config_defaults_merged() {
    let svc = service(Env::Development, json!({ "locale": { "fallback": "en" } }));
    svc.register_plugin(
        noop("locale").with_config("locale", json!({ "default": "zh-CN", "fallback": "zh-CN" })),
    )
    .await
    .unwrap();

    svc.init().await.unwrap();
    assert_eq!(
        svc.config().await["locale"],
        json!({ "default": "zh-CN", "fallback": "en" })
    );
}

#[tokio::test]
async fn test_apply_before_ready_is_rejected() {
    let svc = service(Env::Development, json!({}));
    let err = svc
        .apply_plugins(ApplyPluginsCall::modify("foo", Value::Null))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        PluginError::LifecycleViolation {
            phase: ServicePhase::Created,
            ..
        }
    ));
}

#[tokio::test]
async fn test_late_registration_after_done() {
    let slot: Arc<Mutex<Option<PluginApi>>> = Arc::default();
    let svc = service(Env::Development, json!({}));

    let plugin_slot = slot.clone();
    svc.register_plugin(PluginDescriptor::from_fn(
        "keeper",
        PluginKind::User,
        move |api: PluginApi| {
            let slot = plugin_slot.clone();
            async move {
                *slot.lock().unwrap() = Some(api);
                Ok(())
            }
        },
    ))
    .await
    .unwrap();

    svc.init().await.unwrap();
    svc.finish().await;
    assert_eq!(svc.phase().await, ServicePhase::Done);

    let api = slot.lock().unwrap().clone().unwrap();
    let err = api
        .modify("foo", |value: Value, _args: HookArgs| async move { Ok(value) })
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        PluginError::LateRegistration { plugin_id, key, phase: ServicePhase::Done }
            if plugin_id == "keeper" && key == "foo"
    ));

    let err = api
        .apply_plugins(ApplyPluginsCall::modify("foo", Value::Null))
        .await
        .unwrap_err();
    assert!(matches!(err, PluginError::LifecycleViolation { .. }));
}

#[tokio::test]
async fn test_plugin_setup_failure_is_fatal() {
    let svc = service(Env::Development, json!({}));
    svc.register_plugin(noop("ok")).await.unwrap();
    svc.register_plugin(PluginDescriptor::from_fn(
        "broken",
        PluginKind::User,
        |_api| async { Err("missing dependency".into()) },
    ))
    .await
    .unwrap();

    let err = svc.init().await.unwrap_err();
    assert!(matches!(&err, PluginError::PluginApply { plugin_id, .. } if plugin_id == "broken"));
    assert_eq!(err.plugin_id(), Some("broken"));
    assert_eq!(svc.phase().await, ServicePhase::Done);
}

#[tokio::test]
async fn test_register_after_init_is_rejected() {
    let svc = service(Env::Development, json!({}));
    svc.init().await.unwrap();
    let err = svc.register_plugin(noop("late")).await.unwrap_err();
    assert!(matches!(err, PluginError::LifecycleViolation { .. }));
}

#[tokio::test]
async fn test_second_init_keeps_state() {
    let svc = service(Env::Development, json!({}));
    svc.register_plugin(modify_returning(
        "inject",
        keys::MODIFY_CONFIG,
        json!({ "injected": true }),
    ))
    .await
    .unwrap();
    svc.init().await.unwrap();
    assert_eq!(*svc.config().await, json!({ "injected": true }));

    let err = svc.init().await.unwrap_err();
    assert!(matches!(
        err,
        PluginError::LifecycleViolation {
            phase: ServicePhase::PluginsReady,
            ..
        }
    ));
    assert_eq!(svc.phase().await, ServicePhase::PluginsReady);
    assert_eq!(*svc.config().await, json!({ "injected": true }));
}

#[tokio::test]
async fn test_init_after_done_is_rejected() {
    let svc = service(Env::Development, json!({}));
    svc.init().await.unwrap();
    svc.finish().await;
    assert_eq!(svc.phase().await, ServicePhase::Done);

    let err = svc.init().await.unwrap_err();
    assert!(matches!(
        err,
        PluginError::LifecycleViolation {
            phase: ServicePhase::Done,
            ..
        }
    ));
    assert_eq!(svc.phase().await, ServicePhase::Done);
}

fn command_plugin(id: &str, name: &'static str, log: Log) -> PluginDescriptor {
    PluginDescriptor::from_fn(id, PluginKind::User, move |api: PluginApi| {
        let log = log.clone();
        async move {
            let start_log = log.clone();
            api.on_event(keys::ON_START, move |args: HookArgs| {
                let log = start_log.clone();
                async move {
                    let name = args.get_str("name").unwrap_or_default().to_string();
                    log.lock().unwrap().push(format!("start:{name}"));
                    Ok(())
                }
            })
            .await?;

            let command_log = log.clone();
            let command_api = api.clone();
            api.register_command(Command::new(name, "test command", move |args: Value| {
                let log = command_log.clone();
                let api = command_api.clone();
                async move {
                    log.lock().unwrap().push("run".to_string());
                    let value = api
                        .apply_plugins(ApplyPluginsCall::modify("greeting", json!("hello")))
                        .await?;
                    Ok(json!({ "greeting": value, "args": args }))
                }
            }))
            .await
            .map_err(BoxError::from)
        }
    })
}

#[tokio::test]
async fn test_run_command() {
    let log: Log = Arc::default();
    let svc = service(Env::Development, json!({}));
    svc.register_plugin(command_plugin("cmd", "greet", log.clone()))
        .await
        .unwrap();
    svc.register_plugin(modify_returning("shout", "greeting", json!("HELLO")))
        .await
        .unwrap();

    svc.init().await.unwrap();
    assert_eq!(
        svc.commands().await,
        vec![("greet".to_string(), "test command".to_string())]
    );

    let result = svc.run_command("greet", json!({ "x": 1 })).await.unwrap();
    assert_eq!(result, json!({ "greeting": "HELLO", "args": { "x": 1 } }));
    assert_eq!(logged(&log), vec!["start:greet", "run"]);
    assert_eq!(svc.phase().await, ServicePhase::Done);
}

#[tokio::test]
async fn test_unknown_command_still_finishes() {
    let svc = service(Env::Development, json!({}));
    svc.init().await.unwrap();

    let err = svc.run_command("dev", Value::Null).await.unwrap_err();
    assert!(matches!(err, PluginError::CommandNotFound { name } if name == "dev"));
    assert_eq!(svc.phase().await, ServicePhase::Done);
}

#[tokio::test]
async fn test_run_command_before_init_is_invalid() {
    let svc = service(Env::Development, json!({}));
    let err = svc.run_command("build", Value::Null).await.unwrap_err();
    assert!(matches!(
        err,
        PluginError::InvalidTransition {
            from: ServicePhase::Created,
            to: ServicePhase::Running
        }
    ));
}

#[tokio::test]
async fn test_duplicate_command_fails_setup() {
    let log: Log = Arc::default();
    let svc = service(Env::Development, json!({}));
    svc.register_plugin(command_plugin("first", "build", log.clone()))
        .await
        .unwrap();
    svc.register_plugin(command_plugin("second", "build", log))
        .await
        .unwrap();

    let err = svc.init().await.unwrap_err();
    match err {
        PluginError::PluginApply { plugin_id, source } => {
            assert_eq!(plugin_id, "second");
            let inner = source.downcast_ref::<PluginError>().unwrap();
            assert!(matches!(
                inner,
                PluginError::DuplicateCommand { name, existing, .. }
                    if name == "build" && existing == "first"
            ));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_catalog_selection_follows_user_config() {
    let catalog = PluginCatalog::new()
        .with(modify_returning("fes-plugin-a", "foo", json!("a")))
        .with(modify_returning("fes-plugin-b", "foo", json!("b")));

    let svc = service(Env::Development, json!({ "plugins": ["fes-plugin-b"] }));
    svc.register_from_catalog(&catalog).await.unwrap();
    svc.init().await.unwrap();

    assert_eq!(svc.enabled_plugins().await, vec!["fes-plugin-b"]);
    let result = svc
        .apply_plugins(ApplyPluginsCall::modify("foo", Value::Null))
        .await
        .unwrap();
    assert_eq!(result, json!("b"));
}

#[tokio::test]
async fn test_catalog_unknown_plugin() {
    let svc = service(Env::Development, json!({ "plugins": ["fes-plugin-missing"] }));
    let err = svc
        .register_from_catalog(&PluginCatalog::new())
        .await
        .unwrap_err();
    assert!(matches!(err, PluginError::PluginNotFound { id } if id == "fes-plugin-missing"));
}

#[tokio::test]
async fn test_has_plugins_sees_enabled_set() {
    let seen: Arc<Mutex<Option<(bool, bool)>>> = Arc::default();
    let svc = service(Env::Development, json!({}));
    svc.register_plugin(
        noop("prod-only").enable_by(EnableBy::predicate(|ctx| ctx.env.is_production())),
    )
    .await
    .unwrap();
    svc.register_plugin(noop("always")).await.unwrap();

    let plugin_seen = seen.clone();
    svc.register_plugin(PluginDescriptor::from_fn(
        "probe",
        PluginKind::User,
        move |api: PluginApi| {
            let seen = plugin_seen.clone();
            async move {
                let always = api.has_plugins(&["always", "probe"]).await;
                let prod = api.has_plugins(&["prod-only"]).await;
                *seen.lock().unwrap() = Some((always, prod));
                Ok(())
            }
        },
    ))
    .await
    .unwrap();

    svc.init().await.unwrap();
    assert_eq!(*seen.lock().unwrap(), Some((true, false)));
}
