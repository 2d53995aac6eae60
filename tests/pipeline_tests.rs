mod common;

use common::{sample_registry, three_environment_registry, FixedBranch, RecordingRunner};
use multideploy::config::FailurePolicy;
use multideploy::error::DeployError;
use multideploy::hooks::{Hooks, Stage};
use multideploy::pipeline::{DeployOptions, DeployPipeline, FORCE_FLAG};
use multideploy::ActiveSelection;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

type Log = Rc<RefCell<Vec<String>>>;

/// Hooks that log "<stage>" or "<stage>:<env>" for every stage
fn recording_hooks(log: &Log) -> Hooks {
    let mut hooks = Hooks::new();
    for stage in Stage::ALL {
        let log = Rc::clone(log);
        hooks.register(stage, move |ctx| {
            let entry = match ctx.environment {
                Some(env) => format!("{}:{}", ctx.stage, env.name),
                None => ctx.stage.to_string(),
            };
            log.borrow_mut().push(entry);
            Ok(())
        });
    }
    hooks
}

fn count(log: &Log, stage: Stage) -> usize {
    log.borrow()
        .iter()
        .filter(|entry| entry.split(':').next() == Some(stage.name()))
        .count()
}

#[test]
fn test_deploy_all_pushes_in_registry_order() {
    let registry = sample_registry();
    let runner = RecordingRunner::new();
    let branch = FixedBranch::on("main");
    let log = Log::default();
    let hooks = recording_hooks(&log);
    let pipeline = DeployPipeline::new(&registry, &runner, &branch, &hooks);

    let mut selection = ActiveSelection::new();
    pipeline.select_all(&mut selection);
    let report = pipeline
        .deploy(&selection, &DeployOptions::default())
        .unwrap();

    assert_eq!(
        runner.calls(),
        [
            "git push git@h:staging.git main:master",
            "git push git@h:prod.git main:master",
        ]
    );
    assert_eq!(count(&log, Stage::BeforeDeploy), 1);
    assert_eq!(count(&log, Stage::AfterDeploy), 1);
    assert_eq!(count(&log, Stage::BeforeEachDeploy), 2);
    assert_eq!(count(&log, Stage::AfterEachDeploy), 2);
    assert_eq!(report.pushed.len(), 2);
    assert_eq!(report.pushed[1].environment, "production");
    assert_eq!(report.pushed[1].branch, "main");
}

#[test]
fn test_hooks_run_in_pipeline_order() {
    let registry = sample_registry();
    let runner = RecordingRunner::new();
    let branch = FixedBranch::on("main");
    let log = Log::default();
    let hooks = recording_hooks(&log);
    let pipeline = DeployPipeline::new(&registry, &runner, &branch, &hooks);

    let mut selection = ActiveSelection::new();
    pipeline.select_all(&mut selection);
    pipeline
        .deploy(&selection, &DeployOptions::default())
        .unwrap();

    assert_eq!(
        *log.borrow(),
        [
            "before_deploy",
            "before_each_deploy:staging",
            "after_each_deploy:staging",
            "before_each_deploy:production",
            "after_each_deploy:production",
            "after_deploy",
        ]
    );
}

#[test]
fn test_detached_head_fails_before_any_push() {
    let registry = sample_registry();
    let runner = RecordingRunner::new();
    let branch = FixedBranch::detached();
    let log = Log::default();
    let hooks = recording_hooks(&log);
    let pipeline = DeployPipeline::new(&registry, &runner, &branch, &hooks);

    let mut selection = ActiveSelection::new();
    pipeline.select_all(&mut selection);
    let err = pipeline
        .deploy(&selection, &DeployOptions::default())
        .unwrap_err();

    assert!(
        matches!(err, DeployError::NoCurrentBranch { ref environment } if environment == "staging")
    );
    assert!(runner.calls().is_empty(), "no push may be attempted");
    assert_eq!(branch.queries(), 1, "the first environment stops the batch");
    assert_eq!(count(&log, Stage::AfterEachDeploy), 0);
    assert_eq!(count(&log, Stage::AfterDeploy), 0);
}

#[test]
fn test_force_deploy_adds_flag_for_that_call_only() {
    let registry = sample_registry();
    let runner = RecordingRunner::new();
    let branch = FixedBranch::on("main");
    let hooks = Hooks::new();
    let pipeline = DeployPipeline::new(&registry, &runner, &branch, &hooks);

    let mut selection = ActiveSelection::new();
    pipeline.select(&mut selection, "staging").unwrap();
    let options = DeployOptions::default();

    pipeline.force_deploy(&selection, &options).unwrap();
    pipeline.deploy(&selection, &options).unwrap();

    assert_eq!(
        runner.calls(),
        [
            format!("git push git@h:staging.git {FORCE_FLAG} main:master"),
            "git push git@h:staging.git main:master".to_string(),
        ]
    );
}

#[test]
fn test_repeated_force_deploy_does_not_stack_flags() {
    let registry = sample_registry();
    let runner = RecordingRunner::new();
    let branch = FixedBranch::on("main");
    let hooks = Hooks::new();
    let pipeline = DeployPipeline::new(&registry, &runner, &branch, &hooks);

    let mut selection = ActiveSelection::new();
    pipeline.select(&mut selection, "production").unwrap();
    let options = DeployOptions::default().forced();
    pipeline.force_deploy(&selection, &options).unwrap();

    assert_eq!(runner.calls(), ["git push git@h:prod.git --force main:master"]);
}

#[test]
fn test_push_failure_aborts_batch_by_default() {
    let registry = three_environment_registry();
    let runner = RecordingRunner::new().failing_on("demo.git", 1);
    let branch = FixedBranch::on("main");
    let log = Log::default();
    let hooks = recording_hooks(&log);
    let pipeline = DeployPipeline::new(&registry, &runner, &branch, &hooks);

    let mut selection = ActiveSelection::new();
    pipeline.select_all(&mut selection);
    let err = pipeline
        .deploy(&selection, &DeployOptions::default())
        .unwrap_err();

    match &err {
        DeployError::PushFailed { environment, source } => {
            assert_eq!(environment, "demo");
            assert!(matches!(**source, DeployError::ExecutionFailed { code: Some(1), .. }));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(err.is_execution_failure());
    assert_eq!(runner.calls_matching("prod.git").len(), 0);
    assert_eq!(count(&log, Stage::AfterDeploy), 0);
}

#[test]
fn test_push_failure_continues_under_continue_policy() {
    let registry = three_environment_registry();
    let runner = RecordingRunner::new().failing_on("demo.git", 1);
    let branch = FixedBranch::on("release");
    let log = Log::default();
    let hooks = recording_hooks(&log);
    let pipeline = DeployPipeline::new(&registry, &runner, &branch, &hooks);

    let mut selection = ActiveSelection::new();
    pipeline.select_all(&mut selection);
    let options = DeployOptions::default().with_policy(FailurePolicy::Continue);
    let err = pipeline.deploy(&selection, &options).unwrap_err();

    let DeployError::BatchFailed { failures } = err else {
        panic!("expected an aggregate failure");
    };
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].environment, "demo");
    assert_eq!(runner.calls().len(), 3, "every environment is attempted");
    assert!(!log.borrow().contains(&"after_each_deploy:demo".to_string()));
    assert!(log.borrow().contains(&"after_each_deploy:production".to_string()));
    assert_eq!(count(&log, Stage::AfterDeploy), 1);
}

#[test]
fn test_hook_failure_stops_deploy() {
    let registry = sample_registry();
    let runner = RecordingRunner::new();
    let branch = FixedBranch::on("main");
    let mut hooks = Hooks::new();
    hooks.register(Stage::BeforeEachDeploy, |ctx| match ctx.environment {
        Some(env) if env.name == "production" => {
            Err(DeployError::hook("maintenance window closed"))
        }
        _ => Ok(()),
    });
    let pipeline = DeployPipeline::new(&registry, &runner, &branch, &hooks);

    let mut selection = ActiveSelection::new();
    pipeline.select_all(&mut selection);
    let options = DeployOptions::default().with_policy(FailurePolicy::Continue);
    let err = pipeline.deploy(&selection, &options).unwrap_err();

    assert!(matches!(
        err,
        DeployError::HookFailed { stage: Stage::BeforeEachDeploy, .. }
    ));
    assert_eq!(runner.calls(), ["git push git@h:staging.git main:master"]);
}

#[test]
fn test_each_hook_sees_its_own_environment_and_branch() {
    let registry = sample_registry();
    let runner = RecordingRunner::new();
    let branch = FixedBranch::on("main");
    let seen: Rc<RefCell<HashMap<String, Option<String>>>> = Rc::default();
    let mut hooks = Hooks::new();
    {
        let seen = Rc::clone(&seen);
        hooks.register(Stage::AfterEachDeploy, move |ctx| {
            let env = ctx.environment.map(|e| e.app.clone()).unwrap_or_default();
            seen.borrow_mut()
                .insert(env, ctx.branch.map(ToString::to_string));
            Ok(())
        });
    }
    let pipeline = DeployPipeline::new(&registry, &runner, &branch, &hooks);

    let mut selection = ActiveSelection::new();
    pipeline.select_all(&mut selection);
    pipeline
        .deploy(&selection, &DeployOptions::default())
        .unwrap();

    let seen = seen.borrow();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen["myapp-staging"].as_deref(), Some("main"));
    assert_eq!(seen["myapp"].as_deref(), Some("main"));
}

#[test]
fn test_select_notifies_switch_hook_every_time() {
    let registry = sample_registry();
    let runner = RecordingRunner::new();
    let branch = FixedBranch::on("main");
    let log = Log::default();
    let hooks = recording_hooks(&log);
    let pipeline = DeployPipeline::new(&registry, &runner, &branch, &hooks);

    let mut selection = ActiveSelection::new();
    pipeline.select(&mut selection, "staging").unwrap();
    pipeline.select(&mut selection, "staging").unwrap();
    pipeline.select(&mut selection, "production").unwrap();

    assert_eq!(
        *log.borrow(),
        [
            "on_environment_switch:staging",
            "on_environment_switch:staging",
            "on_environment_switch:production",
        ]
    );
    assert_eq!(selection.bindings(&registry).len(), 2);
}

#[test]
fn test_select_unknown_environment_fails_without_hook() {
    let registry = sample_registry();
    let runner = RecordingRunner::new();
    let branch = FixedBranch::on("main");
    let log = Log::default();
    let hooks = recording_hooks(&log);
    let pipeline = DeployPipeline::new(&registry, &runner, &branch, &hooks);

    let mut selection = ActiveSelection::new();
    let err = pipeline.select(&mut selection, "qa").unwrap_err();

    assert!(matches!(err, DeployError::UnknownEnvironment { ref name, .. } if name == "qa"));
    assert!(log.borrow().is_empty());
    assert!(selection.is_empty());
}

#[test]
fn test_deploy_without_selection_fails() {
    let registry = sample_registry();
    let runner = RecordingRunner::new();
    let branch = FixedBranch::on("main");
    let hooks = Hooks::new();
    let pipeline = DeployPipeline::new(&registry, &runner, &branch, &hooks);

    let err = pipeline
        .deploy(&ActiveSelection::new(), &DeployOptions::default())
        .unwrap_err();
    assert!(matches!(err, DeployError::NoEnvironmentSelected));
    assert!(runner.calls().is_empty());
}

#[test]
fn test_custom_target_ref() {
    let registry = sample_registry();
    let runner = RecordingRunner::new();
    let branch = FixedBranch::on("feature/login");
    let hooks = Hooks::new();
    let pipeline = DeployPipeline::new(&registry, &runner, &branch, &hooks);

    let mut selection = ActiveSelection::new();
    pipeline.select(&mut selection, "staging").unwrap();
    pipeline
        .deploy(&selection, &DeployOptions::new("main"))
        .unwrap();

    assert_eq!(
        runner.calls(),
        ["git push git@h:staging.git feature/login:main"]
    );
}

#[test]
fn test_after_deploy_failure_keeps_recorded_push_failures() {
    let registry = three_environment_registry();
    let runner = RecordingRunner::new().failing_on("staging.git", 1);
    let branch = FixedBranch::on("main");
    let mut hooks = Hooks::new();
    hooks.register(Stage::AfterDeploy, |_| Err(DeployError::hook("notify failed")));
    let pipeline = DeployPipeline::new(&registry, &runner, &branch, &hooks);

    let mut selection = ActiveSelection::new();
    pipeline.select_all(&mut selection);
    let options = DeployOptions::default().with_policy(FailurePolicy::Continue);
    let err = pipeline.deploy(&selection, &options).unwrap_err();

    assert!(err.to_string().contains("staging"));
    let DeployError::BatchFailed { failures } = err else {
        panic!("expected an aggregate failure");
    };
    let scopes: Vec<_> = failures.iter().map(|f| f.environment.as_str()).collect();
    assert_eq!(scopes, ["staging", "after_deploy"]);
    assert!(matches!(failures[0].error, DeployError::PushFailed { .. }));
    assert!(matches!(
        failures[1].error,
        DeployError::HookFailed {
            stage: Stage::AfterDeploy,
            ..
        }
    ));
}

#[test]
fn test_hook_failure_mid_batch_keeps_recorded_push_failures() {
    let registry = three_environment_registry();
    let runner = RecordingRunner::new().failing_on("staging.git", 1);
    let branch = FixedBranch::on("main");
    let mut hooks = Hooks::new();
    hooks.register(Stage::BeforeEachDeploy, |ctx| match ctx.environment {
        Some(env) if env.name == "demo" => Err(DeployError::hook("demo is frozen")),
        _ => Ok(()),
    });
    let pipeline = DeployPipeline::new(&registry, &runner, &branch, &hooks);

    let mut selection = ActiveSelection::new();
    pipeline.select_all(&mut selection);
    let options = DeployOptions::default().with_policy(FailurePolicy::Continue);
    let err = pipeline.deploy(&selection, &options).unwrap_err();

    let DeployError::BatchFailed { failures } = err else {
        panic!("expected an aggregate failure");
    };
    let scopes: Vec<_> = failures.iter().map(|f| f.environment.as_str()).collect();
    assert_eq!(scopes, ["staging", "demo"]);
    assert!(runner.calls_matching("prod.git").is_empty());
}
