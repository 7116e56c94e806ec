use std::fs;
use std::path::Path;
use std::sync::Arc;

use rulegate::{
    command_hook, content_hash, notification_chains, EditRequest, EntityKind, RuleError,
    RuleStore, SectionParser, StoreHooks, TagSet,
};

const RULES: &str = r#"notification email-team {
    email = team@example.com
    next = page-oncall
}

notification page-oncall {
    post = https://pager.example.com/trigger
    next = email-team
}

notification print-only {
    print = true
}

lookup routing {
    entry host=web-01 {
        routing = page-oncall
    }
    entry host=db-01 {
        routing = print-only, no-such-notification
    }
}

alert high.cpu {
    crit = avg(q("sum:cpu{host=*}", "5m")) > 90
    squelch = host=build-.*
    squelch = host=canary-01,tier=staging
    critNotification = email-team
    critNotification = lookup(routing)
}
"#;

fn store() -> RuleStore {
    RuleStore::new(RULES, Arc::new(SectionParser), None, StoreHooks::default()).unwrap()
}

fn tags(pairs: &[(&str, &str)]) -> TagSet {
    pairs.iter().copied().collect()
}

#[test]
fn firing_resolves_through_squelch_selection_and_chains() {
    let store = store();
    let rules = store.rules();
    let alert = &rules.alerts["high.cpu"];

    // Squelched firings stop here.
    assert!(alert.squelch.is_squelched(&tags(&[("host", "build-07")])));
    assert!(alert
        .squelch
        .is_squelched(&tags(&[("host", "canary-01"), ("tier", "staging")])));
    // Both keys of the second rule must match.
    assert!(!alert
        .squelch
        .is_squelched(&tags(&[("host", "canary-01"), ("tier", "prod")])));

    // A web-01 firing picks up the lookup override on top of the
    // static declaration.
    let firing = tags(&[("host", "web-01")]);
    assert!(!alert.squelch.is_squelched(&firing));
    let active = alert.crit_notification.active(&rules.notifications, &firing);
    assert_eq!(
        active.keys().collect::<Vec<_>>(),
        vec!["email-team", "page-oncall"]
    );

    // email-team and page-oncall reference each other: the chain walk
    // reports the loop instead of failing.
    let chains = notification_chains(&active, &rules.notifications);
    assert_eq!(
        chains,
        vec![
            vec!["email-team", "page-oncall", "...email-team"],
            vec!["page-oncall", "email-team", "...page-oncall"],
        ]
    );
}

#[test]
fn unknown_names_in_lookup_values_degrade_gracefully() {
    let store = store();
    let rules = store.rules();
    let alert = &rules.alerts["high.cpu"];

    let firing = tags(&[("host", "db-01")]);
    let active = alert.crit_notification.active(&rules.notifications, &firing);
    // "no-such-notification" is dropped; the valid names still deliver.
    assert_eq!(
        active.keys().collect::<Vec<_>>(),
        vec!["email-team", "print-only"]
    );
    assert_eq!(
        notification_chains(&active, &rules.notifications)[1],
        vec!["print-only"]
    );
}

#[test]
fn editor_workflow_detects_stale_views() {
    let store = store();
    let editor_view = store.hash();

    // Another editor slips in a change.
    store
        .bulk_edit(&vec![EditRequest {
            name: "print-only".to_string(),
            kind: EntityKind::Notification,
            text: "notification print-only {\n    print = true\n    timeout = 5m\n}".to_string(),
            delete: false,
        }])
        .unwrap();

    // The first editor's based-on hash no longer matches.
    assert_ne!(store.hash(), editor_view);
    assert_eq!(store.hash(), content_hash(&store.raw_text()));
}

#[cfg(unix)]
fn write_script(dir: &Path, name: &str, body: &str) -> std::path::PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

#[cfg(unix)]
#[test]
fn save_persists_runs_hook_and_reloads() {
    let dir = tempfile::tempdir().unwrap();
    let rule_file = dir.path().join("rules.conf");
    fs::write(&rule_file, RULES).unwrap();
    let log = dir.path().join("hook.log");
    let script = write_script(
        dir.path(),
        "commit-hook",
        &format!("echo \"$1 $2 $3\" > {}", log.display()),
    );

    let hooks = StoreHooks {
        save_hook: Some(command_hook(script.to_str().unwrap()).unwrap()),
        post_reload: None,
    };
    let store = RuleStore::new(
        RULES,
        Arc::new(SectionParser),
        Some(rule_file.clone()),
        hooks,
    )
    .unwrap();

    let candidate = RULES.replace("> 90", "> 95");
    let diff = store.raw_diff(&candidate);
    assert!(diff.contains("> 95"));

    store
        .save_raw_text(&candidate, &diff, "alice", "raise threshold", &[])
        .unwrap();
    store.reload().unwrap();

    assert_eq!(fs::read_to_string(&rule_file).unwrap(), candidate);
    let recorded = fs::read_to_string(&log).unwrap();
    assert!(recorded.contains("rules.conf"));
    assert!(recorded.contains("alice"));
    assert!(recorded.contains("raise threshold"));
    assert!(store.rules().alerts["high.cpu"]
        .crit
        .as_deref()
        .unwrap()
        .contains("> 95"));
}

#[cfg(unix)]
#[test]
fn failing_hook_surfaces_stderr_but_keeps_the_text() {
    let dir = tempfile::tempdir().unwrap();
    let script = write_script(dir.path(), "reject-hook", "echo push rejected >&2; exit 1");

    let hooks = StoreHooks {
        save_hook: Some(command_hook(script.to_str().unwrap()).unwrap()),
        post_reload: None,
    };
    let store = RuleStore::new(RULES, Arc::new(SectionParser), None, hooks).unwrap();

    let candidate = RULES.replace("> 90", "> 95");
    let err = store
        .save_raw_text(&candidate, "", "alice", "raise threshold", &[])
        .unwrap_err();
    match err {
        RuleError::Hook(hook_err) => {
            assert!(hook_err.to_string().contains("push rejected"));
        }
        other => panic!("expected hook error, got {other:?}"),
    }
    // The hook is not a transaction participant: the commit stands.
    assert_eq!(store.raw_text(), candidate);
}

#[test]
fn concurrent_readers_see_consistent_snapshots() {
    let store = Arc::new(store());
    let reader = {
        let store = Arc::clone(&store);
        std::thread::spawn(move || {
            for _ in 0..200 {
                let rules = store.rules();
                // An alert never observes a half-rebuilt registry: its
                // static references always resolve in the same snapshot.
                if let Some(alert) = rules.alerts.get("high.cpu") {
                    for name in alert.crit_notification.notifications.keys() {
                        assert!(rules.notifications.contains_key(name));
                    }
                }
            }
        })
    };

    let candidates = [RULES.replace("> 90", "> 91"), RULES.replace("> 90", "> 92")];
    for i in 0..20 {
        let text = &candidates[i % 2];
        store.save_raw_text(text, "", "editor", "loop", &[]).unwrap();
        store.reload().unwrap();
    }
    reader.join().unwrap();
}
