//! End-to-end branching scenarios, run against both storage backends.

use arbor_core::{ExternalId, MessageId, SessionId};
use arbor_settings::ContextSettings;
use arbor_store::{
    BranchSession, DeleteOutcome, ErrorKind, LogOptions, Message, Role, StorageBackend,
};
use tempfile::TempDir;

/// A backend plus whatever keeps its files alive.
struct Fixture {
    name: &'static str,
    _dir: TempDir,
    backend: StorageBackend,
}

impl Fixture {
    fn open(&self, session: &str) -> BranchSession {
        self.backend
            .open_session(&SessionId::from(session), &ContextSettings::default())
            .unwrap()
    }
}

fn fixtures() -> Vec<Fixture> {
    let jsonl_dir = tempfile::tempdir().unwrap();
    let jsonl = StorageBackend::jsonl(
        jsonl_dir.path(),
        jsonl_dir.path().join("message-mappings.json"),
    );

    let sqlite_dir = tempfile::tempdir().unwrap();
    let settings = arbor_settings::StorageSettings {
        backend: arbor_settings::StorageBackendKind::Sqlite,
        database_path: sqlite_dir.path().join("arbor.db"),
        ..Default::default()
    };
    let sqlite = StorageBackend::from_settings(&settings).unwrap();

    vec![
        Fixture {
            name: "jsonl",
            _dir: jsonl_dir,
            backend: jsonl,
        },
        Fixture {
            name: "sqlite",
            _dir: sqlite_dir,
            backend: sqlite,
        },
    ]
}

fn log(session: &mut BranchSession, role: Role, content: &str) -> Message {
    session
        .log_message(role, content, LogOptions::default())
        .unwrap()
}

#[test]
fn linear_logging_forms_a_simple_path() {
    for fx in fixtures() {
        let mut s = fx.open("linear");
        let mut logged = Vec::new();
        for i in 0..6 {
            let role = if i % 2 == 0 { Role::User } else { Role::Assistant };
            logged.push(log(&mut s, role, &format!("turn {i}")));
        }

        assert_eq!(logged[0].parent_id, None, "{}", fx.name);
        for pair in logged.windows(2) {
            assert_eq!(pair[1].parent_id.as_ref(), Some(&pair[0].id), "{}", fx.name);
        }
        assert_eq!(s.load_context(None).unwrap(), logged, "{}", fx.name);
        assert_eq!(s.branches().unwrap().len(), 1, "{}", fx.name);
    }
}

#[test]
fn context_respects_limit_and_ends_at_active_leaf() {
    for fx in fixtures() {
        let mut s = fx.open("limit");
        for i in 0..10 {
            let _ = log(&mut s, Role::User, &format!("m{i}"));
        }
        let leaf = s.state().active_leaf_id.clone().unwrap();
        for limit in [1, 3, 10, 50] {
            let ctx = s.load_context(Some(limit)).unwrap();
            assert!(ctx.len() <= limit, "{}", fx.name);
            assert_eq!(ctx.last().unwrap().id, leaf, "{}", fx.name);
        }
    }
}

#[test]
fn fork_then_switch_back_restores_leaf_and_branch() {
    for fx in fixtures() {
        let mut s = fx.open("roundtrip");
        let a = log(&mut s, Role::User, "a");
        let b = log(&mut s, Role::Assistant, "b");
        let before = (s.state().active_leaf_id.clone(), s.current_branch());

        let _ = s.fork_branch(&a.id, Some("alt")).unwrap();
        let _ = log(&mut s, Role::Assistant, "c");
        s.switch_branch(&b.id).unwrap();

        assert_eq!(
            (s.state().active_leaf_id.clone(), s.current_branch()),
            before,
            "{}",
            fx.name
        );
    }
}

#[test]
fn main_and_alt_branches_with_one_message_each() {
    for fx in fixtures() {
        let mut s = fx.open("main-alt");
        let a = log(&mut s, Role::User, "A");
        let _ = s.fork_branch(&a.id, Some("alt")).unwrap();
        let b = log(&mut s, Role::Assistant, "B");

        let branches = s.branches().unwrap();
        assert_eq!(branches.len(), 2, "{}", fx.name);
        assert_eq!(branches[0].id.as_str(), "main");
        assert_eq!(branches[0].leaf_id, a.id);
        assert_eq!(branches[0].message_count, 1);
        assert_eq!(branches[0].last_active, a.timestamp);
        assert_eq!(branches[1].id.as_str(), "alt");
        assert_eq!(branches[1].leaf_id, b.id);
        assert_eq!(branches[1].message_count, 1);
    }
}

#[test]
fn delete_branch_removes_it_and_returns_count() {
    for fx in fixtures() {
        let mut s = fx.open("delete");
        let a = log(&mut s, Role::User, "a");
        let _ = log(&mut s, Role::Assistant, "b");
        let _ = s.fork_branch(&a.id, Some("alt")).unwrap();
        let _ = log(&mut s, Role::Assistant, "c");
        let _ = log(&mut s, Role::User, "d");

        let pre = s
            .branches()
            .unwrap()
            .into_iter()
            .find(|b| b.id.as_str() == "alt")
            .unwrap()
            .message_count;
        assert_eq!(s.delete_branch("alt").unwrap(), pre, "{}", fx.name);
        assert!(
            s.branches().unwrap().iter().all(|b| b.id.as_str() != "alt"),
            "{}",
            fx.name
        );
        assert_eq!(s.delete_branch("alt").unwrap(), 0, "{}", fx.name);

        // the store on disk agrees after reopening
        let reopened = fx.open("delete");
        assert_eq!(reopened.messages().unwrap().len(), 2, "{}", fx.name);
        assert_eq!(reopened.state().total_messages, 2, "{}", fx.name);
    }
}

#[test]
fn deleting_another_branch_keeps_the_active_pointer() {
    for fx in fixtures() {
        let mut s = fx.open("delete-other");
        let a = log(&mut s, Role::User, "a");
        let _ = s.fork_branch(&a.id, Some("alt")).unwrap();
        let _ = log(&mut s, Role::Assistant, "alt 1");
        let _ = log(&mut s, Role::User, "alt 2");
        s.switch_branch(&a.id).unwrap();
        let b = log(&mut s, Role::Assistant, "b");

        let before = s.state().clone();
        assert_eq!(before.active_leaf_id.as_ref(), Some(&b.id), "{}", fx.name);
        assert_eq!(before.current_branch_id, None, "{}", fx.name);

        assert_eq!(s.delete_branch("alt").unwrap(), 2, "{}", fx.name);
        let after = s.state().clone();
        assert_eq!(after.active_leaf_id, before.active_leaf_id, "{}", fx.name);
        assert_eq!(after.current_branch_id, before.current_branch_id, "{}", fx.name);
        assert_eq!(after.total_messages, before.total_messages - 2, "{}", fx.name);

        let reopened = fx.open("delete-other");
        assert_eq!(reopened.state().active_leaf_id, after.active_leaf_id, "{}", fx.name);
        assert_eq!(reopened.state().current_branch_id, None, "{}", fx.name);
        assert_eq!(reopened.state().total_messages, 2, "{}", fx.name);
        assert_eq!(
            reopened
                .load_context(None)
                .unwrap()
                .iter()
                .map(|m| m.content.as_str())
                .collect::<Vec<_>>(),
            ["a", "b"],
            "{}",
            fx.name
        );
    }
}

#[test]
fn export_tree_shows_siblings() {
    for fx in fixtures() {
        let mut s = fx.open("export");
        let a = log(&mut s, Role::User, "A");
        let b = log(&mut s, Role::Assistant, "B");
        let c = s
            .log_message(Role::Assistant, "C", LogOptions::default().parent(a.id.clone()))
            .unwrap();

        let tree = s.export_tree().unwrap();
        assert_eq!(tree.id, "root");
        assert_eq!(tree.children.len(), 1, "{}", fx.name);
        let node_a = &tree.children[0];
        assert_eq!(node_a.id, a.id.as_str());
        let kids: Vec<&str> = node_a.children.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(kids, [b.id.as_str(), c.id.as_str()], "{}", fx.name);
        assert!(node_a.children.iter().all(|n| n.children.is_empty()));

        let json = serde_json::to_value(&tree).unwrap();
        assert_eq!(json["children"][0]["branchId"], "main");
    }
}

#[test]
fn switch_to_unknown_is_not_found_and_changes_nothing() {
    for fx in fixtures() {
        let mut s = fx.open("unknown");
        let _ = log(&mut s, Role::User, "a");
        let before = s.state().clone();
        let err = s.switch_branch(&MessageId::from("does-not-exist")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound, "{}", fx.name);
        assert_eq!(s.state(), &before, "{}", fx.name);
    }
}

#[test]
fn state_survives_reopen() {
    for fx in fixtures() {
        let leaf = {
            let mut s = fx.open("persist");
            let a = log(&mut s, Role::User, "a");
            let _ = s.fork_branch(&a.id, None).unwrap();
            log(&mut s, Role::Assistant, "b")
        };
        let s = fx.open("persist");
        assert_eq!(s.state().active_leaf_id, Some(leaf.id), "{}", fx.name);
        assert!(s.current_branch().as_str().starts_with("branch_"), "{}", fx.name);
        assert_eq!(s.load_context(None).unwrap().len(), 2, "{}", fx.name);
    }
}

#[test]
fn sessions_do_not_see_each_other() {
    for fx in fixtures() {
        let mut one = fx.open("one");
        let mut two = fx.open("two");
        let _ = log(&mut one, Role::User, "for one");
        let _ = log(&mut two, Role::User, "for two");
        let _ = log(&mut two, Role::User, "for two again");

        assert_eq!(one.messages().unwrap().len(), 1, "{}", fx.name);
        assert_eq!(two.messages().unwrap().len(), 2, "{}", fx.name);
        assert_eq!(
            fx.backend.list_sessions().unwrap(),
            vec![SessionId::from("one"), SessionId::from("two")],
            "{}",
            fx.name
        );
    }
}

#[test]
fn chat_flow_through_router() {
    for fx in fixtures() {
        let sid = SessionId::from("telegram-7");
        let mut router = fx
            .backend
            .open_router(&sid, &ContextSettings::default())
            .unwrap();

        let _ = router
            .record(Role::User, "plan a trip", ExternalId::from("501"))
            .unwrap();
        let _ = router
            .record(Role::Assistant, "to the coast", ExternalId::from("502"))
            .unwrap();

        let fork = router
            .fork_from_reply(&ExternalId::from("501"), Some("mountains"))
            .unwrap();
        assert_eq!(fork.parent.content, "plan a trip", "{}", fx.name);
        let _ = router
            .record(Role::Assistant, "to the mountains", ExternalId::from("503"))
            .unwrap();

        let listing = router.list().unwrap();
        assert_eq!(listing.len(), 2, "{}", fx.name);
        assert!(listing[1].current, "{}", fx.name);

        let merged = router.merge(1).unwrap();
        assert_eq!(merged.merged.len(), 1, "{}", fx.name);
        assert_eq!(merged.merged[0].content, "to the coast");

        let confirm = router.delete(1, false).unwrap();
        assert!(
            matches!(confirm, DeleteOutcome::ConfirmationRequired { .. }),
            "{}",
            fx.name
        );

        // mappings are persisted: a new router resolves the same reply target
        drop(router);
        let mut again = fx
            .backend
            .open_router(&sid, &ContextSettings::default())
            .unwrap();
        let fork = again
            .fork_from_reply(&ExternalId::from("502"), None)
            .unwrap();
        assert_eq!(fork.parent.content, "to the coast", "{}", fx.name);
    }
}
