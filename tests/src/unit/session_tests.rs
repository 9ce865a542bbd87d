use deepdesk_core::state::NewMessage;
use deepdesk_core::{SessionStore, SettingsPatch, SnapshotStore, ThemeMode};
use std::collections::HashSet;
use tempfile::TempDir;

fn store_in(dir: &TempDir) -> SessionStore {
    SessionStore::new(SnapshotStore::new(dir.path().to_path_buf()))
}

#[test]
fn first_user_message_titles_the_session() {
    let temp_dir = TempDir::new().expect("temp dir");
    let store = store_in(&temp_dir);
    let id = store.create_session();
    store.add_message(NewMessage::user("Hello world"));
    store.add_message(NewMessage::assistant("Hi"));

    let session = store.session(&id).expect("session");
    assert_eq!(session.title, "Hello world");
    assert_eq!(session.messages.len(), 2);
}

#[test]
fn session_ids_are_unique() {
    let store = SessionStore::in_memory();
    let ids: HashSet<String> = (0..20).map(|_| store.create_session()).collect();
    assert_eq!(ids.len(), 20);
    assert!(ids.iter().all(|id| !id.is_empty()));
}

#[test]
fn deleting_current_session_selects_first_remaining() {
    let store = SessionStore::in_memory();
    let oldest = store.create_session();
    let newest = store.create_session();
    assert_eq!(store.current_session_id().as_deref(), Some(newest.as_str()));

    assert!(store.delete_session(&newest));
    assert_eq!(store.current_session_id().as_deref(), Some(oldest.as_str()));
    assert!(store.delete_session(&oldest));
    assert_eq!(store.current_session_id(), None);
}

#[test]
fn state_survives_reload_from_disk() {
    let temp_dir = TempDir::new().expect("temp dir");
    let id = {
        let store = store_in(&temp_dir);
        store.set_user_id(Some("a@example.com".into()));
        let id = store.create_session();
        store.add_message(NewMessage::user("Plan a trip to Kyoto"));
        store.update_settings(SettingsPatch::theme(ThemeMode::Dark));
        id
    };

    let reloaded = store_in(&temp_dir);
    assert_eq!(reloaded.current_session_id().as_deref(), Some(id.as_str()));
    assert_eq!(reloaded.user_id().as_deref(), Some("a@example.com"));
    assert_eq!(reloaded.settings().theme, ThemeMode::Dark);
    assert_eq!(
        reloaded.current_session().expect("session").title,
        "Plan a trip to Kyoto"
    );
}

#[test]
fn two_handles_on_one_directory_last_write_wins() {
    let temp_dir = TempDir::new().expect("temp dir");
    let first = store_in(&temp_dir);
    let second = store_in(&temp_dir);
    first.create_session();
    let kept = second.create_session();

    let reloaded = store_in(&temp_dir);
    let ids: Vec<String> = reloaded
        .session_summaries()
        .into_iter()
        .map(|summary| summary.chat_id)
        .collect();
    assert_eq!(ids, vec![kept]);
}

#[test]
fn logout_keeps_settings() {
    let temp_dir = TempDir::new().expect("temp dir");
    let store = store_in(&temp_dir);
    store.update_settings(SettingsPatch::model("gpt-4o"));
    store.create_session();
    store.clear_user_data();

    let reloaded = store_in(&temp_dir);
    assert!(reloaded.session_summaries().is_empty());
    assert_eq!(reloaded.settings().selected_model, "gpt-4o");
}
