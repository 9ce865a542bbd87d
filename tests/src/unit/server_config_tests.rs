use deepdesk::config::{load_server_settings_from, save_server_settings};
use deepdesk::ServerSettings;
use tempfile::TempDir;

#[tokio::test]
async fn missing_file_yields_defaults() {
    let temp_dir = TempDir::new().expect("temp dir");
    let settings = load_server_settings_from(&temp_dir.path().join("server.yaml")).await;
    assert_eq!(settings, ServerSettings::default());
    assert_eq!(settings.address(), "127.0.0.1:3000");
    assert_eq!(settings.cookie_name, "deepdesk_session");
}

#[tokio::test]
async fn partial_file_keeps_other_defaults() {
    let temp_dir = TempDir::new().expect("temp dir");
    let path = temp_dir.path().join("server.yaml");
    std::fs::write(&path, "port: 8080\ndev_users:\n  - a@example.com\n").expect("write");
    let settings = load_server_settings_from(&path).await;
    assert_eq!(settings.port, 8080);
    assert_eq!(settings.host, "127.0.0.1");
    assert_eq!(settings.dev_users, vec!["a@example.com".to_string()]);
}

#[tokio::test]
async fn invalid_file_falls_back_to_defaults() {
    let temp_dir = TempDir::new().expect("temp dir");
    let path = temp_dir.path().join("server.yaml");
    std::fs::write(&path, "port: [not a port").expect("write");
    assert_eq!(load_server_settings_from(&path).await, ServerSettings::default());
}

#[tokio::test]
async fn saved_settings_load_back() {
    let temp_dir = TempDir::new().expect("temp dir");
    let path = temp_dir.path().join("nested").join("server.yaml");
    let settings = ServerSettings {
        host: "0.0.0.0".into(),
        ..ServerSettings::default()
    };
    save_server_settings(&path, &settings).await.expect("save");
    assert_eq!(load_server_settings_from(&path).await, settings);
}
