mod admin_tests;
mod chat_tests;
mod server_config_tests;
mod session_tests;
mod support;
mod workspace_tests;
