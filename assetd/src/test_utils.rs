//! Test utilities for handler tests.
//!
//! Every app built here lives inside a caller-provided temporary root: uploads land in
//! `<root>/assets` and request paths resolve against `<root>`, mirroring the default layout
//! relative to the working directory.

use std::path::Path;

use axum_test::TestServer;

use crate::config::Config;

pub async fn create_test_app(root: &Path) -> TestServer {
    create_test_app_with(root, |_| {}).await
}

/// Like [`create_test_app`], with a hook to adjust the config before the app is built.
pub async fn create_test_app_with(root: &Path, configure: impl FnOnce(&mut Config)) -> TestServer {
    let mut config = create_test_config(root);
    configure(&mut config);

    let app = crate::Application::new(config).await.expect("Failed to create application");

    app.into_test_server()
}

pub fn create_test_config(root: &Path) -> Config {
    let mut config = Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        ..Default::default()
    };
    config.assets.dir = root.join("assets");
    config.assets.web_root = root.to_path_buf();
    config
}

/// Names of the files currently in `<root>/assets`, sorted. Empty when the directory is missing.
pub fn stored_files(root: &Path) -> Vec<String> {
    let Ok(entries) = std::fs::read_dir(root.join("assets")) else {
        return Vec::new();
    };

    let mut names: Vec<String> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}
