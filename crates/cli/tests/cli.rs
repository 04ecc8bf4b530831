use assert_cmd::Command;

fn libris() -> Command {
    let mut cmd = Command::cargo_bin("libris").unwrap();
    cmd.env("LIBRIS_ENV", "local")
        .env("LIBRIS_CONFIG_DIR", std::env::temp_dir().join("libris-cli-no-config"))
        .env_remove("LIBRIS__AUTH__LOGIN_URL");
    cmd
}

#[test]
fn settings_prints_defaults_as_json() {
    let output = libris().arg("settings").output().unwrap();
    assert!(output.status.success());

    let settings: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(settings["environment"], "local");
    assert_eq!(settings["catalog"]["genre_keyword"], "p");
    assert_eq!(settings["auth"]["login_url"], "/api/accounts/login");
}

#[test]
fn settings_honours_environment_overrides() {
    let output = libris()
        .arg("settings")
        .env("LIBRIS__SERVER__PORT", "9191")
        .output()
        .unwrap();
    assert!(output.status.success());

    let settings: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(settings["server"]["port"], 9191);
}

#[test]
fn openapi_lists_catalog_routes() {
    let output = libris().arg("openapi").output().unwrap();
    assert!(output.status.success());

    let spec: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert!(spec["paths"]["/api/catalog/books"]["get"].is_object());
    assert!(spec["paths"]["/api/catalog/book-instances/{id}/renew"]["post"].is_object());
    assert!(spec["paths"]["/api/accounts/me"]["get"].is_object());
}

#[test]
fn unknown_environment_fails() {
    libris()
        .arg("settings")
        .env("LIBRIS_ENV", "qa")
        .assert()
        .failure();
}
