use std::process::Command;

const REQUIRED: [&str; 4] = ["R360_URL", "STORE_CREDENTIAL", "SUBSCRIPTIONS_PATH", "PACKAGES_PATH"];

#[test]
fn fails_without_store_url() {
    let exe = env!("CARGO_BIN_EXE_subscription-sync");
    let mut command = Command::new(exe);
    for key in REQUIRED {
        command.env_remove(key);
    }
    let output = command.output().expect("failed to run subscription-sync binary");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("R360_URL"), "stderr: {stderr}");
}

#[test]
fn fails_on_malformed_store_url() {
    let exe = env!("CARGO_BIN_EXE_subscription-sync");
    let output = Command::new(exe)
        .env("R360_URL", "not a url")
        .env("STORE_CREDENTIAL", "Y2xpZW50OnNlY3JldA==")
        .env("SUBSCRIPTIONS_PATH", "/nonexistent/subscriptions.json")
        .env("PACKAGES_PATH", "/nonexistent/packages.json")
        .output()
        .expect("failed to run subscription-sync binary");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("R360_URL"), "stderr: {stderr}");
}
