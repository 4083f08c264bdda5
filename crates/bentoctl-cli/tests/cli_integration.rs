//! CLI subprocess integration tests.
//!
//! These tests invoke the `bentoctl` binary against the mock runtime and
//! verify exit codes, persisted mode changes, and JSON output.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

const CATALOG: &str = r#"{
    "katsu": {
        "service_kind": "metadata",
        "image_env": "KATSU_IMAGE",
        "version_env": "KATSU_VERSION",
        "dev_version_env": "KATSU_DEV_VERSION",
        "repository": "https://github.com/bento-platform/katsu"
    },
    "drs": {
        "service_kind": "drs",
        "image_env": "DRS_IMAGE",
        "version_env": "DRS_VERSION",
        "dev_version_env": "DRS_DEV_VERSION",
        "repository": "https://github.com/bento-platform/bento_drs"
    },
    "gohan-api": {
        "feature": "gohan",
        "image_env": "GOHAN_API_IMAGE",
        "version_env": "GOHAN_API_VERSION"
    },
    "gohan-elasticsearch": {
        "feature": "gohan",
        "image_env": "GOHAN_ES_IMAGE",
        "version_env": "GOHAN_ES_VERSION"
    }
}"#;

const IMAGE_VARS: &[(&str, &str)] = &[
    ("KATSU_IMAGE", "ghcr.io/bento-platform/katsu"),
    ("KATSU_VERSION", "7.1.0"),
    ("KATSU_DEV_VERSION", "7.1.0-dev"),
    ("DRS_IMAGE", "ghcr.io/bento-platform/bento_drs"),
    ("DRS_VERSION", "0.13.0"),
    ("DRS_DEV_VERSION", "0.13.0-dev"),
    ("GOHAN_API_IMAGE", "ghcr.io/bento-platform/gohan-api"),
    ("GOHAN_API_VERSION", "5.0.0"),
    ("GOHAN_ES_IMAGE", "elasticsearch"),
    ("GOHAN_ES_VERSION", "8.11.0"),
];

struct Deployment {
    dir: tempfile::TempDir,
}

impl Deployment {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("etc")).unwrap();
        std::fs::write(dir.path().join("etc/bento_services.json"), CATALOG).unwrap();
        Self { dir }
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }

    fn state_db(&self) -> PathBuf {
        self.path().join("state.db")
    }

    /// A command with a clean environment: only the variables the tests
    /// set reach the binary.
    fn bentoctl(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_bentoctl"));
        cmd.current_dir(self.path())
            .env_clear()
            .env("PATH", std::env::var_os("PATH").unwrap_or_default())
            .env("BENTOCTL_RUNTIME", "mock")
            .env("BENTOCTL_SKIP_PREREQS", "1")
            .env("BENTO_SERVICES", self.path().join("etc/bento_services.json"))
            .env("BENTO_ORCHESTRATION_STATE_DB", self.state_db())
            .env("BENTO_REPOS_DIR", self.path().join("repos"))
            .env("BENTO_GOHAN_ENABLED", "true");
        for (k, v) in IMAGE_VARS {
            cmd.env(k, v);
        }
        cmd
    }

    fn run(&self, args: &[&str]) -> Output {
        self.bentoctl().args(args).output().unwrap()
    }

    fn json(&self, args: &[&str]) -> serde_json::Value {
        let output = self.run(args);
        assert!(
            output.status.success(),
            "{args:?} failed: {}",
            String::from_utf8_lossy(&output.stderr)
        );
        serde_json::from_slice(&output.stdout).unwrap()
    }

    fn mode_of(&self, service: &str) -> String {
        let modes = self.json(&["--json", "mode", service]);
        modes[0]["mode"].as_str().unwrap().to_owned()
    }
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn cli_version_exits_zero() {
    let output = Command::new(env!("CARGO_BIN_EXE_bentoctl"))
        .arg("--version")
        .output()
        .unwrap();
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("bentoctl"));
}

#[test]
fn cli_help_lists_commands() {
    let output = Command::new(env!("CARGO_BIN_EXE_bentoctl"))
        .arg("--help")
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    for command in ["run", "work-on", "prebuilt", "compose-config", "init-docker"] {
        assert!(stdout.contains(command), "help must list '{command}'");
    }
}

#[test]
fn cli_mode_json_lists_every_service_prebuilt() {
    let d = Deployment::new();
    let modes = d.json(&["--json", "mode"]);
    let services: Vec<&str> = modes
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["service"].as_str().unwrap())
        .collect();
    assert_eq!(
        services,
        vec!["drs", "gohan-api", "gohan-elasticsearch", "katsu"]
    );
    assert!(modes
        .as_array()
        .unwrap()
        .iter()
        .all(|m| m["mode"] == "prebuilt"));
    assert!(d.state_db().exists());
}

#[test]
fn cli_work_on_then_prebuilt_round_trip() {
    let d = Deployment::new();

    let report = d.json(&["--json", "work-on", "katsu"]);
    assert_eq!(report["operation"], "work-on");
    assert_eq!(report["succeeded"][0], "katsu");
    assert_eq!(d.mode_of("katsu"), "local");
    assert_eq!(d.mode_of("drs"), "prebuilt");
    assert!(d.path().join("repos/katsu").is_dir());

    d.json(&["--json", "prebuilt", "katsu"]);
    assert_eq!(d.mode_of("katsu"), "prebuilt");
}

#[test]
fn cli_mode_json_parses_with_mixed_warning() {
    let d = Deployment::new();
    d.json(&["--json", "work-on", "katsu"]);

    // MODE is unset, so the base run is prod and katsu is mixed; the
    // warning must go to stderr only.
    let output = d.run(&["--json", "mode"]);
    assert!(output.status.success(), "{}", stderr(&output));
    let modes: serde_json::Value = serde_json::from_slice(&output.stdout)
        .unwrap_or_else(|e| panic!("stdout is not JSON ({e}): {}", String::from_utf8_lossy(&output.stdout)));
    let katsu = modes
        .as_array()
        .unwrap()
        .iter()
        .find(|m| m["service"] == "katsu")
        .unwrap();
    assert_eq!(katsu["mode"], "local");
    assert_eq!(katsu["mixed"], true);
    assert!(stderr(&output).contains("local build in a prod deployment"));
}

#[test]
fn cli_work_on_accepts_kind_and_alias() {
    let d = Deployment::new();
    let output = d.run(&["dev", "metadata"]);
    assert!(output.status.success(), "{}", stderr(&output));
    assert_eq!(d.mode_of("katsu"), "local");
}

#[test]
fn cli_work_on_all_is_rejected() {
    let d = Deployment::new();
    let output = d.run(&["work-on", "all"]);
    assert_eq!(output.status.code(), Some(2));
    assert!(stderr(&output).contains("work-on"));
}

#[test]
fn cli_work_on_without_dev_variant_fails() {
    let d = Deployment::new();
    let output = d.run(&["work-on", "gohan-api"]);
    assert_eq!(output.status.code(), Some(2));
    assert!(stderr(&output).contains("development variant"));
    assert_eq!(d.mode_of("gohan-api"), "prebuilt");
}

#[test]
fn cli_unknown_service_exits_config_error() {
    let d = Deployment::new();
    let output = d.run(&["run", "nope"]);
    assert_eq!(output.status.code(), Some(2));
    assert!(stderr(&output).contains("nope"));
}

#[test]
fn cli_missing_image_variable_is_named() {
    let d = Deployment::new();
    let output = d
        .bentoctl()
        .env_remove("DRS_VERSION")
        .args(["pull", "drs"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(stderr(&output).contains("DRS_VERSION"));
}

#[test]
fn cli_run_all_reports_every_service() {
    let d = Deployment::new();
    let report = d.json(&["--json", "run", "--pull", "--force"]);
    assert_eq!(report["target"], "all");
    assert_eq!(report["succeeded"].as_array().unwrap().len(), 4);
    assert!(report["failed"].as_array().unwrap().is_empty());
}

#[test]
fn cli_group_resolves_enabled_members() {
    let d = Deployment::new();
    let report = d.json(&["--json", "stop", "gohan"]);
    assert_eq!(
        report["succeeded"],
        serde_json::json!(["gohan-api", "gohan-elasticsearch"])
    );
}

#[test]
fn cli_disabled_feature_fails_closed() {
    let d = Deployment::new();
    let output = d
        .bentoctl()
        .env("BENTO_GOHAN_ENABLED", "false")
        .args(["run", "gohan-api"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(stderr(&output).contains("not enabled"));
}

#[test]
fn cli_corrupt_state_exits_state_error() {
    let d = Deployment::new();
    std::fs::write(d.state_db(), b"this is not a database").unwrap();
    let output = d.run(&["mode"]);
    assert_eq!(output.status.code(), Some(3), "{}", stderr(&output));
}

#[test]
fn cli_missing_catalog_exits_config_error() {
    let d = Deployment::new();
    let output = d
        .bentoctl()
        .env("BENTO_SERVICES", d.path().join("missing.json"))
        .arg("mode")
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn cli_env_file_supplies_variables() {
    let d = Deployment::new();
    let env_file = d.path().join("images.env");
    std::fs::write(&env_file, "DRS_VERSION=0.14.0\n").unwrap();
    let output = d
        .bentoctl()
        .env_remove("DRS_VERSION")
        .arg("--env-file")
        .arg(&env_file)
        .args(["pull", "drs"])
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", stderr(&output));
}

#[test]
fn cli_local_env_is_loaded_automatically() {
    let d = Deployment::new();
    std::fs::write(d.path().join("local.env"), "DRS_VERSION=0.14.0\n").unwrap();
    let output = d
        .bentoctl()
        .env_remove("DRS_VERSION")
        .args(["pull", "drs"])
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", stderr(&output));
}

#[test]
fn cli_missing_env_file_fails() {
    let d = Deployment::new();
    let output = d.run(&["--env-file", "nowhere.env", "mode"]);
    assert_eq!(output.status.code(), Some(2));
    assert!(stderr(&output).contains("nowhere.env"));
}

#[test]
fn cli_status_json_rows() {
    let d = Deployment::new();
    let rows = d.json(&["--json", "status", "katsu"]);
    assert_eq!(rows[0]["service"], "katsu");
    assert_eq!(rows[0]["mode"], "prebuilt");
    assert_eq!(rows[0]["status"], "not-found");
}

#[test]
fn cli_compose_config_services_json() {
    let d = Deployment::new();
    let output = d.run(&["compose-config", "--services"]);
    assert!(output.status.success(), "{}", stderr(&output));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("config"));
    assert!(stdout.contains("--services"));
}

#[test]
fn cli_init_docker_json() {
    let d = Deployment::new();
    let reports = d
        .bentoctl()
        .env("BENTO_DOCKER_NETWORKS", "bentov2-katsu-net bentov2-drs-net")
        .args(["--json", "init-docker"])
        .output()
        .unwrap();
    assert!(reports.status.success(), "{}", stderr(&reports));
    let value: serde_json::Value = serde_json::from_slice(&reports.stdout).unwrap();
    assert_eq!(value.as_array().unwrap().len(), 2);
    assert_eq!(value[0]["network"], "bentov2-katsu-net");
}

#[test]
fn cli_shell_rejects_unknown_shell() {
    let d = Deployment::new();
    let output = d.run(&["shell", "katsu", "--shell", "/bin/zsh"]);
    assert!(!output.status.success());
}

#[test]
fn cli_shell_exit_code_passes_through() {
    let d = Deployment::new();
    let output = d.run(&["shell", "katsu", "--shell", "/bin/sh"]);
    assert_eq!(output.status.code(), Some(0), "{}", stderr(&output));
}

#[test]
fn cli_completions_generate() {
    let output = Command::new(env!("CARGO_BIN_EXE_bentoctl"))
        .args(["completions", "bash"])
        .output()
        .unwrap();
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("bentoctl"));
}

#[test]
fn cli_man_pages_written() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("man");
    let output = Command::new(env!("CARGO_BIN_EXE_bentoctl"))
        .arg("man-pages")
        .arg(&out)
        .output()
        .unwrap();
    assert!(output.status.success());
    assert!(out.join("bentoctl.1").exists());
    assert!(out.join("bentoctl-work-on.1").exists());
}
