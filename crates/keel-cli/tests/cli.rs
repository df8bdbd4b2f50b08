//! Command-line behaviour against a release directory on disk

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const MANIFEST: &str = r#"
name: shop
releases:
  - name: app
stemcells:
  - { alias: default, os: ubuntu-jammy }
instance_groups:
  - name: backend
    instances: 2
    azs: [z1]
    stemcell: default
    jobs:
      - name: api
        release: app
        properties:
          port: 9000
  - name: frontend
    instances: 1
    stemcell: default
    jobs:
      - name: web
        release: app
addons:
  - name: logging
    jobs: [{ name: shipper, release: app }]
    include:
      instance_groups: [frontend]
"#;

fn write(path: &Path, contents: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

fn fixture() -> TempDir {
    let dir = TempDir::new().unwrap();
    let jobs = dir.path().join("releases/app/jobs");
    write(&dir.path().join("manifest.yml"), MANIFEST);

    write(
        &jobs.join("api/spec"),
        r#"
name: api
templates:
  bpm.yml.erb: config/bpm.yml
provides:
  - { name: api, type: http, properties: [port] }
properties:
  port: { default: 8080 }
"#,
    );
    write(
        &jobs.join("api/templates/bpm.yml.erb"),
        "processes:\n  - name: api\n    executable: /var/vcap/jobs/api/bin/run\n    args: [\"--port={{ p.port }}\"]\n",
    );

    write(
        &jobs.join("web/spec"),
        r#"
name: web
templates:
  bpm.yml.erb: config/bpm.yml
consumes:
  - { name: api, type: http }
"#,
    );
    write(
        &jobs.join("web/templates/bpm.yml.erb"),
        "processes:\n  - name: web\n    executable: /bin/web\n    env:\n      API_URL: \"http://{{ link.api.address }}:{{ link.api.properties.port }}\"\n",
    );

    write(
        &jobs.join("shipper/spec"),
        "name: shipper\ntemplates:\n  bpm.yml.erb: config/bpm.yml\n",
    );
    write(
        &jobs.join("shipper/templates/bpm.yml.erb"),
        "processes:\n  - name: shipper\n    executable: /bin/ship\n",
    );
    dir
}

fn keel(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("keel").unwrap();
    for var in [
        "KEEL_CONFIG",
        "KEEL_RELEASES",
        "KEEL_NAMESPACE",
        "KEEL_CLUSTER_DOMAIN",
        "KEEL_OPERATOR_IMAGE",
        "RUST_LOG",
    ] {
        cmd.env_remove(var);
    }
    cmd.current_dir(dir.path())
        .arg("--config")
        .arg(dir.path().join("missing.toml"));
    cmd
}

fn stdout_json(cmd: &mut Command) -> serde_json::Value {
    let output = cmd.output().unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    serde_json::from_slice(&output.stdout).unwrap()
}

#[test]
fn resolve_renders_links_into_process_configs() {
    let dir = fixture();
    let resolved = stdout_json(keel(&dir).args([
        "-n",
        "prod",
        "-o",
        "json",
        "resolve",
        "-m",
        "manifest.yml",
        "-g",
        "frontend",
    ]));

    let group = &resolved[0];
    assert_eq!(group["namespace"], "prod");
    let jobs = group["instance_group"]["jobs"].as_array().unwrap();
    assert_eq!(jobs.len(), 2);

    let web = &jobs[0];
    assert_eq!(web["name"], "web");
    assert_eq!(
        web["resolved"]["bpm"]["processes"][0]["env"]["API_URL"],
        "http://shop-backend.prod.svc.cluster.local:9000"
    );
    assert_eq!(
        web["resolved"]["consumes"]["api"]["instances"]
            .as_array()
            .unwrap()
            .len(),
        2
    );
    assert_eq!(jobs[1]["name"], "shipper");
    assert_eq!(jobs[1]["addon"], "logging");
}

#[test]
fn resolve_process_configs_carry_a_digest() {
    let dir = fixture();
    let mut cmd = keel(&dir);
    cmd.args(["-o", "json", "resolve", "-m", "manifest.yml", "--all", "--process-configs"]);

    let first = stdout_json(&mut cmd);
    let second = stdout_json(&mut cmd);
    assert_eq!(first, second);

    let backend = &first[0];
    assert_eq!(backend["instance_group"], "backend");
    assert_eq!(
        backend["configs"]["api"]["processes"][0]["args"][0],
        "--port=9000"
    );
    assert_eq!(backend["digest"].as_str().unwrap().len(), 64);
}

#[test]
fn resolve_table_output() {
    let dir = fixture();
    keel(&dir)
        .args(["resolve", "-m", "manifest.yml"])
        .assert()
        .success()
        .stdout(predicate::str::contains("shipper"))
        .stdout(predicate::str::contains("frontend resolved"));
}

#[test]
fn unknown_instance_group_fails() {
    let dir = fixture();
    keel(&dir)
        .args(["resolve", "-m", "manifest.yml", "-g", "database"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("instance group database"));
}

#[test]
fn missing_release_job_fails() {
    let dir = fixture();
    fs::remove_file(dir.path().join("releases/app/jobs/api/spec")).unwrap();
    keel(&dir)
        .args(["resolve", "-m", "manifest.yml", "-g", "backend"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Release lookup failed"));
}

#[test]
fn instances_lists_addresses() {
    let dir = fixture();
    let jobs = stdout_json(keel(&dir).args([
        "-o",
        "json",
        "instances",
        "-m",
        "manifest.yml",
        "-g",
        "backend",
    ]));

    let instances = jobs[0]["instances"].as_array().unwrap();
    assert_eq!(instances.len(), 2);
    assert_eq!(instances[0]["az"], "z1");
    assert_eq!(instances[0]["bootstrap"], true);
    assert_eq!(instances[1]["address"], "shop-backend-1.default.svc.cluster.local");
}

#[test]
fn links_shows_provider_table() {
    let dir = fixture();
    let links = stdout_json(keel(&dir).args(["-o", "json", "links", "-m", "manifest.yml"]));

    let links = links.as_array().unwrap();
    assert_eq!(links.len(), 1);
    assert_eq!(links[0]["type"], "http");
    assert_eq!(links[0]["name"], "api");
    assert_eq!(links[0]["properties"]["port"], 9000);
}

#[test]
fn addons_reports_placement() {
    let dir = fixture();
    let rows = stdout_json(keel(&dir).args(["-o", "json", "addons", "-m", "manifest.yml"]));

    assert_eq!(
        rows,
        serde_json::json!([
            { "addon": "logging", "instance_group": "backend", "placed": "no" },
            { "addon": "logging", "instance_group": "frontend", "placed": "yes" },
        ])
    );
}

#[test]
fn config_reflects_flags() {
    let dir = fixture();
    let config = stdout_json(keel(&dir).args([
        "-o",
        "json",
        "--cluster-domain",
        "corp.internal",
        "--operator-image",
        "keel/operator:3",
        "config",
    ]));

    assert_eq!(config["releases_dir"], "releases");
    assert_eq!(config["resolver"]["cluster_domain"], "corp.internal");
    assert_eq!(config["resolver"]["operator_image"], "keel/operator:3");
    assert_eq!(config["resolver"]["namespace"], "default");
}
