//! App management commands.

use biominer_app_util::test_utils::AppFixture;
use predicates::prelude::*;
use serde_json::{Value, json};
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use zip::write::SimpleFileOptions;

use crate::common::TestEnv;

fn write_app_zip(path: &Path, name: &str, with_inputs: bool) {
    let mut writer = zip::ZipWriter::new(File::create(path).unwrap());
    let options = SimpleFileOptions::default();
    let mut entries = vec![
        (format!("{name}/workflow.wdl"), "workflow w {}\n"),
        (format!("{name}/tasks/align.wdl"), "task align {}\n"),
        (format!("{name}/tasks/notes.txt"), "not extracted"),
        (format!("{name}/README.md"), "# Zipped app\n"),
    ];
    if with_inputs {
        entries.push((format!("{name}/inputs"), r#"{"id": "{{ sample_id }}"}"#));
    }
    for (entry, content) in entries {
        writer.start_file(entry, options).unwrap();
        writer.write_all(content.as_bytes()).unwrap();
    }
    writer.finish().unwrap();
}

#[test]
fn test_version() {
    let env = TestEnv::new();
    env.cmd()
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::starts_with(format!("v{}", env!("CARGO_PKG_VERSION"))));
}

#[test]
fn test_apps_lists_plain_and_namespaced() {
    let env = TestEnv::new();
    env.cmd().arg("apps").assert().success().stdout(predicate::str::contains("No apps installed"));

    env.add_app("wes-latest", AppFixture::builder());
    env.add_app("choppy/rnaseq-v1.0", AppFixture::builder());
    fs::create_dir_all(env.app_root().join("not-an-app")).unwrap();

    env.cmd()
        .arg("apps")
        .assert()
        .success()
        .stdout(predicate::eq("choppy/rnaseq-v1.0\nwes-latest\n"));
}

#[test]
fn test_install_from_zip_then_reinstall() {
    let env = TestEnv::new();
    let archive = env.app_root().parent().unwrap().join("dna-v2.zip");
    write_app_zip(&archive, "dna-v2", true);

    env.cmd().arg("install").arg(&archive).assert().success();

    let app_dir = env.app_root().join("dna-v2");
    assert!(app_dir.join("inputs").is_file());
    assert!(app_dir.join("tasks/align.wdl").is_file());
    assert!(!app_dir.join("tasks/notes.txt").exists());

    env.cmd()
        .arg("install")
        .arg(&archive)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("--force"));

    env.cmd().arg("install").arg(&archive).arg("--force").assert().success();

    env.cmd()
        .args(["manual", "dna-v2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("# Zipped app"));
}

#[test]
fn test_install_invalid_zip_is_rejected() {
    let env = TestEnv::new();
    let archive = env.app_root().parent().unwrap().join("broken.zip");
    write_app_zip(&archive, "broken", false);

    env.cmd()
        .arg("install")
        .arg(&archive)
        .assert()
        .failure()
        .stderr(predicate::str::contains("not a valid app"));
    assert!(!env.app_root().join("broken").exists());
}

#[test]
fn test_uninstall() {
    let env = TestEnv::new();
    env.add_app("wes-latest", AppFixture::builder());

    env.cmd()
        .args(["uninstall", "missing", "--yes"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("No such app: missing"));

    // No terminal on stdin: declined without --yes
    env.cmd().args(["uninstall", "wes-latest"]).assert().success();
    assert!(env.app_root().join("wes-latest").exists());

    env.cmd().args(["uninstall", "wes-latest", "--yes"]).assert().success();
    assert!(!env.app_root().join("wes-latest").exists());
}

#[test]
fn test_manual_without_readme() {
    let env = TestEnv::new();
    env.add_app("wes-latest", AppFixture::builder());

    env.cmd()
        .args(["manual", "wes-latest"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No manual entry for wes-latest"));
}

#[test]
fn test_vars_with_and_without_defaults() {
    let env = TestEnv::new();
    env.add_app(
        "wes-latest",
        AppFixture::builder()
            .inputs(r#"{"id": "{{ sample_id }}", "fq": "{{ read1 }}", "t": {{ threads }}}"#)
            .workflow("workflow {{ project_name }} {}\n{% for l in lanes %}{{ l }}{% endfor %}\n")
            .defaults(json!({"threads": 4})),
    );

    env.cmd()
        .args(["vars", "wes-latest"])
        .assert()
        .success()
        .stdout(predicate::eq("lanes\nread1\nsample_id\nthreads\n"));

    env.cmd()
        .args(["vars", "wes-latest", "--no-default"])
        .assert()
        .success()
        .stdout(predicate::eq("lanes\nread1\nsample_id\n"));
}

#[test]
fn test_check_samples_header() {
    let env = TestEnv::new();
    env.add_app(
        "wes-latest",
        AppFixture::builder()
            .inputs(r#"{"id": "{{ sample_id }}", "fq": "{{ read1 }}", "t": {{ threads }}}"#)
            .defaults(json!({"threads": 4})),
    );
    let complete = env.write_file("complete.csv", "sample_id,read1,threads\nS1,a.fq,2\n");
    let partial = env.write_file("partial.csv", "sample_id,read1\nS1,a.fq\n");

    env.cmd().args(["check", "wes-latest"]).arg(&complete).assert().success();
    env.cmd().args(["check", "wes-latest"]).arg(&partial).assert().code(1);
    env.cmd().args(["check", "wes-latest"]).arg(&partial).arg("--no-default").assert().success();
}

#[test]
fn test_defaults_set_and_show() {
    let env = TestEnv::new();
    let app_dir = env.add_app("wes-latest", AppFixture::builder().defaults(json!({"reference": "hg19"})));

    env.cmd()
        .args(["defaults", "wes-latest", "set", "threads:8", "reference:hg38", "flags:[1,2]"])
        .assert()
        .success();

    let saved: Value = serde_json::from_str(&fs::read_to_string(app_dir.join("defaults")).unwrap()).unwrap();
    assert_eq!(saved, json!({"flags": [1, 2], "reference": "hg38", "threads": 8}));

    let output = env.cmd().args(["defaults", "wes-latest", "show", "threads"]).output().unwrap();
    assert!(output.status.success());
    let shown: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(shown, json!({"threads": 8}));

    env.cmd()
        .args(["defaults", "wes-latest", "set", "novalue"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("novalue"));
}

#[test]
fn test_config_init_and_path() {
    let env = TestEnv::new();
    let config_path = env.app_root().parent().unwrap().join("config.toml");

    env.cmd()
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains(config_path.display().to_string()));

    env.cmd().args(["config", "init"]).assert().success();
    assert!(fs::read_to_string(&config_path).unwrap().contains("# endpoint"));

    env.cmd()
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains(env.app_root().display().to_string()));
}
