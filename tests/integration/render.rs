//! Rendering batches end to end.

use biominer_app_util::core::AppUtilError;
use biominer_app_util::materialize::{RenderOptions, render_app};
use biominer_app_util::test_utils::AppFixture;
use predicates::prelude::*;
use serde_json::{Value, json};
use std::fs;

use crate::common::TestEnv;

fn read_json(path: &std::path::Path) -> Value {
    serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
}

#[test]
fn test_render_produces_sample_project() {
    let env = TestEnv::new();
    env.add_app(
        "demo-latest",
        AppFixture::builder()
            .inputs(r#"{"id": "{{sample_id}}", "project": "{{project_name}}"}"#)
            .workflow("workflow {{ project_name }}_{{ sample_id }} {}\n")
            .task("align.wdl", "task align {}\n"),
    );
    let samples = env.write_file("samples.json", r#"[{"sample_id": "S1"}]"#);

    env.cmd()
        .args(["render", "demo-latest"])
        .arg(&samples)
        .args(["--project-name", "demo"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Rendered 1 sample(s)"));

    let sample_dir = env.project_root().join("demo/S1");
    assert_eq!(read_json(&sample_dir.join("inputs")), json!({"id": "S1", "project": "demo"}));
    assert_eq!(fs::read_to_string(sample_dir.join("workflow.wdl")).unwrap(), "workflow demo_S1 {}\n");
    assert!(sample_dir.join("tasks/align.wdl").is_file());
    assert!(sample_dir.join("tasks.zip").is_file());
}

#[test]
fn test_render_csv_with_defaults_and_work_dir() {
    let env = TestEnv::new();
    env.add_app(
        "wes-latest",
        AppFixture::builder()
            .inputs(r#"{"id": "{{ sample_id }}", "threads": {{ threads }}, "ref": "{{ reference }}"}"#)
            .defaults(json!({"threads": 4, "reference": "hg19"})),
    );
    let samples = env.write_file("samples.csv", "sample_id,reference\nS1,hg38\nS2,hg38\n");
    let work_dir = env.app_root().parent().unwrap().join("elsewhere");

    env.cmd()
        .args(["render", "wes-latest"])
        .arg(&samples)
        .args(["--project-name", "cohort"])
        .arg("--work-dir")
        .arg(&work_dir)
        .assert()
        .success();

    for id in ["S1", "S2"] {
        let sample_dir = work_dir.join("cohort").join(id);
        assert_eq!(read_json(&sample_dir.join("inputs")), json!({"id": id, "threads": 4, "ref": "hg38"}));
        assert!(sample_dir.join("defaults").is_file());
    }
    assert!(!env.project_root().join("cohort").exists());
}

#[test]
fn test_render_invalid_json_exits_with_code_3() {
    let env = TestEnv::new();
    env.add_app("demo-latest", AppFixture::builder().inputs(r#"{"id": "{{ sample_id }}",}"#));
    let samples = env.write_file("samples.json", r#"{"sample_id": "S1"}"#);

    env.cmd()
        .args(["render", "demo-latest"])
        .arg(&samples)
        .args(["--project-name", "demo"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("line 1 column 13"))
        .stderr(predicate::str::contains("^--"));

    assert!(!env.project_root().join("demo/S1/inputs").exists());
}

#[test]
fn test_render_missing_sample_id_touches_nothing() {
    let env = TestEnv::new();
    env.add_app("demo-latest", AppFixture::builder());
    let samples = env.write_file("samples.json", r#"[{"sample_id": "S1"}, {"name": "x"}]"#);

    env.cmd()
        .args(["render", "demo-latest"])
        .arg(&samples)
        .args(["--project-name", "demo"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("sample_id"));

    assert!(!env.project_root().join("demo").exists());
}

#[test]
fn test_render_rejects_paths_outside_project() {
    let env = TestEnv::new();
    env.add_app("demo-latest", AppFixture::builder());
    let samples = env.write_file("samples.json", r#"[{"sample_id": "../../dotdot"}]"#);

    env.cmd()
        .args(["render", "demo-latest"])
        .arg(&samples)
        .args(["--project-name", "demo", "--force"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("../../dotdot"));
    assert!(!env.project_root().join("demo").exists());

    let samples = env.write_file("ok.json", r#"[{"sample_id": "S1"}]"#);
    env.cmd()
        .args(["render", "demo-latest"])
        .arg(&samples)
        .args(["--project-name", "../outside"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("project name"));
    assert!(!env.project_root().parent().unwrap().join("outside").exists());
}

#[test]
fn test_render_conflict_then_force() {
    let env = TestEnv::new();
    env.add_app("demo-latest", AppFixture::builder());
    let samples = env.write_file("samples.json", r#"[{"sample_id": "S1"}]"#);

    let render = |force: bool| {
        let mut cmd = env.cmd();
        cmd.args(["render", "demo-latest"]).arg(&samples).args(["--project-name", "demo"]);
        if force {
            cmd.arg("--force");
        }
        cmd.assert()
    };

    render(false).success();
    let marker = env.project_root().join("demo/S1/notes.txt");
    fs::write(&marker, "keep me").unwrap();

    render(false).code(1).stderr(predicate::str::contains("exists"));
    assert_eq!(fs::read_to_string(&marker).unwrap(), "keep me");

    render(true).success();
    assert!(env.project_root().join("demo/S1/inputs").is_file());
}

#[test]
fn test_render_unknown_app() {
    let env = TestEnv::new();
    let samples = env.write_file("samples.json", r#"[{"sample_id": "S1"}]"#);

    env.cmd()
        .args(["render", "nope"])
        .arg(&samples)
        .args(["--project-name", "demo"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("No such app: nope"));
}

#[tokio::test]
async fn test_json_and_csv_batches_render_identically() {
    let fixture = AppFixture::builder()
        .inputs(r#"{"id": "{{ sample_id }}", "lane": "{{ lane }}"}"#)
        .workflow("workflow w { # {{ lane }}\n}\n")
        .build();
    let json_samples = fixture.write_file(
        "samples.json",
        r#"[{"sample_id": "S1", "lane": "L1"}, {"sample_id": "S2", "lane": "L2"}]"#,
    );
    let csv_samples = fixture.write_file("samples.csv", "sample_id,lane\nS1,L1\nS2,L2\n");
    let work = tempfile::TempDir::new().unwrap();

    let from_json = render_app(fixture.root(), &json_samples, RenderOptions::new("json", work.path()))
        .await
        .unwrap()
        .into_result()
        .unwrap();
    let from_csv = render_app(fixture.root(), &csv_samples, RenderOptions::new("csv", work.path()))
        .await
        .unwrap()
        .into_result()
        .unwrap();

    assert_eq!(from_json.outcomes.len(), 2);
    assert_eq!(from_csv.outcomes.len(), 2);
    for id in ["S1", "S2"] {
        for file in ["inputs", "workflow.wdl"] {
            let a = fs::read(work.path().join("json").join(id).join(file)).unwrap();
            let b = fs::read(work.path().join("csv").join(id).join(file)).unwrap();
            assert_eq!(a, b, "{id}/{file} differs");
        }
    }
}

#[tokio::test]
async fn test_undefined_variable_fails_only_its_sample() {
    let fixture = AppFixture::builder().inputs(r#"{"id": "{{ sample_id }}", "lane": "{{ lane }}"}"#).build();
    let samples =
        fixture.write_file("samples.json", r#"[{"sample_id": "S1", "lane": "L1"}, {"sample_id": "S2"}]"#);
    let work = tempfile::TempDir::new().unwrap();

    let report = render_app(fixture.root(), &samples, RenderOptions::new("demo", work.path()).max_parallel(2))
        .await
        .unwrap();

    assert_eq!(report.succeeded().count(), 1);
    let failed: Vec<_> = report.failed().collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].sample_id, "S2");
    assert!(matches!(
        failed[0].error(),
        Some(AppUtilError::UndefinedVariable { variable, .. }) if variable == "lane"
    ));
    assert!(work.path().join("demo/S1/inputs").is_file());
    assert!(!work.path().join("demo/S2/inputs").exists());
}
