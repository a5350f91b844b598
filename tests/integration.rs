//! Integration tests for the fixdex CLI

use std::fs;
use std::path::PathBuf;

use assert_cmd::Command as AssertCommand;
use predicates::prelude::*;
use tempfile::TempDir;

// =============================================================================
// Test Helpers
// =============================================================================

/// Test environment with an isolated config, data dir, and image dir
struct TestEnv {
    _temp_dir: TempDir,
    config_path: PathBuf,
    data_dir: PathBuf,
    image_dir: PathBuf,
}

impl TestEnv {
    fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        let data_dir = temp_dir.path().join("data");
        let image_dir = temp_dir.path().join("images");
        fs::create_dir_all(&image_dir).unwrap();

        let config = format!(
            r#"backend = "local"
data_dir = "{}"

[image]
root = "{}"
placeholder = "{}"
"#,
            data_dir.display(),
            image_dir.display(),
            temp_dir.path().join("placeholder.png").display(),
        );
        fs::write(&config_path, config).unwrap();

        Self {
            _temp_dir: temp_dir,
            config_path,
            data_dir,
            image_dir,
        }
    }

    /// Run fixdex with this test env's config
    fn fixdex(&self) -> AssertCommand {
        let mut cmd = AssertCommand::cargo_bin("fixdex").unwrap();
        cmd.args(["--config", self.config_path.to_str().unwrap()]);
        cmd
    }

    /// Add an error record and return its id
    fn add_error(&self, brand: &str, model: &str, code: &str) -> String {
        let output = self
            .fixdex()
            .args([
                "add-error",
                "--brand",
                brand,
                "--device-type",
                "washer",
                "--model",
                model,
                "--error-code",
                code,
            ])
            .assert()
            .success()
            .get_output()
            .stdout
            .clone();
        let stdout = String::from_utf8(output).unwrap();
        stdout
            .trim()
            .rsplit(' ')
            .next()
            .expect("add-error prints the new id")
            .to_string()
    }

    /// Drop a decodable 1x1 image fixture into the image dir
    fn write_image(&self, name: &str) {
        let path = self.image_dir.join(name);
        image::RgbImage::from_pixel(1, 1, image::Rgb([40, 80, 120]))
            .save(&path)
            .unwrap();
    }
}

// =============================================================================
// CRUD and Search
// =============================================================================

#[test]
fn test_add_and_list_error_records() {
    let env = TestEnv::new();
    let id = env.add_error("LG", "A1", "E1");

    env.fixdex()
        .args(["list", "errors"])
        .assert()
        .success()
        .stdout(predicate::str::contains(&id))
        .stdout(predicate::str::contains("LG A1 [E1]"));
}

#[test]
fn test_add_error_rejects_blank_required_field() {
    let env = TestEnv::new();
    env.fixdex()
        .args([
            "add-error",
            "--brand",
            "  ",
            "--device-type",
            "washer",
            "--model",
            "A1",
            "--error-code",
            "E1",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("missing required field: brand"));
}

#[test]
fn test_search_resolves_single_exact_match_and_renders_all() {
    let env = TestEnv::new();
    env.add_error("LG", "A1", "E1");
    env.add_error("LG", "A2", "E2");

    env.fixdex()
        .args(["search", "errors", "--field", "brand", "lg"])
        .assert()
        .success()
        .stdout(predicate::str::contains("LG A1 [E1]"))
        .stdout(predicate::str::contains("LG A2 [E2]"));
}

#[test]
fn test_search_suggests_without_rendering_records() {
    let env = TestEnv::new();
    env.add_error("LG", "A1", "E1");
    env.add_error("LG", "A2", "E2");

    env.fixdex()
        .args(["search", "errors", "--field", "model", "a"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Suggestions:"))
        .stdout(predicate::str::contains("A1"))
        .stdout(predicate::str::contains("A2"))
        .stdout(predicate::str::contains("[E1]").not());
}

#[test]
fn test_search_reports_empty_suggestion_set() {
    let env = TestEnv::new();
    env.add_error("LG", "A1", "E1");

    env.fixdex()
        .args(["search", "errors", "--field", "model", "a1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("LG A1 [E1]"));

    env.fixdex()
        .args(["search", "errors", "--field", "model", "zz"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No suggestions."));
}

#[test]
fn test_search_rejects_unknown_field_selector() {
    let env = TestEnv::new();
    env.fixdex()
        .args(["search", "errors", "--field", "serial", "x"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown field selector"));
}

#[test]
fn test_set_updates_one_field_and_validates() {
    let env = TestEnv::new();
    let id = env.add_error("LG", "A1", "E1");

    env.fixdex()
        .args(["set", "errors", &id, "model", "B7"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Updated"));

    env.fixdex()
        .args(["list", "errors"])
        .assert()
        .success()
        .stdout(predicate::str::contains("LG B7 [E1]"));

    // Blanking a required field is rejected without a partial write.
    env.fixdex()
        .args(["set", "errors", &id, "brand", "  "])
        .assert()
        .failure()
        .stderr(predicate::str::contains("missing required field: brand"));

    env.fixdex()
        .args(["list", "errors"])
        .assert()
        .success()
        .stdout(predicate::str::contains("LG B7 [E1]"));
}

#[test]
fn test_rm_removes_record() {
    let env = TestEnv::new();
    let id = env.add_error("LG", "A1", "E1");

    env.fixdex()
        .args(["rm", "errors", &id])
        .assert()
        .success()
        .stdout(predicate::str::contains("Removed"));

    env.fixdex()
        .args(["list", "errors"])
        .assert()
        .success()
        .stdout(predicate::str::contains(&id).not());
}

#[test]
fn test_stock_add_and_search() {
    let env = TestEnv::new();
    env.fixdex()
        .args([
            "add-stock",
            "--part-name",
            "Drain pump",
            "--for-model",
            "A1",
            "--qty",
            "3",
        ])
        .assert()
        .success();

    env.fixdex()
        .args(["search", "stock", "--field", "partName", "drain pump"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Drain pump (A1)  x3"));
}

// =============================================================================
// Export / Import
// =============================================================================

#[test]
fn test_export_then_import_counts_duplicates() {
    let env = TestEnv::new();
    env.add_error("LG", "A1", "E1");

    let export_path = env.data_dir.join("error_data.json");
    env.fixdex()
        .args(["export", "errors", "-o", export_path.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("Exported 1 record(s)"));

    // Extend the exported file with one new record, then import: the
    // existing triple is skipped, the new one added.
    let mut records: Vec<serde_json::Value> =
        serde_json::from_str(&fs::read_to_string(&export_path).unwrap()).unwrap();
    records.push(serde_json::json!({
        "brand": "LG",
        "type": "washer",
        "model": "A2",
        "errorCode": "E2"
    }));
    fs::write(&export_path, serde_json::to_string(&records).unwrap()).unwrap();

    env.fixdex()
        .args(["import", "errors", export_path.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("1 added, 1 skipped"));

    env.fixdex()
        .args(["list", "errors"])
        .assert()
        .success()
        .stdout(predicate::str::contains("A1"))
        .stdout(predicate::str::contains("A2"));
}

#[test]
fn test_import_malformed_json_aborts() {
    let env = TestEnv::new();
    let bad_path = env._temp_dir.path().join("bad.json");
    fs::write(&bad_path, "{ not json").unwrap();

    env.fixdex()
        .args(["import", "errors", bad_path.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not valid JSON"));

    env.fixdex()
        .args(["list", "errors"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty());
}

// =============================================================================
// Image Resolution
// =============================================================================

#[test]
fn test_resolve_probes_candidates_in_priority_order() {
    let env = TestEnv::new();
    let id = env.add_error("Acme", "X1 Pro", "E5");
    env.write_image("x1_pro.jpg");
    env.write_image("acme_x1_pro.png");

    let output = env
        .fixdex()
        .args(["resolve", "errors", &id])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let stdout = String::from_utf8(output).unwrap();

    let model_hit = stdout.find("x1_pro.jpg").expect("model-derived hit");
    let brand_hit = stdout
        .find("acme_x1_pro.png")
        .expect("brand+model-derived hit");
    assert!(
        model_hit < brand_hit,
        "model candidate should be confirmed before the brand+model join:\n{stdout}"
    );
}

#[test]
fn test_resolve_limit_caps_confirmed_hits() {
    let env = TestEnv::new();
    let id = env.add_error("Acme", "X1 Pro", "E5");
    env.write_image("x1_pro.jpg");
    env.write_image("acme_x1_pro.png");

    env.fixdex()
        .args(["resolve", "errors", &id, "--limit", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("x1_pro.jpg"))
        .stdout(predicate::str::contains("acme_x1_pro.png").not());
}

#[test]
fn test_resolve_without_images_reports_placeholder() {
    let env = TestEnv::new();
    let id = env.add_error("Acme", "X1 Pro", "E5");

    env.fixdex()
        .args(["resolve", "errors", &id])
        .assert()
        .success()
        .stdout(predicate::str::contains("No images found"))
        .stdout(predicate::str::contains("placeholder.png"));
}

#[test]
fn test_search_pick_forces_resolution() {
    let env = TestEnv::new();
    env.add_error("LG", "A1", "E1");
    env.add_error("LG", "A2", "E2");

    // Typing "a" alone keeps the machine suggesting; picking "A2" resolves.
    env.fixdex()
        .args(["search", "errors", "--field", "model", "--pick", "A2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("LG A2 [E2]"))
        .stdout(predicate::str::contains("[E1]").not());
}

#[test]
fn test_show_falls_back_through_candidates_to_first_visible() {
    let env = TestEnv::new();
    let id = env.add_error("Acme", "X1 Pro", "E5");
    // Only the brand+model join exists: earlier candidates fail and the
    // slot cascades to it.
    env.write_image("acme_x1_pro.png");

    env.fixdex()
        .args(["show", "errors", &id])
        .assert()
        .success()
        .stdout(predicate::str::contains("Acme X1 Pro [E5]"))
        .stdout(predicate::str::contains("photo:"))
        .stdout(predicate::str::contains("acme_x1_pro.png"));
}

#[test]
fn test_show_binds_placeholder_when_nothing_loads() {
    let env = TestEnv::new();
    let id = env.add_error("Acme", "X1 Pro", "E5");

    env.fixdex()
        .args(["show", "errors", &id])
        .assert()
        .success()
        .stdout(predicate::str::contains("photo:"))
        .stdout(predicate::str::contains("placeholder.png"));
}

#[test]
fn test_show_prefers_stored_images_over_candidates() {
    let env = TestEnv::new();
    let output = env
        .fixdex()
        .args([
            "add-error",
            "--brand",
            "Acme",
            "--device-type",
            "washer",
            "--model",
            "X1 Pro",
            "--error-code",
            "E5",
            "--image",
            "https://img.example.test/explicit.jpg",
        ])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let id = String::from_utf8(output)
        .unwrap()
        .trim()
        .rsplit(' ')
        .next()
        .unwrap()
        .to_string();

    env.fixdex()
        .args(["show", "errors", &id])
        .assert()
        .success()
        .stdout(predicate::str::contains("explicit.jpg"))
        .stdout(predicate::str::contains("placeholder.png").not());
}

#[test]
fn test_resolve_save_writes_images_back() {
    let env = TestEnv::new();
    let id = env.add_error("Acme", "X1 Pro", "E5");
    env.write_image("x1_pro.jpg");

    env.fixdex()
        .args(["resolve", "errors", &id, "--save"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Saved 1 image reference(s)."));

    let stored = fs::read_to_string(env.data_dir.join("error_codes.json")).unwrap();
    assert!(
        stored.contains("x1_pro.jpg"),
        "confirmed URL should be written back to images: {stored}"
    );
}
