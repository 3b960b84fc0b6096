//! CLI integration tests for the jsonapi-core binary.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

fn cmd() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("jsonapi-core"))
}

fn write_temp_file(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).unwrap();
    path
}

const REGISTRY: &str = r#"{
    "resources": [
        {
            "type": "posts",
            "attributes": ["title", "body"],
            "associations": {
                "tags": { "cardinality": "to_many", "type": "tags", "foreign_key": "tag_ids" }
            },
            "filterable_fields": ["title"],
            "sortable_fields": ["title"],
            "creatable_fields": ["title", "body", "tags"],
            "updatable_fields": ["title", "body", "tags"]
        },
        { "type": "tags", "attributes": ["name"] }
    ]
}"#;

mod parse_command {
    use super::*;

    #[test]
    fn valid_index_request() {
        let dir = TempDir::new().unwrap();
        let registry = write_temp_file(&dir, "registry.json", REGISTRY);
        let params = write_temp_file(
            &dir,
            "params.json",
            r#"{ "sort": "-title", "title": "Rust" }"#,
        );

        cmd()
            .args([
                "parse",
                params.to_str().unwrap(),
                "--registry",
                registry.to_str().unwrap(),
                "--action",
                "index",
                "--type",
                "posts",
            ])
            .assert()
            .success()
            .stdout(predicate::str::contains(r#""valid":true"#))
            .stdout(predicate::str::contains(r#""direction":"desc""#));
    }

    #[test]
    fn invalid_request_exits_one_with_error_objects() {
        let dir = TempDir::new().unwrap();
        let registry = write_temp_file(&dir, "registry.json", REGISTRY);
        let params = write_temp_file(&dir, "params.json", r#"{ "bogus": "x" }"#);

        cmd()
            .args([
                "parse",
                params.to_str().unwrap(),
                "--registry",
                registry.to_str().unwrap(),
                "--action",
                "index",
                "--type",
                "posts",
            ])
            .assert()
            .code(1)
            .stdout(predicate::str::contains(r#""valid":false"#))
            .stdout(predicate::str::contains("bogus is not allowed."))
            .stdout(predicate::str::contains(r#""code":102"#));
    }

    #[test]
    fn create_emits_operations() {
        let dir = TempDir::new().unwrap();
        let registry = write_temp_file(&dir, "registry.json", REGISTRY);
        let params = write_temp_file(
            &dir,
            "params.json",
            r#"{ "data": { "type": "posts", "title": "From the CLI" } }"#,
        );

        cmd()
            .args([
                "parse",
                params.to_str().unwrap(),
                "--registry",
                registry.to_str().unwrap(),
                "--action",
                "create",
                "--type",
                "posts",
            ])
            .assert()
            .success()
            .stdout(predicate::str::contains(r#""op":"create_resource""#))
            .stdout(predicate::str::contains("From the CLI"));
    }

    #[test]
    fn unknown_action_exits_two() {
        let dir = TempDir::new().unwrap();
        let registry = write_temp_file(&dir, "registry.json", REGISTRY);
        let params = write_temp_file(&dir, "params.json", "{}");

        cmd()
            .args([
                "parse",
                params.to_str().unwrap(),
                "--registry",
                registry.to_str().unwrap(),
                "--action",
                "frobnicate",
                "--type",
                "posts",
            ])
            .assert()
            .code(2)
            .stderr(predicate::str::contains("unknown action"));
    }

    #[test]
    fn unknown_key_format_exits_two() {
        let dir = TempDir::new().unwrap();
        let registry = write_temp_file(&dir, "registry.json", REGISTRY);
        let params = write_temp_file(&dir, "params.json", "{}");

        cmd()
            .args([
                "parse",
                params.to_str().unwrap(),
                "--registry",
                registry.to_str().unwrap(),
                "--action",
                "index",
                "--type",
                "posts",
                "--key-format",
                "shouting",
            ])
            .assert()
            .code(2)
            .stderr(predicate::str::contains("unknown key format"));
    }

    #[test]
    fn missing_params_file_exits_three() {
        let dir = TempDir::new().unwrap();
        let registry = write_temp_file(&dir, "registry.json", REGISTRY);

        cmd()
            .args([
                "parse",
                dir.path().join("nope.json").to_str().unwrap(),
                "--registry",
                registry.to_str().unwrap(),
                "--action",
                "index",
                "--type",
                "posts",
            ])
            .assert()
            .code(3)
            .stderr(predicate::str::contains("cannot read"));
    }

    #[test]
    fn malformed_json_exits_two() {
        let dir = TempDir::new().unwrap();
        let registry = write_temp_file(&dir, "registry.json", REGISTRY);
        let params = write_temp_file(&dir, "params.json", "{ not json");

        cmd()
            .args([
                "parse",
                params.to_str().unwrap(),
                "--registry",
                registry.to_str().unwrap(),
                "--action",
                "index",
                "--type",
                "posts",
            ])
            .assert()
            .code(2)
            .stderr(predicate::str::contains("invalid JSON"));
    }
}

mod serialize_command {
    use super::*;

    const DATA: &str = r#"{
        "primary": [{
            "type": "posts",
            "id": "1",
            "attributes": { "title": "Post 1", "body": "first" },
            "to_many": { "tag_ids": ["3"] }
        }],
        "related": [{
            "type": "tags",
            "id": "3",
            "attributes": { "name": "short" }
        }],
        "include": ["tags"]
    }"#;

    #[test]
    fn collection_document_with_include() {
        let dir = TempDir::new().unwrap();
        let registry = write_temp_file(&dir, "registry.json", REGISTRY);
        let data = write_temp_file(&dir, "data.json", DATA);

        cmd()
            .args([
                "serialize",
                data.to_str().unwrap(),
                "--registry",
                registry.to_str().unwrap(),
                "--base-url",
                "http://example.com",
            ])
            .assert()
            .success()
            .stdout(predicate::str::contains(r#""data":[{"#))
            .stdout(predicate::str::contains(r#""included""#))
            .stdout(predicate::str::contains("http://example.com/posts/1"));
    }

    #[test]
    fn single_flag_unwraps_data() {
        let dir = TempDir::new().unwrap();
        let registry = write_temp_file(&dir, "registry.json", REGISTRY);
        let data = write_temp_file(&dir, "data.json", DATA);

        cmd()
            .args([
                "serialize",
                data.to_str().unwrap(),
                "--registry",
                registry.to_str().unwrap(),
                "--single",
            ])
            .assert()
            .success()
            .stdout(predicate::str::contains(r#""data":{"#));
    }

    #[test]
    fn single_flag_rejects_collections() {
        let dir = TempDir::new().unwrap();
        let registry = write_temp_file(&dir, "registry.json", REGISTRY);
        let data = write_temp_file(
            &dir,
            "data.json",
            r#"{ "primary": [
                { "type": "posts", "id": "1" },
                { "type": "posts", "id": "2" }
            ] }"#,
        );

        cmd()
            .args([
                "serialize",
                data.to_str().unwrap(),
                "--registry",
                registry.to_str().unwrap(),
                "--single",
            ])
            .assert()
            .code(2)
            .stderr(predicate::str::contains("exactly one primary resource"));
    }

    #[test]
    fn output_file_and_pretty() {
        let dir = TempDir::new().unwrap();
        let registry = write_temp_file(&dir, "registry.json", REGISTRY);
        let data = write_temp_file(&dir, "data.json", DATA);
        let out = dir.path().join("document.json");

        cmd()
            .args([
                "serialize",
                data.to_str().unwrap(),
                "--registry",
                registry.to_str().unwrap(),
                "--output",
                out.to_str().unwrap(),
                "--pretty",
            ])
            .assert()
            .success();

        let written = fs::read_to_string(&out).unwrap();
        assert!(written.contains("{\n"));
        assert!(written.contains(r#""title": "Post 1""#));
    }
}
