//! CLI smoke tests for arm64x.

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use tempfile::TempDir;

const BUILD_SLN: &[u8] = include_bytes!("fixtures/build.sln");
const ZLIB: &[u8] = include_bytes!("fixtures/zlib.vcxproj");

fn arm64x_cmd() -> Command {
    cargo_bin_cmd!("arm64x")
}

/// Solution directory with `build.sln` and `zlib\zlib.vcxproj`.
fn solution_dir() -> TempDir {
    let temp = TempDir::new().unwrap();
    std::fs::write(temp.path().join("build.sln"), BUILD_SLN).unwrap();
    std::fs::create_dir(temp.path().join("zlib")).unwrap();
    std::fs::write(temp.path().join("zlib").join("zlib.vcxproj"), ZLIB).unwrap();
    temp
}

// ── help ─────────────────────────────────────────────────────────────────

#[test]
fn help_lists_commands() {
    arm64x_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("fixup-project"))
        .stdout(predicate::str::contains("clone-configuration"));
}

#[test]
fn missing_arguments_fail() {
    arm64x_cmd().arg("clone-configuration").assert().failure();
}

// ── fixup-project ────────────────────────────────────────────────────────

#[test]
fn fixup_project_adds_arm64ec_once() {
    let temp = solution_dir();
    let project = temp.path().join("zlib").join("zlib.vcxproj");

    arm64x_cmd()
        .arg("fixup-project")
        .arg(&project)
        .assert()
        .success()
        .stderr(predicate::str::contains("processing project file"));

    let first = std::fs::read_to_string(&project).unwrap();
    assert!(first.contains("<ProjectConfiguration Include=\"Release|ARM64EC\">"));
    assert!(first.contains("<BuildAsX>true</BuildAsX>"));

    arm64x_cmd().arg("fixup-project").arg(&project).assert().success();
    assert_eq!(std::fs::read_to_string(&project).unwrap(), first);
}

#[test]
fn legacy_alias_is_accepted() {
    let temp = solution_dir();
    let project = temp.path().join("zlib").join("zlib.vcxproj");

    arm64x_cmd()
        .arg("cmake-vcxproj-setup-arm64x")
        .arg(&project)
        .assert()
        .success();
    assert_ne!(std::fs::read(&project).unwrap(), ZLIB);
}

#[test]
fn fixup_project_rejects_foreign_root() {
    let temp = TempDir::new().unwrap();
    let project = temp.path().join("odd.vcxproj");
    std::fs::write(&project, "<Root><Child/></Root>").unwrap();

    arm64x_cmd()
        .arg("fixup-project")
        .arg(&project)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Malformed project"));
    assert_eq!(std::fs::read_to_string(&project).unwrap(), "<Root><Child/></Root>");
}

#[test]
fn fixup_project_missing_file_fails() {
    let temp = TempDir::new().unwrap();
    arm64x_cmd()
        .arg("fixup-project")
        .arg(temp.path().join("missing.vcxproj"))
        .assert()
        .failure();
}

// ── clone-configuration ──────────────────────────────────────────────────

#[test]
fn clone_configuration_updates_solution_and_project() {
    let temp = solution_dir();

    arm64x_cmd()
        .arg("clone-configuration")
        .arg(temp.path().join("build.sln"))
        .args(["zlib", "ARM64", "ARM64EC"])
        .assert()
        .success()
        .stderr(predicate::str::contains("processing solution file"));

    let sln = std::fs::read(temp.path().join("build.sln")).unwrap();
    let sln = String::from_utf8_lossy(&sln);
    assert!(sln.contains("{86DB31C6-B393-3617-A8FD-885B2E605A2D}.Debug|ARM64EC.ActiveCfg = Debug|ARM64EC\r\n"));
    assert!(sln.contains("\t\tRelease|ARM64EC = Release|ARM64EC\r\n"));
    assert_ne!(std::fs::read(temp.path().join("zlib").join("zlib.vcxproj")).unwrap(), ZLIB);
}

#[test]
fn update_project_file_can_be_disabled() {
    let temp = solution_dir();

    arm64x_cmd()
        .arg("sln-clone-cp")
        .arg(temp.path().join("build.sln"))
        .args(["zlib", "ARM64", "ARM64EC", "--update-project-file", "false"])
        .assert()
        .success();

    assert_ne!(std::fs::read(temp.path().join("build.sln")).unwrap(), BUILD_SLN);
    assert_eq!(std::fs::read(temp.path().join("zlib").join("zlib.vcxproj")).unwrap(), ZLIB);
}

#[test]
fn failed_projects_give_nonzero_exit_but_solution_is_saved() {
    // Only zlib exists on disk; ALL_BUILD and example fail to load.
    let temp = solution_dir();

    arm64x_cmd()
        .arg("clone-configuration")
        .arg(temp.path().join("build.sln"))
        .args(["*", "ARM64", "ARM64EC"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("2 project file(s) failed"));

    let sln = std::fs::read(temp.path().join("build.sln")).unwrap();
    let sln = String::from_utf8_lossy(&sln);
    assert!(sln.contains("{D4E3A8A1-1C2B-3D4E-8F90-112233445566}.Debug|ARM64EC.ActiveCfg"));
    assert_ne!(std::fs::read(temp.path().join("zlib").join("zlib.vcxproj")).unwrap(), ZLIB);
}

#[test]
fn missing_solution_fails() {
    let temp = TempDir::new().unwrap();
    arm64x_cmd()
        .arg("clone-configuration")
        .arg(temp.path().join("none.sln"))
        .args(["*", "ARM64", "ARM64EC"])
        .assert()
        .failure();
}
