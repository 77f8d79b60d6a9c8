use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::path::*;
use std::process::Command;
use tempfile::tempdir;

/// Generate a single L instance with 10 waypoints and 3 landing zones into `root`.
fn generate_single(root: &Path) -> Result<Command, Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin("grtop")?;
    cmd.arg("generate")
        .arg("--profile")
        .arg("L")
        .arg("--min-waypoints")
        .arg("10")
        .arg("--max-waypoints")
        .arg("10")
        .arg("--step-waypoints")
        .arg("10")
        .arg("--min-landing-zones")
        .arg("3")
        .arg("--max-landing-zones")
        .arg("3")
        .arg("--step-landing-zones")
        .arg("1")
        .arg("--instances")
        .arg("1")
        .arg("--seed")
        .arg("7")
        .arg("--quiet")
        .arg("--output-dir")
        .arg(root);
    Ok(cmd)
}

#[test]
fn generate_single_instance() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;

    generate_single(dir.path())?
        .assert()
        .success()
        .stdout(predicate::str::contains("Created 1 instances"));

    let files = std::fs::read_dir(dir.path().join("L"))?
        .map(|e| e.map(|e| e.file_name()))
        .collect::<Result<Vec<_>, _>>()?;
    assert_eq!(files, vec![std::ffi::OsString::from("grtopL_103_1.dat")]);

    let path = dir.path().join("L").join("grtopL_103_1.dat");
    let contents = std::fs::read_to_string(&path)?;
    assert_eq!(contents.lines().count(), 1 + 1 + 10 + 1 + 3);
    assert_eq!(contents.lines().nth(1), Some("10"));
    assert_eq!(contents.lines().nth(12), Some("3"));

    let instance = grtop::Instance::from_file(&path)?;
    assert_eq!(instance.num_waypoints(), 10);
    assert_eq!(instance.num_landing_zones(), 3);
    assert!(instance.conflicts().is_empty());
    let launching = &instance.launching;
    assert!(launching.x >= 0. && launching.x <= 10000.);
    assert!(launching.z >= 4000. && launching.z <= 5000.);

    Ok(())
}

#[test]
fn generate_is_reproducible() -> Result<(), Box<dyn std::error::Error>> {
    let first = tempdir()?;
    let second = tempdir()?;

    generate_single(first.path())?.assert().success();
    generate_single(second.path())?.assert().success();

    let a = std::fs::read_to_string(first.path().join("L").join("grtopL_103_1.dat"))?;
    let b = std::fs::read_to_string(second.path().join("L").join("grtopL_103_1.dat"))?;
    assert_eq!(a, b);

    Ok(())
}

#[test]
fn generate_clean_removes_old_instances() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let size_class = dir.path().join("L");
    std::fs::create_dir_all(&size_class)?;
    std::fs::write(size_class.join("grtopL_5050_9.dat"), "stale")?;
    std::fs::write(size_class.join("notes.txt"), "keep me")?;

    generate_single(dir.path())?
        .arg("--clean")
        .assert()
        .success()
        .stdout(predicate::str::contains("Removed 1 old instances"));

    assert!(!size_class.join("grtopL_5050_9.dat").exists());
    assert!(size_class.join("notes.txt").exists());
    assert!(size_class.join("grtopL_103_1.dat").exists());

    Ok(())
}

#[test]
fn clean_requires_confirmation() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let stale = dir.path().join("grtopS_101_1.dat");
    std::fs::write(&stale, "stale")?;

    let mut cmd = Command::cargo_bin("grtop")?;
    cmd.arg("clean").arg(dir.path());
    cmd.assert().failure().stderr(predicate::str::contains("without confirmation"));
    assert!(stale.exists());

    let mut cmd = Command::cargo_bin("grtop")?;
    cmd.arg("clean").arg(dir.path()).arg("--yes");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Removed 1 old instances"));
    assert!(!stale.exists());

    Ok(())
}

#[test]
fn check_generated_instance() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    generate_single(dir.path())?.assert().success();

    let mut cmd = Command::cargo_bin("grtop")?;
    cmd.arg("check")
        .arg(dir.path().join("L").join("grtopL_103_1.dat"));
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("GRTOP instance L/103/1"))
        .stdout(predicate::str::contains("no overlaps"));

    Ok(())
}

#[test]
fn check_overlapping_instance() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let path = dir.path().join("overlap.dat");
    std::fs::write(
        &path,
        "0.00 0.00 500.00\n\
         1\n\
         100.00 100.00 0.00 20.00 50.00 200.00\n\
         2\n\
         110.00 100.00 0.00 5.00\n\
         500.00 500.00 0.00 5.00\n",
    )?;

    let mut cmd = Command::cargo_bin("grtop")?;
    cmd.arg("check").arg(&path);
    cmd.assert()
        .failure()
        .stdout(predicate::str::contains("landing zone 1 overlaps waypoint 1"))
        .stderr(predicate::str::contains("overlap"));

    Ok(())
}

#[test]
fn check_malformed_instance() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let path = dir.path().join("short.dat");
    std::fs::write(&path, "0.00 0.00 500.00\n2\n1.00 2.00 0.00 10.00 50.00 200.00\n")?;

    let mut cmd = Command::cargo_bin("grtop")?;
    cmd.arg("check").arg(&path);
    cmd.assert().failure().stderr(predicate::str::contains("Error"));

    Ok(())
}

#[test]
fn ply_output() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    generate_single(dir.path())?.assert().success();

    let ply = dir.path().join("scene.ply");
    let mut cmd = Command::cargo_bin("grtop")?;
    cmd.arg("ply")
        .arg(dir.path().join("L").join("grtopL_103_1.dat"))
        .arg(&ply);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Wrote GRTOP instance"));

    let contents = std::fs::read(&ply)?;
    assert!(contents.starts_with(b"ply"));

    Ok(())
}

#[test]
fn profile_round_trip() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;

    let output = Command::cargo_bin("grtop")?.arg("profile").arg("S").output()?;
    assert!(output.status.success());
    let toml = String::from_utf8(output.stdout)?;
    assert!(toml.contains("size_class = \"S\""));

    let config = dir.path().join("tiny.toml");
    std::fs::write(&config, toml)?;
    let mut cmd = Command::cargo_bin("grtop")?;
    cmd.arg("generate")
        .arg("--config")
        .arg(&config)
        .arg("--size-class")
        .arg("tiny")
        .arg("--instances")
        .arg("1")
        .arg("--seed")
        .arg("3")
        .arg("--quiet")
        .arg("--output-dir")
        .arg(dir.path());
    cmd.assert().success();
    assert!(dir.path().join("tiny").join("grtoptiny_101_1.dat").exists());
    assert!(dir.path().join("tiny").join("grtoptiny_102_1.dat").exists());

    Ok(())
}

#[test]
fn invalid_sweep_is_rejected() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;

    let mut cmd = Command::cargo_bin("grtop")?;
    cmd.arg("generate")
        .arg("--profile")
        .arg("S")
        .arg("--step-waypoints")
        .arg("0")
        .arg("--output-dir")
        .arg(dir.path());
    cmd.assert().failure().stderr(predicate::str::contains("step"));
    assert!(!dir.path().join("S").exists());

    let mut cmd = Command::cargo_bin("grtop")?;
    cmd.arg("generate").arg("--profile").arg("XL");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("unknown profile XL"));

    Ok(())
}
