use assert_cmd::prelude::*; // Add methods on commands
use predicates::prelude::*; // Used for writing assertions
use std::path::Path;
use std::process::Command; // Run programs
use tempfile;
type STDRESULT = Result<(),Box<dyn std::error::Error>>;

fn roundtrip_test(base_name: &str,method: &str) -> STDRESULT {
    let in_path = Path::new("tests").join([base_name,".txt"].concat());
    let temp_dir = tempfile::tempdir()?;
    let packed_path = temp_dir.path().join([base_name,".pak"].concat());
    let out_path = temp_dir.path().join([base_name,".txt"].concat());
    let mut cmd = Command::cargo_bin("prefixpress")?;
    cmd.arg("compress")
        .arg("-m").arg(method)
        .arg("-i").arg(&in_path)
        .arg("-o").arg(&packed_path)
        .assert()
        .success();
    let mut cmd = Command::cargo_bin("prefixpress")?;
    cmd.arg("expand")
        .arg("-m").arg(method)
        .arg("-i").arg(&packed_path)
        .arg("-o").arg(&out_path)
        .assert()
        .success();
    match (std::fs::read(in_path),std::fs::read(out_path)) {
        (Ok(v1),Ok(v2)) => {
            assert_eq!(v1,v2);
        },
        _ => panic!("unable to compare output with original")
    }
    Ok(())
}

#[test]
fn huff_roundtrip() -> STDRESULT {
    roundtrip_test("willow_farm","huff")
}

#[test]
fn lz78_roundtrip() -> STDRESULT {
    roundtrip_test("willow_farm","lz78")
}

#[test]
fn lz78_hash_roundtrip() -> STDRESULT {
    roundtrip_test("willow_farm","lz78-hash")
}

#[test]
fn unknown_method_is_rejected() -> STDRESULT {
    let in_path = Path::new("tests").join("willow_farm.txt");
    let temp_dir = tempfile::tempdir()?;
    let out_path = temp_dir.path().join("willow_farm.txt");
    let mut cmd = Command::cargo_bin("prefixpress")?;
    cmd.arg("expand")
        .arg("-m").arg("lz77")
        .arg("-i").arg(&in_path)
        .arg("-o").arg(&out_path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("not supported"));
    Ok(())
}

#[test]
fn huff_beats_plain_text() -> STDRESULT {
    let in_path = Path::new("tests").join("willow_farm.txt");
    let temp_dir = tempfile::tempdir()?;
    let packed_path = temp_dir.path().join("willow_farm.pak");
    let mut cmd = Command::cargo_bin("prefixpress")?;
    cmd.arg("compress")
        .arg("-m").arg("huff")
        .arg("-i").arg(&in_path)
        .arg("-o").arg(&packed_path)
        .assert()
        .success();
    let original = std::fs::metadata(in_path)?.len();
    let packed = std::fs::metadata(packed_path)?.len();
    assert!(packed < original);
    Ok(())
}
