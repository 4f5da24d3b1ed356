//! End-to-end pipeline tests driving shell-script stand-ins for real tools

#![cfg(unix)]
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use scanforge_core::config::ScanforgeConfig;
use scanforge_core::invocation::ScanEngine;
use scanforge_core::records::{NormalizedRecord, ScanResult, ScanStatus};
use scanforge_core::tools::gobuster::{DirScan, DnsScan, Gobuster, GobusterRequest};
use scanforge_core::tools::hashcat::{Hashcat, HashcatRequest, PresetCrack};
use tempfile::TempDir;

/// Write an executable `/bin/sh` script into `dir`
fn fake_tool(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

fn engine_with(tool: &str, binary: &Path, extra: &str) -> ScanEngine {
    let toml = format!(
        "[tools.{}]\nbinary = \"{}\"\n{}\n",
        tool,
        binary.display(),
        extra
    );
    ScanEngine::new(Arc::new(ScanforgeConfig::parse(&toml).unwrap()))
}

fn dns(domain: &str) -> GobusterRequest {
    GobusterRequest::Dns(DnsScan {
        domain: domain.to_string(),
        ..Default::default()
    })
}

fn dir(url: &str) -> GobusterRequest {
    GobusterRequest::Dir(DirScan {
        url: url.to_string(),
        ..Default::default()
    })
}

/// Value following `flag` in the executed argv
fn argv_value(result: &ScanResult, flag: &str) -> String {
    let argv = &result.execution().unwrap().argv;
    let at = argv.iter().position(|a| a == flag).unwrap();
    argv[at + 1].clone()
}

const WRITE_DIR_REPORT: &str = r#"out=""
while [ $# -gt 0 ]; do
  if [ "$1" = "-o" ]; then out="$2"; fi
  shift
done
sleep 0.2
printf '/admin (Status: 301) [Size: 178]\n/index.php (Status: 200) [Size: 4096]\n' > "$out""#;

/// Writes one hit named after the host of its own `-u` URL
const WRITE_HOST_REPORT: &str = r#"out=""
url=""
while [ $# -gt 0 ]; do
  case "$1" in
    -o) out="$2" ;;
    -u) url="$2" ;;
  esac
  shift
done
host=$(echo "$url" | cut -d/ -f3)
sleep 0.2
printf '/%s (Status: 200) [Size: 1]\n' "$host" > "$out""#;

/// Writes its report, then hangs until killed
const WRITE_REPORT_THEN_HANG: &str = r#"out=""
while [ $# -gt 0 ]; do
  if [ "$1" = "-o" ]; then out="$2"; fi
  shift
done
printf '/slow (Status: 200) [Size: 1]\n' > "$out"
exec sleep 30"#;

#[tokio::test]
async fn missing_binary_is_error_naming_binary() {
    let engine = engine_with(
        "gobuster",
        Path::new("/nonexistent/scanforge-gobuster"),
        "",
    );
    let result = engine.run(&Gobuster, &dns("example.com")).await;

    assert_eq!(result.status(), ScanStatus::Error);
    assert!(result.records().is_empty());
    let message = result.error_message().unwrap();
    assert!(message.contains("/nonexistent/scanforge-gobuster"), "{}", message);
    assert!(message.contains("gobuster command not found"));
}

#[tokio::test]
async fn lines_mixed_with_noise_parse_cleanly() {
    let dir_ = TempDir::new().unwrap();
    let script = fake_tool(
        dir_.path(),
        "gobuster",
        "echo '==============='\necho 'Found: www.example.com'\necho 'progress: 42%'\necho 'Found: mail.example.com'",
    );
    let result = engine_with("gobuster", &script, "")
        .run(&Gobuster, &dns("example.com"))
        .await;

    assert_eq!(result.status(), ScanStatus::Success);
    assert_eq!(result.records().len(), 2);
    match &result.records()[0] {
        NormalizedRecord::Subdomain(s) => assert_eq!(s.subdomain, "www.example.com"),
        other => panic!("unexpected record: {other:?}"),
    }
    assert!(result.execution().unwrap().argv.contains(&"-q".to_string()));
}

#[tokio::test]
async fn dir_scan_two_hits_and_garbage_on_stdout() {
    let dir_ = TempDir::new().unwrap();
    let script = fake_tool(
        dir_.path(),
        "gobuster",
        "echo '/login (Status: 200) [Size: 512]'\necho 'garbage ###'\necho '/robots.txt (Status: 200) [Size: 32]'",
    );
    let result = engine_with("gobuster", &script, "")
        .run(&Gobuster, &dir("http://test.local"))
        .await;

    assert_eq!(result.status(), ScanStatus::Success);
    assert_eq!(result.records().len(), 2);
    let argv = &result.execution().unwrap().argv;
    assert_eq!(argv[1..4], ["dir", "-u", "http://test.local"]);
    assert_eq!(argv[4], "-w");
}

#[tokio::test]
async fn killed_process_with_records_is_partial() {
    let dir_ = TempDir::new().unwrap();
    let script = fake_tool(
        dir_.path(),
        "gobuster",
        "echo 'Found: a.example.com'\necho 'Found: b.example.com'\nexit 137",
    );
    let result = engine_with("gobuster", &script, "")
        .run(&Gobuster, &dns("example.com"))
        .await;

    assert_eq!(result.status(), ScanStatus::Partial);
    assert_eq!(result.records().len(), 2);
    assert!(result.warning().unwrap().contains("137"));
    assert_eq!(result.execution().unwrap().exit_code, Some(137));
}

#[tokio::test]
async fn failure_without_records_reports_stderr() {
    let dir_ = TempDir::new().unwrap();
    let script = fake_tool(
        dir_.path(),
        "gobuster",
        "echo 'Error: wordlist does not exist' >&2\nexit 1",
    );
    let result = engine_with("gobuster", &script, "")
        .run(&Gobuster, &dns("example.com"))
        .await;

    assert_eq!(result.status(), ScanStatus::Error);
    let message = result.error_message().unwrap();
    assert!(message.contains("exited with error code 1"), "{}", message);
    assert!(message.contains("wordlist does not exist"), "{}", message);
}

#[tokio::test]
async fn timeout_keeps_output_seen_so_far() {
    let dir_ = TempDir::new().unwrap();
    let script = fake_tool(
        dir_.path(),
        "gobuster",
        "echo 'Found: early.example.com'\nexec sleep 30",
    );
    let result = engine_with("gobuster", &script, "timeout_secs = 1")
        .run(&Gobuster, &dns("example.com"))
        .await;

    assert_eq!(result.status(), ScanStatus::Partial);
    assert_eq!(result.records().len(), 1);
    assert!(result.warning().unwrap().contains("timed out after 1 seconds"));
    assert!(result.execution().unwrap().timed_out);
}

#[tokio::test]
async fn timeout_without_output_is_error() {
    let dir_ = TempDir::new().unwrap();
    let script = fake_tool(dir_.path(), "gobuster", "exec sleep 30");
    let result = engine_with("gobuster", &script, "timeout_secs = 1")
        .run(&Gobuster, &dns("example.com"))
        .await;

    assert_eq!(result.status(), ScanStatus::Error);
    assert!(result.error_message().unwrap().contains("timed out"));
}

#[tokio::test]
async fn artifact_is_read_then_removed() {
    let dir_ = TempDir::new().unwrap();
    let script = fake_tool(dir_.path(), "gobuster", WRITE_DIR_REPORT);
    let result = engine_with("gobuster", &script, "")
        .run(&Gobuster, &dir("http://target.test"))
        .await;

    assert_eq!(result.status(), ScanStatus::Success);
    assert_eq!(result.records().len(), 2);
    let artifact = argv_value(&result, "-o");
    assert!(!Path::new(&artifact).exists(), "{} was left behind", artifact);
}

#[tokio::test]
async fn artifact_is_removed_after_failure() {
    let dir_ = TempDir::new().unwrap();
    let script = fake_tool(dir_.path(), "gobuster", "exit 2");
    let result = engine_with("gobuster", &script, "")
        .run(&Gobuster, &dir("http://target.test"))
        .await;

    assert_eq!(result.status(), ScanStatus::Error);
    let artifact = argv_value(&result, "-o");
    assert!(!Path::new(&artifact).exists());
}

#[tokio::test]
async fn artifact_is_removed_after_timeout() {
    let dir_ = TempDir::new().unwrap();
    let script = fake_tool(dir_.path(), "gobuster", WRITE_REPORT_THEN_HANG);
    let result = engine_with("gobuster", &script, "timeout_secs = 1")
        .run(&Gobuster, &dir("http://target.test"))
        .await;

    assert_eq!(result.status(), ScanStatus::Partial);
    assert!(result.execution().unwrap().timed_out);
    match &result.records()[..] {
        [NormalizedRecord::Path(p)] => assert_eq!(p.path, "/slow"),
        other => panic!("unexpected records: {other:?}"),
    }
    let artifact = argv_value(&result, "-o");
    assert!(!Path::new(&artifact).exists(), "{} was left behind", artifact);
}

#[tokio::test]
async fn concurrent_invocations_see_only_their_own_artifact() {
    let dir_ = TempDir::new().unwrap();
    let script = fake_tool(dir_.path(), "gobuster", WRITE_HOST_REPORT);
    let engine = engine_with("gobuster", &script, "");

    let first = dir("http://one.test");
    let second = dir("http://two.test");
    let (a, b) = tokio::join!(
        engine.run(&Gobuster, &first),
        engine.run(&Gobuster, &second)
    );

    assert_ne!(argv_value(&a, "-o"), argv_value(&b, "-o"));
    for (result, host) in [(&a, "one.test"), (&b, "two.test")] {
        assert_eq!(result.status(), ScanStatus::Success);
        match result.records() {
            [NormalizedRecord::Path(p)] => assert_eq!(p.path, format!("/{}", host)),
            other => panic!("unexpected records for {}: {other:?}", host),
        }
    }
}

#[tokio::test]
async fn hashcat_exhausted_exit_is_not_an_error() {
    let dir_ = TempDir::new().unwrap();
    let hashes = dir_.path().join("hashes.txt");
    let wordlist = dir_.path().join("words.txt");
    std::fs::write(&hashes, "5f4dcc3b5aa765d61d8327deb882cf99\n").unwrap();
    std::fs::write(&wordlist, "letmein\n").unwrap();
    let script = fake_tool(dir_.path(), "hashcat", "exit 1");

    let request = HashcatRequest::CrackMd5(PresetCrack {
        hash_file: hashes.display().to_string(),
        wordlist: Some(wordlist.display().to_string()),
    });
    let result = engine_with("hashcat", &script, "").run(&Hashcat, &request).await;

    assert_eq!(result.status(), ScanStatus::Success);
    assert!(result.records().is_empty());
    assert_eq!(result.metadata()["status"], "exhausted");
    assert_eq!(result.metadata()["hash_type"], 0);
}
