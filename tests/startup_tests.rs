//! Process-level startup behaviour of the `ai-scorer` binary

use std::fs;
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use tempfile::TempDir;

fn serve(dir: &Path, model_path: &Path) -> Child {
    Command::new(env!("CARGO_BIN_EXE_ai-scorer"))
        .args(["serve", "--port", "0", "--model-path"])
        .arg(model_path)
        .current_dir(dir)
        .env_remove("PORT")
        .env_remove("AI_SCORER_MODEL_PATH")
        .env_remove("RUST_LOG")
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap()
}

/// Wait for the child to exit; kill it and return None if it is still running
fn wait_with_deadline(child: &mut Child, deadline: Duration) -> Option<ExitStatus> {
    let start = Instant::now();
    while start.elapsed() < deadline {
        if let Some(status) = child.try_wait().unwrap() {
            return Some(status);
        }
        thread::sleep(Duration::from_millis(50));
    }
    let _ = child.kill();
    let _ = child.wait();
    None
}

#[test]
fn test_corrupt_artifact_fails_serve() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("model.bin");
    let mut bytes = vec![1u8, 1, 253];
    bytes.extend_from_slice(&(1u64 << 44).to_le_bytes());
    bytes.extend_from_slice(b"abc");
    fs::write(&path, &bytes).unwrap();

    let mut child = serve(temp.path(), &path);
    let status = wait_with_deadline(&mut child, Duration::from_secs(30))
        .expect("serve kept running on a corrupt artifact");

    assert!(!status.success());
    assert_eq!(fs::read(&path).unwrap(), bytes);
}

#[test]
fn test_garbage_artifact_fails_serve_with_logged_error() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("model.bin");
    fs::write(&path, b"garbage").unwrap();

    let mut child = serve(temp.path(), &path);
    let status = wait_with_deadline(&mut child, Duration::from_secs(30))
        .expect("serve kept running on a corrupt artifact");
    let output = child.wait_with_output().unwrap();
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert!(!status.success());
    assert!(stderr.contains("Failed to initialize anomaly model"), "{}", stderr);
    assert_eq!(fs::read(&path).unwrap(), b"garbage");
}
