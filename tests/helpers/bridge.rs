use alert_relay::delivery::{BridgeConfig, ProcessBridge};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// A bridge that runs `script` with `sh -c`; the per-message arguments
/// arrive as `$1`, `$2`, ... after `extra_fixed`.
pub fn shell_bridge(script: &str, extra_fixed: &[&str], timeout: Duration) -> ProcessBridge {
    let mut fixed_args = vec!["-c".to_string(), script.to_string(), "bridge".to_string()];
    fixed_args.extend(extra_fixed.iter().map(|s| s.to_string()));
    ProcessBridge::new(BridgeConfig {
        executable: "sh".to_string(),
        fixed_args,
        timeout,
    })
}

/// A bridge that writes each argument it receives, one per line, to
/// `<dir>/argv-<destination>`, then reports progress on stdout.
pub fn recording_bridge(dir: &Path, extra_fixed: &[&str]) -> ProcessBridge {
    let destination_position = extra_fixed.len() + 1;
    let script = format!(
        "printf '%s\\n' \"$@\" > \"{}/argv-${{{}}}\"\necho sent\n",
        dir.display(),
        destination_position,
    );
    shell_bridge(&script, extra_fixed, Duration::from_secs(10))
}

pub fn recorded_args(dir: &Path, destination: i64) -> Vec<String> {
    let path: PathBuf = dir.join(format!("argv-{}", destination));
    std::fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("bridge did not record {}: {}", path.display(), e))
        .lines()
        .map(str::to_string)
        .collect()
}
