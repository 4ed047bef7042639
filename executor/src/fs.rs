use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::Context;
use serde::Serialize;
use tracing::{error, info};
use uuid::Uuid;

/// Which side of a call a dump file records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DumpKind {
    Request,
    Response,
}

impl DumpKind {
    fn suffix(self) -> &'static str {
        match self {
            DumpKind::Request => "executor_request.json",
            DumpKind::Response => "executor_response.json",
        }
    }
}

/// `<output_dir>/<unix millis>_<uuid>.<suffix>`; the request and response
/// dumps of one call only differ in their suffix.
pub fn dump_file_name(output_dir: &Path, millis: u128, uuid: &Uuid, kind: DumpKind) -> PathBuf {
    output_dir.join(format!("{millis}_{uuid}.{}", kind.suffix()))
}

/// Serializes `value` as pretty JSON into `path`, creating the parent
/// directory if needed.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> anyhow::Result<()> {
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() && !dir.exists() {
            info!("Created output directory {:?}", dir.display());
            std::fs::create_dir_all(dir)
                .with_context(|| format!("creating {}", dir.display()))?;
        }
    }
    let serialized = serde_json::to_vec_pretty(value)?;
    std::fs::write(path, serialized).with_context(|| format!("writing {}", path.display()))
}

/// Writes a dump on a detached thread. Failures are logged and otherwise
/// ignored.
pub fn spawn_dump<T>(output_dir: &Path, uuid: &Uuid, kind: DumpKind, value: T)
where
    T: Serialize + Send + 'static,
{
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    let path = dump_file_name(output_dir, millis, uuid, kind);
    std::thread::spawn(move || {
        if let Err(e) = write_json(&path, &value) {
            error!("failed to dump {}: {e:#}", path.display());
        }
    });
}
