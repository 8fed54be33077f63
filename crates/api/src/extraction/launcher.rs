//! Spawns the external frame extractor and mirrors its progress into the
//! [`ProgressStore`].
//!
//! A launch is fire-and-forget: once the process has been spawned, the only
//! observable effect is the stored [`ProgressRecord`](ppe_core::extraction::ProgressRecord),
//! which is refreshed on every stdout chunk and finalised on exit.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

use ppe_core::extraction::parse_extraction_output;
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tokio::process::{Child, ChildStdout, Command};

use super::store::ProgressStore;

/// Size of a single stdout read.
const READ_CHUNK_BYTES: usize = 8 * 1024;

/// The extractor invocation: `program [script] <video_path> <output_dir>`.
#[derive(Debug, Clone)]
pub struct ExtractorCommand {
    pub program: String,
    pub script: Option<PathBuf>,
}

impl ExtractorCommand {
    fn build(&self, video_path: &Path, output_dir: &Path) -> Command {
        let mut cmd = Command::new(&self.program);
        if let Some(script) = &self.script {
            cmd.arg(script);
        }
        cmd.arg(video_path)
            .arg(output_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        cmd
    }
}

/// Result of a launch request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LaunchOutcome {
    Started,
    /// An extraction for this video is still in `starting`; nothing was done.
    AlreadyRunning,
}

#[derive(Debug, thiserror::Error)]
pub enum LaunchError {
    #[error("failed to create output directory {path}: {source}")]
    OutputDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to spawn extractor '{program}': {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },
}

/// Launches extractions and tracks them in a shared [`ProgressStore`].
pub struct ExtractionLauncher {
    store: Arc<ProgressStore>,
    command: ExtractorCommand,
}

impl ExtractionLauncher {
    pub fn new(store: Arc<ProgressStore>, command: ExtractorCommand) -> Self {
        Self { store, command }
    }

    /// Start extracting `video_path` into `output_dir`.
    ///
    /// Returns [`LaunchOutcome::AlreadyRunning`] without side effects when
    /// the video's record is still `starting`. If the output directory
    /// cannot be created or the process cannot be spawned, the record is
    /// marked `error` and the failure is returned.
    pub async fn launch(
        &self,
        video_path: &Path,
        video_id: &str,
        output_dir: &Path,
    ) -> Result<LaunchOutcome, LaunchError> {
        if !self.store.try_begin(video_id).await {
            tracing::info!(video_id, "Extraction already starting, ignoring launch");
            return Ok(LaunchOutcome::AlreadyRunning);
        }

        if let Err(source) = tokio::fs::create_dir_all(output_dir).await {
            self.mark_failed(video_id).await;
            return Err(LaunchError::OutputDir {
                path: output_dir.to_path_buf(),
                source,
            });
        }

        let mut child = match self.command.build(video_path, output_dir).spawn() {
            Ok(child) => child,
            Err(source) => {
                self.mark_failed(video_id).await;
                return Err(LaunchError::Spawn {
                    program: self.command.program.clone(),
                    source,
                });
            }
        };

        tracing::info!(
            video_id,
            pid = ?child.id(),
            video_path = %video_path.display(),
            output_dir = %output_dir.display(),
            "Extraction started",
        );

        let stdout = child.stdout.take();
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(log_stderr(video_id.to_string(), stderr));
        }
        tokio::spawn(track_extraction(
            Arc::clone(&self.store),
            video_id.to_string(),
            child,
            stdout,
        ));

        Ok(LaunchOutcome::Started)
    }

    async fn mark_failed(&self, video_id: &str) {
        self.store
            .update(video_id, |record, now| record.apply_exit(false, now))
            .await;
    }
}

/// Drain stdout in arrival order, re-parsing the whole buffer after every
/// chunk, then record the exit status.
async fn track_extraction(
    store: Arc<ProgressStore>,
    video_id: String,
    mut child: Child,
    stdout: Option<ChildStdout>,
) {
    let mut buffer: Vec<u8> = Vec::new();

    if let Some(mut stdout) = stdout {
        let mut chunk = vec![0u8; READ_CHUNK_BYTES];
        loop {
            match stdout.read(&mut chunk).await {
                Ok(0) => break,
                Ok(n) => {
                    buffer.extend_from_slice(&chunk[..n]);
                    let output = String::from_utf8_lossy(&buffer).into_owned();
                    let snapshot = parse_extraction_output(&output);
                    tracing::debug!(
                        video_id = %video_id,
                        percent = snapshot.percent,
                        frames_saved = snapshot.frames_saved,
                        status = %snapshot.status,
                        "Extraction progress",
                    );
                    let applied = store
                        .update(&video_id, |record, now| {
                            record.apply_snapshot(snapshot, output, now)
                        })
                        .await;
                    if !applied {
                        tracing::debug!(video_id = %video_id, "Progress record gone, skipping update");
                    }
                }
                Err(e) => {
                    tracing::warn!(video_id = %video_id, error = %e, "Failed to read extractor stdout");
                    break;
                }
            }
        }
    }

    let success = match child.wait().await {
        Ok(status) => {
            tracing::info!(video_id = %video_id, exit_code = ?status.code(), "Extractor exited");
            status.success()
        }
        Err(e) => {
            tracing::error!(video_id = %video_id, error = %e, "Failed to wait for extractor");
            false
        }
    };

    store
        .update(&video_id, |record, now| record.apply_exit(success, now))
        .await;
}

async fn log_stderr<R: AsyncRead + Unpin>(video_id: String, stderr: R) {
    let mut lines = BufReader::new(stderr).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        tracing::warn!(video_id = %video_id, line = %line, "Extractor stderr");
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use assert_matches::assert_matches;
    use ppe_core::extraction::{ExtractionStatus, ProgressRecord};

    use super::*;

    fn write_script(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("extract.sh");
        std::fs::write(&path, format!("#!/bin/bash\n{body}\n")).unwrap();
        path
    }

    fn launcher(store: &Arc<ProgressStore>, script: PathBuf) -> ExtractionLauncher {
        ExtractionLauncher::new(
            Arc::clone(store),
            ExtractorCommand {
                program: "bash".into(),
                script: Some(script),
            },
        )
    }

    async fn wait_terminal(store: &ProgressStore, video_id: &str) -> ProgressRecord {
        for _ in 0..200 {
            if let Some(record) = store.get(video_id).await {
                if record.status.is_terminal() {
                    return record;
                }
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
        panic!("extraction for {video_id} never finished");
    }

    #[tokio::test]
    async fn successful_run_completes_with_parsed_counts() {
        let dir = tempfile::tempdir().unwrap();
        let script = write_script(
            dir.path(),
            "echo 'Video info: 120 frames, 30.00 fps, 4.00 seconds'\n\
             echo 'Progress: 50.0% (60 frames saved)'\n\
             echo 'Frame extraction completed: 120 frames saved to out'",
        );
        let store = Arc::new(ProgressStore::default());
        let launcher = launcher(&store, script);

        let outcome = launcher
            .launch(Path::new("video.mp4"), "ward", &dir.path().join("frames"))
            .await
            .unwrap();
        assert_eq!(outcome, LaunchOutcome::Started);
        assert!(dir.path().join("frames").is_dir());

        let record = wait_terminal(&store, "ward").await;
        assert_eq!(record.status, ExtractionStatus::Completed);
        assert_eq!(record.percent, 100.0);
        assert_eq!(record.frames_saved, 120);
        assert_eq!(record.total_frames, Some(120));
        assert!(record.raw_output.contains("Progress: 50.0%"));
    }

    #[tokio::test]
    async fn nonzero_exit_is_error_and_keeps_percent() {
        let dir = tempfile::tempdir().unwrap();
        let script = write_script(
            dir.path(),
            "echo 'Progress: 40.0% (10 frames saved)'\necho 'boom' >&2\nexit 3",
        );
        let store = Arc::new(ProgressStore::default());
        launcher(&store, script)
            .launch(Path::new("video.mp4"), "ward", dir.path())
            .await
            .unwrap();

        let record = wait_terminal(&store, "ward").await;
        assert_eq!(record.status, ExtractionStatus::Error);
        assert!((record.percent - 40.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn second_launch_while_starting_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let script = write_script(dir.path(), "sleep 1");
        let store = Arc::new(ProgressStore::default());
        let launcher = launcher(&store, script);

        let first = launcher
            .launch(Path::new("video.mp4"), "ward", dir.path())
            .await
            .unwrap();
        let second = launcher
            .launch(Path::new("video.mp4"), "ward", dir.path())
            .await
            .unwrap();
        assert_eq!(first, LaunchOutcome::Started);
        assert_eq!(second, LaunchOutcome::AlreadyRunning);
    }

    #[tokio::test]
    async fn spawn_failure_marks_record_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(ProgressStore::default());
        let launcher = ExtractionLauncher::new(
            Arc::clone(&store),
            ExtractorCommand {
                program: "/nonexistent/extractor-binary".into(),
                script: None,
            },
        );

        let result = launcher
            .launch(Path::new("video.mp4"), "ward", dir.path())
            .await;
        assert_matches!(result, Err(LaunchError::Spawn { .. }));
        assert_eq!(
            store.get("ward").await.unwrap().status,
            ExtractionStatus::Error
        );
    }
}
