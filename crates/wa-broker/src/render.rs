//! QR code rendering through an external program.

use std::io::ErrorKind;
use std::process::Stdio;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use crate::settings::RenderConfig;

/// Errors from the external renderer.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with {status}: {stderr}")]
    Failed {
        program: String,
        status: std::process::ExitStatus,
        stderr: String,
    },

    #[error("{program} produced no output")]
    Empty { program: String },
}

/// Renders login codes into base64 encoded PNG images.
#[derive(Debug, Clone)]
pub struct QrRenderer {
    program: String,
    args: Vec<String>,
}

impl QrRenderer {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    pub fn from_config(config: &RenderConfig) -> Self {
        Self::new(config.program.clone(), config.args.clone())
    }

    /// Feed `code` to the renderer on stdin and return its stdout as base64.
    pub async fn render_base64(&self, code: &str) -> Result<String, RenderError> {
        let spawn_err = |source| RenderError::Spawn {
            program: self.program.clone(),
            source,
        };

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(spawn_err)?;

        if let Some(mut stdin) = child.stdin.take() {
            // A renderer may exit before reading its input; its exit status decides.
            if let Err(e) = stdin.write_all(code.as_bytes()).await {
                if e.kind() != ErrorKind::BrokenPipe {
                    return Err(spawn_err(e));
                }
            }
        }

        let output = child.wait_with_output().await.map_err(spawn_err)?;
        if !output.status.success() {
            return Err(RenderError::Failed {
                program: self.program.clone(),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        if output.stdout.is_empty() {
            return Err(RenderError::Empty {
                program: self.program.clone(),
            });
        }

        debug!(
            program = %self.program,
            bytes = output.stdout.len(),
            "Rendered login code"
        );
        Ok(STANDARD.encode(&output.stdout))
    }
}
