//! Direct keystroke injection via an external typing command
//!
//! Runs a wtype-style tool with the text as its final argument. The `--`
//! separator keeps transcripts that start with a dash from being parsed as
//! flags.

use super::{InsertOutcome, InsertionTransport};
use crate::context::AppContext;
use crate::error::InsertError;
use crate::transcript::InsertionMethod;
use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::Command;

pub struct CommandTypeTransport {
    program: String,
    args: Vec<String>,
}

impl CommandTypeTransport {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }
}

#[async_trait]
impl InsertionTransport for CommandTypeTransport {
    fn method(&self) -> InsertionMethod {
        InsertionMethod::Direct
    }

    async fn insert(&self, text: &str, _target: &AppContext) -> Result<InsertOutcome, InsertError> {
        if text.is_empty() {
            return Ok(InsertOutcome::Delivered);
        }

        let output = Command::new(&self.program)
            .args(&self.args)
            .arg("--")
            .arg(text)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    InsertError::TyperNotFound(self.program.clone())
                } else {
                    InsertError::InjectionFailed(e.to_string())
                }
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(InsertError::InjectionFailed(format!(
                "{} failed: {}",
                self.program,
                stderr.trim()
            )));
        }

        Ok(InsertOutcome::Delivered)
    }
}
