// SPDX-License-Identifier: GPL-3.0-only

//! Inpainting stage backed by an external tool
//!
//! Each invocation writes the frame to `<uuid>_in.<ext>` in the work
//! directory, runs the configured command synchronously and hands back
//! `<uuid>_out.<ext>`. The input file is removed as soon as the tool returns;
//! the output file is owned by the [`InpaintResult`] and removed with it.

use crate::backends::{Frame, InpaintResult};
use crate::constants::inpaint::{FILE_EXTENSION, INPUT_PLACEHOLDER, OUTPUT_PLACEHOLDER};
use crate::errors::StageError;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Instant;
use tracing::{debug, info, warn};

/// A parsed command template, e.g. `gmic {input} ... -o {output}`
///
/// Arguments are split on whitespace; placeholders are substituted after
/// splitting, so paths containing spaces stay a single argument. Quoting is
/// not supported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandTemplate {
    program: String,
    args: Vec<String>,
}

impl CommandTemplate {
    pub fn parse(template: &str) -> Result<Self, String> {
        let mut parts = template.split_whitespace().map(str::to_string);
        let program = parts
            .next()
            .ok_or_else(|| "inpaint command is empty".to_string())?;
        let args: Vec<String> = parts.collect();

        for placeholder in [INPUT_PLACEHOLDER, OUTPUT_PLACEHOLDER] {
            if !args.iter().any(|a| a.contains(placeholder)) {
                return Err(format!(
                    "inpaint command must contain {} in its arguments",
                    placeholder
                ));
            }
        }

        Ok(Self { program, args })
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Build the command for a concrete input/output pair
    pub fn command(&self, input: &Path, output: &Path) -> Command {
        let input = input.to_string_lossy();
        let output = output.to_string_lossy();

        let mut cmd = Command::new(&self.program);
        cmd.args(self.args.iter().map(|arg| {
            arg.replace(INPUT_PLACEHOLDER, &input)
                .replace(OUTPUT_PLACEHOLDER, &output)
        }));
        cmd
    }
}

/// Runs the external inpainting tool on frames
#[derive(Debug, Clone)]
pub struct InpaintTool {
    template: CommandTemplate,
    work_dir: PathBuf,
}

impl InpaintTool {
    pub fn new(template: CommandTemplate, work_dir: PathBuf) -> Self {
        Self { template, work_dir }
    }

    /// Unique `(input, output)` paths for one invocation
    fn temp_paths(&self) -> (PathBuf, PathBuf) {
        let id = uuid::Uuid::new_v4();
        (
            self.work_dir.join(format!("{}_in.{}", id, FILE_EXTENSION)),
            self.work_dir.join(format!("{}_out.{}", id, FILE_EXTENSION)),
        )
    }

    /// Inpaint one frame; this is the stage function for the inpaint worker
    pub fn process(&self, frame: Frame) -> Result<InpaintResult, StageError> {
        let (input, output) = self.temp_paths();
        frame.image.save(&input)?;

        let result = self.run(&input, &output);

        if let Err(e) = std::fs::remove_file(&input) {
            warn!(path = %input.display(), error = %e, "Failed to remove inpaint input");
        }
        if result.is_err() && output.exists() {
            let _ = std::fs::remove_file(&output);
        }

        result.map(|()| {
            debug!(path = %output.display(), sequence = frame.sequence, "Inpainted frame ready");
            InpaintResult { path: output }
        })
    }

    /// Run the tool on an existing image file
    pub fn run(&self, input: &Path, output: &Path) -> Result<(), StageError> {
        let started = Instant::now();
        let status = self
            .template
            .command(input, output)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map_err(|e| {
                StageError::Inpaint(format!("failed to run {}: {}", self.template.program(), e))
            })?;

        if !status.success() {
            return Err(StageError::Inpaint(format!(
                "{} exited with {}",
                self.template.program(),
                status
            )));
        }
        if !output.exists() {
            return Err(StageError::Inpaint(format!(
                "{} produced no output at {}",
                self.template.program(),
                output.display()
            )));
        }

        info!(
            output = %output.display(),
            took_ms = started.elapsed().as_millis() as u64,
            "Inpainting finished"
        );
        Ok(())
    }
}
