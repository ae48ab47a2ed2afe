//! External document converters
//!
//! Converting legacy decks (and rendering decks to PDF) is delegated to an
//! external program such as LibreOffice. The core only knows the
//! [`Converter`] capability; [`CommandConverter`] is the process-backed one.

use std::fs::File;
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::error::DocJoinError;
use crate::staging::{safe_file_name, StagingArea};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

const POLL_INTERVAL: Duration = Duration::from_millis(50);
const STDERR_TAIL: usize = 512;

/// Turns one document into an equivalent document in another format.
pub trait Converter: Send + Sync {
    /// Convert `bytes` (uploaded as `name`). Intermediate files go into
    /// `staging`.
    fn convert(
        &self,
        name: &str,
        bytes: &[u8],
        staging: &StagingArea,
    ) -> Result<Vec<u8>, DocJoinError>;
}

/// How to invoke an external conversion program.
///
/// `{input}` and `{outdir}` in `args` are replaced by the staged input path
/// and the output directory. The program must write
/// `<outdir>/<input stem>.<output_extension>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSpec {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
    pub output_extension: String,
    #[serde(rename = "timeout_secs", default = "default_timeout", with = "duration_secs")]
    pub timeout: Duration,
}

fn default_timeout() -> Duration {
    DEFAULT_TIMEOUT
}

impl CommandSpec {
    pub fn new(program: impl Into<String>, output_extension: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            output_extension: output_extension.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Headless LibreOffice converting to `format` (`pptx`, `pdf`, ...).
    pub fn soffice(format: &str) -> Self {
        Self::new("soffice", format)
            .arg("--headless")
            .arg("--convert-to")
            .arg(format)
            .arg("--outdir")
            .arg("{outdir}")
            .arg("{input}")
    }
}

/// Runs a [`CommandSpec`] once per document.
#[derive(Debug, Clone)]
pub struct CommandConverter {
    spec: CommandSpec,
}

impl CommandConverter {
    pub fn new(spec: CommandSpec) -> Self {
        Self { spec }
    }

    fn failure(name: &str, reason: impl Into<String>) -> DocJoinError {
        DocJoinError::ConversionFailure {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}

impl Converter for CommandConverter {
    fn convert(
        &self,
        name: &str,
        bytes: &[u8],
        staging: &StagingArea,
    ) -> Result<Vec<u8>, DocJoinError> {
        let spec = &self.spec;
        let file_name = safe_file_name(name);
        let input = staging.materialize(&file_name, bytes)?;
        let scratch = staging.scratch_dir("convert")?;
        let outdir = scratch.path();
        let stderr_path = outdir.join("stderr.log");
        let stderr = File::create(&stderr_path).map_err(|e| DocJoinError::staging(&stderr_path, e))?;

        let args: Vec<String> = spec
            .args
            .iter()
            .map(|arg| {
                arg.replace("{input}", &input.to_string_lossy())
                    .replace("{outdir}", &outdir.to_string_lossy())
            })
            .collect();

        tracing::debug!(program = %spec.program, ?args, "running converter");
        let started = Instant::now();
        let mut child = Command::new(&spec.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::from(stderr))
            .spawn()
            .map_err(|e| Self::failure(name, format!("cannot start '{}': {}", spec.program, e)))?;

        let deadline = started + spec.timeout;
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) if Instant::now() >= deadline => {
                    abandon(&mut child);
                    tracing::warn!(name = %name, timeout = ?spec.timeout, "converter timed out");
                    return Err(Self::failure(
                        name,
                        format!("timed out after {:?}", spec.timeout),
                    ));
                }
                Ok(None) => thread::sleep(POLL_INTERVAL),
                Err(e) => {
                    abandon(&mut child);
                    return Err(Self::failure(name, format!("cannot wait for converter: {}", e)));
                }
            }
        };

        if !status.success() {
            let tail = stderr_tail(&stderr_path);
            return Err(Self::failure(
                name,
                if tail.is_empty() {
                    format!("converter exited with {}", status)
                } else {
                    format!("converter exited with {}: {}", status, tail)
                },
            ));
        }

        let stem = Path::new(&file_name)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| file_name.clone());
        let expected = outdir.join(format!("{}.{}", stem, spec.output_extension));
        if !expected.is_file() {
            return Err(Self::failure(
                name,
                format!("converter produced no {} output", spec.output_extension),
            ));
        }
        let converted = staging.read(&expected)?;

        tracing::info!(
            name = %name,
            input_size = bytes.len(),
            output_size = converted.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "converted document"
        );
        Ok(converted)
    }
}

/// Kill and reap a converter that is no longer waited for. The process may
/// have exited in the meantime.
fn abandon(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

fn stderr_tail(path: &Path) -> String {
    let text = std::fs::read(path)
        .map(|bytes| String::from_utf8_lossy(&bytes).trim().to_string())
        .unwrap_or_default();
    let start = text
        .char_indices()
        .rev()
        .nth(STDERR_TAIL.saturating_sub(1))
        .map(|(i, _)| i)
        .unwrap_or(0);
    text[start..].to_string()
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn staging() -> (tempfile::TempDir, StagingArea) {
        let root = tempfile::tempdir().unwrap();
        let staging = StagingArea::create_in(root.path()).unwrap();
        (root, staging)
    }

    fn shell(script: &str, extension: &str) -> CommandConverter {
        CommandConverter::new(
            CommandSpec::new("sh", extension)
                .arg("-c")
                .arg(script)
                .arg("converter")
                .arg("{input}")
                .arg("{outdir}"),
        )
    }

    #[test]
    fn test_converter_reads_output_by_stem() {
        let (_root, staging) = staging();
        let converter = shell(r#"cp "$1" "$2/deck.pptx""#, "pptx");

        let out = converter.convert("deck.ppt", b"legacy", &staging).unwrap();
        assert_eq!(out, b"legacy");
    }

    #[test]
    fn test_converter_strips_directories_from_name() {
        let (_root, staging) = staging();
        let converter = shell(r#"cp "$1" "$2/deck.pdf""#, "pdf");

        let out = converter.convert("../../deck.pptx", b"x", &staging).unwrap();
        assert_eq!(out, b"x");
    }

    #[test]
    fn test_nonzero_exit_reports_stderr() {
        let (_root, staging) = staging();
        let converter = shell("echo boom >&2; exit 3", "pptx");

        match converter.convert("deck.ppt", b"x", &staging) {
            Err(DocJoinError::ConversionFailure { name, reason }) => {
                assert_eq!(name, "deck.ppt");
                assert!(reason.contains("boom"), "{reason}");
            }
            other => panic!("expected ConversionFailure, got {other:?}"),
        }
    }

    #[test]
    fn test_timeout_kills_converter() {
        let (_root, staging) = staging();
        let converter = CommandConverter::new(
            CommandSpec::new("sleep", "pptx")
                .arg("5")
                .with_timeout(Duration::from_millis(200)),
        );

        let started = Instant::now();
        let err = converter.convert("slow.ppt", b"x", &staging).unwrap_err();
        assert!(started.elapsed() < Duration::from_secs(4));
        assert!(err.to_string().contains("timed out"));
    }

    #[test]
    fn test_missing_program_is_conversion_failure() {
        let (_root, staging) = staging();
        let converter = CommandConverter::new(CommandSpec::new("docjoin-no-such-program", "pptx"));

        assert!(matches!(
            converter.convert("deck.ppt", b"x", &staging),
            Err(DocJoinError::ConversionFailure { .. })
        ));
    }

    #[test]
    fn test_missing_output_is_conversion_failure() {
        let (_root, staging) = staging();
        let converter = shell("exit 0", "pptx");

        let err = converter.convert("deck.ppt", b"x", &staging).unwrap_err();
        assert!(err.to_string().contains("no pptx output"));
    }

    #[test]
    fn test_abandoned_converter_is_reaped() {
        let mut child = Command::new("sleep").arg("5").spawn().unwrap();
        abandon(&mut child);
        assert!(child.try_wait().unwrap().is_some());
    }

    #[test]
    fn test_soffice_spec_shape() {
        let spec = CommandSpec::soffice("pdf");
        assert_eq!(spec.program, "soffice");
        assert_eq!(spec.output_extension, "pdf");
        assert_eq!(
            spec.args,
            vec!["--headless", "--convert-to", "pdf", "--outdir", "{outdir}", "{input}"]
        );
        assert_eq!(spec.timeout, DEFAULT_TIMEOUT);
    }
}
