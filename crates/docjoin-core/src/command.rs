use std::time::Instant;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::{Deserialize, Serialize};

use crate::assemble::{Artifact, Assembler, AssemblyRequest};
use crate::error::DocJoinError;
use crate::input::InputDocument;
use crate::report::DocumentFailure;

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum JoinCommand {
    Merge {
        files: Vec<NamedFile>,
        #[serde(default)]
        ordering: Option<Vec<String>>,
    },
    Extract {
        file: NamedFile,
        pages: String,
    },
}

impl JoinCommand {
    pub fn from_json(json: &str) -> Result<Self, DocJoinError> {
        serde_json::from_str(json).map_err(|e| DocJoinError::SerializationError(e.to_string()))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NamedFile {
    pub name: String,
    pub media_type: String,
    pub bytes: Vec<u8>,
}

impl From<NamedFile> for InputDocument {
    fn from(file: NamedFile) -> Self {
        InputDocument::new(file.name, file.media_type, file.bytes)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CommandResult {
    pub success: bool,
    pub artifacts: Vec<EncodedArtifact>,
    pub failures: Vec<DocumentFailure>,
    pub warnings: Vec<String>,
    pub error: Option<String>,
    pub metrics: Option<ProcessMetrics>,
}

impl CommandResult {
    pub fn to_json(&self) -> Result<String, DocJoinError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| DocJoinError::SerializationError(e.to_string()))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EncodedArtifact {
    pub file_name: String,
    pub media_type: String,
    /// Base64-encoded file content
    pub data: String,
    pub units: usize,
}

impl From<&Artifact> for EncodedArtifact {
    fn from(artifact: &Artifact) -> Self {
        Self {
            file_name: artifact.file_name.clone(),
            media_type: artifact.media_type.clone(),
            data: BASE64.encode(&artifact.bytes),
            units: artifact.units,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProcessMetrics {
    pub input_size_bytes: usize,
    pub output_size_bytes: usize,
    /// Pages plus slides across all artifacts
    pub unit_count: usize,
    pub processing_time_ms: u64,
}

/// Run one command. Pipeline errors come back as `success: false` with the
/// message in `error`.
pub fn run_command(assembler: &Assembler, command: JoinCommand) -> CommandResult {
    let started = Instant::now();

    let (input_size, outcome) = match command {
        JoinCommand::Merge { files, ordering } => {
            let request = AssemblyRequest {
                inputs: files.into_iter().map(InputDocument::from).collect(),
                ordering,
            };
            let input_size = request.inputs.iter().map(InputDocument::len).sum();
            let outcome = assembler.assemble(&request).map(|report| {
                let artifacts = report.artifacts().cloned().collect::<Vec<_>>();
                (artifacts, report.failures, report.warnings)
            });
            (input_size, outcome)
        }
        JoinCommand::Extract { file, pages } => {
            let input = InputDocument::from(file);
            let outcome = assembler
                .extract(&input, &pages)
                .map(|artifact| (vec![artifact], Vec::new(), Vec::new()));
            (input.len(), outcome)
        }
    };

    match outcome {
        Ok((artifacts, failures, warnings)) => {
            let metrics = ProcessMetrics {
                input_size_bytes: input_size,
                output_size_bytes: artifacts.iter().map(|a| a.bytes.len()).sum(),
                unit_count: artifacts.iter().map(|a| a.units).sum(),
                processing_time_ms: started.elapsed().as_millis() as u64,
            };
            CommandResult {
                success: true,
                artifacts: artifacts.iter().map(EncodedArtifact::from).collect(),
                failures,
                warnings,
                error: None,
                metrics: Some(metrics),
            }
        }
        Err(err) => CommandResult {
            success: false,
            artifacts: Vec::new(),
            failures: Vec::new(),
            warnings: Vec::new(),
            error: Some(err.to_string()),
            metrics: None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assemble::AssemblyOptions;
    use crate::testing::create_test_pdf;

    fn assembler(root: &std::path::Path) -> Assembler {
        Assembler::new(AssemblyOptions {
            staging_root: root.to_path_buf(),
            ..Default::default()
        })
    }

    #[test]
    fn test_command_deserializes_merge() {
        let json = r#"{"type":"Merge","files":[{"name":"a.pdf","media_type":"application/pdf","bytes":[37,80]}]}"#;
        let cmd: JoinCommand = serde_json::from_str(json).unwrap();
        match cmd {
            JoinCommand::Merge { files, ordering } => {
                assert_eq!(files[0].name, "a.pdf");
                assert_eq!(files[0].bytes, b"%P");
                assert!(ordering.is_none());
            }
            other => panic!("expected Merge, got {other:?}"),
        }
    }

    #[test]
    fn test_command_deserializes_extract() {
        let json = r#"{"type":"Extract","file":{"name":"a.pdf","media_type":"application/pdf","bytes":[]},"pages":"3,1-2"}"#;
        let cmd = JoinCommand::from_json(json).unwrap();
        assert!(matches!(cmd, JoinCommand::Extract { ref pages, .. } if pages == "3,1-2"));
    }

    #[test]
    fn test_malformed_command_is_serialization_error() {
        assert!(matches!(
            JoinCommand::from_json(r#"{"type":"Shuffle"}"#),
            Err(DocJoinError::SerializationError(_))
        ));
    }

    #[test]
    fn test_run_merge_encodes_artifact() {
        let root = tempfile::tempdir().unwrap();
        let pdf = create_test_pdf(2, "A");
        let command = JoinCommand::Merge {
            files: vec![NamedFile {
                name: "a.pdf".into(),
                media_type: "application/pdf".into(),
                bytes: pdf.clone(),
            }],
            ordering: None,
        };

        let result = run_command(&assembler(root.path()), command);
        assert!(result.success, "{:?}", result.error);
        assert_eq!(result.artifacts.len(), 1);
        let decoded = BASE64.decode(&result.artifacts[0].data).unwrap();
        assert!(decoded.starts_with(b"%PDF"));

        let metrics = result.metrics.unwrap();
        assert_eq!(metrics.input_size_bytes, pdf.len());
        assert_eq!(metrics.output_size_bytes, decoded.len());
        assert_eq!(metrics.unit_count, 2);
    }

    #[test]
    fn test_run_reports_pipeline_error() {
        let root = tempfile::tempdir().unwrap();
        let command = JoinCommand::Merge {
            files: vec![],
            ordering: Some(vec!["ghost.pdf".into()]),
        };

        let result = run_command(&assembler(root.path()), command);
        assert!(!result.success);
        assert!(result.error.unwrap().contains("ghost.pdf"));
        assert!(result.metrics.is_none());
    }

    #[test]
    fn test_result_serializes() {
        let root = tempfile::tempdir().unwrap();
        let command = JoinCommand::Extract {
            file: NamedFile {
                name: "a.pdf".into(),
                media_type: "application/pdf".into(),
                bytes: create_test_pdf(3, "A"),
            },
            pages: "2".into(),
        };

        let result = run_command(&assembler(root.path()), command);
        let json: serde_json::Value = serde_json::from_str(&result.to_json().unwrap()).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["artifacts"][0]["file_name"], "a-pages.pdf");
        assert_eq!(json["artifacts"][0]["units"], 1);
    }
}
