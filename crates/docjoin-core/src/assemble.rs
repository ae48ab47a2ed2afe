//! Request pipeline
//!
//! One request: stage, classify, order, normalise legacy decks, route every
//! document to the PDF and/or deck engine, materialize the artifacts, clean
//! up. The staging area is destroyed on every path out of a request.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::classify::{
    classify, classify_all, ClassifiedInput, DocumentKind, PDF_MEDIA_TYPE, PPTX_MEDIA_TYPE,
};
use crate::convert::Converter;
use crate::deck::{compose_decks, CanvasPolicy};
use crate::error::DocJoinError;
use crate::extract::extract_pages;
use crate::input::InputDocument;
use crate::merge::compose_pdf;
use crate::ordering::resolve_ordering;
use crate::page::PageDocument;
use crate::page_range::parse_page_range;
use crate::report::{DocumentFailure, MergePolicy};
use crate::staging::{safe_file_name, StagingArea};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssemblyOptions {
    /// Skip documents that fail instead of failing the request.
    pub best_effort: bool,
    pub canvas_policy: CanvasPolicy,
    /// Directory under which each request gets its own staging area.
    pub staging_root: PathBuf,
    /// File stem of the artifacts, `<stem>.pdf` and `<stem>.pptx`.
    pub output_stem: String,
}

impl Default for AssemblyOptions {
    fn default() -> Self {
        Self {
            best_effort: true,
            canvas_policy: CanvasPolicy::default(),
            staging_root: std::env::temp_dir(),
            output_stem: "merged".to_string(),
        }
    }
}

impl AssemblyOptions {
    pub fn merge_policy(&self) -> MergePolicy {
        MergePolicy::from_best_effort(self.best_effort)
    }
}

#[derive(Debug, Clone, Default)]
pub struct AssemblyRequest {
    pub inputs: Vec<InputDocument>,
    /// Processing order by name. `None` means lexicographic.
    pub ordering: Option<Vec<String>>,
}

/// A composed output file.
#[derive(Debug, Clone, Serialize)]
pub struct Artifact {
    pub file_name: String,
    pub media_type: String,
    #[serde(skip)]
    pub bytes: Vec<u8>,
    /// Pages of a PDF, slides of a deck.
    pub units: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct AssemblyReport {
    pub pdf: Option<Artifact>,
    pub deck: Option<Artifact>,
    pub failures: Vec<DocumentFailure>,
    pub warnings: Vec<String>,
    /// The order documents were processed in.
    pub ordering: Vec<String>,
}

impl AssemblyReport {
    pub fn artifacts(&self) -> impl Iterator<Item = &Artifact> {
        self.pdf.iter().chain(self.deck.iter())
    }
}

/// Runs assembly requests with one set of options and collaborators.
pub struct Assembler {
    options: AssemblyOptions,
    legacy_converter: Option<Box<dyn Converter>>,
    deck_exporter: Option<Box<dyn Converter>>,
}

impl Default for Assembler {
    fn default() -> Self {
        Self::new(AssemblyOptions::default())
    }
}

impl Assembler {
    pub fn new(options: AssemblyOptions) -> Self {
        Self {
            options,
            legacy_converter: None,
            deck_exporter: None,
        }
    }

    /// Converter from legacy decks to slide deck packages.
    pub fn with_legacy_converter(mut self, converter: Box<dyn Converter>) -> Self {
        self.legacy_converter = Some(converter);
        self
    }

    /// Renderer from slide deck packages to PDF. With one configured, decks
    /// also contribute their pages to the PDF artifact.
    pub fn with_deck_exporter(mut self, exporter: Box<dyn Converter>) -> Self {
        self.deck_exporter = Some(exporter);
        self
    }

    pub fn options(&self) -> &AssemblyOptions {
        &self.options
    }

    #[tracing::instrument(skip(self, request), fields(inputs = request.inputs.len()))]
    pub fn assemble(&self, request: &AssemblyRequest) -> Result<AssemblyReport, DocJoinError> {
        self.staged(|staging| self.assemble_in(staging, request))
    }

    /// Extract `range_text` (e.g. `3,1-2`) from a PDF input.
    #[tracing::instrument(skip(self, input), fields(name = %input.name()))]
    pub fn extract(&self, input: &InputDocument, range_text: &str) -> Result<Artifact, DocJoinError> {
        self.staged(|staging| {
            match classify(input.name(), input.media_type()) {
                DocumentKind::Pdf => {}
                DocumentKind::Unknown => {
                    return Err(DocJoinError::ClassificationUnknown {
                        name: input.name().to_string(),
                        media_type: input.media_type().to_string(),
                    })
                }
                other => {
                    return Err(DocJoinError::OperationError(format!(
                        "'{}' is a {:?}, pages can only be extracted from a PDF",
                        input.name(),
                        other
                    )))
                }
            }

            let source = PageDocument::parse(input.name(), input.bytes())?;
            let pages = parse_page_range(range_text, source.page_count())?;
            let extracted = extract_pages(&source, &pages)?;

            let stem = file_stem(&safe_file_name(input.name()));
            let file_name = format!("{}-pages.pdf", stem);
            let artifact = materialize(
                staging,
                file_name,
                PDF_MEDIA_TYPE,
                &extracted.to_bytes()?,
                pages.len(),
            )?;
            tracing::info!(pages = artifact.units, size = artifact.bytes.len(), "extracted pages");
            Ok(artifact)
        })
    }

    /// Run `work` in a fresh staging area and destroy the area afterwards,
    /// whatever the outcome.
    fn staged<T>(
        &self,
        work: impl FnOnce(&StagingArea) -> Result<T, DocJoinError>,
    ) -> Result<T, DocJoinError> {
        let staging = StagingArea::create_in(&self.options.staging_root)?;
        let result = work(&staging);
        let cleanup = staging.destroy();

        match (result, cleanup) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(err)) => Err(err),
            (Err(err), cleanup) => {
                if let Err(cleanup_err) = cleanup {
                    tracing::warn!(error = %cleanup_err, "staging cleanup failed after error");
                }
                Err(err)
            }
        }
    }

    fn assemble_in(
        &self,
        staging: &StagingArea,
        request: &AssemblyRequest,
    ) -> Result<AssemblyReport, DocJoinError> {
        let policy = self.options.merge_policy();
        let (classified, mut failures) = classify_all(&request.inputs);
        tracing::info!(
            classified = classified.len(),
            unknown = failures.len(),
            "classified inputs"
        );
        if policy == MergePolicy::AllOrNothing {
            let unknown = request
                .inputs
                .iter()
                .find(|input| classify(input.name(), input.media_type()) == DocumentKind::Unknown);
            if let Some(input) = unknown {
                return Err(DocJoinError::DocumentFailed {
                    name: input.name().to_string(),
                    source: Box::new(DocJoinError::ClassificationUnknown {
                        name: input.name().to_string(),
                        media_type: input.media_type().to_string(),
                    }),
                });
            }
        }

        let names: Vec<&str> = request.inputs.iter().map(InputDocument::name).collect();
        let ordering = resolve_ordering(&names, request.ordering.as_deref())?;

        let mut by_name: HashMap<String, ClassifiedInput> = classified
            .into_iter()
            .map(|c| (c.name().to_string(), c))
            .collect();

        let mut pdf_inputs = Vec::new();
        let mut deck_inputs = Vec::new();
        for name in &ordering {
            // Unknown inputs were reported by classification.
            let Some(entry) = by_name.remove(name) else {
                continue;
            };
            let input = match entry.kind {
                DocumentKind::Pdf => {
                    pdf_inputs.push(entry.input);
                    continue;
                }
                DocumentKind::SlideDeck => entry.input,
                DocumentKind::LegacySlideDeck => {
                    match self.normalise_legacy(&entry.input, staging) {
                        Ok(input) => input,
                        Err(err @ DocJoinError::StagingIo { .. }) => return Err(err),
                        Err(err) => {
                            policy.absorb(entry.name(), err, &mut failures)?;
                            continue;
                        }
                    }
                }
                DocumentKind::Unknown => continue,
            };

            if let Some(exporter) = &self.deck_exporter {
                match exporter.convert(input.name(), input.bytes(), staging) {
                    Ok(pdf) => pdf_inputs.push(input.with_content(PDF_MEDIA_TYPE, pdf)),
                    Err(err @ DocJoinError::StagingIo { .. }) => return Err(err),
                    Err(err) => policy.absorb(input.name(), err, &mut failures)?,
                }
            }
            deck_inputs.push(input);
        }

        let mut report = AssemblyReport {
            ordering,
            ..Default::default()
        };
        let stem = &self.options.output_stem;

        if !pdf_inputs.is_empty() {
            let composition = compose_pdf(&pdf_inputs, policy)?;
            failures.extend(composition.failures);
            if composition.contributed > 0 {
                let units = composition.output.page_count() as usize;
                let bytes = composition.output.into_bytes()?;
                report.pdf = Some(materialize(
                    staging,
                    format!("{}.pdf", stem),
                    PDF_MEDIA_TYPE,
                    &bytes,
                    units,
                )?);
            }
        }

        if !deck_inputs.is_empty() {
            match compose_decks(&deck_inputs, policy, self.options.canvas_policy) {
                Ok(composition) => {
                    failures.extend(composition.failures);
                    report
                        .warnings
                        .extend(composition.output.warnings().iter().cloned());
                    if composition.contributed > 0 {
                        let units = composition.output.slide_count();
                        let bytes = composition.output.to_bytes()?;
                        report.deck = Some(materialize(
                            staging,
                            format!("{}.pptx", stem),
                            PPTX_MEDIA_TYPE,
                            &bytes,
                            units,
                        )?);
                    }
                }
                Err(DocJoinError::UnsupportedResourceReference { document, detail })
                    if policy == MergePolicy::BestEffort =>
                {
                    let err = DocJoinError::UnsupportedResourceReference {
                        document: document.clone(),
                        detail,
                    };
                    tracing::warn!(document = %document, error = %err, "deck composition refused");
                    failures.push(DocumentFailure::from_error(&document, &err));
                }
                Err(err) => return Err(err),
            }
        }

        report.failures = failures;
        tracing::info!(
            pdf_pages = report.pdf.as_ref().map(|a| a.units),
            deck_slides = report.deck.as_ref().map(|a| a.units),
            failed = report.failures.len(),
            "assembly finished"
        );
        Ok(report)
    }

    fn normalise_legacy(
        &self,
        input: &InputDocument,
        staging: &StagingArea,
    ) -> Result<InputDocument, DocJoinError> {
        let converter =
            self.legacy_converter
                .as_ref()
                .ok_or_else(|| DocJoinError::ConversionFailure {
                    name: input.name().to_string(),
                    reason: "no legacy deck converter is configured".to_string(),
                })?;
        let converted = converter.convert(input.name(), input.bytes(), staging)?;
        Ok(input.with_content(PPTX_MEDIA_TYPE, converted))
    }
}

fn materialize(
    staging: &StagingArea,
    file_name: String,
    media_type: &str,
    bytes: &[u8],
    units: usize,
) -> Result<Artifact, DocJoinError> {
    let path = staging.materialize(&file_name, bytes)?;
    let bytes = staging.read(&path)?;
    tracing::debug!(file = %file_name, size = bytes.len(), units, "artifact ready");
    Ok(Artifact {
        file_name,
        media_type: media_type.to_string(),
        bytes,
        units,
    })
}

fn file_stem(name: &str) -> String {
    Path::new(name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| name.to_string())
}
