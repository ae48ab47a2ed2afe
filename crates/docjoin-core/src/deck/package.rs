//! OPC package access
//!
//! A slide deck on disk is a zip of parts. Each part may have a sibling
//! `_rels/<name>.rels` listing its relationships, and `[Content_Types].xml`
//! maps parts to media types.

use std::collections::BTreeMap;
use std::io::{Cursor, Read, Write};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use super::xml::XmlElement;
use crate::error::DocJoinError;

pub const CONTENT_TYPES_PART: &str = "[Content_Types].xml";
pub const RELATIONSHIPS_NS: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const PACKAGE_RELATIONSHIPS_NS: &str =
    "http://schemas.openxmlformats.org/package/2006/relationships";
const CONTENT_TYPES_NS: &str = "http://schemas.openxmlformats.org/package/2006/content-types";

/// Upper bound on the inflated size of a single part.
const MAX_PART_SIZE: u64 = 512 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    pub id: String,
    pub rel_type: String,
    pub target: String,
    pub external: bool,
}

impl Relationship {
    /// Last path segment of the relationship type, e.g. `slideLayout`.
    pub fn kind(&self) -> &str {
        self.rel_type
            .rsplit_once('/')
            .map(|(_, kind)| kind)
            .unwrap_or(&self.rel_type)
    }
}

/// Media types by extension default and by part override.
#[derive(Debug, Clone, Default)]
pub struct ContentTypes {
    pub defaults: BTreeMap<String, String>,
    pub overrides: BTreeMap<String, String>,
}

impl ContentTypes {
    pub fn parse(bytes: &[u8]) -> Result<Self, DocJoinError> {
        let root = XmlElement::parse(bytes)?;
        let mut types = ContentTypes::default();
        for entry in root.elements() {
            match entry.local_name() {
                "Default" => {
                    if let (Some(ext), Some(ct)) =
                        (entry.attribute("Extension"), entry.attribute("ContentType"))
                    {
                        types.defaults.insert(ext.to_ascii_lowercase(), ct.to_string());
                    }
                }
                "Override" => {
                    if let (Some(part), Some(ct)) =
                        (entry.attribute("PartName"), entry.attribute("ContentType"))
                    {
                        types
                            .overrides
                            .insert(part.trim_start_matches('/').to_string(), ct.to_string());
                    }
                }
                _ => {}
            }
        }
        Ok(types)
    }

    pub fn content_type_for(&self, part: &str) -> Option<&str> {
        if let Some(ct) = self.overrides.get(part) {
            return Some(ct);
        }
        let ext = part.rsplit_once('.')?.1.to_ascii_lowercase();
        self.defaults.get(&ext).map(String::as_str)
    }

    pub fn to_xml(&self) -> Vec<u8> {
        let mut root = XmlElement::new("Types").with_attribute("xmlns", CONTENT_TYPES_NS);
        for (ext, ct) in &self.defaults {
            root.children.push(super::xml::XmlNode::Element(
                XmlElement::new("Default")
                    .with_attribute("Extension", ext.as_str())
                    .with_attribute("ContentType", ct.as_str()),
            ));
        }
        for (part, ct) in &self.overrides {
            root.children.push(super::xml::XmlNode::Element(
                XmlElement::new("Override")
                    .with_attribute("PartName", format!("/{}", part))
                    .with_attribute("ContentType", ct.as_str()),
            ));
        }
        root.to_document_bytes()
    }
}

/// All parts of a package held in memory, keyed by part name without the
/// leading slash (`ppt/slides/slide1.xml`).
#[derive(Debug, Clone, Default)]
pub struct Package {
    parts: BTreeMap<String, Vec<u8>>,
    content_types: ContentTypes,
}

impl Package {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DocJoinError> {
        let mut archive = ZipArchive::new(Cursor::new(bytes))
            .map_err(|e| DocJoinError::ParseError(format!("Not a zip package: {}", e)))?;

        let mut parts = BTreeMap::new();
        for index in 0..archive.len() {
            let mut file = archive
                .by_index(index)
                .map_err(|e| DocJoinError::ParseError(format!("Zip entry {}: {}", index, e)))?;
            if file.is_dir() {
                continue;
            }
            let name = file.name().trim_start_matches('/').to_string();
            if file.size() > MAX_PART_SIZE {
                return Err(DocJoinError::ParseError(format!(
                    "Part '{}' is too large ({} bytes)",
                    name,
                    file.size()
                )));
            }
            let mut data = Vec::with_capacity(file.size() as usize);
            file.read_to_end(&mut data)
                .map_err(|e| DocJoinError::ParseError(format!("Part '{}': {}", name, e)))?;
            parts.insert(name, data);
        }

        let content_types = parts
            .get(CONTENT_TYPES_PART)
            .ok_or_else(|| DocJoinError::ParseError("Missing [Content_Types].xml".into()))
            .and_then(|bytes| ContentTypes::parse(bytes))?;

        Ok(Self {
            parts,
            content_types,
        })
    }

    pub fn part(&self, name: &str) -> Option<&[u8]> {
        self.parts.get(name).map(Vec::as_slice)
    }

    pub fn require_part(&self, name: &str) -> Result<&[u8], DocJoinError> {
        self.part(name)
            .ok_or_else(|| DocJoinError::ParseError(format!("Missing package part '{}'", name)))
    }

    pub fn content_types(&self) -> &ContentTypes {
        &self.content_types
    }

    /// Relationships of `part`, with internal targets resolved to part names.
    /// A part without a relationships part has none.
    pub fn relationships(&self, part: &str) -> Result<Vec<Relationship>, DocJoinError> {
        match self.part(&rels_part_name(part)) {
            Some(bytes) => parse_relationships(part, bytes),
            None => Ok(Vec::new()),
        }
    }

    /// Target of the first relationship of `kind` from `part`.
    pub fn related_part(&self, part: &str, kind: &str) -> Result<Option<String>, DocJoinError> {
        Ok(self
            .relationships(part)?
            .into_iter()
            .find(|rel| rel.kind() == kind && !rel.external)
            .map(|rel| rel.target))
    }
}

/// Name of the relationships part belonging to `part`.
pub fn rels_part_name(part: &str) -> String {
    match part.rsplit_once('/') {
        Some((dir, file)) => format!("{}/_rels/{}.rels", dir, file),
        None if part.is_empty() => "_rels/.rels".to_string(),
        None => format!("_rels/{}.rels", part),
    }
}

fn parse_relationships(source: &str, bytes: &[u8]) -> Result<Vec<Relationship>, DocJoinError> {
    let root = XmlElement::parse(bytes)?;
    let mut relationships = Vec::new();

    for entry in root.elements().filter(|e| e.local_name() == "Relationship") {
        let (Some(id), Some(rel_type), Some(target)) = (
            entry.attribute("Id"),
            entry.attribute("Type"),
            entry.attribute("Target"),
        ) else {
            return Err(DocJoinError::ParseError(format!(
                "Incomplete relationship in {}",
                rels_part_name(source)
            )));
        };
        let external = entry
            .attribute("TargetMode")
            .map(|mode| mode.eq_ignore_ascii_case("External"))
            .unwrap_or(false);
        let target = if external {
            target.to_string()
        } else {
            resolve_target(source, target)
        };
        relationships.push(Relationship {
            id: id.to_string(),
            rel_type: rel_type.to_string(),
            target,
            external,
        });
    }

    Ok(relationships)
}

/// Serialize relationships whose internal targets are part names, writing
/// targets relative to `source`.
pub fn write_relationships(source: &str, relationships: &[Relationship]) -> Vec<u8> {
    let mut root = XmlElement::new("Relationships").with_attribute("xmlns", PACKAGE_RELATIONSHIPS_NS);
    for rel in relationships {
        let mut entry = XmlElement::new("Relationship")
            .with_attribute("Id", rel.id.as_str())
            .with_attribute("Type", rel.rel_type.as_str());
        if rel.external {
            entry.set_attribute("Target", rel.target.as_str());
            entry.set_attribute("TargetMode", "External");
        } else {
            entry.set_attribute("Target", relative_target(source, &rel.target));
        }
        root.children.push(super::xml::XmlNode::Element(entry));
    }
    root.to_document_bytes()
}

/// Resolve a relationship target against the directory of `source`.
pub fn resolve_target(source: &str, target: &str) -> String {
    let target = target.split('#').next().unwrap_or(target);
    let mut segments: Vec<&str> = if target.starts_with('/') {
        Vec::new()
    } else {
        source
            .rsplit_once('/')
            .map(|(dir, _)| dir.split('/').collect())
            .unwrap_or_default()
    };

    for segment in target.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}

/// Express part `target` relative to the directory of part `source`.
pub fn relative_target(source: &str, target: &str) -> String {
    let from: Vec<&str> = source
        .rsplit_once('/')
        .map(|(dir, _)| dir.split('/').collect())
        .unwrap_or_default();
    let to: Vec<&str> = target.split('/').collect();
    let (to_dir, file) = to.split_at(to.len().saturating_sub(1));

    let common = from
        .iter()
        .zip(to_dir.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut parts: Vec<&str> = Vec::new();
    parts.extend(std::iter::repeat("..").take(from.len() - common));
    parts.extend(&to_dir[common..]);
    parts.extend(file);
    parts.join("/")
}

/// Writes parts into a fresh zip, content types first.
pub struct PackageWriter {
    zip: ZipWriter<Cursor<Vec<u8>>>,
}

impl PackageWriter {
    pub fn new(content_types: &ContentTypes) -> Result<Self, DocJoinError> {
        let mut writer = Self {
            zip: ZipWriter::new(Cursor::new(Vec::new())),
        };
        writer.add(CONTENT_TYPES_PART, &content_types.to_xml())?;
        Ok(writer)
    }

    pub fn add(&mut self, name: &str, bytes: &[u8]) -> Result<(), DocJoinError> {
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        self.zip
            .start_file(name, options)
            .map_err(|e| DocJoinError::SerializationError(format!("Zip entry '{}': {}", name, e)))?;
        self.zip
            .write_all(bytes)
            .map_err(|e| DocJoinError::SerializationError(format!("Zip entry '{}': {}", name, e)))
    }

    pub fn finish(self) -> Result<Vec<u8>, DocJoinError> {
        self.zip
            .finish()
            .map(Cursor::into_inner)
            .map_err(|e| DocJoinError::SerializationError(format!("Zip finalize: {}", e)))
    }
}
