//! Slide decks
//!
//! Reads a PresentationML package into its canvas size and the ordered list
//! of slides, each slide holding its own element tree and relationships.

use super::package::{Package, Relationship, RELATIONSHIPS_NS};
use super::xml::XmlElement;
use crate::error::DocJoinError;

/// 10in x 7.5in, the PresentationML default when `p:sldSz` is absent.
pub const DEFAULT_CANVAS: CanvasSize = CanvasSize {
    width: 9_144_000,
    height: 6_858_000,
};

/// Slide canvas in EMU.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CanvasSize {
    pub width: i64,
    pub height: i64,
}

#[derive(Debug, Clone)]
pub struct Slide {
    /// Part name in the package the slide was read from.
    pub part_name: String,
    pub root: XmlElement,
    pub relationships: Vec<Relationship>,
}

impl Slide {
    /// `p:cSld/p:spTree`, the shapes on the slide.
    pub fn shape_tree(&self) -> Option<&XmlElement> {
        self.root.find_path(&["p:cSld", "p:spTree"])
    }

    pub fn shape_tree_mut(&mut self) -> Option<&mut XmlElement> {
        self.root.find_path_mut(&["p:cSld", "p:spTree"])
    }

    /// Text of every paragraph run on the slide, in document order.
    pub fn texts(&self) -> Vec<String> {
        let mut texts = Vec::new();
        if let Some(tree) = self.shape_tree() {
            tree.walk(&mut |e| {
                if e.name == "a:t" {
                    texts.push(e.text());
                }
            });
        }
        texts
    }

    /// Replace every text run equal to `from` with `to`. Returns the number
    /// of runs changed.
    pub fn replace_text(&mut self, from: &str, to: &str) -> usize {
        let mut changed = 0;
        if let Some(tree) = self.shape_tree_mut() {
            let _ = tree.walk_mut(&mut |e| {
                if e.name == "a:t" && e.text() == from {
                    e.set_text(to);
                    changed += 1;
                }
                Ok::<_, ()>(())
            });
        }
        changed
    }

    pub fn layout_part(&self) -> Option<&str> {
        self.relationships
            .iter()
            .find(|rel| rel.kind() == "slideLayout" && !rel.external)
            .map(|rel| rel.target.as_str())
    }
}

/// A parsed slide deck.
#[derive(Debug, Clone)]
pub struct SlideDeck {
    name: String,
    canvas: CanvasSize,
    slides: Vec<Slide>,
    package: Package,
    presentation_part: String,
}

impl SlideDeck {
    pub fn parse(name: impl Into<String>, bytes: &[u8]) -> Result<Self, DocJoinError> {
        let name = name.into();
        Self::parse_inner(&name, bytes)
            .map_err(|e| match e {
                DocJoinError::ParseError(msg) => {
                    DocJoinError::ParseError(format!("slide deck '{}': {}", name, msg))
                }
                other => other,
            })
    }

    fn parse_inner(name: &str, bytes: &[u8]) -> Result<Self, DocJoinError> {
        let package = Package::from_bytes(bytes)?;

        let presentation_part = package
            .related_part("", "officeDocument")?
            .ok_or_else(|| DocJoinError::ParseError("no main presentation part".into()))?;
        let presentation = XmlElement::parse(package.require_part(&presentation_part)?)?;
        if presentation.local_name() != "presentation" {
            return Err(DocJoinError::ParseError(format!(
                "'{}' is not a presentation",
                presentation_part
            )));
        }

        let canvas = presentation
            .child("p:sldSz")
            .and_then(|size| {
                Some(CanvasSize {
                    width: size.attribute("cx")?.parse().ok()?,
                    height: size.attribute("cy")?.parse().ok()?,
                })
            })
            .unwrap_or(DEFAULT_CANVAS);

        let presentation_rels = package.relationships(&presentation_part)?;
        let rel_prefixes = presentation.prefixes_for(RELATIONSHIPS_NS);

        let mut slides = Vec::new();
        if let Some(list) = presentation.child("p:sldIdLst") {
            for entry in list.elements().filter(|e| e.local_name() == "sldId") {
                let rid = rel_prefixes
                    .iter()
                    .find_map(|prefix| entry.attribute(&format!("{}:id", prefix)))
                    .ok_or_else(|| DocJoinError::ParseError("slide entry without r:id".into()))?;
                let rel = presentation_rels
                    .iter()
                    .find(|rel| rel.id == rid && !rel.external)
                    .ok_or_else(|| {
                        DocJoinError::ParseError(format!("slide relationship '{}' not found", rid))
                    })?;
                slides.push(Self::read_slide(&package, &rel.target)?);
            }
        }

        tracing::debug!(
            name = %name,
            slides = slides.len(),
            width = canvas.width,
            height = canvas.height,
            "parsed slide deck"
        );

        Ok(Self {
            name: name.to_string(),
            canvas,
            slides,
            package,
            presentation_part,
        })
    }

    fn read_slide(package: &Package, part_name: &str) -> Result<Slide, DocJoinError> {
        let root = XmlElement::parse(package.require_part(part_name)?)?;
        if root.local_name() != "sld" {
            return Err(DocJoinError::ParseError(format!(
                "'{}' is not a slide",
                part_name
            )));
        }
        Ok(Slide {
            part_name: part_name.to_string(),
            root,
            relationships: package.relationships(part_name)?,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn canvas(&self) -> CanvasSize {
        self.canvas
    }

    pub fn slides(&self) -> &[Slide] {
        &self.slides
    }

    pub fn slide_count(&self) -> usize {
        self.slides.len()
    }

    pub fn package(&self) -> &Package {
        &self.package
    }

    /// Theme used by the deck's first master, if it stands on its own
    /// (a theme with relationships of its own cannot be lifted out alone).
    pub fn standalone_theme(&self) -> Option<&[u8]> {
        let master = self
            .package
            .related_part(&self.presentation_part, "slideMaster")
            .ok()??;
        let theme = self.package.related_part(&master, "theme").ok()??;
        match self.package.relationships(&theme) {
            Ok(rels) if rels.is_empty() => self.package.part(&theme),
            _ => None,
        }
    }
}
