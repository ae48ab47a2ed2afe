//! Merged slide deck
//!
//! Slides from any number of source decks are cloned into one package built
//! around a single blank layout. Each cloned slide takes along the parts it
//! references under fresh names, and its relationship ids are rewritten, so
//! decks with overlapping id or part namespaces never collide. A reference
//! that cannot be carried over safely is refused with
//! [`DocJoinError::UnsupportedResourceReference`].

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};

use super::package::{
    rels_part_name, write_relationships, ContentTypes, PackageWriter, Relationship,
    RELATIONSHIPS_NS,
};
use super::slide::{CanvasSize, Slide, SlideDeck, DEFAULT_CANVAS};
use super::template;
use super::xml::{XmlElement, XmlNode};
use crate::error::DocJoinError;
use crate::input::InputDocument;
use crate::report::{Composition, MergePolicy};

/// Relationship kinds that point at deck-wide parts. These are never copied
/// along with a slide.
const SHARED_KINDS: &[&str] = &[
    "officeDocument",
    "slide",
    "slideLayout",
    "slideMaster",
    "notesSlide",
    "notesMaster",
    "handoutMaster",
    "theme",
    "presProps",
    "viewProps",
    "tableStyles",
    "commentAuthors",
];

/// Relationship kinds left behind when a slide is cloned.
const DROPPED_KINDS: &[&str] = &["notesSlide", "comments"];

/// What to do with slides whose deck canvas differs from the merged one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CanvasPolicy {
    /// Keep the slide's geometry as authored.
    #[default]
    Preserve,
    /// Scale top-level shape positions and sizes into the merged canvas.
    Scale,
}

/// A deck assembled from the slides of other decks.
///
/// The canvas is taken from the first deck appended and stays fixed after.
#[derive(Debug, Clone)]
pub struct MergedDeck {
    policy: CanvasPolicy,
    canvas: Option<CanvasSize>,
    slides: Vec<Slide>,
    /// Parts copied from source decks, including their relationship parts.
    parts: BTreeMap<String, Vec<u8>>,
    content_types: ContentTypes,
    theme: Option<Vec<u8>>,
    warnings: Vec<String>,
}

impl Default for MergedDeck {
    fn default() -> Self {
        Self::new(CanvasPolicy::default())
    }
}

impl MergedDeck {
    pub fn new(policy: CanvasPolicy) -> Self {
        let mut content_types = ContentTypes::default();
        content_types
            .defaults
            .insert("rels".into(), template::CT_RELATIONSHIPS.into());
        content_types
            .defaults
            .insert("xml".into(), "application/xml".into());

        Self {
            policy,
            canvas: None,
            slides: Vec::new(),
            parts: BTreeMap::new(),
            content_types,
            theme: None,
            warnings: Vec::new(),
        }
    }

    pub fn canvas(&self) -> CanvasSize {
        self.canvas.unwrap_or(DEFAULT_CANVAS)
    }

    pub fn slides(&self) -> &[Slide] {
        &self.slides
    }

    pub fn slides_mut(&mut self) -> &mut [Slide] {
        &mut self.slides
    }

    pub fn slide_count(&self) -> usize {
        self.slides.len()
    }

    /// Canvas mismatches seen while appending.
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Append every slide of `deck`, in deck order. Returns the number of
    /// slides appended. On error the merged deck is left as it was.
    pub fn append_deck(&mut self, deck: &SlideDeck) -> Result<usize, DocJoinError> {
        let target = self.canvas.unwrap_or(deck.canvas());
        let mismatch = target != deck.canvas();
        let scale = mismatch && self.policy == CanvasPolicy::Scale;

        let mut pending = PendingAppend::new(deck, self);
        let mut slides = Vec::with_capacity(deck.slide_count());
        for (position, slide) in deck.slides().iter().enumerate() {
            let mut clone = pending.clone_slide(position, slide)?;
            if scale {
                scale_slide(&mut clone.root, deck.canvas(), target);
            }
            slides.push(clone);
        }
        let PendingAppend {
            parts,
            content_types,
            ..
        } = pending;

        // Commit.
        if mismatch {
            let source = deck.canvas();
            let warning = format!(
                "'{}' has a {}x{} canvas, merged deck is {}x{}; {}",
                deck.name(),
                source.width,
                source.height,
                target.width,
                target.height,
                if scale {
                    "shapes were scaled"
                } else {
                    "geometry left unchanged"
                }
            );
            tracing::warn!(name = %deck.name(), "{}", warning);
            self.warnings.push(warning);
        }
        if self.canvas.is_none() {
            self.canvas = Some(deck.canvas());
            self.theme = deck.standalone_theme().map(<[u8]>::to_vec);
        }
        self.parts.extend(parts);
        self.content_types.defaults.extend(content_types.defaults);
        self.content_types.overrides.extend(content_types.overrides);

        let appended = slides.len();
        self.slides.extend(slides);
        tracing::debug!(
            name = %deck.name(),
            appended,
            total = self.slides.len(),
            "appended deck"
        );
        Ok(appended)
    }

    /// Serialize as a PresentationML package.
    pub fn to_bytes(&self) -> Result<Vec<u8>, DocJoinError> {
        let canvas = self.canvas();

        let mut types = self.content_types.clone();
        for (part, content_type) in [
            (template::PRESENTATION_PART, template::CT_PRESENTATION),
            (template::MASTER_PART, template::CT_MASTER),
            (template::BLANK_LAYOUT_PART, template::CT_LAYOUT),
            (template::THEME_PART, template::CT_THEME),
            (template::PRES_PROPS_PART, template::CT_PRES_PROPS),
            (template::VIEW_PROPS_PART, template::CT_VIEW_PROPS),
            (template::TABLE_STYLES_PART, template::CT_TABLE_STYLES),
            (template::CORE_PROPS_PART, template::CT_CORE_PROPS),
            (template::APP_PROPS_PART, template::CT_APP_PROPS),
        ] {
            types.overrides.insert(part.into(), content_type.into());
        }
        for slide in &self.slides {
            types
                .overrides
                .insert(slide.part_name.clone(), template::CT_SLIDE.into());
        }

        let mut presentation_rels: Vec<Relationship> = template::presentation_links()
            .iter()
            .map(|(id, kind, target)| office_relationship(id, kind, target))
            .collect();
        for (i, slide) in self.slides.iter().enumerate() {
            presentation_rels.push(office_relationship(
                &format!("rId{}", template::FIRST_SLIDE_REL + i),
                "slide",
                &slide.part_name,
            ));
        }

        let theme = match &self.theme {
            Some(theme) => theme.clone(),
            None => template::default_theme().into_bytes(),
        };

        let mut writer = PackageWriter::new(&types)?;
        writer.add(&rels_part_name(""), template::root_rels().as_bytes())?;
        writer.add(
            template::PRESENTATION_PART,
            template::presentation(self.slides.len(), canvas.width, canvas.height).as_bytes(),
        )?;
        writer.add(
            &rels_part_name(template::PRESENTATION_PART),
            &write_relationships(template::PRESENTATION_PART, &presentation_rels),
        )?;
        writer.add(template::MASTER_PART, template::slide_master().as_bytes())?;
        writer.add(
            &rels_part_name(template::MASTER_PART),
            template::slide_master_rels().as_bytes(),
        )?;
        writer.add(template::BLANK_LAYOUT_PART, template::blank_layout().as_bytes())?;
        writer.add(
            &rels_part_name(template::BLANK_LAYOUT_PART),
            template::blank_layout_rels().as_bytes(),
        )?;
        writer.add(template::THEME_PART, &theme)?;
        writer.add(template::PRES_PROPS_PART, template::pres_props().as_bytes())?;
        writer.add(template::VIEW_PROPS_PART, template::view_props().as_bytes())?;
        writer.add(template::TABLE_STYLES_PART, template::table_styles().as_bytes())?;
        writer.add(template::CORE_PROPS_PART, template::core_props().as_bytes())?;
        writer.add(
            template::APP_PROPS_PART,
            template::app_props(self.slides.len()).as_bytes(),
        )?;

        for slide in &self.slides {
            writer.add(&slide.part_name, &slide.root.to_document_bytes())?;
            writer.add(
                &rels_part_name(&slide.part_name),
                &write_relationships(&slide.part_name, &slide.relationships),
            )?;
        }
        for (name, bytes) in &self.parts {
            writer.add(name, bytes)?;
        }

        let bytes = writer.finish()?;
        tracing::debug!(slides = self.slides.len(), size = bytes.len(), "serialized merged deck");
        Ok(bytes)
    }
}

/// Concatenate the slides of `ordered` decks into one merged deck.
///
/// A deck that fails to parse is handled by `policy`. A reference that
/// cannot be reconciled fails the whole composition under either policy.
pub fn compose_decks(
    ordered: &[InputDocument],
    policy: MergePolicy,
    canvas: CanvasPolicy,
) -> Result<Composition<MergedDeck>, DocJoinError> {
    let mut merged = MergedDeck::new(canvas);
    let mut failures = Vec::new();
    let mut contributed = 0;

    for input in ordered {
        let appended = SlideDeck::parse(input.name(), input.bytes())
            .and_then(|deck| merged.append_deck(&deck));
        match appended {
            Ok(_) => contributed += 1,
            Err(err @ DocJoinError::UnsupportedResourceReference { .. }) => return Err(err),
            Err(err) => policy.absorb(input.name(), err, &mut failures)?,
        }
    }

    tracing::info!(
        decks = contributed,
        slides = merged.slide_count(),
        failed = failures.len(),
        "composed slide decks"
    );

    Ok(Composition {
        output: merged,
        failures,
        contributed,
    })
}

fn office_relationship(id: &str, kind: &str, target: &str) -> Relationship {
    Relationship {
        id: id.to_string(),
        rel_type: format!("{}/{}", RELATIONSHIPS_NS, kind),
        target: target.to_string(),
        external: false,
    }
}

fn slide_part_name(index: usize) -> String {
    format!("ppt/slides/slide{}.xml", index + 1)
}

fn is_slide_part_name(name: &str) -> bool {
    name.strip_prefix("ppt/slides/slide")
        .and_then(|rest| rest.strip_suffix(".xml"))
        .is_some_and(|n| n.parse::<u32>().is_ok())
}

const RESERVED_PARTS: &[&str] = &[
    "[Content_Types].xml",
    "_rels/.rels",
    template::PRESENTATION_PART,
    "ppt/_rels/presentation.xml.rels",
    template::MASTER_PART,
    "ppt/slideMasters/_rels/slideMaster1.xml.rels",
    template::BLANK_LAYOUT_PART,
    "ppt/slideLayouts/_rels/slideLayout1.xml.rels",
    template::THEME_PART,
    template::PRES_PROPS_PART,
    template::VIEW_PROPS_PART,
    template::TABLE_STYLES_PART,
    template::CORE_PROPS_PART,
    template::APP_PROPS_PART,
];

/// Parts and slides staged for one `append_deck` call.
struct PendingAppend<'a> {
    deck: &'a SlideDeck,
    merged: &'a MergedDeck,
    /// Merged index of the deck's first slide.
    base: usize,
    parts: BTreeMap<String, Vec<u8>>,
    content_types: ContentTypes,
    /// Source part name to merged part name.
    copied: HashMap<String, String>,
    /// Parsed layouts and masters, by source part name.
    templates: HashMap<String, Option<XmlElement>>,
}

impl<'a> PendingAppend<'a> {
    fn new(deck: &'a SlideDeck, merged: &'a MergedDeck) -> Self {
        Self {
            deck,
            merged,
            base: merged.slides.len(),
            parts: BTreeMap::new(),
            content_types: ContentTypes::default(),
            copied: HashMap::new(),
            templates: HashMap::new(),
        }
    }

    fn unsupported(&self, detail: String) -> DocJoinError {
        DocJoinError::unsupported(self.deck.name(), detail)
    }

    fn clone_slide(&mut self, position: usize, slide: &Slide) -> Result<Slide, DocJoinError> {
        let deck = self.deck;
        let mut root = slide.root.clone();
        self.inherit_placeholder_geometry(slide, &mut root)?;

        let layout_id = "rId1".to_string();
        let mut relationships = vec![office_relationship(
            &layout_id,
            "slideLayout",
            template::BLANK_LAYOUT_PART,
        )];
        let mut id_map: HashMap<String, String> = HashMap::new();
        let mut dropped: HashSet<String> = HashSet::new();

        for rel in &slide.relationships {
            let kind = rel.kind();
            let target = if rel.external {
                rel.target.clone()
            } else if kind == "slideLayout" {
                id_map.insert(rel.id.clone(), layout_id.clone());
                continue;
            } else if DROPPED_KINDS.contains(&kind) {
                dropped.insert(rel.id.clone());
                continue;
            } else if kind == "slide" {
                let linked = deck
                    .slides()
                    .iter()
                    .position(|s| s.part_name == rel.target)
                    .ok_or_else(|| {
                        self.unsupported(format!(
                            "'{}' links to '{}', which is not a slide of the deck",
                            slide.part_name, rel.target
                        ))
                    })?;
                slide_part_name(self.base + linked)
            } else if SHARED_KINDS.contains(&kind) {
                return Err(self.unsupported(format!(
                    "'{}' references shared {} part '{}'",
                    slide.part_name, kind, rel.target
                )));
            } else {
                self.copy_part(&rel.target)?
            };

            let id = format!("rId{}", relationships.len() + 1);
            id_map.insert(rel.id.clone(), id.clone());
            relationships.push(Relationship {
                id,
                rel_type: rel.rel_type.clone(),
                target,
                external: rel.external,
            });
        }

        let prefixes: Vec<String> = root
            .prefixes_for(RELATIONSHIPS_NS)
            .into_iter()
            .map(|prefix| format!("{}:", prefix))
            .collect();
        root.walk_mut(&mut |element| {
            for (key, value) in element.attributes.iter_mut() {
                if value.is_empty() || !prefixes.iter().any(|p| key.starts_with(p.as_str())) {
                    continue;
                }
                match id_map.get(value.as_str()) {
                    Some(id) => *value = id.clone(),
                    None if dropped.contains(value.as_str()) => {
                        return Err(DocJoinError::unsupported(
                            deck.name(),
                            format!(
                                "'{}' refers to {} through a notes or comments relationship",
                                slide.part_name, value
                            ),
                        ))
                    }
                    None => {
                        return Err(DocJoinError::unsupported(
                            deck.name(),
                            format!(
                                "'{}' refers to missing relationship '{}'",
                                slide.part_name, value
                            ),
                        ))
                    }
                }
            }
            Ok(())
        })?;

        Ok(Slide {
            part_name: slide_part_name(self.base + position),
            root,
            relationships,
        })
    }

    /// Copy `source` and everything it references into the pending parts.
    fn copy_part(&mut self, source: &str) -> Result<String, DocJoinError> {
        if let Some(name) = self.copied.get(source) {
            return Ok(name.clone());
        }
        let deck = self.deck;
        let package = deck.package();
        let bytes = package
            .part(source)
            .ok_or_else(|| {
                self.unsupported(format!("relationship target '{}' is missing", source))
            })?
            .to_vec();

        let name = self.fresh_name(source);
        self.copied.insert(source.to_string(), name.clone());
        self.parts.insert(name.clone(), bytes);

        let mut rewritten = Vec::new();
        for rel in package.relationships(source)? {
            if rel.external {
                rewritten.push(rel);
                continue;
            }
            if SHARED_KINDS.contains(&rel.kind()) {
                return Err(self.unsupported(format!(
                    "'{}' references shared {} part '{}'",
                    source,
                    rel.kind(),
                    rel.target
                )));
            }
            let target = self.copy_part(&rel.target)?;
            rewritten.push(Relationship { target, ..rel });
        }
        if !rewritten.is_empty() {
            self.parts
                .insert(rels_part_name(&name), write_relationships(&name, &rewritten));
        }

        self.carry_content_type(source, &name);
        tracing::debug!(from = %source, to = %name, "copied part");
        Ok(name)
    }

    fn is_taken(&self, name: &str) -> bool {
        RESERVED_PARTS.contains(&name)
            || is_slide_part_name(name)
            || self.merged.parts.contains_key(name)
            || self.parts.contains_key(name)
    }

    /// `original` if free, else `original` with a numeric suffix on the stem.
    fn fresh_name(&self, original: &str) -> String {
        if !self.is_taken(original) {
            return original.to_string();
        }
        let (dir, file) = match original.rsplit_once('/') {
            Some((dir, file)) => (format!("{}/", dir), file),
            None => (String::new(), original),
        };
        let (stem, ext) = match file.rsplit_once('.') {
            Some((stem, ext)) => (stem, format!(".{}", ext)),
            None => (file, String::new()),
        };
        (2u32..)
            .map(|n| format!("{}{}_{}{}", dir, stem, n, ext))
            .find(|candidate| !self.is_taken(candidate))
            .unwrap_or_else(|| original.to_string())
    }

    fn carry_content_type(&mut self, source: &str, target: &str) {
        let deck = self.deck;
        let source_types = deck.package().content_types();
        if let Some(content_type) = source_types.overrides.get(source) {
            self.content_types
                .overrides
                .insert(target.to_string(), content_type.clone());
            return;
        }
        let Some(content_type) = source_types.content_type_for(source) else {
            return;
        };
        let Some((_, ext)) = target.rsplit_once('.') else {
            self.content_types
                .overrides
                .insert(target.to_string(), content_type.to_string());
            return;
        };
        let ext = ext.to_ascii_lowercase();
        let existing = self
            .merged
            .content_types
            .defaults
            .get(&ext)
            .or_else(|| self.content_types.defaults.get(&ext))
            .cloned();
        match existing {
            Some(existing) if existing == content_type => {}
            Some(_) => {
                self.content_types
                    .overrides
                    .insert(target.to_string(), content_type.to_string());
            }
            None => {
                self.content_types
                    .defaults
                    .insert(ext, content_type.to_string());
            }
        }
    }

    fn load_template(&mut self, part: &str) -> Result<Option<XmlElement>, DocJoinError> {
        if let Some(cached) = self.templates.get(part) {
            return Ok(cached.clone());
        }
        let parsed = match self.deck.package().part(part) {
            Some(bytes) => Some(XmlElement::parse(bytes)?),
            None => None,
        };
        self.templates.insert(part.to_string(), parsed.clone());
        Ok(parsed)
    }

    /// Write layout or master geometry into placeholders that have none of
    /// their own, since the clone is re-parented onto the blank layout.
    fn inherit_placeholder_geometry(
        &mut self,
        slide: &Slide,
        root: &mut XmlElement,
    ) -> Result<(), DocJoinError> {
        let Some(layout_part) = slide.layout_part() else {
            return Ok(());
        };
        let layout = self.load_template(layout_part)?;
        let master = match self
            .deck
            .package()
            .related_part(layout_part, "slideMaster")?
        {
            Some(master_part) => self.load_template(&master_part)?,
            None => None,
        };

        let Some(tree) = root.find_path_mut(&["p:cSld", "p:spTree"]) else {
            return Ok(());
        };
        for shape in tree.elements_mut().filter(|e| is_placeholder_host(e)) {
            let Some(wanted) = Placeholder::of(shape) else {
                continue;
            };
            if shape.find_path(&["p:spPr", "a:xfrm"]).is_some() {
                continue;
            }
            let inherited = [layout.as_ref(), master.as_ref()]
                .into_iter()
                .flatten()
                .find_map(|source| wanted.geometry_in(source));
            if let Some(xfrm) = inherited {
                set_shape_xfrm(shape, xfrm);
            }
        }
        Ok(())
    }
}

#[derive(Debug, PartialEq)]
struct Placeholder {
    idx: Option<String>,
    kind: String,
}

impl Placeholder {
    fn of(shape: &XmlElement) -> Option<Self> {
        let ph = shape
            .find_path(&["p:nvSpPr", "p:nvPr", "p:ph"])
            .or_else(|| shape.find_path(&["p:nvPicPr", "p:nvPr", "p:ph"]))?;
        Some(Self {
            idx: ph.attribute("idx").map(str::to_string),
            kind: ph.attribute("type").unwrap_or("obj").to_string(),
        })
    }

    /// Transform of the matching placeholder in a layout or master, matched
    /// by index first and by type second.
    fn geometry_in(&self, source: &XmlElement) -> Option<XmlElement> {
        let tree = source.find_path(&["p:cSld", "p:spTree"])?;
        let candidates: Vec<(&XmlElement, Placeholder)> = tree
            .elements()
            .filter(|e| is_placeholder_host(e))
            .filter_map(|shape| Some((shape, Placeholder::of(shape)?)))
            .collect();

        let by_idx = self.idx.as_ref().and_then(|idx| {
            candidates
                .iter()
                .find(|(_, ph)| ph.idx.as_ref() == Some(idx))
        });
        let (shape, _) = by_idx.or_else(|| candidates.iter().find(|(_, ph)| ph.kind == self.kind))?;
        shape.find_path(&["p:spPr", "a:xfrm"]).cloned()
    }
}

/// Shapes that can stand in for a placeholder: `p:sp`, and `p:pic` for
/// picture placeholders.
fn is_placeholder_host(shape: &XmlElement) -> bool {
    matches!(shape.local_name(), "sp" | "pic")
}

fn set_shape_xfrm(shape: &mut XmlElement, xfrm: XmlElement) {
    if shape.child("p:spPr").is_none() {
        // `p:spPr` follows the non-visual properties, and `p:blipFill` in a picture.
        let at = shape
            .children
            .iter()
            .rposition(|c| {
                matches!(c, XmlNode::Element(e)
                    if matches!(e.name.as_str(), "p:nvSpPr" | "p:nvPicPr" | "p:blipFill"))
            })
            .map_or(0, |i| i + 1);
        shape
            .children
            .insert(at, XmlNode::Element(XmlElement::new("p:spPr")));
    }
    if let Some(sp_pr) = shape.child_mut("p:spPr") {
        sp_pr.children.insert(0, XmlNode::Element(xfrm));
    }
}

/// Scale the transforms of top-level shapes from one canvas to another.
/// Group children are left alone; they live in the group's own coordinates.
fn scale_slide(root: &mut XmlElement, from: CanvasSize, to: CanvasSize) {
    let Some(tree) = root.find_path_mut(&["p:cSld", "p:spTree"]) else {
        return;
    };
    for shape in tree.elements_mut() {
        let path: &[&str] = match shape.local_name() {
            "sp" | "pic" | "cxnSp" => &["p:spPr", "a:xfrm"],
            "grpSp" => &["p:grpSpPr", "a:xfrm"],
            "graphicFrame" => &["p:xfrm"],
            _ => continue,
        };
        let Some(xfrm) = shape.find_path_mut(path) else {
            continue;
        };
        if let Some(off) = xfrm.child_mut("a:off") {
            scale_pair(off, ("x", "y"), from, to);
        }
        if let Some(ext) = xfrm.child_mut("a:ext") {
            scale_pair(ext, ("cx", "cy"), from, to);
        }
    }
}

fn scale_pair(element: &mut XmlElement, keys: (&str, &str), from: CanvasSize, to: CanvasSize) {
    for (key, source, target) in [
        (keys.0, from.width, to.width),
        (keys.1, from.height, to.height),
    ] {
        let Some(value) = element.attribute(key).and_then(|v| v.parse::<i64>().ok()) else {
            continue;
        };
        let scaled = i128::from(value) * i128::from(target) / i128::from(source.max(1));
        element.set_attribute(key, scaled.to_string());
    }
}
