//! In-memory fixture documents for unit tests.

use std::io::{Cursor, Write};

use lopdf::{content::Content, content::Operation, Dictionary, Document, Object, Stream};
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use crate::page::PageDocument;

/// Helper to create a simple PDF with N pages containing identifiable text
/// `"{prefix}-Page-{n}"`.
pub(crate) fn create_test_pdf(num_pages: u32, content_prefix: &str) -> Vec<u8> {
    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();

    let mut page_ids = Vec::new();

    for i in 0..num_pages {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new(
                    "Tf",
                    vec![Object::Name(b"F1".to_vec()), Object::Integer(12)],
                ),
                Operation::new("Td", vec![Object::Integer(100), Object::Integer(700)]),
                Operation::new(
                    "Tj",
                    vec![Object::String(
                        format!("{}-Page-{}", content_prefix, i + 1).into_bytes(),
                        lopdf::StringFormat::Literal,
                    )],
                ),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(Dictionary::new(), content.encode().unwrap()));

        let page = Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Page".to_vec())),
            ("Parent", Object::Reference(pages_id)),
            ("Contents", Object::Reference(content_id)),
        ]);
        page_ids.push(doc.add_object(page));
    }

    // MediaBox lives on the root so merging has to carry it over.
    let pages = Dictionary::from_iter(vec![
        ("Type", Object::Name(b"Pages".to_vec())),
        ("Count", Object::Integer(num_pages as i64)),
        (
            "Kids",
            Object::Array(page_ids.iter().map(|id| Object::Reference(*id)).collect()),
        ),
        (
            "MediaBox",
            Object::Array(vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(612),
                Object::Integer(792),
            ]),
        ),
    ]);
    doc.objects.insert(pages_id, Object::Dictionary(pages));

    let catalog = Dictionary::from_iter(vec![
        ("Type", Object::Name(b"Catalog".to_vec())),
        ("Pages", Object::Reference(pages_id)),
    ]);
    let catalog_id = doc.add_object(catalog);
    doc.trailer.set("Root", Object::Reference(catalog_id));

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer).unwrap();
    buffer
}

/// The label drawn on a fixture page, e.g. `"A-Page-2"`.
pub(crate) fn page_label(doc: &PageDocument, page: u32) -> String {
    let content = doc.page_content(page).unwrap();
    let text = String::from_utf8_lossy(&content);
    let start = text.find('(').expect("fixture page has a text run") + 1;
    let end = text[start..].find(')').unwrap() + start;
    text[start..end].to_string()
}

pub(crate) fn page_labels(doc: &PageDocument) -> Vec<String> {
    (1..=doc.page_count()).map(|p| page_label(doc, p)).collect()
}

const CT_SLIDE: &str = "application/vnd.openxmlformats-officedocument.presentationml.slide+xml";
const RT_BASE: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

/// Minimal PresentationML package builder.
pub(crate) struct DeckFixture {
    prefix: String,
    slides: usize,
    width: i64,
    height: i64,
    with_image: bool,
    extra_slide_rel: Option<(String, String)>,
    title_placeholder: bool,
    picture_placeholder: bool,
    jump_link: bool,
    link_id: Option<String>,
}

impl DeckFixture {
    pub(crate) fn new(prefix: &str, slides: usize) -> Self {
        Self {
            prefix: prefix.to_string(),
            slides,
            width: 9_144_000,
            height: 6_858_000,
            with_image: false,
            extra_slide_rel: None,
            title_placeholder: false,
            picture_placeholder: false,
            jump_link: false,
            link_id: None,
        }
    }

    pub(crate) fn canvas(mut self, width: i64, height: i64) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Every slide shows the same picture, `ppt/media/image1.png`.
    pub(crate) fn with_image(mut self) -> Self {
        self.with_image = true;
        self
    }

    /// Adds a relationship `(type suffix, target)` to every slide as `rId9`.
    /// `http` targets are external.
    pub(crate) fn with_slide_rel(mut self, type_suffix: &str, target: &str) -> Self {
        self.extra_slide_rel = Some((type_suffix.to_string(), target.to_string()));
        self
    }

    /// Slides carry a title placeholder without its own geometry.
    pub(crate) fn with_title_placeholder(mut self) -> Self {
        self.title_placeholder = true;
        self
    }

    /// Slides carry an empty picture placeholder (`idx="1"`), the way a
    /// picture inserted into a layout placeholder is saved.
    pub(crate) fn with_picture_placeholder(mut self) -> Self {
        self.picture_placeholder = true;
        self
    }

    /// The first slide links to the last one.
    pub(crate) fn with_jump_link(mut self) -> Self {
        self.jump_link = true;
        self.link_id = Some("rId7".to_string());
        self
    }

    /// The first slide's text shape carries a click link through `rid`,
    /// whether or not the slide has such a relationship.
    pub(crate) fn with_link_id(mut self, rid: &str) -> Self {
        self.link_id = Some(rid.to_string());
        self
    }

    pub(crate) fn build(&self) -> Vec<u8> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let mut put = |name: &str, body: &str| {
            zip.start_file(name, SimpleFileOptions::default()).unwrap();
            zip.write_all(body.as_bytes()).unwrap();
        };

        let mut overrides = String::new();
        for n in 1..=self.slides {
            overrides.push_str(&format!(
                r#"<Override PartName="/ppt/slides/slide{n}.xml" ContentType="{CT_SLIDE}"/>"#
            ));
        }
        put(
            "[Content_Types].xml",
            &format!(
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Default Extension="png" ContentType="image/png"/><Override PartName="/ppt/presentation.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.presentation.main+xml"/><Override PartName="/ppt/slideLayouts/slideLayout1.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.slideLayout+xml"/><Override PartName="/ppt/slideMasters/slideMaster1.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.slideMaster+xml"/><Override PartName="/ppt/theme/theme1.xml" ContentType="application/vnd.openxmlformats-officedocument.theme+xml"/>{overrides}</Types>"#
            ),
        );
        put(
            "_rels/.rels",
            &format!(
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="{RT_BASE}/officeDocument" Target="ppt/presentation.xml"/></Relationships>"#
            ),
        );

        let mut slide_ids = String::new();
        let mut pres_rels = format!(
            r#"<Relationship Id="rId1" Type="{RT_BASE}/slideMaster" Target="slideMasters/slideMaster1.xml"/><Relationship Id="rId2" Type="{RT_BASE}/theme" Target="theme/theme1.xml"/>"#
        );
        // Relationship ids deliberately do not follow slide order.
        for n in 1..=self.slides {
            let rid = 100 - n;
            slide_ids.push_str(&format!(r#"<p:sldId id="{}" r:id="rId{rid}"/>"#, 255 + n));
            pres_rels.push_str(&format!(
                r#"<Relationship Id="rId{rid}" Type="{RT_BASE}/slide" Target="slides/slide{n}.xml"/>"#
            ));
        }
        put(
            "ppt/presentation.xml",
            &format!(
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<p:presentation xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:r="{RT_BASE}" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main"><p:sldMasterIdLst><p:sldMasterId id="2147483648" r:id="rId1"/></p:sldMasterIdLst><p:sldIdLst>{slide_ids}</p:sldIdLst><p:sldSz cx="{}" cy="{}"/><p:notesSz cx="6858000" cy="9144000"/></p:presentation>"#,
                self.width, self.height
            ),
        );
        put(
            "ppt/_rels/presentation.xml.rels",
            &format!(
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">{pres_rels}</Relationships>"#
            ),
        );
        put(
            "ppt/slideMasters/slideMaster1.xml",
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<p:sldMaster xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main"><p:cSld><p:spTree><p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr/><p:sp><p:nvSpPr><p:cNvPr id="2" name="Body"/><p:cNvSpPr/><p:nvPr><p:ph type="body" idx="1"/></p:nvPr></p:nvSpPr><p:spPr><a:xfrm><a:off x="1" y="2"/><a:ext cx="3" cy="4"/></a:xfrm></p:spPr></p:sp></p:spTree></p:cSld><p:clrMap bg1="lt1" tx1="dk1" bg2="lt2" tx2="dk2" accent1="accent1" accent2="accent2" accent3="accent3" accent4="accent4" accent5="accent5" accent6="accent6" hlink="hlink" folHlink="folHlink"/><p:sldLayoutIdLst><p:sldLayoutId id="2147483649" r:id="rId1"/></p:sldLayoutIdLst></p:sldMaster>"#,
        );
        put(
            "ppt/slideMasters/_rels/slideMaster1.xml.rels",
            &format!(
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="{RT_BASE}/slideLayout" Target="../slideLayouts/slideLayout1.xml"/><Relationship Id="rId2" Type="{RT_BASE}/theme" Target="../theme/theme1.xml"/></Relationships>"#
            ),
        );
        put(
            "ppt/slideLayouts/slideLayout1.xml",
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<p:sldLayout xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main" type="title"><p:cSld name="Title"><p:spTree><p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr/><p:sp><p:nvSpPr><p:cNvPr id="2" name="Title 1"/><p:cNvSpPr/><p:nvPr><p:ph type="title"/></p:nvPr></p:nvSpPr><p:spPr><a:xfrm><a:off x="457200" y="274638"/><a:ext cx="8229600" cy="1143000"/></a:xfrm></p:spPr></p:sp></p:spTree></p:cSld><p:clrMapOvr><a:masterClrMapping/></p:clrMapOvr></p:sldLayout>"#,
        );
        put(
            "ppt/slideLayouts/_rels/slideLayout1.xml.rels",
            &format!(
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="{RT_BASE}/slideMaster" Target="../slideMasters/slideMaster1.xml"/></Relationships>"#
            ),
        );
        put(
            "ppt/theme/theme1.xml",
            &format!(
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<a:theme xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" name="{} Theme"><a:themeElements/></a:theme>"#,
                self.prefix
            ),
        );
        if self.with_image {
            put("ppt/media/image1.png", &format!("PNG-{}", self.prefix));
        }

        for n in 1..=self.slides {
            put(&format!("ppt/slides/slide{n}.xml"), &self.slide_xml(n));
            put(
                &format!("ppt/slides/_rels/slide{n}.xml.rels"),
                &self.slide_rels(n),
            );
        }

        zip.finish().unwrap().into_inner()
    }

    fn slide_xml(&self, n: usize) -> String {
        let mut shapes = String::new();
        if self.title_placeholder {
            shapes.push_str(&format!(
                r#"<p:sp><p:nvSpPr><p:cNvPr id="3" name="Title"/><p:cNvSpPr/><p:nvPr><p:ph type="title"/></p:nvPr></p:nvSpPr><p:spPr/><p:txBody><a:bodyPr/><a:p><a:r><a:t>{}-Title-{n}</a:t></a:r></a:p></p:txBody></p:sp>"#,
                self.prefix
            ));
        }
        if self.picture_placeholder {
            shapes.push_str(
                r#"<p:pic><p:nvPicPr><p:cNvPr id="5" name="Picture Placeholder"/><p:cNvPicPr/><p:nvPr><p:ph type="pic" idx="1"/></p:nvPr></p:nvPicPr><p:blipFill/><p:spPr/></p:pic>"#,
            );
        }
        let link = match &self.link_id {
            Some(rid) if n == 1 => {
                format!(r#"<a:hlinkClick r:id="{rid}" action="ppaction://hlinksldjump"/>"#)
            }
            _ => String::new(),
        };
        shapes.push_str(&format!(
            r#"<p:sp><p:nvSpPr><p:cNvPr id="2" name="Text &amp; more">{link}</p:cNvPr><p:cNvSpPr/><p:nvPr/></p:nvSpPr><p:spPr><a:xfrm><a:off x="1000" y="2000"/><a:ext cx="4000" cy="3000"/></a:xfrm></p:spPr><p:txBody><a:bodyPr/><a:p><a:r><a:t>{}-Slide-{n}</a:t></a:r></a:p></p:txBody></p:sp>"#,
            self.prefix
        ));
        if self.with_image {
            shapes.push_str(
                r#"<p:pic><p:nvPicPr><p:cNvPr id="4" name="Picture"/><p:cNvPicPr/><p:nvPr/></p:nvPicPr><p:blipFill><a:blip r:embed="rId2"/></p:blipFill><p:spPr><a:xfrm><a:off x="10" y="20"/><a:ext cx="30" cy="40"/></a:xfrm></p:spPr></p:pic>"#,
            );
        }
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<p:sld xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:r="{RT_BASE}" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main"><p:cSld><p:spTree><p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr/>{shapes}</p:spTree></p:cSld><p:clrMapOvr><a:masterClrMapping/></p:clrMapOvr></p:sld>"#
        )
    }

    fn slide_rels(&self, n: usize) -> String {
        let mut rels = format!(
            r#"<Relationship Id="rId1" Type="{RT_BASE}/slideLayout" Target="../slideLayouts/slideLayout1.xml"/>"#
        );
        if self.with_image {
            rels.push_str(&format!(
                r#"<Relationship Id="rId2" Type="{RT_BASE}/image" Target="../media/image1.png"/>"#
            ));
        }
        if self.jump_link && n == 1 {
            rels.push_str(&format!(
                r#"<Relationship Id="rId7" Type="{RT_BASE}/slide" Target="slide{}.xml"/>"#,
                self.slides
            ));
        }
        if let Some((suffix, target)) = &self.extra_slide_rel {
            let mode = if target.starts_with("http") {
                r#" TargetMode="External""#
            } else {
                ""
            };
            rels.push_str(&format!(
                r#"<Relationship Id="rId9" Type="{RT_BASE}/{suffix}" Target="{target}"{mode}/>"#
            ));
        }
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">{rels}</Relationships>"#
        )
    }
}
