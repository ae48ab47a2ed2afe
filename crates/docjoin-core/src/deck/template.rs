//! Skeleton of a freshly created deck: one master, one blank layout, one
//! theme and the presentation-level property parts.

pub const PRESENTATION_PART: &str = "ppt/presentation.xml";
pub const MASTER_PART: &str = "ppt/slideMasters/slideMaster1.xml";
pub const BLANK_LAYOUT_PART: &str = "ppt/slideLayouts/slideLayout1.xml";
pub const THEME_PART: &str = "ppt/theme/theme1.xml";
pub const PRES_PROPS_PART: &str = "ppt/presProps.xml";
pub const VIEW_PROPS_PART: &str = "ppt/viewProps.xml";
pub const TABLE_STYLES_PART: &str = "ppt/tableStyles.xml";
pub const CORE_PROPS_PART: &str = "docProps/core.xml";
pub const APP_PROPS_PART: &str = "docProps/app.xml";

pub const RT_OFFICE: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
pub const RT_PACKAGE: &str = "http://schemas.openxmlformats.org/package/2006/relationships";

pub const CT_PRESENTATION: &str =
    "application/vnd.openxmlformats-officedocument.presentationml.presentation.main+xml";
pub const CT_SLIDE: &str = "application/vnd.openxmlformats-officedocument.presentationml.slide+xml";
pub const CT_LAYOUT: &str =
    "application/vnd.openxmlformats-officedocument.presentationml.slideLayout+xml";
pub const CT_MASTER: &str =
    "application/vnd.openxmlformats-officedocument.presentationml.slideMaster+xml";
pub const CT_THEME: &str = "application/vnd.openxmlformats-officedocument.theme+xml";
pub const CT_PRES_PROPS: &str =
    "application/vnd.openxmlformats-officedocument.presentationml.presProps+xml";
pub const CT_VIEW_PROPS: &str =
    "application/vnd.openxmlformats-officedocument.presentationml.viewProps+xml";
pub const CT_TABLE_STYLES: &str =
    "application/vnd.openxmlformats-officedocument.presentationml.tableStyles+xml";
pub const CT_CORE_PROPS: &str = "application/vnd.openxmlformats-package.core-properties+xml";
pub const CT_APP_PROPS: &str =
    "application/vnd.openxmlformats-officedocument.extended-properties+xml";
pub const CT_RELATIONSHIPS: &str = "application/vnd.openxmlformats-package.relationships+xml";

pub const NS_DECLS: &str = r#"xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main""#;

const EMPTY_SHAPE_TREE: &str = r#"<p:spTree><p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr><a:xfrm><a:off x="0" y="0"/><a:ext cx="0" cy="0"/><a:chOff x="0" y="0"/><a:chExt cx="0" cy="0"/></a:xfrm></p:grpSpPr></p:spTree>"#;

const XML_DECL: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\r\n";

pub fn root_rels() -> String {
    format!(
        r#"{XML_DECL}<Relationships xmlns="{RT_PACKAGE}"><Relationship Id="rId1" Type="{RT_OFFICE}/officeDocument" Target="ppt/presentation.xml"/><Relationship Id="rId2" Type="{RT_PACKAGE}/metadata/core-properties" Target="docProps/core.xml"/><Relationship Id="rId3" Type="{RT_OFFICE}/extended-properties" Target="docProps/app.xml"/></Relationships>"#
    )
}

/// Relationship id number of the first slide in the presentation part.
pub const FIRST_SLIDE_REL: usize = 6;

pub fn presentation(slides: usize, width: i64, height: i64) -> String {
    let slide_ids: String = (0..slides)
        .map(|i| format!(r#"<p:sldId id="{}" r:id="rId{}"/>"#, 256 + i, FIRST_SLIDE_REL + i))
        .collect();
    let slide_list = if slide_ids.is_empty() {
        String::new()
    } else {
        format!("<p:sldIdLst>{slide_ids}</p:sldIdLst>")
    };
    format!(
        r#"{XML_DECL}<p:presentation {NS_DECLS} saveSubsetFonts="1"><p:sldMasterIdLst><p:sldMasterId id="2147483648" r:id="rId1"/></p:sldMasterIdLst>{slide_list}<p:sldSz cx="{width}" cy="{height}"/><p:notesSz cx="6858000" cy="9144000"/></p:presentation>"#
    )
}

/// `(id, kind, target)` of the presentation part's fixed relationships.
pub fn presentation_links() -> [(&'static str, &'static str, &'static str); 5] {
    [
        ("rId1", "slideMaster", MASTER_PART),
        ("rId2", "theme", THEME_PART),
        ("rId3", "presProps", PRES_PROPS_PART),
        ("rId4", "viewProps", VIEW_PROPS_PART),
        ("rId5", "tableStyles", TABLE_STYLES_PART),
    ]
}

pub fn slide_master() -> String {
    format!(
        r#"{XML_DECL}<p:sldMaster {NS_DECLS}><p:cSld><p:bg><p:bgRef idx="1001"><a:schemeClr val="bg1"/></p:bgRef></p:bg>{EMPTY_SHAPE_TREE}</p:cSld><p:clrMap bg1="lt1" tx1="dk1" bg2="lt2" tx2="dk2" accent1="accent1" accent2="accent2" accent3="accent3" accent4="accent4" accent5="accent5" accent6="accent6" hlink="hlink" folHlink="folHlink"/><p:sldLayoutIdLst><p:sldLayoutId id="2147483649" r:id="rId1"/></p:sldLayoutIdLst><p:txStyles><p:titleStyle/><p:bodyStyle/><p:otherStyle/></p:txStyles></p:sldMaster>"#
    )
}

pub fn slide_master_rels() -> String {
    format!(
        r#"{XML_DECL}<Relationships xmlns="{RT_PACKAGE}"><Relationship Id="rId1" Type="{RT_OFFICE}/slideLayout" Target="../slideLayouts/slideLayout1.xml"/><Relationship Id="rId2" Type="{RT_OFFICE}/theme" Target="../theme/theme1.xml"/></Relationships>"#
    )
}

pub fn blank_layout() -> String {
    format!(
        r#"{XML_DECL}<p:sldLayout {NS_DECLS} type="blank" preserve="1"><p:cSld name="Blank">{EMPTY_SHAPE_TREE}</p:cSld><p:clrMapOvr><a:masterClrMapping/></p:clrMapOvr></p:sldLayout>"#
    )
}

pub fn blank_layout_rels() -> String {
    format!(
        r#"{XML_DECL}<Relationships xmlns="{RT_PACKAGE}"><Relationship Id="rId1" Type="{RT_OFFICE}/slideMaster" Target="../slideMasters/slideMaster1.xml"/></Relationships>"#
    )
}

pub fn pres_props() -> String {
    format!(r#"{XML_DECL}<p:presentationPr {NS_DECLS}/>"#)
}

pub fn view_props() -> String {
    format!(
        r#"{XML_DECL}<p:viewPr {NS_DECLS}><p:normalViewPr><p:restoredLeft sz="15620"/><p:restoredTop sz="94660"/></p:normalViewPr><p:gridSpacing cx="76200" cy="76200"/></p:viewPr>"#
    )
}

pub fn table_styles() -> String {
    format!(
        r#"{XML_DECL}<a:tblStyleLst xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" def="{{5C22544A-7EE6-4342-B048-85BDC9FD1C3A}}"/>"#
    )
}

pub fn core_props() -> String {
    format!(
        r#"{XML_DECL}<cp:coreProperties xmlns:cp="http://schemas.openxmlformats.org/package/2006/metadata/core-properties" xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:dcterms="http://purl.org/dc/terms/" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance"><dc:title>Merged presentation</dc:title><dc:creator>docjoin</dc:creator></cp:coreProperties>"#
    )
}

pub fn app_props(slides: usize) -> String {
    format!(
        r#"{XML_DECL}<Properties xmlns="http://schemas.openxmlformats.org/officeDocument/2006/extended-properties"><Application>docjoin</Application><Slides>{slides}</Slides></Properties>"#
    )
}

pub fn default_theme() -> String {
    let colors = [
        ("dk1", r#"<a:sysClr val="windowText" lastClr="000000"/>"#),
        ("lt1", r#"<a:sysClr val="window" lastClr="FFFFFF"/>"#),
        ("dk2", r#"<a:srgbClr val="1F497D"/>"#),
        ("lt2", r#"<a:srgbClr val="EEECE1"/>"#),
        ("accent1", r#"<a:srgbClr val="4F81BD"/>"#),
        ("accent2", r#"<a:srgbClr val="C0504D"/>"#),
        ("accent3", r#"<a:srgbClr val="9BBB59"/>"#),
        ("accent4", r#"<a:srgbClr val="8064A2"/>"#),
        ("accent5", r#"<a:srgbClr val="4BACC6"/>"#),
        ("accent6", r#"<a:srgbClr val="F79646"/>"#),
        ("hlink", r#"<a:srgbClr val="0000FF"/>"#),
        ("folHlink", r#"<a:srgbClr val="800080"/>"#),
    ];
    let color_scheme: String = colors
        .iter()
        .map(|(slot, color)| format!("<a:{slot}>{color}</a:{slot}>"))
        .collect();

    let solid = r#"<a:solidFill><a:schemeClr val="phClr"/></a:solidFill>"#;
    let line = |w: u32| {
        format!(
            r#"<a:ln w="{w}" cap="flat" cmpd="sng" algn="ctr"><a:solidFill><a:schemeClr val="phClr"/></a:solidFill><a:prstDash val="solid"/></a:ln>"#
        )
    };
    let effect = "<a:effectStyle><a:effectLst/></a:effectStyle>";
    let font = |face: &str| {
        format!(r#"<a:latin typeface="{face}"/><a:ea typeface=""/><a:cs typeface=""/>"#)
    };

    format!(
        r#"{XML_DECL}<a:theme xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" name="Office Theme"><a:themeElements><a:clrScheme name="Office">{color_scheme}</a:clrScheme><a:fontScheme name="Office"><a:majorFont>{major}</a:majorFont><a:minorFont>{minor}</a:minorFont></a:fontScheme><a:fmtScheme name="Office"><a:fillStyleLst>{solid}{solid}{solid}</a:fillStyleLst><a:lnStyleLst>{l1}{l2}{l3}</a:lnStyleLst><a:effectStyleLst>{effect}{effect}{effect}</a:effectStyleLst><a:bgFillStyleLst>{solid}{solid}{solid}</a:bgFillStyleLst></a:fmtScheme></a:themeElements><a:objectDefaults/><a:extraClrSchemeLst/></a:theme>"#,
        major = font("Calibri Light"),
        minor = font("Calibri"),
        l1 = line(9525),
        l2 = line(25400),
        l3 = line(38100),
    )
}
