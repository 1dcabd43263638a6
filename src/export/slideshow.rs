//! Minimal PresentationML (PPTX) writer.
//!
//! Produces one blank-layout slide per item, each holding a single picture
//! stretched over the whole slide. Slides run oldest first.

use std::io::{Cursor, Write};

use chrono::{SecondsFormat, Utc};
use zip::{CompressionMethod, ZipWriter, write::SimpleFileOptions};

use super::png_bytes;
use super::types::{ExportError, ExportOptions};
use crate::store::Item;

const NS_A: &str = "http://schemas.openxmlformats.org/drawingml/2006/main";
const NS_R: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const NS_P: &str = "http://schemas.openxmlformats.org/presentationml/2006/main";
const NS_PKG_RELS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";
const REL_BASE: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const XML_DECL: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#;

// presentation.xml.rels: fixed parts first, slides after.
const FIXED_PRESENTATION_RELS: usize = 5;
const FIRST_SLIDE_ID: usize = 256;

/// Serialize `items` (newest first) into a PPTX document in memory.
pub(crate) fn build_slideshow(
    items: &[Item],
    title: &str,
    options: &ExportOptions,
) -> Result<Vec<u8>, ExportError> {
    // Slideshows read start to end, so reverse into capture order.
    let chronological: Vec<&Item> = items.iter().rev().collect();
    let slide_count = chronological.len();

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let xml = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let media = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);

    put(&mut writer, "[Content_Types].xml", content_types(slide_count).as_bytes(), xml)?;
    put(&mut writer, "_rels/.rels", package_rels().as_bytes(), xml)?;
    put(&mut writer, "docProps/core.xml", core_props(title).as_bytes(), xml)?;
    put(&mut writer, "docProps/app.xml", app_props(slide_count).as_bytes(), xml)?;
    put(
        &mut writer,
        "ppt/presentation.xml",
        presentation(slide_count, options).as_bytes(),
        xml,
    )?;
    put(
        &mut writer,
        "ppt/_rels/presentation.xml.rels",
        presentation_rels(slide_count).as_bytes(),
        xml,
    )?;
    put(&mut writer, "ppt/presProps.xml", pres_props().as_bytes(), xml)?;
    put(&mut writer, "ppt/viewProps.xml", view_props().as_bytes(), xml)?;
    put(&mut writer, "ppt/tableStyles.xml", table_styles().as_bytes(), xml)?;
    put(&mut writer, "ppt/theme/theme1.xml", theme().as_bytes(), xml)?;
    put(
        &mut writer,
        "ppt/slideMasters/slideMaster1.xml",
        slide_master().as_bytes(),
        xml,
    )?;
    put(
        &mut writer,
        "ppt/slideMasters/_rels/slideMaster1.xml.rels",
        slide_master_rels().as_bytes(),
        xml,
    )?;
    put(
        &mut writer,
        "ppt/slideLayouts/slideLayout1.xml",
        slide_layout().as_bytes(),
        xml,
    )?;
    put(
        &mut writer,
        "ppt/slideLayouts/_rels/slideLayout1.xml.rels",
        slide_layout_rels().as_bytes(),
        xml,
    )?;

    for (index, item) in chronological.iter().enumerate() {
        let number = index + 1;
        let png = png_bytes(item)?;
        put(
            &mut writer,
            &format!("ppt/media/image{number}.png"),
            &png,
            media,
        )?;
        put(
            &mut writer,
            &format!("ppt/slides/slide{number}.xml"),
            slide(number, options).as_bytes(),
            xml,
        )?;
        put(
            &mut writer,
            &format!("ppt/slides/_rels/slide{number}.xml.rels"),
            slide_rels(number).as_bytes(),
            xml,
        )?;
        log::debug!("Slide {} holds item {}", number, item.id);
    }

    Ok(writer.finish()?.into_inner())
}

fn put(
    writer: &mut ZipWriter<Cursor<Vec<u8>>>,
    name: &str,
    body: &[u8],
    options: SimpleFileOptions,
) -> Result<(), ExportError> {
    writer.start_file(name, options)?;
    writer.write_all(body)?;
    Ok(())
}

/// Escape text for use inside XML character data or attribute values.
fn xml_escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

fn content_types(slide_count: usize) -> String {
    let ct = "application/vnd.openxmlformats-officedocument.presentationml";
    let mut slides = String::new();
    for number in 1..=slide_count {
        slides.push_str(&format!(
            r#"<Override PartName="/ppt/slides/slide{number}.xml" ContentType="{ct}.slide+xml"/>"#
        ));
    }

    format!(
        r#"{XML_DECL}<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Default Extension="png" ContentType="image/png"/><Override PartName="/ppt/presentation.xml" ContentType="{ct}.presentation.main+xml"/><Override PartName="/ppt/slideMasters/slideMaster1.xml" ContentType="{ct}.slideMaster+xml"/><Override PartName="/ppt/slideLayouts/slideLayout1.xml" ContentType="{ct}.slideLayout+xml"/><Override PartName="/ppt/presProps.xml" ContentType="{ct}.presProps+xml"/><Override PartName="/ppt/viewProps.xml" ContentType="{ct}.viewProps+xml"/><Override PartName="/ppt/tableStyles.xml" ContentType="{ct}.tableStyles+xml"/><Override PartName="/ppt/theme/theme1.xml" ContentType="application/vnd.openxmlformats-officedocument.theme+xml"/><Override PartName="/docProps/core.xml" ContentType="application/vnd.openxmlformats-package.core-properties+xml"/><Override PartName="/docProps/app.xml" ContentType="application/vnd.openxmlformats-officedocument.extended-properties+xml"/>{slides}</Types>"#
    )
}

fn package_rels() -> String {
    format!(
        r#"{XML_DECL}<Relationships xmlns="{NS_PKG_RELS}"><Relationship Id="rId1" Type="{REL_BASE}/officeDocument" Target="ppt/presentation.xml"/><Relationship Id="rId2" Type="http://schemas.openxmlformats.org/package/2006/relationships/metadata/core-properties" Target="docProps/core.xml"/><Relationship Id="rId3" Type="{REL_BASE}/extended-properties" Target="docProps/app.xml"/></Relationships>"#
    )
}

fn core_props(title: &str) -> String {
    let now = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
    let title = xml_escape(title);
    format!(
        r#"{XML_DECL}<cp:coreProperties xmlns:cp="http://schemas.openxmlformats.org/package/2006/metadata/core-properties" xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:dcterms="http://purl.org/dc/terms/" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance"><dc:title>{title}</dc:title><dc:creator>snapstack</dc:creator><dcterms:created xsi:type="dcterms:W3CDTF">{now}</dcterms:created><dcterms:modified xsi:type="dcterms:W3CDTF">{now}</dcterms:modified></cp:coreProperties>"#
    )
}

fn app_props(slide_count: usize) -> String {
    format!(
        r#"{XML_DECL}<Properties xmlns="http://schemas.openxmlformats.org/officeDocument/2006/extended-properties"><Application>snapstack</Application><Slides>{slide_count}</Slides></Properties>"#
    )
}

fn presentation(slide_count: usize, options: &ExportOptions) -> String {
    let mut slide_ids = String::new();
    for index in 0..slide_count {
        let id = FIRST_SLIDE_ID + index;
        let rel = FIXED_PRESENTATION_RELS + 1 + index;
        slide_ids.push_str(&format!(r#"<p:sldId id="{id}" r:id="rId{rel}"/>"#));
    }

    format!(
        r#"{XML_DECL}<p:presentation xmlns:a="{NS_A}" xmlns:r="{NS_R}" xmlns:p="{NS_P}" saveSubsetFonts="1"><p:sldMasterIdLst><p:sldMasterId id="2147483648" r:id="rId1"/></p:sldMasterIdLst><p:sldIdLst>{slide_ids}</p:sldIdLst><p:sldSz cx="{cx}" cy="{cy}"/><p:notesSz cx="6858000" cy="9144000"/></p:presentation>"#,
        cx = options.slide_width_emu,
        cy = options.slide_height_emu,
    )
}

fn presentation_rels(slide_count: usize) -> String {
    let mut slides = String::new();
    for index in 0..slide_count {
        let rel = FIXED_PRESENTATION_RELS + 1 + index;
        let number = index + 1;
        slides.push_str(&format!(
            r#"<Relationship Id="rId{rel}" Type="{REL_BASE}/slide" Target="slides/slide{number}.xml"/>"#
        ));
    }

    format!(
        r#"{XML_DECL}<Relationships xmlns="{NS_PKG_RELS}"><Relationship Id="rId1" Type="{REL_BASE}/slideMaster" Target="slideMasters/slideMaster1.xml"/><Relationship Id="rId2" Type="{REL_BASE}/theme" Target="theme/theme1.xml"/><Relationship Id="rId3" Type="{REL_BASE}/presProps" Target="presProps.xml"/><Relationship Id="rId4" Type="{REL_BASE}/viewProps" Target="viewProps.xml"/><Relationship Id="rId5" Type="{REL_BASE}/tableStyles" Target="tableStyles.xml"/>{slides}</Relationships>"#
    )
}

fn pres_props() -> String {
    format!(r#"{XML_DECL}<p:presentationPr xmlns:a="{NS_A}" xmlns:r="{NS_R}" xmlns:p="{NS_P}"/>"#)
}

fn view_props() -> String {
    format!(
        r#"{XML_DECL}<p:viewPr xmlns:a="{NS_A}" xmlns:r="{NS_R}" xmlns:p="{NS_P}"><p:gridSpacing cx="76200" cy="76200"/></p:viewPr>"#
    )
}

fn table_styles() -> String {
    format!(
        r#"{XML_DECL}<a:tblStyleLst xmlns:a="{NS_A}" def="{{5C22544A-7EE6-4342-B048-85BDC9FD1C3A}}"/>"#
    )
}

fn theme() -> String {
    let accents = [
        ("accent1", "4472C4"),
        ("accent2", "ED7D31"),
        ("accent3", "A5A5A5"),
        ("accent4", "FFC000"),
        ("accent5", "5B9BD5"),
        ("accent6", "70AD47"),
        ("hlink", "0563C1"),
        ("folHlink", "954F72"),
    ];
    let accent_xml: String = accents
        .iter()
        .map(|(name, rgb)| format!(r#"<a:{name}><a:srgbClr val="{rgb}"/></a:{name}>"#))
        .collect();
    let solid = r#"<a:solidFill><a:schemeClr val="phClr"/></a:solidFill>"#;
    let line = format!(r#"<a:ln w="6350">{solid}</a:ln>"#);
    let effect = "<a:effectStyle><a:effectLst/></a:effectStyle>";

    format!(
        r#"{XML_DECL}<a:theme xmlns:a="{NS_A}" name="snapstack"><a:themeElements><a:clrScheme name="snapstack"><a:dk1><a:sysClr val="windowText" lastClr="000000"/></a:dk1><a:lt1><a:sysClr val="window" lastClr="FFFFFF"/></a:lt1><a:dk2><a:srgbClr val="44546A"/></a:dk2><a:lt2><a:srgbClr val="E7E6E6"/></a:lt2>{accent_xml}</a:clrScheme><a:fontScheme name="snapstack"><a:majorFont><a:latin typeface="Calibri Light"/><a:ea typeface=""/><a:cs typeface=""/></a:majorFont><a:minorFont><a:latin typeface="Calibri"/><a:ea typeface=""/><a:cs typeface=""/></a:minorFont></a:fontScheme><a:fmtScheme name="snapstack"><a:fillStyleLst>{solid}{solid}{solid}</a:fillStyleLst><a:lnStyleLst>{line}{line}{line}</a:lnStyleLst><a:effectStyleLst>{effect}{effect}{effect}</a:effectStyleLst><a:bgFillStyleLst>{solid}{solid}{solid}</a:bgFillStyleLst></a:fmtScheme></a:themeElements></a:theme>"#
    )
}

/// Empty shape tree shared by master, layout and slides.
fn group_header() -> &'static str {
    r#"<p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr><a:xfrm><a:off x="0" y="0"/><a:ext cx="0" cy="0"/><a:chOff x="0" y="0"/><a:chExt cx="0" cy="0"/></a:xfrm></p:grpSpPr>"#
}

fn slide_master() -> String {
    let header = group_header();
    format!(
        r#"{XML_DECL}<p:sldMaster xmlns:a="{NS_A}" xmlns:r="{NS_R}" xmlns:p="{NS_P}"><p:cSld><p:bg><p:bgRef idx="1001"><a:schemeClr val="bg1"/></p:bgRef></p:bg><p:spTree>{header}</p:spTree></p:cSld><p:clrMap bg1="lt1" tx1="dk1" bg2="lt2" tx2="dk2" accent1="accent1" accent2="accent2" accent3="accent3" accent4="accent4" accent5="accent5" accent6="accent6" hlink="hlink" folHlink="folHlink"/><p:sldLayoutIdLst><p:sldLayoutId id="2147483649" r:id="rId1"/></p:sldLayoutIdLst></p:sldMaster>"#
    )
}

fn slide_master_rels() -> String {
    format!(
        r#"{XML_DECL}<Relationships xmlns="{NS_PKG_RELS}"><Relationship Id="rId1" Type="{REL_BASE}/slideLayout" Target="../slideLayouts/slideLayout1.xml"/><Relationship Id="rId2" Type="{REL_BASE}/theme" Target="../theme/theme1.xml"/></Relationships>"#
    )
}

fn slide_layout() -> String {
    let header = group_header();
    format!(
        r#"{XML_DECL}<p:sldLayout xmlns:a="{NS_A}" xmlns:r="{NS_R}" xmlns:p="{NS_P}" type="blank" preserve="1"><p:cSld name="Blank"><p:spTree>{header}</p:spTree></p:cSld><p:clrMapOvr><a:masterClrMapping/></p:clrMapOvr></p:sldLayout>"#
    )
}

fn slide_layout_rels() -> String {
    format!(
        r#"{XML_DECL}<Relationships xmlns="{NS_PKG_RELS}"><Relationship Id="rId1" Type="{REL_BASE}/slideMaster" Target="../slideMasters/slideMaster1.xml"/></Relationships>"#
    )
}

fn slide(number: usize, options: &ExportOptions) -> String {
    let header = group_header();
    format!(
        r#"{XML_DECL}<p:sld xmlns:a="{NS_A}" xmlns:r="{NS_R}" xmlns:p="{NS_P}"><p:cSld><p:spTree>{header}<p:pic><p:nvPicPr><p:cNvPr id="2" name="Capture {number}"/><p:cNvPicPr><a:picLocks noChangeAspect="1"/></p:cNvPicPr><p:nvPr/></p:nvPicPr><p:blipFill><a:blip r:embed="rId2"/><a:stretch><a:fillRect/></a:stretch></p:blipFill><p:spPr><a:xfrm><a:off x="0" y="0"/><a:ext cx="{cx}" cy="{cy}"/></a:xfrm><a:prstGeom prst="rect"><a:avLst/></a:prstGeom></p:spPr></p:pic></p:spTree></p:cSld><p:clrMapOvr><a:masterClrMapping/></p:clrMapOvr></p:sld>"#,
        cx = options.slide_width_emu,
        cy = options.slide_height_emu,
    )
}

fn slide_rels(number: usize) -> String {
    format!(
        r#"{XML_DECL}<Relationships xmlns="{NS_PKG_RELS}"><Relationship Id="rId1" Type="{REL_BASE}/slideLayout" Target="../slideLayouts/slideLayout1.xml"/><Relationship Id="rId2" Type="{REL_BASE}/image" Target="../media/image{number}.png"/></Relationships>"#
    )
}
