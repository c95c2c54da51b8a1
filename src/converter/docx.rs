// src/converter/docx.rs
use crate::converter::DocumentConverter;
use crate::extractors::blocks::escape_html;
use crate::utils::error::ConvertError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use roxmltree::Node;
use std::collections::HashMap;
use std::io::{Cursor, Read};
use zip::ZipArchive;

const W_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";
const R_NS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const DOCUMENT_PART: &str = "word/document.xml";
const RELS_PART: &str = "word/_rels/document.xml.rels";

type Archive<'a> = ZipArchive<Cursor<&'a [u8]>>;

/// Relationship id to `data:` URI for every image the document embeds.
type Images = HashMap<String, String>;

/// Word-processor archives (.docx).
#[derive(Debug, Default, Clone, Copy)]
pub struct DocxConverter;

impl DocumentConverter for DocxConverter {
    async fn convert(&self, buffer: &[u8]) -> Result<String, ConvertError> {
        let owned = buffer.to_vec();
        tokio::task::spawn_blocking(move || docx_to_html(&owned))
            .await
            .map_err(|e| ConvertError::Worker(e.to_string()))?
    }
}

/// Renders the body of `word/document.xml` as `<p>` and `<table>` blocks.
/// Images become inline `<img>` tags with `data:` URIs.
pub fn docx_to_html(buffer: &[u8]) -> Result<String, ConvertError> {
    let mut archive = ZipArchive::new(Cursor::new(buffer))?;
    let xml = String::from_utf8(read_part(&mut archive, DOCUMENT_PART)?)?;

    let document = roxmltree::Document::parse(&xml)?;
    let body = document
        .descendants()
        .find(|n| n.has_tag_name((W_NS, "body")))
        .ok_or_else(|| ConvertError::MissingPart("w:body".to_string()))?;
    let images = load_images(&mut archive, &document);

    let mut html = String::new();
    render_children(body, &images, &mut html);
    tracing::debug!(
        "Converted {} bytes of document XML into {} bytes of HTML ({} images)",
        xml.len(),
        html.len(),
        images.len()
    );
    Ok(html)
}

fn read_part(archive: &mut Archive, name: &str) -> Result<Vec<u8>, ConvertError> {
    let mut entry = archive
        .by_name(name)
        .map_err(|_| ConvertError::MissingPart(name.to_string()))?;
    let mut bytes = Vec::new();
    entry.read_to_end(&mut bytes)?;
    Ok(bytes)
}

/// Relationship targets are relative to `word/` unless they start at the package root.
fn resolve_target(target: &str) -> String {
    match target.strip_prefix('/') {
        Some(absolute) => absolute.to_string(),
        None => format!("word/{}", target),
    }
}

fn read_relationships(archive: &mut Archive) -> Result<HashMap<String, String>, ConvertError> {
    let xml = String::from_utf8(read_part(archive, RELS_PART)?)?;
    let rels = roxmltree::Document::parse(&xml)?;
    Ok(rels
        .descendants()
        .filter(|n| n.tag_name().name() == "Relationship")
        .filter(|n| n.attribute("TargetMode") != Some("External"))
        .filter_map(|n| Some((n.attribute("Id")?.to_string(), resolve_target(n.attribute("Target")?))))
        .collect())
}

fn mime_for(path: &str) -> &'static str {
    let extension = path.rsplit('.').next().unwrap_or("").to_ascii_lowercase();
    match extension.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "svg" => "image/svg+xml",
        "webp" => "image/webp",
        "tif" | "tiff" => "image/tiff",
        "emf" => "image/x-emf",
        "wmf" => "image/x-wmf",
        _ => "application/octet-stream",
    }
}

/// `<a:blip r:embed>` in drawings, `<v:imagedata r:id>` in legacy pictures and equation objects.
fn image_ref<'a>(node: Node<'a, '_>) -> Option<&'a str> {
    match node.tag_name().name() {
        "blip" => node.attribute((R_NS, "embed")),
        "imagedata" => node.attribute((R_NS, "id")),
        _ => None,
    }
}

/// Reads every referenced media part once. A missing part only loses that image.
fn load_images(archive: &mut Archive, document: &roxmltree::Document) -> Images {
    let ids: Vec<String> = document
        .descendants()
        .filter_map(image_ref)
        .map(str::to_string)
        .collect();
    if ids.is_empty() {
        return Images::new();
    }

    let relationships = match read_relationships(archive) {
        Ok(relationships) => relationships,
        Err(e) => {
            tracing::warn!("Document has {} images but no readable relationships: {}", ids.len(), e);
            return Images::new();
        }
    };

    let mut images = Images::new();
    for id in ids {
        if images.contains_key(&id) {
            continue;
        }
        let Some(target) = relationships.get(&id) else {
            tracing::warn!("Image relationship '{}' is not declared; skipping it", id);
            continue;
        };
        match read_part(archive, target) {
            Ok(bytes) => {
                let uri = format!("data:{};base64,{}", mime_for(target), STANDARD.encode(&bytes));
                images.insert(id, uri);
            }
            Err(e) => tracing::warn!("Skipping image '{}': {}", target, e),
        }
    }
    images
}

fn is_w(node: &Node, name: &str) -> bool {
    node.has_tag_name((W_NS, name))
}

fn render_children(parent: Node, images: &Images, out: &mut String) {
    for child in parent.children().filter(Node::is_element) {
        if is_w(&child, "p") {
            render_paragraph(child, images, out);
        } else if is_w(&child, "tbl") {
            render_table(child, images, out);
        } else if is_w(&child, "sdt") || is_w(&child, "sdtContent") {
            // Content controls wrap ordinary paragraphs
            render_children(child, images, out);
        }
    }
}

fn render_paragraph(paragraph: Node, images: &Images, out: &mut String) {
    let inner: String = paragraph
        .descendants()
        .filter(|n| is_w(n, "r"))
        .map(|run| render_run(run, images))
        .collect();
    if inner.trim().is_empty() {
        return;
    }
    out.push_str("<p>");
    out.push_str(&inner);
    out.push_str("</p>\n");
}

fn render_table(table: Node, images: &Images, out: &mut String) {
    out.push_str("<table>");
    for row in table.children().filter(|n| is_w(n, "tr")) {
        out.push_str("<tr>");
        for cell in row.children().filter(|n| is_w(n, "tc")) {
            out.push_str("<td>");
            render_children(cell, images, out);
            out.push_str("</td>");
        }
        out.push_str("</tr>");
    }
    out.push_str("</table>\n");
}

/// `<w:b/>` is on, `<w:b w:val="0"/>` is off.
fn toggle_on(node: Node) -> bool {
    !matches!(node.attribute((W_NS, "val")), Some("0") | Some("false") | Some("none"))
}

#[derive(Debug, Default)]
struct RunStyle {
    bold: bool,
    italic: bool,
    underline: bool,
    vertical: Option<&'static str>,
}

impl RunStyle {
    fn of(run: Node) -> Self {
        let mut style = RunStyle::default();
        let Some(props) = run.children().find(|n| is_w(n, "rPr")) else {
            return style;
        };
        for prop in props.children().filter(Node::is_element) {
            match prop.tag_name().name() {
                "b" => style.bold = toggle_on(prop),
                "i" => style.italic = toggle_on(prop),
                "u" => style.underline = toggle_on(prop),
                "vertAlign" => {
                    style.vertical = match prop.attribute((W_NS, "val")) {
                        Some("superscript") => Some("sup"),
                        Some("subscript") => Some("sub"),
                        _ => None,
                    }
                }
                _ => {}
            }
        }
        style
    }

    fn tags(&self) -> Vec<&'static str> {
        let mut tags = Vec::new();
        if self.bold {
            tags.push("strong");
        }
        if self.italic {
            tags.push("em");
        }
        if self.underline {
            tags.push("u");
        }
        if let Some(tag) = self.vertical {
            tags.push(tag);
        }
        tags
    }
}

fn render_run(run: Node, images: &Images) -> String {
    let mut text = String::new();
    for piece in run.children().filter(Node::is_element) {
        match piece.tag_name().name() {
            "t" => text.push_str(&escape_html(piece.text().unwrap_or(""))),
            "tab" => text.push(' '),
            "br" | "cr" => text.push_str("<br />"),
            "drawing" | "pict" | "object" => {
                for id in piece.descendants().filter_map(image_ref) {
                    if let Some(src) = images.get(id) {
                        text.push_str(&format!("<img src=\"{}\" />", src));
                    }
                }
            }
            _ => {}
        }
    }
    if text.is_empty() {
        return text;
    }

    let tags = RunStyle::of(run).tags();
    let mut html = String::new();
    for tag in &tags {
        html.push_str(&format!("<{}>", tag));
    }
    html.push_str(&text);
    for tag in tags.iter().rev() {
        html.push_str(&format!("</{}>", tag));
    }
    html
}
