//! Artifact emitters: images, hyperlinks, HTML chunks.
//!
//! Each emitter builds a detached element subtree in the output tree,
//! registers the payload in the matching sidecar table, and parks the
//! subtree in the context. The walker splices it in when it exits the
//! enclosing `w:t` / `w:r` / `w:p`.

use once_cell::sync::Lazy;
use rapport_xml::{NodeId, Tree};
use regex::Regex;

use crate::context::{Context, PendingImage};
use crate::error::{ReportError, Result};
use crate::eval::run_and_get_value;
use crate::tags::ALTCHUNK_TAG;
use crate::value::{Image, ImagePars, Link, LinkPars, ReportData, IMAGE_EXTENSIONS};

static INTERPOLATION_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\$\{(.*?)\}").unwrap());

/// Office-drawing extension GUID carried on every generated image.
const LOCAL_DPI_EXT_URI: &str = "{28A0092B-C50C-407E-A947-70E740481C1C}";
/// SVG-blip extension GUID, added for `.svg` images.
const SVG_EXT_URI: &str = "{96DAC541-7B7A-43D3-8B79-37D633B846F1}";

/// Placeholder raster bytes used when an SVG arrives without a thumbnail;
/// older readers refuse to render the SVG without one.
const SVG_PLACEHOLDER_PNG: [u8; 8] = [110, 111, 74, 68, 69, 110, 67, 10];

fn el(out: &mut Tree, tag: &str, attrs: &[(&str, &str)], children: Vec<NodeId>) -> NodeId {
    let id = out.new_element_with(tag, attrs);
    for child in children {
        out.append_child(id, child);
    }
    id
}

fn register_image(ctx: &mut Context, image: Image) -> String {
    ctx.image_and_shape_id_increment += 1;
    let rel_id = format!("img{}", ctx.image_and_shape_id_increment);
    ctx.images.insert(rel_id.clone(), image);
    rel_id
}

fn validate_image_pars(pars: &ImagePars) -> Result<()> {
    if IMAGE_EXTENSIONS.contains(&pars.extension.as_str()) {
        return Ok(());
    }
    Err(ReportError::Image {
        message: format!(
            "an extension (one of {IMAGE_EXTENSIONS:?}) needs to be provided \
             when providing an image or a thumbnail"
        ),
    })
}

/// Build the `w:drawing` subtree for an image and park it in the context.
pub(crate) fn process_image(ctx: &mut Context, out: &mut Tree, pars: &ImagePars) -> Result<()> {
    validate_image_pars(pars)?;

    // English Metric Units: inches scaled by a fixed emitter factor.
    let cx = (pars.width * 360e3) as i64;
    let cy = (pars.height * 360e3) as i64;
    let cx = cx.to_string();
    let cy = cy.to_string();

    let mut img_rel_id = register_image(
        ctx,
        Image {
            extension: pars.extension.clone(),
            data: pars.data.clone(),
        },
    );
    let id = ctx.image_and_shape_id_increment.to_string();
    let alt = if pars.alt.is_empty() { "desc" } else { &pars.alt };
    let pic_name = format!("Picture {id}");

    let use_local_dpi = el(
        out,
        "a14:useLocalDpi",
        &[
            (
                "xmlns:a14",
                "http://schemas.microsoft.com/office/drawing/2010/main",
            ),
            ("val", "0"),
        ],
        vec![],
    );
    let mut ext_nodes = vec![el(
        out,
        "a:ext",
        &[("uri", LOCAL_DPI_EXT_URI)],
        vec![use_local_dpi],
    )];

    if pars.extension == ".svg" {
        let thumbnail = pars.thumbnail.clone().unwrap_or(Image {
            extension: ".png".to_string(),
            data: SVG_PLACEHOLDER_PNG.to_vec(),
        });
        let thumb_rel_id = register_image(ctx, thumbnail);
        let svg_blip = el(
            out,
            "asvg:svgBlip",
            &[
                (
                    "xmlns:asvg",
                    "http://schemas.microsoft.com/office/drawing/2016/SVG/main",
                ),
                ("r:embed", &img_rel_id),
            ],
            vec![],
        );
        ext_nodes.push(el(out, "a:ext", &[("uri", SVG_EXT_URI)], vec![svg_blip]));
        // The thumbnail takes the image's place; the SVG rides in the
        // extension entry.
        img_rel_id = thumb_rel_id;
    }

    // Angles are in 60000ths of a degree, counter-clockwise negative.
    let rot = (pars.rotation != 0).then(|| format!("-{}", pars.rotation * 60_000));
    let rot_attrs: Vec<(&str, &str)> = match &rot {
        Some(r) => vec![("rot", r.as_str())],
        None => vec![],
    };

    let pic_locks = el(
        out,
        "a:picLocks",
        &[("noChangeAspect", "1"), ("noChangeArrowheads", "1")],
        vec![],
    );
    let cnv_pr = el(
        out,
        "pic:cNvPr",
        &[("id", "0"), ("name", &pic_name), ("descr", alt)],
        vec![],
    );
    let cnv_pic_pr = el(out, "pic:cNvPicPr", &[], vec![pic_locks]);
    let nv_pic_pr = el(out, "pic:nvPicPr", &[], vec![cnv_pr, cnv_pic_pr]);

    let ext_lst = el(out, "a:extLst", &[], ext_nodes);
    let blip = el(
        out,
        "a:blip",
        &[("r:embed", &img_rel_id), ("cstate", "print")],
        vec![ext_lst],
    );
    let src_rect = el(out, "a:srcRect", &[], vec![]);
    let fill_rect = el(out, "a:fillRect", &[], vec![]);
    let stretch = el(out, "a:stretch", &[], vec![fill_rect]);
    let blip_fill = el(out, "pic:blipFill", &[], vec![blip, src_rect, stretch]);

    let off = el(out, "a:off", &[("x", "0"), ("y", "0")], vec![]);
    let ext = el(out, "a:ext", &[("cx", &cx), ("cy", &cy)], vec![]);
    let xfrm = el(out, "a:xfrm", &rot_attrs, vec![off, ext]);
    let av_lst = el(out, "a:avLst", &[], vec![]);
    let prst_geom = el(out, "a:prstGeom", &[("prst", "rect")], vec![av_lst]);
    let no_fill = el(out, "a:noFill", &[], vec![]);
    let ln_no_fill = el(out, "a:noFill", &[], vec![]);
    let ln = el(out, "a:ln", &[], vec![ln_no_fill]);
    let sp_pr = el(
        out,
        "pic:spPr",
        &[("bwMode", "auto")],
        vec![xfrm, prst_geom, no_fill, ln],
    );

    let pic = el(
        out,
        "pic:pic",
        &[(
            "xmlns:pic",
            "http://schemas.openxmlformats.org/drawingml/2006/picture",
        )],
        vec![nv_pic_pr, blip_fill, sp_pr],
    );

    let extent = el(out, "wp:extent", &[("cx", &cx), ("cy", &cy)], vec![]);
    let doc_pr = el(
        out,
        "wp:docPr",
        &[("id", &id), ("name", &pic_name), ("descr", alt)],
        vec![],
    );
    let frame_locks = el(
        out,
        "a:graphicFrameLocks",
        &[
            (
                "xmlns:a",
                "http://schemas.openxmlformats.org/drawingml/2006/main",
            ),
            ("noChangeAspect", "1"),
        ],
        vec![],
    );
    let frame_pr = el(out, "wp:cNvGraphicFramePr", &[], vec![frame_locks]);
    let graphic_data = el(
        out,
        "a:graphicData",
        &[(
            "uri",
            "http://schemas.openxmlformats.org/drawingml/2006/picture",
        )],
        vec![pic],
    );
    let graphic = el(
        out,
        "a:graphic",
        &[(
            "xmlns:a",
            "http://schemas.openxmlformats.org/drawingml/2006/main",
        )],
        vec![graphic_data],
    );
    let inline = el(
        out,
        "wp:inline",
        &[("distT", "0"), ("distB", "0"), ("distL", "0"), ("distR", "0")],
        vec![extent, doc_pr, frame_pr, graphic],
    );
    let drawing = el(out, "w:drawing", &[], vec![inline]);

    let caption = if pars.caption.is_empty() {
        Vec::new()
    } else {
        let br = el(out, "w:br", &[], vec![]);
        let caption_text = out.new_text(pars.caption.clone());
        let wt = el(out, "w:t", &[], vec![caption_text]);
        vec![br, wt]
    };

    ctx.pending_image_node = Some(PendingImage {
        image: drawing,
        caption,
    });
    Ok(())
}

/// Build the `w:hyperlink` subtree for a link and park it in the context.
pub(crate) fn process_link(ctx: &mut Context, out: &mut Tree, pars: &LinkPars) -> Result<()> {
    let url = pars.url.clone();
    let label = if pars.label.is_empty() {
        url.clone()
    } else {
        pars.label.clone()
    };

    ctx.link_id += 1;
    let rel_id = format!("link{}", ctx.link_id);
    ctx.links.insert(rel_id.clone(), Link { url });

    // Style the generated run like the surrounding text, falling back to a
    // minimal underline.
    let run_props = match ctx.text_run_props_node {
        Some(props) => out.clone_subtree(props),
        None => {
            let underline = el(out, "w:u", &[("w:val", "single")], vec![]);
            el(out, "w:rPr", &[], vec![underline])
        }
    };

    let label_text = out.new_text(label);
    let wt = el(out, "w:t", &[], vec![label_text]);
    let run = el(out, "w:r", &[], vec![run_props, wt]);
    let link = el(
        out,
        "w:hyperlink",
        &[("r:id", &rel_id), ("w:history", "1")],
        vec![run],
    );

    ctx.pending_link_node = Some(link);
    Ok(())
}

/// Interpolate `${...}` expressions, register the HTML chunk, and park the
/// `w:altChunk` reference in the context.
pub(crate) fn process_html(ctx: &mut Context, out: &mut Tree, data: &ReportData, html: &str) {
    let interpolated = INTERPOLATION_RE.replace_all(html, |caps: &regex::Captures<'_>| {
        run_and_get_value(&caps[1], ctx, data)
            .map(|v| v.to_string())
            .unwrap_or_default()
    });

    ctx.html_id += 1;
    let rel_id = format!("html{}", ctx.html_id);
    ctx.htmls.insert(rel_id.clone(), interpolated.into_owned());

    let chunk = el(out, ALTCHUNK_TAG, &[("r:id", &rel_id)], vec![]);
    ctx.pending_html_node = Some(chunk);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::CreateReportOptions;
    use crate::value::Value;
    use rapport_xml::NodeKind;

    fn out_tree() -> Tree {
        Tree::new(NodeKind::Element {
            tag: "w:body".to_string(),
            attrs: Default::default(),
        })
    }

    fn ctx() -> Context {
        Context::new(CreateReportOptions::default(), 73_086_257)
    }

    fn find_by_tag(tree: &Tree, from: NodeId, tag: &str) -> Option<NodeId> {
        if tree.tag(from) == Some(tag) {
            return Some(from);
        }
        for &child in tree.children(from) {
            if let Some(found) = find_by_tag(tree, child, tag) {
                return Some(found);
            }
        }
        None
    }

    #[test]
    fn test_image_registers_bytes_and_emu() {
        let mut ctx = ctx();
        let mut out = out_tree();
        let pars = ImagePars::new(".png", vec![1, 2, 3, 4], 1.0, 1.0);

        process_image(&mut ctx, &mut out, &pars).unwrap();

        assert_eq!(ctx.images.len(), 1);
        let (rel_id, image) = ctx.images.iter().next().unwrap();
        assert_eq!(rel_id, "img73086258");
        assert_eq!(image.data, vec![1, 2, 3, 4]);

        let pending = ctx.pending_image_node.as_ref().unwrap();
        assert_eq!(out.tag(pending.image), Some("w:drawing"));
        let extent = find_by_tag(&out, pending.image, "wp:extent").unwrap();
        assert_eq!(out.attr(extent, "cx"), Some("360000"));
        assert_eq!(out.attr(extent, "cy"), Some("360000"));
        assert!(pending.caption.is_empty());
    }

    #[test]
    fn test_image_rejects_unknown_extension() {
        let mut ctx = ctx();
        let mut out = out_tree();
        let pars = ImagePars::new(".tiff", vec![0], 1.0, 1.0);
        assert!(matches!(
            process_image(&mut ctx, &mut out, &pars),
            Err(ReportError::Image { .. })
        ));
        assert!(ctx.images.is_empty());
    }

    #[test]
    fn test_image_rotation_attr() {
        let mut ctx = ctx();
        let mut out = out_tree();
        let mut pars = ImagePars::new(".png", vec![0], 2.0, 1.0);
        pars.rotation = 90;
        process_image(&mut ctx, &mut out, &pars).unwrap();

        let pending = ctx.pending_image_node.as_ref().unwrap();
        let xfrm = find_by_tag(&out, pending.image, "a:xfrm").unwrap();
        assert_eq!(out.attr(xfrm, "rot"), Some("-5400000"));
    }

    #[test]
    fn test_svg_gets_thumbnail_and_blip_entry() {
        let mut ctx = ctx();
        let mut out = out_tree();
        let pars = ImagePars::new(".svg", b"<svg/>".to_vec(), 1.0, 1.0);
        process_image(&mut ctx, &mut out, &pars).unwrap();

        // The SVG and its synthesized thumbnail are both registered.
        assert_eq!(ctx.images.len(), 2);
        let ids: Vec<&String> = ctx.images.keys().collect();
        assert_eq!(ids, vec!["img73086258", "img73086259"]);
        assert_eq!(ctx.images.get("img73086259").unwrap().extension, ".png");
        assert_eq!(ctx.images.get("img73086259").unwrap().data, SVG_PLACEHOLDER_PNG);

        let pending = ctx.pending_image_node.as_ref().unwrap();
        let blip_entry = find_by_tag(&out, pending.image, "asvg:svgBlip").unwrap();
        assert_eq!(out.attr(blip_entry, "r:embed"), Some("img73086258"));
        // The primary embed points at the thumbnail.
        let blip = find_by_tag(&out, pending.image, "a:blip").unwrap();
        assert_eq!(out.attr(blip, "r:embed"), Some("img73086259"));
    }

    #[test]
    fn test_image_caption_nodes() {
        let mut ctx = ctx();
        let mut out = out_tree();
        let mut pars = ImagePars::new(".png", vec![0], 1.0, 1.0);
        pars.caption = "figure one".to_string();
        process_image(&mut ctx, &mut out, &pars).unwrap();

        let pending = ctx.pending_image_node.as_ref().unwrap();
        assert_eq!(pending.caption.len(), 2);
        assert_eq!(out.tag(pending.caption[0]), Some("w:br"));
        assert_eq!(out.tag(pending.caption[1]), Some("w:t"));
    }

    #[test]
    fn test_link_defaults_label_to_url() {
        let mut ctx = ctx();
        let mut out = out_tree();
        process_link(
            &mut ctx,
            &mut out,
            &LinkPars {
                url: "https://example.test".to_string(),
                label: String::new(),
            },
        )
        .unwrap();

        assert_eq!(ctx.links.get("link1").unwrap().url, "https://example.test");
        let link = ctx.pending_link_node.unwrap();
        assert_eq!(out.tag(link), Some("w:hyperlink"));
        assert_eq!(out.attr(link, "r:id"), Some("link1"));
        let wt = find_by_tag(&out, link, "w:t").unwrap();
        let text = out.children(wt)[0];
        assert_eq!(out.text(text), Some("https://example.test"));
        // Fallback style is a plain underline.
        assert!(find_by_tag(&out, link, "w:u").is_some());
    }

    #[test]
    fn test_link_copies_captured_run_props() {
        let mut ctx = ctx();
        let mut out = out_tree();
        let bold = out.new_element("w:b");
        let rpr = el(&mut out, "w:rPr", &[], vec![bold]);
        ctx.text_run_props_node = Some(rpr);

        process_link(
            &mut ctx,
            &mut out,
            &LinkPars {
                url: "https://example.test".to_string(),
                label: "here".to_string(),
            },
        )
        .unwrap();

        let link = ctx.pending_link_node.unwrap();
        let copied = find_by_tag(&out, link, "w:rPr").unwrap();
        assert_ne!(copied, rpr);
        assert!(find_by_tag(&out, copied, "w:b").is_some());
    }

    #[test]
    fn test_html_interpolation() {
        let mut ctx = ctx();
        let mut out = out_tree();
        let mut data = ReportData::new();
        data.insert("title", "Hi");
        data.insert("n", Value::Int(2));

        process_html(&mut ctx, &mut out, &data, "<h1>${title}</h1><p>${n}</p>");

        assert_eq!(ctx.htmls.get("html1").unwrap(), "<h1>Hi</h1><p>2</p>");
        let chunk = ctx.pending_html_node.unwrap();
        assert_eq!(out.tag(chunk), Some(ALTCHUNK_TAG));
        assert_eq!(out.attr(chunk, "r:id"), Some("html1"));
    }
}
