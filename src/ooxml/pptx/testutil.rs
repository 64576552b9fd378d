//! Package fixtures shared by the unit tests.

use crate::common::xml::XmlDocument;
use crate::ooxml::opc::constants::{content_type, part_name, relationship_type};
use crate::ooxml::opc::{ContentTypes, PackURI, PackageDir, Relationship, RelationshipId, Relationships};
use crate::ooxml::pptx::animations::{AnimationEffect, EffectSpec};
use crate::ooxml::pptx::ids::ShapeId;
use crate::ooxml::pptx::slide::{blank_slide_document, placeholder_shape, shape_tree_mut};
use crate::ooxml::pptx::timing::{bind_effect, create_click_trigger};
use tempfile::TempDir;

const PRESENTATION_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<p:presentation xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main"><p:sldMasterIdLst><p:sldMasterId id="2147483648" r:id="rId2"/></p:sldMasterIdLst><p:sldIdLst>{entries}</p:sldIdLst><p:sldSz cx="12192000" cy="6858000"/><p:notesSz cx="6858000" cy="9144000"/></p:presentation>"#;

const MASTER_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<p:sldMaster xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main"><p:cSld><p:spTree><p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr/></p:spTree></p:cSld></p:sldMaster>"#;

const LAYOUT_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<p:sldLayout xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main"><p:cSld><p:spTree><p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr/></p:spTree></p:cSld></p:sldLayout>"#;

const THEME_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<a:theme xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" name="Office Theme"><a:themeElements/></a:theme>"#;

/// A minimal extracted presentation in a temporary directory.
///
/// Relationship ids are unique across the whole package: `rId1` for the
/// package, `rId2`/`rId3` for master and theme, `rId(10 + i)` for the
/// presentation's slide references and `rId(100 + 2i)`/`rId(101 + 2i)` for
/// slide `i`'s layout and theme. Slide `i` holds one title shape with id
/// `10 * i`.
pub struct PackageFixture {
    root: TempDir,
}

impl PackageFixture {
    /// Package with masters, layouts and a theme but no slides.
    pub fn empty() -> Self {
        Self::with_slides(0)
    }

    pub fn with_slides(count: u32) -> Self {
        let fixture = Self {
            root: tempfile::tempdir().unwrap(),
        };
        let dir = fixture.dir();

        let mut manifest = ContentTypes::new();
        manifest.ensure_default("rels", content_type::OPC_RELATIONSHIPS);
        manifest.ensure_default("xml", content_type::XML);
        let presentation = PackURI::new(part_name::PRESENTATION).unwrap();
        manifest.ensure_override(&presentation, content_type::PML_PRESENTATION_MAIN);
        for (name, ct, body) in [
            ("/ppt/slideMasters/slideMaster1.xml", content_type::PML_SLIDE_MASTER, MASTER_XML),
            ("/ppt/slideLayouts/slideLayout1.xml", content_type::PML_SLIDE_LAYOUT, LAYOUT_XML),
            ("/ppt/slideLayouts/slideLayout2.xml", content_type::PML_SLIDE_LAYOUT, LAYOUT_XML),
            ("/ppt/theme/theme1.xml", content_type::OFC_THEME, THEME_XML),
        ] {
            let uri = PackURI::new(name).unwrap();
            manifest.ensure_override(&uri, ct);
            dir.write_bytes(&uri, body.as_bytes()).unwrap();
        }

        let mut package_rels = Relationships::new(PackURI::package());
        package_rels.push(Relationship::new(
            RelationshipId::from_number(1),
            relationship_type::OFFICE_DOCUMENT,
            "ppt/presentation.xml",
        ));
        dir.write_rels(&package_rels).unwrap();

        let mut presentation_rels = Relationships::new(presentation.clone());
        presentation_rels.push(Relationship::new(
            RelationshipId::from_number(2),
            relationship_type::SLIDE_MASTER,
            "slideMasters/slideMaster1.xml",
        ));
        presentation_rels.push(Relationship::new(
            RelationshipId::from_number(3),
            relationship_type::THEME,
            "theme/theme1.xml",
        ));

        let mut entries = String::new();
        for i in 1..=count {
            let slide_rel = RelationshipId::from_number(10 + i);
            entries.push_str(&format!(r#"<p:sldId id="{}" r:id="{}"/>"#, 255 + i, slide_rel));
            presentation_rels.push(Relationship::new(
                slide_rel,
                relationship_type::SLIDE,
                format!("slides/slide{}.xml", i),
            ));

            let mut slide_rels = Relationships::new(PackURI::slide(i));
            slide_rels.push(Relationship::new(
                RelationshipId::from_number(100 + 2 * i),
                relationship_type::SLIDE_LAYOUT,
                "../slideLayouts/slideLayout1.xml",
            ));
            slide_rels.push(Relationship::new(
                RelationshipId::from_number(101 + 2 * i),
                relationship_type::THEME,
                "../theme/theme1.xml",
            ));
            dir.write_rels(&slide_rels).unwrap();
            fixture.write_slide(i, &titled_slide(ShapeId::new(10 * i).unwrap(), &format!("Slide {}", i)));
            manifest.ensure_override(&PackURI::slide(i), content_type::PML_SLIDE);
        }
        dir.write_rels(&presentation_rels).unwrap();
        dir.write_bytes(
            &presentation,
            PRESENTATION_XML.replace("{entries}", &entries).as_bytes(),
        )
        .unwrap();
        dir.write_xml(&PackURI::new(part_name::CONTENT_TYPES).unwrap(), manifest.document())
            .unwrap();
        fixture
    }

    pub fn dir(&self) -> PackageDir {
        PackageDir::open(self.root.path()).unwrap()
    }

    /// Write a slide part without touching rels, manifest or slide list.
    pub fn write_slide(&self, index: u32, doc: &XmlDocument) {
        self.dir().write_xml(&PackURI::slide(index), doc).unwrap();
    }
}

fn titled_slide(id: ShapeId, title: &str) -> XmlDocument {
    let mut doc = blank_slide_document();
    if let Some(tree) = shape_tree_mut(doc.root_mut()) {
        tree.push_child(placeholder_shape(id, "Title 1", Some("title"), None, &[title]));
    }
    doc
}

/// Slide whose shapes carry the given raw id tokens.
pub fn slide_with_shapes(ids: &[&str]) -> XmlDocument {
    let mut doc = blank_slide_document();
    if let Some(tree) = shape_tree_mut(doc.root_mut()) {
        for (n, token) in ids.iter().enumerate() {
            let mut shape = placeholder_shape(ShapeId::MIN, &format!("Shape {}", n + 1), None, None, &[]);
            if let Some(cnvpr) = shape.find_mut("cNvPr") {
                cnvpr.set_attr("id", token);
            }
            tree.push_child(shape);
        }
    }
    doc
}

/// Slide with one shape per id in `shapes` and one click trigger per entry
/// of `targets`, each fading in that shape id.
pub fn animated_slide(shapes: &[u32], targets: &[u32]) -> XmlDocument {
    let tokens: Vec<String> = shapes.iter().map(u32::to_string).collect();
    let tokens: Vec<&str> = tokens.iter().map(String::as_str).collect();
    let mut doc = slide_with_shapes(&tokens);
    for target in targets {
        let trigger = create_click_trigger(&mut doc).unwrap();
        let spec = EffectSpec::new(ShapeId::new(*target).unwrap(), AnimationEffect::Fade);
        bind_effect(&mut doc, trigger, &spec, 500).unwrap();
    }
    doc
}
