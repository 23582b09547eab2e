//! XML persistence of the source and destination quads
//!
//! Layout:
//!
//! ```xml
//! <quadwarp>
//!   <src>
//!     <point x="0" y="0"/> ... (4 points, corner order)
//!   </src>
//!   <dst> ... </dst>
//! </quadwarp>
//! ```

use quick_xml::{
    events::{BytesDecl, BytesEnd, BytesStart, Event},
    Writer,
};
use roxmltree::{Document, Node};
use std::io::Cursor;
use std::path::Path;

use crate::editor::QuadEditor;
use crate::error::{QuadWarpError, Result};
use crate::geometry::{Corner, Point, Quad};

pub const DEFAULT_FILE_NAME: &str = "quadwarp.xml";

const ROOT: &str = "quadwarp";
const SRC: &str = "src";
const DST: &str = "dst";
const POINT: &str = "point";

/// Persisted pair of quads
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuadWarpDocument {
    pub src: Quad,
    pub dst: Quad,
}

impl QuadWarpDocument {
    pub fn to_xml(&self) -> Result<String> {
        let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);

        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
        writer.write_event(Event::Start(BytesStart::new(ROOT)))?;
        write_quad(&mut writer, SRC, &self.src)?;
        write_quad(&mut writer, DST, &self.dst)?;
        writer.write_event(Event::End(BytesEnd::new(ROOT)))?;

        String::from_utf8(writer.into_inner().into_inner())
            .map_err(|e| QuadWarpError::MalformedDocument(e.to_string()))
    }

    /// Parse `xml`, starting from `base`: corners without a `point` element
    /// keep their `base` position and points past the fourth are ignored.
    pub fn parse(xml: &str, base: QuadWarpDocument) -> Result<Self> {
        let doc = Document::parse(xml)?;
        let root = doc.root_element();
        if root.tag_name().name() != ROOT {
            return Err(QuadWarpError::MalformedDocument(format!(
                "expected root element '{}', found '{}'",
                ROOT,
                root.tag_name().name()
            )));
        }

        let src = parse_quad(&root, SRC, base.src)?;
        let dst = parse_quad(&root, DST, base.dst)?;
        Ok(Self { src, dst })
    }

    /// Read a document from disk. Every failure, including malformed
    /// content, is reported as [`QuadWarpError::PersistenceUnavailable`].
    pub fn read(path: &Path, base: QuadWarpDocument) -> Result<Self> {
        let unavailable = |reason: String| QuadWarpError::PersistenceUnavailable {
            path: path.to_path_buf(),
            reason,
        };

        let content = std::fs::read_to_string(path).map_err(|e| unavailable(e.to_string()))?;
        Self::parse(&content, base).map_err(|e| unavailable(e.to_string()))
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        let unavailable = |reason: String| QuadWarpError::PersistenceUnavailable {
            path: path.to_path_buf(),
            reason,
        };

        let content = self.to_xml()?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| unavailable(e.to_string()))?;
        }
        std::fs::write(path, content).map_err(|e| unavailable(e.to_string()))
    }
}

fn write_quad(writer: &mut Writer<Cursor<Vec<u8>>>, tag: &str, quad: &Quad) -> Result<()> {
    writer.write_event(Event::Start(BytesStart::new(tag)))?;
    for p in quad.points() {
        let mut point = BytesStart::new(POINT);
        point.push_attribute(("x", p.x.to_string().as_str()));
        point.push_attribute(("y", p.y.to_string().as_str()));
        writer.write_event(Event::Empty(point))?;
    }
    writer.write_event(Event::End(BytesEnd::new(tag)))?;
    Ok(())
}

fn parse_quad(root: &Node, tag: &'static str, base: Quad) -> Result<Quad> {
    let node = root
        .children()
        .find(|n| n.is_element() && n.tag_name().name() == tag)
        .ok_or_else(|| QuadWarpError::MalformedDocument(format!("missing <{tag}> element")))?;

    let mut quad = base;
    let points = node
        .children()
        .filter(|n| n.is_element() && n.tag_name().name() == POINT);
    for (corner, point) in Corner::ALL.iter().zip(points) {
        let p = Point::new(coordinate(&point, "x")?, coordinate(&point, "y")?);
        quad.set(*corner, p);
    }
    Ok(quad)
}

fn coordinate(node: &Node, attr: &'static str) -> Result<f64> {
    let raw = node.attribute(attr).ok_or_else(|| {
        QuadWarpError::MalformedDocument(format!("point is missing attribute '{attr}'"))
    })?;
    raw.trim().parse::<f64>().map_err(|_| {
        QuadWarpError::MalformedDocument(format!("invalid value for '{attr}': {raw:?}"))
    })
}

impl QuadEditor {
    pub fn document(&self) -> QuadWarpDocument {
        QuadWarpDocument {
            src: self.source(),
            dst: self.destination(),
        }
    }

    /// Write source and destination quads to `path`
    pub fn save(&self, path: &Path) -> Result<()> {
        self.document().write(path)?;
        tracing::info!("Saved quad warp to {:?}", path);
        Ok(())
    }

    /// Load quads from `path`; on any failure the editor is left untouched
    pub fn load(&mut self, path: &Path) -> Result<()> {
        let doc = QuadWarpDocument::read(path, self.document())?;
        self.restore(doc.src, doc.dst);
        tracing::info!("Loaded quad warp from {:?}", path);
        Ok(())
    }
}
