//! Visual primitives bound to the simulation and their SVG rendering.
//!
//! A [`Scene`] holds one circle per node and one line per link. Calling
//! [`Scene::redraw`] after each tick copies node positions into the circles
//! and recomputes every line from its endpoints' positions.

use std::fmt::Write as _;

use crate::builder::{BlockGraph, Group};
use crate::simulation::Simulation;

pub const NODE_RADIUS: f64 = 8.0;
const LINK_STROKE: &str = "black";

/// Drawing surface size in SVG user units.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1600.0,
            height: 1000.0,
        }
    }
}

impl Viewport {
    pub fn center(&self) -> (f64, f64) {
        (self.width / 2.0, self.height / 2.0)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Circle {
    pub id: String,
    pub group: Group,
    pub cx: f64,
    pub cy: f64,
    pub r: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Line {
    pub source: usize,
    pub target: usize,
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Scene {
    circles: Vec<Circle>,
    lines: Vec<Line>,
    caption: Option<String>,
    error: Option<String>,
}

impl Scene {
    pub fn new(graph: &BlockGraph) -> Self {
        let circles = graph
            .nodes()
            .map(|node| Circle {
                id: node.id.clone(),
                group: node.group,
                cx: 0.0,
                cy: 0.0,
                r: NODE_RADIUS,
            })
            .collect();
        let lines = graph
            .link_endpoints()
            .into_iter()
            .map(|(source, target)| Line {
                source,
                target,
                x1: 0.0,
                y1: 0.0,
                x2: 0.0,
                y2: 0.0,
            })
            .collect();

        Self {
            circles,
            lines,
            caption: None,
            error: None,
        }
    }

    /// A canvas holding nothing but an error message.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Self::default()
        }
    }

    pub fn with_caption(mut self, caption: impl Into<String>) -> Self {
        self.caption = Some(caption.into());
        self
    }

    pub fn circles(&self) -> &[Circle] {
        &self.circles
    }

    pub fn lines(&self) -> &[Line] {
        &self.lines
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Apply the simulation's current positions.
    pub fn redraw(&mut self, simulation: &Simulation) {
        let bodies = simulation.bodies();
        for (circle, body) in self.circles.iter_mut().zip(bodies) {
            circle.cx = body.x;
            circle.cy = body.y;
        }
        for line in &mut self.lines {
            if let (Some(s), Some(t)) = (bodies.get(line.source), bodies.get(line.target)) {
                line.x1 = s.x;
                line.y1 = s.y;
                line.x2 = t.x;
                line.y2 = t.y;
            }
        }
    }

    /// Render a standalone SVG document.
    pub fn to_svg(&self, viewport: &Viewport) -> String {
        let mut svg = String::new();
        let _ = writeln!(
            svg,
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
            w = viewport.width,
            h = viewport.height,
        );

        if let Some(message) = &self.error {
            let (cx, cy) = viewport.center();
            let _ = writeln!(
                svg,
                r#"  <text x="{cx}" y="{cy}" text-anchor="middle" fill="crimson" font-family="sans-serif" font-size="20">{}</text>"#,
                escape_xml(message),
            );
            svg.push_str("</svg>\n");
            return svg;
        }

        svg.push_str(concat!(
            "  <defs>\n",
            r#"    <marker id="arrow" viewBox="0 -5 10 10" refX="18" refY="0" markerWidth="6" markerHeight="6" orient="auto">"#,
            "\n",
            r#"      <path d="M0,-5L10,0L0,5" fill="black"/>"#,
            "\n    </marker>\n  </defs>\n",
        ));

        if let Some(caption) = &self.caption {
            let _ = writeln!(
                svg,
                r#"  <text x="16" y="28" font-family="sans-serif" font-size="18">{}</text>"#,
                escape_xml(caption),
            );
        }

        let _ = writeln!(svg, r#"  <g stroke="{LINK_STROKE}" stroke-opacity="0.6">"#);
        for line in &self.lines {
            let _ = writeln!(
                svg,
                r#"    <line x1="{:.2}" y1="{:.2}" x2="{:.2}" y2="{:.2}" marker-end="url(#arrow)"/>"#,
                line.x1, line.y1, line.x2, line.y2,
            );
        }
        svg.push_str("  </g>\n");

        svg.push_str("  <g stroke=\"white\" stroke-width=\"1.5\">\n");
        for circle in &self.circles {
            let _ = writeln!(
                svg,
                r#"    <circle cx="{:.2}" cy="{:.2}" r="{}" fill="{}"><title>{} ({})</title></circle>"#,
                circle.cx,
                circle.cy,
                circle.r,
                group_fill(circle.group),
                escape_xml(&circle.id),
                circle.group,
            );
        }
        svg.push_str("  </g>\n</svg>\n");
        svg
    }
}

fn group_fill(group: Group) -> &'static str {
    match group {
        Group::From => "steelblue",
        Group::To => "darkorange",
    }
}

fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
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
