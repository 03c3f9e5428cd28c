//! A laid-out block graph and the canvas it is drawn on.

use std::path::{Path, PathBuf};

use eyre::{eyre, Context, Result};
use flow_graph::{BlockGraph, ForceConfig, Scene, Simulation, TransactionRecord, Viewport};

/// Ticks simulated while a drag gesture holds a node at its new position.
pub const DRAG_TICKS: usize = 60;

/// Output surface for rendered SVG documents.
pub trait Canvas: Send + Sync {
    /// Replace whatever the canvas shows with `svg`.
    fn present(&mut self, svg: &str) -> Result<()>;
}

/// Canvas backed by a single SVG file, overwritten on every present.
#[derive(Clone, Debug)]
pub struct FileCanvas {
    path: PathBuf,
}

impl FileCanvas {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Canvas for FileCanvas {
    fn present(&mut self, svg: &str) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .wrap_err_with(|| format!("failed to create {}", parent.display()))?;
        }
        std::fs::write(&self.path, svg)
            .wrap_err_with(|| format!("failed to write {}", self.path.display()))
    }
}

/// Graph, simulation and scene for one block.
pub struct Layout {
    block_number: u64,
    graph: BlockGraph,
    simulation: Simulation,
    scene: Scene,
    viewport: Viewport,
}

impl Layout {
    pub fn new(block_number: u64, records: &[TransactionRecord], viewport: Viewport) -> Self {
        let graph = BlockGraph::build(records);
        let simulation = Simulation::new(&graph, ForceConfig::viewer(viewport.width, viewport.height));
        let scene = Scene::new(&graph).with_caption(format!(
            "Block {block_number} · {} addresses · {} transactions",
            graph.node_count(),
            graph.link_count()
        ));
        Self {
            block_number,
            graph,
            simulation,
            scene,
            viewport,
        }
    }

    /// Run the simulation until it cools, redrawing after every tick.
    pub fn settle(&mut self) -> usize {
        let scene = &mut self.scene;
        self.simulation.run(|sim| scene.redraw(sim))
    }

    /// Drag `address` to `(x, y)`, hold it there for [`DRAG_TICKS`], release
    /// it and let the layout settle again.
    pub fn drag(&mut self, address: &str, x: f64, y: f64) -> Result<()> {
        let index = self
            .graph
            .index_of(address)
            .ok_or_else(|| eyre!("address {address} is not in block {}", self.block_number))?;

        self.simulation.drag_start(index)?;
        self.simulation.drag_to(index, x, y)?;
        let scene = &mut self.scene;
        self.simulation.run_ticks(DRAG_TICKS, |sim| scene.redraw(sim));
        self.simulation.drag_end(index)?;
        self.settle();
        Ok(())
    }

    pub fn block_number(&self) -> u64 {
        self.block_number
    }

    pub fn graph(&self) -> &BlockGraph {
        &self.graph
    }

    pub fn simulation(&self) -> &Simulation {
        &self.simulation
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn to_svg(&self) -> String {
        self.scene.to_svg(&self.viewport)
    }
}
