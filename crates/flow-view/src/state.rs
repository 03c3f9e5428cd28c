//! Viewer navigation state and its persisted cursor.

use std::sync::Arc;

use eyre::Result;
use flow_data::store::Store;

/// Block shown when nothing has been persisted yet.
pub const DEFAULT_BLOCK: u64 = 19_258_329;

/// Key of the persisted current block.
pub const CURSOR_KEY: &str = "current_block";

/// Read/write capability for the persisted current block.
///
/// The value is stored as a decimal string.
pub trait CursorStore: Send {
    fn read(&self) -> Result<Option<String>>;
    fn write(&mut self, value: &str) -> Result<()>;
}

/// Cursor kept in the SQLite `viewer_state` table.
pub struct SqliteCursor {
    store: Arc<Store>,
}

impl SqliteCursor {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }
}

impl CursorStore for SqliteCursor {
    fn read(&self) -> Result<Option<String>> {
        self.store.get_state(CURSOR_KEY)
    }

    fn write(&mut self, value: &str) -> Result<()> {
        self.store.set_state(CURSOR_KEY, value)
    }
}

/// Cursor that lives only as long as the process.
#[derive(Clone, Debug, Default)]
pub struct MemoryCursor {
    value: Option<String>,
}

impl MemoryCursor {
    pub fn with_value(value: impl Into<String>) -> Self {
        Self {
            value: Some(value.into()),
        }
    }
}

impl CursorStore for MemoryCursor {
    fn read(&self) -> Result<Option<String>> {
        Ok(self.value.clone())
    }

    fn write(&mut self, value: &str) -> Result<()> {
        self.value = Some(value.to_string());
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Navigation {
    Previous,
    Next,
    Goto(u64),
}

/// The block the viewer is on, mirrored to its [`CursorStore`].
pub struct ViewerState {
    current_block: u64,
    cursor: Box<dyn CursorStore>,
}

impl ViewerState {
    /// Read the persisted block once, falling back to [`DEFAULT_BLOCK`] when
    /// it is absent or unreadable.
    pub fn load(cursor: Box<dyn CursorStore>) -> Result<Self> {
        let current_block = match cursor.read()? {
            Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
                tracing::warn!(value = %raw, "persisted block is not a number, using default");
                DEFAULT_BLOCK
            }),
            None => DEFAULT_BLOCK,
        };
        tracing::debug!(current_block, "viewer state loaded");
        Ok(Self {
            current_block,
            cursor,
        })
    }

    pub fn current_block(&self) -> u64 {
        self.current_block
    }

    /// Move the cursor and persist it. Returns the new block number.
    pub fn navigate(&mut self, navigation: Navigation) -> Result<u64> {
        let next = match navigation {
            Navigation::Previous => self.current_block.saturating_sub(1),
            Navigation::Next => self.current_block.saturating_add(1),
            Navigation::Goto(block) => block,
        };
        self.cursor.write(&next.to_string())?;
        self.current_block = next;
        Ok(next)
    }
}
