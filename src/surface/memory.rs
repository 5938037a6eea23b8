//! An in-memory surface for hosts and tests.

use std::sync::{Mutex, MutexGuard};

use super::{ExecutionContext, Surface, UnloadListener};

#[derive(Default)]
struct Page {
    buffer: Option<String>,
    documents: Vec<String>,
    listeners: Vec<UnloadListener>,
    unloaded: bool,
}

/// A surface living entirely in memory.
///
/// Keeps every closed document in order, so callers can inspect both the final
/// document and whatever was shown before it.
#[derive(Default)]
pub struct MemorySurface {
    context: ExecutionContext,
    page: Mutex<Page>,
}

impl MemorySurface {
    pub fn new(context: ExecutionContext) -> Self {
        Self {
            context,
            page: Mutex::default(),
        }
    }

    /// The most recently closed document, or an empty string.
    pub fn document(&self) -> String {
        self.page().documents.last().cloned().unwrap_or_default()
    }

    /// Every closed document, oldest first.
    pub fn documents(&self) -> Vec<String> {
        self.page().documents.clone()
    }

    pub fn is_unloaded(&self) -> bool {
        self.page().unloaded
    }

    /// Tear the surface down, running every unload listener once.
    pub fn unload(&self) -> usize {
        let listeners = {
            let mut page = self.page();
            page.unloaded = true;
            std::mem::take(&mut page.listeners)
        };

        let count = listeners.len();
        for listener in listeners {
            listener(&self.context);
        }
        count
    }

    fn page(&self) -> MutexGuard<'_, Page> {
        self.page.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Surface for MemorySurface {
    fn context(&self) -> &ExecutionContext {
        &self.context
    }

    fn open(&self) {
        let mut page = self.page();
        page.buffer = Some(String::new());
        page.unloaded = false;
    }

    fn write(&self, markup: &str) {
        let mut page = self.page();
        // Writing without an explicit open implicitly opens, as a document sink does
        page.buffer.get_or_insert_with(String::new).push_str(markup);
    }

    fn close(&self) {
        let mut page = self.page();
        if let Some(document) = page.buffer.take() {
            page.documents.push(document);
        }
    }

    fn on_unload(&self, listener: UnloadListener) {
        self.page().listeners.push(listener);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_write_document() {
        let surface = MemorySurface::default();
        surface.write_document("<p>one</p>");
        surface.open();
        surface.write("<p>");
        surface.write("two</p>");
        assert_eq!(surface.document(), "<p>one</p>");
        surface.close();
        assert_eq!(surface.document(), "<p>two</p>");
        assert_eq!(surface.documents().len(), 2);
    }

    #[test]
    fn test_unload_runs_listeners_once() {
        let surface = MemorySurface::default();
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = runs.clone();
        surface.on_unload(Box::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        assert_eq!(surface.unload(), 1);
        assert_eq!(surface.unload(), 0);
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert!(surface.is_unloaded());
    }
}
