//! The session controller: loads an archive into a surface and drives navigation.
//!
//! ```text
//! Idle -> Loading -> Ready <-> Navigating
//!           |          |
//!           v          v
//!          Idle     TornDown
//! ```
//!
//! Loads are tagged with a generation number. Decoding runs without holding the render
//! lock, so a newer load can start while an older one is still extracting; the older
//! one then notices its generation is stale and gives up without touching the origin.
//! Everything that writes to the surface or the origin holds the render lock, which
//! serializes renders and queues navigations behind them.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use tracing::{debug, error, info, warn};

use crate::config::FrameConfig;
use crate::error::{FrameError, LoadOutcome};
use crate::handle::HandleRegistry;
use crate::intercept::{self, InterceptorGuard};
use crate::loader::{ArchiveDecoder, ArchiveLoader, LoadedArchive};
use crate::origin::VirtualOrigin;
use crate::rewrite::{self, DocumentRewriter, RewriteReport};
use crate::store::ContentStore;
use crate::surface::{ExecutionContext, Surface};
use crate::zip::ZipDecoder;
use crate::{mime, path};

/// Placeholder shown while an archive is being extracted.
pub const LOADING_DOCUMENT: &str = "<html><head></head><body>Loading...</body></html>";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Loading,
    Ready,
    Navigating,
    TornDown,
}

struct Runtime {
    state: SessionState,
    interceptor: Option<InterceptorGuard>,
    current: Option<String>,
    history: Vec<String>,
    report: Option<RewriteReport>,
    unload_registered: bool,
}

/// State reachable from the surface's unload listener.
struct Shared {
    origin: Arc<VirtualOrigin>,
    generation: AtomicU64,
    runtime: Mutex<Runtime>,
}

impl Shared {
    fn runtime(&self) -> MutexGuard<'_, Runtime> {
        self.runtime
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn set_state(&self, state: SessionState) {
        self.runtime().state = state;
    }

    /// Drop everything tied to the current load and move to `next`.
    ///
    /// Returns the number of handles released.
    fn reset(&self, context: &ExecutionContext, next: SessionState) -> usize {
        let guard = {
            let mut runtime = self.runtime();
            runtime.state = next;
            runtime.current = None;
            runtime.history.clear();
            runtime.report = None;
            runtime.interceptor.take()
        };
        if let Some(guard) = guard {
            guard.restore(context);
        }
        self.origin.clear();
        self.origin.handles().release_all()
    }

    fn tear_down(&self, context: &ExecutionContext) -> usize {
        // Any load still extracting belongs to the surface that just went away
        self.generation.fetch_add(1, Ordering::SeqCst);
        let released = self.reset(context, SessionState::TornDown);
        info!(origin = self.origin.id(), released, "session torn down");
        released
    }
}

/// Renders archives into one surface.
pub struct Session<S: Surface + 'static> {
    shared: Arc<Shared>,
    surface: Arc<S>,
    config: FrameConfig,
    decoder: Arc<dyn ArchiveDecoder>,
    render_lock: tokio::sync::Mutex<()>,
}

impl<S: Surface + 'static> Session<S> {
    pub fn new(surface: Arc<S>) -> Self {
        Self::with_config(surface, FrameConfig::default())
    }

    pub fn with_config(surface: Arc<S>, config: FrameConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                origin: Arc::new(VirtualOrigin::new()),
                generation: AtomicU64::new(0),
                runtime: Mutex::new(Runtime {
                    state: SessionState::Idle,
                    interceptor: None,
                    current: None,
                    history: Vec::new(),
                    report: None,
                    unload_registered: false,
                }),
            }),
            surface,
            config,
            decoder: Arc::new(ZipDecoder),
            render_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Use a different archive format.
    pub fn with_decoder(mut self, decoder: impl ArchiveDecoder + 'static) -> Self {
        self.decoder = Arc::new(decoder);
        self
    }

    pub fn surface(&self) -> &Arc<S> {
        &self.surface
    }

    pub fn origin(&self) -> &Arc<VirtualOrigin> {
        &self.shared.origin
    }

    /// Handles issued for the rendered documents; the host dereferences them here.
    pub fn handles(&self) -> &HandleRegistry {
        self.shared.origin.handles()
    }

    pub fn state(&self) -> SessionState {
        self.shared.runtime().state
    }

    pub fn base_path(&self) -> String {
        self.shared.origin.base_path()
    }

    pub fn store(&self) -> Arc<ContentStore> {
        self.shared.origin.store()
    }

    /// Store key of the document currently shown.
    pub fn current_document(&self) -> Option<String> {
        self.shared.runtime().current.clone()
    }

    /// Rewrite report of the document currently shown.
    pub fn last_report(&self) -> Option<RewriteReport> {
        self.shared.runtime().report.clone()
    }

    pub fn outstanding_handles(&self) -> usize {
        self.shared.origin.handles().outstanding()
    }

    /// Load an archive into the surface and report the outcome.
    pub async fn load_archive(&self, bytes: impl Into<Arc<[u8]>>) -> LoadOutcome {
        LoadOutcome::from(&self.try_load(bytes).await)
    }

    /// Load an archive into the surface, returning the store key of the rendered document.
    pub async fn try_load(&self, bytes: impl Into<Arc<[u8]>>) -> Result<String, FrameError> {
        let bytes: Arc<[u8]> = bytes.into();
        if bytes.is_empty() {
            return Err(FrameError::InvalidInput("archive is empty".to_string()));
        }
        if !self.decoder.recognizes(&bytes) {
            return Err(FrameError::InvalidInput(
                "input is not a supported archive".to_string(),
            ));
        }

        let generation = self.shared.generation.fetch_add(1, Ordering::SeqCst) + 1;
        {
            let _render = self.render_lock.lock().await;
            self.shared.reset(self.surface.context(), SessionState::Loading);
            self.surface.write_document(LOADING_DOCUMENT);
        }
        info!(generation, size = bytes.len(), "loading archive");

        let staged = self.stage(bytes).await;

        let _render = self.render_lock.lock().await;
        if self.shared.generation.load(Ordering::SeqCst) != generation {
            debug!(generation, "abandoning stale load");
            return Err(match self.state() {
                SessionState::TornDown => FrameError::TornDown,
                _ => FrameError::Superseded,
            });
        }

        match staged.and_then(|archive| self.commit(archive)) {
            Ok(path) => Ok(path),
            Err(err) => {
                self.fail(&err);
                Err(err)
            }
        }
    }

    /// Navigate to `reference`, resolved against the current base path.
    ///
    /// Queues behind a render in flight. A target that is not in the store is reported
    /// and leaves the current document in place.
    pub async fn navigate(&self, reference: &str) -> Result<String, FrameError> {
        let _render = self.render_lock.lock().await;
        self.ensure_ready()?;

        let target = self.navigation_target(reference)?;
        let previous = self.shared.runtime().current.clone();
        self.shared.set_state(SessionState::Navigating);
        let rendered = self.render(&target);
        self.shared.set_state(SessionState::Ready);
        rendered?;

        if let Some(previous) = previous {
            self.shared.runtime().history.push(previous);
        }
        Ok(target)
    }

    /// Follow a disarmed in-store link by its store key.
    pub async fn follow_link(&self, key: &str) -> Result<String, FrameError> {
        self.navigate(&format!("/{}", key.trim_start_matches('/')))
            .await
    }

    /// Return to the previously shown document. `Ok(None)` when there is no history.
    pub async fn back(&self) -> Result<Option<String>, FrameError> {
        let _render = self.render_lock.lock().await;
        self.ensure_ready()?;

        let Some(target) = self.shared.runtime().history.last().cloned() else {
            return Ok(None);
        };
        self.shared.set_state(SessionState::Navigating);
        let rendered = self.render(&target);
        self.shared.set_state(SessionState::Ready);
        rendered?;

        self.shared.runtime().history.pop();
        Ok(Some(target))
    }

    /// Release every handle, restore the surface's primitives and clear the store.
    ///
    /// Runs automatically when the surface unloads. Returns the number of handles
    /// released.
    pub fn tear_down(&self) -> usize {
        self.shared.tear_down(self.surface.context())
    }

    async fn stage(&self, bytes: Arc<[u8]>) -> Result<LoadedArchive, FrameError> {
        let entries = self
            .decoder
            .decode(bytes)
            .await
            .map_err(FrameError::decode)?;
        ArchiveLoader::new(&self.config.entry_document)
            .load(entries)
            .await
    }

    /// Publish a staged archive and render its entry document. Caller holds the render lock.
    fn commit(&self, archive: LoadedArchive) -> Result<String, FrameError> {
        let LoadedArchive { store, entry_path } = archive;
        let files = store.len();
        self.shared.origin.replace_store(store);
        info!(files, entry = %entry_path, "archive extracted");

        let target = self.redirect_target(&entry_path);
        if !self.shared.origin.store().has(&target) {
            return Err(FrameError::ResourceNotFound(target));
        }

        // Only once the document is known to resolve; a failed render below undoes it
        if let Some(guard) = intercept::install(self.surface.context(), &self.shared.origin) {
            self.shared.runtime().interceptor = Some(guard);
        }
        self.render(&target)?;

        let register = {
            let mut runtime = self.shared.runtime();
            runtime.state = SessionState::Ready;
            !std::mem::replace(&mut runtime.unload_registered, true)
        };
        if register {
            let shared: Weak<Shared> = Arc::downgrade(&self.shared);
            self.surface.on_unload(Box::new(move |context: &ExecutionContext| {
                if let Some(shared) = shared.upgrade() {
                    shared.tear_down(context);
                    // Listeners fire once; the next load registers a new one
                    shared.runtime().unload_registered = false;
                }
            }));
        }
        Ok(target)
    }

    /// Rewrite and write the document stored under `target`, then make its directory the
    /// base path. Caller holds the render lock.
    fn render(&self, target: &str) -> Result<(), FrameError> {
        let store = self.shared.origin.store();
        let document = store
            .get(target)
            .ok_or_else(|| FrameError::ResourceNotFound(target.to_string()))?;
        let base = path::parent_dir(target);

        let (markup, report) = if self.config.rewrite_documents {
            let outcome = DocumentRewriter::new(&store, self.shared.origin.handles(), &self.config)
                .rewrite(document.bytes(), base)
                .map_err(|err| FrameError::Render {
                    path: target.to_string(),
                    message: format!("{err:#}"),
                })?;
            (outcome.markup, outcome.report)
        } else {
            (document.text(), RewriteReport::default())
        };
        if !report.missing.is_empty() {
            warn!(
                document = target,
                missing = report.missing.len(),
                "document references resources missing from the archive"
            );
        }

        // The interceptor must see the new base before the document's own requests run
        self.shared.origin.set_base_path(base);
        info!(base, document = target, "base path changed");
        self.surface.write_document(&markup);

        let mut runtime = self.shared.runtime();
        runtime.current = Some(target.to_string());
        runtime.report = Some(report);
        Ok(())
    }

    /// The document a redirect element in the entry document points at, or the entry
    /// document itself.
    fn redirect_target(&self, entry_path: &str) -> String {
        if self.config.redirect_tag.is_empty() {
            return entry_path.to_string();
        }
        let store = self.shared.origin.store();
        let Some(entry) = store.get(entry_path) else {
            return entry_path.to_string();
        };
        let Some(src) = rewrite::find_redirect(&entry.text(), &self.config.redirect_tag) else {
            return entry_path.to_string();
        };

        match store.lookup(&src, path::parent_dir(entry_path)) {
            Some(target) => {
                info!(from = entry_path, to = target.path(), "following redirect element");
                target.path().to_string()
            }
            None => {
                warn!(entry = entry_path, src = %src, "redirect target not found in archive");
                entry_path.to_string()
            }
        }
    }

    fn navigation_target(&self, reference: &str) -> Result<String, FrameError> {
        let reference = reference.trim();
        let not_found = || {
            warn!(reference, base = %self.base_path(), "navigation target not found in archive");
            FrameError::ResourceNotFound(reference.to_string())
        };
        let target = self.shared.origin.resolve(reference).ok_or_else(not_found)?;
        if !self.shared.origin.store().has(&target) {
            return Err(not_found());
        }
        if !mime::is_document(mime::for_path(&target)) {
            return Err(FrameError::InvalidInput(format!(
                "`{target}` is not a document"
            )));
        }
        Ok(target)
    }

    fn ensure_ready(&self) -> Result<(), FrameError> {
        match self.state() {
            SessionState::Ready => Ok(()),
            SessionState::TornDown => Err(FrameError::TornDown),
            _ => Err(FrameError::InvalidInput(
                "no document is rendered".to_string(),
            )),
        }
    }

    /// Undo a failed load and show the failure in the surface. Caller holds the render lock.
    fn fail(&self, err: &FrameError) {
        error!(code = err.code(), error = %err, "archive load failed");
        self.shared.reset(self.surface.context(), SessionState::Idle);
        self.surface
            .write_document(&format!("<h1>Error</h1><p>{}</p>", escape_html(&err.to_string())));
    }
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            c => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::ArchiveEntry;
    use crate::surface::MemorySurface;
    use async_trait::async_trait;

    struct Entry(&'static str, &'static str);

    #[async_trait]
    impl ArchiveEntry for Entry {
        fn path(&self) -> &str {
            self.0
        }

        fn is_directory(&self) -> bool {
            self.0.ends_with('/')
        }

        async fn bytes(&self) -> anyhow::Result<Vec<u8>> {
            Ok(self.1.as_bytes().to_vec())
        }
    }

    /// Ignores the input bytes and always yields the same entries.
    struct Fixed(Vec<(&'static str, &'static str)>);

    #[async_trait]
    impl ArchiveDecoder for Fixed {
        async fn decode(&self, _bytes: Arc<[u8]>) -> anyhow::Result<Vec<Box<dyn ArchiveEntry>>> {
            Ok(self
                .0
                .iter()
                .map(|(path, body)| Box::new(Entry(path, body)) as Box<dyn ArchiveEntry>)
                .collect())
        }
    }

    fn session(files: Vec<(&'static str, &'static str)>) -> Session<MemorySurface> {
        Session::new(Arc::new(MemorySurface::default())).with_decoder(Fixed(files))
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html("<a href=\"x\">&</a>"),
            "&lt;a href=&quot;x&quot;&gt;&amp;&lt;/a&gt;"
        );
    }

    #[tokio::test]
    async fn test_load_shows_placeholder_then_entry() {
        let session = session(vec![("app/", ""), ("app/index.html", "<p>hi</p>")]);
        let outcome = session.load_archive(b"anything".to_vec()).await;
        assert_eq!(outcome, LoadOutcome::ok());
        assert_eq!(session.state(), SessionState::Ready);
        assert_eq!(session.base_path(), "app");

        let documents = session.surface().documents();
        assert_eq!(documents[0], LOADING_DOCUMENT);
        assert!(documents.last().unwrap().contains("<p>hi</p>"));
    }

    #[tokio::test]
    async fn test_empty_input_is_rejected_untouched() {
        let session = session(vec![("index.html", "<p>hi</p>")]);
        session.try_load(b"x".to_vec()).await.unwrap();

        let err = session.try_load(Vec::new()).await.unwrap_err();
        assert!(matches!(err, FrameError::InvalidInput(_)));
        assert_eq!(session.state(), SessionState::Ready);
        assert!(session.store().has("index.html"));
    }

    #[tokio::test]
    async fn test_redirect_element() {
        let session = session(vec![
            ("index.html", r#"<iwe src="game/main.html"></iwe>"#),
            ("game/main.html", "<p>game</p>"),
        ]);
        assert_eq!(session.try_load(b"x".to_vec()).await.unwrap(), "game/main.html");
        assert_eq!(session.base_path(), "game");
        assert!(session.surface().document().contains("<p>game</p>"));
    }

    #[tokio::test]
    async fn test_missing_redirect_target_renders_entry() {
        let session = session(vec![("index.html", r#"<p>entry</p><iwe src="gone.html"></iwe>"#)]);
        assert_eq!(session.try_load(b"x".to_vec()).await.unwrap(), "index.html");
        assert!(session.surface().document().contains("<p>entry</p>"));
    }

    #[tokio::test]
    async fn test_navigation_requires_a_document() {
        let session = session(vec![("index.html", "")]);
        assert!(matches!(
            session.navigate("index.html").await,
            Err(FrameError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_back() {
        let session = session(vec![
            ("index.html", "<p>home</p>"),
            ("a/page.html", "<p>page</p>"),
        ]);
        session.try_load(b"x".to_vec()).await.unwrap();
        assert_eq!(session.back().await.unwrap(), None);

        session.navigate("a/page.html").await.unwrap();
        assert_eq!(session.base_path(), "a");
        assert_eq!(session.back().await.unwrap().as_deref(), Some("index.html"));
        assert_eq!(session.base_path(), "");
        assert!(session.surface().document().contains("<p>home</p>"));
        assert_eq!(session.back().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_non_document_navigation_is_refused() {
        let session = session(vec![("index.html", ""), ("logo.png", "png")]);
        session.try_load(b"x".to_vec()).await.unwrap();
        assert!(session.navigate("logo.png").await.is_err());
        assert_eq!(session.current_document().as_deref(), Some("index.html"));
        assert_eq!(session.state(), SessionState::Ready);
    }
}
