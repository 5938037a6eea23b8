//! Rewriting a document's resource references into resource handles before it is
//! written into a surface.
//!
//! Three passes run over the document's start tags:
//!
//! - resource-bearing attributes (`src`, `href`, ...) that resolve into the store are
//!   replaced by handle URLs; references that do not resolve are left alone and reported;
//! - anchors pointing at in-store documents are disarmed and tagged with
//!   [`NAV_ATTRIBUTE`] so the host can route the click back into the session;
//! - inline scripts get quoted string literals naming store paths replaced by handle
//!   URLs.
//!
//! Edits are spliced into the original text at the byte ranges [`markup`] reports, so
//! markup the passes do not touch is written out unchanged.
//!
//! The script pass is purely textual. A path assembled at runtime (`"img/" + name`) is
//! never seen here; requests for it are answered by the interceptor instead.

pub mod markup;

use std::sync::LazyLock;

use anyhow::{Context, Result};
use regex::{Captures, Regex};
use tracing::{debug, warn};

use crate::config::FrameConfig;
use crate::handle::HandleRegistry;
use crate::store::ContentStore;
use crate::{mime, path};

use markup::{Edit, StartTag};

/// Attribute carrying the store key of a disarmed in-store anchor.
pub const NAV_ATTRIBUTE: &str = "data-zipframe-nav";

static STRING_LITERAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""([^"\\\r\n]*)"|'([^'\\\r\n]*)'|`([^`\\]*)`"#)
        .expect("string literal pattern is valid")
});

/// What a rewrite changed, and what it could not resolve.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RewriteReport {
    /// Attributes replaced with handle URLs.
    pub rewritten: usize,
    /// String literals replaced inside inline scripts.
    pub scripts_rewritten: usize,
    /// References left untouched because nothing in the store matched them.
    pub missing: Vec<String>,
    /// Store keys of in-store documents linked from disarmed anchors.
    pub links: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct RewriteOutcome {
    pub markup: String,
    pub report: RewriteReport,
}

pub struct DocumentRewriter<'a> {
    store: &'a ContentStore,
    handles: &'a HandleRegistry,
    config: &'a FrameConfig,
}

impl<'a> DocumentRewriter<'a> {
    pub fn new(
        store: &'a ContentStore,
        handles: &'a HandleRegistry,
        config: &'a FrameConfig,
    ) -> Self {
        Self {
            store,
            handles,
            config,
        }
    }

    /// Rewrite a stored document against the directory `base`. The document must be
    /// valid UTF-8.
    pub fn rewrite(&self, document: &[u8], base: &str) -> Result<RewriteOutcome> {
        let markup = std::str::from_utf8(document).context("document is not valid UTF-8")?;
        Ok(self.rewrite_markup(markup, base))
    }

    /// Rewrite `markup` against the directory `base`.
    pub fn rewrite_markup(&self, markup: &str, base: &str) -> RewriteOutcome {
        let mut report = RewriteReport::default();
        let mut edits = Vec::new();

        for tag in markup::start_tags(markup) {
            self.rewrite_attributes(&tag, base, &mut edits, &mut report);
            if tag.name == "script" && self.config.rewrite_inline_scripts {
                self.rewrite_script(markup, &tag, base, &mut edits, &mut report);
            }
        }

        RewriteOutcome {
            markup: markup::splice(markup, edits),
            report,
        }
    }

    fn rewrite_attributes(
        &self,
        tag: &StartTag<'_>,
        base: &str,
        edits: &mut Vec<Edit>,
        report: &mut RewriteReport,
    ) {
        let name = tag.name.as_str();
        let is_anchor = name == "a" || name == "area";

        for attribute in &tag.attributes {
            if !self.is_resource_attribute(attribute.name) {
                continue;
            }
            let Some(value) = &attribute.value else {
                continue;
            };
            let decoded = markup::decode_attribute(value.raw);
            let reference = decoded.trim();
            if skip_reference(reference) {
                continue;
            }

            match self.store.lookup(reference, base) {
                Some(resource) if is_anchor && mime::is_document(resource.content_type()) => {
                    debug!(element = name, reference, path = resource.path(), "disarmed in-store link");
                    edits.push(Edit::replace(value.span.clone(), "#"));
                    if tag.attribute(NAV_ATTRIBUTE).is_none() {
                        edits.push(Edit::insert(
                            attribute.end,
                            format!(
                                " {NAV_ATTRIBUTE}=\"{}\"",
                                markup::escape_attribute(resource.path())
                            ),
                        ));
                    }
                    report.links.push(resource.path().to_string());
                }
                Some(resource) => {
                    let url = self.handles.issue(resource);
                    debug!(element = name, attribute = attribute.name, reference, url = %url, "rewrote resource reference");
                    edits.push(Edit::replace(value.span.clone(), url));
                    report.rewritten += 1;
                }
                None => {
                    warn!(element = name, attribute = attribute.name, reference, base, "resource not found in archive");
                    report.missing.push(reference.to_string());
                }
            }
        }
    }

    fn rewrite_script(
        &self,
        markup: &str,
        tag: &StartTag<'_>,
        base: &str,
        edits: &mut Vec<Edit>,
        report: &mut RewriteReport,
    ) {
        if tag.attribute("src").is_some() {
            return;
        }
        let Some(body) = tag.body.clone() else {
            return;
        };
        let (substituted, count) = self.substitute_literals(&markup[body.clone()], base);
        if count > 0 {
            edits.push(Edit::replace(body, substituted));
            report.scripts_rewritten += count;
        }
    }

    /// Replace every quoted literal naming a store path with that path's handle URL,
    /// keeping the original quote character.
    fn substitute_literals(&self, code: &str, base: &str) -> (String, usize) {
        let mut count = 0;
        let substituted = STRING_LITERAL.replace_all(code, |caps: &Captures<'_>| {
            let (quote, literal) = match (caps.get(1), caps.get(2), caps.get(3)) {
                (Some(m), _, _) => ('"', m.as_str()),
                (_, Some(m), _) => ('\'', m.as_str()),
                (_, _, Some(m)) => ('`', m.as_str()),
                _ => return caps[0].to_string(),
            };
            if skip_reference(literal) {
                return caps[0].to_string();
            }
            match self.store.lookup(literal, base) {
                Some(resource) => {
                    count += 1;
                    let url = self.handles.issue(resource);
                    debug!(literal, url = %url, "rewrote inline script literal");
                    format!("{quote}{url}{quote}")
                }
                None => caps[0].to_string(),
            }
        });
        (substituted.into_owned(), count)
    }

    fn is_resource_attribute(&self, key: &str) -> bool {
        self.config
            .resource_attributes
            .iter()
            .any(|attribute| attribute.eq_ignore_ascii_case(key))
    }
}

/// Look for a redirect element (`<iwe src="...">`) and return its target as written.
pub fn find_redirect(markup: &str, tag: &str) -> Option<String> {
    markup::start_tags(markup)
        .filter(|start| start.name.eq_ignore_ascii_case(tag))
        .find_map(|start| {
            let src = start.attribute("src")?.value.as_ref()?;
            let src = markup::decode_attribute(src.raw).trim().to_string();
            (!src.is_empty()).then_some(src)
        })
}

/// References that never name a store entry.
fn skip_reference(reference: &str) -> bool {
    reference.is_empty() || reference.starts_with('#') || path::is_external(reference)
}
