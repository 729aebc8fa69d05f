//! Page identification and SPA navigation monitoring.
//!
//! The CRM is a single-page app that never reloads and fires no navigation
//! events for in-app route changes, so the monitor watches `<body>` mutations
//! (plus `popstate`) and re-classifies the URL on every notification.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use once_cell::sync::Lazy;
use regex::Regex;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use caselens_protocols::{Document, DomError, ObserveOptions, PageInfo, PageType};

/// Which capture of a URL pattern holds the identifier.
#[derive(Clone, Copy)]
enum Capture {
    None,
    Record,
    Report,
}

struct UrlPattern {
    page_type: PageType,
    regex: Regex,
    capture: Capture,
}

fn pattern(page_type: PageType, regex: &str, capture: Capture) -> UrlPattern {
    UrlPattern {
        page_type,
        regex: Regex::new(regex).expect("static page pattern"),
        capture,
    }
}

/// Ordered URL shapes. First match wins, so the comments related list sits
/// ahead of the case detail shape it extends.
static URL_PATTERNS: Lazy<Vec<UrlPattern>> = Lazy::new(|| {
    vec![
        pattern(
            PageType::CaseCommentsPage,
            r"^/lightning/r/Case/([A-Za-z0-9]{15,18})/related/CaseComments/view/?$",
            Capture::Record,
        ),
        pattern(
            PageType::CasePage,
            r"^/lightning/r/Case/([A-Za-z0-9]{15,18})(?:/view)?/?$",
            Capture::Record,
        ),
        pattern(
            PageType::CasePage,
            r"^/lightning/r/(500[A-Za-z0-9]{12,15})/view/?$",
            Capture::Record,
        ),
        pattern(
            PageType::CasePage,
            r"^/(500[A-Za-z0-9]{12,15})/?$",
            Capture::Record,
        ),
        pattern(
            PageType::CaseListPage,
            r"^/lightning/o/Case/(?:list|home)/?$",
            Capture::None,
        ),
        pattern(
            PageType::ReportHome,
            r"^/lightning/o/Report/home/?$",
            Capture::None,
        ),
        pattern(
            PageType::ReportPage,
            r"^/lightning/r/Report/([A-Za-z0-9]{15,18})/view/?$",
            Capture::Report,
        ),
        pattern(
            PageType::SearchPage,
            r"^/(?:lightning/search|_ui/search/)",
            Capture::None,
        ),
    ]
});

const SEARCH_TITLE_PREFIX: &str = "Search Results";

/// Classify a URL (and the document title) into a [`PageInfo`].
///
/// Pure; a URL matching nothing is [`PageType::Unknown`], never an error.
pub fn identify(current_url: &str, current_title: &str) -> PageInfo {
    for path in candidate_paths(current_url) {
        for p in URL_PATTERNS.iter() {
            if let Some(caps) = p.regex.captures(&path) {
                let id = caps.get(1).map(|m| m.as_str().to_string());
                return match p.capture {
                    Capture::None => PageInfo::of_type(p.page_type),
                    Capture::Record => PageInfo {
                        page_type: p.page_type,
                        record_id: id,
                        report_id: None,
                    },
                    Capture::Report => PageInfo {
                        page_type: p.page_type,
                        record_id: None,
                        report_id: id,
                    },
                };
            }
        }
    }

    if current_title.trim_start().starts_with(SEARCH_TITLE_PREFIX) {
        return PageInfo::of_type(PageType::SearchPage);
    }
    PageInfo::unknown()
}

/// Paths worth matching: the URL path, then a route carried in the fragment
/// (console apps route through `one.app#/...`).
fn candidate_paths(current_url: &str) -> Vec<String> {
    match url::Url::parse(current_url) {
        Ok(parsed) => {
            let mut paths = vec![parsed.path().to_string()];
            if let Some(fragment) = parsed.fragment() {
                if fragment.starts_with('/') {
                    paths.push(fragment.split('?').next().unwrap_or(fragment).to_string());
                }
            }
            paths
        }
        Err(_) => vec![current_url.split(['?', '#']).next().unwrap_or("").to_string()],
    }
}

/// De-duplicates page classifications: only a value that differs from the last
/// delivered one passes.
#[derive(Debug, Default)]
pub struct PageTracker {
    last: Option<PageInfo>,
}

impl PageTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `Some(info)` when it differs from the previously accepted value.
    pub fn offer(&mut self, info: PageInfo) -> Option<PageInfo> {
        if self.last.as_ref() == Some(&info) {
            return None;
        }
        self.last = Some(info.clone());
        Some(info)
    }

    pub fn current(&self) -> Option<&PageInfo> {
        self.last.as_ref()
    }
}

/// Running page-change monitor. Stops on [`PageMonitor::stop`] or drop.
pub struct PageMonitor {
    document: Arc<dyn Document>,
    subscription_id: u64,
    task: JoinHandle<()>,
    stopped: Arc<AtomicBool>,
}

impl PageMonitor {
    /// Stop observing. Idempotent.
    pub fn stop(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        self.document.disconnect(self.subscription_id);
        self.task.abort();
        debug!("Page monitor stopped");
    }

    pub fn is_running(&self) -> bool {
        !self.stopped.load(Ordering::SeqCst)
    }
}

impl Drop for PageMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Watch for SPA navigation and deliver each distinct [`PageInfo`] to
/// `on_change`, starting with the current page.
///
/// Must be called within a tokio runtime.
pub fn monitor_page_changes<F>(
    document: Arc<dyn Document>,
    on_change: F,
) -> Result<PageMonitor, DomError>
where
    F: Fn(PageInfo) + Send + Sync + 'static,
{
    let mut subscription = document.observe(document.body(), ObserveOptions::tree())?;
    let subscription_id = subscription.id;
    let mut history = document.history();
    let stopped = Arc::new(AtomicBool::new(false));

    let task = {
        let document = document.clone();
        let stopped = stopped.clone();
        tokio::spawn(async move {
            let mut tracker = PageTracker::new();
            let mut history_open = true;

            let deliver = |tracker: &mut PageTracker| {
                let info = identify(&document.location(), &document.title());
                if let Some(info) = tracker.offer(info) {
                    if stopped.load(Ordering::SeqCst) {
                        return;
                    }
                    info!("Page changed: {}", info);
                    on_change(info);
                }
            };

            deliver(&mut tracker);

            loop {
                tokio::select! {
                    record = subscription.records.recv() => {
                        if record.is_none() {
                            break;
                        }
                        // Coalesce whatever else is already queued.
                        while subscription.records.try_recv().is_ok() {}
                        deliver(&mut tracker);
                    }
                    event = history.recv(), if history_open => {
                        match event {
                            Ok(_) | Err(RecvError::Lagged(_)) => deliver(&mut tracker),
                            Err(RecvError::Closed) => history_open = false,
                        }
                    }
                }
            }
        })
    };

    Ok(PageMonitor {
        document,
        subscription_id,
        task,
        stopped,
    })
}

#[cfg(test)]
#[path = "page_tests.rs"]
mod tests;
