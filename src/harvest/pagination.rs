//! Offset-based page cursor
//!
//! Drives one list query (one resource, one window) from offset 0 until the
//! portal signals exhaustion. The cursor is lazy, finite and not restartable:
//! every call to [`PageCursor::next_page`] issues at most one request, and
//! once it has returned `None` it stays exhausted.
//!
//! Exhaustion rules:
//! - continue only while the "more pages" flag is true **and** the page's record
//!   array was non-empty; a true flag on an empty page ends the loop
//! - a 200 body without the record array counts as an empty, final page
//! - a 200 body without the flag keeps its records and ends the loop
//! - an HTTP or transport failure ends the loop and is reported with the
//!   records gathered so far
//!
//! Includes safety mechanisms:
//! - a page budget to stop runaway pagination
//! - cooperative shutdown between requests

use futures::stream::{self, Stream};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

use super::resource::{ResourceQuerySpec, DATA_ENVELOPE};
use crate::portal::{PortalError, PortalTransport, RequestPacer};
use crate::shutdown::SharedShutdown;
use crate::window::QueryWindow;
use crate::Record;

/// Maximum pages fetched for one window before giving up
pub const MAX_PAGES: usize = 10_000;

/// Why a 200 response was not a well-formed page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Malformation {
    /// Record array absent, null, or not an array
    MissingList,
    /// "More pages" flag absent or not a boolean
    MissingFlag,
}

/// One successfully fetched page
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    /// Offset the page was requested at
    pub offset: u64,
    /// Records in server order
    pub records: Vec<Record>,
    /// Whether the cursor will request another page
    pub has_more: bool,
    /// Set when the body did not have the expected shape
    pub malformed: Option<Malformation>,
}

/// A page request that failed
#[derive(Debug, Clone, PartialEq)]
pub struct PageFailure {
    /// Offset that failed
    pub offset: u64,
    /// Failure reason
    pub error: PortalError,
}

/// Everything one cursor produced
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PaginationOutcome {
    /// Records from all successful pages, in page order
    pub records: Vec<Record>,
    /// Successful pages fetched
    pub pages: usize,
    /// Pages whose body was malformed
    pub malformed_pages: usize,
    /// Failure that cut pagination short, if any
    pub failure: Option<PageFailure>,
    /// Whether shutdown stopped pagination
    pub interrupted: bool,
}

impl PaginationOutcome {
    /// Whether pagination reached exhaustion without failing
    pub fn is_complete(&self) -> bool {
        self.failure.is_none() && !self.interrupted
    }
}

/// Lazy page sequence for one resource over one window
pub struct PageCursor<'a> {
    transport: &'a dyn PortalTransport,
    pacer: &'a RequestPacer,
    spec: &'a ResourceQuerySpec,
    window: QueryWindow,
    request_delay: Duration,
    shutdown: Option<SharedShutdown>,
    offset: u64,
    pages_fetched: usize,
    exhausted: bool,
    interrupted: bool,
}

impl<'a> PageCursor<'a> {
    /// Create a cursor starting at offset 0
    pub fn new(
        transport: &'a dyn PortalTransport,
        pacer: &'a RequestPacer,
        spec: &'a ResourceQuerySpec,
        window: QueryWindow,
    ) -> Self {
        Self {
            transport,
            pacer,
            spec,
            window,
            request_delay: Duration::ZERO,
            shutdown: None,
            offset: 0,
            pages_fetched: 0,
            exhausted: false,
            interrupted: false,
        }
    }

    /// Minimum spacing between this cursor's requests and the previous request
    pub fn with_request_delay(mut self, delay: Duration) -> Self {
        self.request_delay = delay;
        self
    }

    /// Stop before the next request once shutdown is requested
    pub fn with_shutdown(mut self, shutdown: Option<SharedShutdown>) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// Whether shutdown stopped this cursor
    pub fn was_interrupted(&self) -> bool {
        self.interrupted
    }

    /// Fetch the next page, or `None` once exhausted.
    ///
    /// A failure is yielded once; the cursor is exhausted afterwards.
    pub async fn next_page(&mut self) -> Option<Result<Page, PageFailure>> {
        if self.exhausted {
            return None;
        }

        if self
            .shutdown
            .as_ref()
            .is_some_and(|shutdown| shutdown.is_shutdown_requested())
        {
            debug!(resource = %self.spec.kind, "Shutdown requested, stopping pagination");
            self.exhausted = true;
            self.interrupted = true;
            return None;
        }

        if self.pages_fetched >= MAX_PAGES {
            self.exhausted = true;
            warn!(
                resource = %self.spec.kind,
                window = %self.window,
                offset = self.offset,
                "Page budget of {} exhausted - possible pagination loop",
                MAX_PAGES
            );
            return Some(Err(PageFailure {
                offset: self.offset,
                error: PortalError::PageLimit(MAX_PAGES),
            }));
        }

        let offset = self.offset;
        let body = self.spec.request_body(
            &self.window.start_param(),
            &self.window.end_param(),
            offset,
        );

        self.pacer.pace(self.request_delay).await;
        debug!(
            resource = %self.spec.kind,
            window = %self.window,
            offset,
            "Fetching page {}",
            self.pages_fetched + 1
        );

        let response = match self.transport.post_json(self.spec.endpoint, &body).await {
            Ok(response) => response,
            Err(error) => {
                self.exhausted = true;
                log_page_failure(self.spec, &self.window, offset, &error);
                return Some(Err(PageFailure { offset, error }));
            }
        };

        self.pages_fetched += 1;
        let page = parse_page(self.spec, offset, &response);

        if let Some(malformed) = page.malformed {
            warn!(
                resource = %self.spec.kind,
                window = %self.window,
                offset,
                "Malformed page ({:?}); treating it as the last page",
                malformed
            );
        }

        if page.has_more {
            self.offset += u64::from(self.spec.page_limit);
        } else {
            self.exhausted = true;
        }

        debug!(
            resource = %self.spec.kind,
            offset,
            records = page.records.len(),
            has_more = page.has_more,
            "Page received"
        );
        Some(Ok(page))
    }

    /// Run the cursor to exhaustion, collecting every record.
    pub async fn drain(mut self) -> PaginationOutcome {
        let mut outcome = PaginationOutcome::default();

        while let Some(result) = self.next_page().await {
            match result {
                Ok(page) => {
                    outcome.pages += 1;
                    if page.malformed.is_some() {
                        outcome.malformed_pages += 1;
                    }
                    outcome.records.extend(page.records);
                }
                Err(failure) => {
                    outcome.failure = Some(failure);
                }
            }
        }

        outcome.interrupted = self.interrupted;
        outcome
    }

    /// Consume the cursor as a stream of pages
    pub fn into_stream(self) -> impl Stream<Item = Result<Page, PageFailure>> + 'a {
        stream::unfold(self, |mut cursor| async move {
            cursor.next_page().await.map(|item| (item, cursor))
        })
    }
}

/// Interpret one 200 response body for `spec`.
pub fn parse_page(spec: &ResourceQuerySpec, offset: u64, body: &Value) -> Page {
    let data = body.get(DATA_ENVELOPE);
    let list = data
        .and_then(|data| data.get(spec.list_key))
        .and_then(Value::as_array);
    let flag = data
        .and_then(|data| data.get(spec.has_more_key))
        .and_then(Value::as_bool);

    let Some(list) = list else {
        return Page {
            offset,
            records: Vec::new(),
            has_more: false,
            malformed: Some(Malformation::MissingList),
        };
    };

    let records: Vec<Record> = list
        .iter()
        .filter_map(|item| match item {
            Value::Object(record) => Some(record.clone()),
            other => {
                debug!(resource = %spec.kind, "Skipping non-object list entry: {}", other);
                None
            }
        })
        .collect();

    match flag {
        Some(flag) => Page {
            offset,
            has_more: flag && !list.is_empty(),
            records,
            malformed: None,
        },
        None => Page {
            offset,
            records,
            has_more: false,
            malformed: Some(Malformation::MissingFlag),
        },
    }
}

fn log_page_failure(
    spec: &ResourceQuerySpec,
    window: &QueryWindow,
    offset: u64,
    error: &PortalError,
) {
    warn!(
        resource = %spec.kind,
        chunk_start = %window.start_param(),
        chunk_end = %window.end_param(),
        offset,
        status = ?error.status(),
        "Page request failed: {}",
        error
    );
    if error.is_unauthorized() {
        warn!(resource = %spec.kind, "Credential was rejected; it may have expired");
    }
}
