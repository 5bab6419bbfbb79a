//! Resource catalog
//!
//! Every portal resource is the same offset-paginated POST with a different
//! endpoint, window field names, list key and reserved filters. The catalog
//! captures those differences as data so one harvester serves all of them.

use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Envelope key wrapping every response payload
pub const DATA_ENVELOPE: &str = "data";

/// Flag signalling that more pages exist
pub const HAS_MORE_KEY: &str = "hasNext";

/// Characters escaped when an identifier becomes one URL path segment
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'\\')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Default page size for list queries
pub const DEFAULT_PAGE_LIMIT: u32 = 100;

/// Default maximum span for span-constrained resources
pub const DEFAULT_MAX_SPAN_DAYS: u32 = 90;

/// Harvestable portal resources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// Vendor invoices
    Invoices,
    /// Debit/credit note settlements
    Settlements,
    /// Payment advices
    PaymentAdvice,
    /// Goods-received notes
    Grns,
    /// Returns to vendor
    Returns,
}

impl ResourceKind {
    /// All resources in canonical harvesting order
    pub const ALL: [ResourceKind; 5] = [
        ResourceKind::Invoices,
        ResourceKind::Settlements,
        ResourceKind::PaymentAdvice,
        ResourceKind::Grns,
        ResourceKind::Returns,
    ];

    /// Stable machine name, used in config, CLI and metrics labels
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Invoices => "invoices",
            ResourceKind::Settlements => "settlements",
            ResourceKind::PaymentAdvice => "payment_advice",
            ResourceKind::Grns => "grns",
            ResourceKind::Returns => "returns",
        }
    }

    /// Report table holding this resource's records
    pub fn table_name(&self) -> &'static str {
        match self {
            ResourceKind::Invoices => "Invoices",
            ResourceKind::Settlements => "DN_CN",
            ResourceKind::PaymentAdvice => "Payment_Advice",
            ResourceKind::Grns => "GRNs",
            ResourceKind::Returns => "Returns_RTV",
        }
    }

    /// Noun used in the "No ... data found" placeholder
    pub fn label(&self) -> &'static str {
        match self {
            ResourceKind::Invoices => "invoice",
            ResourceKind::Settlements => "settlement",
            ResourceKind::PaymentAdvice => "payment advice",
            ResourceKind::Grns => "GRN",
            ResourceKind::Returns => "RTV (returns)",
        }
    }

    /// Query spec with the catalog defaults
    pub fn spec(&self) -> ResourceQuerySpec {
        ResourceQuerySpec::for_kind(*self)
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "invoices" | "invoice" => Ok(ResourceKind::Invoices),
            "settlements" | "settlement" | "dn_cn" => Ok(ResourceKind::Settlements),
            "payment_advice" | "payment_advices" | "advice" => Ok(ResourceKind::PaymentAdvice),
            "grns" | "grn" => Ok(ResourceKind::Grns),
            "returns" | "rtv" | "rtvs" => Ok(ResourceKind::Returns),
            _ => Err(format!(
                "Invalid resource: {s}. Valid options: invoices, settlements, payment_advice, grns, returns"
            )),
        }
    }
}

/// Everything needed to page through one resource's list endpoint
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceQuerySpec {
    /// Which resource this is
    pub kind: ResourceKind,
    /// List endpoint path
    pub endpoint: &'static str,
    /// Body field carrying the window start
    pub start_field: &'static str,
    /// Body field carrying the window end
    pub end_field: &'static str,
    /// Key under the data envelope holding the record array
    pub list_key: &'static str,
    /// Key under the data envelope holding the "more pages" flag
    pub has_more_key: &'static str,
    /// Records requested per page
    pub page_limit: u32,
    /// Longest window the endpoint accepts, if it enforces one
    pub max_span_days: Option<u32>,
    /// Filter arrays sent empty on every request
    pub empty_filters: &'static [&'static str],
    /// Fields sent as explicit nulls on every request
    pub null_fields: &'static [&'static str],
    /// Page spacing for this resource; the run-wide delay applies when unset
    pub request_delay: Option<Duration>,
}

impl ResourceQuerySpec {
    /// Catalog entry for `kind`
    pub fn for_kind(kind: ResourceKind) -> Self {
        match kind {
            ResourceKind::Invoices => Self::entry(
                kind,
                "/api/v1/payment/invoice/filter",
                ("startDate", "endDate"),
                "invoiceList",
                &["statusList", "refNos", "poNos", "asnNos", "invoiceNos", "vendorCodes"],
            ),
            ResourceKind::Settlements => Self::entry(
                kind,
                "/api/v1/payment/settlement/filter",
                ("startDate", "endDate"),
                "settlements",
                &["refNos", "settlementSubTypes"],
            ),
            ResourceKind::PaymentAdvice => Self::entry(
                kind,
                "/api/v1/payment/payment-advice/filter",
                ("startDate", "endDate"),
                "paymentAdviceList",
                &["refNos", "utrNos"],
            ),
            ResourceKind::Grns => Self {
                max_span_days: Some(DEFAULT_MAX_SPAN_DAYS),
                ..Self::entry(
                    kind,
                    "/api/v1/grn/filter",
                    ("grnStartDate", "grnEndDate"),
                    "grnList",
                    &["vendorCodes", "locationCodes", "statusList", "grnNos", "poIds"],
                )
            },
            ResourceKind::Returns => Self {
                max_span_days: Some(DEFAULT_MAX_SPAN_DAYS),
                null_fields: &["returnOrderStartDate", "returnOrderEndDate"],
                ..Self::entry(
                    kind,
                    "/api/v1/rtv/filter",
                    ("creationStartDate", "creationEndDate"),
                    "rtvList",
                    &["locationCodes", "vendorCodes", "referenceNos", "statusList", "poIds"],
                )
            },
        }
    }

    fn entry(
        kind: ResourceKind,
        endpoint: &'static str,
        (start_field, end_field): (&'static str, &'static str),
        list_key: &'static str,
        empty_filters: &'static [&'static str],
    ) -> Self {
        Self {
            kind,
            endpoint,
            start_field,
            end_field,
            list_key,
            has_more_key: HAS_MORE_KEY,
            page_limit: DEFAULT_PAGE_LIMIT,
            max_span_days: None,
            empty_filters,
            null_fields: &[],
            request_delay: None,
        }
    }

    /// Override the page size
    pub fn with_page_limit(mut self, page_limit: u32) -> Self {
        self.page_limit = page_limit;
        self
    }

    /// Override the span limit; ignored for unconstrained resources
    pub fn with_max_span_days(mut self, max_span_days: u32) -> Self {
        if self.max_span_days.is_some() {
            self.max_span_days = Some(max_span_days);
        }
        self
    }

    /// Set the span limit, chunking even resources that do not require it
    pub fn with_span_limit(mut self, max_span_days: u32) -> Self {
        self.max_span_days = Some(max_span_days);
        self
    }

    /// Space this resource's page requests by `delay`
    pub fn with_request_delay(mut self, delay: Duration) -> Self {
        self.request_delay = Some(delay);
        self
    }

    /// Build the list request body for one page
    pub fn request_body(&self, start: &str, end: &str, offset: u64) -> Value {
        let mut body = Map::new();
        body.insert(self.start_field.to_string(), json!(start));
        body.insert(self.end_field.to_string(), json!(end));
        body.insert("offset".to_string(), json!(offset));
        body.insert("limit".to_string(), json!(self.page_limit));
        for filter in self.empty_filters {
            body.insert((*filter).to_string(), json!([]));
        }
        for field in self.null_fields {
            body.insert((*field).to_string(), Value::Null);
        }
        Value::Object(body)
    }
}

/// How a detail response turns into output rows
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ExpansionMode {
    /// The detail record itself is the output row
    Detail,
    /// Each element of a nested array becomes its own row
    LogFlatten(LogFlattenSpec),
}

/// Mapping from a nested log array to flat output rows
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogFlattenSpec {
    /// Key of the nested array inside the detail record
    pub nested_key: &'static str,
    /// Scalar field copied from the parent detail onto every row
    pub parent_field: &'static str,
    /// Output column for the copied parent field
    pub parent_column: &'static str,
    /// `(source field, output column)` pairs taken from each element
    pub columns: &'static [(&'static str, &'static str)],
}

/// Per-record follow-up fetch for a harvested resource
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetailSpec {
    /// Resource whose records drive the fan-out
    pub parent: ResourceKind,
    /// Detail endpoint prefix; the identifier is appended as the last segment
    pub endpoint_prefix: &'static str,
    /// Field on the parent record holding the identifier
    pub id_field: &'static str,
    /// Output mode
    pub mode: ExpansionMode,
    /// Report table for the expanded rows
    pub table_name: &'static str,
    /// Noun used in the placeholder message
    pub label: &'static str,
}

impl DetailSpec {
    /// One detail record per GRN
    pub fn grn_details() -> Self {
        Self {
            parent: ResourceKind::Grns,
            endpoint_prefix: "/api/v1/grn",
            id_field: "grnNo",
            mode: ExpansionMode::Detail,
            table_name: "GRN_Details",
            label: "GRN details",
        }
    }

    /// Payment-advice logs flattened to one row per log entry
    pub fn payment_advice_logs() -> Self {
        Self {
            parent: ResourceKind::PaymentAdvice,
            endpoint_prefix: "/api/v1/payment/payment-advice",
            id_field: "id",
            mode: ExpansionMode::LogFlatten(LogFlattenSpec {
                nested_key: "paymentAdviceLogs",
                parent_field: "referenceNo",
                parent_column: "Reference No",
                columns: &[
                    ("id", "Log ID"),
                    ("bookingDate", "Booking Date"),
                    ("postingDate", "Posting Date"),
                    ("settlementType", "Settlement Type"),
                    ("type", "Type"),
                    ("amount", "Amount"),
                    ("tds", "TDS"),
                    ("paymentAmount", "Payment Amount"),
                    ("extReferenceNo", "External Reference No"),
                ],
            }),
            table_name: "Payment_Advice_Logs",
            label: "payment advice logs",
        }
    }

    /// Detail path for one identifier, encoded as a single path segment
    pub fn path_for(&self, identifier: &str) -> String {
        format!(
            "{}/{}",
            self.endpoint_prefix.trim_end_matches('/'),
            utf8_percent_encode(identifier, PATH_SEGMENT)
        )
    }
}
