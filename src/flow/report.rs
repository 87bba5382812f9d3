//! Decoding of traffic reports posted by the agents.
//!
//! Two wire formats are in the field. Newer agents run an observer plugin that posts
//! batches of `stats` events; older ones post a single `{"n","u","d"}` record whose name
//! encodes the forward, user and user-tunnel ids. Decoders are tried in order and each one
//! either produces a report, explicitly ignores the payload, or declines it.

use serde::Deserialize;
use tracing::debug;

/// Name legacy agents use for panel-internal traffic that is not billed.
const WEB_API_NAME: &str = "web_api";

/// Which user-tunnel association a report should be booked against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserTunnelTarget {
    /// Look up the association from the forward's (user, tunnel) pair.
    ByScope,
    /// The reporter named the association explicitly.
    ById(i64),
    /// The reporter named no association.
    Skip,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireFormat {
    ObserverEvents,
    Legacy,
}

impl WireFormat {
    /// Decoders in the order they are attempted.
    pub const ORDERED: [WireFormat; 2] = [WireFormat::ObserverEvents, WireFormat::Legacy];

    fn decode(self, body: &[u8], query_id: Option<&str>) -> Decoded {
        match self {
            WireFormat::ObserverEvents => decode_observer_events(body, query_id),
            WireFormat::Legacy => decode_legacy(body),
        }
    }
}

/// A report normalized to one forward and a byte pair, before any direction remapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowReport {
    pub format: WireFormat,
    pub forward_id: i64,
    /// Explicit user id; when absent the forward's owner is charged.
    pub user_id: Option<i64>,
    pub user_tunnel: UserTunnelTarget,
    pub in_bytes: i64,
    pub out_bytes: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// Observer batch carried no bytes.
    NoTraffic,
    /// No forward id could be derived from the query or the service name.
    UnresolvedForward,
    /// Legacy record for panel-internal traffic.
    WebApi,
    /// Legacy name with fewer than three `_`-separated parts.
    MalformedName,
    /// Neither decoder recognized the body.
    Unrecognized,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseOutcome {
    Report(FlowReport),
    Ignored(IgnoreReason),
}

enum Decoded {
    NotThisFormat,
    Ignored(IgnoreReason),
    Report(FlowReport),
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ObserverStats {
    total_conns: i64,
    current_conns: i64,
    input_bytes: i64,
    output_bytes: i64,
    total_errs: i64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ObserverEvent {
    kind: Option<String>,
    service: Option<String>,
    #[serde(rename = "type")]
    event_type: Option<String>,
    stats: Option<ObserverStats>,
}

#[derive(Debug, Deserialize)]
struct ObserverPayload {
    #[serde(default)]
    events: Vec<ObserverEvent>,
}

#[derive(Debug, Deserialize)]
struct LegacyPayload {
    #[serde(default)]
    n: String,
    #[serde(default)]
    u: i64,
    #[serde(default)]
    d: i64,
}

/// Parses a raw report body. `query_id` is the optional `id` query parameter of the upload.
pub fn parse_report(body: &[u8], query_id: Option<&str>) -> ParseOutcome {
    for format in WireFormat::ORDERED {
        match format.decode(body, query_id) {
            Decoded::NotThisFormat => continue,
            Decoded::Ignored(reason) => return ParseOutcome::Ignored(reason),
            Decoded::Report(report) => return ParseOutcome::Report(report),
        }
    }
    ParseOutcome::Ignored(IgnoreReason::Unrecognized)
}

/// Derives a forward id from an observer service name such as `42_7_3`.
pub fn forward_id_from_service(service: &str) -> Option<i64> {
    let prefix = match service.find('_') {
        Some(idx) => &service[..idx],
        None => service,
    };
    prefix.parse::<i64>().ok().filter(|id| *id != 0)
}

fn parse_query_id(raw: Option<&str>) -> Option<i64> {
    raw.map(str::trim)
        .filter(|v| !v.is_empty())
        .and_then(|v| v.parse::<i64>().ok())
        .filter(|id| *id != 0)
}

fn decode_observer_events(body: &[u8], query_id: Option<&str>) -> Decoded {
    let payload: ObserverPayload = match serde_json::from_slice(body) {
        Ok(payload) => payload,
        Err(_) => return Decoded::NotThisFormat,
    };
    if payload.events.is_empty() {
        return Decoded::NotThisFormat;
    }

    let mut in_bytes: i64 = 0;
    let mut out_bytes: i64 = 0;
    let mut current_conns: i64 = 0;
    let mut total_conns: i64 = 0;
    let mut errors: i64 = 0;
    let mut service_name: Option<String> = None;

    for event in &payload.events {
        let is_stats = event
            .event_type
            .as_deref()
            .is_some_and(|t| t.eq_ignore_ascii_case("stats"));
        if !is_stats {
            continue;
        }
        if let Some(stats) = &event.stats {
            // Counters only ever grow; a negative sample is treated as no traffic.
            in_bytes = in_bytes.saturating_add(stats.input_bytes.max(0));
            out_bytes = out_bytes.saturating_add(stats.output_bytes.max(0));
            current_conns = current_conns.saturating_add(stats.current_conns);
            total_conns = total_conns.saturating_add(stats.total_conns);
            errors = errors.saturating_add(stats.total_errs);
        }
        if let Some(service) = event.service.as_deref().filter(|s| !s.is_empty()) {
            service_name = Some(service.to_string());
        }
    }

    debug!(
        events = payload.events.len(),
        kind = payload.events.last().and_then(|e| e.kind.as_deref()).unwrap_or_default(),
        service = service_name.as_deref().unwrap_or_default(),
        in_bytes,
        out_bytes,
        current_conns,
        total_conns,
        errors,
        "Decoded observer report."
    );

    if in_bytes == 0 && out_bytes == 0 {
        return Decoded::Ignored(IgnoreReason::NoTraffic);
    }

    let forward_id = parse_query_id(query_id)
        .or_else(|| service_name.as_deref().and_then(forward_id_from_service));

    match forward_id {
        Some(forward_id) => Decoded::Report(FlowReport {
            format: WireFormat::ObserverEvents,
            forward_id,
            user_id: None,
            user_tunnel: UserTunnelTarget::ByScope,
            in_bytes,
            out_bytes,
        }),
        None => Decoded::Ignored(IgnoreReason::UnresolvedForward),
    }
}

fn decode_legacy(body: &[u8]) -> Decoded {
    let payload: LegacyPayload = match serde_json::from_slice(body) {
        Ok(payload) => payload,
        Err(_) => return Decoded::NotThisFormat,
    };
    if payload.n.is_empty() {
        return Decoded::NotThisFormat;
    }
    if payload.n == WEB_API_NAME {
        return Decoded::Ignored(IgnoreReason::WebApi);
    }

    let parts: Vec<&str> = payload.n.split('_').collect();
    if parts.len() < 3 {
        return Decoded::Ignored(IgnoreReason::MalformedName);
    }
    let id_at = |idx: usize| parts[idx].parse::<i64>().unwrap_or(0);
    let user_tunnel_id = id_at(2);

    Decoded::Report(FlowReport {
        format: WireFormat::Legacy,
        forward_id: id_at(0),
        user_id: Some(id_at(1)),
        user_tunnel: if user_tunnel_id != 0 {
            UserTunnelTarget::ById(user_tunnel_id)
        } else {
            UserTunnelTarget::Skip
        },
        in_bytes: payload.u.max(0),
        out_bytes: payload.d.max(0),
    })
}
