use malblock_common::PerCategory;
use malblock_reputation::Snapshot;
use prometheus::{Encoder, IntGauge, IntGaugeVec, Opts, Registry};

/// Totals computed from a snapshot of the reputation store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Aggregate {
    /// Identities whose stored verdict is blocked.
    pub blocked_identities: u64,
    /// Requests per category, summed over all identities.
    pub requests: PerCategory<u64>,
    /// Tracked identities, blocked or not.
    pub identities: usize,
}

pub fn aggregate(snapshot: &Snapshot) -> Aggregate {
    let mut totals = Aggregate {
        identities: snapshot.len(),
        ..Default::default()
    };

    for record in snapshot.values() {
        for (category, count) in record.counts.iter() {
            if let Some(total) = totals.requests.get_mut(category) {
                *total = total.saturating_add(count);
            }
        }
        if record.blocked {
            totals.blocked_identities += 1;
        }
    }

    totals
}

/// Render the aggregate of `snapshot` in the Prometheus text format.
///
/// Produces two gauge families, `<namespace>_blocked_ips` and
/// `<namespace>_malicious_requests{type="<category>"}`, the latter with one
/// series per category including zeros.
pub fn render(snapshot: &Snapshot, namespace: &str) -> prometheus::Result<String> {
    let registry = build_registry(&aggregate(snapshot), namespace)?;

    let mut buffer = Vec::new();
    prometheus::TextEncoder::new().encode(&registry.gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}

fn build_registry(totals: &Aggregate, namespace: &str) -> prometheus::Result<Registry> {
    let registry = Registry::new();

    let blocked = IntGauge::with_opts(
        Opts::new("blocked_ips", "Amount of currently blocked IPs.").namespace(namespace),
    )?;
    let requests = IntGaugeVec::new(
        Opts::new("malicious_requests", "Counts amount of malicious requests.")
            .namespace(namespace),
        &["type"],
    )?;

    blocked.set(clamp_i64(totals.blocked_identities));
    for (category, count) in totals.requests.iter() {
        requests
            .with_label_values(&[category.as_label()])
            .set(clamp_i64(count));
    }

    registry.register(Box::new(blocked))?;
    registry.register(Box::new(requests))?;

    Ok(registry)
}

fn clamp_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}
