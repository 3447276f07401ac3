use anyhow::{bail, Context, Result};

use crate::types::Endpoint;

/// Ports the bridge binds to, tried in this order when nothing better is known.
pub const DEFAULT_PORTS: &[u16] = &[17620, 17621, 17622, 17623, 17624, 17625];

/// Parse a port list into a deduplicated list of TCP ports (1..=65535), keeping first-seen order.
///
/// Supported formats, separated by commas or newlines:
/// - single port number: `17620`
/// - inclusive range: `17620-17625`
/// - comments: everything after `#` on a line is ignored
/// - whitespace and blank items are ignored
pub fn parse_ports_str(s: &str) -> Result<Vec<u16>> {
    let mut out: Vec<u16> = Vec::new();
    let mut seen = std::collections::HashSet::new();

    for (idx, raw_line) in s.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw_line.split('#').next().unwrap_or("");

        for item in line.split(',').map(str::trim).filter(|i| !i.is_empty()) {
            if let Some((a, b)) = item.split_once('-') {
                let start = parse_port_str(a.trim())
                    .with_context(|| format!("line {line_no}: invalid start in range: {a}"))?;
                let end = parse_port_str(b.trim())
                    .with_context(|| format!("line {line_no}: invalid end in range: {b}"))?;
                if start > end {
                    bail!("line {line_no}: invalid range {start}-{end} (start > end)");
                }
                for p in start..=end {
                    if seen.insert(p) {
                        out.push(p);
                    }
                }
                continue;
            }

            let p = parse_port_str(item)
                .with_context(|| format!("line {line_no}: invalid port value: {item}"))?;
            if seen.insert(p) {
                out.push(p);
            }
        }
    }

    Ok(out)
}

pub fn default_ports() -> Vec<u16> {
    DEFAULT_PORTS.to_vec()
}

/// Build the ordered candidate list for resolution.
///
/// `preferred` (typically the last known good endpoint) goes first; the remaining
/// candidates are `host` on each of `ports`, skipping a duplicate of `preferred`.
pub fn candidate_endpoints(host: &str, ports: &[u16], preferred: Option<&Endpoint>) -> Vec<Endpoint> {
    let mut out: Vec<Endpoint> = Vec::with_capacity(ports.len() + 1);
    if let Some(p) = preferred {
        out.push(p.clone());
    }
    for &port in ports {
        let ep = Endpoint::new(host, port);
        if !out.contains(&ep) {
            out.push(ep);
        }
    }
    out
}

fn parse_port_str(s: &str) -> Result<u16> {
    let val: u32 = s.parse::<u32>().map_err(|e| anyhow::anyhow!(e))?;
    if val == 0 || val > 65535 {
        bail!("port out of range: {val}");
    }
    Ok(val as u16)
}
