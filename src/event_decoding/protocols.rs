use super::types::Endpoint;
use crate::time_resolver::types::Timeval;

const PROTOCOLS: &[(&str, u8)] = &[
    ("ip", 0),
    ("icmp", 1),
    ("igmp", 2),
    ("tcp", 6),
    ("udp", 17),
    ("ipv6", 41),
    ("gre", 47),
    ("esp", 50),
    ("ah", 51),
    ("ipv6-icmp", 58),
    ("sctp", 132),
];

/// Maps a protocol name to its IANA number, case-insensitively. Numeric names
/// pass through unchanged.
pub fn protocol_number(name: &str) -> Option<u8> {
    if let Ok(number) = name.parse::<u8>() {
        return Some(number);
    }
    PROTOCOLS
        .iter()
        .find(|(known, _)| known.eq_ignore_ascii_case(name))
        .map(|(_, number)| *number)
}

fn endpoint_clause(endpoint: &Endpoint) -> String {
    match endpoint.port {
        Some(port) if port != 0 => format!("(host {} and port {})", endpoint.address, port),
        _ => format!("(host {})", endpoint.address),
    }
}

/// Builds the flow filter shared by all alert decoders.
pub fn flow_filter(protocol: u8, source: &Endpoint, destination: &Endpoint) -> String {
    format!(
        "proto {} and ({} and {})",
        protocol,
        endpoint_clause(source),
        endpoint_clause(destination)
    )
}

/// Download name for an event's packets:
/// `<signature id>-<unix start>-<src>-<sport>-<dst>-<dport>.pcap`, with zero
/// for anything the event lacks.
pub fn event_filename(
    signature_id: u64,
    start: Option<Timeval>,
    source: &Endpoint,
    destination: &Endpoint,
) -> String {
    format!(
        "{}-{}-{}-{}-{}-{}.pcap",
        signature_id,
        start.map_or(0, |ts| ts.secs()),
        source.address,
        source.port.unwrap_or(0),
        destination.address,
        destination.port.unwrap_or(0)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_names_and_numbers() {
        assert_eq!(protocol_number("TCP"), Some(6));
        assert_eq!(protocol_number("udp"), Some(17));
        assert_eq!(protocol_number("IPV6-ICMP"), Some(58));
        assert_eq!(protocol_number("132"), Some(132));
        assert_eq!(protocol_number("nosuchproto"), None);
    }

    #[test]
    fn zero_port_is_dropped() {
        let src = Endpoint {
            address: "10.0.0.1".to_string(),
            port: Some(0),
        };
        let dst = Endpoint {
            address: "10.0.0.2".to_string(),
            port: Some(53),
        };
        assert_eq!(
            flow_filter(17, &src, &dst),
            "proto 17 and ((host 10.0.0.1) and (host 10.0.0.2 and port 53))"
        );
    }

    #[test]
    fn filename_names_the_flow() {
        let src = Endpoint {
            address: "10.0.0.1".to_string(),
            port: Some(1234),
        };
        let dst = Endpoint {
            address: "10.0.0.2".to_string(),
            port: None,
        };
        assert_eq!(
            event_filename(2027863, Some(Timeval::new(1649805642, 294911)), &src, &dst),
            "2027863-1649805642-10.0.0.1-1234-10.0.0.2-0.pcap"
        );
        assert_eq!(event_filename(0, None, &src, &dst), "0-0-10.0.0.1-1234-10.0.0.2-0.pcap");
    }
}
