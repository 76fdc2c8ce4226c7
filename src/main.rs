//! Minimal demo binary for `dnscap_core`: wires the orchestrator to a
//! synthetic in-memory capture source and logs every decoded `DNSResult` as
//! JSON. Capture drivers, BPF filters, CLI parsing and config-file loading
//! are all out of scope for the core (spec.md §1) and are not implemented
//! here either — this binary exists to exercise the pipeline end to end,
//! not to be a production DNS observer.

use std::net::Ipv4Addr;
use std::time::UNIX_EPOCH;

use bytes::{Bytes, BytesMut};
use dnscap_core::{
    done_channel, Config, DNSResult, Frame, LinkType, Orchestrator, ResultSink, VecCaptureSource,
};
use log::{error, info};

struct LoggingSink;

impl ResultSink for LoggingSink {
    fn accept(&mut self, result: DNSResult) {
        let record = serde_json::json!({
            "timestamp_unix_secs": result
                .timestamp
                .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                .map(|d| d.as_secs_f64()),
            "protocol": result.protocol,
            "ip_version": result.ip_version,
            "src": format!("{}:{}", result.src_ip, result.src_port),
            "dst": format!("{}:{}", result.dst_ip, result.dst_port),
            "packet_length": result.packet_length,
            "dns_message": format!("{:?}", result.dns_message),
        });
        info!("{record}");
    }
}

/// Encodes a minimal `A`-record query for `name`, with no EDNS/OPT record —
/// enough to exercise the decode path without pulling a DNS message-building
/// crate into this binary.
fn encode_dns_query(id: u16, name: &str) -> Vec<u8> {
    let mut msg = Vec::new();
    msg.extend_from_slice(&id.to_be_bytes());
    msg.extend_from_slice(&0x0100u16.to_be_bytes()); // flags: recursion desired
    msg.extend_from_slice(&1u16.to_be_bytes()); // qdcount
    msg.extend_from_slice(&[0u8; 6]); // ancount, nscount, arcount
    for label in name.trim_end_matches('.').split('.') {
        msg.push(label.len() as u8);
        msg.extend_from_slice(label.as_bytes());
    }
    msg.push(0);
    msg.extend_from_slice(&1u16.to_be_bytes()); // qtype A
    msg.extend_from_slice(&1u16.to_be_bytes()); // qclass IN
    msg
}

/// Wraps a DNS message in Ethernet/IPv4/UDP headers, matching the wire
/// formats spec.md §6 names. Checksums are left zeroed: neither
/// `decode::ipv4` nor `decode::transport` validates them (the core only
/// needs header fields to route and frame, not to revalidate what already
/// crossed the wire).
fn udp_dns_frame(src_port: u16, dst_port: u16, dns_message: &[u8]) -> Bytes {
    let mut udp = BytesMut::new();
    udp.extend_from_slice(&src_port.to_be_bytes());
    udp.extend_from_slice(&dst_port.to_be_bytes());
    udp.extend_from_slice(&((8 + dns_message.len()) as u16).to_be_bytes());
    udp.extend_from_slice(&[0u8; 2]);
    udp.extend_from_slice(dns_message);

    let mut ip = BytesMut::new();
    ip.extend_from_slice(&[0x45, 0x00]);
    ip.extend_from_slice(&((20 + udp.len()) as u16).to_be_bytes());
    ip.extend_from_slice(&[0, 1, 0, 0, 64, 17, 0, 0]);
    ip.extend_from_slice(&Ipv4Addr::new(127, 0, 0, 1).octets());
    ip.extend_from_slice(&Ipv4Addr::new(127, 0, 0, 2).octets());
    ip.extend_from_slice(&udp);

    let mut eth = BytesMut::new();
    eth.extend_from_slice(&[0u8; 12]);
    eth.extend_from_slice(&0x0800u16.to_be_bytes());
    eth.extend_from_slice(&ip);
    eth.freeze()
}

fn synthetic_frames() -> Vec<Frame> {
    let query = encode_dns_query(0x1234, "example.com");
    vec![Frame::new(
        LinkType::Ethernet,
        udp_dns_frame(40_000, 53, &query),
    )]
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    env_logger::init();

    let mut config = Config::default();
    config.capture_file_path = Some("synthetic-demo".to_string());
    config.decoder_worker_count = 2;
    config.tcp_worker_count = 2;

    let orchestrator = match Orchestrator::new(config) {
        Ok(orchestrator) => orchestrator,
        Err(err) => {
            error!("configuration error: {err}");
            std::process::exit(1);
        }
    };

    let source = VecCaptureSource::new(LinkType::Ethernet, synthetic_frames());
    let (trigger, done) = done_channel();

    let mut run_task =
        tokio::task::spawn_blocking(move || orchestrator.run(Box::new(source), LoggingSink, done));

    tokio::select! {
        res = &mut run_task => {
            report(res);
            return;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("received ctrl-c, shutting down");
            trigger.fire();
        }
    }

    report(run_task.await);
}

fn report(res: Result<Result<(), dnscap_core::CaptureError>, tokio::task::JoinError>) {
    match res {
        Ok(Ok(())) => info!("capture finished"),
        Ok(Err(err)) => error!("capture error: {err}"),
        Err(err) => error!("pipeline task panicked: {err}"),
    }
}
