//! Cross-module round trips: a full frame in, a `DNSResult` out, through
//! UDP, IPv4 fragmentation and TCP stream assembly. Exercises only
//! `dnscap_core`'s public API, the way an external caller would.

use std::net::Ipv4Addr;
use std::sync::{Arc, Mutex};

use bytes::BytesMut;
use dnscap_core::{
    done_channel, Config, DNSResult, Frame, LinkType, Orchestrator, Transport, VecCaptureSource,
};
use hickory_proto::op::{Message, Query};
use hickory_proto::rr::{Name, RecordType};
use hickory_proto::serialize::binary::BinEncodable;

fn dns_query_bytes(name: &str) -> Vec<u8> {
    let mut msg = Message::new();
    msg.add_query(Query::query(
        Name::from_ascii(name).unwrap(),
        RecordType::A,
    ));
    msg.to_bytes().unwrap()
}

fn ethernet_header(ethertype: u16) -> BytesMut {
    let mut eth = BytesMut::new();
    eth.extend_from_slice(&[0u8; 12]);
    eth.extend_from_slice(&ethertype.to_be_bytes());
    eth
}

fn ipv4_header(
    total_length: u16,
    identifier: u16,
    flags_and_offset: u16,
    protocol: u8,
    src: Ipv4Addr,
    dst: Ipv4Addr,
) -> BytesMut {
    let mut ip = BytesMut::new();
    ip.extend_from_slice(&[0x45, 0x00]);
    ip.extend_from_slice(&total_length.to_be_bytes());
    ip.extend_from_slice(&identifier.to_be_bytes());
    ip.extend_from_slice(&flags_and_offset.to_be_bytes());
    ip.extend_from_slice(&[64, protocol, 0, 0]);
    ip.extend_from_slice(&src.octets());
    ip.extend_from_slice(&dst.octets());
    ip
}

fn udp_header(src_port: u16, dst_port: u16, payload_len: usize) -> BytesMut {
    let mut udp = BytesMut::new();
    udp.extend_from_slice(&src_port.to_be_bytes());
    udp.extend_from_slice(&dst_port.to_be_bytes());
    udp.extend_from_slice(&((8 + payload_len) as u16).to_be_bytes());
    udp.extend_from_slice(&[0u8; 2]);
    udp
}

fn run_to_completion(frames: Vec<Frame>) -> Vec<DNSResult> {
    let _ = env_logger::builder().is_test(true).try_init();
    let source = VecCaptureSource::new(LinkType::Ethernet, frames);
    let mut cfg = Config::default();
    cfg.capture_file_path = Some("synthetic".into());
    cfg.decoder_worker_count = 2;
    cfg.tcp_worker_count = 2;

    let orchestrator = Orchestrator::new(cfg).unwrap();
    let results: Arc<Mutex<Vec<DNSResult>>> = Arc::new(Mutex::new(Vec::new()));
    let results_clone = Arc::clone(&results);
    let sink = move |r: DNSResult| {
        results_clone.lock().unwrap().push(r);
    };

    let (_trigger, done) = done_channel();
    orchestrator
        .run(Box::new(source), sink, done)
        .expect("offline source reaches EOF cleanly");

    Arc::try_unwrap(results).unwrap().into_inner().unwrap()
}

#[test]
fn unfragmented_udp_query_round_trips() {
    let dns_bytes = dns_query_bytes("example.com.");
    let builder = etherparse::PacketBuilder::ethernet2([0; 6], [0; 6])
        .ipv4([10, 0, 0, 1], [10, 0, 0, 2], 64)
        .udp(40_000, 53);
    let mut frame = Vec::with_capacity(builder.size(dns_bytes.len()));
    builder.write(&mut frame, &dns_bytes).unwrap();

    let results = run_to_completion(vec![Frame::new(LinkType::Ethernet, frame)]);
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].protocol, Transport::Udp);
    assert_eq!(results[0].ip_version, 4);
    assert_eq!(results[0].src_port, 40_000);
}

/// A DNS response large enough to require two IPv4 fragments, split at a
/// deliberately awkward (non-UDP-header-aligned) boundary, to prove the
/// datagram is reassembled before transport decode ever sees it.
#[test]
fn fragmented_udp_response_reassembles_before_decode() {
    let dns_bytes = dns_query_bytes("a-very-long-label-to-pad-the-message-out.example.com.");
    let udp = udp_header(53, 40_000, dns_bytes.len());
    let mut full_udp_payload = BytesMut::new();
    full_udp_payload.extend_from_slice(&udp);
    full_udp_payload.extend_from_slice(&dns_bytes);
    let full_udp_payload = full_udp_payload.freeze();

    // Split into two fragments on an 8-byte boundary, as real IPv4
    // fragmentation requires for every fragment but the last.
    let split = 16usize;
    let first = full_udp_payload.slice(0..split);
    let second = full_udp_payload.slice(split..);

    let identifier = 0xBEEF;
    let total_len_first = (20 + first.len()) as u16;
    let mut frame1 = ethernet_header(0x0800);
    frame1.extend_from_slice(&ipv4_header(
        total_len_first,
        identifier,
        0x2000, // more fragments, offset 0
        17,
        Ipv4Addr::new(10, 0, 0, 2),
        Ipv4Addr::new(10, 0, 0, 1),
    ));
    frame1.extend_from_slice(&first);

    let offset_units = (split / 8) as u16;
    let total_len_second = (20 + second.len()) as u16;
    let mut frame2 = ethernet_header(0x0800);
    frame2.extend_from_slice(&ipv4_header(
        total_len_second,
        identifier,
        offset_units, // no more-fragments flag, nonzero offset
        17,
        Ipv4Addr::new(10, 0, 0, 2),
        Ipv4Addr::new(10, 0, 0, 1),
    ));
    frame2.extend_from_slice(&second);

    // The second fragment arrives first, proving order doesn't matter.
    let results = run_to_completion(vec![
        Frame::new(LinkType::Ethernet, frame2.freeze()),
        Frame::new(LinkType::Ethernet, frame1.freeze()),
    ]);

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].protocol, Transport::Udp);
    assert_eq!(results[0].src_port, 53);
    assert_eq!(results[0].dst_port, 40_000);
}

/// A DNS-over-TCP query delivered as a SYN carrying the first half of a
/// framed message and a follow-up segment carrying the rest.
#[test]
fn dns_over_tcp_reassembles_across_segments() {
    let dns_bytes = dns_query_bytes("example.com.");
    let mut tcp_payload = Vec::new();
    tcp_payload.extend_from_slice(&(dns_bytes.len() as u16).to_be_bytes());
    tcp_payload.extend_from_slice(&dns_bytes);
    let mid = tcp_payload.len() / 2;

    let frame1 = tcp_frame(40_000, 53, 1000, &tcp_payload[..mid], true, false);
    let frame2 = tcp_frame(
        40_000,
        53,
        1000 + mid as u32,
        &tcp_payload[mid..],
        false,
        false,
    );

    let results = run_to_completion(vec![frame1, frame2]);
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].protocol, Transport::Tcp);
}

fn tcp_frame(
    src_port: u16,
    dst_port: u16,
    sequence: u32,
    payload: &[u8],
    syn: bool,
    fin: bool,
) -> Frame {
    let mut tcp = BytesMut::new();
    tcp.extend_from_slice(&src_port.to_be_bytes());
    tcp.extend_from_slice(&dst_port.to_be_bytes());
    tcp.extend_from_slice(&sequence.to_be_bytes());
    tcp.extend_from_slice(&0u32.to_be_bytes()); // ack number, unused
    let data_offset = 5u8; // no TCP options
    tcp.extend_from_slice(&[data_offset << 4, flags(syn, fin)]);
    tcp.extend_from_slice(&[0u8; 4]); // window, checksum placeholder
    tcp.extend_from_slice(&[0u8; 2]); // urgent pointer
    tcp.extend_from_slice(payload);

    let ip = ipv4_header(
        (20 + tcp.len()) as u16,
        1,
        0,
        6,
        Ipv4Addr::new(10, 0, 0, 1),
        Ipv4Addr::new(10, 0, 0, 2),
    );
    let mut eth = ethernet_header(0x0800);
    eth.extend_from_slice(&ip);
    eth.extend_from_slice(&tcp);
    Frame::new(LinkType::Ethernet, eth.freeze())
}

fn flags(syn: bool, fin: bool) -> u8 {
    let mut f = 0u8;
    if fin {
        f |= 0x01;
    }
    if syn {
        f |= 0x02;
    }
    f
}
