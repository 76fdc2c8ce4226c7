use std::net::IpAddr;
use std::time::SystemTime;

use bytes::Bytes;
use crossbeam_channel::Sender;
use log::{debug, trace, warn};

use super::job::DecoderJob;
use crate::decode::{
    decode_dns_message, decode_ipv4, decode_ipv6, decode_link_layer, decode_tcp, decode_udp,
    IpRouting, L3Payload,
};
use crate::defrag::IpFragmentKind;
use crate::error::DecodeError;
use crate::result::{DNSResult, Transport};
use crate::stats::Stats;
use crate::stream::{FlowKey, TcpSegment};

const PROTO_TCP: u8 = 6;
const PROTO_UDP: u8 = 17;

/// Everything a decoder worker needs to fan its output out to the rest of
/// the pipeline: the two defragger intakes, one intake per TCP assembler
/// shard, and the shared result sink.
pub struct DecoderContext {
    pub dns_port: u16,
    pub ipv4_frag_tx: Sender<crate::defrag::Ipv4Fragment>,
    pub ipv6_frag_tx: Sender<crate::defrag::Ipv6Fragment>,
    pub tcp_tx: Vec<Sender<TcpSegment>>,
    pub result_tx: Sender<DNSResult>,
    pub stats: std::sync::Arc<Stats>,
}

impl DecoderContext {
    fn tcp_shard_for(&self, key: &FlowKey) -> usize {
        crate::stream::shard_index_for(key, self.tcp_tx.len())
    }

    fn send_tcp_segment(&self, segment: TcpSegment) {
        let idx = self.tcp_shard_for(&segment.flow_key);
        // A full shard intake is backpressure working as intended; losing a
        // segment here would only happen if the shard is irrecoverably
        // behind, which the bounded channel already signals upstream.
        let _ = self.tcp_tx[idx].send(segment);
    }
}

/// Processes one [`DecoderJob`], per §4.1's algorithm: peel headers, route
/// fragments and TCP segments to their services, decode UDP DNS directly,
/// and emit zero or more `DNSResult`s.
pub fn process_job(job: DecoderJob, ctx: &DecoderContext) {
    ctx.stats.frames_seen();
    match job {
        DecoderJob::Raw(frame) => {
            let timestamp = frame.timestamp;
            let l3 = match decode_link_layer(&frame) {
                Ok(l3) => l3,
                Err(err) => {
                    trace!("dropping frame: {err}");
                    ctx.stats.frames_dropped_unparseable();
                    return;
                }
            };
            let routing = match l3 {
                L3Payload::Ipv4(payload) => decode_ipv4(&payload, timestamp),
                L3Payload::Ipv6(payload) => decode_ipv6(&payload, timestamp),
            };
            match routing {
                Ok(routing) => dispatch_routing(routing, timestamp, ctx),
                Err(err) => {
                    trace!("dropping frame: {err}");
                    ctx.stats.frames_dropped_unparseable();
                }
            }
        }
        DecoderJob::ReassembledV4(datagram) => dispatch_transport(
            IpAddr::V4(datagram.src),
            IpAddr::V4(datagram.dst),
            datagram.protocol,
            datagram.payload,
            4,
            datagram.timestamp,
            ctx,
        ),
        DecoderJob::ReassembledV6(datagram) => dispatch_transport(
            IpAddr::V6(datagram.src),
            IpAddr::V6(datagram.dst),
            datagram.next_header,
            datagram.payload,
            6,
            datagram.timestamp,
            ctx,
        ),
    }
}

fn dispatch_routing(routing: IpRouting, timestamp: Option<SystemTime>, ctx: &DecoderContext) {
    match routing {
        IpRouting::Fragment(IpFragmentKind::V4(frag)) => {
            let _ = ctx.ipv4_frag_tx.send(frag);
        }
        IpRouting::Fragment(IpFragmentKind::V6(frag)) => {
            let _ = ctx.ipv6_frag_tx.send(frag);
        }
        IpRouting::Complete {
            src,
            dst,
            protocol,
            payload,
        } => {
            let ip_version = if src.is_ipv4() { 4 } else { 6 };
            dispatch_transport(src, dst, protocol, payload, ip_version, timestamp, ctx);
        }
    }
}

fn dispatch_transport(
    src: IpAddr,
    dst: IpAddr,
    protocol: u8,
    payload: Bytes,
    ip_version: u8,
    timestamp: Option<SystemTime>,
    ctx: &DecoderContext,
) {
    match protocol {
        PROTO_UDP => {
            let udp = match decode_udp(&payload) {
                Ok(udp) => udp,
                Err(err) => {
                    trace!("dropping udp datagram: {err}");
                    ctx.stats.frames_dropped_unparseable();
                    return;
                }
            };
            if udp.src_port != ctx.dns_port && udp.dst_port != ctx.dns_port {
                return;
            }
            match decode_dns_message(&udp.payload) {
                Ok(message) => {
                    debug!(
                        "udp dns result src={src}:{} dst={dst}:{}",
                        udp.src_port, udp.dst_port
                    );
                    ctx.stats.dns_results_emitted();
                    let _ = ctx.result_tx.send(DNSResult {
                        timestamp,
                        dns_message: message,
                        ip_version,
                        src_ip: src,
                        dst_ip: dst,
                        src_port: udp.src_port,
                        dst_port: udp.dst_port,
                        protocol: Transport::Udp,
                        packet_length: udp.payload.len(),
                    });
                }
                Err(err) => {
                    warn!("udp dns decode failed src={src} dst={dst}: {err}");
                    ctx.stats.decode_errors();
                }
            }
        }
        PROTO_TCP => {
            let tcp = match decode_tcp(&payload) {
                Ok(tcp) => tcp,
                Err(err) => {
                    trace!("dropping tcp segment: {err}");
                    ctx.stats.frames_dropped_unparseable();
                    return;
                }
            };
            let flow_key = FlowKey::new(src, tcp.src_port, dst, tcp.dst_port);
            if !flow_key.matches_dns_port(ctx.dns_port) {
                return;
            }
            ctx.send_tcp_segment(TcpSegment {
                flow_key,
                sequence: tcp.sequence,
                payload: tcp.payload,
                syn: tcp.syn(),
                fin: tcp.fin(),
                rst: tcp.rst(),
                timestamp,
            });
        }
        other => {
            let err = DecodeError::NotDnsTransport(match other {
                1 => "icmp",
                _ => "other",
            });
            trace!("ignoring transport src={src} dst={dst}: {err}");
        }
    }
}
