//! End-to-end dissection tests.
//!
//! These tests drive the full pipeline — decode chain, fragment routing,
//! reassembly, eviction — through hand-built Ethernet frames, the way an
//! embedding capture reader would.

use dissect_core::{
    decode_frame, default_registry, DissectConfig, Dissector, Frame, OverlapPolicy,
    ReassemblyKey, ReassemblyStatus, Terminal,
};

// ============================================================================
// Frame builders
// ============================================================================

fn eth_header(ethertype: u16) -> Vec<u8> {
    let mut f = Vec::new();
    f.extend_from_slice(&[0x00, 0x11, 0x22, 0x33, 0x44, 0x55]);
    f.extend_from_slice(&[0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff]);
    f.extend_from_slice(&ethertype.to_be_bytes());
    f
}

/// Ethernet + IPv4 frame. `offset_units` is in 8-octet wire units.
fn ipv4_frame(
    protocol: u8,
    ident: u16,
    offset_units: u16,
    more_fragments: bool,
    payload: &[u8],
) -> Vec<u8> {
    let mut f = eth_header(0x0800);
    let total_len = (20 + payload.len()) as u16;
    let flags_frag = offset_units | if more_fragments { 0x2000 } else { 0 };

    f.extend_from_slice(&[0x45, 0x00]);
    f.extend_from_slice(&total_len.to_be_bytes());
    f.extend_from_slice(&ident.to_be_bytes());
    f.extend_from_slice(&flags_frag.to_be_bytes());
    f.push(64); // TTL
    f.push(protocol);
    f.extend_from_slice(&[0x00, 0x00]); // checksum (unvalidated here)
    f.extend_from_slice(&[0x0a, 0x00, 0x00, 0x01]);
    f.extend_from_slice(&[0x0a, 0x00, 0x00, 0x02]);
    f.extend_from_slice(payload);
    f
}

/// Ethernet + IPv4 + TCP frame carrying `payload` at `seq`.
fn tcp_frame(src_port: u16, dst_port: u16, seq: u32, payload: &[u8]) -> Vec<u8> {
    let mut segment = Vec::new();
    segment.extend_from_slice(&src_port.to_be_bytes());
    segment.extend_from_slice(&dst_port.to_be_bytes());
    segment.extend_from_slice(&seq.to_be_bytes());
    segment.extend_from_slice(&0u32.to_be_bytes());
    segment.extend_from_slice(&[0x50, 0x10]); // data offset 5, ACK
    segment.extend_from_slice(&[0x10, 0x00, 0x00, 0x00, 0x00, 0x00]);
    segment.extend_from_slice(payload);
    ipv4_frame(6, 1, 0, false, &segment)
}

// ============================================================================
// Chain termination
// ============================================================================

#[test]
fn chain_terminates_for_arbitrary_bytes() {
    let registry = default_registry().unwrap();
    let config = DissectConfig::default();

    // Empty, tiny, random-ish, and truncated-header buffers all end in a
    // clean terminal
    let mut cases: Vec<Vec<u8>> = vec![
        Vec::new(),
        vec![0x00],
        vec![0xff; 5],
        (0..=255u8).collect(),
        eth_header(0x0800), // IPv4 claimed, zero bytes behind it
    ];
    let mut truncated = ipv4_frame(6, 1, 0, false, &[0; 40]);
    truncated.truncate(30);
    cases.push(truncated);

    for (i, bytes) in cases.iter().enumerate() {
        let frame = Frame::new(i as u64, 0, bytes, 1);
        let dissection = decode_frame(&registry, &config, &frame);

        assert!(
            matches!(
                dissection.chain.terminal,
                Terminal::NoPayload | Terminal::Raw { .. }
            ),
            "case {i} ended at {:?}",
            dissection.chain.terminal
        );
        assert!(dissection.chain.protocols.len() <= config.max_depth);
    }
}

#[test]
fn depth_bound_is_exact() {
    let registry = default_registry().unwrap();
    let mut config = DissectConfig::default();
    config.max_depth = 5;

    // 12 stacked 802.1Q tags, far deeper than the bound
    let mut bytes = eth_header(0x8100);
    for _ in 0..11 {
        bytes.extend_from_slice(&[0x00, 0x2a, 0x81, 0x00]);
    }
    bytes.extend_from_slice(&[0x00, 0x2a, 0x08, 0x00]);

    let dissection = decode_frame(&registry, &config, &Frame::new(0, 0, &bytes, 1));

    assert_eq!(dissection.chain.terminal, Terminal::DepthExceeded);
    assert_eq!(dissection.chain.protocols.len(), 5);
    assert_eq!(dissection.chain.protocols[0], "ethernet");
    assert!(dissection.chain.protocols[1..].iter().all(|&p| p == "vlan"));
}

// ============================================================================
// IP reassembly
// ============================================================================

/// A 496-byte datagram split [0,96) / [96,296) / [296,496). Non-final
/// fragment lengths stay multiples of 8 so wire offsets line up.
fn canonical_fragments() -> (Vec<u8>, [Vec<u8>; 3]) {
    let mut datagram = Vec::with_capacity(496);
    for i in 0..496u32 {
        datagram.push((i % 251) as u8);
    }
    let frames = [
        ipv4_frame(17, 0x0042, 0, true, &datagram[0..96]),
        ipv4_frame(17, 0x0042, 96 / 8, true, &datagram[96..296]),
        ipv4_frame(17, 0x0042, 296 / 8, false, &datagram[296..496]),
    ];
    (datagram, frames)
}

#[test]
fn ip_reassembly_completes_in_all_permutations() {
    let orders: [[usize; 3]; 6] = [
        [0, 1, 2],
        [0, 2, 1],
        [1, 0, 2],
        [1, 2, 0],
        [2, 0, 1],
        [2, 1, 0],
    ];

    for order in orders {
        let mut dissector = Dissector::new().unwrap();
        let (datagram, frames) = canonical_fragments();

        let mut completed_payload = None;
        for (n, &i) in order.iter().enumerate() {
            let out = dissector.process_frame(&Frame::new(n as u64, 0, &frames[i], 1));
            let complete: Vec<_> = out.completed().collect();

            if n < 2 {
                assert!(
                    complete.is_empty(),
                    "order {order:?} completed after {} fragments",
                    n + 1
                );
            } else {
                assert_eq!(complete.len(), 1, "order {order:?} did not complete");
                completed_payload = Some(complete[0].payload.clone());
            }
        }

        assert_eq!(
            completed_payload.as_deref(),
            Some(&datagram[..]),
            "order {order:?} produced wrong bytes"
        );
    }
}

#[test]
fn ip_overlap_first_received_wins() {
    let mut dissector = Dissector::new().unwrap();
    assert_eq!(
        dissector.config().reassembly.overlap,
        OverlapPolicy::FirstWins
    );

    // Fragment A covers [0, 200) with 0xAA; overlapping fragment B covers
    // [144, 344) with 0xBB and ends the datagram
    let a = ipv4_frame(17, 9, 0, true, &[0xaa; 200]);
    let b = ipv4_frame(17, 9, 144 / 8, false, &[0xbb; 200]);

    dissector.process_frame(&Frame::new(0, 0, &a, 1));
    let out = dissector.process_frame(&Frame::new(1, 0, &b, 1));

    let complete: Vec<_> = out.completed().collect();
    assert_eq!(complete.len(), 1);
    let payload = &complete[0].payload;
    assert_eq!(payload.len(), 344);
    // A's bytes survive across the contested [144, 200) region
    assert!(payload[..200].iter().all(|&b| b == 0xaa));
    assert!(payload[200..].iter().all(|&b| b == 0xbb));
}

#[test]
fn reassembled_datagram_resumes_transport_decode() {
    let mut dissector = Dissector::new().unwrap();

    // UDP datagram: header + 16-byte body, split into two fragments
    let mut datagram = Vec::new();
    datagram.extend_from_slice(&53u16.to_be_bytes());
    datagram.extend_from_slice(&5353u16.to_be_bytes());
    datagram.extend_from_slice(&24u16.to_be_bytes());
    datagram.extend_from_slice(&[0, 0]);
    datagram.extend_from_slice(&[0x77; 16]);

    let first = ipv4_frame(17, 3, 0, true, &datagram[..16]);
    let second = ipv4_frame(17, 3, 2, false, &datagram[16..]);

    dissector.process_frame(&Frame::new(0, 0, &first, 1));
    let out = dissector.process_frame(&Frame::new(1, 0, &second, 1));

    let complete: Vec<_> = out.completed().collect();
    assert_eq!(complete.len(), 1);
    assert_eq!(complete[0].chain.protocols, vec!["udp"]);
    let (_, udp_fields) = &complete[0].layers[0];
    assert!(udp_fields
        .iter()
        .any(|(name, value)| *name == "dst_port" && value.as_u64() == Some(5353)));
}

// ============================================================================
// TCP stream reassembly
// ============================================================================

#[test]
fn tcp_left_edge_advancement() {
    let mut dissector = Dissector::new().unwrap();

    let first = vec![0x31; 100]; // [1000, 1100)
    let middle = vec![0x32; 200]; // [1100, 1300)
    let ahead = vec![0x33; 100]; // [1300, 1400)

    // Arrival order: 1000, 1300, 1100
    let bytes = tcp_frame(40000, 80, 1000, &first);
    let out = dissector.process_frame(&Frame::new(0, 0, &bytes, 1));
    let emitted: Vec<_> = out.completed().collect();
    assert_eq!(emitted[0].payload, first);

    let bytes = tcp_frame(40000, 80, 1300, &ahead);
    let out = dissector.process_frame(&Frame::new(1, 0, &bytes, 1));
    assert!(out.completed().next().is_none());
    assert_eq!(out.reassembled[0].status, ReassemblyStatus::Pending);

    let bytes = tcp_frame(40000, 80, 1100, &middle);
    let out = dissector.process_frame(&Frame::new(2, 0, &bytes, 1));
    let emitted: Vec<_> = out.completed().collect();
    assert_eq!(emitted.len(), 1);

    // The hole fill cascades: [1100, 1400) in one in-order run
    let mut expected = middle.clone();
    expected.extend_from_slice(&ahead);
    assert_eq!(emitted[0].payload, expected);
    assert!(matches!(emitted[0].key, ReassemblyKey::Tcp(_)));
}

#[test]
fn tcp_streams_keyed_by_four_tuple() {
    let mut dissector = Dissector::new().unwrap();

    let bytes = tcp_frame(1111, 80, 0, b"one");
    let out = dissector.process_frame(&Frame::new(0, 0, &bytes, 1));
    assert_eq!(out.completed().next().unwrap().payload, b"one");

    // Different source port, independent stream
    let bytes = tcp_frame(2222, 80, 500, b"two");
    let out = dissector.process_frame(&Frame::new(1, 0, &bytes, 1));
    assert_eq!(out.completed().next().unwrap().payload, b"two");
}

// ============================================================================
// Eviction
// ============================================================================

#[test]
fn idle_key_evicted_and_restarted_fresh() {
    let mut config = DissectConfig::default();
    config.reassembly.eviction.max_idle_frames = 10;
    let mut dissector = Dissector::with_config(config).unwrap();

    // Incomplete datagram, then a long quiet gap
    let stale = ipv4_frame(17, 0x0099, 0, true, &[0x11; 64]);
    dissector.process_frame(&Frame::new(0, 0, &stale, 1));

    let unrelated = tcp_frame(4000, 80, 1, b"x");
    let out = dissector.process_frame(&Frame::new(50, 0, &unrelated, 1));
    assert!(out
        .reassembled
        .iter()
        .any(|r| r.status == ReassemblyStatus::EvictedIncomplete
            && matches!(r.key, ReassemblyKey::Ip(_))));

    // The same ident now starts a fresh buffer: the old [0, 64) bytes are
    // gone, so a closing fragment alone does not complete
    let tail = ipv4_frame(17, 0x0099, 8, false, &[0x22; 64]);
    let out = dissector.process_frame(&Frame::new(51, 0, &tail, 1));
    assert!(out.completed().next().is_none());
}

// ============================================================================
// Registry determinism
// ============================================================================

#[test]
fn identical_frames_decode_identically() {
    let registry = default_registry().unwrap();
    let config = DissectConfig::default();
    let bytes = tcp_frame(40000, 443, 7, b"payload");

    let reference = decode_frame(&registry, &config, &Frame::new(0, 0, &bytes, 1));
    for _ in 0..20 {
        let again = decode_frame(&registry, &config, &Frame::new(0, 0, &bytes, 1));
        assert_eq!(again.chain, reference.chain);
        assert_eq!(again.layers.len(), reference.layers.len());
        for ((name_a, layer_a), (name_b, layer_b)) in
            again.layers.iter().zip(reference.layers.iter())
        {
            assert_eq!(name_a, name_b);
            assert_eq!(layer_a.fields, layer_b.fields);
        }
    }
}
