//! End-to-end checks of the telemetry envelopes: byte-stable round trips
//! through the monitor entry and batch codecs, validation gates, and the
//! bucket filter contract.

use pv_protocol::{Advertisement, PeerId, PongMessage};
use pv_monitor::{
    MonitorEntry, MonitorError, MonitorMessage, MonitorMessageType, PeerviewMonitorEntry,
    RdvConfig,
};

fn valid_pong() -> PongMessage {
    let mut pong = PongMessage::new();
    pong.set_peer_id(PeerId::new_unique());
    pong.set_instance_mask("3F2504E0");
    pong.set_target_hash("9A3BCD12");
    pong.set_target_hash_radius("7FFF");
    pong.add_partner_info(PeerId::new_unique(), None, Some("11AA"), Some("7FFF"));
    pong
}

fn full_entry() -> PeerviewMonitorEntry {
    let mut entry = PeerviewMonitorEntry::new_with_context("G1", "S1");
    entry.set_src_peer_id(PeerId::new_unique());
    entry.set_cluster_number(2);
    entry.set_cluster_size(5);
    entry.set_uptime(3_600_000);
    entry.set_rdv_time(1_800_000);
    entry.set_pv_time(900_000);
    entry.set_pv_instance_switches(1);
    entry.set_rdv_switches(3);
    entry.set_promoted_invitations(4);
    entry.set_promoted_edges(2);
    entry.set_rdv_config(RdvConfig::Rendezvous);
    entry.set_pong_msg(&valid_pong()).unwrap();
    entry
}

#[test]
fn test_monitor_entry_roundtrip_is_byte_stable() {
    let original = full_entry();
    let first = original.get_xml();
    let reparsed = PeerviewMonitorEntry::parse(&first).unwrap();
    assert_eq!(first, reparsed.get_xml());
}

#[test]
fn test_monitor_entry_roundtrip_preserves_counters() {
    let original = full_entry();
    let reparsed = PeerviewMonitorEntry::parse(&original.get_xml()).unwrap();

    assert_eq!(reparsed.src_peer_id(), original.src_peer_id());
    assert_eq!(reparsed.cluster_number(), 2);
    assert_eq!(reparsed.cluster_size(), 5);
    assert_eq!(reparsed.uptime(), 3_600_000);
    assert_eq!(reparsed.rdv_time(), 1_800_000);
    assert_eq!(reparsed.pv_time(), 900_000);
    assert_eq!(reparsed.pv_instance_switches(), 1);
    assert_eq!(reparsed.rdv_switches(), 3);
    assert_eq!(reparsed.promoted_invitations(), 4);
    assert_eq!(reparsed.promoted_edges(), 2);
    assert_eq!(reparsed.rdv_config(), RdvConfig::Rendezvous);

    let inner = reparsed.get_pong_msg().unwrap();
    assert_eq!(inner.instance_mask(), Some("3F2504E0"));
    assert_eq!(inner.partners().len(), 1);
}

#[test]
fn test_monitor_entry_validation_gates() {
    let mut entry = PeerviewMonitorEntry::new();
    entry.set_src_peer_id(PeerId::new_unique());
    assert!(matches!(
        entry.validate(),
        Err(MonitorError::InvalidArgument(_))
    ));

    entry.set_pong_msg(&valid_pong()).unwrap();
    assert!(entry.validate().is_ok());

    let mut null_src = PeerviewMonitorEntry::new();
    null_src.set_pong_msg(&valid_pong()).unwrap();
    assert!(matches!(
        null_src.validate(),
        Err(MonitorError::InvalidArgument(_))
    ));
}

#[test]
fn test_monitor_message_roundtrip_is_byte_stable() {
    let mut msg = MonitorMessage::new(MonitorMessageType::Monitor);
    msg.set_peer_id(PeerId::new_unique());
    msg.add_entry(full_entry().to_monitor_entry().unwrap());
    msg.add_entry(MonitorEntry::new(
        "G1",
        "S2",
        Advertisement::new("other", "<other/>"),
    ));
    msg.add_entry(MonitorEntry::new(
        "G2",
        "S1",
        Advertisement::new("other", "<other/>"),
    ));
    msg.set_credential(Some(Advertisement::new("jxta:Cred", "<Cred>tok</Cred>")));

    let first = msg.get_xml();
    let reparsed = MonitorMessage::parse(&first).unwrap();
    assert_eq!(first, reparsed.get_xml());
}

#[test]
fn test_monitor_message_empty_roundtrip() {
    let mut msg = MonitorMessage::new(MonitorMessageType::Status);
    msg.set_peer_id(PeerId::new_unique());
    let first = msg.get_xml();
    let reparsed = MonitorMessage::parse(&first).unwrap();
    assert_eq!(first, reparsed.get_xml());
    assert!(reparsed.get_entries(None).is_empty());
}

#[test]
fn test_embedded_entry_survives_batching() {
    let original = full_entry();
    let mut msg = MonitorMessage::new(MonitorMessageType::Monitor);
    msg.set_peer_id(PeerId::new_unique());
    msg.add_entry(original.to_monitor_entry().unwrap());

    let reparsed = MonitorMessage::parse(&msg.get_xml()).unwrap();
    let entries = reparsed.get_entries(Some("jxta:PV3MonEntry"));
    assert_eq!(entries.len(), 1);

    let unwrapped = PeerviewMonitorEntry::parse(entries[0].payload().get_xml()).unwrap();
    assert_eq!(unwrapped.src_peer_id(), original.src_peer_id());
    let pong = unwrapped.get_pong_msg().unwrap();
    assert_eq!(pong.instance_mask(), Some("3F2504E0"));
}

#[test]
fn test_bucket_filter_scenario() {
    let mut msg = MonitorMessage::new(MonitorMessageType::Monitor);
    msg.set_peer_id(PeerId::new_unique());

    let mut first = full_entry().to_monitor_entry().unwrap();
    first.set_entry_type("jxta:PV3MonEntry");
    let mut second = full_entry().to_monitor_entry().unwrap();
    second.set_entry_type("jxta:PV3MonEntry");
    msg.add_entry(first.clone());
    msg.add_entry(second.clone());
    msg.add_entry(MonitorEntry::new(
        "G1",
        "S2",
        Advertisement::new("other", "<other/>"),
    ));

    let matched = msg.get_entries(Some("jxta:PV3MonEntry"));
    assert_eq!(matched.len(), 2);
    assert_eq!(matched[0], &first);
    assert_eq!(matched[1], &second);

    assert_eq!(msg.get_entries(Some("other")).len(), 1);
    assert!(msg.get_entries(Some("missing")).is_empty());
}

#[test]
fn test_structural_failure_is_hard_error() {
    assert!(PeerviewMonitorEntry::parse("<jxta:PV3MonEntry src_id=\"x\">").is_err());
    assert!(MonitorMessage::parse("<jxta:Monitor><Context id=\"G1\">").is_err());
}
