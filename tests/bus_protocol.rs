mod common;

use common::{array, bus, exchange, FakePort};
use opc_mox_shield::Sampler;

#[test]
fn echo_round_trip() {
    let (opc_s, mox_s) = (Sampler::new(), Sampler::new());
    let mut array = array(&opc_s, &mox_s);
    let mut bus = bus();
    let mut port = FakePort::default();

    assert_eq!(exchange(&mut bus, &mut port, &mut array, b"[02AE]", 0), "(02AE)");
}

#[test]
fn foreign_frame_is_ignored_without_side_effects() {
    let (opc_s, mox_s) = (Sampler::new(), Sampler::new());
    let mut array = array(&opc_s, &mox_s);
    let mut bus = bus();
    let mut port = FakePort::default();

    assert_eq!(exchange(&mut bus, &mut port, &mut array, b"[02BXYZ]", 0), "");
    assert!(bus.link().is_idle());
    assert_eq!(exchange(&mut bus, &mut port, &mut array, b"[02AE]", 10), "(02AE)");
}

#[test]
fn back_to_back_frames_get_one_reply_each() {
    let (opc_s, mox_s) = (Sampler::new(), Sampler::new());
    let mut array = array(&opc_s, &mox_s);
    let mut bus = bus();
    let mut port = FakePort::default();

    let replies = exchange(&mut bus, &mut port, &mut array, b"[02AQ00][02AN15]", 0);
    assert_eq!(replies, "(02AQ000A)(02AN1501)");
}

#[test]
fn short_payload_yields_single_error() {
    let (opc_s, mox_s) = (Sampler::new(), Sampler::new());
    let mut array = array(&opc_s, &mox_s);
    let mut bus = bus();
    let mut port = FakePort::default();

    assert_eq!(exchange(&mut bus, &mut port, &mut array, b"[02AP03]", 0), "(02A*)");
    assert_eq!(exchange(&mut bus, &mut port, &mut array, b"[02AK]", 0), "(02A*)");
    assert_eq!(exchange(&mut bus, &mut port, &mut array, b"[02AQ40]", 0), "(02A*)");
}

#[test]
fn name_inquiry() {
    let (opc_s, mox_s) = (Sampler::new(), Sampler::new());
    let mut array = array(&opc_s, &mox_s);
    let mut bus = bus();
    let mut port = FakePort::default();

    // "OPC_PM1\0"
    assert_eq!(
        exchange(&mut bus, &mut port, &mut array, b"[02AI10]", 0),
        "(02AI104F50435F504D3100)"
    );
}

#[test]
fn settings_survive_save_and_load() {
    let (opc_s, mox_s) = (Sampler::new(), Sampler::new());
    let mut array = array(&opc_s, &mox_s);
    let mut bus = bus();
    let mut port = FakePort::default();

    assert_eq!(exchange(&mut bus, &mut port, &mut array, b"[02AP1514]", 0), "(02AP15)");
    assert_eq!(exchange(&mut bus, &mut port, &mut array, b"[02AO150F]", 0), "(02AO15)");
    assert_eq!(exchange(&mut bus, &mut port, &mut array, b"[02AW15]", 0), "(02AW15)");

    assert_eq!(exchange(&mut bus, &mut port, &mut array, b"[02AP1532]", 0), "(02AP15)");
    assert_eq!(exchange(&mut bus, &mut port, &mut array, b"[02AO1501]", 0), "(02AO15)");
    assert_eq!(exchange(&mut bus, &mut port, &mut array, b"[02AL15]", 0), "(02AL15)");

    assert_eq!(exchange(&mut bus, &mut port, &mut array, b"[02AQ15]", 0), "(02AQ1514)");
    assert_eq!(exchange(&mut bus, &mut port, &mut array, b"[02AN15]", 0), "(02AN150F)");
}
