use std::{
    net::{IpAddr, Ipv4Addr},
    num::NonZero,
};

use facet::Facet;
use facet_copy::CopyErrorKind;

#[derive(Facet, Clone, Debug, PartialEq)]
struct Endpoint {
    host: String,
    addr: IpAddr,
    port: NonZero<u16>,
    fallback_port: Option<NonZero<u16>>,
}

fn endpoint() -> Endpoint {
    Endpoint {
        host: "before".to_string(),
        addr: IpAddr::V4(Ipv4Addr::LOCALHOST),
        port: NonZero::new(80).unwrap(),
        fallback_port: None,
    }
}

#[derive(Facet, Clone, Debug)]
struct RawEndpoint {
    host: String,
    addr: String,
    port: u32,
    fallback_port: u16,
}

fn raw(addr: &str, port: u32) -> RawEndpoint {
    RawEndpoint {
        host: "db".to_string(),
        addr: addr.to_string(),
        port,
        fallback_port: 8080,
    }
}

#[test]
fn fields_are_decoded_from_source_values() {
    let mut dest = endpoint();
    facet_copy::copy(&mut dest, &raw("10.1.2.3", 5432)).unwrap();

    assert_eq!(dest.host, "db");
    assert_eq!(dest.addr, IpAddr::V4(Ipv4Addr::new(10, 1, 2, 3)));
    assert_eq!(dest.port.get(), 5432);
    assert_eq!(dest.fallback_port.map(NonZero::get), Some(8080));
}

#[test]
fn borrowed_text_is_parsed() {
    #[derive(Facet, Clone, Debug)]
    struct Static {
        addr: &'static str,
    }

    let mut dest = endpoint();
    facet_copy::copy(&mut dest, &Static { addr: "::1" }).unwrap();
    assert_eq!(dest.addr, "::1".parse::<IpAddr>().unwrap());
}

#[test]
fn rejected_conversion_is_reported_and_destination_kept() {
    let mut dest = endpoint();
    let err = facet_copy::copy(&mut dest, &raw("10.1.2.3", 0)).unwrap_err();

    match err.kind() {
        CopyErrorKind::Decode { path, .. } => assert!(path.contains("port"), "path: {path}"),
        other => panic!("expected a decode error, got {other:?}"),
    }
    assert_eq!(dest, endpoint());
}

#[test]
fn unparsable_text_is_reported() {
    let mut dest = endpoint();
    let err = facet_copy::copy(&mut dest, &raw("not an address", 5432)).unwrap_err();

    assert!(matches!(err.kind(), CopyErrorKind::Decode { .. }), "{err}");
    assert!(err.to_string().contains("addr"), "{err}");
    assert_eq!(dest, endpoint());
}

#[test]
fn unusable_decode_input_is_skipped() {
    #[derive(Facet, Clone, Debug)]
    struct Flags {
        host: String,
        addr: bool,
        port: bool,
    }

    let mut dest = endpoint();
    facet_copy::copy(
        &mut dest,
        &Flags {
            host: "flags".to_string(),
            addr: true,
            port: false,
        },
    )
    .unwrap();

    assert_eq!(dest.host, "flags");
    assert_eq!(dest.addr, endpoint().addr);
    assert_eq!(dest.port, endpoint().port);
}

#[test]
fn text_is_not_parsed_into_numbers() {
    #[derive(Facet, Clone, Debug)]
    struct Text {
        port: String,
    }

    let mut dest = endpoint();
    facet_copy::copy(
        &mut dest,
        &Text {
            port: "443".to_string(),
        },
    )
    .unwrap();
    assert_eq!(dest.port.get(), 80);
}
