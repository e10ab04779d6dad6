//! Drive `ModbusTcpCoilWriter` against a tiny in-process Modbus/TCP server.

use std::io::{Read, Write};
use std::net::TcpListener;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use shutter_hardware::HwError;
use shutter_hardware::ModbusTcpCoilWriter;
use shutter_traits::CoilWriter;

/// Serve `n` requests on one connection. `reply` maps a request frame to the
/// bytes sent back. Every received frame is forwarded on the channel.
fn serve(
    n: usize,
    reply: impl Fn(&[u8; 12]) -> Vec<u8> + Send + 'static,
) -> (u16, mpsc::Receiver<[u8; 12]>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let (mut sock, _) = listener.accept().unwrap();
        for _ in 0..n {
            let mut req = [0u8; 12];
            if sock.read_exact(&mut req).is_err() {
                return;
            }
            tx.send(req).unwrap();
            sock.write_all(&reply(&req)).unwrap();
        }
    });
    (port, rx)
}

#[test]
fn writes_are_echoed_and_acknowledged() {
    let (port, rx) = serve(2, |req| req.to_vec());
    let mut w = ModbusTcpCoilWriter::new("main", "127.0.0.1", port, Duration::from_secs(2));

    w.write_coil("main", 3, 17, false).unwrap();
    w.write_coil("main", 3, 16, true).unwrap();

    let first = rx.recv().unwrap();
    let second = rx.recv().unwrap();
    assert_eq!(first[6], 3);
    assert_eq!(u16::from_be_bytes([first[8], first[9]]), 17);
    assert_eq!(&first[10..], &[0x00, 0x00]);
    assert_eq!(u16::from_be_bytes([second[8], second[9]]), 16);
    assert_eq!(&second[10..], &[0xFF, 0x00]);
    // transaction ids advance
    assert_ne!(first[0..2], second[0..2]);
}

#[test]
fn exception_response_surfaces_as_typed_error() {
    let (port, _rx) = serve(1, |req| {
        vec![req[0], req[1], 0, 0, 0, 3, req[6], 0x85, 0x02]
    });
    let mut w = ModbusTcpCoilWriter::new("main", "127.0.0.1", port, Duration::from_secs(2));

    let err = w.write_coil("main", 1, 99, true).unwrap_err();
    match err.downcast_ref::<HwError>() {
        Some(HwError::Exception(2)) => {}
        other => panic!("expected illegal data address exception, got {other:?}"),
    }
}

#[test]
fn silent_server_times_out() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let _server = thread::spawn(move || {
        let (_sock, _) = listener.accept().unwrap();
        thread::sleep(Duration::from_millis(500));
    });
    let mut w = ModbusTcpCoilWriter::new("main", "127.0.0.1", port, Duration::from_millis(50));

    let err = w.write_coil("main", 1, 1, true).unwrap_err();
    assert!(
        matches!(err.downcast_ref::<HwError>(), Some(HwError::Timeout)),
        "unexpected error: {err}"
    );
}
