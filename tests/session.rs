use std::{
    io::{ErrorKind, Write},
    net::TcpListener,
    str::FromStr,
    sync::mpsc,
    time::{Duration, Instant},
};

use rtcm_logger::{
    decoder::encode_frame,
    prelude::{Error, Event, Format, Session, SessionConfig, SessionState, SourceDescriptor},
};

/// Payload starting with the 12 bit `message_type`
fn payload(message_type: u16, size: usize) -> Vec<u8> {
    let mut payload = vec![0u8; size.max(2)];
    payload[0] = (message_type >> 4) as u8;
    payload[1] = ((message_type & 0x0f) << 4) as u8;
    payload
}

fn config() -> SessionConfig {
    SessionConfig::default().with_read_timeout(Duration::from_millis(100))
}

#[test]
fn replay_frames_within_noise() {
    let dir = tempfile::tempdir().unwrap();
    let capture = dir.path().join("capture.rtcm");
    let log = dir.path().join("logs").join("replay.csv");

    let types = [1005u16, 1077, 1087, 1097, 1127, 1230, 1033, 4094];

    let mut stream = Vec::new();
    for (i, msg) in types.iter().enumerate() {
        stream.extend((0..i as u8).map(|b| b.wrapping_mul(37)));
        stream.extend_from_slice(&encode_frame(&payload(*msg, 4 + i * 3)).unwrap());
    }
    stream.extend_from_slice(&[0xd3, 0x00]);

    std::fs::write(&capture, &stream).unwrap();

    let (tx, rx) = mpsc::channel();

    let session = Session::new(config());
    session
        .start(SourceDescriptor::file(&capture), &log, move |event| {
            tx.send(event).unwrap()
        })
        .unwrap();

    let rtm = session.wait().unwrap();
    assert_eq!(session.state(), SessionState::Closed);
    assert_eq!(rtm.messages, types.len() as u64);
    assert_eq!(rtm.warnings, 0);
    assert_eq!(rtm.bytes, stream.len() as u64);

    let events = rx.try_iter().collect::<Vec<_>>();

    let decoded = events
        .iter()
        .filter_map(|event| match event {
            Event::Message(msg) => Some(msg.message_type),
            _ => None,
        })
        .collect::<Vec<_>>();

    assert_eq!(decoded, types.to_vec());

    let end_of_streams = events
        .iter()
        .filter(|event| matches!(event, Event::EndOfStream { .. }))
        .count();

    assert_eq!(end_of_streams, 1);

    match events.last() {
        Some(Event::EndOfStream {
            offset, discarded, ..
        }) => {
            assert_eq!(*offset, stream.len() as u64);
            assert_eq!(*discarded, 2);
        },
        other => panic!("unexpected last event: {:?}", other),
    }

    // messages + end of stream + summary
    let content = std::fs::read_to_string(&log).unwrap();
    assert_eq!(content.lines().count(), types.len() + 2);
}

#[test]
fn corrupted_frame_is_a_warning() {
    let dir = tempfile::tempdir().unwrap();
    let capture = dir.path().join("corrupt.rtcm");
    let log = dir.path().join("corrupt.jsonl");

    let mut frame = encode_frame(&payload(1005, 4)).unwrap();
    let last = frame.len() - 1;
    frame[last] ^= 0xff;

    std::fs::write(&capture, &frame).unwrap();

    let (tx, rx) = mpsc::channel();

    let session = Session::new(config().with_format(Format::Json));
    session
        .start(SourceDescriptor::file(&capture), &log, move |event| {
            tx.send(event).unwrap()
        })
        .unwrap();

    let rtm = session.wait().unwrap();
    assert_eq!(rtm.messages, 0);
    assert_eq!(rtm.warnings, 1);

    let events = rx.try_iter().collect::<Vec<_>>();
    assert_eq!(
        events
            .iter()
            .filter(|e| matches!(e, Event::Message(_)))
            .count(),
        0
    );
    assert_eq!(
        events
            .iter()
            .filter(|e| matches!(e, Event::Warning(_)))
            .count(),
        1
    );

    let content = std::fs::read_to_string(&log).unwrap();
    let first = serde_json::from_str::<serde_json::Value>(content.lines().next().unwrap()).unwrap();
    assert!(first["warning"].as_str().unwrap().contains("crc mismatch"));
}

#[test]
fn connection_failure() {
    let dir = tempfile::tempdir().unwrap();

    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };

    let (tx, rx) = mpsc::channel();

    let session = Session::new(config());

    let result = session.start(
        SourceDescriptor::network("127.0.0.1", port),
        dir.path().join("never.csv"),
        move |event| tx.send(event).unwrap(),
    );

    assert!(matches!(result, Err(Error::Connection { .. })));
    assert_eq!(session.state(), SessionState::Closed);
    assert!(!dir.path().join("never.csv").exists());

    // the failure also reaches the event handler, exactly once
    let events = rx.try_iter().collect::<Vec<_>>();
    assert_eq!(events.len(), 1);

    match &events[0] {
        Event::Error {
            name,
            offset,
            error: Error::Connection { .. },
        } => {
            assert_eq!(name, &format!("tcp://127.0.0.1:{}", port));
            assert_eq!(*offset, 0);
        },
        other => panic!("unexpected event: {:?}", other),
    }
    assert!(events[0].is_fatal());

    // sessions are never reused
    let result = session.start(
        SourceDescriptor::network("127.0.0.1", port),
        dir.path().join("never.csv"),
        |_| {},
    );
    assert!(matches!(result, Err(Error::AlreadyRunning)));
}

#[test]
fn start_twice_opens_one_connection() {
    let dir = tempfile::tempdir().unwrap();

    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    let session = Session::new(config());
    let descriptor = SourceDescriptor::network("127.0.0.1", port);

    session
        .start(descriptor.clone(), dir.path().join("first.csv"), |_| {})
        .unwrap();

    let (_peer, _) = listener.accept().unwrap();

    let second = session.start(descriptor.clone(), dir.path().join("second.csv"), |_| {});
    assert!(matches!(second, Err(Error::AlreadyRunning)));
    assert_eq!(session.descriptor(), Some(&descriptor));

    listener.set_nonblocking(true).unwrap();
    match listener.accept() {
        Err(e) => assert_eq!(e.kind(), ErrorKind::WouldBlock),
        Ok(_) => panic!("second connection was opened"),
    }

    session.stop().unwrap();
    session.wait().unwrap();
    assert_eq!(session.state(), SessionState::Closed);
}

#[test]
fn stop_within_one_read_timeout() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("silent.csv");

    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    let (tx, rx) = mpsc::channel();

    let session = Session::new(config());
    session
        .start(SourceDescriptor::network("127.0.0.1", port), &log, move |event| {
            tx.send(event).unwrap()
        })
        .unwrap();

    let (mut peer, _) = listener.accept().unwrap();
    peer.write_all(&encode_frame(&payload(1005, 19)).unwrap()).unwrap();

    // silent peer: several read timeouts elapse
    std::thread::sleep(Duration::from_millis(350));
    assert_eq!(session.state(), SessionState::Running);

    let t = Instant::now();
    session.stop().unwrap();
    assert!(session.state() >= SessionState::Stopping);

    let rtm = session.wait().unwrap();
    assert!(t.elapsed() < Duration::from_millis(600));
    assert_eq!(session.state(), SessionState::Closed);
    assert_eq!(rtm.messages, 1);

    let events = rx.try_iter().collect::<Vec<_>>();
    assert_eq!(events.len(), 1);
    assert!(matches!(&events[0], Event::Message(msg) if msg.station_id().is_some()));

    // log flushed: message + summary
    let content = std::fs::read_to_string(&log).unwrap();
    assert_eq!(content.lines().count(), 2);
}

#[test]
fn end_of_stream_mid_frame() {
    let dir = tempfile::tempdir().unwrap();

    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    let (tx, rx) = mpsc::channel();

    let session = Session::new(config());
    session
        .start(
            SourceDescriptor::network("127.0.0.1", port),
            dir.path().join("eos.csv"),
            move |event| tx.send(event).unwrap(),
        )
        .unwrap();

    {
        let (mut peer, _) = listener.accept().unwrap();
        let frame = encode_frame(&payload(1077, 40)).unwrap();
        peer.write_all(&frame[..20]).unwrap();
        // peer closes here
    }

    let rtm = session.wait().unwrap();
    assert_eq!(session.state(), SessionState::Closed);
    assert_eq!(rtm.messages, 0);

    let events = rx.try_iter().collect::<Vec<_>>();
    assert_eq!(events.len(), 1);

    match &events[0] {
        Event::EndOfStream {
            offset, discarded, ..
        } => {
            assert_eq!(*discarded, 20);
            assert_eq!(*offset, 20);
        },
        other => panic!("unexpected event: {:?}", other),
    }

    assert!(events[0].is_fatal());

    // stop after natural termination has no effect
    session.stop().unwrap();
}

#[test]
fn udp_is_not_supported() {
    assert!(matches!(
        SourceDescriptor::from_str("udp://127.0.0.1:2101"),
        Err(Error::UnsupportedTransport(_))
    ));
}
