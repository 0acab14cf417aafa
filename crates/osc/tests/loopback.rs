use std::net::{Ipv4Addr, SocketAddr, UdpSocket};
use std::sync::Arc;
use std::sync::atomic::{AtomicU16, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, unbounded};
use parking_lot::Mutex;

use oscport::{
    Capsule, Message, OscError, OscPort, OscReceiver, OscSender, PortConfig, ReceiveMode,
    ReceiverConfig,
};

static PORT_COUNTER: AtomicU16 = AtomicU16::new(41000);

fn next_port() -> u16 {
    PORT_COUNTER.fetch_add(1, Ordering::SeqCst)
}

fn local(port: u16) -> SocketAddr {
    SocketAddr::from((Ipv4Addr::LOCALHOST, port))
}

fn receiver_on(port: u16) -> OscReceiver {
    OscReceiver::with_config(ReceiverConfig {
        bind_address: Ipv4Addr::LOCALHOST,
        local_port: port,
        ..Default::default()
    })
    .unwrap()
}

fn collect(receiver: &OscReceiver) -> Receiver<Capsule> {
    let (tx, rx) = unbounded();
    receiver.add_receiver(move |capsule| {
        let _ = tx.send(capsule.clone());
    });
    rx
}

fn wait_until(timeout_ms: u64, mut done: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < Duration::from_millis(timeout_ms) {
        if done() {
            return true;
        }
        thread::sleep(Duration::from_millis(1));
    }
    done()
}

#[test]
fn test_ping_reaches_receiver() {
    let port = next_port();
    let receiver = receiver_on(port);
    let received = collect(&receiver);

    let sender = OscSender::to_host("127.0.0.1", port).unwrap();
    sender.send_message(&Message::new("/ping")).unwrap();

    let capsule = received
        .recv_timeout(Duration::from_secs(2))
        .expect("No capsule received");
    assert_eq!(&*capsule.message.path, "/ping");
    assert!(capsule.message.args.is_empty());
    assert_eq!(capsule.remote.port(), sender.local_addr().port());
    assert_eq!(capsule.local, local(port));
}

#[test]
fn test_async_sends_arrive_in_order() {
    let port = next_port();
    let receiver = receiver_on(port);
    let received = collect(&receiver);

    let sender = OscSender::new(Some(local(port))).unwrap();
    for i in 0..100 {
        let bytes = Message::new("/seq").arg(i).encode().unwrap();
        sender.send_async(bytes).unwrap();
    }

    for expected in 0..100 {
        let capsule = received
            .recv_timeout(Duration::from_secs(2))
            .expect("Missing datagram");
        assert_eq!(capsule.message.args[0].as_int(), Some(expected));
    }
    sender.dispose();
    assert_eq!(sender.socket().stats().datagrams_sent, 100);
}

#[test]
fn test_double_dispose_releases_port() {
    let port = next_port();
    let receiver = receiver_on(port);
    let sender = OscSender::new(Some(local(port))).unwrap();
    sender.send_async(Message::new("/x").encode().unwrap()).unwrap();

    receiver.dispose();
    receiver.dispose();
    sender.dispose();
    sender.dispose();
    assert!(receiver.is_disposed());
    assert!(sender.is_disposed());

    // The reader has exited and dropped its handle, so the port is free.
    let again = receiver_on(port);
    again.dispose();
}

#[test]
fn test_dispose_from_inside_handler() {
    let port = next_port();
    let receiver = Arc::new(receiver_on(port));
    let (tx, rx) = unbounded();

    let inner = Arc::downgrade(&receiver);
    receiver.add_receiver(move |_| {
        if let Some(receiver) = inner.upgrade() {
            receiver.dispose();
        }
        let _ = tx.send(());
    });

    let sender = OscSender::new(Some(local(port))).unwrap();
    sender.send_message(&Message::new("/stop")).unwrap();
    rx.recv_timeout(Duration::from_secs(2)).expect("Handler never ran");
    assert!(receiver.is_disposed());
}

#[test]
fn test_malformed_datagram_does_not_stop_reader() {
    let port = next_port();
    let receiver = receiver_on(port);
    let received = collect(&receiver);
    let errors = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&errors);
    receiver.add_error(move |e| sink.lock().push(e.clone()));

    let raw = UdpSocket::bind("127.0.0.1:0").unwrap();
    // Declares an int argument but carries no payload.
    raw.send_to(b"/bad\0\0\0\0,i\0\0", local(port)).unwrap();
    // Blob length far beyond the datagram.
    raw.send_to(b"/blob\0\0\0,b\0\0\x7f\xff\xff\xff", local(port))
        .unwrap();
    raw.send_to(&Message::new("/ok").arg(1).encode().unwrap(), local(port))
        .unwrap();

    let capsule = received
        .recv_timeout(Duration::from_secs(2))
        .expect("Reader stopped after malformed input");
    assert_eq!(&*capsule.message.path, "/ok");
    assert!(received.try_recv().is_err());

    assert!(wait_until(1000, || errors.lock().len() == 2));
    assert!(errors
        .lock()
        .iter()
        .all(|e| matches!(e, OscError::Decode(_))));
    assert_eq!(receiver.socket().stats().malformed_datagrams, 2);
}

#[test]
fn test_sender_without_remote() {
    let sender = OscSender::new(None).unwrap();
    assert!(matches!(
        sender.send_message(&Message::new("/nowhere")),
        Err(OscError::NoDefaultRemote)
    ));
}

fn port_config(mode: ReceiveMode, port: u16, limit: usize) -> PortConfig {
    PortConfig {
        receive_mode: mode,
        bind_address: Ipv4Addr::LOCALHOST,
        local_port: port,
        default_remote_host: "127.0.0.1".into(),
        default_remote_port: port,
        limit_receive_buffer: limit,
        ..Default::default()
    }
}

#[test]
fn test_port_poll_mode_limits_queue() {
    let port_number = next_port();
    let port = OscPort::start(port_config(ReceiveMode::Poll, port_number, 3)).unwrap();
    assert_eq!(port.default_remote(), Some(local(port_number)));

    for i in 0..5 {
        port.send_message(&Message::new("/poll").arg(i)).unwrap();
    }
    assert!(wait_until(2000, || port.socket().stats().datagrams_received == 5));
    assert_eq!(port.drain_pending(), 0);

    let capsules = port.poll_received();
    let values: Vec<_> = capsules
        .iter()
        .map(|c| c.message.args[0].as_int().unwrap())
        .collect();
    assert_eq!(values, [0, 1, 2]);
    assert!(port.poll_received().is_empty());

    let diagnostics = port.diagnostics();
    assert_eq!(diagnostics.stats.dropped_capsules, 2);
    assert_eq!(diagnostics.stats.datagrams_sent, 5);
    port.dispose();
    port.dispose();
}

#[test]
fn test_port_event_mode_dispatches_on_caller_thread() {
    let port_number = next_port();
    let port = OscPort::start(port_config(ReceiveMode::Event, port_number, 0)).unwrap();

    let seen = Arc::new(Mutex::new(Vec::new()));
    let record = Arc::clone(&seen);
    port.add_receiver(move |capsule| {
        record
            .lock()
            .push((capsule.message.path.to_string(), thread::current().id()));
    });
    let errors = Arc::new(Mutex::new(0));
    let count = Arc::clone(&errors);
    port.add_error(move |_| *count.lock() += 1);

    port.send_message(&Message::new("/event")).unwrap();
    port.send(b"not osc".to_vec()).unwrap();
    port.send_message(&Message::new("/event")).unwrap();

    let mut delivered = 0;
    assert!(wait_until(2000, || {
        delivered += port.drain_pending();
        delivered == 2 && *errors.lock() == 1
    }));

    let caller = thread::current().id();
    assert!(seen
        .lock()
        .iter()
        .all(|(path, id)| path == "/event" && *id == caller));
    assert!(port.poll_errors().is_empty());
}

#[test]
fn test_port_rejects_sends_after_dispose() {
    let port_number = next_port();
    let port = OscPort::start(port_config(ReceiveMode::Event, port_number, 10)).unwrap();
    port.stop();
    assert!(matches!(
        port.send(b"/x\0\0,\0\0\0".to_vec()),
        Err(OscError::Disposed)
    ));
}

#[test]
fn test_datagram_larger_than_buffer_is_delivered() {
    let port = next_port();
    let receiver = OscReceiver::with_config(ReceiverConfig {
        bind_address: Ipv4Addr::LOCALHOST,
        local_port: port,
        buffer_size: 16,
        ..Default::default()
    })
    .unwrap();
    let received = collect(&receiver);

    let payload: Vec<u8> = (0..3000u32).map(|i| (i % 251) as u8).collect();
    let sender = OscSender::new(Some(local(port))).unwrap();
    sender
        .send_message(&Message::new("/big").arg(payload.clone()).arg("tail"))
        .unwrap();

    let capsule = received
        .recv_timeout(Duration::from_secs(2))
        .expect("Large datagram not delivered");
    assert_eq!(&*capsule.message.path, "/big");
    assert_eq!(capsule.message.args[0].as_blob(), Some(payload.as_slice()));
    assert_eq!(capsule.message.args[1].as_str(), Some("tail"));
    assert_eq!(receiver.socket().stats().malformed_datagrams, 0);
}

#[test]
fn test_port_path_receivers_take_first_match() {
    let port_number = next_port();
    let port = OscPort::start(port_config(ReceiveMode::Event, port_number, 0)).unwrap();

    let calls = Arc::new(Mutex::new(Vec::new()));
    let c = Arc::clone(&calls);
    port.add_path_receiver("/fader", move |m| {
        c.lock().push(format!("fader:{}", m.args[0]));
    });
    let c = Arc::clone(&calls);
    port.add_path_receiver("/fader", move |_| c.lock().push("shadowed".to_string()));
    let c = Arc::clone(&calls);
    port.add_path_receiver("/button", move |_| c.lock().push("button".to_string()));
    let all = Arc::new(Mutex::new(0));
    let a = Arc::clone(&all);
    port.add_receiver(move |_| *a.lock() += 1);

    port.send_message(&Message::new("/fader").arg(0.5f32)).unwrap();
    port.send_message(&Message::new("/other")).unwrap();
    port.send_message(&Message::new("/button")).unwrap();

    let mut delivered = 0;
    assert!(wait_until(2000, || {
        delivered += port.drain_pending();
        delivered == 3
    }));

    assert_eq!(*all.lock(), 3);
    assert_eq!(*calls.lock(), ["fader:0.5", "button"]);
}
