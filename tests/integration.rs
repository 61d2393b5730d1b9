//! Integration tests for ampwire.
//!
//! Two connections talk over an in-memory duplex stream.

use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{ready, Context, Poll};
use std::time::Duration;

use ampwire::codec::{Argument, Values};
use ampwire::config::TlsSettings;
use ampwire::handler::{BoxFuture, ResponderError};
use ampwire::protocol::{AmpBox, BoxBuffer};
use ampwire::transport::{
    BoxedStream, RawTransport, RustlsProvider, SwitchedProtocol, TlsProvider, TlsRole,
};
use ampwire::{Amp, AmpBuilder, AmpError, Command};
use bytes::Bytes;
use proptest::prelude::*;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::sync::mpsc;

fn add() -> Command {
    Command::builder("add")
        .argument("a", Argument::Integer)
        .argument("b", Argument::Integer)
        .response("total", Argument::Integer)
        .build()
}

fn divide() -> Command {
    Command::builder("divide")
        .argument("numerator", Argument::Integer)
        .argument("denominator", Argument::Integer)
        .response("result", Argument::Float)
        .error("ZeroDivision", "ZERO_DIVISION")
        .build()
}

fn sleep() -> Command {
    Command::builder("sleep")
        .argument("millis", Argument::Integer)
        .build()
}

fn notify() -> Command {
    Command::builder("notify")
        .argument("message", Argument::Unicode)
        .requires_answer(false)
        .build()
}

fn self_destruct() -> Command {
    Command::builder("self-destruct")
        .fatal_error("Boom", "BOOM")
        .build()
}

fn upgrade() -> Command {
    Command::builder("upgrade")
        .argument("protocol", Argument::Unicode)
        .build()
}

/// A responder side with the math commands registered.
fn math_server() -> AmpBuilder {
    Amp::builder()
        .responder(add(), |args: Values| async move {
            let a = args.get_int("a").unwrap_or(0);
            let b = args.get_int("b").unwrap_or(0);
            Ok(Values::new().with("total", a + b))
        })
        .responder(divide(), |args: Values| async move {
            let n = args.get_int("numerator").unwrap_or(0);
            let d = args.get_int("denominator").unwrap_or(0);
            if d == 0 {
                return Err(ResponderError::new("ZeroDivision", "divide by zero"));
            }
            Ok(Values::new().with("result", n as f64 / d as f64))
        })
        .responder(sleep(), |args: Values| async move {
            let millis = args.get_int("millis").unwrap_or(0) as u64;
            tokio::time::sleep(Duration::from_millis(millis)).await;
            Ok(Values::new())
        })
        .responder(self_destruct(), |_| async move {
            Err::<Values, _>(ResponderError::new("Boom", "goodbye"))
        })
}

fn pair(server: AmpBuilder, client: AmpBuilder) -> (Amp, Amp) {
    let (a, b) = tokio::io::duplex(64 * 1024);
    (server.start(a), client.start(b))
}

fn sum(a: i64, b: i64) -> Values {
    Values::new().with("a", a).with("b", b)
}

#[tokio::test]
async fn test_add() {
    let (_server, client) = pair(math_server(), Amp::builder());

    let answer = client.call_remote(&add(), &sum(3, 4)).unwrap().await.unwrap();

    assert_eq!(answer.get_int("total"), Some(7));
    assert_eq!(client.outstanding(), 0);
}

#[tokio::test]
async fn test_both_sides_call() {
    let (server, client) = pair(math_server(), math_server());

    let from_client = client.call_remote(&add(), &sum(1, 2)).unwrap();
    let from_server = server.call_remote(&add(), &sum(10, 20)).unwrap();

    assert_eq!(from_client.await.unwrap().get_int("total"), Some(3));
    assert_eq!(from_server.await.unwrap().get_int("total"), Some(30));
}

#[tokio::test]
async fn test_declared_error() {
    let (_server, client) = pair(math_server(), Amp::builder());

    let values = Values::new().with("numerator", 1).with("denominator", 0);
    let err = client
        .call_remote(&divide(), &values)
        .unwrap()
        .await
        .unwrap_err();

    match err {
        AmpError::Remote(remote) => {
            assert_eq!(remote.kind, "ZeroDivision");
            assert_eq!(remote.code, "ZERO_DIVISION");
            assert_eq!(remote.description, "divide by zero");
            assert!(!remote.fatal);
        }
        other => panic!("expected a remote error, got {other:?}"),
    }

    let values = Values::new().with("numerator", 1).with("denominator", 4);
    let answer = client.call_remote(&divide(), &values).unwrap().await.unwrap();
    assert_eq!(answer.get_float("result"), Some(0.25));
}

#[tokio::test]
async fn test_unhandled_command() {
    let (_server, client) = pair(Amp::builder(), Amp::builder());

    let err = client
        .call_remote(&add(), &sum(1, 1))
        .unwrap()
        .await
        .unwrap_err();

    assert!(matches!(err, AmpError::UnhandledCommand { .. }), "{err:?}");
    assert!(!client.is_closed());
}

#[tokio::test]
async fn test_undeclared_error_is_unknown() {
    let mystery = Command::builder("mystery").build();
    let server = Amp::builder().responder(mystery.clone(), |_| async move {
        Err::<Values, _>(ResponderError::new("Surprise", "not in the table"))
    });
    let (_server, client) = pair(server, Amp::builder());

    let err = client
        .call_remote(&mystery, &Values::new())
        .unwrap()
        .await
        .unwrap_err();

    match err {
        AmpError::UnknownRemote { code, description } => {
            assert_eq!(code, "UNKNOWN");
            assert_eq!(description, "Unknown Error");
        }
        other => panic!("expected an unknown remote error, got {other:?}"),
    }
    assert!(!client.is_closed());
}

#[tokio::test]
async fn test_missing_argument_fails_locally() {
    let (_server, client) = pair(math_server(), Amp::builder());

    let err = client
        .call_remote(&add(), &Values::new().with("a", 1))
        .unwrap_err();

    match err {
        AmpError::InvalidSignature { command, missing } => {
            assert_eq!(command, "add");
            assert_eq!(missing, vec!["b".to_string()]);
        }
        other => panic!("expected InvalidSignature, got {other:?}"),
    }
    assert_eq!(client.outstanding(), 0);
}

#[tokio::test]
async fn test_oversize_value_fails_locally() {
    let echo = Command::builder("echo")
        .argument("data", Argument::Bytes)
        .build();
    let (_server, client) = pair(Amp::builder(), Amp::builder());

    let values = Values::new().with("data", Bytes::from(vec![0u8; 70_000]));
    let err = client.call_remote(&echo, &values).unwrap_err();

    assert!(matches!(err, AmpError::TooLong { is_local: true, .. }), "{err:?}");
    assert!(!client.is_closed());
}

#[tokio::test]
async fn test_answers_out_of_order() {
    let (_server, client) = pair(math_server(), Amp::builder());

    let slow = client
        .call_remote(&sleep(), &Values::new().with("millis", 200))
        .unwrap();
    let fast = client.call_remote(&add(), &sum(2, 2)).unwrap();

    let total = fast.await.unwrap();
    assert_eq!(total.get_int("total"), Some(4));
    assert_eq!(client.outstanding(), 1);

    slow.await.unwrap();
    assert_eq!(client.outstanding(), 0);
}

#[tokio::test]
async fn test_many_concurrent_calls() {
    let (_server, client) = pair(math_server(), Amp::builder());

    let calls: Vec<_> = (0..100)
        .map(|i| client.call_remote(&add(), &sum(i, i)).unwrap())
        .collect();

    for (i, call) in calls.into_iter().enumerate() {
        let answer = call.await.unwrap();
        assert_eq!(answer.get_int("total"), Some(2 * i as i64));
    }
}

#[tokio::test]
async fn test_connection_lost_fails_outstanding() {
    let (server, client) = pair(math_server(), Amp::builder());

    let first = client
        .call_remote(&sleep(), &Values::new().with("millis", 10_000))
        .unwrap();
    let second = client
        .call_remote(&sleep(), &Values::new().with("millis", 10_000))
        .unwrap();
    assert_eq!(client.outstanding(), 2);

    server.close();

    assert!(matches!(first.await, Err(AmpError::ConnectionLost(_))));
    assert!(matches!(second.await, Err(AmpError::ConnectionLost(_))));
    assert_eq!(client.outstanding(), 0);
    assert_eq!(client.wait_closed().await, "connection closed by peer");

    let err = client.call_remote(&add(), &sum(1, 1)).unwrap_err();
    assert!(matches!(err, AmpError::ConnectionLost(_)));
}

#[tokio::test]
async fn test_fatal_error_closes_both_sides() {
    let (server, client) = pair(math_server(), Amp::builder());

    let err = client
        .call_remote(&self_destruct(), &Values::new())
        .unwrap()
        .await
        .unwrap_err();

    match err {
        AmpError::Remote(remote) => {
            assert_eq!(remote.code, "BOOM");
            assert!(remote.fatal);
        }
        other => panic!("expected a remote error, got {other:?}"),
    }

    server.wait_closed().await;
    client.wait_closed().await;
}

#[tokio::test]
async fn test_no_answer_command() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let server = Amp::builder().responder(notify(), move |args: Values| {
        let tx = tx.clone();
        async move {
            let _ = tx.send(args.get_str("message").unwrap_or_default().to_string());
            Ok(Values::new())
        }
    });
    let (_server, client) = pair(server, Amp::builder());

    let call = client
        .call_remote(&notify(), &Values::new().with("message", "hello"))
        .unwrap();
    assert_eq!(client.outstanding(), 0);
    assert!(call.await.unwrap().is_empty());

    assert_eq!(rx.recv().await.as_deref(), Some("hello"));
}

#[tokio::test]
async fn test_fallback_responder() {
    let server = Amp::builder().fallback("shout", |mut fields: AmpBox| async move {
        let text = fields
            .remove("text")
            .map(|t| String::from_utf8_lossy(&t).to_uppercase())
            .unwrap_or_default();
        let mut answer = AmpBox::new();
        answer.insert("text", text);
        Ok(answer)
    });
    let (_server, client) = pair(server, Amp::builder());

    let mut fields = AmpBox::new();
    fields.insert("text", "quiet please");
    let answer = client
        .call_remote_string("Shout", fields, true)
        .unwrap()
        .unwrap()
        .await
        .unwrap();

    assert_eq!(answer.get_str("text"), Some("QUIET PLEASE"));
}

#[tokio::test]
async fn test_call_remote_string_against_schema() {
    let (_server, client) = pair(math_server(), Amp::builder());

    let fields: AmpBox = [("a", "40"), ("b", "2")].into_iter().collect();
    let answer = client
        .call_remote_string("add", fields, true)
        .unwrap()
        .unwrap()
        .await
        .unwrap();

    assert_eq!(answer.get_str("total"), Some("42"));
}

#[tokio::test]
async fn test_call_timeout() {
    let (_server, client) = pair(math_server(), Amp::builder());

    let err = client
        .call_remote(&sleep(), &Values::new().with("millis", 5_000))
        .unwrap()
        .with_timeout(Duration::from_millis(20))
        .await
        .unwrap_err();

    assert!(matches!(err, AmpError::Timeout));
    assert!(!client.is_closed());
}

#[tokio::test]
async fn test_bad_arguments_answer_unknown() {
    let (_server, client) = pair(math_server(), Amp::builder());

    let fields: AmpBox = [("a", "forty"), ("b", "2")].into_iter().collect();
    let err = client
        .call_remote_string("add", fields, true)
        .unwrap()
        .unwrap()
        .await
        .unwrap_err();

    assert!(matches!(err, AmpError::UnknownRemote { .. }), "{err:?}");
}

/// A byte-wise XOR stream standing in for TLS.
struct Xor {
    inner: BoxedStream,
}

const XOR_KEY: u8 = 0x5a;

impl AsyncRead for Xor {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        let before = buf.filled().len();
        ready!(Pin::new(&mut self.inner).poll_read(cx, buf))?;
        for byte in &mut buf.filled_mut()[before..] {
            *byte ^= XOR_KEY;
        }
        Poll::Ready(Ok(()))
    }
}

impl AsyncWrite for Xor {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        let scrambled: Vec<u8> = buf.iter().map(|b| b ^ XOR_KEY).collect();
        Pin::new(&mut self.inner).poll_write(cx, &scrambled)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.inner).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.inner).poll_shutdown(cx)
    }
}

#[derive(Clone, Default)]
struct XorProvider {
    clients: Arc<AtomicUsize>,
    servers: Arc<AtomicUsize>,
}

impl TlsProvider for XorProvider {
    fn wrap(
        &self,
        stream: BoxedStream,
        role: TlsRole,
    ) -> BoxFuture<'static, ampwire::Result<BoxedStream>> {
        match role {
            TlsRole::Client => self.clients.fetch_add(1, Ordering::SeqCst),
            TlsRole::Server => self.servers.fetch_add(1, Ordering::SeqCst),
        };
        Box::pin(async move { Ok(Box::new(Xor { inner: stream }) as BoxedStream) })
    }
}

#[tokio::test]
async fn test_start_tls() {
    let provider = XorProvider::default();
    let server = math_server()
        .tls_provider(provider.clone())
        .accept_start_tls();
    let client = Amp::builder().tls_provider(provider.clone());
    let (_server, client) = pair(server, client);

    let tls = client.start_tls().unwrap();
    // Sent before the handshake; held and delivered encrypted.
    let early = client.call_remote(&add(), &sum(5, 6)).unwrap();

    tls.await.unwrap();
    assert_eq!(early.await.unwrap().get_int("total"), Some(11));

    let late = client.call_remote(&add(), &sum(7, 8)).unwrap().await.unwrap();
    assert_eq!(late.get_int("total"), Some(15));

    assert_eq!(provider.clients.load(Ordering::SeqCst), 1);
    assert_eq!(provider.servers.load(Ordering::SeqCst), 1);

    assert!(matches!(client.start_tls(), Err(AmpError::OnlyOneTls)));
}

#[tokio::test]
async fn test_start_tls_refused() {
    let provider = XorProvider::default();
    let client = Amp::builder().tls_provider(provider.clone());
    let (_server, client) = pair(math_server(), client);

    let err = client.start_tls().unwrap().await.unwrap_err();
    assert!(matches!(err, AmpError::UnhandledCommand { .. }), "{err:?}");

    let answer = client.call_remote(&add(), &sum(1, 2)).unwrap().await.unwrap();
    assert_eq!(answer.get_int("total"), Some(3));
    assert_eq!(provider.clients.load(Ordering::SeqCst), 0);
}

/// A certificate authority for the rustls tests.
struct Authority {
    cert: rcgen::Certificate,
    key: rcgen::KeyPair,
}

impl Authority {
    fn new(name: &str) -> Self {
        let mut params = rcgen::CertificateParams::default();
        params
            .distinguished_name
            .push(rcgen::DnType::CommonName, name);
        params.is_ca = rcgen::IsCa::Ca(rcgen::BasicConstraints::Unconstrained);
        params.key_usages = vec![
            rcgen::KeyUsagePurpose::KeyCertSign,
            rcgen::KeyUsagePurpose::DigitalSignature,
        ];
        let key = rcgen::KeyPair::generate().expect("generate CA key");
        let cert = params.self_signed(&key).expect("self-sign CA");
        Self { cert, key }
    }

    fn pem(&self) -> String {
        self.cert.pem()
    }

    /// Issue a leaf for `amp.test` usable by both ends of the handshake.
    fn issue(&self, trusted: &Authority) -> TlsSettings {
        let mut params =
            rcgen::CertificateParams::new(vec!["amp.test".to_string()]).expect("leaf params");
        params
            .distinguished_name
            .push(rcgen::DnType::CommonName, "amp.test");
        params.extended_key_usages = vec![
            rcgen::ExtendedKeyUsagePurpose::ServerAuth,
            rcgen::ExtendedKeyUsagePurpose::ClientAuth,
        ];
        let key = rcgen::KeyPair::generate().expect("generate leaf key");
        let cert = params
            .signed_by(&key, &self.cert, &self.key)
            .expect("sign leaf");
        TlsSettings::new(cert.pem(), key.serialize_pem())
            .trusted_authorities(trusted.pem())
            .server_name("amp.test")
    }
}

#[tokio::test]
async fn test_start_tls_with_rustls() {
    let ca = Authority::new("ampwire test CA");
    let server_tls = RustlsProvider::new(&ca.issue(&ca)).unwrap();
    let client_tls = RustlsProvider::new(&ca.issue(&ca)).unwrap();

    let server = math_server().tls_provider(server_tls).accept_start_tls();
    let client = Amp::builder().tls_provider(client_tls);
    let (server, client) = pair(server, client);

    let tls = client.start_tls().unwrap();
    let early = client.call_remote(&add(), &sum(5, 6)).unwrap();

    let outcome = tokio::time::timeout(Duration::from_secs(10), async {
        tls.await.unwrap();
        early.await.unwrap()
    })
    .await
    .expect("handshake finished");
    assert_eq!(outcome.get_int("total"), Some(11));

    let late = client.call_remote(&add(), &sum(7, 8)).unwrap().await.unwrap();
    assert_eq!(late.get_int("total"), Some(15));

    // The other direction shares the encrypted stream.
    let err = server
        .call_remote(&add(), &sum(1, 1))
        .unwrap()
        .await
        .unwrap_err();
    assert!(matches!(err, AmpError::UnhandledCommand { .. }), "{err:?}");
    assert!(!client.is_closed());
}

#[tokio::test]
async fn test_start_tls_untrusted_client_certificate() {
    let ca = Authority::new("ampwire test CA");
    let rogue = Authority::new("rogue CA");
    let server_tls = RustlsProvider::new(&ca.issue(&ca)).unwrap();
    // Trusts the real CA for the server, but presents a rogue-signed cert.
    let client_tls = RustlsProvider::new(&rogue.issue(&ca)).unwrap();

    let server = math_server().tls_provider(server_tls).accept_start_tls();
    let client = Amp::builder().tls_provider(client_tls);
    let (server, client) = pair(server, client);

    let tls = client.start_tls().unwrap();
    let early = client.call_remote(&add(), &sum(5, 6)).unwrap();

    let early = tokio::time::timeout(Duration::from_secs(10), async {
        // Under TLS 1.3 the client may finish its side before the server
        // rejects the certificate, so only the held call is checked.
        let _ = tls.await;
        early.await
    })
    .await
    .expect("connection closed");
    assert!(matches!(early, Err(AmpError::ConnectionLost(_))), "{early:?}");

    let reason = tokio::time::timeout(Duration::from_secs(10), server.wait_closed())
        .await
        .expect("server closed");
    assert!(reason.contains("TLS"), "{reason}");
}

#[derive(Debug)]
enum Event {
    Made(RawTransport),
    Data(Bytes),
    Lost,
}

/// Reports every callback on a channel.
struct Recorder {
    events: mpsc::UnboundedSender<Event>,
}

impl SwitchedProtocol for Recorder {
    fn connection_made(&mut self, transport: RawTransport) {
        let _ = self.events.send(Event::Made(transport));
    }

    fn data_received(&mut self, data: Bytes) {
        let _ = self.events.send(Event::Data(data));
    }

    fn connection_lost(&mut self, _reason: &AmpError) {
        let _ = self.events.send(Event::Lost);
    }
}

/// Greets, then echoes everything back.
struct Echo {
    transport: Option<RawTransport>,
}

impl SwitchedProtocol for Echo {
    fn connection_made(&mut self, transport: RawTransport) {
        let _ = transport.write(Bytes::from_static(b"welcome;"));
        self.transport = Some(transport);
    }

    fn data_received(&mut self, data: Bytes) {
        if let Some(transport) = &self.transport {
            let _ = transport.write(data);
        }
    }

    fn connection_lost(&mut self, _reason: &AmpError) {}
}

async fn collect_data(events: &mut mpsc::UnboundedReceiver<Event>, len: usize) -> Vec<u8> {
    let mut received = Vec::new();
    while received.len() < len {
        match events.recv().await {
            Some(Event::Data(data)) => received.extend_from_slice(&data),
            other => panic!("expected data, got {other:?}"),
        }
    }
    received
}

#[tokio::test]
async fn test_switch_protocol() {
    let server = math_server().switch_responder(upgrade(), |args: Values| async move {
        assert_eq!(args.get_str("protocol"), Some("echo"));
        let protocol: Box<dyn SwitchedProtocol> = Box::new(Echo { transport: None });
        Ok((Values::new(), protocol))
    });
    let (server, client) = pair(server, Amp::builder());

    let (tx, mut events) = mpsc::unbounded_channel();
    let switch = client
        .switch_protocol(
            &upgrade(),
            &Values::new().with("protocol", "echo"),
            Recorder { events: tx },
        )
        .unwrap();

    assert!(client.is_locked());
    assert!(matches!(
        client.call_remote(&add(), &sum(1, 1)),
        Err(AmpError::ProtocolSwitched)
    ));

    switch.await.unwrap();

    let transport = match events.recv().await {
        Some(Event::Made(transport)) => transport,
        other => panic!("expected connection_made, got {other:?}"),
    };
    assert_eq!(collect_data(&mut events, 8).await, b"welcome;");

    transport.write(Bytes::from_static(b"ping")).unwrap();
    assert_eq!(collect_data(&mut events, 4).await, b"ping");

    transport.close();
    assert!(matches!(events.recv().await, Some(Event::Lost)));
    server.wait_closed().await;
}

#[tokio::test]
async fn test_switch_refused_unlocks() {
    let (_server, client) = pair(math_server(), Amp::builder());

    let (tx, _events) = mpsc::unbounded_channel();
    let err = client
        .switch_protocol(
            &upgrade(),
            &Values::new().with("protocol", "echo"),
            Recorder { events: tx },
        )
        .unwrap()
        .await
        .unwrap_err();

    assert!(matches!(err, AmpError::UnhandledCommand { .. }), "{err:?}");
    assert!(!client.is_locked());

    let answer = client.call_remote(&add(), &sum(2, 3)).unwrap().await.unwrap();
    assert_eq!(answer.get_int("total"), Some(5));
}

#[tokio::test]
async fn test_responder_concurrency_limit() {
    let running = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let server = {
        let running = running.clone();
        let peak = peak.clone();
        Amp::builder()
            .max_concurrent_responders(2)
            .responder(sleep(), move |args: Values| {
                let running = running.clone();
                let peak = peak.clone();
                async move {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    let millis = args.get_int("millis").unwrap_or(0) as u64;
                    tokio::time::sleep(Duration::from_millis(millis)).await;
                    running.fetch_sub(1, Ordering::SeqCst);
                    Ok(Values::new())
                }
            })
    };
    let (_server, client) = pair(server, Amp::builder());

    let calls: Vec<_> = (0..6)
        .map(|_| {
            client
                .call_remote(&sleep(), &Values::new().with("millis", 20))
                .unwrap()
        })
        .collect();
    for call in calls {
        call.await.unwrap();
    }

    assert_eq!(peak.load(Ordering::SeqCst), 2);
}

fn arb_box() -> impl Strategy<Value = AmpBox> {
    prop::collection::btree_map(
        "[a-z_]{1,32}",
        prop::collection::vec(any::<u8>(), 0..256),
        1..8,
    )
    .prop_map(|entries| {
        entries
            .into_iter()
            .map(|(k, v)| (Bytes::from(k), Bytes::from(v)))
            .collect()
    })
}

proptest! {
    #[test]
    fn box_stream_survives_any_split(
        boxes in prop::collection::vec(arb_box(), 1..6),
        cuts in prop::collection::vec(any::<prop::sample::Index>(), 0..8),
    ) {
        let mut stream = Vec::new();
        for b in &boxes {
            stream.extend_from_slice(&b.serialize().unwrap());
        }

        let mut points: Vec<usize> = cuts.iter().map(|i| i.index(stream.len() + 1)).collect();
        points.push(0);
        points.push(stream.len());
        points.sort_unstable();

        let mut buffer = BoxBuffer::new();
        let mut parsed = Vec::new();
        for window in points.windows(2) {
            parsed.extend(buffer.push(&stream[window[0]..window[1]]).unwrap());
        }

        prop_assert_eq!(parsed, boxes);
        prop_assert!(buffer.is_at_boundary());
    }

    #[test]
    fn serialized_length_matches(b in arb_box()) {
        prop_assert_eq!(b.serialize().unwrap().len(), b.encoded_len());
    }
}
