//! End-to-end tests against a local RADIUS responder
//!
//! The responder runs as a tokio task on 127.0.0.1 and answers:
//! - `123456` with Access-Accept
//! - `push` with Access-Challenge carrying State `srv-state`
//! - `424242` with Access-Accept, but only when State `srv-state` comes back
//! - anything else with Access-Reject

use radius_proto::auth::{calculate_response_authenticator, decrypt_user_password};
use radius_proto::{Attribute, AttributeType, Code, Packet};
use radius_token::{
    AttemptContext, ChallengeOrchestrator, Config, MemoryChallengeStore, PrefixPinPolicy, RadiusBridge,
    RadiusServerDefinition, RadiusTokenAdapter, Token, UdpTransport, Verdict,
};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::net::UdpSocket;

const SECRET: &str = "testing123";
const SERVER_STATE: &[u8] = b"srv-state";

struct Responder {
    addr: SocketAddr,
    requests: Arc<AtomicUsize>,
}

fn answer(request: &Packet, secret: &[u8]) -> Packet {
    let password = request
        .find_attribute(AttributeType::UserPassword)
        .and_then(|attr| decrypt_user_password(&attr.value, secret, &request.authenticator).ok())
        .unwrap_or_default();
    let state = request
        .find_attribute(AttributeType::State)
        .map(|attr| attr.value.clone());

    let mut reply = match (password.as_slice(), state.as_deref()) {
        (b"123456", _) => Packet::new(Code::AccessAccept, request.identifier, [0u8; 16]),
        (b"424242", Some(SERVER_STATE)) => Packet::new(Code::AccessAccept, request.identifier, [0u8; 16]),
        (b"push", _) => {
            let mut packet = Packet::new(Code::AccessChallenge, request.identifier, [0u8; 16]);
            packet.add_attribute(Attribute::octets(AttributeType::State, SERVER_STATE).unwrap());
            packet.add_attribute(Attribute::string(AttributeType::ReplyMessage, "Enter the code from your phone").unwrap());
            packet
        }
        _ => Packet::new(Code::AccessReject, request.identifier, [0u8; 16]),
    };

    reply.authenticator = calculate_response_authenticator(&reply, &request.authenticator, secret).unwrap();
    reply
}

async fn spawn_responder(secret: &'static str) -> Responder {
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let addr = socket.local_addr().unwrap();
    let requests = Arc::new(AtomicUsize::new(0));
    let counter = requests.clone();

    tokio::spawn(async move {
        let mut buf = [0u8; 4096];
        loop {
            let Ok((len, peer)) = socket.recv_from(&mut buf).await else {
                break;
            };
            counter.fetch_add(1, Ordering::SeqCst);
            let Ok(request) = Packet::decode(&buf[..len]) else {
                continue;
            };
            let reply = answer(&request, secret.as_bytes());
            let _ = socket.send_to(&reply.encode().unwrap(), peer).await;
        }
    });

    Responder { addr, requests }
}

/// Responder that answers every request with bytes that are not a packet
async fn spawn_garbage_responder() -> SocketAddr {
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let addr = socket.local_addr().unwrap();

    tokio::spawn(async move {
        let mut buf = [0u8; 4096];
        while let Ok((_, peer)) = socket.recv_from(&mut buf).await {
            let _ = socket.send_to(&[2, 1, 0], peer).await;
        }
    });

    addr
}

fn adapter_for(addr: SocketAddr, secret: &str, params: &[(&str, &str)]) -> RadiusTokenAdapter {
    let mut config = Config::default();
    config.servers.push(RadiusServerDefinition {
        identifier: "local".to_string(),
        server: addr.ip().to_string(),
        port: addr.port(),
        secret: secret.to_string(),
        dictionary: None,
        description: Some("test responder".to_string()),
    });

    let mut enrollment: BTreeMap<String, String> = BTreeMap::new();
    enrollment.insert("radius.identifier".to_string(), "local".to_string());
    enrollment.insert("radius.user".to_string(), "alice".to_string());
    for (key, value) in params {
        enrollment.insert(key.to_string(), value.to_string());
    }
    let token = Token::enroll("PIRA-IT", &enrollment).unwrap();

    let registry = config.registry();
    let bridge = RadiusBridge::new(Arc::new(config), Arc::new(registry), Arc::new(UdpTransport::new()));
    let orchestrator = ChallengeOrchestrator::new(Arc::new(MemoryChallengeStore::new()), Arc::new(bridge));
    RadiusTokenAdapter::new(token, Arc::new(orchestrator), Arc::new(PrefixPinPolicy))
}

#[tokio::test(flavor = "multi_thread")]
async fn test_accept_over_udp() {
    let responder = spawn_responder(SECRET).await;
    let adapter = adapter_for(responder.addr, SECRET, &[]);

    let outcome = tokio::task::spawn_blocking(move || {
        let mut ctx = AttemptContext::new();
        adapter.authenticate("123456", &mut ctx).unwrap()
    })
    .await
    .unwrap();

    assert!(outcome.accepted);
    assert_eq!(outcome.verdict, Verdict::Accept);
    assert_eq!(outcome.reply.message, "matching 1 tokens");
    assert_eq!(outcome.reply.serial.as_deref(), Some("PIRA-IT"));
    assert_eq!(responder.requests.load(Ordering::SeqCst), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_reject_over_udp() {
    let responder = spawn_responder(SECRET).await;
    let adapter = adapter_for(responder.addr, SECRET, &[]);

    let outcome = tokio::task::spawn_blocking(move || {
        adapter.authenticate("999999", &mut AttemptContext::new()).unwrap()
    })
    .await
    .unwrap();

    assert!(!outcome.accepted);
    assert_eq!(outcome.verdict, Verdict::Reject);
    assert_eq!(outcome.reply.message, "remote side denied access");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_challenge_then_response_over_udp() {
    let responder = spawn_responder(SECRET).await;
    let adapter = adapter_for(responder.addr, SECRET, &[]);

    let (created, first_verdict, is_response, verdict) = tokio::task::spawn_blocking(move || {
        let mut first = AttemptContext::new();
        assert!(adapter.is_challenge_request("push", &mut first));
        let created = adapter.create_challenge(None, &first).unwrap();
        let first_verdict = first.verdict;

        let mut second = AttemptContext::for_transaction(created.transaction_id.as_str());
        let is_response = adapter.is_challenge_response("424242", &mut second);
        let verdict = adapter.check_challenge_response("424242", &mut second).unwrap();
        (created, first_verdict, is_response, verdict)
    })
    .await
    .unwrap();

    assert_eq!(created.message, "Enter the code from your phone");
    assert_eq!(created.transaction_id.len(), 20);
    assert_eq!(first_verdict, Some(Verdict::Challenge));
    assert!(is_response);
    assert_eq!(verdict, Verdict::Accept);
    // One exchange per attempt
    assert_eq!(responder.requests.load(Ordering::SeqCst), 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_wrong_answer_keeps_challenge_pending() {
    let responder = spawn_responder(SECRET).await;
    let adapter = adapter_for(responder.addr, SECRET, &[]);

    let (first, second) = tokio::task::spawn_blocking(move || {
        let mut ctx = AttemptContext::new();
        assert!(adapter.is_challenge_request("push", &mut ctx));
        let created = adapter.create_challenge(None, &ctx).unwrap();

        let mut wrong = AttemptContext::for_transaction(created.transaction_id.as_str());
        let first = adapter.check_challenge_response("000000", &mut wrong).unwrap();

        let mut right = AttemptContext::for_transaction(created.transaction_id.as_str());
        let second = adapter.check_challenge_response("424242", &mut right).unwrap();
        (first, second)
    })
    .await
    .unwrap();

    assert_eq!(first, Verdict::Reject);
    assert_eq!(second, Verdict::Accept);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_local_pin_over_udp() {
    let responder = spawn_responder(SECRET).await;
    let adapter = adapter_for(
        responder.addr,
        SECRET,
        &[("radius.local_checkpin", "1"), ("pin", "1234")],
    );

    let (good, bad) = tokio::task::spawn_blocking(move || {
        let good = adapter.authenticate("1234123456", &mut AttemptContext::new()).unwrap();
        let bad = adapter.authenticate("0000123456", &mut AttemptContext::new()).unwrap();
        (good, bad)
    })
    .await
    .unwrap();

    assert!(good.accepted);
    assert!(!bad.accepted);
    assert_eq!(bad.reply.message, "Wrong PIN");
    assert_eq!(responder.requests.load(Ordering::SeqCst), 1);
}

// Replies signed with the wrong secret are dropped, so this runs the full
// 3 x 5 s retry policy before giving up.
#[tokio::test(flavor = "multi_thread")]
async fn test_wrong_secret_rejects() {
    let responder = spawn_responder("other-secret").await;
    let adapter = adapter_for(responder.addr, SECRET, &[]);

    let accepted = tokio::task::spawn_blocking(move || {
        adapter.check_otp("123456", &mut AttemptContext::new()).unwrap()
    })
    .await
    .unwrap();

    assert!(!accepted);
}

// Same wait as above: undecodable replies are dropped.
#[tokio::test(flavor = "multi_thread")]
async fn test_malformed_reply_rejects() {
    let addr = spawn_garbage_responder().await;
    let adapter = adapter_for(addr, SECRET, &[]);

    let outcome = tokio::task::spawn_blocking(move || {
        adapter.authenticate("123456", &mut AttemptContext::new()).unwrap()
    })
    .await
    .unwrap();

    assert_eq!(outcome.verdict, Verdict::Reject);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_closed_port_rejects() {
    let addr = {
        let socket = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
        socket.local_addr().unwrap()
    };
    let adapter = adapter_for(addr, SECRET, &[]);

    let outcome = tokio::task::spawn_blocking(move || {
        adapter.authenticate("123456", &mut AttemptContext::new()).unwrap()
    })
    .await
    .unwrap();

    assert!(!outcome.accepted);
    assert_eq!(outcome.verdict, Verdict::Reject);
}
