mod common;

use std::{io::Cursor, net::TcpStream, time::Duration};

use common::{MockServer, Replies};
use courier::{
    deliver_raw,
    transport::{raw::RawInjector, smtp::ClientId},
    Context,
};
use pretty_assertions::assert_eq;

const RAW: &str = concat!(
    "From: \"Ops Team\" <ops@example.com>\r\n",
    "To: a@example.com,\r\n b@example.com\r\n",
    "Cc: A@example.com\r\n",
    "Bcc: hidden@example.com\r\n",
    "Subject: pre-built\r\n",
    "\r\n",
    "first line\r\n",
    ".second line\r\n",
);

#[test]
fn streams_the_message_unchanged() {
    let server = MockServer::start(Replies::default());
    let response = RawInjector::new(server.addr())
        .hello_name(ClientId::Domain("injector.example.com".to_owned()))
        .timeout(Duration::from_secs(5))
        .send(&Context::background(), Cursor::new(RAW))
        .unwrap();
    assert!(response.is_positive());

    let transcript = server.finish();
    assert_eq!(
        transcript.commands,
        [
            "EHLO injector.example.com",
            "MAIL FROM:<ops@example.com>",
            "RCPT TO:<a@example.com>",
            "RCPT TO:<b@example.com>",
            "RCPT TO:<hidden@example.com>",
            "DATA",
            "QUIT",
        ]
    );
    assert_eq!(
        transcript.data_str(),
        RAW.replace("\r\n.second", "\r\n..second")
    );
}

#[test]
fn shortcut_uses_the_relay_address() {
    let server = MockServer::start(Replies::default());
    deliver_raw(&Context::background(), RAW.as_bytes(), server.addr()).unwrap();
    assert_eq!(server.finish().verbs().last().map(String::as_str), Some("QUIT"));
}

#[test]
fn headers_without_recipients_never_connect() {
    let server = MockServer::start(Replies::default());
    let err = deliver_raw(
        &Context::background(),
        "From: ops@example.com\r\nSubject: nobody\r\n\r\nbody\r\n".as_bytes(),
        server.addr(),
    )
    .unwrap_err();
    assert!(err.is_missing_to());
    assert!(!err.is_retryable());

    drop(TcpStream::connect(server.addr()).unwrap());
    assert!(server.finish().commands.is_empty());
}

#[test]
fn relay_errors_keep_their_phase() {
    let server = MockServer::start(Replies {
        data: "452 4.3.1 insufficient storage",
        ..Default::default()
    });
    let err = deliver_raw(&Context::background(), RAW.as_bytes(), server.addr()).unwrap_err();
    assert!(err.is_retryable());
    assert_eq!(err.phase(), Some(courier::Phase::Data));
    server.finish();
}
