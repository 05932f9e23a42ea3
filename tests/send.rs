mod common;

use std::{fs, path::Path};

use base64::{engine::general_purpose::STANDARD, Engine};
use common::{MockServer, Replies};
use courier::{Context, EmailConfig};
use pretty_assertions::assert_eq;
use serde::Serialize;
use serde_json::json;
use tempfile::TempDir;

const TEMPLATE: &str = "\
From: Alerts <alerts@example.com>
To: {{.Team}}@example.com
Sub: [{{.Status}}] {{len .Alerts}} alerts

{{range .Alerts}}- {{.Name}} on {{.Host}}
{{end}}";

fn config(dir: &TempDir, server: &MockServer) -> EmailConfig {
    let template_path = dir.path().join("alert.tmpl");
    fs::write(&template_path, TEMPLATE).unwrap();

    EmailConfig {
        smarthost: server.addr().parse().unwrap(),
        hello: "monitor.example.com".into(),
        cc: "audit@example.com".into(),
        template_path,
        ..Default::default()
    }
}

/// Decoded body of the part announcing `filename`
fn attachment(data: &str, filename: &str) -> Vec<u8> {
    let disposition = format!("Content-Disposition: attachment; filename=\"{filename}\"");
    let start = data.find(&disposition).expect("attachment part");
    let part = &data[start..];
    let body_start = part.find("\r\n\r\n").unwrap() + 4;
    let body_end = body_start + part[body_start..].find("\r\n--").unwrap();
    let encoded: String = part[body_start..body_end]
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    STANDARD.decode(encoded).unwrap()
}

#[test]
fn renders_and_delivers() {
    let dir = TempDir::new().unwrap();
    let server = MockServer::start(Replies::default());
    let config = config(&dir, &server);

    let data = json!({
        "Team": "ops",
        "Status": "firing",
        "Alerts": [
            { "Name": "disk full", "Host": "db1" },
            { "Name": "load", "Host": "web3" },
        ],
    });
    courier::send(&Context::background(), &config, &data).unwrap();

    let transcript = server.finish();
    assert_eq!(
        &transcript.commands[..5],
        [
            "EHLO monitor.example.com",
            "MAIL FROM:<alerts@example.com>",
            "RCPT TO:<ops@example.com>",
            "RCPT TO:<audit@example.com>",
            "DATA",
        ]
    );

    let data = transcript.data_str();
    assert!(data.starts_with(
        "From: Alerts <alerts@example.com>\r\nTo: ops@example.com\r\nCc: audit@example.com\r\nSubject: [firing] 2 alerts\r\nDate: "
    ));
    assert!(data.contains("Content-Type: text/plain; charset=UTF-8\r\n"));
    assert!(data.ends_with("\r\n\r\n- disk full on db1\r\n- load on web3\r\n"));
}

#[derive(Serialize)]
struct Report {
    #[serde(rename = "Team")]
    team: &'static str,
    #[serde(rename = "Status")]
    status: &'static str,
    #[serde(rename = "Alerts")]
    alerts: Vec<()>,
}

#[test]
fn sends_attachments() {
    let dir = TempDir::new().unwrap();
    let server = MockServer::start(Replies::default());
    let mut config = config(&dir, &server);

    let csv = dir.path().join("report.csv");
    fs::write(&csv, "host,load\n.db1,0.9\n").unwrap();
    let png = dir.path().join("graph.png");
    let pixels: Vec<u8> = (0..=255).collect();
    fs::write(&png, &pixels).unwrap();
    config.attachments = vec![csv, png];

    let data = Report {
        team: "ops",
        status: "resolved",
        alerts: Vec::new(),
    };
    courier::send(&Context::background(), &config, &data).unwrap();

    let data = server.finish().data_str();
    assert!(data.contains("Subject: [resolved] 0 alerts\r\n"));
    assert!(data.contains("Content-Type: multipart/mixed; boundary=\""));
    assert!(data.contains("Content-Type: text/csv; name=\"report.csv\"\r\n"));
    assert!(data.contains("Content-Type: image/png; name=\"graph.png\"\r\n"));
    assert_eq!(attachment(&data, "report.csv"), b"host,load\n.db1,0.9\n");
    assert_eq!(attachment(&data, "graph.png"), pixels);
}

#[test]
fn missing_attachment_is_not_sent() {
    let dir = TempDir::new().unwrap();
    let server = MockServer::start(Replies::default());
    let mut config = config(&dir, &server);
    config.attachments = vec![Path::new("/nonexistent/report.pdf").to_owned()];

    let err = courier::send(&Context::background(), &config, &json!({ "Team": "ops" })).unwrap_err();
    assert!(err.is_attachment());
    assert!(err.is_permanent());

    // release the accept() of the mock server
    drop(std::net::TcpStream::connect(server.addr()).unwrap());
    assert!(server.finish().commands.is_empty());
}

#[test]
fn rejected_recipient_is_reported() {
    let dir = TempDir::new().unwrap();
    let server = MockServer::start(Replies {
        rcpt: vec!["550 5.1.1 unknown user"],
        ..Default::default()
    });
    let config = config(&dir, &server);

    let err = courier::send(&Context::background(), &config, &json!({ "Team": "nobody" })).unwrap_err();
    assert!(err.is_permanent());
    assert_eq!(err.recipient(), Some("nobody@example.com"));
    server.finish();
}
