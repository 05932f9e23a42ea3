//! A scripted SMTP server accepting a single session

#![allow(dead_code)]

use std::{
    io::{BufRead, BufReader, Read, Write},
    net::{SocketAddr, TcpListener, TcpStream},
    thread::{self, JoinHandle},
    time::Duration,
};

use socket2::{Domain, Socket, Type};

/// Replies sent by [`MockServer`], one per command
#[derive(Debug, Clone)]
pub struct Replies {
    /// `None` keeps the client waiting for a banner until it hangs up
    pub greeting: Option<&'static str>,
    pub ehlo: &'static str,
    pub helo: &'static str,
    pub mail: &'static str,
    /// Replies to successive `RCPT TO`, `250 OK` past the end
    pub rcpt: Vec<&'static str>,
    pub data: &'static str,
    /// Reply after the terminating dot
    pub message: &'static str,
}

impl Default for Replies {
    fn default() -> Self {
        Self {
            greeting: Some("220 mock.example.com ESMTP ready"),
            ehlo: "250-mock.example.com\r\n250 8BITMIME",
            helo: "250 mock.example.com",
            mail: "250 2.1.0 OK",
            rcpt: Vec::new(),
            data: "354 End data with <CR><LF>.<CR><LF>",
            message: "250 2.0.0 queued as 4XJ1",
        }
    }
}

/// What the client sent during the session
#[derive(Debug, Default)]
pub struct Transcript {
    pub commands: Vec<String>,
    /// Message content as it went over the wire, dot-stuffed
    pub data: Option<Vec<u8>>,
}

impl Transcript {
    /// Command verbs in order, `MAIL FROM:<a>` gives `MAIL`
    pub fn verbs(&self) -> Vec<String> {
        self.commands
            .iter()
            .map(|command| {
                command
                    .split([' ', ':'])
                    .next()
                    .unwrap_or_default()
                    .to_ascii_uppercase()
            })
            .collect()
    }

    pub fn data_str(&self) -> String {
        String::from_utf8(self.data.clone().expect("no DATA received")).unwrap()
    }
}

pub struct MockServer {
    addr: String,
    handle: JoinHandle<Transcript>,
}

impl MockServer {
    pub fn start(replies: Replies) -> MockServer {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let handle = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            serve(stream, &replies)
        });
        MockServer { addr, handle }
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Waits for the session to end
    pub fn finish(self) -> Transcript {
        self.handle.join().unwrap()
    }
}

fn reply(stream: &mut TcpStream, reply: &str) {
    let _ = stream.write_all(format!("{reply}\r\n").as_bytes());
}

fn serve(stream: TcpStream, replies: &Replies) -> Transcript {
    let mut transcript = Transcript::default();
    let mut writer = stream.try_clone().unwrap();
    let mut reader = BufReader::new(stream);

    let Some(greeting) = replies.greeting else {
        let _ = reader.read_to_end(&mut Vec::new());
        return transcript;
    };
    reply(&mut writer, greeting);

    let mut rcpt = 0;
    let mut line = String::new();
    loop {
        line.clear();
        match reader.read_line(&mut line) {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }
        let command = line.trim_end().to_owned();
        transcript.commands.push(command.clone());

        let verb = command
            .split([' ', ':'])
            .next()
            .unwrap_or_default()
            .to_ascii_uppercase();
        match verb.as_str() {
            "EHLO" => reply(&mut writer, replies.ehlo),
            "HELO" => reply(&mut writer, replies.helo),
            "MAIL" => reply(&mut writer, replies.mail),
            "RCPT" => {
                let answer = replies.rcpt.get(rcpt).copied().unwrap_or("250 2.1.5 OK");
                rcpt += 1;
                reply(&mut writer, answer);
            }
            "DATA" => {
                reply(&mut writer, replies.data);
                if replies.data.starts_with('3') {
                    transcript.data = Some(read_data(&mut reader));
                    reply(&mut writer, replies.message);
                }
            }
            "QUIT" => {
                reply(&mut writer, "221 2.0.0 bye");
                break;
            }
            _ => reply(&mut writer, "502 5.5.2 command not recognized"),
        }
    }

    transcript
}

fn read_data(reader: &mut BufReader<TcpStream>) -> Vec<u8> {
    let mut data = Vec::new();
    loop {
        let mut line = Vec::new();
        match reader.read_until(b'\n', &mut line) {
            Ok(0) | Err(_) => break,
            Ok(_) if line == b".\r\n" => break,
            Ok(_) => data.extend_from_slice(&line),
        }
    }
    data
}

/// A listener whose accept queue is full, so new connections hang in the dial
pub struct Backlogged {
    addr: SocketAddr,
    _listener: TcpListener,
    _held: Vec<TcpStream>,
}

impl Backlogged {
    pub fn start() -> Self {
        let socket = Socket::new(Domain::IPV4, Type::STREAM, None).unwrap();
        socket
            .bind(&"127.0.0.1:0".parse::<SocketAddr>().unwrap().into())
            .unwrap();
        socket.listen(0).unwrap();
        let listener = TcpListener::from(socket);
        let addr = listener.local_addr().unwrap();

        let mut held = Vec::new();
        while held.len() < 64 {
            match TcpStream::connect_timeout(&addr, Duration::from_millis(200)) {
                Ok(stream) => held.push(stream),
                Err(_) => break,
            }
        }

        Self {
            addr,
            _listener: listener,
            _held: held,
        }
    }

    pub fn addr(&self) -> String {
        self.addr.to_string()
    }
}
