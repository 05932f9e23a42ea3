use std::{
    fmt::Display,
    io::{self, BufRead, BufReader, Write},
    net::{Shutdown, TcpStream},
    time::Duration,
};

#[cfg(feature = "tracing")]
use super::escape_crlf;
use super::{net, ClientCodec};
use crate::{
    context::Context,
    transport::smtp::{
        commands::{Ehlo, Helo, Quit},
        error::{self, Error},
        extension::{ClientId, ServerInfo},
        response::{parse_response, Response},
    },
};

/// Structure that implements the SMTP client
///
/// Every blocking operation is bounded by the [`Context`] the connection was
/// opened with, and fails with a timeout or cancellation error once the
/// context is done.
#[derive(Debug)]
pub struct SmtpConnection {
    /// TCP stream between client and server
    stream: BufReader<TcpStream>,
    ctx: Context,
    /// Id of the socket registered with the context
    registration: Option<u64>,
    /// Upper bound for a single operation when the context has no deadline
    timeout: Duration,
    /// Whether QUIT has been sent
    sent_quit: bool,
    /// Set after an i/o or protocol failure, nothing more can be exchanged
    broken: bool,
    /// Information about the server
    server_info: ServerInfo,
}

impl SmtpConnection {
    /// Get information about the server
    pub fn server_info(&self) -> &ServerInfo {
        &self.server_info
    }

    /// Opens the TCP connection, without reading the banner
    pub fn connect(ctx: &Context, server: &str, timeout: Duration) -> Result<SmtpConnection, Error> {
        let stream = net::connect(ctx, server, timeout)?;
        let registration = ctx.register(&stream);

        #[cfg(feature = "tracing")]
        tracing::debug!("connected to {}", server);

        Ok(SmtpConnection {
            stream: BufReader::new(stream),
            ctx: ctx.clone(),
            registration,
            timeout,
            sent_quit: false,
            broken: false,
            server_info: ServerInfo::default(),
        })
    }

    /// Reads the server banner
    pub fn greeting(&mut self) -> Result<Response, Error> {
        self.read_response()
    }

    /// Introduces the client with `EHLO`, falling back to `HELO`
    ///
    /// Only a negative `EHLO` reply triggers the fallback, i/o failures are
    /// returned as is.
    pub fn hello(&mut self, hello_name: &ClientId) -> Result<Response, Error> {
        let response = match self.command(Ehlo::new(hello_name.clone())) {
            Ok(response) => response,
            Err(err) if err.status().is_some() => {
                #[cfg(feature = "tracing")]
                tracing::debug!("EHLO refused ({}), trying HELO", err);
                self.command(Helo::new(hello_name.clone()))?
            }
            Err(err) => return Err(err),
        };
        self.server_info = ServerInfo::from_response(&response);

        #[cfg(feature = "tracing")]
        tracing::debug!("server {}", self.server_info);
        Ok(response)
    }

    /// Whether the connection can still carry commands
    pub fn has_broken(&self) -> bool {
        self.sent_quit || self.broken
    }

    /// Sends QUIT and reads the reply
    pub fn quit(&mut self) -> Result<Response, Error> {
        self.sent_quit = true;
        self.command(Quit)
    }

    /// Best-effort QUIT, then closes the socket
    pub fn abort(&mut self) {
        if !self.has_broken() {
            let _ = self.quit();
        }
        self.close();
    }

    /// Shuts the socket down and detaches it from the context
    pub fn close(&mut self) {
        self.detach();
        let _ = self.stream.get_ref().shutdown(Shutdown::Both);
        self.broken = true;
    }

    /// Sends the message content
    ///
    /// Line endings are normalized and leading dots escaped on the way; the
    /// content itself is never logged.
    pub fn message(&mut self, message: &[u8]) -> Result<Response, Error> {
        let mut codec = ClientCodec::new();
        let mut out_buf = Vec::with_capacity(message.len() + 5);
        codec.encode(message, &mut out_buf);
        codec.finish(&mut out_buf);
        self.write_raw(&out_buf)?;

        #[cfg(feature = "tracing")]
        tracing::debug!("Wrote: {} bytes of message data", out_buf.len());

        self.read_response()
    }

    /// Sends an SMTP command
    pub fn command<C: Display>(&mut self, command: C) -> Result<Response, Error> {
        let command = command.to_string();
        self.write_raw(command.as_bytes())?;

        #[cfg(feature = "tracing")]
        tracing::debug!("Wrote: {}", escape_crlf(&command));

        self.read_response()
    }

    fn detach(&mut self) {
        if let Some(id) = self.registration.take() {
            self.ctx.unregister(id);
        }
    }

    /// Applies what is left of the context budget to the socket
    fn arm(&mut self) -> Result<(), Error> {
        if self.broken {
            return Err(error::client("connection is closed"));
        }
        let budget = self.ctx.budget(self.timeout)?;
        let result = {
            let stream = self.stream.get_ref();
            stream
                .set_read_timeout(Some(budget))
                .and_then(|()| stream.set_write_timeout(Some(budget)))
        };
        result.map_err(|err| self.io_error(err))
    }

    fn write_raw(&mut self, bytes: &[u8]) -> Result<(), Error> {
        self.arm()?;
        let result = {
            let mut stream = self.stream.get_ref();
            stream.write_all(bytes).and_then(|()| stream.flush())
        };
        result.map_err(|err| self.io_error(err))
    }

    /// Gets the SMTP response
    pub fn read_response(&mut self) -> Result<Response, Error> {
        self.arm()?;
        let mut buffer = String::with_capacity(100);

        loop {
            let read = match self.stream.read_line(&mut buffer) {
                Ok(read) => read,
                Err(err) => return Err(self.io_error(err)),
            };
            if read == 0 {
                break;
            }

            #[cfg(feature = "tracing")]
            tracing::debug!("<< {}", escape_crlf(&buffer));

            match parse_response(&buffer) {
                Ok((_remaining, response)) => {
                    return if response.is_positive() {
                        Ok(response)
                    } else {
                        Err(error::code(
                            response.code(),
                            Some(response.message().collect::<Vec<_>>().join(" ")),
                        ))
                    };
                }
                Err(nom::Err::Incomplete(_)) => { /* read more */ }
                Err(nom::Err::Failure(e) | nom::Err::Error(e)) => {
                    self.broken = true;
                    return Err(error::response(e.to_string()));
                }
            }
        }

        self.broken = true;
        if self.ctx.is_cancelled() {
            return Err(error::cancelled());
        }
        Err(error::network(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "connection closed by server",
        )))
    }

    /// Marks the connection broken and turns an i/o error into the matching kind
    fn io_error(&mut self, err: io::Error) -> Error {
        self.broken = true;
        if self.ctx.is_cancelled() {
            error::cancelled()
        } else if net::is_timeout(&err) {
            error::timeout(err)
        } else {
            error::network(err)
        }
    }
}

impl Drop for SmtpConnection {
    fn drop(&mut self) {
        self.detach();
    }
}
