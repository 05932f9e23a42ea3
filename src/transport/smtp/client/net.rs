use std::{
    io,
    net::{SocketAddr, TcpStream, ToSocketAddrs},
    sync::mpsc::{self, RecvTimeoutError},
    thread,
    time::Duration,
};

use crate::{
    context::Context,
    transport::smtp::error::{self, Error},
};

/// How often a pending dial looks at the context
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Resolves `server` and connects to the first address accepting the connection
///
/// Every attempt is bounded by what remains of the context deadline, or by
/// `timeout` when the context has none. Cancelling the context abandons the
/// attempt in progress.
pub(super) fn connect(ctx: &Context, server: &str, timeout: Duration) -> Result<TcpStream, Error> {
    ctx.check()?;
    let addrs = server.to_socket_addrs().map_err(error::connection)?;

    let mut last_err = None;
    for addr in addrs {
        let budget = ctx.budget(timeout)?;
        if budget.is_zero() {
            return Err(error::timeout("deadline exceeded"));
        }
        match dial(ctx, addr, budget)? {
            Ok(stream) => {
                ctx.check()?;
                return Ok(stream);
            }
            Err(err) => last_err = Some(err),
        }
    }

    Err(match last_err {
        Some(err) if is_timeout(&err) => error::timeout(err),
        Some(err) => error::connection(err),
        None => error::connection(format!("could not resolve {server:?} to any address")),
    })
}

/// Connects to `addr` on a helper thread, watching the context meanwhile
///
/// The outer error means the context ended first. An abandoned attempt
/// finishes on its own within `budget` and its socket is dropped.
fn dial(
    ctx: &Context,
    addr: SocketAddr,
    budget: Duration,
) -> Result<io::Result<TcpStream>, Error> {
    let (tx, rx) = mpsc::channel();
    thread::Builder::new()
        .name("courier-dial".into())
        .spawn(move || {
            let _ = tx.send(TcpStream::connect_timeout(&addr, budget));
        })
        .map_err(error::connection)?;

    loop {
        match rx.recv_timeout(POLL_INTERVAL) {
            Ok(result) => return Ok(result),
            Err(RecvTimeoutError::Timeout) => ctx.check()?,
            Err(RecvTimeoutError::Disconnected) => {
                return Ok(Err(io::Error::other("dial thread exited without a result")))
            }
        }
    }
}

pub(super) fn is_timeout(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock
    )
}
