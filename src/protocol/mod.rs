//! Front-end Protocols
//!
//! Handshake parsing for the HTTP proxy and SOCKS5 front ends, and the
//! `Frontend` variant the session coordinator drives.

pub mod constants;
pub mod frontend;
pub mod http;
pub mod socks5;
pub mod types;

pub use constants::*;
pub use frontend::{Frontend, HttpFrontend, Negotiated, Socks5Frontend};
pub use types::*;

use std::io;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Read into `buf` until at least `min` bytes have arrived
pub(crate) async fn read_at_least<R>(
    reader: &mut R,
    buf: &mut [u8],
    min: usize,
) -> io::Result<usize>
where
    R: AsyncRead + Unpin,
{
    let mut filled = 0;
    while filled < min {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            return Err(io::ErrorKind::UnexpectedEof.into());
        }
        filled += n;
    }
    Ok(filled)
}
