//! Wire Constants

// SOCKS5 Protocol Version
pub const SOCKS5_VERSION: u8 = 0x05;

// SOCKS5 Commands
pub const SOCKS5_CMD_CONNECT: u8 = 0x01;
pub const SOCKS5_CMD_BIND: u8 = 0x02;
pub const SOCKS5_CMD_UDP_ASSOCIATE: u8 = 0x03;

// Address Types
pub const SOCKS5_ADDR_IPV4: u8 = 0x01;
pub const SOCKS5_ADDR_DOMAIN: u8 = 0x03;
pub const SOCKS5_ADDR_IPV6: u8 = 0x04;

// Authentication Methods
pub const SOCKS5_AUTH_NONE: u8 = 0x00;

// Response Codes
pub const SOCKS5_REPLY_SUCCESS: u8 = 0x00;

// Reserved field value
pub const SOCKS5_RESERVED: u8 = 0x00;

// Largest greeting: VER NMETHODS + 255 methods
pub const SOCKS5_MAX_GREETING_LEN: usize = 2 + 255;

// Largest request: VER CMD RSV ATYP LEN + 255 domain bytes + PORT
pub const SOCKS5_MAX_REQUEST_LEN: usize = 4 + 1 + 255 + 2;

// Placeholder port of the constant success reply
pub const SOCKS5_PLACEHOLDER_PORT: [u8; 2] = [0x00, 0x00];

// HTTP proxy status lines
pub const HTTP_BAD_REQUEST: &[u8] = b"HTTP/1.1 400 Not a http request\r\n\r\n";
pub const HTTP_LOOPED: &[u8] = b"HTTP/1.1 403 Host address looped\r\n\r\n";
pub const HTTP_UNREACHABLE: &[u8] = b"HTTP/1.1 404 Failed to connect host\r\n\r\n";
pub const HTTP_ESTABLISHED: &[u8] = b"HTTP/1.1 200 Connection established\r\n\r\n";

pub const HTTP_DEFAULT_PORT: u16 = 80;
pub const HTTP_MAX_HEADERS: usize = 128;
