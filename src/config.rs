use crate::capture::digest::DigestMode;
use crate::error::PutterError;
use clap::{ArgAction, Parser};
use std::net::{IpAddr, SocketAddr};

/// One mebibyte, the unit of the header limit flag.
const MIB: usize = 1024 * 1024;

/// Smallest read buffer the HTTP/1 codec accepts.
const MIN_HEADER_BUF: usize = 8 * 1024;

/// Command-line flags.
///
/// `-h` is the header limit, so help is long-only.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "putter",
    about = "HTTP test double: records requests, digests payloads, injects latency",
    disable_help_flag = true
)]
pub struct Args {
    /// Listen port
    #[arg(short = 'p', long = "port", default_value_t = 7758)]
    pub port: u16,

    /// Listen address
    #[arg(long = "bind", default_value = "0.0.0.0")]
    pub bind: IpAddr,

    /// Count of calls to record
    #[arg(short = 'c', long = "count", default_value_t = 100)]
    pub count: usize,

    /// Header size limit in MiB
    #[arg(short = 'h', long = "header-limit", default_value_t = 1)]
    pub header_limit_mib: usize,

    /// Fully buffer input before hashing
    #[arg(short = 'b', long = "buffer")]
    pub buffer_request: bool,

    /// In-flight request limit (0 = unlimited)
    #[arg(short = 'g', long = "goroutine-limit", default_value_t = 0)]
    pub inflight_limit: i64,

    /// Store payload in addition to hashing it
    #[arg(short = 's', long = "store-payload")]
    pub store_payload: bool,

    /// Print help
    #[arg(long = "help", action = ArgAction::Help)]
    pub help: Option<bool>,
}

/// Startup configuration.
///
/// Built once from the flags, immutable afterwards. The runtime-tunable
/// knobs live in `ChaosPolicy`, which is only seeded from here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    pub history_capacity: usize,
    pub header_limit_mib: usize,
    pub buffer_request: bool,
    pub store_payload: bool,
    pub initial_inflight_limit: i64,
}

impl ServerConfig {
    /// Validate flags into a config.
    pub fn from_args(args: &Args) -> Result<Self, PutterError> {
        if args.count == 0 {
            return Err(PutterError::InvalidCapacity(args.count));
        }

        Ok(Self {
            bind_addr: SocketAddr::new(args.bind, args.port),
            history_capacity: args.count,
            header_limit_mib: args.header_limit_mib,
            buffer_request: args.buffer_request,
            store_payload: args.store_payload,
            initial_inflight_limit: args.inflight_limit,
        })
    }

    pub fn digest_mode(&self) -> DigestMode {
        DigestMode::from_flags(self.buffer_request, self.store_payload)
    }

    /// Connection read buffer cap, which bounds accepted header size.
    ///
    /// A limit of 0 falls back to 1 MiB.
    pub fn max_header_bytes(&self) -> usize {
        let mib = if self.header_limit_mib == 0 { 1 } else { self.header_limit_mib };
        mib.saturating_mul(MIB).max(MIN_HEADER_BUF)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 7758)),
            history_capacity: 100,
            header_limit_mib: 1,
            buffer_request: false,
            store_payload: false,
            initial_inflight_limit: 0,
        }
    }
}
