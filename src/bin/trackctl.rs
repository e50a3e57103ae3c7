//! trackctl - admin client for a running trackport server
//!
//! Usage:
//!
//! ```text
//! trackctl <host:port> <key> <command> [imei]
//! ```
//!
//! Sends one admin frame and prints the single reply line.

use std::env;
use std::io::{BufRead, BufReader, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::process::ExitCode;
use std::time::Duration;
use trackport::admin::AdminRequest;
use trackport::admin::commands::*;
use trackport::error::{Error, Result};

const IO_TIMEOUT: Duration = Duration::from_secs(60);

/// How a named command is sent
struct CommandSpec {
    name: &'static str,
    bytes: &'static [u8],
    /// Needs a device identifier
    targeted: bool,
    /// Delivered to the device rather than answered by the server
    direct: bool,
}

const fn server(name: &'static str, bytes: &'static [u8]) -> CommandSpec {
    CommandSpec {
        name,
        bytes,
        targeted: false,
        direct: false,
    }
}

const fn device(name: &'static str, bytes: &'static [u8], direct: bool) -> CommandSpec {
    CommandSpec {
        name,
        bytes,
        targeted: true,
        direct,
    }
}

const COMMANDS: &[CommandSpec] = &[
    server("clientCount", &[CMD_CLIENT_COUNT]),
    server("runTime", &[CMD_RUN_TIME]),
    server("clientMaxCount", &[CMD_CLIENT_MAX_COUNT]),
    server("downloadedBytes", &[CMD_DOWNLOADED_BYTES]),
    server("uploadedBytes", &[CMD_UPLOADED_BYTES]),
    server("list", &[CMD_LIST]),
    server("handshakes", &[CMD_HANDSHAKES]),
    server("status", &[CMD_STATUS]),
    // Arnavi device commands
    device("transmitCoords", &[0x01, 0x01], true),
    device("updateSoftwareForce", &[0x01, 0x04], true),
    device("updateSoftware", &[0x01, 0x05], true),
    device("reset", &[0x01, 0x07], true),
    device("downloadSettingsFromWebConf", &[0x01, 0x08], true),
    device("sendSettingsToWebConf", &[0x01, 0x09], true),
    // Per-device counters
    device("imeiRunTime", &[CMD_DEV_RUN_TIME], false),
    device("imeiDownloadedBytes", &[CMD_DEV_DOWNLOADED_BYTES], false),
    device("imeiUploadedBytes", &[CMD_DEV_UPLOADED_BYTES], false),
    device("imeiHandshakes", &[CMD_DEV_HANDSHAKES], false),
    device("imeiStatus", &[CMD_DEV_STATUS], false),
];

fn usage() -> String {
    let names: Vec<_> = COMMANDS.iter().map(|c| c.name).collect();
    format!(
        "usage: trackctl <host:port> <key> <command> [imei]\ncommands: {}",
        names.join(" ")
    )
}

fn build_request(args: &[String]) -> Result<(String, Vec<u8>)> {
    let [address, key, command, rest @ ..] = args else {
        return Err(Error::Other(usage()));
    };
    let spec = COMMANDS
        .iter()
        .find(|c| c.name == command.as_str())
        .ok_or_else(|| Error::Other(format!("unknown command {}\n{}", command, usage())))?;

    let request = if spec.targeted {
        let device_id = rest
            .first()
            .ok_or_else(|| Error::Other(format!("{} needs a device identifier", spec.name)))?;
        AdminRequest::Targeted {
            device_id: device_id.clone(),
            command: spec.bytes.to_vec(),
            direct: spec.direct,
        }
    } else {
        AdminRequest::Broadcast {
            command: spec.bytes.to_vec(),
        }
    };
    Ok((address.clone(), request.encode(key.as_bytes())))
}

fn send(address: &str, frame: &[u8]) -> Result<String> {
    let addr = address
        .to_socket_addrs()?
        .next()
        .ok_or_else(|| Error::Other(format!("cannot resolve {}", address)))?;
    let mut stream = TcpStream::connect_timeout(&addr, IO_TIMEOUT)?;
    stream.set_read_timeout(Some(IO_TIMEOUT))?;
    stream.write_all(frame)?;

    let mut line = String::new();
    BufReader::new(stream).read_line(&mut line)?;
    Ok(line.trim_end().to_string())
}

fn main() -> ExitCode {
    let args: Vec<String> = env::args().skip(1).collect();
    let result = build_request(&args).and_then(|(address, frame)| send(&address, &frame));
    match result {
        Ok(reply) => {
            println!("{}", reply);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}
