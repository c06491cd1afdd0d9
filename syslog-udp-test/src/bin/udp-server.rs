// Copyright (C) 2022-2025 Michael Herstine <sp1ff@pobox.com>
//
// This file is part of syslog-udp.
//
// syslog-udp is free software: you can redistribute it and/or modify it under the terms of the
// GNU General Public License as published by the Free Software Foundation, either version 3 of the
// License, or (at your option) any later version.
//
// syslog-udp is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without
// even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU
// General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with syslog-udp.  If not,
// see <http://www.gnu.org/licenses/>.

//! Listen for RFC 5424 datagrams on UDP port 514 (or the port given on the command line) & log
//! what each decodes to. Malformed datagrams are logged & skipped.

use syslog_udp::reader::from_payload;
use tracing::{error, info, warn};

use std::net::UdpSocket;

// A UDP syslog payload may not exceed this
const MAX_DATAGRAM: usize = 65535;

pub fn main() {
    tracing_subscriber::fmt::init();

    let port = std::env::args()
        .nth(1)
        .map(|arg| arg.parse::<u16>().unwrap())
        .unwrap_or(514);
    let socket = UdpSocket::bind(("0.0.0.0", port)).unwrap();
    info!("Listening on {}", socket.local_addr().unwrap());

    let mut buf = vec![0u8; MAX_DATAGRAM];
    loop {
        let (n, peer) = match socket.recv_from(&mut buf) {
            Ok(x) => x,
            Err(err) => {
                error!("recv failed: {}", err);
                continue;
            }
        };
        let payload = String::from_utf8_lossy(&buf[..n]);
        match from_payload(&payload) {
            Ok(msg) => {
                let sd: Vec<String> = msg
                    .structured_data
                    .iter()
                    .map(|e| {
                        let params: Vec<String> = e
                            .params()
                            .map(|(name, value)| format!("{}={:?}", name, value))
                            .collect();
                        format!("{}{{{}}}", e.id(), params.join(", "))
                    })
                    .collect();
                info!(
                    "{} {}.{} ts={:?} host={:?} app={:?} proc={:?} msgid={:?} sd=[{}] msg={:?}",
                    peer,
                    msg.facility,
                    msg.severity,
                    msg.timestamp,
                    msg.hostname,
                    msg.appname,
                    msg.procid,
                    msg.msgid,
                    sd.join(" "),
                    msg.msg
                );
            }
            Err(err) => warn!("Discarding malformed datagram from {}: {} ({:?})", peer, err, payload),
        }
    }
}
