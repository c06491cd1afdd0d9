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

//! Send a few rounds of messages to each host named on the command line (port 514; `$loopback`
//! if none are given), both directly & by way of `tracing`.
//!
//! ```text
//! udp-client '$loopback' '$subnet' some.host
//! ```

use syslog_udp::{
    adapter::{Layer, TraceAdapter},
    client::{ClientConfig, SyslogClient, REARM_DELAY},
    facility::Severity,
    message::SdElement,
};
use tracing::{error, info, warn};
use tracing_subscriber::{
    layer::SubscriberExt, // Needed to get `with()`
    registry::Registry,
};

use std::{thread, time::Duration};

const ROUNDS: usize = 3;

pub fn main() {
    let hosts = std::env::args().skip(1).collect::<Vec<String>>().join(" ");
    let hosts = if hosts.trim().is_empty() {
        "$loopback".to_string()
    } else {
        hosts
    };

    let config = ClientConfig {
        rearm_after: Some(REARM_DELAY),
        ..Default::default()
    };
    let clients = SyslogClient::for_hosts(&hosts, &config).unwrap();

    // Mirror `tracing` events to the console & to the first host.
    let subscriber = Registry::default()
        .with(tracing_subscriber::fmt::layer())
        .with(Layer::new(clients[0].clone()));
    let _guard = tracing::subscriber::set_default(subscriber);

    for round in 0..ROUNDS {
        for client in &clients {
            client.send_text(&format!("Hello, 世界! (round {})", round));
            client.send_warning("This is a warning");
            client.send_error("This is an error");
            client.write_line(Severity::LOG_CRIT, "Critical, via the trace adapter");
            let mut msg = client
                .identity()
                .message(Severity::LOG_NOTICE, "With structured data");
            msg.msgid = Some("ROUND".to_string());
            msg.structured_data.insert(
                SdElement::new("round@32473")
                    .with_param("n", round.to_string())
                    .with_param("quote", "\"]\\"),
            );
            client.send(&msg);
        }
        info!("Round {} sent", round);
        thread::sleep(Duration::from_secs(2));
    }
    warn!("Closing {} client(s)", clients.len());
    error!("Goodbye");
    clients.iter().for_each(SyslogClient::close);
}
