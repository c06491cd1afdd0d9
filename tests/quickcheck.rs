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

//! Property tests: anything we format, we can parse back.

use quickcheck::{Arbitrary, Gen};
use quickcheck_macros::quickcheck;
use syslog_udp::{
    facility::{decompose_priority, Facility, Severity},
    message::{SdElement, SyslogMessage},
    reader::from_payload,
    rfc5424::to_payload,
};

use chrono::{FixedOffset, TimeZone, Utc};

// Legal in every header field; '-' is left out so that no field collides with the NILVALUE
const HEADER_CHARS: &[char] = &[
    'a', 'b', 'c', 'x', 'y', 'z', 'A', 'Q', 'Z', '0', '1', '9', '.', '_', ':', '@', '#', '=', '~',
];
// Legal in an SD-NAME
const NAME_CHARS: &[char] = &['a', 'e', 'k', 'Z', '0', '7', '.', '@', '_'];

fn gen_from(g: &mut Gen, alphabet: &[char], max: usize) -> String {
    let len = usize::arbitrary(g) % max + 1;
    (0..len)
        .filter_map(|_| g.choose(alphabet).copied())
        .collect()
}

fn gen_field(g: &mut Gen, max: usize) -> Option<String> {
    if bool::arbitrary(g) {
        Some(gen_from(g, HEADER_CHARS, max))
    } else {
        None
    }
}

/// A [`SyslogMessage`] whose every field is within the RFC's constraints
#[derive(Clone, Debug)]
struct Compliant(SyslogMessage);

impl Arbitrary for Compliant {
    fn arbitrary(g: &mut Gen) -> Compliant {
        let facility = Facility::from_code(u8::arbitrary(g) % 24).unwrap_or_default();
        let severity = Severity::from_code(u8::arbitrary(g) % 8).unwrap_or_default();
        let mut msg = SyslogMessage::new(facility, severity);

        if bool::arbitrary(g) {
            // Microsecond precision is all that survives formatting
            let secs = i64::from(u32::arbitrary(g));
            let micros = u32::arbitrary(g) % 1_000_000;
            let offset_minutes = i32::from(i16::arbitrary(g)) % (14 * 60);
            let offset = FixedOffset::east_opt(offset_minutes * 60).unwrap();
            let ts = Utc.timestamp_opt(secs, micros * 1000).unwrap();
            msg = msg.with_timestamp(ts.with_timezone(&offset));
        }
        msg.hostname = gen_field(g, 255);
        msg.appname = gen_field(g, 48);
        msg.procid = gen_field(g, 128);
        msg.msgid = gen_field(g, 32);

        for _ in 0..usize::arbitrary(g) % 4 {
            let mut element = SdElement::new(gen_from(g, NAME_CHARS, 32));
            for _ in 0..usize::arbitrary(g) % 4 {
                element.insert_param(gen_from(g, NAME_CHARS, 32), String::arbitrary(g));
            }
            msg.structured_data.insert(element);
        }

        let text = String::arbitrary(g);
        let text = text.trim_end();
        if !text.is_empty() {
            msg.msg = Some(text.to_string());
        }
        Compliant(msg)
    }
}

#[quickcheck]
fn round_trip(msg: Compliant) -> bool {
    let Compliant(msg) = msg;
    from_payload(&to_payload(&msg)) == Ok(msg)
}

#[quickcheck]
fn priority_derivation(facility: u8, severity: u8) -> bool {
    let facility = Facility::from_code(facility % 24).unwrap_or_default();
    let severity = Severity::from_code(severity % 8).unwrap_or_default();
    let parsed = from_payload(&to_payload(&SyslogMessage::new(facility, severity))).unwrap();
    let prival = u16::from(parsed.priority());
    prival == u16::from(facility.code()) * 8 + u16::from(severity.code())
        && decompose_priority(prival) == Some((facility, severity))
        && parsed.facility == facility
        && parsed.severity == severity
}

#[quickcheck]
fn formatting_is_idempotent(msg: Compliant, hostname: String) -> bool {
    // Whatever the hostname, formatting coerces it into something that parses & re-formats as-is
    let Compliant(mut msg) = msg;
    msg.hostname = Some(hostname);
    let payload = to_payload(&msg);
    match from_payload(&payload) {
        Ok(parsed) => to_payload(&parsed) == payload,
        Err(_) => false,
    }
}
