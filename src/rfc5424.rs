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

//! RFC [5424]-compliant syslog message formatting
//!
//! [5424]: https://datatracker.ietf.org/doc/html/rfc5424
//!
//! [`to_payload`] renders a [`SyslogMessage`] on the wire. It never fails: header fields that
//! aren't RFC 5424-compliant are coerced into compliance (non-PRINTUSASCII characters dropped,
//! over-long values truncated) and anything left empty becomes the NILVALUE.
//!
//! This module also provides [`Hostname`], [`AppName`] & [`ProcId`]; validated versions of the
//! corresponding header fields whose [`Default`] implementations discover values for the running
//! process.

use crate::{
    error::{Error, Result},
    grammar,
    message::{StructuredData, SyslogMessage},
};

use backtrace::Backtrace;
use chrono::{DateTime, Datelike, FixedOffset, SecondsFormat};

use std::collections::HashSet;

type StdResult<T, E> = std::result::Result<T, E>;

/// Render `msg` as an RFC 5424 payload.
///
/// The result is `<PRI>1 TIMESTAMP HOSTNAME APP-NAME PROCID MSGID STRUCTURED-DATA MSG` with any
/// trailing whitespace removed, so that a message with no MSG doesn't end in a space.
pub fn to_payload(msg: &SyslogMessage) -> String {
    let mut buf = format!("<{}>{} ", msg.priority(), msg.version());
    match msg.timestamp.as_ref().and_then(timestamp) {
        Some(ts) => buf.push_str(&ts),
        None => buf.push(grammar::NILVALUE),
    }
    for (field, max) in [
        (&msg.hostname, grammar::MAXLEN_HOSTNAME),
        (&msg.appname, grammar::MAXLEN_APPNAME),
        (&msg.procid, grammar::MAXLEN_PROCID),
        (&msg.msgid, grammar::MAXLEN_MSGID),
    ] {
        buf.push(' ');
        buf.push_str(&header_field(field.as_deref(), max));
    }
    buf.push(' ');
    write_structured_data(&msg.structured_data, &mut buf);
    if let Some(text) = &msg.msg {
        buf.push(' ');
        buf.push_str(text);
    }
    buf.truncate(buf.trim_end().len());
    buf
}

/// Render `ts` as a TIMESTAMP, or `None` if it can't be expressed as one.
///
/// TIME-NUMOFFSET has no seconds, so an offset with a seconds part is moved to the next whole
/// minute towards zero (the instant is unchanged). FULL-DATE has a four-digit year, so instants
/// outside years 0000-9999 (in that offset) have no TIMESTAMP.
pub fn timestamp(ts: &DateTime<FixedOffset>) -> Option<String> {
    let offset = ts.offset().local_minus_utc();
    let ts = ts.with_timezone(&FixedOffset::east_opt(offset - offset % 60)?);
    if !(0..=9999).contains(&ts.year()) {
        return None;
    }
    // Six fractional digits is the most RFC 5424 permits
    Some(ts.to_rfc3339_opts(SecondsFormat::Micros, true))
}

/// Coerce `value` into a header field of at most `max` PRINTUSASCII characters.
pub fn header_field(value: Option<&str>, max: usize) -> String {
    let out: String = value
        .unwrap_or("")
        .chars()
        .filter(|c| grammar::is_printusascii(*c))
        .take(max)
        .collect();
    if out.is_empty() {
        grammar::NILVALUE_STR.to_string()
    } else {
        out
    }
}

/// Coerce `name` into an SD-NAME; may return the empty string.
pub fn sd_name(name: &str) -> String {
    name.chars()
        .filter(|c| grammar::is_sd_name(*c))
        .take(grammar::MAXLEN_SDNAME)
        .collect()
}

/// Escape `"`, `\` & `]` in a PARAM-VALUE.
pub fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if grammar::is_param_value_escape(c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

// SD-IDs (and PARAM-NAMEs within an element) must be unique on the wire; where coercion makes
// two of them collide, the first wins.
fn write_structured_data(sd: &StructuredData, buf: &mut String) {
    let start = buf.len();
    let mut ids: HashSet<String> = HashSet::new();
    for element in sd {
        let id = sd_name(element.id());
        if id.is_empty() || !ids.insert(id.clone()) {
            continue;
        }
        buf.push('[');
        buf.push_str(&id);
        let mut names: HashSet<String> = HashSet::new();
        for (name, value) in element.params() {
            let name = sd_name(name);
            if name.is_empty() || !names.insert(name.clone()) {
                continue;
            }
            buf.push(' ');
            buf.push_str(&name);
            buf.push_str("=\"");
            buf.push_str(&escape(value));
            buf.push('"');
        }
        buf.push(']');
    }
    if buf.len() == start {
        buf.push(grammar::NILVALUE);
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////
//                                   identity field types                                     //
////////////////////////////////////////////////////////////////////////////////////////////////

fn check_field(field: &'static str, value: String, max: usize) -> Result<String> {
    if !value.is_empty() && value.len() <= max && value.chars().all(grammar::is_printusascii) {
        Ok(value)
    } else {
        Err(Error::BadIdentity {
            field,
            name: value.into_bytes(),
            back: Backtrace::new(),
        })
    }
}

fn os_string(field: &'static str, s: std::ffi::OsString) -> Result<String> {
    s.into_string().map_err(|os| Error::BadIdentity {
        field,
        name: os.to_string_lossy().into_owned().into_bytes(),
        back: Backtrace::new(),
    })
}

/// A [`String`] with the additional constraint that it be 1-255 PRINTUSASCII characters
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Hostname(String);

impl Hostname {
    pub fn new(name: String) -> Result<Hostname> {
        Ok(Hostname(check_field(
            "HOSTNAME",
            name,
            grammar::MAXLEN_HOSTNAME,
        )?))
    }
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::default::Default for Hostname {
    /// Attempt to figure-out an RFC [5424]-compliant hostname.
    ///
    /// The RFC's order of preference for the contents of the HOSTNAME field is FQDN, static IP
    /// address, hostname, dynamic IP address, then the NILVALUE. This implementation simply tries
    /// [gethostname()], then falls back to this host's primary IP address, then the NILVALUE.
    ///
    /// [5424]: https://datatracker.ietf.org/doc/html/rfc5424
    /// [gethostname()]: https://man7.org/linux/man-pages/man2/gethostname.2.html
    fn default() -> Self {
        hostname::get()
            .map_err(|err| Error::NoHostname {
                source: Box::new(err),
                back: Backtrace::new(),
            })
            // vvv :=> StdResult<Hostname, Error>
            .and_then(|hn| Hostname::new(os_string("HOSTNAME", hn)?))
            .or_else(|_err| {
                local_ip_address::local_ip()
                    .map_err(|err| Error::NoHostname {
                        source: Box::new(err),
                        back: Backtrace::new(),
                    })
                    .and_then(|ip| Hostname::new(ip.to_string()))
            })
            .unwrap_or_else(|_| Hostname(grammar::NILVALUE_STR.to_string()))
    }
}

impl std::convert::TryFrom<String> for Hostname {
    type Error = Error;
    fn try_from(x: String) -> StdResult<Self, Self::Error> {
        Hostname::new(x)
    }
}

impl std::fmt::Display for Hostname {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> StdResult<(), std::fmt::Error> {
        write!(f, "{}", self.0)
    }
}

/// A [`String`] with the additional constraint that it be 1-48 PRINTUSASCII characters
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppName(String);

impl AppName {
    pub fn new(name: String) -> Result<AppName> {
        Ok(AppName(check_field(
            "APP-NAME",
            name,
            grammar::MAXLEN_APPNAME,
        )?))
    }
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::default::Default for AppName {
    /// Attempt to figure-out an RFC [5424] Application Name.
    ///
    /// The APP-NAME field SHOULD identify the device or application that originated the message.
    /// It is a string without further semantics, intended for filtering messages on a relay or
    /// collector.
    ///
    /// This implementation relies on [`std::env::current_exe`]. It cannot fail; if for any reason
    /// that value cannot be retrieved, or is not compliant, it falls back to the NILVALUE.
    ///
    /// [5424]: https://datatracker.ietf.org/doc/html/rfc5424
    fn default() -> Self {
        std::env::current_exe() // :=> StdResult<PathBuf, std::io::Error>
            .map_err(|err| Error::NoExecutable {
                source: Box::new(err),
                back: Backtrace::new(),
            })
            .and_then(|pbuf| match pbuf.file_name() {
                Some(os_str) => AppName::new(os_string("APP-NAME", os_str.to_os_string())?),
                None => Ok(AppName(grammar::NILVALUE_STR.to_string())),
            })
            .unwrap_or_else(|_| AppName(grammar::NILVALUE_STR.to_string()))
    }
}

impl std::convert::TryFrom<String> for AppName {
    type Error = Error;
    fn try_from(x: String) -> StdResult<Self, Self::Error> {
        AppName::new(x)
    }
}

impl std::fmt::Display for AppName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> StdResult<(), std::fmt::Error> {
        write!(f, "{}", self.0)
    }
}

/// A [`String`] with the additional constraint that it be 1-128 PRINTUSASCII characters
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProcId(String);

impl ProcId {
    pub fn new(id: String) -> Result<ProcId> {
        Ok(ProcId(check_field("PROCID", id, grammar::MAXLEN_PROCID)?))
    }
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::default::Default for ProcId {
    /// The RFC [5424] Process ID.
    ///
    /// "PROCID is a value that is included in the message, having no interoperable meaning,
    /// except that a change in the value indicates there has been a discontinuity in syslog
    /// reporting." This implementation uses [`std::process::id`].
    ///
    /// [5424]: https://datatracker.ietf.org/doc/html/rfc5424
    fn default() -> Self {
        ProcId(std::process::id().to_string())
    }
}

impl std::convert::TryFrom<String> for ProcId {
    type Error = Error;
    fn try_from(x: String) -> StdResult<Self, Self::Error> {
        ProcId::new(x)
    }
}

impl std::fmt::Display for ProcId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> StdResult<(), std::fmt::Error> {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        facility::{Facility, Severity},
        message::SdElement,
        reader::from_payload,
    };

    use chrono::{FixedOffset, TimeZone, Utc};

    #[test]
    fn end_to_end() {
        let msg = SyslogMessage::new(Facility::LOG_USER, Severity::LOG_ERR)
            .with_hostname("web1")
            .with_appname("svc")
            .with_procid("42")
            .with_msgid("-")
            .with_msg("disk full");
        assert_eq!(to_payload(&msg), "<27>1 - web1 svc 42 - - disk full");
    }

    #[test]
    fn no_msg() {
        let msg = SyslogMessage::new(Facility::LOG_KERN, Severity::LOG_EMERG);
        assert_eq!(to_payload(&msg), "<0>1 - - - - - -");
        assert_eq!(to_payload(&msg.with_msg("")), "<0>1 - - - - - -");
    }

    #[test]
    fn timestamps() {
        let ts = Utc.with_ymd_and_hms(2003, 10, 11, 22, 14, 15).unwrap()
            + chrono::Duration::milliseconds(3);
        let msg = SyslogMessage::new(Facility::LOG_USER, Severity::LOG_INFO).with_timestamp(ts);
        assert_eq!(to_payload(&msg), "<14>1 2003-10-11T22:14:15.003000Z - - - - -");

        let ts = FixedOffset::west_opt(7 * 3600)
            .unwrap()
            .with_ymd_and_hms(2003, 8, 24, 5, 14, 15)
            .unwrap();
        let msg = SyslogMessage::new(Facility::LOG_USER, Severity::LOG_INFO).with_timestamp(ts);
        assert_eq!(
            to_payload(&msg),
            "<14>1 2003-08-24T05:14:15.000000-07:00 - - - - -"
        );
    }

    #[test]
    fn timestamps_outside_the_grammar() {
        // Five-digit years become the NILVALUE
        let ts = Utc.with_ymd_and_hms(10000, 1, 1, 0, 0, 0).unwrap();
        let msg = SyslogMessage::new(Facility::LOG_USER, Severity::LOG_INFO).with_timestamp(ts);
        let payload = to_payload(&msg);
        assert_eq!(payload, "<14>1 - - - - - -");
        assert!(from_payload(&payload).is_ok());

        // as do negative ones
        let ts = Utc.with_ymd_and_hms(-1, 12, 31, 0, 0, 0).unwrap();
        let msg = SyslogMessage::new(Facility::LOG_USER, Severity::LOG_INFO).with_timestamp(ts);
        assert_eq!(to_payload(&msg), "<14>1 - - - - - -");

        // Year 9999 in UTC, but 10000 in +01:00
        let ts = FixedOffset::east_opt(3600)
            .unwrap()
            .from_utc_datetime(
                &Utc.with_ymd_and_hms(9999, 12, 31, 23, 30, 0)
                    .unwrap()
                    .naive_utc(),
            );
        let msg = SyslogMessage::new(Facility::LOG_USER, Severity::LOG_INFO).with_timestamp(ts);
        assert_eq!(to_payload(&msg), "<14>1 - - - - - -");
    }

    #[test]
    fn offsets_with_seconds() {
        let ts = FixedOffset::east_opt(3630)
            .unwrap()
            .with_ymd_and_hms(2003, 8, 24, 5, 14, 15)
            .unwrap();
        let msg = SyslogMessage::new(Facility::LOG_USER, Severity::LOG_INFO).with_timestamp(ts);
        let payload = to_payload(&msg);
        assert_eq!(payload, "<14>1 2003-08-24T05:13:45.000000+01:00 - - - - -");
        assert_eq!(from_payload(&payload).unwrap().timestamp, Some(ts));

        let ts = FixedOffset::west_opt(3630)
            .unwrap()
            .with_ymd_and_hms(2003, 8, 24, 5, 14, 15)
            .unwrap();
        let msg = SyslogMessage::new(Facility::LOG_USER, Severity::LOG_INFO).with_timestamp(ts);
        let payload = to_payload(&msg);
        assert_eq!(payload, "<14>1 2003-08-24T05:14:45.000000-01:00 - - - - -");
        assert_eq!(from_payload(&payload).unwrap().timestamp, Some(ts));
    }

    #[test]
    fn sanitization() {
        let msg = SyslogMessage::new(Facility::LOG_USER, Severity::LOG_INFO)
            .with_hostname("my host\u{e9}")
            .with_appname("a".repeat(60))
            .with_procid(" \t ")
            .with_msgid("ID 47");
        assert_eq!(
            to_payload(&msg),
            format!("<14>1 - myhost {} - ID47 -", "a".repeat(48))
        );
    }

    #[test]
    fn structured_data() {
        let msg = SyslogMessage::new(Facility::LOG_LOCAL4, Severity::LOG_NOTICE)
            .with_sd_element(
                SdElement::new("exampleSDID@32473")
                    .with_param("iut", "3")
                    .with_param("eventSource", "Application"),
            )
            .with_sd_element(SdElement::new("examplePriority@32473").with_param("class", "high"));
        assert_eq!(
            to_payload(&msg),
            "<165>1 - - - - - [exampleSDID@32473 iut=\"3\" eventSource=\"Application\"]\
             [examplePriority@32473 class=\"high\"]"
        );

        let msg = SyslogMessage::new(Facility::LOG_USER, Severity::LOG_INFO)
            .with_sd_element(
                SdElement::new("a=b c")
                    .with_param("x\"y", "v\"a\\l]")
                    .with_param("=", "dropped"),
            )
            .with_sd_element(SdElement::new("]]"))
            .with_msg("m");
        assert_eq!(
            to_payload(&msg),
            r#"<14>1 - - - - - [abc xy="v\"a\\l\]"] m"#
        );

        let msg = SyslogMessage::new(Facility::LOG_USER, Severity::LOG_INFO)
            .with_sd_element(SdElement::new(" "))
            .with_msg("m");
        assert_eq!(to_payload(&msg), "<14>1 - - - - - - m");
    }

    #[test]
    fn colliding_sd_names() {
        let msg = SyslogMessage::new(Facility::LOG_USER, Severity::LOG_INFO)
            .with_sd_element(
                SdElement::new("a b")
                    .with_param("x", "1")
                    .with_param("x y", "2")
                    .with_param("xy", "3"),
            )
            .with_sd_element(SdElement::new("ab").with_param("y", "4"))
            .with_msg("m");
        let payload = to_payload(&msg);
        assert_eq!(payload, r#"<14>1 - - - - - [ab x="1" xy="2"] m"#);

        let parsed = from_payload(&payload).unwrap();
        assert_eq!(parsed.structured_data.len(), 1);
        assert_eq!(parsed.structured_data.param("ab", "x"), Some("1"));
        assert_eq!(parsed.structured_data.param("ab", "xy"), Some("2"));
        assert_eq!(parsed.structured_data.param("ab", "y"), None);
    }

    #[test]
    fn trailing_whitespace() {
        let msg = SyslogMessage::new(Facility::LOG_USER, Severity::LOG_INFO).with_msg("hello \n");
        assert_eq!(to_payload(&msg), "<14>1 - - - - - - hello");
    }

    #[test]
    fn identity_fields() {
        // At least _exercise_ `Default`
        let _h = Hostname::default();
        let _a = AppName::default();
        assert_eq!(
            ProcId::default().as_str(),
            std::process::id().to_string().as_str()
        );

        assert!(AppName::new("a".repeat(49)).is_err());
        assert!(AppName::new("udp-test".to_string()).is_ok());
        assert!(Hostname::new("".to_string()).is_err());
        assert!(Hostname::new("has space".to_string()).is_err());
        assert!(Hostname::try_from("web1".to_string()).is_ok());
        assert!(ProcId::new("1".repeat(129)).is_err());
    }
}
