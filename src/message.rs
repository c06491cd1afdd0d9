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

//! The syslog message model.
//!
//! A [`SyslogMessage`] holds the decoded fields of one RFC [5424] message. It performs no
//! validation of its own: the [writer](crate::rfc5424) sanitizes on the way out & the
//! [reader](crate::reader) enforces the grammar on the way in.
//!
//! [5424]: https://datatracker.ietf.org/doc/html/rfc5424
//!
//! # Examples
//!
//! ```rust
//! use syslog_udp::{
//!     facility::{Facility, Severity},
//!     message::{SdElement, SyslogMessage},
//! };
//! let msg = SyslogMessage::new(Facility::LOG_USER, Severity::LOG_ERR)
//!     .with_hostname("web1")
//!     .with_appname("svc")
//!     .with_procid("42")
//!     .with_sd_element(SdElement::new("origin").with_param("ip", "192.0.2.1"))
//!     .with_msg("disk full");
//! assert_eq!(
//!     msg.to_string(),
//!     "<27>1 - web1 svc 42 - [origin ip=\"192.0.2.1\"] disk full"
//! );
//! ```

use crate::{
    error::GrammarError,
    facility::{priority, Facility, Severity},
    grammar,
};

use chrono::{DateTime, FixedOffset, Offset};

type StdResult<T, E> = std::result::Result<T, E>;

/// One SD-ELEMENT: an SD-ID together with its ordered parameters.
#[derive(Clone, Debug, Eq)]
pub struct SdElement {
    id: String,
    params: Vec<(String, String)>,
}

impl SdElement {
    pub fn new(id: impl Into<String>) -> SdElement {
        SdElement {
            id: id.into(),
            params: Vec::new(),
        }
    }
    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert_param(name, value);
        self
    }
    /// Set a parameter; an existing parameter of the same name has its value replaced in place.
    pub fn insert_param(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.params.iter_mut().find(|(n, _)| *n == name) {
            Some(param) => param.1 = value,
            None => self.params.push((name, value)),
        }
    }
    pub fn id(&self) -> &str {
        &self.id
    }
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }
    /// Parameters in insertion order
    pub fn params(&self) -> impl Iterator<Item = (&str, &str)> {
        self.params.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }
}

/// Parameter order is not significant when comparing elements.
impl PartialEq for SdElement {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.params.len() == other.params.len()
            && self.params.iter().all(|(n, v)| other.param(n) == Some(v.as_str()))
    }
}

/// STRUCTURED-DATA: an insertion-ordered collection of [`SdElement`]s keyed by SD-ID.
#[derive(Clone, Debug, Default, Eq)]
pub struct StructuredData {
    elements: Vec<SdElement>,
}

impl StructuredData {
    pub fn new() -> StructuredData {
        StructuredData::default()
    }
    /// Add an element; an existing element with the same SD-ID is replaced in place.
    pub fn insert(&mut self, element: SdElement) {
        match self.elements.iter_mut().find(|e| e.id == element.id) {
            Some(existing) => *existing = element,
            None => self.elements.push(element),
        }
    }
    pub fn get(&self, id: &str) -> Option<&SdElement> {
        self.elements.iter().find(|e| e.id == id)
    }
    pub fn get_mut(&mut self, id: &str) -> Option<&mut SdElement> {
        self.elements.iter_mut().find(|e| e.id == id)
    }
    /// Shorthand for looking-up parameter `name` of element `id`
    pub fn param(&self, id: &str, name: &str) -> Option<&str> {
        self.get(id).and_then(|e| e.param(name))
    }
    pub fn iter(&self) -> std::slice::Iter<'_, SdElement> {
        self.elements.iter()
    }
    pub fn len(&self) -> usize {
        self.elements.len()
    }
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}

/// Element order is not significant when comparing structured data.
impl PartialEq for StructuredData {
    fn eq(&self, other: &Self) -> bool {
        self.elements.len() == other.elements.len()
            && self
                .elements
                .iter()
                .all(|e| other.get(&e.id).map_or(false, |o| o == e))
    }
}

impl FromIterator<SdElement> for StructuredData {
    fn from_iter<I: IntoIterator<Item = SdElement>>(iter: I) -> Self {
        let mut sd = StructuredData::new();
        iter.into_iter().for_each(|e| sd.insert(e));
        sd
    }
}

impl<'a> IntoIterator for &'a StructuredData {
    type Item = &'a SdElement;
    type IntoIter = std::slice::Iter<'a, SdElement>;
    fn into_iter(self) -> Self::IntoIter {
        self.elements.iter()
    }
}

/// An RFC 5424 syslog message.
///
/// Absent fields are rendered as the NILVALUE. PRIVAL & VERSION are derived rather than stored.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SyslogMessage {
    pub facility: Facility,
    pub severity: Severity,
    pub timestamp: Option<DateTime<FixedOffset>>,
    pub hostname: Option<String>,
    pub appname: Option<String>,
    pub procid: Option<String>,
    pub msgid: Option<String>,
    pub structured_data: StructuredData,
    pub msg: Option<String>,
}

impl SyslogMessage {
    /// A message with the given facility & severity and all other fields absent.
    pub fn new(facility: Facility, severity: Severity) -> SyslogMessage {
        SyslogMessage {
            facility,
            severity,
            timestamp: None,
            hostname: None,
            appname: None,
            procid: None,
            msgid: None,
            structured_data: StructuredData::new(),
            msg: None,
        }
    }
    /// PRIVAL: `facility * 8 + severity`
    pub fn priority(&self) -> u8 {
        priority(self.facility, self.severity)
    }
    pub fn version(&self) -> u8 {
        grammar::VERSION
    }
    pub fn with_timestamp<Tz: chrono::TimeZone>(mut self, timestamp: DateTime<Tz>) -> Self {
        self.timestamp = Some(timestamp.with_timezone(&timestamp.offset().fix()));
        self
    }
    pub fn with_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = Some(hostname.into());
        self
    }
    pub fn with_appname(mut self, appname: impl Into<String>) -> Self {
        self.appname = Some(appname.into());
        self
    }
    pub fn with_procid(mut self, procid: impl Into<String>) -> Self {
        self.procid = Some(procid.into());
        self
    }
    pub fn with_msgid(mut self, msgid: impl Into<String>) -> Self {
        self.msgid = Some(msgid.into());
        self
    }
    pub fn with_sd_element(mut self, element: SdElement) -> Self {
        self.structured_data.insert(element);
        self
    }
    pub fn with_msg(mut self, msg: impl Into<String>) -> Self {
        self.msg = Some(msg.into());
        self
    }
}

/// Renders the wire form; see [`to_payload`](crate::rfc5424::to_payload).
impl std::fmt::Display for SyslogMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> StdResult<(), std::fmt::Error> {
        f.write_str(&crate::rfc5424::to_payload(self))
    }
}

impl std::str::FromStr for SyslogMessage {
    type Err = GrammarError;
    fn from_str(s: &str) -> StdResult<Self, Self::Err> {
        crate::reader::from_payload(s)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn structured_data_ordering() {
        let mut sd = StructuredData::new();
        sd.insert(SdElement::new("a").with_param("x", "1"));
        sd.insert(SdElement::new("b"));
        sd.insert(SdElement::new("a").with_param("y", "2"));
        assert_eq!(sd.len(), 2);
        assert_eq!(
            sd.iter().map(|e| e.id()).collect::<Vec<&str>>(),
            vec!["a", "b"]
        );
        assert_eq!(sd.param("a", "x"), None);
        assert_eq!(sd.param("a", "y"), Some("2"));

        sd.get_mut("b").unwrap().insert_param("z", "3");
        assert_eq!(sd.param("b", "z"), Some("3"));

        let other: StructuredData = vec![
            SdElement::new("b").with_param("z", "3"),
            SdElement::new("a").with_param("y", "2"),
        ]
        .into_iter()
        .collect();
        assert_eq!(sd, other);
    }

    #[test]
    fn param_replacement() {
        let e = SdElement::new("id")
            .with_param("a", "1")
            .with_param("b", "2")
            .with_param("a", "3");
        assert_eq!(
            e.params().collect::<Vec<(&str, &str)>>(),
            vec![("a", "3"), ("b", "2")]
        );
        assert_eq!(e, SdElement::new("id").with_param("b", "2").with_param("a", "3"));
        assert_ne!(e, SdElement::new("id").with_param("b", "2"));
    }

    #[test]
    fn derived_fields() {
        let m = SyslogMessage::new(Facility::LOG_LOCAL4, Severity::LOG_NOTICE);
        assert_eq!(m.priority(), 165);
        assert_eq!(m.version(), 1);
        assert!(m.structured_data.is_empty());
    }
}
