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

//! Decoding RFC 5424 payloads into [`SyslogMessage`]s.
//!
//! The reader is a thin fold over the [token stream](crate::lexer::tokenize). It relies on the
//! tokens arriving in document order: a PARAM-VALUE always belongs to the PARAM-NAME just before
//! it, which in turn belongs to the most recent SD-ID.

use crate::{
    error::GrammarError,
    facility::decompose_priority,
    grammar,
    lexer::{tokenize, Token, TokenKind},
    message::{SdElement, StructuredData, SyslogMessage},
};

use chrono::DateTime;

type StdResult<T, E> = std::result::Result<T, E>;

/// Parse `payload` into a [`SyslogMessage`].
///
/// Besides any failure of the grammar itself, a PRIVAL greater than 191 or a TIMESTAMP that is
/// well-formed but names no real instant (e.g. month 13) is reported as an
/// [`UnexpectedToken`](GrammarError::UnexpectedToken) at the start of the offending field. The
/// VERSION is accepted whatever its value.
pub fn from_payload(payload: &str) -> StdResult<SyslogMessage, GrammarError> {
    let mut msg = SyslogMessage::new(Default::default(), Default::default());
    let mut structured_data = StructuredData::new();
    let mut element: Option<SdElement> = None;
    let mut param_name: &str = "";

    for token in tokenize(payload)? {
        match token.kind {
            TokenKind::Prival => {
                let (facility, severity) = token
                    .content
                    .parse::<u16>()
                    .ok()
                    .and_then(decompose_priority)
                    .ok_or_else(|| reject(&token))?;
                msg.facility = facility;
                msg.severity = severity;
            }
            TokenKind::Version => (),
            TokenKind::Timestamp => {
                msg.timestamp =
                    Some(DateTime::parse_from_rfc3339(token.content).map_err(|_| reject(&token))?);
            }
            TokenKind::Hostname => msg.hostname = Some(token.content.to_string()),
            TokenKind::Appname => msg.appname = Some(token.content.to_string()),
            TokenKind::Procid => msg.procid = Some(token.content.to_string()),
            TokenKind::Msgid => msg.msgid = Some(token.content.to_string()),
            TokenKind::SdId => {
                if let Some(done) = element.replace(SdElement::new(token.content)) {
                    structured_data.insert(done);
                }
            }
            TokenKind::ParamName => param_name = token.content,
            TokenKind::ParamValue => {
                if let Some(current) = element.as_mut() {
                    current.insert_param(param_name, unescape(token.content));
                }
            }
            TokenKind::Msg => msg.msg = Some(token.content.to_string()),
        }
    }
    if let Some(done) = element {
        structured_data.insert(done);
    }
    msg.structured_data = structured_data;
    Ok(msg)
}

fn reject(token: &Token<'_>) -> GrammarError {
    match token.content.chars().next() {
        Some(c) => GrammarError::UnexpectedToken {
            token: c,
            index: token.span.start,
        },
        None => GrammarError::UnexpectedEnd {
            index: token.span.start,
        },
    }
}

/// Undo PARAM-VALUE escaping.
///
/// `\"`, `\\` & `\]` become the bare character. Any other backslash sequence is kept as-is,
/// backslash included.
pub fn unescape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some(next) if grammar::is_param_value_escape(next) => out.push(next),
            Some(next) => {
                out.push('\\');
                out.push(next);
            }
            None => out.push('\\'),
        }
    }
    out
}
