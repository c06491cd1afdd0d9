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

//! Constants & character classes from the RFC [5424] ABNF.
//!
//! [5424]: https://datatracker.ietf.org/doc/html/rfc5424#section-6

/// NILVALUE = "-"
pub const NILVALUE: char = '-';
/// NILVALUE, as it appears on the wire
pub const NILVALUE_STR: &str = "-";

/// The only protocol version defined by RFC 5424
pub const VERSION: u8 = 1;

/// HOSTNAME = NILVALUE / 1*255PRINTUSASCII
pub const MAXLEN_HOSTNAME: usize = 255;
/// APP-NAME = NILVALUE / 1*48PRINTUSASCII
pub const MAXLEN_APPNAME: usize = 48;
/// PROCID = NILVALUE / 1*128PRINTUSASCII
pub const MAXLEN_PROCID: usize = 128;
/// MSGID = NILVALUE / 1*32PRINTUSASCII
pub const MAXLEN_MSGID: usize = 32;
/// SD-NAME = 1*32PRINTUSASCII
pub const MAXLEN_SDNAME: usize = 32;
/// PRIVAL = 1*3DIGIT
pub const MAXLEN_PRIVAL: usize = 3;
/// VERSION = NONZERO-DIGIT 0*2DIGIT
pub const MAXLEN_VERSION: usize = 3;
/// TIME-SECFRAC = "." 1*6DIGIT
pub const MAXLEN_SECFRAC: usize = 6;

/// BOM = %xEF.BB.BF
pub const BOM: char = '\u{feff}';

/// SP = %d32
pub fn is_sp(c: char) -> bool {
    c == ' '
}

/// NONZERO-DIGIT = %d49-57
pub fn is_nonzero_digit(c: char) -> bool {
    ('1'..='9').contains(&c)
}

/// DIGIT = %d48 / NONZERO-DIGIT
pub fn is_digit(c: char) -> bool {
    c.is_ascii_digit()
}

/// PRINTUSASCII = %d33-126
pub fn is_printusascii(c: char) -> bool {
    ('!'..='~').contains(&c)
}

/// SD-NAME = 1*32PRINTUSASCII ; except '=', SP, ']', %d34 (")
pub fn is_sd_name(c: char) -> bool {
    is_printusascii(c) && !matches!(c, '=' | ' ' | ']' | '"')
}

/// PARAM-VALUE = UTF-8-STRING ; characters '"', '\' and ']' MUST be escaped.
pub fn is_param_value_escape(c: char) -> bool {
    matches!(c, '"' | '\\' | ']')
}
