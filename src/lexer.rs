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

//! The RFC [5424] grammar engine.
//!
//! [5424]: https://datatracker.ietf.org/doc/html/rfc5424#section-6
//!
//! [`tokenize`] walks a payload against the RFC 5424 ABNF in a single left-to-right pass with an
//! explicit cursor. Each production is a method on a private `Lexer` that checks the current
//! character against the set it expects, advances, and (for the handful of productions callers
//! care about) records a [`Token`] spanning what it consumed. No tree is built: the productions
//! are visited in document order, so the flat token sequence is enough to recover the structure.
//!
//! Field lengths are enforced while scanning, not after the fact: PRIVAL stops after three
//! digits, HOSTNAME after 255 characters and so on, leaving anything beyond in the stream for the
//! next production to reject.
//!
//! # Examples
//!
//! ```rust
//! use syslog_udp::lexer::{tokenize, TokenKind};
//! let tokens = tokenize("<34>1 - host su - ID47 - hello").unwrap();
//! let kinds: Vec<TokenKind> = tokens.iter().map(|t| t.kind).collect();
//! assert_eq!(
//!     kinds,
//!     vec![
//!         TokenKind::Prival,
//!         TokenKind::Version,
//!         TokenKind::Hostname,
//!         TokenKind::Appname,
//!         TokenKind::Msgid,
//!         TokenKind::Msg
//!     ]
//! );
//! ```

use crate::{error::GrammarError, grammar};

use std::ops::Range;

type StdResult<T, E> = std::result::Result<T, E>;
type GrammarResult<T> = StdResult<T, GrammarError>;

/// The productions for which the grammar engine emits tokens.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TokenKind {
    Prival,
    Version,
    Timestamp,
    Hostname,
    Appname,
    Procid,
    Msgid,
    Msg,
    SdId,
    ParamName,
    /// A PARAM-VALUE, still escaped
    ParamValue,
}

/// A `(kind, content, span)` triple; `content` borrows from the payload, `span` is its byte range
/// therein.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub content: &'a str,
    pub span: Range<usize>,
}

/// Tokenize `payload` according to the RFC 5424 SYSLOG-MSG production.
///
/// Succeeds only if the entire payload matches; otherwise fails with the position at which it
/// stopped matching.
pub fn tokenize(payload: &str) -> GrammarResult<Vec<Token<'_>>> {
    let mut lexer = Lexer {
        input: payload,
        index: 0,
        tokens: Vec::new(),
    };
    lexer.syslog_msg()?;
    Ok(lexer.tokens)
}

struct Lexer<'a> {
    input: &'a str,
    /// byte offset of the cursor
    index: usize,
    tokens: Vec<Token<'a>>,
}

impl<'a> Lexer<'a> {
    ////////////////////////////////////////////////////////////////////////////////////////////
    //                                   cursor primitives                                    //
    ////////////////////////////////////////////////////////////////////////////////////////////

    fn is_end_of_input(&self) -> bool {
        self.index >= self.input.len()
    }

    fn current(&self) -> Option<char> {
        self.input[self.index..].chars().next()
    }

    fn peek(&self) -> Option<char> {
        let mut chars = self.input[self.index..].chars();
        chars.next();
        chars.next()
    }

    /// The error describing the cursor's present position.
    fn unexpected(&self) -> GrammarError {
        match self.current() {
            Some(token) => GrammarError::UnexpectedToken {
                token,
                index: self.index,
            },
            None => GrammarError::UnexpectedEnd { index: self.index },
        }
    }

    fn advance(&mut self) -> GrammarResult<()> {
        match self.current() {
            Some(c) => {
                self.index += c.len_utf8();
                Ok(())
            }
            None => Err(GrammarError::UnexpectedEnd { index: self.index }),
        }
    }

    fn expect(&mut self, pred: impl Fn(char) -> bool) -> GrammarResult<()> {
        match self.current() {
            Some(c) if pred(c) => self.advance(),
            _ => Err(self.unexpected()),
        }
    }

    fn expect_char(&mut self, expected: char) -> GrammarResult<()> {
        self.expect(|c| c == expected)
    }

    /// Advance over at most `max` characters satisfying `pred`; return the number consumed.
    fn take_while(&mut self, pred: impl Fn(char) -> bool, max: usize) -> usize {
        let mut count = 0;
        while count < max {
            match self.current() {
                Some(c) if pred(c) => {
                    self.index += c.len_utf8();
                    count += 1;
                }
                _ => break,
            }
        }
        count
    }

    /// Exactly `n` DIGITs
    fn digits(&mut self, n: usize) -> GrammarResult<()> {
        if self.take_while(grammar::is_digit, n) != n {
            return Err(self.unexpected());
        }
        Ok(())
    }

    fn emit(&mut self, kind: TokenKind, start: usize) {
        self.tokens.push(Token {
            kind,
            content: &self.input[start..self.index],
            span: start..self.index,
        });
    }

    ////////////////////////////////////////////////////////////////////////////////////////////
    //                                      productions                                       //
    ////////////////////////////////////////////////////////////////////////////////////////////

    /// SYSLOG-MSG = HEADER SP STRUCTURED-DATA [SP MSG]
    fn syslog_msg(&mut self) -> GrammarResult<()> {
        self.header()?;
        self.sp()?;
        self.structured_data()?;
        if !self.is_end_of_input() {
            self.sp()?;
            self.msg();
        }
        if !self.is_end_of_input() {
            return Err(self.unexpected());
        }
        Ok(())
    }

    /// HEADER = PRI VERSION SP TIMESTAMP SP HOSTNAME SP APP-NAME SP PROCID SP MSGID
    fn header(&mut self) -> GrammarResult<()> {
        self.pri()?;
        self.version()?;
        self.sp()?;
        self.timestamp()?;
        self.sp()?;
        self.header_field(TokenKind::Hostname, grammar::MAXLEN_HOSTNAME)?;
        self.sp()?;
        self.header_field(TokenKind::Appname, grammar::MAXLEN_APPNAME)?;
        self.sp()?;
        self.header_field(TokenKind::Procid, grammar::MAXLEN_PROCID)?;
        self.sp()?;
        self.header_field(TokenKind::Msgid, grammar::MAXLEN_MSGID)
    }

    /// PRI = "<" PRIVAL ">"
    fn pri(&mut self) -> GrammarResult<()> {
        self.expect_char('<')?;
        self.prival()?;
        self.expect_char('>')
    }

    /// PRIVAL = 1*3DIGIT ; range 0 .. 191
    fn prival(&mut self) -> GrammarResult<()> {
        let start = self.index;
        if self.take_while(grammar::is_digit, grammar::MAXLEN_PRIVAL) == 0 {
            return Err(self.unexpected());
        }
        self.emit(TokenKind::Prival, start);
        Ok(())
    }

    /// VERSION = NONZERO-DIGIT 0*2DIGIT
    fn version(&mut self) -> GrammarResult<()> {
        let start = self.index;
        match self.current() {
            Some(c) if grammar::is_nonzero_digit(c) => (),
            _ => return Err(self.unexpected()),
        }
        self.take_while(grammar::is_digit, grammar::MAXLEN_VERSION);
        self.emit(TokenKind::Version, start);
        Ok(())
    }

    /// SP = %d32
    fn sp(&mut self) -> GrammarResult<()> {
        self.expect(grammar::is_sp)
    }

    /// Consume a NILVALUE if one is present.
    fn nilvalue(&mut self) -> GrammarResult<bool> {
        if self.current() == Some(grammar::NILVALUE) {
            self.advance()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// TIMESTAMP = NILVALUE / FULL-DATE "T" FULL-TIME
    fn timestamp(&mut self) -> GrammarResult<()> {
        if self.nilvalue()? {
            return Ok(());
        }
        let start = self.index;
        self.full_date()?;
        self.expect_char('T')?;
        self.full_time()?;
        self.emit(TokenKind::Timestamp, start);
        Ok(())
    }

    /// FULL-DATE = DATE-FULLYEAR "-" DATE-MONTH "-" DATE-MDAY
    fn full_date(&mut self) -> GrammarResult<()> {
        self.digits(4)?;
        self.expect_char('-')?;
        self.digits(2)?;
        self.expect_char('-')?;
        self.digits(2)
    }

    /// FULL-TIME = PARTIAL-TIME TIME-OFFSET
    fn full_time(&mut self) -> GrammarResult<()> {
        self.partial_time()?;
        self.time_offset()
    }

    /// PARTIAL-TIME = TIME-HOUR ":" TIME-MINUTE ":" TIME-SECOND [TIME-SECFRAC]
    fn partial_time(&mut self) -> GrammarResult<()> {
        self.digits(2)?;
        self.expect_char(':')?;
        self.digits(2)?;
        self.expect_char(':')?;
        self.digits(2)?;
        if self.current() == Some('.') {
            self.time_secfrac()?;
        }
        Ok(())
    }

    /// TIME-SECFRAC = "." 1*6DIGIT
    fn time_secfrac(&mut self) -> GrammarResult<()> {
        self.expect_char('.')?;
        if self.take_while(grammar::is_digit, grammar::MAXLEN_SECFRAC) == 0 {
            return Err(self.unexpected());
        }
        Ok(())
    }

    /// TIME-OFFSET = "Z" / TIME-NUMOFFSET
    /// TIME-NUMOFFSET = ("+" / "-") TIME-HOUR ":" TIME-MINUTE
    fn time_offset(&mut self) -> GrammarResult<()> {
        match self.current() {
            Some('Z') => self.advance(),
            Some('+') | Some('-') => {
                self.advance()?;
                self.digits(2)?;
                self.expect_char(':')?;
                self.digits(2)
            }
            _ => Err(self.unexpected()),
        }
    }

    /// HOSTNAME, APP-NAME, PROCID & MSGID all take the form NILVALUE / 1*`max`PRINTUSASCII.
    ///
    /// A "-" is only taken to be the NILVALUE if it stands alone; "-x" is an ordinary value.
    fn header_field(&mut self, kind: TokenKind, max: usize) -> GrammarResult<()> {
        if self.current() == Some(grammar::NILVALUE)
            && self.peek().map_or(true, |c| !grammar::is_printusascii(c))
        {
            return self.advance();
        }
        let start = self.index;
        if self.take_while(grammar::is_printusascii, max) == 0 {
            return Err(self.unexpected());
        }
        self.emit(kind, start);
        Ok(())
    }

    /// STRUCTURED-DATA = NILVALUE / 1*SD-ELEMENT
    fn structured_data(&mut self) -> GrammarResult<()> {
        if self.nilvalue()? {
            return Ok(());
        }
        self.sd_element()?;
        while self.current() == Some('[') {
            self.sd_element()?;
        }
        Ok(())
    }

    /// SD-ELEMENT = "[" SD-ID *(SP SD-PARAM) "]"
    fn sd_element(&mut self) -> GrammarResult<()> {
        self.expect_char('[')?;
        self.sd_name(TokenKind::SdId)?;
        while self.current().map_or(false, grammar::is_sp) {
            self.sp()?;
            self.sd_param()?;
        }
        self.expect_char(']')
    }

    /// SD-ID & PARAM-NAME are both SD-NAME = 1*32PRINTUSASCII ; except '=', SP, ']', %d34 (")
    fn sd_name(&mut self, kind: TokenKind) -> GrammarResult<()> {
        let start = self.index;
        if self.take_while(grammar::is_sd_name, grammar::MAXLEN_SDNAME) == 0 {
            return Err(self.unexpected());
        }
        self.emit(kind, start);
        Ok(())
    }

    /// SD-PARAM = PARAM-NAME "=" %d34 PARAM-VALUE %d34
    fn sd_param(&mut self) -> GrammarResult<()> {
        self.sd_name(TokenKind::ParamName)?;
        self.expect_char('=')?;
        self.expect_char('"')?;
        self.param_value();
        self.expect_char('"')
    }

    /// PARAM-VALUE = UTF-8-STRING ; characters '"', '\' and ']' MUST be escaped.
    ///
    /// Scans up to (but not including) the first unescaped '"'. The value is recorded as-is;
    /// un-escaping is left to the reader.
    fn param_value(&mut self) {
        let start = self.index;
        let mut escaped = false;
        while let Some(c) = self.current() {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                break;
            }
            self.index += c.len_utf8();
        }
        self.emit(TokenKind::ParamValue, start);
    }

    /// MSG = MSG-ANY / MSG-UTF8
    ///
    /// Everything to the end of input, verbatim (including any leading BOM).
    fn msg(&mut self) {
        let start = self.index;
        self.index = self.input.len();
        if self.index > start {
            self.emit(TokenKind::Msg, start);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn kinds_and_contents(payload: &str) -> Vec<(TokenKind, &str)> {
        tokenize(payload)
            .unwrap()
            .into_iter()
            .map(|t| (t.kind, t.content))
            .collect()
    }

    #[test]
    fn rfc_example_1() {
        let payload = "<34>1 2003-10-11T22:14:15.003Z mymachine.example.com su - ID47 - \
                       'su root' failed for lonvick on /dev/pts/8";
        assert_eq!(
            kinds_and_contents(payload),
            vec![
                (TokenKind::Prival, "34"),
                (TokenKind::Version, "1"),
                (TokenKind::Timestamp, "2003-10-11T22:14:15.003Z"),
                (TokenKind::Hostname, "mymachine.example.com"),
                (TokenKind::Appname, "su"),
                (TokenKind::Msgid, "ID47"),
                (
                    TokenKind::Msg,
                    "'su root' failed for lonvick on /dev/pts/8"
                ),
            ]
        );
    }

    #[test]
    fn structured_data_only() {
        let payload = "<165>1 2003-10-11T22:14:15.003-07:00 mymachine.example.com evntslog - ID47 \
                       [exampleSDID@32473 iut=\"3\" eventSource=\"Application\"][examplePriority@32473 class=\"high\"]";
        assert_eq!(
            kinds_and_contents(payload),
            vec![
                (TokenKind::Prival, "165"),
                (TokenKind::Version, "1"),
                (TokenKind::Timestamp, "2003-10-11T22:14:15.003-07:00"),
                (TokenKind::Hostname, "mymachine.example.com"),
                (TokenKind::Appname, "evntslog"),
                (TokenKind::Msgid, "ID47"),
                (TokenKind::SdId, "exampleSDID@32473"),
                (TokenKind::ParamName, "iut"),
                (TokenKind::ParamValue, "3"),
                (TokenKind::ParamName, "eventSource"),
                (TokenKind::ParamValue, "Application"),
                (TokenKind::SdId, "examplePriority@32473"),
                (TokenKind::ParamName, "class"),
                (TokenKind::ParamValue, "high"),
            ]
        );
    }

    #[test]
    fn escaped_param_value() {
        let payload = r#"<14>1 - - - - - [id a="x\"y\\z\]w" b=""]"#;
        let tokens = kinds_and_contents(payload);
        assert_eq!(tokens[2], (TokenKind::SdId, "id"));
        assert_eq!(tokens[4], (TokenKind::ParamValue, r#"x\"y\\z\]w"#));
        assert_eq!(tokens[6], (TokenKind::ParamValue, ""));
    }

    #[test]
    fn spans() {
        let tokens = tokenize("<14>1 - host - - - - m").unwrap();
        assert_eq!(tokens[0].span, 1..3);
        assert_eq!(tokens[2].kind, TokenKind::Hostname);
        assert_eq!(tokens[2].span, 8..12);
        assert_eq!(tokens[3].span, 21..22);
    }

    #[test]
    fn msg_is_verbatim() {
        let payload = "<14>1 - - - - - - \u{feff}b\u{e4}d \x1b[91m  ";
        let tokens = tokenize(payload).unwrap();
        let msg = tokens.last().unwrap();
        assert_eq!(msg.kind, TokenKind::Msg);
        assert_eq!(msg.content, "\u{feff}b\u{e4}d \x1b[91m  ");
    }

    #[test]
    fn trailing_space_no_msg() {
        let tokens = tokenize("<14>1 - - - - - - ").unwrap();
        assert!(tokens.iter().all(|t| t.kind != TokenKind::Msg));
    }

    #[test]
    fn dash_prefixed_header_values() {
        assert_eq!(
            kinds_and_contents("<14>1 - -host - - - -"),
            vec![
                (TokenKind::Prival, "14"),
                (TokenKind::Version, "1"),
                (TokenKind::Hostname, "-host"),
            ]
        );
    }

    #[test]
    fn missing_pri_close() {
        assert_eq!(
            tokenize("<34 1 - - - - - -"),
            Err(GrammarError::UnexpectedToken {
                token: ' ',
                index: 3
            })
        );
    }

    #[test]
    fn prival_too_long() {
        // The fourth digit is left in the stream, where '>' is expected.
        assert_eq!(
            tokenize("<1234>1 - - - - - -"),
            Err(GrammarError::UnexpectedToken {
                token: '4',
                index: 4
            })
        );
        assert_eq!(
            tokenize("<>1 - - - - - -"),
            Err(GrammarError::UnexpectedToken {
                token: '>',
                index: 1
            })
        );
    }

    #[test]
    fn version() {
        assert_eq!(
            tokenize("<14>0 - - - - - -"),
            Err(GrammarError::UnexpectedToken {
                token: '0',
                index: 4
            })
        );
        assert_eq!(kinds_and_contents("<14>123 - - - - - -")[1].1, "123");
        assert!(tokenize("<14>1234 - - - - - -").is_err());
    }

    #[test]
    fn unexpected_end() {
        assert_eq!(tokenize(""), Err(GrammarError::UnexpectedEnd { index: 0 }));
        assert_eq!(
            tokenize("<14>1 - - - - -"),
            Err(GrammarError::UnexpectedEnd { index: 15 })
        );
        assert_eq!(
            tokenize(r#"<14>1 - - - - - [id a="unterminated"#),
            Err(GrammarError::UnexpectedEnd { index: 35 })
        );
    }

    #[test]
    fn timestamps() {
        assert!(tokenize("<14>1 2003-08-24T05:14:15.000003-07:00 - - - - -").is_ok());
        assert!(tokenize("<14>1 2003-08-24T05:14:15Z - - - - -").is_ok());
        // seven fraction digits
        assert_eq!(
            tokenize("<14>1 2003-08-24T05:14:15.0000003-07:00 - - - - -"),
            Err(GrammarError::UnexpectedToken {
                token: '3',
                index: 32
            })
        );
        // no offset
        assert_eq!(
            tokenize("<14>1 2003-08-24T05:14:15 - - - - -"),
            Err(GrammarError::UnexpectedToken {
                token: ' ',
                index: 25
            })
        );
        // lower-case T
        assert!(tokenize("<14>1 2003-08-24t05:14:15Z - - - - -").is_err());
        // empty fraction
        assert!(tokenize("<14>1 2003-08-24T05:14:15.Z - - - - -").is_err());
    }

    #[test]
    fn header_field_lengths() {
        let appname = "a".repeat(48);
        let payload = format!("<14>1 - - {} - - -", appname);
        assert_eq!(kinds_and_contents(&payload)[2].1, appname);

        let payload = format!("<14>1 - - {}b - - -", appname);
        assert_eq!(
            tokenize(&payload),
            Err(GrammarError::UnexpectedToken {
                token: 'b',
                index: 58
            })
        );
    }

    #[test]
    fn non_ascii_header() {
        assert_eq!(
            tokenize("<14>1 - h\u{f6}st - - - -"),
            Err(GrammarError::UnexpectedToken {
                token: '\u{f6}',
                index: 9
            })
        );
    }

    #[test]
    fn bad_structured_data() {
        // empty SD-ID
        assert!(tokenize("<14>1 - - - - - []").is_err());
        // unquoted value
        assert!(tokenize("<14>1 - - - - - [id a=b]").is_err());
        // no separator between SD and MSG
        assert!(tokenize("<14>1 - - - - - [id]msg").is_err());
        // two elements back-to-back are fine
        assert!(tokenize("<14>1 - - - - - [a][b] msg").is_ok());
    }
}
