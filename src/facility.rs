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

//! syslog facility & severity defintions.
//!
//! [`Facility`] and [`Severity`] replicate the names used in `<syslog.h>`. Together they make up
//! the PRI part of an RFC [5424] message: `PRIVAL = facility * 8 + severity`, which is why the
//! [`Facility`] discriminants are pre-multiplied by eight (mirroring the `#define`s in
//! `<syslog.h>`).
//!
//! [5424]: https://datatracker.ietf.org/doc/html/rfc5424

type StdResult<T, E> = std::result::Result<T, E>;

/// RFC [5424] defines twenty-four "facilities" for messages. The enumeration values duplicate
/// the constants defined in `<syslog.h>`, albeit multiplied by 8 for convenience in forming
/// syslog message headers.
///
/// [5424]: https://datatracker.ietf.org/doc/html/rfc5424
#[allow(non_camel_case_types)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Facility {
    /// kernel messages
    LOG_KERN = 0 << 3,
    /// random user-level messages
    LOG_USER = 1 << 3,
    /// mail system
    LOG_MAIL = 2 << 3,
    /// system daemons
    LOG_DAEMON = 3 << 3,
    /// security/authorization messages
    LOG_AUTH = 4 << 3,
    /// messages generated internally by syslogd
    LOG_SYSLOG = 5 << 3,
    /// line printer subsystem
    LOG_LPR = 6 << 3,
    /// network news subsystem
    LOG_NEWS = 7 << 3,
    /// UUCP subsystem
    LOG_UUCP = 8 << 3,
    /// clock daemon
    LOG_CRON = 9 << 3,
    /// security/authorization messages (private)
    LOG_AUTHPRIV = 10 << 3,
    /// ftp daemon
    LOG_FTP = 11 << 3,
    /// NTP subsystem
    LOG_NTP = 12 << 3,
    /// log audit
    LOG_AUDIT = 13 << 3,
    /// log alert
    LOG_ALERT = 14 << 3,
    /// clock daemon (note 2)
    LOG_CLOCK = 15 << 3,
    /// reserved for local use
    LOG_LOCAL0 = 16 << 3,
    /// reserved for local use
    LOG_LOCAL1 = 17 << 3,
    /// reserved for local use
    LOG_LOCAL2 = 18 << 3,
    /// reserved for local use
    LOG_LOCAL3 = 19 << 3,
    /// reserved for local use
    LOG_LOCAL4 = 20 << 3,
    /// reserved for local use
    LOG_LOCAL5 = 21 << 3,
    /// reserved for local use
    LOG_LOCAL6 = 22 << 3,
    /// reserved for local use
    LOG_LOCAL7 = 23 << 3,
}

const FACILITIES: [Facility; 24] = [
    Facility::LOG_KERN,
    Facility::LOG_USER,
    Facility::LOG_MAIL,
    Facility::LOG_DAEMON,
    Facility::LOG_AUTH,
    Facility::LOG_SYSLOG,
    Facility::LOG_LPR,
    Facility::LOG_NEWS,
    Facility::LOG_UUCP,
    Facility::LOG_CRON,
    Facility::LOG_AUTHPRIV,
    Facility::LOG_FTP,
    Facility::LOG_NTP,
    Facility::LOG_AUDIT,
    Facility::LOG_ALERT,
    Facility::LOG_CLOCK,
    Facility::LOG_LOCAL0,
    Facility::LOG_LOCAL1,
    Facility::LOG_LOCAL2,
    Facility::LOG_LOCAL3,
    Facility::LOG_LOCAL4,
    Facility::LOG_LOCAL5,
    Facility::LOG_LOCAL6,
    Facility::LOG_LOCAL7,
];

impl Facility {
    /// Look up a facility by its numerical code (0-23).
    pub fn from_code(code: u8) -> Option<Facility> {
        FACILITIES.get(code as usize).copied()
    }
    /// The numerical code of this facility (0-23).
    pub fn code(self) -> u8 {
        self as u8 >> 3
    }
}

impl std::default::Default for Facility {
    /// The default facility is `LOG_USER`.
    fn default() -> Self {
        Facility::LOG_USER
    }
}

impl std::fmt::Display for Facility {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> StdResult<(), std::fmt::Error> {
        write!(
            f,
            "{}",
            match self {
                Facility::LOG_KERN => "LOG_KERN",
                Facility::LOG_USER => "LOG_USER",
                Facility::LOG_MAIL => "LOG_MAIL",
                Facility::LOG_DAEMON => "LOG_DAEMON",
                Facility::LOG_AUTH => "LOG_AUTH",
                Facility::LOG_SYSLOG => "LOG_SYSLOG",
                Facility::LOG_LPR => "LOG_LPR",
                Facility::LOG_NEWS => "LOG_NEWS",
                Facility::LOG_UUCP => "LOG_UUCP",
                Facility::LOG_CRON => "LOG_CRON",
                Facility::LOG_AUTHPRIV => "LOG_AUTHPRIV",
                Facility::LOG_FTP => "LOG_FTP",
                Facility::LOG_NTP => "LOG_NTP",
                Facility::LOG_AUDIT => "LOG_AUDIT",
                Facility::LOG_ALERT => "LOG_ALERT",
                Facility::LOG_CLOCK => "LOG_CLOCK",
                Facility::LOG_LOCAL0 => "LOG_LOCAL0",
                Facility::LOG_LOCAL1 => "LOG_LOCAL1",
                Facility::LOG_LOCAL2 => "LOG_LOCAL2",
                Facility::LOG_LOCAL3 => "LOG_LOCAL3",
                Facility::LOG_LOCAL4 => "LOG_LOCAL4",
                Facility::LOG_LOCAL5 => "LOG_LOCAL5",
                Facility::LOG_LOCAL6 => "LOG_LOCAL6",
                Facility::LOG_LOCAL7 => "LOG_LOCAL7",
            }
        )
    }
}

/// RFC [5424] defines eight severity levels for messages. The enumeration values duplicate the
/// constants documented as per the `syslog()` manual [page] & defined in `<syslog.h>`.
///
/// [5424]: https://datatracker.ietf.org/doc/html/rfc5424
/// [page]: https://man7.org/linux/man-pages/man3/syslog.3.html
#[allow(non_camel_case_types)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Severity {
    /// system is unusable
    LOG_EMERG,
    /// action must be take immediately
    LOG_ALERT,
    /// critical conditions
    LOG_CRIT,
    /// error conditions
    LOG_ERR,
    /// warning conditions
    LOG_WARNING,
    /// normal, but significant condition
    LOG_NOTICE,
    /// informational message
    LOG_INFO,
    /// debug-level message
    LOG_DEBUG,
}

const SEVERITIES: [Severity; 8] = [
    Severity::LOG_EMERG,
    Severity::LOG_ALERT,
    Severity::LOG_CRIT,
    Severity::LOG_ERR,
    Severity::LOG_WARNING,
    Severity::LOG_NOTICE,
    Severity::LOG_INFO,
    Severity::LOG_DEBUG,
];

impl Severity {
    /// Look up a severity by its numerical code (0-7).
    pub fn from_code(code: u8) -> Option<Severity> {
        SEVERITIES.get(code as usize).copied()
    }
    /// The numerical code of this severity (0-7).
    pub fn code(self) -> u8 {
        self as u8
    }
}

impl std::default::Default for Severity {
    fn default() -> Self {
        Severity::LOG_INFO
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> StdResult<(), std::fmt::Error> {
        write!(
            f,
            "{}",
            match self {
                Severity::LOG_EMERG => "LOG_EMERG",
                Severity::LOG_ALERT => "LOG_ALERT",
                Severity::LOG_CRIT => "LOG_CRIT",
                Severity::LOG_ERR => "LOG_ERR",
                Severity::LOG_WARNING => "LOG_WARNING",
                Severity::LOG_NOTICE => "LOG_NOTICE",
                Severity::LOG_INFO => "LOG_INFO",
                Severity::LOG_DEBUG => "LOG_DEBUG",
            }
        )
    }
}

/// Combine a facility & a severity into a PRIVAL (0-191).
pub fn priority(facility: Facility, severity: Severity) -> u8 {
    facility as u8 | severity as u8
}

/// Split a PRIVAL into its facility (`prival >> 3`) & severity (`prival & 7`).
///
/// Returns `None` if the facility part is out of range, i.e. if `prival` exceeds 191.
pub fn decompose_priority(prival: u16) -> Option<(Facility, Severity)> {
    let facility = u8::try_from(prival >> 3).ok().and_then(Facility::from_code)?;
    let severity = Severity::from_code((prival & 7) as u8)?;
    Some((facility, severity))
}

#[cfg(test)]
mod facility_severity_tests {
    use super::*;
    /// Test basic PRI formatting
    #[test]
    fn test_pri() {
        assert_eq!(14, priority(Facility::LOG_USER, Severity::LOG_INFO));
        assert_eq!(27, priority(Facility::LOG_USER, Severity::LOG_ERR));
        assert_eq!(191, priority(Facility::LOG_LOCAL7, Severity::LOG_DEBUG));
        assert_eq!(format!("{}", Facility::LOG_FTP), "LOG_FTP".to_string());
        assert_eq!(format!("{:?}", Facility::LOG_FTP), "LOG_FTP".to_string());
    }

    #[test]
    fn test_codes() {
        for code in 0..24u8 {
            assert_eq!(Facility::from_code(code).unwrap().code(), code);
        }
        assert!(Facility::from_code(24).is_none());
        for code in 0..8u8 {
            assert_eq!(Severity::from_code(code).unwrap().code(), code);
        }
        assert!(Severity::from_code(8).is_none());
    }

    #[test]
    fn test_decompose() {
        assert_eq!(
            decompose_priority(165),
            Some((Facility::LOG_LOCAL4, Severity::LOG_NOTICE))
        );
        assert_eq!(
            decompose_priority(0),
            Some((Facility::LOG_KERN, Severity::LOG_EMERG))
        );
        assert_eq!(decompose_priority(192), None);
        assert_eq!(decompose_priority(999), None);
    }
}
