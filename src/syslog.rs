// Copyright 2026 KillKrill Authors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

//! RFC3164 ("classic BSD syslog", `<PRI>DATE HOST PROG: MSG`) parsing.
//! Only this wire format is implemented; a `LogSource` may still declare
//! `format_hint` as RFC5424 or JSON, but nothing in this crate parses
//! those — see DESIGN.md for how that Open Question was resolved.

const FACILITIES: [&str; 12] = [
    "kernel", "user", "mail", "daemon", "auth", "syslog", "lpr", "news", "uucp", "cron",
    "authpriv", "ftp",
];

const SEVERITIES: [&str; 8] = [
    "emergency", "alert", "critical", "error", "warning", "notice", "info", "debug",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedSyslog {
    pub facility: String,
    pub severity: String,
    pub hostname: String,
    pub program: String,
    pub message: String,
}

impl Default for ParsedSyslog {
    fn default() -> Self {
        Self {
            facility: "user".to_string(),
            severity: "info".to_string(),
            hostname: String::new(),
            program: String::new(),
            message: String::new(),
        }
    }
}

/// Parses `raw` as an RFC3164 message. Any malformed `<PRI>` prefix, or
/// the complete absence of one, falls back to the defaults with `message`
/// set to the original text verbatim — this parser never errors, matching
/// the "poisonous record" policy of the component that calls it (spec §7:
/// per-entry transform failures are counted, not fatal).
pub fn parse_rfc3164(raw: &str) -> ParsedSyslog {
    let mut result = ParsedSyslog {
        message: raw.to_string(),
        ..ParsedSyslog::default()
    };

    if !raw.starts_with('<') {
        return result;
    }
    let Some(end_pos) = raw.find('>') else {
        return result;
    };
    let Ok(priority) = raw[1..end_pos].parse::<u32>() else {
        return result;
    };

    let facility_num = (priority >> 3) as usize;
    let severity_num = (priority & 7) as usize;
    result.facility = FACILITIES
        .get(facility_num)
        .copied()
        .unwrap_or("user")
        .to_string();
    result.severity = SEVERITIES
        .get(severity_num)
        .copied()
        .unwrap_or("info")
        .to_string();

    let remaining = raw[end_pos + 1..].trim();
    let parts: Vec<&str> = remaining.splitn(4, ' ').collect();
    if parts.len() >= 3 {
        result.hostname = parts.get(1).copied().unwrap_or("").to_string();
        result.program = parts
            .get(2)
            .copied()
            .unwrap_or("")
            .split(':')
            .next()
            .unwrap_or("")
            .to_string();
        result.message = parts.get(3).copied().unwrap_or(remaining).to_string();
    } else {
        result.message = remaining.to_string();
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_message_parses_all_fields() {
        let parsed = parse_rfc3164("<34>Oct 11 22:14:15 mymachine su: 'su root' failed");
        assert_eq!(parsed.facility, "auth");
        assert_eq!(parsed.severity, "critical");
        assert_eq!(parsed.hostname, "mymachine");
        assert_eq!(parsed.program, "su");
        assert_eq!(parsed.message, "'su root' failed");
    }

    #[test]
    fn facility_severity_derivation_matches_bit_arithmetic() {
        for priority in 0u32..191 {
            let raw = format!("<{priority}>host prog: msg");
            let parsed = parse_rfc3164(&raw);
            let expected_facility = FACILITIES
                .get((priority >> 3) as usize)
                .copied()
                .unwrap_or("user");
            let expected_severity = SEVERITIES
                .get((priority & 7) as usize)
                .copied()
                .unwrap_or("info");
            assert_eq!(parsed.facility, expected_facility);
            assert_eq!(parsed.severity, expected_severity);
        }
    }

    #[test]
    fn missing_priority_falls_back_to_defaults() {
        let parsed = parse_rfc3164("plain message with no PRI");
        assert_eq!(parsed.facility, "user");
        assert_eq!(parsed.severity, "info");
        assert_eq!(parsed.message, "plain message with no PRI");
    }

    #[test]
    fn malformed_priority_falls_back_without_panicking() {
        let parsed = parse_rfc3164("<not-a-number>host prog: msg");
        assert_eq!(parsed.facility, "user");
        assert_eq!(parsed.message, "<not-a-number>host prog: msg");
    }

    #[test]
    fn unknown_facility_number_falls_back_to_user() {
        // facility 23 is out of range for the 12-entry table (max valid is 11).
        let priority = (23 << 3) | 6;
        let raw = format!("<{priority}>host prog: msg");
        let parsed = parse_rfc3164(&raw);
        assert_eq!(parsed.facility, "user");
        assert_eq!(parsed.severity, "info");
    }

    #[test]
    fn short_remaining_without_program_keeps_full_text_as_message() {
        let parsed = parse_rfc3164("<13>just two words");
        assert_eq!(parsed.message, "just two words");
    }
}
