use chrono::{DateTime, Utc};
use docvault_core::models::parse_record_time;
use docvault_core::CallerContext;

/// Parse a record timestamp (`YYYY-MM-DD HH:MM:SS`) given on the command line.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, String> {
    parse_record_time(raw).ok_or_else(|| {
        format!(
            "Invalid timestamp '{}'. Expected YYYY-MM-DD HH:MM:SS",
            raw.trim()
        )
    })
}

/// Build the caller identity from the `--user`/`--role` options.
pub fn caller_from(user: &str, role: &str) -> Result<CallerContext, String> {
    let user = user.trim();
    let role = role.trim();
    if user.is_empty() {
        return Err("A user name is required (--user or DOCVAULT_USER)".to_string());
    }
    if role.is_empty() {
        return Err("A role is required (--role or DOCVAULT_ROLE)".to_string());
    }
    Ok(CallerContext::new(user, role))
}

/// Initialize tracing for the CLI.
///
/// Logs go to stderr so stdout carries only command output; JSON lines in production.
pub fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_timestamp_accepts_record_format() {
        let parsed = parse_timestamp("2024-03-01 09:30:00").unwrap();
        assert_eq!(parsed.to_rfc3339(), "2024-03-01T09:30:00+00:00");
    }

    #[test]
    fn parse_timestamp_rejects_garbage() {
        let err = parse_timestamp(" yesterday ").unwrap_err();
        assert!(err.contains("'yesterday'"));
    }

    #[test]
    fn caller_from_requires_both_parts() {
        assert!(caller_from("", "admin").is_err());
        assert!(caller_from("alice", "  ").is_err());

        let caller = caller_from(" alice ", "student-org_officer").unwrap();
        assert_eq!(caller.username, "alice");
        assert_eq!(caller.primary_role(), "student");
    }
}
