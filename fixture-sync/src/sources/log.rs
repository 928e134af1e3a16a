use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::{error::SourceError, headers::HeaderSet};

use super::{read_lines, HeaderStream};

// host ident user [time] "request" status size "referer" "user-agent"
static COMBINED_LOG_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^\S+ \S+ \S+ \[[^\]]*\] "[^"]*" \d{3} \S+ "[^"]*" "(?P<ua>[^"]*)""#)
        .expect("combined log pattern is valid")
});

pub fn read_headers(path: &Path) -> Result<HeaderStream, SourceError> {
    let stream = read_lines(path)?.filter_map(|line| {
        line.map(|line| user_agent_from_line(&line).map(HeaderSet::from_user_agent))
            .transpose()
    });

    Ok(Box::new(stream))
}

/// The user agent of a combined-format access log line; `None` for other lines and for `-`.
pub fn user_agent_from_line(line: &str) -> Option<&str> {
    let Some(captures) = COMBINED_LOG_LINE.captures(line) else {
        if !line.trim().is_empty() {
            debug!("skipping log line that is not in combined format");
        }
        return None;
    };
    let user_agent = captures.name("ua")?.as_str().trim();
    (!user_agent.is_empty() && user_agent != "-").then_some(user_agent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const LINE: &str = concat!(
        r#"203.0.113.7 - - [10/Oct/2024:13:55:36 +0000] "GET /index.html HTTP/1.1" 200 2326 "#,
        r#""https://example.com/" "#,
        r#""Mozilla/5.0 (Linux; Android 14; Pixel 8 Build/AP1A) Chrome/124.0""#
    );

    #[test]
    fn test_user_agent_is_the_last_quoted_field() {
        assert_eq!(
            user_agent_from_line(LINE),
            Some("Mozilla/5.0 (Linux; Android 14; Pixel 8 Build/AP1A) Chrome/124.0")
        );
    }

    #[test]
    fn test_other_lines_are_skipped() {
        assert_eq!(user_agent_from_line("not a log line"), None);
        let no_agent = r#"::1 - - [10/Oct/2024:13:55:36 +0000] "GET / HTTP/1.1" 304 - "-" "-""#;
        assert_eq!(user_agent_from_line(no_agent), None);
    }

    #[test]
    fn test_log_file_is_streamed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("access.log");
        fs::write(&path, format!("{LINE}\ngarbage\n{LINE}\n")).unwrap();

        assert_eq!(read_headers(&path).unwrap().count(), 2);
    }

    #[test]
    fn test_invalid_utf8_line_does_not_end_the_log() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("access.log");
        let mut content = format!("{LINE}\n").into_bytes();
        content.extend_from_slice(b"\xff\xfe garbage\n");
        content.extend_from_slice(format!("{LINE}\n").as_bytes());
        fs::write(&path, content).unwrap();

        let read: Vec<HeaderSet> = read_headers(&path)
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();

        assert_eq!(read.len(), 2);
    }
}
