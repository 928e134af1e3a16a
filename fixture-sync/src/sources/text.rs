use std::path::Path;

use crate::{error::SourceError, headers::HeaderSet};

use super::{read_lines, HeaderStream};

/// One user agent per line, read lazily. Blank lines and `#` comments are skipped.
pub fn read_headers(path: &Path) -> Result<HeaderStream, SourceError> {
    let stream = read_lines(path)?
        .filter_map(|line| line.map(|line| user_agent_from_line(&line)).transpose());

    Ok(Box::new(stream))
}

fn user_agent_from_line(line: &str) -> Option<HeaderSet> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    Some(HeaderSet::from_user_agent(line))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_lines_become_user_agents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agents.txt");
        fs::write(
            &path,
            "# harvested 2024-05\nMozilla/5.0 (X11; Linux x86_64)\n\n   \ncurl/8.4.0\r\n",
        )
        .unwrap();

        assert_eq!(
            agents(&path),
            vec!["Mozilla/5.0 (X11; Linux x86_64)", "curl/8.4.0"]
        );
    }

    #[test]
    fn test_invalid_utf8_line_does_not_end_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agents.txt");
        fs::write(&path, b"First\nBad \xff\xfe agent\nThird\nFourth\n").unwrap();

        assert_eq!(
            agents(&path),
            vec!["First", "Bad \u{fffd}\u{fffd} agent", "Third", "Fourth"]
        );
    }

    fn agents(path: &Path) -> Vec<String> {
        read_headers(path)
            .unwrap()
            .map(|headers| headers.unwrap().user_agent().unwrap().to_string())
            .collect()
    }
}
