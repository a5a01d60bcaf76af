//! Candidate list helpers.

use anyhow::Context;
use reqwest::Client;
use std::collections::HashSet;
use std::path::Path;

/// Fetch and parse a list of candidates from a URL or file path.
pub(crate) async fn fetch_proxies_from_source(source: &str) -> anyhow::Result<Vec<String>> {
    let content = if source.starts_with("http://") || source.starts_with("https://") {
        let client = Client::new();
        client
            .get(source)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .with_context(|| format!("fetching proxy list from {}", source))?
            .text()
            .await
            .with_context(|| format!("reading proxy list body from {}", source))?
    } else {
        tokio::fs::read_to_string(source)
            .await
            .with_context(|| format!("reading proxy list file {}", source))?
    };
    Ok(parse_proxy_list(&content))
}

/// Parse newline-delimited candidates. Blank lines and `#` comments are
/// skipped; for CSV rows only the first column is kept.
pub fn parse_proxy_list(content: &str) -> Vec<String> {
    content
        .lines()
        .filter_map(|line| {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                return None;
            }
            let field = line.split(',').next().unwrap_or(line).trim().trim_matches('"');
            if field.contains(':') {
                Some(field.to_string())
            } else {
                None
            }
        })
        .collect()
}

/// Write addresses one per line, the format `parse_proxy_list` reads.
pub fn write_proxy_list<'a>(
    path: impl AsRef<Path>,
    addresses: impl IntoIterator<Item = &'a str>,
) -> std::io::Result<()> {
    let mut content = String::new();
    for address in addresses {
        content.push_str(address);
        content.push('\n');
    }
    std::fs::write(path, content)
}

/// Drop duplicates and candidates containing a blocked pattern, keeping order.
pub(crate) fn filter_candidates(
    candidates: Vec<String>,
    blocked_patterns: &[String],
) -> Vec<String> {
    let mut seen = HashSet::new();
    candidates
        .into_iter()
        .filter(|c| {
            !blocked_patterns
                .iter()
                .any(|p| !p.is_empty() && c.contains(p.as_str()))
        })
        .filter(|c| seen.insert(c.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_lines_and_csv_rows() {
        let content = "1.2.3.4:80\n\n  # comment\n5.6.7.8:3128,US,elite\n\
                       not-an-address\nsocks5://9.9.9.9:1080\r\n";
        assert_eq!(
            parse_proxy_list(content),
            vec!["1.2.3.4:80", "5.6.7.8:3128", "socks5://9.9.9.9:1080"]
        );
    }

    #[test]
    fn filters_duplicates_and_blocked() {
        let candidates = vec![
            "1.1.1.1:80".to_string(),
            "httpbin.org:443".to_string(),
            "1.1.1.1:80".to_string(),
            "2.2.2.2:80".to_string(),
        ];
        let filtered = filter_candidates(candidates, &["httpbin.org".to_string()]);
        assert_eq!(filtered, vec!["1.1.1.1:80", "2.2.2.2:80"]);
    }

    #[test]
    fn written_list_parses_back() {
        let path = std::env::temp_dir().join(format!("proxy-list-{}.txt", std::process::id()));
        write_proxy_list(&path, ["1.1.1.1:80", "2.2.2.2:8080"]).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(parse_proxy_list(&content), vec!["1.1.1.1:80", "2.2.2.2:8080"]);
    }

    #[tokio::test]
    async fn missing_file_is_an_error() {
        let missing = fetch_proxies_from_source("/nonexistent/proxies.txt").await;
        let err = tokio_test::assert_err!(missing);
        assert!(err.to_string().contains("/nonexistent/proxies.txt"));
    }
}
