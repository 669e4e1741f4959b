use regex::Regex;
use std::sync::OnceLock;

/// 捕获标记 `$<name>`
///
/// 只有当期望值整体恰好是一个捕获标记时才生效，
/// 例如 `"$<token>"`；`"Bearer $<token>"` 仍按普通字符串比较。
pub struct CaptureToken;

impl CaptureToken {
    /// 若 `text` 是捕获标记则返回变量名
    pub fn parse(text: &str) -> Option<&str> {
        static CAPTURE_REGEX: OnceLock<Regex> = OnceLock::new();
        let re = CAPTURE_REGEX.get_or_init(|| Regex::new(r"^\$<([A-Za-z0-9_]+)>$").unwrap());

        re.captures(text)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_capture_token() {
        assert_eq!(CaptureToken::parse("$<token>"), Some("token"));
        assert_eq!(CaptureToken::parse("$<user_id2>"), Some("user_id2"));
    }

    #[test]
    fn test_parse_rejects_partial_tokens() {
        assert_eq!(CaptureToken::parse("Bearer $<token>"), None);
        assert_eq!(CaptureToken::parse("$<token> "), None);
        assert_eq!(CaptureToken::parse("$<>"), None);
        assert_eq!(CaptureToken::parse("$<a-b>"), None);
        assert_eq!(CaptureToken::parse("{{token}}"), None);
    }
}
