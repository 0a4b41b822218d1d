//! 从生成文本中提取围栏 SQL 代码块
//!
//! 约定：只含 ```sql（语言标签不区分大小写）的行开启代码块，下一个只含 ``` 的行关闭。
//! 代码块内容不会跨越围栏行；空代码块跳过，取第一个非空代码块。找不到时返回 None，从不报错。

use std::sync::OnceLock;

use regex::Regex;

static SQL_FENCE_RE: OnceLock<Regex> = OnceLock::new();
static CLOSING_FENCE_RE: OnceLock<Regex> = OnceLock::new();

fn sql_fence_re() -> &'static Regex {
    SQL_FENCE_RE.get_or_init(|| Regex::new(r"^[ \t]*```[ \t]*(?i:sql)[ \t]*$").unwrap())
}

fn closing_fence_re() -> &'static Regex {
    CLOSING_FENCE_RE.get_or_init(|| Regex::new(r"^[ \t]*```[ \t]*$").unwrap())
}

/// 提取第一个非空 ```sql 代码块的内容（去掉首尾空白）
pub fn extract_fenced_query(text: &str) -> Option<String> {
    let mut lines = text.lines().map(|l| l.trim_end_matches('\r'));
    while lines.any(|line| sql_fence_re().is_match(line)) {
        let mut body = Vec::new();
        let mut closed = false;
        for line in lines.by_ref() {
            if closing_fence_re().is_match(line) {
                closed = true;
                break;
            }
            if sql_fence_re().is_match(line) {
                // 未闭合的开启行后紧跟新的开启行：以后者为准
                body.clear();
                continue;
            }
            body.push(line);
        }
        if !closed {
            return None;
        }
        let query = body.join("\n").trim().to_string();
        if !query.is_empty() {
            return Some(query);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_first_block() {
        let text = "Here you go:\n```sql\nSELECT gender, COUNT(*) FROM all_responses GROUP BY gender\n```\n\
                    Alternative:\n```sql\nSELECT 1\n```";
        assert_eq!(
            extract_fenced_query(text).as_deref(),
            Some("SELECT gender, COUNT(*) FROM all_responses GROUP BY gender")
        );
    }

    #[test]
    fn test_multiline_and_uppercase_tag() {
        let text = "```SQL\r\nWITH stats AS (\r\n  SELECT COUNT(*) AS total FROM all_responses\r\n)\r\nSELECT total FROM stats\r\n```";
        let query = extract_fenced_query(text).unwrap();
        assert!(query.starts_with("WITH stats AS ("));
        assert!(query.ends_with("SELECT total FROM stats"));
    }

    #[test]
    fn test_no_block_is_none() {
        assert_eq!(extract_fenced_query("SELECT * FROM all_responses"), None);
        assert_eq!(extract_fenced_query("```python\nprint(1)\n```"), None);
        assert_eq!(extract_fenced_query("```sql\nSELECT 1"), None);
        assert_eq!(extract_fenced_query("```sql\n   \n```"), None);
        assert_eq!(extract_fenced_query(""), None);
    }

    #[test]
    fn test_empty_block_does_not_swallow_prose() {
        let text = "```sql\n```\nSorry, retry:\n```sql\nSELECT 1\n```";
        assert_eq!(extract_fenced_query(text).as_deref(), Some("SELECT 1"));
    }

    #[test]
    fn test_body_stops_at_first_closing_fence() {
        let text = "```sql\nSELECT 1\n```\nnot sql\n```";
        assert_eq!(extract_fenced_query(text).as_deref(), Some("SELECT 1"));
    }

    #[test]
    fn test_reopened_fence_restarts_body() {
        let text = "```sql\n```sql\nSELECT 2\n```";
        assert_eq!(extract_fenced_query(text).as_deref(), Some("SELECT 2"));
    }

    #[test]
    fn test_sqlite_tag_is_not_sql() {
        assert_eq!(extract_fenced_query("```sqlite\nSELECT 1\n```"), None);
    }
}
