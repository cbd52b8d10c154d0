//! Parsers for HAProxy control socket replies.
//!
//! These are pure functions over the raw text of one reply. Malformed lines
//! are skipped one at a time; nothing here returns an error.

use std::collections::{BTreeMap, HashMap};

use tracing::trace;

/// Discriminator used when a `show info` reply carries no `Process_num`.
pub const UNKNOWN_PROCESS: &str = "U";

/// Parsed `show info` reply: attribute name → value.
pub type InfoRecord = BTreeMap<String, String>;

/// Parses a `show info` reply.
///
/// Format is `Key: Value` pairs, one per line. Only the first colon splits,
/// so values such as `Release_date: 2018/04/19` or times stay intact.
pub fn parse_info(content: &str) -> InfoRecord {
    let mut info = InfoRecord::new();

    for line in content.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        info.insert(key.trim().to_string(), value.trim().to_string());
    }

    info
}

/// Returns the `Process_num` of the process that produced `info`.
pub fn process_discriminator(info: &InfoRecord) -> String {
    info.get("Process_num")
        .filter(|v| !v.is_empty())
        .cloned()
        .unwrap_or_else(|| UNKNOWN_PROCESS.to_string())
}

/// One global attribute, tagged with the reporting process when several
/// processes are polled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InfoEntry {
    pub key: String,
    pub value: String,
    pub process: Option<String>,
}

/// `show info` attributes of every polled process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergedInfo {
    pub entries: Vec<InfoEntry>,
}

/// Merges per-endpoint info records.
///
/// With `disambiguate` set, every entry is tagged with its process
/// discriminator so that two processes never overwrite each other's
/// global counters.
pub fn merge_info(records: &[InfoRecord], disambiguate: bool) -> MergedInfo {
    let mut entries = Vec::new();

    for record in records {
        let process = disambiguate.then(|| process_discriminator(record));
        for (key, value) in record {
            entries.push(InfoEntry {
                key: key.clone(),
                value: value.clone(),
                process: process.clone(),
            });
        }
    }

    MergedInfo { entries }
}

/// One row of a `show stat` table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatRow {
    pub fields: HashMap<String, String>,
}

impl StatRow {
    /// Returns a column value; missing columns read as `None`.
    pub fn get(&self, column: &str) -> Option<&str> {
        self.fields.get(column).map(String::as_str)
    }

    /// Proxy name (`pxname`).
    pub fn pxname(&self) -> &str {
        self.get("pxname").unwrap_or("")
    }

    /// Service name (`svname`): `FRONTEND`, `BACKEND` or the server name.
    pub fn svname(&self) -> &str {
        self.get("svname").unwrap_or("")
    }

    /// Numeric entity type (`type`).
    pub fn type_code(&self) -> Option<u8> {
        self.get("type").and_then(|t| t.trim().parse().ok())
    }

    /// Process id (`pid`).
    pub fn pid(&self) -> Option<u32> {
        self.get("pid").and_then(|v| v.parse().ok())
    }

    /// Server id within its proxy (`sid`).
    pub fn sid(&self) -> Option<u32> {
        self.get("sid").and_then(|v| v.parse().ok())
    }

    /// Unique proxy id (`iid`).
    pub fn iid(&self) -> Option<u32> {
        self.get("iid").and_then(|v| v.parse().ok())
    }
}

/// Parses a `show stat` reply.
///
/// The reply is a CSV table whose header line starts with `# `, and every
/// line carries a trailing comma. Values are kept as strings; many are empty.
pub fn parse_stat(content: &str) -> Vec<StatRow> {
    let content = content
        .trim_start_matches(|c: char| c == '#' || c.is_whitespace())
        .trim();

    let mut lines = content
        .lines()
        .map(|line| line.trim_end_matches('\r'))
        .map(|line| line.strip_suffix(',').unwrap_or(line));

    let Some(header_line) = lines.next() else {
        return Vec::new();
    };
    let header: Vec<String> = split_csv_line(header_line)
        .into_iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut rows = Vec::new();
    for line in lines {
        if line.trim().is_empty() {
            continue;
        }
        let mut cells = split_csv_line(line).into_iter();
        let fields = header
            .iter()
            .map(|column| (column.clone(), cells.next().unwrap_or_default()))
            .collect();
        rows.push(StatRow { fields });
    }

    rows
}

/// Splits a CSV line handling quoted fields.
fn split_csv_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            if c == '"' {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    current.push('"');
                } else {
                    in_quotes = false;
                }
            } else {
                current.push(c);
            }
        } else if c == '"' {
            in_quotes = true;
        } else if c == ',' {
            fields.push(std::mem::take(&mut current));
        } else {
            current.push(c);
        }
    }
    fields.push(current);

    fields
}

/// Parsed `show resolvers` reply: nameserver → counter → value.
pub type ResolverReport = BTreeMap<String, BTreeMap<String, String>>;

/// Position of the resolver scanner.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ResolverCursor {
    NoNameserver,
    Nameserver(String),
}

/// Returns true when HAProxy rejected the command.
pub fn is_unknown_command(content: &str) -> bool {
    content
        .trim_start()
        .get(..15)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("unknown command"))
}

/// Parses a `show resolvers` reply.
///
/// ```text
/// Resolvers section mydns
///  nameserver dns1:
///   sent:              8
///   snd_error:         0
/// ```
///
/// Older HAProxy versions answer "Unknown command"; that yields an empty
/// report. Counter lines seen before any `nameserver` line are dropped.
pub fn parse_resolvers(content: &str) -> ResolverReport {
    let mut report = ResolverReport::new();
    if is_unknown_command(content) {
        return report;
    }

    let mut cursor = ResolverCursor::NoNameserver;

    for line in content.lines() {
        if line.trim().is_empty() || line.contains("Resolvers section") {
            continue;
        }

        let mut tokens = line.split_whitespace();
        if tokens.any(|t| t == "nameserver") {
            if let Some(name) = tokens.next() {
                let name = name.strip_suffix(':').unwrap_or(name).to_string();
                report.entry(name.clone()).or_default();
                cursor = ResolverCursor::Nameserver(name);
            } else {
                cursor = ResolverCursor::NoNameserver;
            }
            continue;
        }

        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        match &cursor {
            ResolverCursor::Nameserver(name) => {
                report
                    .entry(name.clone())
                    .or_default()
                    .insert(key.trim().to_string(), value.trim().to_string());
            }
            ResolverCursor::NoNameserver => {
                trace!("resolver counter '{}' before any nameserver, dropped", key.trim());
            }
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::mock::{SHOW_INFO, SHOW_RESOLVERS, SHOW_STAT, UNKNOWN_COMMAND};

    #[test]
    fn test_parse_info() {
        let info = parse_info(SHOW_INFO);
        assert_eq!(info.get("Name").map(String::as_str), Some("HAProxy"));
        assert_eq!(info.get("CumReq").map(String::as_str), Some("1640"));
        assert_eq!(
            info.get("Uptime").map(String::as_str),
            Some("0d 1h02m03s")
        );
        assert_eq!(info.get("description").map(String::as_str), Some(""));
    }

    #[test]
    fn test_parse_info_splits_on_first_colon_only() {
        let info = parse_info("Release_date: 2018/04/19 12:00:00\n");
        assert_eq!(
            info.get("Release_date").map(String::as_str),
            Some("2018/04/19 12:00:00")
        );
    }

    #[test]
    fn test_parse_info_skips_lines_without_colon() {
        let info = parse_info("garbage line\n  Pid :  42  \n\n");
        assert_eq!(info.len(), 1);
        assert_eq!(info.get("Pid").map(String::as_str), Some("42"));
    }

    #[test]
    fn test_parse_info_round_trip_on_trimmed_pairs() {
        let content = "  Maxconn :2000\nIdle_pct:   97 \nnode: lb1\n";
        let info = parse_info(content);
        let reserialized: String = info
            .iter()
            .map(|(k, v)| format!("{}: {}\n", k, v))
            .collect();
        assert_eq!(parse_info(&reserialized), info);
        assert_eq!(info.get("Maxconn").map(String::as_str), Some("2000"));
        assert_eq!(info.get("Idle_pct").map(String::as_str), Some("97"));
    }

    #[test]
    fn test_process_discriminator() {
        assert_eq!(process_discriminator(&parse_info(SHOW_INFO)), "1");
        assert_eq!(process_discriminator(&parse_info("Pid: 1\n")), "U");
        assert_eq!(process_discriminator(&parse_info("Process_num:\n")), "U");
    }

    #[test]
    fn test_merge_info_single_endpoint_untagged() {
        let merged = merge_info(&[parse_info("CumReq: 5\n")], false);
        assert_eq!(
            merged.entries,
            vec![InfoEntry {
                key: "CumReq".to_string(),
                value: "5".to_string(),
                process: None,
            }]
        );
    }

    #[test]
    fn test_merge_info_tags_each_process() {
        let records = [
            parse_info("Process_num: 1\nCumReq: 5\n"),
            parse_info("Process_num: 2\nCumReq: 7\n"),
        ];
        let merged = merge_info(&records, true);
        let cum_req: Vec<_> = merged
            .entries
            .iter()
            .filter(|e| e.key == "CumReq")
            .map(|e| (e.value.as_str(), e.process.as_deref()))
            .collect();
        assert_eq!(cum_req, vec![("5", Some("1")), ("7", Some("2"))]);
    }

    #[test]
    fn test_parse_stat() {
        let rows = parse_stat(SHOW_STAT);
        assert_eq!(rows.len(), 4);

        assert_eq!(rows[0].pxname(), "http-in");
        assert_eq!(rows[0].svname(), "FRONTEND");
        assert_eq!(rows[0].type_code(), Some(0));
        assert_eq!(rows[0].get("qcur"), Some(""));
        assert_eq!(rows[0].get("stot"), Some("1500"));

        assert_eq!(rows[1].svname(), "web1");
        assert_eq!(rows[1].type_code(), Some(2));
        assert_eq!(rows[1].pid(), Some(1));
        assert_eq!(rows[1].iid(), Some(3));
        assert_eq!(rows[1].sid(), Some(1));
        assert_eq!(rows[1].get("ttime"), Some("40"));
    }

    #[test]
    fn test_parse_stat_every_row_has_every_column() {
        let content = "# pxname,svname,scur,type,\nfe,FRONTEND,1,0,\nbe,BACKEND,,1,\nbe,s1,\n";
        let rows = parse_stat(content);
        assert_eq!(rows.len(), 3);
        for row in &rows {
            assert_eq!(row.fields.len(), 4);
            for column in ["pxname", "svname", "scur", "type"] {
                assert!(row.get(column).is_some(), "missing {}", column);
            }
        }
        assert_eq!(rows[2].get("type"), Some(""));
        assert_eq!(rows[2].type_code(), None);
    }

    #[test]
    fn test_parse_stat_quoted_cells() {
        let content = "# pxname,svname,check_desc,\nbe,s1,\"Layer7, \"\"ok\"\"\",\n";
        let rows = parse_stat(content);
        assert_eq!(rows[0].get("check_desc"), Some("Layer7, \"ok\""));
    }

    #[test]
    fn test_parse_stat_empty_body() {
        assert!(parse_stat("").is_empty());
        assert!(parse_stat("# pxname,svname,\n").is_empty());
    }

    #[test]
    fn test_split_csv_line() {
        assert_eq!(split_csv_line("a,,b"), vec!["a", "", "b"]);
        assert_eq!(split_csv_line("\"x,y\",z"), vec!["x,y", "z"]);
    }

    #[test]
    fn test_parse_resolvers() {
        let body = "Resolvers section x\n nameserver dns1:\n  sent:        8\n";
        let report = parse_resolvers(body);

        let mut expected = ResolverReport::new();
        expected
            .entry("dns1".to_string())
            .or_default()
            .insert("sent".to_string(), "8".to_string());
        assert_eq!(report, expected);
    }

    #[test]
    fn test_parse_resolvers_fixture() {
        let report = parse_resolvers(SHOW_RESOLVERS);
        assert_eq!(report.len(), 2);
        assert_eq!(report["dns1"].len(), 15);
        assert_eq!(report["dns2"]["timeout"], "1");
        assert_eq!(report["dns2"]["snd_error"], "1");
    }

    #[test]
    fn test_parse_resolvers_unknown_command() {
        assert!(parse_resolvers(UNKNOWN_COMMAND).is_empty());
        assert!(parse_resolvers("unknown COMMAND\n").is_empty());
        assert!(is_unknown_command("  Unknown command."));
        assert!(!is_unknown_command("Resolvers section x"));
    }

    #[test]
    fn test_parse_resolvers_counter_before_nameserver_dropped() {
        let body = "  sent: 3\n nameserver dns1:\n  valid: 2\n  broken line\n";
        let report = parse_resolvers(body);
        assert_eq!(report.len(), 1);
        assert_eq!(report["dns1"].len(), 1);
        assert_eq!(report["dns1"]["valid"], "2");
    }

    #[test]
    fn test_parse_resolvers_nameless_nameserver_resets_cursor() {
        let body = " nameserver dns1:\n  sent: 8\n nameserver\n  sent: 5\n  valid: 1\n";
        let report = parse_resolvers(body);

        assert_eq!(report.len(), 1);
        assert_eq!(report["dns1"].len(), 1);
        assert_eq!(report["dns1"]["sent"], "8");
    }

    #[test]
    fn test_parse_resolvers_empty_nameserver_kept() {
        let report = parse_resolvers("Resolvers section x\n nameserver dns1:\n");
        assert_eq!(report.len(), 1);
        assert!(report["dns1"].is_empty());
    }
}
