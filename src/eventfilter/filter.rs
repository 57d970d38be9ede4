use std::collections::HashMap;
use std::io::BufRead;

use parking_lot::Mutex;
use tracing::warn;

use crate::domain::models::{CheckerResult, EventRuleConfig, RuntimeEventRule};

/// Per-rule detail lines are truncated after this many appends (spec.md §4.2).
pub const MAX_DETAIL_LINES: usize = 3;

/// Mutable per-cycle accumulator behind `EventFilter`'s mutex. Tracks which
/// rules have already matched in this cycle (by index into `checkers`) and
/// how many detail lines each has accumulated, independent of `curr` (which
/// keeps counting past `MAX_DETAIL_LINES`).
#[derive(Default)]
struct EventCache {
    checkers: Vec<CheckerResult>,
    index: HashMap<String, usize>,
    appended: HashMap<String, usize>,
    /// Unique devices seen per rule, in first-seen order, joined into
    /// `CheckerResult::device` on every update. Used by `PodLog` (spec.md
    /// §4.7) to attribute a match to the pod whose log file produced it;
    /// unused (stays empty) for streaming sources like `Dmesg` that never
    /// pass a device.
    devices: HashMap<String, Vec<String>>,
}

impl EventCache {
    fn add(&mut self, rule: &RuntimeEventRule, line: &str, device: Option<&str>) {
        if let Some(&i) = self.index.get(&rule.config.name) {
            let entry = &mut self.checkers[i];
            let curr: u64 = entry.curr.parse().unwrap_or(1);
            entry.curr = (curr + 1).to_string();

            let appended = self.appended.entry(rule.config.name.clone()).or_insert(1);
            if *appended < MAX_DETAIL_LINES {
                entry.detail.push('\n');
                entry.detail.push_str(line);
                *appended += 1;
            }
            if let Some(device) = device.filter(|d| !d.is_empty()) {
                let seen = self.devices.entry(rule.config.name.clone()).or_default();
                if !seen.iter().any(|d| d == device) {
                    seen.push(device.to_string());
                }
                entry.device = seen.join(",");
            }
        } else {
            let mut entry = CheckerResult::abnormal(&rule.config.name, rule.config.description.clone(), rule.config.level)
                .with_curr("1")
                .with_detail(line)
                .with_suggestion(rule.config.suggestion.clone());
            if let Some(device) = device.filter(|d| !d.is_empty()) {
                self.devices.insert(rule.config.name.clone(), vec![device.to_string()]);
                entry = entry.with_device(device);
            }
            self.index.insert(rule.config.name.clone(), self.checkers.len());
            self.appended.insert(rule.config.name.clone(), 1);
            self.checkers.push(entry);
        }
    }

    fn drain(&mut self) -> Vec<CheckerResult> {
        self.index.clear();
        self.appended.clear();
        self.devices.clear();
        std::mem::take(&mut self.checkers)
    }
}

/// Turns a compiled rule set plus one or more line sources into a
/// `CheckerResult` stream (spec.md §4.2). Reusable by any component that
/// needs to match streaming or file-scanned text against regexes —
/// `Dmesg` wires a `KmsgReader`'s stream into one; `PodLog` feeds it file
/// contents.
pub struct EventFilter {
    rules: Vec<RuntimeEventRule>,
    cache: Mutex<EventCache>,
}

impl EventFilter {
    /// Compiles `rules` once. Invalid regexes are logged and skipped, never
    /// fatal (spec.md §4.2, §9 "Regex pre-compilation").
    pub fn new(rules: HashMap<String, EventRuleConfig>) -> Self {
        let compiled = rules.into_values().filter_map(RuntimeEventRule::compile).collect();
        Self {
            rules: compiled,
            cache: Mutex::new(EventCache::default()),
        }
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// Feeds one line through the rule set. On the first matching rule,
    /// records the match via `EventCache::add` and stops (one line matches
    /// at most one rule).
    pub fn match_line(&self, line: &str) {
        self.match_line_from(line, None);
    }

    /// Like `match_line`, but attributes the match to `device` (e.g. a pod
    /// name derived from the log file the line came from). Matching
    /// `CheckerResult::device` accumulates the unique, comma-joined set of
    /// devices that have produced this rule's matches in the current cycle
    /// (spec.md §4.7: "post-processes abnormal CheckerResult device from
    /// file paths to comma-joined pod names (unique)").
    pub fn match_line_from(&self, line: &str, device: Option<&str>) {
        let Some(rule) = self.rules.iter().find(|r| r.is_match(line)) else {
            return;
        };
        self.cache.lock().add(rule, line, device);
    }

    /// Atomically swaps the in-flight accumulator for an empty one and
    /// returns what had accumulated. Serialised against `match_line` by the
    /// same mutex, so every line submitted before this call is reflected in
    /// the returned findings.
    pub fn drain(&self) -> Vec<CheckerResult> {
        self.cache.lock().drain()
    }

    /// File-scan mode (spec.md §4.2): opens each path, reads it linewise,
    /// and closes it. I/O errors are logged and otherwise ignored — the
    /// caller still gets whatever matched from the files that did open.
    pub fn scan_files(&self, paths: &[String]) {
        for path in paths {
            let file = match std::fs::File::open(path) {
                Ok(file) => file,
                Err(err) => {
                    warn!(file = %path, error = %err, "event filter could not open file");
                    continue;
                }
            };
            for line in std::io::BufReader::new(file).lines() {
                match line {
                    Ok(line) => self.match_line(&line),
                    Err(err) => {
                        warn!(file = %path, error = %err, "event filter read error, file scan aborted");
                        break;
                    }
                }
            }
        }
    }

    /// Like `scan_files`, but each path carries a device label (typically a
    /// pod name) attributed to every match it produces — the shape
    /// `PodLog` needs (spec.md §4.7).
    pub fn scan_files_with_device(&self, paths: &[(String, String)]) {
        for (path, device) in paths {
            let file = match std::fs::File::open(path) {
                Ok(file) => file,
                Err(err) => {
                    warn!(file = %path, error = %err, "event filter could not open file");
                    continue;
                }
            };
            for line in std::io::BufReader::new(file).lines() {
                match line {
                    Ok(line) => self.match_line_from(&line, Some(device)),
                    Err(err) => {
                        warn!(file = %path, error = %err, "event filter read error, file scan aborted");
                        break;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::Level;

    fn sys_oom_rules() -> HashMap<String, EventRuleConfig> {
        let mut rules = HashMap::new();
        rules.insert(
            "SysOOM".to_string(),
            EventRuleConfig {
                name: "SysOOM".to_string(),
                description: "system out of memory".to_string(),
                regexp: "Out of memory:".to_string(),
                level: Level::Critical,
                suggestion: "check workload memory limits".to_string(),
                log_file: None,
            },
        );
        rules
    }

    #[test]
    fn kmsg_oom_lines_aggregate_into_one_checker_result() {
        let filter = EventFilter::new(sys_oom_rules());
        filter.match_line("Out of memory: Kill process 1234 (test)");
        filter.match_line("Out of memory: Killed process 5678");

        let checkers = filter.drain();
        assert_eq!(checkers.len(), 1);
        assert_eq!(checkers[0].name, "SysOOM");
        assert_eq!(checkers[0].curr, "2");
        assert!(checkers[0].detail.contains("1234"));
        assert!(checkers[0].detail.contains("5678"));
    }

    #[test]
    fn detail_is_truncated_after_max_detail_lines() {
        let filter = EventFilter::new(sys_oom_rules());
        for i in 0..5 {
            filter.match_line(&format!("Out of memory: iteration {i}"));
        }
        let checkers = filter.drain();
        assert_eq!(checkers[0].curr, "5");
        assert_eq!(checkers[0].detail.lines().count(), MAX_DETAIL_LINES);
    }

    #[test]
    fn two_consecutive_drains_with_no_interleaving_match_are_both_empty_after_first() {
        let filter = EventFilter::new(sys_oom_rules());
        filter.match_line("Out of memory: once");
        let first = filter.drain();
        let second = filter.drain();
        assert_eq!(first.len(), 1);
        assert!(second.is_empty());
    }

    #[test]
    fn non_matching_lines_produce_no_findings() {
        let filter = EventFilter::new(sys_oom_rules());
        filter.match_line("kernel: normal boot message");
        assert!(filter.drain().is_empty());
    }

    #[test]
    fn device_tagged_matches_accumulate_unique_comma_joined_devices() {
        let filter = EventFilter::new(sys_oom_rules());
        filter.match_line_from("Out of memory: killed in pod-a", Some("pod-a"));
        filter.match_line_from("Out of memory: killed in pod-b", Some("pod-b"));
        filter.match_line_from("Out of memory: again in pod-a", Some("pod-a"));

        let checkers = filter.drain();
        assert_eq!(checkers[0].device, "pod-a,pod-b");
        assert_eq!(checkers[0].curr, "3");
    }
}
