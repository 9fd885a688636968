use std::sync::LazyLock;

use db::models::assignment::Language;
use regex::Regex;
use serde::{Deserialize, Serialize};

static JAVA_COMPILE_ERROR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\[ERROR\] (?P<path>\S+\.java):\[(?P<line>\d+),(?P<col>\d+)\] (?P<msg>.*)$")
        .expect("valid java compile error regex")
});

// kotlin-maven-plugin prints `[ERROR] path: (l, c) msg` or `[ERROR] file://path:l:c msg`,
// plain kotlinc prints `e: path: (l, c): msg`.
static KOTLIN_COMPILE_ERROR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:\[ERROR\] |e: )(?:file://)?(?P<path>\S+\.kt)(?::| )\s*\(?(?P<line>\d+)(?:, |:)(?P<col>\d+)\)?:?\s+(?P<msg>.*)$",
    )
    .expect("valid kotlin compile error regex")
});

static CHECKSTYLE_ERROR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\[(?:WARN|WARNING|ERROR)\] (?P<path>\S+\.java):(?P<line>\d+)(?::(?P<col>\d+))?: (?P<msg>.*) \[(?P<rule>\w+)\]$",
    )
    .expect("valid checkstyle regex")
});

static JUNIT_SUMMARY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Tests run: (?P<run>\d+), Failures: (?P<failures>\d+), Errors: (?P<errors>\d+)")
        .expect("valid junit summary regex")
});

/// What the test phase of a build said about unit tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnitTestOutcome {
    Passed,
    Failed,
    /// No test summary was printed, usually because no tests ran.
    Unknown,
}

impl UnitTestOutcome {
    /// Nullable "tests failed" flag as persisted in `build_reports`.
    pub fn failed_flag(self) -> Option<bool> {
        match self {
            UnitTestOutcome::Passed => Some(false),
            UnitTestOutcome::Failed => Some(true),
            UnitTestOutcome::Unknown => None,
        }
    }

    pub fn from_failed_flag(flag: Option<bool>) -> Self {
        match flag {
            Some(true) => UnitTestOutcome::Failed,
            Some(false) => UnitTestOutcome::Passed,
            None => UnitTestOutcome::Unknown,
        }
    }
}

/// Diagnostics extracted from one build+test run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildReport {
    pub output: String,
    pub compilation_errors: Vec<String>,
    pub checkstyle_errors: Vec<String>,
    pub unit_tests: UnitTestOutcome,
}

impl BuildReport {
    /// Parses the combined stdout/stderr of a Maven run.
    ///
    /// Error paths are shortened to start at `src/`, and duplicates (Maven
    /// repeats compiler errors in its failure summary) are dropped while
    /// keeping first-seen order. Kotlin projects have no style checker, so
    /// their `checkstyle_errors` is always empty.
    pub fn parse(output: impl Into<String>, language: Language) -> Self {
        let output = output.into();

        let compile_pattern = match language {
            Language::Java => &*JAVA_COMPILE_ERROR,
            Language::Kotlin => &*KOTLIN_COMPILE_ERROR,
        };

        let mut compilation_errors = Vec::new();
        let mut checkstyle_errors = Vec::new();
        let mut saw_tests = false;
        let mut saw_failures = false;

        for line in output.lines() {
            let line = line.trim_end();

            if let Some(caps) = compile_pattern.captures(line) {
                let entry = format!(
                    "{}:[{},{}] {}",
                    project_relative(&caps["path"]),
                    &caps["line"],
                    &caps["col"],
                    &caps["msg"]
                );
                push_unique(&mut compilation_errors, entry);
                continue;
            }

            if language == Language::Java {
                if let Some(caps) = CHECKSTYLE_ERROR.captures(line) {
                    let position = match caps.name("col") {
                        Some(col) => format!("{}:{}", &caps["line"], col.as_str()),
                        None => caps["line"].to_string(),
                    };
                    let entry = format!(
                        "{}:{}: {} [{}]",
                        project_relative(&caps["path"]),
                        position,
                        &caps["msg"],
                        &caps["rule"]
                    );
                    push_unique(&mut checkstyle_errors, entry);
                    continue;
                }
            }

            if let Some(caps) = JUNIT_SUMMARY.captures(line) {
                let count = |name: &str| caps[name].parse::<u64>().unwrap_or(0);
                if count("run") > 0 {
                    saw_tests = true;
                }
                if count("failures") + count("errors") > 0 {
                    saw_failures = true;
                }
            }
        }

        let unit_tests = if saw_failures {
            UnitTestOutcome::Failed
        } else if saw_tests {
            UnitTestOutcome::Passed
        } else {
            UnitTestOutcome::Unknown
        };

        Self {
            output,
            compilation_errors,
            checkstyle_errors,
            unit_tests,
        }
    }

    pub fn has_unit_test_failures(&self) -> bool {
        self.unit_tests == UnitTestOutcome::Failed
    }
}

fn push_unique(list: &mut Vec<String>, entry: String) {
    if !list.contains(&entry) {
        list.push(entry);
    }
}

fn project_relative(path: &str) -> &str {
    if path.starts_with("src/") {
        return path;
    }
    match path.find("/src/") {
        Some(idx) => &path[idx + 1..],
        None => path.rsplit('/').next().unwrap_or(path),
    }
}
