//! Parser for the Prometheus text exposition format.
//!
//! Turns the raw payload served by the exporter endpoint into an ordered list of
//! [`MetricFamily`] values. The parser is pure: the same input always yields the
//! same families, and nothing outside the returned value is touched.

use ahash::{AHashMap as HashMap, AHashSet as HashSet};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Label set of a single sample, ordered by label name.
pub type Labels = BTreeMap<String, String>;

/// Declared type of a metric family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricType {
    Counter,
    Gauge,
    Histogram,
    Summary,
    Untyped,
}

impl MetricType {
    fn from_keyword(kind: &str) -> Option<Self> {
        match kind {
            "counter" => Some(Self::Counter),
            "gauge" => Some(Self::Gauge),
            "histogram" => Some(Self::Histogram),
            "summary" => Some(Self::Summary),
            "untyped" => Some(Self::Untyped),
            _ => None,
        }
    }
}

impl fmt::Display for MetricType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Counter => "counter",
            Self::Gauge => "gauge",
            Self::Histogram => "histogram",
            Self::Summary => "summary",
            Self::Untyped => "untyped",
        };
        f.write_str(s)
    }
}

/// One sample line.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    /// Sample name; differs from the family name only for the
    /// `_bucket`/`_sum`/`_count` series of histograms and summaries.
    pub name: String,
    pub labels: Labels,
    pub value: f64,
    pub timestamp_ms: Option<i64>,
}

impl Sample {
    pub fn label(&self, name: &str) -> Option<&str> {
        self.labels.get(name).map(String::as_str)
    }
}

/// A named group of samples sharing one TYPE/HELP declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricFamily {
    pub name: String,
    pub metric_type: MetricType,
    pub help: Option<String>,
    pub samples: Vec<Sample>,
}

impl MetricFamily {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            metric_type: MetricType::Untyped,
            help: None,
            samples: Vec::new(),
        }
    }
}

/// Payload rejected by [`parse`], with the 1-based line it failed on.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("line {line}: {kind}")]
pub struct ParseError {
    pub line: usize,
    pub kind: ParseErrorKind,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseErrorKind {
    #[error("invalid metric name '{0}'")]
    InvalidMetricName(String),

    #[error("invalid label name '{0}'")]
    InvalidLabelName(String),

    #[error("expected '{expected}' after label '{label}'")]
    MalformedLabel { label: String, expected: char },

    #[error("unterminated label set")]
    UnterminatedLabels,

    #[error("unterminated value for label '{0}'")]
    UnterminatedLabelValue(String),

    #[error("invalid escape sequence in value of label '{0}'")]
    InvalidEscape(String),

    #[error("duplicate label '{0}'")]
    DuplicateLabel(String),

    #[error("missing sample value")]
    MissingValue,

    #[error("invalid sample value '{0}'")]
    InvalidValue(String),

    #[error("invalid timestamp '{0}'")]
    InvalidTimestamp(String),

    #[error("unexpected text after timestamp: '{0}'")]
    TrailingText(String),

    #[error("malformed HELP line")]
    MalformedHelp,

    #[error("malformed TYPE line")]
    MalformedType,

    #[error("unknown metric type '{0}'")]
    UnknownType(String),

    #[error("TYPE for '{0}' must be declared once, before its samples")]
    MisplacedType(String),

    #[error("samples of '{0}' are not contiguous")]
    NonContiguousFamily(String),

    #[error("'{sample}' is missing the '{label}' label")]
    MissingReservedLabel { sample: String, label: &'static str },
}

/// Parses an exposition payload into its metric families, in payload order.
pub fn parse(text: &str) -> Result<Vec<MetricFamily>, ParseError> {
    let mut parser = Parser::default();

    for (idx, raw) in text.lines().enumerate() {
        let line = raw.trim_end_matches('\r').trim();
        parser
            .line(line)
            .map_err(|kind| ParseError { line: idx + 1, kind })?;
    }

    Ok(parser.families)
}

#[derive(Default)]
struct Parser {
    families: Vec<MetricFamily>,
    index: HashMap<String, usize>,
    typed: HashSet<String>,
    current: Option<usize>,
}

impl Parser {
    fn line(&mut self, line: &str) -> Result<(), ParseErrorKind> {
        if line.is_empty() {
            return Ok(());
        }
        if let Some(comment) = line.strip_prefix('#') {
            return self.comment(comment.trim_start());
        }
        self.sample(line)
    }

    fn comment(&mut self, comment: &str) -> Result<(), ParseErrorKind> {
        if let Some(rest) = comment.strip_prefix("HELP") {
            if !rest.is_empty() && !rest.starts_with([' ', '\t']) {
                return Ok(());
            }
            return self.help(rest.trim_start());
        }
        if let Some(rest) = comment.strip_prefix("TYPE") {
            if !rest.is_empty() && !rest.starts_with([' ', '\t']) {
                return Ok(());
            }
            return self.declare_type(rest.trim_start());
        }
        Ok(())
    }

    fn help(&mut self, rest: &str) -> Result<(), ParseErrorKind> {
        let (name, text) = match rest.split_once([' ', '\t']) {
            Some((name, text)) => (name, text.trim_start()),
            None => (rest, ""),
        };
        if name.is_empty() {
            return Err(ParseErrorKind::MalformedHelp);
        }
        validate_metric_name(name)?;

        let idx = self.family_for_metadata(name)?;
        self.families[idx].help = Some(unescape_help(text));
        Ok(())
    }

    fn declare_type(&mut self, rest: &str) -> Result<(), ParseErrorKind> {
        let mut parts = rest.split_whitespace();
        let (name, kind) = match (parts.next(), parts.next(), parts.next()) {
            (Some(name), Some(kind), None) => (name, kind),
            _ => return Err(ParseErrorKind::MalformedType),
        };
        validate_metric_name(name)?;
        let metric_type = MetricType::from_keyword(kind)
            .ok_or_else(|| ParseErrorKind::UnknownType(kind.to_string()))?;

        if self.typed.contains(name) {
            return Err(ParseErrorKind::MisplacedType(name.to_string()));
        }
        if let Some(&idx) = self.index.get(name) {
            if !self.families[idx].samples.is_empty() {
                return Err(ParseErrorKind::MisplacedType(name.to_string()));
            }
        }

        let idx = self.family_for_metadata(name)?;
        self.families[idx].metric_type = metric_type;
        self.typed.insert(name.to_string());
        Ok(())
    }

    /// Family a HELP/TYPE line refers to, created on first mention.
    fn family_for_metadata(&mut self, name: &str) -> Result<usize, ParseErrorKind> {
        match self.index.get(name) {
            Some(&idx) => {
                if self.current != Some(idx) && !self.families[idx].samples.is_empty() {
                    return Err(ParseErrorKind::NonContiguousFamily(name.to_string()));
                }
                self.current = Some(idx);
                Ok(idx)
            }
            None => Ok(self.push_family(name)),
        }
    }

    fn push_family(&mut self, name: &str) -> usize {
        let idx = self.families.len();
        self.families.push(MetricFamily::new(name));
        self.index.insert(name.to_string(), idx);
        self.current = Some(idx);
        idx
    }

    fn sample(&mut self, line: &str) -> Result<(), ParseErrorKind> {
        let sample = parse_sample_line(line)?;
        let idx = self.owner_of(&sample.name)?;

        let family = &self.families[idx];
        match family.metric_type {
            MetricType::Histogram if sample.name.ends_with("_bucket") => {
                if sample.label("le").is_none() {
                    return Err(ParseErrorKind::MissingReservedLabel {
                        sample: sample.name,
                        label: "le",
                    });
                }
            }
            MetricType::Summary if sample.name == family.name => {
                if sample.label("quantile").is_none() {
                    return Err(ParseErrorKind::MissingReservedLabel {
                        sample: sample.name,
                        label: "quantile",
                    });
                }
            }
            _ => {}
        }

        self.families[idx].samples.push(sample);
        Ok(())
    }

    /// Resolves the family a sample belongs to, opening a new untyped family
    /// when the name is unknown.
    fn owner_of(&mut self, sample_name: &str) -> Result<usize, ParseErrorKind> {
        let idx = match self.index.get(sample_name) {
            Some(&idx) => Some(idx),
            None => composite_base(sample_name).and_then(|(base, suffix)| {
                self.index.get(base).copied().filter(|&idx| {
                    match self.families[idx].metric_type {
                        MetricType::Histogram => true,
                        MetricType::Summary => suffix != "_bucket",
                        _ => false,
                    }
                })
            }),
        };

        match idx {
            Some(idx) if self.current == Some(idx) => Ok(idx),
            Some(idx) => Err(ParseErrorKind::NonContiguousFamily(
                self.families[idx].name.clone(),
            )),
            None => Ok(self.push_family(sample_name)),
        }
    }
}

fn composite_base(name: &str) -> Option<(&str, &'static str)> {
    ["_bucket", "_sum", "_count"]
        .into_iter()
        .find_map(|suffix| name.strip_suffix(suffix).map(|base| (base, suffix)))
}

fn parse_sample_line(line: &str) -> Result<Sample, ParseErrorKind> {
    let mut cur = Cursor::new(line);

    let name = cur.take_while(|c| c != '{' && c != ' ' && c != '\t');
    validate_metric_name(name)?;

    let labels = if cur.peek() == Some('{') {
        cur.bump();
        parse_labels(&mut cur)?
    } else {
        Labels::new()
    };

    let mut fields = cur.rest().split_whitespace();
    let value = fields
        .next()
        .ok_or(ParseErrorKind::MissingValue)
        .and_then(parse_value)?;
    let timestamp_ms = fields
        .next()
        .map(|ts| {
            ts.parse::<i64>()
                .map_err(|_| ParseErrorKind::InvalidTimestamp(ts.to_string()))
        })
        .transpose()?;
    if let Some(extra) = fields.next() {
        return Err(ParseErrorKind::TrailingText(extra.to_string()));
    }

    Ok(Sample {
        name: name.to_string(),
        labels,
        value,
        timestamp_ms,
    })
}

fn parse_labels(cur: &mut Cursor<'_>) -> Result<Labels, ParseErrorKind> {
    let mut labels = Labels::new();

    loop {
        cur.skip_ws();
        match cur.peek() {
            None => return Err(ParseErrorKind::UnterminatedLabels),
            Some('}') => {
                cur.bump();
                return Ok(labels);
            }
            Some(_) => {}
        }

        let label = cur.take_while(|c| c.is_ascii_alphanumeric() || c == '_');
        if !is_valid_label_name(label) {
            let shown = if label.is_empty() {
                cur.rest().chars().next().map(String::from).unwrap_or_default()
            } else {
                label.to_string()
            };
            return Err(ParseErrorKind::InvalidLabelName(shown));
        }

        cur.skip_ws();
        expect(cur, label, '=')?;
        cur.skip_ws();
        expect(cur, label, '"')?;
        let value = read_label_value(cur, label)?;

        if labels.insert(label.to_string(), value).is_some() {
            return Err(ParseErrorKind::DuplicateLabel(label.to_string()));
        }

        cur.skip_ws();
        match cur.bump() {
            Some(',') => continue,
            Some('}') => return Ok(labels),
            None => return Err(ParseErrorKind::UnterminatedLabels),
            Some(_) => {
                return Err(ParseErrorKind::MalformedLabel {
                    label: label.to_string(),
                    expected: ',',
                })
            }
        }
    }
}

fn expect(cur: &mut Cursor<'_>, label: &str, expected: char) -> Result<(), ParseErrorKind> {
    match cur.bump() {
        Some(c) if c == expected => Ok(()),
        None => Err(ParseErrorKind::UnterminatedLabels),
        Some(_) => Err(ParseErrorKind::MalformedLabel {
            label: label.to_string(),
            expected,
        }),
    }
}

fn read_label_value(cur: &mut Cursor<'_>, label: &str) -> Result<String, ParseErrorKind> {
    let mut value = String::new();
    loop {
        match cur.bump() {
            None => return Err(ParseErrorKind::UnterminatedLabelValue(label.to_string())),
            Some('"') => return Ok(value),
            Some('\\') => match cur.bump() {
                Some('\\') => value.push('\\'),
                Some('"') => value.push('"'),
                Some('n') => value.push('\n'),
                None => return Err(ParseErrorKind::UnterminatedLabelValue(label.to_string())),
                Some(_) => return Err(ParseErrorKind::InvalidEscape(label.to_string())),
            },
            Some(c) => value.push(c),
        }
    }
}

fn parse_value(raw: &str) -> Result<f64, ParseErrorKind> {
    match raw {
        "NaN" => Ok(f64::NAN),
        "+Inf" | "Inf" => Ok(f64::INFINITY),
        "-Inf" => Ok(f64::NEG_INFINITY),
        _ => raw
            .parse::<f64>()
            .map_err(|_| ParseErrorKind::InvalidValue(raw.to_string())),
    }
}

fn unescape_help(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

fn validate_metric_name(name: &str) -> Result<(), ParseErrorKind> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == ':' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ':')
        }
        _ => false,
    };
    if valid {
        Ok(())
    } else {
        Err(ParseErrorKind::InvalidMetricName(name.to_string()))
    }
}

fn is_valid_label_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

/// Character cursor over one line.
struct Cursor<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(' ' | '\t')) {
            self.pos += 1;
        }
    }

    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> &'a str {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if !pred(c) {
                break;
            }
            self.pos += c.len_utf8();
        }
        &self.src[start..self.pos]
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn err_kind(text: &str) -> ParseErrorKind {
        parse(text).expect_err("payload should be rejected").kind
    }

    #[test]
    fn test_parse_typed_families_with_metadata() {
        let text = "\
# HELP windows_cpu_time_total Time that processor spent in different modes
# TYPE windows_cpu_time_total counter
windows_cpu_time_total{core=\"0,0\",mode=\"idle\"} 1234.5
windows_cpu_time_total{core=\"0,0\",mode=\"user\"} 10
# TYPE windows_os_processes gauge
windows_os_processes 143
";
        let families = parse(text).unwrap();
        assert_eq!(families.len(), 2);

        let cpu = &families[0];
        assert_eq!(cpu.name, "windows_cpu_time_total");
        assert_eq!(cpu.metric_type, MetricType::Counter);
        assert_eq!(
            cpu.help.as_deref(),
            Some("Time that processor spent in different modes")
        );
        assert_eq!(cpu.samples.len(), 2);
        assert_eq!(cpu.samples[0].label("core"), Some("0,0"));
        assert_eq!(cpu.samples[0].label("mode"), Some("idle"));
        assert_eq!(cpu.samples[0].value, 1234.5);

        assert_eq!(families[1].metric_type, MetricType::Gauge);
        assert_eq!(families[1].samples[0].value, 143.0);
        assert!(families[1].samples[0].labels.is_empty());
    }

    #[test]
    fn test_parse_tolerates_comments_and_empty_families() {
        let text = "\
# a free-form comment

# HELP windows_iis_current_connections Number of active connections
# TYPE windows_iis_current_connections gauge
# TYPE windows_os_processes gauge
windows_os_processes 3
";
        let families = parse(text).unwrap();
        assert_eq!(families.len(), 2);
        assert!(families[0].samples.is_empty());
        assert_eq!(families[0].metric_type, MetricType::Gauge);
        assert_eq!(families[1].samples.len(), 1);
    }

    #[test]
    fn test_parse_untyped_samples_open_their_own_family() {
        let families = parse("foo 1\nbar{a=\"x\"} 2\n").unwrap();
        assert_eq!(families.len(), 2);
        assert_eq!(families[0].metric_type, MetricType::Untyped);
        assert_eq!(families[1].name, "bar");
    }

    #[test]
    fn test_parse_label_escapes_and_trailing_comma() {
        let families =
            parse("m{path=\"C:\\\\Windows\",q=\"say \\\"hi\\\"\",nl=\"a\\nb\",} 1\n").unwrap();
        let sample = &families[0].samples[0];
        assert_eq!(sample.label("path"), Some("C:\\Windows"));
        assert_eq!(sample.label("q"), Some("say \"hi\""));
        assert_eq!(sample.label("nl"), Some("a\nb"));
    }

    #[test]
    fn test_parse_special_values_and_timestamp() {
        let families = parse("a NaN\nb +Inf 1700000000000\nc -Inf\nd 1e3\n").unwrap();
        assert!(families[0].samples[0].value.is_nan());
        assert_eq!(families[1].samples[0].value, f64::INFINITY);
        assert_eq!(families[1].samples[0].timestamp_ms, Some(1_700_000_000_000));
        assert_eq!(families[2].samples[0].value, f64::NEG_INFINITY);
        assert_eq!(families[3].samples[0].value, 1000.0);
    }

    #[test]
    fn test_parse_histogram_groups_suffixed_samples() {
        let text = "\
# TYPE req_seconds histogram
req_seconds_bucket{le=\"0.1\"} 3
req_seconds_bucket{le=\"+Inf\"} 5
req_seconds_sum 0.7
req_seconds_count 5
";
        let families = parse(text).unwrap();
        assert_eq!(families.len(), 1);
        assert_eq!(families[0].samples.len(), 4);
        assert_eq!(families[0].samples[3].name, "req_seconds_count");
    }

    #[test]
    fn test_parse_rejects_unterminated_label_set() {
        assert_eq!(err_kind("m{core=\"0\",\n"), ParseErrorKind::UnterminatedLabels);
        assert_eq!(
            err_kind("m{core=\"0\" 1\n"),
            ParseErrorKind::MalformedLabel {
                label: "core".into(),
                expected: ','
            }
        );
        assert_eq!(
            err_kind("m{core=\"0} 1\n"),
            ParseErrorKind::UnterminatedLabelValue("core".into())
        );
    }

    #[test]
    fn test_parse_rejects_non_numeric_value() {
        let err = parse("ok 1\nm{core=\"0\"} twelve\n").unwrap_err();
        assert_eq!(err.line, 2);
        assert_eq!(err.kind, ParseErrorKind::InvalidValue("twelve".into()));
    }

    #[test]
    fn test_parse_rejects_missing_value_and_bad_timestamp() {
        assert_eq!(err_kind("m{a=\"b\"}\n"), ParseErrorKind::MissingValue);
        assert_eq!(
            err_kind("m 1 soon\n"),
            ParseErrorKind::InvalidTimestamp("soon".into())
        );
        assert_eq!(
            err_kind("m 1 2 3\n"),
            ParseErrorKind::TrailingText("3".into())
        );
    }

    #[test]
    fn test_parse_rejects_bad_names() {
        assert_eq!(
            err_kind("1bad 1\n"),
            ParseErrorKind::InvalidMetricName("1bad".into())
        );
        assert!(matches!(
            err_kind("m{1a=\"x\"} 1\n"),
            ParseErrorKind::InvalidLabelName(_)
        ));
        assert_eq!(
            err_kind("m{a=\"x\",a=\"y\"} 1\n"),
            ParseErrorKind::DuplicateLabel("a".into())
        );
    }

    #[test]
    fn test_parse_rejects_type_after_samples() {
        let err = parse("m 1\n# TYPE m gauge\n").unwrap_err();
        assert_eq!(err.line, 2);
        assert_eq!(err.kind, ParseErrorKind::MisplacedType("m".into()));

        assert_eq!(
            err_kind("# TYPE m gauge\n# TYPE m counter\n"),
            ParseErrorKind::MisplacedType("m".into())
        );
    }

    #[test]
    fn test_parse_rejects_malformed_type_lines() {
        assert_eq!(err_kind("# TYPE m\n"), ParseErrorKind::MalformedType);
        assert_eq!(
            err_kind("# TYPE m meter\n"),
            ParseErrorKind::UnknownType("meter".into())
        );
        assert_eq!(err_kind("# HELP\n"), ParseErrorKind::MalformedHelp);
    }

    #[test]
    fn test_parse_rejects_non_contiguous_family() {
        let err = parse("a 1\nb 2\na 3\n").unwrap_err();
        assert_eq!(err.line, 3);
        assert_eq!(err.kind, ParseErrorKind::NonContiguousFamily("a".into()));
    }

    #[test]
    fn test_parse_rejects_bucket_without_le() {
        let text = "# TYPE h histogram\nh_bucket{x=\"1\"} 1\n";
        assert_eq!(
            err_kind(text),
            ParseErrorKind::MissingReservedLabel {
                sample: "h_bucket".into(),
                label: "le"
            }
        );
    }

    #[test]
    fn test_parse_is_idempotent() {
        let text = "# TYPE m gauge\nm{a=\"1\"} 1\nm{a=\"2\"} 2\n";
        assert_eq!(parse(text).unwrap(), parse(text).unwrap());
    }
}
