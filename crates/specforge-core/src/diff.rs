//! Side-by-side and unified comparison of spec and client text.
//!
//! Both sides are first normalized into the declared display format (pretty
//! JSON or YAML) so that formatting-only changes do not show up as
//! differences. A side that fails to normalize is compared as raw text.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::spec_parser::{parse_any, SpecFormat};

/// Largest `old_lines * new_lines` table the line differ will build. Beyond
/// this, the changed middle section is reported as one replacement block.
const MAX_LCS_CELLS: usize = 4_000_000;

/// Display format both sides are normalized into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum DiffFormat {
    /// Pretty-printed JSON with two-space indentation.
    Json,
    /// YAML.
    Yaml,
    /// Raw text, no normalization (generated client code).
    Text,
}

impl From<SpecFormat> for DiffFormat {
    fn from(format: SpecFormat) -> Self {
        match format {
            SpecFormat::Json => Self::Json,
            SpecFormat::Yaml => Self::Yaml,
        }
    }
}

/// How a comparison is laid out for display.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    /// Old and new side by side.
    #[default]
    Split,
    /// One column with `-`/`+` markers.
    Unified,
}

/// One side of a comparison after normalization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct NormalizedText {
    /// Text shown for this side.
    pub text: String,

    /// `false` when normalization failed and `text` is the raw input.
    pub normalized: bool,
}

/// Normalize `raw` into `format`, falling back to the raw text.
#[must_use]
pub fn normalize(raw: &str, format: DiffFormat) -> NormalizedText {
    let rendered = match format {
        DiffFormat::Text => None,
        DiffFormat::Json => parse_any(raw)
            .ok()
            .and_then(|value| serde_json::to_string_pretty(&value).ok()),
        DiffFormat::Yaml => parse_any(raw)
            .ok()
            .and_then(|value| serde_yaml::to_string(&value).ok()),
    };

    match rendered {
        Some(text) => NormalizedText {
            text,
            normalized: true,
        },
        None => {
            if format != DiffFormat::Text {
                tracing::debug!(?format, "normalization failed, showing raw text");
            }
            NormalizedText {
                text: raw.to_string(),
                normalized: format == DiffFormat::Text,
            }
        }
    }
}

/// Kind of a diff line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ChangeTag {
    /// Present on both sides.
    Equal,
    /// Only in the old text.
    Delete,
    /// Only in the new text.
    Insert,
}

/// A single line of a line-level comparison.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct DiffLine {
    /// Change kind.
    pub tag: ChangeTag,

    /// 1-based line number in the old text.
    pub old_line: Option<usize>,

    /// 1-based line number in the new text.
    pub new_line: Option<usize>,

    /// Line content without the trailing newline.
    pub content: String,
}

/// One row of a split view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct SplitRow {
    /// Left (old) cell.
    pub old: Option<DiffCell>,
    /// Right (new) cell.
    pub new: Option<DiffCell>,
    /// Change kind of the row as a whole.
    pub tag: ChangeTag,
}

/// A numbered line in a split view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct DiffCell {
    /// 1-based line number.
    pub line: usize,
    /// Line content.
    pub content: String,
}

/// A completed comparison between two blobs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct TextDiff {
    /// Format both sides were normalized into.
    pub format: DiffFormat,

    /// Old side, absent when only a new blob was given.
    pub old: Option<NormalizedText>,

    /// New side, absent when only an old blob was given.
    pub new: Option<NormalizedText>,

    /// Line-level comparison.
    pub lines: Vec<DiffLine>,

    /// Number of inserted lines.
    pub additions: usize,

    /// Number of deleted lines.
    pub deletions: usize,
}

impl TextDiff {
    /// Whether the two sides are identical after normalization.
    #[must_use]
    pub const fn is_identical(&self) -> bool {
        self.additions == 0 && self.deletions == 0
    }

    /// Unified rendering with ` `, `-` and `+` prefixes.
    #[must_use]
    pub fn unified(&self) -> String {
        let mut out = String::new();
        for line in &self.lines {
            let marker = match line.tag {
                ChangeTag::Equal => ' ',
                ChangeTag::Delete => '-',
                ChangeTag::Insert => '+',
            };
            out.push(marker);
            out.push_str(&line.content);
            out.push('\n');
        }
        out
    }

    /// Rows for a side-by-side view. Runs of deletions are paired with the
    /// insertions that immediately follow them.
    #[must_use]
    pub fn split_rows(&self) -> Vec<SplitRow> {
        let mut rows = Vec::with_capacity(self.lines.len());
        let mut i = 0;
        while i < self.lines.len() {
            let line = &self.lines[i];
            if line.tag == ChangeTag::Equal {
                rows.push(SplitRow {
                    old: line.old_line.map(|n| cell(n, &line.content)),
                    new: line.new_line.map(|n| cell(n, &line.content)),
                    tag: ChangeTag::Equal,
                });
                i += 1;
                continue;
            }

            let deletes_start = i;
            while i < self.lines.len() && self.lines[i].tag == ChangeTag::Delete {
                i += 1;
            }
            let inserts_start = i;
            while i < self.lines.len() && self.lines[i].tag == ChangeTag::Insert {
                i += 1;
            }
            let deletes = &self.lines[deletes_start..inserts_start];
            let inserts = &self.lines[inserts_start..i];

            for k in 0..deletes.len().max(inserts.len()) {
                let old = deletes
                    .get(k)
                    .and_then(|l| l.old_line.map(|n| cell(n, &l.content)));
                let new = inserts
                    .get(k)
                    .and_then(|l| l.new_line.map(|n| cell(n, &l.content)));
                let tag = if old.is_some() {
                    ChangeTag::Delete
                } else {
                    ChangeTag::Insert
                };
                rows.push(SplitRow { old, new, tag });
            }
        }
        rows
    }
}

fn cell(line: usize, content: &str) -> DiffCell {
    DiffCell {
        line,
        content: content.to_string(),
    }
}

/// Outcome of asking for a comparison.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DiffReport {
    /// Neither blob was given.
    NothingToCompare,
    /// A comparison was produced.
    Compared(TextDiff),
}

/// Compare two optional blobs in the declared format.
#[must_use]
pub fn compare(old: Option<&str>, new: Option<&str>, format: DiffFormat) -> DiffReport {
    if old.is_none() && new.is_none() {
        return DiffReport::NothingToCompare;
    }

    let old = old.map(|raw| normalize(raw, format));
    let new = new.map(|raw| normalize(raw, format));

    let old_lines: Vec<&str> = old.as_ref().map(|t| t.text.lines().collect()).unwrap_or_default();
    let new_lines: Vec<&str> = new.as_ref().map(|t| t.text.lines().collect()).unwrap_or_default();
    let lines = diff_lines(&old_lines, &new_lines);

    let additions = lines.iter().filter(|l| l.tag == ChangeTag::Insert).count();
    let deletions = lines.iter().filter(|l| l.tag == ChangeTag::Delete).count();

    DiffReport::Compared(TextDiff {
        format,
        old,
        new,
        lines,
        additions,
        deletions,
    })
}

/// Line-level diff: common prefix and suffix are trimmed, the middle is
/// aligned by longest common subsequence.
#[must_use]
pub fn diff_lines(old: &[&str], new: &[&str]) -> Vec<DiffLine> {
    let prefix = old
        .iter()
        .zip(new.iter())
        .take_while(|(a, b)| a == b)
        .count();
    let suffix = old[prefix..]
        .iter()
        .rev()
        .zip(new[prefix..].iter().rev())
        .take_while(|(a, b)| a == b)
        .count();

    let old_mid = &old[prefix..old.len() - suffix];
    let new_mid = &new[prefix..new.len() - suffix];

    let mut out = Vec::with_capacity(old.len().max(new.len()));
    for (i, line) in old[..prefix].iter().enumerate() {
        out.push(equal(i, i, line));
    }

    let ops = align(old_mid, new_mid);
    let (mut oi, mut ni) = (prefix, prefix);
    for op in ops {
        match op {
            ChangeTag::Equal => {
                out.push(equal(oi, ni, old[oi]));
                oi += 1;
                ni += 1;
            }
            ChangeTag::Delete => {
                out.push(DiffLine {
                    tag: ChangeTag::Delete,
                    old_line: Some(oi + 1),
                    new_line: None,
                    content: old[oi].to_string(),
                });
                oi += 1;
            }
            ChangeTag::Insert => {
                out.push(DiffLine {
                    tag: ChangeTag::Insert,
                    old_line: None,
                    new_line: Some(ni + 1),
                    content: new[ni].to_string(),
                });
                ni += 1;
            }
        }
    }

    for k in 0..suffix {
        out.push(equal(oi + k, ni + k, old[oi + k]));
    }
    out
}

fn equal(old_index: usize, new_index: usize, content: &str) -> DiffLine {
    DiffLine {
        tag: ChangeTag::Equal,
        old_line: Some(old_index + 1),
        new_line: Some(new_index + 1),
        content: content.to_string(),
    }
}

/// Edit script for two slices. Deletions are emitted before insertions
/// within a changed block.
fn align(old: &[&str], new: &[&str]) -> Vec<ChangeTag> {
    let (n, m) = (old.len(), new.len());
    if n == 0 || m == 0 || n.saturating_mul(m) > MAX_LCS_CELLS {
        let mut ops = vec![ChangeTag::Delete; n];
        ops.extend(std::iter::repeat(ChangeTag::Insert).take(m));
        return ops;
    }

    // lcs[i * (m + 1) + j] = LCS length of old[i..] and new[j..]
    let width = m + 1;
    let mut lcs = vec![0u32; (n + 1) * width];
    for i in (0..n).rev() {
        for j in (0..m).rev() {
            lcs[i * width + j] = if old[i] == new[j] {
                lcs[(i + 1) * width + j + 1] + 1
            } else {
                lcs[(i + 1) * width + j].max(lcs[i * width + j + 1])
            };
        }
    }

    let mut ops = Vec::with_capacity(n + m);
    let (mut i, mut j) = (0, 0);
    while i < n && j < m {
        if old[i] == new[j] {
            ops.push(ChangeTag::Equal);
            i += 1;
            j += 1;
        } else if lcs[(i + 1) * width + j] >= lcs[i * width + j + 1] {
            ops.push(ChangeTag::Delete);
            i += 1;
        } else {
            ops.push(ChangeTag::Insert);
            j += 1;
        }
    }
    ops.extend(std::iter::repeat(ChangeTag::Delete).take(n - i));
    ops.extend(std::iter::repeat(ChangeTag::Insert).take(m - j));
    ops
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compared(report: DiffReport) -> TextDiff {
        match report {
            DiffReport::Compared(diff) => diff,
            DiffReport::NothingToCompare => panic!("expected a comparison"),
        }
    }

    #[test]
    fn test_nothing_to_compare() {
        assert_eq!(
            compare(None, None, DiffFormat::Json),
            DiffReport::NothingToCompare
        );
    }

    #[test]
    fn test_identical_blobs_have_no_differences() {
        let spec = r#"{"openapi":"3.0.0","paths":{}}"#;
        let diff = compared(compare(Some(spec), Some(spec), DiffFormat::Json));
        assert!(diff.is_identical());
        assert_eq!(diff.old.as_ref().unwrap().text, diff.new.as_ref().unwrap().text);
        assert!(diff.lines.iter().all(|l| l.tag == ChangeTag::Equal));
    }

    #[test]
    fn test_formatting_only_changes_are_hidden() {
        let compact = r#"{"a":1,"b":[1,2]}"#;
        let yaml = "a: 1\nb:\n  - 1\n  - 2\n";
        let diff = compared(compare(Some(compact), Some(yaml), DiffFormat::Json));
        assert!(diff.is_identical());
    }

    #[test]
    fn test_only_new_blob() {
        let diff = compared(compare(None, Some("a: 1\nb: 2\n"), DiffFormat::Yaml));
        assert!(diff.old.is_none());
        assert_eq!(diff.additions, 2);
        assert_eq!(diff.deletions, 0);
        assert!(diff.lines.iter().all(|l| l.old_line.is_none()));
    }

    #[test]
    fn test_unparseable_side_falls_back_to_raw() {
        let diff = compared(compare(Some("{ broken"), Some("{}"), DiffFormat::Json));
        let old = diff.old.unwrap();
        assert!(!old.normalized);
        assert_eq!(old.text, "{ broken");
        assert!(diff.new.unwrap().normalized);
    }

    #[test]
    fn test_yaml_normalization() {
        let normalized = normalize(r#"{"title":"T","count":2}"#, DiffFormat::Yaml);
        assert!(normalized.normalized);
        assert_eq!(normalized.text, "title: T\ncount: 2\n");
    }

    #[test]
    fn test_text_format_is_untouched() {
        let normalized = normalize("const a = 1;", DiffFormat::Text);
        assert!(normalized.normalized);
        assert_eq!(normalized.text, "const a = 1;");
    }

    #[test]
    fn test_line_diff_replacement() {
        let lines = diff_lines(&["a", "b", "c"], &["a", "x", "c"]);
        let tags: Vec<ChangeTag> = lines.iter().map(|l| l.tag).collect();
        assert_eq!(
            tags,
            vec![
                ChangeTag::Equal,
                ChangeTag::Delete,
                ChangeTag::Insert,
                ChangeTag::Equal
            ]
        );
        assert_eq!(lines[1].old_line, Some(2));
        assert_eq!(lines[2].new_line, Some(2));
        assert_eq!(lines[3].old_line, Some(3));
        assert_eq!(lines[3].new_line, Some(3));
    }

    #[test]
    fn test_line_diff_interior_match() {
        let lines = diff_lines(&["x", "keep", "y"], &["keep", "z"]);
        let kept: Vec<&DiffLine> = lines.iter().filter(|l| l.tag == ChangeTag::Equal).collect();
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].content, "keep");
        assert_eq!(kept[0].old_line, Some(2));
        assert_eq!(kept[0].new_line, Some(1));
    }

    #[test]
    fn test_unified_rendering() {
        let diff = compared(compare(Some("a\nb"), Some("a\nc"), DiffFormat::Text));
        assert_eq!(diff.unified(), " a\n-b\n+c\n");
    }

    #[test]
    fn test_split_rows_pair_changes() {
        let diff = compared(compare(Some("a\nb\nc"), Some("a\nB\nc\nd"), DiffFormat::Text));
        let rows = diff.split_rows();
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[1].old.as_ref().unwrap().content, "b");
        assert_eq!(rows[1].new.as_ref().unwrap().content, "B");
        assert_eq!(rows[3].tag, ChangeTag::Insert);
        assert!(rows[3].old.is_none());
    }
}
