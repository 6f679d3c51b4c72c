//! HTML change report.

use std::fmt::Write as _;
use std::io::Write as _;
use std::path::Path;

use changescan_filesystem::{
    FileComparison, FileDescriptor, FileSystemComparison, ReportError, ReportGenerator,
};
use chrono::{DateTime, Local, Utc};
use humansize::{format_size, BINARY};

const REPORT_TITLE: &str = "CHANGE REPORT";

const STYLE: &str = "body{font-family:sans-serif;margin:2em;color:#222}\
h1{margin-bottom:0}h2{border-bottom:1px solid #ccc;padding-bottom:.2em;margin-top:2em}\
.generated{color:#666}ul{list-style:none;padding-left:0}li{margin:.3em 0;font-family:monospace}\
li small{display:block;color:#555;font-family:sans-serif;margin-left:1.5em}\
.new::before{content:'+ ';color:#2a2}.missing::before{content:'- ';color:#c22}\
.moved::before{content:'> ';color:#26c}.changed::before{content:'* ';color:#c80}\
.none{color:#888;font-style:italic}";

/// Writes a self-contained HTML page listing every change.
#[derive(Debug, Default, Clone)]
pub struct HtmlReportGenerator;

impl HtmlReportGenerator {
    /// Create a generator.
    pub fn new() -> Self {
        Self
    }

    /// Render a comparison as an HTML document.
    ///
    /// # Arguments
    /// * `comparison` - Changes to list
    /// * `generated_at` - Timestamp shown under the title
    pub fn render(&self, comparison: &FileSystemComparison, generated_at: &str) -> String {
        let mut html: String = String::with_capacity(4096);
        let _ = write!(
            html,
            "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n\
             <title>{title} : {time}</title>\n<style>{style}</style>\n</head>\n<body>\n\
             <h1>{title}</h1>\n<p class=\"generated\">{time}</p>\n",
            title = REPORT_TITLE,
            time = escape(generated_at),
            style = STYLE,
        );

        section(
            &mut html,
            "New Files",
            "new",
            comparison.new_to_candidate.values(),
            |d: &FileDescriptor| (d.fully_qualified_path().to_string(), describe_file(d)),
        );
        section(
            &mut html,
            "Missing Files",
            "missing",
            comparison.removed_in_candidate.values(),
            |d: &FileDescriptor| (d.fully_qualified_path().to_string(), describe_file(d)),
        );
        section(
            &mut html,
            "Possibly Moved",
            "moved",
            comparison.moved_candidates().into_iter(),
            |m| {
                (
                    m.original.fully_qualified_path().to_string(),
                    format!("now at {}", m.candidate.fully_qualified_path()),
                )
            },
        );
        section(
            &mut html,
            "Content Changes",
            "changed",
            comparison.content_changes(),
            |c: &FileComparison| (c.fully_qualified_path().to_string(), describe_change(c)),
        );
        section(
            &mut html,
            "Timestamp Changes",
            "changed",
            comparison.timestamp_changes(),
            |c: &FileComparison| (c.fully_qualified_path().to_string(), describe_change(c)),
        );

        html.push_str("</body>\n</html>\n");
        html
    }
}

impl ReportGenerator for HtmlReportGenerator {
    fn name(&self) -> &str {
        "HTML report"
    }

    fn generate(
        &self,
        comparison: &FileSystemComparison,
        destination: &Path,
    ) -> Result<(), ReportError> {
        let generated_at: String = Local::now().format("%a %b %e %H:%M:%S %Y").to_string();
        let html: String = self.render(comparison, &generated_at);

        let write_error = |source: std::io::Error| ReportError::Write {
            path: destination.display().to_string(),
            source,
        };
        let file: std::fs::File = std::fs::File::create(destination).map_err(write_error)?;
        let mut writer: std::io::BufWriter<std::fs::File> = std::io::BufWriter::new(file);
        writer.write_all(html.as_bytes()).map_err(write_error)?;
        writer.flush().map_err(write_error)?;
        Ok(())
    }
}

/// Append one titled list, sorted by path.
fn section<T, I, F>(html: &mut String, title: &str, class: &str, items: I, line: F)
where
    I: Iterator<Item = T>,
    F: Fn(T) -> (String, String),
{
    let mut rows: Vec<(String, String)> = items.map(line).collect();
    rows.sort();

    let _ = writeln!(html, "<h2>{} ({})</h2>", title, rows.len());
    if rows.is_empty() {
        html.push_str("<p class=\"none\">None</p>\n");
        return;
    }

    html.push_str("<ul>\n");
    for (path, detail) in rows {
        let _ = writeln!(
            html,
            "<li class=\"{}\">{}<small>{}</small></li>",
            class,
            escape(&path),
            escape(&detail)
        );
    }
    html.push_str("</ul>\n");
}

fn describe_file(descriptor: &FileDescriptor) -> String {
    format!(
        "{}, written {}",
        format_size(descriptor.size(), BINARY),
        format_micros(descriptor.last_write_time_us())
    )
}

fn describe_change(comparison: &FileComparison) -> String {
    let mut detail: String = comparison.describe_differences();
    let (before, after): (u64, u64) = (comparison.original().size(), comparison.candidate().size());
    if before != after {
        let _ = write!(
            detail,
            " ({} to {})",
            format_size(before, BINARY),
            format_size(after, BINARY)
        );
    }
    detail
}

/// Render microseconds since the epoch as a UTC timestamp.
fn format_micros(micros: i64) -> String {
    match DateTime::<Utc>::from_timestamp_micros(micros) {
        Some(time) => time.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        None => micros.to_string(),
    }
}

/// Escape text for use in HTML content and attribute values.
fn escape(text: &str) -> String {
    let mut out: String = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use changescan_common::checksum_bytes;
    use changescan_filesystem::{compare, FileSystemSnapshot};
    use tempfile::TempDir;

    fn descriptor(path: &str, content: &[u8], time: i64) -> FileDescriptor {
        FileDescriptor::from_parts(
            path,
            checksum_bytes(content),
            content.len() as u64,
            None,
            time,
            time,
        )
    }

    fn sample() -> FileSystemComparison {
        let baseline: FileSystemSnapshot = vec![
            descriptor("/srv/gone.txt", b"gone", 1),
            descriptor("/srv/edited.txt", b"short", 1),
            descriptor("/srv/touched.txt", b"same", 1),
            descriptor("/srv/old/moved.bin", b"moved", 1),
        ]
        .into_iter()
        .collect();
        let candidate: FileSystemSnapshot = vec![
            descriptor("/srv/<script>.txt", b"new", 2),
            descriptor("/srv/edited.txt", b"much longer now", 1),
            descriptor("/srv/touched.txt", b"same", 2),
            descriptor("/srv/new/moved.bin", b"moved", 2),
        ]
        .into_iter()
        .collect();
        compare(baseline, candidate)
    }

    #[test]
    fn test_escape() {
        assert_eq!(
            escape("<a href=\"x\">&'</a>"),
            "&lt;a href=&quot;x&quot;&gt;&amp;&#39;&lt;/a&gt;"
        );
    }

    #[test]
    fn test_render_sections() {
        let html: String = HtmlReportGenerator::new().render(&sample(), "Mon Jan  1 00:00:00 2024");

        assert!(html.contains("<title>CHANGE REPORT : Mon Jan  1 00:00:00 2024</title>"));
        assert!(html.contains("<h2>New Files (2)</h2>"));
        assert!(html.contains("<h2>Missing Files (2)</h2>"));
        assert!(html.contains("<h2>Possibly Moved (1)</h2>"));
        assert!(html.contains("<h2>Content Changes (1)</h2>"));
        assert!(html.contains("<h2>Timestamp Changes (1)</h2>"));
        assert!(html.contains("/srv/&lt;script&gt;.txt"));
        assert!(!html.contains("<script>"));
        assert!(html.contains("Checksum Differs, Increased in size"));
        assert!(html.contains("Latest file accessed more recently"));
        assert!(html.contains("now at /srv/new/moved.bin"));
    }

    #[test]
    fn test_render_sorted_paths() {
        let html: String = HtmlReportGenerator::new().render(&sample(), "now");
        let gone: usize = html.find("/srv/gone.txt").unwrap();
        let moved: usize = html.find("/srv/old/moved.bin").unwrap();
        assert!(gone < moved);
    }

    #[test]
    fn test_render_empty_comparison() {
        let html: String =
            HtmlReportGenerator::new().render(&FileSystemComparison::default(), "now");
        assert_eq!(html.matches("<p class=\"none\">None</p>").count(), 5);
    }

    #[test]
    fn test_generate_writes_file() {
        let dir: TempDir = TempDir::new().unwrap();
        let destination: std::path::PathBuf = dir.path().join("changes.html");

        HtmlReportGenerator::new()
            .generate(&sample(), &destination)
            .unwrap();

        let written: String = std::fs::read_to_string(&destination).unwrap();
        assert!(written.starts_with("<!DOCTYPE html>"));
        assert!(written.contains("/srv/edited.txt"));
    }

    #[test]
    fn test_generate_reports_write_failure() {
        let dir: TempDir = TempDir::new().unwrap();
        let destination: std::path::PathBuf = dir.path().join("missing/changes.html");

        let result = HtmlReportGenerator::new().generate(&sample(), &destination);
        assert!(matches!(result, Err(ReportError::Write { .. })));
    }

    #[test]
    fn test_format_micros() {
        assert_eq!(format_micros(0), "1970-01-01 00:00:00 UTC");
    }
}
