//! `Auditor` — appends structured, human-readable records describing every
//! carved fragment, in the audit log format.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use strata_coverage::Fragment;

use crate::error::Result;

/// Writes the free-form header, one tab-separated row per carved fragment,
/// and the trailing `Completed at` line. Generic over the sink so tests can
/// audit into an in-memory buffer instead of a real file.
pub struct Auditor<W: Write> {
    out: W,
}

impl Auditor<File> {
    /// Create (truncating) the audit log at `path`.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::create(path)?;
        Ok(Auditor { out: file })
    }
}

impl<W: Write> Auditor<W> {
    pub fn new(out: W) -> Self {
        Auditor { out }
    }

    /// Free-form preamble: version/timestamp/command-line echo, the skip
    /// notice if a prefix was skipped, and the column header row.
    pub fn write_header(
        &mut self,
        version: &str,
        timestamp: &str,
        command_line: &str,
        input_id: &str,
        skip_bytes: u64,
    ) -> Result<()> {
        writeln!(self.out, "strata-tool {version}")?;
        writeln!(self.out, "Command line: {command_line}")?;
        writeln!(self.out, "Started at {timestamp}")?;
        writeln!(self.out)?;
        writeln!(self.out, "Opening target \"{input_id}\"")?;
        writeln!(self.out)?;
        if skip_bytes > 0 {
            writeln!(self.out, "Skipped the first {skip_bytes} bytes of {input_id}...")?;
        }
        writeln!(self.out, "The following files were carved:")?;
        writeln!(self.out, "File\tStart\tChop\tLength\tExtracted From")?;
        self.out.flush()?;
        Ok(())
    }

    /// One row per [`Fragment`]: `<basename>\t<start>\t<chopped>\t<length>\t<input basename>`.
    pub fn write_fragment(
        &mut self,
        output_name: &str,
        fragment: &Fragment,
        chopped: bool,
        input_id: &str,
    ) -> Result<()> {
        writeln!(
            self.out,
            "{}\t{}\t{}\t{}\t{}",
            base_name(output_name),
            fragment.start,
            if chopped { "YES" } else { "NO" },
            fragment.len(),
            base_name(input_id),
        )?;
        self.out.flush()?;
        Ok(())
    }

    /// A fatal or skip-worthy error, logged into the audit trail per the
    /// "every fatal error results in an audit-log entry" requirement.
    pub fn write_error(&mut self, phase: &str, input_id: &str, message: &str) -> Result<()> {
        writeln!(self.out, "Error during {phase} of {input_id}: {message}")?;
        self.out.flush()?;
        Ok(())
    }

    pub fn write_completed(&mut self, timestamp: &str) -> Result<()> {
        writeln!(self.out, "Completed at {timestamp}")?;
        self.out.flush()?;
        Ok(())
    }
}

fn base_name(path: &str) -> &str {
    Path::new(path).file_name().and_then(|n| n.to_str()).unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_includes_skip_notice_only_when_nonzero() {
        let mut buf = Vec::new();
        {
            let mut auditor = Auditor::new(&mut buf);
            auditor
                .write_header("0.1.0", "2026-01-01T00:00:00Z", "strata-tool -o out img.dd", "img.dd", 512)
                .unwrap();
        }
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("Skipped the first 512 bytes of img.dd..."));
        assert!(text.contains("File\tStart\tChop\tLength\tExtracted From"));
    }

    #[test]
    fn header_omits_skip_notice_when_zero() {
        let mut buf = Vec::new();
        {
            let mut auditor = Auditor::new(&mut buf);
            auditor
                .write_header("0.1.0", "2026-01-01T00:00:00Z", "strata-tool -o out img.dd", "img.dd", 0)
                .unwrap();
        }
        let text = String::from_utf8(buf).unwrap();
        assert!(!text.contains("Skipped"));
    }

    #[test]
    fn fragment_row_uses_basenames_and_tab_columns() {
        let mut buf = Vec::new();
        {
            let mut auditor = Auditor::new(&mut buf);
            auditor
                .write_fragment(
                    "/out/jpg-0-0/00000001.jpg",
                    &Fragment { start: 1024, stop: 2047 },
                    false,
                    "/mnt/forensic/img.dd",
                )
                .unwrap();
        }
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text, "00000001.jpg\t1024\tNO\t1024\timg.dd\n");
    }

    #[test]
    fn completed_line_format() {
        let mut buf = Vec::new();
        Auditor::new(&mut buf).write_completed("2026-01-01T00:00:05Z").unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), "Completed at 2026-01-01T00:00:05Z\n");
    }
}
