use crate::api::PipelineOutput;
use crate::protocol::StudyProtocolSignature;
use std::fmt;

/// Text report formatter for a pipeline run
pub struct TextReport<'a> {
    output: &'a PipelineOutput,
}

impl<'a> TextReport<'a> {
    /// Creates a new text report
    pub fn new(output: &'a PipelineOutput) -> Self {
        Self { output }
    }

    fn write_study(f: &mut fmt::Formatter<'_>, signature: &StudyProtocolSignature) -> fmt::Result {
        writeln!(f, "Study {}: {}", signature.study_uid, signature.description)?;
        for entry in &signature.entries {
            let time = entry
                .acquisition_time
                .map(|t| t.format("%H:%M:%S").to_string())
                .unwrap_or_else(|| "--:--:--".to_string());
            let number = entry
                .series_number
                .map(|n| n.to_string())
                .unwrap_or_else(|| "-".to_string());
            write!(f, "  {}  #{:<5} {:<16}", time, number, entry.label)?;
            if let Some(ref phase) = entry.contrast_phase {
                write!(f, " {:<28}", phase)?;
            } else {
                write!(f, " {:<28}", "")?;
            }
            writeln!(f, " {}", entry.series_uid)?;
        }
        if signature.ambiguous {
            writeln!(f, "  (contains unclassifiable or ambiguous series)")?;
        }
        writeln!(f)
    }
}

impl<'a> fmt::Display for TextReport<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let report = &self.output.report;

        writeln!(f, "MR Protocol Report")?;
        writeln!(f, "==================")?;
        writeln!(f)?;

        if self.output.signatures.is_empty() {
            writeln!(f, "No studies found")?;
            writeln!(f)?;
        }
        for signature in self.output.signatures.values() {
            Self::write_study(f, signature)?;
        }

        writeln!(f, "Run Summary")?;
        writeln!(f, "-----------")?;
        writeln!(f, "Sources processed: {}", report.processed_sources)?;
        writeln!(f, "Sources skipped:   {}", report.skipped_sources)?;
        writeln!(f, "Entities:          {}", self.output.snapshot.len())?;
        writeln!(f, "Series:            {}", self.output.classifications.len())?;
        writeln!(f, "Rows rejected:     {}", report.rejections.len())?;
        writeln!(f, "Merge conflicts:   {}", report.conflicts.len())?;
        writeln!(f, "Field warnings:    {}", report.field_warnings)?;
        writeln!(f, "Unclassifiable:    {}", report.unclassifiable.len())?;
        for (message, count) in report.unclassifiable_by_reason() {
            writeln!(f, "  {}: {}", message, count)?;
        }

        if !report.rejections.is_empty() {
            writeln!(f)?;
            writeln!(f, "Rejected Rows")?;
            writeln!(f, "-------------")?;
            for rejection in &report.rejections {
                writeln!(f, "{}", rejection)?;
            }
        }

        if !report.conflicts.is_empty() {
            writeln!(f)?;
            writeln!(f, "Merge Conflicts")?;
            writeln!(f, "---------------")?;
            for conflict in &report.conflicts {
                writeln!(f, "{}", conflict)?;
            }
        }

        Ok(())
    }
}
