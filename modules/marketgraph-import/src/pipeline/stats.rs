use serde::Serialize;

/// Running counters from one import run.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct ImportStats {
    /// Documents the source reported before the run, if it could say.
    pub total_expected: Option<u64>,
    pub documents_seen: u64,
    pub documents_processed: u64,
    /// No extractable identifier.
    pub documents_rejected: u64,
    /// A graph write failed part way through.
    pub documents_failed: u64,
    pub markets_upserted: u64,
    pub categories_linked: u64,
    pub series_linked: u64,
    pub batches: u64,
    /// The source stream broke before it was exhausted.
    pub interrupted: bool,
}

impl ImportStats {
    pub fn skipped(&self) -> u64 {
        self.documents_rejected + self.documents_failed
    }

    pub fn relationships_linked(&self) -> u64 {
        self.categories_linked + self.series_linked
    }
}

impl std::fmt::Display for ImportStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let total = self
            .total_expected
            .map(|t| t.to_string())
            .unwrap_or_else(|| "?".to_string());
        writeln!(f, "Documents processed: {}/{}", self.documents_processed, total)?;
        writeln!(f, "Documents skipped:   {}", self.skipped())?;
        if self.skipped() > 0 {
            writeln!(f, "  No identifier:     {}", self.documents_rejected)?;
            writeln!(f, "  Write failed:      {}", self.documents_failed)?;
        }
        writeln!(f, "Markets upserted:    {}", self.markets_upserted)?;
        writeln!(f, "Categories linked:   {}", self.categories_linked)?;
        write!(f, "Series linked:       {}", self.series_linked)?;
        if self.interrupted {
            write!(f, "\nSource interrupted after {} documents; counts are partial", self.documents_seen)?;
        }
        Ok(())
    }
}
