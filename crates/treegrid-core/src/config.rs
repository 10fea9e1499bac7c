/// Tuning knobs for a [`TreeGrid`](crate::grid::TreeGrid).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridOptions {
    /// Merge adjacent single-row edits into one `Added`/`Removed` run.
    /// When off, the host receives one notification per row.
    pub coalesce: bool,
    /// Watch the children of visible collapsed items so the host gets a
    /// `Replaced` row when an item gains its first child or loses its last.
    pub track_expanders: bool,
}

impl Default for GridOptions {
    fn default() -> Self {
        Self {
            coalesce: true,
            track_expanders: true,
        }
    }
}

impl GridOptions {
    pub fn coalesce(mut self, coalesce: bool) -> Self {
        self.coalesce = coalesce;
        self
    }

    pub fn track_expanders(mut self, track: bool) -> Self {
        self.track_expanders = track;
        self
    }
}
