use crate::tools::ToolSelection;

/// Process-wide orchestration state: the active tool and the progress of the
/// batch in flight, if any.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchContext {
    pub selection: ToolSelection,
    pub is_processing: bool,
    pub progress: u8,
}

impl BatchContext {
    pub fn new(selection: ToolSelection) -> Self {
        Self {
            selection,
            is_processing: false,
            progress: 0,
        }
    }

    pub fn select(&mut self, selection: ToolSelection) {
        self.selection = selection;
    }
}

/// Integer percentage of settled items, rounded half up.
pub fn progress_percent(settled: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    let settled = settled.min(total);
    ((settled * 200 + total) / (total * 2)) as u8
}
