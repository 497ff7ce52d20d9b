//! Human-readable rendering of the execution log.

use crate::core::types::Record;

/// Render the history as one block per record, in log order.
///
/// Blocks are separated by a blank line. An empty history renders as an empty string.
pub fn render_history(history: &[Record]) -> String {
    history
        .iter()
        .map(Record::to_string)
        .collect::<Vec<_>>()
        .join("\n\n")
}
