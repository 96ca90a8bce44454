use super::evaluator::{EvalResult, State};
use crate::data::{Field, FieldValues, Frame};

/// Render results as a single-row frame for a table panel: one boolean
/// column per instance, `true` when the instance is `Normal`.
///
/// Display only. Every non-normal state collapses to `false`.
pub fn present(eval_results: &[EvalResult]) -> Frame {
    let fields = eval_results
        .iter()
        .map(|r| {
            Field::new(
                "",
                r.instance.clone(),
                FieldValues::Bool(vec![r.state == State::Normal]),
            )
        })
        .collect();
    let frame = Frame::new("", fields);
    tracing::debug!("Presented results\n{}", frame.string_table(5, 5));
    frame
}
