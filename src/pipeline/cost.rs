/// Credit cost of humanizing an input: one credit per started block of
/// 500 characters, with a floor of one credit. Must always be computed
/// from the exact text being persisted so the estimate shown to the user
/// and the amount charged can never diverge.
pub fn credit_cost(input_len: usize) -> i64 {
    input_len.div_ceil(500).max(1) as i64
}
