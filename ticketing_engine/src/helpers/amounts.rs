use tkt_common::Paise;

/// Splits `total` across `weights` in proportion, rounding down, and gives the remainder to the last share so that the
/// shares always sum to `total`. All-zero weights split evenly.
pub fn allocate(total: Paise, weights: &[Paise]) -> Vec<Paise> {
    if weights.is_empty() {
        return Vec::new();
    }
    let weight_sum: i128 = weights.iter().map(|w| w.value() as i128).sum();
    let n = weights.len();
    let mut shares = weights
        .iter()
        .map(|w| {
            let share = if weight_sum == 0 {
                total.value() as i128 / n as i128
            } else {
                total.value() as i128 * w.value() as i128 / weight_sum
            };
            #[allow(clippy::cast_possible_truncation)]
            Paise::from(share as i64)
        })
        .collect::<Vec<Paise>>();
    let allocated: Paise = shares.iter().copied().sum();
    if let Some(last) = shares.last_mut() {
        *last += total - allocated;
    }
    shares
}
