/// Rounds `num` up to the next multiple of `multiple`, returns `None` on overflow
#[inline]
pub(crate) const fn checked_round_up_to_nearest(num: usize, multiple: usize) -> Option<usize> {
    match num.checked_add(multiple - 1) {
        Some(sum) => Some((sum / multiple) * multiple),
        None => None,
    }
}
