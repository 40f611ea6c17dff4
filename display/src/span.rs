//! Scanline occlusion sweep shared by the background and solid passes.

/// Call `emit(start, end)` for every maximal sub-span of `[x1, x2)` not
/// covered by any `[start, end)` yielded by `occluders`.
///
/// `occluders` is called repeatedly and must yield the same spans each
/// time. Emitted spans are in increasing order and never overlap.
pub(crate) fn for_each_uncovered<I, F>(x1: i32, x2: i32, occluders: impl Fn() -> I, mut emit: F)
where
    I: Iterator<Item = (i32, i32)>,
    F: FnMut(i32, i32),
{
    let mut cursor = x1;

    while cursor < x2 {
        // Skip everything covering the cursor. Skipping one occluder may
        // land inside another that was already checked, so repeat until
        // nothing moves.
        loop {
            let mut advanced = false;
            for (start, end) in occluders() {
                if start <= cursor && cursor < end {
                    cursor = end;
                    advanced = true;
                }
            }
            if !advanced || cursor >= x2 {
                break;
            }
        }

        if cursor >= x2 {
            break;
        }

        let end = occluders()
            .filter(|&(start, end)| start > cursor && start < end)
            .map(|(start, _)| start)
            .fold(x2, i32::min);

        emit(cursor, end);
        cursor = end;
    }
}
