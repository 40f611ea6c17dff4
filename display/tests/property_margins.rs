//! Property 5: Symmetric corner tables give mirror-image corners
//!
//! With the same table on all four corners, the row extents a display
//! covers are symmetric left to right and top to bottom, both as
//! reported and as painted.

mod common;

use common::*;
use kpio_display::{CornerMargins, DisplayLayer, MarginTable, Rect};
use proptest::prelude::*;

const COLOUR: u32 = 0xff010203;

fn arb_table() -> impl Strategy<Value = MarginTable> {
    proptest::array::uniform16(0u32..24)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn margins_mirror(
        table in arb_table(),
        w in 16i32..64,
        h in 16i32..48,
    ) {
        let mut c = compositor(64, 48);
        let id = filled_display(&mut c, DisplayLayer::Regular, Rect::new(0, 0, w, h), COLOUR);
        c.set_corner_margins(id, CornerMargins::uniform(table));
        let display = c.display(id).unwrap();

        for y in 0..h {
            let mirrored = h - 1 - y;
            prop_assert_eq!(display.left_margin(y), display.right_margin(mirrored));
            prop_assert_eq!(display.left_margin(y), display.left_margin(mirrored));
            prop_assert_eq!(display.left_margin(y), display.right_margin(y));
            prop_assert!(display.left_margin(y) <= w as u32 / 2);
        }
    }

    #[test]
    fn painted_corners_mirror(
        table in arb_table(),
        w in 16i32..64,
        h in 16i32..48,
    ) {
        let mut c = compositor(64, 48);
        let id = filled_display(&mut c, DisplayLayer::Regular, Rect::new(0, 0, w, h), COLOUR);
        c.set_corner_margins(id, CornerMargins::uniform(table));

        for y in 0..h {
            for x in 0..w {
                let here = pixel(&c, x, y) == COLOUR;
                prop_assert_eq!(here, pixel(&c, w - 1 - x, y) == COLOUR, "({}, {})", x, y);
                prop_assert_eq!(here, pixel(&c, x, h - 1 - y) == COLOUR, "({}, {})", x, y);
                prop_assert_eq!(here, c.display(id).unwrap().covers(x, y));
            }
        }
    }
}
