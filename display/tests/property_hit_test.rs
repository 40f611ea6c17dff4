//! Property 4: Hit-testing returns the topmost interactive display
//!
//! The returned display is visible, contains the point in its interact
//! area (or bounds when non-interactive parts count), and no other
//! candidate is stacked above it. Stacking order never puts a lower
//! layer above a higher one.

mod common;

use common::*;
use kpio_display::{Compositor, DisplayId, DisplayLayer, Rect};
use proptest::prelude::*;

const ALL_LAYERS: [DisplayLayer; 8] = [
    DisplayLayer::Background,
    DisplayLayer::BottomMost,
    DisplayLayer::Regular,
    DisplayLayer::TopMost,
    DisplayLayer::KernelWindow,
    DisplayLayer::KernelTopmostWindow,
    DisplayLayer::Cursor,
    DisplayLayer::CursorOverlay,
];

#[derive(Debug, Clone)]
struct HitSetup {
    display: DisplaySetup,
    layer: DisplayLayer,
    visible: bool,
    interact: Rect,
}

fn arb_hit_setup() -> impl Strategy<Value = HitSetup> {
    (
        arb_display_setup(true),
        0usize..ALL_LAYERS.len(),
        prop::bool::weighted(0.8),
        (0i32..32, 0i32..24, 1i32..40, 1i32..32),
    )
        .prop_map(|(display, layer, visible, (ix, iy, iw, ih))| HitSetup {
            display,
            layer: ALL_LAYERS[layer],
            visible,
            interact: Rect::new(ix, iy, ix + iw, iy + ih),
        })
}

fn build(setups: &[HitSetup]) -> Compositor {
    let mut c = property_desktop();
    for setup in setups {
        let id = c
            .create_display(
                None,
                setup.layer,
                setup.display.rect.width() as u32,
                setup.display.rect.height() as u32,
                1,
            )
            .unwrap();
        c.set_interact_area(id, setup.interact);
        c.move_to(id, setup.display.rect.x1, setup.display.rect.y1, false);
        if setup.visible {
            c.show(id);
        }
    }
    c
}

/// Visible displays whose hit area holds `(x, y)`, bottom to top.
fn candidates(c: &Compositor, x: i32, y: i32, include_non_interactive: bool) -> Vec<DisplayId> {
    c.scene()
        .iter()
        .filter(|d| d.is_visible())
        .filter(|d| {
            let area = if include_non_interactive {
                d.bounds()
            } else {
                d.interact_area().offset(d.x(), d.y())
            };
            area.contains(x, y)
        })
        .map(|d| d.id())
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Layers never decrease from the bottom of the stack to the top.
    #[test]
    fn stacking_respects_layers(setups in proptest::collection::vec(arb_hit_setup(), 1..10)) {
        let c = build(&setups);
        let layers: Vec<_> = c.scene().iter().map(|d| d.layer()).collect();

        prop_assert!(layers.windows(2).all(|w| w[0] <= w[1]), "{:?}", layers);
    }

    /// The hit is the topmost candidate and outranks every other one.
    #[test]
    fn hit_is_topmost_candidate(
        setups in proptest::collection::vec(arb_hit_setup(), 1..10),
        x in 0i32..64,
        y in 0i32..48,
        include_non_interactive in any::<bool>(),
    ) {
        let c = build(&setups);
        let found = candidates(&c, x, y, include_non_interactive);
        let hit = c.get_display_at(x, y, include_non_interactive, None);

        prop_assert_eq!(hit, found.last().copied());

        if let Some(hit) = hit {
            let display = c.display(hit).unwrap();
            prop_assert!(display.bounds().contains(x, y));

            let position = c.scene().position(hit).unwrap();
            for other in found.iter().filter(|&&id| id != hit) {
                let other_display = c.display(*other).unwrap();
                prop_assert!(other_display.layer() <= display.layer());
                prop_assert!(c.scene().position(*other).unwrap() < position);
            }
        }
    }

    /// Searching below a hit finds the next candidate down.
    #[test]
    fn search_below_walks_down(
        setups in proptest::collection::vec(arb_hit_setup(), 1..10),
        x in 0i32..64,
        y in 0i32..48,
    ) {
        let c = build(&setups);
        let found = candidates(&c, x, y, false);

        for (i, &id) in found.iter().enumerate() {
            let next = i.checked_sub(1).map(|j| found[j]);
            prop_assert_eq!(c.get_display_at(x, y, false, Some(id)), next);
        }
    }
}
