//! Breakpoint selection.
//!
//! A filter declares a set of named breakpoints (`small = 100`, `large = 1200`)
//! and the client reports its screen through a [`ClientResolution`]. The
//! selector orders the breakpoints so the first entry is the variant the
//! client receives; the remaining entries keep an order that templates use
//! for alternate sources.
//!
//! ## Ordering rule
//!
//! Breakpoints are sorted ascending by width. With no screen width reported
//! the ascending order is final, so the smallest variant is the default.
//! Otherwise the effective target is `screen_width * pixel_density` and the
//! list is reordered with [`resolution_order`]: `a` moves ahead of `b` when
//! `a > b` and `a < target`. Anything else keeps `a` behind `b`, and equal
//! widths compare equal.
//!
//! That comparator is not a total order (`400` and `1200` each claim to sort
//! after the other for a target of `500`), so the reorder is a stable
//! insertion sort that asks the comparator about adjacent pairs only. The
//! result is deterministic for a given input order, which is what cached URLs
//! depend on. Do not swap this for a nearest-width heuristic: the emitted
//! order is part of the URL contract with existing caches.

use crate::error::{ImagineError, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// A named target width.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Breakpoint {
    pub name: String,
    pub width: u32,
}

impl Breakpoint {
    pub fn new(name: impl Into<String>, width: u32) -> Self {
        Self {
            name: name.into(),
            width,
        }
    }
}

/// Named breakpoints of one filter, in declaration order.
///
/// Names are unique; widths may repeat. Ties keep declaration order through
/// every sort.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BreakpointSet {
    entries: Vec<Breakpoint>,
}

impl BreakpointSet {
    /// Build a set, keeping the first width seen for a repeated name.
    pub fn new<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, u32)>,
        S: Into<String>,
    {
        let mut entries: Vec<Breakpoint> = Vec::new();
        for (name, width) in pairs {
            let name = name.into();
            if entries.iter().all(|b| b.name != name) {
                entries.push(Breakpoint { name, width });
            }
        }
        Self { entries }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Target width of a breakpoint by name.
    pub fn width_of(&self, name: &str) -> Option<u32> {
        self.entries
            .iter()
            .find(|b| b.name == name)
            .map(|b| b.width)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Breakpoint> {
        self.entries.iter()
    }
}

/// Screen metrics reported by the client.
///
/// `(0, 1)` means "unknown" and selects the smallest breakpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientResolution {
    pub screen_width: u32,
    pub pixel_density: u32,
}

impl Default for ClientResolution {
    fn default() -> Self {
        Self {
            screen_width: 0,
            pixel_density: 1,
        }
    }
}

impl ClientResolution {
    pub fn new(screen_width: u32, pixel_density: u32) -> Self {
        Self {
            screen_width,
            pixel_density: pixel_density.max(1),
        }
    }

    /// Physical pixel width the client can display.
    pub fn target_width(self) -> u64 {
        u64::from(self.screen_width) * u64::from(self.pixel_density)
    }
}

/// Comparator used to reorder ascending breakpoints for a target width.
pub fn resolution_order(a: u32, b: u32, target: u64) -> Ordering {
    if a == b {
        Ordering::Equal
    } else if a > b && u64::from(a) < target {
        Ordering::Less
    } else {
        Ordering::Greater
    }
}

/// Order breakpoints for a client; the first entry is the selected variant.
pub fn select(set: &BreakpointSet, resolution: ClientResolution) -> Result<Vec<Breakpoint>> {
    if set.is_empty() {
        return Err(ImagineError::configuration(
            "no breakpoints defined for filter",
        ));
    }

    let mut ordered = set.entries.clone();
    ordered.sort_by_key(|b| b.width);

    if resolution.screen_width == 0 {
        return Ok(ordered);
    }

    let target = resolution.target_width();
    for i in 1..ordered.len() {
        let mut j = i;
        while j > 0
            && resolution_order(ordered[j].width, ordered[j - 1].width, target) == Ordering::Less
        {
            ordered.swap(j, j - 1);
            j -= 1;
        }
    }

    Ok(ordered)
}

/// The breakpoint a client receives.
pub fn pick(set: &BreakpointSet, resolution: ClientResolution) -> Result<Breakpoint> {
    let mut ordered = select(set, resolution)?;
    // select never returns an empty list
    Ok(ordered.swap_remove(0))
}
