//! Multi-monitor layout
//!
//! The client lays out one viewport per active monitor from a JSON object
//! keyed by monitor index:
//!
//! ```text
//! {"0":{"left":0,"top":0,"width":1920,"height":1080},"1":{...}}
//! ```
//!
//! The payload goes out as the value of the [`MULTIMON_LAYOUT_PARAM`]
//! layer parameter.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write as _;

use crate::error::{DisplayError, Result};
use crate::rect::Rect;

/// Layer parameter key carrying the monitor layout.
pub const MULTIMON_LAYOUT_PARAM: &str = "multimon-layout";

/// Initial payload estimate: fixed part plus this much per monitor.
const BASE_ESTIMATE: usize = 100;
const PER_MONITOR_ESTIMATE: usize = 120;

/// Longest possible entry, all fields at their widest, plus separator.
const MAX_ENTRY_LEN: usize = r#","4294967295":{"left":-9223372036854775808,"top":-9223372036854775808,"width":4294967295,"height":4294967295}"#.len();

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Monitor {
    pub index: u32,
    pub left: i64,
    pub top: i64,
    pub width: u32,
    pub height: u32,
}

impl Monitor {
    /// Monitors with no area are removed from the layout.
    pub fn is_active(&self) -> bool {
        self.width != 0 && self.height != 0
    }

    pub fn rect(&self) -> Rect {
        Rect::new(self.left, self.top, self.width as i64, self.height as i64)
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
struct Geometry {
    left: i64,
    top: i64,
    width: u32,
    height: u32,
}

/// Sparse set of monitors keyed by index.
#[derive(Debug, Clone, Default)]
pub struct MonitorLayout {
    monitors: BTreeMap<u32, Monitor>,
}

impl MonitorLayout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_monitors(monitors: impl IntoIterator<Item = Monitor>) -> Self {
        let mut layout = Self::new();
        for monitor in monitors {
            layout.set(monitor);
        }
        layout
    }

    /// Insert or replace the monitor at `monitor.index`.
    pub fn set(&mut self, monitor: Monitor) {
        self.monitors.insert(monitor.index, monitor);
    }

    pub fn remove(&mut self, index: u32) -> Option<Monitor> {
        self.monitors.remove(&index)
    }

    pub fn get(&self, index: u32) -> Option<&Monitor> {
        self.monitors.get(&index)
    }

    /// Active monitors in ascending index order.
    pub fn active(&self) -> impl Iterator<Item = &Monitor> {
        self.monitors.values().filter(|m| m.is_active())
    }

    pub fn len(&self) -> usize {
        self.monitors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.monitors.is_empty()
    }

    /// Bounding rect of all active monitors.
    pub fn extent(&self) -> Rect {
        self.active().fold(Rect::EMPTY, |acc, m| acc.extend(&m.rect()))
    }

    /// Serialize the active monitors.
    pub fn payload(&self) -> Result<String> {
        let mut out = LayoutBuffer::with_estimate(self.monitors.len())?;
        out.push('{')?;
        for (n, monitor) in self.active().enumerate() {
            out.ensure_headroom(MAX_ENTRY_LEN)?;
            if n > 0 {
                out.push(',')?;
            }
            out.entry(monitor)?;
        }
        out.push('}')?;
        Ok(out.finish())
    }

    /// Parse a payload back into monitors, ascending by index.
    pub fn decode_payload(payload: &str) -> serde_json::Result<Vec<Monitor>> {
        let entries: BTreeMap<String, Geometry> = serde_json::from_str(payload)?;
        let mut monitors = entries
            .into_iter()
            .map(|(key, g)| -> serde_json::Result<Monitor> {
                let index = key.parse::<u32>().map_err(|_| {
                    let what = format!("bad monitor index {key:?}");
                    <serde_json::Error as serde::de::Error>::custom(what)
                })?;
                Ok(Monitor {
                    index,
                    left: g.left,
                    top: g.top,
                    width: g.width,
                    height: g.height,
                })
            })
            .collect::<serde_json::Result<Vec<_>>>()?;
        monitors.sort_by_key(|m| m.index);
        Ok(monitors)
    }
}

/// Growable payload buffer. Capacity is grown ahead of each append so an
/// entry never has to reallocate halfway through being written.
#[derive(Debug)]
pub struct LayoutBuffer {
    buf: String,
}

impl LayoutBuffer {
    pub fn with_estimate(monitors: usize) -> Result<Self> {
        let estimate = monitors
            .saturating_mul(PER_MONITOR_ESTIMATE)
            .saturating_add(BASE_ESTIMATE);
        let mut buf = String::new();
        buf.try_reserve_exact(estimate)
            .map_err(|_| DisplayError::Allocation { bytes: estimate })?;
        Ok(Self { buf })
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.buf.capacity()
    }

    /// Make sure at least `margin` more bytes fit, doubling the capacity
    /// until they do.
    pub fn ensure_headroom(&mut self, margin: usize) -> Result<()> {
        let needed = self
            .buf
            .len()
            .checked_add(margin)
            .ok_or(DisplayError::Allocation { bytes: usize::MAX })?;
        if needed <= self.buf.capacity() {
            return Ok(());
        }
        let mut target = self.buf.capacity().max(1);
        while target < needed {
            target = target.saturating_mul(2);
        }
        self.buf
            .try_reserve_exact(target - self.buf.len())
            .map_err(|_| DisplayError::Allocation { bytes: target })
    }

    fn push(&mut self, c: char) -> Result<()> {
        self.ensure_headroom(c.len_utf8())?;
        self.buf.push(c);
        Ok(())
    }

    fn entry(&mut self, m: &Monitor) -> Result<()> {
        self.ensure_headroom(MAX_ENTRY_LEN)?;
        write!(
            self.buf,
            r#""{}":{{"left":{},"top":{},"width":{},"height":{}}}"#,
            m.index, m.left, m.top, m.width, m.height
        )
        .map_err(|_| DisplayError::Allocation { bytes: MAX_ENTRY_LEN })
    }

    pub fn finish(self) -> String {
        self.buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn monitor(index: u32, left: i64, top: i64, width: u32, height: u32) -> Monitor {
        Monitor {
            index,
            left,
            top,
            width,
            height,
        }
    }

    #[test]
    fn test_two_monitors_and_inactive_omitted() {
        let layout = MonitorLayout::from_monitors([
            monitor(0, 0, 0, 1920, 1080),
            monitor(1, 1920, 0, 1920, 1080),
            monitor(2, 0, 0, 0, 0),
        ]);
        let payload = layout.payload().unwrap();
        assert_eq!(
            payload,
            r#"{"0":{"left":0,"top":0,"width":1920,"height":1080},"1":{"left":1920,"top":0,"width":1920,"height":1080}}"#
        );

        let decoded = MonitorLayout::decode_payload(&payload).unwrap();
        assert_eq!(decoded, vec![monitor(0, 0, 0, 1920, 1080), monitor(1, 1920, 0, 1920, 1080)]);

        let raw: serde_json::Value = serde_json::from_str(&payload).unwrap();
        assert!(raw.get("2").is_none());
    }

    #[test]
    fn test_gaps_and_leading_inactive() {
        let layout = MonitorLayout::from_monitors([
            monitor(0, 0, 0, 0, 1080),
            monitor(3, -1280, 200, 1280, 1024),
            monitor(7, 1920, 0, 800, 600),
        ]);
        let payload = layout.payload().unwrap();
        assert!(payload.starts_with(r#"{"3":"#));
        let decoded = MonitorLayout::decode_payload(&payload).unwrap();
        assert_eq!(decoded.iter().map(|m| m.index).collect::<Vec<_>>(), vec![3, 7]);
        assert_eq!(decoded[0].left, -1280);
    }

    #[test]
    fn test_empty_layout() {
        assert_eq!(MonitorLayout::new().payload().unwrap(), "{}");
    }

    #[test]
    fn test_many_monitors_grow_buffer() {
        let layout = MonitorLayout::from_monitors(
            (0..500).map(|i| monitor(i, i64::MIN, i64::MAX, u32::MAX, u32::MAX)),
        );
        let payload = layout.payload().unwrap();
        assert_eq!(MonitorLayout::decode_payload(&payload).unwrap().len(), 500);
    }

    #[test]
    fn test_ensure_headroom_doubles() {
        let mut buf = LayoutBuffer::with_estimate(0).unwrap();
        let start = buf.capacity();
        assert!(start >= BASE_ESTIMATE);
        buf.ensure_headroom(start + 1).unwrap();
        assert!(buf.capacity() >= start * 2);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_extent() {
        let layout = MonitorLayout::from_monitors([
            monitor(0, 0, 0, 1920, 1080),
            monitor(1, 1920, 0, 1280, 1024),
        ]);
        assert_eq!(layout.extent(), Rect::new(0, 0, 3200, 1080));
    }
}
