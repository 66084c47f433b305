//! Free time of tutors: availability blocks minus committed shifts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::operations::shifts_staffed_by;
use super::types::{CalendarEvent, EventId};

/// Portion of an availability block not covered by any shift.
///
/// `event` carries every non-time field of the parent block, with a
/// suffixed id and the trimmed start and end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitInterval {
    pub parent_id: EventId,
    pub event: CalendarEvent,
}

impl SplitInterval {
    pub fn start(&self) -> DateTime<Utc> {
        self.event.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.event.end
    }
}

/// Subtracts the time covered by `shifts` from an availability block.
///
/// Shifts that do not overlap the block are ignored; overlapping or touching
/// shifts merge through the cursor. A block with no overlapping shift comes
/// back unchanged (as a single interval), a fully covered block yields nothing.
///
/// # Example
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use tutorsync_core::calendar::{split_availability, CalendarEvent};
///
/// let at = |h| Utc.with_ymd_and_hms(2025, 1, 6, h, 0, 0).unwrap();
/// let block = CalendarEvent::availability("tutor@example.com", at(9), at(17));
/// let shift = CalendarEvent::shift("Lesson", at(11), at(13));
///
/// let free = split_availability(&block, &[&shift]);
/// assert_eq!(free.len(), 2);
/// assert_eq!((free[0].start(), free[0].end()), (at(9), at(11)));
/// assert_eq!((free[1].start(), free[1].end()), (at(13), at(17)));
/// ```
pub fn split_availability(block: &CalendarEvent, shifts: &[&CalendarEvent]) -> Vec<SplitInterval> {
    let mut overlapping: Vec<&CalendarEvent> = shifts
        .iter()
        .copied()
        .filter(|shift| shift.overlaps(block.start, block.end))
        .collect();
    overlapping.sort_by_key(|shift| shift.start);

    let mut gaps = Vec::new();
    let mut cursor = block.start;
    for shift in overlapping {
        if shift.start > cursor {
            gaps.push((cursor, shift.start));
        }
        cursor = cursor.max(shift.end);
    }
    if cursor < block.end {
        gaps.push((cursor, block.end));
    }

    gaps.into_iter()
        .enumerate()
        .map(|(position, (start, end))| {
            let mut event = block.clone();
            event.id = block.id.split(position);
            event.start = start;
            event.end = end;
            SplitInterval {
                parent_id: block.id.clone(),
                event,
            }
        })
        .collect()
}

/// Splits every availability block against the shifts staffed by its tutor.
pub fn split_availabilities(
    blocks: &[CalendarEvent],
    shifts: &[CalendarEvent],
) -> Vec<SplitInterval> {
    blocks
        .iter()
        .filter_map(|block| block.as_availability().map(|details| (block, details)))
        .flat_map(|(block, details)| {
            let staffed = shifts_staffed_by(shifts, &details.tutor);
            split_availability(block, &staffed)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 6, hour, 0, 0).unwrap()
    }

    fn block() -> CalendarEvent {
        CalendarEvent::availability("tutor@example.com", at(9), at(17)).with_id("avail")
    }

    fn shift(start: u32, end: u32) -> CalendarEvent {
        CalendarEvent::shift("Lesson", at(start), at(end)).with_staff(["tutor@example.com"])
    }

    fn ranges(intervals: &[SplitInterval]) -> Vec<(DateTime<Utc>, DateTime<Utc>)> {
        intervals.iter().map(|i| (i.start(), i.end())).collect()
    }

    #[test]
    fn test_shift_in_the_middle() {
        let lesson = shift(11, 13);
        let free = split_availability(&block(), &[&lesson]);

        assert_eq!(ranges(&free), vec![(at(9), at(11)), (at(13), at(17))]);
        assert_eq!(free[0].event.id.as_str(), "avail_split_0");
        assert_eq!(free[1].event.id.as_str(), "avail_split_1");
        assert!(free.iter().all(|i| i.parent_id.as_str() == "avail"));
    }

    #[test]
    fn test_shift_covering_everything() {
        let lesson = shift(8, 18);
        assert!(split_availability(&block(), &[&lesson]).is_empty());
    }

    #[test]
    fn test_no_shifts_is_identity() {
        let free = split_availability(&block(), &[]);

        assert_eq!(ranges(&free), vec![(at(9), at(17))]);
        assert_eq!(free[0].event.as_availability(), block().as_availability());
    }

    #[test]
    fn test_unsorted_overlapping_and_touching_shifts() {
        let a = shift(14, 15);
        let b = shift(10, 12);
        let c = shift(11, 13);
        let d = shift(13, 14);
        let free = split_availability(&block(), &[&a, &b, &c, &d]);

        assert_eq!(ranges(&free), vec![(at(9), at(10)), (at(15), at(17))]);
    }

    #[test]
    fn test_shifts_at_the_edges() {
        let before = shift(7, 9);
        let opening = shift(8, 10);
        let closing = shift(16, 20);
        let free = split_availability(&block(), &[&before, &opening, &closing]);

        assert_eq!(ranges(&free), vec![(at(10), at(16))]);
    }

    #[test]
    fn test_split_availabilities_uses_the_tutors_shifts() {
        let blocks = vec![block()];
        let shifts = vec![
            shift(11, 13),
            CalendarEvent::shift("Other tutor", at(9), at(17)).with_staff(["other@example.com"]),
        ];

        let free = split_availabilities(&blocks, &shifts);
        assert_eq!(ranges(&free), vec![(at(9), at(11)), (at(13), at(17))]);
    }
}
