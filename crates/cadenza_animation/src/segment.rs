//! Segment table
//!
//! A segment places one controller at absolute offsets inside its timeline.
//! The timeline asks each segment, every tick, whether it is due; a due
//! segment is armed once per traversal of its window in one direction: its
//! controller is seeked to the matching local time, given the timeline's
//! playback rate and told to play. It stays armed until the timeline leaves
//! the window, changes direction, or is paused, sought or resumed.

use cadenza_core::Controller;
use std::cmp::Ordering;
use std::fmt;

/// Padding applied to activation windows, one frame at 30fps
pub const ACTIVATION_PADDING: f64 = 1.0 / 30.0;

/// Direction of time travel
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Reverse,
}

impl Direction {
    pub fn from_rate(rate: f64) -> Self {
        if rate < 0.0 {
            Direction::Reverse
        } else {
            Direction::Forward
        }
    }
}

/// Where a timeline time falls relative to a segment's span
///
/// Ordered so that rendering `Ahead`, then `Behind`, then `Within`
/// segments leaves the segment holding the time rendered last.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Placement {
    /// The segment starts after the time
    Ahead,
    /// The segment ended at or before the time
    Behind,
    /// `start <= time < end`
    Within,
}

/// One controller scheduled within a timeline
pub struct Segment {
    start_offset: f64,
    end_offset: f64,
    controller: Box<dyn Controller>,
    armed: Option<Direction>,
}

impl Segment {
    /// `end_offset` is raised to `start_offset` if it lies before it
    pub fn new(start_offset: f64, end_offset: f64, controller: Box<dyn Controller>) -> Self {
        Self {
            start_offset,
            end_offset: end_offset.max(start_offset),
            controller,
            armed: None,
        }
    }

    pub fn start_offset(&self) -> f64 {
        self.start_offset
    }

    pub fn end_offset(&self) -> f64 {
        self.end_offset
    }

    pub fn duration(&self) -> f64 {
        self.end_offset - self.start_offset
    }

    pub fn controller(&self) -> &dyn Controller {
        self.controller.as_ref()
    }

    pub fn controller_mut(&mut self) -> &mut dyn Controller {
        self.controller.as_mut()
    }

    /// Direction the segment was last armed in, if still armed
    pub fn armed(&self) -> Option<Direction> {
        self.armed
    }

    /// Half-open activation window `[start, end)` for a playback rate
    ///
    /// Playing forward, the start is padded so a segment already in flight is
    /// not re-armed right at its boundary. Playing backward, the end is.
    pub fn window(&self, rate: f64) -> (f64, f64) {
        match Direction::from_rate(rate) {
            Direction::Forward => (self.start_offset + ACTIVATION_PADDING, self.end_offset),
            Direction::Reverse => (self.start_offset, self.end_offset - ACTIVATION_PADDING),
        }
    }

    pub fn is_due(&self, time: f64, rate: f64) -> bool {
        let (start, end) = self.window(rate);
        start <= time && time < end
    }

    pub fn placement(&self, time: f64) -> Placement {
        if time < self.start_offset {
            Placement::Ahead
        } else if time >= self.end_offset {
            Placement::Behind
        } else {
            Placement::Within
        }
    }

    /// Controller-local time for a timeline time
    pub fn local_time(&self, time: f64) -> f64 {
        (time - self.start_offset).clamp(0.0, self.duration())
    }

    /// Arm the controller if the segment just became due
    ///
    /// Returns true when the controller was told to play.
    pub fn activate(&mut self, time: f64, rate: f64) -> bool {
        if !self.is_due(time, rate) {
            self.armed = None;
            return false;
        }

        let direction = Direction::from_rate(rate);
        if self.armed == Some(direction) {
            return false;
        }

        let local = self.local_time(time);
        self.controller.seek(local);
        self.controller.set_playback_rate(rate);
        self.controller.play();
        self.armed = Some(direction);
        true
    }

    /// Seek the controller to match a timeline time set from outside a tick
    ///
    /// A running controller whose window no longer holds `time` is paused.
    pub fn resync(&mut self, time: f64, rate: f64) {
        self.armed = None;
        self.controller.seek(self.local_time(time));
        if !self.is_due(time, rate) && self.controller.play_state().is_active() {
            self.controller.pause();
        }
    }

    pub fn disarm(&mut self) {
        self.armed = None;
    }
}

impl IntoIterator for SegmentTable {
    type Item = Segment;
    type IntoIter = std::vec::IntoIter<Segment>;

    fn into_iter(self) -> Self::IntoIter {
        self.segments.into_iter()
    }
}

impl fmt::Debug for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Segment")
            .field("start_offset", &self.start_offset)
            .field("end_offset", &self.end_offset)
            .field("play_state", &self.controller.play_state())
            .field("armed", &self.armed)
            .finish()
    }
}

/// Segments in insertion order
#[derive(Debug, Default)]
pub struct SegmentTable {
    segments: Vec<Segment>,
}

impl SegmentTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, segment: Segment) {
        self.segments.push(segment);
    }

    pub fn extend(&mut self, segments: impl IntoIterator<Item = Segment>) {
        self.segments.extend(segments);
    }

    /// Latest end offset, 0 when empty
    pub fn duration(&self) -> f64 {
        self.segments
            .iter()
            .map(Segment::end_offset)
            .fold(0.0, f64::max)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Segment> {
        self.segments.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Segment> {
        self.segments.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn disarm_all(&mut self) {
        for segment in &mut self.segments {
            segment.disarm();
        }
    }

    /// Arm every segment due at `time`, in insertion order
    ///
    /// Returns how many controllers were told to play.
    pub fn activate(&mut self, time: f64, rate: f64) -> usize {
        let mut activated = 0;
        for segment in &mut self.segments {
            if segment.activate(time, rate) {
                activated += 1;
            }
        }
        activated
    }

    /// Bring every controller to its local time for `time`
    ///
    /// Segments starting later render first (latest start first), then
    /// segments already over (earliest end first), then the segments holding
    /// `time`, so shared target properties end up showing `time`.
    pub fn resync(&mut self, time: f64, rate: f64) {
        let segments = &self.segments;
        let mut order: Vec<usize> = (0..segments.len()).collect();
        order.sort_by(|&a, &b| {
            let (a, b) = (&segments[a], &segments[b]);
            let placement = a.placement(time);
            placement
                .cmp(&b.placement(time))
                .then_with(|| match placement {
                    Placement::Ahead => b.start_offset.total_cmp(&a.start_offset),
                    Placement::Behind => a.end_offset.total_cmp(&b.end_offset),
                    Placement::Within => Ordering::Equal,
                })
        });

        for index in order {
            self.segments[index].resync(time, rate);
        }
    }

    /// Pause every controller
    pub fn pause_all(&mut self) {
        for segment in &mut self.segments {
            segment.controller.pause();
            segment.disarm();
        }
    }

    /// Finish every controller, the segment ending last in the direction of
    /// `rate` finishing last
    pub fn finish_all(&mut self, rate: f64) {
        let segments = &self.segments;
        let mut order: Vec<usize> = (0..segments.len()).collect();
        match Direction::from_rate(rate) {
            Direction::Forward => order.sort_by(|&a, &b| {
                segments[a].end_offset.total_cmp(&segments[b].end_offset)
            }),
            Direction::Reverse => order.sort_by(|&a, &b| {
                segments[b].start_offset.total_cmp(&segments[a].start_offset)
            }),
        }

        for index in order {
            let segment = &mut self.segments[index];
            segment.controller.finish();
            segment.disarm();
        }
    }

    /// Cancel every controller, latest first, and drop the segments
    pub fn cancel_all(&mut self) {
        for segment in self.segments.iter_mut().rev() {
            segment.controller.cancel();
        }
        self.segments.clear();
    }

    pub fn clear(&mut self) {
        self.segments.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadenza_core::PlayState;
    use std::cell::RefCell;
    use std::rc::Rc;

    type CallLog = Rc<RefCell<Vec<String>>>;

    struct Recorder {
        log: CallLog,
        state: PlayState,
        length: f64,
    }

    impl Recorder {
        fn boxed(length: f64) -> (Box<dyn Controller>, CallLog) {
            let log = CallLog::default();
            let recorder = Recorder {
                log: log.clone(),
                state: PlayState::Idle,
                length,
            };
            (Box::new(recorder), log)
        }
    }

    impl Controller for Recorder {
        fn play(&mut self) {
            self.state = PlayState::Running;
            self.log.borrow_mut().push("play".into());
        }
        fn pause(&mut self) {
            self.state = PlayState::Paused;
            self.log.borrow_mut().push("pause".into());
        }
        fn cancel(&mut self) {
            self.state = PlayState::Idle;
        }
        fn finish(&mut self) {
            self.state = PlayState::Finished;
        }
        fn seek(&mut self, time: f64) {
            self.log.borrow_mut().push(format!("seek {time}"));
        }
        fn set_playback_rate(&mut self, rate: f64) {
            self.log.borrow_mut().push(format!("rate {rate}"));
        }
        fn reverse(&mut self) {}
        fn play_state(&self) -> PlayState {
            self.state
        }
        fn total_duration(&self) -> f64 {
            self.length
        }
    }

    #[test]
    fn test_window_padding_is_directional() {
        let (controller, _) = Recorder::boxed(100.0);
        let segment = Segment::new(100.0, 200.0, controller);

        assert!(!segment.is_due(100.0, 1.0));
        assert!(segment.is_due(100.0 + ACTIVATION_PADDING, 1.0));
        assert!(segment.is_due(199.99, 1.0));
        assert!(!segment.is_due(200.0, 1.0));

        assert!(segment.is_due(100.0, -1.0));
        assert!(!segment.is_due(200.0 - ACTIVATION_PADDING, -1.0));
        assert!(segment.is_due(199.0, -1.0));
    }

    #[test]
    fn test_end_never_precedes_start() {
        let (controller, _) = Recorder::boxed(0.0);
        let segment = Segment::new(500.0, 100.0, controller);
        assert_eq!(segment.end_offset(), 500.0);
        assert_eq!(segment.duration(), 0.0);
    }

    #[test]
    fn test_activate_arms_once_per_direction() {
        let (controller, log) = Recorder::boxed(100.0);
        let mut segment = Segment::new(0.0, 100.0, controller);

        assert!(segment.activate(10.0, 1.0));
        assert_eq!(
            log.borrow().as_slice(),
            ["seek 10".to_string(), "rate 1".to_string(), "play".to_string()]
        );

        assert!(!segment.activate(20.0, 1.0));
        assert!(!segment.activate(30.0, 1.0));
        assert_eq!(segment.armed(), Some(Direction::Forward));

        assert!(segment.activate(40.0, -1.0));
        assert_eq!(segment.armed(), Some(Direction::Reverse));

        // Leaving the window disarms
        assert!(!segment.activate(150.0, -1.0));
        assert_eq!(segment.armed(), None);
    }

    #[test]
    fn test_resync_pauses_running_controller_outside_window() {
        let (controller, log) = Recorder::boxed(100.0);
        let mut segment = Segment::new(100.0, 200.0, controller);

        segment.activate(150.0, 1.0);
        log.borrow_mut().clear();

        segment.resync(50.0, 1.0);
        assert_eq!(
            log.borrow().as_slice(),
            ["seek 0".to_string(), "pause".to_string()]
        );
        assert_eq!(segment.armed(), None);
    }

    #[test]
    fn test_resync_renders_holding_segment_last() {
        let log = CallLog::default();
        let recorder = |length| -> Box<dyn Controller> {
            Box::new(Recorder {
                log: log.clone(),
                state: PlayState::Idle,
                length,
            })
        };

        let mut table = SegmentTable::new();
        table.push(Segment::new(0.0, 100.0, recorder(100.0)));
        table.push(Segment::new(100.0, 200.0, recorder(100.0)));
        table.push(Segment::new(300.0, 400.0, recorder(100.0)));

        table.resync(50.0, 1.0);
        assert_eq!(
            log.borrow().as_slice(),
            ["seek 0".to_string(), "seek 0".to_string(), "seek 50".to_string()]
        );

        log.borrow_mut().clear();
        table.resync(350.0, 1.0);
        assert_eq!(
            log.borrow().as_slice(),
            ["seek 100".to_string(), "seek 100".to_string(), "seek 50".to_string()]
        );
    }

    #[test]
    fn test_placement() {
        let (controller, _) = Recorder::boxed(100.0);
        let segment = Segment::new(100.0, 200.0, controller);

        assert_eq!(segment.placement(50.0), Placement::Ahead);
        assert_eq!(segment.placement(100.0), Placement::Within);
        assert_eq!(segment.placement(200.0), Placement::Behind);
    }

    #[test]
    fn test_table_duration_is_max_end() {
        let mut table = SegmentTable::new();
        assert_eq!(table.duration(), 0.0);

        let (a, _) = Recorder::boxed(300.0);
        let (b, _) = Recorder::boxed(100.0);
        table.push(Segment::new(0.0, 300.0, a));
        table.push(Segment::new(100.0, 200.0, b));

        assert_eq!(table.len(), 2);
        assert_eq!(table.duration(), 300.0);

        table.clear();
        assert!(table.is_empty());
    }
}
