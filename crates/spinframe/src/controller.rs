use crate::input::{Channel, InputEvent, Point, Rig};
use crate::listeners::{Listeners, Subscription};

/// Minimum drag distance, in input units, that turns the object by one frame.
pub const SENSITIVITY_THRESHOLD: f64 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Forward,
    Backward,
}

impl Step {
    /// Direction of a signed delta. Zero has no direction.
    pub fn from_delta(delta: f64) -> Option<Self> {
        if delta > 0.0 {
            Some(Step::Forward)
        } else if delta < 0.0 {
            Some(Step::Backward)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum GesturePhase {
    #[default]
    Idle,
    Dragging {
        last: f64,
    },
}

/// Outcome of a single input event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InputResponse {
    pub step: Option<Step>,
    pub frame: usize,
    /// The host should suppress the platform's default handling (page scroll, touch pan).
    pub prevent_default: bool,
}

#[derive(Debug, Default)]
struct DragTrack {
    phase: GesturePhase,
    subscription: Option<Subscription>,
}

impl DragTrack {
    fn begin(&mut self, listeners: &Listeners, channel: Channel, coordinate: f64) {
        self.phase = GesturePhase::Dragging { last: coordinate };
        if self.subscription.is_none() {
            self.subscription = Some(listeners.acquire(channel));
        }
    }

    fn end(&mut self) {
        self.phase = GesturePhase::Idle;
        if let Some(sub) = self.subscription.take() {
            sub.release();
        }
    }

    /// Feeds a drag coordinate, returning the step it produced, if any.
    fn advance(&mut self, coordinate: f64, threshold: f64) -> Option<Step> {
        let GesturePhase::Dragging { last } = self.phase else {
            return None;
        };

        let delta = coordinate - last;
        if delta.abs() <= threshold {
            return None;
        }

        self.phase = GesturePhase::Dragging { last: coordinate };
        Step::from_delta(delta)
    }
}

/// Turns pointer, touch and wheel input into wrapped frame-index steps.
#[derive(Debug)]
pub struct SpinController {
    total_frames: usize,
    current_frame: usize,
    rig: Rig,
    threshold: f64,
    listeners: Listeners,
    mouse: DragTrack,
    touch: DragTrack,
    wheel: Option<Subscription>,
}

impl SpinController {
    /// Creates a mounted controller at frame 0. The wheel listener stays attached until
    /// [`SpinController::teardown`].
    pub fn new(total_frames: usize, rig: Rig, listeners: Listeners) -> Self {
        debug_assert!(total_frames > 0);
        let wheel = Some(listeners.acquire(Channel::Wheel));
        Self {
            total_frames,
            current_frame: 0,
            rig,
            threshold: SENSITIVITY_THRESHOLD,
            listeners,
            mouse: DragTrack::default(),
            touch: DragTrack::default(),
            wheel,
        }
    }

    pub fn current_frame(&self) -> usize {
        self.current_frame
    }

    pub fn total_frames(&self) -> usize {
        self.total_frames
    }

    pub fn rig(&self) -> Rig {
        self.rig
    }

    pub fn listeners(&self) -> &Listeners {
        &self.listeners
    }

    pub fn phase(&self, channel: Channel) -> GesturePhase {
        match channel {
            Channel::Mouse => self.mouse.phase,
            Channel::Touch => self.touch.phase,
            Channel::Wheel => GesturePhase::Idle,
        }
    }

    pub fn is_dragging(&self) -> bool {
        [self.mouse.phase, self.touch.phase]
            .iter()
            .any(|p| matches!(p, GesturePhase::Dragging { .. }))
    }

    pub fn handle(&mut self, event: InputEvent) -> InputResponse {
        // The wheel subscription lives exactly as long as the controller is mounted.
        if self.wheel.is_none() {
            return self.response(None, false);
        }
        if let Some(channel) = event.channel()
            && !self.holds(channel)
        {
            return self.response(None, false);
        }

        match event {
            InputEvent::PointerDown(point) => {
                let coordinate = self.coordinate(point);
                self.mouse.begin(&self.listeners, Channel::Mouse, coordinate);
                self.response(None, false)
            }
            InputEvent::TouchStart(point) => {
                let coordinate = self.coordinate(point);
                self.touch.begin(&self.listeners, Channel::Touch, coordinate);
                self.response(None, false)
            }
            InputEvent::PointerMove(point) => {
                let coordinate = self.coordinate(point);
                let step = self.mouse.advance(coordinate, self.threshold);
                self.apply(step, false)
            }
            InputEvent::TouchMove(point) => {
                let coordinate = self.coordinate(point);
                let step = self.touch.advance(coordinate, self.threshold);
                self.apply(step, true)
            }
            InputEvent::PointerUp | InputEvent::PointerLeave => {
                self.mouse.end();
                self.response(None, false)
            }
            InputEvent::TouchEnd => {
                self.touch.end();
                self.response(None, false)
            }
            InputEvent::Wheel(delta) => self.apply(Step::from_delta(delta), true),
        }
    }

    /// Moves one frame in `step`'s direction, wrapping at both ends.
    pub fn step(&mut self, step: Step) -> usize {
        self.current_frame = match step {
            Step::Forward => (self.current_frame + 1) % self.total_frames,
            Step::Backward => (self.current_frame + self.total_frames - 1) % self.total_frames,
        };
        self.current_frame
    }

    /// Ends every gesture and releases all listeners, the wheel included.
    pub fn teardown(&mut self) {
        self.mouse.end();
        self.touch.end();
        if let Some(sub) = self.wheel.take() {
            sub.release();
        }
    }

    /// Whether this controller's own subscription for `channel` is live. Other holders
    /// of the same [`Listeners`] do not count.
    fn holds(&self, channel: Channel) -> bool {
        match channel {
            Channel::Mouse => self.mouse.subscription.is_some(),
            Channel::Touch => self.touch.subscription.is_some(),
            Channel::Wheel => self.wheel.is_some(),
        }
    }

    fn coordinate(&self, point: Point) -> f64 {
        self.rig.coordinate(point)
    }

    fn apply(&mut self, step: Option<Step>, prevent_default: bool) -> InputResponse {
        if let Some(step) = step {
            self.step(step);
        }
        self.response(step, prevent_default)
    }

    fn response(&self, step: Option<Step>, prevent_default: bool) -> InputResponse {
        InputResponse {
            step,
            frame: self.current_frame,
            prevent_default,
        }
    }
}

impl Drop for SpinController {
    fn drop(&mut self) {
        self.teardown();
    }
}
