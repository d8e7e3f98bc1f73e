//! The connection state machine.
//!
//! Everything here is a pure function of the current state and an event. Carrying out the
//! requested [`Action`] and [`Effect`]s is up to the session, in this order: the exit effects of
//! the state left, then the action of the transition, then the entry effects of the state entered.
//!
//! [`Action`]: enum.Action.html
//! [`Effect`]: enum.Effect.html
use core::fmt;

/// The state of a connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum State {
    /// Waiting for the SYN of the peer. Every session starts here.
    Listen,

    /// Answered the SYN, waiting on its acknowledgment.
    SynRcvd,

    /// An open connection.
    Estab,

    /// The other side closed its direction.
    CloseWait,

    /// Closed our side of the connection.
    FinWait1,

    /// Our FIN was acknowledged, waiting on the FIN of the peer.
    FinWait2,

    /// Both sides sent FIN at the same time.
    Closing,

    /// Closed our side after the peer did, waiting on the acknowledgment.
    LastAck,

    /// Both sides are closed, lingering in case our last ACK got lost.
    TimeWait,

    /// Terminal. The session only waits for its removal.
    Closed,
}

/// Inputs of the state machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Event {
    RcvSyn,
    RcvAckOfSyn,
    RcvFin,
    RcvAckOfFin,
    /// Close our direction, requested by the application or the forced-close timer.
    DoClose,
    /// The `timewait` linger period expired.
    Timeout,
}

/// A segment to transmit as part of a transition.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Action {
    /// Answer a connection request, with SYN and ACK.
    SendSynAck,
    /// A bare ACK.
    SendAck,
    /// Close our direction, with FIN and ACK.
    SendFin,
}

/// A side effect of entering or leaving a state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Effect {
    /// Tell the application the connection is established.
    NotifyConnect,
    /// Arm the timer that ends `timewait`.
    ArmTimeWait,
    /// Ask the owner to remove the session.
    RequestRemoval,
    /// Arm the timer that delivers `DoClose` on our own initiative.
    ArmForcedClose,
    /// Cancel that timer again.
    CancelForcedClose,
}

/// Look up the transition of `state` on `event`.
///
/// Returns `None` when the state has no transition for the event. Such events are ignored.
pub fn transition(state: State, event: Event) -> Option<(State, Option<Action>)> {
    use self::State::*;
    use self::Event::*;

    let next = match (state, event) {
        (Listen,    RcvSyn)      => (SynRcvd,   Some(Action::SendSynAck)),
        (SynRcvd,   RcvAckOfSyn) => (Estab,     None),
        (SynRcvd,   DoClose)     => (Closed,    None),
        (Estab,     RcvFin)      => (CloseWait, Some(Action::SendAck)),
        (Estab,     DoClose)     => (FinWait1,  Some(Action::SendFin)),
        (CloseWait, DoClose)     => (LastAck,   Some(Action::SendFin)),
        (LastAck,   RcvAckOfFin) => (Closed,    None),
        (FinWait1,  RcvAckOfFin) => (FinWait2,  None),
        (FinWait1,  RcvFin)      => (Closing,   Some(Action::SendAck)),
        (FinWait2,  RcvFin)      => (TimeWait,  Some(Action::SendAck)),
        (Closing,   RcvAckOfFin) => (TimeWait,  None),
        (TimeWait,  Timeout)     => (Closed,    None),
        _ => return None,
    };

    Some(next)
}

/// The effects of leaving a state.
pub fn on_exit(state: State) -> &'static [Effect] {
    match state {
        State::SynRcvd => &[Effect::CancelForcedClose],
        _ => &[],
    }
}

/// The effects of entering a state.
pub fn on_entry(state: State) -> &'static [Effect] {
    match state {
        State::Estab => &[Effect::NotifyConnect],
        State::TimeWait => &[Effect::ArmTimeWait],
        State::Closed => &[Effect::RequestRemoval],
        State::CloseWait | State::SynRcvd => &[Effect::ArmForcedClose],
        _ => &[],
    }
}

/// All effects of moving from one state to another, exit effects first.
pub fn effects(from: State, to: State) -> impl Iterator<Item=Effect> {
    on_exit(from).iter().chain(on_entry(to)).cloned()
}

/// The running state machine of one connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Machine {
    current: State,
}

/// A transition taken by a `Machine`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Step {
    pub from: State,
    pub to: State,
    pub action: Option<Action>,
}

impl Machine {
    /// A machine in `listen`.
    pub fn new() -> Self {
        Machine { current: State::Listen }
    }

    pub fn state(&self) -> State {
        self.current
    }

    /// Feed an event, returning the transition that was taken.
    ///
    /// The state is already updated when this returns. An event without a transition leaves the
    /// machine untouched and returns `None`.
    pub fn fire(&mut self, event: Event) -> Option<Step> {
        let from = self.current;
        let (to, action) = transition(from, event)?;
        self.current = to;
        Some(Step { from, to, action })
    }
}

impl Default for Machine {
    fn default() -> Self {
        Machine::new()
    }
}

impl Step {
    pub fn exit(&self) -> &'static [Effect] {
        on_exit(self.from)
    }

    pub fn entry(&self) -> &'static [Effect] {
        on_entry(self.to)
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            State::Listen => "listen",
            State::SynRcvd => "synrcvd",
            State::Estab => "estab",
            State::CloseWait => "closewait",
            State::FinWait1 => "finwait1",
            State::FinWait2 => "finwait2",
            State::Closing => "closing",
            State::LastAck => "lastack",
            State::TimeWait => "timewait",
            State::Closed => "closed",
        };
        f.write_str(name)
    }
}
