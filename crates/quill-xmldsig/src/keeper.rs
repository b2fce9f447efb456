//! The two stages the chain controller splices around: the event-buffering
//! stage and the stack keeper that covers for it while it is off the chain.

use crate::error::SignatureResult;
use crate::sax::{DocumentHandler, SaxEvent};

/// Buffering stage. While on the chain it mirrors every event into its
/// document buffer (the stand-in for the DOM the signature bridge reads)
/// and forwards downstream, unless blocking withholds forwarding until the
/// signature computation catches up.
#[derive(Debug, Default)]
pub struct SaxEventKeeper {
    document: Vec<SaxEvent>,
    pending: Vec<SaxEvent>,
    next_attached: bool,
    blocking: bool,
}

impl SaxEventKeeper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach or detach the next stage. Detached, events accumulate in the
    /// pending queue.
    pub fn set_next_handler(&mut self, attached: bool) {
        self.next_attached = attached;
    }

    pub fn set_blocking(&mut self, blocking: bool) {
        self.blocking = blocking;
    }

    /// Replay of a missed event: it belongs in the document buffer only.
    /// The next stage already saw it live while this stage was off the
    /// chain.
    pub fn receive_missed(&mut self, event: SaxEvent) {
        self.document.push(event);
    }

    /// One live event from the previous stage.
    pub fn handle(
        &mut self,
        event: SaxEvent,
        next: &mut dyn DocumentHandler,
    ) -> SignatureResult<()> {
        self.document.push(event.clone());
        if self.next_attached && !self.blocking {
            self.flush_pending(next)?;
            next.handle_event(event)
        } else {
            self.pending.push(event);
            Ok(())
        }
    }

    /// Drain withheld events downstream, in arrival order.
    pub fn flush_pending(&mut self, next: &mut dyn DocumentHandler) -> SignatureResult<()> {
        for event in self.pending.drain(..) {
            next.handle_event(event)?;
        }
        Ok(())
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Take the buffered document events accumulated so far.
    pub fn take_document(&mut self) -> Vec<SaxEvent> {
        std::mem::take(&mut self.document)
    }
}

/// Records the structural SAX events that pass by while the buffering stage
/// is off the chain, so a later splice can replay the missed prologue and
/// hand the buffer a structurally complete document.
#[derive(Debug, Default)]
pub struct ElementStackKeeper {
    events: Vec<SaxEvent>,
    active: bool,
    starts: usize,
    stops: usize,
}

impl ElementStackKeeper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&mut self) {
        self.active = true;
        self.starts += 1;
    }

    pub fn stop(&mut self) {
        self.active = false;
        self.stops += 1;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn start_count(&self) -> usize {
        self.starts
    }

    pub fn stop_count(&self) -> usize {
        self.stops
    }

    /// Observe one passing event. Only element structure is kept; a
    /// balanced start/end pair cancels out, an unmatched end is kept as-is.
    pub fn observe(&mut self, event: &SaxEvent) {
        if !self.active {
            return;
        }
        match event {
            SaxEvent::StartElement { .. } => self.events.push(event.clone()),
            SaxEvent::EndElement { .. } => {
                if matches!(self.events.last(), Some(SaxEvent::StartElement { .. })) {
                    self.events.pop();
                } else {
                    self.events.push(event.clone());
                }
            }
            SaxEvent::Characters(_) => {}
        }
    }

    /// Hand over the kept events. With `with_last_event` false the most
    /// recent event is withheld and returned, so the caller can insert a
    /// collector in front of it.
    pub fn take(&mut self, with_last_event: bool) -> (Vec<SaxEvent>, Option<SaxEvent>) {
        let mut events = std::mem::take(&mut self.events);
        let withheld = if with_last_event { None } else { events.pop() };
        (events, withheld)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[derive(Default)]
    struct Recorder(Vec<SaxEvent>);

    impl DocumentHandler for Recorder {
        fn handle_event(&mut self, event: SaxEvent) -> SignatureResult<()> {
            self.0.push(event);
            Ok(())
        }
    }

    #[test]
    fn stack_keeper_keeps_open_elements_only() {
        let mut keeper = ElementStackKeeper::new();
        keeper.start();
        keeper.observe(&SaxEvent::start("root", &[]));
        keeper.observe(&SaxEvent::start("child", &[]));
        keeper.observe(&SaxEvent::Characters("x".into()));
        keeper.observe(&SaxEvent::end("child"));

        let (events, withheld) = keeper.take(true);
        assert_eq!(events, vec![SaxEvent::start("root", &[])]);
        assert_eq!(withheld, None);
    }

    #[test]
    fn stack_keeper_can_withhold_the_last_event() {
        let mut keeper = ElementStackKeeper::new();
        keeper.start();
        keeper.observe(&SaxEvent::start("root", &[]));
        keeper.observe(&SaxEvent::start("next", &[]));

        let (events, withheld) = keeper.take(false);
        assert_eq!(events, vec![SaxEvent::start("root", &[])]);
        assert_eq!(withheld, Some(SaxEvent::start("next", &[])));
    }

    #[test]
    fn stack_keeper_ignores_events_while_stopped() {
        let mut keeper = ElementStackKeeper::new();
        keeper.observe(&SaxEvent::start("root", &[]));
        let (events, _) = keeper.take(true);
        assert_eq!(events, vec![]);
    }

    #[test]
    fn unmatched_end_is_retained() {
        let mut keeper = ElementStackKeeper::new();
        keeper.start();
        keeper.observe(&SaxEvent::end("closed-elsewhere"));
        let (events, _) = keeper.take(true);
        assert_eq!(events, vec![SaxEvent::end("closed-elsewhere")]);
    }

    #[test]
    fn event_keeper_blocks_and_flushes_in_order() {
        let mut keeper = SaxEventKeeper::new();
        let mut next = Recorder::default();
        keeper.set_next_handler(true);
        keeper.set_blocking(true);

        keeper.handle(SaxEvent::start("a", &[]), &mut next).unwrap();
        keeper.handle(SaxEvent::end("a"), &mut next).unwrap();
        assert_eq!(next.0.len(), 0);
        assert_eq!(keeper.pending_len(), 2);

        keeper.set_blocking(false);
        keeper
            .handle(SaxEvent::Characters("tail".into()), &mut next)
            .unwrap();
        assert_eq!(
            next.0,
            vec![
                SaxEvent::start("a", &[]),
                SaxEvent::end("a"),
                SaxEvent::Characters("tail".into()),
            ]
        );
    }

    #[test]
    fn missed_events_stay_out_of_the_forward_path() {
        let mut keeper = SaxEventKeeper::new();
        let mut next = Recorder::default();
        keeper.set_next_handler(true);

        keeper.receive_missed(SaxEvent::start("root", &[]));
        keeper.handle(SaxEvent::start("sig", &[]), &mut next).unwrap();

        assert_eq!(next.0, vec![SaxEvent::start("sig", &[])]);
        assert_eq!(
            keeper.take_document(),
            vec![SaxEvent::start("root", &[]), SaxEvent::start("sig", &[])]
        );
    }
}
