//! Dynamic splicing of the buffering stage into the SAX chain.
//!
//! The buffering stage only sits between the previous stage (parser or
//! initializer) and the next document handler while element references are
//! being collected or event emission is blocked. When it is off the chain,
//! the element stack keeper records the structural events, so a later
//! splice can replay the missed prologue into the buffer and keep its
//! document structurally complete.

use crate::error::{SignatureError, SignatureResult};
use crate::keeper::{ElementStackKeeper, SaxEventKeeper};
use crate::sax::{DocumentHandler, SaxEvent};

/// How the previous stage lets the controller rewire its output: by
/// reinitializing it with a fresh handler, or through a parser's
/// document-handler setter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectAction {
    ReinitializeWithHandler,
    SetDocumentHandler,
}

/// Lifecycle of the lazily created security components (signature bridge,
/// document wrapper, buffer stage).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentsStatus {
    Uninitialized,
    Initialized,
    Failed,
}

/// Where the previous stage currently sends its events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageLink {
    Next,
    Buffer,
}

pub struct SaxChainController {
    components: ComponentsStatus,
    event_keeper: Option<SaxEventKeeper>,
    stack_keeper: ElementStackKeeper,
    previous_action: ConnectAction,
    previous_link: StageLink,
    buffer_connected: bool,
    collecting: bool,
    blocking: bool,
    sticky: bool,
}

impl SaxChainController {
    pub fn new() -> Self {
        Self {
            components: ComponentsStatus::Uninitialized,
            event_keeper: None,
            stack_keeper: ElementStackKeeper::new(),
            previous_action: ConnectAction::SetDocumentHandler,
            previous_link: StageLink::Next,
            buffer_connected: false,
            collecting: false,
            blocking: false,
            sticky: false,
        }
    }

    /// Configure the stages collaborating with the buffer on the chain and
    /// reset it to the disengaged shape.
    pub fn set_sax_chain_connector(&mut self, previous_action: ConnectAction) {
        self.previous_action = previous_action;
        self.initialize_sax_chain();
    }

    fn initialize_sax_chain(&mut self) {
        self.buffer_connected = false;
        self.collecting = false;
        self.blocking = false;
        self.stack_keeper.start();
        self.chain_off();
    }

    fn create_components(&mut self) {
        // Marked failed first; anything going wrong below leaves the chain
        // permanently disengaged rather than half-wired.
        self.components = ComponentsStatus::Failed;
        let mut keeper = SaxEventKeeper::new();
        keeper.set_next_handler(false);
        self.event_keeper = Some(keeper);
        self.components = ComponentsStatus::Initialized;
    }

    /// Splice the buffer stage into the chain. Returns whether it was just
    /// connected.
    fn chain_on(&mut self, retrieve_last_event: bool) -> bool {
        if self.sticky || self.buffer_connected {
            return false;
        }
        if self.components == ComponentsStatus::Uninitialized {
            self.create_components();
        }
        if self.components != ComponentsStatus::Initialized {
            return false;
        }

        let Some(keeper) = self.event_keeper.as_mut() else {
            self.components = ComponentsStatus::Failed;
            return false;
        };
        // No event may be forwarded during the connecting phase.
        keeper.set_next_handler(false);
        keeper.set_blocking(self.blocking);

        log::debug!(
            "connecting previous stage to the buffer stage via {:?}",
            self.previous_action
        );
        self.previous_link = StageLink::Buffer;

        // Replay the missed prologue so the buffered document keeps the
        // original structure, then the stack keeper can stop: nothing will
        // be missed while the buffer is on the chain.
        let (missed, _withheld) = self.stack_keeper.take(retrieve_last_event);
        for event in missed {
            keeper.receive_missed(event);
        }
        self.stack_keeper.stop();

        keeper.set_next_handler(true);
        self.buffer_connected = true;
        true
    }

    /// Take the buffer stage off the chain and let the stack keeper cover
    /// again.
    fn chain_off(&mut self) {
        if self.sticky || !self.buffer_connected {
            return;
        }
        if let Some(keeper) = self.event_keeper.as_mut() {
            keeper.set_next_handler(false);
        }
        log::debug!(
            "reconnecting previous stage to the next stage via {:?}",
            self.previous_action
        );
        self.previous_link = StageLink::Next;
        self.stack_keeper.start();
        self.buffer_connected = false;
    }

    /// The buffer stage belongs on the chain exactly while something is
    /// being collected or the stream is blocking.
    fn check_chaining_status(&mut self) {
        if self.collecting || self.blocking {
            self.chain_on(true);
        } else {
            self.chain_off();
        }
    }

    /// Listener callback: the event stream started or stopped blocking.
    pub fn blocking_status_changed(&mut self, blocking: bool) {
        self.blocking = blocking;
        self.check_chaining_status();
        if let Some(keeper) = self.event_keeper.as_mut() {
            keeper.set_blocking(blocking);
        }
    }

    /// Listener callback: an element collection started or ended.
    pub fn collection_status_changed(&mut self, collecting: bool) {
        self.collecting = collecting;
        self.check_chaining_status();
    }

    /// Keep the buffer stage wired in regardless of the flags.
    pub fn set_sticky(&mut self, sticky: bool) {
        self.sticky = sticky;
    }

    /// Route one event from the previous stage through the current chain
    /// shape into `next`.
    pub fn dispatch(
        &mut self,
        event: SaxEvent,
        next: &mut dyn DocumentHandler,
    ) -> SignatureResult<()> {
        match self.previous_link {
            StageLink::Buffer => {
                let keeper = self
                    .event_keeper
                    .as_mut()
                    .ok_or(SignatureError::ChainState)?;
                keeper.handle(event, next)
            }
            StageLink::Next => {
                self.stack_keeper.observe(&event);
                next.handle_event(event)
            }
        }
    }

    /// Flush whatever the stack keeper and the buffer still hold into the
    /// chain, then tear the connector down.
    pub fn clear_sax_chain_connector(
        &mut self,
        next: &mut dyn DocumentHandler,
    ) -> SignatureResult<()> {
        // Kept structural events must reach the buffered document first, so
        // the stage after the buffer always sees a complete document.
        if let Some(keeper) = self.event_keeper.as_mut() {
            let (missed, _) = self.stack_keeper.take(true);
            for event in missed {
                keeper.receive_missed(event);
            }
        }
        self.chain_off();
        if let Some(keeper) = self.event_keeper.as_mut() {
            keeper.set_blocking(false);
            keeper.flush_pending(next)?;
        }
        Ok(())
    }

    /// The buffered document collected by the buffer stage so far.
    pub fn take_buffered_document(&mut self) -> Vec<SaxEvent> {
        self.event_keeper
            .as_mut()
            .map(SaxEventKeeper::take_document)
            .unwrap_or_default()
    }

    pub fn is_engaged(&self) -> bool {
        self.buffer_connected
    }

    pub fn previous_link(&self) -> StageLink {
        self.previous_link
    }

    pub fn stack_keeper_active(&self) -> bool {
        self.stack_keeper.is_active()
    }

    pub fn stack_keeper_transitions(&self) -> (usize, usize) {
        (self.stack_keeper.start_count(), self.stack_keeper.stop_count())
    }

    pub fn components_status(&self) -> ComponentsStatus {
        self.components
    }
}

impl Default for SaxChainController {
    fn default() -> Self {
        Self::new()
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
    fn collecting_engages_and_disengages_the_buffer() {
        let mut chain = SaxChainController::new();
        chain.set_sax_chain_connector(ConnectAction::SetDocumentHandler);
        assert!(!chain.is_engaged());
        assert!(chain.stack_keeper_active());

        chain.collection_status_changed(true);
        assert!(chain.is_engaged());
        assert!(!chain.stack_keeper_active());
        assert_eq!(chain.previous_link(), StageLink::Buffer);
        assert_eq!(chain.components_status(), ComponentsStatus::Initialized);

        chain.collection_status_changed(false);
        assert!(!chain.is_engaged());
        assert!(chain.stack_keeper_active());
        assert_eq!(chain.previous_link(), StageLink::Next);
    }

    #[test]
    fn stack_keeper_toggles_exactly_once_per_transition() {
        let mut chain = SaxChainController::new();
        chain.set_sax_chain_connector(ConnectAction::SetDocumentHandler);
        let (starts_before, stops_before) = chain.stack_keeper_transitions();

        chain.collection_status_changed(true);
        chain.collection_status_changed(true);
        let (starts, stops) = chain.stack_keeper_transitions();
        assert_eq!((starts - starts_before, stops - stops_before), (0, 1));

        chain.collection_status_changed(false);
        chain.collection_status_changed(false);
        let (starts, stops) = chain.stack_keeper_transitions();
        assert_eq!((starts - starts_before, stops - stops_before), (1, 1));
    }

    #[test]
    fn missed_prologue_reaches_the_buffered_document_once() {
        let mut chain = SaxChainController::new();
        let mut next = Recorder::default();
        chain.set_sax_chain_connector(ConnectAction::SetDocumentHandler);

        chain
            .dispatch(SaxEvent::start("document-signatures", &[]), &mut next)
            .unwrap();
        chain.collection_status_changed(true);
        chain
            .dispatch(SaxEvent::start("Signature", &[]), &mut next)
            .unwrap();
        chain.dispatch(SaxEvent::end("Signature"), &mut next).unwrap();
        chain.collection_status_changed(false);
        chain
            .dispatch(SaxEvent::end("document-signatures"), &mut next)
            .unwrap();
        chain.clear_sax_chain_connector(&mut next).unwrap();

        // The next stage saw every event exactly once.
        assert_eq!(
            next.0,
            vec![
                SaxEvent::start("document-signatures", &[]),
                SaxEvent::start("Signature", &[]),
                SaxEvent::end("Signature"),
                SaxEvent::end("document-signatures"),
            ]
        );
        // The buffer saw the replayed prologue plus the collected subtree.
        let document = chain.take_buffered_document();
        assert_eq!(document[0], SaxEvent::start("document-signatures", &[]));
        assert!(document.contains(&SaxEvent::start("Signature", &[])));
    }

    #[test]
    fn blocking_engages_the_buffer_and_withholds_events() {
        let mut chain = SaxChainController::new();
        let mut next = Recorder::default();
        chain.set_sax_chain_connector(ConnectAction::ReinitializeWithHandler);

        chain.blocking_status_changed(true);
        assert!(chain.is_engaged());
        chain
            .dispatch(SaxEvent::start("held", &[]), &mut next)
            .unwrap();
        assert_eq!(next.0.len(), 0);

        chain.blocking_status_changed(false);
        assert!(!chain.is_engaged());
        chain.clear_sax_chain_connector(&mut next).unwrap();
        assert_eq!(next.0, vec![SaxEvent::start("held", &[])]);
    }

    #[test]
    fn sticky_prevents_rechaining() {
        let mut chain = SaxChainController::new();
        chain.set_sax_chain_connector(ConnectAction::SetDocumentHandler);
        chain.set_sticky(true);
        chain.collection_status_changed(true);
        assert!(!chain.is_engaged());
    }
}
