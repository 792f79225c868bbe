//! Message-identifier dispatch table.
//!
//! A [`Dispatcher`] is built once from explicit registrations and then routes
//! every incoming buffer to the handler registered for each leading message
//! identifier. One buffer may carry several byte-aligned packets.

use crate::bits::BitReader;
use crate::error::{HandlerError, RegistrationError};
use log::{debug, warn};

/// A handler bound to an owner object. It receives the connection context and
/// a reader positioned right after the message identifier.
pub type Handler<O, C> = fn(&mut O, &C, &mut BitReader<'_>) -> Result<(), HandlerError>;

const MAX_ID_BITS: u32 = 16;

struct Entry<O, C> {
    name: &'static str,
    handler: Handler<O, C>,
}

/// Collects handler registrations before the table is frozen.
pub struct DispatcherBuilder<O, C> {
    id_bits: u32,
    registrations: Vec<(u32, &'static str, Handler<O, C>)>,
}

impl<O, C> DispatcherBuilder<O, C> {
    pub fn new(id_bits: u32) -> Self {
        Self {
            id_bits,
            registrations: Vec::new(),
        }
    }

    pub fn handler(mut self, id: impl Into<u32>, name: &'static str, handler: Handler<O, C>) -> Self {
        self.registrations.push((id.into(), name, handler));
        self
    }

    /// Freezes the registrations into a table.
    ///
    /// Fails if the identifier width is unsupported, an identifier does not
    /// fit the width, or two handlers claim the same identifier. Nothing is
    /// built unless every registration is valid.
    pub fn build(self) -> Result<Dispatcher<O, C>, RegistrationError> {
        if self.id_bits == 0 || self.id_bits > MAX_ID_BITS {
            return Err(RegistrationError::InvalidIdWidth(self.id_bits));
        }

        let capacity = 1usize << self.id_bits;
        let mut table: Vec<Option<Entry<O, C>>> = Vec::with_capacity(capacity);
        table.resize_with(capacity, || None);

        for (id, name, handler) in self.registrations {
            let slot = table
                .get_mut(id as usize)
                .ok_or(RegistrationError::IdOutOfRange {
                    id,
                    bits: self.id_bits,
                    handler: name,
                })?;

            if let Some(existing) = slot {
                return Err(RegistrationError::DuplicateId {
                    id,
                    existing: existing.name,
                    duplicate: name,
                });
            }

            *slot = Some(Entry { name, handler });
        }

        Ok(Dispatcher {
            id_bits: self.id_bits,
            table,
        })
    }
}

/// Counts of what happened to the messages in one or more buffers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    pub handled: usize,
    pub rejected: usize,
    pub unknown: usize,
    /// Buffers abandoned because a handler could not read its fields.
    pub corrupted: usize,
}

impl DispatchSummary {
    pub fn merge(&mut self, other: DispatchSummary) {
        self.handled += other.handled;
        self.rejected += other.rejected;
        self.unknown += other.unknown;
        self.corrupted += other.corrupted;
    }

    pub fn is_corrupted(&self) -> bool {
        self.corrupted > 0
    }
}

/// Immutable identifier → handler table.
pub struct Dispatcher<O, C> {
    id_bits: u32,
    table: Vec<Option<Entry<O, C>>>,
}

impl<O, C> Dispatcher<O, C> {
    pub fn builder(id_bits: u32) -> DispatcherBuilder<O, C> {
        DispatcherBuilder::new(id_bits)
    }

    pub fn id_bits(&self) -> u32 {
        self.id_bits
    }

    /// Number of registered handlers.
    pub fn len(&self) -> usize {
        self.table.iter().filter(|entry| entry.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn handler_name(&self, id: u32) -> Option<&'static str> {
        self.table
            .get(id as usize)
            .and_then(Option::as_ref)
            .map(|entry| entry.name)
    }

    /// Routes every packet in `data` to its handler, in order.
    ///
    /// A handler that rejects its packet only loses that packet. An unknown
    /// identifier or a handler that fails to read its fields ends processing
    /// of the buffer, since the position of the next packet is unknown.
    pub fn dispatch(&self, owner: &mut O, conn: &C, data: &[u8]) -> DispatchSummary {
        let mut summary = DispatchSummary::default();
        let mut reader = BitReader::new(data);

        while reader.remaining_bits() >= self.id_bits as usize {
            let id = match reader.read_bits(self.id_bits) {
                Ok(id) => id as u32,
                Err(_) => break,
            };

            let Some(entry) = self.table.get(id as usize).and_then(Option::as_ref) else {
                debug!("No handler for message id {id}, dropping the rest of the buffer");
                summary.unknown += 1;
                break;
            };

            match (entry.handler)(owner, conn, &mut reader) {
                Ok(()) => summary.handled += 1,
                Err(err) if err.is_framing() => {
                    warn!("Discarding buffer after malformed `{}`: {err}", entry.name);
                    summary.corrupted += 1;
                    break;
                }
                Err(err) => {
                    warn!("Discarded `{}` message: {err}", entry.name);
                    summary.rejected += 1;
                }
            }

            reader.align_to_byte();
        }

        summary
    }

    /// Dispatches a batch of receive events in arrival order.
    pub fn dispatch_batch<'a, I>(&self, owner: &mut O, events: I) -> DispatchSummary
    where
        I: IntoIterator<Item = (&'a C, &'a [u8])>,
        C: 'a,
    {
        let mut summary = DispatchSummary::default();
        for (conn, data) in events {
            summary.merge(self.dispatch(owner, conn, data));
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bits::BitWriter;

    #[derive(Default)]
    struct Recorder {
        calls: Vec<(u32, String)>,
    }

    impl Recorder {
        fn on_text(&mut self, conn: &u32, reader: &mut BitReader<'_>) -> Result<(), HandlerError> {
            let text = reader.read_string(16)?;
            self.calls.push((*conn, text));
            Ok(())
        }

        fn on_number(&mut self, conn: &u32, reader: &mut BitReader<'_>) -> Result<(), HandlerError> {
            let value = reader.read::<u8>()?;
            if value == 0 {
                return Err(HandlerError::rejected("zero is not allowed"));
            }
            self.calls.push((*conn, value.to_string()));
            Ok(())
        }
    }

    fn dispatcher() -> Dispatcher<Recorder, u32> {
        Dispatcher::builder(8)
            .handler(1u8, "text", Recorder::on_text)
            .handler(2u8, "number", Recorder::on_number)
            .build()
            .unwrap()
    }

    fn packet(id: u8, body: impl FnOnce(&mut BitWriter)) -> Vec<u8> {
        let mut writer = BitWriter::new();
        writer.write(&id);
        body(&mut writer);
        writer.into_bytes()
    }

    #[test]
    fn test_registered_handler_runs_once() {
        let table = dispatcher();
        let mut recorder = Recorder::default();
        let data = packet(1, |w| w.write_string("hello"));

        let summary = table.dispatch(&mut recorder, &7, &data);
        assert_eq!(summary.handled, 1);
        assert_eq!(recorder.calls, vec![(7, "hello".to_string())]);
        assert_eq!(table.handler_name(1), Some("text"));
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_multiple_packets_in_one_buffer() {
        let table = dispatcher();
        let mut recorder = Recorder::default();
        let mut data = packet(2, |w| w.write(&5u8));
        data.extend(packet(1, |w| w.write_string("hi")));
        data.extend(packet(2, |w| w.write(&9u8)));

        let summary = table.dispatch(&mut recorder, &1, &data);
        assert_eq!(summary.handled, 3);
        let texts: Vec<_> = recorder.calls.iter().map(|(_, t)| t.as_str()).collect();
        assert_eq!(texts, vec!["5", "hi", "9"]);
    }

    #[test]
    fn test_unknown_id_is_dropped() {
        let table = dispatcher();
        let mut recorder = Recorder::default();
        let mut data = packet(200, |w| w.write(&1u8));
        data.extend(packet(2, |w| w.write(&5u8)));

        let summary = table.dispatch(&mut recorder, &1, &data);
        assert_eq!(summary.unknown, 1);
        assert_eq!(summary.handled, 0);
        assert!(recorder.calls.is_empty());
    }

    #[test]
    fn test_rejected_message_does_not_stop_the_buffer() {
        let table = dispatcher();
        let mut recorder = Recorder::default();
        let mut data = packet(2, |w| w.write(&0u8));
        data.extend(packet(2, |w| w.write(&3u8)));

        let summary = table.dispatch(&mut recorder, &1, &data);
        assert_eq!(summary.rejected, 1);
        assert_eq!(summary.handled, 1);
        assert!(!summary.is_corrupted());
    }

    #[test]
    fn test_malformed_message_discards_the_buffer() {
        let table = dispatcher();
        let mut recorder = Recorder::default();
        let mut data = packet(1, |w| w.write_string("this is far too long"));
        data.extend(packet(2, |w| w.write(&3u8)));

        let summary = table.dispatch(&mut recorder, &1, &data);
        assert!(summary.is_corrupted());
        assert_eq!(summary.handled, 0);
        assert!(recorder.calls.is_empty());
    }

    #[test]
    fn test_truncated_message_is_corrupted() {
        let table = dispatcher();
        let mut recorder = Recorder::default();
        let summary = table.dispatch(&mut recorder, &1, &[2]);
        assert_eq!(summary.corrupted, 1);
    }

    #[test]
    fn test_batch_preserves_order() {
        let table = dispatcher();
        let mut recorder = Recorder::default();
        let first = packet(1, |w| w.write_string("a"));
        let second = packet(1, |w| w.write_string("b"));
        let third = packet(1, |w| w.write_string("c"));
        let (one, two) = (1u32, 2u32);

        let summary = table.dispatch_batch(
            &mut recorder,
            [
                (&one, first.as_slice()),
                (&two, second.as_slice()),
                (&one, third.as_slice()),
            ],
        );
        assert_eq!(summary.handled, 3);
        assert_eq!(
            recorder.calls,
            vec![(1, "a".to_string()), (2, "b".to_string()), (1, "c".to_string())]
        );
    }

    #[test]
    fn test_duplicate_registration_fails() {
        let result = Dispatcher::<Recorder, u32>::builder(8)
            .handler(1u8, "text", Recorder::on_text)
            .handler(1u8, "number", Recorder::on_number)
            .build();
        assert_eq!(
            result.err(),
            Some(RegistrationError::DuplicateId {
                id: 1,
                existing: "text",
                duplicate: "number"
            })
        );
    }

    #[test]
    fn test_id_out_of_range_fails() {
        let result = Dispatcher::<Recorder, u32>::builder(4)
            .handler(16u8, "text", Recorder::on_text)
            .build();
        assert!(matches!(
            result,
            Err(RegistrationError::IdOutOfRange { id: 16, bits: 4, .. })
        ));
    }

    #[test]
    fn test_invalid_width_fails() {
        assert!(matches!(
            Dispatcher::<Recorder, u32>::builder(0).build(),
            Err(RegistrationError::InvalidIdWidth(0))
        ));
        assert!(matches!(
            Dispatcher::<Recorder, u32>::builder(17).build(),
            Err(RegistrationError::InvalidIdWidth(17))
        ));
    }
}
