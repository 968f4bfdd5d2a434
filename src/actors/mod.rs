use crossbeam_channel::{Receiver, Sender};

use crate::result::Result;

/// A unit of work running on its own thread, consuming messages from one
/// channel and producing messages to another.
///
/// The actor stops once its receive channel is closed and drained.
pub trait Actor<From, To> {
    fn set_receive_channel(&mut self, channel: Receiver<From>);

    fn set_send_channel(&mut self, channel: Sender<To>);

    fn run(self) -> Result<()>;
}
