//! Decodes operator commands from the receiver device into the command channel.

use crate::codec::{ByteSource, CommandDecoder, SliceSource};
use crate::command::{Command, CommandSender};
use crate::config::{ReceiverConfig, ReceiverMode, DISCARD_CHUNK_LEN};
use crate::error::TaskError;
use crate::hal::{bridge, BridgeError, CharDevice};
use core::mem;
use core::time::Duration;
use log::{debug, error, warn};
use tokio::time;

/// [`ByteSource`] reading from a device through the notification bridge.
///
/// The task-local `scratch` buffer carries every transfer, it is handed to the
/// device and taken back on completion.
pub struct DeviceSource<'a, D> {
    device: &'a mut D,
    scratch: &'a mut Vec<u8>,
}

impl<'a, D: CharDevice> DeviceSource<'a, D> {
    pub fn new(device: &'a mut D, scratch: &'a mut Vec<u8>) -> Self {
        Self { device, scratch }
    }

    /// Read up to `len` bytes into the scratch buffer.
    /// Returns the number of bytes read, `None` if the read failed.
    async fn read_scratch(&mut self, len: usize) -> Option<usize> {
        let mut buf = mem::take(&mut *self.scratch);
        buf.resize(len, 0);

        let device = &mut *self.device;
        match bridge::transfer(buf, |buf, done| device.read_async(buf, done)).await {
            Ok(transfer) => {
                let transferred = transfer.transferred();
                *self.scratch = transfer.buf;
                transferred
            }
            Err(BridgeError::NotStarted(buf)) => {
                *self.scratch = buf;
                warn!("Receiver read start fail!");
                None
            }
            Err(BridgeError::Abandoned) => {
                error!("Receiver read abandoned!");
                None
            }
        }
    }
}

impl<D: CharDevice> ByteSource for DeviceSource<'_, D> {
    async fn read(&mut self, buf: &mut [u8]) -> bool {
        if buf.is_empty() {
            return true;
        }

        match self.read_scratch(buf.len()).await {
            Some(n) if n == buf.len() && n <= self.scratch.len() => {
                buf.copy_from_slice(&self.scratch[..n]);
                true
            }
            _ => false,
        }
    }

    async fn skip(&mut self, mut count: usize) -> bool {
        while count > 0 {
            let chunk = count.min(DISCARD_CHUNK_LEN);
            match self.read_scratch(chunk).await {
                Some(n) => count -= n.min(count),
                None => return false,
            }
        }
        true
    }
}

/// Receiving end of the command pipeline, owning the device and decoder.
pub struct Receiver<R, C> {
    device: R,
    decoder: C,
    mode: ReceiverMode,
    backoff: Duration,
    scratch: Vec<u8>,
}

impl<R, C> Receiver<R, C>
where
    R: CharDevice,
    C: CommandDecoder,
{
    pub fn new(device: R, decoder: C, config: &ReceiverConfig) -> Self {
        let capacity = match config.mode {
            ReceiverMode::Streaming => DISCARD_CHUNK_LEN,
            ReceiverMode::Buffered => decoder.max_message_len(),
        };

        Self {
            device,
            decoder,
            mode: config.mode,
            backoff: config.backoff,
            scratch: Vec::with_capacity(capacity),
        }
    }

    /// Try to receive one command, backing off after failures that may persist.
    pub async fn receive(&mut self) -> Option<Command> {
        match self.mode {
            ReceiverMode::Streaming => self.receive_streaming().await,
            ReceiverMode::Buffered => self.receive_buffered().await,
        }
    }

    async fn receive_streaming(&mut self) -> Option<Command> {
        let mut source = DeviceSource::new(&mut self.device, &mut self.scratch);

        match self.decoder.decode(&mut source).await {
            Ok(command) => Some(command),
            Err(e) => {
                error!("Receiver decoding failed! {}", e);
                // Probably a desynchronized stream, give it time
                time::sleep(self.backoff).await;
                None
            }
        }
    }

    async fn receive_buffered(&mut self) -> Option<Command> {
        let mut buf = mem::take(&mut self.scratch);
        buf.resize(self.decoder.max_message_len(), 0);

        let device = &mut self.device;
        let transfer = match bridge::transfer(buf, |buf, done| device.read_async(buf, done)).await {
            Ok(transfer) => transfer,
            Err(BridgeError::NotStarted(buf)) => {
                self.scratch = buf;
                warn!("Receiver read start fail!");
                time::sleep(self.backoff).await;
                return None;
            }
            Err(BridgeError::Abandoned) => {
                error!("Receiver read abandoned!");
                time::sleep(self.backoff).await;
                return None;
            }
        };

        let command = match transfer.transferred() {
            Some(n) => {
                let mut source = SliceSource::new(&transfer.buf[..n.min(transfer.buf.len())]);
                match self.decoder.decode(&mut source).await {
                    Ok(command) => {
                        if source.remaining() > 0 {
                            debug!("Ignoring {} bytes after command", source.remaining());
                        }
                        Some(command)
                    }
                    Err(e) => {
                        error!("Receiver decoding failed! {}", e);
                        None
                    }
                }
            }
            None => {
                error!("Receiver read error!");
                None
            }
        };

        self.scratch = transfer.buf;
        command
    }
}

/// Receive commands forever and queue them for the vehicle.
pub async fn run<R, C>(mut receiver: Receiver<R, C>, commands: CommandSender) -> Result<(), TaskError>
where
    R: CharDevice,
    C: CommandDecoder,
{
    loop {
        if let Some(command) = receiver.receive().await {
            commands.send(command).await;
        }
    }
}
