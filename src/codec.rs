//! Boundary to the wire codec: a pull-based byte source for the command decoder
//! and a buffer-based telemetry encoder.

use crate::command::Command;
use crate::state::State;
use core::future::Future;
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    /// The byte source failed to deliver the requested bytes.
    #[error("byte source failed")]
    Source,

    #[error("malformed message: {0}")]
    Malformed(&'static str),

    #[error("message does not fit in the buffer")]
    BufferTooSmall,
}

/// A stream of bytes pulled on demand by a decoder.
pub trait ByteSource {
    /// Fill `buf` completely. Returns `false` if the bytes could not be read.
    fn read(&mut self, buf: &mut [u8]) -> impl Future<Output = bool> + Send;

    /// Consume `count` bytes without retaining them.
    fn skip(&mut self, count: usize) -> impl Future<Output = bool> + Send;
}

/// A [`ByteSource`] over bytes already in memory.
#[derive(Debug)]
pub struct SliceSource<'a> {
    bytes: &'a [u8],
}

impl<'a> SliceSource<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes }
    }

    /// Bytes not consumed yet.
    pub fn remaining(&self) -> usize {
        self.bytes.len()
    }
}

impl ByteSource for SliceSource<'_> {
    async fn read(&mut self, buf: &mut [u8]) -> bool {
        if buf.len() > self.bytes.len() {
            return false;
        }
        let (head, tail) = self.bytes.split_at(buf.len());
        buf.copy_from_slice(head);
        self.bytes = tail;
        true
    }

    async fn skip(&mut self, count: usize) -> bool {
        if count > self.bytes.len() {
            return false;
        }
        self.bytes = &self.bytes[count..];
        true
    }
}

/// Decodes one [`Command`] at a time from a [`ByteSource`].
pub trait CommandDecoder: Send + 'static {
    /// Largest encoded command, used to size the buffer in buffered receive mode.
    fn max_message_len(&self) -> usize;

    fn decode<S>(&mut self, source: &mut S) -> impl Future<Output = Result<Command, CodecError>> + Send
    where
        S: ByteSource + Send;
}

/// Raw and calibrated inertial readings.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SensorSnapshot {
    pub acc_raw: Vector3<f32>,
    pub acc_corrected: Vector3<f32>,
    pub gyro_raw: Vector3<f32>,
    pub gyro_corrected: Vector3<f32>,
}

/// One telemetry frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TelemetryMessage {
    pub state: State,
    pub sensors: SensorSnapshot,
}

/// Serializes telemetry frames.
pub trait TelemetryEncoder: Send + 'static {
    /// Encode `message` into `out`, which is cleared first.
    fn encode(&mut self, message: &TelemetryMessage, out: &mut Vec<u8>) -> Result<(), CodecError>;
}
