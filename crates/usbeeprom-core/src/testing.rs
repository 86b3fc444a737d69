//! Scripted transport used by the unit tests

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Duration;

use crate::error::{TransportError, TransportErrorKind};
use crate::transport::{DeviceId, Endpoint, Transport};

/// Records every transfer and replays queued IN data.
pub(crate) struct ScriptedTransport {
    max_packet_size: usize,
    transfers: Vec<(Endpoint, usize)>,
    sent: Vec<u8>,
    in_data: VecDeque<u8>,
    in_limit: Option<usize>,
    fail_at: Option<usize>,
    fail_reset: bool,
    fail_release: bool,
    /// Lifecycle calls, shared so they can be inspected after `close`
    calls: Rc<RefCell<Vec<&'static str>>>,
}

impl ScriptedTransport {
    pub fn new(max_packet_size: usize) -> Self {
        Self {
            max_packet_size,
            transfers: Vec::new(),
            sent: Vec::new(),
            in_data: VecDeque::new(),
            in_limit: None,
            fail_at: None,
            fail_reset: false,
            fail_release: false,
            calls: Rc::new(RefCell::new(Vec::new())),
        }
    }

    pub fn queue_in(&mut self, data: &[u8]) {
        self.in_data.extend(data.iter().copied());
    }

    pub fn queue_status(&mut self, status: u16) {
        self.queue_in(&status.to_le_bytes());
    }

    /// Cap the number of bytes returned by each IN transfer
    pub fn set_in_limit(&mut self, limit: usize) {
        self.in_limit = Some(limit);
    }

    /// Make the transfer with the given index time out
    pub fn fail_transfer(&mut self, index: usize) {
        self.fail_at = Some(index);
    }

    pub fn fail_reset(&mut self) {
        self.fail_reset = true;
    }

    pub fn fail_release(&mut self) {
        self.fail_release = true;
    }

    pub fn transfers(&self) -> &[(Endpoint, usize)] {
        &self.transfers
    }

    pub fn sent(&self) -> &[u8] {
        &self.sent
    }

    pub fn out_lengths(&self) -> Vec<usize> {
        self.lengths(Endpoint::Out)
    }

    pub fn in_lengths(&self) -> Vec<usize> {
        self.lengths(Endpoint::In)
    }

    pub fn calls(&self) -> Rc<RefCell<Vec<&'static str>>> {
        Rc::clone(&self.calls)
    }

    fn lengths(&self, endpoint: Endpoint) -> Vec<usize> {
        self.transfers
            .iter()
            .filter(|(ep, _)| *ep == endpoint)
            .map(|(_, len)| *len)
            .collect()
    }

    fn record(&mut self, endpoint: Endpoint, len: usize) -> Result<(), TransportError> {
        let index = self.transfers.len();
        self.transfers.push((endpoint, len));
        if self.fail_at == Some(index) {
            return Err(TransportError::timeout());
        }
        Ok(())
    }
}

impl Transport for ScriptedTransport {
    fn id(&self) -> DeviceId {
        DeviceId::new(1, 4)
    }

    fn max_packet_size(&self, _endpoint: Endpoint) -> usize {
        self.max_packet_size
    }

    fn bulk_out(&mut self, data: &[u8], _timeout: Duration) -> Result<usize, TransportError> {
        self.record(Endpoint::Out, data.len())?;
        self.sent.extend_from_slice(data);
        Ok(data.len())
    }

    fn bulk_in(&mut self, buf: &mut [u8], _timeout: Duration) -> Result<usize, TransportError> {
        self.record(Endpoint::In, buf.len())?;
        let n = buf
            .len()
            .min(self.in_limit.unwrap_or(usize::MAX))
            .min(self.in_data.len());
        for byte in buf.iter_mut().take(n) {
            *byte = self.in_data.pop_front().unwrap_or(0);
        }
        Ok(n)
    }

    fn reset(&mut self) -> Result<(), TransportError> {
        self.calls.borrow_mut().push("reset");
        if self.fail_reset {
            return Err(TransportError::new(TransportErrorKind::NotFound, "device gone"));
        }
        Ok(())
    }

    fn release_interface(&mut self) -> Result<(), TransportError> {
        self.calls.borrow_mut().push("release");
        if self.fail_release {
            return Err(TransportError::new(TransportErrorKind::Busy, "interface busy"));
        }
        Ok(())
    }

    fn close(self) {
        self.calls.borrow_mut().push("close");
    }
}
