//! nusb-backed transport
//!
//! Opens the programmer, claims interface 0 and keeps the bulk endpoint
//! pair for the lifetime of the session. A port reset invalidates the nusb
//! handle, so after a reset the programmer is looked up again and
//! re-opened.

use std::time::{Duration, Instant};

use nusb::transfer::{Buffer, Bulk, In, Out};
use nusb::MaybeFuture;
use usbeeprom_core::protocol::{ENDPOINT_IN, ENDPOINT_OUT, INTERFACE};
use usbeeprom_core::{DeviceId, Endpoint, Transport, TransportError, TransportErrorKind};

use crate::error::{transfer_error, usb_error};

/// How long to wait for the programmer to re-enumerate after a reset
const REENUMERATE_TIMEOUT: Duration = Duration::from_secs(2);
/// Delay between enumeration attempts while waiting
const REENUMERATE_POLL: Duration = Duration::from_millis(50);

/// Bus/address identifier of an enumerated device
pub(crate) fn device_id(info: &nusb::DeviceInfo) -> DeviceId {
    DeviceId::new(info.busnum(), info.device_address())
}

/// Pick the device that came back after a reset.
///
/// The bus stays the same but the address may change. An exact match wins;
/// otherwise the single candidate on the same bus is taken. Several
/// candidates on the bus are ambiguous.
pub(crate) fn pick_reenumerated(previous: DeviceId, candidates: &[DeviceId]) -> Option<usize> {
    if let Some(i) = candidates.iter().position(|&id| id == previous) {
        return Some(i);
    }
    let mut same_bus = candidates
        .iter()
        .enumerate()
        .filter(|(_, id)| id.bus == previous.bus);
    match (same_bus.next(), same_bus.next()) {
        (Some((i, _)), None) => Some(i),
        _ => None,
    }
}

/// Claimed interface together with its bulk endpoints
struct Claimed {
    out_ep: nusb::Endpoint<Bulk, Out>,
    in_ep: nusb::Endpoint<Bulk, In>,
    // Dropped last so the endpoints go first
    _interface: nusb::Interface,
}

/// Open `info` and claim the programmer interface
fn open_claimed(info: &nusb::DeviceInfo) -> Result<(nusb::Device, Claimed), TransportError> {
    let device = info
        .open()
        .wait()
        .map_err(|e| usb_error("failed to open device", e))?;

    let interface = device
        .claim_interface(INTERFACE)
        .wait()
        .map_err(|e| usb_error("failed to claim interface", e))?;

    let out_ep = interface
        .endpoint::<Bulk, Out>(ENDPOINT_OUT)
        .map_err(|e| usb_error("failed to open OUT endpoint", e))?;
    let in_ep = interface
        .endpoint::<Bulk, In>(ENDPOINT_IN)
        .map_err(|e| usb_error("failed to open IN endpoint", e))?;

    Ok((
        device,
        Claimed {
            out_ep,
            in_ep,
            _interface: interface,
        },
    ))
}

/// Transport over an opened nusb device
pub struct NusbTransport {
    device: nusb::Device,
    claimed: Option<Claimed>,
    id: DeviceId,
    vendor_id: u16,
    product_id: u16,
    out_packet_size: usize,
    in_packet_size: usize,
}

impl NusbTransport {
    /// Open the device and claim the programmer interface.
    ///
    /// If claiming fails the device handle is closed again before returning.
    pub(crate) fn open(info: &nusb::DeviceInfo) -> Result<Self, TransportError> {
        let id = device_id(info);
        log::info!("Opening programmer at bus {} address {}", id.bus, id.address);

        let (device, claimed) = open_claimed(info)?;
        let mut transport = Self {
            device,
            claimed: None,
            id,
            vendor_id: info.vendor_id(),
            product_id: info.product_id(),
            out_packet_size: 0,
            in_packet_size: 0,
        };
        transport.install(claimed);
        Ok(transport)
    }

    fn install(&mut self, claimed: Claimed) {
        self.out_packet_size = claimed.out_ep.max_packet_size();
        self.in_packet_size = claimed.in_ep.max_packet_size();
        log::debug!(
            "{}: max packet size OUT {} IN {}",
            self.id,
            self.out_packet_size,
            self.in_packet_size
        );
        self.claimed = Some(claimed);
    }

    /// Find the programmer again after a reset and claim it.
    ///
    /// On failure the transport stays released and every later transfer
    /// reports that.
    fn reopen(&mut self) -> Result<(), TransportError> {
        let deadline = Instant::now() + REENUMERATE_TIMEOUT;
        let mut last_error = None;

        loop {
            let devices: Vec<_> = nusb::list_devices()
                .wait()
                .map_err(|e| usb_error("failed to list devices", e))?
                .filter(|d| d.vendor_id() == self.vendor_id && d.product_id() == self.product_id)
                .collect();
            let ids: Vec<_> = devices.iter().map(device_id).collect();

            if let Some(i) = pick_reenumerated(self.id, &ids) {
                // Right after the reset the old node may still be listed
                match open_claimed(&devices[i]) {
                    Ok((device, claimed)) => {
                        if ids[i] != self.id {
                            log::info!("{}: re-enumerated as {}", self.id, ids[i]);
                        }
                        self.device = device;
                        self.id = ids[i];
                        self.install(claimed);
                        return Ok(());
                    }
                    Err(e) => last_error = Some(e),
                }
            }

            if Instant::now() >= deadline {
                return Err(last_error.unwrap_or_else(|| {
                    TransportError::new(
                        TransportErrorKind::NotFound,
                        "device did not come back after reset",
                    )
                }));
            }
            std::thread::sleep(REENUMERATE_POLL);
        }
    }

    fn claimed(&mut self) -> Result<&mut Claimed, TransportError> {
        self.claimed.as_mut().ok_or_else(|| {
            TransportError::new(TransportErrorKind::NotFound, "interface has been released")
        })
    }
}

impl Transport for NusbTransport {
    fn id(&self) -> DeviceId {
        self.id
    }

    fn max_packet_size(&self, endpoint: Endpoint) -> usize {
        match endpoint {
            Endpoint::In => self.in_packet_size,
            Endpoint::Out => self.out_packet_size,
        }
    }

    fn bulk_out(&mut self, data: &[u8], timeout: Duration) -> Result<usize, TransportError> {
        let out_ep = &mut self.claimed()?.out_ep;

        let mut out_buf = Buffer::new(data.len());
        out_buf.extend_from_slice(data);

        let completion = out_ep.transfer_blocking(out_buf, timeout);
        let sent = completion.actual_len;
        completion.status.map_err(transfer_error)?;
        Ok(sent)
    }

    fn bulk_in(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize, TransportError> {
        let in_ep = &mut self.claimed()?.in_ep;

        // IN requests must be a whole number of packets
        let max_packet_size = in_ep.max_packet_size();
        let request_len = buf.len().div_ceil(max_packet_size) * max_packet_size;
        let mut in_buf = Buffer::new(request_len);
        in_buf.set_requested_len(request_len);

        let completion = in_ep.transfer_blocking(in_buf, timeout);
        let data = completion.into_result().map_err(transfer_error)?;

        if data.len() > buf.len() {
            log::warn!(
                "{}: device sent {} bytes, expected at most {}",
                self.id,
                data.len(),
                buf.len()
            );
        }
        let len = data.len().min(buf.len());
        buf[..len].copy_from_slice(&data[..len]);
        Ok(len)
    }

    fn reset(&mut self) -> Result<(), TransportError> {
        // The endpoints belong to the handle the reset invalidates
        self.claimed = None;
        self.device
            .reset()
            .wait()
            .map_err(|e| usb_error("failed to reset device", e))?;
        self.reopen()
    }

    fn release_interface(&mut self) -> Result<(), TransportError> {
        match self.claimed.take() {
            Some(_) => {
                log::debug!("{}: released interface {}", self.id, INTERFACE);
                Ok(())
            }
            None => Err(TransportError::new(
                TransportErrorKind::NotFound,
                "interface already released",
            )),
        }
    }

    fn close(self) {
        log::debug!("{}: closing device", self.id);
        drop(self.claimed);
        drop(self.device);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reenumerated_same_address() {
        let previous = DeviceId::new(1, 5);
        let candidates = [DeviceId::new(2, 5), DeviceId::new(1, 5)];
        assert_eq!(pick_reenumerated(previous, &candidates), Some(1));
    }

    #[test]
    fn test_reenumerated_new_address_on_same_bus() {
        let previous = DeviceId::new(1, 5);
        let candidates = [DeviceId::new(2, 3), DeviceId::new(1, 9)];
        assert_eq!(pick_reenumerated(previous, &candidates), Some(1));
    }

    #[test]
    fn test_reenumerated_ambiguous_or_missing() {
        let previous = DeviceId::new(1, 5);
        assert_eq!(pick_reenumerated(previous, &[]), None);
        assert_eq!(pick_reenumerated(previous, &[DeviceId::new(3, 5)]), None);
        assert_eq!(
            pick_reenumerated(previous, &[DeviceId::new(1, 7), DeviceId::new(1, 8)]),
            None
        );
    }
}
