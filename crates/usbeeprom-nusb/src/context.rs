//! USB context and device discovery

use nusb::MaybeFuture;
use usbeeprom_core::{DeviceId, Eeprom, Error, Result};

use crate::error::usb_error;
use crate::transport::{device_id, NusbTransport};

/// Microchip Technology, Inc.
pub const USB_VENDOR: u16 = 0x04d8;
/// 28Cxxx EEPROM Programmer
pub const USB_PRODUCT: u16 = 0xf4cd;

/// Vendor/product pair identifying supported programmers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceFilter {
    /// USB vendor ID
    pub vendor_id: u16,
    /// USB product ID
    pub product_id: u16,
}

impl Default for DeviceFilter {
    fn default() -> Self {
        Self {
            vendor_id: USB_VENDOR,
            product_id: USB_PRODUCT,
        }
    }
}

impl DeviceFilter {
    fn matches(&self, info: &nusb::DeviceInfo) -> bool {
        info.vendor_id() == self.vendor_id && info.product_id() == self.product_id
    }
}

impl std::fmt::Display for DeviceFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "VID:{:04x} PID:{:04x}", self.vendor_id, self.product_id)
    }
}

/// Unopened programmer found during [`Context::walk`]
///
/// Borrowed from the enumeration, so it cannot outlive the walk that
/// produced it. Open it inside the visitor to keep the device.
#[derive(Clone, Copy)]
pub struct DeviceRef<'a> {
    info: &'a nusb::DeviceInfo,
}

impl DeviceRef<'_> {
    /// Bus/address identifier of the device
    pub fn id(&self) -> DeviceId {
        device_id(self.info)
    }

    /// Open the device and claim its interface
    pub fn open(&self) -> Result<Eeprom<NusbTransport>> {
        let transport = NusbTransport::open(self.info)?;
        Ok(Eeprom::new(transport))
    }
}

impl std::fmt::Debug for DeviceRef<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceRef").field("id", &self.id()).finish()
    }
}

/// Handle on the host's USB subsystem
///
/// Create one per process and pass it to whatever needs to find
/// programmers.
#[derive(Debug)]
pub struct Context {
    filter: DeviceFilter,
}

impl Context {
    /// Context matching the default programmer VID/PID
    pub fn new() -> Self {
        Self::with_filter(DeviceFilter::default())
    }

    /// Context matching a custom VID/PID pair
    pub fn with_filter(filter: DeviceFilter) -> Self {
        log::debug!("USB context created for {}", filter);
        Self { filter }
    }

    /// The filter used to recognise programmers
    pub fn filter(&self) -> DeviceFilter {
        self.filter
    }

    fn list(&self) -> Result<Vec<nusb::DeviceInfo>> {
        let devices: Vec<_> = nusb::list_devices()
            .wait()
            .map_err(|e| usb_error("failed to list devices", e))?
            .collect();
        Ok(devices)
    }

    /// Call `visit` for each attached programmer.
    ///
    /// Stops at the first error returned by `visit`. Fails with
    /// [`Error::DeviceNotFound`] when no programmer is attached.
    pub fn walk<F>(&self, mut visit: F) -> Result<()>
    where
        F: FnMut(DeviceRef<'_>) -> Result<()>,
    {
        let devices = self.list()?;
        visit_matching(
            devices.iter(),
            |info| self.filter.matches(info),
            |info| visit(DeviceRef { info }),
        )
    }

    /// Open the first attached programmer
    pub fn first(&self) -> Result<Eeprom<NusbTransport>> {
        let devices = self.list()?;
        let info = devices
            .iter()
            .find(|info| self.filter.matches(info))
            .ok_or(Error::DeviceNotFound)?;
        DeviceRef { info }.open()
    }

    /// Open the programmer with the given `bus:address` identifier
    pub fn open_id(&self, id: DeviceId) -> Result<Eeprom<NusbTransport>> {
        let devices = self.list()?;
        let info = find_id(
            devices.iter().filter(|info| self.filter.matches(info)),
            id,
            |info| device_id(info),
        )?;
        DeviceRef { info }.open()
    }

    /// Identifiers of all attached programmers
    pub fn devices(&self) -> Result<Vec<DeviceId>> {
        let mut ids = Vec::new();
        self.walk(|dev| {
            ids.push(dev.id());
            Ok(())
        })?;
        log::debug!("Found {} device(s) matching {}", ids.len(), self.filter);
        Ok(ids)
    }
}

/// Visit every item accepted by `matches`, stopping at the first error.
///
/// Fails with [`Error::DeviceNotFound`] if nothing matched.
fn visit_matching<T, I, P, F>(items: I, mut matches: P, mut visit: F) -> Result<()>
where
    I: IntoIterator<Item = T>,
    P: FnMut(&T) -> bool,
    F: FnMut(T) -> Result<()>,
{
    let mut found = 0usize;
    for item in items.into_iter().filter(|item| matches(item)) {
        found += 1;
        visit(item)?;
    }
    if found == 0 {
        return Err(Error::DeviceNotFound);
    }
    Ok(())
}

/// First item whose identifier is `id`
fn find_id<T, I, F>(items: I, id: DeviceId, id_of: F) -> Result<T>
where
    I: IntoIterator<Item = T>,
    F: Fn(&T) -> DeviceId,
{
    let mut found = None;
    visit_matching(
        items,
        |_| true,
        |item| {
            if found.is_none() && id_of(&item) == id {
                found = Some(item);
            }
            Ok(())
        },
    )?;
    found.ok_or(Error::DeviceNotFound)
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Context {
    fn drop(&mut self) {
        log::debug!("USB context released");
    }
}
