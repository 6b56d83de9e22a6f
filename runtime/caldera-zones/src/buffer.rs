// SPDX-License-Identifier: PMPL-1.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell

//! Zoned buffer handles.

use crate::error::ZoneError;
use crate::zone::{ElementLayout, Zone};
use smol_str::SmolStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLockReadGuard, RwLockWriteGuard};

static NEXT_BUFFER_ID: AtomicU64 = AtomicU64::new(1);

/// Identifies the execution context holding a buffer's pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PinToken(u64);

impl PinToken {
    /// Create a token from a raw id.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// The raw token id.
    pub fn value(self) -> u64 {
        self.0
    }
}

pub(crate) struct ZoneState {
    pub(crate) zone: Zone,
    pub(crate) origin: Zone,
    /// Zones to return through on demotion, promotion order.
    pub(crate) trail: Vec<Zone>,
    pub(crate) pin: Option<PinToken>,
}

struct BufferInner {
    id: u64,
    label: SmolStr,
    layout: ElementLayout,
    data: std::sync::RwLock<Vec<u8>>,
    state: Mutex<ZoneState>,
}

/// A typed, sized region tagged with exactly one zone at any instant.
///
/// Handles are shared: cloning creates another reference to the same
/// buffer, and a Managed buffer is reclaimed when the last handle
/// drops. Zone state lives behind a per-buffer lock; unrelated buffers
/// never contend.
#[derive(Clone)]
pub struct ZonedBuffer {
    inner: Arc<BufferInner>,
}

impl ZonedBuffer {
    fn with_origin(label: impl Into<SmolStr>, layout: ElementLayout, bytes: Vec<u8>, origin: Zone) -> Self {
        Self {
            inner: Arc::new(BufferInner {
                id: NEXT_BUFFER_ID.fetch_add(1, Ordering::Relaxed),
                label: label.into(),
                layout,
                data: std::sync::RwLock::new(bytes),
                state: Mutex::new(ZoneState {
                    zone: origin,
                    origin,
                    trail: Vec::new(),
                    pin: None,
                }),
            }),
        }
    }

    /// Create a shared-ownership Managed buffer.
    pub fn managed(label: impl Into<SmolStr>, layout: ElementLayout, bytes: Vec<u8>) -> Self {
        Self::with_origin(label, layout, bytes, Zone::Managed)
    }

    /// Create a scope-owned Static buffer.
    pub fn static_scope(label: impl Into<SmolStr>, layout: ElementLayout, bytes: Vec<u8>) -> Self {
        Self::with_origin(label, layout, bytes, Zone::Static)
    }

    /// Create a Managed buffer of f64 elements.
    pub fn managed_f64(label: impl Into<SmolStr>, values: &[f64]) -> Self {
        let bytes = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        Self::managed(label, ElementLayout::f64(), bytes)
    }

    /// Process-unique buffer id.
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Buffer label.
    pub fn label(&self) -> &SmolStr {
        &self.inner.label
    }

    /// Element layout.
    pub fn layout(&self) -> ElementLayout {
        self.inner.layout
    }

    /// Payload size in bytes.
    pub fn size_bytes(&self) -> usize {
        self.read().len()
    }

    /// The buffer's current zone.
    pub fn zone(&self) -> Zone {
        self.state().zone
    }

    /// The zone the buffer was created in (Static or Managed).
    pub fn origin_zone(&self) -> Zone {
        self.state().origin
    }

    /// Whether the buffer is pinned to a device execution.
    pub fn is_pinned(&self) -> bool {
        self.state().pin.is_some()
    }

    /// The pin owner, if pinned.
    pub fn pinned_by(&self) -> Option<PinToken> {
        self.state().pin
    }

    /// Number of live handles to this buffer.
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }

    /// Whether two handles refer to the same buffer.
    pub fn same_buffer(&self, other: &ZonedBuffer) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Read access to the payload. Always permitted, including while
    /// the buffer is pinned.
    pub fn read(&self) -> RwLockReadGuard<'_, Vec<u8>> {
        match self.inner.data.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Host-side write access. Fails while the buffer is pinned for a
    /// device execution.
    pub fn write(&self) -> Result<RwLockWriteGuard<'_, Vec<u8>>, ZoneError> {
        let state = self.state();
        if state.pin.is_some() {
            return Err(ZoneError::PinnedReadOnly {
                label: self.inner.label.to_string(),
            });
        }
        let guard = match self.inner.data.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        drop(state);
        Ok(guard)
    }

    /// Decode the payload as little-endian f64 values.
    pub fn to_f64_vec(&self) -> Vec<f64> {
        self.read()
            .chunks_exact(8)
            .map(|chunk| {
                let mut b = [0u8; 8];
                b.copy_from_slice(chunk);
                f64::from_le_bytes(b)
            })
            .collect()
    }

    pub(crate) fn state(&self) -> MutexGuard<'_, ZoneState> {
        match self.inner.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl std::fmt::Debug for ZonedBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state();
        f.debug_struct("ZonedBuffer")
            .field("id", &self.inner.id)
            .field("label", &self.inner.label)
            .field("zone", &state.zone)
            .field("pinned", &state.pin.is_some())
            .finish()
    }
}
